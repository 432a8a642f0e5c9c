//! Signal subscriptions by signal name.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::StateViolation;
use crate::value::SignalSubscriptionRecord;

const ENTITY: &str = "signal subscription";

/// Signal subscriptions keyed by signal name, then by catch event instance
/// (or process definition for signal start events).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SignalSubscriptionState {
    subscriptions: BTreeMap<String, BTreeMap<i64, SignalSubscriptionRecord>>,
}

impl SignalSubscriptionState {
    pub fn for_signal(&self, signal_name: &str) -> impl Iterator<Item = &SignalSubscriptionRecord> {
        self.subscriptions
            .get(signal_name)
            .into_iter()
            .flat_map(BTreeMap::values)
    }

    pub fn exists(&self, signal_name: &str, subscription_key: i64) -> bool {
        self.subscriptions
            .get(signal_name)
            .is_some_and(|by_key| by_key.contains_key(&subscription_key))
    }

    pub fn is_empty(&self) -> bool {
        self.subscriptions.is_empty()
    }

    pub(crate) fn put(&mut self, record: &SignalSubscriptionRecord) -> Result<(), StateViolation> {
        let by_key = self
            .subscriptions
            .entry(record.signal_name.clone())
            .or_default();
        let key = record.subscription_key();
        if by_key.contains_key(&key) {
            return Err(StateViolation::already_exists(ENTITY, describe(record)));
        }
        by_key.insert(key, record.clone());
        Ok(())
    }

    pub(crate) fn remove(&mut self, record: &SignalSubscriptionRecord) -> Result<(), StateViolation> {
        let by_key = self
            .subscriptions
            .get_mut(&record.signal_name)
            .ok_or_else(|| StateViolation::not_found(ENTITY, describe(record)))?;
        by_key
            .remove(&record.subscription_key())
            .ok_or_else(|| StateViolation::not_found(ENTITY, describe(record)))?;
        if by_key.is_empty() {
            self.subscriptions.remove(&record.signal_name);
        }
        Ok(())
    }
}

fn describe(record: &SignalSubscriptionRecord) -> String {
    format!("{}/{}", record.signal_name, record.subscription_key())
}
