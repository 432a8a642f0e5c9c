//! Process-side message subscriptions of waiting element instances.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::StateViolation;
use crate::value::ProcessMessageSubscriptionRecord;

const ENTITY: &str = "process message subscription";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SubscriptionPhase {
    Opening,
    Opened,
    Closing,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessMessageSubscription {
    pub phase: SubscriptionPhase,
    pub record: ProcessMessageSubscriptionRecord,
}

/// Subscriptions held on the process side, keyed by
/// `(element instance key, message name)`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProcessMessageSubscriptionState {
    subscriptions: BTreeMap<i64, BTreeMap<String, ProcessMessageSubscription>>,
}

impl ProcessMessageSubscriptionState {
    pub fn get(
        &self,
        element_instance_key: i64,
        message_name: &str,
    ) -> Option<&ProcessMessageSubscription> {
        self.subscriptions
            .get(&element_instance_key)
            .and_then(|by_name| by_name.get(message_name))
    }

    /// All subscriptions opened by an element instance.
    pub fn for_element_instance(
        &self,
        element_instance_key: i64,
    ) -> impl Iterator<Item = &ProcessMessageSubscription> {
        self.subscriptions
            .get(&element_instance_key)
            .into_iter()
            .flat_map(BTreeMap::values)
    }

    pub fn len(&self) -> usize {
        self.subscriptions.values().map(BTreeMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.subscriptions.is_empty()
    }

    pub(crate) fn put_opening(
        &mut self,
        record: &ProcessMessageSubscriptionRecord,
    ) -> Result<(), StateViolation> {
        let by_name = self
            .subscriptions
            .entry(record.element_instance_key)
            .or_default();
        if by_name.contains_key(&record.message_name) {
            return Err(StateViolation::already_exists(ENTITY, describe(record)));
        }
        by_name.insert(
            record.message_name.clone(),
            ProcessMessageSubscription {
                phase: SubscriptionPhase::Opening,
                record: record.clone(),
            },
        );
        Ok(())
    }

    pub(crate) fn opened(
        &mut self,
        record: &ProcessMessageSubscriptionRecord,
    ) -> Result<(), StateViolation> {
        self.move_to(record, &[SubscriptionPhase::Opening], SubscriptionPhase::Opened)
    }

    /// A message was correlated through a non-interrupting subscription,
    /// which stays open for the next one.
    pub(crate) fn correlated(
        &mut self,
        record: &ProcessMessageSubscriptionRecord,
    ) -> Result<(), StateViolation> {
        self.move_to(
            record,
            &[SubscriptionPhase::Opening, SubscriptionPhase::Opened],
            SubscriptionPhase::Opened,
        )
    }

    pub(crate) fn closing(
        &mut self,
        record: &ProcessMessageSubscriptionRecord,
    ) -> Result<(), StateViolation> {
        self.move_to(
            record,
            &[SubscriptionPhase::Opening, SubscriptionPhase::Opened],
            SubscriptionPhase::Closing,
        )
    }

    pub(crate) fn remove(
        &mut self,
        record: &ProcessMessageSubscriptionRecord,
    ) -> Result<ProcessMessageSubscription, StateViolation> {
        let by_name = self
            .subscriptions
            .get_mut(&record.element_instance_key)
            .ok_or_else(|| StateViolation::not_found(ENTITY, describe(record)))?;
        let removed = by_name
            .remove(&record.message_name)
            .ok_or_else(|| StateViolation::not_found(ENTITY, describe(record)))?;
        if by_name.is_empty() {
            self.subscriptions.remove(&record.element_instance_key);
        }
        Ok(removed)
    }

    fn move_to(
        &mut self,
        record: &ProcessMessageSubscriptionRecord,
        from: &[SubscriptionPhase],
        next: SubscriptionPhase,
    ) -> Result<(), StateViolation> {
        let subscription = self
            .subscriptions
            .get_mut(&record.element_instance_key)
            .and_then(|by_name| by_name.get_mut(&record.message_name))
            .ok_or_else(|| StateViolation::not_found(ENTITY, describe(record)))?;
        if !from.contains(&subscription.phase) {
            return Err(StateViolation::illegal_transition(
                ENTITY,
                describe(record),
                subscription.phase,
                next,
            ));
        }
        subscription.phase = next;
        subscription.record = record.clone();
        Ok(())
    }
}

fn describe(record: &ProcessMessageSubscriptionRecord) -> String {
    format!("{}/{}", record.element_instance_key, record.message_name)
}
