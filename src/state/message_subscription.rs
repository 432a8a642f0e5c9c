//! Message-side subscriptions used to correlate published messages.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::{StringTripleIndex, keys_in};
use crate::error::StateViolation;
use crate::value::{MessageSubscriptionRecord, Variables};

const ENTITY: &str = "message subscription";

/// A message that is being correlated but not yet confirmed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingCorrelation {
    pub message_key: i64,
    pub variables: Variables,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageSubscription {
    pub record: MessageSubscriptionRecord,
    pub correlation: Option<PendingCorrelation>,
}

impl MessageSubscription {
    pub fn is_correlating(&self) -> bool {
        self.correlation.is_some()
    }
}

/// Subscriptions held on the message side, keyed by
/// `(element instance key, message name)`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MessageSubscriptionState {
    subscriptions: BTreeMap<i64, BTreeMap<String, MessageSubscription>>,
    /// (tenant, message name, correlation key, element instance key)
    by_name_and_correlation: StringTripleIndex,
}

impl MessageSubscriptionState {
    /// Subscription of an element instance to a message name.
    pub fn get(&self, element_instance_key: i64, message_name: &str) -> Option<&MessageSubscription> {
        self.subscriptions
            .get(&element_instance_key)
            .and_then(|by_name| by_name.get(message_name))
    }

    /// Subscriptions a message with this name and correlation key can reach.
    pub fn subscriptions_for(
        &self,
        tenant_id: &str,
        message_name: &str,
        correlation_key: &str,
    ) -> Vec<&MessageSubscription> {
        keys_in(&self.by_name_and_correlation, tenant_id, message_name, correlation_key)
            .into_iter()
            .filter_map(|key| self.get(key, message_name))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.subscriptions.values().map(BTreeMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.subscriptions.is_empty()
    }

    pub(crate) fn put(&mut self, record: &MessageSubscriptionRecord) -> Result<(), StateViolation> {
        let by_name = self
            .subscriptions
            .entry(record.element_instance_key)
            .or_default();
        if by_name.contains_key(&record.message_name) {
            return Err(StateViolation::already_exists(ENTITY, describe(record)));
        }
        by_name.insert(
            record.message_name.clone(),
            MessageSubscription {
                record: record.clone(),
                correlation: None,
            },
        );
        self.by_name_and_correlation.insert(index_entry(record));
        Ok(())
    }

    pub(crate) fn start_correlating(
        &mut self,
        record: &MessageSubscriptionRecord,
    ) -> Result<(), StateViolation> {
        let message_key = record
            .message_key
            .ok_or_else(|| StateViolation::not_found("message", "none"))?;
        let subscription = self.get_mut(record)?;
        subscription.correlation = Some(PendingCorrelation {
            message_key,
            variables: record.variables.clone(),
        });
        Ok(())
    }

    /// Forget a pending correlation, leaving the subscription open.
    pub(crate) fn reset_correlation(
        &mut self,
        record: &MessageSubscriptionRecord,
    ) -> Result<(), StateViolation> {
        self.get_mut(record)?.correlation = None;
        Ok(())
    }

    pub(crate) fn remove(
        &mut self,
        record: &MessageSubscriptionRecord,
    ) -> Result<MessageSubscription, StateViolation> {
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
        self.by_name_and_correlation
            .remove(&index_entry(&removed.record));
        Ok(removed)
    }

    fn get_mut(
        &mut self,
        record: &MessageSubscriptionRecord,
    ) -> Result<&mut MessageSubscription, StateViolation> {
        self.subscriptions
            .get_mut(&record.element_instance_key)
            .and_then(|by_name| by_name.get_mut(&record.message_name))
            .ok_or_else(|| StateViolation::not_found(ENTITY, describe(record)))
    }
}

fn describe(record: &MessageSubscriptionRecord) -> String {
    format!("{}/{}", record.element_instance_key, record.message_name)
}

fn index_entry(record: &MessageSubscriptionRecord) -> (String, String, String, i64) {
    (
        record.tenant_id.clone(),
        record.message_name.clone(),
        record.correlation_key.clone(),
        record.element_instance_key,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn subscription(element_instance_key: i64) -> MessageSubscriptionRecord {
        MessageSubscriptionRecord {
            process_instance_key: 1,
            element_instance_key,
            bpmn_process_id: "order".into(),
            message_name: "paid".into(),
            correlation_key: "o-1".into(),
            ..MessageSubscriptionRecord::default()
        }
    }

    #[test]
    fn put_then_find_by_correlation() {
        let mut state = MessageSubscriptionState::default();
        state.put(&subscription(10)).unwrap();
        state.put(&subscription(11)).unwrap();

        assert_eq!(state.subscriptions_for("", "paid", "o-1").len(), 2);
        assert!(state.put(&subscription(10)).is_err());
    }

    #[test]
    fn correlating_then_reset_restores_open_subscription() {
        let mut state = MessageSubscriptionState::default();
        state.put(&subscription(10)).unwrap();
        let before = state.clone();

        let correlating = MessageSubscriptionRecord {
            message_key: Some(5),
            ..subscription(10)
        };
        state.start_correlating(&correlating).unwrap();
        assert!(state.get(10, "paid").unwrap().is_correlating());

        state.reset_correlation(&correlating).unwrap();
        assert_eq!(state, before);
    }

    #[test]
    fn remove_is_strict() {
        let mut state = MessageSubscriptionState::default();
        state.put(&subscription(10)).unwrap();
        state.remove(&subscription(10)).unwrap();
        assert!(state.is_empty());
        assert!(state.subscriptions_for("", "paid", "o-1").is_empty());
        assert!(matches!(
            state.remove(&subscription(10)).unwrap_err(),
            StateViolation::NotFound { .. }
        ));
    }
}
