//! Subscriptions of message start events to buffered messages.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::error::StateViolation;
use crate::value::MessageStartEventSubscriptionRecord;

const ENTITY: &str = "message start event subscription";

/// Message start event subscriptions keyed by
/// `(process definition key, message name)`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MessageStartEventSubscriptionState {
    subscriptions: BTreeMap<i64, BTreeMap<String, MessageStartEventSubscriptionRecord>>,
    /// (tenant, message name, process definition key)
    by_message_name: BTreeSet<(String, String, i64)>,
}

impl MessageStartEventSubscriptionState {
    pub fn get(
        &self,
        process_definition_key: i64,
        message_name: &str,
    ) -> Option<&MessageStartEventSubscriptionRecord> {
        self.subscriptions
            .get(&process_definition_key)
            .and_then(|by_name| by_name.get(message_name))
    }

    /// Start event subscriptions a message with this name can trigger.
    pub fn for_message(
        &self,
        tenant_id: &str,
        message_name: &str,
    ) -> Vec<&MessageStartEventSubscriptionRecord> {
        let lower = (tenant_id.to_owned(), message_name.to_owned(), i64::MIN);
        let upper = (tenant_id.to_owned(), message_name.to_owned(), i64::MAX);
        self.by_message_name
            .range(lower..=upper)
            .filter_map(|(_, name, key)| self.get(*key, name))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.by_message_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_message_name.is_empty()
    }

    pub(crate) fn put(
        &mut self,
        record: &MessageStartEventSubscriptionRecord,
    ) -> Result<(), StateViolation> {
        let by_name = self
            .subscriptions
            .entry(record.process_definition_key)
            .or_default();
        if by_name.contains_key(&record.message_name) {
            return Err(StateViolation::already_exists(ENTITY, describe(record)));
        }
        by_name.insert(record.message_name.clone(), record.clone());
        self.by_message_name.insert((
            record.tenant_id.clone(),
            record.message_name.clone(),
            record.process_definition_key,
        ));
        Ok(())
    }

    pub(crate) fn remove(
        &mut self,
        record: &MessageStartEventSubscriptionRecord,
    ) -> Result<(), StateViolation> {
        let by_name = self
            .subscriptions
            .get_mut(&record.process_definition_key)
            .ok_or_else(|| StateViolation::not_found(ENTITY, describe(record)))?;
        let removed = by_name
            .remove(&record.message_name)
            .ok_or_else(|| StateViolation::not_found(ENTITY, describe(record)))?;
        if by_name.is_empty() {
            self.subscriptions.remove(&record.process_definition_key);
        }
        self.by_message_name.remove(&(
            removed.tenant_id,
            removed.message_name,
            removed.process_definition_key,
        ));
        Ok(())
    }
}

fn describe(record: &MessageStartEventSubscriptionRecord) -> String {
    format!("{}/{}", record.process_definition_key, record.message_name)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn subscription(process_definition_key: i64, message_name: &str) -> MessageStartEventSubscriptionRecord {
        MessageStartEventSubscriptionRecord {
            process_definition_key,
            bpmn_process_id: "order".into(),
            start_event_id: "start".into(),
            message_name: message_name.into(),
            ..MessageStartEventSubscriptionRecord::default()
        }
    }

    #[test]
    fn for_message_finds_all_definitions() {
        let mut state = MessageStartEventSubscriptionState::default();
        state.put(&subscription(1, "order-placed")).unwrap();
        state.put(&subscription(2, "order-placed")).unwrap();
        state.put(&subscription(2, "order-canceled")).unwrap();

        assert_eq!(state.for_message("", "order-placed").len(), 2);
        assert_eq!(state.len(), 3);
    }

    #[test]
    fn remove_is_strict() {
        let mut state = MessageStartEventSubscriptionState::default();
        state.put(&subscription(1, "order-placed")).unwrap();
        state.remove(&subscription(1, "order-placed")).unwrap();
        assert!(state.is_empty());
        assert!(state.remove(&subscription(1, "order-placed")).is_err());
    }
}
