//! Buffered messages, their correlations, and the start-message lock
//! held per correlation key.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use super::{StringTripleIndex, keys_in};
use crate::error::StateViolation;
use crate::value::MessageRecord;

const ENTITY: &str = "message";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredMessage {
    pub key: i64,
    pub record: MessageRecord,
}

/// Buffered messages and the bookkeeping that keeps a message from being
/// correlated twice to the same process.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MessageState {
    messages: BTreeMap<i64, StoredMessage>,
    /// (tenant, name, correlation key, message key)
    by_name_and_correlation: StringTripleIndex,
    /// (deadline, message key)
    deadlines: BTreeSet<(i64, i64)>,
    /// (tenant, name, correlation key, message id)
    message_ids: BTreeSet<(String, String, String, String)>,
    /// (message key, bpmn process id)
    correlated: BTreeSet<(i64, String)>,
    /// (tenant, bpmn process id, correlation key) with a running instance
    /// that was started by a message.
    active_process_instances: BTreeSet<(String, String, String)>,
    /// process instance key -> lock held in `active_process_instances`
    instance_locks: BTreeMap<i64, (String, String, String)>,
}

impl MessageState {
    pub fn get(&self, key: i64) -> Option<&StoredMessage> {
        self.messages.get(&key)
    }

    /// Buffered messages with this name and correlation key, oldest first.
    pub fn messages_for(
        &self,
        tenant_id: &str,
        name: &str,
        correlation_key: &str,
    ) -> Vec<&StoredMessage> {
        keys_in(&self.by_name_and_correlation, tenant_id, name, correlation_key)
            .into_iter()
            .filter_map(|key| self.messages.get(&key))
            .collect()
    }

    /// Keys of messages whose time to live ran out before `now`.
    pub fn expired_before(&self, now: i64) -> Vec<i64> {
        self.deadlines
            .range(..(now, i64::MIN))
            .map(|(_, key)| *key)
            .collect()
    }

    pub fn exists_message_id(
        &self,
        tenant_id: &str,
        name: &str,
        correlation_key: &str,
        message_id: &str,
    ) -> bool {
        self.message_ids.contains(&(
            tenant_id.to_owned(),
            name.to_owned(),
            correlation_key.to_owned(),
            message_id.to_owned(),
        ))
    }

    /// Whether the message already started or resumed an instance of `bpmn_process_id`.
    pub fn is_correlated(&self, message_key: i64, bpmn_process_id: &str) -> bool {
        self.correlated
            .contains(&(message_key, bpmn_process_id.to_owned()))
    }

    pub fn exists_active_process_instance(
        &self,
        tenant_id: &str,
        bpmn_process_id: &str,
        correlation_key: &str,
    ) -> bool {
        self.active_process_instances.contains(&(
            tenant_id.to_owned(),
            bpmn_process_id.to_owned(),
            correlation_key.to_owned(),
        ))
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub(crate) fn put(&mut self, key: i64, record: &MessageRecord) -> Result<(), StateViolation> {
        if self.messages.contains_key(&key) {
            return Err(StateViolation::already_exists(ENTITY, key));
        }
        self.by_name_and_correlation.insert((
            record.tenant_id.clone(),
            record.name.clone(),
            record.correlation_key.clone(),
            key,
        ));
        self.deadlines.insert((record.deadline, key));
        if let Some(message_id) = &record.message_id {
            self.message_ids.insert((
                record.tenant_id.clone(),
                record.name.clone(),
                record.correlation_key.clone(),
                message_id.clone(),
            ));
        }
        self.messages.insert(
            key,
            StoredMessage {
                key,
                record: record.clone(),
            },
        );
        Ok(())
    }

    /// Drop an expired message and every correlation recorded for it.
    pub(crate) fn remove(&mut self, key: i64) -> Result<StoredMessage, StateViolation> {
        let message = self
            .messages
            .remove(&key)
            .ok_or_else(|| StateViolation::not_found(ENTITY, key))?;
        let record = &message.record;
        self.by_name_and_correlation.remove(&(
            record.tenant_id.clone(),
            record.name.clone(),
            record.correlation_key.clone(),
            key,
        ));
        self.deadlines.remove(&(record.deadline, key));
        if let Some(message_id) = &record.message_id {
            self.message_ids.remove(&(
                record.tenant_id.clone(),
                record.name.clone(),
                record.correlation_key.clone(),
                message_id.clone(),
            ));
        }
        self.correlated.retain(|(message_key, _)| *message_key != key);
        Ok(message)
    }

    pub(crate) fn put_correlation(&mut self, message_key: i64, bpmn_process_id: &str) {
        self.correlated
            .insert((message_key, bpmn_process_id.to_owned()));
    }

    pub(crate) fn remove_correlation(&mut self, message_key: i64, bpmn_process_id: &str) {
        self.correlated
            .remove(&(message_key, bpmn_process_id.to_owned()));
    }

    /// Lock `(tenant, process, correlation key)` while `process_instance_key`
    /// runs, so a second start message with the same key is buffered.
    pub(crate) fn put_active_process_instance(
        &mut self,
        tenant_id: &str,
        bpmn_process_id: &str,
        correlation_key: &str,
        process_instance_key: i64,
    ) {
        let lock = (
            tenant_id.to_owned(),
            bpmn_process_id.to_owned(),
            correlation_key.to_owned(),
        );
        self.active_process_instances.insert(lock.clone());
        self.instance_locks.insert(process_instance_key, lock);
    }

    pub(crate) fn remove_active_process_instance(&mut self, process_instance_key: i64) {
        if let Some(lock) = self.instance_locks.remove(&process_instance_key) {
            self.active_process_instances.remove(&lock);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message(name: &str, correlation_key: &str, deadline: i64) -> MessageRecord {
        MessageRecord {
            name: name.into(),
            correlation_key: correlation_key.into(),
            deadline,
            message_id: Some(format!("{name}-{correlation_key}")),
            ..MessageRecord::default()
        }
    }

    #[test]
    fn put_indexes_by_name_correlation_and_id() {
        let mut state = MessageState::default();
        state.put(1, &message("paid", "o-1", 100)).unwrap();
        state.put(2, &message("paid", "o-2", 200)).unwrap();

        let keys: Vec<i64> = state.messages_for("", "paid", "o-1").iter().map(|m| m.key).collect();
        assert_eq!(keys, vec![1]);
        assert!(state.exists_message_id("", "paid", "o-2", "paid-o-2"));
        assert_eq!(state.expired_before(150), vec![1]);
    }

    #[test]
    fn remove_drops_indexes_and_correlations() {
        let mut state = MessageState::default();
        state.put(1, &message("paid", "o-1", 100)).unwrap();
        state.put_correlation(1, "order");
        assert!(state.is_correlated(1, "order"));

        state.remove(1).unwrap();
        assert!(state.is_empty());
        assert!(!state.is_correlated(1, "order"));
        assert!(!state.exists_message_id("", "paid", "o-1", "paid-o-1"));
        assert!(state.expired_before(i64::MAX).is_empty());
        assert!(state.remove(1).is_err());
    }

    #[test]
    fn active_instance_lock_is_released_by_instance_key() {
        let mut state = MessageState::default();
        state.put_active_process_instance("", "order", "o-1", 77);
        assert!(state.exists_active_process_instance("", "order", "o-1"));

        state.remove_active_process_instance(77);
        assert!(!state.exists_active_process_instance("", "order", "o-1"));
    }
}
