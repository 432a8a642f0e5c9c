//! Pending timers, indexed by due date and scope.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::error::StateViolation;
use crate::value::TimerRecord;

const ENTITY: &str = "timer";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimerInstance {
    pub key: i64,
    pub record: TimerRecord,
}

impl TimerInstance {
    /// Element instance the timer belongs to, or its process definition for
    /// timer start events.
    pub fn scope_key(&self) -> i64 {
        self.record
            .element_instance_key
            .unwrap_or(self.record.process_definition_key)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TimerInstanceState {
    timers: BTreeMap<i64, TimerInstance>,
    /// (due date, timer key)
    due: BTreeSet<(i64, i64)>,
    /// (scope key, timer key)
    by_scope: BTreeSet<(i64, i64)>,
}

impl TimerInstanceState {
    /// The pending timer with key `key`.
    pub fn get(&self, key: i64) -> Option<&TimerInstance> {
        self.timers.get(&key)
    }

    /// Timers due at or before `now`, earliest first.
    pub fn due_before(&self, now: i64) -> Vec<&TimerInstance> {
        self.due
            .range(..=(now, i64::MAX))
            .filter_map(|(_, key)| self.timers.get(key))
            .collect()
    }

    /// Timers of an element instance, or of a process definition's start events.
    pub fn for_scope(&self, scope_key: i64) -> Vec<&TimerInstance> {
        self.by_scope
            .range((scope_key, i64::MIN)..=(scope_key, i64::MAX))
            .filter_map(|(_, key)| self.timers.get(key))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.timers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timers.is_empty()
    }

    pub(crate) fn create(&mut self, key: i64, record: &TimerRecord) -> Result<(), StateViolation> {
        if self.timers.contains_key(&key) {
            return Err(StateViolation::already_exists(ENTITY, key));
        }
        let timer = TimerInstance {
            key,
            record: record.clone(),
        };
        self.due.insert((record.due_date, key));
        self.by_scope.insert((timer.scope_key(), key));
        self.timers.insert(key, timer);
        Ok(())
    }

    /// Remove a triggered or canceled timer.
    pub(crate) fn remove(&mut self, key: i64) -> Result<TimerInstance, StateViolation> {
        let timer = self
            .timers
            .remove(&key)
            .ok_or_else(|| StateViolation::not_found(ENTITY, key))?;
        self.due.remove(&(timer.record.due_date, key));
        self.by_scope.remove(&(timer.scope_key(), key));
        Ok(timer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn timer(due_date: i64, element_instance_key: Option<i64>) -> TimerRecord {
        TimerRecord {
            due_date,
            element_instance_key,
            process_definition_key: 100,
            target_element_id: "wait".into(),
            repetitions: 1,
            ..TimerRecord::default()
        }
    }

    #[test]
    fn due_before_is_ordered_by_due_date() {
        let mut state = TimerInstanceState::default();
        state.create(1, &timer(300, Some(10))).unwrap();
        state.create(2, &timer(100, Some(10))).unwrap();
        state.create(3, &timer(900, Some(11))).unwrap();

        let due: Vec<i64> = state.due_before(300).iter().map(|t| t.key).collect();
        assert_eq!(due, vec![2, 1]);
    }

    #[test]
    fn start_event_timers_are_scoped_to_the_definition() {
        let mut state = TimerInstanceState::default();
        state.create(1, &timer(100, None)).unwrap();
        state.create(2, &timer(100, Some(10))).unwrap();

        assert_eq!(state.for_scope(100).len(), 1);
        assert_eq!(state.for_scope(10).len(), 1);
    }

    #[test]
    fn remove_clears_indexes_and_is_strict() {
        let mut state = TimerInstanceState::default();
        state.create(1, &timer(100, Some(10))).unwrap();
        state.remove(1).unwrap();
        assert!(state.due_before(i64::MAX).is_empty());
        assert!(state.for_scope(10).is_empty());
        assert!(state.remove(1).is_err());
    }
}
