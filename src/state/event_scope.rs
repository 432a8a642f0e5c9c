//! Event scopes: which events an element instance accepts and the
//! triggers queued on it.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::value::Variables;

/// Event scope of an element instance: which events it still accepts and
/// which of them interrupt it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventScopeInstance {
    pub accepting: bool,
    pub interrupted: bool,
    pub interrupting_element_ids: BTreeSet<String>,
    pub boundary_element_ids: BTreeSet<String>,
}

/// An event waiting to be processed by its scope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventTrigger {
    pub event_key: i64,
    pub element_id: String,
    pub variables: Variables,
    pub process_instance_key: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EventScopeInstanceState {
    scopes: BTreeMap<i64, EventScopeInstance>,
    /// scope key -> event key -> trigger
    triggers: BTreeMap<i64, BTreeMap<i64, EventTrigger>>,
}

impl EventScopeInstanceState {
    pub fn get(&self, scope_key: i64) -> Option<&EventScopeInstance> {
        self.scopes.get(&scope_key)
    }

    /// Whether the scope still takes new event triggers.
    pub fn is_accepting(&self, scope_key: i64) -> bool {
        self.scopes.get(&scope_key).is_some_and(|scope| scope.accepting)
    }

    /// The oldest pending trigger of a scope.
    pub fn peek_trigger(&self, scope_key: i64) -> Option<&EventTrigger> {
        self.triggers
            .get(&scope_key)
            .and_then(|triggers| triggers.values().next())
    }

    pub fn trigger(&self, scope_key: i64, event_key: i64) -> Option<&EventTrigger> {
        self.triggers
            .get(&scope_key)
            .and_then(|triggers| triggers.get(&event_key))
    }

    pub fn len(&self) -> usize {
        self.scopes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scopes.is_empty()
    }

    pub(crate) fn create_scope(
        &mut self,
        scope_key: i64,
        interrupting_element_ids: BTreeSet<String>,
        boundary_element_ids: BTreeSet<String>,
    ) {
        self.scopes.entry(scope_key).or_insert(EventScopeInstance {
            accepting: true,
            interrupted: false,
            interrupting_element_ids,
            boundary_element_ids,
        });
    }

    /// Drop a scope together with any trigger still waiting on it.
    pub(crate) fn delete_scope(&mut self, scope_key: i64) {
        self.scopes.remove(&scope_key);
        self.triggers.remove(&scope_key);
    }

    /// Store a trigger if the scope still accepts events.
    ///
    /// Returns whether the trigger was stored. An interrupting target closes
    /// the scope to further events. Keys without a scope record belong to
    /// process definitions (start events) and always accept.
    pub(crate) fn trigger_event(&mut self, scope_key: i64, trigger: EventTrigger) -> bool {
        if let Some(scope) = self.scopes.get_mut(&scope_key) {
            if !scope.accepting {
                return false;
            }
            if scope.interrupting_element_ids.contains(&trigger.element_id) {
                scope.accepting = false;
                scope.interrupted = true;
            }
        }
        self.triggers
            .entry(scope_key)
            .or_default()
            .insert(trigger.event_key, trigger);
        true
    }

    pub(crate) fn delete_trigger(&mut self, scope_key: i64, event_key: i64) {
        if let Some(triggers) = self.triggers.get_mut(&scope_key) {
            triggers.remove(&event_key);
            if triggers.is_empty() {
                self.triggers.remove(&scope_key);
            }
        }
    }

    /// Close a scope after an interrupting element was activated directly.
    pub(crate) fn interrupt(&mut self, scope_key: i64) {
        if let Some(scope) = self.scopes.get_mut(&scope_key) {
            scope.accepting = false;
            scope.interrupted = true;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(values: &[&str]) -> BTreeSet<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    fn trigger(event_key: i64, element_id: &str) -> EventTrigger {
        EventTrigger {
            event_key,
            element_id: element_id.into(),
            variables: Variables::new(),
            process_instance_key: Some(1),
        }
    }

    #[test]
    fn non_interrupting_trigger_keeps_scope_accepting() {
        let mut state = EventScopeInstanceState::default();
        state.create_scope(10, ids(&["timeout"]), ids(&["timeout", "reminder"]));

        assert!(state.trigger_event(10, trigger(1, "reminder")));
        assert!(state.is_accepting(10));
        assert!(state.trigger_event(10, trigger(2, "reminder")));
    }

    #[test]
    fn interrupting_trigger_closes_scope() {
        let mut state = EventScopeInstanceState::default();
        state.create_scope(10, ids(&["timeout"]), ids(&["timeout"]));

        assert!(state.trigger_event(10, trigger(1, "timeout")));
        assert!(!state.is_accepting(10));
        assert!(state.get(10).unwrap().interrupted);
        assert!(!state.trigger_event(10, trigger(2, "timeout")));
        assert_eq!(state.peek_trigger(10).unwrap().event_key, 1);
    }

    #[test]
    fn start_event_triggers_need_no_scope() {
        let mut state = EventScopeInstanceState::default();
        assert!(state.trigger_event(500, trigger(1, "start")));
        assert!(state.trigger(500, 1).is_some());

        state.delete_trigger(500, 1);
        assert!(state.peek_trigger(500).is_none());
    }

    #[test]
    fn delete_scope_drops_pending_triggers() {
        let mut state = EventScopeInstanceState::default();
        state.create_scope(10, BTreeSet::new(), BTreeSet::new());
        state.trigger_event(10, trigger(1, "msg"));
        state.delete_scope(10);
        assert!(state.is_empty());
        assert!(state.peek_trigger(10).is_none());
    }
}
