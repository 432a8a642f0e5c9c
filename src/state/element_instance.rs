//! Live element instances of running processes, with sequence flow
//! bookkeeping for joining gateways.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::error::StateViolation;
use crate::value::ProcessInstanceRecord;

const ENTITY: &str = "element instance";

/// Lifecycle phase of a live element instance.
///
/// Completed and terminated instances are removed rather than kept in a
/// terminal phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ElementPhase {
    Activating,
    Activated,
    Completing,
    Terminating,
}

impl ElementPhase {
    fn can_move_to(self, next: ElementPhase) -> bool {
        use ElementPhase::*;
        matches!(
            (self, next),
            (Activating, Activated)
                | (Activated, Completing)
                | (Activating | Activated | Completing, Terminating)
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElementInstance {
    pub key: i64,
    pub phase: ElementPhase,
    pub record: ProcessInstanceRecord,
    pub children: BTreeSet<i64>,
    /// Sequence flows taken inside this scope whose target has not been
    /// activated yet.
    pub active_sequence_flows: u32,
    pub job_key: Option<i64>,
    pub user_task_key: Option<i64>,
    /// Process instance started by this call activity.
    pub called_child_instance_key: Option<i64>,
    /// Element that interrupted this scope, if any.
    pub interrupting_element_id: Option<String>,
}

/// Live element instances keyed by element instance key.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ElementInstanceState {
    instances: BTreeMap<i64, ElementInstance>,
    /// flow scope key -> joining gateway id -> sequence flow id -> times taken
    taken_sequence_flows: BTreeMap<i64, BTreeMap<String, BTreeMap<String, u32>>>,
}

impl ElementInstanceState {
    pub fn get(&self, key: i64) -> Option<&ElementInstance> {
        self.instances.get(&key)
    }

    pub fn contains(&self, key: i64) -> bool {
        self.instances.contains_key(&key)
    }

    /// Live children of the scope `key`.
    pub fn children(&self, key: i64) -> impl Iterator<Item = &ElementInstance> {
        self.instances
            .get(&key)
            .into_iter()
            .flat_map(|instance| instance.children.iter())
            .filter_map(|child| self.instances.get(child))
    }

    /// Incoming sequence flows a joining gateway has seen in `scope_key`.
    pub fn taken_sequence_flows(
        &self,
        scope_key: i64,
        gateway_id: &str,
    ) -> Option<&BTreeMap<String, u32>> {
        self.taken_sequence_flows
            .get(&scope_key)
            .and_then(|gateways| gateways.get(gateway_id))
    }

    pub fn len(&self) -> usize {
        self.instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }

    pub(crate) fn activating(
        &mut self,
        key: i64,
        record: &ProcessInstanceRecord,
    ) -> Result<(), StateViolation> {
        if self.instances.contains_key(&key) {
            return Err(StateViolation::already_exists(ENTITY, key));
        }
        if let Some(scope_key) = record.flow_scope_key {
            let scope = self
                .instances
                .get_mut(&scope_key)
                .ok_or_else(|| StateViolation::not_found(ENTITY, scope_key))?;
            scope.children.insert(key);
        }
        self.instances.insert(
            key,
            ElementInstance {
                key,
                phase: ElementPhase::Activating,
                record: record.clone(),
                children: BTreeSet::new(),
                active_sequence_flows: 0,
                job_key: None,
                user_task_key: None,
                called_child_instance_key: None,
                interrupting_element_id: None,
            },
        );
        Ok(())
    }

    pub(crate) fn transition(&mut self, key: i64, next: ElementPhase) -> Result<(), StateViolation> {
        let instance = self.get_mut(key)?;
        if !instance.phase.can_move_to(next) {
            return Err(StateViolation::illegal_transition(
                ENTITY,
                key,
                instance.phase,
                next,
            ));
        }
        instance.phase = next;
        Ok(())
    }

    /// Remove an instance that finished in `expected` phase.
    pub(crate) fn remove(
        &mut self,
        key: i64,
        expected: ElementPhase,
    ) -> Result<ElementInstance, StateViolation> {
        let phase = self.get_mut(key)?.phase;
        if phase != expected {
            return Err(StateViolation::IllegalTransition {
                entity: ENTITY,
                key: key.to_string(),
                from: format!("{phase:?}"),
                to: format!("removed (expected {expected:?})"),
            });
        }
        let Some(instance) = self.instances.remove(&key) else {
            return Err(StateViolation::not_found(ENTITY, key));
        };
        if let Some(scope_key) = instance.record.flow_scope_key
            && let Some(scope) = self.instances.get_mut(&scope_key)
        {
            scope.children.remove(&key);
        }
        if let Some(parent_key) = instance.record.parent_element_instance_key
            && let Some(parent) = self.instances.get_mut(&parent_key)
            && parent.called_child_instance_key == Some(key)
        {
            parent.called_child_instance_key = None;
        }
        self.taken_sequence_flows.remove(&key);
        Ok(instance)
    }

    /// One sequence flow leading into the scope's child was consumed.
    pub(crate) fn consume_sequence_flow(&mut self, scope_key: i64) -> Result<(), StateViolation> {
        let scope = self.get_mut(scope_key)?;
        scope.active_sequence_flows = scope.active_sequence_flows.saturating_sub(1);
        Ok(())
    }

    /// Record a taken sequence flow in `scope_key`. When the flow leads to a
    /// joining gateway, the gateway's incoming-flow count is bumped as well.
    pub(crate) fn take_sequence_flow(
        &mut self,
        scope_key: i64,
        flow_id: &str,
        joining_gateway_id: Option<&str>,
    ) -> Result<(), StateViolation> {
        let scope = self.get_mut(scope_key)?;
        scope.active_sequence_flows += 1;
        if let Some(gateway_id) = joining_gateway_id {
            *self
                .taken_sequence_flows
                .entry(scope_key)
                .or_default()
                .entry(gateway_id.to_owned())
                .or_default()
                .entry(flow_id.to_owned())
                .or_default() += 1;
        }
        Ok(())
    }

    /// A joining gateway in `scope_key` fired. Each incoming flow it waited
    /// on is consumed once; a flow taken again (e.g. in a loop) stays
    /// recorded for the gateway's next activation.
    ///
    /// # Returns
    ///
    /// The number of sequence flows joined.
    pub(crate) fn join_sequence_flows(
        &mut self,
        scope_key: i64,
        gateway_id: &str,
    ) -> Result<u32, StateViolation> {
        self.get_mut(scope_key)?;
        let mut joined = 0;
        if let Some(gateways) = self.taken_sequence_flows.get_mut(&scope_key) {
            if let Some(flows) = gateways.get_mut(gateway_id) {
                for count in flows.values_mut() {
                    *count -= 1;
                    joined += 1;
                }
                flows.retain(|_, count| *count > 0);
                if flows.is_empty() {
                    gateways.remove(gateway_id);
                }
            }
            if gateways.is_empty() {
                self.taken_sequence_flows.remove(&scope_key);
            }
        }
        let scope = self.get_mut(scope_key)?;
        scope.active_sequence_flows = scope.active_sequence_flows.saturating_sub(joined);
        Ok(joined)
    }

    pub(crate) fn link_called_child(
        &mut self,
        parent_key: i64,
        child_key: i64,
    ) -> Result<(), StateViolation> {
        self.get_mut(parent_key)?.called_child_instance_key = Some(child_key);
        Ok(())
    }

    pub(crate) fn set_job_key(&mut self, key: i64, job_key: Option<i64>) {
        if let Some(instance) = self.instances.get_mut(&key) {
            instance.job_key = job_key;
        }
    }

    pub(crate) fn set_user_task_key(&mut self, key: i64, user_task_key: Option<i64>) {
        if let Some(instance) = self.instances.get_mut(&key) {
            instance.user_task_key = user_task_key;
        }
    }

    pub(crate) fn set_interrupting_element(
        &mut self,
        key: i64,
        element_id: &str,
    ) -> Result<(), StateViolation> {
        self.get_mut(key)?.interrupting_element_id = Some(element_id.to_owned());
        Ok(())
    }

    /// Point a live instance at a different process definition.
    pub(crate) fn migrate(
        &mut self,
        key: i64,
        record: &ProcessInstanceRecord,
    ) -> Result<(), StateViolation> {
        let instance = self.get_mut(key)?;
        instance.record.process_definition_key = record.process_definition_key;
        instance.record.bpmn_process_id = record.bpmn_process_id.clone();
        instance.record.version = record.version;
        instance.record.element_id = record.element_id.clone();
        Ok(())
    }

    fn get_mut(&mut self, key: i64) -> Result<&mut ElementInstance, StateViolation> {
        self.instances
            .get_mut(&key)
            .ok_or_else(|| StateViolation::not_found(ENTITY, key))
    }
}
