//! Deployed process definitions.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use super::{VersionIndex, latest_in, version_in};
use crate::error::StateViolation;
use crate::value::{BpmnElementType, FlowElement, ProcessRecord};

const ENTITY: &str = "process";

/// Whether a deployed process is still usable for new instances.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProcessPhase {
    #[default]
    Active,
    PendingDeletion,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeployedProcess {
    pub phase: ProcessPhase,
    pub record: ProcessRecord,
}

impl DeployedProcess {
    pub fn element(&self, element_id: &str) -> Option<&FlowElement> {
        self.record.elements.iter().find(|e| e.id == element_id)
    }
}

/// Deployed process definitions, keyed by process definition key.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProcessState {
    processes: BTreeMap<i64, DeployedProcess>,
    versions: VersionIndex,
}

impl ProcessState {
    pub fn get(&self, process_definition_key: i64) -> Option<&DeployedProcess> {
        self.processes.get(&process_definition_key)
    }

    /// Highest deployed version of `bpmn_process_id` for the tenant.
    pub fn latest(&self, tenant_id: &str, bpmn_process_id: &str) -> Option<&DeployedProcess> {
        latest_in(&self.versions, tenant_id, bpmn_process_id).and_then(|key| self.get(key))
    }

    pub fn by_version(
        &self,
        tenant_id: &str,
        bpmn_process_id: &str,
        version: i32,
    ) -> Option<&DeployedProcess> {
        version_in(&self.versions, tenant_id, bpmn_process_id, version)
            .and_then(|key| self.get(key))
    }

    /// Look up one element of a deployed process.
    pub fn flow_element(&self, process_definition_key: i64, element_id: &str) -> Option<&FlowElement> {
        self.get(process_definition_key)
            .and_then(|process| process.element(element_id))
    }

    pub fn len(&self) -> usize {
        self.processes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.processes.is_empty()
    }

    /// Boundary events attached to `element_id`, and the subset of those
    /// plus event sub-process start events inside it that interrupt.
    ///
    /// Returns `(boundary ids, interrupting ids)`.
    pub fn event_scope_layout(
        &self,
        process_definition_key: i64,
        element_id: &str,
    ) -> (BTreeSet<String>, BTreeSet<String>) {
        let mut boundaries = BTreeSet::new();
        let mut interrupting = BTreeSet::new();
        let Some(process) = self.get(process_definition_key) else {
            return (boundaries, interrupting);
        };
        let elements = &process.record.elements;

        for element in elements {
            if element.attached_to_id.as_deref() == Some(element_id) {
                boundaries.insert(element.id.clone());
                if element.interrupting {
                    interrupting.insert(element.id.clone());
                }
            }
        }

        // Start events of event sub-processes directly inside this element.
        let event_sub_processes: BTreeSet<&str> = elements
            .iter()
            .filter(|e| {
                e.element_type == BpmnElementType::EventSubProcess
                    && e.flow_scope_id.as_deref() == Some(element_id)
            })
            .map(|e| e.id.as_str())
            .collect();
        for element in elements {
            if element.element_type == BpmnElementType::StartEvent
                && element.interrupting
                && element
                    .flow_scope_id
                    .as_deref()
                    .is_some_and(|scope| event_sub_processes.contains(scope))
            {
                interrupting.insert(element.id.clone());
            }
        }

        (boundaries, interrupting)
    }

    /// The interrupting event sub-process enclosing `element_id`, if any.
    pub fn enclosing_interrupting_event_sub_process(
        &self,
        process_definition_key: i64,
        element_id: &str,
    ) -> Option<&FlowElement> {
        let process = self.get(process_definition_key)?;
        let mut current = process.element(element_id)?;
        loop {
            if current.element_type == BpmnElementType::EventSubProcess {
                let interrupting_start = process.record.elements.iter().any(|e| {
                    e.element_type == BpmnElementType::StartEvent
                        && e.interrupting
                        && e.flow_scope_id.as_deref() == Some(current.id.as_str())
                });
                if interrupting_start {
                    return Some(current);
                }
            }
            current = process.element(current.flow_scope_id.as_deref()?)?;
        }
    }

    pub(crate) fn put(&mut self, record: &ProcessRecord) -> Result<(), StateViolation> {
        let key = record.process_definition_key;
        if self.processes.contains_key(&key) {
            return Err(StateViolation::already_exists(ENTITY, key));
        }
        self.versions.insert((
            record.tenant_id.clone(),
            record.bpmn_process_id.clone(),
            record.version,
            key,
        ));
        self.processes.insert(
            key,
            DeployedProcess {
                phase: ProcessPhase::Active,
                record: record.clone(),
            },
        );
        Ok(())
    }

    pub(crate) fn mark_pending_deletion(&mut self, key: i64) -> Result<(), StateViolation> {
        let process = self
            .processes
            .get_mut(&key)
            .ok_or_else(|| StateViolation::not_found(ENTITY, key))?;
        if process.phase != ProcessPhase::Active {
            return Err(StateViolation::illegal_transition(
                ENTITY,
                key,
                process.phase,
                ProcessPhase::PendingDeletion,
            ));
        }
        process.phase = ProcessPhase::PendingDeletion;
        Ok(())
    }

    pub(crate) fn delete(&mut self, key: i64) -> Result<(), StateViolation> {
        let process = self
            .processes
            .remove(&key)
            .ok_or_else(|| StateViolation::not_found(ENTITY, key))?;
        self.versions.remove(&(
            process.record.tenant_id,
            process.record.bpmn_process_id,
            process.record.version,
            key,
        ));
        Ok(())
    }
}
