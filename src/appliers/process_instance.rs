use crate::error::StateViolation;
use crate::intent::ValueType;
use crate::state::{
    ElementInstanceState, ElementPhase, EventScopeInstanceState, EventTrigger, MessageState,
    ProcessState, ProcessingState, VariableState,
};
use crate::value::{
    BpmnElementType, ProcessEventRecord, ProcessInstanceCreationRecord,
    ProcessInstanceModificationRecord, ProcessInstanceRecord, RecordValue, TypedValue,
};

/// Element instance lifecycle, plus the creation and modification records
/// that shape a process instance's scopes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProcessInstanceApplier {
    ElementActivating,
    ElementActivated,
    ElementCompleting,
    ElementCompleted,
    ElementTerminating,
    ElementTerminated,
    SequenceFlowTaken,
    ElementMigrated,
    CreationCreated,
    ModificationModified,
}

impl ProcessInstanceApplier {
    pub fn value_type(self) -> ValueType {
        match self {
            Self::CreationCreated => ValueType::ProcessInstanceCreation,
            Self::ModificationModified => ValueType::ProcessInstanceModification,
            _ => ValueType::ProcessInstance,
        }
    }

    pub(crate) fn apply(
        self,
        state: &mut ProcessingState,
        key: i64,
        value: &RecordValue,
    ) -> Result<(), StateViolation> {
        match self {
            Self::ElementActivating => {
                let record = ProcessInstanceRecord::expect_from(value)?;
                element_activating(
                    &state.processes,
                    &mut state.element_instances,
                    &mut state.event_scopes,
                    &mut state.variables,
                    key,
                    record,
                )
            }
            Self::ElementActivated => {
                ProcessInstanceRecord::expect_from(value)?;
                state.element_instances.transition(key, ElementPhase::Activated)
            }
            Self::ElementCompleting => {
                ProcessInstanceRecord::expect_from(value)?;
                state.element_instances.transition(key, ElementPhase::Completing)
            }
            Self::ElementTerminating => {
                ProcessInstanceRecord::expect_from(value)?;
                state.element_instances.transition(key, ElementPhase::Terminating)
            }
            Self::ElementCompleted | Self::ElementTerminated => {
                ProcessInstanceRecord::expect_from(value)?;
                let expected = if self == Self::ElementCompleted {
                    ElementPhase::Completing
                } else {
                    ElementPhase::Terminating
                };
                element_finished(
                    &mut state.element_instances,
                    &mut state.event_scopes,
                    &mut state.variables,
                    &mut state.messages,
                    key,
                    expected,
                )
            }
            Self::SequenceFlowTaken => {
                let record = ProcessInstanceRecord::expect_from(value)?;
                sequence_flow_taken(&state.processes, &mut state.element_instances, key, record)
            }
            Self::ElementMigrated => {
                let record = ProcessInstanceRecord::expect_from(value)?;
                state.element_instances.migrate(key, record)
            }
            Self::CreationCreated => {
                let record = ProcessInstanceCreationRecord::expect_from(value)?;
                creation_created(
                    &state.processes,
                    &mut state.element_instances,
                    &mut state.event_scopes,
                    record,
                )
            }
            Self::ModificationModified => {
                let record = ProcessInstanceModificationRecord::expect_from(value)?;
                modification_modified(
                    &state.processes,
                    &mut state.element_instances,
                    &mut state.event_scopes,
                    record,
                )
            }
        }
    }
}

fn element_activating(
    processes: &ProcessState,
    instances: &mut ElementInstanceState,
    event_scopes: &mut EventScopeInstanceState,
    variables: &mut VariableState,
    key: i64,
    record: &ProcessInstanceRecord,
) -> Result<(), StateViolation> {
    let element_type = record.bpmn_element_type;
    let called_by = record
        .parent_element_instance_key
        .filter(|_| element_type == BpmnElementType::Process);
    if let Some(parent_key) = called_by
        && !instances.contains(parent_key)
    {
        return Err(StateViolation::not_found("calling element instance", parent_key));
    }
    instances.activating(key, record)?;

    if let Some(scope_key) = record.flow_scope_key {
        if element_type.is_joining_gateway() {
            instances.join_sequence_flows(scope_key, &record.element_id)?;
        } else if !element_type.is_entered_without_flow() {
            instances.consume_sequence_flow(scope_key)?;
        }
    }
    if let Some(parent_key) = called_by {
        instances.link_called_child(parent_key, key)?;
    }

    variables.create_scope(key, record.flow_scope_key);
    if element_type.is_event_scope() {
        let (boundaries, interrupting) =
            processes.event_scope_layout(record.process_definition_key, &record.element_id);
        event_scopes.create_scope(key, interrupting, boundaries);
    }
    Ok(())
}

/// Shared tail of ELEMENT_COMPLETED and ELEMENT_TERMINATED.
fn element_finished(
    instances: &mut ElementInstanceState,
    event_scopes: &mut EventScopeInstanceState,
    variables: &mut VariableState,
    messages: &mut MessageState,
    key: i64,
    expected: ElementPhase,
) -> Result<(), StateViolation> {
    let instance = instances.remove(key, expected)?;
    event_scopes.delete_scope(key);
    variables.remove_scope(key);
    if instance.record.bpmn_element_type == BpmnElementType::Process {
        messages.remove_active_process_instance(key);
    }
    Ok(())
}

fn sequence_flow_taken(
    processes: &ProcessState,
    instances: &mut ElementInstanceState,
    key: i64,
    record: &ProcessInstanceRecord,
) -> Result<(), StateViolation> {
    let scope_key = record
        .flow_scope_key
        .ok_or_else(|| StateViolation::not_found("flow scope of sequence flow", key))?;
    let joining_gateway = processes
        .flow_element(record.process_definition_key, &record.element_id)
        .and_then(|flow| flow.target_id.as_deref())
        .and_then(|target| processes.flow_element(record.process_definition_key, target))
        .filter(|target| target.element_type.is_joining_gateway())
        .map(|target| target.id.as_str());
    instances.take_sequence_flow(scope_key, &record.element_id, joining_gateway)
}

/// An instance started inside an interrupting event sub-process leaves the
/// process scope interrupted.
fn creation_created(
    processes: &ProcessState,
    instances: &mut ElementInstanceState,
    event_scopes: &mut EventScopeInstanceState,
    record: &ProcessInstanceCreationRecord,
) -> Result<(), StateViolation> {
    for element_id in &record.start_instructions {
        if let Some(sub_process) = processes
            .enclosing_interrupting_event_sub_process(record.process_definition_key, element_id)
        {
            instances.set_interrupting_element(record.process_instance_key, &sub_process.id)?;
            event_scopes.interrupt(record.process_instance_key);
        }
    }
    Ok(())
}

fn modification_modified(
    processes: &ProcessState,
    instances: &mut ElementInstanceState,
    event_scopes: &mut EventScopeInstanceState,
    record: &ProcessInstanceModificationRecord,
) -> Result<(), StateViolation> {
    let process_definition_key = instances
        .get(record.process_instance_key)
        .map(|instance| instance.record.process_definition_key)
        .ok_or_else(|| StateViolation::not_found("process instance", record.process_instance_key))?;

    let mut interrupted = Vec::new();
    for instruction in &record.activate_instructions {
        let Some(sub_process) = processes
            .enclosing_interrupting_event_sub_process(process_definition_key, &instruction.element_id)
        else {
            continue;
        };
        let scope_key = instruction
            .ancestor_scope_key
            .unwrap_or(record.process_instance_key);
        if !instances.contains(scope_key) {
            return Err(StateViolation::not_found("element instance", scope_key));
        }
        interrupted.push((scope_key, sub_process.id.as_str()));
    }
    for (scope_key, sub_process_id) in interrupted {
        instances.set_interrupting_element(scope_key, sub_process_id)?;
        event_scopes.interrupt(scope_key);
    }
    Ok(())
}

/// Events waiting on an event scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProcessEventApplier {
    Triggering,
    Triggered,
}

impl ProcessEventApplier {
    pub fn value_type(self) -> ValueType {
        ValueType::ProcessEvent
    }

    pub(crate) fn apply(
        self,
        state: &mut ProcessingState,
        key: i64,
        value: &RecordValue,
    ) -> Result<(), StateViolation> {
        let record = ProcessEventRecord::expect_from(value)?;
        let event_scopes = &mut state.event_scopes;
        match self {
            Self::Triggering => {
                let trigger = EventTrigger {
                    event_key: key,
                    element_id: record.target_element_id.clone(),
                    variables: record.variables.clone(),
                    process_instance_key: record.process_instance_key,
                };
                if !event_scopes.trigger_event(record.scope_key, trigger) {
                    tracing::trace!(
                        scope_key = record.scope_key,
                        event_key = key,
                        "scope not accepting, trigger dropped"
                    );
                }
            }
            Self::Triggered => event_scopes.delete_trigger(record.scope_key, key),
        }
        Ok(())
    }
}
