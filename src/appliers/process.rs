use crate::error::StateViolation;
use crate::intent::ValueType;
use crate::state::{ProcessState, ProcessingState};
use crate::value::{ProcessRecord, RecordValue, TypedValue};

/// Deployed process definition lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProcessApplier {
    Created,
    Deleting,
    Deleted,
}

impl ProcessApplier {
    pub fn value_type(self) -> ValueType {
        ValueType::Process
    }

    pub(crate) fn apply(
        self,
        state: &mut ProcessingState,
        _key: i64,
        value: &RecordValue,
    ) -> Result<(), StateViolation> {
        let record = ProcessRecord::expect_from(value)?;
        let processes = &mut state.processes;
        match self {
            Self::Created => created(processes, record),
            Self::Deleting => processes.mark_pending_deletion(record.process_definition_key),
            Self::Deleted => processes.delete(record.process_definition_key),
        }
    }
}

fn created(processes: &mut ProcessState, record: &ProcessRecord) -> Result<(), StateViolation> {
    processes.put(record)?;
    tracing::trace!(
        process_definition_key = record.process_definition_key,
        bpmn_process_id = %record.bpmn_process_id,
        version = record.version,
        "process deployed"
    );
    Ok(())
}
