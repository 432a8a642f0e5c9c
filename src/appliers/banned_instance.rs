use crate::error::StateViolation;
use crate::intent::ValueType;
use crate::state::ProcessingState;
use crate::value::{ErrorRecord, RecordValue, TypedValue};

/// ERROR events record a processing failure; the affected process instance
/// is banned so no further command for it is processed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorApplier {
    Created,
}

impl ErrorApplier {
    pub fn value_type(self) -> ValueType {
        ValueType::Error
    }

    pub(crate) fn apply(
        self,
        state: &mut ProcessingState,
        _key: i64,
        value: &RecordValue,
    ) -> Result<(), StateViolation> {
        let record = ErrorRecord::expect_from(value)?;
        match self {
            Self::Created => {
                if let Some(process_instance_key) = record.process_instance_key {
                    tracing::debug!(
                        process_instance_key,
                        error = %record.exception_message,
                        "banning process instance"
                    );
                    state.banned_instances.ban(process_instance_key);
                }
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_without_instance_bans_nothing() {
        let mut state = ProcessingState::new();
        ErrorApplier::Created
            .apply(&mut state, 1, &ErrorRecord::default().into())
            .unwrap();
        assert!(state.banned_instances().is_empty());
    }

    #[test]
    fn banning_is_idempotent() {
        let mut state = ProcessingState::new();
        let error = RecordValue::from(ErrorRecord {
            exception_message: "boom".into(),
            process_instance_key: Some(42),
            ..ErrorRecord::default()
        });
        ErrorApplier::Created.apply(&mut state, 1, &error).unwrap();
        ErrorApplier::Created.apply(&mut state, 2, &error).unwrap();
        assert!(state.banned_instances().is_banned(42));
        assert_eq!(state.banned_instances().iter().collect::<Vec<_>>(), vec![42]);
    }
}
