use crate::error::StateViolation;
use crate::intent::ValueType;
use crate::state::ProcessingState;
use crate::value::{RecordValue, TypedValue, VariableRecord};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VariableApplier {
    /// Registered for both CREATED and UPDATED; either way the local value
    /// is replaced.
    SetLocal,
    Migrated,
}

impl VariableApplier {
    pub fn value_type(self) -> ValueType {
        ValueType::Variable
    }

    pub(crate) fn apply(
        self,
        state: &mut ProcessingState,
        _key: i64,
        value: &RecordValue,
    ) -> Result<(), StateViolation> {
        let record = VariableRecord::expect_from(value)?;
        let variables = &mut state.variables;
        match self {
            Self::SetLocal => {
                variables.set_local(record);
                Ok(())
            }
            Self::Migrated => variables.migrate(record),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn set_local_then_update() {
        let mut state = ProcessingState::new();
        let mut record = VariableRecord {
            name: "amount".into(),
            value: json!(10),
            scope_key: 1,
            ..VariableRecord::default()
        };
        VariableApplier::SetLocal
            .apply(&mut state, 7, &record.clone().into())
            .unwrap();
        record.value = json!(12);
        VariableApplier::SetLocal
            .apply(&mut state, 7, &record.into())
            .unwrap();
        assert_eq!(state.variables().get_local(1, "amount").unwrap().value, json!(12));
    }
}
