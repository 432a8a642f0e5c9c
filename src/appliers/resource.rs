use crate::error::StateViolation;
use crate::intent::ValueType;
use crate::state::ProcessingState;
use crate::value::{
    DecisionRecord, DecisionRequirementsRecord, FormRecord, RecordValue, TypedValue,
};

/// Decisions and the decision requirements graphs they belong to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DecisionApplier {
    DecisionCreated,
    DecisionDeleted,
    RequirementsCreated,
    RequirementsDeleted,
}

impl DecisionApplier {
    pub fn value_type(self) -> ValueType {
        match self {
            Self::DecisionCreated | Self::DecisionDeleted => ValueType::Decision,
            Self::RequirementsCreated | Self::RequirementsDeleted => {
                ValueType::DecisionRequirements
            }
        }
    }

    pub(crate) fn apply(
        self,
        state: &mut ProcessingState,
        _key: i64,
        value: &RecordValue,
    ) -> Result<(), StateViolation> {
        let decisions = &mut state.decisions;
        match self {
            Self::DecisionCreated => decisions.put_decision(DecisionRecord::expect_from(value)?),
            Self::DecisionDeleted => {
                decisions.delete_decision(DecisionRecord::expect_from(value)?.decision_key)
            }
            Self::RequirementsCreated => {
                decisions.put_requirements(DecisionRequirementsRecord::expect_from(value)?)
            }
            Self::RequirementsDeleted => decisions.delete_requirements(
                DecisionRequirementsRecord::expect_from(value)?.decision_requirements_key,
            ),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FormApplier {
    Created,
    Deleted,
}

impl FormApplier {
    pub fn value_type(self) -> ValueType {
        ValueType::Form
    }

    pub(crate) fn apply(
        self,
        state: &mut ProcessingState,
        _key: i64,
        value: &RecordValue,
    ) -> Result<(), StateViolation> {
        let record = FormRecord::expect_from(value)?;
        match self {
            Self::Created => state.forms.put(record),
            Self::Deleted => state.forms.delete(record.form_key),
        }
    }
}
