use crate::error::StateViolation;
use crate::intent::ValueType;
use crate::state::ProcessingState;
use crate::value::{RecordValue, TimerRecord, TypedValue};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimerApplier {
    Created,
    Triggered,
    Canceled,
}

impl TimerApplier {
    pub fn value_type(self) -> ValueType {
        ValueType::Timer
    }

    pub(crate) fn apply(
        self,
        state: &mut ProcessingState,
        key: i64,
        value: &RecordValue,
    ) -> Result<(), StateViolation> {
        let record = TimerRecord::expect_from(value)?;
        let timers = &mut state.timers;
        match self {
            Self::Created => timers.create(key, record),
            Self::Triggered | Self::Canceled => timers.remove(key).map(|_| ()),
        }
    }
}
