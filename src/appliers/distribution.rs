use crate::error::StateViolation;
use crate::intent::ValueType;
use crate::state::ProcessingState;
use crate::value::{CommandDistributionRecord, RecordValue, TypedValue};

/// Drives a command through `STARTED -> DISTRIBUTING -> ACKNOWLEDGED* -> FINISHED`.
///
/// DISTRIBUTING and ACKNOWLEDGED carry the target partition in
/// `partition_id`; FINISHED is terminal and drops the record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DistributionApplier {
    Started,
    Distributing,
    Acknowledged,
    Finished,
}

impl DistributionApplier {
    pub fn value_type(self) -> ValueType {
        ValueType::CommandDistribution
    }

    pub(crate) fn apply(
        self,
        state: &mut ProcessingState,
        key: i64,
        value: &RecordValue,
    ) -> Result<(), StateViolation> {
        let record = CommandDistributionRecord::expect_from(value)?;
        let distributions = &mut state.distributions;
        match self {
            Self::Started => distributions.start(key, record),
            Self::Distributing => distributions.distributing(key, record.partition_id),
            Self::Acknowledged => distributions.acknowledged(key, record.partition_id),
            Self::Finished => distributions.finish(key).map(|_| ()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::DistributionPhase;

    fn record(partition_id: u32) -> RecordValue {
        CommandDistributionRecord {
            partition_id,
            value_type: ValueType::Deployment,
            intent: "CREATE".into(),
            command_value: serde_json::json!({ "resources": [] }),
        }
        .into()
    }

    #[test]
    fn acknowledged_before_distributing_is_a_violation() {
        let mut state = ProcessingState::new();
        DistributionApplier::Started.apply(&mut state, 7, &record(1)).unwrap();
        assert!(matches!(
            DistributionApplier::Acknowledged.apply(&mut state, 7, &record(2)),
            Err(StateViolation::IllegalTransition { .. })
        ));
        assert_eq!(
            state.distributions().get(7).unwrap().phase,
            DistributionPhase::Started
        );
    }

    #[test]
    fn finished_is_terminal() {
        let mut state = ProcessingState::new();
        DistributionApplier::Started.apply(&mut state, 7, &record(1)).unwrap();
        DistributionApplier::Distributing.apply(&mut state, 7, &record(2)).unwrap();
        DistributionApplier::Acknowledged.apply(&mut state, 7, &record(2)).unwrap();
        DistributionApplier::Finished.apply(&mut state, 7, &record(1)).unwrap();
        assert!(state.distributions().get(7).is_none());
        assert!(DistributionApplier::Acknowledged.apply(&mut state, 7, &record(2)).is_err());
    }
}
