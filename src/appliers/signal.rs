use crate::error::StateViolation;
use crate::intent::ValueType;
use crate::state::ProcessingState;
use crate::value::{RecordValue, SignalSubscriptionRecord, TypedValue};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SignalSubscriptionApplier {
    Created,
    Deleted,
}

impl SignalSubscriptionApplier {
    pub fn value_type(self) -> ValueType {
        ValueType::SignalSubscription
    }

    pub(crate) fn apply(
        self,
        state: &mut ProcessingState,
        _key: i64,
        value: &RecordValue,
    ) -> Result<(), StateViolation> {
        let record = SignalSubscriptionRecord::expect_from(value)?;
        match self {
            Self::Created => state.signal_subscriptions.put(record),
            Self::Deleted => state.signal_subscriptions.remove(record),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn start_event_and_catch_event_subscriptions_coexist() {
        let mut state = ProcessingState::new();
        let start = RecordValue::from(SignalSubscriptionRecord {
            signal_name: "alarm".into(),
            process_definition_key: 100,
            catch_event_id: "start".into(),
            ..SignalSubscriptionRecord::default()
        });
        let catch = RecordValue::from(SignalSubscriptionRecord {
            signal_name: "alarm".into(),
            process_definition_key: 100,
            catch_event_id: "wait".into(),
            catch_event_instance_key: Some(12),
            ..SignalSubscriptionRecord::default()
        });
        SignalSubscriptionApplier::Created.apply(&mut state, 1, &start).unwrap();
        SignalSubscriptionApplier::Created.apply(&mut state, 2, &catch).unwrap();
        assert_eq!(state.signal_subscriptions().for_signal("alarm").count(), 2);

        SignalSubscriptionApplier::Deleted.apply(&mut state, 2, &catch).unwrap();
        assert!(state.signal_subscriptions().exists("alarm", 100));
        assert!(!state.signal_subscriptions().exists("alarm", 12));
    }
}
