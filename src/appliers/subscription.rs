//! Both halves of a message correlation.
//!
//! The message side (`MessageSubscription`) and the process side
//! (`ProcessMessageSubscription`) move through matching phases. A
//! correlation is first recorded as pending (CORRELATING); it becomes final
//! on CORRELATED or is rolled back on REJECTED, in which case nothing of
//! the attempt remains in message state.

use crate::error::StateViolation;
use crate::intent::ValueType;
use crate::state::{MessageState, MessageSubscriptionState, ProcessingState};
use crate::value::{
    MessageSubscriptionRecord, ProcessMessageSubscriptionRecord, RecordValue, TypedValue,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageSubscriptionApplier {
    Created,
    Correlating,
    Correlated,
    Rejected,
    Deleted,
}

impl MessageSubscriptionApplier {
    pub fn value_type(self) -> ValueType {
        ValueType::MessageSubscription
    }

    pub(crate) fn apply(
        self,
        state: &mut ProcessingState,
        _key: i64,
        value: &RecordValue,
    ) -> Result<(), StateViolation> {
        let record = MessageSubscriptionRecord::expect_from(value)?;
        let subscriptions = &mut state.message_subscriptions;
        match self {
            Self::Created => subscriptions.put(record),
            Self::Correlating => correlating(subscriptions, &mut state.messages, record),
            Self::Correlated => {
                if record.interrupting {
                    subscriptions.remove(record).map(|_| ())
                } else {
                    subscriptions.reset_correlation(record)
                }
            }
            Self::Rejected => rejected(subscriptions, &mut state.messages, record),
            Self::Deleted => subscriptions.remove(record).map(|_| ()),
        }
    }
}

fn correlating(
    subscriptions: &mut MessageSubscriptionState,
    messages: &mut MessageState,
    record: &MessageSubscriptionRecord,
) -> Result<(), StateViolation> {
    let message_key = correlated_message(record)?;
    subscriptions.start_correlating(record)?;
    messages.put_correlation(message_key, &record.bpmn_process_id);
    Ok(())
}

fn rejected(
    subscriptions: &mut MessageSubscriptionState,
    messages: &mut MessageState,
    record: &MessageSubscriptionRecord,
) -> Result<(), StateViolation> {
    let message_key = correlated_message(record)?;
    subscriptions.reset_correlation(record)?;
    messages.remove_correlation(message_key, &record.bpmn_process_id);
    Ok(())
}

fn correlated_message(record: &MessageSubscriptionRecord) -> Result<i64, StateViolation> {
    record.message_key.ok_or_else(|| {
        StateViolation::not_found(
            "correlated message",
            format!("{}/{}", record.element_instance_key, record.message_name),
        )
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProcessMessageSubscriptionApplier {
    Creating,
    Created,
    Correlated,
    Deleting,
    Deleted,
}

impl ProcessMessageSubscriptionApplier {
    pub fn value_type(self) -> ValueType {
        ValueType::ProcessMessageSubscription
    }

    pub(crate) fn apply(
        self,
        state: &mut ProcessingState,
        _key: i64,
        value: &RecordValue,
    ) -> Result<(), StateViolation> {
        let record = ProcessMessageSubscriptionRecord::expect_from(value)?;
        let subscriptions = &mut state.process_message_subscriptions;
        match self {
            Self::Creating => subscriptions.put_opening(record),
            Self::Created => subscriptions.opened(record),
            Self::Correlated => {
                if record.interrupting {
                    subscriptions.remove(record).map(|_| ())
                } else {
                    subscriptions.correlated(record)
                }
            }
            Self::Deleting => subscriptions.closing(record),
            Self::Deleted => subscriptions.remove(record).map(|_| ()),
        }
    }
}
