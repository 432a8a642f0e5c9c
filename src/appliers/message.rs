use crate::error::StateViolation;
use crate::intent::ValueType;
use crate::state::{MessageState, ProcessingState};
use crate::value::{MessageRecord, MessageStartEventSubscriptionRecord, RecordValue, TypedValue};

/// Buffered message lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageApplier {
    Published,
    Expired,
}

impl MessageApplier {
    pub fn value_type(self) -> ValueType {
        ValueType::Message
    }

    pub(crate) fn apply(
        self,
        state: &mut ProcessingState,
        key: i64,
        value: &RecordValue,
    ) -> Result<(), StateViolation> {
        let record = MessageRecord::expect_from(value)?;
        let messages = &mut state.messages;
        match self {
            Self::Published => messages.put(key, record),
            Self::Expired => messages.remove(key).map(|_| ()),
        }
    }
}

/// Subscriptions of message start events, held on the message side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageStartEventSubscriptionApplier {
    Created,
    Correlated,
    Deleted,
}

impl MessageStartEventSubscriptionApplier {
    pub fn value_type(self) -> ValueType {
        ValueType::MessageStartEventSubscription
    }

    pub(crate) fn apply(
        self,
        state: &mut ProcessingState,
        _key: i64,
        value: &RecordValue,
    ) -> Result<(), StateViolation> {
        let record = MessageStartEventSubscriptionRecord::expect_from(value)?;
        let subscriptions = &mut state.message_start_event_subscriptions;
        match self {
            Self::Created => subscriptions.put(record),
            Self::Correlated => start_event_correlated(&mut state.messages, record),
            Self::Deleted => subscriptions.remove(record),
        }
    }
}

/// The message started a new instance. Remember the correlation so the
/// message is not used twice for this process, and lock the correlation
/// key while that instance runs.
fn start_event_correlated(
    messages: &mut MessageState,
    record: &MessageStartEventSubscriptionRecord,
) -> Result<(), StateViolation> {
    let message_key = record
        .message_key
        .ok_or_else(|| StateViolation::not_found("correlated message", &record.message_name))?;
    messages.put_correlation(message_key, &record.bpmn_process_id);

    if !record.correlation_key.is_empty()
        && let Some(process_instance_key) = record.process_instance_key
    {
        messages.put_active_process_instance(
            &record.tenant_id,
            &record.bpmn_process_id,
            &record.correlation_key,
            process_instance_key,
        );
    }
    Ok(())
}
