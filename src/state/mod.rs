//! Domain state partitions and the arena that owns them.
//!
//! Each partition is an independent store keyed by its entity's identity.
//! Reads are public so that tooling can inspect state; mutations are
//! crate-private and reachable only through the appliers in
//! [`crate::appliers`], which borrow exactly the partitions they change.
//!
//! Every map and index is ordered (`BTreeMap`/`BTreeSet`), so two replicas
//! that applied the same records hold structurally equal state and
//! serialize it to identical bytes.

mod banned_instance;
mod decision;
mod deployment;
mod distribution;
mod element_instance;
mod event_scope;
mod form;
mod incident;
mod job;
mod message;
mod message_start_event_subscription;
mod message_subscription;
mod process;
mod process_message_subscription;
mod signal_subscription;
mod timer;
mod user_task;
mod variable;

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

pub use banned_instance::BannedInstanceState;
pub use decision::DecisionState;
pub use deployment::DeploymentState;
pub use distribution::{CommandDistribution, DistributionPhase, DistributionState};
pub use element_instance::{ElementInstance, ElementInstanceState, ElementPhase};
pub use event_scope::{EventScopeInstance, EventScopeInstanceState, EventTrigger};
pub use form::FormState;
pub use incident::IncidentState;
pub use job::{Job, JobPhase, JobState};
pub use message::{MessageState, StoredMessage};
pub use message_start_event_subscription::MessageStartEventSubscriptionState;
pub use message_subscription::{MessageSubscription, MessageSubscriptionState, PendingCorrelation};
pub use process::{DeployedProcess, ProcessPhase, ProcessState};
pub use process_message_subscription::{
    ProcessMessageSubscription, ProcessMessageSubscriptionState, SubscriptionPhase,
};
pub use signal_subscription::SignalSubscriptionState;
pub use timer::{TimerInstance, TimerInstanceState};
pub use user_task::{UserTask, UserTaskPhase, UserTaskState};
pub use variable::{VariableInstance, VariableState};

/// `(tenant id, resource id, version, key)` index used to find the latest
/// or a specific version of a deployed resource.
pub(crate) type VersionIndex = BTreeSet<(String, String, i32, i64)>;

pub(crate) fn latest_in(index: &VersionIndex, tenant_id: &str, id: &str) -> Option<i64> {
    let lower = (tenant_id.to_owned(), id.to_owned(), i32::MIN, i64::MIN);
    let upper = (tenant_id.to_owned(), id.to_owned(), i32::MAX, i64::MAX);
    index
        .range(lower..=upper)
        .next_back()
        .map(|(_, _, _, key)| *key)
}

pub(crate) fn version_in(
    index: &VersionIndex,
    tenant_id: &str,
    id: &str,
    version: i32,
) -> Option<i64> {
    let lower = (tenant_id.to_owned(), id.to_owned(), version, i64::MIN);
    let upper = (tenant_id.to_owned(), id.to_owned(), version, i64::MAX);
    index.range(lower..=upper).next().map(|(_, _, _, key)| *key)
}

/// `(a, b, c, key)` index over three string components, e.g.
/// `(tenant, message name, correlation key, message key)`.
pub(crate) type StringTripleIndex = BTreeSet<(String, String, String, i64)>;

pub(crate) fn keys_in(index: &StringTripleIndex, a: &str, b: &str, c: &str) -> Vec<i64> {
    let lower = (a.to_owned(), b.to_owned(), c.to_owned(), i64::MIN);
    let upper = (a.to_owned(), b.to_owned(), c.to_owned(), i64::MAX);
    index
        .range(lower..=upper)
        .map(|(_, _, _, key)| *key)
        .collect()
}

/// All domain state of one partition.
///
/// Constructed empty and advanced only by dispatching logged events through
/// [`EventAppliers`](crate::EventAppliers). `Clone` produces an independent
/// copy, which is how the partition actor serves read-only queries.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProcessingState {
    pub(crate) processes: ProcessState,
    pub(crate) element_instances: ElementInstanceState,
    pub(crate) event_scopes: EventScopeInstanceState,
    pub(crate) variables: VariableState,
    pub(crate) jobs: JobState,
    pub(crate) timers: TimerInstanceState,
    pub(crate) messages: MessageState,
    pub(crate) message_subscriptions: MessageSubscriptionState,
    pub(crate) process_message_subscriptions: ProcessMessageSubscriptionState,
    pub(crate) message_start_event_subscriptions: MessageStartEventSubscriptionState,
    pub(crate) incidents: IncidentState,
    pub(crate) deployments: DeploymentState,
    pub(crate) decisions: DecisionState,
    pub(crate) forms: FormState,
    pub(crate) user_tasks: UserTaskState,
    pub(crate) signal_subscriptions: SignalSubscriptionState,
    pub(crate) distributions: DistributionState,
    pub(crate) banned_instances: BannedInstanceState,
}

impl ProcessingState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn processes(&self) -> &ProcessState {
        &self.processes
    }

    pub fn element_instances(&self) -> &ElementInstanceState {
        &self.element_instances
    }

    pub fn event_scopes(&self) -> &EventScopeInstanceState {
        &self.event_scopes
    }

    pub fn variables(&self) -> &VariableState {
        &self.variables
    }

    pub fn jobs(&self) -> &JobState {
        &self.jobs
    }

    pub fn timers(&self) -> &TimerInstanceState {
        &self.timers
    }

    pub fn messages(&self) -> &MessageState {
        &self.messages
    }

    pub fn message_subscriptions(&self) -> &MessageSubscriptionState {
        &self.message_subscriptions
    }

    pub fn process_message_subscriptions(&self) -> &ProcessMessageSubscriptionState {
        &self.process_message_subscriptions
    }

    pub fn message_start_event_subscriptions(&self) -> &MessageStartEventSubscriptionState {
        &self.message_start_event_subscriptions
    }

    pub fn incidents(&self) -> &IncidentState {
        &self.incidents
    }

    pub fn deployments(&self) -> &DeploymentState {
        &self.deployments
    }

    pub fn decisions(&self) -> &DecisionState {
        &self.decisions
    }

    pub fn forms(&self) -> &FormState {
        &self.forms
    }

    pub fn user_tasks(&self) -> &UserTaskState {
        &self.user_tasks
    }

    pub fn signal_subscriptions(&self) -> &SignalSubscriptionState {
        &self.signal_subscriptions
    }

    pub fn distributions(&self) -> &DistributionState {
        &self.distributions
    }

    pub fn banned_instances(&self) -> &BannedInstanceState {
        &self.banned_instances
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn latest_in_picks_highest_version_per_id() {
        let mut index = VersionIndex::new();
        index.insert(("".into(), "order".into(), 1, 100));
        index.insert(("".into(), "order".into(), 3, 300));
        index.insert(("".into(), "order".into(), 2, 200));
        index.insert(("".into(), "ordering".into(), 9, 900));
        index.insert(("acme".into(), "order".into(), 7, 700));

        assert_eq!(latest_in(&index, "", "order"), Some(300));
        assert_eq!(latest_in(&index, "acme", "order"), Some(700));
        assert_eq!(latest_in(&index, "", "missing"), None);
        assert_eq!(version_in(&index, "", "order", 2), Some(200));
        assert_eq!(version_in(&index, "", "order", 4), None);
    }

    #[test]
    fn keys_in_matches_all_three_components() {
        let mut index = StringTripleIndex::new();
        index.insert(("".into(), "paid".into(), "o-1".into(), 1));
        index.insert(("".into(), "paid".into(), "o-1".into(), 2));
        index.insert(("".into(), "paid".into(), "o-2".into(), 3));

        assert_eq!(keys_in(&index, "", "paid", "o-1"), vec![1, 2]);
        assert!(keys_in(&index, "", "shipped", "o-1").is_empty());
    }

    #[test]
    fn empty_states_are_equal_and_serialize_identically() {
        let a = ProcessingState::new();
        let b = ProcessingState::default();
        assert_eq!(a, b);
        assert_eq!(
            serde_json::to_vec(&a).expect("serialize"),
            serde_json::to_vec(&b).expect("serialize")
        );
    }
}
