//! Value types and event intents.
//!
//! An [`Intent`] names a domain and an action (`job/CREATED`). The set is
//! closed: every event kind the partition knows how to apply is a variant of
//! one of the per-domain enums below, and [`Intent::all`] enumerates them in
//! a fixed order so startup validation can check the registry for gaps.

use std::fmt;

use serde::{Deserialize, Serialize};

/// The family of record a logged event carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ValueType {
    Process,
    ProcessInstance,
    ProcessInstanceCreation,
    ProcessInstanceModification,
    ProcessEvent,
    Job,
    JobBatch,
    Timer,
    Message,
    MessageSubscription,
    ProcessMessageSubscription,
    MessageStartEventSubscription,
    Incident,
    Variable,
    Deployment,
    DeploymentDistribution,
    Decision,
    DecisionRequirements,
    Form,
    UserTask,
    SignalSubscription,
    CommandDistribution,
    Error,
}

impl ValueType {
    /// Lower-case label used in diagnostics.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Process => "process",
            Self::ProcessInstance => "process_instance",
            Self::ProcessInstanceCreation => "process_instance_creation",
            Self::ProcessInstanceModification => "process_instance_modification",
            Self::ProcessEvent => "process_event",
            Self::Job => "job",
            Self::JobBatch => "job_batch",
            Self::Timer => "timer",
            Self::Message => "message",
            Self::MessageSubscription => "message_subscription",
            Self::ProcessMessageSubscription => "process_message_subscription",
            Self::MessageStartEventSubscription => "message_start_event_subscription",
            Self::Incident => "incident",
            Self::Variable => "variable",
            Self::Deployment => "deployment",
            Self::DeploymentDistribution => "deployment_distribution",
            Self::Decision => "decision",
            Self::DecisionRequirements => "decision_requirements",
            Self::Form => "form",
            Self::UserTask => "user_task",
            Self::SignalSubscription => "signal_subscription",
            Self::CommandDistribution => "command_distribution",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Declares a per-domain intent enum together with its `ALL` table, its
/// upper-case label, and the conversion into [`Intent`].
macro_rules! intents {
    ($(#[$meta:meta])* $name:ident => $value_type:ident { $($variant:ident => $label:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(rename_all = "SCREAMING_SNAKE_CASE")]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            /// Every intent of this domain, in declaration order.
            pub const ALL: &'static [Self] = &[$(Self::$variant),+];

            /// Upper-case action label (e.g. `"CREATED"`).
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $label),+
                }
            }
        }

        impl From<$name> for Intent {
            fn from(intent: $name) -> Self {
                Intent::$value_type(intent)
            }
        }
    };
}

intents!(ProcessIntent => Process {
    Created => "CREATED",
    Deleting => "DELETING",
    Deleted => "DELETED",
});

intents!(ProcessInstanceIntent => ProcessInstance {
    ElementActivating => "ELEMENT_ACTIVATING",
    ElementActivated => "ELEMENT_ACTIVATED",
    ElementCompleting => "ELEMENT_COMPLETING",
    ElementCompleted => "ELEMENT_COMPLETED",
    ElementTerminating => "ELEMENT_TERMINATING",
    ElementTerminated => "ELEMENT_TERMINATED",
    SequenceFlowTaken => "SEQUENCE_FLOW_TAKEN",
    ElementMigrated => "ELEMENT_MIGRATED",
});

intents!(ProcessInstanceCreationIntent => ProcessInstanceCreation {
    Created => "CREATED",
});

intents!(ProcessInstanceModificationIntent => ProcessInstanceModification {
    Modified => "MODIFIED",
});

intents!(ProcessEventIntent => ProcessEvent {
    Triggering => "TRIGGERING",
    Triggered => "TRIGGERED",
});

intents!(JobIntent => Job {
    Created => "CREATED",
    Completed => "COMPLETED",
    TimedOut => "TIMED_OUT",
    Failed => "FAILED",
    Yielded => "YIELDED",
    RetriesUpdated => "RETRIES_UPDATED",
    Canceled => "CANCELED",
    ErrorThrown => "ERROR_THROWN",
    RecurredAfterBackoff => "RECURRED_AFTER_BACKOFF",
    TimeoutUpdated => "TIMEOUT_UPDATED",
    Migrated => "MIGRATED",
});

intents!(JobBatchIntent => JobBatch {
    Activated => "ACTIVATED",
});

intents!(TimerIntent => Timer {
    Created => "CREATED",
    Triggered => "TRIGGERED",
    Canceled => "CANCELED",
});

intents!(MessageIntent => Message {
    Published => "PUBLISHED",
    Expired => "EXPIRED",
});

intents!(MessageSubscriptionIntent => MessageSubscription {
    Created => "CREATED",
    Correlating => "CORRELATING",
    Correlated => "CORRELATED",
    Rejected => "REJECTED",
    Deleted => "DELETED",
});

intents!(ProcessMessageSubscriptionIntent => ProcessMessageSubscription {
    Creating => "CREATING",
    Created => "CREATED",
    Correlated => "CORRELATED",
    Deleting => "DELETING",
    Deleted => "DELETED",
});

intents!(MessageStartEventSubscriptionIntent => MessageStartEventSubscription {
    Created => "CREATED",
    Correlated => "CORRELATED",
    Deleted => "DELETED",
});

intents!(IncidentIntent => Incident {
    Created => "CREATED",
    Resolved => "RESOLVED",
});

intents!(VariableIntent => Variable {
    Created => "CREATED",
    Updated => "UPDATED",
    Migrated => "MIGRATED",
});

intents!(DeploymentIntent => Deployment {
    Created => "CREATED",
    Distributed => "DISTRIBUTED",
    FullyDistributed => "FULLY_DISTRIBUTED",
});

intents!(DeploymentDistributionIntent => DeploymentDistribution {
    Distributing => "DISTRIBUTING",
    Completed => "COMPLETED",
});

intents!(DecisionIntent => Decision {
    Created => "CREATED",
    Deleted => "DELETED",
});

intents!(DecisionRequirementsIntent => DecisionRequirements {
    Created => "CREATED",
    Deleted => "DELETED",
});

intents!(FormIntent => Form {
    Created => "CREATED",
    Deleted => "DELETED",
});

intents!(UserTaskIntent => UserTask {
    Creating => "CREATING",
    Created => "CREATED",
    Canceling => "CANCELING",
    Canceled => "CANCELED",
    Completing => "COMPLETING",
    Completed => "COMPLETED",
});

intents!(SignalSubscriptionIntent => SignalSubscription {
    Created => "CREATED",
    Deleted => "DELETED",
});

intents!(
    /// Lifecycle of a command fanned out to other partitions.
    CommandDistributionIntent => CommandDistribution {
        Started => "STARTED",
        Distributing => "DISTRIBUTING",
        Acknowledged => "ACKNOWLEDGED",
        Finished => "FINISHED",
    }
);

intents!(ErrorIntent => Error {
    Created => "CREATED",
});

/// Discriminator of a logged event: which domain it touches and what happened.
///
/// `Copy`, `Eq` and `Hash`, so it serves directly as a registry key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(tag = "value_type", content = "intent", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Intent {
    Process(ProcessIntent),
    ProcessInstance(ProcessInstanceIntent),
    ProcessInstanceCreation(ProcessInstanceCreationIntent),
    ProcessInstanceModification(ProcessInstanceModificationIntent),
    ProcessEvent(ProcessEventIntent),
    Job(JobIntent),
    JobBatch(JobBatchIntent),
    Timer(TimerIntent),
    Message(MessageIntent),
    MessageSubscription(MessageSubscriptionIntent),
    ProcessMessageSubscription(ProcessMessageSubscriptionIntent),
    MessageStartEventSubscription(MessageStartEventSubscriptionIntent),
    Incident(IncidentIntent),
    Variable(VariableIntent),
    Deployment(DeploymentIntent),
    DeploymentDistribution(DeploymentDistributionIntent),
    Decision(DecisionIntent),
    DecisionRequirements(DecisionRequirementsIntent),
    Form(FormIntent),
    UserTask(UserTaskIntent),
    SignalSubscription(SignalSubscriptionIntent),
    CommandDistribution(CommandDistributionIntent),
    Error(ErrorIntent),
}

impl Intent {
    /// The value type every event of this intent carries.
    pub fn value_type(&self) -> ValueType {
        match self {
            Self::Process(_) => ValueType::Process,
            Self::ProcessInstance(_) => ValueType::ProcessInstance,
            Self::ProcessInstanceCreation(_) => ValueType::ProcessInstanceCreation,
            Self::ProcessInstanceModification(_) => ValueType::ProcessInstanceModification,
            Self::ProcessEvent(_) => ValueType::ProcessEvent,
            Self::Job(_) => ValueType::Job,
            Self::JobBatch(_) => ValueType::JobBatch,
            Self::Timer(_) => ValueType::Timer,
            Self::Message(_) => ValueType::Message,
            Self::MessageSubscription(_) => ValueType::MessageSubscription,
            Self::ProcessMessageSubscription(_) => ValueType::ProcessMessageSubscription,
            Self::MessageStartEventSubscription(_) => ValueType::MessageStartEventSubscription,
            Self::Incident(_) => ValueType::Incident,
            Self::Variable(_) => ValueType::Variable,
            Self::Deployment(_) => ValueType::Deployment,
            Self::DeploymentDistribution(_) => ValueType::DeploymentDistribution,
            Self::Decision(_) => ValueType::Decision,
            Self::DecisionRequirements(_) => ValueType::DecisionRequirements,
            Self::Form(_) => ValueType::Form,
            Self::UserTask(_) => ValueType::UserTask,
            Self::SignalSubscription(_) => ValueType::SignalSubscription,
            Self::CommandDistribution(_) => ValueType::CommandDistribution,
            Self::Error(_) => ValueType::Error,
        }
    }

    /// Upper-case action label without the domain prefix.
    pub fn action(&self) -> &'static str {
        match self {
            Self::Process(i) => i.as_str(),
            Self::ProcessInstance(i) => i.as_str(),
            Self::ProcessInstanceCreation(i) => i.as_str(),
            Self::ProcessInstanceModification(i) => i.as_str(),
            Self::ProcessEvent(i) => i.as_str(),
            Self::Job(i) => i.as_str(),
            Self::JobBatch(i) => i.as_str(),
            Self::Timer(i) => i.as_str(),
            Self::Message(i) => i.as_str(),
            Self::MessageSubscription(i) => i.as_str(),
            Self::ProcessMessageSubscription(i) => i.as_str(),
            Self::MessageStartEventSubscription(i) => i.as_str(),
            Self::Incident(i) => i.as_str(),
            Self::Variable(i) => i.as_str(),
            Self::Deployment(i) => i.as_str(),
            Self::DeploymentDistribution(i) => i.as_str(),
            Self::Decision(i) => i.as_str(),
            Self::DecisionRequirements(i) => i.as_str(),
            Self::Form(i) => i.as_str(),
            Self::UserTask(i) => i.as_str(),
            Self::SignalSubscription(i) => i.as_str(),
            Self::CommandDistribution(i) => i.as_str(),
            Self::Error(i) => i.as_str(),
        }
    }

    /// Every known event intent, grouped by domain in a fixed order.
    pub fn all() -> Vec<Intent> {
        let mut all = Vec::new();
        all.extend(ProcessIntent::ALL.iter().copied().map(Intent::from));
        all.extend(ProcessInstanceIntent::ALL.iter().copied().map(Intent::from));
        all.extend(ProcessInstanceCreationIntent::ALL.iter().copied().map(Intent::from));
        all.extend(ProcessInstanceModificationIntent::ALL.iter().copied().map(Intent::from));
        all.extend(ProcessEventIntent::ALL.iter().copied().map(Intent::from));
        all.extend(JobIntent::ALL.iter().copied().map(Intent::from));
        all.extend(JobBatchIntent::ALL.iter().copied().map(Intent::from));
        all.extend(TimerIntent::ALL.iter().copied().map(Intent::from));
        all.extend(MessageIntent::ALL.iter().copied().map(Intent::from));
        all.extend(MessageSubscriptionIntent::ALL.iter().copied().map(Intent::from));
        all.extend(ProcessMessageSubscriptionIntent::ALL.iter().copied().map(Intent::from));
        all.extend(MessageStartEventSubscriptionIntent::ALL.iter().copied().map(Intent::from));
        all.extend(IncidentIntent::ALL.iter().copied().map(Intent::from));
        all.extend(VariableIntent::ALL.iter().copied().map(Intent::from));
        all.extend(DeploymentIntent::ALL.iter().copied().map(Intent::from));
        all.extend(DeploymentDistributionIntent::ALL.iter().copied().map(Intent::from));
        all.extend(DecisionIntent::ALL.iter().copied().map(Intent::from));
        all.extend(DecisionRequirementsIntent::ALL.iter().copied().map(Intent::from));
        all.extend(FormIntent::ALL.iter().copied().map(Intent::from));
        all.extend(UserTaskIntent::ALL.iter().copied().map(Intent::from));
        all.extend(SignalSubscriptionIntent::ALL.iter().copied().map(Intent::from));
        all.extend(CommandDistributionIntent::ALL.iter().copied().map(Intent::from));
        all.extend(ErrorIntent::ALL.iter().copied().map(Intent::from));
        all
    }
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.value_type(), self.action())
    }
}
