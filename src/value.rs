//! Typed record payloads carried by logged events.
//!
//! Payloads are treated as opaque typed records: this crate does not own
//! their wire encoding, only their shape. Every payload type implements
//! [`TypedValue`], which lets an applier borrow the concrete record out of
//! a [`RecordValue`] or report a [`StateViolation::ValueMismatch`].

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::StateViolation;
use crate::intent::ValueType;

/// Document of process or message variables, keyed by variable name.
pub type Variables = BTreeMap<String, Value>;

/// BPMN element kinds the partition tracks instances of.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BpmnElementType {
    Process,
    SubProcess,
    EventSubProcess,
    StartEvent,
    IntermediateCatchEvent,
    IntermediateThrowEvent,
    BoundaryEvent,
    EndEvent,
    ServiceTask,
    ReceiveTask,
    UserTask,
    ManualTask,
    #[default]
    Task,
    ScriptTask,
    SendTask,
    BusinessRuleTask,
    CallActivity,
    ExclusiveGateway,
    ParallelGateway,
    InclusiveGateway,
    EventBasedGateway,
    MultiInstanceBody,
    SequenceFlow,
}

impl BpmnElementType {
    /// Whether an instance of this element opens an event scope that
    /// boundary events, catch events or event sub-processes can trigger.
    pub fn is_event_scope(self) -> bool {
        matches!(
            self,
            Self::Process
                | Self::SubProcess
                | Self::EventSubProcess
                | Self::IntermediateCatchEvent
                | Self::ServiceTask
                | Self::ReceiveTask
                | Self::UserTask
                | Self::ScriptTask
                | Self::SendTask
                | Self::BusinessRuleTask
                | Self::CallActivity
                | Self::EventBasedGateway
                | Self::MultiInstanceBody
        )
    }

    /// Gateways that wait for several incoming sequence flows.
    pub fn is_joining_gateway(self) -> bool {
        matches!(self, Self::ParallelGateway | Self::InclusiveGateway)
    }

    /// Whether an element of this kind is entered without a sequence flow.
    pub fn is_entered_without_flow(self) -> bool {
        matches!(
            self,
            Self::Process | Self::StartEvent | Self::BoundaryEvent | Self::EventSubProcess
        )
    }
}

/// One element of a deployed process model, already parsed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlowElement {
    /// Element id, unique within the process.
    pub id: String,
    pub element_type: BpmnElementType,
    /// Id of the enclosing container (process, sub-process, event sub-process).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flow_scope_id: Option<String>,
    /// For boundary events: the activity the event is attached to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attached_to_id: Option<String>,
    /// For sequence flows: the element the flow leads to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_id: Option<String>,
    /// For boundary events and event sub-process start events.
    #[serde(default)]
    pub interrupting: bool,
}

impl FlowElement {
    /// Build an element with no scope, attachment or target.
    pub fn new(id: impl Into<String>, element_type: BpmnElementType) -> Self {
        Self {
            id: id.into(),
            element_type,
            flow_scope_id: None,
            attached_to_id: None,
            target_id: None,
            interrupting: false,
        }
    }

    /// Place the element inside a container.
    pub fn in_scope(mut self, scope_id: impl Into<String>) -> Self {
        self.flow_scope_id = Some(scope_id.into());
        self
    }

    /// Attach a boundary event to an activity.
    pub fn attached_to(mut self, activity_id: impl Into<String>) -> Self {
        self.attached_to_id = Some(activity_id.into());
        self
    }

    /// Point a sequence flow at its target element.
    pub fn targeting(mut self, target_id: impl Into<String>) -> Self {
        self.target_id = Some(target_id.into());
        self
    }

    /// Mark a boundary event or event sub-process start event as interrupting.
    pub fn interrupting(mut self) -> Self {
        self.interrupting = true;
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProcessRecord {
    pub bpmn_process_id: String,
    pub version: i32,
    pub process_definition_key: i64,
    pub resource_name: String,
    pub checksum: String,
    pub deployment_key: i64,
    pub tenant_id: String,
    pub elements: Vec<FlowElement>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProcessInstanceRecord {
    pub bpmn_process_id: String,
    pub version: i32,
    pub process_definition_key: i64,
    pub process_instance_key: i64,
    pub element_id: String,
    pub bpmn_element_type: BpmnElementType,
    pub flow_scope_key: Option<i64>,
    pub parent_process_instance_key: Option<i64>,
    pub parent_element_instance_key: Option<i64>,
    pub tenant_id: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProcessInstanceCreationRecord {
    pub bpmn_process_id: String,
    pub version: i32,
    pub process_definition_key: i64,
    pub process_instance_key: i64,
    /// Element ids the instance was started at instead of the none start event.
    pub start_instructions: Vec<String>,
    pub variables: Variables,
    pub tenant_id: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ActivateInstruction {
    pub element_id: String,
    pub ancestor_scope_key: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProcessInstanceModificationRecord {
    pub process_instance_key: i64,
    pub activate_instructions: Vec<ActivateInstruction>,
    pub terminate_instructions: Vec<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProcessEventRecord {
    /// Element instance key of the event scope, or the process definition
    /// key for start events.
    pub scope_key: i64,
    pub target_element_id: String,
    pub variables: Variables,
    pub process_definition_key: i64,
    pub process_instance_key: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JobRecord {
    pub job_type: String,
    pub worker: String,
    pub retries: i32,
    /// Milliseconds to wait before a failed job becomes activatable again.
    pub retry_backoff: i64,
    /// Absolute time (epoch millis) at which a backed-off job recurs.
    pub recurring_time: Option<i64>,
    /// Absolute activation deadline (epoch millis).
    pub deadline: Option<i64>,
    pub error_message: String,
    pub error_code: String,
    pub custom_headers: BTreeMap<String, String>,
    pub variables: Variables,
    pub element_id: String,
    pub element_instance_key: i64,
    pub process_instance_key: i64,
    pub process_definition_key: i64,
    pub process_definition_version: i32,
    pub bpmn_process_id: String,
    pub tenant_id: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JobBatchRecord {
    pub job_type: String,
    pub worker: String,
    pub timeout: i64,
    pub max_jobs_to_activate: i32,
    pub job_keys: Vec<i64>,
    /// Activated job records, parallel to `job_keys`.
    pub jobs: Vec<JobRecord>,
    pub truncated: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TimerRecord {
    /// `None` for timer start events, which belong to a process definition.
    pub element_instance_key: Option<i64>,
    pub process_instance_key: Option<i64>,
    pub process_definition_key: i64,
    pub due_date: i64,
    pub target_element_id: String,
    pub repetitions: i32,
    pub tenant_id: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MessageRecord {
    pub name: String,
    pub correlation_key: String,
    pub time_to_live: i64,
    /// Absolute expiry (epoch millis).
    pub deadline: i64,
    pub message_id: Option<String>,
    pub variables: Variables,
    pub tenant_id: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MessageSubscriptionRecord {
    pub process_instance_key: i64,
    pub element_instance_key: i64,
    pub bpmn_process_id: String,
    pub message_name: String,
    pub correlation_key: String,
    pub message_key: Option<i64>,
    pub interrupting: bool,
    pub variables: Variables,
    pub tenant_id: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProcessMessageSubscriptionRecord {
    pub subscription_partition_id: u32,
    pub process_instance_key: i64,
    pub element_instance_key: i64,
    pub bpmn_process_id: String,
    pub element_id: String,
    pub message_name: String,
    pub correlation_key: String,
    pub message_key: Option<i64>,
    pub interrupting: bool,
    pub variables: Variables,
    pub tenant_id: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MessageStartEventSubscriptionRecord {
    pub process_definition_key: i64,
    pub bpmn_process_id: String,
    pub start_event_id: String,
    pub message_name: String,
    pub message_key: Option<i64>,
    pub process_instance_key: Option<i64>,
    pub correlation_key: String,
    pub variables: Variables,
    pub tenant_id: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorType {
    #[default]
    Unknown,
    JobNoRetries,
    UnhandledErrorEvent,
    ExtractValueError,
    CalledElementError,
    ConditionError,
    IoMappingError,
    MessageSizeExceeded,
    DecisionEvaluationError,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IncidentRecord {
    pub error_type: ErrorType,
    pub error_message: String,
    pub bpmn_process_id: String,
    pub process_definition_key: i64,
    pub process_instance_key: i64,
    pub element_id: String,
    pub element_instance_key: i64,
    pub job_key: Option<i64>,
    pub variable_scope_key: i64,
    pub tenant_id: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VariableRecord {
    pub name: String,
    pub value: Value,
    pub scope_key: i64,
    pub process_instance_key: i64,
    pub process_definition_key: i64,
    pub bpmn_process_id: String,
    pub tenant_id: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeploymentResource {
    pub resource_name: String,
    pub resource: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeploymentRecord {
    pub resources: Vec<DeploymentResource>,
    pub processes: Vec<ProcessRecord>,
    pub decision_requirements: Vec<DecisionRequirementsRecord>,
    pub decisions: Vec<DecisionRecord>,
    pub forms: Vec<FormRecord>,
    pub tenant_id: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeploymentDistributionRecord {
    pub partition_id: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DecisionRecord {
    pub decision_id: String,
    pub decision_name: String,
    pub version: i32,
    pub decision_key: i64,
    pub decision_requirements_id: String,
    pub decision_requirements_key: i64,
    pub tenant_id: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DecisionRequirementsRecord {
    pub decision_requirements_id: String,
    pub decision_requirements_name: String,
    pub version: i32,
    pub decision_requirements_key: i64,
    pub resource_name: String,
    pub resource: String,
    pub tenant_id: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FormRecord {
    pub form_id: String,
    pub version: i32,
    pub form_key: i64,
    pub resource_name: String,
    pub resource: String,
    pub tenant_id: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserTaskRecord {
    pub assignee: Option<String>,
    pub candidate_groups: Vec<String>,
    pub due_date: Option<String>,
    pub element_id: String,
    pub element_instance_key: i64,
    pub process_instance_key: i64,
    pub process_definition_key: i64,
    pub bpmn_process_id: String,
    pub variables: Variables,
    pub tenant_id: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SignalSubscriptionRecord {
    pub signal_name: String,
    pub process_definition_key: i64,
    pub bpmn_process_id: String,
    pub catch_event_id: String,
    /// Set for intermediate/boundary catch events; `None` for start events.
    pub catch_event_instance_key: Option<i64>,
    pub tenant_id: String,
}

impl SignalSubscriptionRecord {
    /// The key a subscription is stored under within its signal name.
    pub fn subscription_key(&self) -> i64 {
        self.catch_event_instance_key
            .unwrap_or(self.process_definition_key)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandDistributionRecord {
    /// Target partition (for DISTRIBUTING / ACKNOWLEDGED) or origin partition.
    pub partition_id: u32,
    pub value_type: ValueType,
    /// Intent label of the distributed command, e.g. `"CREATE"`.
    pub intent: String,
    pub command_value: Value,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ErrorRecord {
    pub exception_message: String,
    pub stacktrace: String,
    pub error_event_position: u64,
    pub process_instance_key: Option<i64>,
}

/// Borrow a concrete payload out of a [`RecordValue`].
pub trait TypedValue: Sized {
    const VALUE_TYPE: ValueType;

    fn from_value(value: &RecordValue) -> Option<&Self>;

    /// Borrow the payload or report which value type was found instead.
    fn expect_from(value: &RecordValue) -> Result<&Self, StateViolation> {
        Self::from_value(value).ok_or(StateViolation::ValueMismatch {
            expected: Self::VALUE_TYPE,
            actual: value.value_type(),
        })
    }
}

macro_rules! record_values {
    ($($variant:ident($record:ty)),+ $(,)?) => {
        /// The payload of a logged event, one variant per [`ValueType`].
        #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
        #[serde(tag = "value_type", content = "value", rename_all = "SCREAMING_SNAKE_CASE")]
        pub enum RecordValue {
            $($variant($record)),+
        }

        impl RecordValue {
            pub fn value_type(&self) -> ValueType {
                match self {
                    $(Self::$variant(_) => ValueType::$variant),+
                }
            }
        }

        $(
            impl From<$record> for RecordValue {
                fn from(record: $record) -> Self {
                    RecordValue::$variant(record)
                }
            }

            impl TypedValue for $record {
                const VALUE_TYPE: ValueType = ValueType::$variant;

                fn from_value(value: &RecordValue) -> Option<&Self> {
                    match value {
                        RecordValue::$variant(record) => Some(record),
                        _ => None,
                    }
                }
            }
        )+
    };
}

record_values!(
    Process(ProcessRecord),
    ProcessInstance(ProcessInstanceRecord),
    ProcessInstanceCreation(ProcessInstanceCreationRecord),
    ProcessInstanceModification(ProcessInstanceModificationRecord),
    ProcessEvent(ProcessEventRecord),
    Job(JobRecord),
    JobBatch(JobBatchRecord),
    Timer(TimerRecord),
    Message(MessageRecord),
    MessageSubscription(MessageSubscriptionRecord),
    ProcessMessageSubscription(ProcessMessageSubscriptionRecord),
    MessageStartEventSubscription(MessageStartEventSubscriptionRecord),
    Incident(IncidentRecord),
    Variable(VariableRecord),
    Deployment(DeploymentRecord),
    DeploymentDistribution(DeploymentDistributionRecord),
    Decision(DecisionRecord),
    DecisionRequirements(DecisionRequirementsRecord),
    Form(FormRecord),
    UserTask(UserTaskRecord),
    SignalSubscription(SignalSubscriptionRecord),
    CommandDistribution(CommandDistributionRecord),
    Error(ErrorRecord),
);
