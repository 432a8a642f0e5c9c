//! End-to-end replay of a partition log through the public API.

use std::sync::Arc;

use eventfold_partition::intent::{
    CommandDistributionIntent, IncidentIntent, Intent, JobBatchIntent, JobIntent, MessageIntent,
    MessageSubscriptionIntent, ProcessInstanceIntent, ProcessIntent,
    ProcessMessageSubscriptionIntent, TimerIntent, ValueType, VariableIntent,
};
use eventfold_partition::value::{
    BpmnElementType, CommandDistributionRecord, FlowElement, IncidentRecord, JobBatchRecord, JobRecord,
    MessageRecord, MessageSubscriptionRecord, ProcessInstanceRecord, ProcessMessageSubscriptionRecord,
    ProcessRecord, RecordValue, TimerRecord, VariableRecord,
};
use eventfold_partition::{
    Applier, Dispatch, EventAppliers, LoggedEvent, PartitionConfig, PartitionError,
    ProcessingState, RegistryError, RegistryIssue, Resolution, replay, replay_into,
    spawn_partition,
};

const PROCESS_KEY: i64 = 100;
const INSTANCE_KEY: i64 = 1;
const TASK_KEY: i64 = 4;
const JOB_KEY: i64 = 5;
const MESSAGE_KEY: i64 = 8;

fn process() -> ProcessRecord {
    ProcessRecord {
        bpmn_process_id: "order".into(),
        version: 1,
        process_definition_key: PROCESS_KEY,
        elements: vec![
            FlowElement::new("order", BpmnElementType::Process),
            FlowElement::new("start", BpmnElementType::StartEvent).in_scope("order"),
            FlowElement::new("to-pay", BpmnElementType::SequenceFlow)
                .in_scope("order")
                .targeting("pay"),
            FlowElement::new("pay", BpmnElementType::ServiceTask).in_scope("order"),
        ],
        ..ProcessRecord::default()
    }
}

fn element(element_id: &str, element_type: BpmnElementType, scope: Option<i64>) -> ProcessInstanceRecord {
    ProcessInstanceRecord {
        bpmn_process_id: "order".into(),
        version: 1,
        process_definition_key: PROCESS_KEY,
        process_instance_key: INSTANCE_KEY,
        element_id: element_id.into(),
        bpmn_element_type: element_type,
        flow_scope_key: scope,
        ..ProcessInstanceRecord::default()
    }
}

fn job() -> JobRecord {
    JobRecord {
        job_type: "payment".into(),
        retries: 3,
        element_id: "pay".into(),
        element_instance_key: TASK_KEY,
        process_instance_key: INSTANCE_KEY,
        process_definition_key: PROCESS_KEY,
        bpmn_process_id: "order".into(),
        ..JobRecord::default()
    }
}

fn message() -> MessageRecord {
    MessageRecord {
        name: "paid".into(),
        correlation_key: "o-1".into(),
        time_to_live: 60_000,
        deadline: 60_000,
        ..MessageRecord::default()
    }
}

fn message_subscription(message_key: Option<i64>) -> MessageSubscriptionRecord {
    MessageSubscriptionRecord {
        process_instance_key: INSTANCE_KEY,
        element_instance_key: TASK_KEY,
        bpmn_process_id: "order".into(),
        message_name: "paid".into(),
        correlation_key: "o-1".into(),
        message_key,
        interrupting: true,
        ..MessageSubscriptionRecord::default()
    }
}

fn process_message_subscription() -> ProcessMessageSubscriptionRecord {
    ProcessMessageSubscriptionRecord {
        subscription_partition_id: 1,
        process_instance_key: INSTANCE_KEY,
        element_instance_key: TASK_KEY,
        bpmn_process_id: "order".into(),
        element_id: "pay".into(),
        message_name: "paid".into(),
        correlation_key: "o-1".into(),
        interrupting: true,
        ..ProcessMessageSubscriptionRecord::default()
    }
}

/// A process instance that waits on a job and a message, has one message
/// correlation rejected, completes through the job, and ends.
fn order_log() -> Vec<LoggedEvent> {
    use ProcessInstanceIntent::*;

    let root = element("order", BpmnElementType::Process, None);
    let start = element("start", BpmnElementType::StartEvent, Some(INSTANCE_KEY));
    let flow = element("to-pay", BpmnElementType::SequenceFlow, Some(INSTANCE_KEY));
    let task = element("pay", BpmnElementType::ServiceTask, Some(INSTANCE_KEY));

    let activated_job = JobRecord {
        worker: "billing".into(),
        deadline: Some(30_000),
        ..job()
    };

    let events = vec![
        LoggedEvent::new(PROCESS_KEY, ProcessIntent::Created, process()),
        LoggedEvent::new(INSTANCE_KEY, ElementActivating, root.clone()),
        LoggedEvent::new(INSTANCE_KEY, ElementActivated, root.clone()),
        LoggedEvent::new(
            50,
            VariableIntent::Created,
            VariableRecord {
                name: "amount".into(),
                value: serde_json::json!(42),
                scope_key: INSTANCE_KEY,
                process_instance_key: INSTANCE_KEY,
                process_definition_key: PROCESS_KEY,
                bpmn_process_id: "order".into(),
                ..VariableRecord::default()
            },
        ),
        LoggedEvent::new(2, ElementActivating, start.clone()),
        LoggedEvent::new(2, ElementActivated, start.clone()),
        LoggedEvent::new(2, ElementCompleting, start.clone()),
        LoggedEvent::new(2, ElementCompleted, start),
        LoggedEvent::new(3, SequenceFlowTaken, flow),
        LoggedEvent::new(TASK_KEY, ElementActivating, task.clone()),
        LoggedEvent::new(TASK_KEY, ElementActivated, task.clone()),
        LoggedEvent::new(JOB_KEY, JobIntent::Created, job()),
        LoggedEvent::new(
            6,
            ProcessMessageSubscriptionIntent::Creating,
            process_message_subscription(),
        ),
        LoggedEvent::new(
            6,
            ProcessMessageSubscriptionIntent::Created,
            process_message_subscription(),
        ),
        LoggedEvent::new(7, MessageSubscriptionIntent::Created, message_subscription(None)),
        LoggedEvent::new(MESSAGE_KEY, MessageIntent::Published, message()),
        LoggedEvent::new(
            7,
            MessageSubscriptionIntent::Correlating,
            message_subscription(Some(MESSAGE_KEY)),
        ),
        LoggedEvent::new(
            7,
            MessageSubscriptionIntent::Rejected,
            message_subscription(Some(MESSAGE_KEY)),
        ),
        LoggedEvent::new(
            9,
            JobBatchIntent::Activated,
            JobBatchRecord {
                job_type: "payment".into(),
                worker: "billing".into(),
                timeout: 30_000,
                max_jobs_to_activate: 10,
                job_keys: vec![JOB_KEY],
                jobs: vec![activated_job.clone()],
                truncated: false,
            },
        ),
        LoggedEvent::new(JOB_KEY, JobIntent::Completed, activated_job),
        LoggedEvent::new(7, MessageSubscriptionIntent::Deleted, message_subscription(None)),
        LoggedEvent::new(
            6,
            ProcessMessageSubscriptionIntent::Deleting,
            process_message_subscription(),
        ),
        LoggedEvent::new(
            6,
            ProcessMessageSubscriptionIntent::Deleted,
            process_message_subscription(),
        ),
        LoggedEvent::new(TASK_KEY, ElementCompleting, task.clone()),
        LoggedEvent::new(TASK_KEY, ElementCompleted, task),
        LoggedEvent::new(INSTANCE_KEY, ElementCompleting, root.clone()),
        LoggedEvent::new(INSTANCE_KEY, ElementCompleted, root),
        LoggedEvent::new(MESSAGE_KEY, MessageIntent::Expired, message()),
    ];

    events
        .into_iter()
        .enumerate()
        .map(|(index, event)| event.at_position(index as u64 + 1))
        .collect()
}

fn appliers() -> EventAppliers {
    EventAppliers::with_default_appliers()
}

#[test]
fn replay_is_deterministic_across_instances() {
    let log = order_log();
    let first = replay(&appliers(), &log).expect("first replay should succeed");
    let second = replay(&appliers(), &log).expect("second replay should succeed");

    assert_eq!(first, second);
    assert_eq!(
        serde_json::to_vec(&first).expect("serialize"),
        serde_json::to_vec(&second).expect("serialize")
    );
}

#[test]
fn completed_instance_leaves_only_the_definition() {
    let state = replay(&appliers(), order_log()).expect("replay should succeed");

    assert_eq!(state.processes().len(), 1);
    assert!(state.element_instances().is_empty());
    assert!(state.jobs().is_empty());
    assert!(state.messages().is_empty());
    assert!(state.message_subscriptions().is_empty());
    assert!(state.process_message_subscriptions().is_empty());
    assert!(state.variables().get(INSTANCE_KEY, "amount").is_none());
}

#[test]
fn rebuilding_from_the_log_matches_incremental_application() {
    let log = order_log();
    let appliers = appliers();

    // Stop halfway, as a replica might before restarting.
    let mut incremental = ProcessingState::new();
    let (head, tail) = log.split_at(log.len() / 2);
    replay_into(&appliers, &mut incremental, head).expect("head should apply");
    replay_into(&appliers, &mut incremental, tail).expect("tail should apply");

    let rebuilt = replay(&appliers, &log).expect("rebuild should succeed");
    assert_eq!(incremental, rebuilt);
}

#[test]
fn rejected_correlation_leaves_no_trace() {
    let log = order_log();
    let appliers = appliers();

    let correlating = log
        .iter()
        .position(|e| e.intent == Intent::from(MessageSubscriptionIntent::Correlating))
        .expect("log contains a correlation");

    let before = replay(&appliers, &log[..correlating]).expect("prefix should apply");
    let after = replay(&appliers, &log[..correlating + 2]).expect("rejection should apply");

    assert_eq!(before, after);
    assert!(!after.messages().is_correlated(MESSAGE_KEY, "order"));
    let subscription = after
        .message_subscriptions()
        .get(TASK_KEY, "paid")
        .expect("subscription stays open");
    assert!(!subscription.is_correlating());
}

#[test]
fn unknown_versions_are_inert() {
    let appliers = appliers();
    let mut state = replay(&appliers, order_log()).expect("replay should succeed");
    let settled = state.clone();

    for event in order_log() {
        let future = event.with_version(99);
        let dispatch = appliers
            .apply(&mut state, &future)
            .expect("unknown version must not fail");
        assert_eq!(dispatch, Dispatch::Unrecognized);
    }
    assert_eq!(state, settled);
}

#[test]
fn rejected_record_leaves_state_as_it_was() {
    let appliers = appliers();
    let mut state = replay(&appliers, &order_log()[..12]).expect("prefix should apply");
    let before = state.clone();

    let incident = LoggedEvent::new(
        60,
        IncidentIntent::Created,
        IncidentRecord {
            job_key: Some(999),
            element_instance_key: TASK_KEY,
            process_instance_key: INSTANCE_KEY,
            ..IncidentRecord::default()
        },
    );
    let err = appliers
        .apply(&mut state, &incident)
        .expect_err("incident for an unknown job must fail");
    assert_eq!(err.key, 60);
    assert_eq!(state, before);
}

#[test]
fn latest_version_reflects_registrations() {
    let registry = EventAppliers::new()
        .register_version(TimerIntent::Created, 1, Applier::Noop)
        .register_version(TimerIntent::Created, 2, Applier::Noop);

    assert_eq!(registry.latest_version(TimerIntent::Created), Some(2));
    assert_eq!(registry.latest_version(TimerIntent::Canceled), None);
    assert_eq!(
        appliers().latest_version(eventfold_partition::intent::DeploymentIntent::Created),
        Some(2)
    );
}

fn distribution(partition_id: u32) -> RecordValue {
    CommandDistributionRecord {
        partition_id,
        value_type: ValueType::Deployment,
        intent: "CREATE".into(),
        command_value: serde_json::json!({ "resources": ["order.bpmn"] }),
    }
    .into()
}

#[test]
fn command_distribution_lifecycle() {
    use CommandDistributionIntent::*;

    let appliers = appliers();
    let mut state = ProcessingState::new();
    let key = 77;
    let step = |state: &mut ProcessingState, intent: CommandDistributionIntent, partition| {
        appliers
            .apply_state(state, key, intent.into(), &distribution(partition), 1)
            .expect("distribution step should apply")
    };

    step(&mut state, Started, 1);
    step(&mut state, Distributing, 2);
    step(&mut state, Distributing, 3);
    step(&mut state, Acknowledged, 2);
    step(&mut state, Acknowledged, 3);

    let record = state.distributions().get(key).expect("distribution exists");
    assert_eq!(record.acknowledged.iter().copied().collect::<Vec<_>>(), vec![2, 3]);
    assert!(record.pending.is_empty());

    step(&mut state, Finished, 1);
    assert!(state.distributions().get(key).is_none());
}

#[test]
fn later_registration_wins_but_fails_validation() {
    let registry = appliers().register(JobIntent::Created, Applier::Noop);
    assert_eq!(
        registry.resolve(JobIntent::Created, 1),
        Resolution::Registered(Applier::Noop)
    );

    let mut state = ProcessingState::new();
    let dispatch = registry
        .apply(&mut state, &LoggedEvent::new(JOB_KEY, JobIntent::Created, job()))
        .expect("noop should apply");
    assert_eq!(dispatch, Dispatch::Ignored);
    assert!(state.jobs().is_empty());

    assert_eq!(
        registry.validate(),
        Err(RegistryError::Invalid {
            issues: vec![RegistryIssue::Duplicate {
                intent: JobIntent::Created.into(),
                version: 1,
            }],
        })
    );
}

#[tokio::test]
async fn partitions_advance_independently() {
    let appliers = Arc::new(appliers());
    let left = spawn_partition(appliers.clone(), PartitionConfig::new(1)).expect("spawn left");
    let right = spawn_partition(appliers.clone(), PartitionConfig::new(2)).expect("spawn right");

    let timer = |key| {
        LoggedEvent::new(
            key,
            TimerIntent::Created,
            TimerRecord {
                due_date: 1_000 * key,
                ..TimerRecord::default()
            },
        )
        .at_position(key as u64)
    };

    // Halting one partition does not affect the other.
    left.apply(timer(1)).await.expect("left apply");
    let duplicate = left.apply(timer(1)).await;
    assert!(matches!(duplicate, Err(PartitionError::Apply(_))));

    right
        .replay(vec![timer(1), timer(2)])
        .await
        .expect("right replay");
    assert_eq!(right.state().await.expect("right state").timers().len(), 2);
    assert!(matches!(
        left.apply(timer(2)).await,
        Err(PartitionError::Halted(_))
    ));
}

#[tokio::test]
async fn actor_replay_matches_synchronous_replay() {
    let tmp = tempfile::tempdir().expect("failed to create temp dir");
    let appliers = Arc::new(appliers());
    let config = PartitionConfig::new(3)
        .snapshot_dir(tmp.path())
        .snapshot_interval(5);
    let log = order_log();
    let (head, tail) = log.split_at(12);

    let handle = spawn_partition(appliers.clone(), config.clone()).expect("spawn should succeed");
    handle.replay(head.to_vec()).await.expect("head should apply");
    handle.shutdown().await.expect("shutdown should succeed");

    // The restarted partition resumes after the snapshot position.
    let handle = spawn_partition(appliers.clone(), config).expect("respawn should succeed");
    let resume_after = handle
        .position()
        .await
        .expect("position")
        .expect("snapshot has a position");
    assert_eq!(resume_after, head.len() as u64);

    let remaining = tail
        .iter()
        .filter(|event| event.position > resume_after)
        .cloned();
    handle
        .replay_stream(tokio_stream::iter(remaining))
        .await
        .expect("tail should apply");

    let expected = replay(&appliers, &log).expect("replay should succeed");
    assert_eq!(handle.state().await.expect("state"), expected);
}
