//! The applier registry and event dispatcher.
//!
//! [`EventAppliers`] maps `(intent, version)` to an [`Applier`]. It is built
//! once before any record is applied and is read-only afterwards, so a
//! partition can share it behind an `Arc`.

use std::collections::{BTreeMap, HashMap};

use crate::appliers::{
    Applier, DecisionApplier, DeploymentApplier, DistributionApplier, ErrorApplier,
    FormApplier, IncidentApplier, JobApplier, MessageApplier,
    MessageStartEventSubscriptionApplier, MessageSubscriptionApplier, ProcessApplier,
    ProcessEventApplier, ProcessInstanceApplier, ProcessMessageSubscriptionApplier,
    SignalSubscriptionApplier, TimerApplier, UserTaskApplier, VariableApplier,
};
use crate::error::{ApplyError, RegistryError, RegistryIssue};
use crate::event::{DEFAULT_RECORD_VERSION, LoggedEvent};
use crate::intent::{
    CommandDistributionIntent, DecisionIntent, DecisionRequirementsIntent,
    DeploymentDistributionIntent, DeploymentIntent, ErrorIntent, FormIntent, IncidentIntent,
    Intent, JobBatchIntent, JobIntent, MessageIntent, MessageStartEventSubscriptionIntent,
    MessageSubscriptionIntent, ProcessEventIntent, ProcessInstanceCreationIntent,
    ProcessInstanceIntent, ProcessInstanceModificationIntent, ProcessIntent,
    ProcessMessageSubscriptionIntent, SignalSubscriptionIntent, TimerIntent, UserTaskIntent,
    VariableIntent,
};
use crate::state::ProcessingState;
use crate::value::RecordValue;

/// How a lookup for `(intent, version)` was resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// An applier was registered for exactly this pair. This includes an
    /// explicitly registered [`Applier::Noop`].
    Registered(Applier),
    /// Nothing was registered for this pair; the record will be skipped.
    Fallback,
}

impl Resolution {
    /// The applier to run: the registered one, or `Noop` on fallback.
    pub fn applier(self) -> Applier {
        match self {
            Self::Registered(applier) => applier,
            Self::Fallback => Applier::Noop,
        }
    }
}

/// What dispatching one record did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    /// A registered applier ran against the state.
    Applied,
    /// The version is known and registered as a no-op.
    Ignored,
    /// No applier is registered for the version; nothing changed.
    Unrecognized,
}

/// Registry of event appliers keyed by intent and record version.
///
/// Registering the same `(intent, version)` twice keeps the later applier.
/// The overwrite is remembered and reported by [`validate`](Self::validate),
/// so a composition that depends on registration order fails at startup
/// instead of changing behaviour silently.
///
/// # Examples
///
/// ```
/// use eventfold_partition::{Dispatch, EventAppliers, LoggedEvent, ProcessingState};
/// use eventfold_partition::intent::TimerIntent;
/// use eventfold_partition::value::TimerRecord;
///
/// let appliers = EventAppliers::with_default_appliers();
/// let mut state = ProcessingState::new();
///
/// let event = LoggedEvent::new(1, TimerIntent::Created, TimerRecord::default());
/// assert_eq!(appliers.apply(&mut state, &event).unwrap(), Dispatch::Applied);
/// assert!(state.timers().get(1).is_some());
///
/// // A version nobody registered is skipped.
/// let future = LoggedEvent::new(2, TimerIntent::Created, TimerRecord::default()).with_version(99);
/// assert_eq!(appliers.apply(&mut state, &future).unwrap(), Dispatch::Unrecognized);
/// assert!(state.timers().get(2).is_none());
/// ```
#[derive(Debug, Clone, Default)]
pub struct EventAppliers {
    appliers: HashMap<Intent, BTreeMap<u32, Applier>>,
    duplicates: Vec<(Intent, u32)>,
}

impl EventAppliers {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `applier` for `intent` at [`DEFAULT_RECORD_VERSION`].
    ///
    /// # Returns
    ///
    /// `self` for method chaining.
    pub fn register(self, intent: impl Into<Intent>, applier: impl Into<Applier>) -> Self {
        self.register_version(intent, DEFAULT_RECORD_VERSION, applier)
    }

    /// Register `applier` for `intent` at an explicit record version.
    ///
    /// # Arguments
    ///
    /// * `intent` - The event intent the applier handles.
    /// * `version` - Record version, starting at 1.
    /// * `applier` - The transition to run, or [`Applier::Noop`] to mark
    ///   the version as known but without effect.
    ///
    /// # Returns
    ///
    /// `self` for method chaining.
    pub fn register_version(
        mut self,
        intent: impl Into<Intent>,
        version: u32,
        applier: impl Into<Applier>,
    ) -> Self {
        let intent = intent.into();
        let applier = applier.into();
        if let Some(previous) = self
            .appliers
            .entry(intent)
            .or_default()
            .insert(version, applier)
        {
            tracing::warn!(
                %intent,
                version,
                ?previous,
                ?applier,
                "applier registered twice, keeping the later one"
            );
            self.duplicates.push((intent, version));
        }
        self
    }

    /// The highest version registered for `intent`, or `None` if the intent
    /// has no applier at all.
    ///
    /// Producers stamp this version on new records of the intent.
    pub fn latest_version(&self, intent: impl Into<Intent>) -> Option<u32> {
        self.appliers
            .get(&intent.into())
            .and_then(|versions| versions.keys().next_back().copied())
    }

    /// Look up the applier for `(intent, version)`.
    pub fn resolve(&self, intent: impl Into<Intent>, version: u32) -> Resolution {
        self.appliers
            .get(&intent.into())
            .and_then(|versions| versions.get(&version))
            .map_or(Resolution::Fallback, |applier| {
                Resolution::Registered(*applier)
            })
    }

    /// Apply one record to `state`.
    ///
    /// Resolves the applier for `(intent, version)` and runs it. Live
    /// processing and replay both go through here.
    ///
    /// # Arguments
    ///
    /// * `state` - The partition state to mutate.
    /// * `key` - Key of the entity the record affects.
    /// * `intent` - The record's intent.
    /// * `value` - The record payload.
    /// * `version` - The record's schema version.
    ///
    /// # Returns
    ///
    /// Whether the record was applied, ignored by an explicit no-op, or
    /// skipped because the version is unknown.
    ///
    /// # Errors
    ///
    /// Returns [`ApplyError`] when the applier finds the record inconsistent
    /// with the current state. The partition must not apply further records
    /// after this.
    pub fn apply_state(
        &self,
        state: &mut ProcessingState,
        key: i64,
        intent: Intent,
        value: &RecordValue,
        version: u32,
    ) -> Result<Dispatch, ApplyError> {
        let applier = match self.resolve(intent, version) {
            Resolution::Fallback => {
                tracing::debug!(key, %intent, version, "no applier registered, skipping record");
                return Ok(Dispatch::Unrecognized);
            }
            Resolution::Registered(Applier::Noop) => {
                tracing::trace!(key, %intent, version, "record version registered as no-op");
                return Ok(Dispatch::Ignored);
            }
            Resolution::Registered(applier) => applier,
        };

        applier
            .apply(state, key, value)
            .map(|()| Dispatch::Applied)
            .map_err(|violation| ApplyError {
                key,
                intent,
                version,
                violation,
            })
    }

    /// Apply a logged record to `state`.
    ///
    /// # Errors
    ///
    /// See [`apply_state`](Self::apply_state).
    pub fn apply(
        &self,
        state: &mut ProcessingState,
        event: &LoggedEvent,
    ) -> Result<Dispatch, ApplyError> {
        self.apply_state(
            state,
            event.key,
            event.intent,
            &event.value,
            event.record_version,
        )
    }

    /// Check the registry before any record is applied.
    ///
    /// Reports every intent without an applier, every `(intent, version)`
    /// registered more than once, version 0 registrations, and appliers
    /// that read a different value type than their intent carries.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::Invalid`] listing all issues found, in a
    /// stable order.
    pub fn validate(&self) -> Result<(), RegistryError> {
        let mut issues = Vec::new();

        for intent in Intent::all() {
            let Some(versions) = self.appliers.get(&intent).filter(|v| !v.is_empty()) else {
                issues.push(RegistryIssue::Missing(intent));
                continue;
            };
            for (&version, &applier) in versions {
                if version == 0 {
                    issues.push(RegistryIssue::InvalidVersion { intent, version });
                }
                if let Some(value_type) = applier.value_type()
                    && value_type != intent.value_type()
                {
                    issues.push(RegistryIssue::ValueTypeMismatch { intent, applier });
                }
            }
        }

        issues.extend(
            self.duplicates
                .iter()
                .map(|&(intent, version)| RegistryIssue::Duplicate { intent, version }),
        );

        if issues.is_empty() {
            Ok(())
        } else {
            Err(RegistryError::Invalid { issues })
        }
    }

    /// Number of registered `(intent, version)` pairs.
    pub fn len(&self) -> usize {
        self.appliers.values().map(BTreeMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The registry every partition runs with: one applier for every known
    /// intent.
    ///
    /// Deployment CREATED has two versions. Version 1 stores the deployment;
    /// version 2 records carry the same deployment while the resources are
    /// written by their own CREATED events, so it is registered as a no-op.
    pub fn with_default_appliers() -> Self {
        Self::new()
            .register(ProcessIntent::Created, ProcessApplier::Created)
            .register(ProcessIntent::Deleting, ProcessApplier::Deleting)
            .register(ProcessIntent::Deleted, ProcessApplier::Deleted)
            // process instance
            .register(
                ProcessInstanceIntent::ElementActivating,
                ProcessInstanceApplier::ElementActivating,
            )
            .register(
                ProcessInstanceIntent::ElementActivated,
                ProcessInstanceApplier::ElementActivated,
            )
            .register(
                ProcessInstanceIntent::ElementCompleting,
                ProcessInstanceApplier::ElementCompleting,
            )
            .register(
                ProcessInstanceIntent::ElementCompleted,
                ProcessInstanceApplier::ElementCompleted,
            )
            .register(
                ProcessInstanceIntent::ElementTerminating,
                ProcessInstanceApplier::ElementTerminating,
            )
            .register(
                ProcessInstanceIntent::ElementTerminated,
                ProcessInstanceApplier::ElementTerminated,
            )
            .register(
                ProcessInstanceIntent::SequenceFlowTaken,
                ProcessInstanceApplier::SequenceFlowTaken,
            )
            .register(
                ProcessInstanceIntent::ElementMigrated,
                ProcessInstanceApplier::ElementMigrated,
            )
            .register(
                ProcessInstanceCreationIntent::Created,
                ProcessInstanceApplier::CreationCreated,
            )
            .register(
                ProcessInstanceModificationIntent::Modified,
                ProcessInstanceApplier::ModificationModified,
            )
            .register(ProcessEventIntent::Triggering, ProcessEventApplier::Triggering)
            .register(ProcessEventIntent::Triggered, ProcessEventApplier::Triggered)
            // jobs
            .register(JobIntent::Created, JobApplier::Created)
            .register(JobIntent::Completed, JobApplier::Completed)
            .register(JobIntent::TimedOut, JobApplier::TimedOut)
            .register(JobIntent::Failed, JobApplier::Failed)
            .register(JobIntent::Yielded, JobApplier::Yielded)
            .register(JobIntent::RetriesUpdated, JobApplier::RetriesUpdated)
            .register(JobIntent::Canceled, JobApplier::Canceled)
            .register(JobIntent::ErrorThrown, JobApplier::ErrorThrown)
            .register(
                JobIntent::RecurredAfterBackoff,
                JobApplier::RecurredAfterBackoff,
            )
            .register(JobIntent::TimeoutUpdated, JobApplier::TimeoutUpdated)
            .register(JobIntent::Migrated, JobApplier::Migrated)
            .register(JobBatchIntent::Activated, JobApplier::BatchActivated)
            // timers
            .register(TimerIntent::Created, TimerApplier::Created)
            .register(TimerIntent::Triggered, TimerApplier::Triggered)
            .register(TimerIntent::Canceled, TimerApplier::Canceled)
            // messages and correlation
            .register(MessageIntent::Published, MessageApplier::Published)
            .register(MessageIntent::Expired, MessageApplier::Expired)
            .register(
                MessageSubscriptionIntent::Created,
                MessageSubscriptionApplier::Created,
            )
            .register(
                MessageSubscriptionIntent::Correlating,
                MessageSubscriptionApplier::Correlating,
            )
            .register(
                MessageSubscriptionIntent::Correlated,
                MessageSubscriptionApplier::Correlated,
            )
            .register(
                MessageSubscriptionIntent::Rejected,
                MessageSubscriptionApplier::Rejected,
            )
            .register(
                MessageSubscriptionIntent::Deleted,
                MessageSubscriptionApplier::Deleted,
            )
            .register(
                ProcessMessageSubscriptionIntent::Creating,
                ProcessMessageSubscriptionApplier::Creating,
            )
            .register(
                ProcessMessageSubscriptionIntent::Created,
                ProcessMessageSubscriptionApplier::Created,
            )
            .register(
                ProcessMessageSubscriptionIntent::Correlated,
                ProcessMessageSubscriptionApplier::Correlated,
            )
            .register(
                ProcessMessageSubscriptionIntent::Deleting,
                ProcessMessageSubscriptionApplier::Deleting,
            )
            .register(
                ProcessMessageSubscriptionIntent::Deleted,
                ProcessMessageSubscriptionApplier::Deleted,
            )
            .register(
                MessageStartEventSubscriptionIntent::Created,
                MessageStartEventSubscriptionApplier::Created,
            )
            .register(
                MessageStartEventSubscriptionIntent::Correlated,
                MessageStartEventSubscriptionApplier::Correlated,
            )
            .register(
                MessageStartEventSubscriptionIntent::Deleted,
                MessageStartEventSubscriptionApplier::Deleted,
            )
            // incidents and variables
            .register(IncidentIntent::Created, IncidentApplier::Created)
            .register(IncidentIntent::Resolved, IncidentApplier::Resolved)
            .register(VariableIntent::Created, VariableApplier::SetLocal)
            .register(VariableIntent::Updated, VariableApplier::SetLocal)
            .register(VariableIntent::Migrated, VariableApplier::Migrated)
            // deployments and resources
            .register_version(DeploymentIntent::Created, 1, DeploymentApplier::Created)
            .register_version(DeploymentIntent::Created, 2, Applier::Noop)
            .register(DeploymentIntent::Distributed, DeploymentApplier::Distributed)
            .register(
                DeploymentIntent::FullyDistributed,
                DeploymentApplier::FullyDistributed,
            )
            .register(
                DeploymentDistributionIntent::Distributing,
                DeploymentApplier::DistributionDistributing,
            )
            .register(
                DeploymentDistributionIntent::Completed,
                DeploymentApplier::DistributionCompleted,
            )
            .register(DecisionIntent::Created, DecisionApplier::DecisionCreated)
            .register(DecisionIntent::Deleted, DecisionApplier::DecisionDeleted)
            .register(
                DecisionRequirementsIntent::Created,
                DecisionApplier::RequirementsCreated,
            )
            .register(
                DecisionRequirementsIntent::Deleted,
                DecisionApplier::RequirementsDeleted,
            )
            .register(FormIntent::Created, FormApplier::Created)
            .register(FormIntent::Deleted, FormApplier::Deleted)
            // user tasks
            .register(UserTaskIntent::Creating, UserTaskApplier::Creating)
            .register(UserTaskIntent::Created, UserTaskApplier::Created)
            .register(UserTaskIntent::Canceling, UserTaskApplier::Canceling)
            .register(UserTaskIntent::Canceled, UserTaskApplier::Canceled)
            .register(UserTaskIntent::Completing, UserTaskApplier::Completing)
            .register(UserTaskIntent::Completed, UserTaskApplier::Completed)
            // signals, distribution, errors
            .register(
                SignalSubscriptionIntent::Created,
                SignalSubscriptionApplier::Created,
            )
            .register(
                SignalSubscriptionIntent::Deleted,
                SignalSubscriptionApplier::Deleted,
            )
            .register(CommandDistributionIntent::Started, DistributionApplier::Started)
            .register(
                CommandDistributionIntent::Distributing,
                DistributionApplier::Distributing,
            )
            .register(
                CommandDistributionIntent::Acknowledged,
                DistributionApplier::Acknowledged,
            )
            .register(CommandDistributionIntent::Finished, DistributionApplier::Finished)
            .register(ErrorIntent::Created, ErrorApplier::Created)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::{JobRecord, TimerRecord};

    #[test]
    fn default_registry_is_valid() {
        let appliers = EventAppliers::with_default_appliers();
        assert_eq!(appliers.validate(), Ok(()));
        assert!(!appliers.is_empty());
    }

    #[test]
    fn default_registry_covers_every_intent() {
        let appliers = EventAppliers::with_default_appliers();
        for intent in Intent::all() {
            assert!(
                appliers.latest_version(intent).is_some(),
                "{intent} has no applier"
            );
        }
    }

    #[test]
    fn latest_version_is_highest_registered() {
        let appliers = EventAppliers::new()
            .register_version(JobIntent::Created, 1, JobApplier::Created)
            .register_version(JobIntent::Created, 2, Applier::Noop);
        assert_eq!(appliers.latest_version(JobIntent::Created), Some(2));
        assert_eq!(appliers.latest_version(TimerIntent::Created), None);
    }

    #[test]
    fn explicit_noop_and_fallback_resolve_differently() {
        let appliers = EventAppliers::with_default_appliers();
        assert_eq!(
            appliers.resolve(DeploymentIntent::Created, 2),
            Resolution::Registered(Applier::Noop)
        );
        assert_eq!(appliers.resolve(DeploymentIntent::Created, 3), Resolution::Fallback);
        assert_eq!(Resolution::Fallback.applier(), Applier::Noop);
    }

    #[test]
    fn dispatch_reports_applied_ignored_and_unrecognized() {
        let appliers = EventAppliers::new()
            .register_version(TimerIntent::Created, 1, TimerApplier::Created)
            .register_version(TimerIntent::Created, 2, Applier::Noop);
        let mut state = ProcessingState::new();
        let timer = RecordValue::from(TimerRecord::default());

        let intent = Intent::from(TimerIntent::Created);
        assert_eq!(
            appliers.apply_state(&mut state, 1, intent, &timer, 1),
            Ok(Dispatch::Applied)
        );
        assert_eq!(
            appliers.apply_state(&mut state, 2, intent, &timer, 2),
            Ok(Dispatch::Ignored)
        );
        assert_eq!(
            appliers.apply_state(&mut state, 3, intent, &timer, 7),
            Ok(Dispatch::Unrecognized)
        );
        assert_eq!(state.timers().len(), 1);
    }

    #[test]
    fn violation_is_wrapped_with_key_intent_and_version() {
        let appliers = EventAppliers::with_default_appliers();
        let mut state = ProcessingState::new();
        let err = appliers
            .apply_state(
                &mut state,
                42,
                JobIntent::Completed.into(),
                &JobRecord::default().into(),
                1,
            )
            .unwrap_err();
        assert_eq!(err.key, 42);
        assert_eq!(err.intent, Intent::from(JobIntent::Completed));
        assert_eq!(err.version, 1);
    }

    #[test]
    fn last_registration_wins_and_is_reported() {
        let appliers = EventAppliers::with_default_appliers()
            .register(TimerIntent::Created, Applier::Noop);
        assert_eq!(
            appliers.resolve(TimerIntent::Created, 1),
            Resolution::Registered(Applier::Noop)
        );
        let Err(RegistryError::Invalid { issues }) = appliers.validate() else {
            panic!("duplicate registration should fail validation");
        };
        assert_eq!(
            issues,
            vec![RegistryIssue::Duplicate {
                intent: TimerIntent::Created.into(),
                version: 1,
            }]
        );
    }

    #[test]
    fn validation_reports_missing_bad_version_and_value_type() {
        let appliers = EventAppliers::new()
            .register_version(JobIntent::Created, 0, JobApplier::Created)
            .register(TimerIntent::Created, JobApplier::Created);
        let Err(RegistryError::Invalid { issues }) = appliers.validate() else {
            panic!("incomplete registry should fail validation");
        };
        assert!(issues.contains(&RegistryIssue::InvalidVersion {
            intent: JobIntent::Created.into(),
            version: 0,
        }));
        assert!(issues.contains(&RegistryIssue::ValueTypeMismatch {
            intent: TimerIntent::Created.into(),
            applier: JobApplier::Created.into(),
        }));
        assert!(issues.contains(&RegistryIssue::Missing(JobIntent::Failed.into())));
        assert!(!issues.contains(&RegistryIssue::Missing(JobIntent::Created.into())));
    }
}
