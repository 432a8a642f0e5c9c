use std::collections::BTreeSet;

use crate::error::StateViolation;
use crate::intent::ValueType;
use crate::state::{ElementInstanceState, JobPhase, JobState, ProcessingState};
use crate::value::{JobBatchRecord, JobRecord, RecordValue, TypedValue};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JobApplier {
    Created,
    Completed,
    TimedOut,
    Failed,
    Yielded,
    RetriesUpdated,
    Canceled,
    ErrorThrown,
    RecurredAfterBackoff,
    TimeoutUpdated,
    Migrated,
    /// JOB_BATCH ACTIVATED: every job in the batch goes to a worker.
    BatchActivated,
}

impl JobApplier {
    pub fn value_type(self) -> ValueType {
        match self {
            Self::BatchActivated => ValueType::JobBatch,
            _ => ValueType::Job,
        }
    }

    pub(crate) fn apply(
        self,
        state: &mut ProcessingState,
        key: i64,
        value: &RecordValue,
    ) -> Result<(), StateViolation> {
        let record = || JobRecord::expect_from(value);
        let jobs = &mut state.jobs;
        match self {
            Self::Created => created(jobs, &mut state.element_instances, key, record()?),
            Self::Completed | Self::Canceled => {
                removed(jobs, &mut state.element_instances, key, record()?)
            }
            Self::TimedOut => {
                record()?;
                jobs.time_out(key)
            }
            Self::Failed => jobs.fail(key, record()?),
            Self::Yielded => jobs.yield_back(key, record()?),
            Self::RetriesUpdated => jobs.update_retries(key, record()?.retries),
            Self::ErrorThrown => jobs.throw_error(key, record()?),
            Self::RecurredAfterBackoff => {
                record()?;
                jobs.recur_after_backoff(key)
            }
            Self::TimeoutUpdated => jobs.update_timeout(key, record()?.deadline),
            Self::Migrated => jobs.migrate(key, record()?),
            Self::BatchActivated => batch_activated(jobs, JobBatchRecord::expect_from(value)?),
        }
    }
}

fn created(
    jobs: &mut JobState,
    instances: &mut ElementInstanceState,
    key: i64,
    record: &JobRecord,
) -> Result<(), StateViolation> {
    jobs.create(key, record)?;
    instances.set_job_key(record.element_instance_key, Some(key));
    Ok(())
}

fn removed(
    jobs: &mut JobState,
    instances: &mut ElementInstanceState,
    key: i64,
    record: &JobRecord,
) -> Result<(), StateViolation> {
    jobs.delete(key)?;
    if instances
        .get(record.element_instance_key)
        .is_some_and(|instance| instance.job_key == Some(key))
    {
        instances.set_job_key(record.element_instance_key, None);
    }
    Ok(())
}

/// Every listed job must be activatable before any of them is activated.
fn batch_activated(jobs: &mut JobState, batch: &JobBatchRecord) -> Result<(), StateViolation> {
    let mut activations = Vec::with_capacity(batch.job_keys.len());
    let mut seen = BTreeSet::new();
    for (index, &job_key) in batch.job_keys.iter().enumerate() {
        let job = batch
            .jobs
            .get(index)
            .ok_or_else(|| StateViolation::not_found("job record in batch", job_key))?;
        let phase = jobs
            .phase(job_key)
            .ok_or_else(|| StateViolation::not_found("job", job_key))?;
        if phase != JobPhase::Activatable || !seen.insert(job_key) {
            return Err(StateViolation::illegal_transition(
                "job",
                job_key,
                phase,
                JobPhase::Activated,
            ));
        }
        activations.push((job_key, job));
    }
    for (job_key, job) in activations {
        jobs.activate(job_key, job)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job() -> JobRecord {
        JobRecord {
            job_type: "payment".into(),
            retries: 3,
            element_instance_key: 10,
            ..JobRecord::default()
        }
    }

    #[test]
    fn batch_activation_activates_each_listed_job() {
        let mut state = ProcessingState::new();
        JobApplier::Created.apply(&mut state, 1, &job().into()).unwrap();
        JobApplier::Created.apply(&mut state, 2, &job().into()).unwrap();

        let activated = JobRecord {
            worker: "billing".into(),
            deadline: Some(5_000),
            ..job()
        };
        let batch = JobBatchRecord {
            job_type: "payment".into(),
            worker: "billing".into(),
            job_keys: vec![1, 2],
            jobs: vec![activated.clone(), activated],
            ..JobBatchRecord::default()
        };
        JobApplier::BatchActivated
            .apply(&mut state, 99, &batch.into())
            .unwrap();

        assert_eq!(state.jobs().phase(1), Some(JobPhase::Activated));
        assert_eq!(state.jobs().phase(2), Some(JobPhase::Activated));
        assert_eq!(state.jobs().get(1).unwrap().record.worker, "billing");
        assert!(state.jobs().activatable("payment").is_empty());
    }

    #[test]
    fn batch_with_missing_job_record_is_a_violation() {
        let mut state = ProcessingState::new();
        JobApplier::Created.apply(&mut state, 1, &job().into()).unwrap();
        let batch = JobBatchRecord {
            job_keys: vec![1],
            ..JobBatchRecord::default()
        };
        assert!(JobApplier::BatchActivated.apply(&mut state, 99, &batch.into()).is_err());
    }

    #[test]
    fn batch_with_an_unactivatable_job_activates_none() {
        let mut state = ProcessingState::new();
        JobApplier::Created.apply(&mut state, 1, &job().into()).unwrap();
        JobApplier::Created.apply(&mut state, 2, &job().into()).unwrap();
        state.jobs.activate(2, &job()).unwrap();
        let before = state.clone();

        let batch = JobBatchRecord {
            job_keys: vec![1, 2],
            jobs: vec![job(), job()],
            ..JobBatchRecord::default()
        };
        let err = JobApplier::BatchActivated
            .apply(&mut state, 99, &batch.into())
            .unwrap_err();
        assert!(matches!(err, StateViolation::IllegalTransition { .. }));
        assert_eq!(state, before);
    }

    #[test]
    fn batch_listing_a_job_twice_is_a_violation() {
        let mut state = ProcessingState::new();
        JobApplier::Created.apply(&mut state, 1, &job().into()).unwrap();
        let before = state.clone();
        let batch = JobBatchRecord {
            job_keys: vec![1, 1],
            jobs: vec![job(), job()],
            ..JobBatchRecord::default()
        };
        assert!(JobApplier::BatchActivated.apply(&mut state, 99, &batch.into()).is_err());
        assert_eq!(state, before);
    }

    #[test]
    fn completed_job_is_removed() {
        let mut state = ProcessingState::new();
        JobApplier::Created.apply(&mut state, 1, &job().into()).unwrap();
        JobApplier::Completed.apply(&mut state, 1, &job().into()).unwrap();
        assert!(state.jobs().is_empty());
        assert!(JobApplier::Completed.apply(&mut state, 1, &job().into()).is_err());
    }

    #[test]
    fn retries_updated_and_timeout_updated() {
        let mut state = ProcessingState::new();
        JobApplier::Created.apply(&mut state, 1, &job().into()).unwrap();
        JobApplier::RetriesUpdated
            .apply(&mut state, 1, &JobRecord { retries: 7, ..job() }.into())
            .unwrap();
        assert_eq!(state.jobs().get(1).unwrap().record.retries, 7);

        // The deadline can only move while a worker holds the job.
        let new_deadline = JobRecord {
            deadline: Some(9_000),
            ..job()
        };
        assert!(
            JobApplier::TimeoutUpdated
                .apply(&mut state, 1, &new_deadline.clone().into())
                .is_err()
        );
        state.jobs.activate(1, &job()).unwrap();
        JobApplier::TimeoutUpdated
            .apply(&mut state, 1, &new_deadline.into())
            .unwrap();
        assert_eq!(state.jobs().timed_out_before(9_001), vec![1]);
    }

    #[test]
    fn migrated_keeps_phase() {
        let mut state = ProcessingState::new();
        JobApplier::Created.apply(&mut state, 1, &job().into()).unwrap();
        let migrated = JobRecord {
            process_definition_key: 200,
            bpmn_process_id: "order-v2".into(),
            ..job()
        };
        JobApplier::Migrated.apply(&mut state, 1, &migrated.into()).unwrap();
        let stored = state.jobs().get(1).unwrap();
        assert_eq!(stored.record.process_definition_key, 200);
        assert_eq!(stored.phase, JobPhase::Activatable);
    }
}
