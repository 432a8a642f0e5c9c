//! Jobs and their activation lifecycle.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::error::StateViolation;
use crate::value::JobRecord;

const ENTITY: &str = "job";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobPhase {
    /// Waiting for a worker.
    Activatable,
    /// Handed to a worker, running until its deadline.
    Activated,
    /// Failed; either backing off before a retry or out of retries.
    Failed,
    /// The worker threw a BPMN error that no catch event has taken yet.
    ErrorThrown,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub phase: JobPhase,
    pub record: JobRecord,
}

/// Jobs keyed by job key, with the indexes workers and timers scan.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JobState {
    jobs: BTreeMap<i64, Job>,
    /// (job type, job key)
    activatable: BTreeSet<(String, i64)>,
    /// (deadline, job key)
    deadlines: BTreeSet<(i64, i64)>,
    /// (recurring time, job key)
    backoffs: BTreeSet<(i64, i64)>,
}

impl JobState {
    /// The job with its current phase.
    pub fn get(&self, key: i64) -> Option<&Job> {
        self.jobs.get(&key)
    }

    pub fn phase(&self, key: i64) -> Option<JobPhase> {
        self.jobs.get(&key).map(|job| job.phase)
    }

    /// Activatable job keys of `job_type`, oldest key first.
    pub fn activatable(&self, job_type: &str) -> Vec<i64> {
        self.activatable
            .range((job_type.to_owned(), i64::MIN)..=(job_type.to_owned(), i64::MAX))
            .map(|(_, key)| *key)
            .collect()
    }

    /// Activated jobs whose deadline is before `now`.
    pub fn timed_out_before(&self, now: i64) -> Vec<i64> {
        self.deadlines
            .range(..(now, i64::MIN))
            .map(|(_, key)| *key)
            .collect()
    }

    /// Backed-off jobs that may recur at or before `now`.
    pub fn recurring_before(&self, now: i64) -> Vec<i64> {
        self.backoffs
            .range(..=(now, i64::MAX))
            .map(|(_, key)| *key)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    pub(crate) fn create(&mut self, key: i64, record: &JobRecord) -> Result<(), StateViolation> {
        if self.jobs.contains_key(&key) {
            return Err(StateViolation::already_exists(ENTITY, key));
        }
        self.jobs.insert(
            key,
            Job {
                phase: JobPhase::Activatable,
                record: record.clone(),
            },
        );
        self.index(key);
        Ok(())
    }

    pub(crate) fn activate(&mut self, key: i64, record: &JobRecord) -> Result<(), StateViolation> {
        self.move_to(key, &[JobPhase::Activatable], JobPhase::Activated, Some(record))
    }

    pub(crate) fn time_out(&mut self, key: i64) -> Result<(), StateViolation> {
        self.move_to(key, &[JobPhase::Activated], JobPhase::Activatable, None)
    }

    pub(crate) fn yield_back(&mut self, key: i64, record: &JobRecord) -> Result<(), StateViolation> {
        self.move_to(key, &[JobPhase::Activated], JobPhase::Activatable, Some(record))
    }

    /// A worker reported failure.
    ///
    /// With retries left and a backoff the job waits in `Failed` until its
    /// recurring time; with retries and no backoff it is activatable again;
    /// without retries it stays `Failed` until an incident is resolved.
    pub(crate) fn fail(&mut self, key: i64, record: &JobRecord) -> Result<(), StateViolation> {
        let next = if record.retries > 0 && record.retry_backoff <= 0 {
            JobPhase::Activatable
        } else {
            JobPhase::Failed
        };
        self.move_to(key, &[JobPhase::Activated], next, Some(record))
    }

    pub(crate) fn throw_error(&mut self, key: i64, record: &JobRecord) -> Result<(), StateViolation> {
        self.move_to(
            key,
            &[JobPhase::Activatable, JobPhase::Activated],
            JobPhase::ErrorThrown,
            Some(record),
        )
    }

    pub(crate) fn recur_after_backoff(&mut self, key: i64) -> Result<(), StateViolation> {
        self.move_to(key, &[JobPhase::Failed], JobPhase::Activatable, None)
    }

    /// An incident was raised for the job: it stays out of activation.
    pub(crate) fn disable(&mut self, key: i64) -> Result<(), StateViolation> {
        let phase = self.get_job(key)?.phase;
        self.move_to(key, &[phase], JobPhase::Failed, None)
    }

    /// The job's incident was resolved: make it activatable again.
    pub(crate) fn resolve(&mut self, key: i64) -> Result<(), StateViolation> {
        self.move_to(
            key,
            &[JobPhase::Failed, JobPhase::ErrorThrown],
            JobPhase::Activatable,
            None,
        )
    }

    pub(crate) fn update_retries(&mut self, key: i64, retries: i32) -> Result<(), StateViolation> {
        self.get_job_mut(key)?.record.retries = retries;
        Ok(())
    }

    pub(crate) fn update_timeout(&mut self, key: i64, deadline: Option<i64>) -> Result<(), StateViolation> {
        let job = self.get_job(key)?;
        if job.phase != JobPhase::Activated {
            return Err(StateViolation::illegal_transition(
                ENTITY,
                key,
                job.phase,
                JobPhase::Activated,
            ));
        }
        self.unindex(key);
        self.get_job_mut(key)?.record.deadline = deadline;
        self.index(key);
        Ok(())
    }

    pub(crate) fn migrate(&mut self, key: i64, record: &JobRecord) -> Result<(), StateViolation> {
        let job = self.get_job_mut(key)?;
        job.record.process_definition_key = record.process_definition_key;
        job.record.process_definition_version = record.process_definition_version;
        job.record.bpmn_process_id = record.bpmn_process_id.clone();
        job.record.element_id = record.element_id.clone();
        Ok(())
    }

    /// Remove a completed or canceled job.
    pub(crate) fn delete(&mut self, key: i64) -> Result<Job, StateViolation> {
        self.get_job(key)?;
        self.unindex(key);
        self.jobs
            .remove(&key)
            .ok_or_else(|| StateViolation::not_found(ENTITY, key))
    }

    fn move_to(
        &mut self,
        key: i64,
        from: &[JobPhase],
        next: JobPhase,
        record: Option<&JobRecord>,
    ) -> Result<(), StateViolation> {
        let current = self.get_job(key)?.phase;
        if !from.contains(&current) {
            return Err(StateViolation::illegal_transition(ENTITY, key, current, next));
        }
        self.unindex(key);
        let job = self.get_job_mut(key)?;
        job.phase = next;
        if let Some(record) = record {
            job.record = record.clone();
        }
        self.index(key);
        Ok(())
    }

    fn index(&mut self, key: i64) {
        let Some(job) = self.jobs.get(&key) else {
            return;
        };
        match job.phase {
            JobPhase::Activatable => {
                self.activatable.insert((job.record.job_type.clone(), key));
            }
            JobPhase::Activated => {
                if let Some(deadline) = job.record.deadline {
                    self.deadlines.insert((deadline, key));
                }
            }
            JobPhase::Failed => {
                if job.record.retries > 0
                    && let Some(recurring_time) = job.record.recurring_time
                {
                    self.backoffs.insert((recurring_time, key));
                }
            }
            JobPhase::ErrorThrown => {}
        }
    }

    fn unindex(&mut self, key: i64) {
        let Some(job) = self.jobs.get(&key) else {
            return;
        };
        self.activatable.remove(&(job.record.job_type.clone(), key));
        if let Some(deadline) = job.record.deadline {
            self.deadlines.remove(&(deadline, key));
        }
        if let Some(recurring_time) = job.record.recurring_time {
            self.backoffs.remove(&(recurring_time, key));
        }
    }

    fn get_job(&self, key: i64) -> Result<&Job, StateViolation> {
        self.jobs
            .get(&key)
            .ok_or_else(|| StateViolation::not_found(ENTITY, key))
    }

    fn get_job_mut(&mut self, key: i64) -> Result<&mut Job, StateViolation> {
        self.jobs
            .get_mut(&key)
            .ok_or_else(|| StateViolation::not_found(ENTITY, key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job(retries: i32) -> JobRecord {
        JobRecord {
            job_type: "payment".into(),
            retries,
            ..JobRecord::default()
        }
    }

    #[test]
    fn created_job_is_activatable_by_type() {
        let mut state = JobState::default();
        state.create(2, &job(3)).unwrap();
        state.create(1, &job(3)).unwrap();
        assert_eq!(state.activatable("payment"), vec![1, 2]);
        assert!(state.activatable("shipping").is_empty());
    }

    #[test]
    fn activation_moves_job_to_deadline_index() {
        let mut state = JobState::default();
        state.create(1, &job(3)).unwrap();
        let activated = JobRecord {
            deadline: Some(1_000),
            worker: "w".into(),
            ..job(3)
        };
        state.activate(1, &activated).unwrap();

        assert_eq!(state.phase(1), Some(JobPhase::Activated));
        assert!(state.activatable("payment").is_empty());
        assert_eq!(state.timed_out_before(1_001), vec![1]);
        assert!(state.timed_out_before(1_000).is_empty());

        state.time_out(1).unwrap();
        assert!(state.timed_out_before(i64::MAX).is_empty());
        assert_eq!(state.activatable("payment"), vec![1]);
    }

    #[test]
    fn fail_with_backoff_waits_then_recurs() {
        let mut state = JobState::default();
        state.create(1, &job(3)).unwrap();
        state.activate(1, &job(3)).unwrap();
        let failed = JobRecord {
            retry_backoff: 500,
            recurring_time: Some(2_000),
            ..job(2)
        };
        state.fail(1, &failed).unwrap();
        assert_eq!(state.phase(1), Some(JobPhase::Failed));
        assert_eq!(state.recurring_before(2_000), vec![1]);

        state.recur_after_backoff(1).unwrap();
        assert_eq!(state.phase(1), Some(JobPhase::Activatable));
        assert!(state.recurring_before(i64::MAX).is_empty());
    }

    #[test]
    fn fail_with_retries_and_no_backoff_is_activatable() {
        let mut state = JobState::default();
        state.create(1, &job(3)).unwrap();
        state.activate(1, &job(3)).unwrap();
        state.fail(1, &job(2)).unwrap();
        assert_eq!(state.phase(1), Some(JobPhase::Activatable));
    }

    #[test]
    fn fail_without_retries_stays_failed_until_resolved() {
        let mut state = JobState::default();
        state.create(1, &job(1)).unwrap();
        state.activate(1, &job(1)).unwrap();
        state.fail(1, &job(0)).unwrap();
        assert_eq!(state.phase(1), Some(JobPhase::Failed));
        assert!(state.recurring_before(i64::MAX).is_empty());

        state.update_retries(1, 2).unwrap();
        state.resolve(1).unwrap();
        assert_eq!(state.activatable("payment"), vec![1]);
    }

    #[test]
    fn completing_unknown_job_is_a_violation() {
        let mut state = JobState::default();
        assert!(matches!(
            state.delete(9).unwrap_err(),
            StateViolation::NotFound { .. }
        ));
    }

    #[test]
    fn delete_clears_all_indexes() {
        let mut state = JobState::default();
        state.create(1, &job(3)).unwrap();
        state
            .activate(
                1,
                &JobRecord {
                    deadline: Some(5),
                    ..job(3)
                },
            )
            .unwrap();
        state.delete(1).unwrap();
        assert!(state.is_empty());
        assert!(state.timed_out_before(i64::MAX).is_empty());
    }

    #[test]
    fn activating_an_activated_job_is_illegal() {
        let mut state = JobState::default();
        state.create(1, &job(3)).unwrap();
        state.activate(1, &job(3)).unwrap();
        assert!(matches!(
            state.activate(1, &job(3)).unwrap_err(),
            StateViolation::IllegalTransition { .. }
        ));
    }
}
