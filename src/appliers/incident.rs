use crate::error::StateViolation;
use crate::intent::ValueType;
use crate::state::{IncidentState, JobPhase, JobState, ProcessingState};
use crate::value::{IncidentRecord, RecordValue, TypedValue};

/// Incidents on elements or jobs. A job incident takes the job out of
/// activation until the incident is resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IncidentApplier {
    Created,
    Resolved,
}

impl IncidentApplier {
    pub fn value_type(self) -> ValueType {
        ValueType::Incident
    }

    pub(crate) fn apply(
        self,
        state: &mut ProcessingState,
        key: i64,
        value: &RecordValue,
    ) -> Result<(), StateViolation> {
        let record = IncidentRecord::expect_from(value)?;
        match self {
            Self::Created => created(&mut state.incidents, &mut state.jobs, key, record),
            Self::Resolved => resolved(&mut state.incidents, &mut state.jobs, key),
        }
    }
}

fn created(
    incidents: &mut IncidentState,
    jobs: &mut JobState,
    key: i64,
    record: &IncidentRecord,
) -> Result<(), StateViolation> {
    if let Some(job_key) = record.job_key
        && jobs.get(job_key).is_none()
    {
        return Err(StateViolation::not_found("job", job_key));
    }
    incidents.create(key, record)?;
    if let Some(job_key) = record.job_key {
        jobs.disable(job_key)?;
    }
    Ok(())
}

fn resolved(incidents: &mut IncidentState, jobs: &mut JobState, key: i64) -> Result<(), StateViolation> {
    let record = incidents.resolve(key)?;
    // The job may have been canceled while the incident was open.
    if let Some(job_key) = record.job_key
        && matches!(
            jobs.phase(job_key),
            Some(JobPhase::Failed | JobPhase::ErrorThrown)
        )
    {
        jobs.resolve(job_key)?;
    }
    Ok(())
}
