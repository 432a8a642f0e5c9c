//! Open incidents on jobs and element instances.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::StateViolation;
use crate::value::IncidentRecord;

const ENTITY: &str = "incident";

/// Open incidents, reachable by job or by element instance.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IncidentState {
    incidents: BTreeMap<i64, IncidentRecord>,
    by_job: BTreeMap<i64, i64>,
    by_element_instance: BTreeMap<i64, i64>,
}

impl IncidentState {
    pub fn get(&self, key: i64) -> Option<&IncidentRecord> {
        self.incidents.get(&key)
    }

    /// Key of the open incident raised for a job.
    pub fn for_job(&self, job_key: i64) -> Option<i64> {
        self.by_job.get(&job_key).copied()
    }

    /// Key of the open incident raised for an element instance.
    pub fn for_element_instance(&self, element_instance_key: i64) -> Option<i64> {
        self.by_element_instance.get(&element_instance_key).copied()
    }

    pub fn len(&self) -> usize {
        self.incidents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.incidents.is_empty()
    }

    pub(crate) fn create(&mut self, key: i64, record: &IncidentRecord) -> Result<(), StateViolation> {
        if self.incidents.contains_key(&key) {
            return Err(StateViolation::already_exists(ENTITY, key));
        }
        match record.job_key {
            Some(job_key) => {
                self.by_job.insert(job_key, key);
            }
            None => {
                self.by_element_instance
                    .insert(record.element_instance_key, key);
            }
        }
        self.incidents.insert(key, record.clone());
        Ok(())
    }

    pub(crate) fn resolve(&mut self, key: i64) -> Result<IncidentRecord, StateViolation> {
        let record = self
            .incidents
            .remove(&key)
            .ok_or_else(|| StateViolation::not_found(ENTITY, key))?;
        match record.job_key {
            Some(job_key) => {
                self.by_job.remove(&job_key);
            }
            None => {
                self.by_element_instance.remove(&record.element_instance_key);
            }
        }
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn job_incidents_are_indexed_by_job() {
        let mut state = IncidentState::default();
        let record = IncidentRecord {
            job_key: Some(5),
            element_instance_key: 10,
            ..IncidentRecord::default()
        };
        state.create(1, &record).unwrap();
        assert_eq!(state.for_job(5), Some(1));
        assert_eq!(state.for_element_instance(10), None);

        state.resolve(1).unwrap();
        assert_eq!(state.for_job(5), None);
        assert!(state.resolve(1).is_err());
    }

    #[test]
    fn element_incidents_are_indexed_by_element_instance() {
        let mut state = IncidentState::default();
        let record = IncidentRecord {
            element_instance_key: 10,
            ..IncidentRecord::default()
        };
        state.create(1, &record).unwrap();
        assert_eq!(state.for_element_instance(10), Some(1));
        assert!(state.create(1, &record).is_err());
    }
}
