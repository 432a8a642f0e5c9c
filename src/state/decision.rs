//! Deployed decisions and decision requirements graphs.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use super::{VersionIndex, latest_in};
use crate::error::StateViolation;
use crate::value::{DecisionRecord, DecisionRequirementsRecord};

/// Deployed decisions and decision requirements graphs (DRGs).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DecisionState {
    decisions: BTreeMap<i64, DecisionRecord>,
    decision_versions: VersionIndex,
    requirements: BTreeMap<i64, DecisionRequirementsRecord>,
    requirements_versions: VersionIndex,
    /// DRG key -> decision keys
    decisions_by_requirements: BTreeMap<i64, BTreeSet<i64>>,
}

impl DecisionState {
    pub fn decision(&self, key: i64) -> Option<&DecisionRecord> {
        self.decisions.get(&key)
    }

    /// Highest deployed version of `decision_id` for the tenant.
    pub fn latest_decision(&self, tenant_id: &str, decision_id: &str) -> Option<&DecisionRecord> {
        latest_in(&self.decision_versions, tenant_id, decision_id)
            .and_then(|key| self.decisions.get(&key))
    }

    pub fn requirements(&self, key: i64) -> Option<&DecisionRequirementsRecord> {
        self.requirements.get(&key)
    }

    pub fn latest_requirements(
        &self,
        tenant_id: &str,
        decision_requirements_id: &str,
    ) -> Option<&DecisionRequirementsRecord> {
        latest_in(&self.requirements_versions, tenant_id, decision_requirements_id)
            .and_then(|key| self.requirements.get(&key))
    }

    /// Decisions that belong to a requirements graph.
    pub fn decisions_of_requirements(&self, requirements_key: i64) -> Vec<&DecisionRecord> {
        self.decisions_by_requirements
            .get(&requirements_key)
            .into_iter()
            .flatten()
            .filter_map(|key| self.decisions.get(key))
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.decisions.is_empty() && self.requirements.is_empty()
    }

    pub(crate) fn put_decision(&mut self, record: &DecisionRecord) -> Result<(), StateViolation> {
        let key = record.decision_key;
        if self.decisions.contains_key(&key) {
            return Err(StateViolation::already_exists("decision", key));
        }
        self.decision_versions.insert((
            record.tenant_id.clone(),
            record.decision_id.clone(),
            record.version,
            key,
        ));
        self.decisions_by_requirements
            .entry(record.decision_requirements_key)
            .or_default()
            .insert(key);
        self.decisions.insert(key, record.clone());
        Ok(())
    }

    pub(crate) fn delete_decision(&mut self, key: i64) -> Result<(), StateViolation> {
        let record = self
            .decisions
            .remove(&key)
            .ok_or_else(|| StateViolation::not_found("decision", key))?;
        self.decision_versions.remove(&(
            record.tenant_id,
            record.decision_id,
            record.version,
            key,
        ));
        if let Some(keys) = self
            .decisions_by_requirements
            .get_mut(&record.decision_requirements_key)
        {
            keys.remove(&key);
            if keys.is_empty() {
                self.decisions_by_requirements
                    .remove(&record.decision_requirements_key);
            }
        }
        Ok(())
    }

    pub(crate) fn put_requirements(
        &mut self,
        record: &DecisionRequirementsRecord,
    ) -> Result<(), StateViolation> {
        let key = record.decision_requirements_key;
        if self.requirements.contains_key(&key) {
            return Err(StateViolation::already_exists("decision requirements", key));
        }
        self.requirements_versions.insert((
            record.tenant_id.clone(),
            record.decision_requirements_id.clone(),
            record.version,
            key,
        ));
        self.requirements.insert(key, record.clone());
        Ok(())
    }

    pub(crate) fn delete_requirements(&mut self, key: i64) -> Result<(), StateViolation> {
        let record = self
            .requirements
            .remove(&key)
            .ok_or_else(|| StateViolation::not_found("decision requirements", key))?;
        self.requirements_versions.remove(&(
            record.tenant_id,
            record.decision_requirements_id,
            record.version,
            key,
        ));
        Ok(())
    }
}
