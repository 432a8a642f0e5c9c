//! Deployments awaiting distribution to the other partitions.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::error::StateViolation;
use crate::value::DeploymentRecord;

const ENTITY: &str = "deployment";

/// Deployments kept until every partition has received them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeploymentState {
    deployments: BTreeMap<i64, DeploymentRecord>,
    /// deployment key -> partitions that have not acknowledged yet
    pending: BTreeMap<i64, BTreeSet<u32>>,
}

impl DeploymentState {
    /// The stored deployment, kept until it is fully distributed.
    pub fn get(&self, key: i64) -> Option<&DeploymentRecord> {
        self.deployments.get(&key)
    }

    /// Whether any partition has not yet acknowledged the deployment.
    pub fn has_pending(&self, key: i64) -> bool {
        self.pending.contains_key(&key)
    }

    pub fn pending_partitions(&self, key: i64) -> impl Iterator<Item = u32> + '_ {
        self.pending.get(&key).into_iter().flatten().copied()
    }

    pub fn len(&self) -> usize {
        self.deployments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.deployments.is_empty() && self.pending.is_empty()
    }

    pub(crate) fn store(&mut self, key: i64, record: &DeploymentRecord) -> Result<(), StateViolation> {
        if self.deployments.contains_key(&key) {
            return Err(StateViolation::already_exists(ENTITY, key));
        }
        self.deployments.insert(key, record.clone());
        Ok(())
    }

    /// Drop a deployment once it is fully distributed. Absence is fine:
    /// partitions that received the deployment never stored it.
    pub(crate) fn remove(&mut self, key: i64) -> Option<DeploymentRecord> {
        self.deployments.remove(&key)
    }

    pub(crate) fn add_pending(&mut self, key: i64, partition_id: u32) {
        self.pending.entry(key).or_default().insert(partition_id);
    }

    pub(crate) fn remove_pending(&mut self, key: i64, partition_id: u32) -> Result<(), StateViolation> {
        let partitions = self
            .pending
            .get_mut(&key)
            .filter(|partitions| partitions.contains(&partition_id))
            .ok_or_else(|| {
                StateViolation::not_found("pending deployment distribution", format!("{key}->{partition_id}"))
            })?;
        partitions.remove(&partition_id);
        if partitions.is_empty() {
            self.pending.remove(&key);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pending_partitions_drain_to_empty() {
        let mut state = DeploymentState::default();
        state.store(1, &DeploymentRecord::default()).unwrap();
        state.add_pending(1, 2);
        state.add_pending(1, 3);
        assert_eq!(state.pending_partitions(1).collect::<Vec<_>>(), vec![2, 3]);

        state.remove_pending(1, 2).unwrap();
        state.remove_pending(1, 3).unwrap();
        assert!(!state.has_pending(1));
        assert!(state.remove_pending(1, 3).is_err());
    }

    #[test]
    fn remove_is_lenient() {
        let mut state = DeploymentState::default();
        assert!(state.remove(1).is_none());
        state.store(1, &DeploymentRecord::default()).unwrap();
        assert!(state.store(1, &DeploymentRecord::default()).is_err());
        assert!(state.remove(1).is_some());
        assert!(state.is_empty());
    }
}
