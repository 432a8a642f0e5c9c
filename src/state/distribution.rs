//! Commands fanned out to other partitions and their acknowledgements.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::error::StateViolation;
use crate::value::CommandDistributionRecord;

const ENTITY: &str = "command distribution";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DistributionPhase {
    Started,
    Distributing,
    Acknowledged,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandDistribution {
    pub phase: DistributionPhase,
    /// The command being distributed, as recorded when distribution started.
    pub record: CommandDistributionRecord,
    pub pending: BTreeSet<u32>,
    pub acknowledged: BTreeSet<u32>,
}

/// Commands being sent to other partitions, keyed by distribution key.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DistributionState {
    distributions: BTreeMap<i64, CommandDistribution>,
}

impl DistributionState {
    /// The distribution with key `key`, absent once it has finished.
    pub fn get(&self, key: i64) -> Option<&CommandDistribution> {
        self.distributions.get(&key)
    }

    /// Whether some target partition has not acknowledged yet.
    pub fn has_pending(&self, key: i64) -> bool {
        self.distributions
            .get(&key)
            .is_some_and(|d| !d.pending.is_empty())
    }

    pub fn len(&self) -> usize {
        self.distributions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.distributions.is_empty()
    }

    pub(crate) fn start(&mut self, key: i64, record: &CommandDistributionRecord) -> Result<(), StateViolation> {
        if self.distributions.contains_key(&key) {
            return Err(StateViolation::already_exists(ENTITY, key));
        }
        self.distributions.insert(
            key,
            CommandDistribution {
                phase: DistributionPhase::Started,
                record: record.clone(),
                pending: BTreeSet::new(),
                acknowledged: BTreeSet::new(),
            },
        );
        Ok(())
    }

    pub(crate) fn distributing(&mut self, key: i64, partition_id: u32) -> Result<(), StateViolation> {
        let distribution = self.get_mut(key)?;
        if !matches!(
            distribution.phase,
            DistributionPhase::Started | DistributionPhase::Distributing
        ) {
            return Err(StateViolation::illegal_transition(
                ENTITY,
                key,
                distribution.phase,
                DistributionPhase::Distributing,
            ));
        }
        distribution.phase = DistributionPhase::Distributing;
        distribution.pending.insert(partition_id);
        Ok(())
    }

    /// Record a partition's acknowledgement. Repeated acknowledgements from
    /// the same partition are tolerated.
    pub(crate) fn acknowledged(&mut self, key: i64, partition_id: u32) -> Result<(), StateViolation> {
        let distribution = self.get_mut(key)?;
        if !matches!(
            distribution.phase,
            DistributionPhase::Distributing | DistributionPhase::Acknowledged
        ) {
            return Err(StateViolation::illegal_transition(
                ENTITY,
                key,
                distribution.phase,
                DistributionPhase::Acknowledged,
            ));
        }
        distribution.phase = DistributionPhase::Acknowledged;
        distribution.pending.remove(&partition_id);
        distribution.acknowledged.insert(partition_id);
        Ok(())
    }

    pub(crate) fn finish(&mut self, key: i64) -> Result<CommandDistribution, StateViolation> {
        self.distributions
            .remove(&key)
            .ok_or_else(|| StateViolation::not_found(ENTITY, key))
    }

    fn get_mut(&mut self, key: i64) -> Result<&mut CommandDistribution, StateViolation> {
        self.distributions
            .get_mut(&key)
            .ok_or_else(|| StateViolation::not_found(ENTITY, key))
    }
}
