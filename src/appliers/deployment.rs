use crate::error::StateViolation;
use crate::intent::ValueType;
use crate::state::{DecisionState, FormState, ProcessState, ProcessingState};
use crate::value::{DeploymentDistributionRecord, DeploymentRecord, RecordValue, TypedValue};

/// Deployments and their distribution to the other partitions.
///
/// Only the partition that accepted a deployment stores it; the copy is
/// dropped once every other partition has received it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeploymentApplier {
    Created,
    /// A deployment arrived from another partition.
    Distributed,
    FullyDistributed,
    DistributionDistributing,
    DistributionCompleted,
}

impl DeploymentApplier {
    pub fn value_type(self) -> ValueType {
        match self {
            Self::DistributionDistributing | Self::DistributionCompleted => {
                ValueType::DeploymentDistribution
            }
            _ => ValueType::Deployment,
        }
    }

    pub(crate) fn apply(
        self,
        state: &mut ProcessingState,
        key: i64,
        value: &RecordValue,
    ) -> Result<(), StateViolation> {
        let deployments = &mut state.deployments;
        match self {
            Self::Created => deployments.store(key, DeploymentRecord::expect_from(value)?),
            Self::Distributed => distributed(
                &mut state.processes,
                &mut state.decisions,
                &mut state.forms,
                DeploymentRecord::expect_from(value)?,
            ),
            Self::FullyDistributed => {
                DeploymentRecord::expect_from(value)?;
                deployments.remove(key);
                Ok(())
            }
            Self::DistributionDistributing => {
                let record = DeploymentDistributionRecord::expect_from(value)?;
                deployments.add_pending(key, record.partition_id);
                Ok(())
            }
            Self::DistributionCompleted => {
                let record = DeploymentDistributionRecord::expect_from(value)?;
                deployments.remove_pending(key, record.partition_id)
            }
        }
    }
}

/// Put every resource this partition does not know yet. A resource can
/// already be present when the same deployment is distributed twice.
fn distributed(
    processes: &mut ProcessState,
    decisions: &mut DecisionState,
    forms: &mut FormState,
    record: &DeploymentRecord,
) -> Result<(), StateViolation> {
    for process in &record.processes {
        if processes.get(process.process_definition_key).is_none() {
            processes.put(process)?;
        }
    }
    for requirements in &record.decision_requirements {
        if decisions
            .requirements(requirements.decision_requirements_key)
            .is_none()
        {
            decisions.put_requirements(requirements)?;
        }
    }
    for decision in &record.decisions {
        if decisions.decision(decision.decision_key).is_none() {
            decisions.put_decision(decision)?;
        }
    }
    for form in &record.forms {
        if forms.get(form.form_key).is_none() {
            forms.put(form)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::{DecisionRecord, ProcessRecord};

    fn deployment() -> DeploymentRecord {
        DeploymentRecord {
            processes: vec![ProcessRecord {
                bpmn_process_id: "order".into(),
                version: 1,
                process_definition_key: 100,
                ..ProcessRecord::default()
            }],
            decisions: vec![DecisionRecord {
                decision_id: "risk".into(),
                version: 1,
                decision_key: 300,
                decision_requirements_key: 200,
                ..DecisionRecord::default()
            }],
            ..DeploymentRecord::default()
        }
    }

    #[test]
    fn distributed_deployment_is_idempotent_per_resource() {
        let mut state = ProcessingState::new();
        let value = RecordValue::from(deployment());
        DeploymentApplier::Distributed.apply(&mut state, 1, &value).unwrap();
        DeploymentApplier::Distributed.apply(&mut state, 1, &value).unwrap();

        assert_eq!(state.processes().len(), 1);
        assert_eq!(state.decisions().latest_decision("", "risk").unwrap().decision_key, 300);
        assert!(state.deployments().is_empty());
    }

    #[test]
    fn created_then_fully_distributed() {
        let mut state = ProcessingState::new();
        let value = RecordValue::from(deployment());
        DeploymentApplier::Created.apply(&mut state, 1, &value).unwrap();
        assert!(state.deployments().get(1).is_some());

        DeploymentApplier::FullyDistributed.apply(&mut state, 1, &value).unwrap();
        assert!(state.deployments().is_empty());
        // Partitions that only received the deployment never stored it.
        DeploymentApplier::FullyDistributed.apply(&mut state, 1, &value).unwrap();
    }

    #[test]
    fn distribution_tracks_pending_partitions() {
        let mut state = ProcessingState::new();
        for partition_id in [2, 3] {
            DeploymentApplier::DistributionDistributing
                .apply(
                    &mut state,
                    1,
                    &DeploymentDistributionRecord { partition_id }.into(),
                )
                .unwrap();
        }
        assert_eq!(state.deployments().pending_partitions(1).collect::<Vec<_>>(), vec![2, 3]);

        DeploymentApplier::DistributionCompleted
            .apply(&mut state, 1, &DeploymentDistributionRecord { partition_id: 2 }.into())
            .unwrap();
        assert!(state.deployments().has_pending(1));
        DeploymentApplier::DistributionCompleted
            .apply(&mut state, 1, &DeploymentDistributionRecord { partition_id: 3 }.into())
            .unwrap();
        assert!(!state.deployments().has_pending(1));

        assert!(
            DeploymentApplier::DistributionCompleted
                .apply(&mut state, 1, &DeploymentDistributionRecord { partition_id: 3 }.into())
                .is_err()
        );
    }
}
