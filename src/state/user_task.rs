//! User tasks and their lifecycle.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::StateViolation;
use crate::value::UserTaskRecord;

const ENTITY: &str = "user task";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UserTaskPhase {
    Creating,
    Created,
    Canceling,
    Completing,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserTask {
    pub phase: UserTaskPhase,
    pub record: UserTaskRecord,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserTaskState {
    tasks: BTreeMap<i64, UserTask>,
}

impl UserTaskState {
    /// The user task with its current phase.
    pub fn get(&self, key: i64) -> Option<&UserTask> {
        self.tasks.get(&key)
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub(crate) fn creating(&mut self, key: i64, record: &UserTaskRecord) -> Result<(), StateViolation> {
        if self.tasks.contains_key(&key) {
            return Err(StateViolation::already_exists(ENTITY, key));
        }
        self.tasks.insert(
            key,
            UserTask {
                phase: UserTaskPhase::Creating,
                record: record.clone(),
            },
        );
        Ok(())
    }

    pub(crate) fn transition(
        &mut self,
        key: i64,
        next: UserTaskPhase,
        record: &UserTaskRecord,
    ) -> Result<(), StateViolation> {
        use UserTaskPhase::*;
        let task = self
            .tasks
            .get_mut(&key)
            .ok_or_else(|| StateViolation::not_found(ENTITY, key))?;
        let allowed = matches!(
            (task.phase, next),
            (Creating, Created) | (Created, Canceling) | (Created, Completing)
        );
        if !allowed {
            return Err(StateViolation::illegal_transition(ENTITY, key, task.phase, next));
        }
        task.phase = next;
        task.record = record.clone();
        Ok(())
    }

    /// Remove a task that finished from `expected`.
    pub(crate) fn remove(&mut self, key: i64, expected: UserTaskPhase) -> Result<UserTask, StateViolation> {
        let phase = self
            .tasks
            .get(&key)
            .map(|task| task.phase)
            .ok_or_else(|| StateViolation::not_found(ENTITY, key))?;
        if phase != expected {
            return Err(StateViolation::IllegalTransition {
                entity: ENTITY,
                key: key.to_string(),
                from: format!("{phase:?}"),
                to: format!("removed (expected {expected:?})"),
            });
        }
        self.tasks
            .remove(&key)
            .ok_or_else(|| StateViolation::not_found(ENTITY, key))
    }
}
