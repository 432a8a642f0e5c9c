use crate::error::StateViolation;
use crate::intent::ValueType;
use crate::state::{ElementInstanceState, ProcessingState, UserTaskPhase, UserTaskState};
use crate::value::{RecordValue, TypedValue, UserTaskRecord};

/// Native user tasks. The owning element instance points at the task for
/// as long as it exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UserTaskApplier {
    Creating,
    Created,
    Canceling,
    Canceled,
    Completing,
    Completed,
}

impl UserTaskApplier {
    pub fn value_type(self) -> ValueType {
        ValueType::UserTask
    }

    pub(crate) fn apply(
        self,
        state: &mut ProcessingState,
        key: i64,
        value: &RecordValue,
    ) -> Result<(), StateViolation> {
        let record = UserTaskRecord::expect_from(value)?;
        let tasks = &mut state.user_tasks;
        let instances = &mut state.element_instances;
        match self {
            Self::Creating => {
                tasks.creating(key, record)?;
                instances.set_user_task_key(record.element_instance_key, Some(key));
                Ok(())
            }
            Self::Created => tasks.transition(key, UserTaskPhase::Created, record),
            Self::Canceling => tasks.transition(key, UserTaskPhase::Canceling, record),
            Self::Completing => tasks.transition(key, UserTaskPhase::Completing, record),
            Self::Canceled => finished(tasks, instances, key, UserTaskPhase::Canceling),
            Self::Completed => finished(tasks, instances, key, UserTaskPhase::Completing),
        }
    }
}

fn finished(
    tasks: &mut UserTaskState,
    instances: &mut ElementInstanceState,
    key: i64,
    from: UserTaskPhase,
) -> Result<(), StateViolation> {
    let task = tasks.remove(key, from)?;
    let element_instance_key = task.record.element_instance_key;
    if instances
        .get(element_instance_key)
        .is_some_and(|instance| instance.user_task_key == Some(key))
    {
        instances.set_user_task_key(element_instance_key, None);
    }
    Ok(())
}
