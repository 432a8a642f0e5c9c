//! The applier catalogue.
//!
//! An applier is the state transition for one `(intent, version)` pair. The
//! catalogue is a closed set: each domain has its own enum of transitions,
//! and [`Applier`] wraps them all plus the [`Applier::Noop`] sentinel. A
//! registry entry is therefore a plain `Copy` value, and dispatching one is
//! an exhaustive `match`.
//!
//! Each transition is written as a free function that borrows exactly the
//! state partitions it touches. The domain enums destructure
//! [`ProcessingState`] into those borrows, so the set of partitions an
//! event can change is visible in the function signature.
//!
//! Appliers never block, never perform I/O, and never consult anything but
//! the record and the partitions they borrow.

mod banned_instance;
mod deployment;
mod distribution;
mod incident;
mod job;
mod message;
mod process;
mod process_instance;
mod resource;
mod signal;
mod subscription;
mod timer;
mod user_task;
mod variable;

pub use banned_instance::ErrorApplier;
pub use deployment::DeploymentApplier;
pub use distribution::DistributionApplier;
pub use incident::IncidentApplier;
pub use job::JobApplier;
pub use message::{MessageApplier, MessageStartEventSubscriptionApplier};
pub use process::ProcessApplier;
pub use process_instance::{ProcessEventApplier, ProcessInstanceApplier};
pub use resource::{DecisionApplier, FormApplier};
pub use signal::SignalSubscriptionApplier;
pub use subscription::{MessageSubscriptionApplier, ProcessMessageSubscriptionApplier};
pub use timer::TimerApplier;
pub use user_task::UserTaskApplier;
pub use variable::VariableApplier;

use crate::error::StateViolation;
use crate::intent::ValueType;
use crate::state::ProcessingState;
use crate::value::RecordValue;

/// Declares [`Applier`] over the per-domain applier enums, with value-type
/// lookup, dispatch, and `From` conversions.
macro_rules! appliers {
    ($($variant:ident($inner:ty)),+ $(,)?) => {
        /// A registered state transition.
        ///
        /// `Noop` is a first-class entry: registering it for a version says
        /// "known, and intentionally without effect". It is also what the
        /// registry falls back to for versions nobody registered.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum Applier {
            Noop,
            $($variant($inner)),+
        }

        impl Applier {
            /// The value type this applier reads, or `None` for `Noop`,
            /// which accepts any record.
            pub fn value_type(self) -> Option<ValueType> {
                match self {
                    Self::Noop => None,
                    $(Self::$variant(applier) => Some(applier.value_type())),+
                }
            }

            /// Apply one record to the partition state.
            ///
            /// # Errors
            ///
            /// Returns a [`StateViolation`] when the record contradicts the
            /// current state or carries the wrong value type.
            pub(crate) fn apply(
                self,
                state: &mut ProcessingState,
                key: i64,
                value: &RecordValue,
            ) -> Result<(), StateViolation> {
                match self {
                    Self::Noop => Ok(()),
                    $(Self::$variant(applier) => applier.apply(state, key, value)),+
                }
            }
        }

        $(
            impl From<$inner> for Applier {
                fn from(applier: $inner) -> Self {
                    Self::$variant(applier)
                }
            }
        )+
    };
}

appliers!(
    Process(ProcessApplier),
    ProcessInstance(ProcessInstanceApplier),
    ProcessEvent(ProcessEventApplier),
    Job(JobApplier),
    Timer(TimerApplier),
    Message(MessageApplier),
    MessageSubscription(MessageSubscriptionApplier),
    ProcessMessageSubscription(ProcessMessageSubscriptionApplier),
    MessageStartEventSubscription(MessageStartEventSubscriptionApplier),
    Incident(IncidentApplier),
    Variable(VariableApplier),
    Deployment(DeploymentApplier),
    Decision(DecisionApplier),
    Form(FormApplier),
    UserTask(UserTaskApplier),
    SignalSubscription(SignalSubscriptionApplier),
    Distribution(DistributionApplier),
    Error(ErrorApplier),
);

impl Applier {
    pub fn is_noop(self) -> bool {
        self == Self::Noop
    }
}
