//! Deterministic event application for the partitions of a workflow engine.
//!
//! Every replica of a partition replays the same ordered log of
//! [`LoggedEvent`]s through the same [`EventAppliers`] registry and so
//! derives the same [`ProcessingState`]. [`spawn_partition`] runs that
//! replay on a single-writer actor.

mod actor;
pub use actor::{PartitionConfig, PartitionHandle, spawn_partition};
pub mod appliers;
mod error;
mod event;
pub mod intent;
mod registry;
mod replay;
mod snapshot;
pub mod state;
pub mod value;

pub use appliers::Applier;
pub use error::{ApplyError, PartitionError, RegistryError, RegistryIssue, StateViolation};
pub use event::{DEFAULT_RECORD_VERSION, LoggedEvent};
pub use intent::{Intent, ValueType};
pub use registry::{Dispatch, EventAppliers, Resolution};
pub use replay::{ReplaySummary, replay, replay_into};
pub use snapshot::{Snapshot, load_snapshot, save_snapshot, snapshot_path};
pub use state::ProcessingState;
