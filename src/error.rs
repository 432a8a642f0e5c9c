//! Crate-level error types for event application, registry validation and
//! partition processing.

use std::fmt::Display;

use crate::appliers::Applier;
use crate::intent::{Intent, ValueType};

/// An entity precondition that an applier found unmet.
///
/// Well-formed logs never produce one of these. Seeing one means the log is
/// corrupted or an upstream processor wrote an event it should not have, so
/// the partition must stop advancing.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StateViolation {
    /// The event creates an entity that is already present.
    #[error("{entity} {key} already exists")]
    AlreadyExists { entity: &'static str, key: String },

    /// The event refers to an entity that is not present.
    #[error("{entity} {key} does not exist")]
    NotFound { entity: &'static str, key: String },

    /// The entity exists but is not in a phase that allows this transition.
    #[error("{entity} {key} cannot move from {from} to {to}")]
    IllegalTransition {
        entity: &'static str,
        key: String,
        from: String,
        to: String,
    },

    /// The event payload does not carry the value type its intent requires.
    #[error("expected a {expected} value but got {actual}")]
    ValueMismatch {
        expected: ValueType,
        actual: ValueType,
    },
}

impl StateViolation {
    pub(crate) fn already_exists(entity: &'static str, key: impl Display) -> Self {
        Self::AlreadyExists {
            entity,
            key: key.to_string(),
        }
    }

    pub(crate) fn not_found(entity: &'static str, key: impl Display) -> Self {
        Self::NotFound {
            entity,
            key: key.to_string(),
        }
    }

    pub(crate) fn illegal_transition(
        entity: &'static str,
        key: impl Display,
        from: impl std::fmt::Debug,
        to: impl std::fmt::Debug,
    ) -> Self {
        Self::IllegalTransition {
            entity,
            key: key.to_string(),
            from: format!("{from:?}"),
            to: format!("{to:?}"),
        }
    }
}

/// Fatal failure to apply a logged event.
///
/// Carries the offending key, intent and record version so a corrupted log
/// can be root-caused from the error alone.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("cannot apply {intent} (version {version}) to key {key}: {violation}")]
pub struct ApplyError {
    pub key: i64,
    pub intent: Intent,
    pub version: u32,
    #[source]
    pub violation: StateViolation,
}

/// A single problem found by [`EventAppliers::validate`](crate::EventAppliers::validate).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryIssue {
    /// A known intent has no applier for any version.
    #[error("no applier registered for {0}")]
    Missing(Intent),

    /// The same `(intent, version)` was registered more than once.
    #[error("{intent} version {version} was registered more than once")]
    Duplicate { intent: Intent, version: u32 },

    /// Versions start at 1.
    #[error("{intent} registered with invalid version {version}")]
    InvalidVersion { intent: Intent, version: u32 },

    /// The applier handles a different value type than the intent carries.
    #[error("{intent} registered with {applier:?}, which applies another value type")]
    ValueTypeMismatch { intent: Intent, applier: Applier },
}

/// Error returned when the applier registry fails startup validation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    #[error("applier registry failed validation with {} issue(s)", .issues.len())]
    Invalid { issues: Vec<RegistryIssue> },
}

/// Error returned by a running partition.
#[derive(Debug, thiserror::Error)]
pub enum PartitionError {
    /// The record could not be applied; the partition has halted.
    #[error(transparent)]
    Apply(ApplyError),

    /// The partition halted on an earlier record and accepts no more.
    #[error("partition halted after an earlier failure: {0}")]
    Halted(ApplyError),

    /// The registry handed to the partition failed validation.
    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// Snapshot I/O failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The partition actor has exited and no longer accepts messages.
    #[error("partition actor is no longer running")]
    ActorGone,
}
