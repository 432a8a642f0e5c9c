//! Logged event records as delivered by the replicated log.
//!
//! This module only defines the shape of a record. Producing, appending and
//! replicating records happen outside this crate; the partition consumes
//! them in log order.

use serde::{Deserialize, Serialize};

use crate::intent::Intent;
use crate::value::RecordValue;

/// Schema version stamped on events whose payload shape was never revised.
pub const DEFAULT_RECORD_VERSION: u32 = 1;

/// One immutable event read from a partition's log.
///
/// Replicas replay the same records in the same order, so everything an
/// applier needs must be inside the record itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggedEvent {
    /// Position of the record in the partition log.
    pub position: u64,
    /// Key of the entity the event affects.
    pub key: i64,
    pub intent: Intent,
    /// Schema version of `value`.
    pub record_version: u32,
    pub value: RecordValue,
}

impl LoggedEvent {
    /// Build a record at the default schema version.
    ///
    /// # Examples
    ///
    /// ```
    /// use eventfold_partition::{DEFAULT_RECORD_VERSION, LoggedEvent};
    /// use eventfold_partition::intent::TimerIntent;
    /// use eventfold_partition::value::TimerRecord;
    ///
    /// let event = LoggedEvent::new(7, TimerIntent::Created, TimerRecord::default());
    /// assert_eq!(event.record_version, DEFAULT_RECORD_VERSION);
    /// assert_eq!(event.key, 7);
    /// ```
    pub fn new(key: i64, intent: impl Into<Intent>, value: impl Into<RecordValue>) -> Self {
        Self {
            position: 0,
            key,
            intent: intent.into(),
            record_version: DEFAULT_RECORD_VERSION,
            value: value.into(),
        }
    }

    /// Set the schema version.
    pub fn with_version(mut self, version: u32) -> Self {
        self.record_version = version;
        self
    }

    /// Set the log position.
    pub fn at_position(mut self, position: u64) -> Self {
        self.position = position;
        self
    }
}
