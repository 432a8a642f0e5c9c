//! Synchronous replay of an ordered record sequence.
//!
//! Replay is a left fold of [`EventAppliers::apply`] over the records. It
//! takes the same path as live processing, so rebuilding a partition from
//! its log yields exactly the state the live partition had.

use std::borrow::Borrow;

use crate::error::ApplyError;
use crate::event::LoggedEvent;
use crate::registry::{Dispatch, EventAppliers};
use crate::state::ProcessingState;

/// Counts of what a replay did with each record.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReplaySummary {
    pub applied: u64,
    pub ignored: u64,
    pub unrecognized: u64,
    /// Position of the last record replayed, if any.
    pub last_position: Option<u64>,
}

impl ReplaySummary {
    /// Total number of records replayed.
    pub fn records(&self) -> u64 {
        self.applied + self.ignored + self.unrecognized
    }

    pub(crate) fn record(&mut self, dispatch: Dispatch, position: u64) {
        match dispatch {
            Dispatch::Applied => self.applied += 1,
            Dispatch::Ignored => self.ignored += 1,
            Dispatch::Unrecognized => self.unrecognized += 1,
        }
        self.last_position = Some(position);
    }
}

/// Rebuild partition state from scratch.
///
/// # Arguments
///
/// * `appliers` - The registry to dispatch with.
/// * `events` - Records in log order.
///
/// # Errors
///
/// Returns the [`ApplyError`] of the first record that cannot be applied.
///
/// # Examples
///
/// ```
/// use eventfold_partition::{EventAppliers, LoggedEvent, replay};
/// use eventfold_partition::intent::CommandDistributionIntent;
/// use eventfold_partition::intent::ValueType;
/// use eventfold_partition::value::CommandDistributionRecord;
///
/// let record = CommandDistributionRecord {
///     partition_id: 1,
///     value_type: ValueType::Deployment,
///     intent: "CREATE".into(),
///     command_value: serde_json::json!({}),
/// };
/// let log = vec![LoggedEvent::new(9, CommandDistributionIntent::Started, record)];
///
/// let state = replay(&EventAppliers::with_default_appliers(), &log).unwrap();
/// assert!(state.distributions().get(9).is_some());
/// ```
pub fn replay<I>(appliers: &EventAppliers, events: I) -> Result<ProcessingState, ApplyError>
where
    I: IntoIterator,
    I::Item: Borrow<LoggedEvent>,
{
    let mut state = ProcessingState::new();
    replay_into(appliers, &mut state, events)?;
    Ok(state)
}

/// Apply `events` on top of existing state, e.g. after loading a snapshot.
///
/// Stops at the first record that cannot be applied; records before it
/// remain applied.
///
/// # Errors
///
/// Returns the [`ApplyError`] of the failing record.
pub fn replay_into<I>(
    appliers: &EventAppliers,
    state: &mut ProcessingState,
    events: I,
) -> Result<ReplaySummary, ApplyError>
where
    I: IntoIterator,
    I::Item: Borrow<LoggedEvent>,
{
    let mut summary = ReplaySummary::default();
    for event in events {
        let event = event.borrow();
        let dispatch = appliers.apply(state, event)?;
        summary.record(dispatch, event.position);
    }
    tracing::debug!(
        applied = summary.applied,
        ignored = summary.ignored,
        unrecognized = summary.unrecognized,
        "replay finished"
    );
    Ok(summary)
}
