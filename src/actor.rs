//! Single-writer partition actor.
//!
//! Each partition's [`ProcessingState`] is owned by exactly one thread,
//! which applies records from an ordered `mpsc` channel one at a time.
//! Nothing else can touch the state, so appliers run without locks, and
//! two partitions advance independently on their own threads.
//!
//! Public API: [`PartitionHandle`] (cloneable async handle),
//! [`PartitionConfig`], and [`spawn_partition`].

use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use tokio_stream::{Stream, StreamExt};

use crate::error::{ApplyError, PartitionError};
use crate::event::LoggedEvent;
use crate::registry::{Dispatch, EventAppliers};
use crate::replay::ReplaySummary;
use crate::snapshot::{Snapshot, load_snapshot, save_snapshot};
use crate::state::ProcessingState;

const DEFAULT_CHANNEL_CAPACITY: usize = 32;
const DEFAULT_SNAPSHOT_INTERVAL: u64 = 1000;

/// Configuration for a partition actor.
///
/// # Examples
///
/// ```
/// use eventfold_partition::PartitionConfig;
///
/// let config = PartitionConfig::new(2)
///     .snapshot_dir("/var/lib/engine")
///     .snapshot_interval(500);
/// assert_eq!(config.partition_id, 2);
/// assert_eq!(config.channel_capacity, 32);
/// assert_eq!(config.snapshot_interval, 500);
/// ```
#[derive(Debug, Clone)]
pub struct PartitionConfig {
    /// Identifier of the partition, used in logs and snapshot paths.
    pub partition_id: u32,

    /// Capacity of the inbound record channel. Senders wait when it is full.
    ///
    /// Default: 32.
    pub channel_capacity: usize,

    /// Directory for state snapshots. Without one the partition never
    /// snapshots and always starts empty.
    pub snapshot_dir: Option<PathBuf>,

    /// Number of records between periodic snapshots; 0 disables periodic
    /// snapshots. Has no effect without a `snapshot_dir`.
    ///
    /// Default: 1000.
    pub snapshot_interval: u64,
}

impl Default for PartitionConfig {
    fn default() -> Self {
        Self {
            partition_id: 1,
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
            snapshot_dir: None,
            snapshot_interval: DEFAULT_SNAPSHOT_INTERVAL,
        }
    }
}

impl PartitionConfig {
    /// Default configuration for `partition_id`.
    pub fn new(partition_id: u32) -> Self {
        Self {
            partition_id,
            ..Self::default()
        }
    }

    /// Set the inbound channel capacity.
    ///
    /// # Returns
    ///
    /// `self` for method chaining.
    pub fn channel_capacity(mut self, capacity: usize) -> Self {
        self.channel_capacity = capacity;
        self
    }

    /// Enable snapshots under `dir`.
    ///
    /// On spawn the partition resumes from the snapshot found there, if any.
    ///
    /// # Returns
    ///
    /// `self` for method chaining.
    pub fn snapshot_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.snapshot_dir = Some(dir.into());
        self
    }

    /// Set the number of records between periodic snapshots.
    ///
    /// # Returns
    ///
    /// `self` for method chaining.
    pub fn snapshot_interval(mut self, records: u64) -> Self {
        self.snapshot_interval = records;
        self
    }
}

/// Messages sent from `PartitionHandle` to the actor loop.
///
/// Each variant carries a `oneshot::Sender` for the actor to reply on
/// once the operation completes.
enum PartitionMessage {
    /// Apply one record.
    Apply {
        event: LoggedEvent,
        reply: oneshot::Sender<Result<Dispatch, PartitionError>>,
    },

    /// Apply a batch of records in order, stopping at the first failure.
    Replay {
        events: Vec<LoggedEvent>,
        reply: oneshot::Sender<Result<ReplaySummary, PartitionError>>,
    },

    /// Clone the current state.
    State {
        reply: oneshot::Sender<ProcessingState>,
    },

    /// Position of the last applied record.
    Position { reply: oneshot::Sender<Option<u64>> },

    /// Persist a snapshot now.
    Snapshot {
        reply: oneshot::Sender<Result<(), PartitionError>>,
    },

    /// Persist a final snapshot and stop.
    Shutdown {
        reply: oneshot::Sender<Result<(), PartitionError>>,
    },
}

/// State owned by the actor thread.
struct Partition {
    appliers: Arc<EventAppliers>,
    config: PartitionConfig,
    state: ProcessingState,
    position: Option<u64>,
    /// Set by the first record that fails; no record is applied after it.
    halted: Option<ApplyError>,
    since_snapshot: u64,
}

impl Partition {
    fn apply(&mut self, event: &LoggedEvent) -> Result<Dispatch, PartitionError> {
        if let Some(err) = &self.halted {
            return Err(PartitionError::Halted(err.clone()));
        }

        match self.appliers.apply(&mut self.state, event) {
            Ok(dispatch) => {
                self.position = Some(event.position);
                self.since_snapshot += 1;
                if self.config.snapshot_interval > 0
                    && self.since_snapshot >= self.config.snapshot_interval
                    && let Err(e) = self.save()
                {
                    tracing::warn!(error = %e, "periodic snapshot failed");
                }
                Ok(dispatch)
            }
            Err(err) => {
                tracing::error!(
                    key = err.key,
                    intent = %err.intent,
                    version = err.version,
                    position = event.position,
                    error = %err.violation,
                    "record violates partition state, halting"
                );
                self.halted = Some(err.clone());
                Err(PartitionError::Apply(err))
            }
        }
    }

    fn replay(&mut self, events: &[LoggedEvent]) -> Result<ReplaySummary, PartitionError> {
        let mut summary = ReplaySummary::default();
        for event in events {
            let dispatch = self.apply(event)?;
            summary.record(dispatch, event.position);
        }
        Ok(summary)
    }

    /// Write a snapshot if a directory is configured. A halted partition is
    /// never snapshotted.
    fn save(&mut self) -> Result<(), PartitionError> {
        let Some(dir) = &self.config.snapshot_dir else {
            return Ok(());
        };
        if self.halted.is_some() {
            tracing::debug!("partition halted, not snapshotting");
            return Ok(());
        }
        let snapshot = Snapshot {
            state: self.state.clone(),
            position: self.position,
        };
        save_snapshot(dir, self.config.partition_id, &snapshot)?;
        self.since_snapshot = 0;
        Ok(())
    }
}

/// Runs the partition loop on a dedicated thread.
///
/// Receives messages from `PartitionHandle` via the mpsc channel and
/// processes them sequentially. The loop exits when the channel closes
/// (all senders dropped) or a `Shutdown` message is received.
fn run_partition(mut partition: Partition, mut rx: mpsc::Receiver<PartitionMessage>) {
    let _span = tracing::info_span!("partition", partition_id = partition.config.partition_id)
        .entered();
    tracing::info!(position = ?partition.position, "partition started");

    while let Some(msg) = rx.blocking_recv() {
        match msg {
            PartitionMessage::Apply { event, reply } => {
                // If the receiver was dropped, the caller no longer cares
                // about the result.
                let _ = reply.send(partition.apply(&event));
            }

            PartitionMessage::Replay { events, reply } => {
                let _ = reply.send(partition.replay(&events));
            }

            PartitionMessage::State { reply } => {
                let _ = reply.send(partition.state.clone());
            }

            PartitionMessage::Position { reply } => {
                let _ = reply.send(partition.position);
            }

            PartitionMessage::Snapshot { reply } => {
                let _ = reply.send(partition.save());
            }

            PartitionMessage::Shutdown { reply } => {
                let _ = reply.send(partition.save());
                break;
            }
        }
    }
    tracing::info!(position = ?partition.position, "partition stopped");
}

/// Async handle to a running partition.
///
/// Lightweight, cloneable, and `Send + Sync`. Communicates with the
/// partition thread over a bounded channel; records sent through one
/// handle are applied in the order they are sent.
#[derive(Debug, Clone)]
pub struct PartitionHandle {
    partition_id: u32,
    sender: mpsc::Sender<PartitionMessage>,
}

impl PartitionHandle {
    pub fn partition_id(&self) -> u32 {
        self.partition_id
    }

    /// Apply one logged record.
    ///
    /// # Arguments
    ///
    /// * `event` - The next record of the partition log.
    ///
    /// # Returns
    ///
    /// How the record was dispatched.
    ///
    /// # Errors
    ///
    /// * [`PartitionError::Apply`] -- the record contradicts the state; the
    ///   partition has halted.
    /// * [`PartitionError::Halted`] -- an earlier record halted the partition.
    /// * [`PartitionError::ActorGone`] -- the partition thread has exited.
    pub async fn apply(&self, event: LoggedEvent) -> Result<Dispatch, PartitionError> {
        let (tx, rx) = oneshot::channel();
        self.send(PartitionMessage::Apply { event, reply: tx })
            .await?;
        rx.await.map_err(|_| PartitionError::ActorGone)?
    }

    /// Apply a batch of records in order as one message.
    ///
    /// # Errors
    ///
    /// Same as [`apply`](Self::apply); records before the failing one stay
    /// applied.
    pub async fn replay(&self, events: Vec<LoggedEvent>) -> Result<ReplaySummary, PartitionError> {
        let (tx, rx) = oneshot::channel();
        self.send(PartitionMessage::Replay { events, reply: tx })
            .await?;
        rx.await.map_err(|_| PartitionError::ActorGone)?
    }

    /// Apply every record of `events` in order, e.g. while catching up from
    /// the durable log.
    ///
    /// # Errors
    ///
    /// Stops at and returns the first error; see [`apply`](Self::apply).
    pub async fn replay_stream<S>(&self, events: S) -> Result<ReplaySummary, PartitionError>
    where
        S: Stream<Item = LoggedEvent>,
    {
        let mut summary = ReplaySummary::default();
        tokio::pin!(events);
        while let Some(event) = events.next().await {
            let position = event.position;
            let dispatch = self.apply(event).await?;
            summary.record(dispatch, position);
        }
        Ok(summary)
    }

    /// A copy of the current partition state.
    ///
    /// A halted partition still answers with the state it halted in.
    ///
    /// # Errors
    ///
    /// Returns [`PartitionError::ActorGone`] if the partition thread has exited.
    pub async fn state(&self) -> Result<ProcessingState, PartitionError> {
        let (tx, rx) = oneshot::channel();
        self.send(PartitionMessage::State { reply: tx }).await?;
        rx.await.map_err(|_| PartitionError::ActorGone)
    }

    /// Log position of the last applied record, or `None` before the first.
    ///
    /// After resuming from a snapshot this is the snapshot's position; feed
    /// records after it.
    ///
    /// # Errors
    ///
    /// Returns [`PartitionError::ActorGone`] if the partition thread has exited.
    pub async fn position(&self) -> Result<Option<u64>, PartitionError> {
        let (tx, rx) = oneshot::channel();
        self.send(PartitionMessage::Position { reply: tx }).await?;
        rx.await.map_err(|_| PartitionError::ActorGone)
    }

    /// Persist a snapshot now. Does nothing without a snapshot directory.
    ///
    /// # Errors
    ///
    /// * [`PartitionError::Io`] -- writing the snapshot failed.
    /// * [`PartitionError::ActorGone`] -- the partition thread has exited.
    pub async fn snapshot(&self) -> Result<(), PartitionError> {
        let (tx, rx) = oneshot::channel();
        self.send(PartitionMessage::Snapshot { reply: tx }).await?;
        rx.await.map_err(|_| PartitionError::ActorGone)?
    }

    /// Persist a final snapshot and stop the partition thread.
    ///
    /// # Errors
    ///
    /// * [`PartitionError::Io`] -- writing the final snapshot failed; the
    ///   partition stops anyway.
    /// * [`PartitionError::ActorGone`] -- the partition thread had already exited.
    pub async fn shutdown(&self) -> Result<(), PartitionError> {
        let (tx, rx) = oneshot::channel();
        self.send(PartitionMessage::Shutdown { reply: tx }).await?;
        rx.await.map_err(|_| PartitionError::ActorGone)?
    }

    /// Check whether the partition thread is still running.
    pub fn is_alive(&self) -> bool {
        !self.sender.is_closed()
    }

    async fn send(&self, msg: PartitionMessage) -> Result<(), PartitionError> {
        self.sender
            .send(msg)
            .await
            .map_err(|_| PartitionError::ActorGone)
    }
}

/// Spawn the single writer for one partition.
///
/// Validates the registry, loads the latest snapshot when a snapshot
/// directory is configured, and starts the partition loop on a dedicated
/// thread.
///
/// # Arguments
///
/// * `appliers` - The registry to dispatch with, shared between partitions.
/// * `config` - Partition configuration.
///
/// # Returns
///
/// A [`PartitionHandle`] for feeding records and reading state.
///
/// # Errors
///
/// * [`PartitionError::Registry`] -- the registry failed validation.
/// * [`PartitionError::Io`] -- reading an existing snapshot failed.
pub fn spawn_partition(
    appliers: Arc<EventAppliers>,
    config: PartitionConfig,
) -> Result<PartitionHandle, PartitionError> {
    appliers.validate()?;

    let (state, position) = match &config.snapshot_dir {
        Some(dir) => match load_snapshot(dir, config.partition_id)? {
            Some(snapshot) => (snapshot.state, snapshot.position),
            None => (ProcessingState::new(), None),
        },
        None => (ProcessingState::new(), None),
    };

    let partition_id = config.partition_id;
    let (tx, rx) = mpsc::channel(config.channel_capacity.max(1));
    let partition = Partition {
        appliers,
        config,
        state,
        position,
        halted: None,
        since_snapshot: 0,
    };

    std::thread::spawn(move || run_partition(partition, rx));

    Ok(PartitionHandle {
        partition_id,
        sender: tx,
    })
}
