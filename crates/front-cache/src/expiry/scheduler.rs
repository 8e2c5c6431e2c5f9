//! Background expiry scheduler.

use std::collections::{BTreeMap, HashMap};
use std::sync::Weak;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::time::{Instant, sleep_until};
use tracing::{debug, info};

use crate::cache::Table;
use crate::error::CacheError;
use crate::metrics::EvictionReason;

/// Commands sent from the cache to the scheduler task.
#[derive(Debug)]
enum Command {
    Schedule {
        key: String,
        entry_id: u64,
        deadline: Instant,
    },
    Cancel {
        entry_id: u64,
    },
}

/// Handle for controlling a running expiry scheduler.
pub(crate) struct ExpiryHandle {
    /// Sender for schedule/cancel commands.
    commands: mpsc::UnboundedSender<Command>,
    /// Sender to signal shutdown.
    shutdown_tx: watch::Sender<bool>,
}

impl ExpiryHandle {
    /// Schedules eviction of entry `entry_id` under `key` once `ttl` has
    /// elapsed from now.
    pub(crate) fn schedule(
        &self,
        key: &str,
        entry_id: u64,
        ttl: Duration,
    ) -> Result<(), CacheError> {
        if self.is_stopped() {
            return Err(CacheError::SchedulerStopped);
        }

        let Some(deadline) = Instant::now().checked_add(ttl) else {
            debug!(key = %key, ttl = ?ttl, "TTL out of range, entry never expires");
            return Ok(());
        };

        self.commands
            .send(Command::Schedule {
                key: key.to_string(),
                entry_id,
                deadline,
            })
            .map_err(|_| CacheError::SchedulerStopped)
    }

    /// Cancels the pending eviction of `entry_id`, if any.
    pub(crate) fn cancel(&self, entry_id: u64) {
        let _ = self.commands.send(Command::Cancel { entry_id });
    }

    /// Signals the scheduler to stop. Pending evictions are dropped.
    pub(crate) fn stop(&self) {
        let _ = self.shutdown_tx.send(true);
    }

    /// Returns true once the scheduler was stopped or its task has exited.
    pub(crate) fn is_stopped(&self) -> bool {
        *self.shutdown_tx.borrow() || self.commands.is_closed()
    }
}

impl Drop for ExpiryHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Background scheduler evicting entries when their TTL elapses.
pub(crate) struct ExpiryScheduler {
    /// The table entries are evicted from.
    table: Weak<Table>,
    /// Pending evictions ordered by deadline.
    queue: BTreeMap<(Instant, u64), String>,
    /// Deadline of each pending entry, for cancellation.
    deadlines: HashMap<u64, Instant>,
}

impl ExpiryScheduler {
    /// Creates a new scheduler for the given table.
    pub(crate) fn new(table: Weak<Table>) -> Self {
        Self {
            table,
            queue: BTreeMap::new(),
            deadlines: HashMap::new(),
        }
    }

    /// Starts the background expiry task.
    ///
    /// Must be called from within a Tokio runtime. Returns a handle used to
    /// schedule evictions and to stop the scheduler.
    pub(crate) fn start(self) -> ExpiryHandle {
        let (commands, commands_rx) = mpsc::unbounded_channel();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = ExpiryHandle {
            commands,
            shutdown_tx,
        };

        tokio::spawn(self.run(commands_rx, shutdown_rx));

        handle
    }

    /// Runs the scheduler loop.
    async fn run(
        mut self,
        mut commands: mpsc::UnboundedReceiver<Command>,
        mut shutdown_rx: watch::Receiver<bool>,
    ) {
        info!("Starting expiry scheduler");

        loop {
            let next = self.next_deadline();

            tokio::select! {
                command = commands.recv() => match command {
                    Some(command) => self.apply(command),
                    None => {
                        debug!("Expiry handle dropped");
                        break;
                    },
                },
                _ = sleep_until(next.unwrap_or_else(far_future)), if next.is_some() => {
                    self.expire_due(Instant::now());
                }
                result = shutdown_rx.changed() => {
                    if result.is_err() || *shutdown_rx.borrow() {
                        info!(pending = self.queue.len(), "Expiry scheduler shutting down");
                        break;
                    }
                }
            }
        }
    }

    /// Applies a single command.
    fn apply(&mut self, command: Command) {
        match command {
            Command::Schedule {
                key,
                entry_id,
                deadline,
            } => {
                self.remove_pending(entry_id);
                self.deadlines.insert(entry_id, deadline);
                self.queue.insert((deadline, entry_id), key);
            },
            Command::Cancel { entry_id } => self.remove_pending(entry_id),
        }
    }

    fn remove_pending(&mut self, entry_id: u64) {
        if let Some(deadline) = self.deadlines.remove(&entry_id) {
            self.queue.remove(&(deadline, entry_id));
        }
    }

    /// Returns the earliest pending deadline.
    fn next_deadline(&self) -> Option<Instant> {
        self.queue.first_key_value().map(|((deadline, _), _)| *deadline)
    }

    /// Evicts every entry whose deadline is at or before `now`.
    /// Returns the number of entries actually removed from the table.
    fn expire_due(&mut self, now: Instant) -> usize {
        let table = self.table.upgrade();
        let mut expired = 0;

        while let Some(pending) = self.queue.first_entry() {
            if pending.key().0 > now {
                break;
            }

            let ((_, entry_id), key) = pending.remove_entry();
            self.deadlines.remove(&entry_id);

            // Only the scheduled entry object is removed, never a newer one.
            if let Some(table) = &table
                && table.evict(&key, entry_id, EvictionReason::Ttl)
            {
                debug!(key = %key, entry_id, "Entry expired");
                expired += 1;
            }
        }

        expired
    }

    /// Returns the number of pending evictions.
    #[cfg(test)]
    fn pending(&self) -> usize {
        self.queue.len()
    }
}

fn far_future() -> Instant {
    Instant::now() + Duration::from_secs(86400 * 365 * 30)
}
