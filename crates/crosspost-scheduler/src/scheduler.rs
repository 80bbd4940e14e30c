//! Job scheduler implementation.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use chrono::{DateTime, NaiveTime, Utc};
use tokio::sync::{Mutex, Notify, RwLock, watch};
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{debug, error, info};
use uuid::Uuid;

use crosspost_store::Repeat;

use crate::{SchedulerError, Trigger};

/// Maximum sleep duration between execution-clock checks.
const MAX_SLEEP_SECS: u64 = 60;

/// Type alias for a job callback.
///
/// Callbacks run as spawned tasks; an `Err` is logged at the invocation
/// boundary and never cancels the job's future recurrences.
pub type JobCallback =
    Arc<dyn Fn() -> Pin<Box<dyn Future<Output = Result<(), String>> + Send>> + Send + Sync>;

/// An armed job: its trigger plus the callback to invoke at fire time.
struct JobEntry {
    trigger: Trigger,
    callback: JobCallback,
}

/// State shared between the scheduler handle and the execution clock.
struct Shared {
    /// Job registry. The lock is held only for map mutation, never
    /// across a callback invocation.
    jobs: RwLock<HashMap<Uuid, JobEntry>>,
    /// Wakes the execution clock when the registry changes.
    wake: Notify,
    /// Spawned callback invocations, awaited by `shutdown(wait = true)`.
    in_flight: Mutex<Vec<JoinHandle<()>>>,
}

/// The job scheduler.
///
/// One background execution clock drives all armed triggers. `schedule`
/// replaces any existing job with the same id before arming the new
/// trigger, so there are never two live timers for one id.
pub struct Scheduler {
    shared: Arc<Shared>,
    shutdown_tx: watch::Sender<bool>,
    clock: Mutex<Option<JoinHandle<()>>>,
}

impl Scheduler {
    /// Create a scheduler and start its execution clock.
    pub fn new() -> Self {
        let shared = Arc::new(Shared {
            jobs: RwLock::new(HashMap::new()),
            wake: Notify::new(),
            in_flight: Mutex::new(Vec::new()),
        });

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let clock = tokio::spawn(run_clock(Arc::clone(&shared), shutdown_rx));

        Self {
            shared,
            shutdown_tx,
            clock: Mutex::new(Some(clock)),
        }
    }

    /// Arm a job to fire at `when` and then recur per `repeat`.
    ///
    /// If `job_id` is already armed, the old trigger is cancelled first.
    pub async fn schedule(
        &self,
        job_id: Uuid,
        when: DateTime<Utc>,
        repeat: Repeat,
        callback: JobCallback,
    ) -> Result<(), SchedulerError> {
        let trigger = Trigger::starting_at(when, repeat)?;
        self.arm(job_id, trigger, callback).await
    }

    /// Arm a recurring job from its first occurrence strictly after `now`.
    ///
    /// Used when the originally intended first run has already passed,
    /// e.g. for a repeating job rehydrated after a restart. `now`
    /// defaults to the wall clock.
    pub async fn schedule_after(
        &self,
        job_id: Uuid,
        repeat: Repeat,
        callback: JobCallback,
        anchor: Option<NaiveTime>,
        now: Option<DateTime<Utc>>,
    ) -> Result<(), SchedulerError> {
        let trigger = Trigger::first_after(repeat, anchor, now.unwrap_or_else(Utc::now))?;
        self.arm(job_id, trigger, callback).await
    }

    async fn arm(
        &self,
        job_id: Uuid,
        trigger: Trigger,
        callback: JobCallback,
    ) -> Result<(), SchedulerError> {
        if *self.shutdown_tx.borrow() {
            return Err(SchedulerError::ShutDown);
        }

        {
            let mut jobs = self.shared.jobs.write().await;
            // Replace semantics: inserting drops any superseded entry,
            // so its trigger can never fire once the new one is armed.
            let replaced = jobs.insert(job_id, JobEntry { trigger, callback }).is_some();
            debug!(
                job_id = %job_id,
                next_fire = %trigger.next_fire,
                replaced,
                "armed job"
            );
        }

        self.shared.wake.notify_one();
        Ok(())
    }

    /// Cancel a job, stopping all future firings.
    ///
    /// Idempotent: returns whether a job existed. Does not interrupt a
    /// callback that is already executing.
    pub async fn cancel(&self, job_id: Uuid) -> bool {
        let existed = self.shared.jobs.write().await.remove(&job_id).is_some();
        if existed {
            debug!(job_id = %job_id, "cancelled job");
            self.shared.wake.notify_one();
        }
        existed
    }

    /// Whether a job is currently armed.
    pub async fn is_scheduled(&self, job_id: Uuid) -> bool {
        self.shared.jobs.read().await.contains_key(&job_id)
    }

    /// The next fire time of an armed job.
    pub async fn next_fire_time(&self, job_id: Uuid) -> Option<DateTime<Utc>> {
        self.shared
            .jobs
            .read()
            .await
            .get(&job_id)
            .map(|entry| entry.trigger.next_fire)
    }

    /// Number of armed jobs.
    pub async fn job_count(&self) -> usize {
        self.shared.jobs.read().await.len()
    }

    /// Stop the execution clock.
    ///
    /// With `wait == true`, blocks until the clock has exited and all
    /// in-flight callback invocations have completed. Otherwise returns
    /// immediately; in-flight callbacks still run to completion.
    pub async fn shutdown(&self, wait: bool) {
        // send only fails once the clock has already exited
        let _ = self.shutdown_tx.send(true);
        info!("scheduler shutting down");

        if wait {
            if let Some(clock) = self.clock.lock().await.take() {
                let _ = clock.await;
            }
            let handles: Vec<_> = self.shared.in_flight.lock().await.drain(..).collect();
            for handle in handles {
                let _ = handle.await;
            }
            info!("scheduler shut down, in-flight jobs drained");
        }
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

/// The execution clock: fires due triggers, then sleeps until the next
/// one (capped, and re-woken on any registry change).
async fn run_clock(shared: Arc<Shared>, mut shutdown_rx: watch::Receiver<bool>) {
    info!("execution clock starting");

    loop {
        if *shutdown_rx.borrow() {
            break;
        }

        let now = Utc::now();
        let due = collect_due(&shared, now).await;

        for (job_id, callback) in due {
            let handle = tokio::spawn(async move {
                if let Err(e) = callback().await {
                    error!(job_id = %job_id, error = %e, "job callback failed");
                }
            });

            let mut in_flight = shared.in_flight.lock().await;
            in_flight.retain(|h| !h.is_finished());
            in_flight.push(handle);
        }

        let duration = sleep_duration(&shared, Utc::now()).await;
        tokio::select! {
            _ = shutdown_rx.changed() => {}
            _ = shared.wake.notified() => {}
            _ = sleep(duration) => {}
        }
    }

    info!("execution clock stopped");
}

/// Advance or remove every due trigger and hand back its callback.
///
/// Runs under the registry write lock; callbacks are invoked by the
/// caller after the lock is released.
async fn collect_due(shared: &Shared, now: DateTime<Utc>) -> Vec<(Uuid, JobCallback)> {
    let mut jobs = shared.jobs.write().await;

    let due_ids: Vec<Uuid> = jobs
        .iter()
        .filter(|(_, entry)| entry.trigger.is_due(now))
        .map(|(id, _)| *id)
        .collect();

    let mut fired = Vec::with_capacity(due_ids.len());
    for job_id in due_ids {
        let Some(entry) = jobs.get_mut(&job_id) else {
            continue;
        };
        let callback = Arc::clone(&entry.callback);

        match entry.trigger.advance() {
            Some(next) => {
                entry.trigger = next;
                debug!(job_id = %job_id, next_fire = %next.next_fire, "rearmed recurring job");
            }
            None => {
                jobs.remove(&job_id);
                debug!(job_id = %job_id, "one-shot job fired, unregistered");
            }
        }
        fired.push((job_id, callback));
    }

    fired
}

/// How long the clock should sleep before re-checking for due jobs.
async fn sleep_duration(shared: &Shared, now: DateTime<Utc>) -> std::time::Duration {
    let jobs = shared.jobs.read().await;
    let next = jobs.values().map(|entry| entry.trigger.next_fire).min();

    match next {
        Some(next_fire) => {
            let millis = (next_fire - now).num_milliseconds().max(0) as u64;
            std::time::Duration::from_millis(millis.min(MAX_SLEEP_SECS * 1000))
        }
        None => std::time::Duration::from_secs(MAX_SLEEP_SECS),
    }
}
