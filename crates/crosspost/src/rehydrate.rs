//! Rehydration: re-arming scheduled jobs from durable records at startup.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crosspost_dispatch::Dispatcher;
use crosspost_scheduler::{Scheduler, SchedulerError};
use crosspost_store::{Post, PostFilter, PostStore};

use crate::app::dispatch_callback;

/// Outcome of a rehydration pass.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct RehydrateReport {
    /// Jobs re-armed with the scheduler.
    pub armed: usize,
    /// Posts with nothing left to arm (no schedule, or a missed one-shot).
    pub skipped: usize,
    /// Posts whose rescheduling failed; logged, never fatal.
    pub failed: usize,
}

/// Reload every non-immediate post and re-register its job.
///
/// - Future `scheduled_at`: re-armed with the original trigger.
/// - Past `scheduled_at` with a recurring policy: resumed at the next
///   future occurrence, keeping the original time of day.
/// - Past `scheduled_at` one-shots are treated as already delivered and
///   are never re-fired.
///
/// Per-post failures are logged with the post id and do not abort the
/// pass.
pub async fn rehydrate(
    posts: &dyn PostStore,
    scheduler: &Arc<Scheduler>,
    dispatcher: &Arc<Dispatcher>,
) -> RehydrateReport {
    let now = Utc::now();

    let records = match posts.list_posts(PostFilter::scheduled()).await {
        Ok(records) => records,
        Err(e) => {
            warn!(error = %e, "failed to list posts for rehydration");
            return RehydrateReport::default();
        }
    };

    let mut report = RehydrateReport::default();
    for post in records {
        let post_id = post.id;
        match rearm(scheduler, dispatcher, post, now).await {
            Ok(true) => report.armed += 1,
            Ok(false) => {
                debug!(post_id = %post_id, "nothing to rearm");
                report.skipped += 1;
            }
            Err(e) => {
                warn!(post_id = %post_id, error = %e, "failed to reschedule post");
                report.failed += 1;
            }
        }
    }

    info!(
        armed = report.armed,
        skipped = report.skipped,
        failed = report.failed,
        "rehydration complete"
    );
    report
}

/// Re-arm a single post's job. Returns whether a job was armed.
async fn rearm(
    scheduler: &Arc<Scheduler>,
    dispatcher: &Arc<Dispatcher>,
    post: Post,
    now: DateTime<Utc>,
) -> Result<bool, SchedulerError> {
    let Some(when) = post.scheduled_at else {
        return Ok(false);
    };

    let job_id = post.id;
    let repeat = post.repeat;
    let callback = dispatch_callback(Arc::clone(dispatcher), post);

    if when > now {
        scheduler.schedule(job_id, when, repeat, callback).await?;
        return Ok(true);
    }

    if repeat.is_recurring() {
        // Resume at the next occurrence, anchored to the original
        // wall-clock time rather than whenever the process came back up
        scheduler
            .schedule_after(job_id, repeat, callback, Some(when.time()), Some(now))
            .await?;
        return Ok(true);
    }

    // A missed one-shot is already delivered or abandoned
    Ok(false)
}
