//! Durable job scheduler for crosspost.
//!
//! This crate provides:
//! - A pure trigger engine computing next fire times for one-shot and
//!   recurring (daily/weekly/monthly/interval) policies
//! - A scheduler mapping job ids to armed triggers, driven by a single
//!   background execution clock, with replace-on-schedule and
//!   idempotent cancel semantics

mod error;
mod scheduler;
mod trigger;

pub use error::SchedulerError;
pub use scheduler::{JobCallback, Scheduler};
pub use trigger::Trigger;
