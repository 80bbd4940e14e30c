//! Trigger engine: pure next-fire-time computation.
//!
//! All arithmetic is in UTC and deterministic; the wall clock only
//! enters through explicit `now` parameters.

use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveTime, Utc};

use crosspost_store::Repeat;

use crate::SchedulerError;

/// Monthly triggers clamp the day-of-month to this value so every
/// target month has a valid fire date.
const MONTHLY_DAY_CLAMP: u32 = 28;

/// When a job fires next, and how it recurs afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Trigger {
    /// The next fire time.
    pub next_fire: DateTime<Utc>,
    /// Policy for occurrences after `next_fire`.
    pub repeat: Repeat,
}

impl Trigger {
    /// A trigger that fires at `first` and then recurs per `repeat`.
    pub fn starting_at(first: DateTime<Utc>, repeat: Repeat) -> Result<Self, SchedulerError> {
        validate(repeat)?;
        Ok(Self {
            next_fire: first,
            repeat,
        })
    }

    /// The first occurrence strictly after `now`, for a recurring policy
    /// whose originally scheduled time has already elapsed.
    ///
    /// Daily/weekly/monthly reuse `now`'s time of day unless `anchor`
    /// supplies an explicit one.
    pub fn first_after(
        repeat: Repeat,
        anchor: Option<NaiveTime>,
        now: DateTime<Utc>,
    ) -> Result<Self, SchedulerError> {
        validate(repeat)?;
        let time = anchor.unwrap_or_else(|| now.time());

        let next_fire = match repeat {
            Repeat::None => return Err(SchedulerError::NotRecurring(repeat)),
            Repeat::Daily => at_time(now + Duration::days(1), time),
            Repeat::Weekly => at_time(now + Duration::weeks(1), time),
            Repeat::Monthly => next_month(now.date_naive()).and_time(time).and_utc(),
            Repeat::Every { seconds } => now + Duration::seconds(seconds as i64),
        };

        Ok(Self { next_fire, repeat })
    }

    /// The occurrence after the current fire, or `None` for one-shots.
    pub fn advance(&self) -> Option<Trigger> {
        let next_fire = match self.repeat {
            Repeat::None => return None,
            Repeat::Daily => self.next_fire + Duration::days(1),
            Repeat::Weekly => self.next_fire + Duration::weeks(1),
            Repeat::Monthly => {
                let date = next_month(self.next_fire.date_naive());
                date.and_time(self.next_fire.time()).and_utc()
            }
            Repeat::Every { seconds } => self.next_fire + Duration::seconds(seconds as i64),
        };

        Some(Trigger {
            next_fire,
            repeat: self.repeat,
        })
    }

    /// Whether this trigger is due at `now`.
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.next_fire <= now
    }
}

fn validate(repeat: Repeat) -> Result<(), SchedulerError> {
    if let Repeat::Every { seconds } = repeat {
        if seconds == 0 {
            return Err(SchedulerError::InvalidTrigger(
                "interval must be at least one second".to_string(),
            ));
        }
        // Intervals past chrono's duration range would wrap or panic in
        // the date arithmetic, so they are rejected up front
        let representable = i64::try_from(seconds)
            .ok()
            .and_then(Duration::try_seconds)
            .is_some();
        if !representable {
            return Err(SchedulerError::InvalidTrigger(format!(
                "interval of {} seconds is out of range",
                seconds
            )));
        }
    }
    Ok(())
}

/// Replace the time-of-day component of a UTC timestamp.
fn at_time(base: DateTime<Utc>, time: NaiveTime) -> DateTime<Utc> {
    base.date_naive().and_time(time).and_utc()
}

/// The same day-of-month (clamped to 28) in the following calendar month.
fn next_month(date: NaiveDate) -> NaiveDate {
    let (year, month) = if date.month() == 12 {
        (date.year() + 1, 1)
    } else {
        (date.year(), date.month() + 1)
    };
    let day = date.day().min(MONTHLY_DAY_CLAMP);
    // Every month has at least 28 days, so the clamped date is valid
    NaiveDate::from_ymd_opt(year, month, day).expect("clamped day is valid in every month")
}
