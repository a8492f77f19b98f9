//! Run-time policy: when an alert runs next and when it expires.
//!
//! Next-run times are jittered uniformly inside a configured window so the
//! scheduler never fires a burst of simultaneous scrapes and the target site
//! does not see a fixed polling cadence.

use chrono::{DateTime, Duration, Utc};
use rand::Rng;

#[derive(Debug, Clone, Copy)]
pub struct RunPolicy {
    jitter_min_secs: u64,
    jitter_max_secs: u64,
    initial_delay_secs: u64,
    expiry_days: i64,
}

impl RunPolicy {
    pub fn new(
        jitter_min_secs: u64,
        jitter_max_secs: u64,
        initial_delay_secs: u64,
        expiry_days: i64,
    ) -> Self {
        Self {
            jitter_min_secs,
            jitter_max_secs,
            initial_delay_secs,
            expiry_days,
        }
    }

    pub fn from_config(app: &crate::config::App) -> Self {
        Self::new(
            app.jitter_min_secs,
            app.jitter_max_secs,
            app.initial_delay_secs,
            app.expiry_days,
        )
    }

    /// Next eligible run: `now + uniform(jitter_min, jitter_max)`.
    pub fn next_run_after(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        let secs = rand::rng().random_range(self.jitter_min_secs..=self.jitter_max_secs);
        now + Duration::seconds(secs as i64)
    }

    /// First run of a freshly registered alert: short fixed delay.
    pub fn initial_run_after(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now + Duration::seconds(self.initial_delay_secs as i64)
    }

    /// Registration-time expiry horizon.
    pub fn expiry_after(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now + Duration::days(self.expiry_days)
    }
}
