//! Job-level metadata read by metadata rules and the quality scorer.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

pub const STATE_FINISHED: &str = "finished";
pub const STATE_RUNNING: &str = "running";
pub const STATE_DELETED: &str = "deleted";

/// The handful of job facts the checks depend on.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct JobMetadata {
    pub key: String,
    pub spider: Option<String>,
    pub state: String,
    pub close_reason: Option<String>,
    /// Number of items the job produced.
    pub items_count: u64,
    /// `log_count/ERROR`.
    pub errors_count: u64,
    /// `downloader/response_count`.
    pub requests_count: u64,
    /// Epoch milliseconds.
    pub start_time: Option<i64>,
    /// Epoch milliseconds, absent while the job runs.
    pub finished_time: Option<i64>,
    pub response_status: BTreeMap<u16, u64>,
    /// Non-missing values per scraped field.
    pub field_counts: BTreeMap<String, u64>,
    pub max_memusage: u64,
    pub crawlera_user: Option<String>,
}

impl JobMetadata {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            ..Self::default()
        }
    }

    pub fn is_running(&self) -> bool {
        self.state == STATE_RUNNING
    }

    /// Exact, case-sensitive match on state and close reason. The scorer's
    /// outcome ladder ignores case instead.
    pub fn is_finished(&self) -> bool {
        self.state == STATE_FINISHED && self.close_reason.as_deref() == Some(STATE_FINISHED)
    }

    /// Items count as reported for scoring; deleted jobs have none.
    pub fn effective_items_count(&self) -> u64 {
        if self.state == STATE_DELETED {
            0
        } else {
            self.items_count
        }
    }

    /// Runtime in milliseconds, `None` until the job has finished.
    pub fn runtime_ms(&self) -> Option<i64> {
        let finished = self.finished_time?;
        Some(finished - self.start_time.unwrap_or(finished))
    }

    /// Responses per item, rounded to two decimals. `None` without items.
    pub fn response_ratio(&self) -> Option<f64> {
        let items = self.effective_items_count();
        if items == 0 {
            return None;
        }
        Some(round2(self.requests_count as f64 / items as f64))
    }

    pub fn status_count(&self, status: u16) -> u64 {
        self.response_status.get(&status).copied().unwrap_or(0)
    }
}

/// Rounds to two decimal places.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn runtime_needs_finished_time() {
        let mut job = JobMetadata::new("1/2/3");
        job.start_time = Some(1_000);
        assert_eq!(job.runtime_ms(), None);
        job.finished_time = Some(61_000);
        assert_eq!(job.runtime_ms(), Some(60_000));
    }

    #[test]
    fn deleted_jobs_have_no_items() {
        let mut job = JobMetadata::new("1/2/3");
        job.items_count = 10;
        job.requests_count = 25;
        assert_eq!(job.response_ratio(), Some(2.5));
        job.state = STATE_DELETED.to_string();
        assert_eq!(job.effective_items_count(), 0);
        assert_eq!(job.response_ratio(), None);
    }

    #[test]
    fn finished_requires_state_and_reason() {
        let mut job = JobMetadata::new("1/2/3");
        job.state = STATE_FINISHED.to_string();
        assert!(!job.is_finished());
        job.close_reason = Some(STATE_FINISHED.to_string());
        assert!(job.is_finished());
        job.state = "Finished".to_string();
        assert!(!job.is_finished());
    }
}
