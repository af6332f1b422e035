//! Quality estimation for a single crawl job.
//!
//! Each signal is mapped to a 0-100 sub-score by a step function in
//! [`ladder`]. The overall score is a weighted sum whose weights depend on
//! which optional checks (duplicate items, unique values, prices) looked at
//! any items at all. Extra rule results then decay the score one by one.

pub mod ladder;

use crawlqa_model::{JobMetadata, RuleResult};
use serde::Serialize;
use tracing::debug;

/// Counts gathered from the rules the score depends on.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QualityInputs {
    pub validation_errors: u64,
    pub duplicated_items: u64,
    pub checked_duplicate_items: u64,
    pub duplicated_unique: u64,
    pub checked_unique_items: u64,
    pub price_errors: u64,
    pub checked_price_items: u64,
    pub tested: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct QualityEstimate {
    pub overall: u32,
    pub field_accuracy: u32,
}

/// Every sub-score, kept for reports.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SubScores {
    pub adherence: f64,
    pub duplicated_items: f64,
    pub duplicated_unique: f64,
    pub price: f64,
    pub crawlera: f64,
    pub errors: f64,
    pub outcome: f64,
    pub response_status: f64,
    pub tested: f64,
}

impl SubScores {
    pub fn compute(job: &JobMetadata, inputs: &QualityInputs) -> Self {
        let items = job.effective_items_count();
        Self {
            adherence: ladder::adherence(inputs.validation_errors, items),
            duplicated_items: ladder::duplicates(inputs.duplicated_items, items),
            duplicated_unique: ladder::duplicates(inputs.duplicated_unique, items),
            price: ladder::price(inputs.price_errors, items),
            crawlera: ladder::crawlera(job.crawlera_user.as_deref()),
            errors: ladder::errors(job.errors_count),
            outcome: ladder::outcome(&job.state, job.close_reason.as_deref()),
            response_status: ladder::response_status(
                job.status_count(200),
                job.status_count(301),
                job.status_count(404),
                job.status_count(503),
            ),
            tested: ladder::tested(inputs.tested),
        }
    }
}

/// Weights of the sub-scores that vary with the checked populations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Weights {
    pub adherence: u8,
    pub duplicated_items: u8,
    pub duplicated_unique: u8,
    pub price: u8,
}

pub const CRAWLERA_WEIGHT: u8 = 8;
pub const ERRORS_WEIGHT: u8 = 5;
pub const OUTCOME_WEIGHT: u8 = 5;
pub const RESPONSE_STATUS_WEIGHT: u8 = 7;
pub const TESTED_WEIGHT: u8 = 15;

impl Weights {
    /// Picks the branch by which optional checks had any items.
    pub fn select(checked_duplicates: bool, checked_unique: bool, checked_price: bool) -> Self {
        let (adherence, duplicated_items, duplicated_unique, price) =
            match (checked_duplicates, checked_unique, checked_price) {
                (false, false, false) => (60, 0, 0, 0),
                (false, false, true) => (55, 0, 0, 5),
                (false, true, false) => (55, 0, 5, 0),
                (true, false, false) => (50, 10, 0, 0),
                (false, true, true) => (50, 0, 5, 5),
                (true, false, true) => (45, 10, 0, 5),
                (true, true, false) => (45, 10, 5, 0),
                (true, true, true) => (40, 10, 5, 5),
            };
        Self {
            adherence,
            duplicated_items,
            duplicated_unique,
            price,
        }
    }

    pub fn total(&self) -> u32 {
        [
            self.adherence,
            self.duplicated_items,
            self.duplicated_unique,
            self.price,
            CRAWLERA_WEIGHT,
            ERRORS_WEIGHT,
            OUTCOME_WEIGHT,
            RESPONSE_STATUS_WEIGHT,
            TESTED_WEIGHT,
        ]
        .iter()
        .map(|weight| u32::from(*weight))
        .sum()
    }
}

fn weighted(score: f64, weight: u8) -> f64 {
    score * f64::from(weight) / 100.0
}

/// Decay factor of one extra rule: mild below a 10% error ratio.
pub fn decay(result: &RuleResult) -> f64 {
    if result.items_count == 0 {
        return 0.95;
    }
    let ratio = result.err_items_count() as f64 / result.items_count as f64;
    if ratio < 0.1 { 0.95 } else { 0.90 }
}

fn truncate(score: f64) -> u32 {
    score.trunc().clamp(0.0, 100.0) as u32
}

/// Scores `job` from rule counts and extra rule results, applied in order.
pub fn estimate(job: &JobMetadata, inputs: &QualityInputs, extra: &[&RuleResult]) -> QualityEstimate {
    let scores = SubScores::compute(job, inputs);
    let weights = Weights::select(
        inputs.checked_duplicate_items > 0,
        inputs.checked_unique_items > 0,
        inputs.checked_price_items > 0,
    );

    let mut overall = weighted(scores.adherence, weights.adherence)
        + weighted(scores.duplicated_items, weights.duplicated_items)
        + weighted(scores.duplicated_unique, weights.duplicated_unique)
        + weighted(scores.price, weights.price)
        + weighted(scores.crawlera, CRAWLERA_WEIGHT)
        + weighted(scores.errors, ERRORS_WEIGHT)
        + weighted(scores.outcome, OUTCOME_WEIGHT)
        + weighted(scores.response_status, RESPONSE_STATUS_WEIGHT)
        + weighted(scores.tested, TESTED_WEIGHT);
    for result in extra {
        overall *= decay(result);
    }

    let estimate = QualityEstimate {
        overall: truncate(overall),
        field_accuracy: truncate(scores.adherence),
    };
    debug!(
        job = %job.key,
        overall = estimate.overall,
        field_accuracy = estimate.field_accuracy,
        extra_rules = extra.len(),
        "quality estimated"
    );
    estimate
}
