//! Rules over job metadata.

use chrono::{DateTime, TimeDelta};
use crawlqa_model::{JobMetadata, Message, Outcome, RuleResult};

use crate::helpers::ratio_diff;

/// Base of the job dashboard links in error details.
pub const JOB_URL_BASE: &str = "https://app.scrapinghub.com/p";

fn error_log_url(key: &str) -> String {
    format!("{JOB_URL_BASE}/{key}/log?filterType=error&filterAndHigher")
}

pub fn check_errors(job: &JobMetadata) -> RuleResult {
    let mut result = RuleResult::new("Job Errors");
    if job.errors_count > 0 {
        result.add_error(
            Message::new(format!("{} error(s)", job.errors_count)).with_detailed(format!(
                "Errors for {} - {}",
                job.key,
                error_log_url(&job.key)
            )),
        );
    } else {
        result.add_info("No errors");
    }
    result
}

pub fn check_outcome(job: &JobMetadata) -> RuleResult {
    let mut result = RuleResult::new("Job Outcome");
    if job.is_finished() {
        result.add_info("Finished");
    } else {
        result.add_error(format!(
            "Job has '{}' state, '{}' close reason",
            job.state,
            job.close_reason.as_deref().unwrap_or("None")
        ));
    }
    result
}

pub fn check_response_ratio(job: &JobMetadata) -> RuleResult {
    let mut result = RuleResult::new("Responses Per Item Ratio");
    match job.response_ratio() {
        Some(ratio) => result.add_info(format!(
            "Number of responses / Number of scraped items - {ratio}"
        )),
        None => result.add_info(Outcome::Skipped),
    }
    result
}

/// Adds `message` at a level picked by the rounded relative difference:
/// ERROR above 20%, WARNING above 10%, INFO otherwise.
fn add_by_difference(result: &mut RuleResult, difference: f64, message: String) {
    if difference > 0.2 {
        result.add_error(message);
    } else if difference > 0.1 {
        result.add_warning(message);
    } else {
        result.add_info(message);
    }
}

pub fn compare_response_ratio(source: &JobMetadata, target: &JobMetadata) -> RuleResult {
    let mut result = RuleResult::new("Compare Responses Per Item Ratio");
    let (Some(source_ratio), Some(target_ratio)) = (source.response_ratio(), target.response_ratio())
    else {
        result.add_info(Outcome::Skipped);
        return result;
    };
    let difference = ratio_diff(source_ratio, target_ratio);
    add_by_difference(
        &mut result,
        difference,
        format!(
            "Difference is {:.0}% - {source_ratio} and {target_ratio}",
            difference * 100.0
        ),
    );
    result
}

pub fn compare_errors(source: &JobMetadata, target: &JobMetadata) -> RuleResult {
    let mut result = RuleResult::new("Compare Job Errors");
    if source.errors_count > 0 {
        let detailed = [source, target]
            .iter()
            .map(|job| {
                format!(
                    "{} error(s) for {} - {}",
                    job.errors_count,
                    job.key,
                    error_log_url(&job.key)
                )
            })
            .collect::<Vec<_>>()
            .join("\n");
        result.add_error(
            Message::new(format!(
                "{} and {} errors",
                source.errors_count, target.errors_count
            ))
            .with_detailed(detailed),
        );
    }
    result
}

pub fn compare_number_of_scraped_items(source: &JobMetadata, target: &JobMetadata) -> RuleResult {
    let mut result = RuleResult::new("Total Scraped Items");
    let source_count = source.effective_items_count();
    let target_count = target.effective_items_count();
    let difference = ratio_diff(source_count as f64, target_count as f64);

    if difference == 0.0 {
        result.add_info("Same number of items");
    } else if difference < 0.05 {
        result.add_info(format!(
            "Almost the same number of items - {source_count} and {target_count}"
        ));
    } else {
        let message = format!(
            "{source_count} differs from {target_count} on {:.0}%",
            difference * 100.0
        );
        if difference < 0.10 {
            result.add_warning(message);
        } else {
            result.add_error(message);
        }
    }
    result
}

pub fn compare_spider_names(source: &JobMetadata, target: &JobMetadata) -> RuleResult {
    let mut result = RuleResult::new("Spider Names");
    if source.spider != target.spider {
        let name = |job: &JobMetadata| job.spider.clone().unwrap_or_else(|| "None".to_string());
        result.add_warning(format!(
            "{} spider is {}, {} spider is {}",
            source.key,
            name(source),
            target.key,
            name(target)
        ));
    }
    result
}

pub fn compare_runtime(source: &JobMetadata, target: &JobMetadata) -> RuleResult {
    let mut result = RuleResult::new("Compare Runtime");
    let (Some(source_ms), Some(target_ms)) = (
        source.runtime_ms().filter(|ms| *ms > 0),
        target.runtime_ms().filter(|ms| *ms > 0),
    ) else {
        result.add_warning("Jobs are not finished");
        return result;
    };

    if source_ms > target_ms {
        let difference = ratio_diff(source_ms as f64, target_ms as f64);
        add_by_difference(
            &mut result,
            difference,
            format!(
                "Sources differ on {:.0}% - {} and {}",
                difference * 100.0,
                format_duration(source_ms),
                format_duration(target_ms)
            ),
        );
    } else {
        result.add_info(format!(
            "Similar or better runtime - {} and {}",
            format_duration(source_ms),
            format_duration(target_ms)
        ));
    }
    result
}

pub fn compare_finish_time(source: &JobMetadata, target: &JobMetadata) -> RuleResult {
    let mut result = RuleResult::new("Finish Time");
    let days = if source.is_running() || target.is_running() {
        None
    } else {
        finish_days_apart(source, target)
    };

    match days {
        None => result.add_warning("Jobs are not finished"),
        Some(0) => result.add_info("Less than 1 day difference"),
        Some(days) => result.add_warning(format!("{days} day(s) difference between 2 jobs")),
    }
    result
}

fn finish_days_apart(source: &JobMetadata, target: &JobMetadata) -> Option<i64> {
    let source_finish = DateTime::from_timestamp_millis(source.finished_time?)?;
    let target_finish = DateTime::from_timestamp_millis(target.finished_time?)?;
    Some((target_finish - source_finish).num_days().abs())
}

/// Renders milliseconds as `[N day(s), ]H:MM:SS[.ffffff]`.
pub fn format_duration(ms: i64) -> String {
    let delta = TimeDelta::milliseconds(ms.abs());
    let days = delta.num_days();
    let hours = delta.num_hours() % 24;
    let minutes = delta.num_minutes() % 60;
    let seconds = delta.num_seconds() % 60;
    let micros = (ms.abs() % 1000) * 1000;

    let mut out = String::new();
    if ms < 0 {
        out.push('-');
    }
    match days {
        0 => {}
        1 => out.push_str("1 day, "),
        days => out.push_str(&format!("{days} days, ")),
    }
    out.push_str(&format!("{hours}:{minutes:02}:{seconds:02}"));
    if micros > 0 {
        out.push_str(&format!(".{micros:06}"));
    }
    out
}
