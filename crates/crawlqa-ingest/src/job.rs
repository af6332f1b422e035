//! Job metadata loading.
//!
//! Reads the JSON dump of a crawl job: its `metadata` block (spider, state,
//! close reason, timings and `scrapystats`), the optional `items_stats`
//! block and optional `logs` lines.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use crawlqa_model::JobMetadata;
use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::debug;

use crate::error::{IngestError, Result};

const RESPONSE_STATUS_PREFIX: &str = "downloader/response_status_count/";
const CRAWLERA_MARKER: &str = "[root] Using crawlera at";

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct JobDump {
    key: Option<String>,
    metadata: Map<String, Value>,
    items_stats: ItemsStats,
    logs: Vec<Value>,
    crawlera_user: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ItemsStats {
    totals: BTreeMap<String, u64>,
    counts: BTreeMap<String, u64>,
}

pub fn load_job_metadata(path: &Path) -> Result<JobMetadata> {
    let text = fs::read_to_string(path).map_err(|source| IngestError::FileRead {
        path: path.to_path_buf(),
        source,
    })?;
    let value: Value = serde_json::from_str(&text).map_err(|source| IngestError::Json {
        path: path.to_path_buf(),
        line: source.line(),
        source,
    })?;
    parse_job_metadata(value)
}

/// Builds [`JobMetadata`] from a job dump.
pub fn parse_job_metadata(value: Value) -> Result<JobMetadata> {
    let dump: JobDump = serde_json::from_value(value).map_err(IngestError::JobDump)?;
    let metadata = &dump.metadata;
    let stats = metadata
        .get("scrapystats")
        .and_then(Value::as_object)
        .cloned()
        .unwrap_or_default();

    let key = dump
        .key
        .clone()
        .or_else(|| text(metadata, "key"))
        .ok_or(IngestError::MissingJobKey)?;

    let items_count = dump
        .items_stats
        .totals
        .get("input_values")
        .copied()
        .or_else(|| uint(&stats, "item_scraped_count"))
        .unwrap_or(0);

    let response_status = stats
        .iter()
        .filter_map(|(name, count)| {
            let status = name.strip_prefix(RESPONSE_STATUS_PREFIX)?.parse::<u16>().ok()?;
            Some((status, count.as_u64()?))
        })
        .collect();

    let crawlera_user = dump
        .crawlera_user
        .clone()
        .or_else(|| crawlera_user_from_logs(&dump.logs));

    let job = JobMetadata {
        key,
        spider: text(metadata, "spider"),
        state: text(metadata, "state").unwrap_or_default(),
        close_reason: text(metadata, "close_reason"),
        items_count,
        errors_count: uint(&stats, "log_count/ERROR").unwrap_or(0),
        requests_count: uint(&stats, "downloader/response_count").unwrap_or(0),
        start_time: int(&stats, "start_time").or_else(|| int(metadata, "running_time")),
        finished_time: int(metadata, "finished_time"),
        response_status,
        field_counts: dump.items_stats.counts,
        max_memusage: uint(&stats, "memusage/max").unwrap_or(0),
        crawlera_user,
    };
    debug!(key = %job.key, state = %job.state, items = job.items_count, "parsed job metadata");
    Ok(job)
}

fn text(map: &Map<String, Value>, name: &str) -> Option<String> {
    map.get(name).and_then(Value::as_str).map(str::to_string)
}

fn uint(map: &Map<String, Value>, name: &str) -> Option<u64> {
    let value = map.get(name)?;
    value
        .as_u64()
        .or_else(|| value.as_f64().filter(|v| *v >= 0.0).map(|v| v as u64))
}

fn int(map: &Map<String, Value>, name: &str) -> Option<i64> {
    let value = map.get(name)?;
    value.as_i64().or_else(|| value.as_f64().map(|v| v as i64))
}

fn crawlera_user_from_logs(logs: &[Value]) -> Option<String> {
    logs.iter()
        .filter_map(|line| match line {
            Value::String(message) => Some(message.as_str()),
            Value::Object(entry) => entry.get("message").and_then(Value::as_str),
            _ => None,
        })
        .find(|message| message.contains(CRAWLERA_MARKER))
        .and_then(|message| message.split("user: ").nth(1))
        .map(|user| user.replace(')', "").trim().to_string())
}
