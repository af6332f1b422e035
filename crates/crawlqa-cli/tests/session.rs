//! Sessions over files on disk.

use std::fs;
use std::path::PathBuf;

use crawlqa_cli::{Dataset, Session};
use crawlqa_ingest::load_schema;
use tempfile::TempDir;

const SCHEMA: &str = r#"{
  "$schema": "http://json-schema.org/draft-07/schema#",
  "type": "object",
  "properties": {
    "name": {"type": "string", "tag": "name_field"},
    "url": {"type": "string", "tag": ["product_url_field", "unique"]},
    "price": {"type": "number", "tag": "product_price_field"}
  },
  "required": ["name", "url"]
}"#;

const SOURCE_ITEMS: &str = r#"{"name": "boot", "url": "u0", "price": 10}
{"name": "boot", "url": "u0", "price": 10}
{"name": "cap", "url": "u2", "price": 4}
"#;

const TARGET_ITEMS: &str = r#"{"name": "boot", "url": "u0", "price": 20}
{"name": "cap", "url": "u2", "price": 4}
"#;

const JOB: &str = r#"{
  "key": "112358/13/21",
  "metadata": {
    "spider": "shop",
    "state": "finished",
    "close_reason": "finished",
    "finished_time": 1600000060000,
    "scrapystats": {
      "item_scraped_count": 3,
      "start_time": 1600000000000,
      "downloader/response_count": 6,
      "downloader/response_status_count/200": 6
    }
  }
}"#;

fn write(dir: &TempDir, name: &str, contents: &str) -> PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, contents).expect("write fixture");
    path
}

fn rule_names(session: &Session) -> Vec<String> {
    session
        .report()
        .results()
        .iter()
        .map(|result| result.name.clone())
        .collect()
}

#[test]
fn full_report_runs_every_stage() {
    let dir = TempDir::new().expect("tempdir");
    let schema = load_schema(&write(&dir, "schema.json", SCHEMA)).expect("schema");
    let source = Dataset::load(None, &write(&dir, "source.jl", SOURCE_ITEMS), None, true)
        .expect("source");
    let target = Dataset::load(None, &write(&dir, "target.jl", TARGET_ITEMS), None, true)
        .expect("target");

    let mut session = Session::new(source, Some(target), Some(schema));
    session.run_all_rules().expect("rules");
    let names = rule_names(&session);

    for expected in [
        "Garbage Symbols",
        "Fields Coverage",
        "Scraped Fields",
        "Boolean Fields",
        "JSON Schema Validation",
        "Tags",
        "Duplicated Items",
        "Uniqueness",
        "Compare Prices For Same Urls",
        "Compare Names Per Url",
        "Compare Prices For Same Names",
    ] {
        assert!(names.iter().any(|name| name == expected), "missing {expected}");
    }

    let prices = session
        .report()
        .get("Compare Prices For Same Urls")
        .expect("price comparison");
    assert!(prices.has_errors());
    let duplicates = session.report().get("Duplicated Items").expect("duplicates");
    assert_eq!(duplicates.err_items_count(), 2);
}

#[test]
fn missing_tagged_field_skips_tag_rules() {
    let dir = TempDir::new().expect("tempdir");
    let schema = load_schema(&write(&dir, "schema.json", SCHEMA)).expect("schema");
    let source = Dataset::load(
        None,
        &write(&dir, "source.jl", "{\"name\": \"boot\", \"price\": 1}\n"),
        None,
        true,
    )
    .expect("source");

    let mut session = Session::new(source, None, Some(schema));
    session.run_all_rules().expect("rules");
    let names = rule_names(&session);

    assert!(names.iter().any(|name| name == "Tags"));
    assert!(!names.iter().any(|name| name == "Duplicated Items"));
    let tags = session.report().get("Tags").expect("tags");
    assert_eq!(
        tags.errors().last().map(|message| message.summary.as_str()),
        Some("Skipping tag rules")
    );
}

#[test]
fn data_quality_report_scores_the_job() {
    let dir = TempDir::new().expect("tempdir");
    let schema = load_schema(&write(&dir, "schema.json", SCHEMA)).expect("schema");
    let source = Dataset::load(
        Some("112358/13/21"),
        &write(&dir, "source.jl", SOURCE_ITEMS),
        Some(&write(&dir, "job.json", JOB)),
        true,
    )
    .expect("source");

    let mut session = Session::new(source, None, Some(schema));
    session.run_all_rules().expect("rules");
    let quality = session.data_quality_report().expect("report");

    assert!(quality.estimate.overall <= 100);
    assert_eq!(quality.estimate.field_accuracy, 100);
    assert!(quality.html.contains("Data Quality Report - shop"));
    assert!(quality.html.contains("Duplicated Items"));
    assert!(quality.html.contains("Garbage Symbols"));
}

#[test]
fn data_quality_report_needs_schema_and_job() {
    let dir = TempDir::new().expect("tempdir");
    let items = write(&dir, "source.jl", SOURCE_ITEMS);

    let source = Dataset::load(None, &items, None, true).expect("source");
    let mut session = Session::new(source, None, None);
    let error = session.data_quality_report().expect_err("no schema");
    assert!(error.to_string().contains("schema"));

    let schema = load_schema(&write(&dir, "schema.json", SCHEMA)).expect("schema");
    let source = Dataset::load(None, &items, None, true).expect("source");
    let mut session = Session::new(source, None, Some(schema));
    let error = session.data_quality_report().expect_err("no job");
    assert!(error.to_string().contains("job metadata"));
}

#[test]
fn collections_have_no_data_quality_report() {
    let dir = TempDir::new().expect("tempdir");
    let schema = load_schema(&write(&dir, "schema.json", SCHEMA)).expect("schema");
    let source = Dataset::load(
        Some("112358/collections/s/products"),
        &write(&dir, "source.jl", SOURCE_ITEMS),
        None,
        true,
    )
    .expect("source");
    let mut session = Session::new(source, None, Some(schema));
    let error = session.data_quality_report().expect_err("collection");
    assert!(error.to_string().contains("collections"));
}

#[test]
fn invalid_source_key_is_a_configuration_error() {
    let dir = TempDir::new().expect("tempdir");
    let items = write(&dir, "source.jl", SOURCE_ITEMS);
    assert!(Dataset::load(Some("not/a/key"), &items, None, true).is_err());
}

#[test]
fn validation_modes_share_one_result_slot() {
    let dir = TempDir::new().expect("tempdir");
    let schema = load_schema(&write(&dir, "schema.json", SCHEMA)).expect("schema");
    let source = Dataset::load(
        None,
        &write(&dir, "source.jl", "{\"name\": 1, \"url\": 2}\n"),
        None,
        true,
    )
    .expect("source");
    let mut session = Session::new(source, None, Some(schema));

    let full = session.validate_with_json_schema(false).expect("full");
    let fast = session.validate_with_json_schema(true).expect("fast");
    assert_eq!(full.error_groups_count(), 2);
    assert_eq!(fast.error_groups_count(), 1);
    assert_eq!(session.report().len(), 1);
}

const PRICE_SCHEMA: &str = r#"{
  "type": "object",
  "properties": {
    "name": {"type": "string", "tag": "name_field"},
    "url": {"type": "string", "tag": "product_url_field"},
    "was": {"type": "number", "tag": "product_price_was_field"},
    "now": {"type": "number", "tag": "product_price_field"}
  }
}"#;

fn price_quality(items: &str) -> crawlqa_cli::QualityReport {
    let dir = TempDir::new().expect("tempdir");
    let schema = load_schema(&write(&dir, "schema.json", PRICE_SCHEMA)).expect("schema");
    let source = Dataset::load(
        Some("112358/13/21"),
        &write(&dir, "source.jl", items),
        Some(&write(&dir, "job.json", JOB)),
        true,
    )
    .expect("source");
    let mut session = Session::new(source, None, Some(schema));
    session.run_all_rules().expect("rules");
    session.data_quality_report().expect("report")
}

#[test]
fn equal_was_and_now_prices_lower_the_score() {
    let discounted = price_quality(
        r#"{"name": "a", "url": "u1", "was": 20, "now": 10}
{"name": "b", "url": "u2", "was": 30, "now": 15}
{"name": "c", "url": "u3", "was": 40, "now": 20}
"#,
    );
    let unchanged = price_quality(
        r#"{"name": "a", "url": "u1", "was": 10, "now": 10}
{"name": "b", "url": "u2", "was": 15, "now": 15}
{"name": "c", "url": "u3", "was": 20, "now": 20}
"#,
    );

    assert!(unchanged.estimate.overall < discounted.estimate.overall);
    assert!(unchanged.html.contains("3 warnings"));
}
