//! File based loading tests.

use std::fs;

use crawlqa_ingest::{IngestError, load_items, load_job_metadata, load_schema};
use crawlqa_model::Tag;
use tempfile::TempDir;

fn write(dir: &TempDir, name: &str, contents: &str) -> std::path::PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, contents).expect("write fixture");
    path
}

#[test]
fn json_lines_items_are_loaded() {
    let dir = TempDir::new().expect("tempdir");
    let path = write(
        &dir,
        "items.jl",
        "{\"_key\": \"1/2/3/0\", \"name\": \"a\", \"price\": 1}\n{\"_key\": \"1/2/3/1\", \"name\": \"b\", \"price\": 2.5}\n",
    );
    let items = load_items(&path, "1/2/3", true).expect("items");
    assert_eq!(items.len(), 2);
    assert_eq!(items.keys(), ["1/2/3/0", "1/2/3/1"]);
    assert_eq!(items.columns(), ["name", "price"]);
}

#[test]
fn json_array_items_are_loaded() {
    let dir = TempDir::new().expect("tempdir");
    let path = write(&dir, "items.json", r#"[{"a": 1}, {"a": null}, {"a": 3}]"#);
    let items = load_items(&path, "memory", false).expect("items");
    assert_eq!(items.len(), 3);
    assert_eq!(items.non_missing_count("a").expect("a"), 2);
}

#[test]
fn json_object_is_not_an_items_file() {
    let dir = TempDir::new().expect("tempdir");
    let path = write(&dir, "items.json", r#"{"a": 1}"#);
    assert!(matches!(
        load_items(&path, "memory", false),
        Err(IngestError::Format { .. })
    ));
}

#[test]
fn csv_items_are_loaded_with_types() {
    let dir = TempDir::new().expect("tempdir");
    let path = write(&dir, "items.csv", "name,price,available\nbook,10.5,true\npen,,false\n");
    let items = load_items(&path, "memory", false).expect("items");
    assert_eq!(items.len(), 2);
    assert_eq!(
        items.column_numbers("price").expect("price"),
        vec![Some(10.5), None]
    );
    assert_eq!(items.boolean_columns(), ["available"]);
}

#[test]
fn missing_file_is_reported() {
    let dir = TempDir::new().expect("tempdir");
    let err = load_items(&dir.path().join("nope.jl"), "memory", false).unwrap_err();
    assert!(matches!(err, IngestError::FileRead { .. }));
}

#[test]
fn schema_file_is_loaded_with_tags() {
    let dir = TempDir::new().expect("tempdir");
    let path = write(
        &dir,
        "schema.json",
        r#"{
            "$schema": "http://json-schema.org/draft-07/schema",
            "type": "object",
            "properties": {
                "name": {"type": "string", "tag": "name_field"},
                "url": {"type": "string", "tag": ["product_url_field", "unique"]}
            }
        }"#,
    );
    let schema = load_schema(&path).expect("schema");
    assert_eq!(schema.tags[&Tag::NameField], ["name"]);
    assert_eq!(schema.tags[&Tag::Unique], ["url"]);
    assert_eq!(schema.properties(), ["name", "url"]);
}

#[test]
fn job_metadata_file_is_loaded() {
    let dir = TempDir::new().expect("tempdir");
    let path = write(
        &dir,
        "job.json",
        r#"{"key": "1/2/3", "metadata": {"spider": "s", "state": "finished", "close_reason": "finished",
            "scrapystats": {"log_count/ERROR": 3}}}"#,
    );
    let job = load_job_metadata(&path).expect("job");
    assert_eq!(job.errors_count, 3);
    assert_eq!(job.spider.as_deref(), Some("s"));
}
