//! HTML data-quality report.
//!
//! A standalone page with the quality score, the job summary, a pass/fail
//! table of the rules the score depends on, field coverage, the most
//! frequent values of every category field and the schema as an appendix.

use std::fs;
use std::io::Write;
use std::path::Path;

use quick_xml::Writer;
use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use serde_json::Value;
use tracing::debug;

use crawlqa_model::{Items, JobMetadata, RuleResult, Stat, Tag, TaggedFields, fields_for, round2};
use crawlqa_rules::helpers::{sorted_counts, value_counts};
use crawlqa_rules::metadata::{JOB_URL_BASE, format_duration};
use crawlqa_score::{QualityEstimate, QualityInputs};

use crate::error::{ReportError, Result};

/// Category values listed per category field.
pub const TOP_CATEGORIES: usize = 20;

const STYLE: &str = "
body { font-family: sans-serif; margin: 2em; }
table { border-collapse: collapse; margin-bottom: 2em; min-width: 40em; }
th { background: gray; color: black; text-align: left; padding: 4px 8px; }
td { background: lightgrey; padding: 4px 8px; }
td.good { background: rgb(112,194,99); }
td.fair { background: rgb(233,190,50); }
td.poor { background: rgb(233,81,51); }
";

/// One row of the test summary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestRow {
    pub name: String,
    pub fields: String,
    pub result: String,
    pub passed: bool,
}

impl TestRow {
    fn new(name: impl Into<String>, fields: impl Into<String>, warnings: usize, result: String) -> Self {
        Self {
            name: name.into(),
            fields: fields.into(),
            result,
            passed: warnings == 0,
        }
    }

    pub fn status(&self) -> &'static str {
        if self.passed { "Pass" } else { "Fail" }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CategoryRow {
    pub value: String,
    pub count: usize,
    /// Product url of the first item with this value.
    pub url: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CategoryTable {
    pub field: String,
    pub rows: Vec<CategoryRow>,
}

/// Everything the page shows, gathered by the caller.
#[derive(Debug, Clone)]
pub struct DataQualityReport<'a> {
    pub estimate: QualityEstimate,
    pub job: &'a JobMetadata,
    pub tests: Vec<TestRow>,
    pub coverage: Option<&'a RuleResult>,
    pub categories: Vec<CategoryTable>,
    pub schema: &'a Value,
}

/// Rows for the schema check, every optional check that looked at any
/// items, and each extra rule.
pub fn test_summary(
    inputs: &QualityInputs,
    tags: &TaggedFields,
    extra: &[&RuleResult],
    items_count: usize,
) -> Vec<TestRow> {
    let joined = |wanted: &[Tag]| {
        wanted
            .iter()
            .map(|tag| fields_for(tags, *tag).first().map_or("", String::as_str))
            .collect::<Vec<_>>()
            .join(", ")
    };
    let warnings = |count: u64| format!("{count} warnings");

    let mut rows = vec![TestRow::new(
        "Adherence to schema",
        "All scraped fields",
        inputs.validation_errors as usize,
        warnings(inputs.validation_errors),
    )];
    if inputs.checked_duplicate_items > 0 {
        rows.push(TestRow::new(
            "Duplicated Items",
            joined(&[Tag::NameField, Tag::ProductUrlField]),
            inputs.duplicated_items as usize,
            warnings(inputs.duplicated_items),
        ));
    }
    if inputs.checked_unique_items > 0 {
        rows.push(TestRow::new(
            "Duplicated Field Values",
            fields_for(tags, Tag::Unique).join(", "),
            inputs.duplicated_unique as usize,
            warnings(inputs.duplicated_unique),
        ));
    }
    if inputs.checked_price_items > 0 {
        rows.push(TestRow::new(
            "Prices comparison",
            joined(&[Tag::ProductPriceField, Tag::ProductPriceWasField]),
            inputs.price_errors as usize,
            warnings(inputs.price_errors),
        ));
    }
    for result in extra {
        let errors = result.err_items_count();
        rows.push(TestRow::new(
            result.name.as_str(),
            "All scraped fields",
            errors,
            format!("{errors} warnings ({items_count} items checked)"),
        ));
    }
    rows
}

/// Most frequent values of each category field that has any, linked to
/// the first product url carrying them.
pub fn category_tables(items: &Items, tags: &TaggedFields) -> Result<Vec<CategoryTable>> {
    let urls = match fields_for(tags, Tag::ProductUrlField).first() {
        Some(field) if items.has_column(field) => Some(items.column_texts(field)?),
        _ => None,
    };

    let mut tables = Vec::new();
    for field in fields_for(tags, Tag::Category) {
        if !items.has_column(field) {
            debug!(field = %field, "category field not in items");
            continue;
        }
        let cells = items.column_texts(field)?;
        let counts = sorted_counts(value_counts(&cells, false), false);
        if counts.is_empty() {
            continue;
        }
        let rows = counts
            .into_iter()
            .take(TOP_CATEGORIES)
            .map(|(value, count)| {
                let url = urls.as_ref().and_then(|urls| {
                    cells
                        .iter()
                        .position(|cell| cell.as_deref() == Some(value.as_str()))
                        .and_then(|row| urls[row].clone())
                });
                CategoryRow {
                    value,
                    count: count as usize,
                    url,
                }
            })
            .collect();
        tables.push(CategoryTable {
            field: field.clone(),
            rows,
        });
    }
    Ok(tables)
}

/// CSS class of a score cell.
pub fn score_class(score: u32) -> &'static str {
    match score {
        80.. => "good",
        66..=79 => "fair",
        _ => "poor",
    }
}

impl DataQualityReport<'_> {
    pub fn render(&self) -> Result<String> {
        let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);
        writer.write_event(Event::DocType(BytesText::new("html")))?;
        start(&mut writer, "html", &[("lang", "en")])?;

        start(&mut writer, "head", &[])?;
        writer.write_event(Event::Empty(
            BytesStart::new("meta").with_attributes([("charset", "utf-8")]),
        ))?;
        text_element(&mut writer, "title", &[], &self.title())?;
        text_element(&mut writer, "style", &[], STYLE)?;
        end(&mut writer, "head")?;

        start(&mut writer, "body", &[])?;
        text_element(&mut writer, "h1", &[], &self.title())?;
        self.write_scores(&mut writer)?;
        self.write_job_summary(&mut writer)?;
        self.write_tests(&mut writer)?;
        self.write_coverage(&mut writer)?;
        for table in &self.categories {
            write_categories(&mut writer, table)?;
        }
        self.write_appendix(&mut writer)?;
        end(&mut writer, "body")?;

        end(&mut writer, "html")?;
        Ok(String::from_utf8(writer.into_inner())?)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let html = self.render()?;
        fs::write(path, html).map_err(|source| ReportError::Save {
            path: path.to_path_buf(),
            source,
        })?;
        debug!(path = %path.display(), "data quality report written");
        Ok(())
    }

    fn title(&self) -> String {
        match &self.job.spider {
            Some(spider) => format!("Data Quality Report - {spider}"),
            None => "Data Quality Report".to_string(),
        }
    }

    fn write_scores<W: Write>(&self, writer: &mut Writer<W>) -> Result<()> {
        let class = score_class(self.estimate.overall);
        start(writer, "table", &[("class", "scores")])?;
        header_row(writer, &["Field Accuracy Score", "Overall Quality Score"])?;
        start(writer, "tr", &[])?;
        text_element(writer, "td", &[("class", class)], &self.estimate.field_accuracy.to_string())?;
        text_element(writer, "td", &[("class", class)], &self.estimate.overall.to_string())?;
        end(writer, "tr")?;
        end(writer, "table")
    }

    fn write_job_summary<W: Write>(&self, writer: &mut Writer<W>) -> Result<()> {
        let job = self.job;
        let spider = job.spider.as_deref().unwrap_or("-");
        text_element(writer, "h2", &[], &format!("Summary for spider {spider}"))?;
        start(writer, "table", &[("class", "job")])?;
        header_row(writer, &["Job Stat", "Stat Value"])?;

        let url = format!("{JOB_URL_BASE}/{}", job.key);
        start(writer, "tr", &[])?;
        text_element(writer, "td", &[], "Job URL")?;
        start(writer, "td", &[])?;
        text_element(writer, "a", &[("href", url.as_str())], &url)?;
        end(writer, "td")?;
        end(writer, "tr")?;

        let rows = [
            ("Spider State", job.state.clone()),
            (
                "Spider Close Reason",
                job.close_reason.clone().unwrap_or_else(|| "None".to_string()),
            ),
            ("Number of Scraped Items", job.items_count.to_string()),
            ("Number of Errors", job.errors_count.to_string()),
            ("Runtime", runtime(job)),
            (
                "Request Success Ratio [requests/scraped items]",
                request_ratio(job),
            ),
            ("Crawling Speed [items/min]", crawling_speed(job)),
            (
                "Crawlera user",
                job.crawlera_user
                    .clone()
                    .filter(|user| !user.is_empty())
                    .unwrap_or_else(|| "Not Used".to_string()),
            ),
            ("Max Memory Usage [Bytes]", job.max_memusage.to_string()),
        ];
        for (label, value) in &rows {
            data_row(writer, &[*label, value.as_str()])?;
        }

        start(writer, "tr", &[])?;
        text_element(writer, "td", &[], "Response Status Count")?;
        start(writer, "td", &[])?;
        for status in [200, 301, 404, 503] {
            writer.write_event(Event::Text(BytesText::new(&format!(
                "{status}: {}",
                job.status_count(status)
            ))))?;
            writer.write_event(Event::Empty(BytesStart::new("br")))?;
        }
        end(writer, "td")?;
        end(writer, "tr")?;
        end(writer, "table")
    }

    fn write_tests<W: Write>(&self, writer: &mut Writer<W>) -> Result<()> {
        text_element(writer, "h2", &[], "Test Summary")?;
        start(writer, "table", &[("class", "tests")])?;
        header_row(writer, &["Test Name", "Tested Fields", "Result", "Status"])?;
        for row in &self.tests {
            let class = if row.passed { "good" } else { "poor" };
            start(writer, "tr", &[])?;
            text_element(writer, "td", &[], &row.name)?;
            text_element(writer, "td", &[], &row.fields)?;
            text_element(writer, "td", &[], &row.result)?;
            text_element(writer, "td", &[("class", class)], row.status())?;
            end(writer, "tr")?;
        }
        end(writer, "table")
    }

    fn write_coverage<W: Write>(&self, writer: &mut Writer<W>) -> Result<()> {
        let Some(result) = self.coverage else {
            return Ok(());
        };
        let Some(Stat::Series(series)) = result.stats.first() else {
            return Ok(());
        };
        text_element(writer, "h2", &[], &series.name)?;
        start(writer, "table", &[("class", "coverage")])?;
        header_row(writer, &["Field", "Items", "Coverage"])?;
        for (field, count) in &series.entries {
            let share = if result.items_count == 0 {
                0.0
            } else {
                count / result.items_count as f64 * 100.0
            };
            let count = format!("{count:.0}");
            let share = format!("{share:.0}%");
            data_row(writer, &[field.as_str(), count.as_str(), share.as_str()])?;
        }
        end(writer, "table")
    }

    fn write_appendix<W: Write>(&self, writer: &mut Writer<W>) -> Result<()> {
        text_element(writer, "h1", &[], "Appendix")?;
        text_element(writer, "h2", &[], "Appendix A: The JSON Schema")?;
        text_element(writer, "pre", &[], &serde_json::to_string_pretty(self.schema)?)
    }
}

fn write_categories<W: Write>(writer: &mut Writer<W>, table: &CategoryTable) -> Result<()> {
    text_element(
        writer,
        "h2",
        &[],
        &format!("Top {TOP_CATEGORIES} Categories for '{}'", table.field),
    )?;
    start(writer, "table", &[("class", "categories")])?;
    header_row(writer, &["CATEGORY", "SCRAPED ITEMS"])?;
    for row in &table.rows {
        start(writer, "tr", &[])?;
        match &row.url {
            Some(url) => {
                start(writer, "td", &[])?;
                text_element(writer, "a", &[("href", url.as_str())], &row.value)?;
                end(writer, "td")?;
            }
            None => text_element(writer, "td", &[], &row.value)?,
        }
        text_element(writer, "td", &[], &row.count.to_string())?;
        end(writer, "tr")?;
    }
    end(writer, "table")
}

fn runtime(job: &JobMetadata) -> String {
    job.runtime_ms()
        .map_or_else(|| "-".to_string(), format_duration)
}

fn request_ratio(job: &JobMetadata) -> String {
    if job.items_count == 0 {
        return "-".to_string();
    }
    round2(job.requests_count as f64 / job.items_count as f64).to_string()
}

fn crawling_speed(job: &JobMetadata) -> String {
    match job.runtime_ms() {
        Some(ms) if ms > 0 => {
            let per_minute = job.items_count as f64 / (ms as f64 / 60_000.0);
            ((per_minute * 1000.0).round() / 1000.0).to_string()
        }
        _ => "-".to_string(),
    }
}

fn start<W: Write>(writer: &mut Writer<W>, name: &str, attributes: &[(&str, &str)]) -> Result<()> {
    let mut element = BytesStart::new(name);
    for attribute in attributes {
        element.push_attribute(*attribute);
    }
    writer.write_event(Event::Start(element))?;
    Ok(())
}

fn end<W: Write>(writer: &mut Writer<W>, name: &str) -> Result<()> {
    writer.write_event(Event::End(BytesEnd::new(name)))?;
    Ok(())
}

fn text_element<W: Write>(
    writer: &mut Writer<W>,
    name: &str,
    attributes: &[(&str, &str)],
    text: &str,
) -> Result<()> {
    start(writer, name, attributes)?;
    writer.write_event(Event::Text(BytesText::new(text)))?;
    end(writer, name)
}

fn header_row<W: Write>(writer: &mut Writer<W>, labels: &[&str]) -> Result<()> {
    start(writer, "tr", &[])?;
    for label in labels {
        text_element(writer, "th", &[], label)?;
    }
    end(writer, "tr")
}

fn data_row<W: Write>(writer: &mut Writer<W>, values: &[&str]) -> Result<()> {
    start(writer, "tr", &[])?;
    for value in values {
        text_element(writer, "td", &[], value)?;
    }
    end(writer, "tr")
}
