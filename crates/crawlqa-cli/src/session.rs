//! One audit session over a source table and an optional target.
//!
//! The session owns the [`Report`] and a [`RuleCache`]. Stages mirror how
//! the checks depend on their inputs: job metadata, the items alone, items
//! against a target, and rules driven by schema tags.

use std::path::Path;

use anyhow::{Context, Result, bail};
use tracing::{info, info_span, warn};

use crawlqa_ingest::{DataSource, Schema, load_items, load_job_metadata};
use crawlqa_model::{Items, JobMetadata, RuleResult, Tag, TaggedFields, fields_for};
use crawlqa_report::{DataQualityReport, Report, category_tables, test_summary};
use crawlqa_rules::{
    DEFAULT_MAX_UNIQUES, category, check_errors, check_fields_coverage, check_outcome,
    check_response_ratio, check_tags, compare_boolean_fields, compare_errors,
    compare_finish_time, compare_names_for_same_urls, compare_number_of_scraped_items,
    compare_prices_for_same_names, compare_prices_for_same_urls, compare_response_ratio,
    compare_runtime, compare_scraped_fields, compare_spider_names, compare_was_now, coverage,
    find_by_name_url, find_by_unique, garbage_symbols, get_categories,
    get_coverage_per_category, skips_tag_rules, validate,
};
use crawlqa_score::{QualityEstimate, QualityInputs, estimate};

use crate::cache::{Fingerprint, FingerprintBuilder, RuleCache};

pub const FIELD_COUNTS_WARN_THRESHOLD: f64 = 0.05;
pub const FIELD_COUNTS_ERR_THRESHOLD: f64 = 0.10;
pub const CATEGORY_ERR_THRESHOLD: f64 = 0.20;
pub const CATEGORY_WARN_THRESHOLD: f64 = 0.10;
pub const BOOLEAN_ERR_THRESHOLD: f64 = 0.10;
pub const BOOLEAN_WARN_THRESHOLD: f64 = 0.05;

const VALIDATION_RULE: &str = "JSON Schema Validation";
const GARBAGE_RULE: &str = "Garbage Symbols";
const COVERAGE_RULE: &str = "Fields Coverage";

/// Items together with where they came from.
#[derive(Debug, Clone)]
pub struct Dataset {
    pub source: DataSource,
    pub items: Items,
    pub job: Option<JobMetadata>,
}

impl Dataset {
    /// Loads items and optional job metadata from local files.
    ///
    /// `key` names the job or collection the file was exported from; without
    /// one the file itself is the source.
    pub fn load(
        key: Option<&str>,
        items_path: &Path,
        job_meta: Option<&Path>,
        expand: bool,
    ) -> Result<Self> {
        let source = DataSource::resolve(key, items_path.to_path_buf())
            .with_context(|| format!("invalid source key {}", key.unwrap_or_default()))?;
        let items = load_items(items_path, &source.to_string(), expand)
            .with_context(|| format!("load items from {}", items_path.display()))?;
        let job = job_meta
            .map(|path| {
                load_job_metadata(path)
                    .with_context(|| format!("load job metadata from {}", path.display()))
            })
            .transpose()?;
        Ok(Self::new(source, items, job))
    }

    pub fn new(source: DataSource, items: Items, job: Option<JobMetadata>) -> Self {
        let job = job.map(|mut job| {
            if job.key.is_empty() {
                job.key = source.to_string();
            }
            job
        });
        Self { source, items, job }
    }
}

/// Score and rendered page of a data-quality report.
#[derive(Debug, Clone)]
pub struct QualityReport {
    pub estimate: QualityEstimate,
    pub html: String,
}

#[derive(Debug, Clone)]
struct Prints {
    source: Fingerprint,
    target: Option<Fingerprint>,
    schema: Option<Fingerprint>,
}

pub struct Session {
    source: Dataset,
    target: Option<Dataset>,
    schema: Option<Schema>,
    report: Report,
    cache: RuleCache,
    prints: Prints,
}

impl Session {
    /// A target equal to the source is dropped with a warning.
    pub fn new(source: Dataset, target: Option<Dataset>, schema: Option<Schema>) -> Self {
        let target = target.filter(|target| {
            let same = target.source == source.source;
            if same {
                warn!(source = %source.source, "target is the same as source and will be ignored");
            }
            !same
        });
        let prints = Prints {
            source: FingerprintBuilder::new().items(&source.items).finish(),
            target: target
                .as_ref()
                .map(|target| FingerprintBuilder::new().items(&target.items).finish()),
            schema: schema
                .as_ref()
                .map(|schema| FingerprintBuilder::new().schema(schema).finish()),
        };
        Self {
            source,
            target,
            schema,
            report: Report::new(),
            cache: RuleCache::new(),
            prints,
        }
    }

    pub fn report(&self) -> &Report {
        &self.report
    }

    pub fn cache(&self) -> &RuleCache {
        &self.cache
    }

    pub fn source(&self) -> &Dataset {
        &self.source
    }

    pub fn target(&self) -> Option<&Dataset> {
        self.target.as_ref()
    }

    pub fn schema(&self) -> Option<&Schema> {
        self.schema.as_ref()
    }

    pub fn save_result(&mut self, result: RuleResult) {
        self.report.save(result);
    }

    /// Metadata, general, comparison and schema rules, in that order.
    pub fn run_all_rules(&mut self) -> Result<()> {
        if self.source.job.is_some() {
            self.check_metadata();
            if self.target.as_ref().is_some_and(|target| target.job.is_some()) {
                self.compare_metadata();
            }
        }
        self.run_general_rules();
        self.run_comparison_rules();
        self.run_schema_rules()?;
        info!(rules = self.report.len(), cache_hits = self.cache.hits(), "all rules done");
        Ok(())
    }

    pub fn check_metadata(&mut self) {
        let Some(job) = self.source.job.clone() else {
            return;
        };
        let _span = info_span!("metadata", job = %job.key).entered();
        let inputs = FingerprintBuilder::new().job(&job).finish();
        self.run("check_outcome", &inputs, |_, _| check_outcome(&job));
        self.run("check_errors", &inputs, |_, _| check_errors(&job));
        self.run("check_response_ratio", &inputs, |_, _| check_response_ratio(&job));
    }

    pub fn compare_metadata(&mut self) {
        let (Some(source), Some(target)) = (
            self.source.job.clone(),
            self.target.as_ref().and_then(|target| target.job.clone()),
        ) else {
            return;
        };
        let _span = info_span!("compare_metadata", source = %source.key, target = %target.key)
            .entered();
        let inputs = FingerprintBuilder::new().job(&source).job(&target).finish();
        self.run("compare_spider_names", &inputs, |_, _| {
            compare_spider_names(&source, &target)
        });
        self.run("compare_errors", &inputs, |_, _| compare_errors(&source, &target));
        self.run("compare_number_of_scraped_items", &inputs, |_, _| {
            compare_number_of_scraped_items(&source, &target)
        });
        self.run("coverage_difference", &inputs, |_, _| {
            coverage::get_difference(
                &source,
                &target,
                FIELD_COUNTS_WARN_THRESHOLD,
                FIELD_COUNTS_ERR_THRESHOLD,
            )
        });
        self.run("compare_response_ratio", &inputs, |_, _| {
            compare_response_ratio(&source, &target)
        });
        self.run("compare_runtime", &inputs, |_, _| compare_runtime(&source, &target));
        self.run("compare_finish_time", &inputs, |_, _| {
            compare_finish_time(&source, &target)
        });
    }

    pub fn run_general_rules(&mut self) {
        let _span = info_span!("general", source = %self.source.source).entered();
        let inputs = self.prints.source.clone();
        self.run("garbage_symbols", &inputs, |source, _| garbage_symbols(&source.items));
        self.run("check_fields_coverage", &inputs, |source, _| {
            check_fields_coverage(&source.items)
        });
        self.run("get_categories", &inputs, |source, _| {
            get_categories(&source.items, DEFAULT_MAX_UNIQUES)
        });
    }

    pub fn run_comparison_rules(&mut self) {
        let Some(inputs) = self.comparison_inputs() else {
            return;
        };
        let _span = info_span!("comparison").entered();
        self.run_compared("compare_scraped_fields", &inputs, compare_scraped_fields);
        self.run_compared("compare_boolean_fields", &inputs, |source, target| {
            compare_boolean_fields(source, target, BOOLEAN_ERR_THRESHOLD, BOOLEAN_WARN_THRESHOLD)
        });
    }

    /// Validation, tag lookup, then the tag-driven rules unless a tagged
    /// field is missing.
    pub fn run_schema_rules(&mut self) -> Result<()> {
        let Some(schema) = self.schema.clone() else {
            return Ok(());
        };
        let _span = info_span!("schema").entered();
        self.validate_with_json_schema(false)?;

        let tags_result = self.check_tags()?;
        if skips_tag_rules(&tags_result) {
            info!("tagged fields missing, tag rules skipped");
            return Ok(());
        }
        let inputs = self.schema_inputs()?;
        self.run_customized_rules(&schema.tags, &inputs);
        self.compare_with_customized_rules(&schema.tags, &inputs);
        Ok(())
    }

    /// Reports used tags and tagged fields missing from source or target.
    pub fn check_tags(&mut self) -> Result<RuleResult> {
        let Some(schema) = self.schema.clone() else {
            bail!("a schema is required to check tags");
        };
        let inputs = self.schema_inputs()?;
        Ok(self.run("check_tags", &inputs, |source, target| {
            let source_columns = source.items.columns();
            let target_columns = target.map(|target| target.items.columns());
            check_tags(&source_columns, target_columns.as_deref(), &schema.tags)
        }))
    }

    fn run_customized_rules(&mut self, tags: &TaggedFields, inputs: &Fingerprint) {
        self.run("compare_was_now", inputs, |source, _| compare_was_now(&source.items, tags));
        self.run("find_by_unique", inputs, |source, _| find_by_unique(&source.items, tags));
        self.run("find_by_name_url", inputs, |source, _| {
            find_by_name_url(&source.items, tags)
        });
        self.run("get_coverage_per_category", inputs, |source, _| {
            get_coverage_per_category(&source.items, fields_for(tags, Tag::Category))
        });
    }

    fn compare_with_customized_rules(&mut self, tags: &TaggedFields, inputs: &Fingerprint) {
        let categories = fields_for(tags, Tag::Category);
        self.run_compared("category_difference", inputs, |source, target| {
            category::get_difference(
                source,
                target,
                categories,
                CATEGORY_ERR_THRESHOLD,
                CATEGORY_WARN_THRESHOLD,
            )
        });
        self.run_compared("compare_prices_for_same_urls", inputs, |source, target| {
            compare_prices_for_same_urls(source, target, tags)
        });
        self.run_compared("compare_names_for_same_urls", inputs, |source, target| {
            compare_names_for_same_urls(source, target, tags)
        });
        self.run_compared("compare_prices_for_same_names", inputs, |source, target| {
            compare_prices_for_same_names(source, target, tags)
        });
    }

    /// Validates the source against the schema: every error per item, or
    /// only the first one in `fast` mode.
    pub fn validate_with_json_schema(&mut self, fast: bool) -> Result<RuleResult> {
        let (Some(schema), Some(schema_print)) = (self.schema.as_ref(), self.prints.schema.as_ref())
        else {
            bail!("a schema is required for validation");
        };
        let rule = if fast { "validate_fast" } else { "validate" };
        let inputs = FingerprintBuilder::new()
            .label(self.prints.source.as_str())
            .label(schema_print.as_str())
            .finish();
        let result = self
            .cache
            .try_get_or_run(rule, &inputs, || validate(&schema.raw, &self.source.items, fast))
            .context("schema validation failed")?;
        self.report.save(result.clone());
        Ok(result)
    }

    /// Scores the source job and renders the HTML data-quality report.
    pub fn data_quality_report(&mut self) -> Result<QualityReport> {
        if self.source.source.is_collection() {
            bail!("collections are not supported by the data quality report");
        }
        let Some(schema) = self.schema.clone() else {
            bail!("schema is empty");
        };
        let Some(job) = self.source.job.clone() else {
            bail!("job metadata is required for the data quality report");
        };
        let _span = info_span!("data_quality_report", job = %job.key).entered();

        let validation = match self.report.get(VALIDATION_RULE) {
            Some(result) => result.clone(),
            None => self.validate_with_json_schema(false)?,
        };
        let inputs = self.schema_inputs()?;
        let tags = &schema.tags;
        let duplicates = self.cached("find_by_name_url", &inputs, |source, _| {
            find_by_name_url(&source.items, tags)
        });
        let unique = self.cached("find_by_unique", &inputs, |source, _| {
            find_by_unique(&source.items, tags)
        });
        let price = self.cached("compare_was_now", &inputs, |source, _| {
            compare_was_now(&source.items, tags)
        });
        let source_print = self.prints.source.clone();
        let garbage = match self.report.get(GARBAGE_RULE) {
            Some(result) => result.clone(),
            None => self.cached("garbage_symbols", &source_print, |source, _| {
                garbage_symbols(&source.items)
            }),
        };
        let coverage = match self.report.get(COVERAGE_RULE) {
            Some(result) => result.clone(),
            None => self.cached("check_fields_coverage", &source_print, |source, _| {
                check_fields_coverage(&source.items)
            }),
        };

        let inputs = QualityInputs {
            validation_errors: validation.error_groups_count() as u64,
            duplicated_items: duplicates.err_items_count() as u64,
            checked_duplicate_items: checked_items(&duplicates),
            duplicated_unique: unique.err_items_count() as u64,
            checked_unique_items: checked_items(&unique),
            price_errors: price.flagged_keys().len() as u64,
            checked_price_items: checked_items(&price),
            tested: true,
        };
        let extra = [&garbage];
        let estimate = estimate(&job, &inputs, &extra);
        let page = DataQualityReport {
            estimate,
            job: &job,
            tests: test_summary(&inputs, tags, &extra, self.source.items.len()),
            coverage: Some(&coverage),
            categories: category_tables(&self.source.items, tags)?,
            schema: &schema.raw,
        };
        let html = page.render()?;
        info!(
            overall = estimate.overall,
            field_accuracy = estimate.field_accuracy,
            "data quality report rendered"
        );
        Ok(QualityReport { estimate, html })
    }

    /// Source and target items; `None` without a target.
    fn comparison_inputs(&self) -> Option<Fingerprint> {
        let target = self.prints.target.as_ref()?;
        Some(
            FingerprintBuilder::new()
                .label(self.prints.source.as_str())
                .label(target.as_str())
                .finish(),
        )
    }

    /// Source, schema and, when present, target items.
    fn schema_inputs(&self) -> Result<Fingerprint> {
        let Some(schema) = &self.prints.schema else {
            bail!("schema is empty");
        };
        let mut builder = FingerprintBuilder::new()
            .label(self.prints.source.as_str())
            .label(schema.as_str());
        if let Some(target) = &self.prints.target {
            builder = builder.label(target.as_str());
        }
        Ok(builder.finish())
    }

    /// Runs a rule through the cache and saves it to the report.
    fn run<F>(&mut self, rule: &'static str, inputs: &Fingerprint, run: F) -> RuleResult
    where
        F: FnOnce(&Dataset, Option<&Dataset>) -> RuleResult,
    {
        let result = self.cached(rule, inputs, run);
        self.report.save(result.clone());
        result
    }

    /// Runs a rule over source and target items; nothing without a target.
    fn run_compared<F>(&mut self, rule: &'static str, inputs: &Fingerprint, run: F)
    where
        F: FnOnce(&Items, &Items) -> RuleResult,
    {
        let Self {
            source,
            target,
            cache,
            report,
            ..
        } = self;
        let Some(target) = target else {
            return;
        };
        let result = cache.get_or_run(rule, inputs, || run(&source.items, &target.items));
        report.save(result);
    }

    fn cached<F>(&mut self, rule: &'static str, inputs: &Fingerprint, run: F) -> RuleResult
    where
        F: FnOnce(&Dataset, Option<&Dataset>) -> RuleResult,
    {
        let Self {
            source,
            target,
            cache,
            ..
        } = self;
        cache.get_or_run(rule, inputs, || run(source, target.as_ref()))
    }
}

/// Items a check looked at; a skipped check looked at none.
fn checked_items(result: &RuleResult) -> u64 {
    if result.is_skipped() {
        0
    } else {
        result.items_count as u64
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn dataset(key: &str, rows: Vec<serde_json::Value>) -> Dataset {
        let items = Items::from_rows(key, rows, false).expect("items");
        Dataset::new(DataSource::File(key.into()), items, None)
    }

    #[test]
    fn same_target_is_ignored() {
        let source = dataset("a.jl", vec![json!({"id": 1})]);
        let target = dataset("a.jl", vec![json!({"id": 1})]);
        let session = Session::new(source, Some(target), None);
        assert!(session.target().is_none());
    }

    #[test]
    fn rules_without_schema_or_target() {
        let mut session = Session::new(dataset("a.jl", vec![json!({"id": 1})]), None, None);
        session.run_all_rules().expect("rules");
        let names: Vec<&str> = session
            .report()
            .results()
            .iter()
            .map(|result| result.name.as_str())
            .collect();
        assert_eq!(names, ["Garbage Symbols", "Fields Coverage", "Categories"]);
    }

    #[test]
    fn rerun_hits_the_cache() {
        let mut session = Session::new(dataset("a.jl", vec![json!({"id": 1})]), None, None);
        session.run_all_rules().expect("rules");
        let first = session.report().results().to_vec();
        session.run_all_rules().expect("rules");
        assert_eq!(session.cache().hits(), 3);
        assert_eq!(session.report().results(), first.as_slice());
    }

    #[test]
    fn skipped_checks_looked_at_nothing() {
        let mut skipped = RuleResult::new("Duplicated Items").with_items_count(10);
        skipped.add_info(crawlqa_model::Outcome::Skipped);
        assert_eq!(checked_items(&skipped), 0);
        assert_eq!(checked_items(&RuleResult::new("x").with_items_count(10)), 10);
    }
}
