//! Subcommand implementations. Each returns whether any printed rule found
//! errors, which sets the exit code.

use std::fs;

use anyhow::{Context, Result};
use tracing::{info, info_span};

use crawlqa_cli::session::{Dataset, Session};
use crawlqa_ingest::load_schema;
use crawlqa_model::RuleResult;
use crawlqa_report::{Report, render_details, render_summaries};
use crawlqa_rules::find_by;

use crate::cli::{DqrArgs, DuplicatesArgs, OutputArgs, ReportArgs, SourceArgs, ValidateArgs};

pub fn run_report(args: &ReportArgs) -> Result<bool> {
    let _span = info_span!("report").entered();
    let target = match &args.target_items {
        Some(items) => Some(Dataset::load(
            args.target.as_deref(),
            items,
            args.target_job_meta.as_deref(),
            !args.source.no_expand,
        )?),
        None => None,
    };
    let mut session = open_session(&args.source, target)?;
    session.run_all_rules()?;
    print_report(session.report(), &args.output)
}

pub fn run_validate(args: &ValidateArgs, fast: bool) -> Result<bool> {
    let _span = info_span!("validate", fast).entered();
    let mut session = open_session(&args.source, None)?;
    let result = session.validate_with_json_schema(fast)?;
    print_result(result, &args.output)
}

pub fn run_tags(args: &SourceArgs) -> Result<bool> {
    let mut session = open_session(args, None)?;
    let result = session.check_tags()?;
    print_result(result, &OutputArgs::default())
}

pub fn run_duplicates(args: &DuplicatesArgs) -> Result<bool> {
    let session = open_session(&args.source, None)?;
    let columns: Vec<&str> = args.by.iter().map(String::as_str).collect();
    let result = find_by(&session.source().items, &columns);
    print_result(result, &args.output)
}

pub fn run_dqr(args: &DqrArgs) -> Result<bool> {
    let mut session = open_session(&args.source, None)?;
    session.run_all_rules()?;
    let quality = session.data_quality_report()?;
    match &args.output {
        Some(path) => {
            fs::write(path, &quality.html)
                .with_context(|| format!("write report to {}", path.display()))?;
            info!(path = %path.display(), "data quality report written");
            println!(
                "Overall quality score {}, field accuracy {} ({})",
                quality.estimate.overall,
                quality.estimate.field_accuracy,
                path.display()
            );
        }
        None => println!("{}", quality.html),
    }
    Ok(false)
}

fn open_session(args: &SourceArgs, target: Option<Dataset>) -> Result<Session> {
    let source = Dataset::load(
        args.source.as_deref(),
        &args.items,
        args.job_meta.as_deref(),
        !args.no_expand,
    )?;
    let schema = args
        .schema
        .as_deref()
        .map(|path| load_schema(path).with_context(|| format!("load schema from {}", path.display())))
        .transpose()?;
    info!(
        source = %source.source,
        items = source.items.len(),
        schema = schema.is_some(),
        target = target.is_some(),
        "session opened"
    );
    Ok(Session::new(source, target, schema))
}

fn print_result(result: RuleResult, output: &OutputArgs) -> Result<bool> {
    let mut report = Report::new();
    report.save(result);
    print_report(&report, output)
}

fn print_report(report: &Report, output: &OutputArgs) -> Result<bool> {
    if output.json {
        let json = serde_json::to_string_pretty(report.results()).context("serialize results")?;
        println!("{json}");
    } else {
        println!("{}", render_summaries(report));
        println!();
        println!("{}", render_details(report, output.short, output.keys_limit));
    }
    Ok(report.results().iter().any(RuleResult::has_errors))
}
