//! Terminal rendering of a [`Report`].

use std::fmt::Write as _;

use comfy_table::modifiers::{UTF8_ROUND_CORNERS, UTF8_SOLID_INNER_BORDERS};
use comfy_table::presets::{UTF8_FULL, UTF8_FULL_CONDENSED};
use comfy_table::{
    Attribute, Cell, CellAlignment, Color, ColumnConstraint, ContentArrangement, Table, Width,
};

use crawlqa_model::{Level, Stat, StatSeries, StatTable};
use crawlqa_rules::helpers::MISSING;

use crate::report::{ErrorGroup, Report, RuleDetails};

const BAR_WIDTH: usize = 30;

/// Summary lines of every rule, one table row per message.
pub fn render_summaries(report: &Report) -> String {
    let mut table = Table::new();
    table.set_header(vec![
        header_cell("Rule"),
        header_cell("Level"),
        header_cell("Summary"),
    ]);
    apply_summary_table_style(&mut table);
    align_column(&mut table, 1, CellAlignment::Center);

    for summary in report.summaries() {
        for (index, line) in summary.lines.iter().enumerate() {
            let name = if index == 0 {
                rule_cell(&summary.name)
            } else {
                dim_cell("")
            };
            table.add_row(vec![
                name,
                level_cell(line.level, &line.text),
                Cell::new(&line.text),
            ]);
        }
    }
    format!("Executed {} rules\n{table}", report.len())
}

/// Error groups, detailed texts and stats of rules that have any.
pub fn render_details(report: &Report, short: bool, keys_limit: usize) -> String {
    let mut out = String::from("Details\n");
    for details in report.details(short, keys_limit) {
        write_rule_details(&mut out, &details);
    }
    out
}

fn write_rule_details(out: &mut String, details: &RuleDetails) {
    let _ = writeln!(out, "\n{} ({} message(s)):", details.name, details.messages_count);
    if !details.groups.is_empty() {
        let _ = writeln!(out, "{}", groups_table(&details.groups));
    }
    for text in &details.detailed {
        let _ = writeln!(out, "{text}");
    }
    for stat in &details.stats {
        let _ = writeln!(out, "{}\n{}", stat.name(), stat_table(stat));
    }
}

fn groups_table(groups: &[ErrorGroup]) -> Table {
    let mut table = Table::new();
    table.set_header(vec![
        header_cell("Items"),
        header_cell("Cause"),
        header_cell("Sample keys"),
    ]);
    apply_table_style(&mut table);
    align_column(&mut table, 0, CellAlignment::Right);
    for group in groups {
        table.add_row(vec![
            Cell::new(group.count).fg(Color::Red),
            Cell::new(&group.cause),
            example_cell(group.sample.join(", ")),
        ]);
    }
    table
}

/// Stats as text tables; series get a proportional bar.
pub fn stat_table(stat: &Stat) -> Table {
    match stat {
        Stat::Series(series) => series_table(series),
        Stat::Table(table) => frame_table(table),
    }
}

fn series_table(series: &StatSeries) -> Table {
    let mut table = Table::new();
    table.set_header(vec![
        header_cell("Value"),
        header_cell("Count"),
        header_cell(""),
    ]);
    apply_table_style(&mut table);
    align_column(&mut table, 1, CellAlignment::Right);

    let max = series
        .entries
        .iter()
        .map(|(_, value)| value.abs())
        .fold(0.0_f64, f64::max);
    for (label, value) in &series.entries {
        table.add_row(vec![
            label_cell(label),
            Cell::new(format_value(*value)),
            Cell::new(bar(*value, max)).fg(Color::Blue),
        ]);
    }
    table
}

fn frame_table(stat: &StatTable) -> Table {
    let mut table = Table::new();
    let mut header = vec![header_cell("")];
    header.extend(stat.columns.iter().map(|column| header_cell(column)));
    table.set_header(header);
    apply_table_style(&mut table);
    for index in 1..=stat.columns.len() {
        align_column(&mut table, index, CellAlignment::Right);
    }
    for (label, values) in &stat.rows {
        let mut row = vec![label_cell(label)];
        row.extend(values.iter().map(|value| Cell::new(format_value(*value))));
        table.add_row(row);
    }
    table
}

fn bar(value: f64, max: f64) -> String {
    if max <= 0.0 {
        return String::new();
    }
    let width = (value.abs() / max * BAR_WIDTH as f64).round() as usize;
    "█".repeat(width)
}

/// Whole numbers without decimals, shares with up to four.
pub fn format_value(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{value:.0}")
    } else {
        let text = format!("{value:.4}");
        text.trim_end_matches('0').to_string()
    }
}

fn apply_table_style(table: &mut Table) {
    table
        .load_preset(UTF8_FULL_CONDENSED)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_width(120);
}

fn apply_summary_table_style(table: &mut Table) {
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .apply_modifier(UTF8_SOLID_INNER_BORDERS)
        .set_content_arrangement(ContentArrangement::DynamicFullWidth)
        .set_width(140)
        .set_constraints(vec![
            ColumnConstraint::UpperBoundary(Width::Percentage(30)),
            ColumnConstraint::LowerBoundary(Width::Fixed(9)),
            ColumnConstraint::UpperBoundary(Width::Percentage(60)),
        ]);
}

fn align_column(table: &mut Table, index: usize, alignment: CellAlignment) {
    if let Some(column) = table.column_mut(index) {
        column.set_cell_alignment(alignment);
    }
}

fn level_cell(level: Level, text: &str) -> Cell {
    match level {
        Level::Error => Cell::new("ERROR")
            .fg(Color::Red)
            .add_attribute(Attribute::Bold),
        Level::Warning => Cell::new("WARNING").fg(Color::Yellow),
        Level::Info if text == "PASSED" => Cell::new("PASSED").fg(Color::Green),
        Level::Info => Cell::new("INFO"),
    }
}

fn header_cell(label: &str) -> Cell {
    Cell::new(label)
        .fg(Color::Cyan)
        .add_attribute(Attribute::Bold)
}

fn rule_cell(name: &str) -> Cell {
    Cell::new(name)
        .fg(Color::Blue)
        .add_attribute(Attribute::Bold)
}

fn label_cell(label: &str) -> Cell {
    if label == MISSING {
        dim_cell(label)
    } else {
        Cell::new(label)
    }
}

fn example_cell(value: String) -> Cell {
    if value.is_empty() {
        dim_cell("-")
    } else {
        Cell::new(value)
    }
}

fn dim_cell<T: ToString>(value: T) -> Cell {
    Cell::new(value).fg(Color::DarkGrey)
}
