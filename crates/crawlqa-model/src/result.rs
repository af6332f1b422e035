//! Rule outcome model.
//!
//! Every rule returns a [`RuleResult`]: a named set of severity-tagged
//! [`Message`]s, the size of the checked population and optional statistics
//! for plotting. Row keys flagged by ERROR messages are derived on demand so
//! they can never go stale.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};

/// Cause text mapped to the row keys that exhibit it.
pub type ErrorKeys = BTreeMap<String, BTreeSet<String>>;

/// Message severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Level {
    Info,
    Warning,
    Error,
}

impl Level {
    pub fn as_str(&self) -> &'static str {
        match self {
            Level::Info => "INFO",
            Level::Warning => "WARNING",
            Level::Error => "ERROR",
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcomes that are reported as plain summaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Skipped,
    Passed,
}

impl Outcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Skipped => "SKIPPED",
            Outcome::Passed => "PASSED",
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One outcome line of a rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// A concise outcome.
    pub summary: String,
    /// Long free-form explanation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detailed: Option<String>,
    /// Row keys grouped by cause.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub errors: Option<ErrorKeys>,
}

impl Message {
    pub fn new(summary: impl Into<String>) -> Self {
        Self {
            summary: summary.into(),
            detailed: None,
            errors: None,
        }
    }

    #[must_use]
    pub fn with_detailed(mut self, detailed: impl Into<String>) -> Self {
        self.detailed = Some(detailed.into());
        self
    }

    #[must_use]
    pub fn with_errors(mut self, errors: ErrorKeys) -> Self {
        self.errors = Some(errors);
        self
    }
}

impl From<&str> for Message {
    fn from(summary: &str) -> Self {
        Message::new(summary)
    }
}

impl From<String> for Message {
    fn from(summary: String) -> Self {
        Message::new(summary)
    }
}

impl From<Outcome> for Message {
    fn from(outcome: Outcome) -> Self {
        Message::new(outcome.as_str())
    }
}

/// Labelled values of a single series, e.g. value counts of a column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatSeries {
    pub name: String,
    pub entries: Vec<(String, f64)>,
}

impl StatSeries {
    pub fn new(name: impl Into<String>, entries: Vec<(String, f64)>) -> Self {
        Self {
            name: name.into(),
            entries,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, label: &str) -> Option<f64> {
        self.entries
            .iter()
            .find(|(name, _)| name == label)
            .map(|(_, value)| *value)
    }
}

/// Labelled rows of several named numeric columns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatTable {
    pub name: String,
    pub columns: Vec<String>,
    pub rows: Vec<(String, Vec<f64>)>,
}

impl StatTable {
    pub fn new(name: impl Into<String>, columns: Vec<String>, rows: Vec<(String, Vec<f64>)>) -> Self {
        Self {
            name: name.into(),
            columns,
            rows,
        }
    }

    pub fn row(&self, label: &str) -> Option<&[f64]> {
        self.rows
            .iter()
            .find(|(name, _)| name == label)
            .map(|(_, values)| values.as_slice())
    }
}

/// Plottable statistics attached to a result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Stat {
    Series(StatSeries),
    Table(StatTable),
}

impl Stat {
    pub fn name(&self) -> &str {
        match self {
            Stat::Series(series) => &series.name,
            Stat::Table(table) => &table.name,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Stat::Series(series) => series.entries.len(),
            Stat::Table(table) => table.rows.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl From<StatSeries> for Stat {
    fn from(series: StatSeries) -> Self {
        Stat::Series(series)
    }
}

impl From<StatTable> for Stat {
    fn from(table: StatTable) -> Self {
        Stat::Table(table)
    }
}

/// The full output of one rule run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleResult {
    /// Rule name, stable across runs.
    pub name: String,
    pub messages: BTreeMap<Level, Vec<Message>>,
    /// Size of the checked population.
    pub items_count: usize,
    pub stats: Vec<Stat>,
}

impl RuleResult {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            messages: BTreeMap::new(),
            items_count: 0,
            stats: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_items_count(mut self, items_count: usize) -> Self {
        self.items_count = items_count;
        self
    }

    pub fn add_message(&mut self, level: Level, message: impl Into<Message>) {
        self.messages.entry(level).or_default().push(message.into());
    }

    pub fn add_info(&mut self, message: impl Into<Message>) {
        self.add_message(Level::Info, message);
    }

    pub fn add_warning(&mut self, message: impl Into<Message>) {
        self.add_message(Level::Warning, message);
    }

    pub fn add_error(&mut self, message: impl Into<Message>) {
        self.add_message(Level::Error, message);
    }

    pub fn add_stat(&mut self, stat: impl Into<Stat>) {
        self.stats.push(stat.into());
    }

    pub fn messages_at(&self, level: Level) -> &[Message] {
        self.messages.get(&level).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn info(&self) -> &[Message] {
        self.messages_at(Level::Info)
    }

    pub fn warnings(&self) -> &[Message] {
        self.messages_at(Level::Warning)
    }

    pub fn errors(&self) -> &[Message] {
        self.messages_at(Level::Error)
    }

    pub fn has_errors(&self) -> bool {
        !self.errors().is_empty()
    }

    /// Union of row keys over every message of `level`.
    pub fn keys_at(&self, level: Level) -> BTreeSet<String> {
        self.messages_at(level)
            .iter()
            .filter_map(|message| message.errors.as_ref())
            .flat_map(|errors| errors.values())
            .flat_map(|keys| keys.iter().cloned())
            .collect()
    }

    /// Row keys flagged by ERROR messages.
    pub fn err_keys(&self) -> BTreeSet<String> {
        self.keys_at(Level::Error)
    }

    pub fn err_items_count(&self) -> usize {
        self.err_keys().len()
    }

    /// Row keys flagged by ERROR or WARNING messages.
    pub fn flagged_keys(&self) -> BTreeSet<String> {
        let mut keys = self.err_keys();
        keys.extend(self.keys_at(Level::Warning));
        keys
    }

    /// True when the only outcome is an INFO `SKIPPED` line.
    pub fn is_skipped(&self) -> bool {
        self.messages.len() == 1
            && self
                .info()
                .iter()
                .any(|message| message.summary == Outcome::Skipped.as_str())
    }

    /// Number of cause groups across all messages.
    pub fn error_groups_count(&self) -> usize {
        self.messages
            .values()
            .flatten()
            .filter_map(|message| message.errors.as_ref())
            .map(BTreeMap::len)
            .sum()
    }

    pub fn detailed_count(&self) -> usize {
        self.messages
            .values()
            .flatten()
            .filter(|message| message.detailed.is_some())
            .count()
    }

    /// How many detail entries a renderer will show for this result.
    pub fn detailed_messages_count(&self) -> usize {
        match (self.error_groups_count(), self.detailed_count()) {
            (0, 0) => self.stats.len(),
            (0, detailed) => detailed,
            (groups, _) => groups,
        }
    }
}
