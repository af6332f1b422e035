//! Session-scoped collection of rule results.

use std::collections::HashMap;

use crawlqa_model::{Level, Outcome, RuleResult, Stat};
use serde::Serialize;

/// Results by rule name, in the order rules were first saved.
#[derive(Debug, Clone, Default)]
pub struct Report {
    results: Vec<RuleResult>,
    positions: HashMap<String, usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SummaryLine {
    pub level: Level,
    pub text: String,
}

/// Summary lines of one rule.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RuleSummary {
    pub name: String,
    pub lines: Vec<SummaryLine>,
}

/// Keys sharing one error cause.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorGroup {
    pub cause: String,
    pub count: usize,
    pub sample: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RuleDetails {
    pub name: String,
    pub messages_count: usize,
    pub groups: Vec<ErrorGroup>,
    pub detailed: Vec<String>,
    pub stats: Vec<Stat>,
}

/// Groups and keys shown per rule in short mode.
pub const SHORT_LIMIT: usize = 5;

impl Report {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `result`, replacing an earlier result of the same rule in place.
    pub fn save(&mut self, result: RuleResult) {
        match self.positions.get(&result.name) {
            Some(position) => self.results[*position] = result,
            None => {
                self.positions.insert(result.name.clone(), self.results.len());
                self.results.push(result);
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<&RuleResult> {
        self.positions.get(name).map(|position| &self.results[*position])
    }

    pub fn results(&self) -> &[RuleResult] {
        &self.results
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    /// One entry per rule; a rule without messages gets a single PASSED line.
    pub fn summaries(&self) -> Vec<RuleSummary> {
        self.results
            .iter()
            .map(|result| {
                let mut lines: Vec<SummaryLine> = result
                    .messages
                    .iter()
                    .flat_map(|(level, messages)| {
                        messages.iter().map(|message| SummaryLine {
                            level: *level,
                            text: message.summary.clone(),
                        })
                    })
                    .collect();
                if lines.is_empty() {
                    lines.push(SummaryLine {
                        level: Level::Info,
                        text: Outcome::Passed.to_string(),
                    });
                }
                RuleSummary {
                    name: result.name.clone(),
                    lines,
                }
            })
            .collect()
    }

    /// Error groups, detailed texts and stats of rules that have any.
    ///
    /// Groups are ordered by size, largest first. Short mode keeps the top
    /// [`SHORT_LIMIT`] groups with as many keys each.
    pub fn details(&self, short: bool, keys_limit: usize) -> Vec<RuleDetails> {
        let keys_limit = if short { SHORT_LIMIT } else { keys_limit };
        self.results
            .iter()
            .filter(|result| result.detailed_messages_count() > 0)
            .map(|result| {
                let mut groups = Vec::new();
                let mut detailed = Vec::new();
                for messages in result.messages.values() {
                    for message in messages {
                        if let Some(errors) = &message.errors {
                            let mut message_groups: Vec<ErrorGroup> = errors
                                .iter()
                                .map(|(cause, keys)| ErrorGroup {
                                    cause: cause.clone(),
                                    count: keys.len(),
                                    sample: keys.iter().take(keys_limit).cloned().collect(),
                                })
                                .collect();
                            message_groups.sort_by(|a, b| b.count.cmp(&a.count));
                            if short {
                                message_groups.truncate(SHORT_LIMIT);
                            }
                            groups.extend(message_groups);
                        }
                        if let Some(text) = &message.detailed {
                            detailed.push(text.clone());
                        }
                    }
                }
                RuleDetails {
                    name: result.name.clone(),
                    messages_count: result.detailed_messages_count(),
                    groups,
                    detailed,
                    stats: result.stats.clone(),
                }
            })
            .collect()
    }
}
