//! Memoised rule results.
//!
//! A rule is re-run only when its inputs change. Inputs are identified by a
//! SHA-256 fingerprint over the item rows, the schema and the job metadata
//! that feed it.

use std::collections::HashMap;

use crawlqa_ingest::Schema;
use crawlqa_model::{Items, JobMetadata, RuleResult};
use serde::Serialize;
use sha2::{Digest, Sha256};
use tracing::trace;

/// Hex SHA-256 over serialized inputs.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Fingerprint(String);

impl Fingerprint {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Incremental fingerprint builder.
#[derive(Debug, Clone, Default)]
pub struct FingerprintBuilder {
    hasher: Sha256,
}

impl FingerprintBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn items(mut self, items: &Items) -> Self {
        self.hasher.update(items.key().as_bytes());
        for row in items.raw() {
            self.value(row);
        }
        self.hasher.update(b"|flat:");
        for column in items.columns_map().keys() {
            self.hasher.update(column.as_bytes());
        }
        self
    }

    #[must_use]
    pub fn schema(mut self, schema: &Schema) -> Self {
        self.value(&schema.raw);
        self
    }

    #[must_use]
    pub fn job(mut self, job: &JobMetadata) -> Self {
        self.value(job);
        self
    }

    #[must_use]
    pub fn label(mut self, label: &str) -> Self {
        self.hasher.update(label.as_bytes());
        self
    }

    pub fn finish(self) -> Fingerprint {
        Fingerprint(hex::encode(self.hasher.finalize()))
    }

    fn value<T: Serialize + ?Sized>(&mut self, value: &T) {
        // Writing into a hasher cannot fail; only non-string map keys could.
        if let Err(err) = serde_json::to_writer(&mut self.hasher, value) {
            trace!(%err, "value skipped in fingerprint");
        }
        self.hasher.update(b"\n");
    }
}

/// Results by (rule name, input fingerprint).
#[derive(Debug, Default)]
pub struct RuleCache {
    entries: HashMap<(&'static str, Fingerprint), RuleResult>,
    hits: usize,
}

impl RuleCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cached result or runs `rule` and remembers it.
    pub fn get_or_run<F>(&mut self, rule: &'static str, inputs: &Fingerprint, run: F) -> RuleResult
    where
        F: FnOnce() -> RuleResult,
    {
        let key = (rule, inputs.clone());
        if let Some(result) = self.entries.get(&key) {
            self.hits += 1;
            trace!(rule, "cache hit");
            return result.clone();
        }
        let result = run();
        self.entries.insert(key, result.clone());
        result
    }

    /// Fallible variant of [`RuleCache::get_or_run`]; errors are not cached.
    pub fn try_get_or_run<F, E>(
        &mut self,
        rule: &'static str,
        inputs: &Fingerprint,
        run: F,
    ) -> Result<RuleResult, E>
    where
        F: FnOnce() -> Result<RuleResult, E>,
    {
        let key = (rule, inputs.clone());
        if let Some(result) = self.entries.get(&key) {
            self.hits += 1;
            trace!(rule, "cache hit");
            return Ok(result.clone());
        }
        let result = run()?;
        self.entries.insert(key, result.clone());
        Ok(result)
    }

    pub fn hits(&self) -> usize {
        self.hits
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn items(rows: Vec<serde_json::Value>) -> Items {
        Items::from_rows("memory", rows, false).expect("items")
    }

    #[test]
    fn fingerprint_follows_content() {
        let a = FingerprintBuilder::new().items(&items(vec![json!({"id": 1})])).finish();
        let same = FingerprintBuilder::new().items(&items(vec![json!({"id": 1})])).finish();
        let other = FingerprintBuilder::new().items(&items(vec![json!({"id": 2})])).finish();
        assert_eq!(a, same);
        assert_ne!(a, other);
        assert_eq!(a.as_str().len(), 64);
    }

    #[test]
    fn rules_run_once_per_fingerprint() {
        let mut cache = RuleCache::new();
        let inputs = FingerprintBuilder::new().label("x").finish();
        let mut runs = 0;
        for _ in 0..3 {
            cache.get_or_run("Rule", &inputs, || {
                runs += 1;
                RuleResult::new("Rule")
            });
        }
        assert_eq!(runs, 1);
        assert_eq!(cache.hits(), 2);

        let changed = FingerprintBuilder::new().label("y").finish();
        cache.get_or_run("Rule", &changed, || RuleResult::new("Rule"));
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn failures_are_not_cached() {
        let mut cache = RuleCache::new();
        let inputs = FingerprintBuilder::new().finish();
        let failed: Result<RuleResult, &str> = cache.try_get_or_run("Rule", &inputs, || Err("boom"));
        assert!(failed.is_err());
        assert!(cache.is_empty());
    }
}
