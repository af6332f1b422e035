//! Source keys for where items come from.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use crate::error::{IngestError, Result};

/// `<project>/<spider>/<job>`, all numeric.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct JobKey {
    pub project: u64,
    pub spider: u64,
    pub job: u64,
}

impl FromStr for JobKey {
    type Err = IngestError;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || IngestError::InvalidSourceKey {
            key: s.to_string(),
            kind: "job",
        };
        let parts: Vec<&str> = s.split('/').collect();
        let [project, spider, job] = parts.as_slice() else {
            return Err(invalid());
        };
        let number = |part: &str| {
            if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
                return Err(invalid());
            }
            part.parse::<u64>().map_err(|_| invalid())
        };
        Ok(Self {
            project: number(*project)?,
            spider: number(*spider)?,
            job: number(*job)?,
        })
    }
}

impl fmt::Display for JobKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.project, self.spider, self.job)
    }
}

/// `<project>/collections/s/<name>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CollectionKey {
    pub project: u64,
    pub name: String,
}

impl FromStr for CollectionKey {
    type Err = IngestError;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || IngestError::InvalidSourceKey {
            key: s.to_string(),
            kind: "collection",
        };
        let parts: Vec<&str> = s.split('/').collect();
        let [project, "collections", _, name] = parts.as_slice() else {
            return Err(invalid());
        };
        if name.is_empty() || !project.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }
        Ok(Self {
            project: project.parse().map_err(|_| invalid())?,
            name: (*name).to_string(),
        })
    }
}

impl fmt::Display for CollectionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/collections/s/{}", self.project, self.name)
    }
}

/// Where a batch of items was taken from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DataSource {
    Job(JobKey),
    Collection(CollectionKey),
    File(PathBuf),
}

impl DataSource {
    /// Resolves an explicit source key, falling back to the items file.
    pub fn resolve(key: Option<&str>, file: PathBuf) -> Result<Self> {
        let Some(key) = key else {
            return Ok(Self::File(file));
        };
        if key.contains("/collections/") {
            return key.parse().map(Self::Collection);
        }
        key.parse().map(Self::Job)
    }

    pub fn is_collection(&self) -> bool {
        matches!(self, Self::Collection(_))
    }

    pub fn job_key(&self) -> Option<&JobKey> {
        match self {
            Self::Job(key) => Some(key),
            _ => None,
        }
    }
}

impl fmt::Display for DataSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Job(key) => key.fmt(f),
            Self::Collection(key) => key.fmt(f),
            Self::File(path) => write!(f, "{}", path.display()),
        }
    }
}
