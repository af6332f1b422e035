//! Orchestration for the `crawlqa` binary: logging setup, the audit
//! session and its rule cache.

pub mod cache;
pub mod logging;
pub mod session;

pub use cache::{Fingerprint, FingerprintBuilder, RuleCache};
pub use session::{Dataset, QualityReport, Session};
