//! Report aggregation and rendering.
//!
//! [`Report`] collects rule results for one session. [`console`] renders it
//! as terminal tables and [`html`] builds the standalone data-quality page.

pub mod console;
pub mod error;
pub mod html;
pub mod report;

pub use console::{render_details, render_summaries, stat_table};
pub use error::{ReportError, Result};
pub use html::{
    CategoryRow, CategoryTable, DataQualityReport, TOP_CATEGORIES, TestRow, category_tables,
    score_class, test_summary,
};
pub use report::{ErrorGroup, Report, RuleDetails, RuleSummary, SHORT_LIMIT, SummaryLine};
