//! The analytics report: income, expenses per category, net savings and savings rate for a
//! year or a month.
//!
//! The report is built in stages:
//! - [resolve_period] validates the requested year and month and gives the range of dates,
//! - the store selects the user's transactions in that range,
//! - the transactions are summed per type and per expense category,
//! - [build_report] derives the percentages and savings rate.
//!
//! [generate_report] runs all of the stages.

mod aggregation;
mod color;
mod endpoint;
mod period;
mod report;

pub use aggregation::{CategoryTotal, Totals, aggregate};
pub use color::{ColorAssigner, DEFAULT_PALETTE, UNCATEGORIZED_LABEL};
pub use endpoint::get_analytics_endpoint;
pub use period::{AnalyticsQuery, DateRange, MAX_YEAR, MIN_YEAR, Period, resolve_period};
pub use report::{AnalyticsReport, CategoryBreakdown, build_report, generate_report};
