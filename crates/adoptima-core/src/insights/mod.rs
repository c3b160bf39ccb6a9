//! Insights - what the numbers mean
//!
//! - **Summary** - headline statistics for a dataset
//! - **Recommendations** - readable notes on how an optimized plan differs
//!   from the baseline
//!
//! ## Usage
//!
//! ```rust,ignore
//! use adoptima_core::insights::{recommendations, summarize};
//!
//! let stats = summarize(&dataset);
//! for note in recommendations(&outcome) {
//!     println!("{}", note);
//! }
//! ```

pub mod recommendations;
pub mod summary;

pub use recommendations::{recommendations, Recommendation, SIGNIFICANT_CHANGE_PCT};
pub use summary::{summarize, MonthHighlight, SummaryStats};
