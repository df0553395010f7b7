//! Result shaping, export and summaries.

pub mod shaper;
pub mod summary;

pub use shaper::{shape, ShapedTable};
pub use summary::{Summarizer, NO_RESULTS_SUMMARY};
