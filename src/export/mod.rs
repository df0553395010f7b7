//! Result export formats.

pub mod csv;

pub use self::csv::{CsvAttachment, CsvExporter};
