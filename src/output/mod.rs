//! Output formatting module
//!
//! Renders a finished run for the terminal or a file.

mod formatter;

pub use formatter::{write_summary_to_file, OutputFormat, ResultFormatter};
