//! Result aggregation and report handling
//!
//! Shared sinks filled by unit tasks during a run, and the post-run writers
//! that turn their contents into files.

mod aggregator;
mod merge;
mod reports;
mod rerun_manifest;

pub use aggregator::ResultAggregator;
pub use merge::ReportMerger;
pub use reports::ReportCollector;
pub use rerun_manifest::RerunManifest;
