//! Per-unit pipeline
//!
//! Runs one unit on a blocking thread: execute, rerun on failure when
//! allowed, then collect the unit's report files.

use std::sync::Arc;
use tracing::debug;

use super::rerun::{read_manifest, RerunController};
use super::UnitExecutor;
use crate::models::{ResultStatus, RunResult, UnitDescriptor};
use crate::results::{ReportCollector, RerunManifest, ResultAggregator};
use crate::utils::Timer;

/// Everything a unit task needs, shared across the pool
pub struct UnitWorker {
    executor: UnitExecutor,
    rerun: RerunController,
    aggregator: Arc<ResultAggregator>,
    reports: Arc<ReportCollector>,
    manifest: Arc<RerunManifest>,
}

impl UnitWorker {
    pub fn new(
        executor: UnitExecutor,
        rerun: RerunController,
        aggregator: Arc<ResultAggregator>,
        reports: Arc<ReportCollector>,
        manifest: Arc<RerunManifest>,
    ) -> Self {
        Self {
            executor,
            rerun,
            aggregator,
            reports,
            manifest,
        }
    }

    /// Drive `unit` to a terminal status
    pub fn run(&self, unit: &UnitDescriptor) -> ResultStatus {
        debug!("Starting {}", unit);

        let timer = Timer::start(format!("unit {unit}"));
        let status = if self.executor.run(&unit.args) {
            self.aggregator.record(
                RunResult::new(unit, unit.primary_target(), ResultStatus::Passed)
                    .with_duration(timer.stop()),
            );
            ResultStatus::Passed
        } else {
            let elapsed = timer.stop();
            self.after_failure(unit, elapsed)
        };

        self.reports.collect(unit);
        status
    }

    fn after_failure(&self, unit: &UnitDescriptor, elapsed: u64) -> ResultStatus {
        let manifest = read_manifest(unit.rerun_file.as_deref());
        if let Some(content) = &manifest {
            self.manifest.push_lines(content);
        }

        match self.rerun.plan(unit, manifest.as_deref()) {
            Some(target) => self.rerun.rerun(unit, &target),
            None => {
                self.aggregator.record(
                    RunResult::new(unit, unit.primary_target(), ResultStatus::Failed)
                        .with_duration(elapsed),
                );
                ResultStatus::Failed
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventPublisher;
    use crate::executor::rerun::RerunPolicy;
    use crate::executor::testing::ScriptedEngine;
    use std::fs;
    use tempfile::tempdir;

    struct Fixture {
        worker: UnitWorker,
        aggregator: Arc<ResultAggregator>,
        reports: Arc<ReportCollector>,
        manifest: Arc<RerunManifest>,
    }

    fn fixture(engine: ScriptedEngine, policy: RerunPolicy) -> Fixture {
        let executor = UnitExecutor::new(Arc::new(engine));
        let aggregator = Arc::new(ResultAggregator::new("s1", Arc::new(EventPublisher::default())));
        let reports = Arc::new(ReportCollector::new("s1", false));
        let manifest = Arc::new(RerunManifest::new());
        let rerun = RerunController::new(policy, executor.clone(), aggregator.clone());

        Fixture {
            worker: UnitWorker::new(
                executor,
                rerun,
                aggregator.clone(),
                reports.clone(),
                manifest.clone(),
            ),
            aggregator,
            reports,
            manifest,
        }
    }

    #[test]
    fn test_pass_collects_reports() {
        let dir = tempdir().unwrap();
        let report = dir.path().join("s1").join("a.xml");
        fs::create_dir_all(report.parent().unwrap()).unwrap();
        fs::write(&report, "<ok/>").unwrap();

        let f = fixture(ScriptedEngine::always(true), RerunPolicy::default());
        let unit = UnitDescriptor::new("a.feature").with_report_file(&report);

        assert_eq!(f.worker.run(&unit), ResultStatus::Passed);
        assert_eq!(f.aggregator.len(), 1);
        assert_eq!(f.reports.artifacts().len(), 1);
        assert!(f.manifest.entries().is_empty());
    }

    #[test]
    fn test_failure_without_manifest_is_final() {
        let f = fixture(ScriptedEngine::always(false), RerunPolicy::default());
        let unit = UnitDescriptor::new("a.feature");

        assert_eq!(f.worker.run(&unit), ResultStatus::Failed);
        assert_eq!(f.aggregator.len(), 1);
    }

    #[test]
    fn test_manifest_captured_even_when_rerun_passes() {
        let dir = tempdir().unwrap();
        let rerun_file = dir.path().join("a.rerun");
        fs::write(&rerun_file, "a.feature:4").unwrap();

        let f = fixture(ScriptedEngine::script(&[false, true]), RerunPolicy::default());
        let unit = UnitDescriptor::new("a.feature").with_rerun_file(&rerun_file);

        assert_eq!(f.worker.run(&unit), ResultStatus::PassedAfterRerun);
        assert_eq!(f.manifest.entries(), vec!["a.feature:4".to_string()]);
    }

    #[test]
    fn test_manifest_captured_line_by_line() {
        let dir = tempdir().unwrap();
        let rerun_file = dir.path().join("a.rerun");
        fs::write(&rerun_file, "features/z.feature:4\nfeatures/a.feature:9\n").unwrap();

        let f = fixture(ScriptedEngine::always(false), RerunPolicy::default());
        let unit = UnitDescriptor::new("features/z.feature")
            .with_rerun_file(&rerun_file)
            .allow_rerun(false);

        f.worker.run(&unit);
        assert_eq!(
            f.manifest.entries(),
            vec!["features/z.feature:4".to_string(), "features/a.feature:9".to_string()]
        );
    }

    #[test]
    fn test_manifest_captured_when_rerun_not_allowed() {
        let dir = tempdir().unwrap();
        let rerun_file = dir.path().join("a.rerun");
        fs::write(&rerun_file, "a.feature:4").unwrap();

        let f = fixture(ScriptedEngine::always(false), RerunPolicy::default());
        let unit = UnitDescriptor::new("a.feature")
            .with_rerun_file(&rerun_file)
            .allow_rerun(false);

        assert_eq!(f.worker.run(&unit), ResultStatus::Failed);
        assert_eq!(f.manifest.entries().len(), 1);
    }
}
