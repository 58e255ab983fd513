//! Bounded parallel unit scheduler
//!
//! Every unit gets its own task; a semaphore sized to the pool lets at most
//! `pool` of them run their blocking pipeline at once. The scheduler waits for
//! all of them unless the interrupt future fires first, in which case units
//! still waiting for a permit never start and the run ends with ERROR.
//! Engine calls already in flight are left to finish; the aggregator is sealed
//! before RUN_FINISHED, so their results never reach the summary or subscribers.
//!
//! ```text
//!  units ──► spawn(task per unit) ──► acquire permit ──► spawn_blocking(worker.run)
//!                                          │
//!  interrupt ──► close semaphore + abort ──┘
//! ```

use chrono::Utc;
use futures::future::join_all;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::{AbortHandle, JoinHandle};
use tracing::{debug, error, info, warn};

use super::rerun::RerunController;
use super::worker::UnitWorker;
use super::{Engine, UnitExecutor};
use crate::config::{generate_session_id, RunConfig};
use crate::events::{EventKind, EventPublisher, RunEvent};
use crate::models::{ResultStatus, RunStatus, RunSummary, TestStatistics, UnitDescriptor};
use crate::results::{ReportCollector, RerunManifest, ResultAggregator};
use crate::utils::Timer;

/// Workers actually started: never more than there are units, never zero
pub fn pool_size(required: usize, units: usize) -> usize {
    required.min(units).max(1)
}

/// Runs a list of units to completion
pub struct Scheduler {
    session_id: String,
    required_threads: usize,
    publisher: Arc<EventPublisher>,
    aggregator: Arc<ResultAggregator>,
    reports: Arc<ReportCollector>,
    manifest: Arc<RerunManifest>,
    worker: Arc<UnitWorker>,
}

impl Scheduler {
    pub fn new(config: &RunConfig, engine: Arc<dyn Engine>, publisher: EventPublisher) -> Self {
        let session_id = config
            .session_id
            .clone()
            .unwrap_or_else(generate_session_id);
        let publisher = Arc::new(publisher);
        let aggregator = Arc::new(ResultAggregator::new(session_id.as_str(), publisher.clone()));
        let reports = Arc::new(ReportCollector::new(session_id.as_str(), config.process_messages));
        let manifest = Arc::new(RerunManifest::new());

        let executor = UnitExecutor::new(engine);
        let rerun = RerunController::new(config.rerun_policy(), executor.clone(), aggregator.clone());
        let worker = Arc::new(UnitWorker::new(
            executor,
            rerun,
            aggregator.clone(),
            reports.clone(),
            manifest.clone(),
        ));

        Self {
            session_id,
            required_threads: config.required_threads(),
            publisher,
            aggregator,
            reports,
            manifest,
            worker,
        }
    }

    pub fn reports(&self) -> &ReportCollector {
        &self.reports
    }

    pub fn rerun_manifest(&self) -> &RerunManifest {
        &self.manifest
    }

    /// Run all units; Ctrl-C interrupts the wait
    pub async fn run(&self, units: Vec<UnitDescriptor>) -> RunSummary {
        self.run_until(units, async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!("Interrupt handler unavailable: {}", e);
                std::future::pending::<()>().await;
            }
        })
        .await
    }

    /// Run all units unless `interrupt` completes first
    pub async fn run_until<F>(&self, units: Vec<UnitDescriptor>, interrupt: F) -> RunSummary
    where
        F: Future<Output = ()>,
    {
        let started_at = Utc::now();
        let timer = Timer::start(format!("run {}", self.session_id));
        let pool = pool_size(self.required_threads, units.len());

        info!(
            "Running {} units with {} workers (session {})",
            units.len(),
            pool,
            self.session_id
        );
        self.publisher
            .publish(&RunEvent::run(EventKind::RunStarted, self.session_id.as_str()));

        let semaphore = Arc::new(Semaphore::new(pool));
        let handles: Vec<JoinHandle<Option<ResultStatus>>> = units
            .into_iter()
            .map(|unit| self.spawn_unit(unit, semaphore.clone()))
            .collect();
        let aborts: Vec<AbortHandle> = handles.iter().map(JoinHandle::abort_handle).collect();

        let mut status = RunStatus::Ok;
        tokio::select! {
            joined = join_all(handles) => {
                for outcome in joined {
                    if let Err(e) = outcome {
                        error!("Unit task failed: {}", e);
                    }
                }
            }
            _ = interrupt => {
                warn!("Run interrupted; units not yet started are cancelled");
                status.escalate(RunStatus::Error);
                semaphore.close();
                for abort in &aborts {
                    abort.abort();
                }
            }
        }

        self.finish(started_at, timer, pool, status)
    }

    fn spawn_unit(
        &self,
        unit: UnitDescriptor,
        semaphore: Arc<Semaphore>,
    ) -> JoinHandle<Option<ResultStatus>> {
        let worker = self.worker.clone();

        tokio::spawn(async move {
            // Closed semaphore: the run was interrupted before this unit started
            let permit = semaphore.acquire_owned().await.ok()?;

            let label = unit.to_string();
            let outcome = tokio::task::spawn_blocking(move || {
                let _permit = permit;
                worker.run(&unit)
            })
            .await;

            match outcome {
                Ok(status) => {
                    debug!("{} finished as {}", label, status);
                    Some(status)
                }
                Err(e) => {
                    error!("Unit {} aborted: {}", label, e);
                    None
                }
            }
        })
    }

    fn finish(
        &self,
        started_at: chrono::DateTime<Utc>,
        timer: Timer,
        pool: usize,
        mut status: RunStatus,
    ) -> RunSummary {
        let results = self.aggregator.close();
        let statistics = TestStatistics::from_results(&results);
        let failures = results.iter().filter(|r| r.status.is_failure()).cloned().collect();
        let session = self.session_id.as_str();

        self.publisher
            .publish(&RunEvent::run(EventKind::RunFinished, session));
        self.publisher
            .publish(&RunEvent::summary(session, statistics.clone()));

        if self.reports.has_export_anomaly() {
            warn!("A message export parsed to nothing while others did not");
            status.escalate(RunStatus::ReportProcessingError);
        }

        let duration_ms = timer.stop();
        info!(
            "Run {} finished with {} in {}ms: {}/{} passed ({:.1}%)",
            session,
            status,
            duration_ms,
            statistics.total_passed(),
            statistics.total,
            statistics.pass_rate()
        );

        RunSummary {
            session_id: self.session_id.clone(),
            started_at,
            finished_at: Utc::now(),
            duration_ms,
            pool_size: pool,
            status,
            statistics,
            results,
            failures,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::test_support::RecordingSubscriber;
    use crate::events::Subscriber;
    use crate::executor::testing::ScriptedEngine;
    use crate::executor::RerunMode;
    use std::fs;
    use std::path::Path;
    use std::time::Duration;
    use tempfile::tempdir;

    const SESSION: &str = "sched-1";

    fn config(threads: usize, attempts: u32) -> RunConfig {
        let mut config = RunConfig {
            threads,
            session_id: Some(SESSION.to_string()),
            ..RunConfig::default()
        };
        config.rerun.attempts = attempts;
        config
    }

    fn scheduler(config: &RunConfig, engine: Arc<ScriptedEngine>) -> (Scheduler, Arc<RecordingSubscriber>) {
        let recorder = Arc::new(RecordingSubscriber::default());
        let publisher = EventPublisher::new(vec![recorder.clone() as Arc<dyn Subscriber>]);
        (Scheduler::new(config, engine, publisher), recorder)
    }

    fn units(n: usize) -> Vec<UnitDescriptor> {
        (0..n)
            .map(|i| UnitDescriptor::new(format!("features/f{i}.feature")))
            .collect()
    }

    fn rerun_file(dir: &Path, name: &str, content: &str) -> std::path::PathBuf {
        let path = dir.join(name);
        fs::write(&path, content).unwrap();
        path
    }

    fn statuses(summary: &RunSummary) -> Vec<ResultStatus> {
        summary.results.iter().map(|r| r.status).collect()
    }

    #[test]
    fn test_pool_size() {
        assert_eq!(pool_size(10, 3), 3);
        assert_eq!(pool_size(0, 5), 1);
        assert_eq!(pool_size(2, 5), 2);
        assert_eq!(pool_size(4, 0), 1);
    }

    #[tokio::test]
    async fn test_every_unit_reaches_terminal_result() {
        for threads in 1..=6 {
            let engine = Arc::new(
                ScriptedEngine::always(true)
                    .with_target("features/f1.feature", &[false])
                    .with_target("features/f4.feature", &[false]),
            );
            let (scheduler, _) = scheduler(&config(threads, 1), engine.clone());

            let summary = scheduler.run_until(units(6), std::future::pending()).await;

            assert_eq!(summary.status, RunStatus::Ok);
            assert_eq!(summary.terminal_results().count(), 6);
            assert_eq!(summary.statistics.passed, 4);
            assert_eq!(summary.statistics.failed, 2);
            assert_eq!(summary.failures.len(), 2);
            assert_eq!(summary.pool_size, threads);
            assert_eq!(engine.calls().len(), 6);
        }
    }

    #[tokio::test]
    async fn test_events_bracket_results() {
        let (scheduler, recorder) = scheduler(&config(2, 1), Arc::new(ScriptedEngine::always(true)));

        let summary = scheduler.run_until(units(3), std::future::pending()).await;
        let kinds = recorder.kinds();

        assert_eq!(kinds.first(), Some(&EventKind::RunStarted));
        assert_eq!(
            &kinds[kinds.len() - 2..],
            &[EventKind::RunFinished, EventKind::RunSummary]
        );
        assert_eq!(
            kinds.iter().filter(|k| **k == EventKind::TestPassed).count(),
            3
        );
        assert_eq!(summary.session_id, SESSION);
    }

    #[tokio::test]
    async fn test_no_rerun_when_not_allowed() {
        let dir = tempdir().unwrap();
        let manifest = rerun_file(dir.path(), "f0.rerun", "features/f0.feature:3");
        let unit = UnitDescriptor::new("features/f0.feature")
            .with_rerun_file(&manifest)
            .allow_rerun(false);

        let engine = Arc::new(ScriptedEngine::always(false));
        let (scheduler, _) = scheduler(&config(2, 3), engine.clone());
        let summary = scheduler.run_until(vec![unit], std::future::pending()).await;

        assert_eq!(statuses(&summary), vec![ResultStatus::Failed]);
        assert_eq!(engine.calls().len(), 1);
        assert_eq!(scheduler.rerun_manifest().entries().len(), 1);
    }

    #[tokio::test]
    async fn test_rerun_passes_on_second_attempt() {
        let dir = tempdir().unwrap();
        let manifest = rerun_file(dir.path(), "f0.rerun", "features/f0.feature:3");
        let unit = UnitDescriptor::new("features/f0.feature").with_rerun_file(&manifest);

        let engine = Arc::new(ScriptedEngine::script(&[false, false, true]));
        let (scheduler, recorder) = scheduler(&config(1, 3), engine.clone());
        let summary = scheduler.run_until(vec![unit], std::future::pending()).await;

        assert_eq!(
            statuses(&summary),
            vec![
                ResultStatus::Rerun,
                ResultStatus::Rerun,
                ResultStatus::PassedAfterRerun
            ]
        );
        assert_eq!(engine.calls().len(), 3);
        assert_eq!(summary.statistics.passed_after_rerun, 1);
        assert_eq!(summary.statistics.rerun_attempts, 2);
        assert!(recorder.kinds().contains(&EventKind::TestPassedAfterRerun));
    }

    #[tokio::test]
    async fn test_rerun_exhausted() {
        let dir = tempdir().unwrap();
        let manifest = rerun_file(dir.path(), "f0.rerun", "features/f0.feature:3");
        let unit = UnitDescriptor::new("features/f0.feature").with_rerun_file(&manifest);

        let engine = Arc::new(ScriptedEngine::always(false));
        let (scheduler, recorder) = scheduler(&config(1, 3), engine.clone());
        let summary = scheduler.run_until(vec![unit], std::future::pending()).await;

        assert_eq!(
            statuses(&summary),
            vec![
                ResultStatus::Rerun,
                ResultStatus::Rerun,
                ResultStatus::Rerun,
                ResultStatus::FailedAfterRerun
            ]
        );
        assert_eq!(engine.calls().len(), 4);
        assert_eq!(
            recorder
                .kinds()
                .iter()
                .filter(|k| **k == EventKind::TestRerun)
                .count(),
            3
        );
        assert_eq!(summary.status, RunStatus::Ok);
    }

    #[tokio::test]
    async fn test_scoped_rerun_resolves_manifest_target() {
        let dir = tempdir().unwrap();
        let manifest = rerun_file(
            dir.path(),
            "f0.rerun",
            "features/f0.feature:12:30\nfeatures/f0.feature:44\n",
        );
        let unit = UnitDescriptor::new("features/f0.feature").with_rerun_file(&manifest);

        let mut config = config(1, 1);
        config.rerun.mode = RerunMode::Scoped;

        let engine = Arc::new(ScriptedEngine::script(&[false, true]));
        let (scheduler, _) = scheduler(&config, engine.clone());
        let summary = scheduler.run_until(vec![unit], std::future::pending()).await;

        let last = summary.results.last().unwrap();
        assert_eq!(last.status, ResultStatus::PassedAfterRerun);
        assert_eq!(last.target, "features/f0.feature");
        assert_eq!(last.resolved_target, "features/f0.feature:12:30");
        assert_eq!(
            engine.calls()[1].primary,
            vec!["features/f0.feature:12:30", "features/f0.feature:44"]
        );
    }

    #[tokio::test]
    async fn test_interrupt_cancels_pending_units() {
        let engine = Arc::new(ScriptedEngine::always(true).with_delay(Duration::from_millis(300)));
        let (scheduler, recorder) = scheduler(&config(1, 1), engine.clone());

        let summary = scheduler
            .run_until(units(4), tokio::time::sleep(Duration::from_millis(50)))
            .await;

        assert_eq!(summary.status, RunStatus::Error);
        assert!(summary.results.is_empty());
        assert_eq!(recorder.kinds().last(), Some(&EventKind::RunSummary));

        // the in-flight unit completes, the rest never start
        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(engine.calls().len(), 1);
        assert_eq!(recorder.kinds().last(), Some(&EventKind::RunSummary));
        assert!(!recorder.kinds().contains(&EventKind::TestPassed));
    }

    #[tokio::test]
    async fn test_export_anomaly_sets_report_processing_error() {
        let dir = tempdir().unwrap();
        let good = dir.path().join(SESSION).join("a.ndjson");
        let bad = dir.path().join(SESSION).join("b.ndjson");
        fs::create_dir_all(good.parent().unwrap()).unwrap();
        fs::write(&good, "{\"meta\":{}}\n").unwrap();
        fs::write(&bad, "garbage\n").unwrap();

        let mut config = config(2, 1);
        config.process_messages = true;

        let (scheduler, _) = scheduler(&config, Arc::new(ScriptedEngine::always(true)));
        let summary = scheduler
            .run_until(
                vec![
                    UnitDescriptor::new("a.feature").with_report_file(&good),
                    UnitDescriptor::new("b.feature").with_report_file(&bad),
                ],
                std::future::pending(),
            )
            .await;

        assert_eq!(summary.status, RunStatus::ReportProcessingError);
        assert!(summary.is_all_passed());
    }

    #[tokio::test]
    async fn test_error_outranks_export_anomaly() {
        let dir = tempdir().unwrap();
        let good = dir.path().join(SESSION).join("a.ndjson");
        let bad = dir.path().join(SESSION).join("b.ndjson");
        fs::create_dir_all(good.parent().unwrap()).unwrap();
        fs::write(&good, "{\"meta\":{}}\n").unwrap();
        fs::write(&bad, "").unwrap();

        let mut config = config(2, 1);
        config.process_messages = true;

        let (scheduler, _) = scheduler(&config, Arc::new(ScriptedEngine::always(true)));
        scheduler.reports().collect(&UnitDescriptor::new("a.feature").with_report_file(&good));
        scheduler.reports().collect(&UnitDescriptor::new("b.feature").with_report_file(&bad));
        assert!(scheduler.reports().has_export_anomaly());

        let summary = scheduler.run_until(units(1), async {}).await;
        assert_eq!(summary.status, RunStatus::Error);
    }

    #[tokio::test]
    async fn test_engine_panic_is_a_failure() {
        let engine = Arc::new(ScriptedEngine::always(true).panics_on("features/f0.feature"));
        let (scheduler, _) = scheduler(&config(2, 1), engine);

        let summary = scheduler.run_until(units(2), std::future::pending()).await;

        assert_eq!(summary.statistics.failed, 1);
        assert_eq!(summary.statistics.passed, 1);
        assert_eq!(summary.status, RunStatus::Ok);
    }

    #[tokio::test]
    async fn test_empty_plan() {
        let (scheduler, recorder) = scheduler(&config(4, 1), Arc::new(ScriptedEngine::always(true)));

        let summary = scheduler.run_until(Vec::new(), std::future::pending()).await;

        assert_eq!(summary.status, RunStatus::Ok);
        assert_eq!(summary.statistics.total, 0);
        assert_eq!(
            recorder.kinds(),
            vec![EventKind::RunStarted, EventKind::RunFinished, EventKind::RunSummary]
        );
    }
}
