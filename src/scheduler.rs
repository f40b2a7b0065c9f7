//! Submits targets to capture jobs under a concurrency bound.

use crate::admission::AdmissionController;
use crate::backend::BackendFactory;
use crate::fetch::Fetcher;
use crate::job::{CaptureJob, CaptureOutcome, CaptureResult, JobContext, JobState};
use crate::worker::RenderWorkers;
use crate::{CaptureConfig, Error, Result, Target};
use log::{error, info, warn};
use serde::Serialize;
use std::sync::Arc;

type OnResultHandler = Arc<dyn Fn(&CaptureResult) + Send + Sync>;

/// Runs capture jobs for a list of targets.
///
/// Targets are admitted in submission order; each admitted job runs on its own
/// task while the scheduler moves on to the next target. `run` returns after
/// every launched job has completed.
pub struct CaptureScheduler {
    config: Arc<CaptureConfig>,
    backend: Arc<dyn BackendFactory>,
    on_result: Option<OnResultHandler>,
}

/// Outcome of a whole run, one result per submitted target in submission order.
#[derive(Debug)]
pub struct RunReport {
    pub results: Vec<CaptureResult>,
    /// Highest number of jobs that were admitted at the same time.
    pub peak_concurrency: usize,
    /// Render threads abandoned after a render timeout and still running
    /// when the run finished.
    pub lingering_renders: usize,
}

#[derive(Serialize)]
struct ReportEntry<'a> {
    target: &'a str,
    status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    image: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    reason: Option<String>,
}

impl RunReport {
    pub fn succeeded(&self) -> usize {
        self.results.iter().filter(|r| r.is_success()).count()
    }

    pub fn skipped(&self) -> usize {
        self.results.iter().filter(|r| r.is_skipped()).count()
    }

    pub fn failed(&self) -> usize {
        self.results.iter().filter(|r| r.is_failed()).count()
    }

    /// Whether any target did not end with an image.
    pub fn has_failures(&self) -> bool {
        self.succeeded() != self.results.len()
    }

    /// Serialize the per-target outcomes as a JSON array.
    pub fn to_json(&self) -> Result<String> {
        let entries: Vec<ReportEntry<'_>> = self
            .results
            .iter()
            .map(|r| ReportEntry {
                target: r.target.as_str(),
                status: match r.outcome {
                    CaptureOutcome::Success { .. } => "success",
                    CaptureOutcome::Skipped { .. } => "skipped",
                    CaptureOutcome::Failed { .. } => "failed",
                },
                image: r.image().map(|p| p.display().to_string()),
                reason: r.reason().map(|e| e.to_string()),
            })
            .collect();
        serde_json::to_string_pretty(&entries)
            .map_err(|e| Error::Other(format!("Failed to serialize report: {}", e)))
    }
}

impl CaptureScheduler {
    pub fn new(config: CaptureConfig, backend: Arc<dyn BackendFactory>) -> Self {
        Self {
            config: Arc::new(config),
            backend,
            on_result: None,
        }
    }

    /// Register a callback invoked once per target as soon as its job completes.
    pub fn on_result<F>(&mut self, cb: F)
    where
        F: Fn(&CaptureResult) + Send + Sync + 'static,
    {
        self.on_result = Some(Arc::new(cb));
    }

    pub fn config(&self) -> &CaptureConfig {
        &self.config
    }

    /// Capture every target.
    ///
    /// Fails before starting any job when the configuration is invalid, the
    /// target list is empty or the output directories cannot be created.
    /// Per-target problems never fail the run; they show up in the report.
    pub async fn run(&self, targets: Vec<Target>) -> Result<RunReport> {
        self.config.validate()?;
        if targets.is_empty() {
            return Err(Error::ConfigError("no targets to capture".into()));
        }
        let admission = AdmissionController::new(self.config.max_concurrency)?;

        let dirs = [
            self.config.output_dir.clone(),
            self.config.artifact_dir().to_path_buf(),
        ];
        for dir in &dirs {
            tokio::fs::create_dir_all(dir)
                .await
                .map_err(|e| Error::artifact_io(dir, e))?;
        }

        let ctx = JobContext {
            config: self.config.clone(),
            fetcher: Fetcher::new(&self.config)?,
            backend: self.backend.clone(),
            workers: RenderWorkers::new(),
        };

        info!(
            "Capturing {} target(s), at most {} at a time",
            targets.len(),
            admission.max_concurrency()
        );

        let mut launched = Vec::with_capacity(targets.len());
        for target in targets {
            let permit = admission.admit().await?;
            let job = CaptureJob::new(target.clone(), ctx.clone());
            let on_result = self.on_result.clone();
            let handle = tokio::spawn(async move {
                let result = job.run(permit).await;
                if let Some(cb) = &on_result {
                    cb(&result);
                }
                result
            });
            launched.push((target, handle));
        }

        let mut results = Vec::with_capacity(launched.len());
        for (target, handle) in launched {
            let result = match handle.await {
                Ok(result) => result,
                Err(join_err) => {
                    error!("Capture task for {} aborted: {}", target, join_err);
                    let result = CaptureResult {
                        target,
                        outcome: CaptureOutcome::Failed {
                            reason: Error::Other(format!("capture task aborted: {}", join_err)),
                        },
                        states: vec![JobState::Completed],
                    };
                    if let Some(cb) = &self.on_result {
                        cb(&result);
                    }
                    result
                }
            };
            results.push(result);
        }

        let report = RunReport {
            results,
            peak_concurrency: admission.peak(),
            lingering_renders: ctx.workers.live(),
        };
        if report.lingering_renders > 0 {
            warn!(
                "{} render worker(s) still running after their jobs timed out",
                report.lingering_renders
            );
        }
        info!(
            "Run finished: {} captured, {} skipped, {} failed",
            report.succeeded(),
            report.skipped(),
            report.failed()
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::RenderBackend;

    fn never_called() -> Arc<dyn BackendFactory> {
        Arc::new(|| -> Result<Box<dyn RenderBackend>> {
            Err(Error::InitializationError("unused".into()))
        })
    }

    #[tokio::test]
    async fn empty_target_list_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = CaptureConfig {
            output_dir: dir.path().to_path_buf(),
            ..Default::default()
        };
        let err = CaptureScheduler::new(cfg, never_called())
            .run(vec![])
            .await
            .unwrap_err();
        assert!(err.is_fatal());
    }

    #[tokio::test]
    async fn zero_concurrency_aborts_before_any_job() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = CaptureConfig {
            output_dir: dir.path().join("shots"),
            max_concurrency: 0,
            ..Default::default()
        };
        let seen = Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let mut scheduler = CaptureScheduler::new(cfg, never_called());
        let counter = seen.clone();
        scheduler.on_result(move |_| {
            counter.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        });

        let err = scheduler
            .run(vec![Target::new("http://127.0.0.1:1")])
            .await
            .unwrap_err();
        assert!(matches!(err, Error::ConfigError(_)));
        assert_eq!(seen.load(std::sync::atomic::Ordering::SeqCst), 0);
        assert!(!dir.path().join("shots").exists());
    }

    #[test]
    fn report_json_lists_every_target() {
        let report = RunReport {
            results: vec![
                CaptureResult {
                    target: Target::new("http://a"),
                    outcome: CaptureOutcome::Success {
                        image: "a.png".into(),
                    },
                    states: vec![],
                },
                CaptureResult {
                    target: Target::new("http://b"),
                    outcome: CaptureOutcome::Failed {
                        reason: Error::RenderError("boom".into()),
                    },
                    states: vec![],
                },
            ],
            peak_concurrency: 1,
            lingering_renders: 0,
        };
        assert!(report.has_failures());
        let v: serde_json::Value = serde_json::from_str(&report.to_json().unwrap()).unwrap();
        assert_eq!(v[0]["status"], "success");
        assert_eq!(v[0]["image"], "a.png");
        assert_eq!(v[1]["status"], "failed");
        assert_eq!(v[1]["reason"], "Rendering failed: boom");
        assert!(v[1].get("image").is_none());
    }
}
