//! Per-target capture workflow.

use crate::admission::AdmissionPermit;
use crate::artifact::Artifact;
use crate::backend::BackendFactory;
use crate::fetch::Fetcher;
use crate::worker::{spawn_render, RenderTicket, RenderWorkers};
use crate::{CaptureConfig, Error, Result, Target};
use log::{debug, error, info, warn};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::time::Instant;

/// Lifecycle of a [`CaptureJob`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    Created,
    Fetching,
    FetchFailed,
    Fetched,
    Rendering,
    Capturing,
    CaptureFailed,
    Cleanup,
    Completed,
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Terminal outcome for one target.
#[derive(Debug)]
pub enum CaptureOutcome {
    /// The image was written to `image`.
    Success { image: PathBuf },
    /// The target could not be fetched; nothing was rendered.
    Skipped { reason: Error },
    /// Fetch worked but rendering, capture or local I/O did not.
    Failed { reason: Error },
}

/// The single reported result for one submitted target.
#[derive(Debug)]
pub struct CaptureResult {
    pub target: Target,
    pub outcome: CaptureOutcome,
    /// States visited by the job, in order.
    pub states: Vec<JobState>,
}

impl CaptureResult {
    pub fn is_success(&self) -> bool {
        matches!(self.outcome, CaptureOutcome::Success { .. })
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self.outcome, CaptureOutcome::Skipped { .. })
    }

    pub fn is_failed(&self) -> bool {
        matches!(self.outcome, CaptureOutcome::Failed { .. })
    }

    pub fn image(&self) -> Option<&Path> {
        match &self.outcome {
            CaptureOutcome::Success { image } => Some(image),
            _ => None,
        }
    }

    pub fn reason(&self) -> Option<&Error> {
        match &self.outcome {
            CaptureOutcome::Success { .. } => None,
            CaptureOutcome::Skipped { reason } | CaptureOutcome::Failed { reason } => Some(reason),
        }
    }
}

/// One status line per target, suitable for a terminal.
impl fmt::Display for CaptureResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.outcome {
            CaptureOutcome::Success { image } => {
                write!(f, "[+] {} -> {}", self.target, image.display())
            }
            CaptureOutcome::Skipped { reason } => write!(f, "[-] {} skipped: {}", self.target, reason),
            CaptureOutcome::Failed { reason } => write!(f, "[!] {} failed: {}", self.target, reason),
        }
    }
}

/// Shared, read-only collaborators handed to every job of a run.
#[derive(Clone)]
pub struct JobContext {
    pub config: Arc<CaptureConfig>,
    pub fetcher: Fetcher,
    pub backend: Arc<dyn BackendFactory>,
    pub workers: RenderWorkers,
}

/// Drives one target through fetch, persist, render, capture and cleanup.
pub struct CaptureJob {
    target: Target,
    stem: String,
    ctx: JobContext,
    states: Vec<JobState>,
}

impl CaptureJob {
    pub fn new(target: Target, ctx: JobContext) -> Self {
        let stem = target.file_stem();
        Self {
            target,
            stem,
            ctx,
            states: vec![JobState::Created],
        }
    }

    pub fn target(&self) -> &Target {
        &self.target
    }

    pub fn state(&self) -> JobState {
        self.states.last().copied().unwrap_or(JobState::Created)
    }

    /// Path of the image this job writes on success.
    pub fn image_path(&self) -> PathBuf {
        self.ctx.config.output_dir.join(format!("{}.png", self.stem))
    }

    fn transition(&mut self, next: JobState) {
        debug!("{}: {} -> {}", self.target, self.state(), next);
        self.states.push(next);
    }

    /// Run to completion. The permit is released after the job has cleaned
    /// up, whatever the outcome.
    pub async fn run(mut self, permit: AdmissionPermit) -> CaptureResult {
        let outcome = self.drive().await;
        self.transition(JobState::Completed);
        drop(permit);

        match &outcome {
            CaptureOutcome::Success { image } => info!("Captured {} to {}", self.target, image.display()),
            CaptureOutcome::Skipped { reason } => warn!("Skipped {}: {}", self.target, reason),
            CaptureOutcome::Failed { reason } => warn!("Failed to capture {}: {}", self.target, reason),
        }

        CaptureResult {
            target: self.target,
            outcome,
            states: self.states,
        }
    }

    async fn drive(&mut self) -> CaptureOutcome {
        self.transition(JobState::Fetching);
        let body = match self.ctx.fetcher.fetch(&self.target).await {
            Ok(body) => body,
            Err(reason) => {
                self.transition(JobState::FetchFailed);
                return CaptureOutcome::Skipped { reason };
            }
        };
        self.transition(JobState::Fetched);

        let artifact = match Artifact::create(self.ctx.config.artifact_dir(), &self.stem, &body).await {
            Ok(a) => a,
            Err(reason) => {
                error!("Could not persist {}: {}", self.target, reason);
                self.transition(JobState::CaptureFailed);
                return CaptureOutcome::Failed { reason };
            }
        };

        let captured = self.render_and_capture(artifact.path()).await;
        let outcome = match captured {
            Ok(image) => CaptureOutcome::Success { image },
            Err(reason) => {
                match reason {
                    Error::ArtifactIo { .. } => {
                        error!("Could not write image for {}: {}", self.target, reason)
                    }
                    Error::RenderTimeout(_) => warn!(
                        "Gave up on render of {}; {} render worker(s) still running",
                        self.target,
                        self.ctx.workers.live()
                    ),
                    _ => {}
                }
                self.transition(JobState::CaptureFailed);
                CaptureOutcome::Failed { reason }
            }
        };

        self.transition(JobState::Cleanup);
        if let Err(e) = artifact.remove() {
            error!("Cleanup of {} failed: {}", self.target, e);
        }
        outcome
    }

    async fn render_and_capture(&mut self, document: &Path) -> Result<PathBuf> {
        self.transition(JobState::Rendering);
        let render_timeout_ms = self.ctx.config.render_timeout_ms;
        let deadline = (render_timeout_ms > 0)
            .then(|| Instant::now() + Duration::from_millis(render_timeout_ms));

        let RenderTicket { rendered, captured } = spawn_render(
            &self.ctx.workers,
            self.ctx.backend.clone(),
            document.to_path_buf(),
            self.ctx.config.viewport,
            &self.stem,
        )?;

        await_completion(rendered, deadline, render_timeout_ms).await?;
        self.transition(JobState::Capturing);
        let png = await_completion(captured, deadline, render_timeout_ms).await?;

        // Staged next to the target so a failed write never leaves a
        // truncated image under the final name.
        let image = self.image_path();
        let staged = Artifact::create_with_ext(
            &self.ctx.config.output_dir,
            &format!(".{}", self.stem),
            "png.part",
            &png,
        )
        .await?;
        staged.persist(&image)?;
        Ok(image)
    }
}

/// Wait for a worker notification, bounded by the render deadline if any.
async fn await_completion<T>(
    rx: oneshot::Receiver<Result<T>>,
    deadline: Option<Instant>,
    timeout_ms: u64,
) -> Result<T> {
    let received = match deadline {
        Some(at) => tokio::time::timeout_at(at, rx)
            .await
            .map_err(|_| Error::RenderTimeout(timeout_ms))?,
        None => rx.await,
    };
    received.map_err(|_| Error::RenderError("render worker exited without reporting".into()))?
}
