//! sitesnap
//!
//! Captures screenshots of many web endpoints concurrently, tolerating broken
//! TLS, with a bounded number of captures in flight.
//!
//! Each target goes through the same pipeline: the page is fetched over
//! HTTP(S) with certificate checks disabled, the body is written to a local
//! artifact, a render backend loads that artifact on a dedicated thread and
//! captures a PNG, and the artifact is deleted again. An
//! [`AdmissionController`](admission::AdmissionController) limits how many
//! targets are in that pipeline at once.
//!
//! # Features
//!
//! - **raster** (default): pure-Rust backend, no browser needed
//! - **cdp**: headless Chrome backend via the DevTools protocol
//!
//! # Example
//!
//! ```no_run
//! use sitesnap::{CaptureConfig, Target, Viewport};
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = CaptureConfig {
//!     max_concurrency: 4,
//!     viewport: Viewport { width: 1280, height: 800 },
//!     output_dir: "shots".into(),
//!     ..Default::default()
//! };
//!
//! let report = sitesnap::capture_targets(
//!     vec![Target::new("https://10.0.0.1"), Target::new("http://10.0.0.2:8080")],
//!     config,
//! )
//! .await?;
//! for result in &report.results {
//!     println!("{}", result);
//! }
//! # Ok(())
//! # }
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;

pub mod error;
pub use error::{Error, ErrorCategory, Result};

pub mod admission;
pub mod artifact;
pub mod backend;
pub mod fetch;
pub mod input;
pub mod job;
pub mod scheduler;
pub mod target;
pub mod worker;

#[cfg(feature = "cdp")]
pub mod cdp;

// Pure-Rust rasterizing backend
#[cfg(feature = "raster")]
pub mod rendering;

pub use backend::{BackendFactory, RenderBackend};
pub use job::{CaptureOutcome, CaptureResult, JobState};
pub use scheduler::{CaptureScheduler, RunReport};
pub use target::Target;

/// Configuration for a capture run
///
/// The defaults mirror a typical reconnaissance sweep: ten captures at a
/// time, a 15 second fetch timeout and a 1024x768 viewport. Images and
/// temporary artifacts go to the current directory.
///
/// # Examples
///
/// ```
/// let cfg = sitesnap::CaptureConfig::default();
/// assert_eq!(cfg.viewport.width, 1024);
/// assert!(cfg.validate().is_ok());
/// ```
#[derive(Debug, Clone)]
pub struct CaptureConfig {
    /// Maximum number of targets in the pipeline at once
    pub max_concurrency: usize,
    /// Fetch timeout in milliseconds
    pub timeout_ms: u64,
    /// Render/capture timeout in milliseconds (0 => wait indefinitely)
    pub render_timeout_ms: u64,
    /// Viewport dimensions used for rendering
    pub viewport: Viewport,
    /// User agent string to send with requests
    pub user_agent: String,
    /// Directory that receives the captured images
    pub output_dir: PathBuf,
    /// Directory for fetched artifacts; defaults to `output_dir`
    pub work_dir: Option<PathBuf>,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            max_concurrency: 10,
            timeout_ms: 15000,
            render_timeout_ms: 60000,
            viewport: Viewport::default(),
            user_agent: "Mozilla/5.0 (X11; Linux x86_64) Gecko/20100101 Firefox/115.0 sitesnap/0.1".to_string(),
            output_dir: PathBuf::from("."),
            work_dir: None,
        }
    }
}

impl CaptureConfig {
    pub fn artifact_dir(&self) -> &Path {
        self.work_dir.as_deref().unwrap_or(&self.output_dir)
    }

    /// Reject settings that would make a run meaningless.
    pub fn validate(&self) -> Result<()> {
        if self.max_concurrency == 0 {
            return Err(Error::ConfigError("max concurrency must be at least 1".into()));
        }
        if self.timeout_ms == 0 {
            return Err(Error::ConfigError("fetch timeout must be positive".into()));
        }
        if self.viewport.width == 0 || self.viewport.height == 0 {
            return Err(Error::ConfigError(format!(
                "viewport {}x{} has no area",
                self.viewport.width, self.viewport.height
            )));
        }
        if self.viewport.width > MAX_VIEWPORT_EDGE || self.viewport.height > MAX_VIEWPORT_EDGE {
            return Err(Error::ConfigError(format!(
                "viewport {}x{} exceeds {}px per side",
                self.viewport.width, self.viewport.height, MAX_VIEWPORT_EDGE
            )));
        }
        Ok(())
    }
}

/// Largest accepted viewport width or height, in pixels.
pub const MAX_VIEWPORT_EDGE: u32 = 16384;

/// Viewport dimensions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            width: 1024,
            height: 768,
        }
    }
}

/// Backend factory for the best backend compiled in.
///
/// Headless Chrome is preferred when the `cdp` feature is enabled.
#[cfg(feature = "cdp")]
pub fn default_backend_factory(config: &CaptureConfig) -> Arc<dyn BackendFactory> {
    let viewport = config.viewport;
    Arc::new(move || -> Result<Box<dyn RenderBackend>> {
        Ok(Box::new(cdp::CdpBackend::launch(viewport, 500)?))
    })
}

#[cfg(all(not(feature = "cdp"), feature = "raster"))]
pub fn default_backend_factory(_config: &CaptureConfig) -> Arc<dyn BackendFactory> {
    Arc::new(|| -> Result<Box<dyn RenderBackend>> { Ok(Box::new(rendering::RasterBackend::new())) })
}

// Without any backend every job fails at render time with a clear error.
#[cfg(all(not(feature = "cdp"), not(feature = "raster")))]
pub fn default_backend_factory(_config: &CaptureConfig) -> Arc<dyn BackendFactory> {
    Arc::new(|| -> Result<Box<dyn RenderBackend>> {
        Err(Error::InitializationError(
            "no render backend compiled in (enable `raster` or `cdp`)".into(),
        ))
    })
}

/// Capture `targets` with the default backend.
pub async fn capture_targets(targets: Vec<Target>, config: CaptureConfig) -> Result<RunReport> {
    let backend = default_backend_factory(&config);
    CaptureScheduler::new(config, backend).run(targets).await
}
