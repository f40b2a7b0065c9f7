//! Render backend contract.
//!
//! A backend turns a local document into a raster image. Backends are
//! stateful and are never shared: the pipeline asks a [`BackendFactory`] for a
//! fresh instance on each job's dedicated render thread, so an implementation
//! does not need to be `Send`.

use crate::{Result, Viewport};
use std::path::Path;

/// A rendering surface able to load a local document and snapshot it.
pub trait RenderBackend {
    /// Load and render `document` at the given viewport.
    ///
    /// Returns once the document has finished loading. Malformed markup and
    /// script errors must be contained and never abort the process.
    fn render(&mut self, document: &Path, viewport: Viewport) -> Result<()>;

    /// Snapshot the current render state as PNG bytes.
    ///
    /// Only valid after a successful [`render`](RenderBackend::render).
    fn capture_png(&mut self) -> Result<Vec<u8>>;

    /// Tear down the rendering surface.
    fn close(self: Box<Self>) -> Result<()>;
}

/// Creates one [`RenderBackend`] per job.
pub trait BackendFactory: Send + Sync {
    fn create(&self) -> Result<Box<dyn RenderBackend>>;
}

impl<F> BackendFactory for F
where
    F: Fn() -> Result<Box<dyn RenderBackend>> + Send + Sync,
{
    fn create(&self) -> Result<Box<dyn RenderBackend>> {
        self()
    }
}
