//! Pure-Rust render backend.
//!
//! Parses the document with a tolerant HTML5 parser, lays out headings and
//! text blocks, and paints them as greeked glyph boxes. Scripts are never
//! executed, so broken pages cannot take the process down.

pub mod layout;
pub mod paint;
pub mod raster;

use crate::backend::RenderBackend;
use crate::{Error, Result, Viewport};
use log::debug;
use scraper::Html;
use std::path::Path;

/// Bytes inspected when deciding whether a document is binary.
const SNIFF_LEN: usize = 1024;

/// Render backend that draws documents with [`raster::Canvas`].
#[derive(Debug, Default)]
pub struct RasterBackend {
    surface: Option<raster::Canvas>,
}

impl RasterBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Render markup already in memory.
    pub fn render_html(&mut self, html: &str, viewport: Viewport) -> Result<()> {
        if viewport.width == 0 || viewport.height == 0 {
            return Err(Error::RenderError(format!(
                "empty viewport {}x{}",
                viewport.width, viewport.height
            )));
        }
        let mut canvas = raster::Canvas::new(viewport.width, viewport.height)?;
        let document = Html::parse_document(html);
        let nodes = layout::layout_document(&document, viewport);
        let commands = paint::paint_layout(&nodes, viewport);
        debug!("Laid out {} blocks, {} paint commands", nodes.len(), commands.len());

        canvas.execute(&commands);
        self.surface = Some(canvas);
        Ok(())
    }
}

impl RenderBackend for RasterBackend {
    fn render(&mut self, document: &Path, viewport: Viewport) -> Result<()> {
        self.surface = None;
        let bytes = std::fs::read(document).map_err(|e| Error::artifact_io(document, e))?;
        if bytes.iter().take(SNIFF_LEN).any(|&b| b == 0) {
            return Err(Error::RenderError("unsupported content: binary document".into()));
        }
        let html = String::from_utf8_lossy(&bytes);
        self.render_html(&html, viewport)
    }

    fn capture_png(&mut self) -> Result<Vec<u8>> {
        self.surface
            .as_ref()
            .ok_or_else(|| Error::RenderError("capture requested before render completed".into()))?
            .encode_png()
    }

    fn close(self: Box<Self>) -> Result<()> {
        Ok(())
    }
}
