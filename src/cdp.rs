//! Chrome DevTools Protocol render backend

use crate::backend::RenderBackend;
use crate::{Error, Result, Viewport};
use headless_chrome::browser::tab::Tab;
use headless_chrome::protocol::cdp::Page;
use headless_chrome::{Browser, LaunchOptions};
use log::{debug, warn};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

/// Render backend driving a private headless Chrome instance.
///
/// Each backend launches its own browser with one tab sized to the viewport,
/// so concurrent jobs never share a rendering surface. The browser process is
/// killed when the backend is closed or dropped.
pub struct CdpBackend {
    browser: Browser,
    tab: Arc<Tab>,
    viewport: Viewport,
    settle: Duration,
    rendered: bool,
}

impl CdpBackend {
    /// Launch headless Chrome with a window of `viewport` size.
    ///
    /// `settle_ms` is waited after navigation so late layout can finish.
    pub fn launch(viewport: Viewport, settle_ms: u64) -> Result<Self> {
        let launch_options = LaunchOptions::default_builder()
            .headless(true)
            .window_size(Some((viewport.width, viewport.height)))
            .ignore_certificate_errors(true)
            .build()
            .map_err(|e| Error::InitializationError(format!("Failed to build launch options: {}", e)))?;

        let browser = Browser::new(launch_options)
            .map_err(|e| Error::InitializationError(format!("Failed to launch browser: {}", e)))?;

        let tab = browser
            .new_tab()
            .map_err(|e| Error::InitializationError(format!("Failed to create tab: {}", e)))?;

        Ok(Self {
            browser,
            tab,
            viewport,
            settle: Duration::from_millis(settle_ms),
            rendered: false,
        })
    }
}

impl RenderBackend for CdpBackend {
    fn render(&mut self, document: &Path, viewport: Viewport) -> Result<()> {
        self.rendered = false;
        if viewport != self.viewport {
            warn!(
                "Browser launched at {}x{}, render requested at {}x{}",
                self.viewport.width, self.viewport.height, viewport.width, viewport.height
            );
        }

        let absolute = document
            .canonicalize()
            .map_err(|e| Error::artifact_io(document, e))?;
        let url = url::Url::from_file_path(&absolute)
            .map_err(|_| Error::RenderError(format!("Not a file path: {}", absolute.display())))?;

        self.tab
            .navigate_to(url.as_str())
            .map_err(|e| Error::RenderError(format!("Navigation failed: {}", e)))?;

        self.tab
            .wait_until_navigated()
            .map_err(|e| Error::RenderError(format!("Wait for navigation failed: {}", e)))?;

        // Let the page stabilize
        std::thread::sleep(self.settle);
        debug!("Rendered {}", url);
        self.rendered = true;
        Ok(())
    }

    fn capture_png(&mut self) -> Result<Vec<u8>> {
        if !self.rendered {
            return Err(Error::RenderError("capture requested before render completed".into()));
        }
        self.tab
            .capture_screenshot(Page::CaptureScreenshotFormatOption::Png, None, None, true)
            .map_err(|e| Error::RenderError(format!("Screenshot failed: {}", e)))
    }

    fn close(self: Box<Self>) -> Result<()> {
        let CdpBackend { browser, tab, .. } = *self;
        if let Err(e) = tab.close(true) {
            debug!("Tab close failed: {}", e);
        }
        drop(browser);
        Ok(())
    }
}
