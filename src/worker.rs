use crate::backend::BackendFactory;
use crate::{Error, Result, Viewport};
use log::{debug, warn};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use tokio::sync::oneshot;

/// Counts render threads that have not exited yet.
///
/// A job that gives up on its render releases its admission slot while the
/// thread may still be blocked inside the backend; this gauge keeps those
/// threads visible.
#[derive(Debug, Clone, Default)]
pub struct RenderWorkers {
    live: Arc<AtomicUsize>,
}

impl RenderWorkers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Render threads currently alive.
    pub fn live(&self) -> usize {
        self.live.load(Ordering::SeqCst)
    }

    fn enter(&self) -> LiveWorker {
        self.live.fetch_add(1, Ordering::SeqCst);
        LiveWorker(self.live.clone())
    }
}

// Decrements on every exit path of the thread, unwinding included.
struct LiveWorker(Arc<AtomicUsize>);

impl Drop for LiveWorker {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Completion channels of one render worker.
///
/// The worker thread owns its backend for the whole render/capture phase and
/// reports twice: once when the document has rendered and once with the
/// captured image. Dropping the ticket cancels the capture if the render has
/// not finished yet.
pub struct RenderTicket {
    pub rendered: oneshot::Receiver<Result<()>>,
    pub captured: oneshot::Receiver<Result<Vec<u8>>>,
}

/// Spawn a dedicated thread that renders `document` with a fresh backend.
///
/// The backend is created, used and closed on that thread only. A panic inside
/// the backend unwinds the worker thread alone; the caller sees the closed
/// channel as a render failure. Once the ticket is dropped the worker skips
/// whatever work is left and closes the backend.
pub fn spawn_render(
    workers: &RenderWorkers,
    factory: Arc<dyn BackendFactory>,
    document: PathBuf,
    viewport: Viewport,
    label: &str,
) -> Result<RenderTicket> {
    let (rendered_tx, rendered_rx) = oneshot::channel::<Result<()>>();
    let (captured_tx, captured_rx) = oneshot::channel::<Result<Vec<u8>>>();

    let live = workers.enter();

    thread::Builder::new()
        .name(format!("render-{}", label))
        .spawn(move || {
            let _live = live;
            let mut backend = match factory.create() {
                Ok(b) => b,
                Err(err) => {
                    let _ = rendered_tx.send(Err(err));
                    return;
                }
            };

            if rendered_tx.is_closed() {
                debug!("Render of {} cancelled", document.display());
                if let Err(e) = backend.close() {
                    warn!("Render backend teardown failed: {}", e);
                }
                return;
            }

            let render = backend.render(&document, viewport);
            let rendered_ok = render.is_ok();
            let _ = rendered_tx.send(render);

            if rendered_ok {
                if captured_tx.is_closed() {
                    debug!("Capture of {} cancelled", document.display());
                } else {
                    let _ = captured_tx.send(backend.capture_png());
                }
            }

            if let Err(e) = backend.close() {
                warn!("Render backend teardown failed: {}", e);
            }
        })
        .map_err(|e| Error::RenderError(format!("Failed to spawn render worker: {}", e)))?;

    Ok(RenderTicket {
        rendered: rendered_rx,
        captured: captured_rx,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::RenderBackend;
    use std::path::Path;
    use std::sync::atomic::AtomicBool;
    use std::time::Duration;

    struct Recorder {
        fail_render: bool,
        panic_render: bool,
        closed: Arc<AtomicBool>,
    }

    /// Blocks in render, records whether capture was ever asked for.
    struct Slow {
        delay: Duration,
        captured: Arc<AtomicBool>,
        closed: Arc<AtomicBool>,
    }

    impl RenderBackend for Slow {
        fn render(&mut self, _document: &Path, _viewport: Viewport) -> Result<()> {
            std::thread::sleep(self.delay);
            Ok(())
        }

        fn capture_png(&mut self) -> Result<Vec<u8>> {
            self.captured.store(true, Ordering::SeqCst);
            Ok(Vec::new())
        }

        fn close(self: Box<Self>) -> Result<()> {
            self.closed.store(true, Ordering::SeqCst);
            Ok(())
        }
    }

    async fn wait_for_exit(workers: &RenderWorkers) {
        for _ in 0..200 {
            if workers.live() == 0 {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("render worker still alive");
    }

    impl RenderBackend for Recorder {
        fn render(&mut self, _document: &Path, _viewport: Viewport) -> Result<()> {
            if self.panic_render {
                panic!("backend crashed");
            }
            if self.fail_render {
                return Err(Error::RenderError("unsupported content".into()));
            }
            Ok(())
        }

        fn capture_png(&mut self) -> Result<Vec<u8>> {
            Ok(b"\x89PNG\r\n\x1a\n".to_vec())
        }

        fn close(self: Box<Self>) -> Result<()> {
            self.closed.store(true, Ordering::SeqCst);
            Ok(())
        }
    }

    fn factory(fail_render: bool, panic_render: bool, closed: Arc<AtomicBool>) -> Arc<dyn BackendFactory> {
        Arc::new(move || -> Result<Box<dyn RenderBackend>> {
            Ok(Box::new(Recorder {
                fail_render,
                panic_render,
                closed: closed.clone(),
            }))
        })
    }

    #[tokio::test]
    async fn render_then_capture() {
        let closed = Arc::new(AtomicBool::new(false));
        let ticket = spawn_render(
            &RenderWorkers::new(),
            factory(false, false, closed.clone()),
            PathBuf::from("doc.html"),
            Viewport::default(),
            "ok",
        )
        .unwrap();
        ticket.rendered.await.unwrap().unwrap();
        let png = ticket.captured.await.unwrap().unwrap();
        assert_eq!(&png[..4], b"\x89PNG");
    }

    #[tokio::test]
    async fn failed_render_still_closes_backend() {
        let closed = Arc::new(AtomicBool::new(false));
        let ticket = spawn_render(
            &RenderWorkers::new(),
            factory(true, false, closed.clone()),
            PathBuf::from("doc.html"),
            Viewport::default(),
            "fail",
        )
        .unwrap();
        assert!(ticket.rendered.await.unwrap().is_err());
        // The capture sender is dropped without a value.
        assert!(ticket.captured.await.is_err());
        assert!(closed.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn backend_panic_is_contained() {
        let closed = Arc::new(AtomicBool::new(false));
        let ticket = spawn_render(
            &RenderWorkers::new(),
            factory(false, true, closed),
            PathBuf::from("doc.html"),
            Viewport::default(),
            "panic",
        )
        .unwrap();
        assert!(ticket.rendered.await.is_err());
    }

    #[tokio::test]
    async fn factory_error_is_reported_as_render_result() {
        let failing: Arc<dyn BackendFactory> = Arc::new(|| -> Result<Box<dyn RenderBackend>> {
            Err(Error::InitializationError("no browser".into()))
        });
        let ticket = spawn_render(&RenderWorkers::new(), failing, PathBuf::from("doc.html"), Viewport::default(), "init").unwrap();
        let err = ticket.rendered.await.unwrap().unwrap_err();
        assert!(matches!(err, Error::InitializationError(_)));
    }

    #[tokio::test]
    async fn dropped_ticket_skips_capture_and_worker_exits() {
        let workers = RenderWorkers::new();
        let captured = Arc::new(AtomicBool::new(false));
        let closed = Arc::new(AtomicBool::new(false));
        let (c, d) = (captured.clone(), closed.clone());
        let slow: Arc<dyn BackendFactory> = Arc::new(move || -> Result<Box<dyn RenderBackend>> {
            Ok(Box::new(Slow {
                delay: Duration::from_millis(300),
                captured: c.clone(),
                closed: d.clone(),
            }))
        });

        let ticket = spawn_render(&workers, slow, PathBuf::from("doc.html"), Viewport::default(), "slow").unwrap();
        assert_eq!(workers.live(), 1);
        drop(ticket);

        wait_for_exit(&workers).await;
        assert!(!captured.load(Ordering::SeqCst));
        assert!(closed.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn panicking_worker_is_not_counted_as_live() {
        let workers = RenderWorkers::new();
        let closed = Arc::new(AtomicBool::new(false));
        let ticket = spawn_render(
            &workers,
            factory(false, true, closed),
            PathBuf::from("doc.html"),
            Viewport::default(),
            "panic-live",
        )
        .unwrap();
        assert!(ticket.rendered.await.is_err());
        wait_for_exit(&workers).await;
    }
}
