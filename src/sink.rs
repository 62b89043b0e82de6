//! The sink frontend: lifecycle control and producer-facing submits.
//!
//! ## Lifecycle
//!
//! ```text
//! start()        Stopped -> Starting -> Running
//! stop()         Running -> Stopping -> Stopped
//! fatal status   render thread drains; submits fail until stop() + start()
//! ```
//!
//! `start()` spawns the render thread, which builds and binds its own
//! backend before the call returns. `stop()` flushes the queue — releasing
//! the render thread out of its blocking pop and every blocked producer
//! with [`Status::Flushing`] — then joins; the backend is torn down on the
//! render thread before it exits. Submits outside Running return
//! [`Status::Flushing`] instead of blocking.
//!
//! Format changes need no stop/start cycle: producers submit new caps and
//! the render thread rebuilds its surface in place, on the same thread and
//! context.

use std::sync::Arc;
use std::thread::{self, JoinHandle};

use parking_lot::{Condvar, Mutex};

use crate::backend::{BackendFactory, RenderBackend};
use crate::error::{RenderError, Result, SinkError, Status};
use crate::item::Payload;
use crate::media::{AllocationQuery, VideoCaps, VideoFrame};
use crate::queue::RenderQueue;
use crate::render::RenderLoop;
use crate::stats::{RenderStats, StatsSnapshot};

/// Sink-level configuration.
#[derive(Debug, Clone)]
pub struct SinkConfig {
    /// OS-visible name of the render thread.
    pub thread_name: String,
    /// Measure present timing and report it when the render loop exits.
    pub profile: bool,
}

impl Default for SinkConfig {
    fn default() -> Self {
        SinkConfig {
            thread_name: "glessink-render".to_string(),
            profile: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Lifecycle {
    Stopped,
    Starting,
    Running,
    Stopping,
}

/// Reports the render thread's startup outcome back to `start()`.
#[derive(Default)]
struct StartupGate {
    result: Mutex<Option<std::result::Result<(), RenderError>>>,
    ready: Condvar,
}

impl StartupGate {
    fn post(&self, result: std::result::Result<(), RenderError>) {
        *self.result.lock() = Some(result);
        self.ready.notify_all();
    }

    fn wait(&self) -> std::result::Result<(), RenderError> {
        let mut result = self.result.lock();
        loop {
            if let Some(outcome) = result.take() {
                return outcome;
            }
            self.ready.wait(&mut result);
        }
    }
}

/// The public face of the render core.
///
/// Producers hold the sink in an `Arc` and submit from any thread;
/// `start`/`stop` also take `&self` so lifecycle and streaming threads can
/// share one handle.
pub struct VideoSink {
    queue: Arc<RenderQueue>,
    stats: Arc<RenderStats>,
    factory: Arc<BackendFactory>,
    config: SinkConfig,
    state: Mutex<Lifecycle>,
    thread: Mutex<Option<JoinHandle<()>>>,
}

impl VideoSink {
    /// Sink with the default configuration.
    ///
    /// `factory` builds one backend per `start()`, invoked on the render
    /// thread itself — graphics contexts are thread-affine.
    pub fn new<F>(factory: F) -> Self
    where
        F: Fn() -> std::result::Result<Box<dyn RenderBackend>, RenderError>
            + Send
            + Sync
            + 'static,
    {
        Self::with_config(factory, SinkConfig::default())
    }

    pub fn with_config<F>(factory: F, config: SinkConfig) -> Self
    where
        F: Fn() -> std::result::Result<Box<dyn RenderBackend>, RenderError>
            + Send
            + Sync
            + 'static,
    {
        VideoSink {
            queue: Arc::new(RenderQueue::new()),
            stats: Arc::new(RenderStats::default()),
            factory: Arc::new(factory),
            config,
            state: Mutex::new(Lifecycle::Stopped),
            thread: Mutex::new(None),
        }
    }

    /// Spawn the render thread and wait until its backend is bound.
    ///
    /// On failure the sink stays stopped and every submit keeps failing
    /// fast with [`Status::Flushing`].
    pub fn start(&self) -> Result<()> {
        {
            let mut state = self.state.lock();
            if *state != Lifecycle::Stopped {
                return Err(SinkError::AlreadyRunning);
            }
            *state = Lifecycle::Starting;
        }

        self.queue.set_flushing(false);

        let gate = Arc::new(StartupGate::default());
        let thread_gate = gate.clone();
        let queue = self.queue.clone();
        let stats = self.stats.clone();
        let factory = self.factory.clone();
        let profile = self.config.profile;

        let spawned = thread::Builder::new()
            .name(self.config.thread_name.clone())
            .spawn(move || {
                let bound = factory().and_then(|mut backend| {
                    backend.bind_to_thread().map(|()| backend)
                });
                let backend = match bound {
                    Ok(backend) => backend,
                    Err(err) => {
                        thread_gate.post(Err(err));
                        return;
                    }
                };
                thread_gate.post(Ok(()));
                RenderLoop::new(queue, backend, stats, profile).run();
            });

        let handle = match spawned {
            Ok(handle) => handle,
            Err(err) => {
                self.queue.set_flushing(true);
                *self.state.lock() = Lifecycle::Stopped;
                return Err(SinkError::ThreadSpawn(err));
            }
        };

        match gate.wait() {
            Ok(()) => {
                *self.thread.lock() = Some(handle);
                *self.state.lock() = Lifecycle::Running;
                tracing::info!(thread = %self.config.thread_name, "sink started");
                Ok(())
            }
            Err(err) => {
                self.queue.set_flushing(true);
                let _ = handle.join();
                *self.state.lock() = Lifecycle::Stopped;
                tracing::error!(error = %err, "sink failed to start");
                Err(SinkError::BackendInit(err))
            }
        }
    }

    /// Flush the queue, join the render thread, release the context.
    ///
    /// Idempotent: stopping a sink that is not running is a no-op. Every
    /// producer blocked in a submit returns [`Status::Flushing`].
    pub fn stop(&self) {
        {
            let mut state = self.state.lock();
            if *state != Lifecycle::Running {
                tracing::debug!(state = ?*state, "stop ignored");
                return;
            }
            *state = Lifecycle::Stopping;
        }

        tracing::debug!("stopping, flushing queue");
        self.queue.set_flushing(true);

        if let Some(handle) = self.thread.lock().take() {
            if handle.join().is_err() {
                tracing::error!("render thread panicked");
            }
        }

        *self.state.lock() = Lifecycle::Stopped;
        tracing::info!("sink stopped");
    }

    /// Whether the sink is currently running.
    pub fn is_running(&self) -> bool {
        *self.state.lock() == Lifecycle::Running
    }

    /// Negotiate (or re-negotiate) the render format.
    ///
    /// Submitting caps equal to the configured ones is a cheap no-op
    /// success, so callers may re-push caps freely.
    pub fn submit_caps(&self, caps: VideoCaps) -> Status {
        self.queue.submit(Payload::Caps(caps))
    }

    /// Upload one frame into the render surface.
    ///
    /// Upload only — pair with [`request_redraw`](Self::request_redraw),
    /// or use [`render_frame`](Self::render_frame) to also present it.
    pub fn submit_frame(&self, frame: Arc<VideoFrame>) -> Status {
        self.queue.submit(Payload::Frame(frame))
    }

    /// Upload one frame and present it: the usual path for new frames.
    pub fn render_frame(&self, frame: Arc<VideoFrame>) -> Status {
        let status = self.submit_frame(frame);
        if !status.is_ok() {
            return status;
        }
        self.request_redraw()
    }

    /// Run a context-native allocation against the live context.
    ///
    /// On [`Status::Ok`] the result has been written into the query; the
    /// blocking rendezvous is what makes the in-place answer visible to
    /// the caller.
    pub fn submit_query(&self, query: Arc<Mutex<AllocationQuery>>) -> Status {
        self.queue.submit(Payload::Query(query))
    }

    /// Re-present the most recently uploaded frame (expose/redraw).
    pub fn request_redraw(&self) -> Status {
        self.queue.submit(Payload::Redraw)
    }

    /// Point-in-time render statistics.
    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }
}

impl Drop for VideoSink {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = SinkConfig::default();
        assert_eq!(config.thread_name, "glessink-render");
        assert!(!config.profile);
    }
}
