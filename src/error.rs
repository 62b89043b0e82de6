//! Error and status types for the sink core.
//!
//! Three kinds of outcome travel through this crate and they are kept apart:
//!
//! - **Flow**: [`Status`] — the per-item result a submit call returns.
//!   `Flushing` during teardown is an expected outcome, not a bug.
//! - **Backend**: [`RenderError`] — what the
//!   [`RenderBackend`](crate::backend::RenderBackend) collaborator reports.
//!   [`RenderError::is_fatal`] decides whether the render loop keeps serving
//!   ([`Status::Dropped`]) or drains and exits ([`Status::Fatal`]).
//! - **Lifecycle**: [`SinkError`] — [`start`](crate::sink::VideoSink::start)
//!   misuse and startup failures.

use std::io;

/// Flow status returned to the producer that submitted an item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    /// The item was handled successfully.
    Ok,
    /// The sink is flushing, stopped, or has failed fatally; the item was
    /// not handled. Expected during teardown races.
    Flushing,
    /// The item failed but the render thread keeps serving subsequent items
    /// (a single bad frame was dropped).
    Dropped,
    /// The graphics context or surface is unusable. The render thread
    /// drains the queue and exits; the embedder must call
    /// [`stop`](crate::sink::VideoSink::stop).
    Fatal,
}

impl Status {
    /// Whether the item was handled successfully.
    pub fn is_ok(self) -> bool {
        self == Status::Ok
    }
}

/// Errors reported by the [`RenderBackend`](crate::backend::RenderBackend).
///
/// Fatal variants leave the context unusable; recoverable ones cost a
/// single item.
#[derive(Debug, Clone, thiserror::Error)]
pub enum RenderError {
    /// Binding the graphics context to the render thread failed. Fatal.
    #[error("context bind failed: {0}")]
    Bind(String),

    /// Rebuilding the render surface for new caps failed. Fatal: the
    /// surface no longer matches any negotiated format.
    #[error("surface reconfigure failed: {0}")]
    Reconfigure(String),

    /// Uploading one frame failed. Recoverable: the frame is dropped.
    #[error("frame upload failed: {0}")]
    Upload(String),

    /// Presenting failed. Recoverable: the next redraw retries.
    #[error("present failed: {0}")]
    Present(String),

    /// Allocating a context-native image failed. Recoverable: the query
    /// completes without a handle.
    #[error("image allocation failed: {0}")]
    Allocate(String),

    /// The context is gone (surface destroyed, device lost). Fatal.
    #[error("graphics context lost: {0}")]
    ContextLost(String),
}

impl RenderError {
    /// Whether this error leaves the graphics context unusable.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            RenderError::Bind(_) | RenderError::Reconfigure(_) | RenderError::ContextLost(_)
        )
    }
}

impl From<&RenderError> for Status {
    fn from(err: &RenderError) -> Status {
        if err.is_fatal() {
            Status::Fatal
        } else {
            Status::Dropped
        }
    }
}

/// Errors from the sink lifecycle API.
#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    /// [`start`](crate::sink::VideoSink::start) was called on a sink that
    /// is not stopped.
    #[error("sink already running")]
    AlreadyRunning,

    /// Spawning the render thread failed.
    #[error("failed to spawn render thread: {0}")]
    ThreadSpawn(#[from] io::Error),

    /// The backend factory or context bind failed on the render thread.
    #[error("backend startup failed: {0}")]
    BackendInit(#[from] RenderError),
}

/// Convenience alias for `Result<T, SinkError>`.
pub type Result<T> = std::result::Result<T, SinkError>;
