//! The collaborator boundary: everything that actually touches EGL/GLES.
//!
//! The sink core never calls a graphics API. It drives a [`RenderBackend`]
//! supplied by the embedder — the real implementation wraps an EGL context
//! and GLES surface; tests use a recording stub.
//!
//! ## Threading contract
//!
//! Graphics contexts are thread-affine, so a backend is constructed, used,
//! and dropped on the render thread and never needs to be `Send`. What does
//! cross threads is the [`BackendFactory`]: every
//! [`start`](crate::sink::VideoSink::start) invokes it on the freshly
//! spawned render thread to build that thread's backend.
//!
//! ## Implementing a backend
//!
//! 1. [`bind_to_thread`](RenderBackend::bind_to_thread) makes the context
//!    current; it runs first, exactly once.
//! 2. [`reconfigure_surface`](RenderBackend::reconfigure_surface) rebuilds
//!    surface state when new caps arrive. The core already skips it for
//!    caps equal to the configured ones.
//! 3. [`upload_frame`](RenderBackend::upload_frame) converts and uploads
//!    one frame. The backend may retain the `Arc<VideoFrame>` until the
//!    next upload or teardown — a frame still bound to a texture must not
//!    be recycled.
//! 4. [`present_frame`](RenderBackend::present_frame) re-presents the most
//!    recent upload (expose/redraw handling).
//! 5. [`allocate_image`](RenderBackend::allocate_image) services
//!    context-native allocation queries in place.
//! 6. [`teardown`](RenderBackend::teardown) releases everything; it runs
//!    last, on the same thread.

use std::sync::Arc;

use crate::error::RenderError;
use crate::media::{AllocationQuery, VideoCaps, VideoFrame};

/// Graphics collaborator owned exclusively by the render thread.
pub trait RenderBackend {
    /// Make the graphics context current on the calling thread.
    fn bind_to_thread(&mut self) -> Result<(), RenderError>;

    /// Rebuild the render surface for a new negotiated format.
    fn reconfigure_surface(&mut self, caps: &VideoCaps) -> Result<(), RenderError>;

    /// Convert and upload one frame into the render surface.
    fn upload_frame(&mut self, frame: &Arc<VideoFrame>) -> Result<(), RenderError>;

    /// Present the most recently uploaded frame.
    fn present_frame(&mut self) -> Result<(), RenderError>;

    /// Allocate a context-native image, writing the handle into the query.
    fn allocate_image(&mut self, query: &mut AllocationQuery) -> Result<(), RenderError>;

    /// Release all context and surface state; runs last, on the render
    /// thread, with no caller left to report an error to.
    fn teardown(&mut self);
}

/// Builds one backend per render thread, on that thread.
pub type BackendFactory =
    dyn Fn() -> std::result::Result<Box<dyn RenderBackend>, RenderError> + Send + Sync;
