//! The render loop: single consumer of the work queue, sole owner of the
//! graphics backend.
//!
//! One iteration: pop an item, dispatch by payload tag, record the status
//! against the item's ticket. A fatal status drains the remaining queue
//! entries as flushed and ends the loop; either way the backend is torn
//! down on this thread before it exits.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::backend::RenderBackend;
use crate::error::{RenderError, Status};
use crate::item::{Payload, WorkItem};
use crate::media::{AllocationQuery, VideoCaps, VideoFrame};
use crate::queue::RenderQueue;
use crate::stats::{JitterMeter, RenderStats};

pub(crate) struct RenderLoop {
    queue: Arc<RenderQueue>,
    backend: Box<dyn RenderBackend>,
    stats: Arc<RenderStats>,
    /// Caps the surface is currently built for.
    configured: Option<VideoCaps>,
    jitter: Option<JitterMeter>,
}

impl RenderLoop {
    pub(crate) fn new(
        queue: Arc<RenderQueue>,
        backend: Box<dyn RenderBackend>,
        stats: Arc<RenderStats>,
        profile: bool,
    ) -> Self {
        RenderLoop {
            queue,
            backend,
            stats,
            configured: None,
            jitter: profile.then(JitterMeter::default),
        }
    }

    /// Pop, dispatch and complete items until the queue flushes or one
    /// fails fatally, then drain, tear the backend down and return.
    pub(crate) fn run(mut self) {
        tracing::debug!("render thread entering loop");

        while let Some(WorkItem { ticket, payload }) = self.queue.pop() {
            tracing::trace!(ticket, kind = payload.kind(), "handling item");

            let status = self.dispatch(&payload);
            self.queue.complete(ticket, status);

            if status == Status::Fatal {
                let drained = self.queue.drain_flushing();
                tracing::error!(ticket, drained, "fatal status, draining and exiting");
                break;
            }
        }

        // Normal flush path; already done when a fatal status drained.
        self.queue.drain_flushing();

        if let Some(jitter) = &self.jitter {
            jitter.report();
        }
        self.backend.teardown();
        tracing::debug!("render thread leaving");
    }

    fn dispatch(&mut self, payload: &Payload) -> Status {
        match payload {
            Payload::Caps(caps) => self.handle_caps(caps),
            Payload::Frame(frame) => self.handle_frame(frame),
            Payload::Query(query) => self.handle_query(query),
            Payload::Redraw => self.handle_redraw(),
        }
    }

    fn handle_caps(&mut self, caps: &VideoCaps) -> Status {
        if self.configured.as_ref() == Some(caps) {
            tracing::trace!("caps unchanged, surface kept");
            return Status::Ok;
        }
        match self.backend.reconfigure_surface(caps) {
            Ok(()) => {
                tracing::info!(?caps, "surface reconfigured");
                self.configured = Some(caps.clone());
                self.stats.reconfigured();
                Status::Ok
            }
            Err(err) => self.report(err),
        }
    }

    fn handle_frame(&mut self, frame: &Arc<VideoFrame>) -> Status {
        if self.configured.is_none() {
            tracing::debug!("no caps configured yet, not drawing");
            return Status::Ok;
        }
        match self.backend.upload_frame(frame) {
            Ok(()) => {
                self.stats.frame_uploaded();
                Status::Ok
            }
            Err(err) => {
                let status = self.report(err);
                if status == Status::Dropped {
                    self.stats.frame_dropped();
                }
                status
            }
        }
    }

    fn handle_query(&mut self, query: &Mutex<AllocationQuery>) -> Status {
        let mut query = query.lock();
        match self.backend.allocate_image(&mut query) {
            Ok(()) => Status::Ok,
            Err(err) => self.report(err),
        }
    }

    fn handle_redraw(&mut self) -> Status {
        if self.configured.is_none() {
            tracing::debug!("no caps configured yet, nothing to present");
            return Status::Ok;
        }
        match self.backend.present_frame() {
            Ok(()) => {
                self.stats.presented();
                if let Some(jitter) = &mut self.jitter {
                    jitter.add_point();
                }
                Status::Ok
            }
            Err(err) => self.report(err),
        }
    }

    /// Log a backend error and map it to the status its severity dictates.
    fn report(&self, err: RenderError) -> Status {
        let status = Status::from(&err);
        if status == Status::Fatal {
            tracing::error!(error = %err, "backend failure, context unusable");
        } else {
            tracing::warn!(error = %err, "backend failure, item dropped");
        }
        status
    }
}
