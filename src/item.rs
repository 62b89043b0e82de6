//! Work items queued to the render thread.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::media::{AllocationQuery, VideoCaps, VideoFrame};

/// Identity of one submitted item, unique per submission.
///
/// Waiters match completions by ticket, never by queue position, so
/// concurrent producers cannot observe each other's results. Redraw items
/// get a ticket like everything else even though they carry no payload.
pub type Ticket = u64;

/// The payload of one unit of work for the render thread.
#[derive(Debug)]
pub enum Payload {
    /// (Re)configure the render surface for a new negotiated format.
    Caps(VideoCaps),
    /// Upload one frame into the render surface.
    Frame(Arc<VideoFrame>),
    /// Allocate a context-native image; answered in place.
    Query(Arc<Mutex<AllocationQuery>>),
    /// Re-present the most recently uploaded frame.
    Redraw,
}

impl Payload {
    /// Short tag for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Payload::Caps(_) => "caps",
            Payload::Frame(_) => "frame",
            Payload::Query(_) => "query",
            Payload::Redraw => "redraw",
        }
    }
}

/// One queue entry: a payload plus the ticket its producer waits on.
#[derive(Debug)]
pub struct WorkItem {
    pub ticket: Ticket,
    pub payload: Payload,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::VideoFormat;

    #[test]
    fn payload_kind_labels() {
        assert_eq!(
            Payload::Caps(VideoCaps::new(VideoFormat::Rgba, 4, 4)).kind(),
            "caps"
        );
        assert_eq!(Payload::Redraw.kind(), "redraw");
    }
}
