use std::collections::VecDeque;

use tracing::debug;

use crate::catalog::model::ClipRef;
use crate::foundation::frame::FrameIndex;
use crate::schedule::stitch::CompositeWeights;

#[derive(Clone, Debug, PartialEq)]
/// A queued playback request.
pub enum PlayRequest {
    /// Play one clip.
    Simple {
        /// Clip to play.
        clip: ClipRef,
    },
    /// Play a stitched composite block.
    Composite {
        /// Track dictating the block duration.
        primary: ClipRef,
        /// Catalog category supplying the body-motion pool.
        fill_category: String,
        /// Blend scaling for the block.
        weights: CompositeWeights,
    },
    /// Play an utterance: a lip-sync composite with emotion-matched body fill.
    Speak {
        /// Utterance text, carried for the host; the core only sizes logs by it.
        text: String,
        /// Lip-sync track dictating the utterance duration.
        primary: ClipRef,
        /// Catalog category supplying the body-motion pool.
        emotion_category: String,
        /// Blend scaling for the block.
        weights: CompositeWeights,
    },
}

impl PlayRequest {
    /// Short request kind name for logs and events.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Simple { .. } => "simple",
            Self::Composite { .. } => "composite",
            Self::Speak { .. } => "speak",
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize)]
/// Snapshot of the request queue for callers.
pub struct QueueStatus {
    /// Entries waiting to be dispatched.
    pub queued: usize,
    /// Whether a dispatch is in flight right now.
    pub dispatching: bool,
    /// Frame until which draining is held after the last dispatch.
    pub held_until: Option<u64>,
}

/// FIFO playback queue with forced-interrupt semantics.
///
/// Dispatching is reentrancy-guarded: `begin_dispatch` hands out at most one
/// entry until `finish_dispatch` releases the guard, and the finish installs a
/// short frame hold so the next tick cannot re-drain before the dispatched
/// clip has played a minimal interval.
#[derive(Debug, Default)]
pub struct RequestQueue {
    entries: VecDeque<PlayRequest>,
    dispatching: bool,
    hold_until: Option<FrameIndex>,
}

impl RequestQueue {
    /// Create an empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Entries waiting to be dispatched.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing is queued.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Append a request; `force` discards everything queued so far and puts
    /// the request alone at the head. Returns how many entries were discarded.
    pub fn enqueue(&mut self, request: PlayRequest, force: bool) -> usize {
        let discarded = if force {
            let n = self.entries.len();
            self.entries.clear();
            if n > 0 {
                debug!(discarded = n, "forced request cleared the queue");
            }
            n
        } else {
            0
        };
        self.entries.push_back(request);
        discarded
    }

    /// Pop the head for dispatch, taking the reentrancy guard. Returns `None`
    /// while another dispatch is in flight or the queue is empty.
    pub fn begin_dispatch(&mut self) -> Option<PlayRequest> {
        if self.dispatching {
            return None;
        }
        let request = self.entries.pop_front()?;
        self.dispatching = true;
        Some(request)
    }

    /// Release the dispatch guard, holding further draining until
    /// `hold_until` when given. Must follow every successful `begin_dispatch`
    /// whatever the dispatch outcome was, or the queue deadlocks.
    pub fn finish_dispatch(&mut self, hold_until: Option<FrameIndex>) {
        self.dispatching = false;
        self.hold_until = hold_until;
    }

    /// Whether the post-dispatch hold is still in effect at `now`.
    pub fn on_hold(&self, now: FrameIndex) -> bool {
        self.hold_until.is_some_and(|h| now.0 < h.0)
    }

    /// Drop every queued entry. The dispatch guard and hold are untouched.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Snapshot for callers.
    pub fn status(&self) -> QueueStatus {
        QueueStatus {
            queued: self.entries.len(),
            dispatching: self.dispatching,
            held_until: self.hold_until.map(|f| f.0),
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/director/queue.rs"]
mod tests;
