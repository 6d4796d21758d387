use std::collections::HashMap;

use crate::foundation::error::MarionetteResult;
use crate::foundation::frame::FrameIndex;
use crate::timeline::span::{Span, SpanId};

/// Narrow interface to the rendering collaborator's sampled timeline.
///
/// The collaborator owns the actual track mixing; this core only tells it
/// which spans exist, when one changes shape (crossfade truncation), and how
/// long the declared timeline currently is.
pub trait SpanSink {
    /// A span was registered.
    fn add_span(&mut self, id: SpanId, span: &Span);
    /// A registered span changed (truncation, envelopes, weight).
    fn update_span(&mut self, id: SpanId, span: &Span);
    /// A span was removed.
    fn remove_span(&mut self, id: SpanId);
    /// The declared total timeline length grew to `frames`.
    fn set_timeline_len(&mut self, frames: FrameIndex);
}

/// Sink that discards everything. Useful for headless runs and tests.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullSink;

impl SpanSink for NullSink {
    fn add_span(&mut self, _id: SpanId, _span: &Span) {}
    fn update_span(&mut self, _id: SpanId, _span: &Span) {}
    fn remove_span(&mut self, _id: SpanId) {}
    fn set_timeline_len(&mut self, _frames: FrameIndex) {}
}

/// Bookkeeping wrapper over a [`SpanSink`].
///
/// Owns the registered span set, issues ids, and answers blend queries so
/// the scheduler and tests never have to reach into the collaborator.
pub struct TimelineCompositor {
    sink: Box<dyn SpanSink>,
    spans: HashMap<SpanId, Span>,
    next_id: u64,
    timeline_len: FrameIndex,
}

impl TimelineCompositor {
    /// Wrap `sink`, declaring an initial timeline length.
    pub fn new(mut sink: Box<dyn SpanSink>, initial_len: FrameIndex) -> Self {
        sink.set_timeline_len(initial_len);
        Self {
            sink,
            spans: HashMap::new(),
            next_id: 0,
            timeline_len: initial_len,
        }
    }

    /// Register a span, forwarding it to the sink.
    pub fn add(&mut self, span: Span) -> MarionetteResult<SpanId> {
        span.validate()?;
        let id = SpanId(self.next_id);
        self.next_id += 1;
        self.sink.add_span(id, &span);
        self.spans.insert(id, span);
        Ok(id)
    }

    /// Remove a span. Returns false if the id is unknown (already removed).
    pub fn remove(&mut self, id: SpanId) -> bool {
        if self.spans.remove(&id).is_some() {
            self.sink.remove_span(id);
            true
        } else {
            false
        }
    }

    /// Edit a span in place and notify the sink. Returns false for unknown ids.
    pub fn update(&mut self, id: SpanId, edit: impl FnOnce(&mut Span)) -> bool {
        match self.spans.get_mut(&id) {
            Some(span) => {
                edit(span);
                self.sink.update_span(id, span);
                true
            }
            None => false,
        }
    }

    /// Registered span for `id`.
    pub fn span(&self, id: SpanId) -> Option<&Span> {
        self.spans.get(&id)
    }

    /// All registered spans, in arbitrary order.
    pub fn spans(&self) -> impl Iterator<Item = (SpanId, &Span)> {
        self.spans.iter().map(|(id, s)| (*id, s))
    }

    /// Number of registered spans.
    pub fn span_count(&self) -> usize {
        self.spans.len()
    }

    /// Total blend contribution across every span at `now`.
    pub fn coverage_at(&self, now: FrameIndex) -> f64 {
        self.spans.values().map(|s| s.weight_at(now)).sum()
    }

    /// Total blend contribution of spans of one clip at `now`.
    pub fn clip_coverage_at(&self, clip_id: &str, now: FrameIndex) -> f64 {
        self.spans
            .values()
            .filter(|s| s.view.id() == clip_id)
            .map(|s| s.weight_at(now))
            .sum()
    }

    /// Currently declared timeline length.
    pub fn timeline_len(&self) -> FrameIndex {
        self.timeline_len
    }

    /// Grow the declared timeline length. Shrinking is ignored.
    pub fn extend_timeline(&mut self, to: FrameIndex) {
        if to.0 > self.timeline_len.0 {
            self.timeline_len = to;
            self.sink.set_timeline_len(to);
        }
    }

    /// Remove every registered span.
    pub fn clear(&mut self) {
        let ids: Vec<SpanId> = self.spans.keys().copied().collect();
        for id in ids {
            self.remove(id);
        }
    }
}

impl std::fmt::Debug for TimelineCompositor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TimelineCompositor")
            .field("spans", &self.spans.len())
            .field("timeline_len", &self.timeline_len)
            .finish()
    }
}

#[cfg(test)]
#[path = "../../tests/unit/timeline/compositor.rs"]
mod tests;
