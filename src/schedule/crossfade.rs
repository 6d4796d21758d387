use std::collections::BTreeMap;

use tracing::debug;

use crate::foundation::frame::FrameIndex;
use crate::timeline::compositor::TimelineCompositor;
use crate::timeline::span::{EaseWindow, SpanId};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
/// What retiring an outgoing plan's spans did.
pub struct RetireReport {
    /// Spans given a crossfade tail and kept alive until it plays out.
    pub eased_out: usize,
    /// Spans dropped on the spot: not yet started, already fully played, or
    /// already easing out from an earlier transition.
    pub removed_now: usize,
    /// Latest projected end across the eased spans, before the safety margin.
    pub latest_end: Option<FrameIndex>,
}

/// Ease the outgoing plan's spans out and schedule their removal.
///
/// Spans that never started, already finished, or are still easing out from an
/// earlier switch are removed immediately; a retiring span is never chained
/// into a second blend, so the timeline always resolves toward the latest
/// target. Every other span is cut down to `window` frames past the current
/// position and shaped with the crossfade S-curve over exactly the frames it
/// has left. Removal is deferred until global time passes the latest projected
/// end plus `margin`, so an outgoing clip is never cut mid-frame.
pub fn retire_spans(
    comp: &mut TimelineCompositor,
    ids: &[SpanId],
    now: FrameIndex,
    window: u64,
    margin: u64,
    removals: &mut RemovalQueue,
) -> RetireReport {
    let mut report = RetireReport::default();
    let mut eased: Vec<SpanId> = Vec::new();

    for &id in ids {
        let Some(span) = comp.span(id) else {
            continue;
        };
        let pos = now.since(span.offset);
        let total = span.len_frames();
        if span.retiring || span.offset.0 > now.0 || pos >= total {
            comp.remove(id);
            report.removed_now += 1;
            continue;
        }

        let clip_len = span.clip_len();
        let new_total = (pos + window).min(total);
        if new_total == 0 {
            // Started this very frame with a zero window; nothing to play out.
            comp.remove(id);
            report.removed_now += 1;
            continue;
        }
        let tail = new_total - pos;
        comp.update(id, |s| {
            s.retiring = true;
            s.ease_out = (tail > 0).then(|| EaseWindow::crossfade(tail));
            if new_total <= clip_len {
                s.truncated_end = Some(new_total);
                s.tail_hold = 0;
            } else {
                s.tail_hold = new_total - clip_len;
            }
        });
        let end = span_end(comp, id);
        report.latest_end = Some(match report.latest_end {
            Some(prev) if prev.0 >= end.0 => prev,
            _ => end,
        });
        report.eased_out += 1;
        eased.push(id);
    }

    if let Some(end) = report.latest_end {
        let deadline = end.advance(margin);
        removals.schedule(deadline, eased);
        debug!(
            eased = report.eased_out,
            removed = report.removed_now,
            deadline = deadline.0,
            "outgoing spans retired"
        );
    } else if report.removed_now > 0 {
        debug!(removed = report.removed_now, "outgoing spans dropped");
    }
    report
}

fn span_end(comp: &TimelineCompositor, id: SpanId) -> FrameIndex {
    comp.span(id).map(|s| s.end()).unwrap_or(FrameIndex(0))
}

/// Frame-deadline removal queue for spans playing out a crossfade tail.
///
/// Deadlines live on the render clock: the tick drains due batches and
/// disposal clears the queue, so a disposed orchestrator never touches the
/// sink again.
#[derive(Debug, Default)]
pub struct RemovalQueue {
    batches: BTreeMap<FrameIndex, Vec<SpanId>>,
}

impl RemovalQueue {
    /// Create an empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue `ids` for removal once global time reaches `deadline`.
    pub fn schedule(&mut self, deadline: FrameIndex, ids: Vec<SpanId>) {
        if ids.is_empty() {
            return;
        }
        self.batches.entry(deadline).or_default().extend(ids);
    }

    /// Pop every span whose deadline has passed at `now`.
    pub fn drain_due(&mut self, now: FrameIndex) -> Vec<SpanId> {
        let mut due = Vec::new();
        while let Some((&deadline, _)) = self.batches.first_key_value() {
            if deadline.0 > now.0 {
                break;
            }
            if let Some(ids) = self.batches.remove(&deadline) {
                due.extend(ids);
            }
        }
        due
    }

    /// Take every queued span regardless of deadline. Used when a new switch
    /// supersedes the previous crossfade and its leftovers must go at once.
    pub fn take_all(&mut self) -> Vec<SpanId> {
        let batches = std::mem::take(&mut self.batches);
        batches.into_values().flatten().collect()
    }

    /// Number of spans still waiting on a deadline.
    pub fn len(&self) -> usize {
        self.batches.values().map(Vec::len).sum()
    }

    /// Whether nothing is scheduled.
    pub fn is_empty(&self) -> bool {
        self.batches.is_empty()
    }

    /// Drop everything without touching the compositor.
    pub fn clear(&mut self) {
        self.batches.clear();
    }
}

#[cfg(test)]
#[path = "../../tests/unit/schedule/crossfade.rs"]
mod tests;
