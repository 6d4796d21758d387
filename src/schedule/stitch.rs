use std::sync::Arc;

use tracing::debug;

use crate::animation::rng::Rng64;
use crate::catalog::model::{ChannelGroup, ClipView, LoadedClip};
use crate::foundation::error::{MarionetteError, MarionetteResult};
use crate::foundation::frame::FrameIndex;
use crate::timeline::span::{EaseWindow, Span};

#[derive(Clone, Debug, PartialEq)]
/// One body-motion piece of a stitched composite timeline.
pub struct StitchedSegment {
    /// Clip the segment plays.
    pub clip: Arc<LoadedClip>,
    /// Start frame relative to the composite start.
    pub start_frame: u64,
    /// Frames of the clip actually played.
    pub played_duration: u64,
    /// Whether the segment was cut to land exactly on the total duration.
    pub truncated: bool,
    /// Id of the segment played before this one, if any.
    pub previous_clip_id: Option<String>,
}

impl StitchedSegment {
    /// Frame one past the segment's last covered frame, composite-relative.
    pub fn end_frame(&self) -> u64 {
        self.start_frame + self.played_duration
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
/// Blend weights a composite request applies on top of per-clip defaults.
pub struct CompositeWeights {
    /// Scale for the primary overlay span.
    pub primary: f64,
    /// Scale for the stitched body spans.
    pub fill: f64,
}

impl Default for CompositeWeights {
    fn default() -> Self {
        Self {
            primary: 1.0,
            fill: 1.0,
        }
    }
}

impl CompositeWeights {
    /// Reject non-finite or non-positive scales.
    pub fn validate(&self) -> MarionetteResult<()> {
        for (name, v) in [("primary", self.primary), ("fill", self.fill)] {
            if !v.is_finite() || v <= 0.0 {
                return Err(MarionetteError::validation(format!(
                    "composite weight '{name}' must be finite and > 0"
                )));
            }
        }
        Ok(())
    }
}

#[derive(Clone, Debug)]
/// A resolved composite request: a primary track plus a body-motion pool.
pub struct CompositeSpec {
    /// Track that dictates the total duration (e.g. a lip-sync clip).
    pub primary: Arc<LoadedClip>,
    /// Clips eligible for body coverage.
    pub pool: Vec<Arc<LoadedClip>>,
    /// Request-level blend scaling.
    pub weights: CompositeWeights,
}

/// Build body segments covering exactly `total` frames from `pool`.
///
/// Segments are picked at random, proportionally to each clip's catalog
/// weight (uniform when weights are equal). A segment longer than the frames
/// still to cover is truncated and always ends the sequence, so the final
/// segment lands exactly on `total`. Consecutive segments overlap by the
/// current clip's transition window when they need to blend (different clip,
/// or the same clip with loop blending); the advance never drops below one
/// frame, so the loop always terminates.
pub fn stitch_segments(
    pool: &[Arc<LoadedClip>],
    total: u64,
    rng: &mut Rng64,
) -> MarionetteResult<Vec<StitchedSegment>> {
    if pool.is_empty() {
        return Err(MarionetteError::missing_clip("composite pool is empty"));
    }
    if total == 0 {
        return Err(MarionetteError::validation(
            "composite duration must be > 0",
        ));
    }

    let weights: Vec<f64> = pool.iter().map(|c| c.weight).collect();
    let mut segments = Vec::new();
    let mut current = 0u64;
    let mut previous: Option<Arc<LoadedClip>> = None;
    while current < total {
        let clip = pool[rng.pick_weighted(&weights)].clone();
        let full = clip.duration_frames;
        let remaining = total - current;
        let truncated = full > remaining;
        let played = if truncated { remaining } else { full };
        segments.push(StitchedSegment {
            clip: clip.clone(),
            start_frame: current,
            played_duration: played,
            truncated,
            previous_clip_id: previous.as_ref().map(|p| p.id.clone()),
        });
        if truncated {
            // A truncated segment lands exactly on `total` and must be final.
            break;
        }
        let needs_overlap = match &previous {
            None => false,
            Some(prev) => prev.id != clip.id || clip.loop_transition,
        };
        current += if needs_overlap {
            played.saturating_sub(clip.transition_frames).max(1)
        } else {
            played
        };
        previous = Some(clip);
    }
    debug!(segments = segments.len(), total, "stitched body coverage");
    Ok(segments)
}

/// Build the full span set for a composite block starting at `start`:
/// stitched body spans with blends at their overlaps, plus a face-only
/// overlay of the primary track spanning the whole block.
///
/// `lead_in` is applied to every span that begins at the block start, so the
/// composite as a whole crossfades in from whatever played before.
#[tracing::instrument(skip(spec, rng), fields(primary = %spec.primary.id))]
pub fn build_composite_spans(
    spec: &CompositeSpec,
    start: FrameIndex,
    lead_in: Option<EaseWindow>,
    rng: &mut Rng64,
) -> MarionetteResult<Vec<Span>> {
    spec.weights.validate()?;
    let total = spec.primary.duration_frames;
    let segments = stitch_segments(&spec.pool, total, rng)?;

    let mut spans = Vec::with_capacity(segments.len() + 1);
    for (i, seg) in segments.iter().enumerate() {
        let mut span = Span::new(
            ClipView::full(seg.clip.clone()),
            start.advance(seg.start_frame),
        )
        .with_weight(seg.clip.weight * spec.weights.fill);
        if seg.truncated {
            span = span.with_truncated_end(seg.played_duration);
        }
        // Blend across whatever overlap the stitch produced on either side.
        if i > 0 {
            let prev = &segments[i - 1];
            let overlap = prev.end_frame().saturating_sub(seg.start_frame);
            if overlap > 0 {
                span = span.with_ease_in(EaseWindow::crossfade(overlap));
            }
        }
        if let Some(next) = segments.get(i + 1) {
            let overlap = seg.end_frame().saturating_sub(next.start_frame);
            if overlap > 0 {
                span = span.with_ease_out(EaseWindow::crossfade(overlap));
            }
        }
        if seg.start_frame == 0
            && let Some(window) = lead_in
        {
            span = span.with_ease_in(window);
        }
        spans.push(span);
    }

    let overlay = Span::new(
        ClipView::excluding(spec.primary.clone(), ChannelGroup::Body),
        start,
    )
    .with_weight(spec.primary.weight * spec.weights.primary)
    .with_tail_hold(spec.primary.transition_frames);
    let overlay = match lead_in {
        Some(window) => overlay.with_ease_in(window),
        None => overlay,
    };
    spans.push(overlay);

    Ok(spans)
}

#[cfg(test)]
#[path = "../../tests/unit/schedule/stitch.rs"]
mod tests;
