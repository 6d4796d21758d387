use crate::animation::ease::Ease;
use crate::catalog::model::ClipView;
use crate::foundation::error::{MarionetteError, MarionetteResult};
use crate::foundation::frame::{FrameIndex, FrameRange};

#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
/// Handle for a registered span, issued by the compositor.
pub struct SpanId(pub u64);

#[derive(Clone, Copy, Debug, PartialEq)]
/// An eased blend window at one edge of a span.
pub struct EaseWindow {
    /// Window length in frames. Clamped to the span length when evaluated.
    pub frames: u64,
    /// Curve shaping the blend.
    pub ease: Ease,
}

impl EaseWindow {
    /// Crossfade-shaped window of `frames` length.
    pub fn crossfade(frames: u64) -> Self {
        Self {
            frames,
            ease: Ease::CROSSFADE,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
/// A scheduled instance of a clip view on the global timeline.
///
/// The composited value at frame F blends every span whose play range
/// contains F, weighted by `weight_at(F)`.
pub struct Span {
    /// Projected clip this span plays.
    pub view: ClipView,
    /// Global timeline frame where playback starts.
    pub offset: FrameIndex,
    /// Base blend weight before envelopes.
    pub blend_weight: f64,
    /// Optional eased blend at the start.
    pub ease_in: Option<EaseWindow>,
    /// Optional eased blend at the end.
    pub ease_out: Option<EaseWindow>,
    /// Clip-local exclusive end, when playing less than the full clip.
    /// Must not exceed the clip duration.
    pub truncated_end: Option<u64>,
    /// Extra frames during which the final sampled frame holds steady past
    /// the clip end. Lets overlay spans survive into a following crossfade.
    pub tail_hold: u64,
    /// Set once a crossfade has begun easing this span out. A retiring span
    /// caught by a second transition is removed immediately instead of being
    /// chained into another blend.
    pub retiring: bool,
}

impl Span {
    /// Span playing the full view at `offset` with the clip's default weight.
    pub fn new(view: ClipView, offset: FrameIndex) -> Self {
        let blend_weight = view.clip().weight;
        Self {
            view,
            offset,
            blend_weight,
            ease_in: None,
            ease_out: None,
            truncated_end: None,
            tail_hold: 0,
            retiring: false,
        }
    }

    /// Override the base blend weight.
    pub fn with_weight(mut self, weight: f64) -> Self {
        self.blend_weight = weight;
        self
    }

    /// Attach a start blend.
    pub fn with_ease_in(mut self, window: EaseWindow) -> Self {
        self.ease_in = Some(window);
        self
    }

    /// Attach an end blend.
    pub fn with_ease_out(mut self, window: EaseWindow) -> Self {
        self.ease_out = Some(window);
        self
    }

    /// Play only the first `end` clip frames.
    pub fn with_truncated_end(mut self, end: u64) -> Self {
        self.truncated_end = Some(end);
        self
    }

    /// Hold the final frame for `frames` extra frames.
    pub fn with_tail_hold(mut self, frames: u64) -> Self {
        self.tail_hold = frames;
        self
    }

    /// Clip-local frames actually played, before the tail hold.
    pub fn clip_len(&self) -> u64 {
        self.truncated_end
            .unwrap_or_else(|| self.view.duration_frames())
    }

    /// Total frames the span occupies on the timeline.
    pub fn len_frames(&self) -> u64 {
        self.clip_len() + self.tail_hold
    }

    /// Half-open global interval the span occupies.
    pub fn play_range(&self) -> FrameRange {
        FrameRange {
            start: self.offset,
            end: self.offset.advance(self.len_frames()),
        }
    }

    /// Global frame one past the span's last covered frame.
    pub fn end(&self) -> FrameIndex {
        self.play_range().end
    }

    /// Blend contribution at global frame `now`: zero outside the play
    /// range, otherwise the base weight shaped by any edge envelopes.
    pub fn weight_at(&self, now: FrameIndex) -> f64 {
        let range = self.play_range();
        if !range.contains(now) {
            return 0.0;
        }
        let len = range.len_frames();
        let mut w = self.blend_weight;

        if let Some(win) = self.ease_in {
            let dur = win.frames.min(len);
            let pos = now.since(range.start);
            if dur > 0 && pos < dur {
                let denom = dur.saturating_sub(1);
                let t = if denom == 0 {
                    1.0
                } else {
                    pos as f64 / denom as f64
                };
                w *= win.ease.apply(t).clamp(0.0, 1.0);
            }
        }
        if let Some(win) = self.ease_out {
            let dur = win.frames.min(len);
            if dur > 0 {
                let window_start = range.end.0.saturating_sub(dur);
                if now.0 >= window_start {
                    let denom = dur.saturating_sub(1);
                    let t = if denom == 0 {
                        1.0
                    } else {
                        (now.0 - window_start) as f64 / denom as f64
                    };
                    w *= (1.0 - win.ease.apply(t)).clamp(0.0, 1.0);
                }
            }
        }
        w
    }

    /// Structural invariants checked when a span is registered.
    pub fn validate(&self) -> MarionetteResult<()> {
        if !self.blend_weight.is_finite() || self.blend_weight <= 0.0 {
            return Err(MarionetteError::validation(format!(
                "span of clip '{}' blend_weight must be finite and > 0",
                self.view.id()
            )));
        }
        if let Some(end) = self.truncated_end {
            if end == 0 {
                return Err(MarionetteError::validation(format!(
                    "span of clip '{}' truncated to zero frames",
                    self.view.id()
                )));
            }
            if end > self.view.duration_frames() {
                return Err(MarionetteError::validation(format!(
                    "span of clip '{}' truncated_end {} exceeds clip duration {}",
                    self.view.id(),
                    end,
                    self.view.duration_frames()
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "../../tests/unit/timeline/span.rs"]
mod tests;
