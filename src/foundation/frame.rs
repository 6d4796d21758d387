use crate::foundation::error::{MarionetteError, MarionetteResult};

/// Absolute position on the render-sampled global timeline, in frames.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
pub struct FrameIndex(pub u64);

impl FrameIndex {
    /// Advance by `frames`, saturating at the numeric ceiling.
    pub fn advance(self, frames: u64) -> Self {
        Self(self.0.saturating_add(frames))
    }

    /// Frames elapsed since `earlier`, clamping to zero if `earlier` is ahead.
    pub fn since(self, earlier: FrameIndex) -> u64 {
        self.0.saturating_sub(earlier.0)
    }
}

/// Half-open frame interval `[start, end)` on the global timeline.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct FrameRange {
    /// First covered frame.
    pub start: FrameIndex,
    /// One past the last covered frame.
    pub end: FrameIndex, // exclusive
}

impl FrameRange {
    /// Build a range, rejecting inverted bounds.
    pub fn new(start: FrameIndex, end: FrameIndex) -> MarionetteResult<Self> {
        if start.0 > end.0 {
            return Err(MarionetteError::validation("FrameRange start must be <= end"));
        }
        Ok(Self { start, end })
    }

    /// Covered length in frames.
    pub fn len_frames(self) -> u64 {
        self.end.0.saturating_sub(self.start.0)
    }

    /// Whether the range covers no frames at all.
    pub fn is_empty(self) -> bool {
        self.start.0 == self.end.0
    }

    /// Whether frame `f` falls inside the half-open interval.
    pub fn contains(self, f: FrameIndex) -> bool {
        self.start.0 <= f.0 && f.0 < self.end.0
    }
}

/// Timeline frame rate as an exact rational.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Fps {
    /// Numerator.
    pub num: u32,
    /// Denominator.
    pub den: u32, // must be > 0
}

impl Fps {
    /// Build a frame rate, rejecting zero terms.
    pub fn new(num: u32, den: u32) -> MarionetteResult<Self> {
        if den == 0 {
            return Err(MarionetteError::validation("Fps den must be > 0"));
        }
        if num == 0 {
            return Err(MarionetteError::validation("Fps num must be > 0"));
        }
        Ok(Self { num, den })
    }

    /// Frames per second as a float.
    pub fn as_f64(self) -> f64 {
        f64::from(self.num) / f64::from(self.den)
    }

    /// Duration of one frame in seconds.
    pub fn frame_duration_secs(self) -> f64 {
        f64::from(self.den) / f64::from(self.num)
    }

    /// Convert a frame count to seconds.
    pub fn frames_to_secs(self, frames: u64) -> f64 {
        (frames as f64) * self.frame_duration_secs()
    }

    /// Convert seconds to whole frames, flooring and clamping at zero.
    pub fn secs_to_frames_floor(self, secs: f64) -> u64 {
        (secs * self.as_f64()).floor().max(0.0) as u64
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/frame.rs"]
mod tests;
