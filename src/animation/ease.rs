use kurbo::{CubicBez, ParamCurve, Point};

/// Easing curve applied to a blend envelope.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum Ease {
    /// Identity mapping.
    Linear,
    /// Quadratic ease-in.
    InQuad,
    /// Quadratic ease-out.
    OutQuad,
    /// Quadratic ease-in-out.
    InOutQuad,
    /// Cubic ease-in.
    InCubic,
    /// Cubic ease-out.
    OutCubic,
    /// Cubic ease-in-out.
    InOutCubic,
    /// CSS-style cubic Bezier timing curve anchored at (0,0) and (1,1),
    /// with control points `(x1, y1)` and `(x2, y2)`. Control xs must lie
    /// in `[0, 1]` so progress stays single-valued.
    Bezier {
        /// First control point x.
        x1: f64,
        /// First control point y.
        y1: f64,
        /// Second control point x.
        x2: f64,
        /// Second control point y.
        y2: f64,
    },
}

impl Ease {
    /// Fixed S-curve used for clip crossfades and loop-boundary blends.
    pub const CROSSFADE: Ease = Ease::Bezier {
        x1: 0.25,
        y1: 0.10,
        x2: 0.75,
        y2: 0.90,
    };

    /// Map normalized progress `t` through the curve. `t` is clamped to `[0, 1]`.
    pub fn apply(self, t: f64) -> f64 {
        let t = t.clamp(0.0, 1.0);
        match self {
            Self::Linear => t,
            Self::InQuad => t * t,
            Self::OutQuad => 1.0 - (1.0 - t) * (1.0 - t),
            Self::InOutQuad => {
                if t < 0.5 {
                    2.0 * t * t
                } else {
                    1.0 - ((-2.0 * t + 2.0).powi(2) / 2.0)
                }
            }
            Self::InCubic => t * t * t,
            Self::OutCubic => 1.0 - (1.0 - t).powi(3),
            Self::InOutCubic => {
                if t < 0.5 {
                    4.0 * t * t * t
                } else {
                    1.0 - ((-2.0 * t + 2.0).powi(3) / 2.0)
                }
            }
            Self::Bezier { x1, y1, x2, y2 } => {
                if t == 0.0 {
                    return 0.0;
                }
                if t == 1.0 {
                    return 1.0;
                }
                let curve = CubicBez::new(
                    Point::ZERO,
                    Point::new(x1.clamp(0.0, 1.0), y1),
                    Point::new(x2.clamp(0.0, 1.0), y2),
                    Point::new(1.0, 1.0),
                );
                // x(s) is monotone for control xs in [0, 1]; invert by bisection.
                let (mut lo, mut hi) = (0.0f64, 1.0f64);
                for _ in 0..32 {
                    let mid = 0.5 * (lo + hi);
                    if curve.eval(mid).x < t {
                        lo = mid;
                    } else {
                        hi = mid;
                    }
                }
                curve.eval(0.5 * (lo + hi)).y.clamp(0.0, 1.0)
            }
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/animation/ease.rs"]
mod tests;
