//! Gain curves for stream fades
//!
//! A curve maps normalized fade progress `t` in `[0, 1]` to a gain. Fade-out
//! gains mirror the fade-in gains: `out(t) = in(1 - t)`.

use crate::error::Error;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Shape of the gain ramp
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FadeCurve {
    /// g(t) = t
    Linear,

    /// g(t) = t³
    #[default]
    Cubic,

    /// g(t) = 0.5 × (1 - cos(π × t))
    SCurve,
}

/// Which way the gain moves
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FadeDirection {
    /// Silence to full volume
    In,
    /// Full volume to silence
    Out,
}

impl FadeCurve {
    /// Gain at `position` through a fade. Positions outside `[0, 1]` are clamped.
    pub fn gain(&self, direction: FadeDirection, position: f32) -> f32 {
        let t = position.clamp(0.0, 1.0);
        match direction {
            FadeDirection::In => self.ramp(t),
            FadeDirection::Out => self.ramp(1.0 - t),
        }
    }

    fn ramp(&self, t: f32) -> f32 {
        match self {
            FadeCurve::Linear => t,
            FadeCurve::Cubic => t * t * t,
            FadeCurve::SCurve => 0.5 * (1.0 - (std::f32::consts::PI * t).cos()),
        }
    }

    /// Name used in config files
    pub fn name(&self) -> &'static str {
        match self {
            FadeCurve::Linear => "linear",
            FadeCurve::Cubic => "cubic",
            FadeCurve::SCurve => "scurve",
        }
    }
}

impl FromStr for FadeCurve {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "linear" => Ok(FadeCurve::Linear),
            "cubic" => Ok(FadeCurve::Cubic),
            "scurve" | "s-curve" | "cosine" => Ok(FadeCurve::SCurve),
            other => Err(Error::InvalidInput(format!("unknown fade curve '{}'", other))),
        }
    }
}

impl fmt::Display for FadeCurve {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
