//! Stream fade state
//!
//! Fades are timed against the mixer's millisecond clock and evaluated once per
//! mixing pass. The gain follows the mixer's [`FadeCurve`] (cubic by default):
//! fade-in rises from 0.0 to 1.0, fade-out falls from 1.0 to 0.0.

use audiomix_common::{FadeCurve, FadeDirection};

#[derive(Debug, Clone, Copy, PartialEq)]
enum FadeState {
    Idle,
    In { start: i64, duration: i64 },
    Out { start: i64, duration: i64, stop_after: bool },
}

/// What a completed fade asks the stream to do
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FadeEvent {
    None,
    /// Fade-out finished and the stream should stop
    Stop,
    /// Fade-out finished and the stream should pause
    Pause,
}

/// Fade gain tracker for one stream
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct Fader {
    state: FadeState,
    gain: f32,
}

impl Fader {
    pub(crate) fn new() -> Self {
        Self {
            state: FadeState::Idle,
            gain: 1.0,
        }
    }

    /// Start fading in from silence at tick `now`.
    pub(crate) fn fade_in(&mut self, now: i64, duration_ms: i64) {
        self.gain = 0.0;
        self.state = FadeState::In {
            start: now,
            duration: duration_ms,
        };
    }

    /// Start fading out at tick `now`.
    pub(crate) fn fade_out(&mut self, now: i64, duration_ms: i64, stop_after: bool) {
        self.state = FadeState::Out {
            start: now,
            duration: duration_ms,
            stop_after,
        };
    }

    /// Cancel any fade and return to full gain.
    pub(crate) fn reset(&mut self) {
        self.state = FadeState::Idle;
        self.gain = 1.0;
    }

    pub(crate) fn gain(&self) -> f32 {
        self.gain
    }

    /// Update the gain for tick `now`.
    pub(crate) fn process(&mut self, now: i64, curve: FadeCurve) -> FadeEvent {
        match self.state {
            FadeState::Idle => FadeEvent::None,
            FadeState::In { start, duration } => {
                let elapsed = now - start;
                if elapsed >= duration {
                    self.gain = 1.0;
                    self.state = FadeState::Idle;
                } else {
                    self.gain = curve.gain(FadeDirection::In, elapsed as f32 / duration as f32);
                }
                FadeEvent::None
            }
            FadeState::Out {
                start,
                duration,
                stop_after,
            } => {
                let elapsed = now - start;
                if elapsed >= duration {
                    self.gain = 0.0;
                    self.state = FadeState::Idle;
                    if stop_after {
                        FadeEvent::Stop
                    } else {
                        FadeEvent::Pause
                    }
                } else {
                    self.gain = curve.gain(FadeDirection::Out, elapsed as f32 / duration as f32);
                    FadeEvent::None
                }
            }
        }
    }
}

impl Default for Fader {
    fn default() -> Self {
        Self::new()
    }
}

/// Convert a fade duration to whole milliseconds
pub(crate) fn duration_ms(duration: std::time::Duration) -> i64 {
    duration.as_millis().min(i64::MAX as u128) as i64
}
