//! # audiomix common library
//!
//! Building blocks shared by the audiomix crates:
//! - Error and result types
//! - Configuration file discovery and TOML loading
//! - Fade curve definitions and calculations
//! - Millisecond tick clocks used to time fades and playback starts

pub mod config;
pub mod error;
pub mod fade_curves;
pub mod time;

pub use error::{Error, Result};
pub use fade_curves::{FadeCurve, FadeDirection};
pub use time::{Clock, ManualClock, SystemClock};
