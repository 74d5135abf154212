//! Stream state machine and mixing

mod fade;
pub mod mixer;
pub mod processor;
pub mod stream;

pub use mixer::Mixer;
pub use processor::{Processor, SharedProcessor};
pub use stream::{PlaybackState, Stream, StreamCallback};
