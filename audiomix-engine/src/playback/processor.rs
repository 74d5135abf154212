//! Per-stream signal processors
//!
//! Processors run on the device thread, in registration order, over the span
//! of samples a stream produced in one mixing pass (before volume and pan).

use crate::audio::Sample;
use parking_lot::Mutex;
use std::sync::Arc;

/// Signal processor
pub trait Processor<S: Sample>: Send {
    /// Write processed `src` into `dst`. Both slices have the same length.
    fn process(&mut self, dst: &mut [S], src: &[S]);
}

/// Processor shared between the application and a stream
pub type SharedProcessor<S> = Arc<Mutex<dyn Processor<S>>>;

/// Identity comparison ignoring vtable pointers
pub(crate) fn same_processor<S: Sample>(a: &SharedProcessor<S>, b: &SharedProcessor<S>) -> bool {
    std::ptr::eq(
        Arc::as_ptr(a) as *const (),
        Arc::as_ptr(b) as *const (),
    )
}
