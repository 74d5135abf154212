//! Sample buffers
//!
//! [`Buffer`] is an owned, resizable sample array. [`WindowedBuffer`] adds a
//! `[pos, end)` window of valid data on top of it, used by the resampler for its
//! input and output staging.
//!
//! Resizing only happens when a size change is detected; the steady-state
//! paths (window reads, writes, relocation) never allocate.

use crate::audio::Sample;
use std::ops::{Deref, DerefMut};

/// Owned, resizable sample array.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Buffer<S> {
    data: Vec<S>,
}

impl<S: Sample> Buffer<S> {
    /// Create a buffer of `len` silent samples.
    pub fn new(len: usize) -> Self {
        Self {
            data: vec![S::SILENCE; len],
        }
    }

    /// Discard the contents and make the buffer `len` silent samples long.
    pub fn reset(&mut self, len: usize) {
        self.data.clear();
        self.data.resize(len, S::SILENCE);
    }

    /// Change the length, keeping the existing prefix.
    ///
    /// Growing pads with silence, shrinking truncates.
    pub fn resize(&mut self, len: usize) {
        self.data.resize(len, S::SILENCE);
    }

    /// Exchange contents with `other`.
    pub fn swap(&mut self, other: &mut Buffer<S>) {
        std::mem::swap(&mut self.data, &mut other.data);
    }

    /// Overwrite every sample with silence.
    pub fn fill_silence(&mut self) {
        self.data.fill(S::SILENCE);
    }
}

impl<S> Deref for Buffer<S> {
    type Target = [S];

    fn deref(&self) -> &[S] {
        &self.data
    }
}

impl<S> DerefMut for Buffer<S> {
    fn deref_mut(&mut self) -> &mut [S] {
        &mut self.data
    }
}

impl<S> From<Vec<S>> for Buffer<S> {
    fn from(data: Vec<S>) -> Self {
        Self { data }
    }
}

/// Buffer with a `[pos, end)` window of valid samples.
///
/// Data is appended at `end` (see [`free_tail_mut`](Self::free_tail_mut) and
/// [`commit`](Self::commit)) and consumed from `pos`.
#[derive(Debug, Clone, Default)]
pub struct WindowedBuffer<S> {
    buf: Buffer<S>,
    pos: usize,
    end: usize,
}

impl<S: Sample> WindowedBuffer<S> {
    pub fn new(capacity: usize) -> Self {
        Self {
            buf: Buffer::new(capacity),
            pos: 0,
            end: 0,
        }
    }

    /// Total size of the underlying buffer
    pub fn capacity(&self) -> usize {
        self.buf.len()
    }

    pub fn pos(&self) -> usize {
        self.pos
    }

    pub fn end(&self) -> usize {
        self.end
    }

    /// Number of valid samples in the window
    pub fn available(&self) -> usize {
        self.end - self.pos
    }

    pub fn is_empty(&self) -> bool {
        self.pos >= self.end
    }

    /// Whether samples can still be appended at `end`
    pub fn has_free_tail(&self) -> bool {
        self.end < self.buf.len()
    }

    /// Valid samples
    pub fn readable(&self) -> &[S] {
        &self.buf[self.pos..self.end]
    }

    /// Unused space after `end`
    pub fn free_tail_mut(&mut self) -> &mut [S] {
        let end = self.end;
        &mut self.buf[end..]
    }

    /// Mark `count` samples at the front of the window as consumed.
    pub fn consume(&mut self, count: usize) {
        debug_assert!(self.pos + count <= self.end);
        self.pos = (self.pos + count).min(self.end);
        if self.pos >= self.end {
            self.clear();
        }
    }

    /// Mark `count` samples written into the free tail as valid.
    pub fn commit(&mut self, count: usize) {
        debug_assert!(self.end + count <= self.buf.len());
        self.end = (self.end + count).min(self.buf.len());
    }

    /// Empty the window.
    pub fn clear(&mut self) {
        self.pos = 0;
        self.end = 0;
    }

    /// Move the valid samples to the start of the buffer.
    ///
    /// Order is preserved. An exhausted window is reset to `[0, 0)`.
    pub fn relocate(&mut self) {
        if self.end == 0 {
            return;
        }
        if self.pos >= self.end {
            self.clear();
            return;
        }
        if self.pos == 0 {
            return;
        }
        self.buf.copy_within(self.pos..self.end, 0);
        self.end -= self.pos;
        self.pos = 0;
    }

    /// Discard everything and resize to `capacity`.
    pub fn reset(&mut self, capacity: usize) {
        self.buf.reset(capacity);
        self.clear();
    }

    /// Resize to `capacity`, keeping the valid samples (relocated to the front).
    ///
    /// The capacity never drops below the number of valid samples.
    pub fn resize_keeping(&mut self, capacity: usize) {
        self.relocate();
        let capacity = capacity.max(self.end);
        self.buf.resize(capacity);
    }
}
