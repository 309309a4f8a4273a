//! A fixed capacity buffer standing in for the process break.

use std::{
  alloc::{self, Layout},
  ptr::NonNull,
};

use log::trace;

use super::MemorySource;
use crate::align::ALIGNMENT;

/// A private, bounded region handed out front to back.
///
/// Lets several heaps coexist in one process, and makes addresses and
/// exhaustion deterministic in tests. The buffer is released when the arena
/// is dropped, so every pointer obtained from a heap over it dies with it.
#[derive(Debug)]
pub struct Arena {
  base: NonNull<u8>,
  capacity: usize,
  used: usize,
  calls: usize,
}

// The arena exclusively owns its buffer.
unsafe impl Send for Arena {}

impl Arena {
  /// Reserves `capacity` bytes, rounded up to [`ALIGNMENT`].
  pub fn with_capacity(capacity: usize) -> Self {
    let capacity = align!(capacity);

    let base = match Self::layout(capacity) {
      None => NonNull::<u128>::dangling().cast(),
      Some(layout) => {
        let pointer = unsafe { alloc::alloc(layout) };
        NonNull::new(pointer).unwrap_or_else(|| alloc::handle_alloc_error(layout))
      }
    };

    Self {
      base,
      capacity,
      used: 0,
      calls: 0,
    }
  }

  pub fn capacity(&self) -> usize {
    self.capacity
  }

  /// Bytes handed out so far, skipped bytes included.
  pub fn used(&self) -> usize {
    self.used
  }

  pub fn remaining(&self) -> usize {
    self.capacity - self.used
  }

  /// Number of times `extend` was called, successful or not.
  pub fn calls(&self) -> usize {
    self.calls
  }

  /// Whether `pointer` lies within the buffer.
  pub fn contains(
    &self,
    pointer: *const u8,
  ) -> bool {
    let start = self.base.as_ptr() as usize;
    let address = pointer as usize;

    address >= start && address < start + self.capacity
  }

  /// Burns `bytes` (rounded up to [`ALIGNMENT`]) without handing them out,
  /// the way foreign code moving the break leaves a hole in the heap.
  ///
  /// Returns `false`, skipping nothing, if not enough bytes remain.
  pub fn skip(
    &mut self,
    bytes: usize,
  ) -> bool {
    let bytes = align!(bytes);

    if bytes > self.remaining() {
      return false;
    }

    self.used += bytes;
    true
  }

  fn layout(capacity: usize) -> Option<Layout> {
    if capacity == 0 {
      return None;
    }

    Layout::from_size_align(capacity, ALIGNMENT).ok()
  }
}

unsafe impl MemorySource for Arena {
  fn extend(
    &mut self,
    size: usize,
  ) -> Option<NonNull<u8>> {
    self.calls += 1;

    if size > self.remaining() {
      trace!("arena: {size} bytes requested, {} remaining", self.remaining());
      return None;
    }

    let start = unsafe { self.base.add(self.used) };
    self.used += size;

    Some(start)
  }
}

impl Drop for Arena {
  fn drop(&mut self) {
    if let Some(layout) = Self::layout(self.capacity) {
      unsafe { alloc::dealloc(self.base.as_ptr(), layout) };
    }
  }
}
