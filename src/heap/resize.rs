//! Growing and shrinking live allocations.
//!
//! In order of preference:
//!
//! ```text
//!   shrink        ┌─────┬──────────┬───────────┐   ┌─────┬────┬─────────────┐
//!                 │  H  │ payload  │  excess   │ → │  H  │ pl │ free block  │
//!                 └─────┴──────────┴───────────┘   └─────┴────┴─────────────┘
//!
//!   grow in place ┌─────┬──────────┐┌─────┬──────┐   ┌─────┬─────────────────┐
//!                 │  H  │ payload  ││  H  │ free │ → │  H  │     payload     │
//!                 └─────┴──────────┘└─────┴──────┘   └─────┴─────────────────┘
//!
//!   move          allocate elsewhere, copy, release the old block
//! ```

use std::ptr::{self, NonNull};

use log::trace;

use super::{Heap, aligned_size, into_raw};
use crate::{
  block::{BlockPtr, span},
  error::AllocError,
  source::MemorySource,
};

impl<S: MemorySource> Heap<S> {
  /// Resizes the allocation behind `pointer` to `size` bytes, preserving its
  /// contents up to the smaller of both sizes.
  ///
  /// - A null `pointer` behaves as [`Heap::try_allocate`].
  /// - A `size` of 0 releases `pointer` and returns `Ok(None)`.
  /// - On error, the original allocation is left as it was.
  ///
  /// The returned pointer equals `pointer` whenever the block could be
  /// resized in place.
  ///
  /// # Safety
  ///
  /// A non null `pointer` was returned by this heap and not released since.
  pub unsafe fn try_reallocate(
    &mut self,
    pointer: *mut u8,
    size: usize,
  ) -> Result<Option<NonNull<u8>>, AllocError> {
    let Some(payload) = NonNull::new(pointer) else {
      return self.try_allocate(size);
    };

    if size == 0 {
      unsafe { self.release(pointer) };
      return Ok(None);
    }

    let block = unsafe { BlockPtr::from_payload(payload) };
    let size = aligned_size(size)?;

    if size <= block.size() {
      self.shrink(block, size);
      return Ok(Some(payload));
    }

    if self.grow_in_place(block, size) {
      return Ok(Some(payload));
    }

    let moved = self.place(size)?;

    unsafe {
      ptr::copy_nonoverlapping(
        payload.as_ptr(),
        moved.payload().as_ptr(),
        block.size().min(size),
      );
      self.release(pointer);
    }

    trace!("reallocate: moved {pointer:?} to {moved:?}");

    Ok(Some(moved.payload()))
  }

  /// Resizes the allocation behind `pointer` to `size` bytes.
  ///
  /// Returns null when `size` is 0 (`pointer` is then released) or when
  /// memory is exhausted (`pointer` is then still valid).
  ///
  /// # Safety
  ///
  /// A non null `pointer` was returned by this heap and not released since.
  pub unsafe fn reallocate(
    &mut self,
    pointer: *mut u8,
    size: usize,
  ) -> *mut u8 {
    into_raw(unsafe { self.try_reallocate(pointer, size) })
  }

  /// Gives the excess of a used block back to the heap, if there is enough
  /// of it to form a block.
  fn shrink(
    &mut self,
    block: BlockPtr,
    size: usize,
  ) {
    if !self.split(block, size) {
      return;
    }

    if let Some(tail) = block.next() {
      self.coalesce_forward(tail);
    }

    trace!("reallocate: shrunk {block:?} in place");
  }

  /// Extends a used block over its free physical successor.
  ///
  /// Returns `false`, changing nothing, if the successor is used, missing,
  /// or too small.
  fn grow_in_place(
    &mut self,
    block: BlockPtr,
    size: usize,
  ) -> bool {
    let Some(next) = block.next() else {
      return false;
    };

    if !next.is_free() || next.is_segment_start() {
      return false;
    }

    if block.size() + span(next.size()) < size {
      return false;
    }

    block.absorb_next();
    block.write_footer();
    self.split(block, size);

    trace!("reallocate: grew {block:?} in place");

    true
  }
}
