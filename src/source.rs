//! Where the heap gets its memory from.
//!
//! The heap never returns memory: a source only ever grows. Abstracting it
//! lets the same engine run on the process break or on a private buffer.

mod arena;
mod program_break;

use std::ptr::NonNull;

pub use arena::Arena;
pub use program_break::ProgramBreak;

/// A growable region of memory.
///
/// # Safety
///
/// When `extend(size)` returns `Some(start)`:
/// - `start` is aligned on [`ALIGNMENT`](crate::ALIGNMENT).
/// - the `size` bytes starting at `start` are readable, writable, and used by
///   nothing else for as long as the source lives.
/// - `start` is greater than the end of every region previously handed out.
pub unsafe trait MemorySource {
  /// Grows the region by exactly `size` bytes and returns the start of the
  /// new bytes, or `None` if no more memory is available.
  ///
  /// `size` is never 0 and always a multiple of
  /// [`ALIGNMENT`](crate::ALIGNMENT). A failed call must leave no trace.
  fn extend(
    &mut self,
    size: usize,
  ) -> Option<NonNull<u8>>;
}

unsafe impl<S: MemorySource + ?Sized> MemorySource for &mut S {
  fn extend(
    &mut self,
    size: usize,
  ) -> Option<NonNull<u8>> {
    (**self).extend(size)
  }
}
