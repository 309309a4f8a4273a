//! The process break, moved with `sbrk(2)`.

use std::ptr::NonNull;

use libc::{c_void, intptr_t, sbrk};
use log::{trace, warn};

use super::MemorySource;

/// Grows the heap by moving the program break.
///
/// ```text
///   High Address ┌─────────────────────┐
///                │       Stack         │ ↓ grows down
///                │                     │
///                │       Heap          │ ↑ grows up (sbrk)
///                ├─────────────────────┤ ← Program Break
///                │   Data / BSS        │
///   Low Address  └─────────────────────┘
/// ```
///
/// The break is process wide: other code (the platform allocator, another
/// `ProgramBreak`) may move it between two calls. The heap copes by starting
/// a new segment whenever a region does not follow the previous one.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProgramBreak;

impl ProgramBreak {
  pub const fn new() -> Self {
    Self
  }

  /// Current position of the break.
  pub fn current() -> *mut u8 {
    unsafe { sbrk(0) }.cast()
  }
}

unsafe impl MemorySource for ProgramBreak {
  fn extend(
    &mut self,
    size: usize,
  ) -> Option<NonNull<u8>> {
    let current = Self::current() as usize;
    let padding = align!(current) - current;

    let Some(increment) = size
      .checked_add(padding)
      .and_then(|total| intptr_t::try_from(total).ok())
    else {
      warn!("sbrk: cannot express an increment of {size} + {padding} bytes");
      return None;
    };

    let address = unsafe { sbrk(increment) };

    if address == usize::MAX as *mut c_void {
      warn!("sbrk: the system refused {increment} bytes");
      return None;
    }

    // The break may have moved between the two calls, in which case the
    // padding computed up front may no longer be enough.
    let needed = align!(address as usize) - address as usize;

    if needed > padding {
      warn!("sbrk: break moved under us, {increment} bytes at {address:?} cannot be aligned");
      return None;
    }

    let start = unsafe { address.cast::<u8>().add(needed) };

    trace!("sbrk: {increment} bytes at {address:?}, region starts at {start:?}");

    NonNull::new(start)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  // Moving the break is covered by `tests/program_break.rs`, where tests run
  // serially.
  #[test]
  fn test_current_is_readable() {
    let current = ProgramBreak::current();

    assert!(!current.is_null());
    assert!(align!(current as usize) - (current as usize) < crate::ALIGNMENT);
  }
}
