//! In-band block metadata.
//!
//! Every block is laid out as:
//!
//! ```text
//!   ┌──────────────┬─────────────────────────────┬────────────┐
//!   │    header    │           payload           │   footer   │
//!   │ HEADER_SIZE  │         size bytes          │FOOTER_SIZE │
//!   └──────────────┴─────────────────────────────┴────────────┘
//!                  ▲                                          ▲
//!                  └── pointer handed to callers              └── end / next header
//! ```
//!
//! The footer repeats `size`, so the block right after can find this one
//! without a back pointer. All of the address arithmetic of the crate lives
//! in this module; the heap only talks to blocks through [`BlockPtr`].

use std::{
  fmt, mem,
  ptr::{self, NonNull},
};

use crate::align::ALIGNMENT;

/// Header stored in front of every payload.
#[repr(C)]
pub(crate) struct Block {
  /// Payload capacity, a multiple of `ALIGNMENT`.
  pub size: usize,
  /// The following block in the directory.
  pub next: Option<BlockPtr>,
  pub is_free: bool,
  /// Set when the memory right before this header does not belong to the
  /// heap (the first block, or a block obtained after the memory source
  /// handed out a non contiguous region). Such a block has no predecessor
  /// footer to read.
  pub segment_start: bool,
}

impl Block {
  pub fn new(
    size: usize,
    next: Option<BlockPtr>,
    is_free: bool,
    segment_start: bool,
  ) -> Self {
    Self {
      size,
      next,
      is_free,
      segment_start,
    }
  }
}

/// Bytes reserved in front of a payload.
pub(crate) const HEADER_SIZE: usize = align!(mem::size_of::<Block>());

/// Bytes reserved behind a payload.
pub(crate) const FOOTER_SIZE: usize = align!(mem::size_of::<usize>());

/// Per block bookkeeping cost.
pub(crate) const OVERHEAD: usize = HEADER_SIZE + FOOTER_SIZE;

/// A block may only be split if what is left can stand on its own with at
/// least `ALIGNMENT` bytes of payload.
pub(crate) const SPLIT_THRESHOLD: usize = OVERHEAD + ALIGNMENT;

/// Number of bytes a block with a `size` byte payload spans.
pub(crate) const fn span(size: usize) -> usize {
  OVERHEAD + size
}

/// Handle to a constructed block.
///
/// A `BlockPtr` is only obtained through [`BlockPtr::initialize`] or
/// [`BlockPtr::from_payload`], and always refers to a block living in memory
/// owned by a heap. The accessors rely on this.
#[repr(transparent)]
#[derive(Clone, Copy, PartialEq, Eq)]
pub(crate) struct BlockPtr(NonNull<Block>);

impl BlockPtr {
  /// Constructs a block, header and footer, at `at`.
  ///
  /// # Safety
  ///
  /// - `at` is aligned on `ALIGNMENT`.
  /// - `span(size)` bytes starting at `at` are writable and not in use.
  /// - `size` is a multiple of `ALIGNMENT`.
  pub unsafe fn initialize(
    at: NonNull<u8>,
    size: usize,
    next: Option<BlockPtr>,
    is_free: bool,
    segment_start: bool,
  ) -> BlockPtr {
    debug_assert!(crate::align::is_aligned(at.as_ptr() as usize));
    debug_assert!(crate::align::is_aligned(size));

    let block = BlockPtr(at.cast());

    unsafe {
      ptr::write(
        block.0.as_ptr(),
        Block::new(size, next, is_free, segment_start),
      );
    }

    block.write_footer();
    block
  }

  /// Recovers the block owning a payload.
  ///
  /// # Safety
  ///
  /// `payload` was obtained from [`BlockPtr::payload`] of a block that has
  /// not been absorbed into a neighbour since.
  pub unsafe fn from_payload(payload: NonNull<u8>) -> BlockPtr {
    let header = unsafe { payload.as_ptr().sub(HEADER_SIZE) };

    BlockPtr(unsafe { NonNull::new_unchecked(header.cast()) })
  }

  pub fn address(self) -> usize {
    self.0.as_ptr() as usize
  }

  /// Address one past the footer, where a physically following block starts.
  pub fn end(self) -> usize {
    self.address() + span(self.size())
  }

  /// Returns whether `other` starts exactly where this block ends.
  pub fn is_followed_by(
    self,
    other: BlockPtr,
  ) -> bool {
    self.end() == other.address()
  }

  pub fn payload(self) -> NonNull<u8> {
    unsafe { self.bytes().add(HEADER_SIZE) }
  }

  pub fn size(self) -> usize {
    unsafe { (*self.0.as_ptr()).size }
  }

  /// Changes the recorded size. The footer is left alone, see
  /// [`BlockPtr::write_footer`].
  pub fn set_size(
    self,
    size: usize,
  ) {
    debug_assert!(crate::align::is_aligned(size));

    unsafe { (*self.0.as_ptr()).size = size }
  }

  pub fn is_free(self) -> bool {
    unsafe { (*self.0.as_ptr()).is_free }
  }

  pub fn set_free(
    self,
    is_free: bool,
  ) {
    unsafe { (*self.0.as_ptr()).is_free = is_free }
  }

  pub fn next(self) -> Option<BlockPtr> {
    unsafe { (*self.0.as_ptr()).next }
  }

  pub fn set_next(
    self,
    next: Option<BlockPtr>,
  ) {
    unsafe { (*self.0.as_ptr()).next = next }
  }

  pub fn is_segment_start(self) -> bool {
    unsafe { (*self.0.as_ptr()).segment_start }
  }

  /// Reads the size stored in the footer.
  pub fn footer(self) -> usize {
    unsafe { self.footer_slot().read() }
  }

  /// Copies the current size into the footer.
  pub fn write_footer(self) {
    let size = self.size();

    unsafe { self.footer_slot().write(size) }
  }

  /// Where a block would start if this one was cut down to `size` bytes.
  pub fn tail(
    self,
    size: usize,
  ) -> NonNull<u8> {
    debug_assert!(size <= self.size());

    unsafe { self.bytes().add(span(size)) }
  }

  /// Locates the block physically preceding this one through its footer.
  ///
  /// # Safety
  ///
  /// The block is not a segment start.
  pub unsafe fn predecessor(self) -> BlockPtr {
    debug_assert!(!self.is_segment_start());

    unsafe {
      let footer = self.bytes().sub(FOOTER_SIZE);
      let size = footer.cast::<usize>().read();

      BlockPtr(footer.sub(HEADER_SIZE + size).cast())
    }
  }

  /// Merges the directory successor into this block.
  ///
  /// The successor header becomes payload bytes. The footer is not
  /// rewritten, callers do so once they are done merging.
  pub fn absorb_next(self) {
    let Some(next) = self.next() else {
      return;
    };

    debug_assert!(self.is_followed_by(next));

    self.set_size(self.size() + span(next.size()));
    self.set_next(next.next());
  }

  fn bytes(self) -> NonNull<u8> {
    self.0.cast()
  }

  fn footer_slot(self) -> NonNull<usize> {
    unsafe { self.bytes().add(HEADER_SIZE + self.size()).cast() }
  }
}

impl fmt::Debug for BlockPtr {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>,
  ) -> fmt::Result {
    f.debug_struct("Block")
      .field("at", &self.0)
      .field("size", &self.size())
      .field("is_free", &self.is_free())
      .finish()
  }
}
