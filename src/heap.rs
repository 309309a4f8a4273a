use std::{
  iter,
  marker::PhantomData,
  ptr::{self, NonNull},
};

use log::{debug, trace, warn};

use crate::{
  align::is_aligned,
  block::{BlockPtr, SPLIT_THRESHOLD, span},
  error::{AllocError, Corruption},
  source::MemorySource,
};

mod resize;

/// A first-fit heap over a growable memory source.
///
/// Blocks are threaded through the managed region in address order:
///
/// ```text
///   head
///    │
///    ▼
///   ┌────┬─────────┬─┐ ┌────┬────────┬─┐ ┌────┬──────────────┬─┐
///   │ H  │  used   │F│→│ H  │  free  │F│→│ H  │     used     │F│→ None
///   └────┴─────────┴─┘ └────┴────────┴─┘ └────┴──────────────┴─┘
/// ```
///
/// Freed blocks are merged with their free neighbours straight away, so no
/// two physically adjacent blocks are ever both free. The heap only grows;
/// memory is never handed back to the source.
///
/// A `Heap` is not synchronized. Share one between threads by wrapping it in
/// a lock held for the whole of each call.
#[derive(Debug)]
pub struct Heap<S: MemorySource> {
  source: S,
  head: Option<BlockPtr>,
}

// The heap exclusively owns every block reachable from `head`.
unsafe impl<S: MemorySource + Send> Send for Heap<S> {}

/// A block as seen from outside the heap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockInfo {
  /// Start of the payload, the pointer a caller holds for a used block.
  pub payload: NonNull<u8>,
  /// Payload capacity in bytes.
  pub size: usize,
  pub is_free: bool,
}

/// Summary of the directory.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HeapStats {
  pub blocks: usize,
  pub free_blocks: usize,
  /// Payload bytes of used blocks.
  pub used_bytes: usize,
  /// Payload bytes of free blocks.
  pub free_bytes: usize,
  /// Bytes obtained from the memory source, bookkeeping included.
  pub footprint: usize,
}

impl<S: MemorySource> Heap<S> {
  pub const fn new(source: S) -> Self {
    Self { source, head: None }
  }

  pub fn source(&self) -> &S {
    &self.source
  }

  /// Allocates `size` bytes aligned on [`ALIGNMENT`](crate::ALIGNMENT).
  ///
  /// Returns `Ok(None)` when `size` is 0, without touching the heap.
  pub fn try_allocate(
    &mut self,
    size: usize,
  ) -> Result<Option<NonNull<u8>>, AllocError> {
    if size == 0 {
      return Ok(None);
    }

    let block = self.place(aligned_size(size)?)?;

    Ok(Some(block.payload()))
  }

  /// Allocates `size` bytes aligned on [`ALIGNMENT`](crate::ALIGNMENT).
  ///
  /// Returns null when `size` is 0 or memory is exhausted.
  pub fn allocate(
    &mut self,
    size: usize,
  ) -> *mut u8 {
    into_raw(self.try_allocate(size))
  }

  /// Allocates a zero filled array of `count` elements of `size` bytes.
  ///
  /// Returns null when the total is 0, overflows, or memory is exhausted.
  pub fn allocate_zeroed(
    &mut self,
    count: usize,
    size: usize,
  ) -> *mut u8 {
    let Some(total) = count.checked_mul(size) else {
      warn!("allocate_zeroed: {count} x {size} bytes overflows");
      return ptr::null_mut();
    };

    let pointer = self.allocate(total);

    if !pointer.is_null() {
      unsafe { pointer.write_bytes(0, total) };
    }

    pointer
  }

  /// Returns the memory behind `pointer` to the heap.
  ///
  /// Null is ignored.
  ///
  /// # Safety
  ///
  /// A non null `pointer` was returned by this heap and not released since.
  pub unsafe fn release(
    &mut self,
    pointer: *mut u8,
  ) {
    let Some(payload) = NonNull::new(pointer) else {
      return;
    };

    let block = unsafe { BlockPtr::from_payload(payload) };
    debug_assert!(!block.is_free(), "double release of {pointer:?}");

    trace!("release: {block:?}");

    block.set_free(true);

    let block = self.coalesce_backward(block);
    self.coalesce_forward(block);
  }

  /// Payload capacity behind `pointer`, at least what was requested.
  ///
  /// Returns 0 for null.
  ///
  /// # Safety
  ///
  /// A non null `pointer` was returned by this heap and not released since.
  pub unsafe fn usable_size(
    &self,
    pointer: *mut u8,
  ) -> usize {
    match NonNull::new(pointer) {
      None => 0,
      Some(payload) => unsafe { BlockPtr::from_payload(payload) }.size(),
    }
  }

  /// Walks the directory in address order.
  pub fn blocks(&self) -> Blocks<'_> {
    Blocks {
      current: self.head,
      _heap: PhantomData,
    }
  }

  pub fn stats(&self) -> HeapStats {
    self.iter().fold(HeapStats::default(), |mut stats, block| {
      stats.blocks += 1;
      stats.footprint += span(block.size());

      if block.is_free() {
        stats.free_blocks += 1;
        stats.free_bytes += block.size();
      } else {
        stats.used_bytes += block.size();
      }

      stats
    })
  }

  /// Checks the directory against the heap invariants.
  ///
  /// Reports the first broken one. Meant for tests and diagnostics: misuse
  /// such as a double release corrupts the heap before it can be caught.
  pub fn validate(&self) -> Result<(), Corruption> {
    let mut previous: Option<BlockPtr> = None;

    for block in self.iter() {
      let address = block.address();

      if !is_aligned(address) {
        return Err(Corruption::Misaligned { block: address });
      }

      if block.size() == 0 || !is_aligned(block.size()) {
        return Err(Corruption::BadSize {
          block: address,
          size: block.size(),
        });
      }

      if block.footer() != block.size() {
        return Err(Corruption::FooterMismatch {
          block: address,
          size: block.size(),
          footer: block.footer(),
        });
      }

      match previous {
        None if !block.is_segment_start() => {
          return Err(Corruption::SegmentFlag { block: address });
        }
        None => {}
        Some(previous) => check_neighbours(previous, block)?,
      }

      previous = Some(block);
    }

    Ok(())
  }

  fn iter(&self) -> impl Iterator<Item = BlockPtr> + '_ {
    iter::successors(self.head, |block| block.next())
  }

  /// Finds or creates a used block of exactly or a little over `size` bytes.
  fn place(
    &mut self,
    size: usize,
  ) -> Result<BlockPtr, AllocError> {
    let Some(block) = self.find_free_block(size) else {
      return self.request_block(size);
    };

    trace!("first fit: {block:?} for {size} bytes");

    self.split(block, size);
    block.set_free(false);

    Ok(block)
  }

  fn find_free_block(
    &self,
    size: usize,
  ) -> Option<BlockPtr> {
    self
      .iter()
      .find(|block| block.is_free() && block.size() >= size)
  }

  /// Appends a fresh used block at the tail of the directory.
  fn request_block(
    &mut self,
    size: usize,
  ) -> Result<BlockPtr, AllocError> {
    let requested = span(size);

    let Some(start) = self.source.extend(requested) else {
      warn!("out of memory: the source refused {requested} bytes");
      return Err(AllocError::OutOfMemory { requested });
    };

    let tail = self.iter().last();
    let segment_start = tail.is_none_or(|tail| tail.end() != start.as_ptr() as usize);

    let block = unsafe { BlockPtr::initialize(start, size, None, false, segment_start) };

    match tail {
      None => self.head = Some(block),
      Some(tail) => tail.set_next(Some(block)),
    }

    if segment_start {
      debug!("grow: {requested} bytes at {start:?}, new segment");
    } else {
      debug!("grow: {requested} bytes at {start:?}");
    }

    Ok(block)
  }

  /// Cuts `block` down to `size` bytes if the rest can stand on its own as
  /// a free block, linked right after.
  ///
  /// Returns whether a split happened.
  fn split(
    &mut self,
    block: BlockPtr,
    size: usize,
  ) -> bool {
    if block.size() < size + SPLIT_THRESHOLD {
      return false;
    }

    let remainder = block.size() - span(size);
    let at = block.tail(size);

    let tail = unsafe { BlockPtr::initialize(at, remainder, block.next(), true, false) };

    block.set_size(size);
    block.set_next(Some(tail));
    block.write_footer();

    trace!("split: {block:?} and {tail:?}");

    true
  }

  /// Merges a free block into its physical predecessor if that one is free.
  ///
  /// Returns the block now holding the freed bytes.
  fn coalesce_backward(
    &mut self,
    block: BlockPtr,
  ) -> BlockPtr {
    if block.is_segment_start() {
      return block;
    }

    let previous = unsafe { block.predecessor() };

    if !previous.is_free() {
      return block;
    }

    debug_assert_eq!(previous.next(), Some(block));

    previous.absorb_next();
    previous.write_footer();

    trace!("coalesce backward: {previous:?}");

    previous
  }

  /// Absorbs every free block physically following `block`.
  fn coalesce_forward(
    &mut self,
    block: BlockPtr,
  ) {
    while let Some(next) = block.next() {
      if !next.is_free() || next.is_segment_start() {
        break;
      }

      block.absorb_next();
      trace!("coalesce forward: {block:?}");
    }

    block.write_footer();
  }
}

impl<S: MemorySource + Default> Default for Heap<S> {
  fn default() -> Self {
    Self::new(S::default())
  }
}

/// Iterator over the blocks of a [`Heap`], in address order.
#[derive(Debug)]
pub struct Blocks<'a> {
  current: Option<BlockPtr>,
  _heap: PhantomData<&'a ()>,
}

impl Iterator for Blocks<'_> {
  type Item = BlockInfo;

  fn next(&mut self) -> Option<BlockInfo> {
    let block = self.current?;
    self.current = block.next();

    Some(BlockInfo {
      payload: block.payload(),
      size: block.size(),
      is_free: block.is_free(),
    })
  }
}

/// Rounds a request up to [`ALIGNMENT`](crate::ALIGNMENT), refusing sizes
/// no source could ever satisfy.
fn aligned_size(size: usize) -> Result<usize, AllocError> {
  if size > usize::MAX - SPLIT_THRESHOLD {
    warn!("out of memory: {size} bytes cannot be addressed");
    return Err(AllocError::OutOfMemory { requested: size });
  }

  Ok(align!(size))
}

fn check_neighbours(
  previous: BlockPtr,
  block: BlockPtr,
) -> Result<(), Corruption> {
  let address = block.address();

  if block.is_segment_start() {
    if address < previous.end() {
      return Err(Corruption::OutOfOrder {
        block: address,
        previous: previous.address(),
      });
    }

    if address == previous.end() {
      return Err(Corruption::SegmentFlag { block: address });
    }

    return Ok(());
  }

  if address != previous.end() {
    return Err(Corruption::Gap {
      block: address,
      expected: previous.end(),
    });
  }

  if previous.is_free() && block.is_free() {
    return Err(Corruption::UncoalescedNeighbours {
      first: previous.address(),
      second: address,
    });
  }

  Ok(())
}

fn into_raw(result: Result<Option<NonNull<u8>>, AllocError>) -> *mut u8 {
  match result {
    Ok(Some(pointer)) => pointer.as_ptr(),
    Ok(None) | Err(_) => ptr::null_mut(),
  }
}
