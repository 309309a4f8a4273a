use thiserror::Error;

/// Failure of an allocation request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AllocError {
  /// The memory source refused to grow the heap.
  ///
  /// `requested` is the number of bytes asked of the source, header and
  /// footer included.
  #[error("out of memory: the memory source refused {requested} more bytes")]
  OutOfMemory { requested: usize },
}

/// A broken heap invariant, as reported by [`Heap::validate`](crate::Heap::validate).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Corruption {
  #[error("block at {block:#x} has size {size} but its footer holds {footer}")]
  FooterMismatch {
    block: usize,
    size: usize,
    footer: usize,
  },

  #[error("block at {block:#x} has a payload size {size} that is not a positive multiple of the alignment")]
  BadSize { block: usize, size: usize },

  #[error("block at {block:#x} is not aligned")]
  Misaligned { block: usize },

  #[error("block at {block:#x} follows its predecessor at {previous:#x} out of order or overlapping")]
  OutOfOrder { block: usize, previous: usize },

  #[error("block at {block:#x} does not start where its predecessor ends ({expected:#x})")]
  Gap { block: usize, expected: usize },

  #[error("blocks at {first:#x} and {second:#x} are adjacent and both free")]
  UncoalescedNeighbours { first: usize, second: usize },

  #[error("block at {block:#x} has a segment flag inconsistent with its position")]
  SegmentFlag { block: usize },
}
