//! # tagalloc - A Boundary Tag Memory Allocator
//!
//! This crate provides a general purpose `malloc`/`free`/`realloc`
//! replacement built on a single, upward growing region of memory, by default
//! the process break moved with `sbrk(2)`.
//!
//! ## Overview
//!
//! Every allocation lives in a block carrying its own metadata. Blocks are
//! chained in address order, and each one repeats its size at its end (the
//! boundary tag) so the block after it can find it:
//!
//! ```text
//!   ┌──────────────────────────────────────────────────────────────────────┐
//!   │                         HEAP MEMORY                                  │
//!   │                                                                      │
//!   │   ┌───┬──────┬──┬───┬────────────┬──┬───┬─────┬──┐                   │
//!   │   │ H │  A1  │F │ H │    free    │F │ H │ A2  │F │                   │
//!   │   └───┴──────┴──┴───┴────────────┴──┴───┴─────┴──┘                   │
//!   │     │           ▲ │                   │                        ▲     │
//!   │     └── next ───┼─┴──────── next ─────┘                        │     │
//!   │                 │                                         Program    │
//!   │   footer: copy of the size of A1, lets the next block     Break      │
//!   │   step back to A1 without a back pointer                             │
//!   └──────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! - **Allocation** scans the chain for the first free block large enough,
//!   splitting off what is not needed. If none fits, the heap grows by one
//!   block at the tail.
//! - **Release** merges the freed block with a free predecessor (found through
//!   its footer) and with every free successor, so no two neighbours are ever
//!   both free.
//! - **Reallocation** shrinks in place, grows in place over a free successor,
//!   or moves the payload as a last resort.
//!
//! ## Crate Structure
//!
//! ```text
//!   tagalloc
//!   ├── align      - ALIGNMENT and the alignment macros (align!, align_to!)
//!   ├── block      - Block metadata and address arithmetic (internal)
//!   ├── error      - AllocError, Corruption
//!   ├── heap       - Heap: first fit placement, coalescing, resizing
//!   └── source     - MemorySource, with ProgramBreak and Arena
//! ```
//!
//! ## Quick Start
//!
//! ```rust
//! use tagalloc::{ALIGNMENT, Arena, Heap};
//!
//! let mut heap = Heap::new(Arena::with_capacity(4096));
//!
//! let pointer = heap.allocate(5 * std::mem::size_of::<u32>()) as *mut u32;
//! assert!(!pointer.is_null());
//! assert_eq!(pointer as usize % ALIGNMENT, 0);
//!
//! unsafe {
//!     for i in 0..5 {
//!         pointer.add(i).write(i as u32 * 10);
//!     }
//!
//!     let pointer = heap.reallocate(pointer.cast(), 64) as *mut u32;
//!     assert_eq!(pointer.add(4).read(), 40);
//!
//!     heap.release(pointer.cast());
//! }
//! ```
//!
//! ## Limitations
//!
//! - **Single-threaded only**: a [`Heap`] has no synchronization; wrap it in a
//!   lock held across each call to share it.
//! - **Grow only**: memory is never handed back to the operating system.
//! - **Linear search**: allocation is O(number of blocks).
//! - **Unix-only**: [`ProgramBreak`] requires `libc` and `sbrk`.
//!
//! ## Safety
//!
//! Allocation is safe; releasing and reallocating take raw pointers and are
//! `unsafe`. Releasing a pointer twice, or one not obtained from the same
//! heap, is undefined behaviour and is not detected.

#[macro_use]
pub mod align;
mod block;
mod error;
mod heap;
mod source;

pub use align::ALIGNMENT;
pub use error::{AllocError, Corruption};
pub use heap::{BlockInfo, Blocks, Heap, HeapStats};
pub use source::{Arena, MemorySource, ProgramBreak};
