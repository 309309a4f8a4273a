//! Heaps over the real process break.
//!
//! The break is process wide, hence every test runs serially.

use serial_test::serial;
use tagalloc::{ALIGNMENT, Heap, MemorySource, ProgramBreak};

#[test]
#[serial]
fn extend_moves_break() {
  let mut source = ProgramBreak::new();

  let start = source.extend(4 * ALIGNMENT).unwrap();

  assert_eq!(start.as_ptr() as usize % ALIGNMENT, 0);
  assert!(ProgramBreak::current() as usize >= start.as_ptr() as usize + 4 * ALIGNMENT);

  unsafe {
    start.as_ptr().write_bytes(0x5A, 4 * ALIGNMENT);
    assert_eq!(start.as_ptr().add(4 * ALIGNMENT - 1).read(), 0x5A);
  }
}

#[test]
#[serial]
fn allocate_release_reallocate() {
  let mut heap = Heap::new(ProgramBreak::new());

  let numbers = heap.allocate(5 * std::mem::size_of::<i32>()) as *mut i32;
  assert!(!numbers.is_null());
  assert_eq!(numbers as usize % ALIGNMENT, 0);

  unsafe {
    for i in 0..5 {
      numbers.add(i).write(i as i32 * 10);
    }

    let message = b"Hello custom allocator\0";
    let text = heap.allocate(32);
    text.copy_from_nonoverlapping(message.as_ptr(), message.len());

    let numbers = heap.reallocate(numbers.cast(), 1024) as *mut i32;
    assert!(!numbers.is_null());
    for i in 0..5 {
      assert_eq!(numbers.add(i).read(), i as i32 * 10);
    }

    assert_eq!(std::slice::from_raw_parts(text, message.len()), message);

    heap.release(text);
    heap.release(numbers.cast());
  }

  assert_eq!(heap.validate(), Ok(()));
  assert_eq!(heap.stats().used_bytes, 0);
}

#[test]
#[serial]
fn freed_blocks_are_reused_before_growing() {
  let mut heap = Heap::new(ProgramBreak::new());

  let a = heap.allocate(128);
  let _b = heap.allocate(128);
  unsafe { heap.release(a) };

  let before = ProgramBreak::current();
  let c = heap.allocate(64);

  assert_eq!(c, a);
  assert_eq!(ProgramBreak::current(), before);
}

#[test]
#[serial]
fn foreign_break_moves_start_segments() {
  let mut heap = Heap::new(ProgramBreak::new());
  let mut foreign = ProgramBreak::new();

  let a = heap.allocate(64);
  foreign.extend(ALIGNMENT).unwrap();
  let b = heap.allocate(64);

  unsafe {
    heap.release(b);
    heap.release(a);
  }

  assert_eq!(heap.validate(), Ok(()));
  assert_eq!(heap.stats().free_blocks, 2);
}
