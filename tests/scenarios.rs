use std::{
  mem, ptr,
  sync::{Arc, Mutex},
  thread,
};

use tagalloc::{ALIGNMENT, Arena, Heap};
use test_log::test;

fn heap() -> Heap<Arena> {
  Heap::new(Arena::with_capacity(1 << 20))
}

#[test]
fn alignment() {
  let mut heap = heap();

  for size in 1..=257 {
    let pointer = heap.allocate(size);

    assert!(!pointer.is_null());
    assert_eq!(pointer as usize % ALIGNMENT, 0, "size {size}");
  }

  let pointer = heap.allocate(mem::size_of::<f64>()) as *mut f64;
  unsafe {
    pointer.write(1.5);
    assert_eq!(pointer.read(), 1.5);
  }
}

#[test]
fn live_allocations_do_not_overlap() {
  let mut heap = heap();
  let mut live: Vec<(usize, usize)> = Vec::new();

  // Interleave allocations and releases so blocks get split and reused.
  for round in 0..200usize {
    let size = 1 + (round * 37) % 300;
    let pointer = heap.allocate(size);
    assert!(!pointer.is_null());
    live.push((pointer as usize, size));

    if round % 3 == 2 {
      let (victim, _) = live.remove(round % live.len());
      unsafe { heap.release(victim as *mut u8) };
    }
  }

  live.sort();
  for pair in live.windows(2) {
    let (start, size) = pair[0];
    let (next, _) = pair[1];
    assert!(start + size <= next, "{start:#x}+{size} overlaps {next:#x}");
  }

  assert_eq!(heap.validate(), Ok(()));
}

#[test]
fn reuse_after_free() {
  let mut heap = heap();

  let _a = heap.allocate(64);
  let b = heap.allocate(64);
  let _c = heap.allocate(64);
  let calls = heap.source().calls();

  unsafe { heap.release(b) };
  let d = heap.allocate(48);

  assert_eq!(d, b);
  assert_eq!(heap.source().calls(), calls);
}

#[test]
fn coalescing_middle_left_right() {
  let mut heap = heap();

  let x = heap.allocate(128);
  let y = heap.allocate(256);
  let z = heap.allocate(128);

  unsafe {
    heap.release(y);
    heap.release(x);
    heap.release(z);
  }

  assert_eq!(heap.blocks().count(), 1);
  assert_eq!(heap.validate(), Ok(()));

  let merged = heap.blocks().next().unwrap().size;
  assert!(merged >= 128 + 256 + 128);

  let calls = heap.source().calls();
  let w = heap.allocate(merged);

  assert_eq!(w, x);
  assert_eq!(heap.source().calls(), calls);
}

#[test]
fn realloc_preserves_data() {
  let mut heap = heap();

  unsafe {
    let values = heap.reallocate(ptr::null_mut(), 16) as *mut i32;
    assert!(!values.is_null());
    for i in 0..4 {
      values.add(i).write(i as i32 + 1);
    }

    // Shrink: same block, prefix intact.
    let shrunk = heap.reallocate(values.cast(), 8) as *mut i32;
    assert_eq!(shrunk, values);
    assert_eq!((shrunk.read(), shrunk.add(1).read()), (1, 2));

    // Free space right behind the block: grow without moving.
    let spare = heap.allocate(64);
    heap.release(spare);

    let grown = heap.reallocate(shrunk.cast(), 32) as *mut i32;
    assert_eq!(grown, values);
    for i in 0..4 {
      assert_eq!(grown.add(i).read(), i as i32 + 1);
    }

    // Block the neighbour, then grow again: the payload has to move.
    let blocker = heap.allocate(heap.blocks().nth(1).unwrap().size);
    assert!(!blocker.is_null());

    let moved = heap.reallocate(grown.cast(), 256) as *mut i32;
    assert_ne!(moved, grown);
    for i in 0..4 {
      assert_eq!(moved.add(i).read(), i as i32 + 1);
    }

    assert_eq!(heap.validate(), Ok(()));
  }
}

#[test]
fn null_is_a_noop() {
  let mut heap = heap();
  heap.allocate(32);
  let before: Vec<_> = heap.blocks().collect();

  unsafe {
    heap.release(ptr::null_mut());
    assert!(heap.reallocate(ptr::null_mut(), 0).is_null());
  }

  assert_eq!(heap.blocks().collect::<Vec<_>>(), before);
  assert_eq!(heap.source().calls(), 1);
}

#[test]
fn zero_size_request() {
  let mut heap = heap();

  assert!(heap.allocate(0).is_null());
  assert_eq!(heap.blocks().count(), 0);
  assert_eq!(heap.source().calls(), 0);
}

#[test]
fn exhaustion_is_reported_and_recoverable() {
  let mut heap = Heap::new(Arena::with_capacity(1024));
  let mut pointers = Vec::new();

  loop {
    let pointer = heap.allocate(100);
    if pointer.is_null() {
      break;
    }
    pointers.push(pointer);
  }

  assert!(!pointers.is_empty());

  for pointer in pointers.iter().copied() {
    unsafe { heap.release(pointer) };
  }

  assert_eq!(heap.stats().blocks, 1);
  assert_eq!(heap.allocate(100), pointers[0]);
}

#[test]
fn independent_heaps() {
  let mut first = heap();
  let mut second = heap();

  let a = first.allocate(64);
  let b = second.allocate(64);

  assert!(first.source().contains(a));
  assert!(second.source().contains(b));
  assert!(!first.source().contains(b));
}

#[test]
fn external_lock_serializes_access() {
  let heap = Arc::new(Mutex::new(heap()));

  let workers: Vec<_> = (0..4)
    .map(|worker| {
      let heap = Arc::clone(&heap);

      thread::spawn(move || {
        for round in 0..100usize {
          let size = 8 + (worker * 31 + round) % 200;

          let pointer = heap.lock().unwrap().allocate(size) as usize;
          assert_ne!(pointer, 0);

          unsafe { (pointer as *mut u8).write_bytes(worker as u8, size) };

          let pointer = unsafe { heap.lock().unwrap().reallocate(pointer as *mut u8, size * 2) };
          let bytes = unsafe { std::slice::from_raw_parts(pointer, size) };
          assert!(bytes.iter().all(|&byte| byte == worker as u8));

          unsafe { heap.lock().unwrap().release(pointer) };
        }
      })
    })
    .collect();

  for worker in workers {
    worker.join().unwrap();
  }

  let heap = heap.lock().unwrap();
  assert_eq!(heap.validate(), Ok(()));
  assert_eq!(heap.stats().used_bytes, 0);
}
