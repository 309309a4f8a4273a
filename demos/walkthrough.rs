use std::{io::Read, mem, ptr};

use tagalloc::{ALIGNMENT, Heap, ProgramBreak};

/// Waits until the user presses ENTER, when run with `--pause`.
/// Useful to inspect memory with tools like `pmap` or `gdb` between steps.
fn pause(enabled: bool) {
  if enabled {
    println!("\n>>> Press ENTER to continue...");
    let _ = std::io::stdin().bytes().next();
  }
}

/// Prints the current program break.
fn print_program_break(label: &str) {
  println!(
    "[{}] PID = {}, program break = {:?}",
    label,
    std::process::id(),
    ProgramBreak::current(),
  );
}

fn print_heap(heap: &Heap<ProgramBreak>) {
  for block in heap.blocks() {
    println!(
      "    {:?}  {:>6} bytes  {}",
      block.payload,
      block.size,
      if block.is_free { "free" } else { "used" }
    );
  }
}

fn main() {
  let pausing = std::env::args().any(|arg| arg == "--pause");
  let mut heap = Heap::new(ProgramBreak::new());

  print_program_break("start");
  pause(pausing);

  unsafe {
    // --------------------------------------------------------------------
    // 1) An array of integers.
    // --------------------------------------------------------------------
    let numbers = heap.allocate(5 * mem::size_of::<i32>()) as *mut i32;
    if numbers.is_null() {
      eprintln!("allocation failed");
      std::process::exit(1);
    }

    for i in 0..5 {
      numbers.add(i).write(i as i32 * 10);
    }
    let values: Vec<i32> = (0..5).map(|i| numbers.add(i).read()).collect();
    println!("\n[1] integers: {values:?}");

    heap.release(numbers.cast());
    pause(pausing);

    // --------------------------------------------------------------------
    // 2) A string, reusing the block freed above.
    // --------------------------------------------------------------------
    let message = b"Hello custom allocator";
    let text = heap.allocate(32);
    ptr::copy_nonoverlapping(message.as_ptr(), text, message.len());
    println!(
      "\n[2] string: {} (reused the integer block: {})",
      String::from_utf8_lossy(std::slice::from_raw_parts(text, message.len())),
      text == numbers.cast::<u8>()
    );
    pause(pausing);

    // --------------------------------------------------------------------
    // 3) Alignment of a wide scalar.
    // --------------------------------------------------------------------
    let wide = heap.allocate(mem::size_of::<f64>() * 2);
    println!(
      "\n[3] address = {:?}, address % {} = {}",
      wide,
      ALIGNMENT,
      wide as usize % ALIGNMENT
    );
    pause(pausing);

    // --------------------------------------------------------------------
    // 4) Growth: in place over a free neighbour, then by moving.
    // --------------------------------------------------------------------
    heap.release(wide);
    let grown = heap.reallocate(text, 48);
    println!("\n[4] grew string in place: {}", grown == text);

    let big = heap.reallocate(grown, 64 * 1024);
    println!("[4] grew string to 64 KiB, moved: {}", big != grown);
    print_program_break("after large growth");
    print_heap(&heap);
    pause(pausing);

    heap.release(big);
  }

  println!("\n[5] after releasing everything:");
  print_heap(&heap);

  match heap.validate() {
    Ok(()) => println!("\nheap is consistent"),
    Err(corruption) => println!("\nheap is corrupt: {corruption}"),
  }
}
