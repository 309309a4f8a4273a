use std::mem;

/// The alignment of every payload handed out by the heap.
///
/// Matches the platform's `max_align_t`, so any scalar type can live at the
/// start of a payload.
pub const ALIGNMENT: usize = mem::align_of::<libc::max_align_t>();

/// Rounds the given size up to the next multiple of [`ALIGNMENT`].
///
/// Usable in `const` context.
///
/// # Examples
///
/// ```rust
/// use tagalloc::{ALIGNMENT, align};
///
/// assert_eq!(align!(0), 0);
/// assert_eq!(align!(1), ALIGNMENT);
/// assert_eq!(align!(ALIGNMENT), ALIGNMENT);
/// assert_eq!(align!(ALIGNMENT + 1), 2 * ALIGNMENT);
/// ```
#[macro_export]
macro_rules! align {
  ($value:expr) => {
    $crate::align_to!($value, $crate::align::ALIGNMENT)
  };
}

/// Rounds the given value up to the next multiple of `$alignment`, which
/// must be a power of two.
///
/// # Examples
///
/// ```rust
/// use tagalloc::align_to;
///
/// assert_eq!(align_to!(13, 8), 16);
/// assert_eq!(align_to!(0x1001, 0x1000), 0x2000);
/// ```
#[macro_export]
macro_rules! align_to {
  ($value:expr, $alignment:expr) => {
    ($value + $alignment - 1) & !($alignment - 1)
  };
}

/// Returns whether `address` is a multiple of [`ALIGNMENT`].
pub fn is_aligned(address: usize) -> bool {
  address % ALIGNMENT == 0
}
