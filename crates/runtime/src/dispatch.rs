//! Dispatch shims for caller-supplied function pointers
//!
//! Hash tables carry their hash and equality functions as opaque `usize`
//! values handed over by the compiler. These shims are the single place
//! where that word is reinterpreted as a C function pointer and invoked, so
//! the calling convention the compiler emits is pinned down here and
//! nowhere else.
//!
//! A null function word is a contract violation (the compiler never emits
//! one); it is only checked under debug assertions.

/// Hash function signature the compiler emits: value pointer in, 64-bit
/// hash out.
pub type HashFn = unsafe extern "C" fn(*const u8) -> u64;

/// Equality function signature: two value pointers in, nonzero when equal.
pub type EqFn = unsafe extern "C" fn(*const u8, *const u8) -> i32;

/// Element destructor signature carried by containers.
pub type DropFn = unsafe extern "C" fn(*mut u8);

/// Invoke a caller-supplied hash function on a value.
///
/// # Safety
/// `func` must be a valid `HashFn` and `value` a readable pointer to a value
/// of the hashed type.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn mica_rt_hash_invoke(func: usize, value: *const u8) -> u64 {
    debug_assert!(func != 0, "hash_invoke: null function");
    // Safety: caller contract — func is a HashFn.
    let f: HashFn = unsafe { std::mem::transmute(func) };
    unsafe { f(value) }
}

/// Invoke a caller-supplied equality function on two values.
///
/// # Safety
/// `func` must be a valid `EqFn`; `left` and `right` must be readable
/// pointers to values of the compared type.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn mica_rt_eq_invoke(func: usize, left: *const u8, right: *const u8) -> i32 {
    debug_assert!(func != 0, "eq_invoke: null function");
    // Safety: caller contract — func is an EqFn.
    let f: EqFn = unsafe { std::mem::transmute(func) };
    unsafe { f(left, right) }
}

/// Invoke an element destructor if one was supplied (zero means trivially
/// droppable).
///
/// # Safety
/// A nonzero `func` must be a valid `DropFn` and `value` a pointer to a live
/// element of the dropped type.
pub unsafe fn drop_invoke(func: usize, value: *mut u8) {
    if func == 0 {
        return;
    }
    // Safety: caller contract — func is a DropFn.
    let f: DropFn = unsafe { std::mem::transmute(func) };
    unsafe { f(value) }
}
