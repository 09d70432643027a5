//! Mica Runtime: the container and shared-ownership core of the Mica
//! language
//!
//! The Mica compiler lowers the language's high-level data types to direct
//! C-ABI calls into this crate: the growable string, the type-erased
//! vector/array, the open-addressed hash set and hash map, and the
//! reference-counted shared cells. Everything acquires memory through the
//! pluggable allocator facade in `mica-core`.
//!
//! Key design principles:
//! - Type erasure: one implementation per container, driven by
//!   `(size, align, drop, equality)` descriptors from the compiler
//! - ABI stability: every public struct is `#[repr(C)]` and accessed by
//!   field offset from compiled code
//! - Single ownership: containers have no internal synchronization; only
//!   the atomic shared cell crosses threads

pub mod chars;
pub mod dispatch;
pub mod format;
pub mod hashmap;
pub mod hashset;
pub mod micastring;
pub mod report;
pub mod shared;
pub mod table;
pub mod vec;

// Re-export the core facade so linking against the runtime staticlib brings
// in the whole ABI surface
pub use mica_core::{
    AllocStats, AllocatorVTable, RegionHandle, ValueConstPtr, ValueMutPtr, alloc_raw,
    alloc_stats, alloc_zeroed_raw, allocator_install, allocator_reset, free_raw, realloc_raw,
};

// Character helpers (exported for LLVM linking)
pub use chars::{
    CharError, MicaChar, mica_rt_char_from_codepoint as char_from_codepoint,
    mica_rt_char_is_digit as char_is_digit, mica_rt_char_is_letter as char_is_letter,
    mica_rt_char_is_scalar as char_is_scalar, mica_rt_char_is_whitespace as char_is_whitespace,
    mica_rt_char_status as char_status, mica_rt_char_to_lower as char_to_lower,
    mica_rt_char_to_upper as char_to_upper, mica_rt_char_value as char_value,
};

// String operations (exported for LLVM linking)
pub use micastring::{
    MicaCharSpan, MicaStr, MicaString, STRING_INLINE_CAPACITY, StringError,
    mica_rt_str_as_chars as str_as_chars, mica_rt_string_as_chars as string_as_chars,
    mica_rt_string_as_slice as string_as_slice, mica_rt_string_clone as string_clone,
    mica_rt_string_clone_slice as string_clone_slice, mica_rt_string_drop as string_drop,
    mica_rt_string_error_message as string_error_message,
    mica_rt_string_from_char as string_from_char, mica_rt_string_from_slice as string_from_slice,
    mica_rt_string_new as string_new, mica_rt_string_push_slice as string_push_slice,
    mica_rt_string_reserve as string_reserve, mica_rt_string_truncate as string_truncate,
    mica_rt_string_with_capacity as string_with_capacity,
};

// Vector / array operations (exported for LLVM linking)
pub use vec::{
    MicaVec, MicaVecIter, MicaVecView, VEC_INLINE_BYTES, VecError,
    mica_rt_array_into_vec as array_into_vec, mica_rt_array_len as array_len,
    mica_rt_vec_clone as vec_clone, mica_rt_vec_drop as vec_drop,
    mica_rt_vec_insert as vec_insert, mica_rt_vec_into_array as vec_into_array,
    mica_rt_vec_iter as vec_iter, mica_rt_vec_iter_next as vec_iter_next,
    mica_rt_vec_len as vec_len, mica_rt_vec_new as vec_new, mica_rt_vec_pop as vec_pop,
    mica_rt_vec_push as vec_push, mica_rt_vec_remove as vec_remove,
    mica_rt_vec_reserve as vec_reserve, mica_rt_vec_swap_remove as vec_swap_remove,
    mica_rt_vec_truncate as vec_truncate, mica_rt_vec_with_capacity as vec_with_capacity,
};

// Hash set operations (exported for LLVM linking)
pub use hashset::{
    HashSetError, MicaHashSet, MicaHashSetIter, mica_rt_hashset_contains as hashset_contains,
    mica_rt_hashset_drop as hashset_drop, mica_rt_hashset_insert as hashset_insert,
    mica_rt_hashset_iter as hashset_iter, mica_rt_hashset_len as hashset_len,
    mica_rt_hashset_new as hashset_new, mica_rt_hashset_remove as hashset_remove,
    mica_rt_hashset_reserve as hashset_reserve, mica_rt_hashset_take as hashset_take,
};

// Hash map operations (exported for LLVM linking)
pub use hashmap::{
    HashMapError, MicaHashMap, MicaHashMapIter, mica_rt_hashmap_contains as hashmap_contains,
    mica_rt_hashmap_drop as hashmap_drop, mica_rt_hashmap_get_ptr as hashmap_get_ptr,
    mica_rt_hashmap_insert as hashmap_insert, mica_rt_hashmap_iter as hashmap_iter,
    mica_rt_hashmap_len as hashmap_len, mica_rt_hashmap_new as hashmap_new,
    mica_rt_hashmap_remove as hashmap_remove, mica_rt_hashmap_take as hashmap_take,
};

// Shared cells (exported for LLVM linking)
pub use shared::{
    MicaArc, MicaRc, MicaWeak, MicaWeakRc, SharedError, mica_rt_arc_clone as arc_clone,
    mica_rt_arc_downgrade as arc_downgrade, mica_rt_arc_drop as arc_drop,
    mica_rt_arc_get as arc_get, mica_rt_arc_get_mut as arc_get_mut, mica_rt_arc_new as arc_new,
    mica_rt_arc_strong_count as arc_strong_count, mica_rt_rc_clone as rc_clone,
    mica_rt_rc_drop as rc_drop, mica_rt_rc_new as rc_new, mica_rt_weak_drop as weak_drop,
    mica_rt_weak_upgrade as weak_upgrade,
};

// Dispatch shims (exported for LLVM linking)
pub use dispatch::{mica_rt_eq_invoke as eq_invoke_raw, mica_rt_hash_invoke as hash_invoke_raw};

// At-exit report
pub use report::mica_rt_report as report;
