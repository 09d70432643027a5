//! MicaHashSet - open-addressed, type-erased hash set
//!
//! The compiler computes the 64-bit hash on its side and passes it with
//! every operation; the set stores it per bucket and only falls back to the
//! caller-supplied equality function on a hash match. See the table module
//! for the probing and layout discipline.
//!
//! # Safety Invariants
//! - `cap` is 0 or a power of two; `cap > 0` means all three arrays are live
//!   facade allocations of `cap` buckets
//! - occupied buckets hold live elements; their stored hash is the hash
//!   supplied at insertion
//! - `len` counts occupied buckets, `tombstones` counts tombstone buckets

use crate::dispatch::drop_invoke;
use crate::table::{
    self, BUCKET_EMPTY, BUCKET_OCCUPIED, BUCKET_TOMBSTONE, Buckets, Slot, TableError,
};
use mica_core::{ValueConstPtr, ValueMutPtr};
use std::ptr;

/// The set representation the compiler lays out. Field offsets are ABI.
#[repr(C)]
#[derive(Debug)]
pub struct MicaHashSet {
    pub entries: *mut u8,
    pub states: *mut u8,
    pub hashes: *mut u8,
    pub len: usize,
    pub cap: usize,
    pub tombstones: usize,
    pub elem_size: usize,
    pub elem_align: usize,
    pub drop_fn: usize,
    pub eq_fn: usize,
}

/// Iteration cursor. The set must not be mutated while a cursor is live.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct MicaHashSetIter {
    pub entries: *const u8,
    pub states: *const u8,
    pub index: usize,
    pub cap: usize,
    pub elem_size: usize,
    pub elem_align: usize,
}

/// Error codes for hash set operations.
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HashSetError {
    Success = 0,
    AllocationFailed = 1,
    InvalidPointer = 2,
    CapacityOverflow = 3,
    NotFound = 4,
    IterationComplete = 5,
}

impl From<TableError> for HashSetError {
    fn from(e: TableError) -> Self {
        match e {
            TableError::AllocationFailed => HashSetError::AllocationFailed,
            TableError::CapacityOverflow => HashSetError::CapacityOverflow,
        }
    }
}

fn code(result: Result<(), HashSetError>) -> i32 {
    match result {
        Ok(()) => HashSetError::Success as i32,
        Err(e) => e as i32,
    }
}

impl MicaHashSet {
    fn construct(elem_size: usize, elem_align: usize, drop_fn: usize, eq_fn: usize) -> Self {
        MicaHashSet {
            entries: ptr::null_mut(),
            states: ptr::null_mut(),
            hashes: ptr::null_mut(),
            len: 0,
            cap: 0,
            tombstones: 0,
            elem_size,
            elem_align,
            drop_fn,
            eq_fn,
        }
    }

    fn buckets(&self) -> Buckets {
        Buckets {
            entries: self.entries,
            states: self.states,
            hashes: self.hashes,
            cap: self.cap,
            entry_size: self.elem_size,
        }
    }

    /// Rehash into `new_cap` buckets; old arrays survive a failure intact.
    fn grow_to(&mut self, new_cap: usize) -> Result<(), HashSetError> {
        let arrays = unsafe { table::rehash(&self.buckets(), new_cap, self.elem_align)? };
        // Safety: the old arrays are fully superseded by the rehash.
        unsafe {
            table::free_arrays(
                self.entries,
                self.states,
                self.hashes,
                self.cap,
                self.elem_size,
                self.elem_align,
            );
        }
        self.entries = arrays.entries;
        self.states = arrays.states;
        self.hashes = arrays.hashes;
        self.cap = new_cap;
        self.tombstones = 0;
        Ok(())
    }

    fn ensure_room_for_insert(&mut self) -> Result<(), HashSetError> {
        if table::over_load(self.len, self.tombstones, self.cap) {
            self.grow_to(table::grown_capacity(self.cap)?)?;
        }
        Ok(())
    }

    fn drop_occupied(&mut self) {
        let buckets = self.buckets();
        for index in 0..self.cap {
            // Safety: index < cap; occupied buckets hold live elements.
            unsafe {
                if buckets.state(index) == BUCKET_OCCUPIED {
                    drop_invoke(self.drop_fn, buckets.entry_at(index));
                }
            }
        }
    }

    /// Mark a bucket dead without dropping its element (the caller moved or
    /// dropped it).
    unsafe fn bury(&mut self, index: usize) {
        // Safety: caller keeps index < cap.
        unsafe { self.buckets().set_state(index, BUCKET_TOMBSTONE) };
        self.len -= 1;
        self.tombstones += 1;
    }
}

unsafe fn expect_elem(
    set: &MicaHashSet,
    value: *const ValueConstPtr,
) -> Result<ValueConstPtr, HashSetError> {
    let v = unsafe { value.as_ref() }.ok_or(HashSetError::InvalidPointer)?;
    if (v.ptr.is_null() && set.elem_size > 0) || !v.matches_layout(set.elem_size, set.elem_align) {
        return Err(HashSetError::InvalidPointer);
    }
    Ok(*v)
}

unsafe fn expect_out(
    set: &MicaHashSet,
    out: *const ValueMutPtr,
) -> Result<ValueMutPtr, HashSetError> {
    let v = unsafe { out.as_ref() }.ok_or(HashSetError::InvalidPointer)?;
    if (v.ptr.is_null() && set.elem_size > 0) || !v.matches_layout(set.elem_size, set.elem_align) {
        return Err(HashSetError::InvalidPointer);
    }
    Ok(*v)
}

// ============================================================================
// Construction and teardown
// ============================================================================

#[unsafe(no_mangle)]
pub extern "C" fn mica_rt_hashset_new(
    elem_size: usize,
    elem_align: usize,
    drop_fn: usize,
    eq_fn: usize,
) -> MicaHashSet {
    MicaHashSet::construct(elem_size, elem_align, drop_fn, eq_fn)
}

/// A set pre-sized for `capacity` elements. Falls back to the empty table
/// if the allocation cannot be satisfied.
#[unsafe(no_mangle)]
pub extern "C" fn mica_rt_hashset_with_capacity(
    elem_size: usize,
    elem_align: usize,
    capacity: usize,
    drop_fn: usize,
    eq_fn: usize,
) -> MicaHashSet {
    let mut set = MicaHashSet::construct(elem_size, elem_align, drop_fn, eq_fn);
    if capacity > 0 {
        if let Ok(cap) = table::capacity_for(capacity) {
            let _ = set.grow_to(cap);
        }
    }
    set
}

/// Drop every element, release the arrays, and reset the struct. Safe to
/// call twice.
///
/// # Safety
/// `set` must be null or point to a valid `MicaHashSet`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn mica_rt_hashset_drop(set: *mut MicaHashSet) {
    let Some(set) = (unsafe { set.as_mut() }) else {
        return;
    };
    set.drop_occupied();
    // Safety: the arrays belong to this set and are released exactly once.
    unsafe {
        table::free_arrays(
            set.entries,
            set.states,
            set.hashes,
            set.cap,
            set.elem_size,
            set.elem_align,
        );
    }
    *set = MicaHashSet::construct(set.elem_size, set.elem_align, set.drop_fn, set.eq_fn);
}

/// Drop every element; the arrays are kept at their current capacity.
///
/// # Safety
/// `set` must be null or point to a valid `MicaHashSet`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn mica_rt_hashset_clear(set: *mut MicaHashSet) -> i32 {
    let Some(set) = (unsafe { set.as_mut() }) else {
        return HashSetError::InvalidPointer as i32;
    };
    set.drop_occupied();
    if self_states_live(set) {
        // Safety: the state array holds cap bytes.
        unsafe { ptr::write_bytes(set.states, BUCKET_EMPTY, set.cap) };
    }
    set.len = 0;
    set.tombstones = 0;
    HashSetError::Success as i32
}

fn self_states_live(set: &MicaHashSet) -> bool {
    set.cap > 0 && !set.states.is_null()
}

// ============================================================================
// Capacity management
// ============================================================================

/// Ensure room for `additional` more elements without another rehash.
///
/// # Safety
/// `set` must be null or point to a valid `MicaHashSet`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn mica_rt_hashset_reserve(set: *mut MicaHashSet, additional: usize) -> i32 {
    let Some(set) = (unsafe { set.as_mut() }) else {
        return HashSetError::InvalidPointer as i32;
    };
    let Some(needed) = set.len.checked_add(additional) else {
        return HashSetError::CapacityOverflow as i32;
    };
    if !table::over_load(needed, set.tombstones, set.cap) {
        return HashSetError::Success as i32;
    }
    let target = match table::capacity_for(needed) {
        Ok(cap) => cap.max(set.cap),
        Err(e) => return HashSetError::from(e) as i32,
    };
    code(set.grow_to(target))
}

/// Rehash into the smallest power-of-two capacity holding the live elements
/// and at least `min_capacity` buckets. Purges tombstones.
///
/// # Safety
/// `set` must be null or point to a valid `MicaHashSet`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn mica_rt_hashset_shrink_to(
    set: *mut MicaHashSet,
    min_capacity: usize,
) -> i32 {
    let Some(set) = (unsafe { set.as_mut() }) else {
        return HashSetError::InvalidPointer as i32;
    };
    if set.cap == 0 {
        return HashSetError::Success as i32;
    }
    if set.len == 0 && min_capacity == 0 {
        // Nothing live: release the arrays entirely
        unsafe {
            table::free_arrays(
                set.entries,
                set.states,
                set.hashes,
                set.cap,
                set.elem_size,
                set.elem_align,
            );
        }
        *set = MicaHashSet::construct(set.elem_size, set.elem_align, set.drop_fn, set.eq_fn);
        return HashSetError::Success as i32;
    }
    let target = match table::shrink_capacity_for(min_capacity, set.len) {
        Ok(cap) => cap,
        Err(e) => return HashSetError::from(e) as i32,
    };
    if target == set.cap && set.tombstones == 0 {
        return HashSetError::Success as i32;
    }
    code(set.grow_to(target))
}

// ============================================================================
// Lookup and mutation
// ============================================================================

/// Insert a new element. `*inserted` reports whether the element was new;
/// when it is 0 the caller's value was not consumed.
///
/// # Safety
/// `set` must be a valid set; `value` must describe a readable element of
/// the set's layout; `inserted` must be null or writable.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn mica_rt_hashset_insert(
    set: *mut MicaHashSet,
    hash: u64,
    value: *const ValueConstPtr,
    inserted: *mut i32,
) -> i32 {
    let Some(set) = (unsafe { set.as_mut() }) else {
        return HashSetError::InvalidPointer as i32;
    };
    let value = match unsafe { expect_elem(set, value) } {
        Ok(v) => v,
        Err(e) => return e as i32,
    };
    if let Err(e) = set.ensure_room_for_insert() {
        return e as i32;
    }
    let buckets = set.buckets();
    // Safety: the table is allocated and under the load limit.
    match unsafe { buckets.find_slot(hash, value.ptr, set.eq_fn) } {
        Slot::Existing(_) => {
            if !inserted.is_null() {
                // Safety: checked non-null; caller guarantees writability.
                unsafe { inserted.write(0) };
            }
        }
        Slot::Vacant {
            index,
            reclaims_tombstone,
        } => {
            // Safety: index < cap; the slot is dead.
            unsafe {
                ptr::copy_nonoverlapping(value.ptr, buckets.entry_at(index), set.elem_size);
                buckets.set_state(index, BUCKET_OCCUPIED);
                buckets.set_hash(index, hash);
            }
            set.len += 1;
            if reclaims_tombstone {
                set.tombstones -= 1;
            }
            if !inserted.is_null() {
                // Safety: checked non-null.
                unsafe { inserted.write(1) };
            }
        }
    }
    HashSetError::Success as i32
}

/// Insert, replacing an equal element if present. The replaced element is
/// moved into `out` when one is supplied, dropped otherwise; `*replaced`
/// reports which path was taken.
///
/// # Safety
/// As for [`mica_rt_hashset_insert`]; `out` must be null or describe a
/// writable slot of the set's layout.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn mica_rt_hashset_replace(
    set: *mut MicaHashSet,
    hash: u64,
    value: *const ValueConstPtr,
    out: *const ValueMutPtr,
    replaced: *mut i32,
) -> i32 {
    let Some(set) = (unsafe { set.as_mut() }) else {
        return HashSetError::InvalidPointer as i32;
    };
    let value = match unsafe { expect_elem(set, value) } {
        Ok(v) => v,
        Err(e) => return e as i32,
    };
    if let Err(e) = set.ensure_room_for_insert() {
        return e as i32;
    }
    let buckets = set.buckets();
    // Safety: the table is allocated and under the load limit.
    match unsafe { buckets.find_slot(hash, value.ptr, set.eq_fn) } {
        Slot::Existing(index) => {
            // Safety: occupied bucket; the old element moves out or drops.
            unsafe {
                let slot = buckets.entry_at(index);
                match out.as_ref() {
                    Some(out) if !out.ptr.is_null() => {
                        if !out.matches_layout(set.elem_size, set.elem_align) {
                            return HashSetError::InvalidPointer as i32;
                        }
                        ptr::copy_nonoverlapping(slot, out.ptr, set.elem_size);
                    }
                    _ => drop_invoke(set.drop_fn, slot),
                }
                ptr::copy_nonoverlapping(value.ptr, slot, set.elem_size);
            }
            if !replaced.is_null() {
                // Safety: checked non-null.
                unsafe { replaced.write(1) };
            }
        }
        Slot::Vacant {
            index,
            reclaims_tombstone,
        } => {
            // Safety: index < cap; the slot is dead.
            unsafe {
                ptr::copy_nonoverlapping(value.ptr, buckets.entry_at(index), set.elem_size);
                buckets.set_state(index, BUCKET_OCCUPIED);
                buckets.set_hash(index, hash);
            }
            set.len += 1;
            if reclaims_tombstone {
                set.tombstones -= 1;
            }
            if !replaced.is_null() {
                // Safety: checked non-null.
                unsafe { replaced.write(0) };
            }
        }
    }
    HashSetError::Success as i32
}

/// # Safety
/// `set` must be null or valid; `key` must describe a readable element.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn mica_rt_hashset_contains(
    set: *const MicaHashSet,
    hash: u64,
    key: *const ValueConstPtr,
) -> i32 {
    let Some(set) = (unsafe { set.as_ref() }) else {
        return 0;
    };
    let Ok(key) = (unsafe { expect_elem(set, key) }) else {
        return 0;
    };
    // Safety: the arrays are live for cap buckets.
    i32::from(unsafe { set.buckets().find(hash, key.ptr, set.eq_fn) }.is_some())
}

/// Borrow the stored element equal to `key`; a null descriptor on a miss.
///
/// # Safety
/// `set` must be null or valid; `key` must describe a readable element.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn mica_rt_hashset_get_ptr(
    set: *const MicaHashSet,
    hash: u64,
    key: *const ValueConstPtr,
) -> ValueConstPtr {
    let Some(set) = (unsafe { set.as_ref() }) else {
        return ValueConstPtr::null();
    };
    let Ok(key) = (unsafe { expect_elem(set, key) }) else {
        return ValueConstPtr::null();
    };
    // Safety: the arrays are live for cap buckets.
    match unsafe { set.buckets().find(hash, key.ptr, set.eq_fn) } {
        Some(index) => ValueConstPtr {
            // Safety: index < cap.
            ptr: unsafe { set.buckets().entry_at(index) },
            size: set.elem_size,
            align: set.elem_align,
        },
        None => ValueConstPtr::null(),
    }
}

/// Move the element equal to `key` out into the caller's buffer.
///
/// # Safety
/// `set` must be a valid set; `key` readable, `out` writable at the set's
/// layout.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn mica_rt_hashset_take(
    set: *mut MicaHashSet,
    hash: u64,
    key: *const ValueConstPtr,
    out: *const ValueMutPtr,
) -> i32 {
    let Some(set) = (unsafe { set.as_mut() }) else {
        return HashSetError::InvalidPointer as i32;
    };
    let key = match unsafe { expect_elem(set, key) } {
        Ok(v) => v,
        Err(e) => return e as i32,
    };
    let out = match unsafe { expect_out(set, out) } {
        Ok(v) => v,
        Err(e) => return e as i32,
    };
    // Safety: the arrays are live for cap buckets.
    match unsafe { set.buckets().find(hash, key.ptr, set.eq_fn) } {
        Some(index) => {
            // Safety: occupied bucket; ownership moves to out.
            unsafe {
                ptr::copy_nonoverlapping(set.buckets().entry_at(index), out.ptr, set.elem_size);
                set.bury(index);
            }
            HashSetError::Success as i32
        }
        None => HashSetError::NotFound as i32,
    }
}

/// Remove and drop the element equal to `key`. Returns 1 if an element was
/// removed, 0 if none matched.
///
/// # Safety
/// `set` must be null or valid; `key` must describe a readable element.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn mica_rt_hashset_remove(
    set: *mut MicaHashSet,
    hash: u64,
    key: *const ValueConstPtr,
) -> i32 {
    let Some(set) = (unsafe { set.as_mut() }) else {
        return 0;
    };
    let Ok(key) = (unsafe { expect_elem(set, key) }) else {
        return 0;
    };
    // Safety: the arrays are live for cap buckets.
    match unsafe { set.buckets().find(hash, key.ptr, set.eq_fn) } {
        Some(index) => {
            // Safety: occupied bucket.
            unsafe {
                drop_invoke(set.drop_fn, set.buckets().entry_at(index));
                set.bury(index);
            }
            1
        }
        None => 0,
    }
}

/// Move the element in bucket `index` out, by position rather than key.
///
/// # Safety
/// `set` must be a valid set; `out` must describe a writable slot of the
/// set's layout.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn mica_rt_hashset_take_at(
    set: *mut MicaHashSet,
    index: usize,
    out: *const ValueMutPtr,
) -> i32 {
    let Some(set) = (unsafe { set.as_mut() }) else {
        return HashSetError::InvalidPointer as i32;
    };
    let out = match unsafe { expect_out(set, out) } {
        Ok(v) => v,
        Err(e) => return e as i32,
    };
    if index >= set.cap {
        return HashSetError::NotFound as i32;
    }
    // Safety: index < cap.
    if unsafe { set.buckets().state(index) } != BUCKET_OCCUPIED {
        return HashSetError::NotFound as i32;
    }
    // Safety: occupied bucket; ownership moves to out.
    unsafe {
        ptr::copy_nonoverlapping(set.buckets().entry_at(index), out.ptr, set.elem_size);
        set.bury(index);
    }
    HashSetError::Success as i32
}

// ============================================================================
// Introspection
// ============================================================================

/// # Safety
/// `set` must be null or point to a valid `MicaHashSet`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn mica_rt_hashset_len(set: *const MicaHashSet) -> usize {
    unsafe { set.as_ref() }.map_or(0, |s| s.len)
}

/// # Safety
/// `set` must be null or point to a valid `MicaHashSet`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn mica_rt_hashset_capacity(set: *const MicaHashSet) -> usize {
    unsafe { set.as_ref() }.map_or(0, |s| s.cap)
}

/// # Safety
/// `set` must be null or point to a valid `MicaHashSet`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn mica_rt_hashset_tombstones(set: *const MicaHashSet) -> usize {
    unsafe { set.as_ref() }.map_or(0, |s| s.tombstones)
}

/// State byte of bucket `index` (empty for out-of-range indices).
///
/// # Safety
/// `set` must be null or point to a valid `MicaHashSet`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn mica_rt_hashset_bucket_state(set: *const MicaHashSet, index: usize) -> u8 {
    let Some(set) = (unsafe { set.as_ref() }) else {
        return BUCKET_EMPTY;
    };
    if index >= set.cap {
        return BUCKET_EMPTY;
    }
    // Safety: index < cap.
    unsafe { set.buckets().state(index) }
}

/// Stored hash of bucket `index` (0 for out-of-range or dead buckets).
///
/// # Safety
/// `set` must be null or point to a valid `MicaHashSet`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn mica_rt_hashset_bucket_hash(set: *const MicaHashSet, index: usize) -> u64 {
    let Some(set) = (unsafe { set.as_ref() }) else {
        return 0;
    };
    if index >= set.cap {
        return 0;
    }
    // Safety: index < cap.
    unsafe {
        if set.buckets().state(index) == BUCKET_OCCUPIED {
            set.buckets().hash_at(index)
        } else {
            0
        }
    }
}

// ============================================================================
// Iteration
// ============================================================================

/// # Safety
/// `set` must be null or point to a valid `MicaHashSet`; the set must not
/// be mutated while the cursor is in use.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn mica_rt_hashset_iter(set: *const MicaHashSet) -> MicaHashSetIter {
    let Some(set) = (unsafe { set.as_ref() }) else {
        return MicaHashSetIter {
            entries: ptr::null(),
            states: ptr::null(),
            index: 0,
            cap: 0,
            elem_size: 0,
            elem_align: 0,
        };
    };
    MicaHashSetIter {
        entries: set.entries,
        states: set.states,
        index: 0,
        cap: set.cap,
        elem_size: set.elem_size,
        elem_align: set.elem_align,
    }
}

fn iter_advance(iter: &mut MicaHashSetIter) -> Option<*const u8> {
    while iter.index < iter.cap {
        let index = iter.index;
        iter.index += 1;
        // Safety: index < cap and the arrays outlive the cursor.
        unsafe {
            if iter.states.add(index).read() == BUCKET_OCCUPIED {
                return Some(iter.entries.add(index * iter.elem_size));
            }
        }
    }
    None
}

/// Copy the next element into `out`, or `IterationComplete` (out untouched).
///
/// # Safety
/// `iter` must come from [`mica_rt_hashset_iter`] over a still-valid set;
/// `out` must describe a writable slot of the element layout.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn mica_rt_hashset_iter_next(
    iter: *mut MicaHashSetIter,
    out: *const ValueMutPtr,
) -> i32 {
    let Some(iter) = (unsafe { iter.as_mut() }) else {
        return HashSetError::InvalidPointer as i32;
    };
    let Some(out) = (unsafe { out.as_ref() }) else {
        return HashSetError::InvalidPointer as i32;
    };
    if (out.ptr.is_null() && iter.elem_size > 0)
        || !out.matches_layout(iter.elem_size, iter.elem_align)
    {
        return HashSetError::InvalidPointer as i32;
    }
    match iter_advance(iter) {
        Some(entry) => {
            // Safety: entry points at a live element.
            unsafe { ptr::copy_nonoverlapping(entry, out.ptr, iter.elem_size) };
            HashSetError::Success as i32
        }
        None => HashSetError::IterationComplete as i32,
    }
}

/// Borrow the next element in place; a null descriptor means complete.
///
/// # Safety
/// `iter` must come from [`mica_rt_hashset_iter`] over a still-valid set.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn mica_rt_hashset_iter_next_ptr(iter: *mut MicaHashSetIter) -> ValueConstPtr {
    let Some(iter) = (unsafe { iter.as_mut() }) else {
        return ValueConstPtr::null();
    };
    match iter_advance(iter) {
        Some(entry) => ValueConstPtr {
            ptr: entry,
            size: iter.elem_size,
            align: iter.elem_align,
        },
        None => ValueConstPtr::null(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::collections::BTreeSet;
    use std::sync::atomic::{AtomicUsize, Ordering};

    unsafe extern "C" fn eq_u64(left: *const u8, right: *const u8) -> i32 {
        i32::from(unsafe { left.cast::<u64>().read() == right.cast::<u64>().read() })
    }

    fn hash_u64(v: u64) -> u64 {
        v.wrapping_mul(0x9E37_79B9_7F4A_7C15)
    }

    fn u64_set() -> MicaHashSet {
        mica_rt_hashset_new(8, 8, 0, eq_u64 as usize)
    }

    fn desc(v: &u64) -> ValueConstPtr {
        ValueConstPtr {
            ptr: (v as *const u64).cast(),
            size: 8,
            align: 8,
        }
    }

    fn insert(set: &mut MicaHashSet, v: u64) -> (i32, i32) {
        let value = v;
        let d = desc(&value);
        let mut inserted = -1;
        let rc = unsafe {
            mica_rt_hashset_insert(set, hash_u64(v), &raw const d, &raw mut inserted)
        };
        (rc, inserted)
    }

    fn contains(set: &MicaHashSet, v: u64) -> bool {
        let value = v;
        let d = desc(&value);
        unsafe { mica_rt_hashset_contains(set, hash_u64(v), &raw const d) != 0 }
    }

    fn remove(set: &mut MicaHashSet, v: u64) -> bool {
        let value = v;
        let d = desc(&value);
        unsafe { mica_rt_hashset_remove(set, hash_u64(v), &raw const d) != 0 }
    }

    fn collect(set: &MicaHashSet) -> BTreeSet<u64> {
        let mut iter = unsafe { mica_rt_hashset_iter(set) };
        let mut out = BTreeSet::new();
        loop {
            let p = unsafe { mica_rt_hashset_iter_next_ptr(&raw mut iter) };
            if p.ptr.is_null() {
                break;
            }
            out.insert(unsafe { p.ptr.cast::<u64>().read() });
        }
        out
    }

    #[test]
    fn test_insert_and_contains() {
        let mut set = u64_set();
        assert_eq!(insert(&mut set, 7), (0, 1));
        assert_eq!(insert(&mut set, 7), (0, 0)); // duplicate
        assert_eq!(insert(&mut set, 9), (0, 1));
        assert_eq!(set.len, 2);
        assert!(contains(&set, 7));
        assert!(contains(&set, 9));
        assert!(!contains(&set, 8));
        unsafe { mica_rt_hashset_drop(&raw mut set) };
    }

    #[test]
    fn test_growth_preserves_entries() {
        let mut set = u64_set();
        for v in 0..100u64 {
            assert_eq!(insert(&mut set, v), (0, 1));
        }
        assert_eq!(set.len, 100);
        assert!(set.cap.is_power_of_two());
        assert!(set.cap >= 128);
        for v in 0..100u64 {
            assert!(contains(&set, v));
        }
        unsafe { mica_rt_hashset_drop(&raw mut set) };
    }

    #[test]
    fn test_remove_parity_scenario() {
        let mut set = u64_set();
        for v in 0..1000u64 {
            insert(&mut set, v);
        }
        for v in (0..1000u64).step_by(2) {
            assert!(remove(&mut set, v));
        }
        assert_eq!(set.len, 500);
        for v in 0..1000u64 {
            assert_eq!(contains(&set, v), v % 2 == 1, "key {v}");
        }
        unsafe { mica_rt_hashset_drop(&raw mut set) };
    }

    #[test]
    fn test_tombstone_reuse_and_reinsert() {
        // Force every key onto one probe chain with a constant hash
        let mut set = u64_set();
        let constant_hash = 0xABCD;
        for v in [1u64, 2, 3] {
            let d = desc(&v);
            let mut ins = 0;
            assert_eq!(
                unsafe { mica_rt_hashset_insert(&raw mut set, constant_hash, &raw const d, &raw mut ins) },
                0
            );
        }
        // Remove the middle of the chain, then reinsert it
        let two = 2u64;
        let d = desc(&two);
        assert_eq!(
            unsafe { mica_rt_hashset_remove(&raw mut set, constant_hash, &raw const d) },
            1
        );
        assert_eq!(set.tombstones, 1);
        let mut ins = 0;
        assert_eq!(
            unsafe { mica_rt_hashset_insert(&raw mut set, constant_hash, &raw const d, &raw mut ins) },
            0
        );
        assert_eq!(ins, 1);
        // The tombstone was reclaimed: no duplicate, no leftover grave
        assert_eq!(set.len, 3);
        assert_eq!(set.tombstones, 0);
        let mut ins2 = 0;
        assert_eq!(
            unsafe { mica_rt_hashset_insert(&raw mut set, constant_hash, &raw const d, &raw mut ins2) },
            0
        );
        assert_eq!(ins2, 0);
        unsafe { mica_rt_hashset_drop(&raw mut set) };
    }

    #[test]
    fn test_replace_hands_back_old_element() {
        let mut set = u64_set();
        insert(&mut set, 42);
        let new_value = 42u64;
        let d = desc(&new_value);
        let mut old: u64 = 0;
        let out = ValueMutPtr {
            ptr: (&raw mut old).cast(),
            size: 8,
            align: 8,
        };
        let mut replaced = 0;
        let rc = unsafe {
            mica_rt_hashset_replace(
                &raw mut set,
                hash_u64(42),
                &raw const d,
                &raw const out,
                &raw mut replaced,
            )
        };
        assert_eq!(rc, 0);
        assert_eq!(replaced, 1);
        assert_eq!(old, 42);
        assert_eq!(set.len, 1);
        unsafe { mica_rt_hashset_drop(&raw mut set) };
    }

    #[test]
    fn test_take_moves_element_out() {
        let mut set = u64_set();
        insert(&mut set, 5);
        let five = 5u64;
        let d = desc(&five);
        let mut out_val: u64 = 0;
        let out = ValueMutPtr {
            ptr: (&raw mut out_val).cast(),
            size: 8,
            align: 8,
        };
        let rc = unsafe {
            mica_rt_hashset_take(&raw mut set, hash_u64(5), &raw const d, &raw const out)
        };
        assert_eq!(rc, 0);
        assert_eq!(out_val, 5);
        assert_eq!(set.len, 0);
        let rc = unsafe {
            mica_rt_hashset_take(&raw mut set, hash_u64(5), &raw const d, &raw const out)
        };
        assert_eq!(rc, HashSetError::NotFound as i32);
        unsafe { mica_rt_hashset_drop(&raw mut set) };
    }

    #[test]
    fn test_take_at_by_bucket() {
        let mut set = u64_set();
        insert(&mut set, 31);
        // Find the occupied bucket through the introspection surface
        let bucket = (0..set.cap)
            .find(|&i| unsafe { mica_rt_hashset_bucket_state(&raw const set, i) } == BUCKET_OCCUPIED)
            .unwrap();
        assert_eq!(
            unsafe { mica_rt_hashset_bucket_hash(&raw const set, bucket) },
            hash_u64(31)
        );
        let mut out_val: u64 = 0;
        let out = ValueMutPtr {
            ptr: (&raw mut out_val).cast(),
            size: 8,
            align: 8,
        };
        assert_eq!(
            unsafe { mica_rt_hashset_take_at(&raw mut set, bucket, &raw const out) },
            0
        );
        assert_eq!(out_val, 31);
        assert_eq!(set.len, 0);
        unsafe { mica_rt_hashset_drop(&raw mut set) };
    }

    static DROPS: AtomicUsize = AtomicUsize::new(0);

    unsafe extern "C" fn counting_drop(_elem: *mut u8) {
        DROPS.fetch_add(1, Ordering::Relaxed);
    }

    #[test]
    fn test_drop_and_clear_run_element_drops() {
        let mut set = mica_rt_hashset_new(8, 8, counting_drop as usize, eq_u64 as usize);
        for v in 0..10u64 {
            insert(&mut set, v);
        }
        let before = DROPS.load(Ordering::Relaxed);
        assert_eq!(unsafe { mica_rt_hashset_clear(&raw mut set) }, 0);
        assert_eq!(DROPS.load(Ordering::Relaxed), before + 10);
        assert_eq!(set.len, 0);
        assert!(set.cap > 0);
        for v in 0..3u64 {
            insert(&mut set, v);
        }
        unsafe { mica_rt_hashset_drop(&raw mut set) };
        assert_eq!(DROPS.load(Ordering::Relaxed), before + 13);
        assert_eq!(set.cap, 0);
        // Double drop is a no-op
        unsafe { mica_rt_hashset_drop(&raw mut set) };
        assert_eq!(DROPS.load(Ordering::Relaxed), before + 13);
    }

    #[test]
    fn test_shrink_to_purges_tombstones() {
        let mut set = u64_set();
        for v in 0..50u64 {
            insert(&mut set, v);
        }
        for v in 0..40u64 {
            remove(&mut set, v);
        }
        assert!(set.tombstones > 0);
        let cap_before = set.cap;
        assert_eq!(unsafe { mica_rt_hashset_shrink_to(&raw mut set, 0) }, 0);
        assert_eq!(set.tombstones, 0);
        assert!(set.cap < cap_before);
        assert_eq!(collect(&set), (40..50).collect::<BTreeSet<_>>());
        unsafe { mica_rt_hashset_drop(&raw mut set) };
    }

    #[test]
    fn test_with_capacity_avoids_rehash() {
        let mut set = mica_rt_hashset_with_capacity(8, 8, 100, 0, eq_u64 as usize);
        let cap = set.cap;
        assert!(cap >= 128);
        for v in 0..100u64 {
            insert(&mut set, v);
        }
        assert_eq!(set.cap, cap);
        unsafe { mica_rt_hashset_drop(&raw mut set) };
    }

    #[test]
    fn test_iter_next_copies() {
        let mut set = u64_set();
        insert(&mut set, 77);
        let mut iter = unsafe { mica_rt_hashset_iter(&raw const set) };
        let mut out_val: u64 = 0;
        let out = ValueMutPtr {
            ptr: (&raw mut out_val).cast(),
            size: 8,
            align: 8,
        };
        assert_eq!(
            unsafe { mica_rt_hashset_iter_next(&raw mut iter, &raw const out) },
            0
        );
        assert_eq!(out_val, 77);
        assert_eq!(
            unsafe { mica_rt_hashset_iter_next(&raw mut iter, &raw const out) },
            HashSetError::IterationComplete as i32
        );
        unsafe { mica_rt_hashset_drop(&raw mut set) };
    }

    proptest! {
        // Reserve never changes the member set
        #[test]
        fn prop_reserve_preserves_entries(
            values in proptest::collection::btree_set(any::<u64>(), 0..64),
            extra in 0usize..256,
        ) {
            let mut set = u64_set();
            for &v in &values {
                insert(&mut set, v);
            }
            let before = collect(&set);
            prop_assert_eq!(unsafe { mica_rt_hashset_reserve(&raw mut set, extra) }, 0);
            prop_assert_eq!(collect(&set), before);
            unsafe { mica_rt_hashset_drop(&raw mut set) };
        }

        // Remove/reinsert under collisions never duplicates entries
        #[test]
        fn prop_tombstone_invisibility(
            values in proptest::collection::vec(0u64..32, 1..64),
        ) {
            let mut set = u64_set();
            let mut model = BTreeSet::new();
            for (step, &v) in values.iter().enumerate() {
                // Constant hash: every key shares one probe chain
                let d = desc(&v);
                if step % 3 == 2 {
                    unsafe { mica_rt_hashset_remove(&raw mut set, 1, &raw const d) };
                    model.remove(&v);
                } else {
                    let mut ins = 0;
                    prop_assert_eq!(
                        unsafe { mica_rt_hashset_insert(&raw mut set, 1, &raw const d, &raw mut ins) },
                        0
                    );
                    model.insert(v);
                }
            }
            prop_assert_eq!(set.len, model.len());
            prop_assert_eq!(collect(&set), model);
            unsafe { mica_rt_hashset_drop(&raw mut set) };
        }
    }
}
