//! MicaHashMap - open-addressed, type-erased hash map
//!
//! A variant of the hash set whose entry slot holds the key immediately
//! followed by the value at a computed offset: `value_offset` is the key
//! size rounded up to the value's alignment, and the entry stride is the
//! whole pair rounded up to the stricter of the two alignments. The key
//! sits at offset 0, so the probing logic in the table module compares keys
//! for the map exactly as it compares elements for the set.
//!
//! Equality uses the key alone; values are never compared. An insert that
//! matches an existing key keeps the stored key bytes, replaces only the
//! value, and does not consume the caller's key.
//!
//! # Safety Invariants
//! - as for the hash set, with "element" = key||value pair at the computed
//!   entry layout

use crate::dispatch::drop_invoke;
use crate::table::{
    self, BUCKET_EMPTY, BUCKET_OCCUPIED, Buckets, Slot, TableError,
};
use mica_core::{ValueConstPtr, ValueMutPtr};
use std::ptr;

/// The map representation the compiler lays out. Field offsets are ABI.
#[repr(C)]
#[derive(Debug)]
pub struct MicaHashMap {
    pub entries: *mut u8,
    pub states: *mut u8,
    pub hashes: *mut u8,
    pub len: usize,
    pub cap: usize,
    pub tombstones: usize,
    pub key_size: usize,
    pub key_align: usize,
    pub value_size: usize,
    pub value_align: usize,
    pub entry_size: usize,
    pub value_offset: usize,
    pub key_drop_fn: usize,
    pub value_drop_fn: usize,
    pub key_eq_fn: usize,
}

/// Iteration cursor. The map must not be mutated while a cursor is live.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct MicaHashMapIter {
    pub entries: *const u8,
    pub states: *const u8,
    pub index: usize,
    pub cap: usize,
    pub entry_size: usize,
    pub key_size: usize,
    pub key_align: usize,
    pub value_size: usize,
    pub value_align: usize,
    pub value_offset: usize,
}

/// Error codes for hash map operations.
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HashMapError {
    Success = 0,
    AllocationFailed = 1,
    InvalidPointer = 2,
    CapacityOverflow = 3,
    NotFound = 4,
    IterationComplete = 5,
}

impl From<TableError> for HashMapError {
    fn from(e: TableError) -> Self {
        match e {
            TableError::AllocationFailed => HashMapError::AllocationFailed,
            TableError::CapacityOverflow => HashMapError::CapacityOverflow,
        }
    }
}

fn code(result: Result<(), HashMapError>) -> i32 {
    match result {
        Ok(()) => HashMapError::Success as i32,
        Err(e) => e as i32,
    }
}

fn round_up(value: usize, align: usize) -> usize {
    let align = align.max(1);
    value.div_ceil(align) * align
}

impl MicaHashMap {
    #[allow(clippy::too_many_arguments)]
    fn construct(
        key_size: usize,
        key_align: usize,
        value_size: usize,
        value_align: usize,
        key_drop_fn: usize,
        value_drop_fn: usize,
        key_eq_fn: usize,
    ) -> Self {
        let entry_align = key_align.max(value_align).max(1);
        let value_offset = round_up(key_size, value_align);
        let entry_size = round_up(value_offset + value_size, entry_align);
        MicaHashMap {
            entries: ptr::null_mut(),
            states: ptr::null_mut(),
            hashes: ptr::null_mut(),
            len: 0,
            cap: 0,
            tombstones: 0,
            key_size,
            key_align,
            value_size,
            value_align,
            entry_size,
            value_offset,
            key_drop_fn,
            value_drop_fn,
            key_eq_fn,
        }
    }

    fn entry_align(&self) -> usize {
        self.key_align.max(self.value_align).max(1)
    }

    fn buckets(&self) -> Buckets {
        Buckets {
            entries: self.entries,
            states: self.states,
            hashes: self.hashes,
            cap: self.cap,
            entry_size: self.entry_size,
        }
    }

    fn grow_to(&mut self, new_cap: usize) -> Result<(), HashMapError> {
        let arrays = unsafe { table::rehash(&self.buckets(), new_cap, self.entry_align())? };
        // Safety: the old arrays are fully superseded by the rehash.
        unsafe {
            table::free_arrays(
                self.entries,
                self.states,
                self.hashes,
                self.cap,
                self.entry_size,
                self.entry_align(),
            );
        }
        self.entries = arrays.entries;
        self.states = arrays.states;
        self.hashes = arrays.hashes;
        self.cap = new_cap;
        self.tombstones = 0;
        Ok(())
    }

    fn ensure_room_for_insert(&mut self) -> Result<(), HashMapError> {
        if table::over_load(self.len, self.tombstones, self.cap) {
            self.grow_to(table::grown_capacity(self.cap)?)?;
        }
        Ok(())
    }

    /// Drop the key then the value of every occupied bucket.
    fn drop_occupied(&mut self) {
        let buckets = self.buckets();
        for index in 0..self.cap {
            // Safety: index < cap; occupied buckets hold live pairs.
            unsafe {
                if buckets.state(index) == BUCKET_OCCUPIED {
                    let entry = buckets.entry_at(index);
                    drop_invoke(self.key_drop_fn, entry);
                    drop_invoke(self.value_drop_fn, entry.add(self.value_offset));
                }
            }
        }
    }

    unsafe fn bury(&mut self, index: usize) {
        // Safety: caller keeps index < cap.
        unsafe {
            self.buckets()
                .set_state(index, table::BUCKET_TOMBSTONE)
        };
        self.len -= 1;
        self.tombstones += 1;
    }
}

unsafe fn expect_key(
    map: &MicaHashMap,
    key: *const ValueConstPtr,
) -> Result<ValueConstPtr, HashMapError> {
    let k = unsafe { key.as_ref() }.ok_or(HashMapError::InvalidPointer)?;
    if (k.ptr.is_null() && map.key_size > 0) || !k.matches_layout(map.key_size, map.key_align) {
        return Err(HashMapError::InvalidPointer);
    }
    Ok(*k)
}

unsafe fn expect_value(
    map: &MicaHashMap,
    value: *const ValueConstPtr,
) -> Result<ValueConstPtr, HashMapError> {
    let v = unsafe { value.as_ref() }.ok_or(HashMapError::InvalidPointer)?;
    if (v.ptr.is_null() && map.value_size > 0) || !v.matches_layout(map.value_size, map.value_align)
    {
        return Err(HashMapError::InvalidPointer);
    }
    Ok(*v)
}

unsafe fn expect_out(
    out: *const ValueMutPtr,
    size: usize,
    align: usize,
) -> Result<ValueMutPtr, HashMapError> {
    let v = unsafe { out.as_ref() }.ok_or(HashMapError::InvalidPointer)?;
    if (v.ptr.is_null() && size > 0) || !v.matches_layout(size, align) {
        return Err(HashMapError::InvalidPointer);
    }
    Ok(*v)
}

// ============================================================================
// Construction and teardown
// ============================================================================

#[unsafe(no_mangle)]
pub extern "C" fn mica_rt_hashmap_new(
    key_size: usize,
    key_align: usize,
    value_size: usize,
    value_align: usize,
    key_drop_fn: usize,
    value_drop_fn: usize,
    key_eq_fn: usize,
) -> MicaHashMap {
    MicaHashMap::construct(
        key_size,
        key_align,
        value_size,
        value_align,
        key_drop_fn,
        value_drop_fn,
        key_eq_fn,
    )
}

/// A map pre-sized for `capacity` pairs. Falls back to the empty table if
/// the allocation cannot be satisfied.
#[unsafe(no_mangle)]
#[allow(clippy::too_many_arguments)]
pub extern "C" fn mica_rt_hashmap_with_capacity(
    key_size: usize,
    key_align: usize,
    value_size: usize,
    value_align: usize,
    capacity: usize,
    key_drop_fn: usize,
    value_drop_fn: usize,
    key_eq_fn: usize,
) -> MicaHashMap {
    let mut map = MicaHashMap::construct(
        key_size,
        key_align,
        value_size,
        value_align,
        key_drop_fn,
        value_drop_fn,
        key_eq_fn,
    );
    if capacity > 0 {
        if let Ok(cap) = table::capacity_for(capacity) {
            let _ = map.grow_to(cap);
        }
    }
    map
}

/// Drop every pair, release the arrays, and reset the struct. Safe to call
/// twice.
///
/// # Safety
/// `map` must be null or point to a valid `MicaHashMap`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn mica_rt_hashmap_drop(map: *mut MicaHashMap) {
    let Some(map) = (unsafe { map.as_mut() }) else {
        return;
    };
    map.drop_occupied();
    // Safety: the arrays belong to this map and are released exactly once.
    unsafe {
        table::free_arrays(
            map.entries,
            map.states,
            map.hashes,
            map.cap,
            map.entry_size,
            map.entry_align(),
        );
    }
    *map = MicaHashMap::construct(
        map.key_size,
        map.key_align,
        map.value_size,
        map.value_align,
        map.key_drop_fn,
        map.value_drop_fn,
        map.key_eq_fn,
    );
}

/// Drop every pair; the arrays are kept at their current capacity.
///
/// # Safety
/// `map` must be null or point to a valid `MicaHashMap`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn mica_rt_hashmap_clear(map: *mut MicaHashMap) -> i32 {
    let Some(map) = (unsafe { map.as_mut() }) else {
        return HashMapError::InvalidPointer as i32;
    };
    map.drop_occupied();
    if map.cap > 0 && !map.states.is_null() {
        // Safety: the state array holds cap bytes.
        unsafe { ptr::write_bytes(map.states, BUCKET_EMPTY, map.cap) };
    }
    map.len = 0;
    map.tombstones = 0;
    HashMapError::Success as i32
}

// ============================================================================
// Capacity management
// ============================================================================

/// Ensure room for `additional` more pairs without another rehash.
///
/// # Safety
/// `map` must be null or point to a valid `MicaHashMap`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn mica_rt_hashmap_reserve(map: *mut MicaHashMap, additional: usize) -> i32 {
    let Some(map) = (unsafe { map.as_mut() }) else {
        return HashMapError::InvalidPointer as i32;
    };
    let Some(needed) = map.len.checked_add(additional) else {
        return HashMapError::CapacityOverflow as i32;
    };
    if !table::over_load(needed, map.tombstones, map.cap) {
        return HashMapError::Success as i32;
    }
    let target = match table::capacity_for(needed) {
        Ok(cap) => cap.max(map.cap),
        Err(e) => return HashMapError::from(e) as i32,
    };
    code(map.grow_to(target))
}

/// Rehash into the smallest power-of-two capacity holding the live pairs
/// and at least `min_capacity` buckets. Purges tombstones.
///
/// # Safety
/// `map` must be null or point to a valid `MicaHashMap`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn mica_rt_hashmap_shrink_to(
    map: *mut MicaHashMap,
    min_capacity: usize,
) -> i32 {
    let Some(map) = (unsafe { map.as_mut() }) else {
        return HashMapError::InvalidPointer as i32;
    };
    if map.cap == 0 {
        return HashMapError::Success as i32;
    }
    if map.len == 0 && min_capacity == 0 {
        unsafe {
            table::free_arrays(
                map.entries,
                map.states,
                map.hashes,
                map.cap,
                map.entry_size,
                map.entry_align(),
            );
        }
        *map = MicaHashMap::construct(
            map.key_size,
            map.key_align,
            map.value_size,
            map.value_align,
            map.key_drop_fn,
            map.value_drop_fn,
            map.key_eq_fn,
        );
        return HashMapError::Success as i32;
    }
    let target = match table::shrink_capacity_for(min_capacity, map.len) {
        Ok(cap) => cap,
        Err(e) => return HashMapError::from(e) as i32,
    };
    if target == map.cap && map.tombstones == 0 {
        return HashMapError::Success as i32;
    }
    code(map.grow_to(target))
}

// ============================================================================
// Lookup and mutation
// ============================================================================

/// Insert or update the pair for `key`. On a matching key the stored key
/// bytes are retained, the old value moves into `previous` (or is dropped
/// when none is supplied), the new value is copied in, and the caller's key
/// is not consumed. `*replaced` reports which path was taken.
///
/// # Safety
/// `map` must be a valid map; `key`/`value` must describe readable values
/// of the map's layouts; `previous` must be null or describe a writable
/// value slot; `replaced` must be null or writable.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn mica_rt_hashmap_insert(
    map: *mut MicaHashMap,
    hash: u64,
    key: *const ValueConstPtr,
    value: *const ValueConstPtr,
    previous: *const ValueMutPtr,
    replaced: *mut i32,
) -> i32 {
    let Some(map) = (unsafe { map.as_mut() }) else {
        return HashMapError::InvalidPointer as i32;
    };
    let key = match unsafe { expect_key(map, key) } {
        Ok(k) => k,
        Err(e) => return e as i32,
    };
    let value = match unsafe { expect_value(map, value) } {
        Ok(v) => v,
        Err(e) => return e as i32,
    };
    if let Err(e) = map.ensure_room_for_insert() {
        return e as i32;
    }
    let buckets = map.buckets();
    // Safety: the table is allocated and under the load limit.
    match unsafe { buckets.find_slot(hash, key.ptr, map.key_eq_fn) } {
        Slot::Existing(index) => {
            // Safety: occupied bucket; only the value half changes.
            unsafe {
                let value_slot = buckets.entry_at(index).add(map.value_offset);
                match previous.as_ref() {
                    Some(prev) if !prev.ptr.is_null() => {
                        if !prev.matches_layout(map.value_size, map.value_align) {
                            return HashMapError::InvalidPointer as i32;
                        }
                        ptr::copy_nonoverlapping(value_slot, prev.ptr, map.value_size);
                    }
                    _ => drop_invoke(map.value_drop_fn, value_slot),
                }
                ptr::copy_nonoverlapping(value.ptr, value_slot, map.value_size);
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
                let entry = buckets.entry_at(index);
                ptr::copy_nonoverlapping(key.ptr, entry, map.key_size);
                ptr::copy_nonoverlapping(value.ptr, entry.add(map.value_offset), map.value_size);
                buckets.set_state(index, BUCKET_OCCUPIED);
                buckets.set_hash(index, hash);
            }
            map.len += 1;
            if reclaims_tombstone {
                map.tombstones -= 1;
            }
            if !replaced.is_null() {
                // Safety: checked non-null.
                unsafe { replaced.write(0) };
            }
        }
    }
    HashMapError::Success as i32
}

/// # Safety
/// `map` must be null or valid; `key` must describe a readable key.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn mica_rt_hashmap_contains(
    map: *const MicaHashMap,
    hash: u64,
    key: *const ValueConstPtr,
) -> i32 {
    let Some(map) = (unsafe { map.as_ref() }) else {
        return 0;
    };
    let Ok(key) = (unsafe { expect_key(map, key) }) else {
        return 0;
    };
    // Safety: the arrays are live for cap buckets.
    i32::from(unsafe { map.buckets().find(hash, key.ptr, map.key_eq_fn) }.is_some())
}

/// Borrow the VALUE stored for `key`; a null descriptor on a miss.
///
/// # Safety
/// `map` must be null or valid; `key` must describe a readable key.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn mica_rt_hashmap_get_ptr(
    map: *const MicaHashMap,
    hash: u64,
    key: *const ValueConstPtr,
) -> ValueConstPtr {
    let Some(map) = (unsafe { map.as_ref() }) else {
        return ValueConstPtr::null();
    };
    let Ok(key) = (unsafe { expect_key(map, key) }) else {
        return ValueConstPtr::null();
    };
    // Safety: the arrays are live for cap buckets.
    match unsafe { map.buckets().find(hash, key.ptr, map.key_eq_fn) } {
        Some(index) => ValueConstPtr {
            // Safety: index < cap.
            ptr: unsafe { map.buckets().entry_at(index).add(map.value_offset) },
            size: map.value_size,
            align: map.value_align,
        },
        None => ValueConstPtr::null(),
    }
}

/// Move the value for `key` out into the caller's buffer; the stored key is
/// dropped.
///
/// # Safety
/// `map` must be a valid map; `key` readable; `out` writable at the value
/// layout.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn mica_rt_hashmap_take(
    map: *mut MicaHashMap,
    hash: u64,
    key: *const ValueConstPtr,
    out: *const ValueMutPtr,
) -> i32 {
    let Some(map) = (unsafe { map.as_mut() }) else {
        return HashMapError::InvalidPointer as i32;
    };
    let key = match unsafe { expect_key(map, key) } {
        Ok(k) => k,
        Err(e) => return e as i32,
    };
    let out = match unsafe { expect_out(out, map.value_size, map.value_align) } {
        Ok(v) => v,
        Err(e) => return e as i32,
    };
    // Safety: the arrays are live for cap buckets.
    match unsafe { map.buckets().find(hash, key.ptr, map.key_eq_fn) } {
        Some(index) => {
            // Safety: occupied bucket; the value moves out, the key drops.
            unsafe {
                let entry = map.buckets().entry_at(index);
                ptr::copy_nonoverlapping(entry.add(map.value_offset), out.ptr, map.value_size);
                drop_invoke(map.key_drop_fn, entry);
                map.bury(index);
            }
            HashMapError::Success as i32
        }
        None => HashMapError::NotFound as i32,
    }
}

/// Remove and drop the pair for `key`. Returns 1 if a pair was removed, 0
/// if none matched.
///
/// # Safety
/// `map` must be null or valid; `key` must describe a readable key.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn mica_rt_hashmap_remove(
    map: *mut MicaHashMap,
    hash: u64,
    key: *const ValueConstPtr,
) -> i32 {
    let Some(map) = (unsafe { map.as_mut() }) else {
        return 0;
    };
    let Ok(key) = (unsafe { expect_key(map, key) }) else {
        return 0;
    };
    // Safety: the arrays are live for cap buckets.
    match unsafe { map.buckets().find(hash, key.ptr, map.key_eq_fn) } {
        Some(index) => {
            // Safety: occupied bucket.
            unsafe {
                let entry = map.buckets().entry_at(index);
                drop_invoke(map.key_drop_fn, entry);
                drop_invoke(map.value_drop_fn, entry.add(map.value_offset));
                map.bury(index);
            }
            1
        }
        None => 0,
    }
}

/// Move the pair in bucket `index` out, by position rather than key.
///
/// # Safety
/// `map` must be a valid map; `key_out`/`value_out` must describe writable
/// slots of the respective layouts.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn mica_rt_hashmap_take_at(
    map: *mut MicaHashMap,
    index: usize,
    key_out: *const ValueMutPtr,
    value_out: *const ValueMutPtr,
) -> i32 {
    let Some(map) = (unsafe { map.as_mut() }) else {
        return HashMapError::InvalidPointer as i32;
    };
    let key_out = match unsafe { expect_out(key_out, map.key_size, map.key_align) } {
        Ok(v) => v,
        Err(e) => return e as i32,
    };
    let value_out = match unsafe { expect_out(value_out, map.value_size, map.value_align) } {
        Ok(v) => v,
        Err(e) => return e as i32,
    };
    if index >= map.cap {
        return HashMapError::NotFound as i32;
    }
    // Safety: index < cap.
    if unsafe { map.buckets().state(index) } != BUCKET_OCCUPIED {
        return HashMapError::NotFound as i32;
    }
    // Safety: occupied bucket; both halves move out.
    unsafe {
        let entry = map.buckets().entry_at(index);
        ptr::copy_nonoverlapping(entry, key_out.ptr, map.key_size);
        ptr::copy_nonoverlapping(
            entry.add(map.value_offset),
            value_out.ptr,
            map.value_size,
        );
        map.bury(index);
    }
    HashMapError::Success as i32
}

// ============================================================================
// Introspection
// ============================================================================

/// # Safety
/// `map` must be null or point to a valid `MicaHashMap`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn mica_rt_hashmap_len(map: *const MicaHashMap) -> usize {
    unsafe { map.as_ref() }.map_or(0, |m| m.len)
}

/// # Safety
/// `map` must be null or point to a valid `MicaHashMap`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn mica_rt_hashmap_capacity(map: *const MicaHashMap) -> usize {
    unsafe { map.as_ref() }.map_or(0, |m| m.cap)
}

/// State byte of bucket `index` (empty for out-of-range indices).
///
/// # Safety
/// `map` must be null or point to a valid `MicaHashMap`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn mica_rt_hashmap_bucket_state(map: *const MicaHashMap, index: usize) -> u8 {
    let Some(map) = (unsafe { map.as_ref() }) else {
        return BUCKET_EMPTY;
    };
    if index >= map.cap {
        return BUCKET_EMPTY;
    }
    // Safety: index < cap.
    unsafe { map.buckets().state(index) }
}

/// Stored hash of bucket `index` (0 for out-of-range or dead buckets).
///
/// # Safety
/// `map` must be null or point to a valid `MicaHashMap`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn mica_rt_hashmap_bucket_hash(map: *const MicaHashMap, index: usize) -> u64 {
    let Some(map) = (unsafe { map.as_ref() }) else {
        return 0;
    };
    if index >= map.cap {
        return 0;
    }
    // Safety: index < cap.
    unsafe {
        if map.buckets().state(index) == BUCKET_OCCUPIED {
            map.buckets().hash_at(index)
        } else {
            0
        }
    }
}

// ============================================================================
// Iteration
// ============================================================================

/// # Safety
/// `map` must be null or point to a valid `MicaHashMap`; the map must not
/// be mutated while the cursor is in use.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn mica_rt_hashmap_iter(map: *const MicaHashMap) -> MicaHashMapIter {
    let Some(map) = (unsafe { map.as_ref() }) else {
        return MicaHashMapIter {
            entries: ptr::null(),
            states: ptr::null(),
            index: 0,
            cap: 0,
            entry_size: 0,
            key_size: 0,
            key_align: 0,
            value_size: 0,
            value_align: 0,
            value_offset: 0,
        };
    };
    MicaHashMapIter {
        entries: map.entries,
        states: map.states,
        index: 0,
        cap: map.cap,
        entry_size: map.entry_size,
        key_size: map.key_size,
        key_align: map.key_align,
        value_size: map.value_size,
        value_align: map.value_align,
        value_offset: map.value_offset,
    }
}

fn iter_advance(iter: &mut MicaHashMapIter) -> Option<*const u8> {
    while iter.index < iter.cap {
        let index = iter.index;
        iter.index += 1;
        // Safety: index < cap and the arrays outlive the cursor.
        unsafe {
            if iter.states.add(index).read() == BUCKET_OCCUPIED {
                return Some(iter.entries.add(index * iter.entry_size));
            }
        }
    }
    None
}

/// Copy the next pair into `key_out` / `value_out`, or `IterationComplete`
/// (both untouched).
///
/// # Safety
/// `iter` must come from [`mica_rt_hashmap_iter`] over a still-valid map;
/// the out descriptors must be writable at the respective layouts.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn mica_rt_hashmap_iter_next(
    iter: *mut MicaHashMapIter,
    key_out: *const ValueMutPtr,
    value_out: *const ValueMutPtr,
) -> i32 {
    let Some(iter) = (unsafe { iter.as_mut() }) else {
        return HashMapError::InvalidPointer as i32;
    };
    let key_out = match unsafe { expect_out(key_out, iter.key_size, iter.key_align) } {
        Ok(v) => v,
        Err(e) => return e as i32,
    };
    let value_out = match unsafe { expect_out(value_out, iter.value_size, iter.value_align) } {
        Ok(v) => v,
        Err(e) => return e as i32,
    };
    match iter_advance(iter) {
        Some(entry) => {
            // Safety: entry points at a live pair.
            unsafe {
                ptr::copy_nonoverlapping(entry, key_out.ptr, iter.key_size);
                ptr::copy_nonoverlapping(
                    entry.add(iter.value_offset),
                    value_out.ptr,
                    iter.value_size,
                );
            }
            HashMapError::Success as i32
        }
        None => HashMapError::IterationComplete as i32,
    }
}

/// Borrow the next whole entry (key at offset 0, value at the map's value
/// offset); a null descriptor means complete.
///
/// # Safety
/// `iter` must come from [`mica_rt_hashmap_iter`] over a still-valid map.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn mica_rt_hashmap_iter_next_ptr(iter: *mut MicaHashMapIter) -> ValueConstPtr {
    let Some(iter) = (unsafe { iter.as_mut() }) else {
        return ValueConstPtr::null();
    };
    match iter_advance(iter) {
        Some(entry) => ValueConstPtr {
            ptr: entry,
            size: iter.entry_size,
            align: iter.key_align.max(iter.value_align).max(1),
        },
        None => ValueConstPtr::null(),
    }
}
