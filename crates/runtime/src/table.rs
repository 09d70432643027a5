//! Open-addressing machinery shared by the hash set and hash map
//!
//! Both containers keep three parallel arrays sized by a power-of-two bucket
//! count: entry slots, one state byte per bucket, and the full 64-bit hash
//! per bucket. The hash array makes probe comparisons cheap (hash first,
//! caller-supplied equality only on a hash match); the state byte
//! distinguishes empty buckets from tombstones so probe chains survive
//! removals.
//!
//! Probing is triangular: step i advances by i, visiting
//! `h + i(i+1)/2 mod cap`, which covers every bucket of a power-of-two
//! table. Load is capped at 7/8 of capacity counting tombstones; growth
//! rehashes into freshly allocated arrays and only then releases the old
//! ones, so a failed allocation leaves the table intact.
//!
//! The map stores its key at offset 0 of the entry, so the shared probe
//! logic compares keys identically for both containers; only the entry
//! stride differs.

use crate::dispatch::mica_rt_eq_invoke as eq_invoke;
use mica_core::ValueMutPtr;
use mica_core::alloc::{mica_rt_alloc, mica_rt_alloc_zeroed, mica_rt_free};

pub const BUCKET_EMPTY: u8 = 0;
pub const BUCKET_OCCUPIED: u8 = 1;
pub const BUCKET_TOMBSTONE: u8 = 2;

/// Allocation failures distinguished for the containers' error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableError {
    AllocationFailed,
    CapacityOverflow,
}

/// Outcome of probing for an insertion position.
pub enum Slot {
    /// A bucket already holds an equal key.
    Existing(usize),
    /// First reusable bucket along the probe sequence.
    Vacant {
        index: usize,
        reclaims_tombstone: bool,
    },
}

/// Triangular probe cursor over a power-of-two table.
pub struct ProbeSeq {
    bucket: usize,
    stride: usize,
    mask: usize,
}

impl ProbeSeq {
    pub fn new(hash: u64, cap: usize) -> Self {
        debug_assert!(cap.is_power_of_two());
        ProbeSeq {
            bucket: (hash as usize) & (cap - 1),
            stride: 0,
            mask: cap - 1,
        }
    }

    pub fn bucket(&self) -> usize {
        self.bucket
    }

    pub fn advance(&mut self) {
        self.stride += 1;
        self.bucket = (self.bucket + self.stride) & self.mask;
    }
}

/// True when the table sits at or past the 7/8 load limit (tombstones
/// count). Checked before every insert; a resize purges tombstones.
pub fn over_load(len: usize, tombstones: usize, cap: usize) -> bool {
    if cap == 0 {
        return true;
    }
    len.saturating_add(tombstones).saturating_mul(8) >= cap.saturating_mul(7)
}

/// Smallest power-of-two bucket count (at least 8) that keeps `required`
/// live entries under the load limit.
pub fn capacity_for(required: usize) -> Result<usize, TableError> {
    let mut cap = 8usize;
    while required.saturating_mul(8) >= cap.saturating_mul(7) {
        cap = cap.checked_mul(2).ok_or(TableError::CapacityOverflow)?;
    }
    Ok(cap)
}

/// Doubled capacity for an insert-triggered grow.
pub fn grown_capacity(cap: usize) -> Result<usize, TableError> {
    if cap == 0 {
        return Ok(8);
    }
    cap.checked_mul(2).ok_or(TableError::CapacityOverflow)
}

/// Smallest power-of-two capacity for `shrink_to`: at least `max(min, len)`
/// and never completely full (probes need an empty bucket to terminate).
pub fn shrink_capacity_for(min: usize, len: usize) -> Result<usize, TableError> {
    let required = min.max(len).max(8);
    let cap = required
        .checked_next_power_of_two()
        .ok_or(TableError::CapacityOverflow)?;
    if cap == len {
        cap.checked_mul(2).ok_or(TableError::CapacityOverflow)
    } else {
        Ok(cap)
    }
}

/// Borrowed view over a container's three parallel arrays.
#[derive(Clone, Copy)]
pub struct Buckets {
    pub entries: *mut u8,
    pub states: *mut u8,
    pub hashes: *mut u8,
    pub cap: usize,
    pub entry_size: usize,
}

impl Buckets {
    pub unsafe fn state(&self, index: usize) -> u8 {
        // Safety: caller keeps index < cap.
        unsafe { self.states.add(index).read() }
    }

    pub unsafe fn set_state(&self, index: usize, state: u8) {
        // Safety: caller keeps index < cap.
        unsafe { self.states.add(index).write(state) };
    }

    pub unsafe fn hash_at(&self, index: usize) -> u64 {
        // Safety: caller keeps index < cap; the hash array is 8-aligned.
        unsafe { self.hashes.cast::<u64>().add(index).read() }
    }

    pub unsafe fn set_hash(&self, index: usize, hash: u64) {
        // Safety: caller keeps index < cap.
        unsafe { self.hashes.cast::<u64>().add(index).write(hash) };
    }

    pub unsafe fn entry_at(&self, index: usize) -> *mut u8 {
        // Safety: caller keeps index < cap.
        unsafe { self.entries.add(index * self.entry_size) }
    }

    /// Walk the probe sequence for an equal key. `Empty` terminates,
    /// tombstones are skipped.
    ///
    /// # Safety
    /// The arrays must be live with `cap` power-of-two buckets; `key` must
    /// be readable by `eq_fn`.
    pub unsafe fn find(&self, hash: u64, key: *const u8, eq_fn: usize) -> Option<usize> {
        if self.cap == 0 {
            return None;
        }
        let mut probe = ProbeSeq::new(hash, self.cap);
        loop {
            let index = probe.bucket();
            // Safety: probe stays within cap.
            match unsafe { self.state(index) } {
                BUCKET_EMPTY => return None,
                BUCKET_OCCUPIED => {
                    // Safety: occupied bucket holds a live entry.
                    if unsafe { self.hash_at(index) } == hash
                        && unsafe { eq_invoke(eq_fn, self.entry_at(index), key) } != 0
                    {
                        return Some(index);
                    }
                }
                _ => {}
            }
            probe.advance();
        }
    }

    /// Probe for an insert position: returns the matching bucket if the key
    /// is present, otherwise the first tombstone seen (or the terminating
    /// empty bucket).
    ///
    /// # Safety
    /// As for [`Buckets::find`].
    pub unsafe fn find_slot(&self, hash: u64, key: *const u8, eq_fn: usize) -> Slot {
        debug_assert!(self.cap > 0);
        let mut probe = ProbeSeq::new(hash, self.cap);
        let mut tombstone: Option<usize> = None;
        loop {
            let index = probe.bucket();
            // Safety: probe stays within cap.
            match unsafe { self.state(index) } {
                BUCKET_EMPTY => {
                    return match tombstone {
                        Some(reused) => Slot::Vacant {
                            index: reused,
                            reclaims_tombstone: true,
                        },
                        None => Slot::Vacant {
                            index,
                            reclaims_tombstone: false,
                        },
                    };
                }
                BUCKET_TOMBSTONE => {
                    if tombstone.is_none() {
                        tombstone = Some(index);
                    }
                }
                _ => {
                    // Safety: occupied bucket holds a live entry.
                    if unsafe { self.hash_at(index) } == hash
                        && unsafe { eq_invoke(eq_fn, self.entry_at(index), key) } != 0
                    {
                        return Slot::Existing(index);
                    }
                }
            }
            probe.advance();
        }
    }

    /// First empty bucket for `hash` — rehashing only, where keys are known
    /// unique and no tombstones exist.
    ///
    /// # Safety
    /// The arrays must be live with `cap` power-of-two buckets and at least
    /// one empty bucket.
    pub unsafe fn find_empty(&self, hash: u64) -> usize {
        let mut probe = ProbeSeq::new(hash, self.cap);
        loop {
            let index = probe.bucket();
            // Safety: probe stays within cap.
            if unsafe { self.state(index) } == BUCKET_EMPTY {
                return index;
            }
            probe.advance();
        }
    }
}

/// Freshly allocated parallel arrays (states zeroed, i.e. all empty).
#[derive(Debug)]
pub struct TableArrays {
    pub entries: *mut u8,
    pub states: *mut u8,
    pub hashes: *mut u8,
}

pub fn alloc_arrays(
    cap: usize,
    entry_size: usize,
    entry_align: usize,
) -> Result<TableArrays, TableError> {
    let entry_bytes = cap
        .checked_mul(entry_size)
        .ok_or(TableError::CapacityOverflow)?;
    let hash_bytes = cap.checked_mul(8).ok_or(TableError::CapacityOverflow)?;

    let entries = mica_rt_alloc(entry_bytes, entry_align.max(1));
    if entries.ptr.is_null() {
        return Err(TableError::AllocationFailed);
    }
    let states = mica_rt_alloc_zeroed(cap, 1);
    if states.ptr.is_null() {
        // Safety: entries was just allocated here.
        unsafe { mica_rt_free(entries) };
        return Err(TableError::AllocationFailed);
    }
    let hashes = mica_rt_alloc(hash_bytes, 8);
    if hashes.ptr.is_null() {
        // Safety: both were just allocated here.
        unsafe {
            mica_rt_free(states);
            mica_rt_free(entries);
        }
        return Err(TableError::AllocationFailed);
    }
    Ok(TableArrays {
        entries: entries.ptr,
        states: states.ptr,
        hashes: hashes.ptr,
    })
}

/// Release a table's arrays. No-ops on a zero-capacity table.
///
/// # Safety
/// The pointers must describe arrays produced by [`alloc_arrays`] with the
/// same `cap`/`entry_size`/`entry_align`, not freed since.
pub unsafe fn free_arrays(
    entries: *mut u8,
    states: *mut u8,
    hashes: *mut u8,
    cap: usize,
    entry_size: usize,
    entry_align: usize,
) {
    if cap == 0 {
        return;
    }
    // Safety: caller contract; sizes recompute the original triples.
    unsafe {
        mica_rt_free(ValueMutPtr {
            ptr: entries,
            size: cap * entry_size,
            align: entry_align.max(1),
        });
        mica_rt_free(ValueMutPtr {
            ptr: states,
            size: cap,
            align: 1,
        });
        mica_rt_free(ValueMutPtr {
            ptr: hashes,
            size: cap * 8,
            align: 8,
        });
    }
}

/// Move every occupied entry of `old` into freshly allocated arrays of
/// `new_cap` buckets. Tombstones are discarded. The old arrays are left
/// untouched (the caller swaps and frees on success), so failure is
/// non-destructive.
///
/// # Safety
/// `old` must view live arrays; `new_cap` must be a power of two large
/// enough to hold the occupied entries under the load limit.
pub unsafe fn rehash(
    old: &Buckets,
    new_cap: usize,
    entry_align: usize,
) -> Result<TableArrays, TableError> {
    let arrays = alloc_arrays(new_cap, old.entry_size, entry_align)?;
    let new = Buckets {
        entries: arrays.entries,
        states: arrays.states,
        hashes: arrays.hashes,
        cap: new_cap,
        entry_size: old.entry_size,
    };
    for index in 0..old.cap {
        // Safety: index < old.cap.
        if unsafe { old.state(index) } != BUCKET_OCCUPIED {
            continue;
        }
        // Safety: occupied bucket; the new table has empty buckets by
        // construction.
        unsafe {
            let hash = old.hash_at(index);
            let dest = new.find_empty(hash);
            std::ptr::copy_nonoverlapping(
                old.entry_at(index),
                new.entry_at(dest),
                old.entry_size,
            );
            new.set_state(dest, BUCKET_OCCUPIED);
            new.set_hash(dest, hash);
        }
    }
    Ok(arrays)
}
