//! MicaVec - type-erased growable sequence with small-buffer optimization
//!
//! One implementation serves every element type: the compiler hands the
//! constructor an element layout `(size, align)` and a drop function, and
//! every element crossing the boundary travels as a `(pointer, size, align)`
//! descriptor that must match that layout.
//!
//! The first 64 bytes of elements live inside the struct when the layout
//! permits (`size <= 64`, `align <= 8`); `uses_inline` is the single source
//! of truth for which storage is active, and the data pointer is recomputed
//! from the struct's own inline buffer on every call because compiled code
//! moves these structs freely.
//!
//! A fixed-length "array" shares this representation. Its read surface and
//! the vector↔array conversions live here; the array mutation entry points
//! reject growth with `CapacityOverflow`.
//!
//! # Safety Invariants
//! - heap mode: `ptr` is a live facade allocation of `cap * elem_size`
//!   bytes at `elem_align` (absent only while `cap == 0`)
//! - inline mode: `cap == 64 / elem_size` and elements live in
//!   `inline_storage`
//! - `len <= cap`; elements `[0, len)` are live values of the element type

use crate::dispatch::drop_invoke;
use mica_core::alloc::{mica_rt_alloc, mica_rt_free, mica_rt_realloc};
use mica_core::{RegionHandle, ValueConstPtr, ValueMutPtr};
use std::ptr;

/// Bytes of element storage inside the struct.
pub const VEC_INLINE_BYTES: usize = 64;

// The inline buffer sits at offset 64 in MicaVec, so its effective
// alignment is the struct's own (8).
const INLINE_ALIGN: usize = 8;

#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct InlineBuffer {
    pub bytes: [u8; VEC_INLINE_BYTES],
}

/// The vector representation the compiler lays out. Field offsets are ABI.
#[repr(C)]
#[derive(Debug)]
pub struct MicaVec {
    pub ptr: *mut u8,
    pub len: usize,
    pub cap: usize,
    pub elem_size: usize,
    pub elem_align: usize,
    pub drop_fn: usize,
    pub region: RegionHandle,
    pub uses_inline: bool,
    pub _pad: [u8; 3],
    pub inline_pad: u32,
    pub inline_storage: InlineBuffer,
}

/// Read-only view of a vector's live elements.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct MicaVecView {
    pub data: *const u8,
    pub len: usize,
    pub elem_size: usize,
    pub elem_align: usize,
}

/// Iteration cursor. Borrowing: the source vector must not be mutated while
/// a cursor is live.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct MicaVecIter {
    pub data: *const u8,
    pub index: usize,
    pub len: usize,
    pub elem_size: usize,
    pub elem_align: usize,
}

/// Error codes for vector operations.
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VecError {
    Success = 0,
    AllocationFailed = 1,
    InvalidPointer = 2,
    CapacityOverflow = 3,
    OutOfBounds = 4,
    LengthOverflow = 5,
    IterationComplete = 6,
}

fn code(result: Result<(), VecError>) -> i32 {
    match result {
        Ok(()) => VecError::Success as i32,
        Err(e) => e as i32,
    }
}

fn inline_eligible(elem_size: usize, elem_align: usize) -> bool {
    elem_size > 0 && elem_size <= VEC_INLINE_BYTES && elem_align <= INLINE_ALIGN
}

impl MicaVec {
    fn construct(
        elem_size: usize,
        elem_align: usize,
        drop_fn: usize,
        region: RegionHandle,
    ) -> MicaVec {
        let (uses_inline, cap) = if elem_size == 0 {
            // Zero-sized elements never occupy storage
            (true, usize::MAX)
        } else if inline_eligible(elem_size, elem_align) {
            (true, VEC_INLINE_BYTES / elem_size)
        } else {
            (false, 0)
        };
        MicaVec {
            ptr: ptr::null_mut(),
            len: 0,
            cap,
            elem_size,
            elem_align,
            drop_fn,
            region,
            uses_inline,
            _pad: [0; 3],
            inline_pad: 0,
            inline_storage: InlineBuffer {
                bytes: [0; VEC_INLINE_BYTES],
            },
        }
    }

    fn data(&self) -> *const u8 {
        if self.uses_inline {
            self.inline_storage.bytes.as_ptr()
        } else {
            self.ptr
        }
    }

    fn data_mut(&mut self) -> *mut u8 {
        if self.uses_inline {
            self.inline_storage.bytes.as_mut_ptr()
        } else {
            self.ptr
        }
    }

    // Keep the stored pointer usable for code that reads fields by offset.
    fn sync_ptr(&mut self) {
        if self.uses_inline {
            self.ptr = self.inline_storage.bytes.as_mut_ptr();
        }
    }

    unsafe fn slot(&self, index: usize) -> *const u8 {
        // Safety: caller keeps index within capacity.
        unsafe { self.data().add(index * self.elem_size) }
    }

    unsafe fn slot_mut(&mut self, index: usize) -> *mut u8 {
        // Safety: caller keeps index within capacity.
        unsafe { self.data_mut().add(index * self.elem_size) }
    }

    fn heap_bytes(&self) -> usize {
        if self.uses_inline || self.elem_size == 0 {
            0
        } else {
            self.cap * self.elem_size
        }
    }

    fn reserve_internal(&mut self, additional: usize) -> Result<(), VecError> {
        let required = self
            .len
            .checked_add(additional)
            .ok_or(VecError::CapacityOverflow)?;
        if required <= self.cap {
            self.sync_ptr();
            return Ok(());
        }
        let new_cap = required.max(self.cap.saturating_mul(2));
        let new_bytes = new_cap
            .checked_mul(self.elem_size)
            .ok_or(VecError::CapacityOverflow)?;
        if self.uses_inline {
            let fresh = mica_rt_alloc(new_bytes, self.elem_align.max(1));
            if fresh.ptr.is_null() {
                return Err(VecError::AllocationFailed);
            }
            // Safety: fresh holds new_bytes >= len * elem_size.
            unsafe {
                ptr::copy_nonoverlapping(
                    self.inline_storage.bytes.as_ptr(),
                    fresh.ptr,
                    self.len * self.elem_size,
                );
            }
            self.ptr = fresh.ptr;
            self.cap = new_cap;
            self.uses_inline = false;
        } else if self.cap == 0 {
            let fresh = mica_rt_alloc(new_bytes, self.elem_align.max(1));
            if fresh.ptr.is_null() {
                return Err(VecError::AllocationFailed);
            }
            self.ptr = fresh.ptr;
            self.cap = new_cap;
        } else {
            let existing = ValueMutPtr {
                ptr: self.ptr,
                size: self.heap_bytes(),
                align: self.elem_align.max(1),
            };
            // Safety: existing describes this vector's live heap buffer.
            let moved = unsafe {
                mica_rt_realloc(existing, existing.size, new_bytes, self.elem_align.max(1))
            };
            if moved.ptr.is_null() {
                return Err(VecError::AllocationFailed);
            }
            self.ptr = moved.ptr;
            self.cap = new_cap;
        }
        Ok(())
    }

    fn drop_elements(&mut self, from: usize) {
        for i in from..self.len {
            // Safety: elements [from, len) are live.
            unsafe { drop_invoke(self.drop_fn, self.slot(i).cast_mut()) };
        }
    }

    /// Release storage without touching elements; reset to constructor state.
    fn release_buffer(&mut self) {
        if !self.uses_inline && self.cap > 0 && !self.ptr.is_null() {
            let buffer = ValueMutPtr {
                ptr: self.ptr,
                size: self.heap_bytes(),
                align: self.elem_align.max(1),
            };
            // Safety: heap mode invariant.
            unsafe { mica_rt_free(buffer) };
        }
        *self = MicaVec::construct(self.elem_size, self.elem_align, self.drop_fn, self.region);
        self.sync_ptr();
    }
}

// Frees a detached heap buffer even if an element drop panics mid-teardown.
struct BufferGuard {
    buffer: ValueMutPtr,
}

impl Drop for BufferGuard {
    fn drop(&mut self) {
        if !self.buffer.ptr.is_null() {
            // Safety: the buffer was detached from its vector and is freed
            // exactly once, here.
            unsafe { mica_rt_free(self.buffer) };
        }
    }
}

unsafe fn expect_value(
    vec: &MicaVec,
    value: *const ValueConstPtr,
) -> Result<ValueConstPtr, VecError> {
    let v = unsafe { value.as_ref() }.ok_or(VecError::InvalidPointer)?;
    if (v.ptr.is_null() && vec.elem_size > 0) || !v.matches_layout(vec.elem_size, vec.elem_align) {
        return Err(VecError::InvalidPointer);
    }
    Ok(*v)
}

unsafe fn expect_out(vec: &MicaVec, out: *const ValueMutPtr) -> Result<ValueMutPtr, VecError> {
    let v = unsafe { out.as_ref() }.ok_or(VecError::InvalidPointer)?;
    if (v.ptr.is_null() && vec.elem_size > 0) || !v.matches_layout(vec.elem_size, vec.elem_align) {
        return Err(VecError::InvalidPointer);
    }
    Ok(*v)
}

// ============================================================================
// Construction and teardown
// ============================================================================

#[unsafe(no_mangle)]
pub extern "C" fn mica_rt_vec_new(elem_size: usize, elem_align: usize, drop_fn: usize) -> MicaVec {
    MicaVec::construct(elem_size, elem_align, drop_fn, RegionHandle::none())
}

#[unsafe(no_mangle)]
pub extern "C" fn mica_rt_vec_new_in_region(
    elem_size: usize,
    elem_align: usize,
    drop_fn: usize,
    region: RegionHandle,
) -> MicaVec {
    MicaVec::construct(elem_size, elem_align, drop_fn, region)
}

/// A vector with room for `capacity` elements. Falls back to the empty
/// representation if the reservation cannot be satisfied.
#[unsafe(no_mangle)]
pub extern "C" fn mica_rt_vec_with_capacity(
    elem_size: usize,
    elem_align: usize,
    capacity: usize,
    drop_fn: usize,
) -> MicaVec {
    let mut vec = MicaVec::construct(elem_size, elem_align, drop_fn, RegionHandle::none());
    if capacity > vec.cap {
        let _ = vec.reserve_internal(capacity);
    }
    vec
}

#[unsafe(no_mangle)]
pub extern "C" fn mica_rt_vec_with_capacity_in_region(
    elem_size: usize,
    elem_align: usize,
    capacity: usize,
    drop_fn: usize,
    region: RegionHandle,
) -> MicaVec {
    let mut vec = MicaVec::construct(elem_size, elem_align, drop_fn, region);
    if capacity > vec.cap {
        let _ = vec.reserve_internal(capacity);
    }
    vec
}

/// Drop every live element, release the heap buffer, and reset the struct.
/// Safe to call twice. If an element drop panics the buffer is still
/// released; elements after the panicking one leak.
///
/// # Safety
/// `vec` must be null or point to a valid `MicaVec`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn mica_rt_vec_drop(vec: *mut MicaVec) {
    let Some(vec) = (unsafe { vec.as_mut() }) else {
        return;
    };
    if vec.uses_inline {
        vec.drop_elements(0);
        vec.len = 0;
        vec.sync_ptr();
        return;
    }
    // Detach the buffer first so it is freed even if an element drop panics.
    let guard = BufferGuard {
        buffer: ValueMutPtr {
            ptr: vec.ptr,
            size: vec.heap_bytes(),
            align: vec.elem_align.max(1),
        },
    };
    let len = vec.len;
    let elem_size = vec.elem_size;
    let drop_fn = vec.drop_fn;
    let base = vec.ptr;
    *vec = MicaVec::construct(vec.elem_size, vec.elem_align, vec.drop_fn, vec.region);
    vec.sync_ptr();
    if !base.is_null() {
        for i in 0..len {
            // Safety: elements [0, len) were live in the detached buffer.
            unsafe { drop_invoke(drop_fn, base.add(i * elem_size)) };
        }
    }
    drop(guard);
}

/// Byte-wise copy of `src` into `dest` (an uninitialized out slot). The
/// element descriptor carries no clone function, so this is only emitted for
/// trivially-copyable element types.
///
/// # Safety
/// `dest` must be valid for writes of `MicaVec`; `src` must be null or valid.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn mica_rt_vec_clone(dest: *mut MicaVec, src: *const MicaVec) -> i32 {
    let (Some(dest), Some(src)) = (unsafe { dest.as_mut() }, unsafe { src.as_ref() }) else {
        return VecError::InvalidPointer as i32;
    };
    let mut fresh = MicaVec::construct(src.elem_size, src.elem_align, src.drop_fn, src.region);
    if src.len > fresh.cap {
        if let Err(e) = fresh.reserve_internal(src.len) {
            return e as i32;
        }
    }
    if src.len > 0 && src.elem_size > 0 {
        // Safety: both buffers hold at least len * elem_size bytes.
        unsafe {
            ptr::copy_nonoverlapping(src.data(), fresh.data_mut(), src.len * src.elem_size);
        }
    }
    fresh.len = src.len;
    fresh.sync_ptr();
    *dest = fresh;
    dest.sync_ptr();
    VecError::Success as i32
}

// ============================================================================
// Vector ↔ array conversions
// ============================================================================

/// Move `src` into `dest` as a fixed-length array, shrinking the buffer to
/// the live length first when it is overallocated. `src` is left empty.
///
/// # Safety
/// `dest` must be valid for writes of `MicaVec`; `src` must be a valid vector.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn mica_rt_vec_into_array(dest: *mut MicaVec, src: *mut MicaVec) -> i32 {
    let (Some(dest), Some(src)) = (unsafe { dest.as_mut() }, unsafe { src.as_mut() }) else {
        return VecError::InvalidPointer as i32;
    };
    if !src.uses_inline && src.len < src.cap {
        if let Err(e) = shrink_internal(src) {
            return e as i32;
        }
    }
    move_struct(dest, src);
    VecError::Success as i32
}

/// Move an array back into vector representation (identical layout; growth
/// becomes legal again through the vector entry points).
///
/// # Safety
/// `dest` must be valid for writes of `MicaVec`; `src` must be a valid array.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn mica_rt_array_into_vec(dest: *mut MicaVec, src: *mut MicaVec) -> i32 {
    let (Some(dest), Some(src)) = (unsafe { dest.as_mut() }, unsafe { src.as_mut() }) else {
        return VecError::InvalidPointer as i32;
    };
    move_struct(dest, src);
    VecError::Success as i32
}

fn move_struct(dest: &mut MicaVec, src: &mut MicaVec) {
    // Safety: plain bitwise move; src is reset below so ownership of any
    // heap buffer transfers exactly once.
    unsafe {
        ptr::copy_nonoverlapping(&raw const *src, &raw mut *dest, 1);
    }
    *src = MicaVec::construct(src.elem_size, src.elem_align, src.drop_fn, src.region);
    src.sync_ptr();
    dest.sync_ptr();
}

/// Byte-wise copy of `src` into `dest` with an exactly-sized buffer.
///
/// # Safety
/// `dest` must be valid for writes of `MicaVec`; `src` must be null or valid.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn mica_rt_vec_copy_to_array(dest: *mut MicaVec, src: *const MicaVec) -> i32 {
    let rc = unsafe { mica_rt_vec_clone(dest, src) };
    if rc != VecError::Success as i32 {
        return rc;
    }
    let dest = unsafe { &mut *dest };
    code(shrink_internal(dest))
}

/// Byte-wise copy of an array into vector representation.
///
/// # Safety
/// `dest` must be valid for writes of `MicaVec`; `src` must be null or valid.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn mica_rt_array_copy_to_vec(dest: *mut MicaVec, src: *const MicaVec) -> i32 {
    unsafe { mica_rt_vec_clone(dest, src) }
}

// ============================================================================
// Capacity management
// ============================================================================

/// Ensure room for `additional` more elements. Failure is non-destructive.
///
/// # Safety
/// `vec` must be null or point to a valid `MicaVec`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn mica_rt_vec_reserve(vec: *mut MicaVec, additional: usize) -> i32 {
    let Some(vec) = (unsafe { vec.as_mut() }) else {
        return VecError::InvalidPointer as i32;
    };
    code(vec.reserve_internal(additional))
}

fn shrink_internal(vec: &mut MicaVec) -> Result<(), VecError> {
    if vec.uses_inline || vec.elem_size == 0 || vec.len == vec.cap {
        return Ok(());
    }
    let live_bytes = vec.len * vec.elem_size;
    if inline_eligible(vec.elem_size, vec.elem_align) && live_bytes <= VEC_INLINE_BYTES {
        // Migrate back into the struct; uses_inline makes this unambiguous.
        let buffer = ValueMutPtr {
            ptr: vec.ptr,
            size: vec.heap_bytes(),
            align: vec.elem_align.max(1),
        };
        // Safety: buffer holds at least live_bytes; destination is the
        // struct's own storage.
        unsafe {
            ptr::copy_nonoverlapping(
                buffer.ptr,
                vec.inline_storage.bytes.as_mut_ptr(),
                live_bytes,
            );
            mica_rt_free(buffer);
        }
        vec.uses_inline = true;
        vec.cap = VEC_INLINE_BYTES / vec.elem_size;
        vec.sync_ptr();
        return Ok(());
    }
    if vec.len == 0 {
        vec.release_buffer();
        return Ok(());
    }
    let existing = ValueMutPtr {
        ptr: vec.ptr,
        size: vec.heap_bytes(),
        align: vec.elem_align.max(1),
    };
    // Safety: existing describes this vector's live heap buffer.
    let moved = unsafe { mica_rt_realloc(existing, existing.size, live_bytes, existing.align) };
    if moved.ptr.is_null() {
        return Err(VecError::AllocationFailed);
    }
    vec.ptr = moved.ptr;
    vec.cap = vec.len;
    Ok(())
}

/// Give back unused capacity; small contents migrate back into the struct.
///
/// # Safety
/// `vec` must be null or point to a valid `MicaVec`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn mica_rt_vec_shrink_to_fit(vec: *mut MicaVec) -> i32 {
    let Some(vec) = (unsafe { vec.as_mut() }) else {
        return VecError::InvalidPointer as i32;
    };
    code(shrink_internal(vec))
}

// ============================================================================
// Element operations
// ============================================================================

/// Append one element, copied from the descriptor.
///
/// # Safety
/// `vec` must be a valid vector; `value` must describe a readable element of
/// the vector's layout.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn mica_rt_vec_push(vec: *mut MicaVec, value: *const ValueConstPtr) -> i32 {
    let Some(vec) = (unsafe { vec.as_mut() }) else {
        return VecError::InvalidPointer as i32;
    };
    let value = match unsafe { expect_value(vec, value) } {
        Ok(v) => v,
        Err(e) => return e as i32,
    };
    if vec.len == vec.cap {
        if let Err(e) = vec.reserve_internal(1) {
            return e as i32;
        }
    }
    if vec.elem_size > 0 {
        // Safety: capacity established; source is caller memory.
        unsafe {
            ptr::copy_nonoverlapping(value.ptr, vec.slot_mut(vec.len), vec.elem_size);
        }
    }
    vec.len += 1;
    vec.sync_ptr();
    VecError::Success as i32
}

/// Move the last element out into the caller's buffer.
///
/// # Safety
/// `vec` must be a valid vector; `out` must describe a writable slot of the
/// vector's layout.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn mica_rt_vec_pop(vec: *mut MicaVec, out: *const ValueMutPtr) -> i32 {
    let Some(vec) = (unsafe { vec.as_mut() }) else {
        return VecError::InvalidPointer as i32;
    };
    let out = match unsafe { expect_out(vec, out) } {
        Ok(v) => v,
        Err(e) => return e as i32,
    };
    if vec.len == 0 {
        return VecError::OutOfBounds as i32;
    }
    vec.len -= 1;
    if vec.elem_size > 0 {
        // Safety: the popped slot holds a live element; ownership moves to
        // out.
        unsafe {
            ptr::copy_nonoverlapping(vec.slot(vec.len), out.ptr, vec.elem_size);
        }
    }
    VecError::Success as i32
}

/// Insert at `index`, shifting the tail up.
///
/// # Safety
/// `vec` must be a valid vector; `value` must describe a readable element of
/// the vector's layout.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn mica_rt_vec_insert(
    vec: *mut MicaVec,
    index: usize,
    value: *const ValueConstPtr,
) -> i32 {
    let Some(vec) = (unsafe { vec.as_mut() }) else {
        return VecError::InvalidPointer as i32;
    };
    let value = match unsafe { expect_value(vec, value) } {
        Ok(v) => v,
        Err(e) => return e as i32,
    };
    if index > vec.len {
        return VecError::OutOfBounds as i32;
    }
    if vec.len == vec.cap {
        if let Err(e) = vec.reserve_internal(1) {
            return e as i32;
        }
    }
    if vec.elem_size > 0 {
        // Safety: capacity established; regions may overlap, so the tail
        // shift uses copy.
        unsafe {
            let base = vec.slot_mut(index);
            ptr::copy(base, base.add(vec.elem_size), (vec.len - index) * vec.elem_size);
            ptr::copy_nonoverlapping(value.ptr, base, vec.elem_size);
        }
    }
    vec.len += 1;
    vec.sync_ptr();
    VecError::Success as i32
}

/// Move the element at `index` out and shift the tail down.
///
/// # Safety
/// `vec` must be a valid vector; `out` must describe a writable slot of the
/// vector's layout.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn mica_rt_vec_remove(
    vec: *mut MicaVec,
    index: usize,
    out: *const ValueMutPtr,
) -> i32 {
    let Some(vec) = (unsafe { vec.as_mut() }) else {
        return VecError::InvalidPointer as i32;
    };
    let out = match unsafe { expect_out(vec, out) } {
        Ok(v) => v,
        Err(e) => return e as i32,
    };
    if index >= vec.len {
        return VecError::OutOfBounds as i32;
    }
    if vec.elem_size > 0 {
        // Safety: index < len; ownership of the removed element moves to
        // out.
        unsafe {
            let base = vec.slot_mut(index);
            ptr::copy_nonoverlapping(base, out.ptr, vec.elem_size);
            ptr::copy(
                base.add(vec.elem_size),
                base,
                (vec.len - index - 1) * vec.elem_size,
            );
        }
    }
    vec.len -= 1;
    VecError::Success as i32
}

/// Move the element at `index` out and fill the hole with the last element.
/// O(1); destroys insertion order.
///
/// # Safety
/// `vec` must be a valid vector; `out` must describe a writable slot of the
/// vector's layout.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn mica_rt_vec_swap_remove(
    vec: *mut MicaVec,
    index: usize,
    out: *const ValueMutPtr,
) -> i32 {
    let Some(vec) = (unsafe { vec.as_mut() }) else {
        return VecError::InvalidPointer as i32;
    };
    let out = match unsafe { expect_out(vec, out) } {
        Ok(v) => v,
        Err(e) => return e as i32,
    };
    if index >= vec.len {
        return VecError::OutOfBounds as i32;
    }
    if vec.elem_size > 0 {
        // Safety: index < len; the last element backfills the hole.
        unsafe {
            let hole = vec.slot_mut(index);
            ptr::copy_nonoverlapping(hole, out.ptr, vec.elem_size);
            let last = vec.slot(vec.len - 1);
            if index != vec.len - 1 {
                ptr::copy_nonoverlapping(last, hole, vec.elem_size);
            }
        }
    }
    vec.len -= 1;
    VecError::Success as i32
}

/// Drop elements past `new_len`.
///
/// # Safety
/// `vec` must be null or point to a valid `MicaVec`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn mica_rt_vec_truncate(vec: *mut MicaVec, new_len: usize) -> i32 {
    let Some(vec) = (unsafe { vec.as_mut() }) else {
        return VecError::InvalidPointer as i32;
    };
    if new_len > vec.len {
        return VecError::OutOfBounds as i32;
    }
    vec.drop_elements(new_len);
    vec.len = new_len;
    VecError::Success as i32
}

/// Drop every element; capacity is retained.
///
/// # Safety
/// `vec` must be null or point to a valid `MicaVec`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn mica_rt_vec_clear(vec: *mut MicaVec) -> i32 {
    unsafe { mica_rt_vec_truncate(vec, 0) }
}

/// Declare `new_len` elements live without running constructors or drops.
/// The caller must have initialized (or consumed) the affected slots.
///
/// # Safety
/// `vec` must be null or point to a valid `MicaVec`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn mica_rt_vec_set_len(vec: *mut MicaVec, new_len: usize) -> i32 {
    let Some(vec) = (unsafe { vec.as_mut() }) else {
        return VecError::InvalidPointer as i32;
    };
    if new_len > vec.cap {
        return VecError::LengthOverflow as i32;
    }
    vec.len = new_len;
    VecError::Success as i32
}

// ============================================================================
// Array mutation entry points (growth is disallowed)
// ============================================================================

/// Arrays are fixed-length: push always needs growth and is rejected.
///
/// # Safety
/// `array` must be null or point to a valid array.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn mica_rt_array_push(
    array: *mut MicaVec,
    _value: *const ValueConstPtr,
) -> i32 {
    if unsafe { array.as_ref() }.is_none() {
        return VecError::InvalidPointer as i32;
    }
    VecError::CapacityOverflow as i32
}

/// # Safety
/// `array` must be null or point to a valid array.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn mica_rt_array_insert(
    array: *mut MicaVec,
    _index: usize,
    _value: *const ValueConstPtr,
) -> i32 {
    if unsafe { array.as_ref() }.is_none() {
        return VecError::InvalidPointer as i32;
    }
    VecError::CapacityOverflow as i32
}

/// # Safety
/// `array` must be null or point to a valid array.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn mica_rt_array_remove(
    array: *mut MicaVec,
    _index: usize,
    _out: *const ValueMutPtr,
) -> i32 {
    if unsafe { array.as_ref() }.is_none() {
        return VecError::InvalidPointer as i32;
    }
    VecError::CapacityOverflow as i32
}

/// # Safety
/// `array` must be null or point to a valid array.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn mica_rt_array_reserve(array: *mut MicaVec, _additional: usize) -> i32 {
    if unsafe { array.as_ref() }.is_none() {
        return VecError::InvalidPointer as i32;
    }
    VecError::CapacityOverflow as i32
}

// ============================================================================
// Iteration
// ============================================================================

/// # Safety
/// `vec` must be null or point to a valid `MicaVec`; the vector must not be
/// mutated while the cursor is in use.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn mica_rt_vec_iter(vec: *const MicaVec) -> MicaVecIter {
    let Some(vec) = (unsafe { vec.as_ref() }) else {
        return MicaVecIter {
            data: ptr::null(),
            index: 0,
            len: 0,
            elem_size: 0,
            elem_align: 0,
        };
    };
    MicaVecIter {
        data: vec.data(),
        index: 0,
        len: vec.len,
        elem_size: vec.elem_size,
        elem_align: vec.elem_align,
    }
}

/// Copy the next element into `out`, or `IterationComplete` (out untouched).
///
/// # Safety
/// `iter` must come from [`mica_rt_vec_iter`] over a still-valid vector;
/// `out` must describe a writable slot of the element layout.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn mica_rt_vec_iter_next(
    iter: *mut MicaVecIter,
    out: *const ValueMutPtr,
) -> i32 {
    let Some(iter) = (unsafe { iter.as_mut() }) else {
        return VecError::InvalidPointer as i32;
    };
    let Some(out) = (unsafe { out.as_ref() }) else {
        return VecError::InvalidPointer as i32;
    };
    if (out.ptr.is_null() && iter.elem_size > 0)
        || !out.matches_layout(iter.elem_size, iter.elem_align)
    {
        return VecError::InvalidPointer as i32;
    }
    if iter.index >= iter.len {
        return VecError::IterationComplete as i32;
    }
    if iter.elem_size > 0 {
        // Safety: index < len, so the slot holds a live element.
        unsafe {
            ptr::copy_nonoverlapping(
                iter.data.add(iter.index * iter.elem_size),
                out.ptr,
                iter.elem_size,
            );
        }
    }
    iter.index += 1;
    VecError::Success as i32
}

/// Borrow the next element in place; a null descriptor means complete.
///
/// # Safety
/// `iter` must come from [`mica_rt_vec_iter`] over a still-valid vector.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn mica_rt_vec_iter_next_ptr(iter: *mut MicaVecIter) -> ValueConstPtr {
    let Some(iter) = (unsafe { iter.as_mut() }) else {
        return ValueConstPtr::null();
    };
    if iter.index >= iter.len {
        return ValueConstPtr::null();
    }
    // Safety: index < len.
    let ptr = unsafe { iter.data.add(iter.index * iter.elem_size) };
    iter.index += 1;
    ValueConstPtr {
        ptr,
        size: iter.elem_size,
        align: iter.elem_align,
    }
}

// ============================================================================
// Read surface
// ============================================================================

/// # Safety
/// `vec` must be null or point to a valid `MicaVec`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn mica_rt_vec_len(vec: *const MicaVec) -> usize {
    unsafe { vec.as_ref() }.map_or(0, |v| v.len)
}

/// # Safety
/// `vec` must be null or point to a valid `MicaVec`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn mica_rt_vec_capacity(vec: *const MicaVec) -> usize {
    unsafe { vec.as_ref() }.map_or(0, |v| v.cap)
}

/// # Safety
/// `vec` must be null or point to a valid `MicaVec`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn mica_rt_vec_is_empty(vec: *const MicaVec) -> i32 {
    i32::from(unsafe { mica_rt_vec_len(vec) } == 0)
}

/// # Safety
/// `vec` must be null or valid; `out` must be valid for writes.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn mica_rt_vec_view(vec: *const MicaVec, out: *mut MicaVecView) -> i32 {
    let (Some(vec), Some(out)) = (unsafe { vec.as_ref() }, unsafe { out.as_mut() }) else {
        return VecError::InvalidPointer as i32;
    };
    *out = MicaVecView {
        data: vec.data(),
        len: vec.len,
        elem_size: vec.elem_size,
        elem_align: vec.elem_align,
    };
    VecError::Success as i32
}

/// Borrow the live elements as one descriptor (`size` covers all of them).
///
/// # Safety
/// `vec` must be null or point to a valid `MicaVec`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn mica_rt_vec_data(vec: *const MicaVec) -> ValueConstPtr {
    let Some(vec) = (unsafe { vec.as_ref() }) else {
        return ValueConstPtr::null();
    };
    ValueConstPtr {
        ptr: vec.data(),
        size: vec.len * vec.elem_size,
        align: vec.elem_align,
    }
}

/// # Safety
/// `vec` must be null or point to a valid `MicaVec`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn mica_rt_vec_data_mut(vec: *mut MicaVec) -> ValueMutPtr {
    let Some(vec) = (unsafe { vec.as_mut() }) else {
        return ValueMutPtr::null();
    };
    ValueMutPtr {
        ptr: vec.data_mut(),
        size: vec.len * vec.elem_size,
        align: vec.elem_align,
    }
}

/// Borrow the element at `index`; a null descriptor on out-of-bounds.
///
/// # Safety
/// `vec` must be null or point to a valid `MicaVec`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn mica_rt_vec_ptr_at(vec: *const MicaVec, index: usize) -> ValueMutPtr {
    let Some(vec) = (unsafe { vec.as_ref() }) else {
        return ValueMutPtr::null();
    };
    if index >= vec.len {
        return ValueMutPtr::null();
    }
    // Safety: index < len.
    ValueMutPtr {
        ptr: unsafe { vec.slot(index) }.cast_mut(),
        size: vec.elem_size,
        align: vec.elem_align,
    }
}

/// Elements that fit the struct's own storage for this element layout.
///
/// # Safety
/// `vec` must be null or point to a valid `MicaVec`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn mica_rt_vec_inline_capacity(vec: *const MicaVec) -> usize {
    let Some(vec) = (unsafe { vec.as_ref() }) else {
        return 0;
    };
    if vec.elem_size == 0 {
        usize::MAX
    } else if inline_eligible(vec.elem_size, vec.elem_align) {
        VEC_INLINE_BYTES / vec.elem_size
    } else {
        0
    }
}

/// Address of the struct's own element storage.
///
/// # Safety
/// `vec` must be null or point to a valid `MicaVec`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn mica_rt_vec_inline_ptr(vec: *mut MicaVec) -> ValueMutPtr {
    let Some(vec) = (unsafe { vec.as_mut() }) else {
        return ValueMutPtr::null();
    };
    ValueMutPtr {
        ptr: vec.inline_storage.bytes.as_mut_ptr(),
        size: VEC_INLINE_BYTES,
        align: vec.elem_align,
    }
}

/// # Safety
/// `vec` must be null or point to a valid `MicaVec`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn mica_rt_vec_mark_inline(vec: *mut MicaVec, uses_inline: i32) {
    if let Some(vec) = unsafe { vec.as_mut() } {
        vec.uses_inline = uses_inline != 0;
        vec.sync_ptr();
    }
}

/// # Safety
/// `vec` must be null or point to a valid `MicaVec`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn mica_rt_vec_uses_inline(vec: *const MicaVec) -> i32 {
    i32::from(unsafe { vec.as_ref() }.is_some_and(|v| v.uses_inline))
}

// The array read surface shares the vector's representation.

/// # Safety
/// `array` must be null or point to a valid array.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn mica_rt_array_view(array: *const MicaVec) -> MicaVecView {
    let Some(array) = (unsafe { array.as_ref() }) else {
        return MicaVecView {
            data: ptr::null(),
            len: 0,
            elem_size: 0,
            elem_align: 0,
        };
    };
    MicaVecView {
        data: array.data(),
        len: array.len,
        elem_size: array.elem_size,
        elem_align: array.elem_align,
    }
}

/// # Safety
/// `array` must be null or point to a valid array.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn mica_rt_array_data(array: *const MicaVec) -> ValueConstPtr {
    unsafe { mica_rt_vec_data(array) }
}

/// # Safety
/// `array` must be null or point to a valid array.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn mica_rt_array_len(array: *const MicaVec) -> usize {
    unsafe { mica_rt_vec_len(array) }
}

/// # Safety
/// `array` must be null or point to a valid array.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn mica_rt_array_is_empty(array: *const MicaVec) -> i32 {
    unsafe { mica_rt_vec_is_empty(array) }
}

/// # Safety
/// `array` must be null or point to a valid array.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn mica_rt_array_ptr_at(array: *const MicaVec, index: usize) -> ValueMutPtr {
    unsafe { mica_rt_vec_ptr_at(array, index) }
}

// ============================================================================
// Field accessors for codegen
// ============================================================================

/// Effective data pointer; recomputes the inline address.
///
/// # Safety
/// `vec` must point to a valid `MicaVec`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn mica_rt_vec_get_ptr(vec: *const MicaVec) -> ValueMutPtr {
    let vec = unsafe { &*vec };
    ValueMutPtr {
        ptr: vec.data().cast_mut(),
        size: vec.cap.saturating_mul(vec.elem_size),
        align: vec.elem_align,
    }
}

/// # Safety
/// `vec` must point to a valid `MicaVec`; `ptr` must point to a descriptor.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn mica_rt_vec_set_ptr(vec: *mut MicaVec, ptr: *const ValueMutPtr) {
    let (Some(vec), Some(ptr)) = (unsafe { vec.as_mut() }, unsafe { ptr.as_ref() }) else {
        return;
    };
    vec.ptr = ptr.ptr;
}

/// # Safety
/// `vec` must point to a valid `MicaVec`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn mica_rt_vec_set_cap(vec: *mut MicaVec, cap: usize) {
    if let Some(vec) = unsafe { vec.as_mut() } {
        vec.cap = cap;
    }
}

/// # Safety
/// `vec` must point to a valid `MicaVec`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn mica_rt_vec_elem_size(vec: *const MicaVec) -> usize {
    unsafe { (*vec).elem_size }
}

/// # Safety
/// `vec` must point to a valid `MicaVec`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn mica_rt_vec_set_elem_size(vec: *mut MicaVec, size: usize) {
    unsafe { (*vec).elem_size = size };
}

/// # Safety
/// `vec` must point to a valid `MicaVec`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn mica_rt_vec_elem_align(vec: *const MicaVec) -> usize {
    unsafe { (*vec).elem_align }
}

/// # Safety
/// `vec` must point to a valid `MicaVec`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn mica_rt_vec_set_elem_align(vec: *mut MicaVec, align: usize) {
    unsafe { (*vec).elem_align = align };
}

/// # Safety
/// `vec` must point to a valid `MicaVec`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn mica_rt_vec_get_drop(vec: *const MicaVec) -> usize {
    unsafe { (*vec).drop_fn }
}

/// # Safety
/// `vec` must point to a valid `MicaVec`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn mica_rt_vec_set_drop(vec: *mut MicaVec, drop_fn: usize) {
    unsafe { (*vec).drop_fn = drop_fn };
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn u64_vec() -> MicaVec {
        mica_rt_vec_new(8, 8, 0)
    }

    fn push_u64(vec: &mut MicaVec, value: u64) -> i32 {
        let desc = ValueConstPtr {
            ptr: (&raw const value).cast(),
            size: 8,
            align: 8,
        };
        unsafe { mica_rt_vec_push(vec, &raw const desc) }
    }

    fn pop_u64(vec: &mut MicaVec) -> Result<u64, i32> {
        let mut out: u64 = 0;
        let desc = ValueMutPtr {
            ptr: (&raw mut out).cast(),
            size: 8,
            align: 8,
        };
        let rc = unsafe { mica_rt_vec_pop(vec, &raw const desc) };
        if rc == 0 { Ok(out) } else { Err(rc) }
    }

    fn get_u64(vec: &MicaVec, index: usize) -> u64 {
        let p = unsafe { mica_rt_vec_ptr_at(vec, index) };
        assert!(!p.ptr.is_null());
        unsafe { p.ptr.cast::<u64>().read() }
    }

    fn collect_u64(vec: &MicaVec) -> Vec<u64> {
        let mut iter = unsafe { mica_rt_vec_iter(vec) };
        let mut out = Vec::new();
        loop {
            let p = unsafe { mica_rt_vec_iter_next_ptr(&raw mut iter) };
            if p.ptr.is_null() {
                break;
            }
            out.push(unsafe { p.ptr.cast::<u64>().read() });
        }
        out
    }

    #[test]
    fn test_new_starts_inline() {
        let vec = u64_vec();
        assert!(vec.uses_inline);
        assert_eq!(vec.cap, 8); // 64 bytes / 8
        assert_eq!(vec.len, 0);
    }

    #[test]
    fn test_push_iter_sum() {
        let mut vec = mica_rt_vec_new(4, 4, 0);
        for i in 0..10i32 {
            let desc = ValueConstPtr {
                ptr: (&raw const i).cast(),
                size: 4,
                align: 4,
            };
            assert_eq!(unsafe { mica_rt_vec_push(&raw mut vec, &raw const desc) }, 0);
        }
        assert_eq!(vec.len, 10);
        assert!(vec.cap >= 10);
        let mut iter = unsafe { mica_rt_vec_iter(&raw const vec) };
        let mut sum = 0i64;
        loop {
            let p = unsafe { mica_rt_vec_iter_next_ptr(&raw mut iter) };
            if p.ptr.is_null() {
                break;
            }
            sum += i64::from(unsafe { p.ptr.cast::<i32>().read() });
        }
        assert_eq!(sum, 45);
        unsafe { mica_rt_vec_drop(&raw mut vec) };
    }

    #[test]
    fn test_inline_to_heap_spill_preserves_contents() {
        let mut vec = u64_vec();
        for i in 0..8 {
            assert_eq!(push_u64(&mut vec, i), 0);
        }
        assert!(vec.uses_inline);
        assert_eq!(push_u64(&mut vec, 8), 0);
        assert!(!vec.uses_inline);
        assert_eq!(collect_u64(&vec), (0..9).collect::<Vec<_>>());
        unsafe { mica_rt_vec_drop(&raw mut vec) };
    }

    #[test]
    fn test_push_layout_mismatch_rejected() {
        let mut vec = u64_vec();
        let v: u32 = 1;
        let desc = ValueConstPtr {
            ptr: (&raw const v).cast(),
            size: 4,
            align: 4,
        };
        assert_eq!(
            unsafe { mica_rt_vec_push(&raw mut vec, &raw const desc) },
            VecError::InvalidPointer as i32
        );
    }

    #[test]
    fn test_pop_moves_out() {
        let mut vec = u64_vec();
        push_u64(&mut vec, 11);
        push_u64(&mut vec, 22);
        assert_eq!(pop_u64(&mut vec), Ok(22));
        assert_eq!(pop_u64(&mut vec), Ok(11));
        assert_eq!(pop_u64(&mut vec), Err(VecError::OutOfBounds as i32));
    }

    #[test]
    fn test_insert_remove_inverse() {
        let mut vec = u64_vec();
        for i in [1u64, 2, 4, 5] {
            push_u64(&mut vec, i);
        }
        let before = collect_u64(&vec);
        let three: u64 = 3;
        let desc = ValueConstPtr {
            ptr: (&raw const three).cast(),
            size: 8,
            align: 8,
        };
        assert_eq!(unsafe { mica_rt_vec_insert(&raw mut vec, 2, &raw const desc) }, 0);
        assert_eq!(collect_u64(&vec), vec![1, 2, 3, 4, 5]);
        let mut out: u64 = 0;
        let out_desc = ValueMutPtr {
            ptr: (&raw mut out).cast(),
            size: 8,
            align: 8,
        };
        assert_eq!(
            unsafe { mica_rt_vec_remove(&raw mut vec, 2, &raw const out_desc) },
            0
        );
        assert_eq!(out, 3);
        assert_eq!(collect_u64(&vec), before);
        unsafe { mica_rt_vec_drop(&raw mut vec) };
    }

    #[test]
    fn test_swap_remove_backfills_with_last() {
        let mut vec = u64_vec();
        for i in 0..5u64 {
            push_u64(&mut vec, i);
        }
        let mut out: u64 = 0;
        let out_desc = ValueMutPtr {
            ptr: (&raw mut out).cast(),
            size: 8,
            align: 8,
        };
        assert_eq!(
            unsafe { mica_rt_vec_swap_remove(&raw mut vec, 1, &raw const out_desc) },
            0
        );
        assert_eq!(out, 1);
        assert_eq!(vec.len, 4);
        assert_eq!(get_u64(&vec, 1), 4);
        unsafe { mica_rt_vec_drop(&raw mut vec) };
    }

    #[test]
    fn test_out_of_bounds_reported() {
        let mut vec = u64_vec();
        push_u64(&mut vec, 1);
        let mut out: u64 = 0;
        let out_desc = ValueMutPtr {
            ptr: (&raw mut out).cast(),
            size: 8,
            align: 8,
        };
        unsafe {
            assert_eq!(
                mica_rt_vec_remove(&raw mut vec, 5, &raw const out_desc),
                VecError::OutOfBounds as i32
            );
            assert_eq!(
                mica_rt_vec_truncate(&raw mut vec, 2),
                VecError::OutOfBounds as i32
            );
            assert_eq!(
                mica_rt_vec_set_len(&raw mut vec, vec.cap + 1),
                VecError::LengthOverflow as i32
            );
        }
    }

    static DROP_COUNT: AtomicUsize = AtomicUsize::new(0);

    unsafe extern "C" fn counting_drop(_elem: *mut u8) {
        DROP_COUNT.fetch_add(1, Ordering::Relaxed);
    }

    #[test]
    fn test_drop_runs_element_drops() {
        let mut vec = mica_rt_vec_new(8, 8, counting_drop as usize);
        for i in 0..20u64 {
            push_u64(&mut vec, i);
        }
        assert!(!vec.uses_inline);
        let before = DROP_COUNT.load(Ordering::Relaxed);
        unsafe { mica_rt_vec_drop(&raw mut vec) };
        assert_eq!(DROP_COUNT.load(Ordering::Relaxed), before + 20);
        assert_eq!(vec.len, 0);
        assert!(vec.uses_inline);
        // Double drop is a no-op
        unsafe { mica_rt_vec_drop(&raw mut vec) };
        assert_eq!(DROP_COUNT.load(Ordering::Relaxed), before + 20);
    }

    #[test]
    fn test_truncate_drops_tail_only() {
        let mut vec = mica_rt_vec_new(8, 8, counting_drop as usize);
        for i in 0..6u64 {
            push_u64(&mut vec, i);
        }
        let before = DROP_COUNT.load(Ordering::Relaxed);
        assert_eq!(unsafe { mica_rt_vec_truncate(&raw mut vec, 2) }, 0);
        assert_eq!(DROP_COUNT.load(Ordering::Relaxed), before + 4);
        assert_eq!(vec.len, 2);
        unsafe { mica_rt_vec_drop(&raw mut vec) };
    }

    #[test]
    fn test_clone_copies_bytes() {
        let mut src = u64_vec();
        for i in 0..12u64 {
            push_u64(&mut src, i * 3);
        }
        let mut dest = mica_rt_vec_new(8, 8, 0);
        assert_eq!(unsafe { mica_rt_vec_clone(&raw mut dest, &raw const src) }, 0);
        assert_eq!(collect_u64(&dest), collect_u64(&src));
        unsafe {
            mica_rt_vec_drop(&raw mut src);
            mica_rt_vec_drop(&raw mut dest);
        }
    }

    #[test]
    fn test_into_array_moves_and_shrinks() {
        let mut src = u64_vec();
        for i in 0..10u64 {
            push_u64(&mut src, i);
        }
        let src_cap = src.cap;
        assert!(src_cap > 10);
        let mut array = mica_rt_vec_new(8, 8, 0);
        assert_eq!(
            unsafe { mica_rt_vec_into_array(&raw mut array, &raw mut src) },
            0
        );
        assert_eq!(array.len, 10);
        assert_eq!(array.cap, 10);
        assert_eq!(src.len, 0);
        unsafe {
            assert_eq!(mica_rt_array_len(&raw const array), 10);
            let p = mica_rt_array_ptr_at(&raw const array, 9);
            assert_eq!(p.ptr.cast::<u64>().read(), 9);
            // Growth through the array surface is rejected
            let v: u64 = 99;
            let desc = ValueConstPtr {
                ptr: (&raw const v).cast(),
                size: 8,
                align: 8,
            };
            assert_eq!(
                mica_rt_array_push(&raw mut array, &raw const desc),
                VecError::CapacityOverflow as i32
            );
            // Back to vector representation, growth works again
            let mut vec = mica_rt_vec_new(8, 8, 0);
            assert_eq!(mica_rt_array_into_vec(&raw mut vec, &raw mut array), 0);
            assert_eq!(mica_rt_vec_push(&raw mut vec, &raw const desc), 0);
            assert_eq!(vec.len, 11);
            mica_rt_vec_drop(&raw mut vec);
        }
    }

    #[test]
    fn test_shrink_to_fit_migrates_back_inline() {
        let mut vec = u64_vec();
        for i in 0..20u64 {
            push_u64(&mut vec, i);
        }
        assert!(!vec.uses_inline);
        for _ in 0..16 {
            pop_u64(&mut vec).unwrap();
        }
        assert_eq!(unsafe { mica_rt_vec_shrink_to_fit(&raw mut vec) }, 0);
        assert!(vec.uses_inline);
        assert_eq!(collect_u64(&vec), vec![0, 1, 2, 3]);
        unsafe { mica_rt_vec_drop(&raw mut vec) };
    }

    #[test]
    fn test_iter_next_copies_and_completes() {
        let mut vec = u64_vec();
        push_u64(&mut vec, 5);
        let mut iter = unsafe { mica_rt_vec_iter(&raw const vec) };
        let mut out: u64 = 0;
        let out_desc = ValueMutPtr {
            ptr: (&raw mut out).cast(),
            size: 8,
            align: 8,
        };
        assert_eq!(
            unsafe { mica_rt_vec_iter_next(&raw mut iter, &raw const out_desc) },
            0
        );
        assert_eq!(out, 5);
        out = 77;
        assert_eq!(
            unsafe { mica_rt_vec_iter_next(&raw mut iter, &raw const out_desc) },
            VecError::IterationComplete as i32
        );
        assert_eq!(out, 77); // untouched on completion
    }

    #[test]
    fn test_zero_sized_elements() {
        let mut vec = mica_rt_vec_new(0, 1, 0);
        assert_eq!(vec.cap, usize::MAX);
        let desc = ValueConstPtr {
            ptr: ptr::null(),
            size: 0,
            align: 1,
        };
        for _ in 0..1000 {
            assert_eq!(unsafe { mica_rt_vec_push(&raw mut vec, &raw const desc) }, 0);
        }
        assert_eq!(vec.len, 1000);
        unsafe { mica_rt_vec_drop(&raw mut vec) };
        assert_eq!(vec.len, 0);
    }

    #[test]
    fn test_oversized_elements_skip_inline() {
        // 128-byte elements cannot use the 64-byte inline buffer
        let mut vec = mica_rt_vec_new(128, 8, 0);
        assert!(!vec.uses_inline);
        assert_eq!(vec.cap, 0);
        let payload = [7u8; 128];
        let desc = ValueConstPtr {
            ptr: payload.as_ptr(),
            size: 128,
            align: 8,
        };
        assert_eq!(unsafe { mica_rt_vec_push(&raw mut vec, &raw const desc) }, 0);
        assert_eq!(vec.len, 1);
        assert!(!vec.uses_inline);
        unsafe { mica_rt_vec_drop(&raw mut vec) };
    }

    #[test]
    fn test_view_and_data() {
        let mut vec = u64_vec();
        push_u64(&mut vec, 1);
        push_u64(&mut vec, 2);
        let mut view = MicaVecView {
            data: ptr::null(),
            len: 0,
            elem_size: 0,
            elem_align: 0,
        };
        assert_eq!(unsafe { mica_rt_vec_view(&raw const vec, &raw mut view) }, 0);
        assert_eq!(view.len, 2);
        assert_eq!(view.elem_size, 8);
        let data = unsafe { mica_rt_vec_data(&raw const vec) };
        assert_eq!(data.size, 16);
        assert_eq!(data.ptr, view.data);
    }

    proptest! {
        // Round-trip copy: iteration yields exactly the pushed values
        #[test]
        fn prop_push_iter_roundtrip(values in proptest::collection::vec(any::<u64>(), 0..64)) {
            let mut vec = u64_vec();
            for &v in &values {
                prop_assert_eq!(push_u64(&mut vec, v), 0);
            }
            prop_assert_eq!(collect_u64(&vec), values);
            unsafe { mica_rt_vec_drop(&raw mut vec) };
        }

        // Swap-remove: length shrinks by one and the last element backfills
        #[test]
        fn prop_swap_remove_length(
            values in proptest::collection::vec(any::<u64>(), 1..32),
            index_seed in any::<usize>(),
        ) {
            let mut vec = u64_vec();
            for &v in &values {
                prop_assert_eq!(push_u64(&mut vec, v), 0);
            }
            let index = index_seed % values.len();
            let last = values[values.len() - 1];
            let mut out: u64 = 0;
            let out_desc = ValueMutPtr { ptr: (&raw mut out).cast(), size: 8, align: 8 };
            prop_assert_eq!(
                unsafe { mica_rt_vec_swap_remove(&raw mut vec, index, &raw const out_desc) },
                0
            );
            prop_assert_eq!(vec.len, values.len() - 1);
            prop_assert_eq!(out, values[index]);
            if index < vec.len {
                prop_assert_eq!(get_u64(&vec, index), last);
            }
            unsafe { mica_rt_vec_drop(&raw mut vec) };
        }
    }
}
