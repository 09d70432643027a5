//! Shared-ownership reference cells
//!
//! Two flavors over one block layout: `mica_rt_arc_*` uses atomic counters
//! and may cross threads; `mica_rt_rc_*` uses plain counters and must stay
//! on one thread. A block is a header (strong count, weak count, type id,
//! payload drop, payload layout) followed by the payload at its alignment
//! boundary; the public handle is one opaque pointer to the block.
//!
//! Every strong handle contributes one implicit reference to the weak
//! count, which keeps the header alive while any strong handle exists: the
//! last strong drop runs the payload's destructor and then releases the
//! implicit weak, and whoever releases the last weak frees the block.
//!
//! Atomic orderings follow the standard recipe: increments are `Relaxed`
//! (a new reference is derived from an existing one), decrements are
//! `Release`, and the thread that observes zero issues an `Acquire` fence
//! before touching the payload or the block.

use crate::dispatch::drop_invoke;
use mica_core::ValueMutPtr;
use mica_core::alloc::{mica_rt_alloc, mica_rt_free};
use std::cell::Cell;
use std::ffi::c_void;
use std::ptr;
use std::sync::atomic::{AtomicUsize, Ordering, fence};

/// Counts saturate here; beyond it a clone reports `Overflow` rather than
/// risking a wrapped counter.
const MAX_REFCOUNT: usize = isize::MAX as usize;

/// Error codes for shared-cell operations. Negative codes are ABI.
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SharedError {
    Success = 0,
    InvalidPointer = -1,
    AllocationFailed = -2,
    Overflow = -3,
}

/// Thread-safe strong handle.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct MicaArc {
    pub ptr: *mut c_void,
}

/// Thread-safe weak handle.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct MicaWeak {
    pub ptr: *mut c_void,
}

/// Single-thread strong handle.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct MicaRc {
    pub ptr: *mut c_void,
}

/// Single-thread weak handle.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct MicaWeakRc {
    pub ptr: *mut c_void,
}

/// Counter discipline a cell flavor plugs into the shared block logic.
trait RefCount {
    fn one() -> Self;
    fn load(&self) -> usize;
    /// Add one; returns the previous value.
    fn increment(&self) -> usize;
    /// Subtract one; returns the previous value.
    fn decrement(&self) -> usize;
    /// Compare-and-increment unless zero.
    fn increment_if_nonzero(&self) -> bool;
    /// Synchronize with the decrements that preceded an observed zero.
    fn acquire();
}

impl RefCount for AtomicUsize {
    fn one() -> Self {
        AtomicUsize::new(1)
    }

    fn load(&self) -> usize {
        self.load(Ordering::Relaxed)
    }

    fn increment(&self) -> usize {
        self.fetch_add(1, Ordering::Relaxed)
    }

    fn decrement(&self) -> usize {
        self.fetch_sub(1, Ordering::Release)
    }

    fn increment_if_nonzero(&self) -> bool {
        let mut current = self.load(Ordering::Relaxed);
        loop {
            if current == 0 {
                return false;
            }
            match self.compare_exchange_weak(
                current,
                current + 1,
                Ordering::Relaxed,
                Ordering::Relaxed,
            ) {
                Ok(_) => return true,
                Err(observed) => current = observed,
            }
        }
    }

    fn acquire() {
        fence(Ordering::Acquire);
    }
}

impl RefCount for Cell<usize> {
    fn one() -> Self {
        Cell::new(1)
    }

    fn load(&self) -> usize {
        self.get()
    }

    fn increment(&self) -> usize {
        let previous = self.get();
        self.set(previous.wrapping_add(1));
        previous
    }

    fn decrement(&self) -> usize {
        let previous = self.get();
        self.set(previous.wrapping_sub(1));
        previous
    }

    fn increment_if_nonzero(&self) -> bool {
        let current = self.get();
        if current == 0 {
            return false;
        }
        self.set(current + 1);
        true
    }

    fn acquire() {}
}

/// Block header; the payload follows at its alignment boundary.
#[repr(C)]
struct CellHeader<C> {
    strong: C,
    weak: C,
    type_id: u64,
    drop_fn: usize,
    payload_size: usize,
    payload_align: usize,
}

fn payload_offset<C>(payload_align: usize) -> usize {
    let align = payload_align.max(1);
    std::mem::size_of::<CellHeader<C>>().div_ceil(align) * align
}

fn block_align<C>(payload_align: usize) -> usize {
    std::mem::align_of::<CellHeader<C>>().max(payload_align.max(1))
}

unsafe fn header<'a, C>(block: *mut c_void) -> &'a CellHeader<C> {
    // Safety: caller guarantees block points at a live cell of flavor C.
    unsafe { &*block.cast::<CellHeader<C>>() }
}

unsafe fn payload_ptr<C>(block: *mut c_void) -> *mut u8 {
    // Safety: caller guarantees block validity; offset is within the block.
    unsafe {
        let align = header::<C>(block).payload_align;
        block.cast::<u8>().add(payload_offset::<C>(align))
    }
}

unsafe fn block_triple<C>(block: *mut c_void) -> ValueMutPtr {
    // Safety: caller guarantees block validity.
    let h = unsafe { header::<C>(block) };
    ValueMutPtr {
        ptr: block.cast(),
        size: payload_offset::<C>(h.payload_align) + h.payload_size,
        align: block_align::<C>(h.payload_align),
    }
}

unsafe fn cell_new<C: RefCount>(
    src: *const u8,
    size: usize,
    align: usize,
    drop_fn: usize,
    type_id: u64,
) -> Result<*mut c_void, SharedError> {
    if src.is_null() && size > 0 {
        return Err(SharedError::InvalidPointer);
    }
    if !align.max(1).is_power_of_two() {
        return Err(SharedError::InvalidPointer);
    }
    let offset = payload_offset::<C>(align);
    let Some(block_size) = offset.checked_add(size) else {
        return Err(SharedError::AllocationFailed);
    };
    let block = mica_rt_alloc(block_size, block_align::<C>(align));
    if block.ptr.is_null() {
        return Err(SharedError::AllocationFailed);
    }
    // Safety: the block was just allocated with room for header + payload.
    unsafe {
        block.ptr.cast::<CellHeader<C>>().write(CellHeader {
            strong: C::one(),
            weak: C::one(), // the implicit weak held by the strong count
            type_id,
            drop_fn,
            payload_size: size,
            payload_align: align.max(1),
        });
        if size > 0 {
            ptr::copy_nonoverlapping(src, block.ptr.add(offset), size);
        }
    }
    Ok(block.ptr.cast())
}

unsafe fn cell_clone<C: RefCount>(block: *mut c_void) -> Result<(), SharedError> {
    // Safety: caller guarantees block validity.
    let h = unsafe { header::<C>(block) };
    if h.strong.increment() >= MAX_REFCOUNT {
        h.strong.decrement();
        return Err(SharedError::Overflow);
    }
    Ok(())
}

/// Release one weak reference; frees the block on the last one.
unsafe fn weak_release<C: RefCount>(block: *mut c_void) {
    // Safety: caller guarantees block validity and owns one weak reference.
    let h = unsafe { header::<C>(block) };
    if h.weak.decrement() == 1 {
        C::acquire();
        // Safety: the last reference of any kind is gone; nobody else can
        // reach the block.
        unsafe { mica_rt_free(block_triple::<C>(block)) };
    }
}

/// Release one strong reference; runs the payload drop and the implicit
/// weak on the last one.
unsafe fn strong_release<C: RefCount>(block: *mut c_void) {
    // Safety: caller guarantees block validity and owns one strong reference.
    let h = unsafe { header::<C>(block) };
    if h.strong.decrement() == 1 {
        C::acquire();
        // Safety: strong reached zero; this thread uniquely owns the payload.
        unsafe {
            drop_invoke(h.drop_fn, payload_ptr::<C>(block));
            weak_release::<C>(block);
        }
    }
}

unsafe fn cell_get_mut<C: RefCount>(block: *mut c_void) -> *mut u8 {
    // Safety: caller guarantees block validity.
    let h = unsafe { header::<C>(block) };
    if h.strong.load() == 1 && h.weak.load() == 1 {
        // Safety: no other handle can observe the payload.
        unsafe { payload_ptr::<C>(block) }
    } else {
        ptr::null_mut()
    }
}

unsafe fn cell_downgrade<C: RefCount>(block: *mut c_void) -> Result<(), SharedError> {
    // Safety: caller guarantees block validity.
    let h = unsafe { header::<C>(block) };
    if h.weak.increment() >= MAX_REFCOUNT {
        h.weak.decrement();
        return Err(SharedError::Overflow);
    }
    Ok(())
}

unsafe fn weak_upgrade<C: RefCount>(block: *mut c_void) -> bool {
    // Safety: caller guarantees block validity (weak handles keep the
    // header alive).
    unsafe { header::<C>(block) }.strong.increment_if_nonzero()
}

// ============================================================================
// Atomic flavor (cross-thread)
// ============================================================================

/// Allocate an atomic cell over a copied-in payload.
///
/// # Safety
/// `dest` must be valid for writes; `src` must be readable for `size` bytes
/// when `size > 0`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn mica_rt_arc_new(
    dest: *mut MicaArc,
    src: *const u8,
    size: usize,
    align: usize,
    drop_fn: usize,
    type_id: u64,
) -> i32 {
    let Some(dest) = (unsafe { dest.as_mut() }) else {
        return SharedError::InvalidPointer as i32;
    };
    match unsafe { cell_new::<AtomicUsize>(src, size, align, drop_fn, type_id) } {
        Ok(block) => {
            dest.ptr = block;
            SharedError::Success as i32
        }
        Err(e) => {
            dest.ptr = ptr::null_mut();
            e as i32
        }
    }
}

/// # Safety
/// `dest` must be valid for writes; `src` must be null or a live handle.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn mica_rt_arc_clone(dest: *mut MicaArc, src: *const MicaArc) -> i32 {
    let (Some(dest), Some(src)) = (unsafe { dest.as_mut() }, unsafe { src.as_ref() }) else {
        return SharedError::InvalidPointer as i32;
    };
    if src.ptr.is_null() {
        return SharedError::InvalidPointer as i32;
    }
    // Safety: non-null handle points at a live block.
    match unsafe { cell_clone::<AtomicUsize>(src.ptr) } {
        Ok(()) => {
            dest.ptr = src.ptr;
            SharedError::Success as i32
        }
        Err(e) => {
            dest.ptr = ptr::null_mut();
            e as i32
        }
    }
}

/// Release a strong handle. Null handles are a no-op; the handle is nulled
/// out so a second drop is too.
///
/// # Safety
/// `target` must be null or point to a handle that is live or null.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn mica_rt_arc_drop(target: *mut MicaArc) {
    let Some(target) = (unsafe { target.as_mut() }) else {
        return;
    };
    if target.ptr.is_null() {
        return;
    }
    // Safety: non-null handle owns one strong reference.
    unsafe { strong_release::<AtomicUsize>(target.ptr) };
    target.ptr = ptr::null_mut();
}

/// Borrow the payload. Valid while the handle exists.
///
/// # Safety
/// `src` must be null or point to a live handle.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn mica_rt_arc_get(src: *const MicaArc) -> *const u8 {
    let Some(src) = (unsafe { src.as_ref() }) else {
        return ptr::null();
    };
    if src.ptr.is_null() {
        return ptr::null();
    }
    // Safety: non-null handle keeps the payload alive.
    unsafe { payload_ptr::<AtomicUsize>(src.ptr) }
}

/// Mutable payload access, granted only when this is the sole handle of any
/// kind (strong == 1 and weak == 1).
///
/// # Safety
/// `src` must be null or point to a live handle.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn mica_rt_arc_get_mut(src: *mut MicaArc) -> *mut u8 {
    let Some(src) = (unsafe { src.as_ref() }) else {
        return ptr::null_mut();
    };
    if src.ptr.is_null() {
        return ptr::null_mut();
    }
    // Safety: non-null handle points at a live block.
    unsafe { cell_get_mut::<AtomicUsize>(src.ptr) }
}

/// Payload pointer without the uniqueness check (the compiler emits this
/// for field projection through a shared handle).
///
/// # Safety
/// `handle` must be null or point to a live handle.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn mica_rt_arc_get_data(handle: *const MicaArc) -> *mut u8 {
    let Some(handle) = (unsafe { handle.as_ref() }) else {
        return ptr::null_mut();
    };
    if handle.ptr.is_null() {
        return ptr::null_mut();
    }
    // Safety: non-null handle keeps the payload alive.
    unsafe { payload_ptr::<AtomicUsize>(handle.ptr) }
}

/// # Safety
/// `src` must be null or point to a live handle.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn mica_rt_arc_strong_count(src: *const MicaArc) -> usize {
    let Some(src) = (unsafe { src.as_ref() }) else {
        return 0;
    };
    if src.ptr.is_null() {
        return 0;
    }
    // Safety: non-null handle points at a live block.
    RefCount::load(&unsafe { header::<AtomicUsize>(src.ptr) }.strong)
}

/// Raw weak count, including the one implicit reference the strong count
/// holds.
///
/// # Safety
/// `src` must be null or point to a live handle.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn mica_rt_arc_weak_count(src: *const MicaArc) -> usize {
    let Some(src) = (unsafe { src.as_ref() }) else {
        return 0;
    };
    if src.ptr.is_null() {
        return 0;
    }
    // Safety: non-null handle points at a live block.
    RefCount::load(&unsafe { header::<AtomicUsize>(src.ptr) }.weak)
}

/// # Safety
/// `dest` must be valid for writes; `src` must be null or a live handle.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn mica_rt_arc_downgrade(dest: *mut MicaWeak, src: *const MicaArc) -> i32 {
    let (Some(dest), Some(src)) = (unsafe { dest.as_mut() }, unsafe { src.as_ref() }) else {
        return SharedError::InvalidPointer as i32;
    };
    if src.ptr.is_null() {
        return SharedError::InvalidPointer as i32;
    }
    // Safety: non-null handle points at a live block.
    match unsafe { cell_downgrade::<AtomicUsize>(src.ptr) } {
        Ok(()) => {
            dest.ptr = src.ptr;
            SharedError::Success as i32
        }
        Err(e) => {
            dest.ptr = ptr::null_mut();
            e as i32
        }
    }
}

/// # Safety
/// `dest` must be valid for writes; `src` must be null or a live handle.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn mica_rt_weak_clone(dest: *mut MicaWeak, src: *const MicaWeak) -> i32 {
    let (Some(dest), Some(src)) = (unsafe { dest.as_mut() }, unsafe { src.as_ref() }) else {
        return SharedError::InvalidPointer as i32;
    };
    if src.ptr.is_null() {
        return SharedError::InvalidPointer as i32;
    }
    // Safety: a weak handle keeps the header alive.
    match unsafe { cell_downgrade::<AtomicUsize>(src.ptr) } {
        Ok(()) => {
            dest.ptr = src.ptr;
            SharedError::Success as i32
        }
        Err(e) => {
            dest.ptr = ptr::null_mut();
            e as i32
        }
    }
}

/// Release a weak handle; the block is freed when the last reference of any
/// kind goes away.
///
/// # Safety
/// `target` must be null or point to a handle that is live or null.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn mica_rt_weak_drop(target: *mut MicaWeak) {
    let Some(target) = (unsafe { target.as_mut() }) else {
        return;
    };
    if target.ptr.is_null() {
        return;
    }
    // Safety: non-null handle owns one weak reference.
    unsafe { weak_release::<AtomicUsize>(target.ptr) };
    target.ptr = ptr::null_mut();
}

/// Try to mint a strong handle from a weak one; fails once the payload is
/// gone.
///
/// # Safety
/// `dest` must be valid for writes; `src` must be null or a live handle.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn mica_rt_weak_upgrade(dest: *mut MicaArc, src: *const MicaWeak) -> i32 {
    let (Some(dest), Some(src)) = (unsafe { dest.as_mut() }, unsafe { src.as_ref() }) else {
        return SharedError::InvalidPointer as i32;
    };
    if src.ptr.is_null() {
        dest.ptr = ptr::null_mut();
        return SharedError::InvalidPointer as i32;
    }
    // Safety: the weak handle keeps the header alive.
    if unsafe { weak_upgrade::<AtomicUsize>(src.ptr) } {
        dest.ptr = src.ptr;
        SharedError::Success as i32
    } else {
        dest.ptr = ptr::null_mut();
        SharedError::InvalidPointer as i32
    }
}

// ============================================================================
// Non-atomic flavor (single-thread)
// ============================================================================

/// Single-thread counterpart of [`mica_rt_arc_new`].
///
/// # Safety
/// As for [`mica_rt_arc_new`].
#[unsafe(no_mangle)]
pub unsafe extern "C" fn mica_rt_rc_new(
    dest: *mut MicaRc,
    src: *const u8,
    size: usize,
    align: usize,
    drop_fn: usize,
    type_id: u64,
) -> i32 {
    let Some(dest) = (unsafe { dest.as_mut() }) else {
        return SharedError::InvalidPointer as i32;
    };
    match unsafe { cell_new::<Cell<usize>>(src, size, align, drop_fn, type_id) } {
        Ok(block) => {
            dest.ptr = block;
            SharedError::Success as i32
        }
        Err(e) => {
            dest.ptr = ptr::null_mut();
            e as i32
        }
    }
}

/// # Safety
/// `dest` must be valid for writes; `src` must be null or a live handle.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn mica_rt_rc_clone(dest: *mut MicaRc, src: *const MicaRc) -> i32 {
    let (Some(dest), Some(src)) = (unsafe { dest.as_mut() }, unsafe { src.as_ref() }) else {
        return SharedError::InvalidPointer as i32;
    };
    if src.ptr.is_null() {
        return SharedError::InvalidPointer as i32;
    }
    // Safety: non-null handle points at a live block.
    match unsafe { cell_clone::<Cell<usize>>(src.ptr) } {
        Ok(()) => {
            dest.ptr = src.ptr;
            SharedError::Success as i32
        }
        Err(e) => {
            dest.ptr = ptr::null_mut();
            e as i32
        }
    }
}

/// # Safety
/// `target` must be null or point to a handle that is live or null.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn mica_rt_rc_drop(target: *mut MicaRc) {
    let Some(target) = (unsafe { target.as_mut() }) else {
        return;
    };
    if target.ptr.is_null() {
        return;
    }
    // Safety: non-null handle owns one strong reference.
    unsafe { strong_release::<Cell<usize>>(target.ptr) };
    target.ptr = ptr::null_mut();
}

/// # Safety
/// `src` must be null or point to a live handle.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn mica_rt_rc_get(src: *const MicaRc) -> *const u8 {
    let Some(src) = (unsafe { src.as_ref() }) else {
        return ptr::null();
    };
    if src.ptr.is_null() {
        return ptr::null();
    }
    // Safety: non-null handle keeps the payload alive.
    unsafe { payload_ptr::<Cell<usize>>(src.ptr) }
}

/// # Safety
/// `src` must be null or point to a live handle.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn mica_rt_rc_get_mut(src: *mut MicaRc) -> *mut u8 {
    let Some(src) = (unsafe { src.as_ref() }) else {
        return ptr::null_mut();
    };
    if src.ptr.is_null() {
        return ptr::null_mut();
    }
    // Safety: non-null handle points at a live block.
    unsafe { cell_get_mut::<Cell<usize>>(src.ptr) }
}

/// # Safety
/// `src` must be null or point to a live handle.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn mica_rt_rc_strong_count(src: *const MicaRc) -> usize {
    let Some(src) = (unsafe { src.as_ref() }) else {
        return 0;
    };
    if src.ptr.is_null() {
        return 0;
    }
    // Safety: non-null handle points at a live block.
    RefCount::load(&unsafe { header::<Cell<usize>>(src.ptr) }.strong)
}

/// # Safety
/// `src` must be null or point to a live handle.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn mica_rt_rc_weak_count(src: *const MicaRc) -> usize {
    let Some(src) = (unsafe { src.as_ref() }) else {
        return 0;
    };
    if src.ptr.is_null() {
        return 0;
    }
    // Safety: non-null handle points at a live block.
    RefCount::load(&unsafe { header::<Cell<usize>>(src.ptr) }.weak)
}

/// # Safety
/// `dest` must be valid for writes; `src` must be null or a live handle.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn mica_rt_rc_downgrade(dest: *mut MicaWeakRc, src: *const MicaRc) -> i32 {
    let (Some(dest), Some(src)) = (unsafe { dest.as_mut() }, unsafe { src.as_ref() }) else {
        return SharedError::InvalidPointer as i32;
    };
    if src.ptr.is_null() {
        return SharedError::InvalidPointer as i32;
    }
    // Safety: non-null handle points at a live block.
    match unsafe { cell_downgrade::<Cell<usize>>(src.ptr) } {
        Ok(()) => {
            dest.ptr = src.ptr;
            SharedError::Success as i32
        }
        Err(e) => {
            dest.ptr = ptr::null_mut();
            e as i32
        }
    }
}

/// # Safety
/// `dest` must be valid for writes; `src` must be null or a live handle.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn mica_rt_weak_rc_clone(
    dest: *mut MicaWeakRc,
    src: *const MicaWeakRc,
) -> i32 {
    let (Some(dest), Some(src)) = (unsafe { dest.as_mut() }, unsafe { src.as_ref() }) else {
        return SharedError::InvalidPointer as i32;
    };
    if src.ptr.is_null() {
        return SharedError::InvalidPointer as i32;
    }
    // Safety: a weak handle keeps the header alive.
    match unsafe { cell_downgrade::<Cell<usize>>(src.ptr) } {
        Ok(()) => {
            dest.ptr = src.ptr;
            SharedError::Success as i32
        }
        Err(e) => {
            dest.ptr = ptr::null_mut();
            e as i32
        }
    }
}

/// # Safety
/// `target` must be null or point to a handle that is live or null.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn mica_rt_weak_rc_drop(target: *mut MicaWeakRc) {
    let Some(target) = (unsafe { target.as_mut() }) else {
        return;
    };
    if target.ptr.is_null() {
        return;
    }
    // Safety: non-null handle owns one weak reference.
    unsafe { weak_release::<Cell<usize>>(target.ptr) };
    target.ptr = ptr::null_mut();
}

/// # Safety
/// `dest` must be valid for writes; `src` must be null or a live handle.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn mica_rt_weak_rc_upgrade(
    dest: *mut MicaRc,
    src: *const MicaWeakRc,
) -> i32 {
    let (Some(dest), Some(src)) = (unsafe { dest.as_mut() }, unsafe { src.as_ref() }) else {
        return SharedError::InvalidPointer as i32;
    };
    if src.ptr.is_null() {
        dest.ptr = ptr::null_mut();
        return SharedError::InvalidPointer as i32;
    }
    // Safety: the weak handle keeps the header alive.
    if unsafe { weak_upgrade::<Cell<usize>>(src.ptr) } {
        dest.ptr = src.ptr;
        SharedError::Success as i32
    } else {
        dest.ptr = ptr::null_mut();
        SharedError::InvalidPointer as i32
    }
}
