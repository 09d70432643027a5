//! Process-wide pluggable allocator facade
//!
//! Every heap acquisition in the runtime flows through the four operations
//! here. The host program may install its own vtable once at startup (before
//! any container is constructed); otherwise the facade delegates to the Rust
//! global allocator with exact `Layout` round-trips.
//!
//! All operations are keyed by `(size, align)` and return the full
//! `(pointer, size, align)` triple so later reallocation and release can
//! reuse the alignment without recomputation.
//!
//! # Zero-sized requests
//!
//! A request for zero bytes never touches the backing allocator: it returns
//! a non-null, well-aligned sentinel pointer with `size = 0`, and freeing
//! such a triple is a no-op.
//!
//! # Installing a vtable
//!
//! The vtable is process-wide. Installing or resetting it while containers
//! are live is undefined: their drops would release memory through a
//! different allocator than the one that produced it. A null function
//! pointer in an installed vtable delegates that one operation to the
//! default path.

use crate::stats;
use crate::value::ValueMutPtr;
use std::alloc::Layout;
use std::ffi::c_void;
use std::ptr;
use std::sync::atomic::{AtomicPtr, Ordering};

/// Allocation entry points supplied by the host program.
///
/// `context` is passed back verbatim on every call; region-aware hosts route
/// placement decisions through it.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct AllocatorVTable {
    pub context: *mut c_void,
    pub alloc: Option<unsafe extern "C" fn(*mut c_void, usize, usize) -> ValueMutPtr>,
    pub alloc_zeroed: Option<unsafe extern "C" fn(*mut c_void, usize, usize) -> ValueMutPtr>,
    pub realloc:
        Option<unsafe extern "C" fn(*mut c_void, ValueMutPtr, usize, usize, usize) -> ValueMutPtr>,
    pub free: Option<unsafe extern "C" fn(*mut c_void, ValueMutPtr)>,
}

// The installed vtable, boxed and published once. Null means default.
static INSTALLED: AtomicPtr<AllocatorVTable> = AtomicPtr::new(ptr::null_mut());

fn installed() -> Option<&'static AllocatorVTable> {
    let ptr = INSTALLED.load(Ordering::Acquire);
    if ptr.is_null() {
        None
    } else {
        // Safety: the pointer was produced by Box::into_raw in install() and
        // is only invalidated by install()/reset(), which the caller must
        // not run while allocation traffic is in flight.
        Some(unsafe { &*ptr })
    }
}

/// Sentinel for zero-sized allocations: non-null, aligned, never dereferenced.
fn dangling(align: usize) -> *mut u8 {
    align as *mut u8
}

fn failure(align: usize) -> ValueMutPtr {
    ValueMutPtr {
        ptr: ptr::null_mut(),
        size: 0,
        align,
    }
}

fn layout_for(size: usize, align: usize) -> Option<Layout> {
    Layout::from_size_align(size, align).ok()
}

/// Allocate `size` bytes at `align`. Align must be a power of two.
///
/// Returns `(null, 0, align)` on failure; a zero-sized request succeeds with
/// a sentinel pointer.
#[unsafe(no_mangle)]
pub extern "C" fn mica_rt_alloc(size: usize, align: usize) -> ValueMutPtr {
    if !align.is_power_of_two() {
        return failure(align);
    }
    if size == 0 {
        return ValueMutPtr {
            ptr: dangling(align),
            size: 0,
            align,
        };
    }
    let out = if let Some(vt) = installed() {
        if let Some(f) = vt.alloc {
            // Safety: the host installed this entry point for exactly this call.
            unsafe { f(vt.context, size, align) }
        } else {
            default_alloc(size, align, false)
        }
    } else {
        default_alloc(size, align, false)
    };
    if !out.ptr.is_null() {
        stats::record_alloc(out.size);
    }
    out
}

/// Allocate zero-initialized memory. Same contract as [`mica_rt_alloc`].
#[unsafe(no_mangle)]
pub extern "C" fn mica_rt_alloc_zeroed(size: usize, align: usize) -> ValueMutPtr {
    if !align.is_power_of_two() {
        return failure(align);
    }
    if size == 0 {
        return ValueMutPtr {
            ptr: dangling(align),
            size: 0,
            align,
        };
    }
    let out = if let Some(vt) = installed() {
        if let Some(f) = vt.alloc_zeroed {
            // Safety: the host installed this entry point for exactly this call.
            unsafe { f(vt.context, size, align) }
        } else {
            default_alloc(size, align, true)
        }
    } else {
        default_alloc(size, align, true)
    };
    if !out.ptr.is_null() {
        stats::record_alloc(out.size);
    }
    out
}

fn default_alloc(size: usize, align: usize, zeroed: bool) -> ValueMutPtr {
    let Some(layout) = layout_for(size, align) else {
        return failure(align);
    };
    // Safety: layout has non-zero size (checked by the callers).
    let ptr = unsafe {
        if zeroed {
            std::alloc::alloc_zeroed(layout)
        } else {
            std::alloc::alloc(layout)
        }
    };
    if ptr.is_null() {
        failure(align)
    } else {
        ValueMutPtr { ptr, size, align }
    }
}

/// Resize an allocation produced by this facade.
///
/// `old_size` zero (or a sentinel triple) degenerates to `alloc`;
/// `new_size` zero frees and returns the sentinel. On failure the existing
/// allocation is untouched and `(null, 0, align)` is returned.
///
/// # Safety
/// `ptr` must be a triple previously returned by this facade with the same
/// `align`, and `old_size` must be its size.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn mica_rt_realloc(
    ptr: ValueMutPtr,
    old_size: usize,
    new_size: usize,
    align: usize,
) -> ValueMutPtr {
    if !align.is_power_of_two() {
        return failure(align);
    }
    if ptr.ptr.is_null() || old_size == 0 {
        return mica_rt_alloc(new_size, align);
    }
    if new_size == 0 {
        // Safety: caller contract — ptr came from this facade.
        unsafe { mica_rt_free(ptr) };
        return ValueMutPtr {
            ptr: dangling(align),
            size: 0,
            align,
        };
    }
    let out = if let Some(vt) = installed() {
        if let Some(f) = vt.realloc {
            // Safety: the host installed this entry point for exactly this call.
            unsafe { f(vt.context, ptr, old_size, new_size, align) }
        } else {
            // Safety: caller contract as above.
            unsafe { default_realloc(ptr, old_size, new_size, align) }
        }
    } else {
        // Safety: caller contract as above.
        unsafe { default_realloc(ptr, old_size, new_size, align) }
    };
    if !out.ptr.is_null() {
        stats::record_realloc(old_size, out.size);
    }
    out
}

unsafe fn default_realloc(
    ptr: ValueMutPtr,
    old_size: usize,
    new_size: usize,
    align: usize,
) -> ValueMutPtr {
    let Some(old_layout) = layout_for(old_size, align) else {
        return failure(align);
    };
    if layout_for(new_size, align).is_none() {
        return failure(align);
    }
    // Safety: caller guarantees ptr/old_layout describe a live allocation.
    let new_ptr = unsafe { std::alloc::realloc(ptr.ptr, old_layout, new_size) };
    if new_ptr.is_null() {
        failure(align)
    } else {
        ValueMutPtr {
            ptr: new_ptr,
            size: new_size,
            align,
        }
    }
}

/// Release an allocation. Null and zero-sized (sentinel) triples are no-ops.
///
/// # Safety
/// A non-sentinel `ptr` must be a triple previously returned by this facade
/// and not freed since.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn mica_rt_free(ptr: ValueMutPtr) {
    if ptr.ptr.is_null() || ptr.size == 0 {
        return;
    }
    if let Some(vt) = installed() {
        if let Some(f) = vt.free {
            // Safety: the host installed this entry point for exactly this call.
            unsafe { f(vt.context, ptr) };
            stats::record_free(ptr.size);
            return;
        }
    }
    let Some(layout) = layout_for(ptr.size, ptr.align) else {
        return;
    };
    // Safety: caller contract — the triple describes a live allocation from
    // the default path.
    unsafe { std::alloc::dealloc(ptr.ptr, layout) };
    stats::record_free(ptr.size);
}

/// Install a process-wide allocator vtable.
///
/// # Safety
/// Must be called before any container is constructed (or after all of them
/// have been dropped); memory allocated under one vtable must not be
/// released under another.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn mica_rt_allocator_install(vtable: AllocatorVTable) {
    let boxed = Box::into_raw(Box::new(vtable));
    let old = INSTALLED.swap(boxed, Ordering::AcqRel);
    if !old.is_null() {
        // Safety: only install() produces non-null values in INSTALLED.
        drop(unsafe { Box::from_raw(old) });
    }
}

/// Restore the default allocator. Same precondition as install.
///
/// # Safety
/// See [`mica_rt_allocator_install`].
#[unsafe(no_mangle)]
pub unsafe extern "C" fn mica_rt_allocator_reset() {
    let old = INSTALLED.swap(ptr::null_mut(), Ordering::AcqRel);
    if !old.is_null() {
        // Safety: only install() produces non-null values in INSTALLED.
        drop(unsafe { Box::from_raw(old) });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn test_alloc_roundtrip() {
        let p = mica_rt_alloc(128, 16);
        assert!(!p.ptr.is_null());
        assert_eq!(p.size, 128);
        assert_eq!(p.align, 16);
        assert_eq!(p.ptr as usize % 16, 0);
        unsafe { mica_rt_free(p) };
    }

    #[test]
    fn test_zero_sized_alloc_is_sentinel() {
        let p = mica_rt_alloc(0, 8);
        assert!(!p.ptr.is_null());
        assert_eq!(p.size, 0);
        // Freeing the sentinel is a no-op
        unsafe { mica_rt_free(p) };
    }

    #[test]
    fn test_bad_align_fails() {
        let p = mica_rt_alloc(64, 3);
        assert!(p.ptr.is_null());
        assert_eq!(p.size, 0);
    }

    #[test]
    fn test_alloc_zeroed_is_zeroed() {
        let p = mica_rt_alloc_zeroed(64, 8);
        assert!(!p.ptr.is_null());
        let bytes = unsafe { std::slice::from_raw_parts(p.ptr, 64) };
        assert!(bytes.iter().all(|&b| b == 0));
        unsafe { mica_rt_free(p) };
    }

    #[test]
    fn test_realloc_preserves_contents() {
        let p = mica_rt_alloc(8, 8);
        unsafe {
            p.ptr.cast::<u64>().write(0xDEAD_BEEF_CAFE_F00D);
        }
        let q = unsafe { mica_rt_realloc(p, 8, 64, 8) };
        assert!(!q.ptr.is_null());
        assert_eq!(q.size, 64);
        assert_eq!(unsafe { q.ptr.cast::<u64>().read() }, 0xDEAD_BEEF_CAFE_F00D);
        unsafe { mica_rt_free(q) };
    }

    #[test]
    fn test_realloc_from_sentinel_allocates() {
        let sentinel = mica_rt_alloc(0, 8);
        let q = unsafe { mica_rt_realloc(sentinel, 0, 32, 8) };
        assert!(!q.ptr.is_null());
        assert_eq!(q.size, 32);
        unsafe { mica_rt_free(q) };
    }

    #[test]
    fn test_realloc_to_zero_frees() {
        let p = mica_rt_alloc(32, 8);
        let q = unsafe { mica_rt_realloc(p, 32, 0, 8) };
        assert!(!q.ptr.is_null());
        assert_eq!(q.size, 0);
    }

    // Counting backend used by the install tests.
    static HOOK_ALLOCS: AtomicUsize = AtomicUsize::new(0);
    static HOOK_FREES: AtomicUsize = AtomicUsize::new(0);

    unsafe extern "C" fn counting_alloc(
        _ctx: *mut c_void,
        size: usize,
        align: usize,
    ) -> ValueMutPtr {
        HOOK_ALLOCS.fetch_add(1, Ordering::Relaxed);
        default_alloc(size, align, false)
    }

    unsafe extern "C" fn counting_free(_ctx: *mut c_void, ptr: ValueMutPtr) {
        HOOK_FREES.fetch_add(1, Ordering::Relaxed);
        if let Some(layout) = layout_for(ptr.size, ptr.align) {
            unsafe { std::alloc::dealloc(ptr.ptr, layout) };
        }
    }

    #[test]
    #[serial]
    fn test_install_routes_through_vtable() {
        let vtable = AllocatorVTable {
            context: ptr::null_mut(),
            alloc: Some(counting_alloc),
            alloc_zeroed: None,
            realloc: None,
            free: Some(counting_free),
        };
        unsafe { mica_rt_allocator_install(vtable) };

        let before = HOOK_ALLOCS.load(Ordering::Relaxed);
        let p = mica_rt_alloc(16, 8);
        assert!(!p.ptr.is_null());
        assert_eq!(HOOK_ALLOCS.load(Ordering::Relaxed), before + 1);
        unsafe { mica_rt_free(p) };
        assert!(HOOK_FREES.load(Ordering::Relaxed) >= 1);

        unsafe { mica_rt_allocator_reset() };
    }

    #[test]
    #[serial]
    fn test_null_slot_delegates_to_default() {
        let vtable = AllocatorVTable {
            context: ptr::null_mut(),
            alloc: None,
            alloc_zeroed: None,
            realloc: None,
            free: None,
        };
        unsafe { mica_rt_allocator_install(vtable) };

        let p = mica_rt_alloc_zeroed(32, 8);
        assert!(!p.ptr.is_null());
        unsafe { mica_rt_free(p) };

        unsafe { mica_rt_allocator_reset() };
    }
}
