//! Allocation statistics behind the facade
//!
//! Every successful facade operation bumps a small set of process-wide
//! atomic counters. Updates are `Relaxed` stores on the allocation fast
//! path; reads happen only when a report is requested, so the counters cost
//! a couple of cycles per allocation and nothing when idle.

use std::sync::atomic::{AtomicU64, Ordering};

static TOTAL_ALLOCS: AtomicU64 = AtomicU64::new(0);
static TOTAL_FREES: AtomicU64 = AtomicU64::new(0);
static TOTAL_REALLOCS: AtomicU64 = AtomicU64::new(0);
static LIVE_BYTES: AtomicU64 = AtomicU64::new(0);
static PEAK_BYTES: AtomicU64 = AtomicU64::new(0);

/// Snapshot of the allocation counters.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AllocStats {
    pub total_allocs: u64,
    pub total_frees: u64,
    pub total_reallocs: u64,
    pub live_bytes: u64,
    pub peak_bytes: u64,
}

fn bump_peak(live: u64) {
    PEAK_BYTES.fetch_max(live, Ordering::Relaxed);
}

pub fn record_alloc(bytes: usize) {
    TOTAL_ALLOCS.fetch_add(1, Ordering::Relaxed);
    let live = LIVE_BYTES.fetch_add(bytes as u64, Ordering::Relaxed) + bytes as u64;
    bump_peak(live);
}

pub fn record_free(bytes: usize) {
    TOTAL_FREES.fetch_add(1, Ordering::Relaxed);
    LIVE_BYTES.fetch_sub(bytes as u64, Ordering::Relaxed);
}

pub fn record_realloc(old_bytes: usize, new_bytes: usize) {
    TOTAL_REALLOCS.fetch_add(1, Ordering::Relaxed);
    if new_bytes >= old_bytes {
        let grow = (new_bytes - old_bytes) as u64;
        let live = LIVE_BYTES.fetch_add(grow, Ordering::Relaxed) + grow;
        bump_peak(live);
    } else {
        LIVE_BYTES.fetch_sub((old_bytes - new_bytes) as u64, Ordering::Relaxed);
    }
}

/// Read the current counters.
pub fn snapshot() -> AllocStats {
    AllocStats {
        total_allocs: TOTAL_ALLOCS.load(Ordering::Relaxed),
        total_frees: TOTAL_FREES.load(Ordering::Relaxed),
        total_reallocs: TOTAL_REALLOCS.load(Ordering::Relaxed),
        live_bytes: LIVE_BYTES.load(Ordering::Relaxed),
        peak_bytes: PEAK_BYTES.load(Ordering::Relaxed),
    }
}

/// Copy the current counters into `out`. Returns 0 on success, nonzero when
/// `out` is null.
///
/// # Safety
/// `out` must be null or valid for writes of `AllocStats`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn mica_rt_alloc_stats(out: *mut AllocStats) -> i32 {
    if out.is_null() {
        return 1;
    }
    // Safety: checked non-null above; caller guarantees validity.
    unsafe { out.write(snapshot()) };
    0
}

#[cfg(test)]
mod tests {
    use super::*;

    // Counters are process-wide and other tests allocate concurrently, so
    // assertions work on deltas of the monotonic counters only.

    #[test]
    fn test_record_alloc_free_moves_counters() {
        let before = snapshot();
        record_alloc(100);
        record_free(100);
        let after = snapshot();
        assert!(after.total_allocs >= before.total_allocs + 1);
        assert!(after.total_frees >= before.total_frees + 1);
        assert!(after.peak_bytes >= before.peak_bytes);
    }

    #[test]
    fn test_realloc_counts_once() {
        let before = snapshot();
        record_alloc(64);
        record_realloc(64, 256);
        record_free(256);
        let after = snapshot();
        assert!(after.total_reallocs >= before.total_reallocs + 1);
    }

    #[test]
    fn test_ffi_snapshot_writes_out() {
        let mut out = AllocStats {
            total_allocs: 0,
            total_frees: 0,
            total_reallocs: 0,
            live_bytes: 0,
            peak_bytes: 0,
        };
        let rc = unsafe { mica_rt_alloc_stats(&raw mut out) };
        assert_eq!(rc, 0);
        let direct = snapshot();
        assert!(direct.total_allocs >= out.total_allocs);
    }

    #[test]
    fn test_ffi_snapshot_null_out() {
        let rc = unsafe { mica_rt_alloc_stats(std::ptr::null_mut()) };
        assert_eq!(rc, 1);
    }
}
