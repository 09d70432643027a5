//! Mica Core: ABI primitives shared by the Mica runtime crates
//!
//! The Mica compiler lowers every heap acquisition and every typed container
//! operation to direct calls into the runtime. This crate holds the pieces
//! those calls bottom out on:
//!
//! - `value`: raw `(pointer, size, align)` value descriptors and the opaque
//!   region handle threaded through container constructors
//! - `alloc`: the process-wide pluggable allocator facade
//! - `stats`: lock-free allocation counters behind the facade
//!
//! Struct layouts here are ABI: compiled Mica programs access fields by
//! offset, so every public struct is `#[repr(C)]` and layout changes are
//! breaking.

pub mod alloc;
pub mod stats;
pub mod value;

// Re-export the facade surface (exported for LLVM linking)
pub use alloc::{
    AllocatorVTable, mica_rt_alloc as alloc_raw, mica_rt_alloc_zeroed as alloc_zeroed_raw,
    mica_rt_allocator_install as allocator_install, mica_rt_allocator_reset as allocator_reset,
    mica_rt_free as free_raw, mica_rt_realloc as realloc_raw,
};

pub use stats::{AllocStats, mica_rt_alloc_stats as alloc_stats};

pub use value::{RegionHandle, ValueConstPtr, ValueMutPtr};
