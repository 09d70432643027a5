//! MicaString - growable UTF-8 string with small-string optimization
//!
//! The first 32 bytes of content live inside the struct itself; longer
//! strings spill to a heap buffer acquired through the allocator facade.
//! The inline/heap discriminant is the capacity field: `cap <=
//! STRING_INLINE_CAPACITY` means inline. Compiled code moves these structs
//! freely, which relocates the inline buffer, so every operation recomputes
//! the effective data pointer from the struct's own inline storage and never
//! trusts a stored pointer while inline.
//!
//! Contents are always well-formed UTF-8: byte inputs are validated on the
//! way in and truncation is rejected off scalar boundaries.
//!
//! # Safety Invariants
//! - heap mode: `ptr` is a live facade allocation of `cap` bytes, `cap > 32`
//! - `len <= cap` (inline mode: `len <= 32`)
//! - bytes `[0, len)` are well-formed UTF-8

use crate::chars::MicaChar;
use crate::format;
use mica_core::ValueMutPtr;
use mica_core::alloc::{mica_rt_alloc, mica_rt_free, mica_rt_realloc};
use std::ptr;

/// Bytes of content that fit without a heap allocation.
pub const STRING_INLINE_CAPACITY: usize = 32;

/// Borrowed read-only byte view. `len == 0` permits any pointer.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct MicaStr {
    pub ptr: *const u8,
    pub len: usize,
}

/// Borrowed span of 16-bit code units.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct MicaCharSpan {
    pub ptr: *const MicaChar,
    pub len: usize,
}

/// The string representation the compiler lays out. Field offsets are ABI.
#[repr(C)]
#[derive(Debug)]
pub struct MicaString {
    pub ptr: *mut u8,
    pub len: usize,
    pub cap: usize,
    pub inline_data: [u8; STRING_INLINE_CAPACITY],
}

/// Error codes for string operations.
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StringError {
    Success = 0,
    Utf8 = 1,
    CapacityOverflow = 2,
    AllocationFailed = 3,
    InvalidPointer = 4,
    OutOfBounds = 5,
}

impl MicaStr {
    pub fn empty() -> Self {
        MicaStr {
            ptr: ptr::null(),
            len: 0,
        }
    }

    /// View the slice bytes.
    ///
    /// # Safety
    /// `ptr` must be valid for `len` bytes when `len > 0`.
    pub unsafe fn as_bytes<'a>(&self) -> Option<&'a [u8]> {
        if self.len == 0 {
            return Some(&[]);
        }
        if self.ptr.is_null() {
            return None;
        }
        // Safety: caller contract.
        Some(unsafe { std::slice::from_raw_parts(self.ptr, self.len) })
    }
}

impl MicaString {
    fn empty_inline() -> Self {
        MicaString {
            ptr: ptr::null_mut(),
            len: 0,
            cap: STRING_INLINE_CAPACITY,
            inline_data: [0; STRING_INLINE_CAPACITY],
        }
    }

    pub fn uses_inline(&self) -> bool {
        self.cap <= STRING_INLINE_CAPACITY
    }

    fn effective_capacity(&self) -> usize {
        if self.uses_inline() {
            STRING_INLINE_CAPACITY
        } else {
            self.cap
        }
    }

    fn data(&self) -> *const u8 {
        if self.uses_inline() {
            self.inline_data.as_ptr()
        } else {
            self.ptr
        }
    }

    fn data_mut(&mut self) -> *mut u8 {
        if self.uses_inline() {
            self.inline_data.as_mut_ptr()
        } else {
            self.ptr
        }
    }

    // Keep the stored pointer usable for code that reads fields by offset.
    fn sync_ptr(&mut self) {
        if self.uses_inline() {
            self.ptr = self.inline_data.as_mut_ptr();
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        // Safety: the length invariant bounds the live bytes.
        unsafe { std::slice::from_raw_parts(self.data(), self.len) }
    }

    pub fn as_str(&self) -> &str {
        // Safety: the UTF-8 invariant holds for the live bytes.
        unsafe { std::str::from_utf8_unchecked(self.as_bytes()) }
    }

    fn reserve_internal(&mut self, additional: usize) -> Result<(), StringError> {
        let required = self
            .len
            .checked_add(additional)
            .ok_or(StringError::CapacityOverflow)?;
        if required <= self.effective_capacity() {
            self.sync_ptr();
            return Ok(());
        }
        let new_cap = required
            .max(self.effective_capacity().saturating_mul(2))
            .max(STRING_INLINE_CAPACITY + 1);
        if self.uses_inline() {
            let fresh = mica_rt_alloc(new_cap, 1);
            if fresh.ptr.is_null() {
                return Err(StringError::AllocationFailed);
            }
            // Safety: fresh is a new allocation of new_cap >= len bytes.
            unsafe {
                ptr::copy_nonoverlapping(self.inline_data.as_ptr(), fresh.ptr, self.len);
            }
            self.ptr = fresh.ptr;
            self.cap = fresh.size;
        } else {
            let existing = ValueMutPtr {
                ptr: self.ptr,
                size: self.cap,
                align: 1,
            };
            // Safety: existing describes this string's live heap buffer.
            let moved = unsafe { mica_rt_realloc(existing, self.cap, new_cap, 1) };
            if moved.ptr.is_null() {
                return Err(StringError::AllocationFailed);
            }
            self.ptr = moved.ptr;
            self.cap = moved.size;
        }
        Ok(())
    }

    fn push_bytes_unchecked(&mut self, bytes: &[u8]) {
        // Safety: reserve_internal established capacity; the regions cannot
        // overlap (the source is caller memory, the destination fresh tail).
        unsafe {
            ptr::copy_nonoverlapping(bytes.as_ptr(), self.data_mut().add(self.len), bytes.len());
        }
        self.len += bytes.len();
    }

    fn push_validated(&mut self, bytes: &[u8]) -> Result<(), StringError> {
        if std::str::from_utf8(bytes).is_err() {
            return Err(StringError::Utf8);
        }
        self.reserve_internal(bytes.len())?;
        self.push_bytes_unchecked(bytes);
        Ok(())
    }

    fn push_rendered(
        &mut self,
        body: &str,
        alignment: i32,
        has_alignment: i32,
    ) -> Result<(), StringError> {
        let display_width = body.chars().count();
        let (left, right) = format::alignment_padding(display_width, alignment, has_alignment);
        let total = body
            .len()
            .checked_add(left)
            .and_then(|n| n.checked_add(right))
            .ok_or(StringError::CapacityOverflow)?;
        self.reserve_internal(total)?;
        for _ in 0..left {
            self.push_bytes_unchecked(b" ");
        }
        self.push_bytes_unchecked(body.as_bytes());
        for _ in 0..right {
            self.push_bytes_unchecked(b" ");
        }
        Ok(())
    }
}

fn code(result: Result<(), StringError>) -> i32 {
    match result {
        Ok(()) => StringError::Success as i32,
        Err(e) => e as i32,
    }
}

/// Static description of a string error code.
#[unsafe(no_mangle)]
pub extern "C" fn mica_rt_string_error_message(code: i32) -> MicaStr {
    let msg: &'static str = match code {
        0 => "success",
        1 => "invalid utf-8",
        2 => "capacity overflow",
        3 => "allocation failed",
        4 => "invalid pointer",
        5 => "index out of bounds",
        _ => "unknown string error",
    };
    MicaStr {
        ptr: msg.as_ptr(),
        len: msg.len(),
    }
}

// ============================================================================
// Construction and teardown
// ============================================================================

/// An empty string in inline mode.
#[unsafe(no_mangle)]
pub extern "C" fn mica_rt_string_new() -> MicaString {
    MicaString::empty_inline()
}

/// An empty string with at least `capacity` bytes reserved. Falls back to
/// an inline empty string if the reservation cannot be satisfied.
#[unsafe(no_mangle)]
pub extern "C" fn mica_rt_string_with_capacity(capacity: usize) -> MicaString {
    let mut s = MicaString::empty_inline();
    if capacity > STRING_INLINE_CAPACITY {
        let _ = s.reserve_internal(capacity);
    }
    s
}

/// Copy a UTF-8 slice into a fresh string. Ill-formed input or a failed
/// allocation yields an empty string (constructors have no error channel).
///
/// # Safety
/// `slice.ptr` must be valid for `slice.len` bytes when `slice.len > 0`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn mica_rt_string_from_slice(slice: MicaStr) -> MicaString {
    let mut s = MicaString::empty_inline();
    if let Some(bytes) = unsafe { slice.as_bytes() } {
        let _ = s.push_validated(bytes);
    }
    s
}

/// A one-character string. Surrogate code units render U+FFFD.
#[unsafe(no_mangle)]
pub extern "C" fn mica_rt_string_from_char(value: MicaChar) -> MicaString {
    let c = char::from_u32(u32::from(value)).unwrap_or(char::REPLACEMENT_CHARACTER);
    let mut s = MicaString::empty_inline();
    let mut buf = [0u8; 4];
    s.push_bytes_unchecked(c.encode_utf8(&mut buf).as_bytes());
    s
}

/// Release the string's heap buffer (if any) and reset it to the zeroed
/// post-drop state. Safe to call twice; the second call is a no-op.
///
/// # Safety
/// `target` must be null or point to a valid `MicaString`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn mica_rt_string_drop(target: *mut MicaString) {
    let Some(target) = (unsafe { target.as_mut() }) else {
        return;
    };
    if !target.uses_inline() {
        let buffer = ValueMutPtr {
            ptr: target.ptr,
            size: target.cap,
            align: 1,
        };
        // Safety: heap mode means ptr/cap describe a live facade allocation.
        unsafe { mica_rt_free(buffer) };
    }
    target.len = 0;
    target.cap = 0;
    target.inline_data = [0; STRING_INLINE_CAPACITY];
    target.ptr = target.inline_data.as_mut_ptr();
}

/// Copy `src`'s contents into `dest` (an uninitialized out slot).
///
/// # Safety
/// `dest` must be valid for writes of `MicaString`; `src` must be null or a
/// valid string.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn mica_rt_string_clone(
    dest: *mut MicaString,
    src: *const MicaString,
) -> i32 {
    let (Some(dest), Some(src)) = (unsafe { dest.as_mut() }, unsafe { src.as_ref() }) else {
        return StringError::InvalidPointer as i32;
    };
    let mut fresh = MicaString::empty_inline();
    let result = fresh
        .reserve_internal(src.len)
        .map(|()| fresh.push_bytes_unchecked(src.as_bytes()));
    if result.is_ok() {
        *dest = fresh;
        dest.sync_ptr();
    }
    code(result)
}

/// Copy a borrowed UTF-8 slice into `dest` (an uninitialized out slot).
///
/// # Safety
/// `dest` must be valid for writes; `slice.ptr` valid for `slice.len` bytes.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn mica_rt_string_clone_slice(dest: *mut MicaString, slice: MicaStr) -> i32 {
    let Some(dest) = (unsafe { dest.as_mut() }) else {
        return StringError::InvalidPointer as i32;
    };
    let Some(bytes) = (unsafe { slice.as_bytes() }) else {
        return StringError::InvalidPointer as i32;
    };
    let mut fresh = MicaString::empty_inline();
    let result = fresh.push_validated(bytes);
    if result.is_ok() {
        *dest = fresh;
        dest.sync_ptr();
    }
    code(result)
}

// ============================================================================
// Mutation
// ============================================================================

/// Ensure capacity for `additional` more bytes. Failure leaves the string
/// unchanged.
///
/// # Safety
/// `target` must be null or point to a valid `MicaString`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn mica_rt_string_reserve(target: *mut MicaString, additional: usize) -> i32 {
    let Some(target) = (unsafe { target.as_mut() }) else {
        return StringError::InvalidPointer as i32;
    };
    code(target.reserve_internal(additional))
}

/// Append a UTF-8 slice.
///
/// # Safety
/// `target` must be a valid string; `slice.ptr` valid for `slice.len` bytes.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn mica_rt_string_push_slice(target: *mut MicaString, slice: MicaStr) -> i32 {
    let Some(target) = (unsafe { target.as_mut() }) else {
        return StringError::InvalidPointer as i32;
    };
    let Some(bytes) = (unsafe { slice.as_bytes() }) else {
        return StringError::InvalidPointer as i32;
    };
    code(target.push_validated(bytes))
}

/// Shorten to `new_len` bytes. The cut must land on a scalar boundary;
/// capacity is retained.
///
/// # Safety
/// `target` must be null or point to a valid `MicaString`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn mica_rt_string_truncate(target: *mut MicaString, new_len: usize) -> i32 {
    let Some(target) = (unsafe { target.as_mut() }) else {
        return StringError::InvalidPointer as i32;
    };
    if new_len > target.len {
        return StringError::OutOfBounds as i32;
    }
    if !target.as_str().is_char_boundary(new_len) {
        return StringError::Utf8 as i32;
    }
    target.len = new_len;
    StringError::Success as i32
}

// ============================================================================
// Views
// ============================================================================

/// Borrow the contents as a byte slice.
///
/// # Safety
/// `source` must be null or point to a valid `MicaString`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn mica_rt_string_as_slice(source: *const MicaString) -> MicaStr {
    let Some(source) = (unsafe { source.as_ref() }) else {
        return MicaStr::empty();
    };
    MicaStr {
        ptr: source.data(),
        len: source.len,
    }
}

fn encode_utf16_span(text: &str) -> MicaCharSpan {
    let units = text.encode_utf16().count();
    if units == 0 {
        return MicaCharSpan {
            ptr: ptr::null(),
            len: 0,
        };
    }
    let size = units * std::mem::size_of::<MicaChar>();
    let buffer = mica_rt_alloc(size, std::mem::align_of::<MicaChar>());
    if buffer.ptr.is_null() {
        return MicaCharSpan {
            ptr: ptr::null(),
            len: 0,
        };
    }
    let out = buffer.ptr.cast::<MicaChar>();
    for (i, unit) in text.encode_utf16().enumerate() {
        // Safety: buffer holds `units` code units and i < units.
        unsafe { out.add(i).write(unit) };
    }
    MicaCharSpan { ptr: out, len: units }
}

/// Decode the contents into freshly allocated UTF-16 code units.
/// Supplementary-plane scalars become surrogate pairs. The caller releases
/// the span through the facade (`size = len * 2`, `align = 2`); a zero-length
/// span owns no allocation.
///
/// # Safety
/// `source` must be null or point to a valid `MicaString`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn mica_rt_string_as_chars(source: *const MicaString) -> MicaCharSpan {
    let Some(source) = (unsafe { source.as_ref() }) else {
        return MicaCharSpan {
            ptr: ptr::null(),
            len: 0,
        };
    };
    encode_utf16_span(source.as_str())
}

/// [`mica_rt_string_as_chars`] over a borrowed slice; ill-formed input
/// yields an empty span.
///
/// # Safety
/// `slice.ptr` must be valid for `slice.len` bytes when `slice.len > 0`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn mica_rt_str_as_chars(slice: MicaStr) -> MicaCharSpan {
    let empty = MicaCharSpan {
        ptr: ptr::null(),
        len: 0,
    };
    let Some(bytes) = (unsafe { slice.as_bytes() }) else {
        return empty;
    };
    match std::str::from_utf8(bytes) {
        Ok(text) => encode_utf16_span(text),
        Err(_) => empty,
    }
}

// ============================================================================
// Typed appends
// ============================================================================

/// Append a slice under field alignment (no directive vocabulary).
///
/// # Safety
/// `target` must be a valid string; `slice.ptr` valid for `slice.len` bytes.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn mica_rt_string_append_slice(
    target: *mut MicaString,
    slice: MicaStr,
    alignment: i32,
    has_alignment: i32,
) -> i32 {
    let Some(target) = (unsafe { target.as_mut() }) else {
        return StringError::InvalidPointer as i32;
    };
    let Some(bytes) = (unsafe { slice.as_bytes() }) else {
        return StringError::InvalidPointer as i32;
    };
    let Ok(text) = std::str::from_utf8(bytes) else {
        return StringError::Utf8 as i32;
    };
    code(target.push_rendered(text, alignment, has_alignment))
}

unsafe fn append_body(
    target: *mut MicaString,
    body: &str,
    alignment: i32,
    has_alignment: i32,
) -> i32 {
    let Some(target) = (unsafe { target.as_mut() }) else {
        return StringError::InvalidPointer as i32;
    };
    code(target.push_rendered(body, alignment, has_alignment))
}

/// Append "true" or "false".
///
/// # Safety
/// `target` must be a valid string; `format.ptr` valid for `format.len`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn mica_rt_string_append_bool(
    target: *mut MicaString,
    value: bool,
    alignment: i32,
    has_alignment: i32,
    format: MicaStr,
) -> i32 {
    let Some(directives) = (unsafe { format.as_bytes() }) else {
        return StringError::InvalidPointer as i32;
    };
    let spec = format::parse(directives);
    let body = if value { "true" } else { "false" };
    let rendered;
    let body = if let Some(width) = spec.width {
        rendered = format!("{body:>width$}");
        rendered.as_str()
    } else {
        body
    };
    unsafe { append_body(target, body, alignment, has_alignment) }
}

/// Append one character. Surrogate code units are rejected with `Utf8`.
///
/// # Safety
/// `target` must be a valid string; `format.ptr` valid for `format.len`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn mica_rt_string_append_char(
    target: *mut MicaString,
    value: MicaChar,
    alignment: i32,
    has_alignment: i32,
    format: MicaStr,
) -> i32 {
    if unsafe { format.as_bytes() }.is_none() {
        return StringError::InvalidPointer as i32;
    }
    let Some(c) = char::from_u32(u32::from(value)) else {
        return StringError::Utf8 as i32;
    };
    let mut buf = [0u8; 4];
    let body = c.encode_utf8(&mut buf);
    unsafe { append_body(target, body, alignment, has_alignment) }
}

const VALID_BITS: [u32; 5] = [8, 16, 32, 64, 128];

/// Append a signed integer delivered as split halves at a declared width.
///
/// # Safety
/// `target` must be a valid string; `format.ptr` valid for `format.len`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn mica_rt_string_append_signed(
    target: *mut MicaString,
    low: u64,
    high: u64,
    bits: u32,
    alignment: i32,
    has_alignment: i32,
    format: MicaStr,
) -> i32 {
    let Some(directives) = (unsafe { format.as_bytes() }) else {
        return StringError::InvalidPointer as i32;
    };
    if !VALID_BITS.contains(&bits) {
        return StringError::InvalidPointer as i32;
    }
    let spec = format::parse(directives);
    let value = format::signed_from_parts(low, high, bits);
    let body = format::render_signed(value, bits, &spec);
    unsafe { append_body(target, &body, alignment, has_alignment) }
}

/// Append an unsigned integer delivered as split halves at a declared width.
///
/// # Safety
/// `target` must be a valid string; `format.ptr` valid for `format.len`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn mica_rt_string_append_unsigned(
    target: *mut MicaString,
    low: u64,
    high: u64,
    bits: u32,
    alignment: i32,
    has_alignment: i32,
    format: MicaStr,
) -> i32 {
    let Some(directives) = (unsafe { format.as_bytes() }) else {
        return StringError::InvalidPointer as i32;
    };
    if !VALID_BITS.contains(&bits) {
        return StringError::InvalidPointer as i32;
    }
    let spec = format::parse(directives);
    let value = format::unsigned_from_parts(low, high, bits);
    let body = format::render_unsigned(value, &spec);
    unsafe { append_body(target, &body, alignment, has_alignment) }
}

/// Append a single-precision float.
///
/// # Safety
/// `target` must be a valid string; `format.ptr` valid for `format.len`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn mica_rt_string_append_f32(
    target: *mut MicaString,
    value: f32,
    alignment: i32,
    has_alignment: i32,
    format: MicaStr,
) -> i32 {
    let Some(directives) = (unsafe { format.as_bytes() }) else {
        return StringError::InvalidPointer as i32;
    };
    let body = format::render_f32(value, &format::parse(directives));
    unsafe { append_body(target, &body, alignment, has_alignment) }
}

/// Append a double-precision float.
///
/// # Safety
/// `target` must be a valid string; `format.ptr` valid for `format.len`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn mica_rt_string_append_f64(
    target: *mut MicaString,
    value: f64,
    alignment: i32,
    has_alignment: i32,
    format: MicaStr,
) -> i32 {
    let Some(directives) = (unsafe { format.as_bytes() }) else {
        return StringError::InvalidPointer as i32;
    };
    let body = format::render_f64(value, &format::parse(directives));
    unsafe { append_body(target, &body, alignment, has_alignment) }
}

/// Append a half-precision float delivered as its bit pattern.
///
/// # Safety
/// `target` must be a valid string; `format.ptr` valid for `format.len`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn mica_rt_string_append_f16(
    target: *mut MicaString,
    bits: u16,
    alignment: i32,
    has_alignment: i32,
    format: MicaStr,
) -> i32 {
    let Some(directives) = (unsafe { format.as_bytes() }) else {
        return StringError::InvalidPointer as i32;
    };
    let body = format::render_f32(format::f16_to_f32(bits), &format::parse(directives));
    unsafe { append_body(target, &body, alignment, has_alignment) }
}

/// Append a quad-precision float delivered as its bit pattern. Rendering
/// rounds to double precision first (see the format module).
///
/// # Safety
/// `target` must be a valid string; `format.ptr` valid for `format.len`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn mica_rt_string_append_f128(
    target: *mut MicaString,
    bits: u128,
    alignment: i32,
    has_alignment: i32,
    format: MicaStr,
) -> i32 {
    let Some(directives) = (unsafe { format.as_bytes() }) else {
        return StringError::InvalidPointer as i32;
    };
    let body = format::render_f64(format::f128_to_f64(bits), &format::parse(directives));
    unsafe { append_body(target, &body, alignment, has_alignment) }
}

// ============================================================================
// Field accessors for codegen
// ============================================================================

/// Effective data pointer; recomputes the inline address.
///
/// # Safety
/// `value` must point to a valid `MicaString`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn mica_rt_string_get_ptr(value: *const MicaString) -> *mut u8 {
    let s = unsafe { &*value };
    s.data().cast_mut()
}

/// # Safety
/// `value` must point to a valid `MicaString`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn mica_rt_string_set_ptr(value: *mut MicaString, ptr: *mut u8) {
    unsafe { (*value).ptr = ptr };
}

/// # Safety
/// `value` must point to a valid `MicaString`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn mica_rt_string_get_len(value: *const MicaString) -> usize {
    unsafe { (*value).len }
}

/// # Safety
/// `value` must point to a valid `MicaString`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn mica_rt_string_set_len(value: *mut MicaString, len: usize) {
    unsafe { (*value).len = len };
}

/// # Safety
/// `value` must point to a valid `MicaString`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn mica_rt_string_get_cap(value: *const MicaString) -> usize {
    unsafe { (*value).cap }
}

/// # Safety
/// `value` must point to a valid `MicaString`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn mica_rt_string_set_cap(value: *mut MicaString, cap: usize) {
    unsafe { (*value).cap = cap };
}

/// Address of the inline buffer inside this struct.
///
/// # Safety
/// `value` must point to a valid `MicaString`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn mica_rt_string_inline_ptr(value: *mut MicaString) -> *mut u8 {
    unsafe { (*value).inline_data.as_mut_ptr() }
}

#[unsafe(no_mangle)]
pub extern "C" fn mica_rt_string_inline_capacity() -> usize {
    STRING_INLINE_CAPACITY
}
