//! End-to-end scenarios across the runtime surface, driven exactly the way
//! compiled Mica programs drive it: C-ABI calls with raw value descriptors.

use mica_runtime::{MicaArc, MicaStr, MicaVec, ValueConstPtr, ValueMutPtr};

fn mica_str(text: &str) -> MicaStr {
    MicaStr {
        ptr: text.as_ptr(),
        len: text.len(),
    }
}

unsafe extern "C" fn eq_u64(left: *const u8, right: *const u8) -> i32 {
    i32::from(unsafe { left.cast::<u64>().read() == right.cast::<u64>().read() })
}

fn hash_u64(v: u64) -> u64 {
    v.wrapping_mul(0x9E37_79B9_7F4A_7C15)
}

#[test]
fn test_vector_of_ten_ints_sums_to_45() {
    let mut vec = mica_runtime::vec_new(4, 4, 0);
    for i in 0..10i32 {
        let desc = ValueConstPtr {
            ptr: (&raw const i).cast(),
            size: 4,
            align: 4,
        };
        assert_eq!(unsafe { mica_runtime::vec_push(&raw mut vec, &raw const desc) }, 0);
    }
    assert_eq!(vec.len, 10);
    assert!(vec.cap >= 10);

    let mut iter = unsafe { mica_runtime::vec_iter(&raw const vec) };
    let mut out: i32 = 0;
    let out_desc = ValueMutPtr {
        ptr: (&raw mut out).cast(),
        size: 4,
        align: 4,
    };
    let mut sum = 0i64;
    let mut count = 0;
    while unsafe { mica_runtime::vec_iter_next(&raw mut iter, &raw const out_desc) } == 0 {
        sum += i64::from(out);
        count += 1;
    }
    assert_eq!(count, 10);
    assert_eq!(sum, 45);
    unsafe { mica_runtime::vec_drop(&raw mut vec) };
}

#[test]
fn test_short_string_stays_inline() {
    let mut s = unsafe { mica_runtime::string_from_slice(mica_str("hello")) };
    assert_eq!(
        unsafe { mica_runtime::string_push_slice(&raw mut s, mica_str(" world")) },
        0
    );
    let view = unsafe { mica_runtime::string_as_slice(&raw const s) };
    let bytes = unsafe { std::slice::from_raw_parts(view.ptr, view.len) };
    assert_eq!(bytes, b"hello world");
    assert!(s.uses_inline()); // 11 bytes <= 32
    unsafe { mica_runtime::string_drop(&raw mut s) };
}

#[test]
fn test_string_spills_on_33rd_byte() {
    let a32 = "a".repeat(32);
    let mut s = unsafe { mica_runtime::string_from_slice(mica_str(&a32)) };
    assert!(s.uses_inline());
    assert_eq!(
        unsafe { mica_runtime::string_push_slice(&raw mut s, mica_str("b")) },
        0
    );
    assert_eq!(s.len, 33);
    assert!(!s.uses_inline());
    let view = unsafe { mica_runtime::string_as_slice(&raw const s) };
    let bytes = unsafe { std::slice::from_raw_parts(view.ptr, view.len) };
    assert_eq!(bytes, format!("{a32}b").as_bytes());
    unsafe { mica_runtime::string_drop(&raw mut s) };
}

#[test]
fn test_hashset_parity_after_removing_evens() {
    let mut set = mica_runtime::hashset_new(8, 8, 0, eq_u64 as usize);
    for k in 0..1000u64 {
        let desc = ValueConstPtr {
            ptr: (&raw const k).cast(),
            size: 8,
            align: 8,
        };
        let mut inserted = 0;
        assert_eq!(
            unsafe {
                mica_runtime::hashset_insert(
                    &raw mut set,
                    hash_u64(k),
                    &raw const desc,
                    &raw mut inserted,
                )
            },
            0
        );
        assert_eq!(inserted, 1);
    }
    for k in (0..1000u64).step_by(2) {
        let desc = ValueConstPtr {
            ptr: (&raw const k).cast(),
            size: 8,
            align: 8,
        };
        assert_eq!(
            unsafe { mica_runtime::hashset_remove(&raw mut set, hash_u64(k), &raw const desc) },
            1
        );
    }
    assert_eq!(unsafe { mica_runtime::hashset_len(&raw const set) }, 500);
    for k in 0..1000u64 {
        let desc = ValueConstPtr {
            ptr: (&raw const k).cast(),
            size: 8,
            align: 8,
        };
        let present =
            unsafe { mica_runtime::hashset_contains(&raw const set, hash_u64(k), &raw const desc) };
        assert_eq!(present != 0, k % 2 == 1, "key {k}");
    }
    unsafe { mica_runtime::hashset_drop(&raw mut set) };
}

#[repr(C)]
struct Point {
    x: u64,
}

#[test]
fn test_arc_clone_drop_get_mut() {
    let payload = Point { x: 42 };
    let mut a = MicaArc {
        ptr: std::ptr::null_mut(),
    };
    assert_eq!(
        unsafe {
            mica_runtime::arc_new(
                &raw mut a,
                (&raw const payload).cast(),
                std::mem::size_of::<Point>(),
                std::mem::align_of::<Point>(),
                0,
                1,
            )
        },
        0
    );
    let mut b = MicaArc {
        ptr: std::ptr::null_mut(),
    };
    let mut c = MicaArc {
        ptr: std::ptr::null_mut(),
    };
    unsafe {
        assert_eq!(mica_runtime::arc_clone(&raw mut b, &raw const a), 0);
        assert_eq!(mica_runtime::arc_clone(&raw mut c, &raw const a), 0);
        mica_runtime::arc_drop(&raw mut b);
        mica_runtime::arc_drop(&raw mut c);
    }
    assert_eq!(unsafe { mica_runtime::arc_strong_count(&raw const a) }, 1);
    let exclusive = unsafe { mica_runtime::arc_get_mut(&raw mut a) };
    assert!(!exclusive.is_null());
    assert_eq!(unsafe { exclusive.cast::<Point>().read().x }, 42);
    unsafe { mica_runtime::arc_drop(&raw mut a) };
}

#[test]
fn test_append_unsigned_right_aligns_in_width_5() {
    let mut s = mica_runtime::string_new();
    let rc = unsafe {
        mica_runtime::micastring::mica_rt_string_append_unsigned(
            &raw mut s,
            10,
            0,
            32,
            5,
            1,
            MicaStr {
                ptr: std::ptr::null(),
                len: 0,
            },
        )
    };
    assert_eq!(rc, 0);
    let view = unsafe { mica_runtime::string_as_slice(&raw const s) };
    let bytes = unsafe { std::slice::from_raw_parts(view.ptr, view.len) };
    assert_eq!(bytes, b"   10");
    unsafe { mica_runtime::string_drop(&raw mut s) };
}

#[test]
fn test_map_get_after_put_roundtrip() {
    let mut map = mica_runtime::hashmap_new(8, 8, 8, 8, 0, 0, eq_u64 as usize);
    for k in 0..100u64 {
        let v = k * 7;
        let kd = ValueConstPtr {
            ptr: (&raw const k).cast(),
            size: 8,
            align: 8,
        };
        let vd = ValueConstPtr {
            ptr: (&raw const v).cast(),
            size: 8,
            align: 8,
        };
        let mut replaced = 0;
        assert_eq!(
            unsafe {
                mica_runtime::hashmap_insert(
                    &raw mut map,
                    hash_u64(k),
                    &raw const kd,
                    &raw const vd,
                    std::ptr::null(),
                    &raw mut replaced,
                )
            },
            0
        );
    }
    for k in 0..100u64 {
        let kd = ValueConstPtr {
            ptr: (&raw const k).cast(),
            size: 8,
            align: 8,
        };
        let p = unsafe { mica_runtime::hashmap_get_ptr(&raw const map, hash_u64(k), &raw const kd) };
        assert!(!p.ptr.is_null());
        assert_eq!(unsafe { p.ptr.cast::<u64>().read() }, k * 7);
    }
    unsafe { mica_runtime::hashmap_drop(&raw mut map) };
}

#[test]
fn test_inline_and_heap_strings_agree_bytewise() {
    // The same operation sequence, one staying inline, one pre-spilled
    let mut inline = mica_runtime::string_new();
    let mut heap = mica_runtime::string_with_capacity(128);
    for part in ["mica", "-", "runtime", "!"] {
        unsafe {
            assert_eq!(mica_runtime::string_push_slice(&raw mut inline, mica_str(part)), 0);
            assert_eq!(mica_runtime::string_push_slice(&raw mut heap, mica_str(part)), 0);
        }
    }
    let a = unsafe { mica_runtime::string_as_slice(&raw const inline) };
    let b = unsafe { mica_runtime::string_as_slice(&raw const heap) };
    let a = unsafe { std::slice::from_raw_parts(a.ptr, a.len) };
    let b = unsafe { std::slice::from_raw_parts(b.ptr, b.len) };
    assert_eq!(a, b);
    assert!(inline.uses_inline());
    assert!(!heap.uses_inline());
    unsafe {
        mica_runtime::string_drop(&raw mut inline);
        mica_runtime::string_drop(&raw mut heap);
    }
}

#[test]
fn test_vec_into_array_and_back() {
    let mut vec = mica_runtime::vec_new(8, 8, 0);
    for i in 0..5u64 {
        let desc = ValueConstPtr {
            ptr: (&raw const i).cast(),
            size: 8,
            align: 8,
        };
        assert_eq!(unsafe { mica_runtime::vec_push(&raw mut vec, &raw const desc) }, 0);
    }
    let mut array: MicaVec = unsafe { std::mem::zeroed() };
    assert_eq!(
        unsafe { mica_runtime::vec_into_array(&raw mut array, &raw mut vec) },
        0
    );
    assert_eq!(unsafe { mica_runtime::array_len(&raw const array) }, 5);
    let mut roundtrip: MicaVec = unsafe { std::mem::zeroed() };
    assert_eq!(
        unsafe { mica_runtime::array_into_vec(&raw mut roundtrip, &raw mut array) },
        0
    );
    assert_eq!(unsafe { mica_runtime::vec_len(&raw const roundtrip) }, 5);
    unsafe { mica_runtime::vec_drop(&raw mut roundtrip) };
}
