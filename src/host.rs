use std::ffi::c_void;

use half::f16;

use crate::dtype::DType;
use crate::error::{Error, Result};

/// Rust scalar types that can live in a host buffer.
pub trait Element: 'static + core::fmt::Debug + Default + Copy + Send + Sync {
    const DTYPE: DType;
}

/// Elements for which every bit pattern is a valid value, so the driver may
/// write arbitrary bytes into them. `bool` is not one; read `DType::Bool`
/// data into `u8`.
///
/// # Safety
///
/// Every `size_of::<Self>()`-byte pattern must be a valid `Self`.
pub unsafe trait AnyBitPattern: Element {}

macro_rules! element {
    ($t:ty, $d:expr) => {
        impl Element for $t {
            const DTYPE: DType = $d;
        }
    };
    ($t:ty, $d:expr, any_bit_pattern) => {
        element!($t, $d);
        unsafe impl AnyBitPattern for $t {}
    };
}

element!(bool, DType::Bool);
element!(i8, DType::Int8, any_bit_pattern);
element!(i16, DType::Int16, any_bit_pattern);
element!(i32, DType::Int32, any_bit_pattern);
element!(i64, DType::Int64, any_bit_pattern);
element!(u8, DType::UInt8, any_bit_pattern);
element!(u16, DType::UInt16, any_bit_pattern);
element!(u32, DType::UInt32, any_bit_pattern);
element!(u64, DType::UInt64, any_bit_pattern);
element!(f16, DType::Float16, any_bit_pattern);
element!(f32, DType::Float32, any_bit_pattern);
element!(f64, DType::Float64, any_bit_pattern);

/// Linear, typed, host-addressable memory.
///
/// # Safety
///
/// `as_ptr_at(i)` / `as_mut_ptr_at(i)` must point into an allocation that is
/// valid for `(len() - i) * value_size()` bytes for every `i <= len()`.
pub unsafe trait HostBuffer {
    fn len(&self) -> usize;
    fn dtype(&self) -> DType;
    fn as_ptr_at(&self, offset: usize) -> *const c_void;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn value_size(&self) -> usize {
        self.dtype().size()
    }

    fn byte_len(&self) -> usize {
        self.len() * self.value_size()
    }
}

/// Host memory that reads may land in.
///
/// `bool` buffers are rejected at compile time:
///
/// ```compile_fail
/// use clbind::prelude::*;
///
/// fn read_flags(buffer: &Buffer, queue: &CommandQueue) -> Result<Vec<bool>> {
///     let mut flags = vec![false; buffer.bytes()];
///     buffer.read(queue, &mut flags, Linear::default(), None, None)?;
///     Ok(flags)
/// }
/// ```
///
/// # Safety
///
/// Same pointer contract as [`HostBuffer`], for `as_mut_ptr_at`. Any bytes
/// written through it must leave the elements valid.
pub unsafe trait HostBufferMut: HostBuffer {
    fn as_mut_ptr_at(&mut self, offset: usize) -> *mut c_void;
}

unsafe impl<T: Element> HostBuffer for [T] {
    fn len(&self) -> usize {
        <[T]>::len(self)
    }

    fn dtype(&self) -> DType {
        T::DTYPE
    }

    fn as_ptr_at(&self, offset: usize) -> *const c_void {
        self.as_ptr().wrapping_add(offset) as *const c_void
    }
}

unsafe impl<T: AnyBitPattern> HostBufferMut for [T] {
    fn as_mut_ptr_at(&mut self, offset: usize) -> *mut c_void {
        self.as_mut_ptr().wrapping_add(offset) as *mut c_void
    }
}

unsafe impl<T: Element> HostBuffer for Vec<T> {
    fn len(&self) -> usize {
        Vec::len(self)
    }

    fn dtype(&self) -> DType {
        T::DTYPE
    }

    fn as_ptr_at(&self, offset: usize) -> *const c_void {
        self.as_slice().as_ptr_at(offset)
    }
}

unsafe impl<T: AnyBitPattern> HostBufferMut for Vec<T> {
    fn as_mut_ptr_at(&mut self, offset: usize) -> *mut c_void {
        self.as_mut_slice().as_mut_ptr_at(offset)
    }
}

/// Bytes available in `host` starting at element `offset`.
pub fn host_capacity<H: HostBuffer + ?Sized>(host: &H, offset: usize) -> Result<usize> {
    let count = host.len().checked_sub(offset).ok_or_else(|| {
        Error::invalid(format!(
            "host offset {offset} is beyond the host buffer ({} elements).",
            host.len()
        ))
    })?;
    Ok(count * host.value_size())
}

#[test]
fn capacity_counts_bytes_after_offset() {
    let host = vec![0f32; 16];
    assert_eq!(host_capacity(&host, 0).unwrap(), 64);
    assert_eq!(host_capacity(&host, 4).unwrap(), 48);
    assert_eq!(host_capacity(&host, 16).unwrap(), 0);
    assert!(host_capacity(&host, 17).is_err());
}

#[test]
fn element_types_map_to_dtypes() {
    let halfs = vec![f16::from_f32(1.0); 3];
    assert_eq!(halfs.dtype(), DType::Float16);
    assert_eq!(halfs.byte_len(), 6);
    let flags = [true, false];
    assert_eq!(flags[..].dtype(), DType::Bool);
    assert_eq!(flags[..].value_size(), 1);
}

#[test]
fn pointer_at_offset() {
    let mut host = vec![1i32, 2, 3, 4];
    let base = host.as_ptr_at(0) as usize;
    assert_eq!(host.as_ptr_at(2) as usize, base + 8);
    assert_eq!(host.as_mut_ptr_at(4) as usize, base + 16);
}

#[test]
fn byte_sized_reads_go_through_u8() {
    fn readable<H: HostBufferMut + ?Sized>(host: &mut H) -> usize {
        host.byte_len()
    }
    // DType::Bool data is read back as raw bytes
    let mut flags = vec![0u8; 4];
    assert_eq!(readable(&mut flags), 4);
    assert_eq!(readable(&mut flags[1..]), 3);
    let written = [true, false];
    assert_eq!(written[..].dtype(), DType::Bool);
}

#[test]
fn capacity_with_host_offset_at_the_boundary() {
    use crate::runtime::rect::{normalize_region, RectSide};
    let host = vec![0f32; 12];
    // two rows of two floats, pitch 3 floats, starting at row 1
    let region = normalize_region(&[8, 2]).unwrap();
    let side = RectSide::new(&region, &[4, 1], 12, 0, "host_origin").unwrap();
    let last = side.last_byte(&region).unwrap();
    assert_eq!(last, 2 * 12 + 4 + 7);
    // host_buffer_offset 3 leaves exactly last + 1 bytes
    let capacity = host_capacity(&host, 3).unwrap();
    assert_eq!(capacity, 36);
    assert_eq!(last, capacity - 1);
    assert!(side.check(&region, capacity, "Host buffer is too small.").is_ok());
    let capacity = host_capacity(&host, 4).unwrap();
    assert!(side.check(&region, capacity, "Host buffer is too small.").is_err());
}
