use crate::error::{Error, Result};

/// Element type tag carried by device buffers and host buffers.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Hash)]
pub enum DType {
    Bool,
    Int8,
    Int16,
    Int32,
    Int64,
    UInt8,
    UInt16,
    UInt32,
    UInt64,
    Float8,
    Float16,
    Float32,
    Float64,
    Complex16,
    Complex32,
    Complex64,
    Complex128,
}

impl core::fmt::Display for DType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "dtypes.{}", self.name())
    }
}

impl DType {
    pub const ALL: [DType; 17] = [
        DType::Bool,
        DType::Int8,
        DType::Int16,
        DType::Int32,
        DType::Int64,
        DType::UInt8,
        DType::UInt16,
        DType::UInt32,
        DType::UInt64,
        DType::Float8,
        DType::Float16,
        DType::Float32,
        DType::Float64,
        DType::Complex16,
        DType::Complex32,
        DType::Complex64,
        DType::Complex128,
    ];

    /// Bytes per element.
    pub fn size(&self) -> usize {
        match self {
            DType::Bool | DType::Int8 | DType::UInt8 | DType::Float8 => 1,
            DType::Int16 | DType::UInt16 | DType::Float16 | DType::Complex16 => 2,
            DType::Int32 | DType::UInt32 | DType::Float32 | DType::Complex32 => 4,
            DType::Int64 | DType::UInt64 | DType::Float64 | DType::Complex64 => 8,
            DType::Complex128 => 16,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            DType::Bool => "bool",
            DType::Int8 => "char",
            DType::Int16 => "short",
            DType::Int32 => "int",
            DType::Int64 => "long",
            DType::UInt8 => "uchar",
            DType::UInt16 => "ushort",
            DType::UInt32 => "uint",
            DType::UInt64 => "ulong",
            DType::Float8 => "float8",
            DType::Float16 => "half",
            DType::Float32 => "float",
            DType::Float64 => "double",
            DType::Complex16 => "complex16",
            DType::Complex32 => "complex32",
            DType::Complex64 => "complex64",
            DType::Complex128 => "complex128",
        }
    }

    pub fn is_int(&self) -> bool {
        matches!(
            *self,
            DType::Int8 | DType::Int16 | DType::Int32 | DType::Int64
        ) || self.is_unsigned()
    }

    pub fn is_unsigned(&self) -> bool {
        matches!(
            *self,
            DType::UInt8 | DType::UInt16 | DType::UInt32 | DType::UInt64
        )
    }

    pub fn is_float(&self) -> bool {
        matches!(
            *self,
            DType::Float8 | DType::Float16 | DType::Float32 | DType::Float64
        )
    }

    /// Types a scalar kernel argument may be bound as.
    pub fn is_kernel_scalar(&self) -> bool {
        matches!(*self, DType::Bool | DType::Float32 | DType::Float64) || self.is_int()
    }

    pub fn from_name(name: &str) -> Result<Self> {
        DType::ALL
            .iter()
            .copied()
            .find(|d| d.name() == name || format!("{:?}", d).eq_ignore_ascii_case(name))
            .ok_or_else(|| Error::invalid(format!("unknown dtype: {name}")))
    }
}

#[test]
fn value_sizes() {
    assert_eq!(DType::Bool.size(), 1);
    assert_eq!(DType::Int16.size(), 2);
    assert_eq!(DType::Float32.size(), 4);
    assert_eq!(DType::UInt64.size(), 8);
    assert_eq!(DType::Complex128.size(), 16);
}

#[test]
fn kernel_scalar_whitelist() {
    let allowed: Vec<DType> = DType::ALL
        .iter()
        .copied()
        .filter(|d| d.is_kernel_scalar())
        .collect();
    assert_eq!(allowed.len(), 11);
    assert!(!DType::Float16.is_kernel_scalar());
    assert!(!DType::Float8.is_kernel_scalar());
    assert!(!DType::Complex64.is_kernel_scalar());
}

#[test]
fn dtype_by_name() {
    assert_eq!(DType::from_name("float").unwrap(), DType::Float32);
    assert_eq!(DType::from_name("float32").unwrap(), DType::Float32);
    assert_eq!(DType::from_name("uint16").unwrap(), DType::UInt16);
    assert!(DType::from_name("quad").is_err());
    assert_eq!(format!("{}", DType::Float64), "dtypes.double");
}
