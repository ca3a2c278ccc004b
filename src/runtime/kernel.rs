use std::ffi::{c_void, CString};
use std::mem::size_of;
use std::ptr;

use num_traits::NumCast;
use opencl3::command_queue::enqueue_nd_range_kernel;
use opencl3::kernel::{
    create_kernel, get_kernel_info, get_kernel_work_group_info, release_kernel, set_kernel_arg,
    CL_KERNEL_FUNCTION_NAME, CL_KERNEL_NUM_ARGS, CL_KERNEL_WORK_GROUP_SIZE,
};
use opencl3::types::{cl_command_queue, cl_device_id, cl_kernel, cl_mem, cl_uint};

use crate::dtype::DType;
use crate::error::{Error, NativeResultExt, Result};
use crate::runtime::buffer::Buffer;
use crate::runtime::event::{attach, wait_list, EventList};
use crate::runtime::program::Program;
use crate::runtime::queue::CommandQueue;

/// A host scalar before it is narrowed to a kernel argument type.
#[derive(Clone, Copy, PartialEq, Debug)]
pub enum Scalar {
    Int(i64),
    UInt(u64),
    Float(f64),
}

macro_rules! scalar_from {
    ($variant:ident, $wide:ty: $($t:ty),*) => {
        $(impl From<$t> for Scalar {
            fn from(v: $t) -> Self {
                Scalar::$variant(v as $wide)
            }
        })*
    };
}

scalar_from!(Int, i64: i8, i16, i32, i64, isize);
scalar_from!(UInt, u64: u8, u16, u32, u64, usize);
scalar_from!(Float, f64: f32, f64);

impl From<bool> for Scalar {
    fn from(v: bool) -> Self {
        Scalar::UInt(v as u64)
    }
}

impl Scalar {
    fn cast<T: NumCast>(self) -> Option<T> {
        match self {
            Scalar::Int(v) => T::from(v),
            Scalar::UInt(v) => T::from(v),
            Scalar::Float(v) => T::from(v),
        }
    }

    fn is_finite(self) -> bool {
        match self {
            Scalar::Float(v) => v.is_finite(),
            _ => true,
        }
    }

    /// Native-endian bytes of `self` as `dtype`, exactly `dtype.size()` long.
    pub fn to_bytes(self, dtype: DType) -> Result<Vec<u8>> {
        macro_rules! narrow {
            ($t:ty) => {
                self.cast::<$t>().map(|v| v.to_ne_bytes().to_vec())
            };
        }
        let bytes = match dtype {
            DType::Bool => self.cast::<u8>().filter(|v| *v <= 1).map(|v| vec![v]),
            DType::Int8 => narrow!(i8),
            DType::Int16 => narrow!(i16),
            DType::Int32 => narrow!(i32),
            DType::Int64 => narrow!(i64),
            DType::UInt8 => narrow!(u8),
            DType::UInt16 => narrow!(u16),
            DType::UInt32 => narrow!(u32),
            DType::UInt64 => narrow!(u64),
            // f64 to f32 saturates instead of failing
            DType::Float32 => self
                .cast::<f32>()
                .filter(|v| v.is_finite() || !self.is_finite())
                .map(|v| v.to_ne_bytes().to_vec()),
            DType::Float64 => narrow!(f64),
            _ => {
                return Err(Error::invalid(format!(
                    "Unsupported binding data type for integer or float: {dtype}"
                )))
            }
        };
        bytes.ok_or_else(|| Error::invalid(format!("{self:?} does not fit in {dtype}")))
    }
}

/// One positional kernel argument.
#[derive(Debug)]
pub enum KernelArg<'a> {
    Buffer(&'a Buffer),
    Queue(&'a CommandQueue),
    Scalar(Scalar, DType),
    /// Bytes of `__local` memory to reserve.
    Local(usize),
}

impl<'a> From<&'a Buffer> for KernelArg<'a> {
    fn from(buffer: &'a Buffer) -> Self {
        KernelArg::Buffer(buffer)
    }
}

impl<'a> From<&'a CommandQueue> for KernelArg<'a> {
    fn from(queue: &'a CommandQueue) -> Self {
        KernelArg::Queue(queue)
    }
}

/// Index space of a dispatch. `local` and `offset` must match `global`'s
/// dimensionality when given.
#[derive(Clone, PartialEq, Eq, Debug, Default)]
pub struct NdRange {
    pub global: Vec<usize>,
    pub local: Option<Vec<usize>>,
    pub offset: Option<Vec<usize>>,
}

impl NdRange {
    pub fn new(global: &[usize]) -> Self {
        Self {
            global: global.to_vec(),
            ..Default::default()
        }
    }

    pub fn local(mut self, local: &[usize]) -> Self {
        self.local = Some(local.to_vec());
        self
    }

    pub fn offset(mut self, offset: &[usize]) -> Self {
        self.offset = Some(offset.to_vec());
        self
    }

    /// Validates the shape and returns the work dimension.
    pub fn work_dim(&self) -> Result<cl_uint> {
        let dim = self.global.len();
        if !(1..=3).contains(&dim) {
            return Err(Error::invalid(format!(
                "Invalid global work size: {dim} dimensions, expected 1 to 3."
            )));
        }
        if self.global.iter().any(|&g| g == 0) {
            return Err(Error::invalid("global work size must be greater than zero."));
        }
        if let Some(local) = &self.local {
            if local.len() != dim {
                return Err(Error::invalid(
                    "dimension mismatch between global work size and local work size.",
                ));
            }
            if local.iter().any(|&l| l == 0) {
                return Err(Error::invalid("Invalid local work size."));
            }
        }
        if let Some(offset) = &self.offset {
            if offset.len() != dim {
                return Err(Error::invalid(
                    "dimension mismatch between global work size and global work offset.",
                ));
            }
        }
        Ok(dim as cl_uint)
    }
}

/// One compiled kernel entry point.
#[derive(Debug)]
pub struct Kernel {
    kernel: cl_kernel,
}

unsafe impl Send for Kernel {}

impl Kernel {
    pub fn new(program: &Program, name: &str) -> Result<Self> {
        let cname = CString::new(name)
            .map_err(|_| Error::invalid(format!("kernel name {name:?} contains a NUL byte")))?;
        let kernel = unsafe { create_kernel(program.get(), &cname) }.native("clCreateKernel")?;
        log::debug!("created kernel {name} {:?}", kernel);
        Ok(Self { kernel })
    }

    pub fn get(&self) -> cl_kernel {
        self.kernel
    }

    /// Binds argument `index`. Later calls overwrite earlier ones.
    pub fn set_arg(&self, index: u32, arg: KernelArg<'_>) -> Result<()> {
        let result = match arg {
            KernelArg::Buffer(buffer) => {
                let mem: cl_mem = buffer.get();
                unsafe {
                    set_kernel_arg(
                        self.kernel,
                        index,
                        size_of::<cl_mem>(),
                        &mem as *const cl_mem as *const c_void,
                    )
                }
            }
            KernelArg::Queue(queue) => {
                let q: cl_command_queue = queue.get();
                unsafe {
                    set_kernel_arg(
                        self.kernel,
                        index,
                        size_of::<cl_command_queue>(),
                        &q as *const cl_command_queue as *const c_void,
                    )
                }
            }
            KernelArg::Scalar(value, dtype) => {
                let bytes = value.to_bytes(dtype)?;
                unsafe {
                    set_kernel_arg(
                        self.kernel,
                        index,
                        bytes.len(),
                        bytes.as_ptr() as *const c_void,
                    )
                }
            }
            KernelArg::Local(size) => {
                if size == 0 {
                    return Err(Error::invalid("local memory size must be greater than zero."));
                }
                unsafe { set_kernel_arg(self.kernel, index, size, ptr::null()) }
            }
        };
        result.native("clSetKernelArg")
    }

    /// Sets arguments `0..args.len()` in order.
    pub fn set_args<'a, I: IntoIterator<Item = KernelArg<'a>>>(&self, args: I) -> Result<()> {
        for (i, arg) in args.into_iter().enumerate() {
            self.set_arg(i as u32, arg)?;
        }
        Ok(())
    }

    /// Enqueues the kernel over `range`. Returns once the command is queued.
    pub fn enqueue_nd_range(
        &self,
        queue: &CommandQueue,
        range: &NdRange,
        events: Option<&mut EventList>,
        wait_events: Option<&EventList>,
    ) -> Result<()> {
        let work_dim = range.work_dim()?;
        let offset_ptr = range.offset.as_ref().map_or(ptr::null(), |o| o.as_ptr());
        let local_ptr = range.local.as_ref().map_or(ptr::null(), |l| l.as_ptr());
        let (num_wait, wait_ptr) = wait_list(wait_events);
        let event = unsafe {
            enqueue_nd_range_kernel(
                queue.get(),
                self.kernel,
                work_dim,
                offset_ptr,
                range.global.as_ptr(),
                local_ptr,
                num_wait,
                wait_ptr,
            )
            .native("clEnqueueNDRangeKernel")?
        };
        log::debug!("enqueued kernel {:?} over {:?}", self.kernel, range.global);
        attach(events, event);
        Ok(())
    }

    pub fn num_args(&self) -> Result<u32> {
        let n: cl_uint = get_kernel_info(self.kernel, CL_KERNEL_NUM_ARGS)
            .native("clGetKernelInfo")?
            .into();
        Ok(n)
    }

    pub fn function_name(&self) -> Result<String> {
        let name: String = get_kernel_info(self.kernel, CL_KERNEL_FUNCTION_NAME)
            .native("clGetKernelInfo")?
            .into();
        Ok(name.trim_end_matches('\0').to_string())
    }

    /// Largest work-group size usable with this kernel on `device`.
    pub fn work_group_size(&self, device: cl_device_id) -> Result<usize> {
        let size: usize = get_kernel_work_group_info(self.kernel, device, CL_KERNEL_WORK_GROUP_SIZE)
            .native("clGetKernelWorkGroupInfo")?
            .into();
        Ok(size)
    }
}

impl Drop for Kernel {
    fn drop(&mut self) {
        if self.kernel.is_null() {
            return;
        }
        if let Err(code) = unsafe { release_kernel(self.kernel) } {
            log::warn!("clReleaseKernel error={code}");
        }
        self.kernel = ptr::null_mut();
    }
}

#[test]
fn scalars_box_to_exact_width() {
    assert_eq!(Scalar::from(2.0f32).to_bytes(DType::Float32).unwrap(), 2.0f32.to_ne_bytes());
    assert_eq!(Scalar::Int(7).to_bytes(DType::Float64).unwrap(), 7.0f64.to_ne_bytes());
    assert_eq!(Scalar::Int(-3).to_bytes(DType::Int16).unwrap(), (-3i16).to_ne_bytes());
    assert_eq!(Scalar::from(64usize).to_bytes(DType::UInt32).unwrap(), 64u32.to_ne_bytes());
    assert_eq!(Scalar::from(true).to_bytes(DType::Bool).unwrap(), vec![1u8]);
    for dtype in DType::ALL.iter().filter(|d| d.is_kernel_scalar()) {
        assert_eq!(Scalar::Int(1).to_bytes(*dtype).unwrap().len(), dtype.size());
    }
}

#[test]
fn out_of_range_scalars_are_rejected() {
    assert!(Scalar::Int(-1).to_bytes(DType::UInt8).unwrap_err().is_invalid_argument());
    assert!(Scalar::Int(300).to_bytes(DType::Int8).is_err());
    assert!(Scalar::UInt(u64::MAX).to_bytes(DType::Int64).is_err());
    assert!(Scalar::Int(2).to_bytes(DType::Bool).is_err());
    assert!(Scalar::Float(f64::NAN).to_bytes(DType::Int32).is_err());
}

#[test]
fn float_narrowing_must_stay_finite() {
    let err = Scalar::Float(1e300).to_bytes(DType::Float32).unwrap_err();
    assert!(err.is_invalid_argument());
    assert!(Scalar::Float(-3.5e38).to_bytes(DType::Float32).is_err());
    assert_eq!(
        Scalar::Float(f32::MAX as f64).to_bytes(DType::Float32).unwrap(),
        f32::MAX.to_ne_bytes()
    );
    assert!(Scalar::Float(1e300).to_bytes(DType::Float64).is_ok());
    // non-finite inputs pass through unchanged
    let inf = Scalar::Float(f64::INFINITY).to_bytes(DType::Float32).unwrap();
    assert_eq!(inf, f32::INFINITY.to_ne_bytes());
    assert!(Scalar::Float(f64::NAN).to_bytes(DType::Float32).is_ok());
    assert!(Scalar::UInt(u64::MAX).to_bytes(DType::Float32).is_ok());
}

#[test]
fn unsupported_scalar_types() {
    for dtype in [DType::Float16, DType::Float8, DType::Complex64] {
        let err = Scalar::Float(1.0).to_bytes(dtype).unwrap_err();
        assert!(err.is_invalid_argument());
    }
}

#[test]
fn nd_range_shapes() {
    assert_eq!(NdRange::new(&[64]).work_dim().unwrap(), 1);
    assert_eq!(NdRange::new(&[2, 3, 4]).local(&[1, 1, 2]).work_dim().unwrap(), 3);
    assert_eq!(NdRange::new(&[8, 8]).offset(&[0, 4]).work_dim().unwrap(), 2);
    assert!(NdRange::new(&[]).work_dim().is_err());
    assert!(NdRange::new(&[1, 1, 1, 1]).work_dim().is_err());
    assert!(NdRange::new(&[4, 0]).work_dim().is_err());
    assert!(NdRange::new(&[4, 4]).local(&[2, 0]).work_dim().is_err());
}

#[test]
fn nd_range_dimension_mismatch() {
    let err = NdRange::new(&[4, 4]).local(&[4]).work_dim().unwrap_err();
    assert!(err.is_invalid_argument());
    assert!(err.to_string().contains("dimension mismatch"));
    let err = NdRange::new(&[4]).offset(&[0, 0]).work_dim().unwrap_err();
    assert!(err.to_string().contains("dimension mismatch"));
}
