pub mod config;
pub mod device;
pub mod dtype;
pub mod error;
pub mod host;
pub mod runtime;

pub mod prelude {
    pub use crate::config::{Config, DEFAULT_CONFIG};
    pub use crate::device::{DeviceList, DeviceType};
    pub use crate::dtype::DType;
    pub use crate::error::{Error, Result};
    pub use crate::host::{AnyBitPattern, Element, HostBuffer, HostBufferMut};
    pub use crate::runtime::buffer::{Buffer, CopyRange, DeviceRect, Fill, HostRect, Linear, MemFlags};
    pub use crate::runtime::context::Context;
    pub use crate::runtime::event::{EventList, ExecutionStatus};
    pub use crate::runtime::info::{DeviceInfo, InfoValue, PlatformInfo};
    pub use crate::runtime::kernel::{Kernel, KernelArg, NdRange, Scalar};
    pub use crate::runtime::platform::PlatformList;
    pub use crate::runtime::program::Program;
    pub use crate::runtime::queue::{CommandQueue, QueueProperties};
    pub use crate::runtime::{ContextSource, OpenCl, Status};
    pub use half::f16;
}
