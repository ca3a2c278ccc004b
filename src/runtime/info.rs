//! Typed info queries.
//!
//! Each parameter enum maps to a decoder returning an [`InfoValue`]; only the
//! field the caller asks for is fetched from the driver.

use opencl3::device::Device;
use opencl3::platform::Platform;
use opencl3::types::{cl_device_id, cl_platform_id};

use crate::error::{NativeResultExt, Result};

#[derive(Clone, Debug, PartialEq)]
pub enum InfoValue {
    Uint(u64),
    Size(usize),
    Text(String),
}

impl InfoValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            InfoValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_u64(&self) -> Option<u64> {
        match self {
            InfoValue::Uint(v) => Some(*v),
            InfoValue::Size(v) => Some(*v as u64),
            InfoValue::Text(_) => None,
        }
    }
}

impl core::fmt::Display for InfoValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InfoValue::Uint(v) => write!(f, "{v}"),
            InfoValue::Size(v) => write!(f, "{v}"),
            InfoValue::Text(s) => write!(f, "{}", s.trim_end_matches('\0')),
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum PlatformInfo {
    Profile,
    Version,
    Name,
    Vendor,
    Extensions,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum DeviceInfo {
    Name,
    Vendor,
    Version,
    DriverVersion,
    Extensions,
    BuiltInKernels,
    Type,
    MaxComputeUnits,
    MaxClockFrequency,
    MaxWorkGroupSize,
    GlobalMemSize,
    LocalMemSize,
    MaxMemAllocSize,
}

pub fn platform_info(id: cl_platform_id, param: PlatformInfo) -> Result<InfoValue> {
    let platform = Platform::new(id);
    let text = match param {
        PlatformInfo::Profile => platform.profile(),
        PlatformInfo::Version => platform.version(),
        PlatformInfo::Name => platform.name(),
        PlatformInfo::Vendor => platform.vendor(),
        PlatformInfo::Extensions => platform.extensions(),
    };
    Ok(InfoValue::Text(text.native("clGetPlatformInfo")?))
}

pub fn device_info(id: cl_device_id, param: DeviceInfo) -> Result<InfoValue> {
    const CALL: &str = "clGetDeviceInfo";
    let device = Device::new(id);
    let value = match param {
        DeviceInfo::Name => InfoValue::Text(device.name().native(CALL)?),
        DeviceInfo::Vendor => InfoValue::Text(device.vendor().native(CALL)?),
        DeviceInfo::Version => InfoValue::Text(device.version().native(CALL)?),
        DeviceInfo::DriverVersion => InfoValue::Text(device.driver_version().native(CALL)?),
        DeviceInfo::Extensions => InfoValue::Text(device.extensions().native(CALL)?),
        DeviceInfo::BuiltInKernels => InfoValue::Text(device.built_in_kernels().native(CALL)?),
        DeviceInfo::Type => InfoValue::Uint(device.dev_type().native(CALL)? as u64),
        DeviceInfo::MaxComputeUnits => {
            InfoValue::Uint(device.max_compute_units().native(CALL)? as u64)
        }
        DeviceInfo::MaxClockFrequency => {
            InfoValue::Uint(device.max_clock_frequency().native(CALL)? as u64)
        }
        DeviceInfo::MaxWorkGroupSize => {
            InfoValue::Size(device.max_work_group_size().native(CALL)? as usize)
        }
        DeviceInfo::GlobalMemSize => InfoValue::Uint(device.global_mem_size().native(CALL)? as u64),
        DeviceInfo::LocalMemSize => InfoValue::Uint(device.local_mem_size().native(CALL)? as u64),
        DeviceInfo::MaxMemAllocSize => {
            InfoValue::Uint(device.max_mem_alloc_size().native(CALL)? as u64)
        }
    };
    Ok(value)
}

#[test]
fn info_value_accessors() {
    let name = InfoValue::Text("Portable Computing Language\0".into());
    assert_eq!(name.to_string(), "Portable Computing Language");
    assert_eq!(name.as_u64(), None);
    assert_eq!(InfoValue::Size(256).as_u64(), Some(256));
    assert_eq!(InfoValue::Uint(8).as_text(), None);
}
