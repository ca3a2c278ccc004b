use opencl3::device::{
    get_device_ids, CL_DEVICE_TYPE_ACCELERATOR, CL_DEVICE_TYPE_ALL, CL_DEVICE_TYPE_CPU,
    CL_DEVICE_TYPE_DEFAULT, CL_DEVICE_TYPE_GPU,
};
use opencl3::types::{cl_device_id, cl_device_type};

use crate::error::{Error, NativeResultExt, Result};
use crate::runtime::info::{device_info, DeviceInfo, InfoValue};
use crate::runtime::platform::PlatformList;

#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub enum DeviceType {
    Default,
    Cpu,
    Gpu,
    Accelerator,
    #[default]
    All,
}

impl DeviceType {
    pub fn bits(&self) -> cl_device_type {
        match self {
            DeviceType::Default => CL_DEVICE_TYPE_DEFAULT,
            DeviceType::Cpu => CL_DEVICE_TYPE_CPU,
            DeviceType::Gpu => CL_DEVICE_TYPE_GPU,
            DeviceType::Accelerator => CL_DEVICE_TYPE_ACCELERATOR,
            DeviceType::All => CL_DEVICE_TYPE_ALL,
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "default" => Some(DeviceType::Default),
            "cpu" => Some(DeviceType::Cpu),
            "gpu" => Some(DeviceType::Gpu),
            "accelerator" | "acc" => Some(DeviceType::Accelerator),
            "all" => Some(DeviceType::All),
            _ => None,
        }
    }
}

/// Device ids enumerated from one platform. Root devices are not reference
/// counted, so the list owns nothing native.
#[derive(Clone, Debug, Default)]
pub struct DeviceList {
    ids: Vec<cl_device_id>,
}

unsafe impl Send for DeviceList {}
unsafe impl Sync for DeviceList {}

impl DeviceList {
    /// Devices of `device_type` on platform `index`; `None` means every type.
    pub fn new(
        platforms: &PlatformList,
        index: usize,
        device_type: Option<DeviceType>,
    ) -> Result<Self> {
        let platform = platforms.id(index)?;
        let device_type = device_type.unwrap_or(DeviceType::All);
        let ids = get_device_ids(platform, device_type.bits()).native("clGetDeviceIDs")?;
        log::debug!(
            "platform {index}: {} device(s) of type {:?}",
            ids.len(),
            device_type
        );
        Ok(Self { ids })
    }

    pub fn from_ids(ids: Vec<cl_device_id>) -> Self {
        Self { ids }
    }

    pub fn ids(&self) -> &[cl_device_id] {
        &self.ids
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn id(&self, offset: usize) -> Result<cl_device_id> {
        self.ids.get(offset).copied().ok_or_else(|| {
            Error::OutOfRange(format!("Invalid index of devices: {offset}"))
        })
    }

    pub fn get_one(&self, offset: usize) -> Result<Self> {
        Ok(Self {
            ids: vec![self.id(offset)?],
        })
    }

    pub fn append(&mut self, other: &DeviceList) {
        self.ids.extend_from_slice(&other.ids);
    }

    pub fn info(&self, offset: usize, param: DeviceInfo) -> Result<InfoValue> {
        device_info(self.id(offset)?, param)
    }
}

#[test]
fn device_type_names() {
    assert_eq!(DeviceType::parse("GPU"), Some(DeviceType::Gpu));
    assert_eq!(DeviceType::parse(" cpu "), Some(DeviceType::Cpu));
    assert_eq!(DeviceType::parse("acc"), Some(DeviceType::Accelerator));
    assert_eq!(DeviceType::parse("fpga"), None);
    assert_eq!(DeviceType::default(), DeviceType::All);
}

#[test]
fn get_one_checks_range() {
    let list = DeviceList::default();
    assert!(list.is_empty());
    assert!(matches!(list.get_one(0), Err(Error::OutOfRange(_))));
}
