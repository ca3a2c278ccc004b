use std::ptr;

use opencl3::context::context::{create_context, release_context, retain_context};
use opencl3::types::{cl_context, cl_device_id};

use crate::device::{DeviceList, DeviceType};
use crate::error::{Error, NativeResultExt, Result};
use crate::runtime::platform::PlatformList;

/// Owns one retained `cl_context` and remembers the devices it was built on.
#[derive(Debug)]
pub struct Context {
    context: cl_context,
    devices: Vec<cl_device_id>,
}

unsafe impl Send for Context {}
unsafe impl Sync for Context {}

impl Context {
    pub fn from_devices(devices: &DeviceList) -> Result<Self> {
        if devices.is_empty() {
            return Err(Error::invalid("device list is empty"));
        }
        let context = unsafe {
            create_context(devices.ids(), ptr::null(), None, ptr::null_mut())
                .native("clCreateContext")?
        };
        log::debug!("created context {:?} on {} device(s)", context, devices.len());
        Ok(Self {
            context,
            devices: devices.ids().to_vec(),
        })
    }

    /// Context over every device of `device_type` on platform `platform_index`.
    pub fn from_type(platform_index: usize, device_type: DeviceType) -> Result<Self> {
        let platforms = PlatformList::new()?;
        let devices = DeviceList::new(&platforms, platform_index, Some(device_type))?;
        Self::from_devices(&devices)
    }

    /// Adds a reference to the same native context.
    pub fn try_clone(&self) -> Result<Self> {
        unsafe { retain_context(self.context).native("clRetainContext")? };
        Ok(Self {
            context: self.context,
            devices: self.devices.clone(),
        })
    }

    pub fn get(&self) -> cl_context {
        self.context
    }

    pub fn num_devices(&self) -> usize {
        self.devices.len()
    }

    pub fn device_ids(&self) -> &[cl_device_id] {
        &self.devices
    }

    pub fn devices(&self) -> DeviceList {
        DeviceList::from_ids(self.devices.clone())
    }
}

impl Drop for Context {
    fn drop(&mut self) {
        if self.context.is_null() {
            return;
        }
        if let Err(code) = unsafe { release_context(self.context) } {
            log::warn!("clReleaseContext error={code}");
        }
        self.context = ptr::null_mut();
    }
}
