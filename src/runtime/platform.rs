use opencl3::platform::platform::get_platform_ids;
use opencl3::types::cl_platform_id;

use crate::error::{Error, NativeResultExt, Result};
use crate::runtime::info::{platform_info, InfoValue, PlatformInfo};

#[derive(Clone, Debug, Default)]
pub struct PlatformList {
    ids: Vec<cl_platform_id>,
}

unsafe impl Send for PlatformList {}
unsafe impl Sync for PlatformList {}

impl PlatformList {
    pub fn new() -> Result<Self> {
        let ids = get_platform_ids().native("clGetPlatformIDs")?;
        Ok(Self { ids })
    }

    pub fn from_ids(ids: Vec<cl_platform_id>) -> Self {
        Self { ids }
    }

    pub fn ids(&self) -> &[cl_platform_id] {
        &self.ids
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn id(&self, offset: usize) -> Result<cl_platform_id> {
        self.ids.get(offset).copied().ok_or_else(|| {
            Error::OutOfRange(format!("Invalid index of platforms: {offset}"))
        })
    }

    pub fn get_one(&self, offset: usize) -> Result<Self> {
        Ok(Self {
            ids: vec![self.id(offset)?],
        })
    }

    pub fn info(&self, offset: usize, param: PlatformInfo) -> Result<InfoValue> {
        platform_info(self.id(offset)?, param)
    }
}
