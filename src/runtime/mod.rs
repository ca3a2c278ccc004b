use std::fmt;

use opencl3::error_codes::CL_PLATFORM_NOT_FOUND_KHR;

use crate::config::{Config, DEFAULT_CONFIG};
use crate::device::{DeviceList, DeviceType};
use crate::dtype::DType;
use crate::error::{Error, Result};
use crate::host::HostBuffer;

pub mod buffer;
pub mod context;
pub mod event;
pub mod info;
pub mod kernel;
pub mod platform;
pub mod program;
pub mod queue;
pub mod rect;

use buffer::{Buffer, MemFlags};
use context::Context;
use event::EventList;
use kernel::Kernel;
use platform::PlatformList;
use program::Program;
use queue::{CommandQueue, QueueProperties};

/// Outcome of probing the runtime.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Status {
    Ok,
    LibraryNotLoaded,
    ConfigurationNotComplete,
    DeviceNotFound,
}

impl Status {
    pub fn code(&self) -> i32 {
        match self {
            Status::Ok => 0,
            Status::LibraryNotLoaded => -1,
            Status::ConfigurationNotComplete => -2,
            Status::DeviceNotFound => -3,
        }
    }

    fn message(&self) -> &'static str {
        match self {
            Status::Ok => "",
            Status::LibraryNotLoaded => "OpenCL library not loaded.",
            Status::ConfigurationNotComplete => "OpenCL configuration is not complete.",
            Status::DeviceNotFound => "OpenCL device is not found.",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Status::Ok => write!(f, "ok"),
            s => write!(f, "{}", s.message()),
        }
    }
}

/// Where a context gets its devices from.
#[derive(Clone, Copy, Debug)]
pub enum ContextSource<'a> {
    Devices(&'a DeviceList),
    /// Every device of this type on the configured platform.
    Type(DeviceType),
}

/// Entry point to the runtime. Probed once at construction; every factory
/// method fails with [`Error::Unavailable`] unless the probe succeeded.
#[derive(Clone, Debug)]
pub struct OpenCl {
    status: Status,
    message: String,
    config: Config,
}

impl OpenCl {
    pub fn new() -> Self {
        Self::with_config(DEFAULT_CONFIG.clone())
    }

    pub fn with_config(config: Config) -> Self {
        let (status, message) = probe(&config);
        match status {
            Status::Ok => log::info!("OpenCL runtime available"),
            _ => log::info!("OpenCL runtime unavailable: {message}"),
        }
        Self {
            status,
            message,
            config,
        }
    }

    /// Like [`OpenCl::new`] but an unavailable runtime is an error.
    pub fn try_new() -> Result<Self> {
        let ocl = Self::new();
        ocl.ensure()?;
        Ok(ocl)
    }

    pub fn is_available(&self) -> bool {
        self.status == Status::Ok
    }

    pub fn status(&self) -> Status {
        self.status
    }

    pub fn status_message(&self) -> &str {
        &self.message
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    fn ensure(&self) -> Result<()> {
        if self.is_available() {
            return Ok(());
        }
        Err(Error::Unavailable {
            status: self.status,
            message: self.message.clone(),
        })
    }

    pub fn platforms(&self) -> Result<PlatformList> {
        self.ensure()?;
        PlatformList::new()
    }

    pub fn devices(
        &self,
        platforms: &PlatformList,
        index: usize,
        device_type: Option<DeviceType>,
    ) -> Result<DeviceList> {
        self.ensure()?;
        DeviceList::new(platforms, index, device_type)
    }

    pub fn context(&self, source: ContextSource<'_>) -> Result<Context> {
        self.ensure()?;
        match source {
            ContextSource::Devices(devices) => Context::from_devices(devices),
            ContextSource::Type(device_type) => {
                Context::from_type(self.config.platform_index, device_type)
            }
        }
    }

    /// Context on the configured device type, or on any device when the
    /// platform has none of that type.
    pub fn default_context(&self) -> Result<Context> {
        self.ensure()?;
        let platform = self.config.platform_index;
        Context::from_type(platform, self.config.device_type).or_else(|e| {
            log::debug!(
                "no {:?} context on platform {platform} ({e}), trying all devices",
                self.config.device_type
            );
            Context::from_type(platform, DeviceType::All)
        })
    }

    pub fn event_list(&self) -> Result<EventList> {
        self.ensure()?;
        Ok(EventList::new())
    }

    pub fn user_event(&self, context: &Context) -> Result<EventList> {
        self.ensure()?;
        EventList::user_event(context)
    }

    /// In-order queue on the context's first device.
    pub fn command_queue(&self, context: &Context) -> Result<CommandQueue> {
        self.ensure()?;
        let properties = QueueProperties {
            profiling: self.config.profiling,
            ..Default::default()
        };
        CommandQueue::new(context, None, properties)
    }

    pub fn program_from_source(&self, context: &Context, sources: &[&str]) -> Result<Program> {
        self.ensure()?;
        Program::from_source(context, sources)
    }

    pub fn program_from_binary(
        &self,
        context: &Context,
        devices: &DeviceList,
        binaries: &[&[u8]],
    ) -> Result<Program> {
        self.ensure()?;
        Program::from_binary(context, devices, binaries)
    }

    pub fn program_from_builtin_kernels(
        &self,
        context: &Context,
        devices: &DeviceList,
        names: &[&str],
    ) -> Result<Program> {
        self.ensure()?;
        Program::from_builtin_kernels(context, devices, names)
    }

    pub fn program_link(
        &self,
        context: &Context,
        programs: &[&Program],
        options: Option<&str>,
        devices: Option<&DeviceList>,
    ) -> Result<Program> {
        self.ensure()?;
        Program::link(context, programs, options, devices)
    }

    pub fn buffer(
        &self,
        context: &Context,
        size: usize,
        flags: MemFlags,
        dtype: Option<DType>,
    ) -> Result<Buffer> {
        self.ensure()?;
        Buffer::new(context, size, flags, dtype)
    }

    pub fn buffer_from_host<H: HostBuffer + ?Sized>(
        &self,
        context: &Context,
        flags: MemFlags,
        host: &H,
    ) -> Result<Buffer> {
        self.ensure()?;
        Buffer::from_host(context, 0, flags, host, 0, None)
    }

    pub fn kernel(&self, program: &Program, name: &str) -> Result<Kernel> {
        self.ensure()?;
        Kernel::new(program, name)
    }
}

impl Default for OpenCl {
    fn default() -> Self {
        Self::new()
    }
}

fn probe(config: &Config) -> (Status, String) {
    let platforms = match PlatformList::new() {
        Ok(p) if !p.is_empty() => p,
        Ok(_) => return unavailable(Status::ConfigurationNotComplete, "no platforms"),
        // returned by the ICD loader when no driver is registered
        Err(e) if e.code() == Some(CL_PLATFORM_NOT_FOUND_KHR) => {
            return unavailable(Status::LibraryNotLoaded, &e.to_string())
        }
        Err(e) => return unavailable(Status::ConfigurationNotComplete, &e.to_string()),
    };
    match DeviceList::new(&platforms, config.platform_index, Some(DeviceType::All)) {
        Ok(d) if !d.is_empty() => (Status::Ok, String::new()),
        Ok(_) => unavailable(Status::DeviceNotFound, "no devices"),
        Err(e) => unavailable(Status::DeviceNotFound, &e.to_string()),
    }
}

fn unavailable(status: Status, detail: &str) -> (Status, String) {
    log::debug!("probe failed: {detail}");
    (status, status.message().to_string())
}

#[test]
fn status_codes_and_messages() {
    assert_eq!(Status::Ok.code(), 0);
    assert_eq!(Status::DeviceNotFound.code(), -3);
    assert_eq!(
        Status::LibraryNotLoaded.to_string(),
        "OpenCL library not loaded."
    );
    let (status, message) = unavailable(Status::ConfigurationNotComplete, "clGetPlatformIDs failed");
    assert_eq!(status, Status::ConfigurationNotComplete);
    assert_eq!(message, "OpenCL configuration is not complete.");
}

#[test]
fn unavailable_service_refuses_work() {
    let ocl = OpenCl {
        status: Status::DeviceNotFound,
        message: Status::DeviceNotFound.message().to_string(),
        config: Config::default(),
    };
    assert!(!ocl.is_available());
    match ocl.event_list() {
        Err(Error::Unavailable { status, message }) => {
            assert_eq!(status, Status::DeviceNotFound);
            assert_eq!(message, "OpenCL device is not found.");
        }
        other => panic!("expected Unavailable, got {other:?}"),
    }
    assert!(ocl.platforms().is_err());
}
