use std::ffi::{CStr, CString};
use std::ptr;

pub use opencl3::error_codes::{
    CL_BUILD_PROGRAM_FAILURE, CL_COMPILE_PROGRAM_FAILURE, CL_LINK_PROGRAM_FAILURE,
};
use opencl3::program::{
    build_program, compile_program, create_program_with_binary,
    create_program_with_builtin_kernels, create_program_with_source, get_program_build_info,
    get_program_info, link_program, release_program, CL_PROGRAM_BINARIES, CL_PROGRAM_BUILD_LOG,
};
use opencl3::types::{cl_device_id, cl_int, cl_program};

use crate::device::DeviceList;
use crate::error::{Error, NativeResultExt, Result};
use crate::runtime::context::Context;

fn c_string(s: &str, what: &str) -> Result<CString> {
    CString::new(s).map_err(|_| Error::invalid(format!("{what} contain a NUL byte")))
}

fn target_devices<'a>(
    devices: Option<&'a DeviceList>,
    default: &'a [cl_device_id],
) -> Result<&'a [cl_device_id]> {
    match devices {
        Some(list) if list.is_empty() => Err(Error::invalid("devices is empty")),
        Some(list) => Ok(list.ids()),
        None => Ok(default),
    }
}

/// Program object created from OpenCL C source, device binaries, built-in
/// kernels, or by linking compiled programs.
#[derive(Debug)]
pub struct Program {
    program: cl_program,
    devices: Vec<cl_device_id>,
}

unsafe impl Send for Program {}
unsafe impl Sync for Program {}

impl Program {
    pub fn from_source(context: &Context, sources: &[&str]) -> Result<Self> {
        if sources.is_empty() {
            return Err(Error::invalid("no source strings given."));
        }
        let program = unsafe { create_program_with_source(context.get(), sources) }
            .native("clCreateProgramWithSource")?;
        log::debug!("created program {:?} from {} source string(s)", program, sources.len());
        Ok(Self {
            program,
            devices: context.device_ids().to_vec(),
        })
    }

    /// One binary per device, in device order.
    pub fn from_binary(context: &Context, devices: &DeviceList, binaries: &[&[u8]]) -> Result<Self> {
        if devices.is_empty() {
            return Err(Error::invalid("devices is empty"));
        }
        if devices.len() != binaries.len() {
            return Err(Error::invalid(format!(
                "{} binaries given for {} devices.",
                binaries.len(),
                devices.len()
            )));
        }
        let program =
            unsafe { create_program_with_binary(context.get(), devices.ids(), binaries) }
                .native("clCreateProgramWithBinary")?;
        log::debug!("created program {:?} from {} binaries", program, binaries.len());
        Ok(Self {
            program,
            devices: devices.ids().to_vec(),
        })
    }

    /// Built-in kernels of `devices`, by name.
    pub fn from_builtin_kernels(
        context: &Context,
        devices: &DeviceList,
        names: &[&str],
    ) -> Result<Self> {
        if devices.is_empty() {
            return Err(Error::invalid("devices is empty"));
        }
        if names.is_empty() || names.iter().any(|n| n.is_empty() || n.contains(';')) {
            return Err(Error::invalid(format!("invalid built-in kernel names: {names:?}")));
        }
        let kernel_names = c_string(&names.join(";"), "kernel names")?;
        let program = unsafe {
            create_program_with_builtin_kernels(context.get(), devices.ids(), &kernel_names)
        }
        .native("clCreateProgramWithBuiltInKernels")?;
        log::debug!("created program {:?} from built-in kernels {:?}", program, names);
        Ok(Self {
            program,
            devices: devices.ids().to_vec(),
        })
    }

    /// Links compiled programs into an executable one. Devices default to
    /// every device of `context`.
    pub fn link(
        context: &Context,
        programs: &[&Program],
        options: Option<&str>,
        devices: Option<&DeviceList>,
    ) -> Result<Self> {
        if programs.is_empty() {
            return Err(Error::invalid("link mode needs at least one program."));
        }
        let options = c_string(options.unwrap_or(""), "link options")?;
        let devices = target_devices(devices, context.device_ids())?;
        let inputs: Vec<cl_program> = programs.iter().map(|p| p.program).collect();
        let program = unsafe {
            link_program(context.get(), devices, &options, &inputs, None, ptr::null_mut())
        }
        .native("clLinkProgram")?;
        log::debug!("linked program {:?} from {} input(s)", program, inputs.len());
        Ok(Self {
            program,
            devices: devices.to_vec(),
        })
    }

    pub fn get(&self) -> cl_program {
        self.program
    }

    pub fn device_ids(&self) -> &[cl_device_id] {
        &self.devices
    }

    /// Builds for `devices`, or for every device the program was created on.
    ///
    /// A compile error comes back as `Native` with [`CL_BUILD_PROGRAM_FAILURE`];
    /// the log of each failing device is emitted at `warn` level.
    pub fn build(&self, options: Option<&str>, devices: Option<&DeviceList>) -> Result<()> {
        let options = c_string(options.unwrap_or(""), "build options")?;
        let devices = target_devices(devices, &self.devices)?;
        let result = unsafe {
            build_program(self.program, devices, &options, None, ptr::null_mut())
        };
        self.check_build(result, "clBuildProgram", CL_BUILD_PROGRAM_FAILURE, devices)?;
        log::debug!("built program {:?}", self.program);
        Ok(())
    }

    /// Compiles source without linking. Each header is a source program made
    /// available to `#include` under its name.
    pub fn compile(
        &self,
        headers: &[(&str, &Program)],
        options: Option<&str>,
        devices: Option<&DeviceList>,
    ) -> Result<()> {
        let options = c_string(options.unwrap_or(""), "compile options")?;
        let devices = target_devices(devices, &self.devices)?;
        let names = headers
            .iter()
            .map(|(name, _)| c_string(name, "header names"))
            .collect::<Result<Vec<CString>>>()?;
        let names: Vec<&CStr> = names.iter().map(|n| n.as_c_str()).collect();
        let inputs: Vec<cl_program> = headers.iter().map(|(_, p)| p.program).collect();
        let result = unsafe {
            compile_program(
                self.program,
                devices,
                &options,
                &inputs,
                &names,
                None,
                ptr::null_mut(),
            )
        };
        self.check_build(result, "clCompileProgram", CL_COMPILE_PROGRAM_FAILURE, devices)?;
        log::debug!("compiled program {:?} with {} header(s)", self.program, headers.len());
        Ok(())
    }

    fn check_build(
        &self,
        result: std::result::Result<(), cl_int>,
        call: &'static str,
        failure: cl_int,
        devices: &[cl_device_id],
    ) -> Result<()> {
        let Err(code) = result else { return Ok(()) };
        if code == failure {
            for &device in devices {
                if let Ok(log) = self.build_log_for(device) {
                    log::warn!("build log for {:?}:\n{}", device, log);
                }
            }
        }
        Err(Error::Native { call, code })
    }

    /// Build log of the `index`-th device of the program.
    pub fn build_log(&self, index: usize) -> Result<String> {
        let device = *self
            .devices
            .get(index)
            .ok_or_else(|| Error::OutOfRange(format!("Invalid index of devices: {index}")))?;
        self.build_log_for(device)
    }

    fn build_log_for(&self, device: cl_device_id) -> Result<String> {
        let log: String = get_program_build_info(self.program, device, CL_PROGRAM_BUILD_LOG)
            .native("clGetProgramBuildInfo")?
            .into();
        Ok(log.trim_end_matches('\0').to_string())
    }

    /// Compiled binaries, one per device, for use with [`Program::from_binary`].
    pub fn binaries(&self) -> Result<Vec<Vec<u8>>> {
        let binaries: Vec<Vec<u8>> = get_program_info(self.program, CL_PROGRAM_BINARIES)
            .native("clGetProgramInfo")?
            .into();
        Ok(binaries)
    }
}

impl Drop for Program {
    fn drop(&mut self) {
        if self.program.is_null() {
            return;
        }
        if let Err(code) = unsafe { release_program(self.program) } {
            log::warn!("clReleaseProgram error={code}");
        }
        self.program = ptr::null_mut();
    }
}

#[test]
fn explicit_device_list_must_not_be_empty() {
    let empty = DeviceList::default();
    assert!(target_devices(Some(&empty), &[]).unwrap_err().is_invalid_argument());
    assert!(target_devices(None, &[]).unwrap().is_empty());
    assert!(c_string("-D N=4\0", "build options").is_err());
    assert_eq!(c_string("-w", "build options").unwrap().as_bytes(), b"-w");
}
