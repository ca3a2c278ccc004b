#![allow(dead_code)]

use clbind::prelude::*;

pub struct Env {
    pub ocl: OpenCl,
    pub context: Context,
    pub queue: CommandQueue,
}

/// Runtime, default context and queue, or `None` when the machine has no
/// usable OpenCL device.
pub fn setup() -> Option<Env> {
    let _ = env_logger::builder().is_test(true).try_init();
    let ocl = OpenCl::new();
    if !ocl.is_available() {
        log::warn!("skipping: {}", ocl.status_message());
        return None;
    }
    let context = match ocl.default_context() {
        Ok(c) => c,
        Err(e) => {
            log::warn!("skipping: {e}");
            return None;
        }
    };
    let queue = ocl.command_queue(&context).ok()?;
    Some(Env {
        ocl,
        context,
        queue,
    })
}

pub fn build(env: &Env, source: &str, name: &str) -> Kernel {
    let program = env.ocl.program_from_source(&env.context, &[source]).unwrap();
    if let Err(e) = program.build(None, None) {
        panic!("{e}\n{}", program.build_log(0).unwrap_or_default());
    }
    env.ocl.kernel(&program, name).unwrap()
}

pub fn read_all<T: AnyBitPattern>(env: &Env, buffer: &Buffer) -> Vec<T> {
    let mut out = vec![T::default(); buffer.bytes() / std::mem::size_of::<T>()];
    buffer
        .read(&env.queue, &mut out, Linear::default(), None, None)
        .unwrap();
    out
}
