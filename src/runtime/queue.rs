use std::ptr;

use opencl3::command_queue::{
    create_command_queue_with_properties, finish, flush, release_command_queue,
    CL_QUEUE_OUT_OF_ORDER_EXEC_MODE_ENABLE, CL_QUEUE_PROFILING_ENABLE, CL_QUEUE_PROPERTIES,
};
use opencl3::types::{
    cl_command_queue, cl_command_queue_properties, cl_device_id, cl_queue_properties,
};

use crate::error::{Error, NativeResultExt, Result};
use crate::runtime::context::Context;

#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub struct QueueProperties {
    pub profiling: bool,
    pub out_of_order: bool,
}

impl QueueProperties {
    pub fn bits(&self) -> cl_command_queue_properties {
        let mut bits = 0;
        if self.profiling {
            bits |= CL_QUEUE_PROFILING_ENABLE;
        }
        if self.out_of_order {
            bits |= CL_QUEUE_OUT_OF_ORDER_EXEC_MODE_ENABLE;
        }
        bits
    }

    /// Zero-terminated `cl_queue_properties` list.
    fn list(&self) -> [cl_queue_properties; 3] {
        [
            CL_QUEUE_PROPERTIES as cl_queue_properties,
            self.bits() as cl_queue_properties,
            0,
        ]
    }
}

/// Per-device execution queue. Keeps its context alive.
#[derive(Debug)]
pub struct CommandQueue {
    queue: cl_command_queue,
    device: cl_device_id,
    context: Context,
}

unsafe impl Send for CommandQueue {}
unsafe impl Sync for CommandQueue {}

impl CommandQueue {
    /// Queue on `device`, or on the context's first device when `None`.
    pub fn new(
        context: &Context,
        device: Option<cl_device_id>,
        properties: QueueProperties,
    ) -> Result<Self> {
        let device = match device {
            Some(d) => d,
            None => *context
                .device_ids()
                .first()
                .ok_or_else(|| Error::invalid("Context is not initialized"))?,
        };
        let context = context.try_clone()?;
        let props = properties.list();
        let props_ptr = if properties.bits() == 0 { ptr::null() } else { props.as_ptr() };
        let queue = unsafe {
            create_command_queue_with_properties(context.get(), device, props_ptr)
                .native("clCreateCommandQueueWithProperties")?
        };
        log::debug!("created command queue {:?} ({:?})", queue, properties);
        Ok(Self {
            queue,
            device,
            context,
        })
    }

    pub fn get(&self) -> cl_command_queue {
        self.queue
    }

    pub fn device(&self) -> cl_device_id {
        self.device
    }

    pub fn context(&self) -> &Context {
        &self.context
    }

    pub fn flush(&self) -> Result<()> {
        unsafe { flush(self.queue) }.native("clFlush")
    }

    /// Blocks until everything enqueued so far has completed.
    pub fn finish(&self) -> Result<()> {
        unsafe { finish(self.queue) }.native("clFinish")
    }
}

impl Drop for CommandQueue {
    fn drop(&mut self) {
        if self.queue.is_null() {
            return;
        }
        if let Err(code) = unsafe { release_command_queue(self.queue) } {
            log::warn!("clReleaseCommandQueue error={code}");
        }
        self.queue = ptr::null_mut();
    }
}

#[test]
fn queue_property_bits() {
    assert_eq!(QueueProperties::default().bits(), 0);
    let p = QueueProperties {
        profiling: true,
        out_of_order: false,
    };
    assert_eq!(p.bits(), CL_QUEUE_PROFILING_ENABLE);
    let p = QueueProperties {
        profiling: true,
        out_of_order: true,
    };
    assert_eq!(
        p.bits(),
        CL_QUEUE_PROFILING_ENABLE | CL_QUEUE_OUT_OF_ORDER_EXEC_MODE_ENABLE
    );
}

#[test]
fn queue_property_list() {
    let p = QueueProperties {
        profiling: true,
        out_of_order: false,
    };
    assert_eq!(p.list(), [0x1093, CL_QUEUE_PROFILING_ENABLE as cl_queue_properties, 0]);
}
