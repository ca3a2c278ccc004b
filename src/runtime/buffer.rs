use std::ffi::c_void;
use std::ops::BitOr;
use std::ptr;

use opencl3::command_queue::{
    enqueue_copy_buffer, enqueue_copy_buffer_rect, enqueue_fill_buffer, enqueue_read_buffer,
    enqueue_read_buffer_rect, enqueue_write_buffer, enqueue_write_buffer_rect,
};
use opencl3::memory::{
    create_buffer, release_mem_object, CL_MEM_ALLOC_HOST_PTR, CL_MEM_COPY_HOST_PTR,
    CL_MEM_HOST_NO_ACCESS, CL_MEM_HOST_READ_ONLY, CL_MEM_HOST_WRITE_ONLY, CL_MEM_READ_ONLY,
    CL_MEM_READ_WRITE, CL_MEM_USE_HOST_PTR, CL_MEM_WRITE_ONLY,
};
use opencl3::types::{cl_bool, cl_mem, cl_mem_flags, CL_BLOCKING, CL_NON_BLOCKING};

use crate::dtype::DType;
use crate::error::{Error, NativeResultExt, Result};
use crate::host::{host_capacity, HostBuffer, HostBufferMut};
use crate::runtime::context::Context;
use crate::runtime::event::{attach, wait_list, EventList};
use crate::runtime::queue::CommandQueue;
use crate::runtime::rect::{normalize_region, RectSide, Triple};

/// Allocation flags forwarded to `clCreateBuffer`.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub struct MemFlags(cl_mem_flags);

impl MemFlags {
    pub const READ_WRITE: MemFlags = MemFlags(CL_MEM_READ_WRITE);
    pub const WRITE_ONLY: MemFlags = MemFlags(CL_MEM_WRITE_ONLY);
    pub const READ_ONLY: MemFlags = MemFlags(CL_MEM_READ_ONLY);
    pub const USE_HOST_PTR: MemFlags = MemFlags(CL_MEM_USE_HOST_PTR);
    pub const ALLOC_HOST_PTR: MemFlags = MemFlags(CL_MEM_ALLOC_HOST_PTR);
    pub const COPY_HOST_PTR: MemFlags = MemFlags(CL_MEM_COPY_HOST_PTR);
    pub const HOST_WRITE_ONLY: MemFlags = MemFlags(CL_MEM_HOST_WRITE_ONLY);
    pub const HOST_READ_ONLY: MemFlags = MemFlags(CL_MEM_HOST_READ_ONLY);
    pub const HOST_NO_ACCESS: MemFlags = MemFlags(CL_MEM_HOST_NO_ACCESS);

    pub const fn from_bits(bits: cl_mem_flags) -> Self {
        MemFlags(bits)
    }

    pub const fn bits(self) -> cl_mem_flags {
        self.0
    }

    pub const fn contains(self, other: MemFlags) -> bool {
        self.0 & other.0 == other.0
    }

    fn takes_host_ptr(self) -> bool {
        self.contains(Self::USE_HOST_PTR) || self.contains(Self::COPY_HOST_PTR)
    }
}

impl BitOr for MemFlags {
    type Output = MemFlags;

    fn bitor(self, rhs: MemFlags) -> MemFlags {
        MemFlags(self.0 | rhs.0)
    }
}

/// Linear transfer window. A zero `size` means the whole buffer.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub struct Linear {
    pub size: usize,
    /// Byte offset into the device buffer.
    pub offset: usize,
    /// Element offset into the host buffer.
    pub host_offset: usize,
}

/// Rectangular host transfer. Omitted origins are zero, zero pitches are
/// derived from the region.
#[derive(Clone, PartialEq, Eq, Debug, Default)]
pub struct HostRect {
    pub region: Vec<usize>,
    pub buffer_origin: Vec<usize>,
    pub host_origin: Vec<usize>,
    pub buffer_row_pitch: usize,
    pub buffer_slice_pitch: usize,
    pub host_row_pitch: usize,
    pub host_slice_pitch: usize,
    /// Element offset applied to the host buffer before `host_origin`.
    pub host_buffer_offset: usize,
}

/// Rectangular device-to-device copy.
#[derive(Clone, PartialEq, Eq, Debug, Default)]
pub struct DeviceRect {
    pub region: Vec<usize>,
    pub src_origin: Vec<usize>,
    pub dst_origin: Vec<usize>,
    pub src_row_pitch: usize,
    pub src_slice_pitch: usize,
    pub dst_row_pitch: usize,
    pub dst_slice_pitch: usize,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub struct Fill {
    /// Bytes to fill; zero means the whole buffer.
    pub size: usize,
    pub offset: usize,
    /// Pattern length in elements; zero means the whole pattern buffer.
    pub pattern_size: usize,
    pub pattern_offset: usize,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub struct CopyRange {
    /// Bytes to copy; zero means the whole source buffer.
    pub size: usize,
    pub src_offset: usize,
    pub dst_offset: usize,
}

/// One device allocation.
///
/// `dtype` is unset until a constructor, `write` or `fill` establishes it.
/// `copy` only fills it in when still unset.
#[derive(Debug)]
pub struct Buffer {
    mem: cl_mem,
    size: usize,
    dtype: Option<DType>,
}

unsafe impl Send for Buffer {}
unsafe impl Sync for Buffer {}

fn blocking_flag(blocking: bool) -> cl_bool {
    if blocking {
        CL_BLOCKING
    } else {
        CL_NON_BLOCKING
    }
}

impl Buffer {
    /// Allocates `size` bytes with no host data.
    pub fn new(
        context: &Context,
        size: usize,
        flags: MemFlags,
        dtype: Option<DType>,
    ) -> Result<Self> {
        if flags.takes_host_ptr() {
            return Err(Error::invalid(
                "COPY_HOST_PTR and USE_HOST_PTR require a host buffer.",
            ));
        }
        Self::create(context, size, flags, ptr::null_mut(), dtype)
    }

    /// Allocates and initialises from `host`, starting at element
    /// `host_offset`. `COPY_HOST_PTR` is implied; a zero `size` takes every
    /// byte from the offset on.
    pub fn from_host<H: HostBuffer + ?Sized>(
        context: &Context,
        size: usize,
        flags: MemFlags,
        host: &H,
        host_offset: usize,
        dtype: Option<DType>,
    ) -> Result<Self> {
        if flags.contains(MemFlags::USE_HOST_PTR) {
            return Err(Error::invalid(
                "USE_HOST_PTR aliases host memory; use Buffer::from_host_ptr.",
            ));
        }
        let flags = flags | MemFlags::COPY_HOST_PTR;
        let size = Self::host_size(size, host, host_offset)?;
        let host_ptr = host.as_ptr_at(host_offset) as *mut c_void;
        Self::create(context, size, flags, host_ptr, dtype.or(Some(host.dtype())))
    }

    /// Like [`Buffer::from_host`] but forwards `USE_HOST_PTR`.
    ///
    /// # Safety
    ///
    /// With `USE_HOST_PTR` the device may read and write `host` for the
    /// lifetime of the buffer; the caller keeps that memory alive and does
    /// not move it until the buffer is dropped.
    pub unsafe fn from_host_ptr<H: HostBufferMut + ?Sized>(
        context: &Context,
        size: usize,
        flags: MemFlags,
        host: &mut H,
        host_offset: usize,
        dtype: Option<DType>,
    ) -> Result<Self> {
        if !flags.takes_host_ptr() {
            return Err(Error::invalid(
                "a host pointer needs COPY_HOST_PTR or USE_HOST_PTR.",
            ));
        }
        let size = Self::host_size(size, host, host_offset)?;
        let host_ptr = host.as_mut_ptr_at(host_offset);
        Self::create(context, size, flags, host_ptr, dtype.or(Some(host.dtype())))
    }

    fn host_size<H: HostBuffer + ?Sized>(size: usize, host: &H, host_offset: usize) -> Result<usize> {
        let capacity = host_capacity(host, host_offset)?;
        if size == 0 {
            return Ok(capacity);
        }
        if capacity < size {
            return Err(Error::invalid("Host buffer is too small."));
        }
        Ok(size)
    }

    fn create(
        context: &Context,
        size: usize,
        flags: MemFlags,
        host_ptr: *mut c_void,
        dtype: Option<DType>,
    ) -> Result<Self> {
        let mem = unsafe {
            create_buffer(context.get(), flags.bits(), size, host_ptr).native("clCreateBuffer")?
        };
        log::debug!("created buffer {:?}: {} bytes, flags={:#x}", mem, size, flags.bits());
        Ok(Self { mem, size, dtype })
    }

    pub fn get(&self) -> cl_mem {
        self.mem
    }

    pub fn bytes(&self) -> usize {
        self.size
    }

    pub fn dtype(&self) -> Option<DType> {
        self.dtype
    }

    /// Bytes per element, 0 while the dtype is unset.
    pub fn value_size(&self) -> usize {
        self.dtype.map_or(0, |d| d.size())
    }

    fn linear_size<H: HostBuffer + ?Sized>(&self, host: &H, range: &Linear) -> Result<usize> {
        let size = if range.size == 0 { self.size } else { range.size };
        match range.offset.checked_add(size) {
            Some(end) if end <= self.size => {}
            _ => return Err(Error::invalid("size is too large.")),
        }
        if host_capacity(host, range.host_offset)? < size {
            return Err(Error::invalid("Host buffer is too small."));
        }
        Ok(size)
    }

    /// Blocking device-to-host copy.
    pub fn read<H: HostBufferMut + ?Sized>(
        &self,
        queue: &CommandQueue,
        host: &mut H,
        range: Linear,
        events: Option<&mut EventList>,
        wait_events: Option<&EventList>,
    ) -> Result<()> {
        unsafe { self.enqueue_read(queue, host, range, true, events, wait_events) }
    }

    /// # Safety
    ///
    /// When `blocking` is false the transfer is still in flight on return;
    /// `host` must stay alive and untouched until the produced event
    /// completes.
    pub unsafe fn enqueue_read<H: HostBufferMut + ?Sized>(
        &self,
        queue: &CommandQueue,
        host: &mut H,
        range: Linear,
        blocking: bool,
        events: Option<&mut EventList>,
        wait_events: Option<&EventList>,
    ) -> Result<()> {
        let size = self.linear_size(host, &range)?;
        let host_ptr = host.as_mut_ptr_at(range.host_offset);
        let (num_wait, wait_ptr) = wait_list(wait_events);
        let event = enqueue_read_buffer(
            queue.get(),
            self.mem,
            blocking_flag(blocking),
            range.offset,
            size,
            host_ptr,
            num_wait,
            wait_ptr,
        )
        .native("clEnqueueReadBuffer")?;
        log::debug!("read {size} bytes from {:?} at {}", self.mem, range.offset);
        attach(events, event);
        Ok(())
    }

    /// Blocking host-to-device copy. The buffer takes the host dtype.
    pub fn write<H: HostBuffer + ?Sized>(
        &mut self,
        queue: &CommandQueue,
        host: &H,
        range: Linear,
        events: Option<&mut EventList>,
        wait_events: Option<&EventList>,
    ) -> Result<()> {
        unsafe { self.enqueue_write(queue, host, range, true, events, wait_events) }
    }

    /// # Safety
    ///
    /// When `blocking` is false `host` must stay alive and unmodified until
    /// the produced event completes.
    pub unsafe fn enqueue_write<H: HostBuffer + ?Sized>(
        &mut self,
        queue: &CommandQueue,
        host: &H,
        range: Linear,
        blocking: bool,
        events: Option<&mut EventList>,
        wait_events: Option<&EventList>,
    ) -> Result<()> {
        let size = self.linear_size(host, &range)?;
        let host_ptr = host.as_ptr_at(range.host_offset);
        let (num_wait, wait_ptr) = wait_list(wait_events);
        let event = enqueue_write_buffer(
            queue.get(),
            self.mem,
            blocking_flag(blocking),
            range.offset,
            size,
            host_ptr,
            num_wait,
            wait_ptr,
        )
        .native("clEnqueueWriteBuffer")?;
        log::debug!("wrote {size} bytes to {:?} at {}", self.mem, range.offset);
        self.dtype = Some(host.dtype());
        attach(events, event);
        Ok(())
    }

    fn host_rect<H: HostBuffer + ?Sized>(
        &self,
        host: &H,
        rect: &HostRect,
    ) -> Result<(Triple, RectSide, RectSide)> {
        let region = normalize_region(&rect.region)?;
        let buffer = RectSide::new(
            &region,
            &rect.buffer_origin,
            rect.buffer_row_pitch,
            rect.buffer_slice_pitch,
            "buffer_origin",
        )?;
        let host_side = RectSide::new(
            &region,
            &rect.host_origin,
            rect.host_row_pitch,
            rect.host_slice_pitch,
            "host_origin",
        )?;
        host_side.check(
            &region,
            host_capacity(host, rect.host_buffer_offset)?,
            "Host buffer is too small.",
        )?;
        buffer.check(&region, self.size, "buffer is too small.")?;
        Ok((region, buffer, host_side))
    }

    /// Blocking rectangular device-to-host copy.
    pub fn read_rect<H: HostBufferMut + ?Sized>(
        &self,
        queue: &CommandQueue,
        host: &mut H,
        rect: &HostRect,
        events: Option<&mut EventList>,
        wait_events: Option<&EventList>,
    ) -> Result<()> {
        unsafe { self.enqueue_read_rect(queue, host, rect, true, events, wait_events) }
    }

    /// # Safety
    ///
    /// Same contract as [`Buffer::enqueue_read`].
    pub unsafe fn enqueue_read_rect<H: HostBufferMut + ?Sized>(
        &self,
        queue: &CommandQueue,
        host: &mut H,
        rect: &HostRect,
        blocking: bool,
        events: Option<&mut EventList>,
        wait_events: Option<&EventList>,
    ) -> Result<()> {
        let (region, buffer, host_side) = self.host_rect(host, rect)?;
        let host_ptr = host.as_mut_ptr_at(rect.host_buffer_offset);
        let (num_wait, wait_ptr) = wait_list(wait_events);
        let event = enqueue_read_buffer_rect(
            queue.get(),
            self.mem,
            blocking_flag(blocking),
            buffer.origin.as_ptr(),
            host_side.origin.as_ptr(),
            region.as_ptr(),
            buffer.row_pitch,
            buffer.slice_pitch,
            host_side.row_pitch,
            host_side.slice_pitch,
            host_ptr,
            num_wait,
            wait_ptr,
        )
        .native("clEnqueueReadBufferRect")?;
        log::debug!("read rect {:?} from {:?}", region, self.mem);
        attach(events, event);
        Ok(())
    }

    /// Blocking rectangular host-to-device copy. The dtype is left alone.
    pub fn write_rect<H: HostBuffer + ?Sized>(
        &self,
        queue: &CommandQueue,
        host: &H,
        rect: &HostRect,
        events: Option<&mut EventList>,
        wait_events: Option<&EventList>,
    ) -> Result<()> {
        unsafe { self.enqueue_write_rect(queue, host, rect, true, events, wait_events) }
    }

    /// # Safety
    ///
    /// Same contract as [`Buffer::enqueue_write`].
    pub unsafe fn enqueue_write_rect<H: HostBuffer + ?Sized>(
        &self,
        queue: &CommandQueue,
        host: &H,
        rect: &HostRect,
        blocking: bool,
        events: Option<&mut EventList>,
        wait_events: Option<&EventList>,
    ) -> Result<()> {
        let (region, buffer, host_side) = self.host_rect(host, rect)?;
        let host_ptr = host.as_ptr_at(rect.host_buffer_offset);
        let (num_wait, wait_ptr) = wait_list(wait_events);
        let event = enqueue_write_buffer_rect(
            queue.get(),
            self.mem,
            blocking_flag(blocking),
            buffer.origin.as_ptr(),
            host_side.origin.as_ptr(),
            region.as_ptr(),
            buffer.row_pitch,
            buffer.slice_pitch,
            host_side.row_pitch,
            host_side.slice_pitch,
            host_ptr,
            num_wait,
            wait_ptr,
        )
        .native("clEnqueueWriteBufferRect")?;
        log::debug!("wrote rect {:?} to {:?}", region, self.mem);
        attach(events, event);
        Ok(())
    }

    /// Repeats `pattern` over the buffer. The pattern is copied at enqueue
    /// time, so the call does not block.
    pub fn fill<H: HostBuffer + ?Sized>(
        &mut self,
        queue: &CommandQueue,
        pattern: &H,
        fill: Fill,
        events: Option<&mut EventList>,
        wait_events: Option<&EventList>,
    ) -> Result<()> {
        let pattern_size = if fill.pattern_size == 0 {
            pattern.len()
        } else {
            fill.pattern_size
        };
        match pattern.len().checked_sub(fill.pattern_offset) {
            Some(available) if available >= pattern_size => {}
            _ => return Err(Error::invalid("Host buffer is too small.")),
        }
        let size = if fill.size == 0 { self.size } else { fill.size };
        match fill.offset.checked_add(size) {
            Some(end) if end <= self.size => {}
            _ => return Err(Error::invalid("size is too large.")),
        }
        let pattern_bytes = pattern_size * pattern.value_size();
        let (num_wait, wait_ptr) = wait_list(wait_events);
        let event = unsafe {
            enqueue_fill_buffer(
                queue.get(),
                self.mem,
                pattern.as_ptr_at(fill.pattern_offset),
                pattern_bytes,
                fill.offset,
                size,
                num_wait,
                wait_ptr,
            )
            .native("clEnqueueFillBuffer")?
        };
        log::debug!("fill {:?}: {size} bytes with a {pattern_bytes}-byte pattern", self.mem);
        self.dtype = Some(pattern.dtype());
        attach(events, event);
        Ok(())
    }

    /// Device-to-device copy from `src` into `self`. An unset dtype is
    /// inherited from `src`.
    pub fn copy(
        &mut self,
        queue: &CommandQueue,
        src: &Buffer,
        range: CopyRange,
        events: Option<&mut EventList>,
        wait_events: Option<&EventList>,
    ) -> Result<()> {
        let size = if range.size == 0 { src.size } else { range.size };
        match range.src_offset.checked_add(size) {
            Some(end) if end <= src.size => {}
            _ => return Err(Error::invalid("Source buffer is too small.")),
        }
        match range.dst_offset.checked_add(size) {
            Some(end) if end <= self.size => {}
            _ => return Err(Error::invalid("destination buffer is too small.")),
        }
        let (num_wait, wait_ptr) = wait_list(wait_events);
        let event = unsafe {
            enqueue_copy_buffer(
                queue.get(),
                src.mem,
                self.mem,
                range.src_offset,
                range.dst_offset,
                size,
                num_wait,
                wait_ptr,
            )
            .native("clEnqueueCopyBuffer")?
        };
        log::debug!("copy {size} bytes {:?} -> {:?}", src.mem, self.mem);
        if self.dtype.is_none() {
            self.dtype = src.dtype;
        }
        attach(events, event);
        Ok(())
    }

    /// Rectangular device-to-device copy from `src` into `self`.
    pub fn copy_rect(
        &self,
        queue: &CommandQueue,
        src: &Buffer,
        rect: &DeviceRect,
        events: Option<&mut EventList>,
        wait_events: Option<&EventList>,
    ) -> Result<()> {
        let region = normalize_region(&rect.region)?;
        let src_side = RectSide::new(
            &region,
            &rect.src_origin,
            rect.src_row_pitch,
            rect.src_slice_pitch,
            "src_origin",
        )?;
        let dst_side = RectSide::new(
            &region,
            &rect.dst_origin,
            rect.dst_row_pitch,
            rect.dst_slice_pitch,
            "dst_origin",
        )?;
        src_side.check(&region, src.size, "Source buffer is too small.")?;
        dst_side.check(&region, self.size, "destination buffer is too small.")?;
        let (num_wait, wait_ptr) = wait_list(wait_events);
        let event = unsafe {
            enqueue_copy_buffer_rect(
                queue.get(),
                src.mem,
                self.mem,
                src_side.origin.as_ptr(),
                dst_side.origin.as_ptr(),
                region.as_ptr(),
                src_side.row_pitch,
                src_side.slice_pitch,
                dst_side.row_pitch,
                dst_side.slice_pitch,
                num_wait,
                wait_ptr,
            )
            .native("clEnqueueCopyBufferRect")?
        };
        log::debug!("copy rect {:?} {:?} -> {:?}", region, src.mem, self.mem);
        attach(events, event);
        Ok(())
    }
}

impl Drop for Buffer {
    fn drop(&mut self) {
        if self.mem.is_null() {
            return;
        }
        if let Err(code) = unsafe { release_mem_object(self.mem) } {
            log::warn!("clReleaseMemObject error={code}");
        }
        self.mem = ptr::null_mut();
    }
}

#[test]
fn mem_flags_compose() {
    let flags = MemFlags::READ_ONLY | MemFlags::COPY_HOST_PTR;
    assert!(flags.contains(MemFlags::READ_ONLY));
    assert!(flags.contains(MemFlags::COPY_HOST_PTR));
    assert!(!flags.contains(MemFlags::USE_HOST_PTR));
    assert!(flags.takes_host_ptr());
    assert!(!MemFlags::READ_WRITE.takes_host_ptr());
    assert_eq!(MemFlags::from_bits(flags.bits()), flags);
}

#[test]
fn option_defaults_are_zero() {
    let rect = HostRect {
        region: vec![8, 2, 2],
        ..Default::default()
    };
    assert!(rect.buffer_origin.is_empty());
    assert_eq!(rect.host_row_pitch, 0);
    assert_eq!(Linear::default().size, 0);
    assert_eq!(Fill::default().pattern_size, 0);
    assert_eq!(CopyRange::default().dst_offset, 0);
}
