mod common;

use clbind::prelude::*;
use common::{read_all, setup};
use float_cmp::approx_eq;
use rand::Rng;

const F32: usize = std::mem::size_of::<f32>();

#[rustfmt::skip]
fn cube_with_octant(octant: [f32; 8]) -> Vec<f32> {
    let [a, b, c, d, e, f, g, h] = octant;
    vec![
        99., 99., 99.,  99., 99., 99.,  99., 99., 99.,
        99., 99., 99.,  99., a,   b,    99., c,   d,
        99., 99., 99.,  99., e,   f,    99., g,   h,
    ]
}

#[test]
pub fn test_write_read_round_trip() {
    let Some(env) = setup() else { return };
    let data: Vec<f32> = (0..64).map(|i| i as f32 * 0.5).collect();
    let mut buffer = env
        .ocl
        .buffer(&env.context, data.len() * F32, MemFlags::READ_WRITE, None)
        .unwrap();
    assert_eq!(buffer.dtype(), None);
    assert_eq!(buffer.value_size(), 0);

    buffer
        .write(&env.queue, &data, Linear::default(), None, None)
        .unwrap();
    assert_eq!(buffer.dtype(), Some(DType::Float32));
    assert_eq!(buffer.value_size(), 4);

    let mut rng = rand::thread_rng();
    for _ in 0..8 {
        let start = rng.gen_range(0..data.len());
        let len = rng.gen_range(1..=data.len() - start);
        let mut out = vec![0f32; len];
        let range = Linear {
            size: len * F32,
            offset: start * F32,
            host_offset: 0,
        };
        buffer.read(&env.queue, &mut out, range, None, None).unwrap();
        for (got, want) in out.iter().zip(&data[start..start + len]) {
            assert!(approx_eq!(f32, *got, *want, ulps = 0));
        }
    }
}

#[test]
pub fn test_partial_write_with_host_offset() {
    let Some(env) = setup() else { return };
    let zeros = vec![0i32; 16];
    let mut buffer = Buffer::from_host(&env.context, 0, MemFlags::READ_WRITE, &zeros, 0, None).unwrap();
    assert_eq!(buffer.bytes(), 64);
    assert_eq!(buffer.dtype(), Some(DType::Int32));

    let src: Vec<i32> = (1..=8).collect();
    let range = Linear {
        size: 4 * 4,
        offset: 8 * 4,
        host_offset: 4,
    };
    buffer.write(&env.queue, &src, range, None, None).unwrap();
    let out: Vec<i32> = read_all(&env, &buffer);
    assert_eq!(&out[..8], &[0; 8]);
    assert_eq!(&out[8..12], &[5, 6, 7, 8]);
    assert_eq!(&out[12..], &[0; 4]);
}

#[test]
pub fn test_linear_bounds() {
    let Some(env) = setup() else { return };
    let mut buffer = env
        .ocl
        .buffer(&env.context, 16 * F32, MemFlags::READ_WRITE, None)
        .unwrap();
    let mut host = vec![0f32; 16];
    let mut events = EventList::new();

    let too_large = Linear {
        size: 8 * F32,
        offset: 9 * F32,
        ..Default::default()
    };
    let err = buffer
        .read(&env.queue, &mut host, too_large, Some(&mut events), None)
        .unwrap_err();
    assert_eq!(err.to_string(), "invalid argument: size is too large.");

    let short = Linear {
        host_offset: 1,
        ..Default::default()
    };
    let err = buffer
        .write(&env.queue, &host, short, Some(&mut events), None)
        .unwrap_err();
    assert_eq!(err.to_string(), "invalid argument: Host buffer is too small.");
    assert_eq!(err.code(), None);
    assert!(events.is_empty());
    assert_eq!(buffer.dtype(), None);
}

#[test]
pub fn test_read_rect_extracts_octant() {
    let Some(env) = setup() else { return };
    let cube = cube_with_octant([1., 2., 3., 4., 5., 6., 7., 8.]);
    let buffer = Buffer::from_host(&env.context, 0, MemFlags::READ_WRITE, &cube, 0, None).unwrap();
    let mut sub = vec![0f32; 8];
    let rect = HostRect {
        region: vec![2 * F32, 2, 2],
        buffer_origin: vec![F32, 1, 1],
        buffer_row_pitch: 3 * F32,
        buffer_slice_pitch: 9 * F32,
        host_row_pitch: 2 * F32,
        host_slice_pitch: 4 * F32,
        ..Default::default()
    };
    buffer.read_rect(&env.queue, &mut sub, &rect, None, None).unwrap();
    assert_eq!(sub, vec![1., 2., 3., 4., 5., 6., 7., 8.]);
}

#[test]
pub fn test_write_rect_leaves_border() {
    let Some(env) = setup() else { return };
    let fill = vec![99f32; 27];
    let buffer = Buffer::from_host(&env.context, 0, MemFlags::READ_WRITE, &fill, 0, None).unwrap();
    let sub: Vec<f32> = (1..=8).map(|v| -(v as f32)).collect();
    let rect = HostRect {
        region: vec![2 * F32, 2, 2],
        buffer_origin: vec![F32, 1, 1],
        buffer_row_pitch: 3 * F32,
        buffer_slice_pitch: 9 * F32,
        ..Default::default()
    };
    buffer.write_rect(&env.queue, &sub, &rect, None, None).unwrap();
    assert_eq!(buffer.dtype(), Some(DType::Float32));
    let out: Vec<f32> = read_all(&env, &buffer);
    assert_eq!(out, cube_with_octant([-1., -2., -3., -4., -5., -6., -7., -8.]));
}

#[test]
pub fn test_zero_region_and_pitch_normalisation() {
    let Some(env) = setup() else { return };
    let data: Vec<u8> = (0..32).collect();
    let buffer = Buffer::from_host(&env.context, 0, MemFlags::READ_WRITE, &data, 0, None).unwrap();
    let explicit = HostRect {
        region: vec![4, 1, 1],
        buffer_origin: vec![8],
        buffer_row_pitch: 4,
        buffer_slice_pitch: 4,
        host_row_pitch: 4,
        host_slice_pitch: 4,
        ..Default::default()
    };
    let implicit = HostRect {
        region: vec![4, 0, 0],
        buffer_origin: vec![8],
        ..Default::default()
    };
    let mut a = vec![0u8; 4];
    let mut b = vec![0u8; 4];
    buffer.read_rect(&env.queue, &mut a, &explicit, None, None).unwrap();
    buffer.read_rect(&env.queue, &mut b, &implicit, None, None).unwrap();
    assert_eq!(a, vec![8, 9, 10, 11]);
    assert_eq!(a, b);
}

#[test]
pub fn test_rect_bounds() {
    let Some(env) = setup() else { return };
    let buffer = env
        .ocl
        .buffer(&env.context, 27 * F32, MemFlags::READ_WRITE, None)
        .unwrap();
    let mut sub = vec![0f32; 8];
    let mut rect = HostRect {
        region: vec![2 * F32, 2, 2],
        buffer_origin: vec![2 * F32, 1, 1],
        buffer_row_pitch: 3 * F32,
        buffer_slice_pitch: 9 * F32,
        ..Default::default()
    };
    // last element lands past the end of the buffer
    let err = buffer.read_rect(&env.queue, &mut sub, &rect, None, None).unwrap_err();
    assert_eq!(err.to_string(), "invalid argument: buffer is too small.");

    rect.buffer_origin = vec![0, 0, 0];
    let mut small = vec![0f32; 7];
    let err = buffer.read_rect(&env.queue, &mut small, &rect, None, None).unwrap_err();
    assert_eq!(err.to_string(), "invalid argument: Host buffer is too small.");

    rect.region = vec![1, 1, 1, 1];
    assert!(buffer
        .read_rect(&env.queue, &mut sub, &rect, None, None)
        .unwrap_err()
        .is_invalid_argument());
}

#[test]
pub fn test_fill() {
    let Some(env) = setup() else { return };
    let mut buffer = env
        .ocl
        .buffer(&env.context, 16 * F32, MemFlags::READ_WRITE, None)
        .unwrap();
    let pattern = [123.5f32];
    let mut events = EventList::new();
    buffer
        .fill(&env.queue, &pattern[..], Fill::default(), Some(&mut events), None)
        .unwrap();
    assert_eq!(events.len(), 1);
    events.wait().unwrap();
    assert_eq!(buffer.dtype(), Some(DType::Float32));
    let out: Vec<f32> = read_all(&env, &buffer);
    assert_eq!(out.len(), 16);
    assert!(out.iter().all(|v| approx_eq!(f32, *v, 123.5, ulps = 0)));
}

#[test]
pub fn test_fill_pattern_bounds() {
    let Some(env) = setup() else { return };
    let mut buffer = env
        .ocl
        .buffer(&env.context, 16 * F32, MemFlags::READ_WRITE, None)
        .unwrap();
    let pattern = vec![1f32, 2.];
    let fill = Fill {
        pattern_size: 2,
        pattern_offset: 1,
        ..Default::default()
    };
    let err = buffer.fill(&env.queue, &pattern, fill, None, None).unwrap_err();
    assert!(err.is_invalid_argument());
    let fill = Fill {
        size: 8 * F32,
        offset: 12 * F32,
        ..Default::default()
    };
    assert!(buffer.fill(&env.queue, &pattern, fill, None, None).is_err());
    assert_eq!(buffer.dtype(), None);
}

#[test]
pub fn test_copy_inherits_dtype() {
    let Some(env) = setup() else { return };
    let data: Vec<f32> = (0..16).map(|i| i as f32).collect();
    let src = Buffer::from_host(&env.context, 0, MemFlags::READ_ONLY, &data, 0, None).unwrap();

    let mut untyped = env
        .ocl
        .buffer(&env.context, src.bytes(), MemFlags::READ_WRITE, None)
        .unwrap();
    untyped.copy(&env.queue, &src, CopyRange::default(), None, None).unwrap();
    env.queue.finish().unwrap();
    assert_eq!(untyped.dtype(), Some(DType::Float32));
    assert_eq!(untyped.value_size(), 4);
    let out: Vec<f32> = read_all(&env, &untyped);
    assert_eq!(out, data);

    let mut typed = env
        .ocl
        .buffer(&env.context, src.bytes(), MemFlags::READ_WRITE, Some(DType::Int32))
        .unwrap();
    typed.copy(&env.queue, &src, CopyRange::default(), None, None).unwrap();
    env.queue.finish().unwrap();
    assert_eq!(typed.dtype(), Some(DType::Int32));

    let mut short = env
        .ocl
        .buffer(&env.context, 4 * F32, MemFlags::READ_WRITE, None)
        .unwrap();
    let err = short
        .copy(&env.queue, &src, CopyRange::default(), None, None)
        .unwrap_err();
    assert_eq!(err.to_string(), "invalid argument: destination buffer is too small.");
}

#[test]
pub fn test_copy_rect_extracts_octant() {
    let Some(env) = setup() else { return };
    let cube = cube_with_octant([-1., -2., -3., -4., -5., -6., -7., -8.]);
    let src = Buffer::from_host(&env.context, 0, MemFlags::READ_WRITE, &cube, 0, None).unwrap();
    let dst = env
        .ocl
        .buffer(&env.context, 8 * F32, MemFlags::READ_WRITE, None)
        .unwrap();
    let rect = DeviceRect {
        region: vec![2 * F32, 2, 2],
        src_origin: vec![F32, 1, 1],
        src_row_pitch: 3 * F32,
        src_slice_pitch: 9 * F32,
        dst_row_pitch: 2 * F32,
        dst_slice_pitch: 4 * F32,
        ..Default::default()
    };
    dst.copy_rect(&env.queue, &src, &rect, None, None).unwrap();
    env.queue.finish().unwrap();
    let out: Vec<f32> = read_all(&env, &dst);
    assert_eq!(out, vec![-1., -2., -3., -4., -5., -6., -7., -8.]);

    let too_far = DeviceRect {
        dst_origin: vec![0, 1, 0],
        ..rect
    };
    let err = dst.copy_rect(&env.queue, &src, &too_far, None, None).unwrap_err();
    assert_eq!(err.to_string(), "invalid argument: destination buffer is too small.");
}

#[test]
pub fn test_non_blocking_write_with_events() {
    let Some(env) = setup() else { return };
    let data: Vec<u32> = (0..256).collect();
    let mut buffer = env
        .ocl
        .buffer(&env.context, data.len() * 4, MemFlags::READ_WRITE, None)
        .unwrap();
    let mut events = EventList::new();
    unsafe {
        buffer
            .enqueue_write(&env.queue, &data, Linear::default(), false, Some(&mut events), None)
            .unwrap();
    }
    assert_eq!(events.len(), 1);
    let mut out = vec![0u32; 256];
    buffer
        .read(&env.queue, &mut out, Linear::default(), None, Some(&events))
        .unwrap();
    assert_eq!(out, data);
}

#[test]
pub fn test_host_constructors_check_flags() {
    let Some(env) = setup() else { return };
    let host = vec![0f32; 4];
    let err = Buffer::new(&env.context, 16, MemFlags::COPY_HOST_PTR, None).unwrap_err();
    assert!(err.is_invalid_argument());
    let err = Buffer::from_host(&env.context, 16, MemFlags::USE_HOST_PTR, &host, 0, None).unwrap_err();
    assert!(err.is_invalid_argument());
    let err = Buffer::from_host(&env.context, 32, MemFlags::READ_ONLY, &host, 0, None).unwrap_err();
    assert_eq!(err.to_string(), "invalid argument: Host buffer is too small.");
    let buffer =
        Buffer::from_host(&env.context, 0, MemFlags::READ_ONLY, &host, 0, Some(DType::UInt32)).unwrap();
    assert_eq!(buffer.dtype(), Some(DType::UInt32));
}

// 2x2x2 block behind two padding floats, rows of 3 floats, slices of 6,
// starting one float into each row
const HOST_PAD: usize = 2;
const HOST_LEN: usize = HOST_PAD + 12;

fn host_slot(z: usize, y: usize, x: usize) -> usize {
    HOST_PAD + z * 6 + y * 3 + 1 + x
}

fn host_rect() -> HostRect {
    HostRect {
        region: vec![2 * F32, 2, 2],
        buffer_origin: vec![F32, 1, 1],
        host_origin: vec![F32, 0, 0],
        buffer_row_pitch: 3 * F32,
        buffer_slice_pitch: 9 * F32,
        host_row_pitch: 3 * F32,
        host_slice_pitch: 6 * F32,
        host_buffer_offset: HOST_PAD,
    }
}

#[test]
pub fn test_rect_round_trip_with_host_origin_and_offset() {
    let Some(env) = setup() else { return };
    let mut host = vec![0f32; HOST_LEN];
    for z in 0..2 {
        for y in 0..2 {
            for x in 0..2 {
                host[host_slot(z, y, x)] = (z * 4 + y * 2 + x + 1) as f32;
            }
        }
    }
    let fill = vec![99f32; 27];
    let buffer = Buffer::from_host(&env.context, 0, MemFlags::READ_WRITE, &fill, 0, None).unwrap();
    let rect = host_rect();

    let mut written = EventList::new();
    unsafe {
        buffer
            .enqueue_write_rect(&env.queue, &host, &rect, false, Some(&mut written), None)
            .unwrap();
    }
    assert_eq!(written.len(), 1);

    let mut back = vec![-1f32; HOST_LEN];
    let mut read = EventList::new();
    unsafe {
        buffer
            .enqueue_read_rect(&env.queue, &mut back, &rect, false, Some(&mut read), Some(&written))
            .unwrap();
    }
    read.wait().unwrap();
    for (i, (got, sent)) in back.iter().zip(&host).enumerate() {
        let in_block = (0..8).any(|n| host_slot(n / 4, (n / 2) % 2, n % 2) == i);
        if in_block {
            assert_eq!(got, sent, "host[{i}]");
        } else {
            assert_eq!(*got, -1., "host[{i}] is outside the rect");
        }
    }
    let out: Vec<f32> = read_all(&env, &buffer);
    assert_eq!(out, cube_with_octant([1., 2., 3., 4., 5., 6., 7., 8.]));

    // one element short of the last host position
    let short = vec![0f32; HOST_LEN - 1];
    let err = buffer.write_rect(&env.queue, &short, &rect, None, None).unwrap_err();
    assert_eq!(err.to_string(), "invalid argument: Host buffer is too small.");
    let past = HostRect {
        host_buffer_offset: HOST_PAD + 1,
        ..host_rect()
    };
    assert!(buffer.read_rect(&env.queue, &mut back, &past, None, None).is_err());
}

#[test]
pub fn test_non_blocking_read_with_events() {
    let Some(env) = setup() else { return };
    let data: Vec<i64> = (0..32).map(|i| i * i).collect();
    let buffer = Buffer::from_host(&env.context, 0, MemFlags::READ_ONLY, &data, 0, None).unwrap();
    let mut out = vec![0i64; 20];
    let range = Linear {
        size: 16 * 8,
        offset: 8 * 8,
        host_offset: 4,
    };
    let mut events = EventList::new();
    unsafe {
        buffer
            .enqueue_read(&env.queue, &mut out, range, false, Some(&mut events), None)
            .unwrap();
    }
    assert_eq!(events.len(), 1);
    events.wait().unwrap();
    assert_eq!(&out[..4], &[0; 4]);
    assert_eq!(&out[4..], &data[8..24]);
}

#[test]
pub fn test_copy_with_offsets() {
    let Some(env) = setup() else { return };
    let data: Vec<i32> = (0..16).collect();
    let src = Buffer::from_host(&env.context, 0, MemFlags::READ_ONLY, &data, 0, None).unwrap();
    let zeros = vec![0i32; 16];
    let mut dst = Buffer::from_host(&env.context, 0, MemFlags::READ_WRITE, &zeros, 0, None).unwrap();
    let range = CopyRange {
        size: 4 * 4,
        src_offset: 2 * 4,
        dst_offset: 10 * 4,
    };
    let mut events = EventList::new();
    dst.copy(&env.queue, &src, range, Some(&mut events), None).unwrap();
    events.wait().unwrap();
    let out: Vec<i32> = read_all(&env, &dst);
    assert_eq!(&out[..10], &[0; 10]);
    assert_eq!(&out[10..14], &[2, 3, 4, 5]);
    assert_eq!(&out[14..], &[0; 2]);

    let past_src = CopyRange {
        src_offset: 14 * 4,
        ..range
    };
    let err = dst.copy(&env.queue, &src, past_src, None, None).unwrap_err();
    assert_eq!(err.to_string(), "invalid argument: Source buffer is too small.");
    let past_dst = CopyRange {
        dst_offset: 13 * 4,
        ..range
    };
    let err = dst.copy(&env.queue, &src, past_dst, None, None).unwrap_err();
    assert_eq!(err.to_string(), "invalid argument: destination buffer is too small.");
}

#[test]
pub fn test_bool_buffer_reads_back_as_bytes() {
    let Some(env) = setup() else { return };
    let flags = [true, false, true, true];
    let buffer = Buffer::from_host(&env.context, 0, MemFlags::READ_ONLY, &flags[..], 0, None).unwrap();
    assert_eq!(buffer.dtype(), Some(DType::Bool));
    let mut out = vec![0xffu8; 4];
    buffer
        .read(&env.queue, &mut out, Linear::default(), None, None)
        .unwrap();
    assert_eq!(out, vec![1, 0, 1, 1]);
}
