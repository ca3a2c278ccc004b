mod common;

use clbind::prelude::*;
use common::setup;

#[test]
pub fn test_status_is_consistent() {
    let _ = env_logger::builder().is_test(true).try_init();
    let ocl = OpenCl::new();
    assert_eq!(ocl.is_available(), ocl.status() == Status::Ok);
    assert_eq!(ocl.status_message().is_empty(), ocl.is_available());
    match OpenCl::try_new() {
        Ok(_) => assert!(ocl.is_available()),
        Err(Error::Unavailable { status, .. }) => assert_eq!(status, ocl.status()),
        Err(e) => panic!("unexpected error {e}"),
    }
}

#[test]
pub fn test_platforms_and_devices() {
    let Some(env) = setup() else { return };
    let platforms = env.ocl.platforms().unwrap();
    assert!(!platforms.is_empty());
    let name = platforms.info(0, PlatformInfo::Name).unwrap();
    assert!(!name.to_string().is_empty());
    let version = platforms.info(0, PlatformInfo::Version).unwrap();
    assert!(version.to_string().starts_with("OpenCL"));
    assert!(matches!(
        platforms.get_one(platforms.len()),
        Err(Error::OutOfRange(_))
    ));

    let mut devices = env.ocl.devices(&platforms, 0, None).unwrap();
    let n = devices.len();
    assert!(n > 0);
    let units = devices.info(0, DeviceInfo::MaxComputeUnits).unwrap();
    assert!(units.as_u64().unwrap() >= 1);
    let wg = devices.info(0, DeviceInfo::MaxWorkGroupSize).unwrap();
    assert!(wg.as_u64().unwrap() >= 1);
    assert!(devices.info(0, DeviceInfo::Name).unwrap().as_text().is_some());

    let first = devices.get_one(0).unwrap();
    devices.append(&first);
    assert_eq!(devices.len(), n + 1);
}

#[test]
pub fn test_contexts_and_queues() {
    let Some(env) = setup() else { return };
    let platforms = env.ocl.platforms().unwrap();
    let devices = env
        .ocl
        .devices(&platforms, env.ocl.config().platform_index, None)
        .unwrap()
        .get_one(0)
        .unwrap();
    let context = env.ocl.context(ContextSource::Devices(&devices)).unwrap();
    assert_eq!(context.num_devices(), 1);
    assert_eq!(context.device_ids(), devices.ids());

    let all = env.ocl.context(ContextSource::Type(DeviceType::All)).unwrap();
    assert!(all.num_devices() >= 1);

    let props = QueueProperties {
        profiling: true,
        ..Default::default()
    };
    let queue = CommandQueue::new(&context, Some(devices.ids()[0]), props).unwrap();
    assert_eq!(queue.device(), devices.ids()[0]);
    assert_eq!(queue.context().get(), context.get());
    queue.flush().unwrap();
    queue.finish().unwrap();

    let empty = DeviceList::default();
    assert!(env
        .ocl
        .context(ContextSource::Devices(&empty))
        .unwrap_err()
        .is_invalid_argument());
}

#[test]
pub fn test_handles_outlive_their_factory() {
    let Some(env) = setup() else { return };
    let common::Env {
        ocl,
        context,
        queue,
    } = env;
    let mut buffer = ocl
        .buffer(&context, 16, MemFlags::READ_WRITE, None)
        .unwrap();
    drop(ocl);
    drop(context);
    let data = [1u32, 2, 3, 4];
    buffer
        .write(&queue, &data[..], Linear::default(), None, None)
        .unwrap();
    let mut out = [0u32; 4];
    buffer
        .read(&queue, &mut out[..], Linear::default(), None, None)
        .unwrap();
    assert_eq!(out, data);
}
