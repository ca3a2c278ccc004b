use std::time::SystemTime;

use clbind::prelude::*;

const SAXPY: &str = r#"
__kernel void saxpy(const float alpha, __global const float *x, __global float *y)
{
    int gid = get_global_id(0);
    y[gid] = alpha * x[gid] + y[gid];
}
"#;

fn list_devices(ocl: &OpenCl) -> Result<()> {
    let platforms = ocl.platforms()?;
    for p in 0..platforms.len() {
        println!("platform {p}: {}", platforms.info(p, PlatformInfo::Name)?);
        let devices = ocl.devices(&platforms, p, None)?;
        for d in 0..devices.len() {
            println!(
                "  device {d}: {} ({} compute units, max work group {})",
                devices.info(d, DeviceInfo::Name)?,
                devices.info(d, DeviceInfo::MaxComputeUnits)?,
                devices.info(d, DeviceInfo::MaxWorkGroupSize)?,
            );
        }
    }
    Ok(())
}

fn saxpy(ocl: &OpenCl, n: usize) -> Result<()> {
    let context = ocl.default_context()?;
    let queue = ocl.command_queue(&context)?;
    let program = ocl.program_from_source(&context, &[SAXPY])?;
    program.build(None, None)?;
    let kernel = ocl.kernel(&program, "saxpy")?;

    let x: Vec<f32> = (0..n).map(|i| i as f32).collect();
    let mut y: Vec<f32> = (0..n).map(|i| (n - 1 - i) as f32).collect();
    let xs = ocl.buffer_from_host(&context, MemFlags::READ_ONLY, &x)?;
    let ys = ocl.buffer_from_host(&context, MemFlags::READ_WRITE, &y)?;

    kernel.set_args([
        KernelArg::Scalar(Scalar::from(2.0f32), DType::Float32),
        KernelArg::Buffer(&xs),
        KernelArg::Buffer(&ys),
    ])?;
    let mut events = ocl.event_list()?;
    let s = SystemTime::now();
    kernel.enqueue_nd_range(&queue, &NdRange::new(&[n]), Some(&mut events), None)?;
    events.wait()?;
    let elapsed = SystemTime::now()
        .duration_since(s)
        .map(|d| d.as_secs_f64())
        .unwrap_or_default();
    ys.read(&queue, &mut y, Linear::default(), None, None)?;

    let wrong = y
        .iter()
        .enumerate()
        .filter(|(i, v)| **v != (n - 1 + i) as f32)
        .count();
    println!("saxpy n={n}: {wrong} mismatches, {:.3} ms", elapsed * 1e3);
    Ok(())
}

fn main() {
    env_logger::init();
    let ocl = OpenCl::new();
    if !ocl.is_available() {
        eprintln!("{} ({})", ocl.status_message(), ocl.status().code());
        std::process::exit(1);
    }
    if let Err(e) = list_devices(&ocl).and_then(|_| saxpy(&ocl, 1 << 16)) {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
