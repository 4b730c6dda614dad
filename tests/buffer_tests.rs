//! Buffer Transfer Tests
//!
//! Tests for:
//! - Initial contents and size validation
//! - Staged writes and staging pool reuse
//! - Direct-write fallback when the pool is exhausted
//! - Failed staging remaps
//! - Path-addressed writes
//! - Written data surviving re-creation
//! - Readback

mod common;

use myth_gpu::device::DeviceCall;
use myth_gpu::{
    BindGroupDescriptor, BindGroupId, BindGroupLayout, BufferDescriptor, BufferId, Error,
    Execution, Gpu, GpuSettings, Invalidation, MemoryLayout, RecordingDevice, StorageAccess,
};
use myth_gpu::resources::StagingStats;

use common::{count, gpu, gpu_with};

fn particles(gpu: &mut Gpu<RecordingDevice>, count: u32) -> BufferId {
    let layout = MemoryLayout::open_array(MemoryLayout::vec4f()).unwrap();
    gpu.create_buffer(BufferDescriptor::new("particles", layout).with_element_count(count))
        .unwrap()
}

fn end_frame(gpu: &mut Gpu<RecordingDevice>) {
    gpu.submit(&Execution::new("frame")).unwrap();
}

// ============================================================================
// Creation
// ============================================================================

#[test]
fn initial_contents_must_match_byte_size() {
    let mut gpu = gpu();
    let result = gpu.create_buffer(
        BufferDescriptor::new("short", MemoryLayout::vec4f()).with_pod_contents(&[1.0_f32; 3]),
    );
    assert_eq!(
        result.unwrap_err(),
        Error::SizeMismatch {
            expected: 16,
            actual: 12
        }
    );
}

#[test]
fn native_buffers_carry_copy_usage() {
    let mut gpu = gpu();
    let buffer = gpu
        .create_buffer(
            BufferDescriptor::new("uniforms", MemoryLayout::mat4x4f())
                .with_usage(wgpu::BufferUsages::UNIFORM),
        )
        .unwrap();
    let native = gpu.buffer_native(buffer).unwrap();
    let usage = gpu.device().buffer_usage(native).unwrap();
    assert!(usage.contains(
        wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_SRC | wgpu::BufferUsages::COPY_DST
    ));
    assert_eq!(gpu.buffer(buffer).unwrap().usage(), wgpu::BufferUsages::UNIFORM);
}

#[test]
fn initial_contents_are_uploaded_at_creation() {
    let mut gpu = gpu();
    let values = [1_u32, 2, 3, 4];
    let layout = MemoryLayout::open_array(MemoryLayout::u32()).unwrap();
    let buffer = gpu
        .create_buffer(
            BufferDescriptor::new("values", layout)
                .with_element_count(4)
                .with_pod_contents(&values),
        )
        .unwrap();
    let native = gpu.buffer_native(buffer).unwrap();

    assert_eq!(gpu.device().buffer_data(native).unwrap(), bytemuck::cast_slice(&values));
    assert!(gpu.device().calls().iter().any(|c| matches!(
        c,
        DeviceCall::CreateBuffer {
            mapped_at_creation: true,
            ..
        }
    )));
}

// ============================================================================
// Staged Writes
// ============================================================================

#[test]
fn staged_write_reaches_the_buffer() {
    let mut gpu = gpu();
    let buffer = particles(&mut gpu, 4);
    let data = [1.0_f32, 2.0, 3.0, 4.0];
    gpu.write_pod(buffer, 16, &data).unwrap();

    let native = gpu.buffer_native(buffer).unwrap();
    assert_eq!(
        &gpu.device().buffer_data(native).unwrap()[16..32],
        bytemuck::cast_slice(&data)
    );
    let stats = gpu.staging_stats(buffer).unwrap();
    assert_eq!((stats.ready, stats.in_flight), (0, 1));

    let calls = gpu.device().calls();
    assert_eq!(count(calls, |c| matches!(c, DeviceCall::CopyBufferToBuffer { .. })), 1);
    assert_eq!(count(calls, |c| matches!(c, DeviceCall::WriteBuffer { .. })), 0);
}

#[test]
fn staging_buffers_are_reused_after_remap() {
    let mut gpu = gpu();
    let buffer = particles(&mut gpu, 4);
    gpu.write_pod(buffer, 0, &[0.5_f32; 4]).unwrap();
    end_frame(&mut gpu);

    let stats = gpu.staging_stats(buffer).unwrap();
    assert_eq!((stats.ready, stats.in_flight), (1, 0));

    gpu.device_mut().clear_calls();
    gpu.write_pod(buffer, 32, &[0.25_f32; 4]).unwrap();
    assert_eq!(
        gpu.device()
            .count_calls(|c| matches!(c, DeviceCall::CreateBuffer { .. })),
        0
    );
    let stats = gpu.staging_stats(buffer).unwrap();
    assert_eq!((stats.ready, stats.in_flight), (0, 1));
}

#[test]
fn exhausted_pool_falls_back_to_direct_write() {
    let mut gpu = gpu_with(GpuSettings {
        staging_pool_limit: 1,
        ..Default::default()
    });
    let buffer = particles(&mut gpu, 2);

    gpu.write_pod(buffer, 0, &[1.0_f32; 4]).unwrap();
    gpu.write_pod(buffer, 16, &[2.0_f32; 4]).unwrap();

    let native = gpu.buffer_native(buffer).unwrap();
    let calls = gpu.device().calls();
    assert_eq!(
        count(calls, |c| matches!(c, DeviceCall::WriteBuffer { buffer, .. } if *buffer == native)),
        1
    );
    let mut expected = vec![1.0_f32; 4];
    expected.extend([2.0_f32; 4]);
    assert_eq!(
        gpu.device().buffer_data(native).unwrap(),
        bytemuck::cast_slice::<f32, u8>(&expected)
    );
    assert_eq!(gpu.staging_stats(buffer).unwrap().in_flight, 1);
}

#[test]
fn zero_pool_limit_always_writes_directly() {
    let mut gpu = gpu_with(GpuSettings {
        staging_pool_limit: 0,
        ..Default::default()
    });
    let buffer = particles(&mut gpu, 1);
    gpu.write_pod(buffer, 0, &[3.0_f32; 4]).unwrap();

    let calls = gpu.device().calls();
    assert_eq!(count(calls, |c| matches!(c, DeviceCall::WriteBuffer { .. })), 1);
    assert_eq!(count(calls, |c| matches!(c, DeviceCall::MapBuffer { .. })), 0);
    assert_eq!(gpu.staging_stats(buffer).unwrap(), StagingStats::default());
}

#[test]
fn failed_remap_discards_staging_buffer() {
    let mut gpu = gpu();
    let buffer = particles(&mut gpu, 1);
    gpu.write_pod(buffer, 0, &[1.0_f32; 4]).unwrap();
    let live = gpu.device().live_buffer_count();

    gpu.device_mut().set_reject_maps(true);
    end_frame(&mut gpu);

    assert_eq!(gpu.staging_stats(buffer).unwrap(), StagingStats::default());
    assert_eq!(gpu.device().live_buffer_count(), live - 1);

    gpu.device_mut().set_reject_maps(false);
    gpu.write_pod(buffer, 0, &[2.0_f32; 4]).unwrap();
    assert_eq!(gpu.staging_stats(buffer).unwrap().in_flight, 1);
}

// ============================================================================
// Access Validation
// ============================================================================

#[test]
fn misaligned_writes_are_rejected() {
    let mut gpu = gpu();
    let buffer = particles(&mut gpu, 2);

    assert!(matches!(
        gpu.write_buffer(buffer, 2, &[0; 4]),
        Err(Error::MisalignedAccess { offset: 2, .. })
    ));
    assert!(matches!(
        gpu.write_buffer(buffer, 0, &[0; 6]),
        Err(Error::MisalignedAccess { len: 6, .. })
    ));
    assert!(matches!(
        gpu.write_buffer(buffer, 28, &[0; 8]),
        Err(Error::SizeMismatch { expected: 32, actual: 36 })
    ));
    assert!(gpu.device().calls().is_empty());
}

#[test]
fn empty_write_is_a_no_op() {
    let mut gpu = gpu();
    let buffer = particles(&mut gpu, 1);
    gpu.write_buffer(buffer, 0, &[]).unwrap();
    assert!(gpu.device().calls().is_empty());
}

#[test]
fn path_writes_land_at_the_field() {
    let mut gpu = gpu();
    let light = MemoryLayout::structure([
        ("position", MemoryLayout::vec3f()),
        ("range", MemoryLayout::f32()),
        ("color", MemoryLayout::vec4f()),
    ])
    .unwrap();
    let layout = MemoryLayout::structure([
        ("count", MemoryLayout::u32()),
        ("lights", MemoryLayout::open_array(light).unwrap()),
    ])
    .unwrap();
    let buffer = gpu
        .create_buffer(BufferDescriptor::new("lights", layout).with_element_count(3))
        .unwrap();

    let red = [1.0_f32, 0.0, 0.0, 1.0];
    gpu.write_at(buffer, "lights[1].color", bytemuck::cast_slice(&red))
        .unwrap();
    gpu.write_at(buffer, "count", bytemuck::bytes_of(&2_u32)).unwrap();

    let native = gpu.buffer_native(buffer).unwrap();
    let data = gpu.device().buffer_data(native).unwrap();
    assert_eq!(&data[0..4], bytemuck::bytes_of(&2_u32));
    assert_eq!(&data[64..80], bytemuck::cast_slice(&red));
}

#[test]
fn path_writes_check_length() {
    let mut gpu = gpu();
    let layout = MemoryLayout::structure([("scale", MemoryLayout::vec2f())]).unwrap();
    let buffer = gpu.create_buffer(BufferDescriptor::new("params", layout)).unwrap();
    assert_eq!(
        gpu.write_at(buffer, "scale", &[0; 4]).unwrap_err(),
        Error::SizeMismatch {
            expected: 8,
            actual: 4
        }
    );
    assert!(matches!(
        gpu.write_at(buffer, "offset", &[0; 8]),
        Err(Error::InvalidPath { .. })
    ));
}

// ============================================================================
// Re-creation
// ============================================================================

fn storage_group(gpu: &mut Gpu<RecordingDevice>) -> BindGroupId {
    let layout = gpu.create_bind_group_layout(
        BindGroupLayout::new("particles")
            .with_binding(
                0,
                "data",
                wgpu::ShaderStages::COMPUTE,
                StorageAccess::Read,
                MemoryLayout::open_array(MemoryLayout::vec4f()).unwrap(),
            )
            .unwrap(),
    );
    gpu.create_bind_group(BindGroupDescriptor::new("particles", layout))
        .unwrap()
}

#[test]
fn written_data_survives_binding() {
    let mut gpu = gpu();
    let buffer = particles(&mut gpu, 1);
    gpu.write_pod(buffer, 0, &[1.0_f32, 2.0, 3.0, 4.0]).unwrap();
    let before = gpu.buffer_native(buffer).unwrap();

    let group = storage_group(&mut gpu);
    gpu.bind(group, "data", buffer).unwrap();
    assert_eq!(gpu.pending_reasons(buffer).unwrap(), Invalidation::USAGE);

    let bytes = pollster::block_on(gpu.read_buffer(buffer, 0, 16)).unwrap();
    let values: Vec<f32> = bytemuck::pod_collect_to_vec(&bytes);
    assert_eq!(values, [1.0, 2.0, 3.0, 4.0]);
    assert_ne!(gpu.buffer_native(buffer).unwrap(), before);
    assert!(!gpu.device().is_live_buffer(before));
}

#[test]
fn direct_writes_survive_usage_growth() {
    let mut gpu = gpu_with(GpuSettings {
        staging_pool_limit: 0,
        ..Default::default()
    });
    let buffer = particles(&mut gpu, 2);
    let data: Vec<f32> = (0..8).map(|i| i as f32).collect();
    gpu.write_pod(buffer, 0, &data).unwrap();

    let group = storage_group(&mut gpu);
    gpu.bind(group, "data", buffer).unwrap();
    let native = gpu.buffer_native(buffer).unwrap();
    assert_eq!(
        gpu.device().buffer_data(native).unwrap(),
        bytemuck::cast_slice::<f32, u8>(&data)
    );
}

#[test]
fn replaced_contents_win_over_old_bytes() {
    let mut gpu = gpu();
    let buffer = particles(&mut gpu, 1);
    gpu.write_pod(buffer, 0, &[9.0_f32; 4]).unwrap();
    gpu.buffer_native(buffer).unwrap();

    let group = storage_group(&mut gpu);
    gpu.bind(group, "data", buffer).unwrap();
    gpu.set_buffer_contents(buffer, bytemuck::cast_slice(&[5.0_f32; 4]).to_vec())
        .unwrap();

    let native = gpu.buffer_native(buffer).unwrap();
    assert_eq!(
        gpu.device().buffer_data(native).unwrap(),
        bytemuck::cast_slice::<f32, u8>(&[5.0; 4])
    );
}

// ============================================================================
// Readback
// ============================================================================

#[test]
fn read_returns_written_bytes() {
    let mut gpu = gpu();
    let buffer = particles(&mut gpu, 4);
    let data: Vec<f32> = (0..16).map(|i| i as f32).collect();
    gpu.write_pod(buffer, 0, &data).unwrap();

    let bytes = pollster::block_on(gpu.read_buffer(buffer, 16, 32)).unwrap();
    assert_eq!(bytes, bytemuck::cast_slice::<f32, u8>(&data[4..12]));
}

#[test]
fn read_staging_is_kept_between_reads() {
    let mut gpu = gpu();
    let buffer = particles(&mut gpu, 2);
    pollster::block_on(gpu.read_buffer(buffer, 0, 32)).unwrap();
    gpu.device_mut().clear_calls();

    pollster::block_on(gpu.read_buffer(buffer, 0, 16)).unwrap();
    assert_eq!(
        gpu.device()
            .count_calls(|c| matches!(c, DeviceCall::CreateBuffer { .. })),
        0
    );
}

#[test]
fn rejected_read_map_is_an_error() {
    let mut gpu = gpu();
    let buffer = particles(&mut gpu, 1);
    gpu.device_mut().set_reject_maps(true);
    let result = pollster::block_on(gpu.read_buffer(buffer, 0, 16));
    assert!(matches!(result, Err(Error::MapFailed(_))));
    assert_eq!(gpu.device().pending_map_count(), 0);
}
