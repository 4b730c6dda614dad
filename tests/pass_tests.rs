//! Pass Compiler Tests
//!
//! Tests for:
//! - Step validation against pipelines and pipeline layouts
//! - Redundant state elimination while encoding draws
//! - Bundle mode: recording once, re-recording only on invalidation
//! - Compute dispatches and execution order

mod common;

use myth_gpu::device::DeviceCall;
use myth_gpu::{
    BindGroupDescriptor, BindGroupLayout, BufferDescriptor, ComputePipelineDescriptor, ComputeStep,
    Error, Execution, Gpu, Invalidation, MemoryLayout, PassRef, PipelineLayout, RecordingDevice,
    RenderPassId, RenderPipelineDescriptor, RenderStep, StorageAccess,
};

use common::{
    SHADER, color_target, count, forward, gpu, pass_calls, position_layout, render_pass, triangle,
    uniform_group,
};

fn frame(gpu: &mut Gpu<RecordingDevice>, pass: impl Into<PassRef>) -> Vec<DeviceCall> {
    gpu.device_mut().clear_calls();
    gpu.submit(&Execution::new("frame").then(pass)).unwrap();
    gpu.device_mut().take_calls()
}

fn bundle_recordings(calls: &[DeviceCall]) -> usize {
    count(calls, |c| matches!(c, DeviceCall::CreateRenderBundleEncoder))
}

/// Draws inside the bundle executed by `calls`.
fn bundled_draws(gpu: &Gpu<RecordingDevice>, calls: &[DeviceCall]) -> usize {
    let bundle = calls
        .iter()
        .find_map(|c| match c {
            DeviceCall::ExecuteBundles(bundles) => bundles.first().copied(),
            _ => None,
        })
        .unwrap();
    let commands = gpu.device().bundle_commands(bundle).unwrap();
    count(commands, |c| matches!(c, DeviceCall::Draw { .. }))
}

/// A forward pass with a single triangle draw.
struct Scene {
    gpu: Gpu<RecordingDevice>,
    pass: RenderPassId,
    target: myth_gpu::TextureId,
    vertices: myth_gpu::BufferId,
    material: myth_gpu::BindGroupId,
}

fn scene(bundle_mode: bool) -> Scene {
    let mut gpu = gpu();
    let setup = forward(&mut gpu);
    let (camera, _) = uniform_group(&mut gpu, setup.camera_layout, "view");
    let (material, _) = uniform_group(&mut gpu, setup.material_layout, "params");
    let vertices = triangle(&mut gpu);
    let target = color_target(&mut gpu);
    let pass = render_pass(&mut gpu, target, bundle_mode);
    gpu.add_render_step(
        pass,
        RenderStep::new(setup.pipeline)
            .bind("camera", camera)
            .bind("material", material)
            .vertex_buffer(vertices),
    )
    .unwrap();
    Scene {
        gpu,
        pass,
        target,
        vertices,
        material,
    }
}

// ============================================================================
// Step Validation
// ============================================================================

#[test]
fn missing_group_is_reported_by_name() {
    let mut gpu = gpu();
    let setup = forward(&mut gpu);
    let (camera, _) = uniform_group(&mut gpu, setup.camera_layout, "view");
    let vertices = triangle(&mut gpu);
    let target = color_target(&mut gpu);
    let pass = render_pass(&mut gpu, target, false);

    let result = gpu.add_render_step(
        pass,
        RenderStep::new(setup.pipeline)
            .bind("camera", camera)
            .vertex_buffer(vertices),
    );
    assert_eq!(
        result.unwrap_err(),
        Error::MissingBindGroup {
            name: "material".to_string(),
            index: 1
        }
    );
    assert_eq!(gpu.render_pass(pass).unwrap().step_count(), 0);
}

#[test]
fn mismatched_groups_are_rejected() {
    let mut gpu = gpu();
    let setup = forward(&mut gpu);
    let (camera, _) = uniform_group(&mut gpu, setup.camera_layout, "view");
    let (material, _) = uniform_group(&mut gpu, setup.material_layout, "params");
    let vertices = triangle(&mut gpu);
    let target = color_target(&mut gpu);
    let pass = render_pass(&mut gpu, target, false);

    let swapped = RenderStep::new(setup.pipeline)
        .bind("camera", material)
        .bind("material", camera)
        .vertex_buffer(vertices);
    assert!(matches!(
        gpu.add_render_step(pass, swapped),
        Err(Error::LayoutMismatch(_))
    ));

    let unknown = RenderStep::new(setup.pipeline)
        .bind("camera", camera)
        .bind("material", material)
        .bind("lights", material)
        .vertex_buffer(vertices);
    assert!(matches!(
        gpu.add_render_step(pass, unknown),
        Err(Error::LayoutMismatch(_))
    ));
}

#[test]
fn incomplete_group_is_rejected() {
    let mut gpu = gpu();
    let setup = forward(&mut gpu);
    let (camera, _) = uniform_group(&mut gpu, setup.camera_layout, "view");
    let empty = gpu
        .create_bind_group(BindGroupDescriptor::new("empty", setup.material_layout))
        .unwrap();
    let vertices = triangle(&mut gpu);
    let target = color_target(&mut gpu);
    let pass = render_pass(&mut gpu, target, false);

    let result = gpu.add_render_step(
        pass,
        RenderStep::new(setup.pipeline)
            .bind("camera", camera)
            .bind("material", empty)
            .vertex_buffer(vertices),
    );
    assert!(matches!(result, Err(Error::MissingRequiredBinding { index: 0, .. })));
}

#[test]
fn vertex_buffers_must_match_pipeline() {
    let mut gpu = gpu();
    let setup = forward(&mut gpu);
    let (camera, _) = uniform_group(&mut gpu, setup.camera_layout, "view");
    let (material, _) = uniform_group(&mut gpu, setup.material_layout, "params");
    let target = color_target(&mut gpu);
    let pass = render_pass(&mut gpu, target, false);
    let step = || {
        RenderStep::new(setup.pipeline)
            .bind("camera", camera)
            .bind("material", material)
    };

    assert!(matches!(
        gpu.add_render_step(pass, step()),
        Err(Error::LayoutMismatch(_))
    ));

    let plain = gpu
        .create_buffer(
            BufferDescriptor::new("plain", MemoryLayout::open_array(MemoryLayout::vec4f()).unwrap())
                .with_element_count(3),
        )
        .unwrap();
    assert!(matches!(
        gpu.add_render_step(pass, step().vertex_buffer(plain)),
        Err(Error::LayoutMismatch(_))
    ));

    let vertices = triangle(&mut gpu);
    assert!(matches!(
        gpu.add_render_step(pass, step().vertex_buffer(vertices).index_buffer(plain)),
        Err(Error::LayoutMismatch(_))
    ));
    gpu.add_render_step(pass, step().vertex_buffer(vertices)).unwrap();
    assert!(
        gpu.buffer(vertices)
            .unwrap()
            .usage()
            .contains(wgpu::BufferUsages::VERTEX)
    );
}

#[test]
fn bufferless_step_needs_a_count() {
    let mut gpu = gpu();
    let layout = gpu
        .create_pipeline_layout(PipelineLayout::new("empty"))
        .unwrap();
    let pipeline = gpu
        .create_render_pipeline(
            RenderPipelineDescriptor::new("fullscreen", layout, SHADER)
                .with_color_target(wgpu::TextureFormat::Rgba8Unorm),
        )
        .unwrap();
    let target = color_target(&mut gpu);
    let pass = render_pass(&mut gpu, target, false);

    assert!(matches!(
        gpu.add_render_step(pass, RenderStep::new(pipeline)),
        Err(Error::LayoutMismatch(_))
    ));
    gpu.add_render_step(pass, RenderStep::new(pipeline).count(3))
        .unwrap();

    let calls = pass_calls(&frame(&mut gpu, pass));
    assert!(calls.contains(&DeviceCall::Draw {
        vertices: 0..3,
        instances: 0..1
    }));
}

#[test]
fn too_many_groups_are_rejected() {
    let mut gpu = common::gpu_with(myth_gpu::GpuSettings {
        max_bind_groups: 1,
        ..Default::default()
    });
    let setup = forward(&mut gpu);
    let (camera, _) = uniform_group(&mut gpu, setup.camera_layout, "view");
    let (material, _) = uniform_group(&mut gpu, setup.material_layout, "params");
    let vertices = triangle(&mut gpu);
    let target = color_target(&mut gpu);
    let pass = render_pass(&mut gpu, target, false);

    let result = gpu.add_render_step(
        pass,
        RenderStep::new(setup.pipeline)
            .bind("camera", camera)
            .bind("material", material)
            .vertex_buffer(vertices),
    );
    assert!(matches!(result, Err(Error::LayoutMismatch(_))));
}

// ============================================================================
// Direct Encoding
// ============================================================================

#[test]
fn shared_state_is_set_once() {
    let mut gpu = gpu();
    let setup = forward(&mut gpu);
    let (camera, _) = uniform_group(&mut gpu, setup.camera_layout, "view");
    let (first, _) = uniform_group(&mut gpu, setup.material_layout, "params");
    let (second, _) = uniform_group(&mut gpu, setup.material_layout, "params");
    let vertices = triangle(&mut gpu);
    let target = color_target(&mut gpu);
    let pass = render_pass(&mut gpu, target, false);
    for material in [first, second] {
        gpu.add_render_step(
            pass,
            RenderStep::new(setup.pipeline)
                .bind("camera", camera)
                .bind("material", material)
                .vertex_buffer(vertices),
        )
        .unwrap();
    }

    let calls = pass_calls(&frame(&mut gpu, pass));
    let second_native = gpu.bind_group_native(second).unwrap();
    let draws: Vec<_> = calls
        .iter()
        .enumerate()
        .filter(|(_, c)| matches!(c, DeviceCall::Draw { .. }))
        .map(|(i, _)| i)
        .collect();
    assert_eq!(draws.len(), 2);
    assert_eq!(
        calls[draws[0] + 1..draws[1]],
        [DeviceCall::SetBindGroup {
            index: 1,
            group: Some(second_native)
        }]
    );
    assert_eq!(count(&calls, |c| matches!(c, DeviceCall::SetRenderPipeline(_))), 1);
    assert_eq!(count(&calls, |c| matches!(c, DeviceCall::SetVertexBuffer { .. })), 1);
    assert!(calls[..draws[0]].iter().all(DeviceCall::is_state_change));
}

#[test]
fn pipeline_switch_unbinds_unused_groups() {
    let mut gpu = gpu();
    let setup = forward(&mut gpu);
    let unlit_layout = gpu
        .create_pipeline_layout(
            PipelineLayout::new("unlit")
                .with_group(0, "camera", setup.camera_layout)
                .unwrap(),
        )
        .unwrap();
    let unlit = gpu
        .create_render_pipeline(
            RenderPipelineDescriptor::new("unlit", unlit_layout, SHADER)
                .with_vertex_layout(position_layout())
                .with_color_target(wgpu::TextureFormat::Rgba8Unorm),
        )
        .unwrap();
    let (camera, _) = uniform_group(&mut gpu, setup.camera_layout, "view");
    let (material, _) = uniform_group(&mut gpu, setup.material_layout, "params");
    let vertices = triangle(&mut gpu);
    let target = color_target(&mut gpu);
    let pass = render_pass(&mut gpu, target, false);
    gpu.add_render_step(
        pass,
        RenderStep::new(setup.pipeline)
            .bind("camera", camera)
            .bind("material", material)
            .vertex_buffer(vertices),
    )
    .unwrap();
    gpu.add_render_step(
        pass,
        RenderStep::new(unlit).bind("camera", camera).vertex_buffer(vertices),
    )
    .unwrap();

    let calls = pass_calls(&frame(&mut gpu, pass));
    let unlit_native = gpu.render_pipeline_native(unlit).unwrap();
    let switch = calls
        .iter()
        .position(|c| *c == DeviceCall::SetRenderPipeline(unlit_native))
        .unwrap();
    assert_eq!(
        calls[switch + 1..],
        [
            DeviceCall::SetBindGroup {
                index: 1,
                group: None
            },
            DeviceCall::Draw {
                vertices: 0..3,
                instances: 0..1
            },
        ]
    );
}

#[test]
fn indexed_draws_default_to_index_count() {
    let mut gpu = gpu();
    let setup = forward(&mut gpu);
    let (camera, _) = uniform_group(&mut gpu, setup.camera_layout, "view");
    let (material, _) = uniform_group(&mut gpu, setup.material_layout, "params");
    let vertices = triangle(&mut gpu);
    let indices = gpu
        .create_buffer(
            BufferDescriptor::new("quad", MemoryLayout::indices(wgpu::IndexFormat::Uint16))
                .with_element_count(6)
                .with_pod_contents(&[0_u16, 1, 2, 0, 2, 1]),
        )
        .unwrap();
    let target = color_target(&mut gpu);
    let pass = render_pass(&mut gpu, target, false);
    let step = RenderStep::new(setup.pipeline)
        .bind("camera", camera)
        .bind("material", material)
        .vertex_buffer(vertices)
        .index_buffer(indices);
    gpu.add_render_step(pass, step.clone()).unwrap();
    gpu.add_render_step(pass, step.count(3).instances(4)).unwrap();
    assert!(
        gpu.buffer(indices)
            .unwrap()
            .usage()
            .contains(wgpu::BufferUsages::INDEX)
    );

    let calls = pass_calls(&frame(&mut gpu, pass));
    let index_native = gpu.buffer_native(indices).unwrap();
    let draws: Vec<_> = calls
        .iter()
        .filter(|c| matches!(c, DeviceCall::DrawIndexed { .. }))
        .cloned()
        .collect();
    assert_eq!(
        draws,
        [
            DeviceCall::DrawIndexed {
                indices: 0..6,
                base_vertex: 0,
                instances: 0..1
            },
            DeviceCall::DrawIndexed {
                indices: 0..3,
                base_vertex: 0,
                instances: 0..4
            },
        ]
    );
    assert_eq!(
        count(&calls, |c| *c
            == DeviceCall::SetIndexBuffer {
                buffer: index_native,
                format: wgpu::IndexFormat::Uint16
            }),
        1
    );
}

#[test]
fn destroyed_group_fails_submission() {
    let mut scene = scene(false);
    scene.gpu.destroy(scene.material).unwrap();
    let result = scene
        .gpu
        .submit(&Execution::new("frame").then(scene.pass));
    assert!(matches!(result, Err(Error::UnknownResource(_))));
}

#[test]
fn targets_gain_render_attachment_usage() {
    let scene = scene(false);
    let texture = scene.gpu.texture(scene.target).unwrap();
    assert!(texture.usage().contains(wgpu::TextureUsages::RENDER_ATTACHMENT));
}

// ============================================================================
// Bundle Mode
// ============================================================================

#[test]
fn unchanged_pass_replays_its_bundle() {
    let mut scene = scene(true);
    let first = frame(&mut scene.gpu, scene.pass);
    assert_eq!(bundle_recordings(&first), 1);
    assert_eq!(bundled_draws(&scene.gpu, &first), 1);

    let second = frame(&mut scene.gpu, scene.pass);
    assert_eq!(bundle_recordings(&second), 0);
    let inside = pass_calls(&second);
    assert_eq!(inside.len(), 1);
    assert!(matches!(&inside[0], DeviceCall::ExecuteBundles(bundles) if bundles.len() == 1));
    assert_eq!(count(&second, |c| matches!(c, DeviceCall::Submit(_))), 1);
}

#[test]
fn target_resize_rerecords_once() {
    let mut scene = scene(true);
    frame(&mut scene.gpu, scene.pass);

    scene
        .gpu
        .set_texture_size(
            scene.target,
            wgpu::Extent3d {
                width: 128,
                height: 128,
                depth_or_array_layers: 1,
            },
        )
        .unwrap();
    assert!(
        scene
            .gpu
            .pending_reasons(scene.pass)
            .unwrap()
            .contains(Invalidation::RENDER_TARGET)
    );

    let resized = frame(&mut scene.gpu, scene.pass);
    assert_eq!(bundle_recordings(&resized), 1);
    assert_eq!(count(&resized, |c| matches!(c, DeviceCall::DestroyRenderBundle(_))), 1);
    assert_eq!(bundle_recordings(&frame(&mut scene.gpu, scene.pass)), 0);
}

#[test]
fn vertex_contents_do_not_rerecord() {
    let mut scene = scene(true);
    frame(&mut scene.gpu, scene.pass);

    let moved: [[f32; 3]; 3] = [[0.0, 1.0, 0.0], [-1.0, -1.0, 0.0], [1.0, -1.0, 0.0]];
    scene
        .gpu
        .set_buffer_contents(scene.vertices, bytemuck::cast_slice(&moved).to_vec())
        .unwrap();
    assert!(scene.gpu.pending_reasons(scene.pass).unwrap().is_empty());

    let calls = frame(&mut scene.gpu, scene.pass);
    assert_eq!(bundle_recordings(&calls), 0);
}

#[test]
fn rebinding_material_rerecords() {
    let mut scene = scene(true);
    frame(&mut scene.gpu, scene.pass);

    let buffer = common::uniform_buffer(&mut scene.gpu, "tint");
    scene.gpu.bind(scene.material, "params", buffer).unwrap();

    let calls = frame(&mut scene.gpu, scene.pass);
    assert_eq!(bundle_recordings(&calls), 1);
    assert_eq!(count(&calls, |c| matches!(c, DeviceCall::CreateBindGroup { .. })), 1);
}

#[test]
fn removing_a_step_rerecords() {
    let mut gpu = gpu();
    let setup = forward(&mut gpu);
    let (camera, _) = uniform_group(&mut gpu, setup.camera_layout, "view");
    let (material, _) = uniform_group(&mut gpu, setup.material_layout, "params");
    let vertices = triangle(&mut gpu);
    let target = color_target(&mut gpu);
    let pass = render_pass(&mut gpu, target, true);
    let step = RenderStep::new(setup.pipeline)
        .bind("camera", camera)
        .bind("material", material)
        .vertex_buffer(vertices);
    let first = gpu.add_render_step(pass, step.clone()).unwrap();
    gpu.add_render_step(pass, step).unwrap();
    let calls = frame(&mut gpu, pass);
    assert_eq!(bundled_draws(&gpu, &calls), 2);

    gpu.remove_render_step(pass, first).unwrap();
    assert_eq!(gpu.render_pass(pass).unwrap().step_count(), 1);
    let calls = frame(&mut gpu, pass);
    assert_eq!(bundle_recordings(&calls), 1);
    assert_eq!(bundled_draws(&gpu, &calls), 1);

    assert!(matches!(
        gpu.remove_render_step(pass, first),
        Err(Error::UnknownResource(_))
    ));
}

#[test]
fn bundle_mode_can_be_toggled() {
    let mut scene = scene(true);
    frame(&mut scene.gpu, scene.pass);

    scene.gpu.set_bundle_mode(scene.pass, false).unwrap();
    let direct = pass_calls(&frame(&mut scene.gpu, scene.pass));
    assert!(!direct.iter().any(|c| matches!(c, DeviceCall::ExecuteBundles(_))));
    assert_eq!(count(&direct, |c| matches!(c, DeviceCall::Draw { .. })), 1);

    scene.gpu.set_bundle_mode(scene.pass, true).unwrap();
    let bundled = frame(&mut scene.gpu, scene.pass);
    assert_eq!(bundle_recordings(&bundled), 1);
}

// ============================================================================
// Compute & Execution Order
// ============================================================================

/// A compute pass with one dispatch over a storage buffer of particles.
fn simulation(
    gpu: &mut Gpu<RecordingDevice>,
) -> (myth_gpu::ComputePassId, myth_gpu::StepId, myth_gpu::BufferId) {
    let layout = BindGroupLayout::new("simulation")
        .with_binding(
            0,
            "particles",
            wgpu::ShaderStages::COMPUTE,
            StorageAccess::ReadWrite,
            MemoryLayout::open_array(MemoryLayout::vec4f()).unwrap(),
        )
        .unwrap();
    let layout = gpu.create_bind_group_layout(layout);
    let pipeline_layout = gpu
        .create_pipeline_layout(
            PipelineLayout::new("simulation")
                .with_group(0, "simulation", layout)
                .unwrap(),
        )
        .unwrap();
    let pipeline = gpu
        .create_compute_pipeline(ComputePipelineDescriptor::new(
            "integrate",
            pipeline_layout,
            "@compute @workgroup_size(64) fn main() {}",
        ))
        .unwrap();
    let particles = gpu
        .create_buffer(
            BufferDescriptor::new(
                "particles",
                MemoryLayout::open_array(MemoryLayout::vec4f()).unwrap(),
            )
            .with_element_count(512),
        )
        .unwrap();
    let group = gpu
        .create_bind_group(BindGroupDescriptor::new("simulation", layout))
        .unwrap();
    gpu.bind(group, "particles", particles).unwrap();

    let pass = gpu.create_compute_pass("simulate");
    let step = gpu
        .add_compute_step(
            pass,
            ComputeStep::new(pipeline, [8, 1, 1]).bind("simulation", group),
        )
        .unwrap();
    (pass, step, particles)
}

#[test]
fn compute_steps_dispatch() {
    let mut gpu = gpu();
    let (pass, _, particles) = simulation(&mut gpu);
    assert!(
        gpu.buffer(particles)
            .unwrap()
            .usage()
            .contains(wgpu::BufferUsages::STORAGE)
    );

    let calls = frame(&mut gpu, pass);
    let start = calls
        .iter()
        .position(|c| matches!(c, DeviceCall::BeginComputePass(_)))
        .unwrap();
    let kinds: Vec<_> = calls[start..]
        .iter()
        .take_while(|c| !matches!(c, DeviceCall::Submit(_)))
        .cloned()
        .collect();
    assert!(matches!(kinds[1], DeviceCall::SetComputePipeline(_)));
    assert!(matches!(kinds[2], DeviceCall::SetBindGroup { index: 0, group: Some(_) }));
    assert_eq!(kinds[3], DeviceCall::Dispatch { x: 8, y: 1, z: 1 });
    assert_eq!(kinds[4], DeviceCall::EndPass);
    assert_eq!(kinds.len(), 5);
}

#[test]
fn passes_run_in_execution_order() {
    let mut scene = scene(false);
    let (simulate, _, _) = simulation(&mut scene.gpu);
    scene.gpu.device_mut().clear_calls();

    scene
        .gpu
        .submit(&Execution::new("frame").then(simulate).then(scene.pass))
        .unwrap();
    let calls = scene.gpu.device_mut().take_calls();

    let position = |pred: fn(&DeviceCall) -> bool| calls.iter().position(pred).unwrap();
    let compute = position(|c| matches!(c, DeviceCall::BeginComputePass(_)));
    let render = position(|c| matches!(c, DeviceCall::BeginRenderPass { .. }));
    let submit = position(|c| matches!(c, DeviceCall::Submit(_)));
    assert!(compute < render && render < submit);
    assert_eq!(count(&calls, |c| matches!(c, DeviceCall::Submit(_))), 1);
    assert_eq!(count(&calls, |c| matches!(c, DeviceCall::CreateCommandEncoder(_))), 1);
    assert_eq!(scene.gpu.frame(), 1);
}

#[test]
fn removed_compute_steps_stop_dispatching() {
    let mut gpu = gpu();
    let (pass, step, _) = simulation(&mut gpu);
    assert_eq!(gpu.compute_pass(pass).unwrap().step_count(), 1);

    gpu.remove_compute_step(pass, step).unwrap();
    let calls = frame(&mut gpu, pass);
    assert_eq!(count(&calls, |c| matches!(c, DeviceCall::Dispatch { .. })), 0);
    assert!(pass_calls(&calls).is_empty());
    assert!(matches!(
        gpu.remove_compute_step(pass, step),
        Err(Error::UnknownResource(_))
    ));
}
