//! Shared fixtures for the integration tests.

#![allow(dead_code)]

use myth_gpu::device::DeviceCall;
use myth_gpu::{
    BindGroupDescriptor, BindGroupId, BindGroupLayout, BindGroupLayoutId, BufferDescriptor,
    BufferId, ColorTarget, Gpu, GpuSettings, MemoryLayout, PipelineLayout, PipelineLayoutId,
    RecordingDevice, RenderPassDescriptor, RenderPassId, RenderPipelineDescriptor,
    RenderPipelineId, StorageAccess, TextureDescriptor, TextureId, VertexLayout,
};

pub const SHADER: &str = "@vertex fn vs_main() -> @builtin(position) vec4f { return vec4f(0.0); }";

pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn gpu() -> Gpu<RecordingDevice> {
    gpu_with(GpuSettings::default())
}

pub fn gpu_with(settings: GpuSettings) -> Gpu<RecordingDevice> {
    init_logger();
    Gpu::new(RecordingDevice::new(), settings)
}

pub fn position_layout() -> MemoryLayout {
    VertexLayout::builder(wgpu::VertexStepMode::Vertex)
        .attribute("position", wgpu::VertexFormat::Float32x3)
        .build()
        .unwrap()
        .into()
}

/// A uniform-only layout with a single `mat4x4f` binding called `name`.
pub fn uniform_layout(gpu: &mut Gpu<RecordingDevice>, label: &str, name: &str) -> BindGroupLayoutId {
    let layout = BindGroupLayout::new(label)
        .with_binding(
            0,
            name,
            wgpu::ShaderStages::VERTEX,
            StorageAccess::None,
            MemoryLayout::mat4x4f(),
        )
        .unwrap();
    gpu.create_bind_group_layout(layout)
}

pub fn uniform_buffer(gpu: &mut Gpu<RecordingDevice>, label: &str) -> BufferId {
    gpu.create_buffer(BufferDescriptor::new(label, MemoryLayout::mat4x4f()))
        .unwrap()
}

/// A complete group over `layout` whose only binding `name` holds a fresh buffer.
pub fn uniform_group(
    gpu: &mut Gpu<RecordingDevice>,
    layout: BindGroupLayoutId,
    name: &str,
) -> (BindGroupId, BufferId) {
    let buffer = uniform_buffer(gpu, name);
    let group = gpu
        .create_bind_group(BindGroupDescriptor::new(name, layout))
        .unwrap();
    gpu.bind(group, name, buffer).unwrap();
    (group, buffer)
}

pub fn color_target(gpu: &mut Gpu<RecordingDevice>) -> TextureId {
    gpu.create_texture(TextureDescriptor::new_2d(
        "color",
        64,
        64,
        wgpu::TextureFormat::Rgba8Unorm,
    ))
    .unwrap()
}

pub fn render_pass(gpu: &mut Gpu<RecordingDevice>, target: TextureId, bundle_mode: bool) -> RenderPassId {
    gpu.create_render_pass(
        RenderPassDescriptor::new("main")
            .with_color_target(ColorTarget::clear(target, wgpu::Color::BLACK))
            .with_bundle_mode(bundle_mode),
    )
    .unwrap()
}

/// Forward setup: groups `camera` (0) and `material` (1), one vertex stream.
pub struct Forward {
    pub camera_layout: BindGroupLayoutId,
    pub material_layout: BindGroupLayoutId,
    pub pipeline_layout: PipelineLayoutId,
    pub pipeline: RenderPipelineId,
}

pub fn forward(gpu: &mut Gpu<RecordingDevice>) -> Forward {
    let camera_layout = uniform_layout(gpu, "camera", "view");
    let material_layout = uniform_layout(gpu, "material", "params");
    let pipeline_layout = gpu
        .create_pipeline_layout(
            PipelineLayout::new("forward")
                .with_group(0, "camera", camera_layout)
                .unwrap()
                .with_group(1, "material", material_layout)
                .unwrap(),
        )
        .unwrap();
    let pipeline = gpu
        .create_render_pipeline(
            RenderPipelineDescriptor::new("opaque", pipeline_layout, SHADER)
                .with_vertex_layout(position_layout())
                .with_color_target(wgpu::TextureFormat::Rgba8Unorm),
        )
        .unwrap();
    Forward {
        camera_layout,
        material_layout,
        pipeline_layout,
        pipeline,
    }
}

pub fn triangle(gpu: &mut Gpu<RecordingDevice>) -> BufferId {
    let positions: [[f32; 3]; 3] = [[0.0, 0.5, 0.0], [-0.5, -0.5, 0.0], [0.5, -0.5, 0.0]];
    gpu.create_buffer(
        BufferDescriptor::new("triangle", position_layout())
            .with_element_count(3)
            .with_pod_contents(&positions),
    )
    .unwrap()
}

/// Calls recorded between the first `BeginRenderPass`/`BeginComputePass`
/// and its `EndPass`.
pub fn pass_calls(calls: &[DeviceCall]) -> Vec<DeviceCall> {
    calls
        .iter()
        .skip_while(|c| !matches!(c, DeviceCall::BeginRenderPass { .. } | DeviceCall::BeginComputePass(_)))
        .skip(1)
        .take_while(|c| !matches!(c, DeviceCall::EndPass))
        .cloned()
        .collect()
}

pub fn count(calls: &[DeviceCall], predicate: impl Fn(&DeviceCall) -> bool) -> usize {
    calls.iter().filter(|c| predicate(c)).count()
}
