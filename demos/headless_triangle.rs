//! Headless Triangle
//!
//! Draws a triangle into an offscreen target through a bundled render pass,
//! runs a compute pass over a storage buffer in the same submission and
//! reads the result back.
//!
//! ```text
//! RUST_LOG=myth_gpu=debug cargo run --example headless_triangle --features wgpu-backend
//! ```

use glam::Mat4;
use myth_gpu::{
    BindGroupDescriptor, BindGroupLayout, BufferDescriptor, ColorTarget, ComputePipelineDescriptor,
    ComputeStep, Execution, Gpu, GpuSettings, MemoryLayout, PipelineLayout, RenderPassDescriptor,
    RenderPipelineDescriptor, RenderStep, StorageAccess, TextureDescriptor, VertexLayout,
    WgpuDevice,
};

const TRIANGLE_SHADER: &str = r"
@group(0) @binding(0) var<uniform> view: mat4x4f;

@vertex
fn vs_main(@location(0) position: vec3f) -> @builtin(position) vec4f {
    return view * vec4f(position, 1.0);
}

@fragment
fn fs_main() -> @location(0) vec4f {
    return vec4f(1.0, 0.5, 0.2, 1.0);
}
";

const DOUBLE_SHADER: &str = r"
@group(0) @binding(0) var<storage, read_write> values: array<f32>;

@compute @workgroup_size(64)
fn main(@builtin(global_invocation_id) id: vec3u) {
    if (id.x < arrayLength(&values)) {
        values[id.x] = values[id.x] * 2.0;
    }
}
";

const VALUE_COUNT: u32 = 256;

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let device = WgpuDevice::request_headless()?;
    let mut gpu = Gpu::new(
        device,
        GpuSettings {
            bundle_mode_default: true,
            label_prefix: Some("demo".into()),
            ..Default::default()
        },
    );

    // --- Render pass ---

    let camera_layout = gpu.create_bind_group_layout(BindGroupLayout::new("camera").with_binding(
        0,
        "view",
        wgpu::ShaderStages::VERTEX,
        StorageAccess::None,
        MemoryLayout::mat4x4f(),
    )?);
    let pipeline_layout = gpu.create_pipeline_layout(
        PipelineLayout::new("triangle").with_group(0, "camera", camera_layout)?,
    )?;
    let vertex_layout: MemoryLayout = VertexLayout::builder(wgpu::VertexStepMode::Vertex)
        .attribute("position", wgpu::VertexFormat::Float32x3)
        .build()?
        .into();
    let pipeline = gpu.create_render_pipeline(
        RenderPipelineDescriptor::new("triangle", pipeline_layout, TRIANGLE_SHADER)
            .with_vertex_layout(vertex_layout.clone())
            .with_color_target(wgpu::TextureFormat::Rgba8Unorm),
    )?;

    let view = Mat4::from_scale(glam::Vec3::splat(0.8));
    let camera = gpu.create_buffer(
        BufferDescriptor::new("view", MemoryLayout::mat4x4f())
            .with_pod_contents(&view.to_cols_array()),
    )?;
    let camera_group = gpu.create_bind_group(BindGroupDescriptor::new("camera", camera_layout))?;
    gpu.bind(camera_group, "view", camera)?;

    let positions: [[f32; 3]; 3] = [[0.0, 0.5, 0.0], [-0.5, -0.5, 0.0], [0.5, -0.5, 0.0]];
    let vertices = gpu.create_buffer(
        BufferDescriptor::new("triangle", vertex_layout)
            .with_element_count(3)
            .with_pod_contents(&positions),
    )?;

    let target = gpu.create_texture(TextureDescriptor::new_2d(
        "color",
        256,
        256,
        wgpu::TextureFormat::Rgba8Unorm,
    ))?;
    let pass = gpu.create_render_pass(
        RenderPassDescriptor::new("main")
            .with_color_target(ColorTarget::clear(target, wgpu::Color::BLACK)),
    )?;
    gpu.add_render_step(
        pass,
        RenderStep::new(pipeline)
            .bind("camera", camera_group)
            .vertex_buffer(vertices),
    )?;

    // --- Compute pass ---

    let values_layout = MemoryLayout::open_array(MemoryLayout::f32())?;
    let storage_layout = gpu.create_bind_group_layout(BindGroupLayout::new("values").with_binding(
        0,
        "values",
        wgpu::ShaderStages::COMPUTE,
        StorageAccess::ReadWrite,
        values_layout.clone(),
    )?);
    let compute_layout = gpu.create_pipeline_layout(
        PipelineLayout::new("double").with_group(0, "values", storage_layout)?,
    )?;
    let double = gpu.create_compute_pipeline(ComputePipelineDescriptor::new(
        "double",
        compute_layout,
        DOUBLE_SHADER,
    ))?;

    let initial: Vec<f32> = (0..VALUE_COUNT).map(|i| i as f32).collect();
    let values = gpu.create_buffer(
        BufferDescriptor::new("values", values_layout)
            .with_element_count(VALUE_COUNT)
            .with_pod_contents(&initial),
    )?;
    let values_group = gpu.create_bind_group(BindGroupDescriptor::new("values", storage_layout))?;
    gpu.bind(values_group, "values", values)?;

    let simulate = gpu.create_compute_pass("double");
    gpu.add_compute_step(
        simulate,
        ComputeStep::new(double, [VALUE_COUNT.div_ceil(64), 1, 1]).bind("values", values_group),
    )?;

    // --- Frames ---

    let frame = Execution::new("frame").then(simulate).then(pass);
    for i in 0..3 {
        let angle = i as f32 * 0.5;
        let view = Mat4::from_rotation_z(angle) * Mat4::from_scale(glam::Vec3::splat(0.8));
        gpu.write_pod(camera, 0, &view.to_cols_array())?;
        gpu.submit(&frame)?;
        log::info!("Submitted frame {}", gpu.frame());
    }

    let bytes = pollster::block_on(gpu.read_buffer(values, 0, 16))?;
    let head: Vec<f32> = bytemuck::pod_collect_to_vec(&bytes);
    log::info!("First values after three doublings: {head:?}");
    log::info!("Generations of the pass bundle: {}", gpu.generations(pass)?);

    gpu.teardown();
    Ok(())
}
