//! GPU resource layer of the Myth engine.
//!
//! Logical GPU objects (buffers, textures, samplers, bind groups, pipelines
//! and passes) live in a [`Gpu`] context. Each one lazily owns its native
//! device object and re-creates it only when an invalidation reason says so.
//! Dependents are wired with listener edges, so resizing a buffer rebuilds
//! the bind groups and pass bundles that use it and nothing else.
//!
//! ```rust,ignore
//! use myth_gpu::{BufferDescriptor, Gpu, GpuSettings, MemoryLayout, RecordingDevice};
//!
//! let mut gpu = Gpu::new(RecordingDevice::new(), GpuSettings::default());
//! let layout = MemoryLayout::open_array(MemoryLayout::vec4f())?;
//! let particles = gpu.create_buffer(BufferDescriptor::new("particles", layout).with_element_count(64))?;
//! gpu.write_at(particles, "[3]", bytemuck::cast_slice(&[1.0f32, 0.0, 0.0, 1.0]))?;
//! ```

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::too_many_arguments)]

pub mod binding;
pub mod context;
pub mod device;
pub mod errors;
pub mod handles;
pub mod layout;
pub mod native;
pub mod pass;
pub mod pipeline;
pub mod resources;
pub mod settings;

pub use binding::{
    BindGroup, BindGroupDescriptor, BindGroupLayout, BindingLayout, BindingSlot, PipelineLayout,
    SamplerBindingLayout, StorageAccess, TextureBindingLayout,
};
pub use context::Gpu;
pub use device::{GpuDevice, RecordingDevice};
#[cfg(feature = "wgpu-backend")]
pub use device::WgpuDevice;
pub use errors::{Error, Result};
pub use handles::{
    BindGroupId, BindGroupLayoutId, BufferId, ComputePassId, ComputePipelineId, PipelineLayoutId,
    RenderPassId, RenderPipelineId, SamplerId, StepId, TextureId,
};
pub use layout::{MemoryLayout, Multiplier, ScalarFormat, VertexLayout};
pub use native::{Invalidation, Lifetime, NativeCache, ResourceKey};
pub use pass::{
    ColorTarget, ComputePass, ComputeStep, DepthTarget, Execution, PassRef, RenderPass,
    RenderPassDescriptor, RenderStep,
};
pub use pipeline::{
    ComputePipeline, ComputePipelineDescriptor, RenderPipeline, RenderPipelineDescriptor,
};
pub use resources::{
    BindingResource, Buffer, BufferDescriptor, Sampler, SamplerDescriptor, Texture,
    TextureDescriptor,
};
pub use settings::GpuSettings;
