//! Device Boundary
//!
//! Everything the resource layer needs from a graphics device goes through
//! the [`GpuDevice`] trait. Native objects never cross the boundary as real
//! handles: the device issues raw slot-map ids and keeps the objects itself.
//!
//! Two implementations ship with the crate:
//!
//! - [`RecordingDevice`]: a deterministic CPU backend that records every call.
//!   Buffers hold real bytes, so writes and reads round-trip.
//! - `WgpuDevice` (feature `wgpu-backend`): forwards to `wgpu::Device` and
//!   `wgpu::Queue`.
//!
//! Descriptors reuse `wgpu` data types wherever they are plain data
//! (`BufferUsages`, `TextureFormat`, `BindGroupLayoutEntry`, ...).

pub mod recording;
pub mod task;
#[cfg(feature = "wgpu-backend")]
pub mod wgpu_device;

use std::num::NonZeroU64;
use std::ops::Range;

use slotmap::new_key_type;
use thiserror::Error;

pub use recording::{DeviceCall, RecordingDevice};
pub use task::{GpuTask, TaskCompleter};
#[cfg(feature = "wgpu-backend")]
pub use wgpu_device::WgpuDevice;

new_key_type! {
    pub struct RawBufferId;
    pub struct RawTextureId;
    pub struct RawTextureViewId;
    pub struct RawSamplerId;
    pub struct RawBindGroupLayoutId;
    pub struct RawBindGroupId;
    pub struct RawPipelineLayoutId;
    pub struct RawRenderPipelineId;
    pub struct RawComputePipelineId;
    pub struct RawEncoderId;
    pub struct RawRenderBundleId;
}

// ============================================================================
// Errors
// ============================================================================

/// Errors reported by a device backend.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DeviceError {
    /// A raw id does not name a live native object.
    #[error("invalid {kind} id")]
    InvalidResource {
        /// Object kind, e.g. `"buffer"`
        kind: &'static str,
    },

    /// The object exists but is in the wrong state for the call.
    #[error("invalid state: {0}")]
    InvalidState(String),

    /// An offset/length pair runs past the end of the object.
    #[error("out of bounds: {offset}+{len} exceeds {size}")]
    OutOfBounds {
        /// Byte offset
        offset: u64,
        /// Byte length
        len: u64,
        /// Object size in bytes
        size: u64,
    },

    /// The backend cannot perform the request.
    #[error("unsupported: {0}")]
    Unsupported(String),

    /// Backend-internal failure.
    #[error("internal error: {0}")]
    Internal(String),
}

// ============================================================================
// Descriptors
// ============================================================================

#[derive(Debug, Clone)]
pub struct BufferDesc<'a> {
    pub label: Option<&'a str>,
    pub size: u64,
    pub usage: wgpu::BufferUsages,
    pub mapped_at_creation: bool,
}

#[derive(Debug, Clone)]
pub struct TextureDesc<'a> {
    pub label: Option<&'a str>,
    pub size: wgpu::Extent3d,
    pub mip_level_count: u32,
    pub sample_count: u32,
    pub dimension: wgpu::TextureDimension,
    pub format: wgpu::TextureFormat,
    pub usage: wgpu::TextureUsages,
}

#[derive(Debug, Clone)]
pub struct TextureViewDesc<'a> {
    pub label: Option<&'a str>,
    pub dimension: wgpu::TextureViewDimension,
}

/// Sampler state. Mipmap filtering and LOD clamps are left at device defaults.
#[derive(Debug, Clone)]
pub struct SamplerDesc<'a> {
    pub label: Option<&'a str>,
    pub address_mode: wgpu::AddressMode,
    pub mag_filter: wgpu::FilterMode,
    pub min_filter: wgpu::FilterMode,
    pub compare: Option<wgpu::CompareFunction>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RawBindingResource {
    Buffer {
        buffer: RawBufferId,
        offset: u64,
        size: Option<NonZeroU64>,
    },
    TextureView(RawTextureViewId),
    Sampler(RawSamplerId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawBindGroupEntry {
    pub binding: u32,
    pub resource: RawBindingResource,
}

/// Owned vertex buffer layout, lowered from a `MemoryLayout::Vertex`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct OwnedVertexBufferDesc {
    pub array_stride: u64,
    pub step_mode: wgpu::VertexStepMode,
    pub attributes: Vec<wgpu::VertexAttribute>,
}

impl OwnedVertexBufferDesc {
    #[must_use]
    pub fn as_wgpu(&self) -> wgpu::VertexBufferLayout<'_> {
        wgpu::VertexBufferLayout {
            array_stride: self.array_stride,
            step_mode: self.step_mode,
            attributes: &self.attributes,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DepthState {
    pub format: wgpu::TextureFormat,
    pub compare: wgpu::CompareFunction,
    pub write_enabled: bool,
}

#[derive(Debug, Clone)]
pub struct RawRenderPipelineDesc<'a> {
    pub label: Option<&'a str>,
    pub layout: RawPipelineLayoutId,
    pub shader: &'a str,
    pub vertex_entry: &'a str,
    pub fragment_entry: Option<&'a str>,
    pub vertex_buffers: &'a [OwnedVertexBufferDesc],
    pub primitive: wgpu::PrimitiveState,
    pub color_targets: &'a [wgpu::TextureFormat],
    pub depth: Option<DepthState>,
    pub sample_count: u32,
}

#[derive(Debug, Clone)]
pub struct RawComputePipelineDesc<'a> {
    pub label: Option<&'a str>,
    pub layout: RawPipelineLayoutId,
    pub shader: &'a str,
    pub entry_point: &'a str,
}

/// Load operation of a pass attachment.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AttachmentLoad<V> {
    Clear(V),
    Load,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RawColorAttachment {
    pub view: RawTextureViewId,
    pub load: AttachmentLoad<wgpu::Color>,
    pub store: bool,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RawDepthAttachment {
    pub view: RawTextureViewId,
    pub load: AttachmentLoad<f32>,
    pub store: bool,
}

#[derive(Debug, Clone)]
pub struct RawRenderPassDesc<'a> {
    pub label: Option<&'a str>,
    pub color_attachments: &'a [RawColorAttachment],
    pub depth_attachment: Option<RawDepthAttachment>,
}

#[derive(Debug, Clone)]
pub struct RenderBundleDesc<'a> {
    pub label: Option<&'a str>,
    pub color_formats: &'a [wgpu::TextureFormat],
    pub depth_format: Option<wgpu::TextureFormat>,
    pub sample_count: u32,
}

// ============================================================================
// Command Recorders
// ============================================================================

/// Bind-group state shared by render passes, bundles and compute passes.
pub trait BindingCommands {
    /// Binds `group` at `index`; `None` unbinds the index.
    fn set_bind_group(&mut self, index: u32, group: Option<RawBindGroupId>);
}

/// Draw-state commands accepted by render passes and bundle encoders.
pub trait RenderCommands: BindingCommands {
    fn set_pipeline(&mut self, pipeline: RawRenderPipelineId);
    fn set_vertex_buffer(&mut self, slot: u32, buffer: RawBufferId);
    fn set_index_buffer(&mut self, buffer: RawBufferId, format: wgpu::IndexFormat);
    fn draw(&mut self, vertices: Range<u32>, instances: Range<u32>);
    fn draw_indexed(&mut self, indices: Range<u32>, base_vertex: i32, instances: Range<u32>);
}

pub trait RenderPassRecorder: RenderCommands {
    fn execute_bundles(&mut self, bundles: &[RawRenderBundleId]);

    /// Ends the pass. Recording continues on the parent encoder.
    fn end(self)
    where
        Self: Sized;
}

pub trait RenderBundleRecorder: RenderCommands {
    fn finish(self) -> Result<RawRenderBundleId, DeviceError>
    where
        Self: Sized;
}

pub trait ComputeCommands: BindingCommands {
    fn set_pipeline(&mut self, pipeline: RawComputePipelineId);
    fn dispatch_workgroups(&mut self, x: u32, y: u32, z: u32);

    fn end(self)
    where
        Self: Sized;
}

// ============================================================================
// GpuDevice
// ============================================================================

/// The device capability consumed by the resource layer.
///
/// All calls are made from a single logical thread through `&mut self`.
/// Buffer maps are the only asynchronous operations: [`map_buffer`] returns a
/// [`GpuTask`] that completes once the device has been [`poll`]ed far enough.
///
/// [`map_buffer`]: GpuDevice::map_buffer
/// [`poll`]: GpuDevice::poll
pub trait GpuDevice {
    type RenderPass<'a>: RenderPassRecorder
    where
        Self: 'a;
    type ComputePass<'a>: ComputeCommands
    where
        Self: 'a;
    type BundleEncoder<'a>: RenderBundleRecorder
    where
        Self: 'a;

    // --- Buffers ---

    fn create_buffer(&mut self, desc: &BufferDesc<'_>) -> Result<RawBufferId, DeviceError>;
    fn destroy_buffer(&mut self, buffer: RawBufferId);
    /// Queue write; lands before the next submission.
    fn write_buffer(
        &mut self,
        buffer: RawBufferId,
        offset: u64,
        data: &[u8],
    ) -> Result<(), DeviceError>;
    /// Writes into a buffer that is currently mapped for writing.
    fn write_mapped(
        &mut self,
        buffer: RawBufferId,
        offset: u64,
        data: &[u8],
    ) -> Result<(), DeviceError>;
    /// Copies bytes out of a buffer that is currently mapped for reading.
    fn read_mapped(
        &mut self,
        buffer: RawBufferId,
        offset: u64,
        len: u64,
    ) -> Result<Vec<u8>, DeviceError>;
    fn unmap_buffer(&mut self, buffer: RawBufferId) -> Result<(), DeviceError>;
    fn map_buffer(&mut self, buffer: RawBufferId, mode: wgpu::MapMode) -> GpuTask<()>;

    // --- Textures & samplers ---

    fn create_texture(&mut self, desc: &TextureDesc<'_>) -> Result<RawTextureId, DeviceError>;
    fn create_texture_view(
        &mut self,
        texture: RawTextureId,
        desc: &TextureViewDesc<'_>,
    ) -> Result<RawTextureViewId, DeviceError>;
    /// Destroys the texture together with every view created from it.
    fn destroy_texture(&mut self, texture: RawTextureId);
    fn write_texture(
        &mut self,
        texture: RawTextureId,
        data: &[u8],
        bytes_per_row: u32,
        size: wgpu::Extent3d,
    ) -> Result<(), DeviceError>;
    fn create_sampler(&mut self, desc: &SamplerDesc<'_>) -> Result<RawSamplerId, DeviceError>;
    fn destroy_sampler(&mut self, sampler: RawSamplerId);

    // --- Bindings ---

    fn create_bind_group_layout(
        &mut self,
        label: Option<&str>,
        entries: &[wgpu::BindGroupLayoutEntry],
    ) -> Result<RawBindGroupLayoutId, DeviceError>;
    fn destroy_bind_group_layout(&mut self, layout: RawBindGroupLayoutId);
    fn create_bind_group(
        &mut self,
        label: Option<&str>,
        layout: RawBindGroupLayoutId,
        entries: &[RawBindGroupEntry],
    ) -> Result<RawBindGroupId, DeviceError>;
    fn destroy_bind_group(&mut self, group: RawBindGroupId);
    fn create_pipeline_layout(
        &mut self,
        label: Option<&str>,
        groups: &[RawBindGroupLayoutId],
    ) -> Result<RawPipelineLayoutId, DeviceError>;
    fn destroy_pipeline_layout(&mut self, layout: RawPipelineLayoutId);

    // --- Pipelines ---

    fn create_render_pipeline(
        &mut self,
        desc: &RawRenderPipelineDesc<'_>,
    ) -> Result<RawRenderPipelineId, DeviceError>;
    fn destroy_render_pipeline(&mut self, pipeline: RawRenderPipelineId);
    fn create_compute_pipeline(
        &mut self,
        desc: &RawComputePipelineDesc<'_>,
    ) -> Result<RawComputePipelineId, DeviceError>;
    fn destroy_compute_pipeline(&mut self, pipeline: RawComputePipelineId);

    // --- Command recording ---

    fn create_command_encoder(&mut self, label: Option<&str>) -> Result<RawEncoderId, DeviceError>;
    fn copy_buffer_to_buffer(
        &mut self,
        encoder: RawEncoderId,
        source: RawBufferId,
        source_offset: u64,
        destination: RawBufferId,
        destination_offset: u64,
        size: u64,
    ) -> Result<(), DeviceError>;
    fn begin_render_pass(
        &mut self,
        encoder: RawEncoderId,
        desc: &RawRenderPassDesc<'_>,
    ) -> Result<Self::RenderPass<'_>, DeviceError>;
    fn begin_compute_pass(
        &mut self,
        encoder: RawEncoderId,
        label: Option<&str>,
    ) -> Result<Self::ComputePass<'_>, DeviceError>;
    fn create_render_bundle_encoder(
        &mut self,
        desc: &RenderBundleDesc<'_>,
    ) -> Result<Self::BundleEncoder<'_>, DeviceError>;
    fn destroy_render_bundle(&mut self, bundle: RawRenderBundleId);

    /// Finishes the encoder and submits it to the queue.
    fn submit(&mut self, encoder: RawEncoderId) -> Result<(), DeviceError>;

    /// Drives pending map callbacks. `wait` blocks until the queue is idle.
    fn poll(&mut self, wait: bool);
}
