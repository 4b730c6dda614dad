//! Render and compute pipelines.
//!
//! A pipeline references a [`PipelineLayout`](crate::binding::PipelineLayout)
//! by id and caches its native handle like any other object. Pipelines are
//! invalidated with [`Invalidation::PIPELINE`](crate::native::Invalidation)
//! whenever their pipeline layout changes.

use crate::device::{
    DepthState, GpuDevice, OwnedVertexBufferDesc, RawComputePipelineDesc, RawComputePipelineId,
    RawPipelineLayoutId, RawRenderPipelineDesc, RawRenderPipelineId,
};
use crate::errors::{Error, Result};
use crate::handles::PipelineLayoutId;
use crate::layout::MemoryLayout;
use crate::native::NativeOps;

// ============================================================================
// Render Pipeline
// ============================================================================

#[derive(Debug, Clone)]
pub struct RenderPipelineDescriptor {
    pub label: String,
    pub layout: PipelineLayoutId,
    /// WGSL source; compilation is the device's concern.
    pub shader: String,
    pub vertex_entry: String,
    pub fragment_entry: Option<String>,
    /// One `MemoryLayout::Vertex` per vertex buffer slot.
    pub vertex_layouts: Vec<MemoryLayout>,
    pub topology: wgpu::PrimitiveTopology,
    pub cull_mode: Option<wgpu::Face>,
    pub color_targets: Vec<wgpu::TextureFormat>,
    pub depth: Option<DepthState>,
    pub sample_count: u32,
}

impl RenderPipelineDescriptor {
    pub fn new(label: impl Into<String>, layout: PipelineLayoutId, shader: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            layout,
            shader: shader.into(),
            vertex_entry: "vs_main".to_string(),
            fragment_entry: Some("fs_main".to_string()),
            vertex_layouts: Vec::new(),
            topology: wgpu::PrimitiveTopology::TriangleList,
            cull_mode: Some(wgpu::Face::Back),
            color_targets: Vec::new(),
            depth: None,
            sample_count: 1,
        }
    }

    #[must_use]
    pub fn with_entry_points(mut self, vertex: impl Into<String>, fragment: Option<String>) -> Self {
        self.vertex_entry = vertex.into();
        self.fragment_entry = fragment;
        self
    }

    #[must_use]
    pub fn with_vertex_layout(mut self, layout: MemoryLayout) -> Self {
        self.vertex_layouts.push(layout);
        self
    }

    #[must_use]
    pub fn with_topology(mut self, topology: wgpu::PrimitiveTopology) -> Self {
        self.topology = topology;
        self
    }

    #[must_use]
    pub fn with_cull_mode(mut self, cull_mode: Option<wgpu::Face>) -> Self {
        self.cull_mode = cull_mode;
        self
    }

    #[must_use]
    pub fn with_color_target(mut self, format: wgpu::TextureFormat) -> Self {
        self.color_targets.push(format);
        self
    }

    #[must_use]
    pub fn with_depth(mut self, depth: DepthState) -> Self {
        self.depth = Some(depth);
        self
    }

    #[must_use]
    pub fn with_sample_count(mut self, count: u32) -> Self {
        self.sample_count = count;
        self
    }
}

#[derive(Debug, Clone)]
pub struct RenderPipeline {
    desc: RenderPipelineDescriptor,
    buffers: Vec<OwnedVertexBufferDesc>,
}

impl RenderPipeline {
    /// Validates the vertex layouts and lowers them with consecutive shader
    /// locations across buffer slots.
    pub(crate) fn new(desc: RenderPipelineDescriptor) -> Result<Self> {
        let mut next_location = 0;
        let mut buffers = Vec::with_capacity(desc.vertex_layouts.len());
        for (slot, layout) in desc.vertex_layouts.iter().enumerate() {
            let MemoryLayout::Vertex(vertex) = layout else {
                return Err(Error::LayoutMismatch(format!(
                    "vertex buffer {slot} of '{}' is a {:?} layout",
                    desc.label,
                    layout.kind()
                )));
            };
            let lowered = vertex.to_buffer_desc(next_location);
            next_location += lowered.attributes.len() as u32;
            buffers.push(lowered);
        }
        Ok(Self { desc, buffers })
    }

    #[must_use]
    pub fn label(&self) -> &str {
        &self.desc.label
    }

    #[must_use]
    pub fn layout(&self) -> PipelineLayoutId {
        self.desc.layout
    }

    #[must_use]
    pub fn vertex_layouts(&self) -> &[MemoryLayout] {
        &self.desc.vertex_layouts
    }

    #[must_use]
    pub fn vertex_buffers(&self) -> &[OwnedVertexBufferDesc] {
        &self.buffers
    }

    #[must_use]
    pub fn descriptor(&self) -> &RenderPipelineDescriptor {
        &self.desc
    }
}

pub(crate) struct RenderPipelineOps<'a, D> {
    pub device: &'a mut D,
    pub pipeline: &'a RenderPipeline,
    pub layout: RawPipelineLayoutId,
    pub label: &'a str,
}

impl<D: GpuDevice> NativeOps<RawRenderPipelineId> for RenderPipelineOps<'_, D> {
    fn generate(&mut self) -> Result<Option<RawRenderPipelineId>> {
        let desc = &self.pipeline.desc;
        let id = self.device.create_render_pipeline(&RawRenderPipelineDesc {
            label: Some(self.label),
            layout: self.layout,
            shader: &desc.shader,
            vertex_entry: &desc.vertex_entry,
            fragment_entry: desc.fragment_entry.as_deref(),
            vertex_buffers: &self.pipeline.buffers,
            primitive: wgpu::PrimitiveState {
                topology: desc.topology,
                cull_mode: desc.cull_mode,
                ..Default::default()
            },
            color_targets: &desc.color_targets,
            depth: desc.depth,
            sample_count: desc.sample_count,
        })?;
        Ok(Some(id))
    }

    fn destroy(&mut self, handle: RawRenderPipelineId) {
        self.device.destroy_render_pipeline(handle);
    }
}

// ============================================================================
// Compute Pipeline
// ============================================================================

#[derive(Debug, Clone)]
pub struct ComputePipelineDescriptor {
    pub label: String,
    pub layout: PipelineLayoutId,
    pub shader: String,
    pub entry_point: String,
}

impl ComputePipelineDescriptor {
    pub fn new(label: impl Into<String>, layout: PipelineLayoutId, shader: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            layout,
            shader: shader.into(),
            entry_point: "main".to_string(),
        }
    }

    #[must_use]
    pub fn with_entry_point(mut self, entry_point: impl Into<String>) -> Self {
        self.entry_point = entry_point.into();
        self
    }
}

#[derive(Debug, Clone)]
pub struct ComputePipeline {
    desc: ComputePipelineDescriptor,
}

impl ComputePipeline {
    pub(crate) fn new(desc: ComputePipelineDescriptor) -> Self {
        Self { desc }
    }

    #[must_use]
    pub fn label(&self) -> &str {
        &self.desc.label
    }

    #[must_use]
    pub fn layout(&self) -> PipelineLayoutId {
        self.desc.layout
    }
}

pub(crate) struct ComputePipelineOps<'a, D> {
    pub device: &'a mut D,
    pub pipeline: &'a ComputePipeline,
    pub layout: RawPipelineLayoutId,
    pub label: &'a str,
}

impl<D: GpuDevice> NativeOps<RawComputePipelineId> for ComputePipelineOps<'_, D> {
    fn generate(&mut self) -> Result<Option<RawComputePipelineId>> {
        let desc = &self.pipeline.desc;
        let id = self.device.create_compute_pipeline(&RawComputePipelineDesc {
            label: Some(self.label),
            layout: self.layout,
            shader: &desc.shader,
            entry_point: &desc.entry_point,
        })?;
        Ok(Some(id))
    }

    fn destroy(&mut self, handle: RawComputePipelineId) {
        self.device.destroy_compute_pipeline(handle);
    }
}
