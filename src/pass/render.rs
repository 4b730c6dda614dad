use smallvec::SmallVec;

use super::StepList;
use super::tracker::TrackedPass;
use crate::device::{
    AttachmentLoad, GpuDevice, RawBindGroupId, RawBufferId, RawRenderBundleId, RawRenderPipelineId,
    RenderBundleDesc, RenderBundleRecorder, RenderCommands,
};
use crate::errors::Result;
use crate::handles::{BindGroupId, BufferId, RenderPipelineId, TextureId};
use crate::native::NativeOps;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColorTarget {
    pub texture: TextureId,
    pub load: AttachmentLoad<wgpu::Color>,
    pub store: bool,
}

impl ColorTarget {
    /// Clears to `color` and stores the result.
    pub fn clear(texture: TextureId, color: wgpu::Color) -> Self {
        Self {
            texture,
            load: AttachmentLoad::Clear(color),
            store: true,
        }
    }

    pub fn load(texture: TextureId) -> Self {
        Self {
            texture,
            load: AttachmentLoad::Load,
            store: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DepthTarget {
    pub texture: TextureId,
    pub load: AttachmentLoad<f32>,
    pub store: bool,
}

impl DepthTarget {
    pub fn clear(texture: TextureId, depth: f32) -> Self {
        Self {
            texture,
            load: AttachmentLoad::Clear(depth),
            store: true,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct RenderPassDescriptor {
    pub label: String,
    pub color_targets: Vec<ColorTarget>,
    pub depth_target: Option<DepthTarget>,
    /// Overrides `GpuSettings::bundle_mode_default`.
    pub bundle_mode: Option<bool>,
}

impl RenderPassDescriptor {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            ..Default::default()
        }
    }

    #[must_use]
    pub fn with_color_target(mut self, target: ColorTarget) -> Self {
        self.color_targets.push(target);
        self
    }

    #[must_use]
    pub fn with_depth_target(mut self, target: DepthTarget) -> Self {
        self.depth_target = Some(target);
        self
    }

    #[must_use]
    pub fn with_bundle_mode(mut self, enabled: bool) -> Self {
        self.bundle_mode = Some(enabled);
        self
    }
}

/// One draw as supplied by the caller.
///
/// Bind groups are matched to the pipeline layout by name. The draw count
/// defaults to the index buffer's capacity, or else the first vertex
/// buffer's.
#[derive(Debug, Clone)]
pub struct RenderStep {
    pub pipeline: RenderPipelineId,
    pub bind_groups: Vec<(String, BindGroupId)>,
    pub vertex_buffers: Vec<BufferId>,
    pub index_buffer: Option<BufferId>,
    pub count: Option<u32>,
    pub instances: u32,
}

impl RenderStep {
    pub fn new(pipeline: RenderPipelineId) -> Self {
        Self {
            pipeline,
            bind_groups: Vec::new(),
            vertex_buffers: Vec::new(),
            index_buffer: None,
            count: None,
            instances: 1,
        }
    }

    #[must_use]
    pub fn bind(mut self, name: impl Into<String>, group: BindGroupId) -> Self {
        self.bind_groups.push((name.into(), group));
        self
    }

    #[must_use]
    pub fn vertex_buffer(mut self, buffer: BufferId) -> Self {
        self.vertex_buffers.push(buffer);
        self
    }

    #[must_use]
    pub fn index_buffer(mut self, buffer: BufferId) -> Self {
        self.index_buffer = Some(buffer);
        self
    }

    #[must_use]
    pub fn count(mut self, count: u32) -> Self {
        self.count = Some(count);
        self
    }

    #[must_use]
    pub fn instances(mut self, instances: u32) -> Self {
        self.instances = instances;
        self
    }
}

/// A validated step: bind groups sit at their group index.
#[derive(Debug, Clone)]
pub(crate) struct RenderInstruction {
    pub pipeline: RenderPipelineId,
    pub bind_groups: SmallVec<[BindGroupId; 4]>,
    pub vertex_buffers: SmallVec<[BufferId; 4]>,
    pub index: Option<(BufferId, wgpu::IndexFormat)>,
    pub count: Option<u32>,
    pub instances: u32,
}

impl RenderInstruction {
    /// Vertex buffers followed by the index buffer.
    pub fn buffers(&self) -> impl Iterator<Item = BufferId> + '_ {
        self.vertex_buffers
            .iter()
            .copied()
            .chain(self.index.map(|(buffer, _)| buffer))
    }
}

#[derive(Debug)]
pub struct RenderPass {
    label: String,
    color_targets: Vec<ColorTarget>,
    depth_target: Option<DepthTarget>,
    bundle_mode: bool,
    pub(crate) steps: StepList<RenderInstruction>,
}

impl RenderPass {
    pub(crate) fn new(desc: RenderPassDescriptor, bundle_mode: bool) -> Self {
        Self {
            label: desc.label,
            color_targets: desc.color_targets,
            depth_target: desc.depth_target,
            bundle_mode,
            steps: StepList::default(),
        }
    }

    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }

    #[must_use]
    pub fn color_targets(&self) -> &[ColorTarget] {
        &self.color_targets
    }

    #[must_use]
    pub fn depth_target(&self) -> Option<&DepthTarget> {
        self.depth_target.as_ref()
    }

    #[must_use]
    pub fn bundle_mode(&self) -> bool {
        self.bundle_mode
    }

    pub(crate) fn set_bundle_mode(&mut self, enabled: bool) -> bool {
        std::mem::replace(&mut self.bundle_mode, enabled) != enabled
    }

    #[must_use]
    pub fn step_count(&self) -> usize {
        self.steps.len()
    }

    pub(crate) fn targets(&self) -> impl Iterator<Item = TextureId> + '_ {
        self.color_targets
            .iter()
            .map(|t| t.texture)
            .chain(self.depth_target.map(|t| t.texture))
    }
}

// ============================================================================
// Compiled Form
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum DrawCall {
    Draw { vertices: u32, instances: u32 },
    Indexed { indices: u32, instances: u32 },
}

/// An instruction resolved to raw device ids.
#[derive(Debug, Clone)]
pub(crate) struct CompiledDraw {
    pub pipeline: RawRenderPipelineId,
    pub bind_groups: SmallVec<[RawBindGroupId; 4]>,
    pub vertex_buffers: SmallVec<[RawBufferId; 4]>,
    pub index: Option<(RawBufferId, wgpu::IndexFormat)>,
    pub call: DrawCall,
}

/// Emits `draws` in order, skipping state that is already bound.
pub(crate) fn encode_draws<S: RenderCommands>(pass: &mut S, draws: &[CompiledDraw]) {
    let mut tracked: TrackedPass<'_, S, RawRenderPipelineId> = TrackedPass::new(pass);
    for draw in draws {
        tracked.set_pipeline(draw.pipeline, draw.bind_groups.len());
        for (index, group) in (0u32..).zip(&draw.bind_groups) {
            tracked.set_bind_group(index, *group);
        }
        for (slot, buffer) in (0u32..).zip(&draw.vertex_buffers) {
            tracked.set_vertex_buffer(slot, *buffer);
        }
        match draw.call {
            DrawCall::Indexed { indices, instances } => {
                if let Some((buffer, format)) = draw.index {
                    tracked.set_index_buffer(buffer, format);
                }
                tracked.draw_indexed(0..indices, 0..instances);
            }
            DrawCall::Draw { vertices, instances } => {
                tracked.draw(0..vertices, 0..instances);
            }
        }
    }
}

/// Records a render pass's draws into a replayable bundle.
pub(crate) struct BundleOps<'a, D> {
    pub device: &'a mut D,
    pub draws: &'a [CompiledDraw],
    pub color_formats: &'a [wgpu::TextureFormat],
    pub depth_format: Option<wgpu::TextureFormat>,
    pub sample_count: u32,
    pub label: &'a str,
}

impl<D: GpuDevice> NativeOps<RawRenderBundleId> for BundleOps<'_, D> {
    fn generate(&mut self) -> Result<Option<RawRenderBundleId>> {
        let mut encoder = self.device.create_render_bundle_encoder(&RenderBundleDesc {
            label: Some(self.label),
            color_formats: self.color_formats,
            depth_format: self.depth_format,
            sample_count: self.sample_count,
        })?;
        encode_draws(&mut encoder, self.draws);
        let bundle = encoder.finish()?;
        log::debug!("Recorded bundle '{}' ({} draws)", self.label, self.draws.len());
        Ok(Some(bundle))
    }

    fn destroy(&mut self, handle: RawRenderBundleId) {
        self.device.destroy_render_bundle(handle);
    }
}
