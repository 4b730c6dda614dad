//! Deterministic Recording Device
//!
//! [`RecordingDevice`] is a CPU-only [`GpuDevice`] that appends every call to
//! a log of [`DeviceCall`]s. It exists so the resource layer can be exercised
//! without a GPU:
//!
//! - Buffers hold real bytes. Queue writes land immediately, buffer copies
//!   land when their encoder is submitted, and mapped ranges can be read and
//!   written, so uploads and downloads round-trip.
//! - Map requests stay pending until the next [`poll`](GpuDevice::poll).
//!   A buffer destroyed while its map is pending fails that map; every map can
//!   also be rejected on demand through [`RecordingDevice::set_reject_maps`].
//! - Render bundles keep the commands they were recorded with.
//!
//! Validation mirrors what a real backend rejects: unknown ids, copies
//! touching mapped buffers, writes to buffers that are not mapped.

use std::ops::Range;

use slotmap::SlotMap;

use super::{
    BindingCommands, BufferDesc, ComputeCommands, DeviceError, GpuDevice, GpuTask,
    RawBindGroupEntry, RawBindGroupId, RawBindGroupLayoutId, RawBufferId, RawComputePipelineDesc,
    RawComputePipelineId, RawEncoderId, RawPipelineLayoutId, RawRenderBundleId,
    RawRenderPassDesc, RawRenderPipelineDesc, RawRenderPipelineId, RawSamplerId, RawTextureId,
    RawTextureViewId, RenderBundleDesc, RenderBundleRecorder, RenderCommands,
    RenderPassRecorder, SamplerDesc, TaskCompleter, TextureDesc, TextureViewDesc,
};

/// One entry of the device call log.
#[derive(Debug, Clone, PartialEq)]
pub enum DeviceCall {
    CreateBuffer {
        buffer: RawBufferId,
        size: u64,
        usage: wgpu::BufferUsages,
        mapped_at_creation: bool,
    },
    DestroyBuffer(RawBufferId),
    WriteBuffer {
        buffer: RawBufferId,
        offset: u64,
        len: u64,
    },
    WriteMapped {
        buffer: RawBufferId,
        offset: u64,
        len: u64,
    },
    ReadMapped {
        buffer: RawBufferId,
        offset: u64,
        len: u64,
    },
    Unmap(RawBufferId),
    MapBuffer {
        buffer: RawBufferId,
        mode: wgpu::MapMode,
    },
    CreateTexture {
        texture: RawTextureId,
        format: wgpu::TextureFormat,
        size: wgpu::Extent3d,
    },
    CreateTextureView {
        texture: RawTextureId,
        view: RawTextureViewId,
    },
    DestroyTexture(RawTextureId),
    WriteTexture {
        texture: RawTextureId,
        len: u64,
    },
    CreateSampler(RawSamplerId),
    DestroySampler(RawSamplerId),
    CreateBindGroupLayout {
        layout: RawBindGroupLayoutId,
        entries: Vec<wgpu::BindGroupLayoutEntry>,
    },
    DestroyBindGroupLayout(RawBindGroupLayoutId),
    CreateBindGroup {
        group: RawBindGroupId,
        layout: RawBindGroupLayoutId,
        entries: Vec<RawBindGroupEntry>,
    },
    DestroyBindGroup(RawBindGroupId),
    CreatePipelineLayout {
        layout: RawPipelineLayoutId,
        groups: Vec<RawBindGroupLayoutId>,
    },
    DestroyPipelineLayout(RawPipelineLayoutId),
    CreateRenderPipeline(RawRenderPipelineId),
    DestroyRenderPipeline(RawRenderPipelineId),
    CreateComputePipeline(RawComputePipelineId),
    DestroyComputePipeline(RawComputePipelineId),
    CreateCommandEncoder(RawEncoderId),
    CopyBufferToBuffer {
        source: RawBufferId,
        destination: RawBufferId,
        size: u64,
    },
    BeginRenderPass {
        encoder: RawEncoderId,
        color_attachments: usize,
        has_depth: bool,
    },
    BeginComputePass(RawEncoderId),
    EndPass,
    CreateRenderBundleEncoder,
    FinishRenderBundle(RawRenderBundleId),
    DestroyRenderBundle(RawRenderBundleId),
    ExecuteBundles(Vec<RawRenderBundleId>),
    SetRenderPipeline(RawRenderPipelineId),
    SetComputePipeline(RawComputePipelineId),
    SetBindGroup {
        index: u32,
        group: Option<RawBindGroupId>,
    },
    SetVertexBuffer {
        slot: u32,
        buffer: RawBufferId,
    },
    SetIndexBuffer {
        buffer: RawBufferId,
        format: wgpu::IndexFormat,
    },
    Draw {
        vertices: Range<u32>,
        instances: Range<u32>,
    },
    DrawIndexed {
        indices: Range<u32>,
        base_vertex: i32,
        instances: Range<u32>,
    },
    Dispatch {
        x: u32,
        y: u32,
        z: u32,
    },
    Submit(RawEncoderId),
    Poll {
        wait: bool,
    },
}

impl DeviceCall {
    /// Whether this call changes draw or dispatch state inside a pass.
    #[must_use]
    pub fn is_state_change(&self) -> bool {
        matches!(
            self,
            Self::SetRenderPipeline(_)
                | Self::SetComputePipeline(_)
                | Self::SetBindGroup { .. }
                | Self::SetVertexBuffer { .. }
                | Self::SetIndexBuffer { .. }
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MapState {
    Unmapped,
    Pending(wgpu::MapMode),
    Mapped(wgpu::MapMode),
}

#[derive(Debug)]
struct SoftBuffer {
    usage: wgpu::BufferUsages,
    data: Vec<u8>,
    map_state: MapState,
}

#[derive(Debug)]
struct SoftTexture {
    desc_format: wgpu::TextureFormat,
    usage: wgpu::TextureUsages,
    data: Vec<u8>,
}

#[derive(Debug)]
enum EncodedOp {
    Copy {
        source: RawBufferId,
        source_offset: u64,
        destination: RawBufferId,
        destination_offset: u64,
        size: u64,
    },
}

#[derive(Debug)]
struct PendingMap {
    buffer: RawBufferId,
    mode: wgpu::MapMode,
    completer: TaskCompleter<()>,
}

/// CPU-backed [`GpuDevice`] that records every call.
#[derive(Debug, Default)]
pub struct RecordingDevice {
    calls: Vec<DeviceCall>,
    buffers: SlotMap<RawBufferId, SoftBuffer>,
    textures: SlotMap<RawTextureId, SoftTexture>,
    views: SlotMap<RawTextureViewId, RawTextureId>,
    samplers: SlotMap<RawSamplerId, ()>,
    bind_group_layouts: SlotMap<RawBindGroupLayoutId, Vec<wgpu::BindGroupLayoutEntry>>,
    bind_groups: SlotMap<RawBindGroupId, RawBindGroupLayoutId>,
    pipeline_layouts: SlotMap<RawPipelineLayoutId, Vec<RawBindGroupLayoutId>>,
    render_pipelines: SlotMap<RawRenderPipelineId, RawPipelineLayoutId>,
    compute_pipelines: SlotMap<RawComputePipelineId, RawPipelineLayoutId>,
    encoders: SlotMap<RawEncoderId, Vec<EncodedOp>>,
    bundles: SlotMap<RawRenderBundleId, Vec<DeviceCall>>,
    pending_maps: Vec<PendingMap>,
    reject_maps: bool,
}

impl RecordingDevice {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    // --- Inspection ---

    #[must_use]
    pub fn calls(&self) -> &[DeviceCall] {
        &self.calls
    }

    /// Drains the call log.
    pub fn take_calls(&mut self) -> Vec<DeviceCall> {
        std::mem::take(&mut self.calls)
    }

    pub fn clear_calls(&mut self) {
        self.calls.clear();
    }

    #[must_use]
    pub fn count_calls(&self, predicate: impl Fn(&DeviceCall) -> bool) -> usize {
        self.calls.iter().filter(|call| predicate(call)).count()
    }

    #[must_use]
    pub fn buffer_data(&self, buffer: RawBufferId) -> Option<&[u8]> {
        self.buffers.get(buffer).map(|b| b.data.as_slice())
    }

    #[must_use]
    pub fn buffer_usage(&self, buffer: RawBufferId) -> Option<wgpu::BufferUsages> {
        self.buffers.get(buffer).map(|b| b.usage)
    }

    #[must_use]
    pub fn is_live_buffer(&self, buffer: RawBufferId) -> bool {
        self.buffers.contains_key(buffer)
    }

    #[must_use]
    pub fn live_buffer_count(&self) -> usize {
        self.buffers.len()
    }

    #[must_use]
    pub fn texture_data(&self, texture: RawTextureId) -> Option<&[u8]> {
        self.textures.get(texture).map(|t| t.data.as_slice())
    }

    #[must_use]
    pub fn texture_format(&self, texture: RawTextureId) -> Option<wgpu::TextureFormat> {
        self.textures.get(texture).map(|t| t.desc_format)
    }

    #[must_use]
    pub fn texture_usage(&self, texture: RawTextureId) -> Option<wgpu::TextureUsages> {
        self.textures.get(texture).map(|t| t.usage)
    }

    #[must_use]
    pub fn pending_map_count(&self) -> usize {
        self.pending_maps.len()
    }

    #[must_use]
    pub fn bundle_commands(&self, bundle: RawRenderBundleId) -> Option<&[DeviceCall]> {
        self.bundles.get(bundle).map(Vec::as_slice)
    }

    /// Makes every map resolved by subsequent polls fail.
    pub fn set_reject_maps(&mut self, reject: bool) {
        self.reject_maps = reject;
    }

    // --- Internal helpers ---

    fn buffer(&self, buffer: RawBufferId) -> Result<&SoftBuffer, DeviceError> {
        self.buffers
            .get(buffer)
            .ok_or(DeviceError::InvalidResource { kind: "buffer" })
    }

    fn buffer_mut(&mut self, buffer: RawBufferId) -> Result<&mut SoftBuffer, DeviceError> {
        self.buffers
            .get_mut(buffer)
            .ok_or(DeviceError::InvalidResource { kind: "buffer" })
    }

    fn view_exists(&self, view: RawTextureViewId) -> Result<(), DeviceError> {
        let texture = self
            .views
            .get(view)
            .ok_or(DeviceError::InvalidResource { kind: "texture view" })?;
        if self.textures.contains_key(*texture) {
            Ok(())
        } else {
            Err(DeviceError::InvalidResource { kind: "texture" })
        }
    }

    fn apply_copy(
        &mut self,
        source: RawBufferId,
        source_offset: u64,
        destination: RawBufferId,
        destination_offset: u64,
        size: u64,
    ) -> Result<(), DeviceError> {
        let src = self.buffer(source)?;
        if src.map_state != MapState::Unmapped {
            return Err(DeviceError::InvalidState(
                "copy source is mapped at submission".to_string(),
            ));
        }
        let bytes = src.data[range(source_offset, size)].to_vec();
        let dst = self.buffer_mut(destination)?;
        if dst.map_state != MapState::Unmapped {
            return Err(DeviceError::InvalidState(
                "copy destination is mapped at submission".to_string(),
            ));
        }
        dst.data[range(destination_offset, size)].copy_from_slice(&bytes);
        Ok(())
    }
}

fn range(offset: u64, len: u64) -> Range<usize> {
    offset as usize..(offset + len) as usize
}

fn check_range(offset: u64, len: u64, size: u64) -> Result<(), DeviceError> {
    if offset.checked_add(len).is_some_and(|end| end <= size) {
        Ok(())
    } else {
        Err(DeviceError::OutOfBounds { offset, len, size })
    }
}

impl GpuDevice for RecordingDevice {
    type RenderPass<'a> = RecordingRenderPass<'a>;
    type ComputePass<'a> = RecordingComputePass<'a>;
    type BundleEncoder<'a> = RecordingBundleEncoder<'a>;

    fn create_buffer(&mut self, desc: &BufferDesc<'_>) -> Result<RawBufferId, DeviceError> {
        if desc.mapped_at_creation && desc.size % wgpu::COPY_BUFFER_ALIGNMENT != 0 {
            return Err(DeviceError::InvalidState(format!(
                "mapped_at_creation requires a size multiple of {}",
                wgpu::COPY_BUFFER_ALIGNMENT
            )));
        }
        let map_state = if desc.mapped_at_creation {
            MapState::Mapped(wgpu::MapMode::Write)
        } else {
            MapState::Unmapped
        };
        let buffer = self.buffers.insert(SoftBuffer {
            usage: desc.usage,
            data: vec![0; desc.size as usize],
            map_state,
        });
        self.calls.push(DeviceCall::CreateBuffer {
            buffer,
            size: desc.size,
            usage: desc.usage,
            mapped_at_creation: desc.mapped_at_creation,
        });
        Ok(buffer)
    }

    fn destroy_buffer(&mut self, buffer: RawBufferId) {
        self.buffers.remove(buffer);
        self.calls.push(DeviceCall::DestroyBuffer(buffer));
    }

    fn write_buffer(
        &mut self,
        buffer: RawBufferId,
        offset: u64,
        data: &[u8],
    ) -> Result<(), DeviceError> {
        let len = data.len() as u64;
        let target = self.buffer_mut(buffer)?;
        check_range(offset, len, target.data.len() as u64)?;
        if target.map_state != MapState::Unmapped {
            return Err(DeviceError::InvalidState(
                "queue write into a mapped buffer".to_string(),
            ));
        }
        target.data[range(offset, len)].copy_from_slice(data);
        self.calls.push(DeviceCall::WriteBuffer { buffer, offset, len });
        Ok(())
    }

    fn write_mapped(
        &mut self,
        buffer: RawBufferId,
        offset: u64,
        data: &[u8],
    ) -> Result<(), DeviceError> {
        let len = data.len() as u64;
        let target = self.buffer_mut(buffer)?;
        if target.map_state != MapState::Mapped(wgpu::MapMode::Write) {
            return Err(DeviceError::InvalidState(
                "buffer is not mapped for writing".to_string(),
            ));
        }
        check_range(offset, len, target.data.len() as u64)?;
        target.data[range(offset, len)].copy_from_slice(data);
        self.calls.push(DeviceCall::WriteMapped { buffer, offset, len });
        Ok(())
    }

    fn read_mapped(
        &mut self,
        buffer: RawBufferId,
        offset: u64,
        len: u64,
    ) -> Result<Vec<u8>, DeviceError> {
        let source = self.buffer(buffer)?;
        if !matches!(source.map_state, MapState::Mapped(_)) {
            return Err(DeviceError::InvalidState("buffer is not mapped".to_string()));
        }
        check_range(offset, len, source.data.len() as u64)?;
        let bytes = source.data[range(offset, len)].to_vec();
        self.calls.push(DeviceCall::ReadMapped { buffer, offset, len });
        Ok(bytes)
    }

    fn unmap_buffer(&mut self, buffer: RawBufferId) -> Result<(), DeviceError> {
        let target = self.buffer_mut(buffer)?;
        if !matches!(target.map_state, MapState::Mapped(_)) {
            return Err(DeviceError::InvalidState("buffer is not mapped".to_string()));
        }
        target.map_state = MapState::Unmapped;
        self.calls.push(DeviceCall::Unmap(buffer));
        Ok(())
    }

    fn map_buffer(&mut self, buffer: RawBufferId, mode: wgpu::MapMode) -> GpuTask<()> {
        self.calls.push(DeviceCall::MapBuffer { buffer, mode });
        let target = match self.buffer_mut(buffer) {
            Ok(target) => target,
            Err(err) => return GpuTask::ready(Err(err)),
        };
        if target.map_state != MapState::Unmapped {
            return GpuTask::ready(Err(DeviceError::InvalidState(
                "buffer is already mapped or has a map pending".to_string(),
            )));
        }
        target.map_state = MapState::Pending(mode);
        let (completer, task) = GpuTask::pending();
        self.pending_maps.push(PendingMap {
            buffer,
            mode,
            completer,
        });
        task
    }

    fn create_texture(&mut self, desc: &TextureDesc<'_>) -> Result<RawTextureId, DeviceError> {
        let texture = self.textures.insert(SoftTexture {
            desc_format: desc.format,
            usage: desc.usage,
            data: Vec::new(),
        });
        self.calls.push(DeviceCall::CreateTexture {
            texture,
            format: desc.format,
            size: desc.size,
        });
        Ok(texture)
    }

    fn create_texture_view(
        &mut self,
        texture: RawTextureId,
        _desc: &TextureViewDesc<'_>,
    ) -> Result<RawTextureViewId, DeviceError> {
        if !self.textures.contains_key(texture) {
            return Err(DeviceError::InvalidResource { kind: "texture" });
        }
        let view = self.views.insert(texture);
        self.calls.push(DeviceCall::CreateTextureView { texture, view });
        Ok(view)
    }

    fn destroy_texture(&mut self, texture: RawTextureId) {
        self.textures.remove(texture);
        self.views.retain(|_, owner| *owner != texture);
        self.calls.push(DeviceCall::DestroyTexture(texture));
    }

    fn write_texture(
        &mut self,
        texture: RawTextureId,
        data: &[u8],
        _bytes_per_row: u32,
        _size: wgpu::Extent3d,
    ) -> Result<(), DeviceError> {
        let target = self
            .textures
            .get_mut(texture)
            .ok_or(DeviceError::InvalidResource { kind: "texture" })?;
        target.data = data.to_vec();
        self.calls.push(DeviceCall::WriteTexture {
            texture,
            len: data.len() as u64,
        });
        Ok(())
    }

    fn create_sampler(&mut self, _desc: &SamplerDesc<'_>) -> Result<RawSamplerId, DeviceError> {
        let sampler = self.samplers.insert(());
        self.calls.push(DeviceCall::CreateSampler(sampler));
        Ok(sampler)
    }

    fn destroy_sampler(&mut self, sampler: RawSamplerId) {
        self.samplers.remove(sampler);
        self.calls.push(DeviceCall::DestroySampler(sampler));
    }

    fn create_bind_group_layout(
        &mut self,
        _label: Option<&str>,
        entries: &[wgpu::BindGroupLayoutEntry],
    ) -> Result<RawBindGroupLayoutId, DeviceError> {
        let layout = self.bind_group_layouts.insert(entries.to_vec());
        self.calls.push(DeviceCall::CreateBindGroupLayout {
            layout,
            entries: entries.to_vec(),
        });
        Ok(layout)
    }

    fn destroy_bind_group_layout(&mut self, layout: RawBindGroupLayoutId) {
        self.bind_group_layouts.remove(layout);
        self.calls.push(DeviceCall::DestroyBindGroupLayout(layout));
    }

    fn create_bind_group(
        &mut self,
        _label: Option<&str>,
        layout: RawBindGroupLayoutId,
        entries: &[RawBindGroupEntry],
    ) -> Result<RawBindGroupId, DeviceError> {
        let declared = self
            .bind_group_layouts
            .get(layout)
            .ok_or(DeviceError::InvalidResource {
                kind: "bind group layout",
            })?;
        if declared.len() != entries.len() {
            return Err(DeviceError::InvalidState(format!(
                "bind group has {} entries, layout declares {}",
                entries.len(),
                declared.len()
            )));
        }
        for entry in entries {
            let live = match entry.resource {
                super::RawBindingResource::Buffer { buffer, .. } => {
                    self.buffers.contains_key(buffer)
                }
                super::RawBindingResource::TextureView(view) => self.view_exists(view).is_ok(),
                super::RawBindingResource::Sampler(sampler) => self.samplers.contains_key(sampler),
            };
            if !live {
                return Err(DeviceError::InvalidResource {
                    kind: "bound resource",
                });
            }
        }
        let group = self.bind_groups.insert(layout);
        self.calls.push(DeviceCall::CreateBindGroup {
            group,
            layout,
            entries: entries.to_vec(),
        });
        Ok(group)
    }

    fn destroy_bind_group(&mut self, group: RawBindGroupId) {
        self.bind_groups.remove(group);
        self.calls.push(DeviceCall::DestroyBindGroup(group));
    }

    fn create_pipeline_layout(
        &mut self,
        _label: Option<&str>,
        groups: &[RawBindGroupLayoutId],
    ) -> Result<RawPipelineLayoutId, DeviceError> {
        if groups
            .iter()
            .any(|group| !self.bind_group_layouts.contains_key(*group))
        {
            return Err(DeviceError::InvalidResource {
                kind: "bind group layout",
            });
        }
        let layout = self.pipeline_layouts.insert(groups.to_vec());
        self.calls.push(DeviceCall::CreatePipelineLayout {
            layout,
            groups: groups.to_vec(),
        });
        Ok(layout)
    }

    fn destroy_pipeline_layout(&mut self, layout: RawPipelineLayoutId) {
        self.pipeline_layouts.remove(layout);
        self.calls.push(DeviceCall::DestroyPipelineLayout(layout));
    }

    fn create_render_pipeline(
        &mut self,
        desc: &RawRenderPipelineDesc<'_>,
    ) -> Result<RawRenderPipelineId, DeviceError> {
        if !self.pipeline_layouts.contains_key(desc.layout) {
            return Err(DeviceError::InvalidResource {
                kind: "pipeline layout",
            });
        }
        let pipeline = self.render_pipelines.insert(desc.layout);
        self.calls.push(DeviceCall::CreateRenderPipeline(pipeline));
        Ok(pipeline)
    }

    fn destroy_render_pipeline(&mut self, pipeline: RawRenderPipelineId) {
        self.render_pipelines.remove(pipeline);
        self.calls.push(DeviceCall::DestroyRenderPipeline(pipeline));
    }

    fn create_compute_pipeline(
        &mut self,
        desc: &RawComputePipelineDesc<'_>,
    ) -> Result<RawComputePipelineId, DeviceError> {
        if !self.pipeline_layouts.contains_key(desc.layout) {
            return Err(DeviceError::InvalidResource {
                kind: "pipeline layout",
            });
        }
        let pipeline = self.compute_pipelines.insert(desc.layout);
        self.calls.push(DeviceCall::CreateComputePipeline(pipeline));
        Ok(pipeline)
    }

    fn destroy_compute_pipeline(&mut self, pipeline: RawComputePipelineId) {
        self.compute_pipelines.remove(pipeline);
        self.calls.push(DeviceCall::DestroyComputePipeline(pipeline));
    }

    fn create_command_encoder(&mut self, _label: Option<&str>) -> Result<RawEncoderId, DeviceError> {
        let encoder = self.encoders.insert(Vec::new());
        self.calls.push(DeviceCall::CreateCommandEncoder(encoder));
        Ok(encoder)
    }

    fn copy_buffer_to_buffer(
        &mut self,
        encoder: RawEncoderId,
        source: RawBufferId,
        source_offset: u64,
        destination: RawBufferId,
        destination_offset: u64,
        size: u64,
    ) -> Result<(), DeviceError> {
        let src = self.buffer(source)?;
        if !src.usage.contains(wgpu::BufferUsages::COPY_SRC) {
            return Err(DeviceError::InvalidState("copy source lacks COPY_SRC".to_string()));
        }
        check_range(source_offset, size, src.data.len() as u64)?;
        let dst = self.buffer(destination)?;
        if !dst.usage.contains(wgpu::BufferUsages::COPY_DST) {
            return Err(DeviceError::InvalidState(
                "copy destination lacks COPY_DST".to_string(),
            ));
        }
        check_range(destination_offset, size, dst.data.len() as u64)?;
        self.encoders
            .get_mut(encoder)
            .ok_or(DeviceError::InvalidResource { kind: "encoder" })?
            .push(EncodedOp::Copy {
                source,
                source_offset,
                destination,
                destination_offset,
                size,
            });
        self.calls.push(DeviceCall::CopyBufferToBuffer {
            source,
            destination,
            size,
        });
        Ok(())
    }

    fn begin_render_pass(
        &mut self,
        encoder: RawEncoderId,
        desc: &RawRenderPassDesc<'_>,
    ) -> Result<Self::RenderPass<'_>, DeviceError> {
        if !self.encoders.contains_key(encoder) {
            return Err(DeviceError::InvalidResource { kind: "encoder" });
        }
        for attachment in desc.color_attachments {
            self.view_exists(attachment.view)?;
        }
        if let Some(depth) = &desc.depth_attachment {
            self.view_exists(depth.view)?;
        }
        self.calls.push(DeviceCall::BeginRenderPass {
            encoder,
            color_attachments: desc.color_attachments.len(),
            has_depth: desc.depth_attachment.is_some(),
        });
        Ok(RecordingRenderPass { device: self })
    }

    fn begin_compute_pass(
        &mut self,
        encoder: RawEncoderId,
        _label: Option<&str>,
    ) -> Result<Self::ComputePass<'_>, DeviceError> {
        if !self.encoders.contains_key(encoder) {
            return Err(DeviceError::InvalidResource { kind: "encoder" });
        }
        self.calls.push(DeviceCall::BeginComputePass(encoder));
        Ok(RecordingComputePass { device: self })
    }

    fn create_render_bundle_encoder(
        &mut self,
        _desc: &RenderBundleDesc<'_>,
    ) -> Result<Self::BundleEncoder<'_>, DeviceError> {
        self.calls.push(DeviceCall::CreateRenderBundleEncoder);
        Ok(RecordingBundleEncoder {
            device: self,
            commands: Vec::new(),
        })
    }

    fn destroy_render_bundle(&mut self, bundle: RawRenderBundleId) {
        self.bundles.remove(bundle);
        self.calls.push(DeviceCall::DestroyRenderBundle(bundle));
    }

    fn submit(&mut self, encoder: RawEncoderId) -> Result<(), DeviceError> {
        let ops = self
            .encoders
            .remove(encoder)
            .ok_or(DeviceError::InvalidResource { kind: "encoder" })?;
        self.calls.push(DeviceCall::Submit(encoder));
        for op in ops {
            match op {
                EncodedOp::Copy {
                    source,
                    source_offset,
                    destination,
                    destination_offset,
                    size,
                } => self.apply_copy(source, source_offset, destination, destination_offset, size)?,
            }
        }
        Ok(())
    }

    fn poll(&mut self, wait: bool) {
        self.calls.push(DeviceCall::Poll { wait });
        for pending in std::mem::take(&mut self.pending_maps) {
            let outcome = match self.buffers.get_mut(pending.buffer) {
                None => Err(DeviceError::InvalidState(
                    "buffer destroyed before its map completed".to_string(),
                )),
                Some(buffer) if self.reject_maps => {
                    buffer.map_state = MapState::Unmapped;
                    Err(DeviceError::InvalidState("map rejected".to_string()))
                }
                Some(buffer) => {
                    buffer.map_state = MapState::Mapped(pending.mode);
                    Ok(())
                }
            };
            pending.completer.complete(outcome);
        }
    }
}

// ============================================================================
// Recorders
// ============================================================================

pub struct RecordingRenderPass<'a> {
    device: &'a mut RecordingDevice,
}

impl BindingCommands for RecordingRenderPass<'_> {
    fn set_bind_group(&mut self, index: u32, group: Option<RawBindGroupId>) {
        self.device.calls.push(DeviceCall::SetBindGroup { index, group });
    }
}

impl RenderCommands for RecordingRenderPass<'_> {
    fn set_pipeline(&mut self, pipeline: RawRenderPipelineId) {
        self.device.calls.push(DeviceCall::SetRenderPipeline(pipeline));
    }

    fn set_vertex_buffer(&mut self, slot: u32, buffer: RawBufferId) {
        self.device.calls.push(DeviceCall::SetVertexBuffer { slot, buffer });
    }

    fn set_index_buffer(&mut self, buffer: RawBufferId, format: wgpu::IndexFormat) {
        self.device.calls.push(DeviceCall::SetIndexBuffer { buffer, format });
    }

    fn draw(&mut self, vertices: Range<u32>, instances: Range<u32>) {
        self.device.calls.push(DeviceCall::Draw { vertices, instances });
    }

    fn draw_indexed(&mut self, indices: Range<u32>, base_vertex: i32, instances: Range<u32>) {
        self.device.calls.push(DeviceCall::DrawIndexed {
            indices,
            base_vertex,
            instances,
        });
    }
}

impl RenderPassRecorder for RecordingRenderPass<'_> {
    fn execute_bundles(&mut self, bundles: &[RawRenderBundleId]) {
        self.device.calls.push(DeviceCall::ExecuteBundles(bundles.to_vec()));
    }

    fn end(self) {
        self.device.calls.push(DeviceCall::EndPass);
    }
}

pub struct RecordingComputePass<'a> {
    device: &'a mut RecordingDevice,
}

impl BindingCommands for RecordingComputePass<'_> {
    fn set_bind_group(&mut self, index: u32, group: Option<RawBindGroupId>) {
        self.device.calls.push(DeviceCall::SetBindGroup { index, group });
    }
}

impl ComputeCommands for RecordingComputePass<'_> {
    fn set_pipeline(&mut self, pipeline: RawComputePipelineId) {
        self.device.calls.push(DeviceCall::SetComputePipeline(pipeline));
    }

    fn dispatch_workgroups(&mut self, x: u32, y: u32, z: u32) {
        self.device.calls.push(DeviceCall::Dispatch { x, y, z });
    }

    fn end(self) {
        self.device.calls.push(DeviceCall::EndPass);
    }
}

pub struct RecordingBundleEncoder<'a> {
    device: &'a mut RecordingDevice,
    commands: Vec<DeviceCall>,
}

impl RecordingBundleEncoder<'_> {
    fn record(&mut self, call: DeviceCall) {
        self.device.calls.push(call.clone());
        self.commands.push(call);
    }
}

impl BindingCommands for RecordingBundleEncoder<'_> {
    fn set_bind_group(&mut self, index: u32, group: Option<RawBindGroupId>) {
        self.record(DeviceCall::SetBindGroup { index, group });
    }
}

impl RenderCommands for RecordingBundleEncoder<'_> {
    fn set_pipeline(&mut self, pipeline: RawRenderPipelineId) {
        self.record(DeviceCall::SetRenderPipeline(pipeline));
    }

    fn set_vertex_buffer(&mut self, slot: u32, buffer: RawBufferId) {
        self.record(DeviceCall::SetVertexBuffer { slot, buffer });
    }

    fn set_index_buffer(&mut self, buffer: RawBufferId, format: wgpu::IndexFormat) {
        self.record(DeviceCall::SetIndexBuffer { buffer, format });
    }

    fn draw(&mut self, vertices: Range<u32>, instances: Range<u32>) {
        self.record(DeviceCall::Draw { vertices, instances });
    }

    fn draw_indexed(&mut self, indices: Range<u32>, base_vertex: i32, instances: Range<u32>) {
        self.record(DeviceCall::DrawIndexed {
            indices,
            base_vertex,
            instances,
        });
    }
}

impl RenderBundleRecorder for RecordingBundleEncoder<'_> {
    fn finish(self) -> Result<RawRenderBundleId, DeviceError> {
        let bundle = self.device.bundles.insert(self.commands);
        self.device.calls.push(DeviceCall::FinishRenderBundle(bundle));
        Ok(bundle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn staging(device: &mut RecordingDevice) -> RawBufferId {
        device
            .create_buffer(&BufferDesc {
                label: None,
                size: 16,
                usage: wgpu::BufferUsages::MAP_WRITE | wgpu::BufferUsages::COPY_SRC,
                mapped_at_creation: true,
            })
            .unwrap()
    }

    #[test]
    fn copies_land_on_submit() {
        let mut device = RecordingDevice::new();
        let src = staging(&mut device);
        device.write_mapped(src, 0, &[1, 2, 3, 4]).unwrap();
        device.unmap_buffer(src).unwrap();
        let dst = device
            .create_buffer(&BufferDesc {
                label: None,
                size: 16,
                usage: wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            })
            .unwrap();

        let encoder = device.create_command_encoder(None).unwrap();
        device.copy_buffer_to_buffer(encoder, src, 0, dst, 8, 4).unwrap();
        assert_eq!(&device.buffer_data(dst).unwrap()[8..12], &[0, 0, 0, 0]);

        device.submit(encoder).unwrap();
        assert_eq!(&device.buffer_data(dst).unwrap()[8..12], &[1, 2, 3, 4]);
    }

    #[test]
    fn map_completes_on_poll() {
        let mut device = RecordingDevice::new();
        let buffer = staging(&mut device);
        device.unmap_buffer(buffer).unwrap();

        let mut task = device.map_buffer(buffer, wgpu::MapMode::Write);
        assert!(task.try_complete().is_none());
        device.poll(false);
        assert_eq!(task.try_complete(), Some(Ok(())));
        assert!(device.write_mapped(buffer, 0, &[0; 4]).is_ok());
    }

    #[test]
    fn destroying_a_buffer_fails_its_pending_map() {
        let mut device = RecordingDevice::new();
        let buffer = staging(&mut device);
        device.unmap_buffer(buffer).unwrap();

        let mut task = device.map_buffer(buffer, wgpu::MapMode::Write);
        device.destroy_buffer(buffer);
        device.poll(false);
        assert!(matches!(task.try_complete(), Some(Err(DeviceError::InvalidState(_)))));
    }

    #[test]
    fn copy_from_mapped_buffer_is_rejected_at_submit() {
        let mut device = RecordingDevice::new();
        let src = staging(&mut device);
        let dst = device
            .create_buffer(&BufferDesc {
                label: None,
                size: 16,
                usage: wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            })
            .unwrap();
        let encoder = device.create_command_encoder(None).unwrap();
        device.copy_buffer_to_buffer(encoder, src, 0, dst, 0, 16).unwrap();
        assert!(device.submit(encoder).is_err());
    }
}
