//! `wgpu` Backend
//!
//! [`WgpuDevice`] owns a `wgpu::Device` and `wgpu::Queue` and keeps every
//! native object in a slot map keyed by the raw ids of the device boundary.
//!
//! Passes are begun with `forget_lifetime`, so the command encoder is only
//! borrowed while the pass is opened. Recorders resolve raw ids through a
//! shared borrow of the object tables.

use std::borrow::Cow;

use slotmap::SlotMap;

use super::{
    AttachmentLoad, BindingCommands, BufferDesc, ComputeCommands, DeviceError, GpuDevice, GpuTask,
    RawBindGroupEntry, RawBindGroupId, RawBindGroupLayoutId, RawBindingResource, RawBufferId,
    RawComputePipelineDesc, RawComputePipelineId, RawEncoderId, RawPipelineLayoutId,
    RawRenderBundleId, RawRenderPassDesc, RawRenderPipelineDesc, RawRenderPipelineId,
    RawSamplerId, RawTextureId, RawTextureViewId, RenderBundleDesc, RenderBundleRecorder,
    RenderCommands, RenderPassRecorder, SamplerDesc, TextureDesc, TextureViewDesc,
};

/// Native objects addressed by raw ids.
#[derive(Default)]
struct Objects {
    buffers: SlotMap<RawBufferId, wgpu::Buffer>,
    textures: SlotMap<RawTextureId, wgpu::Texture>,
    views: SlotMap<RawTextureViewId, (RawTextureId, wgpu::TextureView)>,
    samplers: SlotMap<RawSamplerId, wgpu::Sampler>,
    bind_group_layouts: SlotMap<RawBindGroupLayoutId, wgpu::BindGroupLayout>,
    bind_groups: SlotMap<RawBindGroupId, wgpu::BindGroup>,
    pipeline_layouts: SlotMap<RawPipelineLayoutId, wgpu::PipelineLayout>,
    render_pipelines: SlotMap<RawRenderPipelineId, wgpu::RenderPipeline>,
    compute_pipelines: SlotMap<RawComputePipelineId, wgpu::ComputePipeline>,
}

fn missing(kind: &'static str) -> DeviceError {
    DeviceError::InvalidResource { kind }
}

pub struct WgpuDevice {
    device: wgpu::Device,
    queue: wgpu::Queue,
    objects: Objects,
    encoders: SlotMap<RawEncoderId, wgpu::CommandEncoder>,
    bundles: SlotMap<RawRenderBundleId, wgpu::RenderBundle>,
}

impl WgpuDevice {
    #[must_use]
    pub fn new(device: wgpu::Device, queue: wgpu::Queue) -> Self {
        Self {
            device,
            queue,
            objects: Objects::default(),
            encoders: SlotMap::with_key(),
            bundles: SlotMap::with_key(),
        }
    }

    /// Requests the default adapter without a surface and opens a device on it.
    pub fn request_headless() -> Result<Self, DeviceError> {
        pollster::block_on(async {
            let instance = wgpu::Instance::default();
            let adapter = instance
                .request_adapter(&wgpu::RequestAdapterOptions {
                    power_preference: wgpu::PowerPreference::default(),
                    compatible_surface: None,
                    force_fallback_adapter: false,
                })
                .await
                .map_err(|e| DeviceError::Unsupported(e.to_string()))?;
            log::info!("Using adapter {:?}", adapter.get_info().name);

            let (device, queue) = adapter
                .request_device(&wgpu::DeviceDescriptor {
                    label: Some("myth-gpu"),
                    ..Default::default()
                })
                .await
                .map_err(|e| DeviceError::Unsupported(e.to_string()))?;
            Ok(Self::new(device, queue))
        })
    }

    #[must_use]
    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    #[must_use]
    pub fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }

    fn buffer(&self, buffer: RawBufferId) -> Result<&wgpu::Buffer, DeviceError> {
        self.objects.buffers.get(buffer).ok_or_else(|| missing("buffer"))
    }
}

fn load_op<V>(load: AttachmentLoad<V>) -> wgpu::LoadOp<V> {
    match load {
        AttachmentLoad::Clear(value) => wgpu::LoadOp::Clear(value),
        AttachmentLoad::Load => wgpu::LoadOp::Load,
    }
}

fn store_op(store: bool) -> wgpu::StoreOp {
    if store {
        wgpu::StoreOp::Store
    } else {
        wgpu::StoreOp::Discard
    }
}

impl GpuDevice for WgpuDevice {
    type RenderPass<'a> = WgpuRenderPass<'a>;
    type ComputePass<'a> = WgpuComputePass<'a>;
    type BundleEncoder<'a> = WgpuBundleEncoder<'a>;

    fn create_buffer(&mut self, desc: &BufferDesc<'_>) -> Result<RawBufferId, DeviceError> {
        let buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: desc.label,
            size: desc.size,
            usage: desc.usage,
            mapped_at_creation: desc.mapped_at_creation,
        });
        Ok(self.objects.buffers.insert(buffer))
    }

    fn destroy_buffer(&mut self, buffer: RawBufferId) {
        if let Some(buffer) = self.objects.buffers.remove(buffer) {
            buffer.destroy();
        }
    }

    fn write_buffer(
        &mut self,
        buffer: RawBufferId,
        offset: u64,
        data: &[u8],
    ) -> Result<(), DeviceError> {
        let target = self.buffer(buffer)?;
        self.queue.write_buffer(target, offset, data);
        Ok(())
    }

    fn write_mapped(
        &mut self,
        buffer: RawBufferId,
        offset: u64,
        data: &[u8],
    ) -> Result<(), DeviceError> {
        let target = self.buffer(buffer)?;
        let end = offset + data.len() as u64;
        let mut view = target.slice(offset..end).get_mapped_range_mut();
        view.copy_from_slice(data);
        Ok(())
    }

    fn read_mapped(
        &mut self,
        buffer: RawBufferId,
        offset: u64,
        len: u64,
    ) -> Result<Vec<u8>, DeviceError> {
        let source = self.buffer(buffer)?;
        let view = source.slice(offset..offset + len).get_mapped_range();
        Ok(view.to_vec())
    }

    fn unmap_buffer(&mut self, buffer: RawBufferId) -> Result<(), DeviceError> {
        self.buffer(buffer)?.unmap();
        Ok(())
    }

    fn map_buffer(&mut self, buffer: RawBufferId, mode: wgpu::MapMode) -> GpuTask<()> {
        let target = match self.buffer(buffer) {
            Ok(target) => target,
            Err(err) => return GpuTask::ready(Err(err)),
        };
        let (completer, task) = GpuTask::pending();
        target.slice(..).map_async(mode, move |outcome| {
            completer.complete(outcome.map_err(|e| DeviceError::Internal(e.to_string())));
        });
        task
    }

    fn create_texture(&mut self, desc: &TextureDesc<'_>) -> Result<RawTextureId, DeviceError> {
        let texture = self.device.create_texture(&wgpu::TextureDescriptor {
            label: desc.label,
            size: desc.size,
            mip_level_count: desc.mip_level_count,
            sample_count: desc.sample_count,
            dimension: desc.dimension,
            format: desc.format,
            usage: desc.usage,
            view_formats: &[],
        });
        Ok(self.objects.textures.insert(texture))
    }

    fn create_texture_view(
        &mut self,
        texture: RawTextureId,
        desc: &TextureViewDesc<'_>,
    ) -> Result<RawTextureViewId, DeviceError> {
        let native = self
            .objects
            .textures
            .get(texture)
            .ok_or_else(|| missing("texture"))?;
        let view = native.create_view(&wgpu::TextureViewDescriptor {
            label: desc.label,
            dimension: Some(desc.dimension),
            ..Default::default()
        });
        Ok(self.objects.views.insert((texture, view)))
    }

    fn destroy_texture(&mut self, texture: RawTextureId) {
        self.objects.views.retain(|_, (owner, _)| *owner != texture);
        if let Some(texture) = self.objects.textures.remove(texture) {
            texture.destroy();
        }
    }

    fn write_texture(
        &mut self,
        texture: RawTextureId,
        data: &[u8],
        bytes_per_row: u32,
        size: wgpu::Extent3d,
    ) -> Result<(), DeviceError> {
        let texture = self
            .objects
            .textures
            .get(texture)
            .ok_or_else(|| missing("texture"))?;
        self.queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            data,
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(bytes_per_row),
                rows_per_image: Some(size.height),
            },
            size,
        );
        Ok(())
    }

    fn create_sampler(&mut self, desc: &SamplerDesc<'_>) -> Result<RawSamplerId, DeviceError> {
        let sampler = self.device.create_sampler(&wgpu::SamplerDescriptor {
            label: desc.label,
            address_mode_u: desc.address_mode,
            address_mode_v: desc.address_mode,
            address_mode_w: desc.address_mode,
            mag_filter: desc.mag_filter,
            min_filter: desc.min_filter,
            compare: desc.compare,
            ..Default::default()
        });
        Ok(self.objects.samplers.insert(sampler))
    }

    fn destroy_sampler(&mut self, sampler: RawSamplerId) {
        self.objects.samplers.remove(sampler);
    }

    fn create_bind_group_layout(
        &mut self,
        label: Option<&str>,
        entries: &[wgpu::BindGroupLayoutEntry],
    ) -> Result<RawBindGroupLayoutId, DeviceError> {
        let layout = self
            .device
            .create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor { label, entries });
        Ok(self.objects.bind_group_layouts.insert(layout))
    }

    fn destroy_bind_group_layout(&mut self, layout: RawBindGroupLayoutId) {
        self.objects.bind_group_layouts.remove(layout);
    }

    fn create_bind_group(
        &mut self,
        label: Option<&str>,
        layout: RawBindGroupLayoutId,
        entries: &[RawBindGroupEntry],
    ) -> Result<RawBindGroupId, DeviceError> {
        let objects = &self.objects;
        let layout = objects
            .bind_group_layouts
            .get(layout)
            .ok_or_else(|| missing("bind group layout"))?;
        let native_entries = entries
            .iter()
            .map(|entry| {
                let resource = match entry.resource {
                    RawBindingResource::Buffer {
                        buffer,
                        offset,
                        size,
                    } => wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                        buffer: objects.buffers.get(buffer).ok_or_else(|| missing("buffer"))?,
                        offset,
                        size,
                    }),
                    RawBindingResource::TextureView(view) => wgpu::BindingResource::TextureView(
                        &objects.views.get(view).ok_or_else(|| missing("texture view"))?.1,
                    ),
                    RawBindingResource::Sampler(sampler) => wgpu::BindingResource::Sampler(
                        objects.samplers.get(sampler).ok_or_else(|| missing("sampler"))?,
                    ),
                };
                Ok(wgpu::BindGroupEntry {
                    binding: entry.binding,
                    resource,
                })
            })
            .collect::<Result<Vec<_>, DeviceError>>()?;

        let group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label,
            layout,
            entries: &native_entries,
        });
        Ok(self.objects.bind_groups.insert(group))
    }

    fn destroy_bind_group(&mut self, group: RawBindGroupId) {
        self.objects.bind_groups.remove(group);
    }

    fn create_pipeline_layout(
        &mut self,
        label: Option<&str>,
        groups: &[RawBindGroupLayoutId],
    ) -> Result<RawPipelineLayoutId, DeviceError> {
        let layouts = groups
            .iter()
            .map(|group| {
                self.objects
                    .bind_group_layouts
                    .get(*group)
                    .map(Some)
                    .ok_or_else(|| missing("bind group layout"))
            })
            .collect::<Result<Vec<_>, _>>()?;
        let layout = self
            .device
            .create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label,
                bind_group_layouts: &layouts,
                immediate_size: 0,
            });
        Ok(self.objects.pipeline_layouts.insert(layout))
    }

    fn destroy_pipeline_layout(&mut self, layout: RawPipelineLayoutId) {
        self.objects.pipeline_layouts.remove(layout);
    }

    fn create_render_pipeline(
        &mut self,
        desc: &RawRenderPipelineDesc<'_>,
    ) -> Result<RawRenderPipelineId, DeviceError> {
        let layout = self
            .objects
            .pipeline_layouts
            .get(desc.layout)
            .ok_or_else(|| missing("pipeline layout"))?;
        let module = self.device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: desc.label,
            source: wgpu::ShaderSource::Wgsl(Cow::Borrowed(desc.shader)),
        });
        let vertex_buffers: Vec<_> = desc.vertex_buffers.iter().map(|b| b.as_wgpu()).collect();
        let targets: Vec<_> = desc
            .color_targets
            .iter()
            .map(|format| {
                Some(wgpu::ColorTargetState {
                    format: *format,
                    blend: None,
                    write_mask: wgpu::ColorWrites::ALL,
                })
            })
            .collect();

        let pipeline = self.device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: desc.label,
            layout: Some(layout),
            vertex: wgpu::VertexState {
                module: &module,
                entry_point: Some(desc.vertex_entry),
                buffers: &vertex_buffers,
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            },
            fragment: desc.fragment_entry.map(|entry| wgpu::FragmentState {
                module: &module,
                entry_point: Some(entry),
                targets: &targets,
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            }),
            primitive: desc.primitive,
            depth_stencil: desc.depth.map(|depth| wgpu::DepthStencilState {
                format: depth.format,
                depth_write_enabled: Some(depth.write_enabled),
                depth_compare: Some(depth.compare),
                stencil: wgpu::StencilState::default(),
                bias: wgpu::DepthBiasState::default(),
            }),
            multisample: wgpu::MultisampleState {
                count: desc.sample_count,
                mask: !0,
                alpha_to_coverage_enabled: false,
            },
            multiview_mask: None,
            cache: None,
        });
        Ok(self.objects.render_pipelines.insert(pipeline))
    }

    fn destroy_render_pipeline(&mut self, pipeline: RawRenderPipelineId) {
        self.objects.render_pipelines.remove(pipeline);
    }

    fn create_compute_pipeline(
        &mut self,
        desc: &RawComputePipelineDesc<'_>,
    ) -> Result<RawComputePipelineId, DeviceError> {
        let layout = self
            .objects
            .pipeline_layouts
            .get(desc.layout)
            .ok_or_else(|| missing("pipeline layout"))?;
        let module = self.device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: desc.label,
            source: wgpu::ShaderSource::Wgsl(Cow::Borrowed(desc.shader)),
        });
        let pipeline = self
            .device
            .create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
                label: desc.label,
                layout: Some(layout),
                module: &module,
                entry_point: Some(desc.entry_point),
                compilation_options: wgpu::PipelineCompilationOptions::default(),
                cache: None,
            });
        Ok(self.objects.compute_pipelines.insert(pipeline))
    }

    fn destroy_compute_pipeline(&mut self, pipeline: RawComputePipelineId) {
        self.objects.compute_pipelines.remove(pipeline);
    }

    fn create_command_encoder(&mut self, label: Option<&str>) -> Result<RawEncoderId, DeviceError> {
        let encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor { label });
        Ok(self.encoders.insert(encoder))
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
        let source = self.objects.buffers.get(source).ok_or_else(|| missing("buffer"))?;
        let destination = self
            .objects
            .buffers
            .get(destination)
            .ok_or_else(|| missing("buffer"))?;
        self.encoders
            .get_mut(encoder)
            .ok_or_else(|| missing("encoder"))?
            .copy_buffer_to_buffer(source, source_offset, destination, destination_offset, size);
        Ok(())
    }

    fn begin_render_pass(
        &mut self,
        encoder: RawEncoderId,
        desc: &RawRenderPassDesc<'_>,
    ) -> Result<Self::RenderPass<'_>, DeviceError> {
        let view = |id: RawTextureViewId| {
            self.objects
                .views
                .get(id)
                .map(|(_, view)| view)
                .ok_or_else(|| missing("texture view"))
        };
        let color_attachments = desc
            .color_attachments
            .iter()
            .map(|attachment| {
                Ok(Some(wgpu::RenderPassColorAttachment {
                    view: view(attachment.view)?,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: load_op(attachment.load),
                        store: store_op(attachment.store),
                    },
                    depth_slice: None,
                }))
            })
            .collect::<Result<Vec<_>, DeviceError>>()?;
        let depth_stencil_attachment = match &desc.depth_attachment {
            Some(depth) => Some(wgpu::RenderPassDepthStencilAttachment {
                view: view(depth.view)?,
                depth_ops: Some(wgpu::Operations {
                    load: load_op(depth.load),
                    store: store_op(depth.store),
                }),
                stencil_ops: None,
            }),
            None => None,
        };

        let pass = self
            .encoders
            .get_mut(encoder)
            .ok_or_else(|| missing("encoder"))?
            .begin_render_pass(&wgpu::RenderPassDescriptor {
                label: desc.label,
                color_attachments: &color_attachments,
                depth_stencil_attachment,
                ..Default::default()
            })
            .forget_lifetime();
        Ok(WgpuRenderPass {
            objects: &self.objects,
            bundles: &self.bundles,
            pass,
        })
    }

    fn begin_compute_pass(
        &mut self,
        encoder: RawEncoderId,
        label: Option<&str>,
    ) -> Result<Self::ComputePass<'_>, DeviceError> {
        let pass = self
            .encoders
            .get_mut(encoder)
            .ok_or_else(|| missing("encoder"))?
            .begin_compute_pass(&wgpu::ComputePassDescriptor {
                label,
                timestamp_writes: None,
            })
            .forget_lifetime();
        Ok(WgpuComputePass {
            objects: &self.objects,
            pass,
        })
    }

    fn create_render_bundle_encoder(
        &mut self,
        desc: &RenderBundleDesc<'_>,
    ) -> Result<Self::BundleEncoder<'_>, DeviceError> {
        let color_formats: Vec<_> = desc.color_formats.iter().copied().map(Some).collect();
        let Self {
            device,
            objects,
            bundles,
            ..
        } = self;
        let encoder = device.create_render_bundle_encoder(&wgpu::RenderBundleEncoderDescriptor {
            label: desc.label,
            color_formats: &color_formats,
            depth_stencil: desc.depth_format.map(|format| wgpu::RenderBundleDepthStencil {
                format,
                depth_read_only: false,
                stencil_read_only: true,
            }),
            sample_count: desc.sample_count,
            ..Default::default()
        });
        Ok(WgpuBundleEncoder {
            objects,
            bundles,
            encoder,
            label: desc.label.map(str::to_owned),
        })
    }

    fn destroy_render_bundle(&mut self, bundle: RawRenderBundleId) {
        self.bundles.remove(bundle);
    }

    fn submit(&mut self, encoder: RawEncoderId) -> Result<(), DeviceError> {
        let encoder = self
            .encoders
            .remove(encoder)
            .ok_or_else(|| missing("encoder"))?;
        self.queue.submit(std::iter::once(encoder.finish()));
        Ok(())
    }

    fn poll(&mut self, wait: bool) {
        let poll_type = if wait {
            wgpu::PollType::wait_indefinitely()
        } else {
            wgpu::PollType::Poll
        };
        if let Err(err) = self.device.poll(poll_type) {
            log::warn!("Device poll failed: {err}");
        }
    }
}

// ============================================================================
// Recorders
// ============================================================================

pub struct WgpuRenderPass<'a> {
    objects: &'a Objects,
    bundles: &'a SlotMap<RawRenderBundleId, wgpu::RenderBundle>,
    pass: wgpu::RenderPass<'static>,
}

impl BindingCommands for WgpuRenderPass<'_> {
    fn set_bind_group(&mut self, index: u32, group: Option<RawBindGroupId>) {
        let group = group.and_then(|id| self.objects.bind_groups.get(id));
        self.pass.set_bind_group(index, group, &[]);
    }
}

impl RenderCommands for WgpuRenderPass<'_> {
    fn set_pipeline(&mut self, pipeline: RawRenderPipelineId) {
        if let Some(pipeline) = self.objects.render_pipelines.get(pipeline) {
            self.pass.set_pipeline(pipeline);
        }
    }

    fn set_vertex_buffer(&mut self, slot: u32, buffer: RawBufferId) {
        if let Some(buffer) = self.objects.buffers.get(buffer) {
            self.pass.set_vertex_buffer(slot, buffer.slice(..));
        }
    }

    fn set_index_buffer(&mut self, buffer: RawBufferId, format: wgpu::IndexFormat) {
        if let Some(buffer) = self.objects.buffers.get(buffer) {
            self.pass.set_index_buffer(buffer.slice(..), format);
        }
    }

    fn draw(&mut self, vertices: std::ops::Range<u32>, instances: std::ops::Range<u32>) {
        self.pass.draw(vertices, instances);
    }

    fn draw_indexed(
        &mut self,
        indices: std::ops::Range<u32>,
        base_vertex: i32,
        instances: std::ops::Range<u32>,
    ) {
        self.pass.draw_indexed(indices, base_vertex, instances);
    }
}

impl RenderPassRecorder for WgpuRenderPass<'_> {
    fn execute_bundles(&mut self, bundles: &[RawRenderBundleId]) {
        let store = self.bundles;
        self.pass
            .execute_bundles(bundles.iter().filter_map(|id| store.get(*id)));
    }

    fn end(self) {
        drop(self.pass);
    }
}

pub struct WgpuComputePass<'a> {
    objects: &'a Objects,
    pass: wgpu::ComputePass<'static>,
}

impl BindingCommands for WgpuComputePass<'_> {
    fn set_bind_group(&mut self, index: u32, group: Option<RawBindGroupId>) {
        let group = group.and_then(|id| self.objects.bind_groups.get(id));
        self.pass.set_bind_group(index, group, &[]);
    }
}

impl ComputeCommands for WgpuComputePass<'_> {
    fn set_pipeline(&mut self, pipeline: RawComputePipelineId) {
        if let Some(pipeline) = self.objects.compute_pipelines.get(pipeline) {
            self.pass.set_pipeline(pipeline);
        }
    }

    fn dispatch_workgroups(&mut self, x: u32, y: u32, z: u32) {
        self.pass.dispatch_workgroups(x, y, z);
    }

    fn end(self) {
        drop(self.pass);
    }
}

pub struct WgpuBundleEncoder<'a> {
    objects: &'a Objects,
    bundles: &'a mut SlotMap<RawRenderBundleId, wgpu::RenderBundle>,
    encoder: wgpu::RenderBundleEncoder<'a>,
    label: Option<String>,
}

impl BindingCommands for WgpuBundleEncoder<'_> {
    fn set_bind_group(&mut self, index: u32, group: Option<RawBindGroupId>) {
        let objects = self.objects;
        let group = group.and_then(|id| objects.bind_groups.get(id));
        self.encoder.set_bind_group(index, group, &[]);
    }
}

impl RenderCommands for WgpuBundleEncoder<'_> {
    fn set_pipeline(&mut self, pipeline: RawRenderPipelineId) {
        let objects = self.objects;
        if let Some(pipeline) = objects.render_pipelines.get(pipeline) {
            self.encoder.set_pipeline(pipeline);
        }
    }

    fn set_vertex_buffer(&mut self, slot: u32, buffer: RawBufferId) {
        let objects = self.objects;
        if let Some(buffer) = objects.buffers.get(buffer) {
            self.encoder.set_vertex_buffer(slot, buffer.slice(..));
        }
    }

    fn set_index_buffer(&mut self, buffer: RawBufferId, format: wgpu::IndexFormat) {
        let objects = self.objects;
        if let Some(buffer) = objects.buffers.get(buffer) {
            self.encoder.set_index_buffer(buffer.slice(..), format);
        }
    }

    fn draw(&mut self, vertices: std::ops::Range<u32>, instances: std::ops::Range<u32>) {
        self.encoder.draw(vertices, instances);
    }

    fn draw_indexed(
        &mut self,
        indices: std::ops::Range<u32>,
        base_vertex: i32,
        instances: std::ops::Range<u32>,
    ) {
        self.encoder.draw_indexed(indices, base_vertex, instances);
    }
}

impl RenderBundleRecorder for WgpuBundleEncoder<'_> {
    fn finish(self) -> Result<RawRenderBundleId, DeviceError> {
        let bundle = self.encoder.finish(&wgpu::RenderBundleDescriptor {
            label: self.label.as_deref(),
        });
        Ok(self.bundles.insert(bundle))
    }
}
