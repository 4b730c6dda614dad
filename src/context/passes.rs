use smallvec::SmallVec;

use super::{Gpu, STRUCTURAL, Slot, lookup, lookup_mut};
use crate::device::{
    ComputeCommands, GpuDevice, RawColorAttachment, RawDepthAttachment, RawEncoderId,
    RawRenderBundleId, RawRenderPassDesc, RenderPassRecorder,
};
use crate::errors::{Error, Result};
use crate::handles::{BindGroupId, ComputePassId, PipelineLayoutId, RenderPassId, StepId};
use crate::native::{Invalidation, Lifetime, Listener};
use crate::pass::compute::{CompiledDispatch, ComputeInstruction, NoNative, encode_dispatches};
use crate::pass::render::{BundleOps, CompiledDraw, DrawCall, RenderInstruction, encode_draws};
use crate::pass::{
    ComputePass, ComputeStep, Execution, PassRef, RenderPass, RenderPassDescriptor, RenderStep,
};

impl<D: GpuDevice> Gpu<D> {
    // ========================================================================
    // Render Passes
    // ========================================================================

    /// Creates a render pass. Its attachments gain `RENDER_ATTACHMENT` usage
    /// and feed `RENDER_TARGET` invalidations into the pass.
    pub fn create_render_pass(&mut self, desc: RenderPassDescriptor) -> Result<RenderPassId> {
        let label = self.settings.label(&desc.label);
        let bundle_mode = desc.bundle_mode.unwrap_or(self.settings.bundle_mode_default);
        let pass = RenderPass::new(desc, bundle_mode);
        let targets: Vec<_> = pass.targets().collect();
        for texture in &targets {
            self.extend_texture_usage(*texture, wgpu::TextureUsages::RENDER_ATTACHMENT)?;
        }

        let id = self
            .render_passes
            .insert(Slot::new(pass, label, Lifetime::Persistent));
        for texture in targets {
            self.add_listener(
                texture,
                Listener::new(id, Invalidation::RENDER_TARGET).filtered(STRUCTURAL),
            )?;
        }
        Ok(id)
    }

    pub fn render_pass(&self, id: RenderPassId) -> Result<&RenderPass> {
        Ok(&lookup(&self.render_passes, id)?.value)
    }

    pub fn set_bundle_mode(&mut self, id: RenderPassId, enabled: bool) -> Result<()> {
        if lookup_mut(&mut self.render_passes, id)?.value.set_bundle_mode(enabled) {
            self.invalidate(id, Invalidation::PROPERTIES);
        }
        Ok(())
    }

    /// Validates `step` against its pipeline and appends it to the pass.
    ///
    /// Every check that execution would otherwise need happens here.
    pub fn add_render_step(&mut self, pass: RenderPassId, step: RenderStep) -> Result<StepId> {
        lookup(&self.render_passes, pass)?;
        let pipeline = lookup(&self.render_pipelines, step.pipeline)?;
        let layout_id = pipeline.value.layout();
        let vertex_layouts = pipeline.value.vertex_layouts().to_vec();

        let bind_groups = self.resolve_groups(layout_id, &step.bind_groups)?;

        if step.vertex_buffers.len() != vertex_layouts.len() {
            return Err(Error::LayoutMismatch(format!(
                "pipeline expects {} vertex buffers, step supplies {}",
                vertex_layouts.len(),
                step.vertex_buffers.len()
            )));
        }
        if step.vertex_buffers.len() > self.settings.max_vertex_buffers as usize {
            return Err(Error::LayoutMismatch(format!(
                "{} vertex buffers exceed the limit of {}",
                step.vertex_buffers.len(),
                self.settings.max_vertex_buffers
            )));
        }
        for (slot, (buffer, expected)) in step.vertex_buffers.iter().zip(&vertex_layouts).enumerate() {
            if self.buffer(*buffer)?.layout() != expected {
                return Err(Error::LayoutMismatch(format!(
                    "vertex buffer {slot} does not match the pipeline's vertex layout"
                )));
            }
        }
        let index = match step.index_buffer {
            Some(buffer) => {
                let format = self.buffer(buffer)?.layout().index_format().ok_or_else(|| {
                    Error::LayoutMismatch("index buffer layout is not an array of u16/u32".to_string())
                })?;
                Some((buffer, format))
            }
            None => None,
        };
        if step.count.is_none() && index.is_none() && step.vertex_buffers.is_empty() {
            return Err(Error::LayoutMismatch(
                "a step without vertex or index buffers needs an explicit count".to_string(),
            ));
        }

        let instruction = RenderInstruction {
            pipeline: step.pipeline,
            bind_groups,
            vertex_buffers: step.vertex_buffers.iter().copied().collect(),
            index,
            count: step.count,
            instances: step.instances,
        };

        for buffer in &step.vertex_buffers {
            self.extend_buffer_usage(*buffer, wgpu::BufferUsages::VERTEX)?;
        }
        if let Some((buffer, _)) = index {
            self.extend_buffer_usage(buffer, wgpu::BufferUsages::INDEX)?;
        }
        self.add_listener(instruction.pipeline, Listener::new(pass, Invalidation::PIPELINE))?;
        for group in &instruction.bind_groups {
            self.add_listener(*group, Listener::new(pass, Invalidation::BINDINGS))?;
        }
        for buffer in instruction.buffers() {
            self.add_listener(
                buffer,
                Listener::new(pass, Invalidation::BINDINGS).filtered(STRUCTURAL),
            )?;
        }

        let step_id = lookup_mut(&mut self.render_passes, pass)?
            .value
            .steps
            .push(instruction);
        self.invalidate(pass, Invalidation::INSTRUCTIONS);
        Ok(step_id)
    }

    pub fn remove_render_step(&mut self, pass: RenderPassId, step: StepId) -> Result<()> {
        let instruction = lookup_mut(&mut self.render_passes, pass)?
            .value
            .steps
            .remove(step)
            .ok_or_else(|| Error::UnknownResource(format!("{step:?} in {pass:?}")))?;

        self.remove_listener(instruction.pipeline, &Listener::new(pass, Invalidation::PIPELINE));
        for group in &instruction.bind_groups {
            self.remove_listener(*group, &Listener::new(pass, Invalidation::BINDINGS));
        }
        let buffer_edge = Listener::new(pass, Invalidation::BINDINGS).filtered(STRUCTURAL);
        for buffer in instruction.buffers() {
            self.remove_listener(buffer, &buffer_edge);
        }
        self.invalidate(pass, Invalidation::INSTRUCTIONS);
        Ok(())
    }

    /// Matches named groups to the pipeline layout and orders them by index.
    fn resolve_groups(
        &self,
        layout: PipelineLayoutId,
        supplied: &[(String, BindGroupId)],
    ) -> Result<SmallVec<[BindGroupId; 4]>> {
        let layout = &lookup(&self.pipeline_layouts, layout)?.value;
        if layout.groups().len() > self.settings.max_bind_groups as usize {
            return Err(Error::LayoutMismatch(format!(
                "'{}' uses {} bind groups, the limit is {}",
                layout.label(),
                layout.groups().len(),
                self.settings.max_bind_groups
            )));
        }
        layout.check_contiguous()?;
        if let Some((name, _)) = supplied.iter().find(|(name, _)| layout.group(name).is_none()) {
            return Err(Error::LayoutMismatch(format!(
                "'{}' has no group named '{name}'",
                layout.label()
            )));
        }

        let mut groups = SmallVec::new();
        for entry in layout.groups() {
            let Some((_, group)) = supplied.iter().find(|(name, _)| *name == entry.name) else {
                return Err(Error::MissingBindGroup {
                    name: entry.name.clone(),
                    index: entry.index,
                });
            };
            let expected = entry.layout.ok_or_else(|| {
                Error::SetupOrder(format!("placeholder group '{}' has no layout assigned", entry.name))
            })?;
            let bind_group = self.bind_group(*group)?;
            if bind_group.layout() != expected {
                return Err(Error::LayoutMismatch(format!(
                    "group '{}' was created for a different layout than group {} of '{}'",
                    bind_group.label(),
                    entry.index,
                    layout.label()
                )));
            }
            bind_group.check_complete(self.bind_group_layout(expected)?)?;
            groups.push(*group);
        }
        Ok(groups)
    }

    /// Resolves every instruction of the pass to raw ids.
    fn compile_render_pass(&mut self, id: RenderPassId) -> Result<Vec<CompiledDraw>> {
        let instructions: Vec<RenderInstruction> =
            lookup(&self.render_passes, id)?.value.steps.iter().cloned().collect();

        let mut draws = Vec::with_capacity(instructions.len());
        for instruction in instructions {
            let pipeline = self.render_pipeline_native(instruction.pipeline)?;
            let bind_groups = instruction
                .bind_groups
                .iter()
                .map(|group| self.bind_group_native(*group))
                .collect::<Result<_>>()?;
            let vertex_buffers = instruction
                .vertex_buffers
                .iter()
                .map(|buffer| self.buffer_native(*buffer))
                .collect::<Result<_>>()?;
            let index = match instruction.index {
                Some((buffer, format)) => Some((self.buffer_native(buffer)?, format)),
                None => None,
            };

            let call = match instruction.index {
                Some((buffer, _)) => DrawCall::Indexed {
                    indices: match instruction.count {
                        Some(count) => count,
                        None => self.buffer(buffer)?.element_capacity(),
                    },
                    instances: instruction.instances,
                },
                None => DrawCall::Draw {
                    vertices: match (instruction.count, instruction.vertex_buffers.first()) {
                        (Some(count), _) => count,
                        (None, Some(buffer)) => self.buffer(*buffer)?.element_capacity(),
                        (None, None) => 0,
                    },
                    instances: instruction.instances,
                },
            };
            draws.push(CompiledDraw {
                pipeline,
                bind_groups,
                vertex_buffers,
                index,
                call,
            });
        }
        log::trace!("Compiled {} draws for {id:?}", draws.len());
        Ok(draws)
    }

    /// The pass bundle, re-recorded only when the pass was invalidated.
    fn render_bundle(&mut self, id: RenderPassId) -> Result<RawRenderBundleId> {
        let slot = lookup(&self.render_passes, id)?;
        if let Some(bundle) = slot.fresh() {
            return Ok(bundle);
        }
        let targets: Vec<_> = slot.value.color_targets().iter().map(|t| t.texture).collect();
        let depth = slot.value.depth_target().map(|t| t.texture);

        let mut color_formats = Vec::with_capacity(targets.len());
        let mut sample_count = 1;
        for texture in targets {
            let texture = self.texture(texture)?;
            color_formats.push(texture.format());
            sample_count = texture.sample_count();
        }
        let depth_format = match depth {
            Some(texture) => {
                let texture = self.texture(texture)?;
                sample_count = texture.sample_count();
                Some(texture.format())
            }
            None => None,
        };
        let draws = self.compile_render_pass(id)?;

        let slot = lookup_mut(&mut self.render_passes, id)?;
        let label = slot.cache.label().to_owned();
        slot.cache.read(&mut BundleOps {
            device: &mut self.device,
            draws: &draws,
            color_formats: &color_formats,
            depth_format,
            sample_count,
            label: &label,
        })
    }

    fn encode_render_pass(&mut self, encoder: RawEncoderId, id: RenderPassId) -> Result<()> {
        let slot = lookup(&self.render_passes, id)?;
        let label = slot.cache.label().to_owned();
        let bundle_mode = slot.value.bundle_mode();
        let color_targets = slot.value.color_targets().to_vec();
        let depth_target = slot.value.depth_target().copied();

        let mut color_attachments = Vec::with_capacity(color_targets.len());
        for target in color_targets {
            color_attachments.push(RawColorAttachment {
                view: self.texture_native(target.texture)?.view,
                load: target.load,
                store: target.store,
            });
        }
        let depth_attachment = match depth_target {
            Some(target) => Some(RawDepthAttachment {
                view: self.texture_native(target.texture)?.view,
                load: target.load,
                store: target.store,
            }),
            None => None,
        };

        let (bundle, draws) = if bundle_mode {
            (Some(self.render_bundle(id)?), Vec::new())
        } else {
            (None, self.compile_render_pass(id)?)
        };

        let mut pass = self.device.begin_render_pass(
            encoder,
            &RawRenderPassDesc {
                label: Some(&label),
                color_attachments: &color_attachments,
                depth_attachment,
            },
        )?;
        match bundle {
            Some(bundle) => pass.execute_bundles(&[bundle]),
            None => encode_draws(&mut pass, &draws),
        }
        pass.end();
        Ok(())
    }

    // ========================================================================
    // Compute Passes
    // ========================================================================

    pub fn create_compute_pass(&mut self, label: impl Into<String>) -> ComputePassId {
        let label = label.into();
        let native_label = self.settings.label(&label);
        self.compute_passes.insert(Slot::new(
            ComputePass::new(label),
            native_label,
            Lifetime::Persistent,
        ))
    }

    pub fn compute_pass(&self, id: ComputePassId) -> Result<&ComputePass> {
        Ok(&lookup(&self.compute_passes, id)?.value)
    }

    pub fn add_compute_step(&mut self, pass: ComputePassId, step: ComputeStep) -> Result<StepId> {
        lookup(&self.compute_passes, pass)?;
        let layout = lookup(&self.compute_pipelines, step.pipeline)?.value.layout();
        let bind_groups = self.resolve_groups(layout, &step.bind_groups)?;

        self.add_listener(step.pipeline, Listener::new(pass, Invalidation::PIPELINE))?;
        for group in &bind_groups {
            self.add_listener(*group, Listener::new(pass, Invalidation::BINDINGS))?;
        }
        let step_id = lookup_mut(&mut self.compute_passes, pass)?
            .value
            .steps
            .push(ComputeInstruction {
                pipeline: step.pipeline,
                bind_groups,
                workgroups: step.workgroups,
            });
        self.invalidate(pass, Invalidation::INSTRUCTIONS);
        Ok(step_id)
    }

    pub fn remove_compute_step(&mut self, pass: ComputePassId, step: StepId) -> Result<()> {
        let instruction = lookup_mut(&mut self.compute_passes, pass)?
            .value
            .steps
            .remove(step)
            .ok_or_else(|| Error::UnknownResource(format!("{step:?} in {pass:?}")))?;

        self.remove_listener(instruction.pipeline, &Listener::new(pass, Invalidation::PIPELINE));
        for group in &instruction.bind_groups {
            self.remove_listener(*group, &Listener::new(pass, Invalidation::BINDINGS));
        }
        self.invalidate(pass, Invalidation::INSTRUCTIONS);
        Ok(())
    }

    fn encode_compute_pass(&mut self, encoder: RawEncoderId, id: ComputePassId) -> Result<()> {
        let slot = lookup(&self.compute_passes, id)?;
        let label = slot.cache.label().to_owned();
        let instructions: Vec<ComputeInstruction> = slot.value.steps.iter().cloned().collect();

        let mut dispatches = Vec::with_capacity(instructions.len());
        for instruction in instructions {
            dispatches.push(CompiledDispatch {
                pipeline: self.compute_pipeline_native(instruction.pipeline)?,
                bind_groups: instruction
                    .bind_groups
                    .iter()
                    .map(|group| self.bind_group_native(*group))
                    .collect::<Result<_>>()?,
                workgroups: instruction.workgroups,
            });
        }

        lookup_mut(&mut self.compute_passes, id)?.cache.read(&mut NoNative)?;

        let mut pass = self.device.begin_compute_pass(encoder, Some(&label))?;
        encode_dispatches(&mut pass, &dispatches);
        pass.end();
        Ok(())
    }

    // ========================================================================
    // Execution
    // ========================================================================

    /// Encodes every pass of `execution` in order into one command buffer and
    /// submits it. Afterwards staging buffers are reclaimed and the logical
    /// frame advances.
    pub fn submit(&mut self, execution: &Execution) -> Result<()> {
        let encoder = self.device.create_command_encoder(Some(execution.label()))?;
        for pass in execution.passes() {
            match *pass {
                PassRef::Render(id) => self.encode_render_pass(encoder, id)?,
                PassRef::Compute(id) => self.encode_compute_pass(encoder, id)?,
            }
        }
        self.device.submit(encoder)?;
        self.device.poll(false);
        self.reclaim_staging();
        self.tick_frame();
        Ok(())
    }
}
