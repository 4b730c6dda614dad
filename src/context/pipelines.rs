use super::{Gpu, Slot, lookup, lookup_mut};
use crate::device::{GpuDevice, RawComputePipelineId, RawRenderPipelineId};
use crate::errors::Result;
use crate::handles::{ComputePipelineId, RenderPipelineId};
use crate::native::{Invalidation, Lifetime, Listener};
use crate::pipeline::{
    ComputePipeline, ComputePipelineDescriptor, ComputePipelineOps, RenderPipeline,
    RenderPipelineDescriptor, RenderPipelineOps,
};

impl<D: GpuDevice> Gpu<D> {
    pub fn create_render_pipeline(&mut self, desc: RenderPipelineDescriptor) -> Result<RenderPipelineId> {
        lookup(&self.pipeline_layouts, desc.layout)?;
        let layout = desc.layout;
        let label = self.settings.label(&desc.label);
        let pipeline = RenderPipeline::new(desc)?;
        let id = self
            .render_pipelines
            .insert(Slot::new(pipeline, label, Lifetime::Persistent));
        self.add_listener(layout, Listener::new(id, Invalidation::PIPELINE))?;
        Ok(id)
    }

    pub fn create_compute_pipeline(&mut self, desc: ComputePipelineDescriptor) -> Result<ComputePipelineId> {
        lookup(&self.pipeline_layouts, desc.layout)?;
        let layout = desc.layout;
        let label = self.settings.label(&desc.label);
        let id = self.compute_pipelines.insert(Slot::new(
            ComputePipeline::new(desc),
            label,
            Lifetime::Persistent,
        ));
        self.add_listener(layout, Listener::new(id, Invalidation::PIPELINE))?;
        Ok(id)
    }

    pub fn render_pipeline(&self, id: RenderPipelineId) -> Result<&RenderPipeline> {
        Ok(&lookup(&self.render_pipelines, id)?.value)
    }

    pub fn compute_pipeline(&self, id: ComputePipelineId) -> Result<&ComputePipeline> {
        Ok(&lookup(&self.compute_pipelines, id)?.value)
    }

    pub fn render_pipeline_native(&mut self, id: RenderPipelineId) -> Result<RawRenderPipelineId> {
        let slot = lookup(&self.render_pipelines, id)?;
        if let Some(handle) = slot.fresh() {
            return Ok(handle);
        }
        let layout_id = slot.value.layout();
        let layout = self.pipeline_layout_native(layout_id)?;

        let slot = lookup_mut(&mut self.render_pipelines, id)?;
        let label = slot.cache.label().to_owned();
        slot.cache.read(&mut RenderPipelineOps {
            device: &mut self.device,
            pipeline: &slot.value,
            layout,
            label: &label,
        })
    }

    pub fn compute_pipeline_native(&mut self, id: ComputePipelineId) -> Result<RawComputePipelineId> {
        let slot = lookup(&self.compute_pipelines, id)?;
        if let Some(handle) = slot.fresh() {
            return Ok(handle);
        }
        let layout_id = slot.value.layout();
        let layout = self.pipeline_layout_native(layout_id)?;

        let slot = lookup_mut(&mut self.compute_pipelines, id)?;
        let label = slot.cache.label().to_owned();
        slot.cache.read(&mut ComputePipelineOps {
            device: &mut self.device,
            pipeline: &slot.value,
            layout,
            label: &label,
        })
    }
}
