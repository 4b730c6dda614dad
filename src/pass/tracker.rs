//! State-tracking wrapper around a pass recorder.
//!
//! Skips redundant state changes: a pipeline, bind group, vertex buffer or
//! index buffer is only set when it differs (by raw id) from what is bound.
//! When the pipeline changes, bind group indices the new pipeline does not
//! use but the previous one did are explicitly unbound.

use smallvec::SmallVec;

use crate::device::{
    BindingCommands, ComputeCommands, RawBindGroupId, RawBufferId, RawComputePipelineId,
    RawRenderPipelineId, RenderCommands,
};

pub(crate) struct TrackedPass<'s, S, P> {
    pass: &'s mut S,
    current_pipeline: Option<P>,
    /// Bind group count of the current pipeline.
    pipeline_group_count: usize,
    current_bind_groups: SmallVec<[Option<RawBindGroupId>; 4]>,
    current_vertex_buffers: SmallVec<[Option<RawBufferId>; 8]>,
    current_index_buffer: Option<(RawBufferId, wgpu::IndexFormat)>,
}

impl<'s, S: BindingCommands, P: Copy + PartialEq> TrackedPass<'s, S, P> {
    pub fn new(pass: &'s mut S) -> Self {
        Self {
            pass,
            current_pipeline: None,
            pipeline_group_count: 0,
            current_bind_groups: SmallVec::new(),
            current_vertex_buffers: SmallVec::new(),
            current_index_buffer: None,
        }
    }

    fn switch_pipeline(&mut self, pipeline: P, group_count: usize, set: impl FnOnce(&mut S, P)) {
        if self.current_pipeline == Some(pipeline) {
            return;
        }
        set(&mut *self.pass, pipeline);

        for index in group_count..self.pipeline_group_count {
            if let Some(slot) = self.current_bind_groups.get_mut(index)
                && slot.take().is_some()
            {
                log::trace!("Unbinding stale bind group {index}");
                self.pass.set_bind_group(index as u32, None);
            }
        }

        self.current_pipeline = Some(pipeline);
        self.pipeline_group_count = group_count;
    }

    pub fn set_bind_group(&mut self, index: u32, group: RawBindGroupId) {
        let slot = index as usize;
        if self.current_bind_groups.len() <= slot {
            self.current_bind_groups.resize(slot + 1, None);
        }
        if self.current_bind_groups[slot] != Some(group) {
            self.pass.set_bind_group(index, Some(group));
            self.current_bind_groups[slot] = Some(group);
        }
    }
}

impl<S: RenderCommands> TrackedPass<'_, S, RawRenderPipelineId> {
    pub fn set_pipeline(&mut self, pipeline: RawRenderPipelineId, group_count: usize) {
        self.switch_pipeline(pipeline, group_count, |pass, p| pass.set_pipeline(p));
    }

    pub fn set_vertex_buffer(&mut self, slot: u32, buffer: RawBufferId) {
        let index = slot as usize;
        if self.current_vertex_buffers.len() <= index {
            self.current_vertex_buffers.resize(index + 1, None);
        }
        if self.current_vertex_buffers[index] != Some(buffer) {
            self.pass.set_vertex_buffer(slot, buffer);
            self.current_vertex_buffers[index] = Some(buffer);
        }
    }

    pub fn set_index_buffer(&mut self, buffer: RawBufferId, format: wgpu::IndexFormat) {
        if self.current_index_buffer != Some((buffer, format)) {
            self.pass.set_index_buffer(buffer, format);
            self.current_index_buffer = Some((buffer, format));
        }
    }

    pub fn draw(&mut self, vertices: std::ops::Range<u32>, instances: std::ops::Range<u32>) {
        self.pass.draw(vertices, instances);
    }

    pub fn draw_indexed(&mut self, indices: std::ops::Range<u32>, instances: std::ops::Range<u32>) {
        self.pass.draw_indexed(indices, 0, instances);
    }
}

impl<S: ComputeCommands> TrackedPass<'_, S, RawComputePipelineId> {
    pub fn set_pipeline(&mut self, pipeline: RawComputePipelineId, group_count: usize) {
        self.switch_pipeline(pipeline, group_count, |pass, p| pass.set_pipeline(p));
    }

    pub fn dispatch(&mut self, [x, y, z]: [u32; 3]) {
        self.pass.dispatch_workgroups(x, y, z);
    }
}

#[cfg(test)]
mod tests {
    use slotmap::SlotMap;

    use super::*;
    use crate::device::DeviceCall;

    #[derive(Default)]
    struct Log(Vec<DeviceCall>);

    impl BindingCommands for Log {
        fn set_bind_group(&mut self, index: u32, group: Option<RawBindGroupId>) {
            self.0.push(DeviceCall::SetBindGroup { index, group });
        }
    }

    impl RenderCommands for Log {
        fn set_pipeline(&mut self, pipeline: RawRenderPipelineId) {
            self.0.push(DeviceCall::SetRenderPipeline(pipeline));
        }
        fn set_vertex_buffer(&mut self, slot: u32, buffer: RawBufferId) {
            self.0.push(DeviceCall::SetVertexBuffer { slot, buffer });
        }
        fn set_index_buffer(&mut self, buffer: RawBufferId, format: wgpu::IndexFormat) {
            self.0.push(DeviceCall::SetIndexBuffer { buffer, format });
        }
        fn draw(&mut self, vertices: std::ops::Range<u32>, instances: std::ops::Range<u32>) {
            self.0.push(DeviceCall::Draw { vertices, instances });
        }
        fn draw_indexed(&mut self, indices: std::ops::Range<u32>, base_vertex: i32, instances: std::ops::Range<u32>) {
            self.0.push(DeviceCall::DrawIndexed {
                indices,
                base_vertex,
                instances,
            });
        }
    }

    #[test]
    fn redundant_state_is_skipped() {
        let mut pipelines: SlotMap<RawRenderPipelineId, ()> = SlotMap::with_key();
        let mut groups: SlotMap<RawBindGroupId, ()> = SlotMap::with_key();
        let pipeline = pipelines.insert(());
        let (a, b) = (groups.insert(()), groups.insert(()));

        let mut log = Log::default();
        let mut pass: TrackedPass<'_, _, RawRenderPipelineId> = TrackedPass::new(&mut log);
        pass.set_pipeline(pipeline, 2);
        pass.set_bind_group(0, a);
        pass.set_bind_group(1, a);
        pass.set_pipeline(pipeline, 2);
        pass.set_bind_group(0, a);
        pass.set_bind_group(1, b);

        assert_eq!(
            log.0,
            vec![
                DeviceCall::SetRenderPipeline(pipeline),
                DeviceCall::SetBindGroup { index: 0, group: Some(a) },
                DeviceCall::SetBindGroup { index: 1, group: Some(a) },
                DeviceCall::SetBindGroup { index: 1, group: Some(b) },
            ]
        );
    }

    #[test]
    fn pipeline_change_unbinds_unused_groups() {
        let mut pipelines: SlotMap<RawRenderPipelineId, ()> = SlotMap::with_key();
        let mut groups: SlotMap<RawBindGroupId, ()> = SlotMap::with_key();
        let (wide, narrow) = (pipelines.insert(()), pipelines.insert(()));
        let group = groups.insert(());

        let mut log = Log::default();
        let mut pass: TrackedPass<'_, _, RawRenderPipelineId> = TrackedPass::new(&mut log);
        pass.set_pipeline(wide, 3);
        for index in 0..3 {
            pass.set_bind_group(index, group);
        }
        pass.set_pipeline(narrow, 1);

        assert_eq!(
            &log.0[4..],
            &[
                DeviceCall::SetRenderPipeline(narrow),
                DeviceCall::SetBindGroup { index: 1, group: None },
                DeviceCall::SetBindGroup { index: 2, group: None },
            ]
        );
    }
}
