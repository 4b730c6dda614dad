use smallvec::SmallVec;

use super::StepList;
use super::tracker::TrackedPass;
use crate::device::{ComputeCommands, RawBindGroupId, RawComputePipelineId};
use crate::errors::Result;
use crate::handles::{BindGroupId, ComputePipelineId};
use crate::native::NativeOps;

/// One dispatch of `workgroups` (x, y, z).
#[derive(Debug, Clone)]
pub struct ComputeStep {
    pub pipeline: ComputePipelineId,
    pub bind_groups: Vec<(String, BindGroupId)>,
    pub workgroups: [u32; 3],
}

impl ComputeStep {
    pub fn new(pipeline: ComputePipelineId, workgroups: [u32; 3]) -> Self {
        Self {
            pipeline,
            bind_groups: Vec::new(),
            workgroups,
        }
    }

    #[must_use]
    pub fn bind(mut self, name: impl Into<String>, group: BindGroupId) -> Self {
        self.bind_groups.push((name.into(), group));
        self
    }
}

#[derive(Debug, Clone)]
pub(crate) struct ComputeInstruction {
    pub pipeline: ComputePipelineId,
    pub bind_groups: SmallVec<[BindGroupId; 4]>,
    pub workgroups: [u32; 3],
}

/// Compute passes have no bundle mode; they are re-encoded every execution.
#[derive(Debug)]
pub struct ComputePass {
    label: String,
    pub(crate) steps: StepList<ComputeInstruction>,
}

impl ComputePass {
    pub(crate) fn new(label: String) -> Self {
        Self {
            label,
            steps: StepList::default(),
        }
    }

    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }

    #[must_use]
    pub fn step_count(&self) -> usize {
        self.steps.len()
    }
}

#[derive(Debug, Clone)]
pub(crate) struct CompiledDispatch {
    pub pipeline: RawComputePipelineId,
    pub bind_groups: SmallVec<[RawBindGroupId; 4]>,
    pub workgroups: [u32; 3],
}

pub(crate) fn encode_dispatches<S: ComputeCommands>(pass: &mut S, dispatches: &[CompiledDispatch]) {
    let mut tracked: TrackedPass<'_, S, RawComputePipelineId> = TrackedPass::new(pass);
    for dispatch in dispatches {
        tracked.set_pipeline(dispatch.pipeline, dispatch.bind_groups.len());
        for (index, group) in (0u32..).zip(&dispatch.bind_groups) {
            tracked.set_bind_group(index, *group);
        }
        tracked.dispatch(dispatch.workgroups);
    }
}

/// Compute passes own no native object; their cache only tracks
/// invalidation and deconstruction.
pub(crate) struct NoNative;

impl NativeOps<()> for NoNative {
    fn generate(&mut self) -> Result<Option<()>> {
        Ok(Some(()))
    }

    fn destroy(&mut self, (): ()) {}
}
