//! Pass instruction compiler.
//!
//! Passes hold validated instructions in insertion order. At execution
//! time each instruction is resolved to raw device ids and fed through a
//! [`TrackedPass`](tracker::TrackedPass), which drops redundant state
//! changes. Render passes in bundle mode record that stream once into a
//! replayable bundle and replay it until something invalidates the pass.

pub mod compute;
pub mod execution;
pub mod render;
pub(crate) mod tracker;

use slotmap::SlotMap;

use crate::handles::StepId;

pub use compute::{ComputePass, ComputeStep};
pub use execution::{Execution, PassRef};
pub use render::{ColorTarget, DepthTarget, RenderPass, RenderPassDescriptor, RenderStep};

/// Instructions keyed by [`StepId`], iterated in insertion order.
#[derive(Debug, Clone)]
pub struct StepList<T> {
    steps: SlotMap<StepId, T>,
    order: Vec<StepId>,
}

impl<T> Default for StepList<T> {
    fn default() -> Self {
        Self {
            steps: SlotMap::with_key(),
            order: Vec::new(),
        }
    }
}

impl<T> StepList<T> {
    pub fn push(&mut self, step: T) -> StepId {
        let id = self.steps.insert(step);
        self.order.push(id);
        id
    }

    pub fn remove(&mut self, id: StepId) -> Option<T> {
        let step = self.steps.remove(id)?;
        self.order.retain(|s| *s != id);
        Some(step)
    }

    #[must_use]
    pub fn get(&self, id: StepId) -> Option<&T> {
        self.steps.get(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> + '_ {
        self.order.iter().filter_map(|id| self.steps.get(*id))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.order.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}
