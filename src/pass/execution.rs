use crate::handles::{ComputePassId, RenderPassId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PassRef {
    Render(RenderPassId),
    Compute(ComputePassId),
}

impl From<RenderPassId> for PassRef {
    fn from(id: RenderPassId) -> Self {
        Self::Render(id)
    }
}

impl From<ComputePassId> for PassRef {
    fn from(id: ComputePassId) -> Self {
        Self::Compute(id)
    }
}

/// An ordered list of passes encoded into one command buffer.
///
/// Submitted with [`Gpu::submit`](crate::Gpu::submit), which also reclaims
/// staging buffers and ticks the logical frame.
#[derive(Debug, Clone, Default)]
pub struct Execution {
    label: String,
    passes: Vec<PassRef>,
}

impl Execution {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            passes: Vec::new(),
        }
    }

    #[must_use]
    pub fn then(mut self, pass: impl Into<PassRef>) -> Self {
        self.passes.push(pass.into());
        self
    }

    pub fn push(&mut self, pass: impl Into<PassRef>) {
        self.passes.push(pass.into());
    }

    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }

    #[must_use]
    pub fn passes(&self) -> &[PassRef] {
        &self.passes
    }
}
