use crate::device::{GpuDevice, RawBindGroupEntry, RawBindGroupId, RawBindGroupLayoutId};
use crate::errors::{Error, Result};
use crate::handles::BindGroupLayoutId;
use crate::native::{Lifetime, NativeOps};
use crate::resources::BindingResource;

use super::layout::BindGroupLayout;

#[derive(Debug, Clone)]
pub struct BindGroupDescriptor {
    pub label: String,
    pub layout: BindGroupLayoutId,
    pub lifetime: Lifetime,
}

impl BindGroupDescriptor {
    pub fn new(label: impl Into<String>, layout: BindGroupLayoutId) -> Self {
        Self {
            label: label.into(),
            layout,
            lifetime: Lifetime::Persistent,
        }
    }

    #[must_use]
    pub fn with_lifetime(mut self, lifetime: Lifetime) -> Self {
        self.lifetime = lifetime;
        self
    }
}

/// Resources bound to the slots of one [`BindGroupLayout`].
///
/// `bound` runs parallel to the layout's slots (sorted by binding index).
#[derive(Debug, Clone)]
pub struct BindGroup {
    label: String,
    layout: BindGroupLayoutId,
    bound: Vec<Option<BindingResource>>,
}

impl BindGroup {
    pub(crate) fn new(label: String, layout: BindGroupLayoutId, slot_count: usize) -> Self {
        Self {
            label,
            layout,
            bound: vec![None; slot_count],
        }
    }

    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }

    #[must_use]
    pub fn layout(&self) -> BindGroupLayoutId {
        self.layout
    }

    /// Resource bound at slot position `pos`.
    #[must_use]
    pub fn resource(&self, pos: usize) -> Option<BindingResource> {
        self.bound.get(pos).copied().flatten()
    }

    pub fn resources(&self) -> impl Iterator<Item = BindingResource> + '_ {
        self.bound.iter().filter_map(|r| *r)
    }

    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.bound.iter().all(Option::is_some)
    }

    /// Fails with the first declared binding that has nothing bound.
    pub fn check_complete(&self, layout: &BindGroupLayout) -> Result<()> {
        match layout.slots().iter().zip(&self.bound).find(|(_, r)| r.is_none()) {
            Some((slot, _)) => Err(Error::MissingRequiredBinding {
                name: slot.name.clone(),
                index: slot.index,
            }),
            None => Ok(()),
        }
    }

    /// Stores `resource` at `pos` and returns what was bound before.
    pub(crate) fn set(&mut self, pos: usize, resource: BindingResource) -> Option<BindingResource> {
        self.bound[pos].replace(resource)
    }
}

pub(crate) struct BindGroupOps<'a, D> {
    pub device: &'a mut D,
    pub layout: RawBindGroupLayoutId,
    pub entries: &'a [RawBindGroupEntry],
    pub label: &'a str,
}

impl<D: GpuDevice> NativeOps<RawBindGroupId> for BindGroupOps<'_, D> {
    fn generate(&mut self) -> Result<Option<RawBindGroupId>> {
        let id = self
            .device
            .create_bind_group(Some(self.label), self.layout, self.entries)?;
        Ok(Some(id))
    }

    fn destroy(&mut self, handle: RawBindGroupId) {
        self.device.destroy_bind_group(handle);
    }
}

pub(crate) struct BindGroupLayoutOps<'a, D> {
    pub device: &'a mut D,
    pub layout: &'a BindGroupLayout,
    pub label: &'a str,
}

impl<D: GpuDevice> NativeOps<RawBindGroupLayoutId> for BindGroupLayoutOps<'_, D> {
    fn generate(&mut self) -> Result<Option<RawBindGroupLayoutId>> {
        let id = self
            .device
            .create_bind_group_layout(Some(self.label), &self.layout.entries())?;
        Ok(Some(id))
    }

    fn destroy(&mut self, handle: RawBindGroupLayoutId) {
        self.device.destroy_bind_group_layout(handle);
    }
}
