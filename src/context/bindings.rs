use super::{Gpu, STRUCTURAL, Slot, lookup, lookup_mut};
use crate::binding::group::{BindGroupLayoutOps, BindGroupOps};
use crate::binding::pipeline_layout::PipelineLayoutOps;
use crate::binding::{
    BindGroup, BindGroupDescriptor, BindGroupLayout, BindingLayout, BindingSlot, PipelineLayout,
    StorageAccess,
};
use crate::device::{
    GpuDevice, RawBindGroupEntry, RawBindGroupId, RawBindGroupLayoutId, RawBindingResource,
    RawPipelineLayoutId,
};
use crate::errors::{Error, Result};
use crate::handles::{BindGroupId, BindGroupLayoutId, PipelineLayoutId};
use crate::native::{Invalidation, Lifetime, Listener, ResourceKey};
use crate::resources::{BindingResource, ResourceKind, Texture};

impl<D: GpuDevice> Gpu<D> {
    // ========================================================================
    // Bind Group Layouts
    // ========================================================================

    pub fn create_bind_group_layout(&mut self, layout: BindGroupLayout) -> BindGroupLayoutId {
        let label = self.settings.label(layout.label());
        self.bind_group_layouts
            .insert(Slot::new(layout, label, Lifetime::Persistent))
    }

    pub fn bind_group_layout(&self, id: BindGroupLayoutId) -> Result<&BindGroupLayout> {
        Ok(&lookup(&self.bind_group_layouts, id)?.value)
    }

    /// Adds a binding to a layout that nothing references yet.
    pub fn add_binding(
        &mut self,
        id: BindGroupLayoutId,
        index: u32,
        name: impl Into<String>,
        visibility: wgpu::ShaderStages,
        access: StorageAccess,
        layout: impl Into<BindingLayout>,
    ) -> Result<()> {
        lookup_mut(&mut self.bind_group_layouts, id)?
            .value
            .add_binding(index, name, visibility, access, layout)?;
        self.invalidate(id, Invalidation::LAYOUT);
        Ok(())
    }

    fn seal_layout(&mut self, id: BindGroupLayoutId) -> Result<()> {
        lookup_mut(&mut self.bind_group_layouts, id)?.value.seal();
        Ok(())
    }

    pub fn bind_group_layout_native(&mut self, id: BindGroupLayoutId) -> Result<RawBindGroupLayoutId> {
        let slot = lookup_mut(&mut self.bind_group_layouts, id)?;
        if let Some(handle) = slot.fresh() {
            return Ok(handle);
        }
        let label = slot.cache.label().to_owned();
        slot.cache.read(&mut BindGroupLayoutOps {
            device: &mut self.device,
            layout: &slot.value,
            label: &label,
        })
    }

    // ========================================================================
    // Bind Groups
    // ========================================================================

    /// Creates an empty bind group and seals its layout.
    pub fn create_bind_group(&mut self, desc: BindGroupDescriptor) -> Result<BindGroupId> {
        let slot_count = self.bind_group_layout(desc.layout)?.len();
        self.seal_layout(desc.layout)?;

        let label = self.settings.label(&desc.label);
        let group = BindGroup::new(desc.label, desc.layout, slot_count);
        let id = self
            .bind_groups
            .insert(Slot::new(group, label, desc.lifetime));
        self.add_listener(desc.layout, Listener::new(id, Invalidation::LAYOUT))?;
        self.track_lifetime(id.into(), desc.lifetime);
        Ok(id)
    }

    pub fn bind_group(&self, id: BindGroupId) -> Result<&BindGroup> {
        Ok(&lookup(&self.bind_groups, id)?.value)
    }

    /// Binds `resource` to the slot called `name`.
    ///
    /// The resource's usage grows to what the slot needs, and the group starts
    /// listening to the resource instead of whatever was bound before.
    pub fn bind(
        &mut self,
        group: BindGroupId,
        name: &str,
        resource: impl Into<BindingResource>,
    ) -> Result<()> {
        let resource = resource.into();
        let layout_id = lookup(&self.bind_groups, group)?.value.layout();
        let layout = &lookup(&self.bind_group_layouts, layout_id)?.value;
        let (pos, slot) = layout.slot(name).ok_or_else(|| {
            Error::LayoutMismatch(format!(
                "layout '{}' has no binding named '{name}'",
                layout.label()
            ))
        })?;
        let slot = slot.clone();
        self.check_binding(&slot, resource)?;

        match resource {
            BindingResource::Buffer(id) => self.extend_buffer_usage(id, slot.buffer_usage())?,
            BindingResource::Texture(id) => self.extend_texture_usage(id, slot.texture_usage())?,
            BindingResource::Sampler(_) => {}
        }

        let edge = Listener::new(group, Invalidation::BINDINGS).filtered(STRUCTURAL);
        let previous = lookup_mut(&mut self.bind_groups, group)?
            .value
            .set(pos, resource);
        if previous == Some(resource) {
            return Ok(());
        }
        if let Some(previous) = previous {
            self.remove_listener(previous, &edge);
        }
        self.add_listener(resource, edge)?;
        log::trace!("Bound {resource:?} to '{name}' of {group:?}");
        self.invalidate(group, Invalidation::BINDINGS);
        Ok(())
    }

    /// Kind, size, format and sampling checks of `resource` against `slot`.
    fn check_binding(&self, slot: &BindingSlot, resource: BindingResource) -> Result<()> {
        match resource {
            BindingResource::Buffer(id) => check_slot(slot, Candidate::Buffer(self.buffer(id)?.byte_size())),
            BindingResource::Texture(id) => check_slot(slot, Candidate::Texture(self.texture(id)?)),
            BindingResource::Sampler(id) => {
                check_slot(slot, Candidate::Sampler(self.sampler(id)?.binding_type()))
            }
        }
    }

    /// Checks `candidate`, the reconfigured state of `resource`, against
    /// every slot `resource` is currently bound to.
    pub(crate) fn check_bound_slots(&self, resource: BindingResource, candidate: Candidate<'_>) -> Result<()> {
        for key in self.dependents(resource.into()) {
            let ResourceKey::BindGroup(group) = key else {
                continue;
            };
            let group = &lookup(&self.bind_groups, group)?.value;
            let layout = &lookup(&self.bind_group_layouts, group.layout())?.value;
            for (pos, slot) in layout.slots().iter().enumerate() {
                if group.resource(pos) == Some(resource) {
                    check_slot(slot, candidate).map_err(|err| {
                        log::warn!("Rejected change of {resource:?}, bound in '{}': {err}", group.label());
                        err
                    })?;
                }
            }
        }
        Ok(())
    }

    /// Up-to-date native bind group. Fails with `MissingRequiredBinding` while
    /// any slot is unbound.
    pub fn bind_group_native(&mut self, id: BindGroupId) -> Result<RawBindGroupId> {
        let slot = lookup(&self.bind_groups, id)?;
        if let Some(handle) = slot.fresh() {
            return Ok(handle);
        }
        let group = &slot.value;
        let layout_id = group.layout();
        let layout = &lookup(&self.bind_group_layouts, layout_id)?.value;
        group.check_complete(layout)?;
        let bound: Vec<(u32, BindingResource)> = layout
            .slots()
            .iter()
            .map(|s| s.index)
            .zip(group.resources())
            .collect();

        let raw_layout = self.bind_group_layout_native(layout_id)?;
        let mut entries = Vec::with_capacity(bound.len());
        for (binding, resource) in bound {
            let resource = match resource {
                BindingResource::Buffer(buffer) => RawBindingResource::Buffer {
                    buffer: self.buffer_native(buffer)?,
                    offset: 0,
                    size: None,
                },
                BindingResource::Texture(texture) => {
                    RawBindingResource::TextureView(self.texture_native(texture)?.view)
                }
                BindingResource::Sampler(sampler) => {
                    RawBindingResource::Sampler(self.sampler_native(sampler)?)
                }
            };
            entries.push(RawBindGroupEntry { binding, resource });
        }

        let slot = lookup_mut(&mut self.bind_groups, id)?;
        let label = slot.cache.label().to_owned();
        slot.cache.read(&mut BindGroupOps {
            device: &mut self.device,
            layout: raw_layout,
            entries: &entries,
            label: &label,
        })
    }

    // ========================================================================
    // Pipeline Layouts
    // ========================================================================

    /// Registers a pipeline layout and seals every bind group layout it names.
    pub fn create_pipeline_layout(&mut self, layout: PipelineLayout) -> Result<PipelineLayoutId> {
        let referenced: Vec<BindGroupLayoutId> =
            layout.groups().iter().filter_map(|g| g.layout).collect();
        for group_layout in &referenced {
            lookup(&self.bind_group_layouts, *group_layout)?;
        }

        let label = self.settings.label(layout.label());
        let id = self
            .pipeline_layouts
            .insert(Slot::new(layout, label, Lifetime::Persistent));
        for group_layout in referenced {
            self.seal_layout(group_layout)?;
            self.add_listener(group_layout, Listener::new(id, Invalidation::LAYOUT))?;
        }
        Ok(id)
    }

    pub fn pipeline_layout(&self, id: PipelineLayoutId) -> Result<&PipelineLayout> {
        Ok(&lookup(&self.pipeline_layouts, id)?.value)
    }

    /// Gives the placeholder group `name` its layout.
    pub fn assign_placeholder(
        &mut self,
        id: PipelineLayoutId,
        name: &str,
        layout: BindGroupLayoutId,
    ) -> Result<()> {
        lookup(&self.bind_group_layouts, layout)?;
        lookup_mut(&mut self.pipeline_layouts, id)?
            .value
            .assign(name, layout)?;
        self.seal_layout(layout)?;
        self.add_listener(layout, Listener::new(id, Invalidation::LAYOUT))?;
        self.invalidate(id, Invalidation::LAYOUT);
        Ok(())
    }

    /// Swaps the layout of the initial group `name` for a compatible one.
    ///
    /// Every pipeline using the layout, and every pass using those pipelines,
    /// is invalidated.
    pub fn replace_group(
        &mut self,
        id: PipelineLayoutId,
        name: &str,
        replacement: BindGroupLayoutId,
    ) -> Result<()> {
        let current = lookup(&self.pipeline_layouts, id)?.value.replaceable(name)?;
        if current == replacement {
            return Ok(());
        }
        let old = &lookup(&self.bind_group_layouts, current)?.value;
        let new = &lookup(&self.bind_group_layouts, replacement)?.value;
        old.check_replacement(new)?;

        lookup_mut(&mut self.pipeline_layouts, id)?
            .value
            .replace(name, replacement)?;
        self.seal_layout(replacement)?;
        let edge = Listener::new(id, Invalidation::LAYOUT);
        self.remove_listener(current, &edge);
        self.add_listener(replacement, edge)?;
        log::debug!("Replaced group '{name}' of {id:?}");
        self.invalidate(id, Invalidation::LAYOUT);
        Ok(())
    }

    pub fn pipeline_layout_native(&mut self, id: PipelineLayoutId) -> Result<RawPipelineLayoutId> {
        let slot = lookup(&self.pipeline_layouts, id)?;
        if let Some(handle) = slot.fresh() {
            return Ok(handle);
        }
        let layouts = slot.value.ordered_layouts()?;
        let groups = layouts
            .into_iter()
            .map(|layout| self.bind_group_layout_native(layout))
            .collect::<Result<Vec<_>>>()?;

        let slot = lookup_mut(&mut self.pipeline_layouts, id)?;
        let label = slot.cache.label().to_owned();
        slot.cache.read(&mut PipelineLayoutOps {
            device: &mut self.device,
            groups: &groups,
            label: &label,
        })
    }
}

/// The binding-relevant state of a resource, current or proposed.
#[derive(Clone, Copy)]
pub(crate) enum Candidate<'a> {
    /// Byte size.
    Buffer(u64),
    Texture(&'a Texture),
    Sampler(wgpu::SamplerBindingType),
}

impl Candidate<'_> {
    fn kind(self) -> ResourceKind {
        match self {
            Self::Buffer(_) => ResourceKind::Buffer,
            Self::Texture(_) => ResourceKind::Texture,
            Self::Sampler(_) => ResourceKind::Sampler,
        }
    }
}

fn check_slot(slot: &BindingSlot, candidate: Candidate<'_>) -> Result<()> {
    let mismatch = |reason: String| Err(Error::LayoutMismatch(format!("binding '{}': {reason}", slot.name)));

    match (&slot.layout, candidate) {
        (BindingLayout::Buffer(layout), Candidate::Buffer(size)) => {
            let required = layout.min_binding_size();
            if size < required {
                return Err(Error::SizeMismatch {
                    expected: required,
                    actual: size,
                });
            }
            Ok(())
        }
        (BindingLayout::Texture(expected), Candidate::Texture(texture)) => {
            if slot.access != StorageAccess::None {
                if expected.format != Some(texture.format()) {
                    return mismatch(format!(
                        "storage format {:?} expected, texture is {:?}",
                        expected.format,
                        texture.format()
                    ));
                }
                if !texture.format_supports(wgpu::TextureUsages::STORAGE_BINDING) {
                    return mismatch(format!("{:?} cannot be a storage texture", texture.format()));
                }
            }
            if expected.multisampled != (texture.sample_count() > 1) {
                return mismatch("multisampling differs".to_string());
            }
            if expected.view_dimension != texture.view_dimension() {
                return mismatch(format!(
                    "view dimension {:?} expected, texture has {:?}",
                    expected.view_dimension,
                    texture.view_dimension()
                ));
            }
            Ok(())
        }
        (BindingLayout::Sampler(expected), Candidate::Sampler(actual)) => {
            // A filtering slot also accepts a non-filtering sampler.
            let compatible = actual == expected.binding_type
                || (expected.binding_type == wgpu::SamplerBindingType::Filtering
                    && actual == wgpu::SamplerBindingType::NonFiltering);
            if compatible {
                Ok(())
            } else {
                mismatch(format!("{:?} sampler expected, got {actual:?}", expected.binding_type))
            }
        }
        (layout, candidate) => mismatch(format!(
            "{:?} resource bound to a {:?} slot",
            candidate.kind(),
            layout.kind()
        )),
    }
}
