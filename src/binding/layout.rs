use std::num::NonZeroU64;

use serde::{Deserialize, Serialize};

use crate::errors::{Error, Result};
use crate::layout::{LayoutKind, MemoryLayout};
use crate::resources::ResourceKind;

/// How shaders access a binding. `None` means uniform buffer / sampled texture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum StorageAccess {
    #[default]
    None,
    Read,
    Write,
    ReadWrite,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextureBindingLayout {
    pub sample_type: wgpu::TextureSampleType,
    pub view_dimension: wgpu::TextureViewDimension,
    pub multisampled: bool,
    /// Required for storage access.
    pub format: Option<wgpu::TextureFormat>,
}

impl TextureBindingLayout {
    #[must_use]
    pub fn sampled(view_dimension: wgpu::TextureViewDimension) -> Self {
        Self {
            sample_type: wgpu::TextureSampleType::Float { filterable: true },
            view_dimension,
            multisampled: false,
            format: None,
        }
    }

    #[must_use]
    pub fn depth(view_dimension: wgpu::TextureViewDimension) -> Self {
        Self {
            sample_type: wgpu::TextureSampleType::Depth,
            ..Self::sampled(view_dimension)
        }
    }

    #[must_use]
    pub fn storage(format: wgpu::TextureFormat, view_dimension: wgpu::TextureViewDimension) -> Self {
        Self {
            sample_type: wgpu::TextureSampleType::Float { filterable: false },
            view_dimension,
            multisampled: false,
            format: Some(format),
        }
    }

    /// Sample type taken from the format table.
    #[must_use]
    pub fn for_format(format: wgpu::TextureFormat, view_dimension: wgpu::TextureViewDimension) -> Self {
        Self {
            sample_type: format
                .sample_type(None, None)
                .unwrap_or(wgpu::TextureSampleType::Float { filterable: true }),
            ..Self::sampled(view_dimension)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SamplerBindingLayout {
    pub binding_type: wgpu::SamplerBindingType,
}

/// What a binding slot accepts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BindingLayout {
    Buffer(MemoryLayout),
    Texture(TextureBindingLayout),
    Sampler(SamplerBindingLayout),
}

impl BindingLayout {
    #[must_use]
    pub fn kind(&self) -> ResourceKind {
        match self {
            Self::Buffer(_) => ResourceKind::Buffer,
            Self::Texture(_) => ResourceKind::Texture,
            Self::Sampler(_) => ResourceKind::Sampler,
        }
    }
}

impl From<MemoryLayout> for BindingLayout {
    fn from(layout: MemoryLayout) -> Self {
        Self::Buffer(layout)
    }
}

impl From<TextureBindingLayout> for BindingLayout {
    fn from(layout: TextureBindingLayout) -> Self {
        Self::Texture(layout)
    }
}

impl From<SamplerBindingLayout> for BindingLayout {
    fn from(layout: SamplerBindingLayout) -> Self {
        Self::Sampler(layout)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BindingSlot {
    pub index: u32,
    pub name: String,
    pub visibility: wgpu::ShaderStages,
    pub access: StorageAccess,
    pub layout: BindingLayout,
}

impl BindingSlot {
    fn validate(&self) -> Result<()> {
        let invalid = |reason: &str| Err(Error::InvalidLayout(format!("binding '{}': {reason}", self.name)));
        match (&self.layout, self.access) {
            (BindingLayout::Buffer(layout), _) if layout.kind() == LayoutKind::Vertex => {
                invalid("vertex layouts cannot be bound")
            }
            (BindingLayout::Buffer(layout), StorageAccess::None) if layout.is_open() => {
                invalid("uniform buffers cannot have an open-sized tail")
            }
            (BindingLayout::Texture(texture), access) if access != StorageAccess::None => {
                if texture.format.is_none() {
                    invalid("storage textures need a format")
                } else if texture.multisampled {
                    invalid("storage textures cannot be multisampled")
                } else {
                    Ok(())
                }
            }
            (BindingLayout::Sampler(_), access) if access != StorageAccess::None => {
                invalid("samplers have no storage access")
            }
            _ => Ok(()),
        }
    }

    /// Device entry for this slot.
    #[must_use]
    pub fn to_layout_entry(&self) -> wgpu::BindGroupLayoutEntry {
        let ty = match &self.layout {
            BindingLayout::Buffer(layout) => wgpu::BindingType::Buffer {
                ty: match self.access {
                    StorageAccess::None => wgpu::BufferBindingType::Uniform,
                    StorageAccess::Read => wgpu::BufferBindingType::Storage { read_only: true },
                    StorageAccess::Write | StorageAccess::ReadWrite => {
                        wgpu::BufferBindingType::Storage { read_only: false }
                    }
                },
                has_dynamic_offset: false,
                min_binding_size: NonZeroU64::new(layout.min_binding_size()),
            },
            BindingLayout::Texture(texture) => match (self.access, texture.format) {
                (StorageAccess::None, _) | (_, None) => wgpu::BindingType::Texture {
                    sample_type: texture.sample_type,
                    view_dimension: texture.view_dimension,
                    multisampled: texture.multisampled,
                },
                (access, Some(format)) => wgpu::BindingType::StorageTexture {
                    access: match access {
                        StorageAccess::Write => wgpu::StorageTextureAccess::WriteOnly,
                        StorageAccess::ReadWrite => wgpu::StorageTextureAccess::ReadWrite,
                        StorageAccess::Read | StorageAccess::None => {
                            wgpu::StorageTextureAccess::ReadOnly
                        }
                    },
                    format,
                    view_dimension: texture.view_dimension,
                },
            },
            BindingLayout::Sampler(sampler) => wgpu::BindingType::Sampler(sampler.binding_type),
        };
        wgpu::BindGroupLayoutEntry {
            binding: self.index,
            visibility: self.visibility,
            ty,
            count: None,
        }
    }

    /// Usage a bound buffer must carry.
    #[must_use]
    pub fn buffer_usage(&self) -> wgpu::BufferUsages {
        match self.access {
            StorageAccess::None => wgpu::BufferUsages::UNIFORM,
            _ => wgpu::BufferUsages::STORAGE,
        }
    }

    /// Usage a bound texture must carry.
    #[must_use]
    pub fn texture_usage(&self) -> wgpu::TextureUsages {
        match self.access {
            StorageAccess::None => wgpu::TextureUsages::TEXTURE_BINDING,
            _ => wgpu::TextureUsages::STORAGE_BINDING,
        }
    }
}

/// Named, indexed binding slots shared by bind groups and pipeline layouts.
///
/// Slots can be added until the layout is sealed, which happens as soon as
/// a bind group or pipeline layout references it.
#[derive(Debug, Clone)]
pub struct BindGroupLayout {
    label: String,
    slots: Vec<BindingSlot>,
    sealed: bool,
}

impl BindGroupLayout {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            slots: Vec::new(),
            sealed: false,
        }
    }

    /// Builder form of [`add_binding`](Self::add_binding).
    pub fn with_binding(
        mut self,
        index: u32,
        name: impl Into<String>,
        visibility: wgpu::ShaderStages,
        access: StorageAccess,
        layout: impl Into<BindingLayout>,
    ) -> Result<Self> {
        self.add_binding(index, name, visibility, access, layout)?;
        Ok(self)
    }

    /// Declares a binding. Fails without modifying the layout when the index
    /// or name is taken or the layout is sealed.
    pub fn add_binding(
        &mut self,
        index: u32,
        name: impl Into<String>,
        visibility: wgpu::ShaderStages,
        access: StorageAccess,
        layout: impl Into<BindingLayout>,
    ) -> Result<()> {
        let slot = BindingSlot {
            index,
            name: name.into(),
            visibility,
            access,
            layout: layout.into(),
        };
        if self.sealed {
            return Err(Error::SetupOrder(format!(
                "cannot add binding '{}' to sealed layout '{}'",
                slot.name, self.label
            )));
        }
        if self.slots.iter().any(|s| s.index == index) {
            return Err(Error::DuplicateIdentifier(format!(
                "binding index {index} in '{}'",
                self.label
            )));
        }
        if self.slots.iter().any(|s| s.name == slot.name) {
            return Err(Error::DuplicateIdentifier(format!(
                "binding name '{}' in '{}'",
                slot.name, self.label
            )));
        }
        slot.validate()?;

        let pos = self.slots.partition_point(|s| s.index < index);
        self.slots.insert(pos, slot);
        Ok(())
    }

    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Slots ordered by binding index.
    #[must_use]
    pub fn slots(&self) -> &[BindingSlot] {
        &self.slots
    }

    /// Position and slot of the binding called `name`.
    #[must_use]
    pub fn slot(&self, name: &str) -> Option<(usize, &BindingSlot)> {
        self.slots.iter().enumerate().find(|(_, s)| s.name == name)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    #[must_use]
    pub fn is_sealed(&self) -> bool {
        self.sealed
    }

    pub(crate) fn seal(&mut self) {
        self.sealed = true;
    }

    #[must_use]
    pub fn entries(&self) -> Vec<wgpu::BindGroupLayoutEntry> {
        self.slots.iter().map(BindingSlot::to_layout_entry).collect()
    }

    /// Checks that `replacement` can stand in for this layout: same binding
    /// count, same name per index, same or wider visibility, same storage
    /// access and same layout kind.
    pub fn check_replacement(&self, replacement: &BindGroupLayout) -> Result<()> {
        let mismatch = |reason: String| {
            Err(Error::LayoutMismatch(format!(
                "'{}' cannot replace '{}': {reason}",
                replacement.label, self.label
            )))
        };
        if self.slots.len() != replacement.slots.len() {
            return mismatch(format!(
                "{} bindings instead of {}",
                replacement.slots.len(),
                self.slots.len()
            ));
        }
        for (old, new) in self.slots.iter().zip(&replacement.slots) {
            if old.index != new.index || old.name != new.name {
                return mismatch(format!(
                    "binding {} is '{}', expected {} '{}'",
                    new.index, new.name, old.index, old.name
                ));
            }
            if !new.visibility.contains(old.visibility) {
                return mismatch(format!("binding '{}' narrows its visibility", old.name));
            }
            if old.access != new.access {
                return mismatch(format!("binding '{}' changes storage access", old.name));
            }
            let same_kind = match (&old.layout, &new.layout) {
                (BindingLayout::Buffer(a), BindingLayout::Buffer(b)) => a.kind() == b.kind(),
                (a, b) => a.kind() == b.kind(),
            };
            if !same_kind {
                return mismatch(format!("binding '{}' changes its layout kind", old.name));
            }
        }
        Ok(())
    }
}
