//! Resource handles: buffers, textures and samplers.
//!
//! Each resource is plain CPU-side state. Its native object lives in the
//! [`NativeCache`](crate::native::NativeCache) next to it in the owning
//! [`Gpu`](crate::Gpu) arena and is produced by the per-kind `*Ops` types
//! defined here.

pub mod buffer;
pub mod sampler;
pub mod staging;
pub mod texture;

pub use buffer::{BASE_BUFFER_USAGE, Buffer, BufferDescriptor};
pub use sampler::{Sampler, SamplerDescriptor};
pub use staging::StagingStats;
pub use texture::{Texture, TextureDescriptor, TextureNative};

use crate::handles::{BufferId, SamplerId, TextureId};

/// Concrete kind of a bindable resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    Buffer,
    Texture,
    Sampler,
}

/// A resource that can be bound into a bind group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BindingResource {
    Buffer(BufferId),
    Texture(TextureId),
    Sampler(SamplerId),
}

impl BindingResource {
    #[must_use]
    pub fn kind(&self) -> ResourceKind {
        match self {
            Self::Buffer(_) => ResourceKind::Buffer,
            Self::Texture(_) => ResourceKind::Texture,
            Self::Sampler(_) => ResourceKind::Sampler,
        }
    }
}

impl From<BufferId> for BindingResource {
    fn from(id: BufferId) -> Self {
        Self::Buffer(id)
    }
}

impl From<TextureId> for BindingResource {
    fn from(id: TextureId) -> Self {
        Self::Texture(id)
    }
}

impl From<SamplerId> for BindingResource {
    fn from(id: SamplerId) -> Self {
        Self::Sampler(id)
    }
}

impl From<BindingResource> for crate::native::ResourceKey {
    fn from(resource: BindingResource) -> Self {
        match resource {
            BindingResource::Buffer(id) => id.into(),
            BindingResource::Texture(id) => id.into(),
            BindingResource::Sampler(id) => id.into(),
        }
    }
}
