use super::bindings::Candidate;
use super::{Gpu, Slot, lookup, lookup_mut};
use crate::device::{GpuDevice, RawSamplerId};
use crate::errors::{Error, Result};
use crate::handles::{SamplerId, TextureId};
use crate::native::{Invalidation, Lifetime};
use crate::resources::sampler::SamplerOps;
use crate::resources::texture::TextureOps;
use crate::resources::{Sampler, SamplerDescriptor, Texture, TextureDescriptor, TextureNative};

impl<D: GpuDevice> Gpu<D> {
    // ========================================================================
    // Textures
    // ========================================================================

    pub fn create_texture(&mut self, desc: TextureDescriptor) -> Result<TextureId> {
        if desc.sample_count > 1 && desc.mip_level_count > 1 {
            return Err(Error::InvalidLayout(format!(
                "multisampled texture '{}' cannot have mip levels",
                desc.label
            )));
        }
        let label = self.settings.label(&desc.label);
        let lifetime = desc.lifetime;
        let id = self
            .textures
            .insert(Slot::new(Texture::new(desc), label, lifetime));
        self.track_lifetime(id.into(), lifetime);
        Ok(id)
    }

    pub fn texture(&self, id: TextureId) -> Result<&Texture> {
        Ok(&lookup(&self.textures, id)?.value)
    }

    /// Resizes the texture. Rejected with `LayoutMismatch` if a group it is
    /// bound to could no longer accept it.
    pub fn set_texture_size(&mut self, id: TextureId, size: wgpu::Extent3d) -> Result<()> {
        self.reconfigure_texture(id, |texture| texture.set_size(size))
    }

    /// Changes the format, with the same checks as [`set_texture_size`](Self::set_texture_size).
    pub fn set_texture_format(&mut self, id: TextureId, format: wgpu::TextureFormat) -> Result<()> {
        self.reconfigure_texture(id, |texture| texture.set_format(format))
    }

    /// Applies `change` to a copy first; the texture is only touched once
    /// every bound slot accepts the copy.
    fn reconfigure_texture(
        &mut self,
        id: TextureId,
        change: impl Fn(&mut Texture) -> Invalidation,
    ) -> Result<()> {
        let mut proposed = lookup(&self.textures, id)?.value.clone();
        if change(&mut proposed).is_empty() {
            return Ok(());
        }
        self.check_bound_slots(id.into(), Candidate::Texture(&proposed))?;
        let reason = change(&mut lookup_mut(&mut self.textures, id)?.value);
        self.invalidate(id, reason);
        Ok(())
    }

    pub(crate) fn extend_texture_usage(&mut self, id: TextureId, usage: wgpu::TextureUsages) -> Result<()> {
        let reason = lookup_mut(&mut self.textures, id)?.value.extend_usage(usage);
        if !reason.is_empty() {
            log::debug!("Texture {id:?} usage grows by {usage:?}");
            self.invalidate(id, reason);
        }
        Ok(())
    }

    /// Up-to-date native texture and its default view.
    pub fn texture_native(&mut self, id: TextureId) -> Result<TextureNative> {
        let slot = lookup_mut(&mut self.textures, id)?;
        if let Some(handle) = slot.fresh() {
            return Ok(handle);
        }
        let label = slot.cache.label().to_owned();
        slot.cache.read(&mut TextureOps {
            device: &mut self.device,
            texture: &slot.value,
            label: &label,
        })
    }

    /// Uploads mip level 0. `data` must cover the whole level.
    pub fn write_texture(&mut self, id: TextureId, data: &[u8]) -> Result<()> {
        let texture = &lookup(&self.textures, id)?.value;
        if texture.sample_count() > 1 {
            return Err(Error::LayoutMismatch(format!(
                "multisampled texture '{}' cannot be written",
                texture.label()
            )));
        }
        let (Some(bytes_per_row), Some(expected)) = (texture.bytes_per_row(), texture.level_size()) else {
            return Err(Error::LayoutMismatch(format!(
                "format {:?} of '{}' is not copyable",
                texture.format(),
                texture.label()
            )));
        };
        if data.len() as u64 != expected {
            return Err(Error::SizeMismatch {
                expected,
                actual: data.len() as u64,
            });
        }
        let size = texture.size();
        let native = self.texture_native(id)?;
        self.device
            .write_texture(native.texture, data, bytes_per_row, size)?;
        Ok(())
    }

    // ========================================================================
    // Samplers
    // ========================================================================

    pub fn create_sampler(&mut self, desc: SamplerDescriptor) -> SamplerId {
        let label = self.settings.label(&desc.label);
        self.samplers
            .insert(Slot::new(Sampler::new(desc), label, Lifetime::Persistent))
    }

    pub fn sampler(&self, id: SamplerId) -> Result<&Sampler> {
        Ok(&lookup(&self.samplers, id)?.value)
    }

    /// Replaces the sampler state; bind groups using it are rebuilt.
    ///
    /// A state whose binding type a bound slot rejects (e.g. comparison in a
    /// filtering slot) fails with `LayoutMismatch` and changes nothing.
    pub fn set_sampler(&mut self, id: SamplerId, desc: SamplerDescriptor) -> Result<()> {
        let binding_type = Sampler::new(desc.clone()).binding_type();
        self.check_bound_slots(id.into(), Candidate::Sampler(binding_type))?;
        let reason = lookup_mut(&mut self.samplers, id)?.value.set_descriptor(desc);
        if !reason.is_empty() {
            self.invalidate(id, reason);
        }
        Ok(())
    }

    pub fn sampler_native(&mut self, id: SamplerId) -> Result<RawSamplerId> {
        let slot = lookup_mut(&mut self.samplers, id)?;
        if let Some(handle) = slot.fresh() {
            return Ok(handle);
        }
        let label = slot.cache.label().to_owned();
        slot.cache.read(&mut SamplerOps {
            device: &mut self.device,
            sampler: &slot.value,
            label: &label,
        })
    }
}
