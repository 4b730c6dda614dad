use crate::device::{GpuDevice, RawSamplerId, SamplerDesc};
use crate::errors::Result;
use crate::native::{Invalidation, NativeOps};

#[derive(Debug, Clone, PartialEq)]
pub struct SamplerDescriptor {
    pub label: String,
    pub address_mode: wgpu::AddressMode,
    pub mag_filter: wgpu::FilterMode,
    pub min_filter: wgpu::FilterMode,
    pub compare: Option<wgpu::CompareFunction>,
}

impl SamplerDescriptor {
    pub fn linear(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            address_mode: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            compare: None,
        }
    }

    pub fn nearest(label: impl Into<String>) -> Self {
        Self {
            mag_filter: wgpu::FilterMode::Nearest,
            min_filter: wgpu::FilterMode::Nearest,
            ..Self::linear(label)
        }
    }

    /// Depth comparison sampler, e.g. for shadow maps.
    pub fn comparison(label: impl Into<String>, compare: wgpu::CompareFunction) -> Self {
        Self {
            compare: Some(compare),
            ..Self::linear(label)
        }
    }
}

#[derive(Debug, Clone)]
pub struct Sampler {
    desc: SamplerDescriptor,
}

impl Sampler {
    pub(crate) fn new(desc: SamplerDescriptor) -> Self {
        Self { desc }
    }

    #[must_use]
    pub fn descriptor(&self) -> &SamplerDescriptor {
        &self.desc
    }

    /// The binding type shaders must declare for this sampler.
    #[must_use]
    pub fn binding_type(&self) -> wgpu::SamplerBindingType {
        if self.desc.compare.is_some() {
            wgpu::SamplerBindingType::Comparison
        } else if self.desc.mag_filter == wgpu::FilterMode::Linear
            || self.desc.min_filter == wgpu::FilterMode::Linear
        {
            wgpu::SamplerBindingType::Filtering
        } else {
            wgpu::SamplerBindingType::NonFiltering
        }
    }

    pub(crate) fn set_descriptor(&mut self, desc: SamplerDescriptor) -> Invalidation {
        if desc == self.desc {
            return Invalidation::empty();
        }
        self.desc = desc;
        Invalidation::PROPERTIES
    }
}

pub(crate) struct SamplerOps<'a, D> {
    pub device: &'a mut D,
    pub sampler: &'a Sampler,
    pub label: &'a str,
}

impl<D: GpuDevice> NativeOps<RawSamplerId> for SamplerOps<'_, D> {
    fn generate(&mut self) -> Result<Option<RawSamplerId>> {
        let desc = &self.sampler.desc;
        let id = self.device.create_sampler(&SamplerDesc {
            label: Some(self.label),
            address_mode: desc.address_mode,
            mag_filter: desc.mag_filter,
            min_filter: desc.min_filter,
            compare: desc.compare,
        })?;
        Ok(Some(id))
    }

    fn destroy(&mut self, handle: RawSamplerId) {
        self.device.destroy_sampler(handle);
    }
}
