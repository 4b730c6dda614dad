//! Buffer resources.
//!
//! A [`Buffer`] owns its [`MemoryLayout`], the element count of the layout's
//! open tail and a monotonically growing usage set. Its byte size is derived:
//!
//! ```text
//! byte_size = round_up_4(variable_size × element_count + fixed_size)
//! ```
//!
//! Every native buffer carries `COPY_SRC | COPY_DST` so uploads and
//! downloads never force re-creation.

use bytemuck::Pod;

use super::staging::StagingPool;
use crate::device::{BufferDesc, GpuDevice, RawBufferId};
use crate::errors::{Error, Result};
use crate::layout::MemoryLayout;
use crate::native::{Invalidation, Lifetime, NativeOps};

/// Usage bits every native buffer is created with.
pub const BASE_BUFFER_USAGE: wgpu::BufferUsages =
    wgpu::BufferUsages::COPY_SRC.union(wgpu::BufferUsages::COPY_DST);

/// Describes a buffer resource at creation.
#[derive(Debug, Clone)]
pub struct BufferDescriptor {
    pub label: String,
    pub layout: MemoryLayout,
    /// Number of tail elements; ignored by fully fixed layouts.
    pub element_count: u32,
    pub usage: wgpu::BufferUsages,
    /// Initial data; must match the computed byte size exactly.
    pub contents: Option<Vec<u8>>,
    pub lifetime: Lifetime,
}

impl BufferDescriptor {
    pub fn new(label: impl Into<String>, layout: MemoryLayout) -> Self {
        Self {
            label: label.into(),
            layout,
            element_count: 1,
            usage: wgpu::BufferUsages::empty(),
            contents: None,
            lifetime: Lifetime::Persistent,
        }
    }

    #[must_use]
    pub fn with_element_count(mut self, count: u32) -> Self {
        self.element_count = count;
        self
    }

    #[must_use]
    pub fn with_usage(mut self, usage: wgpu::BufferUsages) -> Self {
        self.usage = usage;
        self
    }

    #[must_use]
    pub fn with_contents(mut self, bytes: impl Into<Vec<u8>>) -> Self {
        self.contents = Some(bytes.into());
        self
    }

    #[must_use]
    pub fn with_pod_contents<T: Pod>(self, data: &[T]) -> Self {
        self.with_contents(bytemuck::cast_slice(data).to_vec())
    }

    #[must_use]
    pub fn with_lifetime(mut self, lifetime: Lifetime) -> Self {
        self.lifetime = lifetime;
        self
    }
}

#[derive(Debug)]
pub struct Buffer {
    label: String,
    layout: MemoryLayout,
    element_count: u32,
    usage: wgpu::BufferUsages,
    contents: Option<Vec<u8>>,
    pub(crate) staging: StagingPool,
    pub(crate) read_staging: Option<(RawBufferId, u64)>,
    /// Byte size of the current native buffer, 0 before the first creation.
    pub(crate) native_size: u64,
}

impl Buffer {
    pub(crate) fn new(desc: BufferDescriptor, staging_limit: usize) -> Result<Self> {
        let buffer = Self {
            label: desc.label,
            layout: desc.layout,
            element_count: desc.element_count,
            usage: desc.usage,
            contents: None,
            staging: StagingPool::new(staging_limit),
            read_staging: None,
            native_size: 0,
        };
        if let Some(bytes) = &desc.contents {
            buffer.check_contents(bytes)?;
        }
        Ok(Self {
            contents: desc.contents,
            ..buffer
        })
    }

    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }

    #[must_use]
    pub fn layout(&self) -> &MemoryLayout {
        &self.layout
    }

    #[must_use]
    pub fn element_count(&self) -> u32 {
        self.element_count
    }

    /// Declared usage, without the implicit copy bits.
    #[must_use]
    pub fn usage(&self) -> wgpu::BufferUsages {
        self.usage
    }

    #[must_use]
    pub fn byte_size(&self) -> u64 {
        self.layout.byte_size(self.element_count)
    }

    /// Vertices, indices or array entries held by the buffer.
    #[must_use]
    pub fn element_capacity(&self) -> u32 {
        self.layout.element_capacity(self.element_count)
    }

    fn check_contents(&self, bytes: &[u8]) -> Result<()> {
        let expected = self.byte_size();
        if bytes.len() as u64 == expected {
            Ok(())
        } else {
            Err(Error::SizeMismatch {
                expected,
                actual: bytes.len() as u64,
            })
        }
    }

    /// Offsets and lengths must be 4-byte aligned and in range.
    pub(crate) fn check_access(&self, offset: u64, len: u64) -> Result<()> {
        let alignment = wgpu::COPY_BUFFER_ALIGNMENT;
        if offset % alignment != 0 || len % alignment != 0 {
            return Err(Error::MisalignedAccess {
                offset,
                len,
                alignment,
            });
        }
        let size = self.byte_size();
        if offset.checked_add(len).is_none_or(|end| end > size) {
            return Err(Error::SizeMismatch {
                expected: size,
                actual: offset.saturating_add(len),
            });
        }
        Ok(())
    }

    pub(crate) fn set_element_count(&mut self, count: u32) -> Invalidation {
        if count == self.element_count {
            return Invalidation::empty();
        }
        self.element_count = count;
        if self.contents.take().is_some() {
            log::debug!("Buffer '{}' resized, dropping its initial contents", self.label);
        }
        Invalidation::SIZE
    }

    pub(crate) fn extend_usage(&mut self, usage: wgpu::BufferUsages) -> Invalidation {
        if self.usage.contains(usage) {
            return Invalidation::empty();
        }
        self.usage |= usage;
        Invalidation::USAGE
    }

    pub(crate) fn set_contents(&mut self, bytes: Vec<u8>) -> Result<Invalidation> {
        self.check_contents(&bytes)?;
        self.contents = Some(bytes);
        Ok(Invalidation::CONTENTS)
    }
}

pub(crate) struct BufferOps<'a, D> {
    pub device: &'a mut D,
    pub buffer: &'a Buffer,
    pub label: &'a str,
}

impl<D: GpuDevice> BufferOps<'_, D> {
    /// Copies the first `size` bytes of `old` into `new` on the queue.
    fn carry_over(&mut self, old: RawBufferId, new: RawBufferId, size: u64) -> Result<()> {
        let encoder = self.device.create_command_encoder(Some(self.label))?;
        self.device.copy_buffer_to_buffer(encoder, old, 0, new, 0, size)?;
        self.device.submit(encoder)?;
        Ok(())
    }
}

impl<D: GpuDevice> NativeOps<RawBufferId> for BufferOps<'_, D> {
    fn generate(&mut self) -> Result<Option<RawBufferId>> {
        let contents = self.buffer.contents.as_deref();
        let id = self.device.create_buffer(&BufferDesc {
            label: Some(self.label),
            size: self.buffer.byte_size(),
            usage: self.buffer.usage | BASE_BUFFER_USAGE,
            mapped_at_creation: contents.is_some(),
        })?;
        if let Some(bytes) = contents {
            self.device.write_mapped(id, 0, bytes)?;
            self.device.unmap_buffer(id)?;
        }
        Ok(Some(id))
    }

    fn update(&mut self, handle: RawBufferId, reasons: Invalidation) -> Result<bool> {
        match &self.buffer.contents {
            Some(bytes) if reasons == Invalidation::CONTENTS => {
                self.device.write_buffer(handle, 0, bytes)?;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    fn destroy(&mut self, handle: RawBufferId) {
        self.device.destroy_buffer(handle);
    }

    /// Written data outlives usage growth and resizes: the overlapping range
    /// of the old buffer is copied into the new one. A pending contents
    /// replacement wins over the old bytes.
    fn regenerate(
        &mut self,
        handle: RawBufferId,
        reasons: Invalidation,
    ) -> Result<Option<RawBufferId>> {
        let fresh = match self.generate() {
            Ok(fresh) => fresh,
            Err(err) => {
                self.destroy(handle);
                return Err(err);
            }
        };
        let kept = self.buffer.native_size.min(self.buffer.byte_size());
        if let Some(new) = fresh
            && kept > 0
            && !reasons.contains(Invalidation::CONTENTS)
        {
            if let Err(err) = self.carry_over(handle, new, kept) {
                self.destroy(new);
                self.destroy(handle);
                return Err(err);
            }
            log::debug!("Carried {kept} bytes of '{}' into its new buffer", self.label);
        }
        self.destroy(handle);
        Ok(fresh)
    }
}
