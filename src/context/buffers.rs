use bytemuck::Pod;

use super::bindings::Candidate;
use super::{Gpu, Slot, lookup, lookup_mut};
use crate::device::{BufferDesc, GpuDevice, RawBufferId};
use crate::errors::{Error, Result};
use crate::handles::BufferId;
use crate::resources::buffer::BufferOps;
use crate::resources::{Buffer, BufferDescriptor, StagingStats};

impl<D: GpuDevice> Gpu<D> {
    // ========================================================================
    // Setup
    // ========================================================================

    pub fn create_buffer(&mut self, desc: BufferDescriptor) -> Result<BufferId> {
        let label = self.settings.label(&desc.label);
        let lifetime = desc.lifetime;
        let buffer = Buffer::new(desc, self.settings.staging_pool_limit)?;
        let id = self.buffers.insert(Slot::new(buffer, label, lifetime));
        self.track_lifetime(id.into(), lifetime);
        Ok(id)
    }

    pub fn buffer(&self, id: BufferId) -> Result<&Buffer> {
        Ok(&lookup(&self.buffers, id)?.value)
    }

    /// Resizes the open tail. The native buffer is re-created on next use.
    ///
    /// Shrinking below the minimum size of a slot the buffer is bound to
    /// fails with `SizeMismatch` and changes nothing.
    pub fn set_buffer_element_count(&mut self, id: BufferId, count: u32) -> Result<()> {
        let size = lookup(&self.buffers, id)?.value.layout().byte_size(count);
        self.check_bound_slots(id.into(), Candidate::Buffer(size))?;
        let reason = lookup_mut(&mut self.buffers, id)?.value.set_element_count(count);
        if !reason.is_empty() {
            self.invalidate(id, reason);
        }
        Ok(())
    }

    /// Replaces the retained contents of the buffer.
    ///
    /// If the native buffer already exists the data is written in place right
    /// away, so consumers (and recorded bundles) never observe the change.
    pub fn set_buffer_contents(&mut self, id: BufferId, bytes: impl Into<Vec<u8>>) -> Result<()> {
        let slot = lookup_mut(&mut self.buffers, id)?;
        let reason = slot.value.set_contents(bytes.into())?;
        let live = slot.cache.is_setup() && !slot.cache.is_deconstructed();
        self.invalidate(id, reason);
        if live {
            self.buffer_native(id)?;
        }
        Ok(())
    }

    pub(crate) fn extend_buffer_usage(&mut self, id: BufferId, usage: wgpu::BufferUsages) -> Result<()> {
        let reason = lookup_mut(&mut self.buffers, id)?.value.extend_usage(usage);
        if !reason.is_empty() {
            log::debug!("Buffer {id:?} usage grows by {usage:?}");
            self.invalidate(id, reason);
        }
        Ok(())
    }

    /// Up-to-date native buffer.
    pub fn buffer_native(&mut self, id: BufferId) -> Result<RawBufferId> {
        let slot = lookup_mut(&mut self.buffers, id)?;
        if let Some(handle) = slot.fresh() {
            return Ok(handle);
        }
        let label = slot.cache.label().to_owned();
        let handle = slot.cache.read(&mut BufferOps {
            device: &mut self.device,
            buffer: &slot.value,
            label: &label,
        })?;
        slot.value.native_size = slot.value.byte_size();
        Ok(handle)
    }

    pub fn staging_stats(&self, id: BufferId) -> Result<StagingStats> {
        Ok(lookup(&self.buffers, id)?.value.staging.stats())
    }

    pub(crate) fn reclaim_staging(&mut self) {
        for slot in self.buffers.values_mut() {
            slot.value.staging.reclaim(&mut self.device);
        }
    }

    // ========================================================================
    // Transfers
    // ========================================================================

    /// Writes `data` at byte `offset`.
    ///
    /// The data goes through a pre-mapped staging buffer and a copy command.
    /// When every staging buffer of this resource is in flight the write
    /// falls back to a direct queue write.
    pub fn write_buffer(&mut self, id: BufferId, offset: u64, data: &[u8]) -> Result<()> {
        lookup(&self.buffers, id)?
            .value
            .check_access(offset, data.len() as u64)?;
        if data.is_empty() {
            return Ok(());
        }
        let target = self.buffer_native(id)?;

        let slot = lookup_mut(&mut self.buffers, id)?;
        let size = slot.value.byte_size();
        let label = format!("{}/staging", slot.cache.label());
        slot.value.staging.reclaim(&mut self.device);

        let Some(staging) = slot.value.staging.acquire(&mut self.device, size, &label)? else {
            if self.settings.staging_pool_limit > 0 {
                log::warn!(
                    "Staging pool of '{}' exhausted, writing directly",
                    slot.cache.label()
                );
            }
            self.device.write_buffer(target, offset, data)?;
            return Ok(());
        };

        if let Err(err) = stage_copy(&mut self.device, staging, target, offset, data, &label) {
            self.device.destroy_buffer(staging);
            return Err(err);
        }
        let task = self.device.map_buffer(staging, wgpu::MapMode::Write);
        slot.value.staging.push_in_flight(staging, size, task);
        Ok(())
    }

    /// Writes `bytes` to the range a layout path addresses, e.g.
    /// `"lights[2].color"`.
    pub fn write_at(&mut self, id: BufferId, path: &str, bytes: &[u8]) -> Result<()> {
        let location = lookup(&self.buffers, id)?.value.layout().locate(path)?;
        if bytes.len() as u64 != location.size {
            return Err(Error::SizeMismatch {
                expected: location.size,
                actual: bytes.len() as u64,
            });
        }
        self.write_buffer(id, location.offset, bytes)
    }

    pub fn write_pod<T: Pod>(&mut self, id: BufferId, offset: u64, data: &[T]) -> Result<()> {
        self.write_buffer(id, offset, bytemuck::cast_slice(data))
    }

    /// Reads `len` bytes at `offset` back from the device.
    ///
    /// Uses one persistent map-readable buffer per resource, re-created when
    /// the resource's byte size changes.
    pub async fn read_buffer(&mut self, id: BufferId, offset: u64, len: u64) -> Result<Vec<u8>> {
        lookup(&self.buffers, id)?.value.check_access(offset, len)?;
        if len == 0 {
            return Ok(Vec::new());
        }
        let source = self.buffer_native(id)?;

        let slot = lookup_mut(&mut self.buffers, id)?;
        let size = slot.value.byte_size();
        let staging = match slot.value.read_staging {
            Some((staging, staged)) if staged == size => staging,
            stale => {
                if let Some((old, _)) = stale {
                    self.device.destroy_buffer(old);
                }
                let label = format!("{}/readback", slot.cache.label());
                let staging = self.device.create_buffer(&BufferDesc {
                    label: Some(&label),
                    size,
                    usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
                    mapped_at_creation: false,
                })?;
                log::debug!("Allocated read staging '{label}' ({size} bytes)");
                slot.value.read_staging = Some((staging, size));
                staging
            }
        };

        let encoder = self.device.create_command_encoder(Some("readback"))?;
        self.device
            .copy_buffer_to_buffer(encoder, source, offset, staging, 0, len)?;
        self.device.submit(encoder)?;

        let task = self.device.map_buffer(staging, wgpu::MapMode::Read);
        self.device.poll(true);
        task.await.map_err(|err| Error::MapFailed(err.to_string()))?;

        let bytes = self.device.read_mapped(staging, 0, len)?;
        self.device.unmap_buffer(staging)?;
        Ok(bytes)
    }
}

/// Fills a mapped staging buffer and submits its copy into `target`.
fn stage_copy<D: GpuDevice>(
    device: &mut D,
    staging: RawBufferId,
    target: RawBufferId,
    offset: u64,
    data: &[u8],
    label: &str,
) -> Result<()> {
    device.write_mapped(staging, 0, data)?;
    device.unmap_buffer(staging)?;
    let encoder = device.create_command_encoder(Some(label))?;
    device.copy_buffer_to_buffer(encoder, staging, 0, target, offset, data.len() as u64)?;
    device.submit(encoder)?;
    Ok(())
}
