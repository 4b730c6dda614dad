//! Write-staging pool.
//!
//! Each buffer resource keeps a small pool of `MAP_WRITE | COPY_SRC` buffers
//! that are mapped and ready to receive data. A write takes a ready buffer,
//! fills it, unmaps it and copies it into the destination. The staging
//! buffer is then re-mapped asynchronously and sits in the in-flight list
//! until the map completes.
//!
//! ```text
//!        acquire              submit copy + map_async
//! ready ─────────► in use ─────────────────────────► in flight
//!   ▲                                                   │
//!   └────────────── reclaim: map ok ────────────────────┤
//!                   reclaim: map failed ──► destroyed ◄─┘
//! ```

use crate::device::{BufferDesc, DeviceError, GpuDevice, GpuTask, RawBufferId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct StagingBuffer {
    id: RawBufferId,
    size: u64,
}

/// Pool occupancy, exposed for diagnostics and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StagingStats {
    pub ready: usize,
    pub in_flight: usize,
}

#[derive(Debug)]
pub(crate) struct StagingPool {
    limit: usize,
    ready: Vec<StagingBuffer>,
    in_flight: Vec<(StagingBuffer, GpuTask<()>)>,
}

impl StagingPool {
    pub fn new(limit: usize) -> Self {
        Self {
            limit,
            ready: Vec::new(),
            in_flight: Vec::new(),
        }
    }

    pub fn stats(&self) -> StagingStats {
        StagingStats {
            ready: self.ready.len(),
            in_flight: self.in_flight.len(),
        }
    }

    fn total(&self) -> usize {
        self.ready.len() + self.in_flight.len()
    }

    /// Moves completed remaps back to the ready list and destroys buffers
    /// whose remap failed.
    pub fn reclaim<D: GpuDevice>(&mut self, device: &mut D) {
        let mut i = 0;
        while i < self.in_flight.len() {
            match self.in_flight[i].1.try_complete() {
                None => i += 1,
                Some(Ok(())) => {
                    let (buffer, _) = self.in_flight.swap_remove(i);
                    self.ready.push(buffer);
                }
                Some(Err(err)) => {
                    let (buffer, _) = self.in_flight.swap_remove(i);
                    log::warn!("Staging buffer remap failed, discarding it: {err}");
                    device.destroy_buffer(buffer.id);
                }
            }
        }
    }

    /// A mapped staging buffer of at least `size` bytes, or `None` when the
    /// pool is exhausted and the caller should write directly.
    pub fn acquire<D: GpuDevice>(
        &mut self,
        device: &mut D,
        size: u64,
        label: &str,
    ) -> Result<Option<RawBufferId>, DeviceError> {
        if let Some(pos) = self.ready.iter().position(|b| b.size >= size) {
            return Ok(Some(self.ready.swap_remove(pos).id));
        }

        // Undersized ready buffers are replaced rather than counted against the limit.
        if self.total() >= self.limit {
            if self.ready.is_empty() {
                return Ok(None);
            }
            let stale = self.ready.swap_remove(0);
            device.destroy_buffer(stale.id);
        }

        let id = device.create_buffer(&BufferDesc {
            label: Some(label),
            size,
            usage: wgpu::BufferUsages::MAP_WRITE | wgpu::BufferUsages::COPY_SRC,
            mapped_at_creation: true,
        })?;
        log::debug!("Allocated staging buffer '{label}' ({size} bytes)");
        Ok(Some(id))
    }

    /// Hands a used staging buffer back together with its remap task.
    pub fn push_in_flight(&mut self, id: RawBufferId, size: u64, task: GpuTask<()>) {
        self.in_flight.push((StagingBuffer { id, size }, task));
    }

    /// Destroys every staging buffer. Pending remaps are dropped.
    pub fn clear<D: GpuDevice>(&mut self, device: &mut D) {
        for buffer in self.ready.drain(..) {
            device.destroy_buffer(buffer.id);
        }
        for (buffer, _) in self.in_flight.drain(..) {
            device.destroy_buffer(buffer.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::RecordingDevice;

    fn cycle(pool: &mut StagingPool, device: &mut RecordingDevice) -> Option<RawBufferId> {
        let id = pool.acquire(device, 16, "staging").unwrap()?;
        device.unmap_buffer(id).unwrap();
        let task = device.map_buffer(id, wgpu::MapMode::Write);
        pool.push_in_flight(id, 16, task);
        Some(id)
    }

    #[test]
    fn completed_remaps_return_to_ready() {
        let mut device = RecordingDevice::new();
        let mut pool = StagingPool::new(2);

        let first = cycle(&mut pool, &mut device).unwrap();
        assert_eq!(pool.stats(), StagingStats { ready: 0, in_flight: 1 });

        device.poll(false);
        pool.reclaim(&mut device);
        assert_eq!(pool.stats(), StagingStats { ready: 1, in_flight: 0 });

        assert_eq!(pool.acquire(&mut device, 16, "staging").unwrap(), Some(first));
    }

    #[test]
    fn exhausted_pool_yields_none() {
        let mut device = RecordingDevice::new();
        let mut pool = StagingPool::new(2);
        cycle(&mut pool, &mut device).unwrap();
        cycle(&mut pool, &mut device).unwrap();
        assert_eq!(pool.acquire(&mut device, 16, "staging").unwrap(), None);
    }

    #[test]
    fn failed_remap_destroys_the_buffer() {
        let mut device = RecordingDevice::new();
        let mut pool = StagingPool::new(2);
        let id = cycle(&mut pool, &mut device).unwrap();

        device.set_reject_maps(true);
        device.poll(false);
        pool.reclaim(&mut device);

        assert_eq!(pool.stats(), StagingStats::default());
        assert!(!device.is_live_buffer(id));
    }

    #[test]
    fn zero_limit_disables_staging() {
        let mut device = RecordingDevice::new();
        let mut pool = StagingPool::new(0);
        assert_eq!(pool.acquire(&mut device, 16, "staging").unwrap(), None);
        assert_eq!(device.live_buffer_count(), 0);
    }
}
