//! GPU Context
//!
//! [`Gpu`] owns the device together with one slot-map arena per object
//! kind. Each arena slot holds the logical object, its [`NativeCache`] and
//! the [`ListenerSet`] of objects that depend on it:
//!
//! ```text
//! Buffer ──BINDINGS──► BindGroup ──BINDINGS──► RenderPass (bundle)
//!                          ▲                        ▲
//! BindGroupLayout ──LAYOUT─┴─► PipelineLayout ──PIPELINE──► RenderPipeline
//! ```
//!
//! Invalidation walks these edges with a work list. A target that already holds
//! every delivered bit is not revisited, so cycles terminate.
//!
//! Native handles are resolved bottom-up on demand: reading a bind group
//! reads its layout and every bound resource first.
//!
//! # Lifecycle
//!
//! [`Gpu::new`] takes ownership of a device; [`Gpu::teardown`] deconstructs
//! every live object in dependency order and hands the device back.
//! [`Gpu::destroy`] removes the object from its arena; the versioned key
//! then fails with [`Error::UnknownResource`].

mod bindings;
mod buffers;
mod passes;
mod pipelines;
mod textures;

use slotmap::{Key, SlotMap};
use smallvec::SmallVec;

use crate::binding::group::{BindGroupLayoutOps, BindGroupOps};
use crate::binding::pipeline_layout::PipelineLayoutOps;
use crate::binding::{BindGroup, BindGroupLayout, PipelineLayout};
use crate::device::{
    GpuDevice, RawBindGroupId, RawBindGroupLayoutId, RawBufferId, RawComputePipelineId,
    RawPipelineLayoutId, RawRenderBundleId, RawRenderPipelineId, RawSamplerId,
};
use crate::errors::{Error, Result};
use crate::handles::{
    BindGroupId, BindGroupLayoutId, BufferId, ComputePassId, ComputePipelineId, PipelineLayoutId,
    RenderPassId, RenderPipelineId, SamplerId, TextureId,
};
use crate::native::{Invalidation, Lifetime, Listener, ListenerSet, NativeCache, ResourceKey};
use crate::pass::compute::NoNative;
use crate::pass::render::BundleOps;
use crate::pass::{ComputePass, RenderPass};
use crate::pipeline::{ComputePipeline, ComputePipelineOps, RenderPipeline, RenderPipelineOps};
use crate::resources::buffer::BufferOps;
use crate::resources::sampler::SamplerOps;
use crate::resources::texture::TextureOps;
use crate::resources::{Buffer, Sampler, Texture, TextureNative};
use crate::settings::GpuSettings;

/// Reasons that travel along resource → consumer edges. Contents updates
/// are applied in place and never reach consumers.
pub(crate) const STRUCTURAL: Invalidation = Invalidation::all().difference(Invalidation::CONTENTS);

/// Arena entry: the object, its native cache and its dependents.
#[derive(Debug)]
pub(crate) struct Slot<T, H> {
    pub value: T,
    pub cache: NativeCache<H>,
    pub listeners: ListenerSet,
    /// Objects whose listener sets point at this one.
    pub sources: SmallVec<[ResourceKey; 4]>,
}

impl<T, H: Copy> Slot<T, H> {
    fn new(value: T, label: String, lifetime: Lifetime) -> Self {
        Self {
            value,
            cache: NativeCache::new(label, lifetime),
            listeners: ListenerSet::default(),
            sources: SmallVec::new(),
        }
    }

    /// The cached handle when the next read would not touch the device.
    fn fresh(&self) -> Option<H> {
        if self.cache.needs_refresh() {
            None
        } else {
            self.cache.peek()
        }
    }
}

fn lookup<K: Key, T, H>(arena: &SlotMap<K, Slot<T, H>>, id: K) -> Result<&Slot<T, H>> {
    arena
        .get(id)
        .ok_or_else(|| Error::UnknownResource(format!("{id:?}")))
}

fn lookup_mut<K: Key, T, H>(arena: &mut SlotMap<K, Slot<T, H>>, id: K) -> Result<&mut Slot<T, H>> {
    arena
        .get_mut(id)
        .ok_or_else(|| Error::UnknownResource(format!("{id:?}")))
}

/// Runs `$body` with `$slot` bound to the arena slot of `$key`, fetched
/// with `$get` (`get` or `get_mut`). Yields `None` for unknown keys.
macro_rules! with_slot {
    ($gpu:expr, $key:expr, $get:ident, |$slot:ident| $body:expr) => {
        match $key {
            ResourceKey::Buffer(id) => $gpu.buffers.$get(id).map(|$slot| $body),
            ResourceKey::Texture(id) => $gpu.textures.$get(id).map(|$slot| $body),
            ResourceKey::Sampler(id) => $gpu.samplers.$get(id).map(|$slot| $body),
            ResourceKey::BindGroupLayout(id) => $gpu.bind_group_layouts.$get(id).map(|$slot| $body),
            ResourceKey::BindGroup(id) => $gpu.bind_groups.$get(id).map(|$slot| $body),
            ResourceKey::PipelineLayout(id) => $gpu.pipeline_layouts.$get(id).map(|$slot| $body),
            ResourceKey::RenderPipeline(id) => $gpu.render_pipelines.$get(id).map(|$slot| $body),
            ResourceKey::ComputePipeline(id) => $gpu.compute_pipelines.$get(id).map(|$slot| $body),
            ResourceKey::RenderPass(id) => $gpu.render_passes.$get(id).map(|$slot| $body),
            ResourceKey::ComputePass(id) => $gpu.compute_passes.$get(id).map(|$slot| $body),
        }
    };
}

/// The resource registry.
///
/// All mutation goes through `&mut self`; the context is meant to be owned
/// by a single render thread.
pub struct Gpu<D: GpuDevice> {
    device: D,
    settings: GpuSettings,
    frame: u64,
    per_frame: Vec<ResourceKey>,

    buffers: SlotMap<BufferId, Slot<Buffer, RawBufferId>>,
    textures: SlotMap<TextureId, Slot<Texture, TextureNative>>,
    samplers: SlotMap<SamplerId, Slot<Sampler, RawSamplerId>>,
    bind_group_layouts: SlotMap<BindGroupLayoutId, Slot<BindGroupLayout, RawBindGroupLayoutId>>,
    bind_groups: SlotMap<BindGroupId, Slot<BindGroup, RawBindGroupId>>,
    pipeline_layouts: SlotMap<PipelineLayoutId, Slot<PipelineLayout, RawPipelineLayoutId>>,
    render_pipelines: SlotMap<RenderPipelineId, Slot<RenderPipeline, RawRenderPipelineId>>,
    compute_pipelines: SlotMap<ComputePipelineId, Slot<ComputePipeline, RawComputePipelineId>>,
    render_passes: SlotMap<RenderPassId, Slot<RenderPass, RawRenderBundleId>>,
    compute_passes: SlotMap<ComputePassId, Slot<ComputePass, ()>>,
}

impl<D: GpuDevice> Gpu<D> {
    pub fn new(device: D, settings: GpuSettings) -> Self {
        log::debug!("Creating GPU context with {settings:?}");
        Self {
            device,
            settings,
            frame: 0,
            per_frame: Vec::new(),
            buffers: SlotMap::with_key(),
            textures: SlotMap::with_key(),
            samplers: SlotMap::with_key(),
            bind_group_layouts: SlotMap::with_key(),
            bind_groups: SlotMap::with_key(),
            pipeline_layouts: SlotMap::with_key(),
            render_pipelines: SlotMap::with_key(),
            compute_pipelines: SlotMap::with_key(),
            render_passes: SlotMap::with_key(),
            compute_passes: SlotMap::with_key(),
        }
    }

    #[must_use]
    pub fn settings(&self) -> &GpuSettings {
        &self.settings
    }

    #[must_use]
    pub fn device(&self) -> &D {
        &self.device
    }

    pub fn device_mut(&mut self) -> &mut D {
        &mut self.device
    }

    /// Logical frames completed so far.
    #[must_use]
    pub fn frame(&self) -> u64 {
        self.frame
    }

    /// Live logical objects across every arena.
    #[must_use]
    pub fn object_count(&self) -> usize {
        self.buffers.len()
            + self.textures.len()
            + self.samplers.len()
            + self.bind_group_layouts.len()
            + self.bind_groups.len()
            + self.pipeline_layouts.len()
            + self.render_pipelines.len()
            + self.compute_pipelines.len()
            + self.render_passes.len()
            + self.compute_passes.len()
    }

    fn track_lifetime(&mut self, key: ResourceKey, lifetime: Lifetime) {
        if lifetime == Lifetime::PerFrame {
            self.per_frame.push(key);
        }
    }

    // ========================================================================
    // Invalidation
    // ========================================================================

    /// Records `reason` on `key` and forwards it along listener edges.
    pub fn invalidate(&mut self, key: impl Into<ResourceKey>, reason: Invalidation) {
        let mut work: SmallVec<[(ResourceKey, Invalidation); 8]> = SmallVec::new();
        work.push((key.into(), reason));

        while let Some((key, reason)) = work.pop() {
            let deliveries = with_slot!(self, key, get_mut, |slot| {
                let added = slot.cache.invalidate(reason);
                if added.is_empty() {
                    SmallVec::<[(ResourceKey, Invalidation); 4]>::new()
                } else {
                    log::trace!("Invalidated {key:?} with {added:?}");
                    slot.listeners.deliveries(added).collect()
                }
            });
            work.extend(deliveries.into_iter().flatten());
        }
    }

    /// Pending invalidation reasons of `key`.
    pub fn pending_reasons(&self, key: impl Into<ResourceKey>) -> Result<Invalidation> {
        let key = key.into();
        with_slot!(self, key, get, |slot| slot.cache.reasons())
            .ok_or_else(|| Error::UnknownResource(format!("{key:?}")))
    }

    /// Number of times the native object of `key` was generated.
    pub fn generations(&self, key: impl Into<ResourceKey>) -> Result<u64> {
        let key = key.into();
        with_slot!(self, key, get, |slot| slot.cache.generations())
            .ok_or_else(|| Error::UnknownResource(format!("{key:?}")))
    }

    fn listeners_mut(&mut self, key: ResourceKey) -> Result<&mut ListenerSet> {
        with_slot!(self, key, get_mut, |slot| &mut slot.listeners)
            .ok_or_else(|| Error::UnknownResource(format!("{key:?}")))
    }

    fn sources_mut(&mut self, key: ResourceKey) -> Option<&mut SmallVec<[ResourceKey; 4]>> {
        with_slot!(self, key, get_mut, |slot| &mut slot.sources)
    }

    pub(crate) fn add_listener(&mut self, source: impl Into<ResourceKey>, listener: Listener) -> Result<()> {
        let source = source.into();
        self.listeners_mut(source)?.add(listener);
        if let Some(sources) = self.sources_mut(listener.target)
            && !sources.contains(&source)
        {
            sources.push(source);
        }
        Ok(())
    }

    pub(crate) fn remove_listener(&mut self, source: impl Into<ResourceKey>, listener: &Listener) {
        let source = source.into();
        let Ok(set) = self.listeners_mut(source) else {
            return;
        };
        set.remove(listener);
        if !set.contains_target(listener.target)
            && let Some(sources) = self.sources_mut(listener.target)
        {
            sources.retain(|key| *key != source);
        }
    }

    /// Objects `key` forwards invalidation to.
    pub fn dependents(&self, key: ResourceKey) -> SmallVec<[ResourceKey; 4]> {
        with_slot!(self, key, get, |slot| slot.listeners.targets().collect())
            .unwrap_or_default()
    }

    /// Advances the logical frame and expires every `PerFrame` object.
    pub fn tick_frame(&mut self) {
        self.frame += 1;
        log::debug!("Frame {} ({} per-frame objects)", self.frame, self.per_frame.len());
        let keys = std::mem::take(&mut self.per_frame);
        for key in &keys {
            self.invalidate(*key, Invalidation::LIFETIME_REACHED);
        }
        self.per_frame = keys;
    }

    // ========================================================================
    // Deconstruction
    // ========================================================================

    /// Deconstructs `key` and removes it: dependents are invalidated, the
    /// native object is destroyed and the id stops resolving.
    pub fn destroy(&mut self, key: impl Into<ResourceKey>) -> Result<()> {
        let key = key.into();
        self.invalidate(key, Invalidation::DECONSTRUCTED);
        self.deconstruct(key)?;
        self.per_frame.retain(|k| *k != key);
        self.detach(key);
        with_slot!(self, key, remove, |_slot| ());
        Ok(())
    }

    /// Drops every edge into and out of `key`.
    fn detach(&mut self, key: ResourceKey) {
        let sources = with_slot!(self, key, get_mut, |slot| std::mem::take(&mut slot.sources))
            .unwrap_or_default();
        for source in sources {
            if let Ok(set) = self.listeners_mut(source) {
                set.remove_target(key);
            }
        }
        for target in self.dependents(key) {
            if let Some(sources) = self.sources_mut(target) {
                sources.retain(|k| *k != key);
            }
        }
    }

    fn deconstruct(&mut self, key: ResourceKey) -> Result<()> {
        let device = &mut self.device;
        let unknown = || Error::UnknownResource(format!("{key:?}"));
        match key {
            ResourceKey::Buffer(id) => {
                let slot = self.buffers.get_mut(id).ok_or_else(unknown)?;
                slot.value.staging.clear(device);
                if let Some((staging, _)) = slot.value.read_staging.take() {
                    device.destroy_buffer(staging);
                }
                slot.cache.deconstruct(&mut BufferOps {
                    device,
                    buffer: &slot.value,
                    label: "",
                });
            }
            ResourceKey::Texture(id) => {
                let slot = self.textures.get_mut(id).ok_or_else(unknown)?;
                slot.cache.deconstruct(&mut TextureOps {
                    device,
                    texture: &slot.value,
                    label: "",
                });
            }
            ResourceKey::Sampler(id) => {
                let slot = self.samplers.get_mut(id).ok_or_else(unknown)?;
                slot.cache.deconstruct(&mut SamplerOps {
                    device,
                    sampler: &slot.value,
                    label: "",
                });
            }
            ResourceKey::BindGroupLayout(id) => {
                let slot = self.bind_group_layouts.get_mut(id).ok_or_else(unknown)?;
                slot.cache.deconstruct(&mut BindGroupLayoutOps {
                    device,
                    layout: &slot.value,
                    label: "",
                });
            }
            ResourceKey::BindGroup(id) => {
                let slot = self.bind_groups.get_mut(id).ok_or_else(unknown)?;
                slot.cache.deconstruct(&mut BindGroupOps {
                    device,
                    layout: RawBindGroupLayoutId::default(),
                    entries: &[],
                    label: "",
                });
            }
            ResourceKey::PipelineLayout(id) => {
                let slot = self.pipeline_layouts.get_mut(id).ok_or_else(unknown)?;
                slot.cache.deconstruct(&mut PipelineLayoutOps {
                    device,
                    groups: &[],
                    label: "",
                });
            }
            ResourceKey::RenderPipeline(id) => {
                let slot = self.render_pipelines.get_mut(id).ok_or_else(unknown)?;
                slot.cache.deconstruct(&mut RenderPipelineOps {
                    device,
                    pipeline: &slot.value,
                    layout: RawPipelineLayoutId::default(),
                    label: "",
                });
            }
            ResourceKey::ComputePipeline(id) => {
                let slot = self.compute_pipelines.get_mut(id).ok_or_else(unknown)?;
                slot.cache.deconstruct(&mut ComputePipelineOps {
                    device,
                    pipeline: &slot.value,
                    layout: RawPipelineLayoutId::default(),
                    label: "",
                });
            }
            ResourceKey::RenderPass(id) => {
                let slot = self.render_passes.get_mut(id).ok_or_else(unknown)?;
                slot.cache.deconstruct(&mut BundleOps {
                    device,
                    draws: &[],
                    color_formats: &[],
                    depth_format: None,
                    sample_count: 1,
                    label: "",
                });
            }
            ResourceKey::ComputePass(id) => {
                let slot = self.compute_passes.get_mut(id).ok_or_else(unknown)?;
                slot.cache.deconstruct(&mut NoNative);
            }
        }
        Ok(())
    }

    /// Deconstructs every object, consumers before the objects they use, and
    /// returns the device.
    pub fn teardown(mut self) -> D {
        let mut keys: Vec<ResourceKey> = Vec::new();
        keys.extend(self.render_passes.keys().map(ResourceKey::from));
        keys.extend(self.compute_passes.keys().map(ResourceKey::from));
        keys.extend(self.render_pipelines.keys().map(ResourceKey::from));
        keys.extend(self.compute_pipelines.keys().map(ResourceKey::from));
        keys.extend(self.bind_groups.keys().map(ResourceKey::from));
        keys.extend(self.pipeline_layouts.keys().map(ResourceKey::from));
        keys.extend(self.bind_group_layouts.keys().map(ResourceKey::from));
        keys.extend(self.samplers.keys().map(ResourceKey::from));
        keys.extend(self.textures.keys().map(ResourceKey::from));
        keys.extend(self.buffers.keys().map(ResourceKey::from));

        log::debug!("Tearing down GPU context ({} objects)", keys.len());
        for key in keys {
            if let Err(err) = self.deconstruct(key) {
                log::warn!("Failed to deconstruct {key:?} during teardown: {err}");
            }
        }
        self.device.poll(true);
        self.device
    }
}
