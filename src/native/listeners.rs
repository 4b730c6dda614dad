//! Listener edges between logical objects.
//!
//! A listener set lives next to the *source* object in its arena slot. Each
//! edge names the dependent object, an optional filter of source reasons it
//! cares about, and the reason delivered to the dependent.
//!
//! Edges are reference counted: a bind group that binds the same buffer in
//! two slots holds one edge with a count of two, so rebinding one slot keeps
//! the other dependency alive.

use smallvec::SmallVec;

use super::Invalidation;
use crate::handles::{
    BindGroupId, BindGroupLayoutId, BufferId, ComputePassId, ComputePipelineId, PipelineLayoutId,
    RenderPassId, RenderPipelineId, SamplerId, TextureId,
};

/// Any logical object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKey {
    Buffer(BufferId),
    Texture(TextureId),
    Sampler(SamplerId),
    BindGroupLayout(BindGroupLayoutId),
    BindGroup(BindGroupId),
    PipelineLayout(PipelineLayoutId),
    RenderPipeline(RenderPipelineId),
    ComputePipeline(ComputePipelineId),
    RenderPass(RenderPassId),
    ComputePass(ComputePassId),
}

macro_rules! impl_from_id {
    ($($id:ident => $variant:ident),* $(,)?) => {
        $(
            impl From<$id> for ResourceKey {
                fn from(id: $id) -> Self {
                    Self::$variant(id)
                }
            }
        )*
    };
}

impl_from_id! {
    BufferId => Buffer,
    TextureId => Texture,
    SamplerId => Sampler,
    BindGroupLayoutId => BindGroupLayout,
    BindGroupId => BindGroup,
    PipelineLayoutId => PipelineLayout,
    RenderPipelineId => RenderPipeline,
    ComputePipelineId => ComputePipeline,
    RenderPassId => RenderPass,
    ComputePassId => ComputePass,
}

/// One dependency edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Listener {
    pub target: ResourceKey,
    /// Source reasons this edge reacts to; `None` reacts to all of them.
    pub filter: Option<Invalidation>,
    pub deliver: Invalidation,
}

impl Listener {
    pub fn new(target: impl Into<ResourceKey>, deliver: Invalidation) -> Self {
        Self {
            target: target.into(),
            filter: None,
            deliver,
        }
    }

    #[must_use]
    pub fn filtered(mut self, filter: Invalidation) -> Self {
        self.filter = Some(filter);
        self
    }

    #[inline]
    #[must_use]
    pub fn accepts(&self, reason: Invalidation) -> bool {
        self.filter.is_none_or(|filter| filter.intersects(reason))
    }
}

#[derive(Debug, Clone, Default)]
pub struct ListenerSet {
    edges: SmallVec<[(Listener, u32); 4]>,
}

impl ListenerSet {
    pub fn add(&mut self, listener: Listener) {
        if let Some((_, count)) = self.edges.iter_mut().find(|(edge, _)| *edge == listener) {
            *count += 1;
        } else {
            self.edges.push((listener, 1));
        }
    }

    /// Drops one reference to `listener`. Returns false if it was not present.
    pub fn remove(&mut self, listener: &Listener) -> bool {
        let Some(pos) = self.edges.iter().position(|(edge, _)| edge == listener) else {
            return false;
        };
        self.edges[pos].1 -= 1;
        if self.edges[pos].1 == 0 {
            self.edges.remove(pos);
        }
        true
    }

    /// Drops every edge pointing at `target`.
    pub fn remove_target(&mut self, target: ResourceKey) {
        self.edges.retain(|(edge, _)| edge.target != target);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.edges.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    #[must_use]
    pub fn contains_target(&self, target: ResourceKey) -> bool {
        self.edges.iter().any(|(edge, _)| edge.target == target)
    }

    /// Distinct dependents of the source.
    pub fn targets(&self) -> impl Iterator<Item = ResourceKey> + '_ {
        let mut seen: SmallVec<[ResourceKey; 4]> = SmallVec::new();
        self.edges.iter().filter_map(move |(edge, _)| {
            if seen.contains(&edge.target) {
                None
            } else {
                seen.push(edge.target);
                Some(edge.target)
            }
        })
    }

    /// Deliveries triggered by `reason`, skipping edges whose filter misses.
    pub fn deliveries(
        &self,
        reason: Invalidation,
    ) -> impl Iterator<Item = (ResourceKey, Invalidation)> + '_ {
        self.edges
            .iter()
            .filter(move |(edge, _)| edge.accepts(reason))
            .map(|(edge, _)| (edge.target, edge.deliver))
    }
}

#[cfg(test)]
mod tests {
    use slotmap::SlotMap;

    use super::*;

    #[test]
    fn filtered_edges_skip_unrelated_reasons() {
        let mut groups: SlotMap<BindGroupId, ()> = SlotMap::with_key();
        let group = groups.insert(());

        let mut set = ListenerSet::default();
        set.add(
            Listener::new(group, Invalidation::BINDINGS)
                .filtered(Invalidation::SIZE | Invalidation::USAGE),
        );

        assert_eq!(set.deliveries(Invalidation::CONTENTS).count(), 0);
        let hits: Vec<_> = set.deliveries(Invalidation::SIZE).collect();
        assert_eq!(hits, vec![(ResourceKey::BindGroup(group), Invalidation::BINDINGS)]);
    }

    #[test]
    fn edges_are_reference_counted() {
        let mut groups: SlotMap<BindGroupId, ()> = SlotMap::with_key();
        let group = groups.insert(());
        let edge = Listener::new(group, Invalidation::BINDINGS);

        let mut set = ListenerSet::default();
        set.add(edge);
        set.add(edge);
        assert_eq!(set.len(), 1);
        assert!(set.remove(&edge));
        assert!(set.contains_target(ResourceKey::BindGroup(group)));
        assert!(set.remove(&edge));
        assert!(set.is_empty());
        assert!(!set.remove(&edge));
    }

    #[test]
    fn targets_are_listed_once() {
        let mut groups: SlotMap<BindGroupId, ()> = SlotMap::with_key();
        let group = groups.insert(());
        let other = groups.insert(());

        let mut set = ListenerSet::default();
        set.add(Listener::new(group, Invalidation::BINDINGS));
        set.add(Listener::new(group, Invalidation::LAYOUT));
        set.add(Listener::new(other, Invalidation::BINDINGS));
        let targets: Vec<_> = set.targets().collect();
        assert_eq!(
            targets,
            vec![ResourceKey::BindGroup(group), ResourceKey::BindGroup(other)]
        );
    }
}
