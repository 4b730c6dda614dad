//! Binding layer: bind group layouts, bind groups and pipeline layouts.
//!
//! ```text
//! BindGroupLayout ──► BindGroup ──► (pass steps)
//!        │
//!        └──────────► PipelineLayout ──► RenderPipeline / ComputePipeline
//! ```
//!
//! Layouts are sealed as soon as anything references them. Resource binding
//! and group replacement go through [`Gpu`](crate::Gpu) because they touch
//! other objects' usage flags and listener edges.

pub mod group;
pub mod layout;
pub mod pipeline_layout;

pub use group::{BindGroup, BindGroupDescriptor};
pub use layout::{
    BindGroupLayout, BindingLayout, BindingSlot, SamplerBindingLayout, StorageAccess,
    TextureBindingLayout,
};
pub use pipeline_layout::{GroupEntry, GroupRole, PipelineLayout};
