//! Typed handles for logical objects.
//!
//! Every logical object lives in a slot-map arena inside [`Gpu`](crate::Gpu)
//! and is addressed by one of these keys. Keys are `Copy`, cheap to compare,
//! and stay valid (as tombstones) after the object is deconstructed.

use slotmap::new_key_type;

new_key_type! {
    pub struct BufferId;
    pub struct TextureId;
    pub struct SamplerId;
    pub struct BindGroupLayoutId;
    pub struct BindGroupId;
    pub struct PipelineLayoutId;
    pub struct RenderPipelineId;
    pub struct ComputePipelineId;
    pub struct RenderPassId;
    pub struct ComputePassId;
    /// A step inside a render or compute pass.
    pub struct StepId;
}
