//! Errors of the GPU resource layer.
//!
//! Every fallible call returns [`Result`], carrying one [`Error`]. The
//! variants fall into two groups by when they can happen:
//!
//! - While objects are configured (`add_binding`, `bind`, `add_step`,
//!   resource setters): setup order, duplicate names, layout and size
//!   mismatches, bad layout paths. These are reported before anything
//!   reaches the device and leave the object unchanged.
//! - While frames run: a handle that no longer resolves, a native object
//!   that could not be generated, or a [`DeviceError`] from the
//!   [`GpuDevice`](crate::device::GpuDevice) backend.
//!
//! Errors are `Clone + PartialEq` so tests can compare them directly:
//!
//! ```rust,ignore
//! assert_eq!(
//!     gpu.bind(group, "view", small).unwrap_err(),
//!     Error::SizeMismatch { expected: 64, actual: 16 },
//! );
//! ```

use thiserror::Error;

use crate::device::DeviceError;

/// The main error type of the GPU resource layer.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    // ========================================================================
    // Configuration Errors
    // ========================================================================
    /// A property was accessed or modified outside of its configuration phase.
    #[error("Setup order violated: {0}")]
    SetupOrder(String),

    /// A binding index or name is already taken.
    #[error("Duplicate identifier: {0}")]
    DuplicateIdentifier(String),

    /// A declared binding has no resource bound to it.
    #[error("Missing required binding '{name}' (binding {index})")]
    MissingRequiredBinding {
        /// Binding name
        name: String,
        /// Binding index
        index: u32,
    },

    /// A pipeline requires a bind group that was not supplied.
    #[error("Missing bind group '{name}' (group {index})")]
    MissingBindGroup {
        /// Group name in the pipeline layout
        name: String,
        /// Group index in the pipeline layout
        index: u32,
    },

    /// A resource or layout does not match what the consumer declared.
    #[error("Layout mismatch: {0}")]
    LayoutMismatch(String),

    /// Pipeline layout group indices are not contiguous from zero.
    #[error("Pipeline layout has no group at index {index}")]
    GroupIndexGap {
        /// First missing index
        index: u32,
    },

    // ========================================================================
    // Memory Layout Errors
    // ========================================================================
    /// Byte length does not match the computed size.
    #[error("Size mismatch: expected {expected} bytes, got {actual}")]
    SizeMismatch {
        /// Computed size in bytes
        expected: u64,
        /// Supplied size in bytes
        actual: u64,
    },

    /// The addressed path still has an unresolved (open) size.
    #[error("Size of '{0}' is still open")]
    OpenSize(String),

    /// The layout definition itself is invalid.
    #[error("Invalid layout: {0}")]
    InvalidLayout(String),

    /// A layout path could not be resolved.
    #[error("Invalid layout path '{path}': {reason}")]
    InvalidPath {
        /// The path as written by the caller
        path: String,
        /// Why resolution failed
        reason: String,
    },

    /// A buffer access is not aligned to the copy alignment.
    #[error("Misaligned access: offset {offset}, length {len} (alignment {alignment})")]
    MisalignedAccess {
        /// Byte offset
        offset: u64,
        /// Byte length
        len: u64,
        /// Required alignment
        alignment: u64,
    },

    // ========================================================================
    // Native Object Lifecycle Errors
    // ========================================================================
    /// Native generation produced no handle.
    #[error("No native object could be generated for {0}")]
    NoNativeObject(String),

    /// The object was deconstructed and can no longer produce a native handle.
    #[error("{0} was used after being deconstructed")]
    UseAfterDeconstruct(String),

    /// An id does not name a live object in the registry.
    #[error("Unknown resource: {0}")]
    UnknownResource(String),

    // ========================================================================
    // Device Errors
    // ========================================================================
    /// A buffer map request was rejected.
    #[error("Buffer map failed: {0}")]
    MapFailed(String),

    /// Error forwarded from the device backend.
    #[error("Device error: {0}")]
    Device(#[from] DeviceError),
}

/// Alias for `Result<T, Error>`.
pub type Result<T> = std::result::Result<T, Error>;
