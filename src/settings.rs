//! GPU Context Settings
//!
//! Plain configuration data consumed by [`Gpu::new`](crate::Gpu::new).
//!
//! ```rust,ignore
//! use myth_gpu::{Gpu, GpuSettings, RecordingDevice};
//!
//! let settings = GpuSettings {
//!     staging_pool_limit: 8,
//!     label_prefix: Some("editor".into()),
//!     ..Default::default()
//! };
//! let gpu = Gpu::new(RecordingDevice::new(), settings);
//! ```

use serde::{Deserialize, Serialize};

/// Tunables of the resource layer.
///
/// All fields have sensible defaults, and the struct deserializes from any
/// serde format with missing fields falling back to [`Default`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GpuSettings {
    /// Maximum number of write-staging buffers each buffer resource keeps.
    ///
    /// When all of them are in flight, writes fall back to direct queue
    /// writes. `0` disables staging entirely.
    pub staging_pool_limit: usize,

    /// Maximum bind groups a single pass step may use.
    pub max_bind_groups: u32,

    /// Maximum vertex buffers a single pass step may use.
    pub max_vertex_buffers: u32,

    /// Whether newly created render passes start in bundle mode.
    pub bundle_mode_default: bool,

    /// Prefix prepended to every native object label, e.g. `"editor"` turns
    /// `"camera"` into `"editor/camera"`.
    pub label_prefix: Option<String>,
}

impl Default for GpuSettings {
    fn default() -> Self {
        Self {
            staging_pool_limit: 4,
            max_bind_groups: 4,
            max_vertex_buffers: 8,
            bundle_mode_default: false,
            label_prefix: None,
        }
    }
}

impl GpuSettings {
    /// Native label for an object called `name`.
    #[must_use]
    pub fn label(&self, name: &str) -> String {
        match &self.label_prefix {
            Some(prefix) => format!("{prefix}/{name}"),
            None => name.to_string(),
        }
    }
}
