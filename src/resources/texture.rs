use crate::device::{GpuDevice, RawTextureId, RawTextureViewId, TextureDesc, TextureViewDesc};
use crate::errors::Result;
use crate::native::{Invalidation, Lifetime, NativeOps};

#[derive(Debug, Clone)]
pub struct TextureDescriptor {
    pub label: String,
    pub size: wgpu::Extent3d,
    pub format: wgpu::TextureFormat,
    pub dimension: wgpu::TextureDimension,
    /// Defaults to the dimension implied by `dimension` and the layer count.
    pub view_dimension: Option<wgpu::TextureViewDimension>,
    pub mip_level_count: u32,
    pub sample_count: u32,
    pub usage: wgpu::TextureUsages,
    pub lifetime: Lifetime,
}

impl TextureDescriptor {
    pub fn new_2d(
        label: impl Into<String>,
        width: u32,
        height: u32,
        format: wgpu::TextureFormat,
    ) -> Self {
        Self {
            label: label.into(),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            format,
            dimension: wgpu::TextureDimension::D2,
            view_dimension: None,
            mip_level_count: 1,
            sample_count: 1,
            usage: wgpu::TextureUsages::empty(),
            lifetime: Lifetime::Persistent,
        }
    }

    #[must_use]
    pub fn with_usage(mut self, usage: wgpu::TextureUsages) -> Self {
        self.usage = usage;
        self
    }

    #[must_use]
    pub fn with_layers(mut self, layers: u32) -> Self {
        self.size.depth_or_array_layers = layers;
        self
    }

    #[must_use]
    pub fn with_view_dimension(mut self, dimension: wgpu::TextureViewDimension) -> Self {
        self.view_dimension = Some(dimension);
        self
    }

    #[must_use]
    pub fn with_mip_level_count(mut self, count: u32) -> Self {
        self.mip_level_count = count;
        self
    }

    #[must_use]
    pub fn with_sample_count(mut self, count: u32) -> Self {
        self.sample_count = count;
        self
    }

    #[must_use]
    pub fn with_lifetime(mut self, lifetime: Lifetime) -> Self {
        self.lifetime = lifetime;
        self
    }
}

/// Native texture together with its default view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextureNative {
    pub texture: RawTextureId,
    pub view: RawTextureViewId,
}

#[derive(Debug, Clone)]
pub struct Texture {
    desc: TextureDescriptor,
}

impl Texture {
    pub(crate) fn new(desc: TextureDescriptor) -> Self {
        Self { desc }
    }

    #[must_use]
    pub fn label(&self) -> &str {
        &self.desc.label
    }

    #[must_use]
    pub fn size(&self) -> wgpu::Extent3d {
        self.desc.size
    }

    #[must_use]
    pub fn format(&self) -> wgpu::TextureFormat {
        self.desc.format
    }

    #[must_use]
    pub fn sample_count(&self) -> u32 {
        self.desc.sample_count
    }

    #[must_use]
    pub fn usage(&self) -> wgpu::TextureUsages {
        self.desc.usage
    }

    #[must_use]
    pub fn view_dimension(&self) -> wgpu::TextureViewDimension {
        self.desc.view_dimension.unwrap_or(match self.desc.dimension {
            wgpu::TextureDimension::D1 => wgpu::TextureViewDimension::D1,
            wgpu::TextureDimension::D3 => wgpu::TextureViewDimension::D3,
            wgpu::TextureDimension::D2 if self.desc.size.depth_or_array_layers > 1 => {
                wgpu::TextureViewDimension::D2Array
            }
            wgpu::TextureDimension::D2 => wgpu::TextureViewDimension::D2,
        })
    }

    /// Whether the format can be used with `usage` on every adapter.
    #[must_use]
    pub fn format_supports(&self, usage: wgpu::TextureUsages) -> bool {
        self.desc
            .format
            .guaranteed_format_features(wgpu::Features::empty())
            .allowed_usages
            .contains(usage)
    }

    /// Bytes of one row of mip level 0, when the format is copyable.
    #[must_use]
    pub fn bytes_per_row(&self) -> Option<u32> {
        let block_size = self.desc.format.block_copy_size(None)?;
        let (block_width, _) = self.desc.format.block_dimensions();
        Some(self.desc.size.width.div_ceil(block_width) * block_size)
    }

    /// Bytes of the whole mip level 0.
    #[must_use]
    pub fn level_size(&self) -> Option<u64> {
        let (_, block_height) = self.desc.format.block_dimensions();
        let rows = self.desc.size.height.div_ceil(block_height);
        Some(
            u64::from(self.bytes_per_row()?)
                * u64::from(rows)
                * u64::from(self.desc.size.depth_or_array_layers),
        )
    }

    pub(crate) fn set_size(&mut self, size: wgpu::Extent3d) -> Invalidation {
        if size == self.desc.size {
            return Invalidation::empty();
        }
        self.desc.size = size;
        Invalidation::SIZE
    }

    pub(crate) fn set_format(&mut self, format: wgpu::TextureFormat) -> Invalidation {
        if format == self.desc.format {
            return Invalidation::empty();
        }
        self.desc.format = format;
        Invalidation::FORMAT
    }

    pub(crate) fn extend_usage(&mut self, usage: wgpu::TextureUsages) -> Invalidation {
        if self.desc.usage.contains(usage) {
            return Invalidation::empty();
        }
        self.desc.usage |= usage;
        Invalidation::USAGE
    }
}

pub(crate) struct TextureOps<'a, D> {
    pub device: &'a mut D,
    pub texture: &'a Texture,
    pub label: &'a str,
}

impl<D: GpuDevice> NativeOps<TextureNative> for TextureOps<'_, D> {
    fn generate(&mut self) -> Result<Option<TextureNative>> {
        let desc = &self.texture.desc;
        let mut usage = desc.usage;
        // Multisampled textures cannot be copy destinations.
        if desc.sample_count == 1 {
            usage |= wgpu::TextureUsages::COPY_DST;
        }
        let texture = self.device.create_texture(&TextureDesc {
            label: Some(self.label),
            size: desc.size,
            mip_level_count: desc.mip_level_count,
            sample_count: desc.sample_count,
            dimension: desc.dimension,
            format: desc.format,
            usage,
        })?;
        let view = self.device.create_texture_view(
            texture,
            &TextureViewDesc {
                label: Some(self.label),
                dimension: self.texture.view_dimension(),
            },
        )?;
        Ok(Some(TextureNative { texture, view }))
    }

    fn destroy(&mut self, handle: TextureNative) {
        self.device.destroy_texture(handle.texture);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn row_and_level_sizes_use_the_format_table() {
        let texture = Texture::new(TextureDescriptor::new_2d(
            "albedo",
            64,
            32,
            wgpu::TextureFormat::Rgba8Unorm,
        ));
        assert_eq!(texture.bytes_per_row(), Some(256));
        assert_eq!(texture.level_size(), Some(256 * 32));

        let compressed = Texture::new(TextureDescriptor::new_2d(
            "bc",
            64,
            64,
            wgpu::TextureFormat::Bc1RgbaUnorm,
        ));
        assert_eq!(compressed.bytes_per_row(), Some(16 * 8));
        assert_eq!(compressed.level_size(), Some(16 * 8 * 16));
    }

    #[test]
    fn layered_2d_textures_default_to_array_views() {
        let texture = Texture::new(
            TextureDescriptor::new_2d("shadow", 512, 512, wgpu::TextureFormat::Depth32Float)
                .with_layers(4),
        );
        assert_eq!(texture.view_dimension(), wgpu::TextureViewDimension::D2Array);
    }

    #[test]
    fn storage_capability_comes_from_the_format() {
        let rgba32 = Texture::new(TextureDescriptor::new_2d("a", 4, 4, wgpu::TextureFormat::Rgba32Float));
        assert!(rgba32.format_supports(wgpu::TextureUsages::STORAGE_BINDING));
        let srgb = Texture::new(TextureDescriptor::new_2d("b", 4, 4, wgpu::TextureFormat::Rgba8UnormSrgb));
        assert!(!srgb.format_supports(wgpu::TextureUsages::STORAGE_BINDING));
    }
}
