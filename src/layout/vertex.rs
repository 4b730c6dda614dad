use rustc_hash::FxHashSet;

use crate::device::OwnedVertexBufferDesc;
use crate::errors::{Error, Result};

/// Vertex strides must be a multiple of this.
pub const VERTEX_STRIDE_ALIGNMENT: u32 = 4;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VertexAttribute {
    name: String,
    format: wgpu::VertexFormat,
    offset: u32,
}

impl VertexAttribute {
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn format(&self) -> wgpu::VertexFormat {
        self.format
    }

    #[must_use]
    pub fn offset(&self) -> u32 {
        self.offset
    }

    #[must_use]
    pub fn size(&self) -> u32 {
        self.format.size() as u32
    }
}

/// Tightly packed interleaved vertex data.
///
/// Attributes are placed back to back: each starts where the previous one
/// ends plus its own explicit extra offset. No alignment padding is inserted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VertexLayout {
    step_mode: wgpu::VertexStepMode,
    attributes: Vec<VertexAttribute>,
    stride: u32,
}

impl VertexLayout {
    #[must_use]
    pub fn builder(step_mode: wgpu::VertexStepMode) -> VertexLayoutBuilder {
        VertexLayoutBuilder {
            step_mode,
            attributes: Vec::new(),
        }
    }

    #[must_use]
    pub fn step_mode(&self) -> wgpu::VertexStepMode {
        self.step_mode
    }

    #[must_use]
    pub fn attributes(&self) -> &[VertexAttribute] {
        &self.attributes
    }

    #[must_use]
    pub fn attribute(&self, name: &str) -> Option<&VertexAttribute> {
        self.attributes.iter().find(|a| a.name == name)
    }

    #[must_use]
    pub fn stride(&self) -> u32 {
        self.stride
    }

    /// Lowers to the device descriptor, assigning shader locations from
    /// `first_location` in attribute order.
    #[must_use]
    pub fn to_buffer_desc(&self, first_location: u32) -> OwnedVertexBufferDesc {
        OwnedVertexBufferDesc {
            array_stride: u64::from(self.stride),
            step_mode: self.step_mode,
            attributes: self
                .attributes
                .iter()
                .zip(first_location..)
                .map(|(attr, shader_location)| wgpu::VertexAttribute {
                    format: attr.format,
                    offset: u64::from(attr.offset),
                    shader_location,
                })
                .collect(),
        }
    }
}

pub struct VertexLayoutBuilder {
    step_mode: wgpu::VertexStepMode,
    attributes: Vec<(String, wgpu::VertexFormat, u32)>,
}

impl VertexLayoutBuilder {
    #[must_use]
    pub fn attribute(self, name: impl Into<String>, format: wgpu::VertexFormat) -> Self {
        self.attribute_at(name, format, 0)
    }

    /// Adds an attribute placed `extra_offset` bytes after the previous one ends.
    #[must_use]
    pub fn attribute_at(
        mut self,
        name: impl Into<String>,
        format: wgpu::VertexFormat,
        extra_offset: u32,
    ) -> Self {
        self.attributes.push((name.into(), format, extra_offset));
        self
    }

    pub fn build(self) -> Result<VertexLayout> {
        if self.attributes.is_empty() {
            return Err(Error::InvalidLayout("vertex layout has no attributes".to_string()));
        }
        let mut seen = FxHashSet::default();
        let mut end = 0_u32;
        let mut attributes = Vec::with_capacity(self.attributes.len());
        for (name, format, extra_offset) in self.attributes {
            if !seen.insert(name.clone()) {
                return Err(Error::DuplicateIdentifier(format!("vertex attribute '{name}'")));
            }
            let offset = end + extra_offset;
            end = offset + format.size() as u32;
            attributes.push(VertexAttribute {
                name,
                format,
                offset,
            });
        }
        if end % VERTEX_STRIDE_ALIGNMENT != 0 {
            return Err(Error::InvalidLayout(format!(
                "vertex stride {end} is not a multiple of {VERTEX_STRIDE_ALIGNMENT}"
            )));
        }
        Ok(VertexLayout {
            step_mode: self.step_mode,
            attributes,
            stride: end,
        })
    }
}
