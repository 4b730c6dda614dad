//! Memory Layout Algebra
//!
//! Describes the binary contract between CPU-side data and what shaders
//! read. A [`MemoryLayout`] is a tree of four node kinds:
//!
//! | Kind        | Alignment                     | Fixed size                      | Variable size      |
//! |-------------|-------------------------------|---------------------------------|--------------------|
//! | `Primitive` | vec3 aligns like vec4         | components × scalar bytes       | 0                  |
//! | `Array`     | element alignment             | count × stride (fixed count)    | stride (open)      |
//! | `Struct`    | max field alignment           | padded running offset           | last field's tail  |
//! | `Vertex`    | 4                             | 0                               | sum of attributes  |
//!
//! Layouts are built once and are immutable afterwards. Paths resolve to
//! byte ranges through [`MemoryLayout::location_of`]:
//!
//! ```rust,ignore
//! let light = MemoryLayout::structure([("color", MemoryLayout::vec4f()), ("range", MemoryLayout::f32())])?;
//! let lights = MemoryLayout::structure([
//!     ("count", MemoryLayout::u32()),
//!     ("lights", MemoryLayout::open_array(light)?),
//! ])?;
//! let location = lights.locate("lights[2].range")?;
//! ```

mod compound;
mod path;
mod primitive;
mod vertex;

pub use compound::{ArrayLayout, StructField, StructLayout};
pub use path::{PathSegment, parse_path};
pub use primitive::{Multiplier, PrimitiveLayout, ScalarFormat};
pub use vertex::{VERTEX_STRIDE_ALIGNMENT, VertexAttribute, VertexLayout, VertexLayoutBuilder};

use path::DisplayPath;

use crate::errors::{Error, Result};

/// Byte range addressed by a layout path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Location {
    pub offset: u64,
    pub size: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LayoutKind {
    Primitive,
    Array,
    Struct,
    Vertex,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MemoryLayout {
    Primitive(PrimitiveLayout),
    Array(ArrayLayout),
    Struct(StructLayout),
    Vertex(VertexLayout),
}

impl From<PrimitiveLayout> for MemoryLayout {
    fn from(layout: PrimitiveLayout) -> Self {
        Self::Primitive(layout)
    }
}

impl From<VertexLayout> for MemoryLayout {
    fn from(layout: VertexLayout) -> Self {
        Self::Vertex(layout)
    }
}

// ============================================================================
// Construction
// ============================================================================

impl MemoryLayout {
    pub fn primitive(format: ScalarFormat, multiplier: Multiplier) -> Result<Self> {
        PrimitiveLayout::new(format, multiplier).map(Self::Primitive)
    }

    pub fn array(element: MemoryLayout, count: Option<u32>) -> Result<Self> {
        ArrayLayout::new(element, count).map(Self::Array)
    }

    pub fn fixed_array(element: MemoryLayout, count: u32) -> Result<Self> {
        Self::array(element, Some(count))
    }

    pub fn open_array(element: MemoryLayout) -> Result<Self> {
        Self::array(element, None)
    }

    pub fn structure<N: Into<String>>(
        fields: impl IntoIterator<Item = (N, MemoryLayout)>,
    ) -> Result<Self> {
        StructLayout::new(fields).map(Self::Struct)
    }

    /// Open array of `u16` or `u32` scalars, usable as an index buffer.
    #[must_use]
    pub fn indices(format: wgpu::IndexFormat) -> Self {
        let scalar = match format {
            wgpu::IndexFormat::Uint16 => Self::u16(),
            wgpu::IndexFormat::Uint32 => Self::u32(),
        };
        Self::Array(ArrayLayout::open_primitive(scalar))
    }
}

macro_rules! primitive_shorthands {
    ($($name:ident => ($format:ident, $multiplier:expr)),* $(,)?) => {
        impl MemoryLayout {
            $(
                #[must_use]
                pub const fn $name() -> Self {
                    Self::Primitive(PrimitiveLayout::natural(ScalarFormat::$format, $multiplier))
                }
            )*
        }
    };
}

primitive_shorthands! {
    f16 => (F16, Multiplier::Scalar),
    f32 => (F32, Multiplier::Scalar),
    i32 => (I32, Multiplier::Scalar),
    u32 => (U32, Multiplier::Scalar),
    u16 => (U16, Multiplier::Scalar),
    vec2f => (F32, Multiplier::Vec2),
    vec3f => (F32, Multiplier::Vec3),
    vec4f => (F32, Multiplier::Vec4),
    vec2i => (I32, Multiplier::Vec2),
    vec4i => (I32, Multiplier::Vec4),
    vec2u => (U32, Multiplier::Vec2),
    vec4u => (U32, Multiplier::Vec4),
    mat3x3f => (F32, Multiplier::Mat { columns: 3, rows: 3 }),
    mat4x4f => (F32, Multiplier::Mat { columns: 4, rows: 4 }),
}

// ============================================================================
// Queries
// ============================================================================

impl MemoryLayout {
    #[must_use]
    pub fn kind(&self) -> LayoutKind {
        match self {
            Self::Primitive(_) => LayoutKind::Primitive,
            Self::Array(_) => LayoutKind::Array,
            Self::Struct(_) => LayoutKind::Struct,
            Self::Vertex(_) => LayoutKind::Vertex,
        }
    }

    #[must_use]
    pub fn alignment(&self) -> u32 {
        match self {
            Self::Primitive(p) => p.alignment(),
            Self::Array(a) => a.alignment(),
            Self::Struct(s) => s.alignment(),
            Self::Vertex(_) => VERTEX_STRIDE_ALIGNMENT,
        }
    }

    #[must_use]
    pub fn fixed_size(&self) -> u32 {
        match self {
            Self::Primitive(p) => p.size(),
            Self::Array(a) => a.fixed_size(),
            Self::Struct(s) => s.fixed_size(),
            Self::Vertex(_) => 0,
        }
    }

    /// Size of one element of the open tail; 0 for fully fixed layouts.
    #[must_use]
    pub fn variable_size(&self) -> u32 {
        match self {
            Self::Primitive(_) => 0,
            Self::Array(a) => a.variable_size(),
            Self::Struct(s) => s.variable_size(),
            Self::Vertex(v) => v.stride(),
        }
    }

    #[must_use]
    pub fn is_open(&self) -> bool {
        self.variable_size() > 0
    }

    /// Buffer size for `element_count` tail elements, rounded up to 4 bytes.
    #[must_use]
    pub fn byte_size(&self, element_count: u32) -> u64 {
        let raw = u64::from(self.variable_size()) * u64::from(element_count)
            + u64::from(self.fixed_size());
        raw.next_multiple_of(wgpu::COPY_BUFFER_ALIGNMENT)
    }

    /// Smallest buffer a binding of this layout accepts: the fixed head plus
    /// one tail element.
    #[must_use]
    pub fn min_binding_size(&self) -> u64 {
        u64::from(self.fixed_size()) + u64::from(self.variable_size())
    }

    /// Index format when this layout is an array of `u16`/`u32` scalars.
    #[must_use]
    pub fn index_format(&self) -> Option<wgpu::IndexFormat> {
        let Self::Array(array) = self else {
            return None;
        };
        let Self::Primitive(element) = array.element() else {
            return None;
        };
        if element.multiplier() != Multiplier::Scalar
            || element.size() != element.format().bytes()
        {
            return None;
        }
        match element.format() {
            ScalarFormat::U16 => Some(wgpu::IndexFormat::Uint16),
            ScalarFormat::U32 => Some(wgpu::IndexFormat::Uint32),
            _ => None,
        }
    }

    /// Number of addressable elements in a buffer holding `element_count`
    /// tail elements: vertices, indices or array entries.
    #[must_use]
    pub fn element_capacity(&self, element_count: u32) -> u32 {
        match self {
            Self::Array(a) => a.count().unwrap_or(element_count),
            _ if self.is_open() => element_count,
            _ => 1,
        }
    }

    // ========================================================================
    // Path Resolution
    // ========================================================================

    /// Resolves `path` to the byte range it addresses.
    ///
    /// Addressing a node whose size is still open (an open array, a struct
    /// ending in one, a vertex buffer) without indexing into it fails with
    /// [`Error::OpenSize`].
    pub fn location_of(&self, path: &[PathSegment]) -> Result<Location> {
        self.resolve(path, 0, path)
    }

    /// [`location_of`](Self::location_of) for a textual path.
    pub fn locate(&self, path: &str) -> Result<Location> {
        self.location_of(&parse_path(path)?)
    }

    fn resolve(&self, rest: &[PathSegment], base: u64, full: &[PathSegment]) -> Result<Location> {
        let invalid = |reason: String| Error::InvalidPath {
            path: DisplayPath(full).to_string(),
            reason,
        };

        let Some((head, rest)) = rest.split_first() else {
            if self.is_open() {
                return Err(Error::OpenSize(DisplayPath(full).to_string()));
            }
            return Ok(Location {
                offset: base,
                size: u64::from(self.fixed_size()),
            });
        };

        match (self, head) {
            (Self::Struct(s), PathSegment::Field(name)) => {
                let field = s
                    .field(name)
                    .ok_or_else(|| invalid(format!("no field named '{name}'")))?;
                field
                    .layout()
                    .resolve(rest, base + u64::from(field.offset()), full)
            }
            (Self::Array(a), PathSegment::Index(index)) => {
                if let Some(count) = a.count()
                    && *index >= count
                {
                    return Err(invalid(format!("index {index} out of bounds for {count} elements")));
                }
                let offset = base + u64::from(*index) * u64::from(a.stride());
                a.element().resolve(rest, offset, full)
            }
            (Self::Vertex(v), PathSegment::Index(index)) => {
                let offset = base + u64::from(*index) * u64::from(v.stride());
                match rest {
                    [] => Ok(Location {
                        offset,
                        size: u64::from(v.stride()),
                    }),
                    [PathSegment::Field(name)] => {
                        let attribute = v
                            .attribute(name)
                            .ok_or_else(|| invalid(format!("no attribute named '{name}'")))?;
                        Ok(Location {
                            offset: offset + u64::from(attribute.offset()),
                            size: u64::from(attribute.size()),
                        })
                    }
                    _ => Err(invalid("vertex attributes are not addressable below the attribute".to_string())),
                }
            }
            (Self::Primitive(p), PathSegment::Index(index)) => {
                let (offset, element) = p
                    .element(*index)
                    .ok_or_else(|| invalid(format!("index {index} out of range for {:?}", p.multiplier())))?;
                Self::Primitive(element).resolve(rest, base + u64::from(offset), full)
            }
            (_, PathSegment::Field(name)) => Err(invalid(format!(
                "'{name}' addresses a field of a {:?} layout",
                self.kind()
            ))),
            (_, PathSegment::Index(_)) => Err(invalid(format!(
                "{:?} layouts are not indexable",
                self.kind()
            ))),
        }
    }
}
