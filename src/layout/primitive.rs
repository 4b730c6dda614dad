use serde::{Deserialize, Serialize};

use crate::errors::{Error, Result};

/// Scalar component type of a primitive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ScalarFormat {
    F16,
    F32,
    I32,
    U32,
    /// Index data only.
    U16,
}

impl ScalarFormat {
    #[must_use]
    pub const fn bytes(self) -> u32 {
        match self {
            Self::F16 | Self::U16 => 2,
            Self::F32 | Self::I32 | Self::U32 => 4,
        }
    }
}

/// Shape of a primitive: scalar, vector or `columns × rows` matrix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Multiplier {
    Scalar,
    Vec2,
    Vec3,
    Vec4,
    Mat { columns: u8, rows: u8 },
}

impl Multiplier {
    #[must_use]
    pub const fn components(self) -> u32 {
        match self {
            Self::Scalar => 1,
            Self::Vec2 => 2,
            Self::Vec3 => 3,
            Self::Vec4 => 4,
            Self::Mat { columns, rows } => columns as u32 * rows as u32,
        }
    }

    const fn vector(n: u32) -> Self {
        match n {
            1 => Self::Scalar,
            2 => Self::Vec2,
            3 => Self::Vec3,
            _ => Self::Vec4,
        }
    }
}

const fn vector_size(scalar: u32, n: u32) -> u32 {
    scalar * n
}

/// vec3 aligns like vec4.
const fn vector_alignment(scalar: u32, n: u32) -> u32 {
    scalar * if n <= 2 { n } else { 4 }
}

/// A scalar, vector or matrix with its resolved size and alignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PrimitiveLayout {
    format: ScalarFormat,
    multiplier: Multiplier,
    size: u32,
    alignment: u32,
}

impl PrimitiveLayout {
    /// Natural layout. Matrix dimensions must be in `2..=4`.
    pub fn new(format: ScalarFormat, multiplier: Multiplier) -> Result<Self> {
        if let Multiplier::Mat { columns, rows } = multiplier
            && !((2..=4).contains(&columns) && (2..=4).contains(&rows))
        {
            return Err(Error::InvalidLayout(format!(
                "matrix must be 2..=4 columns by 2..=4 rows, got {columns}x{rows}"
            )));
        }
        Ok(Self::natural(format, multiplier))
    }

    pub(crate) const fn natural(format: ScalarFormat, multiplier: Multiplier) -> Self {
        let scalar = format.bytes();
        let (size, alignment) = match multiplier {
            Multiplier::Mat { columns, rows } => {
                let rows = rows as u32;
                let column_align = vector_alignment(scalar, rows);
                let column_stride = vector_size(scalar, rows).div_ceil(column_align) * column_align;
                (columns as u32 * column_stride, column_align)
            }
            other => {
                let n = other.components();
                (vector_size(scalar, n), vector_alignment(scalar, n))
            }
        };
        Self {
            format,
            multiplier,
            size,
            alignment,
        }
    }

    /// Applies explicit size/alignment overrides.
    ///
    /// Overrides may only grow the natural values, and an alignment override
    /// must be a multiple of the natural alignment.
    pub fn with_overrides(mut self, size: Option<u32>, alignment: Option<u32>) -> Result<Self> {
        if let Some(size) = size {
            if size < self.size {
                return Err(Error::InvalidLayout(format!(
                    "size override {size} is below the natural size {}",
                    self.size
                )));
            }
            self.size = size;
        }
        if let Some(alignment) = alignment {
            if alignment < self.alignment || alignment % self.alignment != 0 {
                return Err(Error::InvalidLayout(format!(
                    "alignment override {alignment} is not a multiple of the natural alignment {}",
                    self.alignment
                )));
            }
            self.alignment = alignment;
        }
        Ok(self)
    }

    #[must_use]
    pub fn format(&self) -> ScalarFormat {
        self.format
    }

    #[must_use]
    pub fn multiplier(&self) -> Multiplier {
        self.multiplier
    }

    #[must_use]
    pub fn size(&self) -> u32 {
        self.size
    }

    #[must_use]
    pub fn alignment(&self) -> u32 {
        self.alignment
    }

    /// Component of a vector or column of a matrix, with its byte offset.
    pub(crate) fn element(&self, index: u32) -> Option<(u32, Self)> {
        let scalar = self.format.bytes();
        match self.multiplier {
            Multiplier::Scalar => None,
            Multiplier::Mat { columns, rows } => {
                if index >= u32::from(columns) {
                    return None;
                }
                let column = Self::natural(self.format, Multiplier::vector(u32::from(rows)));
                let stride = column.size.div_ceil(column.alignment) * column.alignment;
                Some((index * stride, column))
            }
            vector => (index < vector.components())
                .then(|| (index * scalar, Self::natural(self.format, Multiplier::Scalar))),
        }
    }
}
