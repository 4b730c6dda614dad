use rustc_hash::FxHashMap;

use super::MemoryLayout;
use crate::errors::{Error, Result};

/// Fixed-count or open (runtime-sized) array.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArrayLayout {
    element: Box<MemoryLayout>,
    count: Option<u32>,
    stride: u32,
    fixed_size: u32,
}

impl ArrayLayout {
    /// `count == None` declares an open array whose length is resolved per buffer.
    pub fn new(element: MemoryLayout, count: Option<u32>) -> Result<Self> {
        if element.variable_size() > 0 {
            return Err(Error::InvalidLayout(
                "array elements must have a fixed size".to_string(),
            ));
        }
        if element.fixed_size() == 0 {
            return Err(Error::InvalidLayout("array elements must not be empty".to_string()));
        }
        let stride = align_to(element.fixed_size(), element.alignment())?;
        let fixed_size = match count {
            Some(count) => count.checked_mul(stride).ok_or_else(|| {
                Error::InvalidLayout(format!(
                    "array of {count} elements with stride {stride} exceeds u32 bytes"
                ))
            })?,
            None => 0,
        };
        Ok(Self {
            element: Box::new(element),
            count,
            stride,
            fixed_size,
        })
    }

    /// Open array of a primitive, which cannot overflow.
    pub(super) fn open_primitive(element: MemoryLayout) -> Self {
        let stride = element.fixed_size().div_ceil(element.alignment()) * element.alignment();
        Self {
            element: Box::new(element),
            count: None,
            stride,
            fixed_size: 0,
        }
    }

    #[must_use]
    pub fn element(&self) -> &MemoryLayout {
        &self.element
    }

    #[must_use]
    pub fn count(&self) -> Option<u32> {
        self.count
    }

    /// Distance between consecutive elements.
    #[must_use]
    pub fn stride(&self) -> u32 {
        self.stride
    }

    pub(super) fn alignment(&self) -> u32 {
        self.element.alignment()
    }

    pub(super) fn fixed_size(&self) -> u32 {
        self.fixed_size
    }

    pub(super) fn variable_size(&self) -> u32 {
        if self.count.is_some() { 0 } else { self.stride }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StructField {
    name: String,
    layout: MemoryLayout,
    offset: u32,
}

impl StructField {
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn layout(&self) -> &MemoryLayout {
        &self.layout
    }

    #[must_use]
    pub fn offset(&self) -> u32 {
        self.offset
    }
}

/// Ordered, named fields laid out with GPU alignment padding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StructLayout {
    fields: Vec<StructField>,
    by_name: FxHashMap<String, usize>,
    alignment: u32,
    fixed_size: u32,
    variable_size: u32,
}

impl StructLayout {
    /// Only the last field may be open-sized.
    pub fn new<N: Into<String>>(fields: impl IntoIterator<Item = (N, MemoryLayout)>) -> Result<Self> {
        let fields: Vec<(String, MemoryLayout)> =
            fields.into_iter().map(|(name, layout)| (name.into(), layout)).collect();
        if fields.is_empty() {
            return Err(Error::InvalidLayout("struct has no fields".to_string()));
        }

        let mut by_name = FxHashMap::default();
        let mut offset = 0_u32;
        let mut alignment = 1_u32;
        let mut variable_size = 0;
        let last = fields.len() - 1;
        let mut laid_out = Vec::with_capacity(fields.len());

        for (i, (name, layout)) in fields.into_iter().enumerate() {
            if by_name.insert(name.clone(), i).is_some() {
                return Err(Error::DuplicateIdentifier(format!("struct field '{name}'")));
            }
            if layout.variable_size() > 0 {
                if i != last {
                    return Err(Error::InvalidLayout(format!(
                        "open-sized field '{name}' must be the last field"
                    )));
                }
                variable_size = layout.variable_size();
            }
            let field_alignment = layout.alignment();
            offset = align_to(offset, field_alignment)?;
            alignment = alignment.max(field_alignment);
            let end = offset.checked_add(layout.fixed_size()).ok_or_else(|| {
                Error::InvalidLayout(format!("field '{name}' ends past u32 bytes"))
            })?;
            laid_out.push(StructField {
                name,
                offset,
                layout,
            });
            offset = end;
        }

        Ok(Self {
            fields: laid_out,
            by_name,
            alignment,
            fixed_size: align_to(offset, alignment)?,
            variable_size,
        })
    }

    #[must_use]
    pub fn fields(&self) -> &[StructField] {
        &self.fields
    }

    #[must_use]
    pub fn field(&self, name: &str) -> Option<&StructField> {
        self.by_name.get(name).map(|&i| &self.fields[i])
    }

    pub(super) fn alignment(&self) -> u32 {
        self.alignment
    }

    pub(super) fn fixed_size(&self) -> u32 {
        self.fixed_size
    }

    pub(super) fn variable_size(&self) -> u32 {
        self.variable_size
    }
}

fn align_to(value: u32, alignment: u32) -> Result<u32> {
    value
        .checked_next_multiple_of(alignment)
        .ok_or_else(|| Error::InvalidLayout(format!("{value} bytes cannot be aligned to {alignment}")))
}
