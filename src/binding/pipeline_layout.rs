use crate::device::{GpuDevice, RawBindGroupLayoutId, RawPipelineLayoutId};
use crate::errors::{Error, Result};
use crate::handles::BindGroupLayoutId;
use crate::native::NativeOps;

/// How a group slot of a pipeline layout is filled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GroupRole {
    /// Declared with its layout; may later be swapped by `replace_group`.
    Initial,
    /// Declared by index and name only; receives its layout once.
    Placeholder,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupEntry {
    pub index: u32,
    pub name: String,
    pub role: GroupRole,
    pub layout: Option<BindGroupLayoutId>,
}

/// Ordered, named bind group layouts consumed by pipelines.
#[derive(Debug, Clone)]
pub struct PipelineLayout {
    label: String,
    groups: Vec<GroupEntry>,
}

impl PipelineLayout {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            groups: Vec::new(),
        }
    }

    pub fn with_group(
        mut self,
        index: u32,
        name: impl Into<String>,
        layout: BindGroupLayoutId,
    ) -> Result<Self> {
        self.insert(GroupEntry {
            index,
            name: name.into(),
            role: GroupRole::Initial,
            layout: Some(layout),
        })?;
        Ok(self)
    }

    pub fn with_placeholder(mut self, index: u32, name: impl Into<String>) -> Result<Self> {
        self.insert(GroupEntry {
            index,
            name: name.into(),
            role: GroupRole::Placeholder,
            layout: None,
        })?;
        Ok(self)
    }

    fn insert(&mut self, entry: GroupEntry) -> Result<()> {
        if self.groups.iter().any(|g| g.index == entry.index) {
            return Err(Error::DuplicateIdentifier(format!(
                "group index {} in '{}'",
                entry.index, self.label
            )));
        }
        if self.groups.iter().any(|g| g.name == entry.name) {
            return Err(Error::DuplicateIdentifier(format!(
                "group name '{}' in '{}'",
                entry.name, self.label
            )));
        }
        let pos = self.groups.partition_point(|g| g.index < entry.index);
        self.groups.insert(pos, entry);
        Ok(())
    }

    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Groups ordered by index.
    #[must_use]
    pub fn groups(&self) -> &[GroupEntry] {
        &self.groups
    }

    #[must_use]
    pub fn group(&self, name: &str) -> Option<&GroupEntry> {
        self.groups.iter().find(|g| g.name == name)
    }

    fn group_mut(&mut self, name: &str) -> Result<&mut GroupEntry> {
        let label = &self.label;
        self.groups
            .iter_mut()
            .find(|g| g.name == name)
            .ok_or_else(|| Error::UnknownResource(format!("group '{name}' in '{label}'")))
    }

    /// Group indices must run 0, 1, 2, ... without gaps.
    pub fn check_contiguous(&self) -> Result<()> {
        match self.groups.iter().zip(0u32..).find(|(g, i)| g.index != *i) {
            Some((_, index)) => Err(Error::GroupIndexGap { index }),
            None => Ok(()),
        }
    }

    /// Bind group layouts in index order, ready for native generation.
    pub fn ordered_layouts(&self) -> Result<Vec<BindGroupLayoutId>> {
        self.check_contiguous()?;
        self.groups
            .iter()
            .map(|g| {
                g.layout.ok_or_else(|| {
                    Error::SetupOrder(format!(
                        "placeholder group '{}' of '{}' has no layout assigned",
                        g.name, self.label
                    ))
                })
            })
            .collect()
    }

    /// Gives a placeholder group its layout. Each placeholder is assigned once.
    pub(crate) fn assign(&mut self, name: &str, layout: BindGroupLayoutId) -> Result<()> {
        let entry = self.group_mut(name)?;
        match (entry.role, entry.layout) {
            (GroupRole::Initial, _) => Err(Error::LayoutMismatch(format!(
                "group '{name}' is not a placeholder"
            ))),
            (GroupRole::Placeholder, Some(_)) => Err(Error::SetupOrder(format!(
                "placeholder group '{name}' is already assigned"
            ))),
            (GroupRole::Placeholder, None) => {
                entry.layout = Some(layout);
                Ok(())
            }
        }
    }

    /// Current layout of an initial group, the only kind that can be replaced.
    pub(crate) fn replaceable(&self, name: &str) -> Result<BindGroupLayoutId> {
        let entry = self
            .group(name)
            .ok_or_else(|| Error::UnknownResource(format!("group '{name}' in '{}'", self.label)))?;
        match (entry.role, entry.layout) {
            (GroupRole::Initial, Some(layout)) => Ok(layout),
            _ => Err(Error::LayoutMismatch(format!(
                "placeholder group '{name}' cannot be replaced"
            ))),
        }
    }

    pub(crate) fn replace(&mut self, name: &str, layout: BindGroupLayoutId) -> Result<()> {
        self.group_mut(name)?.layout = Some(layout);
        Ok(())
    }
}

pub(crate) struct PipelineLayoutOps<'a, D> {
    pub device: &'a mut D,
    pub groups: &'a [RawBindGroupLayoutId],
    pub label: &'a str,
}

impl<D: GpuDevice> NativeOps<RawPipelineLayoutId> for PipelineLayoutOps<'_, D> {
    fn generate(&mut self) -> Result<Option<RawPipelineLayoutId>> {
        let id = self
            .device
            .create_pipeline_layout(Some(self.label), self.groups)?;
        Ok(Some(id))
    }

    fn destroy(&mut self, handle: RawPipelineLayoutId) {
        self.device.destroy_pipeline_layout(handle);
    }
}
