use std::fmt;

use crate::errors::{Error, Result};

/// One step of a layout path.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PathSegment {
    Field(String),
    Index(u32),
}

impl From<&str> for PathSegment {
    fn from(name: &str) -> Self {
        Self::Field(name.to_string())
    }
}

impl From<u32> for PathSegment {
    fn from(index: u32) -> Self {
        Self::Index(index)
    }
}

/// Formats segments back to `a.b[3].c` notation.
pub(crate) struct DisplayPath<'a>(pub &'a [PathSegment]);

impl fmt::Display for DisplayPath<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return f.write_str("<root>");
        }
        for (i, segment) in self.0.iter().enumerate() {
            match segment {
                PathSegment::Field(name) if i == 0 => f.write_str(name)?,
                PathSegment::Field(name) => write!(f, ".{name}")?,
                PathSegment::Index(index) => write!(f, "[{index}]")?,
            }
        }
        Ok(())
    }
}

/// Parses `lights[2].color`, `[0].position` or `matrix[1][2]`.
///
/// The empty string addresses the whole layout.
pub fn parse_path(text: &str) -> Result<Vec<PathSegment>> {
    let invalid = |reason: &str| Error::InvalidPath {
        path: text.to_string(),
        reason: reason.to_string(),
    };

    let mut segments = Vec::new();
    let mut rest = text;
    while !rest.is_empty() {
        if let Some(after) = rest.strip_prefix('[') {
            let close = after.find(']').ok_or_else(|| invalid("unclosed '['"))?;
            let index = after[..close]
                .parse::<u32>()
                .map_err(|_| invalid("index is not an unsigned integer"))?;
            segments.push(PathSegment::Index(index));
            rest = &after[close + 1..];
            continue;
        }

        let name_start = if let Some(after) = rest.strip_prefix('.') {
            if segments.is_empty() {
                return Err(invalid("path starts with '.'"));
            }
            after
        } else if segments.is_empty() {
            rest
        } else {
            return Err(invalid("expected '.' or '[' between segments"));
        };

        let end = name_start.find(['.', '[']).unwrap_or(name_start.len());
        let name = &name_start[..end];
        if name.is_empty() {
            return Err(invalid("empty field name"));
        }
        if name.contains(']') {
            return Err(invalid("unexpected ']'"));
        }
        segments.push(PathSegment::Field(name.to_string()));
        rest = &name_start[end..];
    }
    Ok(segments)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn field(name: &str) -> PathSegment {
        PathSegment::Field(name.to_string())
    }

    #[test]
    fn parses_fields_and_indices() {
        assert_eq!(
            parse_path("lights[2].color").unwrap(),
            vec![field("lights"), PathSegment::Index(2), field("color")]
        );
        assert_eq!(
            parse_path("[0].position").unwrap(),
            vec![PathSegment::Index(0), field("position")]
        );
        assert_eq!(
            parse_path("model[3][1]").unwrap(),
            vec![field("model"), PathSegment::Index(3), PathSegment::Index(1)]
        );
        assert!(parse_path("").unwrap().is_empty());
    }

    #[test]
    fn rejects_malformed_paths() {
        for bad in [".a", "a..b", "a[", "a[x]", "a[-1]", "a]b", "a[0]b"] {
            assert!(
                matches!(parse_path(bad), Err(Error::InvalidPath { .. })),
                "accepted {bad:?}"
            );
        }
    }

    #[test]
    fn display_round_trips() {
        let segments = parse_path("camera.view[2]").unwrap();
        assert_eq!(DisplayPath(&segments).to_string(), "camera.view[2]");
    }
}
