//! Paths into the neutral configuration tree.
//!
//! A [`Path`] addresses one node instance: list items carry a key,
//! containers do not. A [`SchemaPath`] is the same sequence of node names
//! with the keys dropped; handlers are registered against schema paths and
//! invoked with instance paths.

use std::fmt;
use std::str::FromStr;

use crate::error::RegistryError;

/// One step of a [`Path`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PathSegment {
    /// Node name (e.g. `interface`).
    pub name: String,

    /// List key, for list items (e.g. `GigabitEthernet0/1`).
    pub key: Option<String>,
}

impl PathSegment {
    /// Container segment.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            key: None,
        }
    }

    /// List item segment.
    pub fn keyed(name: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            key: Some(key.into()),
        }
    }
}

impl fmt::Display for PathSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.key {
            Some(key) => write!(f, "{}[{}]", self.name, key),
            None => f.write_str(&self.name),
        }
    }
}

/// Instance path of a configuration node.
///
/// # Example
///
/// ```rust
/// use clitrans::translate::Path;
///
/// let path = Path::root()
///     .child("interfaces")
///     .child_keyed("interface", "GigabitEthernet0/1")
///     .child("config");
///
/// assert_eq!(path.to_string(), "/interfaces/interface[GigabitEthernet0/1]/config");
/// assert_eq!(path.first_key_of("interface"), Some("GigabitEthernet0/1"));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Path {
    segments: Vec<PathSegment>,
}

impl Path {
    /// The empty path.
    pub fn root() -> Self {
        Self::default()
    }

    /// Parse `/a/b[key]/c`. Keys may contain `/` but not `]`.
    pub fn parse(s: &str) -> Result<Self, RegistryError> {
        let invalid = |message: &str| RegistryError::InvalidData {
            path: s.to_string(),
            message: message.to_string(),
        };

        let mut segments = Vec::new();
        let mut rest = s.strip_prefix('/').unwrap_or(s);

        while !rest.is_empty() {
            let name_end = rest.find(['/', '[']).unwrap_or(rest.len());
            let name = &rest[..name_end];
            if name.is_empty() {
                return Err(invalid("empty node name"));
            }
            rest = &rest[name_end..];

            let key = if let Some(after_bracket) = rest.strip_prefix('[') {
                let close = after_bracket
                    .find(']')
                    .ok_or_else(|| invalid("unterminated key"))?;
                let key = &after_bracket[..close];
                rest = &after_bracket[close + 1..];
                Some(key.to_string())
            } else {
                None
            };

            segments.push(PathSegment {
                name: name.to_string(),
                key,
            });

            match rest.strip_prefix('/') {
                Some(next) => rest = next,
                None if rest.is_empty() => {}
                None => return Err(invalid("expected '/' after key")),
            }
        }

        Ok(Self { segments })
    }

    /// Append a container segment.
    pub fn child(mut self, name: impl Into<String>) -> Self {
        self.segments.push(PathSegment::new(name));
        self
    }

    /// Append a list item segment.
    pub fn child_keyed(mut self, name: impl Into<String>, key: impl Into<String>) -> Self {
        self.segments.push(PathSegment::keyed(name, key));
        self
    }

    /// Replace the key of the last segment.
    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        if let Some(last) = self.segments.last_mut() {
            last.key = Some(key.into());
        }
        self
    }

    /// The path without its last segment.
    pub fn parent(&self) -> Option<Path> {
        if self.segments.is_empty() {
            return None;
        }
        Some(Path {
            segments: self.segments[..self.segments.len() - 1].to_vec(),
        })
    }

    /// Last segment.
    pub fn last(&self) -> Option<&PathSegment> {
        self.segments.last()
    }

    /// All segments, outermost first.
    pub fn segments(&self) -> &[PathSegment] {
        &self.segments
    }

    /// Number of segments.
    pub fn len(&self) -> usize {
        self.segments.len()
    }

    /// Whether this is the root path.
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Key of the innermost segment named `name`.
    pub fn first_key_of(&self, name: &str) -> Option<&str> {
        self.segments
            .iter()
            .rev()
            .find(|s| s.name == name)
            .and_then(|s| s.key.as_deref())
    }

    /// Whether `prefix` is an ancestor of (or equal to) this path.
    pub fn starts_with(&self, prefix: &Path) -> bool {
        self.segments.starts_with(&prefix.segments)
    }

    /// The key-less schema path this instance belongs to.
    pub fn schema(&self) -> SchemaPath {
        SchemaPath(self.segments.iter().map(|s| s.name.clone()).collect())
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.segments.is_empty() {
            return f.write_str("/");
        }
        for segment in &self.segments {
            write!(f, "/{}", segment)?;
        }
        Ok(())
    }
}

impl FromStr for Path {
    type Err = RegistryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Path::parse(s)
    }
}

/// Key-less path identifying a node type. Handlers register against these.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SchemaPath(Vec<String>);

impl SchemaPath {
    /// Build from node names.
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(names.into_iter().map(Into::into).collect())
    }

    /// Node names, outermost first.
    pub fn names(&self) -> &[String] {
        &self.0
    }

    /// Append a node name.
    pub fn child(mut self, name: impl Into<String>) -> Self {
        self.0.push(name.into());
        self
    }
}

impl From<&str> for SchemaPath {
    fn from(s: &str) -> Self {
        SchemaPath(
            s.split('/')
                .filter(|part| !part.is_empty())
                .map(str::to_string)
                .collect(),
        )
    }
}

impl From<String> for SchemaPath {
    fn from(s: String) -> Self {
        SchemaPath::from(s.as_str())
    }
}

impl From<&SchemaPath> for SchemaPath {
    fn from(s: &SchemaPath) -> Self {
        s.clone()
    }
}

impl fmt::Display for SchemaPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return f.write_str("/");
        }
        for name in &self.0 {
            write!(f, "/{}", name)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_and_display() {
        let path = Path::parse("/network-instances/network-instance[default]/protocols").unwrap();
        assert_eq!(path.len(), 3);
        assert_eq!(path.first_key_of("network-instance"), Some("default"));
        assert_eq!(
            path.to_string(),
            "/network-instances/network-instance[default]/protocols"
        );
    }

    #[test]
    fn test_parse_key_with_slash() {
        let path = Path::parse("/interfaces/interface[GigabitEthernet0/0/1]/config").unwrap();
        assert_eq!(path.first_key_of("interface"), Some("GigabitEthernet0/0/1"));
        assert_eq!(path.last().unwrap().name, "config");
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(Path::parse("/a[b").is_err());
        assert!(Path::parse("/a//b").is_err());
        assert!(Path::parse("/a[b]c").is_err());
    }

    #[test]
    fn test_schema_drops_keys() {
        let path = Path::parse("/interfaces/interface[eth0]/config").unwrap();
        assert_eq!(path.schema(), SchemaPath::from("/interfaces/interface/config"));
        assert_eq!(path.schema().to_string(), "/interfaces/interface/config");
    }

    #[test]
    fn test_parent_and_prefix() {
        let path = Path::parse("/interfaces/interface[eth0]/config").unwrap();
        let parent = path.parent().unwrap();
        assert_eq!(parent.to_string(), "/interfaces/interface[eth0]");
        assert!(path.starts_with(&parent));
        assert!(!parent.starts_with(&path));
        assert_eq!(Path::root().parent(), None);
    }

    #[test]
    fn test_with_key() {
        let list = Path::root().child("interfaces").child("interface");
        let item = list.with_key("eth1");
        assert_eq!(item.to_string(), "/interfaces/interface[eth1]");
    }
}
