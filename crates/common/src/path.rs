//! Canonical remote paths.
//!
//! A remote path always starts with `/`. Folder paths end with `/`, document
//! paths never do, so the shape of the path alone says which kind of node a
//! request is aimed at. Every segment is non-empty and neither `.` nor `..`.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

pub const SEPARATOR: char = '/';

/// First segment marking world-readable documents.
pub const PUBLIC_SEGMENT: &str = "public/";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PathError {
    #[error("path must start with '/': {0}")]
    NotAbsolute(String),
    #[error("path contains an empty segment: {0}")]
    EmptySegment(String),
    #[error("path contains a relative segment: {0}")]
    RelativeSegment(String),
    #[error("path contains a control character: {0}")]
    ControlCharacter(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RemotePath(String);

impl RemotePath {
    pub fn root() -> Self {
        Self(SEPARATOR.to_string())
    }

    pub fn parse(raw: &str) -> Result<Self, PathError> {
        if !raw.starts_with(SEPARATOR) {
            return Err(PathError::NotAbsolute(raw.to_string()));
        }
        if raw.chars().any(char::is_control) {
            return Err(PathError::ControlCharacter(raw.escape_default().to_string()));
        }

        let body = &raw[1..];
        let body = body.strip_suffix(SEPARATOR).unwrap_or(body);
        if !body.is_empty() {
            for segment in body.split(SEPARATOR) {
                match segment {
                    "" => return Err(PathError::EmptySegment(raw.to_string())),
                    "." | ".." => return Err(PathError::RelativeSegment(raw.to_string())),
                    _ => {}
                }
            }
        } else if raw.len() > 1 {
            // "//"
            return Err(PathError::EmptySegment(raw.to_string()));
        }

        Ok(Self(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_root(&self) -> bool {
        self.0.len() == 1
    }

    pub fn is_folder(&self) -> bool {
        self.0.ends_with(SEPARATOR)
    }

    pub fn is_document(&self) -> bool {
        !self.is_folder()
    }

    /// Last segment; folder names keep their trailing separator, the root's
    /// name is empty.
    pub fn name(&self) -> &str {
        if self.is_root() {
            return "";
        }
        let trimmed = self.0.strip_suffix(SEPARATOR).unwrap_or(&self.0);
        let start = trimmed.rfind(SEPARATOR).map(|i| i + 1).unwrap_or(0);
        &self.0[start..]
    }

    /// Containing folder, `None` for the root.
    pub fn parent(&self) -> Option<RemotePath> {
        if self.is_root() {
            return None;
        }
        let name_len = self.name().len();
        Some(Self(self.0[..self.0.len() - name_len].to_string()))
    }

    /// Folder paths from the immediate parent up to and including the root.
    pub fn ancestors(&self) -> impl Iterator<Item = RemotePath> {
        std::iter::successors(self.parent(), RemotePath::parent)
    }

    /// Segment names from the root downwards, folder segments keeping their
    /// trailing separator.
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        let body = &self.0[1..];
        let mut rest = body;
        std::iter::from_fn(move || {
            if rest.is_empty() {
                return None;
            }
            let end = rest.find(SEPARATOR).map(|i| i + 1).unwrap_or(rest.len());
            let (segment, tail) = rest.split_at(end);
            rest = tail;
            Some(segment)
        })
    }

    /// Path of the child called `name` in this folder.
    pub fn join(&self, name: &str) -> RemotePath {
        debug_assert!(self.is_folder());
        Self(format!("{}{}", self.0, name))
    }

    /// The same name with the opposite kind: `/a/b` <-> `/a/b/`.
    pub fn twin(&self) -> Option<RemotePath> {
        if self.is_root() {
            return None;
        }
        match self.0.strip_suffix(SEPARATOR) {
            Some(document) => Some(Self(document.to_string())),
            None => Some(Self(format!("{}{}", self.0, SEPARATOR))),
        }
    }

    /// Public documents live under `/public/` and are readable by anyone.
    pub fn is_public(&self) -> bool {
        self.is_document() && self.segments().next() == Some(PUBLIC_SEGMENT)
    }

    /// Scope category the path belongs to: its first segment, looking
    /// through a leading `public/`.
    pub fn category(&self) -> Option<&str> {
        let mut segments = self.segments();
        let first = segments.next()?;
        let category = if first == PUBLIC_SEGMENT {
            segments.next()?
        } else {
            first
        };
        category.strip_suffix(SEPARATOR)
    }
}

impl fmt::Display for RemotePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for RemotePath {
    type Err = PathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl AsRef<str> for RemotePath {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Serialize for RemotePath {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for RemotePath {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        RemotePath::parse(&raw).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(s: &str) -> RemotePath {
        RemotePath::parse(s).unwrap()
    }

    #[test]
    fn test_parse_valid() {
        assert!(p("/").is_root());
        assert!(p("/Documents/").is_folder());
        assert!(p("/Documents/a.txt").is_document());
        assert!(p("/a/b/c/").is_folder());
    }

    #[test]
    fn test_parse_invalid() {
        assert!(matches!(
            RemotePath::parse("Documents/"),
            Err(PathError::NotAbsolute(_))
        ));
        assert!(matches!(
            RemotePath::parse("//"),
            Err(PathError::EmptySegment(_))
        ));
        assert!(matches!(
            RemotePath::parse("/a//b"),
            Err(PathError::EmptySegment(_))
        ));
        assert!(matches!(
            RemotePath::parse("/a/../b"),
            Err(PathError::RelativeSegment(_))
        ));
        assert!(matches!(
            RemotePath::parse("/a/./"),
            Err(PathError::RelativeSegment(_))
        ));
        assert!(matches!(
            RemotePath::parse("/a\nb"),
            Err(PathError::ControlCharacter(_))
        ));
    }

    #[test]
    fn test_name_and_parent() {
        assert_eq!(p("/").name(), "");
        assert_eq!(p("/").parent(), None);
        assert_eq!(p("/Documents/").name(), "Documents/");
        assert_eq!(p("/Documents/").parent(), Some(p("/")));
        assert_eq!(p("/Documents/a.txt").name(), "a.txt");
        assert_eq!(p("/Documents/a.txt").parent(), Some(p("/Documents/")));
    }

    #[test]
    fn test_parent_join_roundtrip() {
        for raw in ["/a", "/a/", "/a/b/c", "/a/b/c/"] {
            let path = p(raw);
            let parent = path.parent().unwrap();
            assert_eq!(parent.join(path.name()), path);
        }
    }

    #[test]
    fn test_ancestors_nearest_first() {
        let ancestors: Vec<_> = p("/a/b/c.txt").ancestors().collect();
        assert_eq!(ancestors, vec![p("/a/b/"), p("/a/"), p("/")]);
        assert_eq!(p("/").ancestors().count(), 0);
    }

    #[test]
    fn test_segments() {
        let path = p("/a/b/c.txt");
        let segments: Vec<_> = path.segments().collect();
        assert_eq!(segments, vec!["a/", "b/", "c.txt"]);
        let path = p("/a/b/");
        let segments: Vec<_> = path.segments().collect();
        assert_eq!(segments, vec!["a/", "b/"]);
        assert_eq!(p("/").segments().count(), 0);
    }

    #[test]
    fn test_twin() {
        assert_eq!(p("/a/b").twin(), Some(p("/a/b/")));
        assert_eq!(p("/a/b/").twin(), Some(p("/a/b")));
        assert_eq!(p("/").twin(), None);
    }

    #[test]
    fn test_public_and_category() {
        assert!(p("/public/photos/cat.jpg").is_public());
        assert!(!p("/public/photos/").is_public());
        assert!(!p("/photos/cat.jpg").is_public());
        assert_eq!(p("/public/photos/cat.jpg").category(), Some("photos"));
        assert_eq!(p("/photos/cat.jpg").category(), Some("photos"));
        assert_eq!(p("/photos/").category(), Some("photos"));
        // documents directly under the root or /public/ have no category
        assert_eq!(p("/readme").category(), None);
        assert_eq!(p("/public/readme").category(), None);
        assert_eq!(p("/").category(), None);
    }

    #[test]
    fn test_serde_validates() {
        let path: RemotePath = serde_json::from_str(r#""/a/b""#).unwrap();
        assert_eq!(path, p("/a/b"));
        assert!(serde_json::from_str::<RemotePath>(r#""a/b""#).is_err());
        assert_eq!(serde_json::to_string(&path).unwrap(), r#""/a/b""#);
    }
}
