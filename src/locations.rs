//! Reference location resolution
//!
//! This module classifies `href`/`conref` values and resolves the relative,
//! possibly percent-encoded, paths they carry against the directory of the
//! document that contains them.

use std::fmt;
use std::path::{Component, Path, PathBuf};

use url::Url;

use crate::error::{Error, Result};

/// Fragment part of a reference: `#topic` or `#topic/element`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Fragment {
    /// First fragment segment (a topic id, or any id in the short form)
    pub topic: String,
    /// Element id inside the topic, if the two-part form was used
    pub element: Option<String>,
}

impl Fragment {
    /// Parse the text after `#`; empty fragments yield `None`
    pub fn parse(text: &str) -> Option<Self> {
        if text.is_empty() {
            return None;
        }
        match text.split_once('/') {
            Some((topic, element)) => Some(Self {
                topic: topic.to_string(),
                element: Some(element.to_string()),
            }),
            None => Some(Self {
                topic: text.to_string(),
                element: None,
            }),
        }
    }
}

impl fmt::Display for Fragment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.element {
            Some(element) => write!(f, "{}/{}", self.topic, element),
            None => write!(f, "{}", self.topic),
        }
    }
}

/// A classified reference attribute value
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reference {
    /// Empty or fragment-less `#`
    Empty,
    /// Absolute URL with a scheme (http, https, mailto, ...)
    External(String),
    /// `#id` or `#topic/element` inside the referencing document
    Fragment(Fragment),
    /// Path to another file, as written (still encoded), with optional fragment
    CrossFile {
        /// Raw path component
        path: String,
        /// Fragment component
        fragment: Option<Fragment>,
    },
}

impl Reference {
    /// Classify an attribute value
    pub fn parse(href: &str) -> Self {
        let href = href.trim();
        if href.is_empty() {
            return Reference::Empty;
        }
        if is_external(href) {
            return Reference::External(href.to_string());
        }
        if let Some(fragment) = href.strip_prefix('#') {
            return Fragment::parse(fragment)
                .map(Reference::Fragment)
                .unwrap_or(Reference::Empty);
        }
        match href.split_once('#') {
            Some((path, fragment)) => Reference::CrossFile {
                path: path.to_string(),
                fragment: Fragment::parse(fragment),
            },
            None => Reference::CrossFile {
                path: href.to_string(),
                fragment: None,
            },
        }
    }

    /// Check if this reference leaves the local file system
    pub fn is_external(&self) -> bool {
        matches!(self, Reference::External(_))
    }

    /// Path component of a cross-file reference
    pub fn path(&self) -> Option<&str> {
        match self {
            Reference::CrossFile { path, .. } => Some(path),
            _ => None,
        }
    }
}

/// Check whether an href is an absolute URL rather than a file reference.
///
/// Single-letter schemes are Windows drive letters, not URLs.
pub fn is_external(href: &str) -> bool {
    match Url::parse(href) {
        Ok(url) => url.scheme() != "file" && url.scheme().len() > 1,
        Err(_) => false,
    }
}

/// Resolve a raw (possibly percent-encoded) relative path against a
/// directory, returning a normalized absolute path.
pub fn resolve_path(base_dir: &Path, raw_path: &str) -> Result<PathBuf> {
    let base = Url::from_directory_path(base_dir).map_err(|_| {
        Error::Reference(format!(
            "base directory '{}' is not an absolute path",
            base_dir.display()
        ))
    })?;
    let url = base.join(raw_path.trim())?;
    if url.scheme() != "file" {
        return Err(Error::Reference(format!(
            "'{}' does not resolve to a local file",
            raw_path
        )));
    }
    url.to_file_path().map_err(|_| {
        Error::Reference(format!("'{}' is not a valid file path", raw_path))
    })
}

/// Resolve the file targeted by an href, ignoring its fragment.
///
/// Returns `None` for external, empty and fragment-only references.
pub fn resolve_target(base_dir: &Path, href: &str) -> Option<PathBuf> {
    match Reference::parse(href) {
        Reference::CrossFile { path, .. } if !path.is_empty() => {
            resolve_path(base_dir, &path).ok()
        }
        _ => None,
    }
}

/// Lower-cased file name without extension, used to match mini-TOC entries
/// against child topics regardless of spelling or extension.
pub fn file_stem_key(path: &Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().to_lowercase())
        .unwrap_or_default()
}

/// Lexically normalize a path (drop `.`, fold `..`) without touching disk
pub fn normalize(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !normalized.pop() {
                    normalized.push(component);
                }
            }
            other => normalized.push(other),
        }
    }
    normalized
}

/// Make a path absolute, preferring the canonical form when it exists
pub fn absolutize(path: &Path) -> Result<PathBuf> {
    if let Ok(canonical) = path.canonicalize() {
        return Ok(canonical);
    }
    let joined = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()?.join(path)
    };
    Ok(normalize(&joined))
}

/// Path of `path` relative to `root`, with forward slashes, when it lies
/// under `root`
pub fn relative_display(root: &Path, path: &Path) -> Option<String> {
    let relative = path.strip_prefix(root).ok()?;
    let parts: Vec<String> = relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy().to_string())
        .collect();
    Some(parts.join("/"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reference_external() {
        assert!(Reference::parse("http://example.com/a.html").is_external());
        assert!(Reference::parse("https://example.com").is_external());
        assert!(Reference::parse("mailto:docs@example.com").is_external());
        assert!(!Reference::parse("Topics/a.xml").is_external());
        assert!(!Reference::parse("C:/docs/a.xml").is_external());
    }

    #[test]
    fn test_reference_fragment_forms() {
        assert_eq!(
            Reference::parse("#intro"),
            Reference::Fragment(Fragment {
                topic: "intro".to_string(),
                element: None
            })
        );
        assert_eq!(
            Reference::parse("#a/b"),
            Reference::Fragment(Fragment {
                topic: "a".to_string(),
                element: Some("b".to_string())
            })
        );
        assert_eq!(Reference::parse("#"), Reference::Empty);
        assert_eq!(Reference::parse("  "), Reference::Empty);
    }

    #[test]
    fn test_reference_cross_file() {
        let reference = Reference::parse("../Topics/b.xml#a/b");
        match reference {
            Reference::CrossFile { path, fragment } => {
                assert_eq!(path, "../Topics/b.xml");
                assert_eq!(fragment.unwrap().to_string(), "a/b");
            }
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(Reference::parse("b.xml").path(), Some("b.xml"));
        assert_eq!(Reference::parse("#b").path(), None);
    }

    #[cfg(unix)]
    #[test]
    fn test_resolve_path_dots_and_encoding() {
        let base = Path::new("/docs/Chapters");
        let resolved = resolve_path(base, "../Topics/My%20Topic.xml").unwrap();
        assert_eq!(resolved, PathBuf::from("/docs/Topics/My Topic.xml"));

        let resolved = resolve_path(base, "./sub/../b.xml").unwrap();
        assert_eq!(resolved, PathBuf::from("/docs/Chapters/b.xml"));
    }

    #[cfg(unix)]
    #[test]
    fn test_resolve_target_skips_non_files() {
        let base = Path::new("/docs");
        assert!(resolve_target(base, "#intro").is_none());
        assert!(resolve_target(base, "https://example.com").is_none());
        assert_eq!(
            resolve_target(base, "a.xml#intro"),
            Some(PathBuf::from("/docs/a.xml"))
        );
    }

    #[test]
    fn test_resolve_path_rejects_relative_base() {
        assert!(resolve_path(Path::new("relative/dir"), "a.xml").is_err());
    }

    #[test]
    fn test_file_stem_key() {
        assert_eq!(file_stem_key(Path::new("/x/Install_Guide.XML")), "install_guide");
        assert_eq!(file_stem_key(Path::new("/x/a.dita")), file_stem_key(Path::new("a.xml")));
    }

    #[test]
    fn test_normalize() {
        assert_eq!(
            normalize(Path::new("/a/b/./c/../d.xml")),
            PathBuf::from("/a/b/d.xml")
        );
    }

    #[test]
    fn test_relative_display() {
        let root = Path::new("/docs");
        assert_eq!(
            relative_display(root, Path::new("/docs/Topics/a.xml")).as_deref(),
            Some("Topics/a.xml")
        );
        assert!(relative_display(root, Path::new("/other/a.xml")).is_none());
    }
}
