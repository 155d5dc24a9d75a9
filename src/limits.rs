//! Limits and heuristic thresholds
//!
//! This module defines the thresholds used to tell a genuine mini-TOC apart
//! from incidental lists, plus the file size guard applied by the loader.
//! They are named fields rather than inline literals so tests can probe
//! behavior exactly at each boundary.

use crate::error::{Error, Result};

/// Global limits configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Limits {
    /// Maximum inline text (outside the list) in the paragraph around a
    /// mini-TOC, unless that text is a recognized introduction
    pub max_intro_chars: usize,

    /// Maximum number of elements in the surrounding paragraph, not counting
    /// the list itself
    pub max_paragraph_elements: usize,

    /// Maximum combined text of list items that carry no cross-reference
    pub max_item_text_chars: usize,

    /// Minimum number of xref-bearing list items for a list to qualify
    pub min_toc_items: usize,

    /// Minimum number of child topics before a mini-TOC is expected
    pub min_children_for_toc: usize,

    /// Maximum XML file size in bytes
    pub max_file_size: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_intro_chars: 100,
            max_paragraph_elements: 20,
            max_item_text_chars: 100,
            min_toc_items: 2,
            min_children_for_toc: 2,
            max_file_size: 100 * 1024 * 1024, // 100 MB
        }
    }
}

impl Limits {
    /// Create a new Limits with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Create strict limits (fewer lists accepted as mini-TOCs)
    pub fn strict() -> Self {
        Self {
            max_intro_chars: 60,
            max_paragraph_elements: 10,
            max_item_text_chars: 40,
            min_toc_items: 2,
            min_children_for_toc: 2,
            max_file_size: 10 * 1024 * 1024, // 10 MB
        }
    }

    /// Create permissive limits (more lists accepted, use with caution)
    pub fn permissive() -> Self {
        Self {
            max_intro_chars: 400,
            max_paragraph_elements: 80,
            max_item_text_chars: 400,
            min_toc_items: 2,
            min_children_for_toc: 2,
            max_file_size: 1024 * 1024 * 1024, // 1 GB
        }
    }

    /// Check the length of non-introductory paragraph text
    pub fn check_intro_text(&self, chars: usize) -> Result<()> {
        if chars > self.max_intro_chars {
            Err(Error::LimitExceeded(format!(
                "paragraph text of {} characters exceeds maximum {}",
                chars, self.max_intro_chars
            )))
        } else {
            Ok(())
        }
    }

    /// Check the number of elements in the surrounding paragraph
    pub fn check_paragraph_elements(&self, count: usize) -> Result<()> {
        if count > self.max_paragraph_elements {
            Err(Error::LimitExceeded(format!(
                "paragraph holds {} elements, maximum is {}",
                count, self.max_paragraph_elements
            )))
        } else {
            Ok(())
        }
    }

    /// Check the text carried by list items without a cross-reference
    pub fn check_item_text(&self, chars: usize) -> Result<()> {
        if chars > self.max_item_text_chars {
            Err(Error::LimitExceeded(format!(
                "list items without xrefs carry {} characters, maximum is {}",
                chars, self.max_item_text_chars
            )))
        } else {
            Ok(())
        }
    }

    /// Check if file size is within limits
    pub fn check_file_size(&self, size: usize) -> Result<()> {
        if size > self.max_file_size {
            Err(Error::LimitExceeded(format!(
                "file size {} bytes exceeds maximum {} bytes",
                size, self.max_file_size
            )))
        } else {
            Ok(())
        }
    }

    /// Whether a list with this many xref-bearing items can be a mini-TOC
    pub fn is_toc_sized(&self, items: usize) -> bool {
        items >= self.min_toc_items
    }

    /// Whether a map node with this many children needs a mini-TOC
    pub fn expects_toc(&self, children: usize) -> bool {
        children >= self.min_children_for_toc
    }
}
