//! Map-driven table-of-contents checks
//!
//! - [`map`]: read-only navigation tree of a `.ditamap`
//! - [`minitoc`]: decides whether a topic body holds a mini-TOC
//! - [`validator`]: reports child topics a parent's mini-TOC does not list
//! - [`empty`]: finds title-only heading topics
//! - [`synthesize`]: writes a mini-TOC into such a topic

pub mod empty;
pub mod map;
pub mod minitoc;
pub mod synthesize;
pub mod validator;

pub use empty::{find_empty_headings, is_empty_except_title, EmptyHeading};
pub use map::{DitaMap, MapNode};
pub use minitoc::{analyze, is_intro_text, BodyAnalysis, MiniToc};
pub use synthesize::{body_element_for, marked_id, Synthesis, Synthesizer};
pub use validator::{TocDefect, TocValidator};
