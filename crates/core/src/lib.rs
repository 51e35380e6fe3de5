#![deny(missing_docs)]
//! devmdx core: document tree, tolerant parsing, HTML normalization, and serialization.

/// Code fence detection utilities.
pub mod code_fence;
/// Core error and diagnostic types.
pub mod error;
/// YAML frontmatter extraction helpers.
pub mod frontmatter;
/// HTML fragment normalization into tree nodes.
pub mod html;
/// Tolerant Markdown + HTML parsing.
pub mod parse;
/// Deterministic MDX rendering.
pub mod serialize;
/// Anchor id utilities.
pub mod slug;
/// HTML tag scanning.
pub mod tag;
/// The document tree.
pub mod tree;
/// MDX compile check.
pub mod validate;

pub use error::{Diagnostic, Diagnostics, Severity, SourceLocation};
pub use frontmatter::{Frontmatter, FrontmatterError, FrontmatterExtraction, extract_frontmatter};
pub use html::{NormalizeOptions, normalize, normalize_fragment};
pub use parse::{ParseOptions, parse_blocks, parse_document, parse_document_with_options};
pub use serialize::{join_parts, serialize, serialize_blocks, serialize_parts};
pub use slug::{AnchorRegistry, extract_custom_id};
pub use tree::{Node, TableCell, TableRow, Tree};
pub use validate::{ValidationError, validate_mdx};

pub use code_fence::FenceTracker;
