//! Rewrite passes applied between normalization and serialization.
//!
//! - `directives`: strips CMS control syntax, collects frontmatter, resolves anchors.
//! - `widgets`: lowers comparison markers, navigation tables and icon spans.
//! - `links`: rewrites relative links to converted documents.
//! - `code_lang`: labels unlabeled code blocks.
//! - `jsx_safety`: tree-level escaping plus the final text sanitizer.

use crate::config::ConvertConfig;
use devmdx_core::{Diagnostics, Tree};

/// Language detection for unlabeled code blocks.
pub mod code_lang;
/// CMS directive, annotation and frontmatter handling.
pub mod directives;
/// JSX-safety escaping for trees and serialized text.
pub mod jsx_safety;
/// Relative link rewriting.
pub mod links;
/// Widget lowering.
pub mod widgets;

/// Shared state handed to every pass of one document.
pub struct PassContext<'a> {
    /// Active configuration.
    pub config: &'a ConvertConfig,
    /// Diagnostics of the document being converted.
    pub diagnostics: &'a mut Diagnostics,
}

/// A total `Tree -> Tree` rewrite.
pub trait Pass: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &str;
    /// Rewrites `tree`. Must accept any tree the previous pass can produce.
    fn run(&self, tree: Tree, cx: &mut PassContext<'_>) -> Tree;
}

/// A named closure pass.
pub struct FnPass<F> {
    name: String,
    f: F,
}

impl<F> FnPass<F>
where
    F: Fn(Tree, &mut PassContext<'_>) -> Tree + Send + Sync,
{
    /// Wraps `f` under `name`.
    pub fn new(name: impl Into<String>, f: F) -> Self {
        Self {
            name: name.into(),
            f,
        }
    }
}

impl<F> Pass for FnPass<F>
where
    F: Fn(Tree, &mut PassContext<'_>) -> Tree + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn run(&self, tree: Tree, cx: &mut PassContext<'_>) -> Tree {
        (self.f)(tree, cx)
    }
}
