//! Parse → normalize → passes → serialize → sanitize.

use devmdx_core::serialize::{join_parts, serialize_parts};
use devmdx_core::{
    Diagnostic, Diagnostics, NormalizeOptions, ParseOptions, Severity, Tree, normalize,
    parse_document_with_options,
};
use once_cell::sync::Lazy;

use crate::config::ConvertConfig;
use crate::transform::code_lang::CodeLanguages;
use crate::transform::directives::Directives;
use crate::transform::jsx_safety::{JsxSafety, sanitize_mdx_text};
use crate::transform::links::Links;
use crate::transform::widgets::Widgets;
use crate::transform::{Pass, PassContext};

static DEFAULT_PIPELINE: Lazy<Pipeline> = Lazy::new(|| Pipeline::standard(ConvertConfig::default()));

/// Result of converting one document.
#[derive(Debug, Clone, PartialEq)]
pub struct TransformOutput {
    /// Converted text (frontmatter block plus body).
    pub output: String,
    /// Problems found along the way.
    pub diagnostics: Vec<Diagnostic>,
}

impl TransformOutput {
    /// Whether the document must be quarantined instead of written.
    pub fn has_fatal(&self) -> bool {
        self.diagnostics
            .iter()
            .any(|d| d.severity == Severity::Fatal)
    }
}

/// An ordered list of passes plus the configuration they read.
pub struct Pipeline {
    config: ConvertConfig,
    parse: ParseOptions,
    normalize: NormalizeOptions,
    passes: Vec<Box<dyn Pass>>,
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("passes", &self.pass_names())
            .finish_non_exhaustive()
    }
}

impl Pipeline {
    /// A pipeline without passes: parse, normalize, serialize, sanitize.
    pub fn empty(config: ConvertConfig) -> Self {
        let normalize = NormalizeOptions {
            marker_classes: config.catalog.marker_classes(),
            drop_elements: config.drop_elements.clone(),
        };
        Self {
            config,
            parse: ParseOptions::devsite(),
            normalize,
            passes: Vec::new(),
        }
    }

    /// The standard pass order: directives, widgets, links, code languages, JSX safety.
    pub fn standard(config: ConvertConfig) -> Self {
        Self::empty(config)
            .with_pass(Directives)
            .with_pass(Widgets)
            .with_pass(Links)
            .with_pass(CodeLanguages)
            .with_pass(JsxSafety)
    }

    /// Appends a pass.
    pub fn with_pass(mut self, pass: impl Pass + 'static) -> Self {
        self.passes.push(Box::new(pass));
        self
    }

    /// Names of the passes in order.
    pub fn pass_names(&self) -> Vec<&str> {
        self.passes.iter().map(|p| p.name()).collect()
    }

    /// Active configuration.
    pub fn config(&self) -> &ConvertConfig {
        &self.config
    }

    /// Parses and normalizes `raw` without running any pass.
    pub fn normalized_tree(&self, raw: &str, diagnostics: &mut Diagnostics) -> Tree {
        let tree = parse_document_with_options(raw, self.parse, diagnostics);
        normalize(tree, &self.normalize, diagnostics)
    }

    /// Parses, normalizes and runs every pass.
    pub fn tree(&self, raw: &str, diagnostics: &mut Diagnostics) -> Tree {
        let mut tree = self.normalized_tree(raw, diagnostics);
        let mut cx = PassContext {
            config: &self.config,
            diagnostics,
        };
        for pass in &self.passes {
            tree = pass.run(tree, &mut cx);
            log::trace!("{}: pass `{}` done", cx.diagnostics.path(), pass.name());
        }
        tree
    }

    /// Converts one document. Never fails; see [`TransformOutput::diagnostics`].
    pub fn transform(&self, path: &str, raw: &str) -> TransformOutput {
        let mut diagnostics = Diagnostics::new(path);
        let tree = self.tree(raw, &mut diagnostics);
        let (frontmatter, body) = serialize_parts(&tree);
        let body = sanitize_mdx_text(&body, &mut diagnostics);
        let output = join_parts(&frontmatter, &body);

        if diagnostics.has_fatal() {
            log::warn!("{path}: fatal diagnostics; document needs quarantine");
        } else if !diagnostics.is_empty() {
            log::debug!("{path}: {} warnings", diagnostics.len());
        }
        TransformOutput {
            output,
            diagnostics: diagnostics.into_vec(),
        }
    }
}

/// Converts one document with the default configuration.
///
/// # Example
///
/// ```
/// let out = devmdx_convert::transform("hello.md", "# Hello World\n\nBody text.\n");
/// assert_eq!(out.output, "---\ntitle: 'Hello World'\n---\n\nBody text.\n");
/// assert!(out.diagnostics.is_empty());
/// ```
pub fn transform(path: &str, raw: &str) -> TransformOutput {
    DEFAULT_PIPELINE.transform(path, raw)
}

#[cfg(test)]
mod tests {
    use super::*;
    use devmdx_core::FenceTracker;

    #[test]
    fn standard_order() {
        let pipeline = Pipeline::standard(ConvertConfig::default());
        assert_eq!(
            pipeline.pass_names(),
            vec!["directives", "widgets", "links", "code-languages", "jsx-safety"]
        );
    }

    #[test]
    fn custom_passes_run_last() {
        use crate::transform::FnPass;
        use devmdx_core::Node;

        let pipeline = Pipeline::empty(ConvertConfig::default()).with_pass(FnPass::new(
            "shout",
            |mut tree: Tree, _: &mut PassContext<'_>| {
                tree.children.push(Node::paragraph(vec![Node::text("END")]));
                tree
            },
        ));
        assert_eq!(pipeline.transform("a.md", "start\n").output, "start\n\nEND\n");
    }

    #[test]
    fn code_blocks_survive_untouched() {
        let source = "```\nlet x = {a: 1}; // <b>\n```\n";
        let out = transform("a.md", source);
        assert_eq!(out.output, "```text\nlet x = {a: 1}; // <b>\n```\n");
        let mut fence = FenceTracker::new();
        assert!(out.output.lines().all(|line| fence.consume(line)));
    }

    #[test]
    fn fatal_output_is_flagged() {
        let out = transform("a.md", "Intro\n\n<devsite-selector>\n\nrest of file\n");
        assert!(out.has_fatal());
    }
}
