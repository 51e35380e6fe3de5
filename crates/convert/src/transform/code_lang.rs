//! Assigns a language to fenced code blocks that lack one.

use devmdx_core::tree::rewrite_nodes;
use devmdx_core::{Node, Tree};

use super::{Pass, PassContext};
use crate::config::CodeLanguageOptions;

/// Box-drawing fragments that identify a directory listing.
const TREE_MARKERS: &[&str] = &["├──", "└──", "│  ", "|-- ", "`-- ", "+-- "];

/// Labels unlabeled code blocks.
#[derive(Debug, Default, Clone, Copy)]
pub struct CodeLanguages;

impl Pass for CodeLanguages {
    fn name(&self) -> &str {
        "code-languages"
    }

    fn run(&self, tree: Tree, cx: &mut PassContext<'_>) -> Tree {
        let options = &cx.config.code_languages;
        let children = rewrite_nodes(tree.children, &mut |node| match node {
            Node::CodeBlock { lang, text } if lang.as_deref().is_none_or(|l| l.trim().is_empty()) => {
                let lang = detect_language(&text, options);
                vec![Node::CodeBlock {
                    lang: Some(lang),
                    text,
                }]
            }
            other => vec![other],
        });
        Tree {
            frontmatter: tree.frontmatter,
            children,
        }
    }
}

/// Picks a language for `text`: directory trees are plain text, then the
/// first matching pattern, then the fallback.
pub fn detect_language(text: &str, options: &CodeLanguageOptions) -> String {
    if is_directory_tree(text) {
        return "text".to_string();
    }
    options
        .patterns
        .iter()
        .find(|p| text.contains(p.contains.as_str()))
        .map(|p| p.lang.clone())
        .unwrap_or_else(|| options.fallback.clone())
}

fn is_directory_tree(text: &str) -> bool {
    text.lines()
        .any(|line| TREE_MARKERS.iter().any(|marker| line.contains(marker)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn directory_trees_are_text() {
        let listing = "project/\n├── Cargo.toml\n└── src/\n    └── main.rs\n";
        assert_eq!(detect_language(listing, &CodeLanguageOptions::default()), "text");
    }

    #[test]
    fn first_pattern_wins() {
        let options = CodeLanguageOptions::default();
        assert_eq!(detect_language("<?xml version=\"1.0\"?>\n<a/>", &options), "xml");
        assert_eq!(detect_language("#!/bin/bash\necho hi", &options), "bash");
    }

    #[test]
    fn falls_back() {
        let options = CodeLanguageOptions {
            patterns: Vec::new(),
            fallback: "none".to_string(),
        };
        assert_eq!(detect_language("whatever", &options), "none");
    }
}
