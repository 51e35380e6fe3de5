//! Rewrites relative links that point at converted documents.

use devmdx_core::tree::rewrite_nodes;
use devmdx_core::{Node, Tree};

use super::{Pass, PassContext};
use crate::config::{LinkOptions, LinkStyle};

/// Applies the configured [`LinkStyle`] to every link.
#[derive(Debug, Default, Clone, Copy)]
pub struct Links;

impl Pass for Links {
    fn name(&self) -> &str {
        "links"
    }

    fn run(&self, tree: Tree, cx: &mut PassContext<'_>) -> Tree {
        let options = &cx.config.links;
        if options.style == LinkStyle::Keep {
            return tree;
        }
        let children = rewrite_nodes(tree.children, &mut |node| match node {
            Node::Link { href, children } => {
                let href = rewrite_href(&href, options).unwrap_or(href);
                vec![Node::Link { href, children }]
            }
            other => vec![other],
        });
        Tree {
            frontmatter: tree.frontmatter,
            children,
        }
    }
}

/// Whether `href` leaves the site or only targets an anchor.
fn is_external(href: &str) -> bool {
    if href.starts_with("//") || href.starts_with('#') {
        return true;
    }
    let Some(colon) = href.find(':') else {
        return false;
    };
    let scheme = &href[..colon];
    !scheme.is_empty()
        && !scheme.contains(['/', '?', '#'])
        && scheme
            .chars()
            .next()
            .is_some_and(|c| c.is_ascii_alphabetic())
        && scheme
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
}

/// Returns the rewritten href, or `None` when the link is left alone.
pub fn rewrite_href(href: &str, options: &LinkOptions) -> Option<String> {
    if options.style == LinkStyle::Keep || is_external(href) {
        return None;
    }
    let split = href.find(['?', '#']).unwrap_or(href.len());
    let (path, suffix) = href.split_at(split);

    let name_start = path.rfind('/').map_or(0, |i| i + 1);
    let (stem, extension) = path[name_start..].rsplit_once('.')?;
    if stem.is_empty()
        || !options
            .source_extensions
            .iter()
            .any(|e| e.eq_ignore_ascii_case(extension))
    {
        return None;
    }
    let directory = &path[..name_start];

    let rewritten = match options.style {
        LinkStyle::Keep => return None,
        LinkStyle::Pretty if stem == "index" => {
            if directory.is_empty() {
                "./".to_string()
            } else {
                directory.to_string()
            }
        }
        LinkStyle::Pretty => format!("{directory}{stem}/"),
        LinkStyle::Extension => format!("{directory}{stem}.{}", options.extension),
    };
    Some(format!("{rewritten}{suffix}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options(style: LinkStyle) -> LinkOptions {
        LinkOptions {
            style,
            ..LinkOptions::default()
        }
    }

    #[test]
    fn pretty_links() {
        let options = options(LinkStyle::Pretty);
        assert_eq!(
            rewrite_href("/docs/setup.md", &options).as_deref(),
            Some("/docs/setup/")
        );
        assert_eq!(
            rewrite_href("guide/index.html#top", &options).as_deref(),
            Some("guide/#top")
        );
        assert_eq!(rewrite_href("index.md", &options).as_deref(), Some("./"));
    }

    #[test]
    fn extension_links_keep_query_and_fragment() {
        let options = options(LinkStyle::Extension);
        assert_eq!(
            rewrite_href("../api/Widget.md?v=2#usage", &options).as_deref(),
            Some("../api/Widget.mdx?v=2#usage")
        );
    }

    #[test]
    fn leaves_external_anchor_and_unknown_links() {
        let options = options(LinkStyle::Pretty);
        for href in [
            "https://example.com/page.md",
            "//cdn.example.com/a.html",
            "mailto:team@example.com",
            "#section",
            "/images/logo.png",
            "/docs/",
            "/docs/.md",
        ] {
            assert_eq!(rewrite_href(href, &options), None, "{href}");
        }
    }

    #[test]
    fn keep_style_is_a_no_op() {
        assert_eq!(rewrite_href("/a.md", &LinkOptions::default()), None);
    }
}
