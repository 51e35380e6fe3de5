//! Lowers CMS widget idioms into Markdown or component invocations.
//!
//! Icons are replaced first so that navigation labels already carry their
//! arrows. Comparison markers are checked before navigation tables.

use devmdx_core::tree::{merge_text, plain_text, rewrite_nodes, trim_inline_edges};
use devmdx_core::{Diagnostics, Node, TableRow, Tree};

use super::{Pass, PassContext};
use crate::registry::{ComparisonMarker, WidgetCatalog};

/// Rewrites widget markers left by the normalizer.
#[derive(Debug, Default, Clone, Copy)]
pub struct Widgets;

impl Pass for Widgets {
    fn name(&self) -> &str {
        "widgets"
    }

    fn run(&self, tree: Tree, cx: &mut PassContext<'_>) -> Tree {
        let catalog = &cx.config.catalog;
        let diagnostics = &mut *cx.diagnostics;

        let children = rewrite_nodes(tree.children, &mut |node| {
            lower_icon(node, catalog, diagnostics)
        });
        let mut lowering = Lowering {
            catalog,
            diagnostics,
        };
        let children = lowering.blocks(children, true);
        let children = rewrite_nodes(children, &mut |node| match node {
            Node::Marker { children, .. } => children,
            Node::Table { rows, .. } => vec![Node::Table { rows, marker: None }],
            Node::Paragraph { children, anchor } => vec![Node::Paragraph {
                children: merge_text(children),
                anchor,
            }],
            other => vec![other],
        });

        Tree {
            frontmatter: tree.frontmatter,
            children,
        }
    }
}

fn lower_icon(node: Node, catalog: &WidgetCatalog, diagnostics: &mut Diagnostics) -> Vec<Node> {
    match node {
        Node::Marker { class, children } if catalog.is_icon(&class) => {
            let name = plain_text(&children).trim().to_string();
            match catalog.glyph(&name) {
                Some(glyph) => vec![Node::text(glyph)],
                None => {
                    diagnostics.warn(format!("unknown icon `{name}` dropped"));
                    Vec::new()
                }
            }
        }
        other => vec![other],
    }
}

struct Lowering<'a> {
    catalog: &'a WidgetCatalog,
    diagnostics: &'a mut Diagnostics,
}

/// Pieces of a paragraph that starts with a comparison marker.
struct Comparison {
    marker: ComparisonMarker,
    label: String,
    rest: Vec<Node>,
}

impl Lowering<'_> {
    /// Lowers a block list. Callouts are only produced where `callouts` holds;
    /// elsewhere comparisons take the glyph form.
    fn blocks(&mut self, nodes: Vec<Node>, callouts: bool) -> Vec<Node> {
        let mut out = Vec::with_capacity(nodes.len());
        for node in nodes {
            match node {
                Node::Paragraph { children, anchor } => match self.comparison(children) {
                    Ok(found) if callouts => {
                        if let Some(id) = anchor {
                            out.push(Node::Paragraph {
                                children: Vec::new(),
                                anchor: Some(id),
                            });
                        }
                        out.push(self.callout(found));
                    }
                    Ok(found) => out.push(Node::Paragraph {
                        children: self.glyph_prefixed(found),
                        anchor,
                    }),
                    Err(children) => out.push(Node::Paragraph { children, anchor }),
                },
                Node::List {
                    ordered,
                    start,
                    items,
                } => {
                    let items = items
                        .into_iter()
                        .map(|item| match item {
                            Node::ListItem { children } => Node::ListItem {
                                children: self.blocks(children, false),
                            },
                            other => other,
                        })
                        .collect();
                    out.push(Node::List {
                        ordered,
                        start,
                        items,
                    });
                }
                Node::BlockQuote { children } => out.push(Node::BlockQuote {
                    children: self.blocks(children, false),
                }),
                Node::Component {
                    name,
                    props,
                    children,
                } => {
                    let children = self.blocks(children, true);
                    out.push(Node::Component {
                        name,
                        props,
                        children,
                    });
                }
                Node::Table {
                    rows,
                    marker: Some(class),
                } if self.catalog.is_navigation(&class) => {
                    out.extend(self.navigation(rows));
                }
                other => out.push(other),
            }
        }
        out
    }

    /// Splits off a leading comparison marker, or hands the children back.
    fn comparison(&self, mut children: Vec<Node>) -> Result<Comparison, Vec<Node>> {
        let Some(first) = children.iter().position(|n| !n.is_blank_text()) else {
            return Err(children);
        };
        let marker = match &children[first] {
            Node::Marker { class, .. } => match self.catalog.comparison(class) {
                Some(marker) => marker.clone(),
                None => return Err(children),
            },
            _ => return Err(children),
        };

        let mut rest = children.split_off(first + 1);
        let span = children.pop().and_then(|n| n.children().map(plain_text));
        let label = span
            .as_deref()
            .unwrap_or("")
            .trim()
            .trim_end_matches(['-', '—', '–', ':', ' '])
            .trim()
            .to_string();
        let label = if label.is_empty() {
            marker.label.clone()
        } else {
            label
        };

        if let Some(Node::Text { value }) = rest.first_mut() {
            *value = value
                .trim_start()
                .trim_start_matches(['-', '—', '–', ':'])
                .to_string();
        }
        trim_inline_edges(&mut rest);

        Ok(Comparison {
            marker,
            label,
            rest,
        })
    }

    fn callout(&mut self, found: Comparison) -> Node {
        let Comparison {
            marker,
            label,
            rest,
        } = found;
        if rest.is_empty() {
            self.diagnostics.warn(format!(
                "comparison marker `{label}` has no content; kept as text"
            ));
            return Node::paragraph(vec![Node::Strong {
                children: vec![Node::text(label)],
            }]);
        }
        log::debug!("lowered comparison `{label}` to a callout");
        Node::Component {
            name: self.catalog.callout_component.clone(),
            props: vec![
                ("type".to_string(), marker.tone.callout_type().to_string()),
                ("title".to_string(), label),
            ],
            children: vec![Node::paragraph(rest)],
        }
    }

    fn glyph_prefixed(&mut self, found: Comparison) -> Vec<Node> {
        let Comparison {
            marker,
            label,
            rest,
        } = found;
        let glyph = marker.tone.glyph();
        if rest.is_empty() {
            self.diagnostics.warn(format!(
                "comparison marker `{label}` has no content; kept as text"
            ));
            return vec![Node::text(format!("{glyph} {label}"))];
        }
        let mut children = vec![Node::text(format!("{glyph} {label}: "))];
        children.extend(rest);
        merge_text(children)
    }

    /// Collapses a prev/next navigation table into one paragraph of links.
    fn navigation(&mut self, rows: Vec<TableRow>) -> Vec<Node> {
        let mut links: Vec<(usize, Vec<Node>, String)> = Vec::new();
        for row in &rows {
            for (index, cell) in row.cells.iter().enumerate() {
                collect_links(&cell.children, index, &mut links);
            }
        }

        let (previous, next) = match links.len() {
            0 => {
                log::debug!("navigation table without links dropped");
                return Vec::new();
            }
            1 => {
                let link = links.remove(0);
                if link.0 == 0 {
                    (Some(link), None)
                } else {
                    (None, Some(link))
                }
            }
            count => {
                if count > 2 {
                    self.diagnostics.warn(format!(
                        "navigation table has {count} links; keeping the first and last"
                    ));
                }
                let last = links.pop();
                let first = links.into_iter().next();
                (first, last)
            }
        };

        let mut children = Vec::new();
        if let Some((_, mut label, href)) = previous {
            if !plain_text(&label).trim_start().starts_with('←') {
                label.insert(0, Node::text("← "));
            }
            children.push(Node::Link {
                href,
                children: merge_text(label),
            });
        }
        if let Some((_, mut label, href)) = next {
            if !children.is_empty() {
                children.push(Node::text(" · "));
            }
            if !plain_text(&label).trim_end().ends_with('→') {
                label.push(Node::text(" →"));
            }
            children.push(Node::Link {
                href,
                children: merge_text(label),
            });
        }
        vec![Node::paragraph(children)]
    }
}

fn collect_links(nodes: &[Node], cell: usize, out: &mut Vec<(usize, Vec<Node>, String)>) {
    for node in nodes {
        match node {
            Node::Link { href, children } => {
                let mut label = children.clone();
                trim_inline_edges(&mut label);
                out.push((cell, label, href.clone()));
            }
            other => {
                if let Some(children) = other.children() {
                    collect_links(children, cell, out);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConvertConfig;
    use devmdx_core::{NormalizeOptions, TableCell, normalize, parse_document};

    fn lower(source: &str) -> (Tree, Diagnostics) {
        let config = ConvertConfig::default();
        let mut diagnostics = Diagnostics::new("doc.md");
        let tree = parse_document(source, &mut diagnostics);
        let options = NormalizeOptions {
            marker_classes: config.catalog.marker_classes(),
            drop_elements: config.drop_elements.clone(),
        };
        let tree = normalize(tree, &options, &mut diagnostics);
        let mut cx = PassContext {
            config: &config,
            diagnostics: &mut diagnostics,
        };
        let tree = Widgets.run(tree, &mut cx);
        (tree, diagnostics)
    }

    fn link(href: &str, label: &str) -> Node {
        Node::Link {
            href: href.into(),
            children: vec![Node::text(label)],
        }
    }

    #[test]
    fn comparison_paragraph_becomes_callout() {
        let (tree, diagnostics) = lower(
            "<span class=\"compare-better\">Better —</span> Keep <code>foo</code> and <a href=\"https://example.com\">link</a>.\n",
        );
        assert!(diagnostics.is_empty());
        assert_eq!(
            tree.children,
            vec![Node::Component {
                name: "Aside".into(),
                props: vec![
                    ("type".into(), "success".into()),
                    ("title".into(), "Better".into()),
                ],
                children: vec![Node::paragraph(vec![
                    Node::text("Keep "),
                    Node::InlineCode {
                        value: "foo".into()
                    },
                    Node::text(" and "),
                    link("https://example.com", "link"),
                    Node::text("."),
                ])],
            }]
        );
    }

    #[test]
    fn comparison_list_item_gets_glyph_prefix() {
        let (tree, _) = lower(
            "<ul><li><span class=\"compare-worse\">Worse</span> <em>still works</em></li></ul>\n",
        );
        let Node::List { items, .. } = &tree.children[0] else {
            panic!("expected a list, got {:?}", tree.children);
        };
        assert_eq!(
            items[0],
            Node::ListItem {
                children: vec![Node::paragraph(vec![
                    Node::text("⚠️ Worse: "),
                    Node::Emphasis {
                        children: vec![Node::text("still works")]
                    },
                ])],
            }
        );
    }

    #[test]
    fn empty_comparison_warns_and_keeps_label() {
        let (tree, diagnostics) = lower("<span class=\"compare-yes\"></span>\n");
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(
            tree.children,
            vec![Node::paragraph(vec![Node::Strong {
                children: vec![Node::text("Yes")]
            }])]
        );
    }

    #[test]
    fn navigation_table_collapses_to_links() {
        let (tree, _) = lower(
            "<table class=\"nav-footer\"><tr><td><a href=\"/setup\">Setup</a></td><td><a href=\"/build\">Build</a></td></tr></table>\n",
        );
        assert_eq!(
            tree.children,
            vec![Node::paragraph(vec![
                link("/setup", "← Setup"),
                Node::text(" · "),
                link("/build", "Build →"),
            ])]
        );
    }

    #[test]
    fn navigation_icons_are_not_doubled() {
        let (tree, _) = lower(
            "<table class=\"nav-footer\"><tr><td></td><td><a href=\"/next\">Next <span class=\"material-icons\">arrow_forward</span></a></td></tr></table>\n",
        );
        assert_eq!(
            tree.children,
            vec![Node::paragraph(vec![link("/next", "Next →")])]
        );
    }

    #[test]
    fn navigation_without_links_is_dropped() {
        let mut diagnostics = Diagnostics::new("doc.md");
        let config = ConvertConfig::default();
        let tree = Tree::new(vec![Node::Table {
            rows: vec![TableRow {
                cells: vec![TableCell {
                    children: vec![Node::text("nothing")],
                }],
            }],
            marker: Some("nav-footer".into()),
        }]);
        let mut cx = PassContext {
            config: &config,
            diagnostics: &mut diagnostics,
        };
        assert!(Widgets.run(tree, &mut cx).children.is_empty());
    }

    #[test]
    fn unknown_icons_are_dropped_with_a_warning() {
        let (tree, diagnostics) =
            lower("See <span class=\"material-icons\">info</span> here.\n");
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(
            tree.children,
            vec![Node::paragraph(vec![Node::text("See  here.")])]
        );
    }
}
