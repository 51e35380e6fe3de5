//! Document tree shared by the parser, the rewrite passes and the serializer.
//!
//! Every node owns its children; there are no back-references, so a pass can
//! take a [`Tree`] by value and hand back a fresh one.

use crate::frontmatter::Frontmatter;
use serde::Serialize;

/// A parsed document: frontmatter record plus top-level blocks.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Tree {
    /// Metadata emitted ahead of the body.
    pub frontmatter: Frontmatter,
    /// Top-level block nodes in reading order.
    pub children: Vec<Node>,
}

impl Tree {
    /// Creates a tree with empty frontmatter.
    pub fn new(children: Vec<Node>) -> Self {
        Self {
            frontmatter: Frontmatter::default(),
            children,
        }
    }
}

/// One row of a table.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TableRow {
    /// Cells in column order.
    pub cells: Vec<TableCell>,
}

/// One table cell holding inline content.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TableCell {
    /// Inline children of the cell.
    pub children: Vec<Node>,
}

/// Block and inline node kinds.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Node {
    /// ATX heading.
    Heading {
        /// Heading level (1-6).
        depth: u8,
        /// Inline children.
        children: Vec<Node>,
        /// Explicit anchor id.
        anchor: Option<String>,
    },
    /// Paragraph of inline content.
    Paragraph {
        /// Inline children.
        children: Vec<Node>,
        /// Explicit anchor id.
        anchor: Option<String>,
    },
    /// Ordered or bullet list.
    List {
        /// Whether the list is numbered.
        ordered: bool,
        /// First number of an ordered list.
        start: Option<u32>,
        /// `ListItem` children.
        items: Vec<Node>,
    },
    /// Item of a list, holding block children.
    ListItem {
        /// Block children.
        children: Vec<Node>,
    },
    /// Table; the first row is the header row.
    Table {
        /// Rows in document order.
        rows: Vec<TableRow>,
        /// Widget marker class carried over from HTML, if any.
        marker: Option<String>,
    },
    /// Fenced code block.
    CodeBlock {
        /// Info string language.
        lang: Option<String>,
        /// Verbatim code.
        text: String,
    },
    /// Block quote.
    BlockQuote {
        /// Block children.
        children: Vec<Node>,
    },
    /// Horizontal rule.
    ThematicBreak,
    /// Uninterpreted HTML spanning one or more lines.
    RawBlock {
        /// Literal markup.
        html: String,
    },
    /// Named custom-component invocation (e.g. `<Aside>`).
    Component {
        /// Component name.
        name: String,
        /// Literal string props in source order.
        props: Vec<(String, String)>,
        /// Block children.
        children: Vec<Node>,
    },
    /// Plain text.
    Text {
        /// Unescaped text.
        value: String,
    },
    /// Emphasis (`*text*`).
    Emphasis {
        /// Inline children.
        children: Vec<Node>,
    },
    /// Strong emphasis (`**text**`).
    Strong {
        /// Inline children.
        children: Vec<Node>,
    },
    /// Code span.
    InlineCode {
        /// Verbatim code.
        value: String,
    },
    /// Hyperlink.
    Link {
        /// Destination.
        href: String,
        /// Inline children (the label).
        children: Vec<Node>,
    },
    /// Image.
    Image {
        /// Image source.
        src: String,
        /// Alternative text.
        alt: String,
        /// Optional title.
        title: Option<String>,
    },
    /// Empty named anchor (`<a id="...">`).
    Anchor {
        /// Anchor id.
        id: String,
    },
    /// Allow-listed inline HTML element with no Markdown equivalent.
    Element {
        /// Lowercase element name.
        name: String,
        /// Allow-listed attributes.
        attrs: Vec<(String, String)>,
        /// Inline children.
        children: Vec<Node>,
    },
    /// Span carrying a widget marker class, awaiting a lowering pass.
    Marker {
        /// The marker class.
        class: String,
        /// Inline children.
        children: Vec<Node>,
    },
    /// Character emitted as a numeric character reference.
    CharRef {
        /// The referenced character.
        ch: char,
    },
    /// Uninterpreted inline HTML.
    RawInline {
        /// Literal markup.
        html: String,
    },
    /// Hard line break.
    Break,
}

impl Node {
    /// Creates a text node.
    pub fn text(value: impl Into<String>) -> Self {
        Node::Text {
            value: value.into(),
        }
    }

    /// Creates a paragraph without anchor.
    pub fn paragraph(children: Vec<Node>) -> Self {
        Node::Paragraph {
            children,
            anchor: None,
        }
    }

    /// Returns true for block-level kinds.
    pub fn is_block(&self) -> bool {
        matches!(
            self,
            Node::Heading { .. }
                | Node::Paragraph { .. }
                | Node::List { .. }
                | Node::ListItem { .. }
                | Node::Table { .. }
                | Node::CodeBlock { .. }
                | Node::BlockQuote { .. }
                | Node::ThematicBreak
                | Node::RawBlock { .. }
                | Node::Component { .. }
        )
    }

    /// Returns true for a text node holding only whitespace.
    pub fn is_blank_text(&self) -> bool {
        matches!(self, Node::Text { value } if value.trim().is_empty())
    }

    /// Mutable access to the child list of container kinds.
    pub fn children_mut(&mut self) -> Option<&mut Vec<Node>> {
        match self {
            Node::Heading { children, .. }
            | Node::Paragraph { children, .. }
            | Node::ListItem { children }
            | Node::BlockQuote { children }
            | Node::Component { children, .. }
            | Node::Emphasis { children }
            | Node::Strong { children }
            | Node::Link { children, .. }
            | Node::Element { children, .. }
            | Node::Marker { children, .. } => Some(children),
            Node::List { items, .. } => Some(items),
            _ => None,
        }
    }

    /// Shared access to the child list of container kinds.
    pub fn children(&self) -> Option<&[Node]> {
        match self {
            Node::Heading { children, .. }
            | Node::Paragraph { children, .. }
            | Node::ListItem { children }
            | Node::BlockQuote { children }
            | Node::Component { children, .. }
            | Node::Emphasis { children }
            | Node::Strong { children }
            | Node::Link { children, .. }
            | Node::Element { children, .. }
            | Node::Marker { children, .. } => Some(children),
            Node::List { items, .. } => Some(items),
            _ => None,
        }
    }
}

/// Rewrites a node list bottom-up.
///
/// Children (including table cells) are rewritten before their parent is
/// handed to `f`; `f` may return zero, one or several replacement nodes.
pub fn rewrite_nodes<F>(nodes: Vec<Node>, f: &mut F) -> Vec<Node>
where
    F: FnMut(Node) -> Vec<Node>,
{
    let mut out = Vec::with_capacity(nodes.len());
    for mut node in nodes {
        if let Some(children) = node.children_mut() {
            let taken = std::mem::take(children);
            *children = rewrite_nodes(taken, f);
        }
        if let Node::Table { rows, .. } = &mut node {
            for row in rows.iter_mut() {
                for cell in row.cells.iter_mut() {
                    let taken = std::mem::take(&mut cell.children);
                    cell.children = rewrite_nodes(taken, f);
                }
            }
        }
        out.extend(f(node));
    }
    out
}

/// Extracts plain text from a list of nodes.
pub fn plain_text(nodes: &[Node]) -> String {
    let mut text = String::new();
    for node in nodes {
        collect_text(node, &mut text);
    }
    text
}

fn collect_text(node: &Node, buffer: &mut String) {
    match node {
        Node::Text { value } | Node::InlineCode { value } => buffer.push_str(value),
        Node::CharRef { ch } => buffer.push(*ch),
        Node::Image { alt, .. } => buffer.push_str(alt),
        Node::Break => buffer.push('\n'),
        Node::CodeBlock { text, .. } => buffer.push_str(text),
        Node::Table { rows, .. } => {
            for row in rows {
                for cell in &row.cells {
                    for child in &cell.children {
                        collect_text(child, buffer);
                    }
                }
            }
        }
        other => {
            if let Some(children) = other.children() {
                for child in children {
                    collect_text(child, buffer);
                }
            }
        }
    }
}

/// Groups runs of inline nodes into paragraphs so the list holds only blocks.
///
/// Runs made only of whitespace text are dropped.
pub fn wrap_inlines(nodes: Vec<Node>) -> Vec<Node> {
    let mut out = Vec::with_capacity(nodes.len());
    let mut run: Vec<Node> = Vec::new();
    for node in nodes {
        if node.is_block() {
            flush_run(&mut run, &mut out);
            out.push(node);
        } else {
            run.push(node);
        }
    }
    flush_run(&mut run, &mut out);
    out
}

fn flush_run(run: &mut Vec<Node>, out: &mut Vec<Node>) {
    if run.is_empty() {
        return;
    }
    let mut children = std::mem::take(run);
    trim_inline_edges(&mut children);
    if !children.is_empty() {
        out.push(Node::paragraph(children));
    }
}

/// Flattens block nodes into inline content (used where only inline content fits).
///
/// Sibling blocks are separated by a hard break.
pub fn flatten_blocks(nodes: Vec<Node>) -> Vec<Node> {
    let mut out = Vec::new();
    for node in nodes {
        if !node.is_block() {
            out.push(node);
            continue;
        }
        let inline = match node {
            Node::Heading { children, .. }
            | Node::Paragraph { children, .. }
            | Node::ListItem { children }
            | Node::BlockQuote { children }
            | Node::Component { children, .. } => flatten_blocks(children),
            Node::List { items, .. } => flatten_blocks(items),
            Node::CodeBlock { text, .. } => vec![Node::InlineCode {
                value: text.trim_end().replace('\n', " "),
            }],
            Node::Table { rows, .. } => rows
                .into_iter()
                .flat_map(|row| row.cells)
                .flat_map(|cell| {
                    let mut children = cell.children;
                    children.push(Node::text(" "));
                    children
                })
                .collect(),
            Node::RawBlock { html } => vec![Node::RawInline { html }],
            _ => Vec::new(),
        };
        if inline.is_empty() {
            continue;
        }
        if out.iter().any(|n: &Node| !n.is_blank_text()) {
            out.push(Node::Break);
        }
        out.extend(inline);
    }
    out
}

/// Trims leading and trailing whitespace of an inline run, dropping empty text nodes.
pub fn trim_inline_edges(children: &mut Vec<Node>) {
    while let Some(first) = children.first_mut() {
        match first {
            Node::Text { value } => {
                let trimmed = value.trim_start();
                if trimmed.is_empty() {
                    children.remove(0);
                } else {
                    *value = trimmed.to_string();
                    break;
                }
            }
            Node::Break => {
                children.remove(0);
            }
            _ => break,
        }
    }
    while let Some(last) = children.last_mut() {
        match last {
            Node::Text { value } => {
                let trimmed = value.trim_end();
                if trimmed.is_empty() {
                    children.pop();
                } else {
                    *value = trimmed.to_string();
                    break;
                }
            }
            Node::Break => {
                children.pop();
            }
            _ => break,
        }
    }
}

/// Merges adjacent text nodes.
pub fn merge_text(children: Vec<Node>) -> Vec<Node> {
    let mut out: Vec<Node> = Vec::with_capacity(children.len());
    for node in children {
        if let Node::Text { value } = &node {
            if value.is_empty() {
                continue;
            }
            if let Some(Node::Text { value: previous }) = out.last_mut() {
                previous.push_str(value);
                continue;
            }
        }
        out.push(node);
    }
    out
}

/// Returns true when `a` followed directly by `b` would render as one run of
/// delimiters.
pub fn spans_fuse(a: &Node, b: &Node) -> bool {
    matches!(
        (a, b),
        (Node::InlineCode { .. }, Node::InlineCode { .. })
            | (Node::Emphasis { .. }, Node::Emphasis { .. })
            | (Node::Strong { .. }, Node::Strong { .. })
    )
}

/// Joins adjacent spans of the same kind into one.
pub fn merge_adjacent_spans(children: Vec<Node>) -> Vec<Node> {
    let mut out: Vec<Node> = Vec::with_capacity(children.len());
    for node in children {
        let node = match out.last_mut() {
            Some(previous) => match absorb(previous, node) {
                Some(node) => node,
                None => continue,
            },
            None => node,
        };
        out.push(node);
    }
    out
}

/// Appends `node` to `previous` when they fuse; hands it back otherwise.
fn absorb(previous: &mut Node, node: Node) -> Option<Node> {
    match (previous, node) {
        (Node::InlineCode { value: previous }, Node::InlineCode { value }) => {
            previous.push_str(&value);
            None
        }
        (Node::Emphasis { children: previous }, Node::Emphasis { children })
        | (Node::Strong { children: previous }, Node::Strong { children }) => {
            let mut joined = std::mem::take(previous);
            joined.extend(children);
            *previous = merge_adjacent_spans(merge_text(joined));
            None
        }
        (_, node) => Some(node),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wrap_inlines_groups_runs() {
        let nodes = vec![
            Node::text("  lead "),
            Node::Emphasis {
                children: vec![Node::text("x")],
            },
            Node::ThematicBreak,
            Node::text("\n  "),
        ];
        let wrapped = wrap_inlines(nodes);
        assert_eq!(wrapped.len(), 2);
        match &wrapped[0] {
            Node::Paragraph { children, .. } => {
                assert_eq!(children[0], Node::text("lead "));
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(wrapped[1], Node::ThematicBreak);
    }

    #[test]
    fn rewrite_visits_children_first() {
        let tree = vec![Node::paragraph(vec![
            Node::text("a"),
            Node::Strong {
                children: vec![Node::text("b")],
            },
        ])];
        let mut seen = Vec::new();
        let out = rewrite_nodes(tree, &mut |node| {
            seen.push(match &node {
                Node::Text { value } => value.clone(),
                Node::Strong { .. } => "strong".into(),
                Node::Paragraph { .. } => "p".into(),
                _ => "?".into(),
            });
            vec![node]
        });
        assert_eq!(seen, ["a", "b", "strong", "p"]);
        assert_eq!(out.len(), 1);
    }

    #[test]
    fn rewrite_can_remove_nodes() {
        let tree = vec![Node::paragraph(vec![Node::text("a"), Node::Break])];
        let out = rewrite_nodes(tree, &mut |node| match node {
            Node::Break => Vec::new(),
            other => vec![other],
        });
        assert_eq!(out, vec![Node::paragraph(vec![Node::text("a")])]);
    }

    #[test]
    fn plain_text_walks_nested_inlines() {
        let nodes = vec![
            Node::text("Keep "),
            Node::InlineCode {
                value: "foo".into(),
            },
            Node::Link {
                href: "/x".into(),
                children: vec![Node::text(" link")],
            },
        ];
        assert_eq!(plain_text(&nodes), "Keep foo link");
    }

    #[test]
    fn flatten_separates_blocks_with_breaks() {
        let nodes = vec![
            Node::paragraph(vec![Node::text("a")]),
            Node::paragraph(vec![Node::text("b")]),
        ];
        assert_eq!(
            flatten_blocks(nodes),
            vec![Node::text("a"), Node::Break, Node::text("b")]
        );
    }

    #[test]
    fn adjacent_spans_merge() {
        let merged = merge_adjacent_spans(vec![
            Node::InlineCode {
                value: "--flag".into(),
            },
            Node::InlineCode {
                value: "=value".into(),
            },
            Node::Emphasis {
                children: vec![Node::text("foo")],
            },
            Node::Emphasis {
                children: vec![Node::text("bar")],
            },
            Node::text(" "),
            Node::Strong {
                children: vec![Node::text("a")],
            },
        ]);
        assert_eq!(
            merged,
            vec![
                Node::InlineCode {
                    value: "--flag=value".into(),
                },
                Node::Emphasis {
                    children: vec![Node::text("foobar")],
                },
                Node::text(" "),
                Node::Strong {
                    children: vec![Node::text("a")],
                },
            ]
        );
    }

    #[test]
    fn merge_text_joins_neighbours() {
        let merged = merge_text(vec![Node::text("a"), Node::text(""), Node::text("b")]);
        assert_eq!(merged, vec![Node::text("ab")]);
    }
}
