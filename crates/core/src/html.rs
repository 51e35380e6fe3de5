//! HTML-Fragment Normalizer.
//!
//! Raw HTML nodes are tokenized with lol_html, rebuilt into an element tree
//! with the usual HTML auto-closing rules and lowered into the shared
//! [`Node`] union through a per-tag allow-list. Attributes outside the
//! allow-list are dropped here.

use crate::error::Diagnostics;
use crate::tag::{is_block_element, is_custom_element, is_void_element};
use crate::tree::{
    self, Node, TableCell, TableRow, Tree, flatten_blocks, merge_text, trim_inline_edges,
    wrap_inlines,
};
use lol_html::html_content::EndTag;
use lol_html::{EndTagHandler, HtmlRewriter, Settings, doc_text, element};
use std::cell::{Cell, RefCell};
use std::rc::Rc;

/// Normalizer configuration.
#[derive(Debug, Clone, Default)]
pub struct NormalizeOptions {
    /// Classes that mark widget spans and tables; they survive as `Marker`s.
    pub marker_classes: Vec<String>,
    /// Elements removed together with their content.
    pub drop_elements: Vec<String>,
}

impl NormalizeOptions {
    fn is_marker(&self, class: &str) -> bool {
        self.marker_classes.iter().any(|c| c == class)
    }

    fn is_dropped(&self, name: &str) -> bool {
        matches!(name, "script" | "style" | "template")
            || self
                .drop_elements
                .iter()
                .any(|d| d.eq_ignore_ascii_case(name))
    }
}

/// Elements kept as inline HTML because Markdown has no equivalent.
const KEPT_INLINE: &[&str] = &[
    "abbr", "del", "ins", "kbd", "mark", "q", "s", "samp", "small", "sub", "sup", "u", "var",
];

/// Phrasing elements an implied `</p>` may look through.
const PHRASING: &[&str] = &[
    "a", "abbr", "b", "bdi", "bdo", "cite", "code", "del", "dfn", "em", "font", "i", "ins", "kbd",
    "mark", "q", "s", "samp", "small", "span", "strong", "sub", "sup", "time", "u", "var",
];

/// Replaces every raw HTML node and inline element in `tree` with lowered nodes.
pub fn normalize(tree: Tree, options: &NormalizeOptions, diagnostics: &mut Diagnostics) -> Tree {
    let mut normalizer = Normalizer {
        options,
        diagnostics,
    };
    let children = normalizer.normalize_nodes(tree.children);
    Tree {
        frontmatter: tree.frontmatter,
        children: wrap_inlines(children),
    }
}

/// Parses one HTML fragment into lowered nodes (blocks and inlines mixed).
pub fn normalize_fragment(
    html: &str,
    options: &NormalizeOptions,
    diagnostics: &mut Diagnostics,
) -> Vec<Node> {
    Normalizer {
        options,
        diagnostics,
    }
    .fragment(html)
}

#[derive(Debug)]
enum Token {
    Start {
        id: usize,
        name: String,
        attrs: Vec<(String, String)>,
        self_closing: bool,
    },
    End {
        id: usize,
    },
    Text(String),
}

fn tokenize(html: &str) -> Result<Vec<Token>, lol_html::errors::RewritingError> {
    let tokens = Rc::new(RefCell::new(Vec::new()));
    let next_id = Rc::new(Cell::new(0usize));
    let element_tokens = Rc::clone(&tokens);
    let text_tokens = Rc::clone(&tokens);

    let mut rewriter = HtmlRewriter::new(
        Settings {
            element_content_handlers: vec![element!("*", move |el| {
                let id = next_id.get();
                next_id.set(id + 1);
                let attrs = el
                    .attributes()
                    .iter()
                    .map(|attr| {
                        let value = html_escape::decode_html_entities(&attr.value()).into_owned();
                        (attr.name(), value)
                    })
                    .collect();
                element_tokens.borrow_mut().push(Token::Start {
                    id,
                    name: el.tag_name_preserve_case(),
                    attrs,
                    self_closing: el.is_self_closing(),
                });
                if let Some(handlers) = el.end_tag_handlers() {
                    let end_tokens = Rc::clone(&element_tokens);
                    let handler: EndTagHandler<'static> = Box::new(move |_end: &mut EndTag<'_>| {
                        end_tokens.borrow_mut().push(Token::End { id });
                        Ok(())
                    });
                    handlers.push(handler);
                }
                Ok(())
            })],
            document_content_handlers: vec![doc_text!(move |chunk| {
                let text = chunk.as_str();
                if !text.is_empty() {
                    let mut tokens = text_tokens.borrow_mut();
                    match tokens.last_mut() {
                        Some(Token::Text(previous)) => previous.push_str(text),
                        _ => tokens.push(Token::Text(text.to_string())),
                    }
                }
                Ok(())
            })],
            strict: false,
            ..Settings::new()
        },
        |_: &[u8]| {},
    );

    rewriter.write(html.as_bytes())?;
    rewriter.end()?;
    Ok(std::mem::take(&mut *tokens.borrow_mut()))
}

#[derive(Debug)]
enum HtmlNode {
    Element {
        name: String,
        attrs: Vec<(String, String)>,
        children: Vec<HtmlNode>,
    },
    Text(String),
}

struct OpenElement {
    id: usize,
    lower: String,
    node: HtmlNode,
}

/// Open elements deeper than this are dropped and their content moves up to
/// the innermost kept element.
const MAX_DEPTH: usize = 64;

/// Tree built from tokens plus names of custom elements left open at the end.
struct BuiltTree {
    nodes: Vec<HtmlNode>,
    unclosed_custom: Vec<String>,
    /// Start tags dropped by the depth cap.
    flattened: usize,
}

fn build_tree(tokens: Vec<Token>) -> BuiltTree {
    let mut stack: Vec<OpenElement> = Vec::new();
    let mut root: Vec<HtmlNode> = Vec::new();
    let mut flattened = 0;

    for token in tokens {
        match token {
            Token::Start {
                id,
                name,
                attrs,
                self_closing,
            } => {
                let lower = name.to_ascii_lowercase();
                auto_close(&mut stack, &mut root, &lower);
                let name = if is_custom_element(&name) { name } else { lower.clone() };
                let node = HtmlNode::Element {
                    name,
                    attrs,
                    children: Vec::new(),
                };
                if self_closing || is_void_element(&lower) {
                    append(&mut stack, &mut root, node);
                } else if stack.len() >= MAX_DEPTH {
                    flattened += 1;
                } else {
                    stack.push(OpenElement { id, lower, node });
                }
            }
            Token::End { id } => {
                if let Some(index) = stack.iter().rposition(|open| open.id == id) {
                    while stack.len() > index {
                        close_top(&mut stack, &mut root);
                    }
                }
            }
            Token::Text(text) => append(&mut stack, &mut root, HtmlNode::Text(text)),
        }
    }

    let mut unclosed_custom = Vec::new();
    while let Some(open) = stack.last() {
        if let HtmlNode::Element { name, .. } = &open.node
            && is_custom_element(name)
        {
            unclosed_custom.push(name.clone());
        }
        close_top(&mut stack, &mut root);
    }
    unclosed_custom.reverse();

    BuiltTree {
        nodes: root,
        unclosed_custom,
        flattened,
    }
}

fn append(stack: &mut [OpenElement], root: &mut Vec<HtmlNode>, node: HtmlNode) {
    match stack.last_mut() {
        Some(OpenElement {
            node: HtmlNode::Element { children, .. },
            ..
        }) => children.push(node),
        _ => root.push(node),
    }
}

fn close_top(stack: &mut Vec<OpenElement>, root: &mut Vec<HtmlNode>) {
    if let Some(open) = stack.pop() {
        append(stack, root, open.node);
    }
}

/// Applies implied end tags before `name` opens.
///
/// Content inside `<pre>` is never auto-closed.
fn auto_close(stack: &mut Vec<OpenElement>, root: &mut Vec<HtmlNode>, name: &str) {
    if stack.iter().any(|open| open.lower == "pre") {
        return;
    }

    let target = match name {
        "li" => find_open(stack, &["li"], &["ul", "ol", "table", "td", "th", "blockquote"]),
        "dt" | "dd" => find_open(stack, &["dt", "dd"], &["dl", "table", "td", "th"]),
        "td" | "th" => find_open(stack, &["td", "th"], &["tr", "table"]),
        "tr" => find_open(stack, &["tr"], &["table", "thead", "tbody", "tfoot"]),
        "thead" | "tbody" | "tfoot" => find_open(stack, &["thead", "tbody", "tfoot"], &["table"]),
        _ => None,
    };
    if let Some(index) = target {
        while stack.len() > index {
            close_top(stack, root);
        }
    }

    if is_block_element(name) || matches!(name, "hr" | "li") {
        let paragraph = stack
            .iter()
            .rposition(|open| open.lower == "p" || !PHRASING.contains(&open.lower.as_str()))
            .filter(|&i| stack[i].lower == "p");
        if let Some(index) = paragraph {
            while stack.len() > index {
                close_top(stack, root);
            }
        }
    }
}

fn find_open(stack: &[OpenElement], closes: &[&str], boundaries: &[&str]) -> Option<usize> {
    for (index, open) in stack.iter().enumerate().rev() {
        if closes.contains(&open.lower.as_str()) {
            return Some(index);
        }
        if boundaries.contains(&open.lower.as_str()) {
            return None;
        }
    }
    None
}

/// Converts the HTML tree into `Element`/`Text` nodes awaiting lowering.
fn into_nodes(nodes: Vec<HtmlNode>, in_pre: bool) -> Vec<Node> {
    nodes
        .into_iter()
        .filter_map(|node| match node {
            HtmlNode::Text(text) => {
                let decoded = html_escape::decode_html_entities(&text);
                let value = if in_pre {
                    decoded.into_owned()
                } else {
                    collapse_whitespace(&decoded)
                };
                (!value.is_empty()).then(|| Node::text(value))
            }
            HtmlNode::Element {
                name,
                attrs,
                children,
            } => {
                let pre = in_pre || name == "pre";
                Some(Node::Element {
                    name,
                    attrs,
                    children: into_nodes(children, pre),
                })
            }
        })
        .collect()
}

fn collapse_whitespace(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut in_space = false;
    for c in text.chars() {
        if matches!(c, ' ' | '\t' | '\n' | '\r' | '\u{c}') {
            if !in_space {
                out.push(' ');
            }
            in_space = true;
        } else {
            out.push(c);
            in_space = false;
        }
    }
    out
}

fn attr<'a>(attrs: &'a [(String, String)], name: &str) -> Option<&'a str> {
    attrs
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(name))
        .map(|(_, v)| v.as_str())
}

fn classes(attrs: &[(String, String)]) -> impl Iterator<Item = &str> {
    attr(attrs, "class")
        .or_else(|| attr(attrs, "classname"))
        .unwrap_or("")
        .split_whitespace()
}

fn class_language(attrs: &[(String, String)]) -> Option<String> {
    classes(attrs).find_map(|class| {
        class
            .strip_prefix("language-")
            .or_else(|| class.strip_prefix("lang-"))
            .filter(|lang| !lang.is_empty())
            .map(str::to_string)
    })
}

/// Text content of unlowered nodes; `<br>` becomes a newline.
fn raw_text(nodes: &[Node]) -> String {
    let mut out = String::new();
    for node in nodes {
        match node {
            Node::Element { name, .. } if name == "br" => out.push('\n'),
            Node::Element { children, .. } => out.push_str(&raw_text(children)),
            other => out.push_str(&tree::plain_text(std::slice::from_ref(other))),
        }
    }
    out
}

struct Normalizer<'a> {
    options: &'a NormalizeOptions,
    diagnostics: &'a mut Diagnostics,
}

impl Normalizer<'_> {
    /// Lowers a node list. The result may mix blocks and inlines; the
    /// enclosing container wraps or flattens it.
    fn normalize_nodes(&mut self, nodes: Vec<Node>) -> Vec<Node> {
        let mut out = Vec::with_capacity(nodes.len());
        for node in nodes {
            match node {
                Node::RawBlock { html } => out.extend(wrap_inlines(self.fragment(&html))),
                Node::RawInline { html } => out.extend(flatten_blocks(self.fragment(&html))),
                Node::Element {
                    name,
                    attrs,
                    children,
                } => out.extend(self.lower(name, attrs, children)),
                Node::Table { rows, marker } => {
                    let rows = rows
                        .into_iter()
                        .map(|row| TableRow {
                            cells: row
                                .cells
                                .into_iter()
                                .map(|cell| TableCell {
                                    children: merge_text(flatten_blocks(
                                        self.normalize_nodes(cell.children),
                                    )),
                                })
                                .collect(),
                        })
                        .collect();
                    out.push(Node::Table { rows, marker });
                }
                Node::List {
                    ordered,
                    start,
                    items,
                } => out.push(Node::List {
                    ordered,
                    start,
                    items: self.normalize_nodes(items),
                }),
                mut other => {
                    let is_block_holder = matches!(
                        other,
                        Node::ListItem { .. } | Node::BlockQuote { .. } | Node::Component { .. }
                    );
                    if let Some(children) = other.children_mut() {
                        let normalized = self.normalize_nodes(std::mem::take(children));
                        *children = if is_block_holder {
                            wrap_inlines(normalized)
                        } else {
                            merge_text(flatten_blocks(normalized))
                        };
                    }
                    out.push(other);
                }
            }
        }
        out
    }

    fn fragment(&mut self, html: &str) -> Vec<Node> {
        let tokens = match tokenize(html) {
            Ok(tokens) => tokens,
            Err(err) => {
                log::warn!("HTML fragment could not be tokenized: {err}");
                self.diagnostics
                    .warn(format!("unparseable HTML kept as text: {err}"));
                return vec![Node::text(html.trim())];
            }
        };
        let built = build_tree(tokens);
        if built.flattened > 0 {
            log::warn!("{}: HTML nested too deeply", self.diagnostics.path());
            self.diagnostics.warn(format!(
                "{} elements nested deeper than {MAX_DEPTH} levels were unwrapped",
                built.flattened
            ));
        }
        for name in &built.unclosed_custom {
            self.diagnostics
                .fatal(format!("unclosed <{name}> runs to the end of the document"));
        }
        let nodes = into_nodes(built.nodes, false);
        self.normalize_nodes(nodes)
    }

    /// Lowered inline content of `children`.
    fn inline(&mut self, children: Vec<Node>) -> Vec<Node> {
        merge_text(flatten_blocks(self.normalize_nodes(children)))
    }

    /// Inline content trimmed for a block holder (paragraph, heading, cell).
    fn trimmed_inline(&mut self, children: Vec<Node>) -> Vec<Node> {
        let mut nodes = self.inline(children);
        trim_inline_edges(&mut nodes);
        nodes
    }

    fn lower(&mut self, name: String, attrs: Vec<(String, String)>, children: Vec<Node>) -> Vec<Node> {
        let lower = name.to_ascii_lowercase();
        if self.options.is_dropped(&lower) {
            log::debug!("dropping <{name}> with its content");
            return Vec::new();
        }

        match lower.as_str() {
            "pre" => {
                let lang = class_language(&attrs).or_else(|| {
                    children.iter().find_map(|child| match child {
                        Node::Element { name, attrs, .. } if name == "code" => {
                            class_language(attrs)
                        }
                        _ => None,
                    })
                });
                let text = raw_text(&children);
                let text = text.strip_prefix('\n').unwrap_or(&text).trim_end().to_string();
                vec![Node::CodeBlock { lang, text }]
            }
            "code" | "tt" => {
                let value = raw_text(&children).replace('\n', " ");
                if value.trim().is_empty() {
                    Vec::new()
                } else {
                    vec![Node::InlineCode { value }]
                }
            }
            "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => {
                let depth = lower[1..].parse().unwrap_or(1);
                vec![Node::Heading {
                    depth,
                    children: self.trimmed_inline(children),
                    anchor: attr(&attrs, "id").map(str::to_string),
                }]
            }
            "p" => {
                let children = self.trimmed_inline(children);
                let anchor = attr(&attrs, "id").map(str::to_string);
                if children.is_empty() && anchor.is_none() {
                    return Vec::new();
                }
                vec![Node::Paragraph { children, anchor }]
            }
            "ul" | "ol" => {
                let ordered = lower == "ol";
                let start = attr(&attrs, "start").and_then(|s| s.trim().parse().ok());
                self.list(ordered, if ordered { start.or(Some(1)) } else { None }, children)
            }
            "dt" => {
                let children = self.trimmed_inline(children);
                if children.is_empty() {
                    return Vec::new();
                }
                vec![Node::paragraph(vec![Node::Strong { children }])]
            }
            "dd" | "li" | "dl" | "div" | "section" | "article" | "aside" | "main" | "header"
            | "footer" | "nav" | "figure" | "figcaption" | "details" | "summary" | "center" => {
                self.unwrap(&attrs, children, true)
            }
            "blockquote" => {
                let children = wrap_inlines(self.normalize_nodes(children));
                vec![Node::BlockQuote { children }]
            }
            "table" => self.table(&attrs, children),
            "a" => self.anchor(&attrs, children),
            "em" | "i" | "cite" | "dfn" => self.styled(&attrs, children, |children| {
                Node::Emphasis { children }
            }),
            "strong" | "b" => {
                self.styled(&attrs, children, |children| Node::Strong { children })
            }
            "br" => vec![Node::Break],
            "hr" => vec![Node::ThematicBreak],
            "img" => match attr(&attrs, "src") {
                Some(src) if !src.is_empty() => vec![Node::Image {
                    src: src.to_string(),
                    alt: attr(&attrs, "alt").unwrap_or_default().to_string(),
                    title: attr(&attrs, "title").map(str::to_string),
                }],
                _ => Vec::new(),
            },
            "iframe" => {
                let kept = ["src", "title", "width", "height"]
                    .iter()
                    .filter_map(|key| attr(&attrs, key).map(|v| (key.to_string(), v.to_string())))
                    .collect::<Vec<_>>();
                if attr(&attrs, "src").is_none() {
                    return Vec::new();
                }
                vec![Node::Element {
                    name: lower.clone(),
                    attrs: kept,
                    children: Vec::new(),
                }]
            }
            _ if KEPT_INLINE.contains(&lower.as_str()) => {
                let children = self.inline(children);
                if children.is_empty() {
                    return Vec::new();
                }
                let kept = if lower == "abbr" {
                    attr(&attrs, "title")
                        .map(|title| vec![("title".to_string(), title.to_string())])
                        .unwrap_or_default()
                } else {
                    Vec::new()
                };
                vec![Node::Element {
                    name: lower.clone(),
                    attrs: kept,
                    children,
                }]
            }
            _ => self.unwrap(&attrs, children, false),
        }
    }

    /// Drops the element itself, keeping (or marking) its content.
    fn unwrap(&mut self, attrs: &[(String, String)], children: Vec<Node>, block: bool) -> Vec<Node> {
        if let Some(class) = self.marker_class(attrs) {
            return vec![Node::Marker {
                class,
                children: self.inline(children),
            }];
        }
        let nodes = self.normalize_nodes(children);
        if block { wrap_inlines(nodes) } else { nodes }
    }

    fn styled<F>(&mut self, attrs: &[(String, String)], children: Vec<Node>, build: F) -> Vec<Node>
    where
        F: FnOnce(Vec<Node>) -> Node,
    {
        if let Some(class) = self.marker_class(attrs) {
            return vec![Node::Marker {
                class,
                children: self.inline(children),
            }];
        }
        let children = self.inline(children);
        if children.iter().all(Node::is_blank_text) {
            return children;
        }
        vec![build(children)]
    }

    fn marker_class(&self, attrs: &[(String, String)]) -> Option<String> {
        classes(attrs)
            .find(|class| self.options.is_marker(class))
            .map(str::to_string)
    }

    fn anchor(&mut self, attrs: &[(String, String)], children: Vec<Node>) -> Vec<Node> {
        let mut nodes = Vec::new();
        if let Some(id) = attr(attrs, "id").or_else(|| attr(attrs, "name"))
            && !id.trim().is_empty()
        {
            nodes.push(Node::Anchor {
                id: id.trim().to_string(),
            });
        }
        let mut children = self.inline(children);
        match attr(attrs, "href").map(str::trim) {
            Some(href) if !href.is_empty() => {
                if children.iter().all(Node::is_blank_text) {
                    children = vec![Node::text(href)];
                }
                nodes.push(Node::Link {
                    href: href.to_string(),
                    children,
                });
            }
            _ => nodes.extend(children),
        }
        nodes
    }

    fn list(&mut self, ordered: bool, start: Option<u32>, children: Vec<Node>) -> Vec<Node> {
        let mut items = Vec::new();
        let mut stray = Vec::new();
        for child in children {
            match child {
                Node::Element {
                    name,
                    children: item_children,
                    ..
                } if name == "li" => {
                    flush_stray(&mut stray, &mut items, self);
                    let blocks = wrap_inlines(self.normalize_nodes(item_children));
                    items.push(Node::ListItem { children: blocks });
                }
                other => stray.push(other),
            }
        }
        flush_stray(&mut stray, &mut items, self);
        if items.is_empty() {
            return Vec::new();
        }
        vec![Node::List {
            ordered,
            start,
            items,
        }]
    }

    fn table(&mut self, attrs: &[(String, String)], children: Vec<Node>) -> Vec<Node> {
        let marker = self.marker_class(attrs);
        let mut rows = Vec::new();
        let mut loose = Vec::new();
        collect_rows(children, &mut rows, &mut loose);

        let rows: Vec<TableRow> = rows
            .into_iter()
            .map(|cells| TableRow {
                cells: cells
                    .into_iter()
                    .map(|cell| TableCell {
                        children: self.trimmed_inline(cell),
                    })
                    .collect(),
            })
            .filter(|row| !row.cells.is_empty())
            .collect();

        let mut out = Vec::new();
        let loose = self.normalize_nodes(loose);
        if loose.iter().any(|n| !n.is_blank_text()) {
            out.extend(wrap_inlines(loose));
        }
        if !rows.is_empty() {
            out.push(Node::Table { rows, marker });
        }
        out
    }
}

fn flush_stray(stray: &mut Vec<Node>, items: &mut Vec<Node>, normalizer: &mut Normalizer<'_>) {
    if stray.is_empty() {
        return;
    }
    let blocks = wrap_inlines(normalizer.normalize_nodes(std::mem::take(stray)));
    if !blocks.is_empty() {
        items.push(Node::ListItem { children: blocks });
    }
}

/// Collects `tr` rows (through row groups) as lists of cell contents.
fn collect_rows(children: Vec<Node>, rows: &mut Vec<Vec<Vec<Node>>>, loose: &mut Vec<Node>) {
    for child in children {
        match child {
            Node::Element { name, children, .. }
                if matches!(name.as_str(), "thead" | "tbody" | "tfoot") =>
            {
                collect_rows(children, rows, loose);
            }
            Node::Element { name, children, .. } if name == "tr" => {
                let cells = children
                    .into_iter()
                    .filter_map(|cell| match cell {
                        Node::Element { name, children, .. } if name == "td" || name == "th" => {
                            Some(children)
                        }
                        _ => None,
                    })
                    .collect();
                rows.push(cells);
            }
            Node::Element { name, .. } if matches!(name.as_str(), "caption" | "colgroup" | "col") => {
            }
            other => loose.push(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::plain_text;

    fn options() -> NormalizeOptions {
        NormalizeOptions {
            marker_classes: vec!["compare-better".into(), "nav-footer".into()],
            drop_elements: vec!["devsite-mathjax".into()],
        }
    }

    fn fragment(html: &str) -> (Vec<Node>, Diagnostics) {
        let mut diagnostics = Diagnostics::new("t.md");
        let nodes = normalize_fragment(html, &options(), &mut diagnostics);
        (nodes, diagnostics)
    }

    #[test]
    fn deep_nesting_is_unwrapped() {
        let html = format!("{}deep<em>text</em>", "<div>".repeat(1000));
        let (nodes, diagnostics) = fragment(&html);
        assert_eq!(plain_text(&nodes), "deeptext");
        assert_eq!(diagnostics.len(), 1);
        assert!(!diagnostics.has_fatal());
    }

    #[test]
    fn paragraph_with_inline_markup() {
        let (nodes, _) = fragment(
            "<p>\n  Keep <code>foo</code> and <a href=\"https://example.com\" style=\"x\">link</a>.\n</p>",
        );
        assert_eq!(
            nodes,
            vec![Node::paragraph(vec![
                Node::text("Keep "),
                Node::InlineCode {
                    value: "foo".into()
                },
                Node::text(" and "),
                Node::Link {
                    href: "https://example.com".into(),
                    children: vec![Node::text("link")],
                },
                Node::text("."),
            ])]
        );
    }

    #[test]
    fn unclosed_list_items_and_cells_auto_close() {
        let (nodes, diagnostics) = fragment("<ul><li>one<li>two</ul><table><tr><td>a<td>b<tr><td>c</table>");
        assert!(diagnostics.is_empty());
        match &nodes[0] {
            Node::List { items, .. } => assert_eq!(items.len(), 2),
            other => panic!("expected list, got {other:?}"),
        }
        match &nodes[1] {
            Node::Table { rows, .. } => {
                assert_eq!(rows.len(), 2);
                assert_eq!(rows[0].cells.len(), 2);
                assert_eq!(plain_text(&rows[1].cells[0].children), "c");
            }
            other => panic!("expected table, got {other:?}"),
        }
    }

    #[test]
    fn missing_table_close_is_tolerated() {
        let (nodes, diagnostics) = fragment("<table><tr><td>x");
        assert!(!diagnostics.has_fatal());
        assert!(matches!(nodes[0], Node::Table { .. }));
    }

    #[test]
    fn pre_keeps_whitespace_and_language() {
        let (nodes, _) = fragment("<pre class=\"prettyprint lang-py\">\ndef f():\n    return 1 &lt; 2\n</pre>");
        assert_eq!(
            nodes,
            vec![Node::CodeBlock {
                lang: Some("py".into()),
                text: "def f():\n    return 1 < 2".into()
            }]
        );
    }

    #[test]
    fn pre_inside_cell_is_not_auto_closed() {
        let (nodes, _) = fragment("<table><tr><td><pre><td>x</pre></td></tr></table>");
        match &nodes[0] {
            Node::Table { rows, .. } => {
                assert_eq!(rows[0].cells.len(), 1);
                assert_eq!(
                    rows[0].cells[0].children,
                    vec![Node::InlineCode { value: "x".into() }]
                );
            }
            other => panic!("expected table, got {other:?}"),
        }
    }

    #[test]
    fn marker_classes_survive_and_other_classes_drop() {
        let (nodes, _) = fragment("<p><span class=\"compare-better\">Better</span> <span class=\"x\">y</span></p>");
        let Node::Paragraph { children, .. } = &nodes[0] else {
            panic!("expected paragraph");
        };
        assert_eq!(
            children[0],
            Node::Marker {
                class: "compare-better".into(),
                children: vec![Node::text("Better")],
            }
        );
        assert_eq!(children[1], Node::text(" y"));
    }

    #[test]
    fn named_anchor_becomes_anchor() {
        let (nodes, _) = fragment("<a name=\"setup\"></a>");
        assert_eq!(nodes, vec![Node::Anchor { id: "setup".into() }]);
    }

    #[test]
    fn dropped_elements_lose_content() {
        let (nodes, _) = fragment("<devsite-mathjax config=\"x\"></devsite-mathjax><script>var a = {};</script><p>ok</p>");
        assert_eq!(nodes, vec![Node::paragraph(vec![Node::text("ok")])]);
    }

    #[test]
    fn unclosed_custom_element_is_fatal() {
        let (nodes, diagnostics) = fragment("<devsite-selector>\n<p>body</p>\n");
        assert!(diagnostics.has_fatal());
        assert_eq!(
            wrap_inlines(nodes),
            vec![Node::paragraph(vec![Node::text("body")])]
        );
    }

    #[test]
    fn sup_is_kept_with_no_attributes() {
        let (nodes, _) = fragment("x<sup class=\"a\">2</sup>");
        assert_eq!(
            nodes[1],
            Node::Element {
                name: "sup".into(),
                attrs: vec![],
                children: vec![Node::text("2")],
            }
        );
    }

    #[test]
    fn normalize_lowers_inline_elements_from_markdown() {
        let tree = Tree::new(vec![Node::paragraph(vec![
            Node::Element {
                name: "span".into(),
                attrs: vec![("class".into(), "compare-better".into())],
                children: vec![Node::text("Better")],
            },
            Node::text(" rest"),
        ])]);
        let mut diagnostics = Diagnostics::new("t.md");
        let normalized = normalize(tree, &options(), &mut diagnostics);
        let Node::Paragraph { children, .. } = &normalized.children[0] else {
            panic!("expected paragraph");
        };
        assert!(matches!(&children[0], Node::Marker { class, .. } if class == "compare-better"));
    }

    #[test]
    fn normalize_is_stable_on_lowered_output() {
        let tree = Tree::new(vec![Node::RawBlock {
            html: "<p>a<sup>2</sup> <em>b</em></p>".into(),
        }]);
        let mut diagnostics = Diagnostics::new("t.md");
        let once = normalize(tree, &options(), &mut diagnostics);
        let twice = normalize(once.clone(), &options(), &mut diagnostics);
        assert_eq!(once, twice);
    }
}
