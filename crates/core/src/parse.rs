//! Markup Parser: Markdown bodies with embedded HTML into a [`Tree`].
//!
//! Multi-line HTML blocks are masked with stable markers before the Markdown
//! parse so that markdown-rs never fragments them at blank lines; the masks
//! are expanded back into `RawBlock` or `Component` nodes afterwards.

use crate::code_fence::FenceTracker;
use crate::error::{Diagnostics, SourceLocation};
use crate::frontmatter::{Frontmatter, extract_frontmatter, yaml_block_end};
use crate::tag::{
    TagKind, find_matching_close, is_block_element, is_component_name, is_void_element,
    parse_tag_at,
};
use crate::tree::{Node, TableCell, TableRow, Tree, merge_text};
use markdown::mdast;
use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};

/// Deepest component nesting parsed recursively before content is kept raw.
const MAX_NESTING: usize = 32;

const MASK_PREFIX: &str = "DEVMDXMASK";
const MASK_SUFFIX: &str = "END";

/// Parser options for building markdown-rs parse options.
#[derive(Clone, Copy, Debug)]
pub struct ParseOptions {
    /// Enable GFM pipe tables.
    pub gfm_tables: bool,
    /// Enable indented code blocks.
    pub code_indented: bool,
    /// Keep raw HTML as nodes instead of text.
    pub raw_html: bool,
}

impl ParseOptions {
    /// Defaults matching legacy CMS sources.
    pub const fn devsite() -> Self {
        Self {
            gfm_tables: true,
            code_indented: true,
            raw_html: true,
        }
    }

    /// Convert to markdown-rs `ParseOptions`.
    pub fn to_markdown(self) -> markdown::ParseOptions {
        let constructs = markdown::Constructs {
            code_indented: self.code_indented,
            html_flow: self.raw_html,
            html_text: self.raw_html,
            gfm_table: self.gfm_tables,
            frontmatter: false,
            ..markdown::Constructs::default()
        };

        markdown::ParseOptions {
            constructs,
            ..markdown::ParseOptions::default()
        }
    }
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self::devsite()
    }
}

/// Parses a full source document: optional YAML header plus body.
///
/// Never fails; problems are reported through `diagnostics`.
pub fn parse_document(input: &str, diagnostics: &mut Diagnostics) -> Tree {
    parse_document_with_options(input, ParseOptions::default(), diagnostics)
}

/// Like [`parse_document`] with explicit options.
pub fn parse_document_with_options(
    input: &str,
    options: ParseOptions,
    diagnostics: &mut Diagnostics,
) -> Tree {
    let normalized = input.replace("\r\n", "\n");
    let mut header = None;
    let (frontmatter, body_start) = match extract_frontmatter(&normalized) {
        Ok(extraction) => {
            for key in &extraction.dropped_keys {
                diagnostics.warn(format!("frontmatter key `{key}` is not a scalar; dropped"));
            }
            (extraction.frontmatter, extraction.body_start)
        }
        Err(err) => {
            diagnostics.warn_at(format!("{err}; kept as body text"), SourceLocation::new(1, 1));
            // fences read as Markdown would turn into a rule and a setext heading
            match yaml_block_end(&normalized) {
                Some(end) => {
                    let text = normalized[..end].trim_start_matches('\u{feff}').trim_end();
                    header = Some(Node::paragraph(vec![Node::text(text)]));
                    (Frontmatter::default(), end)
                }
                None => (Frontmatter::default(), 0),
            }
        }
    };
    let body = &normalized[body_start..];
    let body = body.strip_prefix('\u{feff}').unwrap_or(body);

    let mut children: Vec<Node> = header.into_iter().collect();
    children.extend(parse_body(body, options, diagnostics, 0));
    Tree {
        frontmatter,
        children,
    }
}

/// Parses a Markdown body (no frontmatter) into block nodes.
pub fn parse_blocks(input: &str, diagnostics: &mut Diagnostics) -> Vec<Node> {
    parse_body(input, ParseOptions::default(), diagnostics, 0)
}

fn parse_body(
    input: &str,
    options: ParseOptions,
    diagnostics: &mut Diagnostics,
    depth: usize,
) -> Vec<Node> {
    let (masked, masks) = mask_html_blocks(input, diagnostics);
    // markdown-rs panics on a few malformed nestings instead of returning Err
    let parsed = panic::catch_unwind(AssertUnwindSafe(|| {
        markdown::to_mdast(&masked, &options.to_markdown())
    }));
    let root = match parsed {
        Ok(Ok(root)) => root,
        Ok(Err(message)) => {
            diagnostics.warn(format!("markdown parse failed ({message}); kept as text"));
            return vec![Node::paragraph(vec![Node::text(input)])];
        }
        Err(_) => {
            log::warn!("{}: markdown parser panicked", diagnostics.path());
            diagnostics.fatal("markdown structure could not be parsed; content kept as text");
            return vec![Node::paragraph(vec![Node::text(input)])];
        }
    };

    let mut definitions = HashMap::new();
    collect_definitions(&root, &mut definitions);

    let mut converter = Converter {
        options,
        masks,
        definitions,
        diagnostics,
        depth,
    };
    match root.children() {
        Some(children) => converter.blocks(children),
        None => Vec::new(),
    }
}

/// A region of the source hidden from the Markdown parse.
#[derive(Debug, Clone)]
enum Masked {
    /// Opaque HTML, normalized later.
    Raw(String),
    /// Capitalized component with Markdown content.
    Component {
        name: String,
        props: Vec<(String, String)>,
        inner: Option<String>,
    },
    /// Block element marked `markdown="1"`; its content is Markdown.
    Markdown(String),
}

/// Replace top-level multi-line HTML blocks with stable markers.
fn mask_html_blocks(input: &str, diagnostics: &mut Diagnostics) -> (String, Vec<Masked>) {
    let mut output = String::with_capacity(input.len());
    let mut masks = Vec::new();
    let mut fence = FenceTracker::new();
    let mut cursor = 0;

    while cursor < input.len() {
        let line_end = input[cursor..]
            .find('\n')
            .map(|i| cursor + i + 1)
            .unwrap_or(input.len());
        let line = &input[cursor..line_end];

        if fence.consume(line.trim_end_matches('\n')) {
            output.push_str(line);
            cursor = line_end;
            continue;
        }

        if line.starts_with('<')
            && let Some((masked, end)) = mask_at(input, cursor, diagnostics)
        {
            if !output.is_empty() && !output.ends_with("\n\n") {
                output.push_str(if output.ends_with('\n') { "\n" } else { "\n\n" });
            }
            output.push_str(&format!("{MASK_PREFIX}{}{MASK_SUFFIX}\n\n", masks.len()));
            masks.push(masked);
            cursor = if input[end..].starts_with('\n') {
                end + 1
            } else {
                end
            };
            continue;
        }

        output.push_str(line);
        cursor = line_end;
    }

    (output, masks)
}

fn mask_at(input: &str, pos: usize, diagnostics: &mut Diagnostics) -> Option<(Masked, usize)> {
    let rest = &input[pos..];
    if rest.starts_with("<!--") {
        return Some(match rest.find("-->") {
            Some(end) => (Masked::Raw(rest[..end + 3].to_string()), pos + end + 3),
            None => {
                diagnostics.warn_at("unterminated HTML comment", line_location(input, pos));
                (Masked::Raw(rest.to_string()), input.len())
            }
        });
    }

    let tag = parse_tag_at(input, pos)?;
    if tag.kind == TagKind::Close {
        return None;
    }

    if is_component_name(&tag.name) {
        let props = decoded_attrs(&tag.attrs, "true");
        if tag.kind == TagKind::SelfClosing {
            return Some((
                Masked::Component {
                    name: tag.name.clone(),
                    props,
                    inner: None,
                },
                tag.end,
            ));
        }
        return Some(match find_matching_close(input, &tag) {
            Some((close_start, close_end)) => (
                Masked::Component {
                    name: tag.name.clone(),
                    props,
                    inner: Some(input[tag.end..close_start].to_string()),
                },
                close_end,
            ),
            None => (Masked::Raw(rest.to_string()), input.len()),
        });
    }

    if tag.name.contains('-') {
        if tag.kind == TagKind::SelfClosing {
            return Some((Masked::Raw(input[pos..tag.end].to_string()), tag.end));
        }
        return Some(match find_matching_close(input, &tag) {
            Some((_, close_end)) => (Masked::Raw(input[pos..close_end].to_string()), close_end),
            None => (Masked::Raw(rest.to_string()), input.len()),
        });
    }

    if tag.kind == TagKind::Open && is_block_element(&tag.name) {
        let (close_start, close_end) = find_matching_close(input, &tag)?;
        let markdown_inside = tag
            .attr("markdown")
            .is_some_and(|v| matches!(v, "1" | "block" | "span"));
        let masked = if markdown_inside {
            Masked::Markdown(input[tag.end..close_start].to_string())
        } else {
            Masked::Raw(input[pos..close_end].to_string())
        };
        return Some((masked, close_end));
    }

    None
}

fn line_location(input: &str, pos: usize) -> SourceLocation {
    let line = input[..pos].matches('\n').count() + 1;
    let column = pos - input[..pos].rfind('\n').map(|i| i + 1).unwrap_or(0) + 1;
    SourceLocation::new(line, column)
}

fn placeholder_index(text: &str) -> Option<usize> {
    text.trim()
        .strip_prefix(MASK_PREFIX)?
        .strip_suffix(MASK_SUFFIX)?
        .parse()
        .ok()
}

fn decoded_attrs(attrs: &[crate::tag::TagAttr], valueless: &str) -> Vec<(String, String)> {
    attrs
        .iter()
        .map(|attr| {
            let value = match &attr.value {
                Some(value) => html_escape::decode_html_entities(value).into_owned(),
                None => valueless.to_string(),
            };
            (attr.name.clone(), value)
        })
        .collect()
}

/// Removes the common leading indentation and surrounding blank lines.
fn dedent(text: &str) -> String {
    let indent = text
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| line.len() - line.trim_start_matches([' ', '\t']).len())
        .min()
        .unwrap_or(0);
    let lines: Vec<&str> = text
        .lines()
        .map(|line| line.get(indent..).unwrap_or("").trim_end_matches(' '))
        .collect();
    let first = lines.iter().position(|l| !l.is_empty()).unwrap_or(lines.len());
    let last = lines.iter().rposition(|l| !l.is_empty()).map_or(first, |i| i + 1);
    lines[first..last].join("\n")
}

fn collect_definitions(node: &mdast::Node, out: &mut HashMap<String, String>) {
    if let mdast::Node::Definition(definition) = node {
        out.entry(definition.identifier.clone())
            .or_insert_with(|| definition.url.clone());
    }
    if let Some(children) = node.children() {
        for child in children {
            collect_definitions(child, out);
        }
    }
}

struct Frame {
    name: String,
    attrs: Vec<(String, String)>,
    raw: String,
    children: Vec<Node>,
}

impl Frame {
    fn into_unwrapped(self) -> Vec<Node> {
        let mut nodes = vec![Node::RawInline { html: self.raw }];
        nodes.extend(self.children);
        nodes
    }
}

struct Converter<'a> {
    options: ParseOptions,
    masks: Vec<Masked>,
    definitions: HashMap<String, String>,
    diagnostics: &'a mut Diagnostics,
    depth: usize,
}

impl Converter<'_> {
    fn blocks(&mut self, nodes: &[mdast::Node]) -> Vec<Node> {
        nodes.iter().flat_map(|node| self.block(node)).collect()
    }

    fn block(&mut self, node: &mdast::Node) -> Vec<Node> {
        match node {
            mdast::Node::Heading(heading) => vec![Node::Heading {
                depth: heading.depth,
                children: self.inlines(&heading.children),
                anchor: None,
            }],
            mdast::Node::Paragraph(paragraph) => {
                if let [mdast::Node::Text(text)] = paragraph.children.as_slice()
                    && let Some(index) = placeholder_index(&text.value)
                {
                    return self.expand_mask(index);
                }
                vec![Node::paragraph(self.inlines(&paragraph.children))]
            }
            mdast::Node::List(list) => vec![Node::List {
                ordered: list.ordered,
                start: if list.ordered { list.start } else { None },
                items: list
                    .children
                    .iter()
                    .flat_map(|item| self.block(item))
                    .collect(),
            }],
            mdast::Node::ListItem(item) => vec![Node::ListItem {
                children: self.blocks(&item.children),
            }],
            mdast::Node::Table(table) => {
                let rows = table
                    .children
                    .iter()
                    .filter_map(|row| match row {
                        mdast::Node::TableRow(row) => Some(TableRow {
                            cells: row
                                .children
                                .iter()
                                .map(|cell| TableCell {
                                    children: cell
                                        .children()
                                        .map(|c| self.inlines(c))
                                        .unwrap_or_default(),
                                })
                                .collect(),
                        }),
                        _ => None,
                    })
                    .collect();
                vec![Node::Table { rows, marker: None }]
            }
            mdast::Node::Code(code) => vec![Node::CodeBlock {
                lang: code.lang.clone().filter(|l| !l.is_empty()),
                text: code.value.clone(),
            }],
            mdast::Node::Blockquote(quote) => vec![Node::BlockQuote {
                children: self.blocks(&quote.children),
            }],
            mdast::Node::ThematicBreak(_) => vec![Node::ThematicBreak],
            mdast::Node::Html(html) => vec![Node::RawBlock {
                html: html.value.clone(),
            }],
            mdast::Node::Definition(_) => Vec::new(),
            other => match other.children() {
                Some(children) => self.blocks(children),
                None => Vec::new(),
            },
        }
    }

    fn expand_mask(&mut self, index: usize) -> Vec<Node> {
        let Some(masked) = self.masks.get(index).cloned() else {
            return Vec::new();
        };
        match masked {
            Masked::Raw(html) => vec![Node::RawBlock { html }],
            Masked::Component { name, props, inner } => {
                let children = match inner {
                    Some(inner) if self.depth < MAX_NESTING => {
                        parse_body(&dedent(&inner), self.options, self.diagnostics, self.depth + 1)
                    }
                    Some(inner) => {
                        self.diagnostics
                            .warn(format!("<{name}> nested too deeply; content kept raw"));
                        vec![Node::RawBlock { html: inner }]
                    }
                    None => Vec::new(),
                };
                vec![Node::Component {
                    name,
                    props,
                    children,
                }]
            }
            Masked::Markdown(inner) if self.depth < MAX_NESTING => {
                parse_body(&dedent(&inner), self.options, self.diagnostics, self.depth + 1)
            }
            Masked::Markdown(inner) => vec![Node::RawBlock { html: inner }],
        }
    }

    /// Converts inline children, pairing inline HTML open/close tags into elements.
    fn inlines(&mut self, nodes: &[mdast::Node]) -> Vec<Node> {
        let mut stack: Vec<Frame> = Vec::new();
        let mut root: Vec<Node> = Vec::new();

        for node in nodes {
            match node {
                mdast::Node::Html(html) => push_inline_html(&html.value, &mut stack, &mut root),
                other => {
                    let converted = self.inline(other);
                    match stack.last_mut() {
                        Some(frame) => frame.children.extend(converted),
                        None => root.extend(converted),
                    }
                }
            }
        }

        while let Some(frame) = stack.pop() {
            let nodes = frame.into_unwrapped();
            match stack.last_mut() {
                Some(parent) => parent.children.extend(nodes),
                None => root.extend(nodes),
            }
        }
        merge_text(root)
    }

    fn inline(&mut self, node: &mdast::Node) -> Vec<Node> {
        match node {
            mdast::Node::Text(text) => vec![Node::text(text.value.clone())],
            mdast::Node::Emphasis(emphasis) => vec![Node::Emphasis {
                children: self.inlines(&emphasis.children),
            }],
            mdast::Node::Strong(strong) => vec![Node::Strong {
                children: self.inlines(&strong.children),
            }],
            mdast::Node::InlineCode(code) => vec![Node::InlineCode {
                value: code.value.clone(),
            }],
            mdast::Node::Link(link) => vec![Node::Link {
                href: link.url.clone(),
                children: self.inlines(&link.children),
            }],
            mdast::Node::LinkReference(reference) => {
                let children = self.inlines(&reference.children);
                match self.definitions.get(&reference.identifier) {
                    Some(url) => vec![Node::Link {
                        href: url.clone(),
                        children,
                    }],
                    None => {
                        let mut nodes = vec![Node::text("[")];
                        nodes.extend(children);
                        nodes.push(Node::text("]"));
                        nodes
                    }
                }
            }
            mdast::Node::Image(image) => vec![Node::Image {
                src: image.url.clone(),
                alt: image.alt.clone(),
                title: image.title.clone(),
            }],
            mdast::Node::ImageReference(reference) => {
                match self.definitions.get(&reference.identifier) {
                    Some(url) => vec![Node::Image {
                        src: url.clone(),
                        alt: reference.alt.clone(),
                        title: None,
                    }],
                    None => vec![Node::text(format!("![{}]", reference.alt))],
                }
            }
            mdast::Node::Break(_) => vec![Node::Break],
            mdast::Node::Html(html) => vec![Node::RawInline {
                html: html.value.clone(),
            }],
            other => match other.children() {
                Some(children) => self.inlines(children),
                None => Vec::new(),
            },
        }
    }
}

fn push_inline_html(value: &str, stack: &mut Vec<Frame>, root: &mut Vec<Node>) {
    let single_tag = parse_tag_at(value, 0).filter(|tag| tag.end == value.trim_end().len());
    let Some(tag) = single_tag else {
        push_to(stack, root, Node::RawInline {
            html: value.to_string(),
        });
        return;
    };

    let name = if is_component_name(&tag.name) {
        tag.name.clone()
    } else {
        tag.lower_name()
    };

    match tag.kind {
        TagKind::Open if !is_void_element(&name) => stack.push(Frame {
            name,
            attrs: decoded_attrs(&tag.attrs, ""),
            raw: value.to_string(),
            children: Vec::new(),
        }),
        TagKind::Open | TagKind::SelfClosing => push_to(stack, root, Node::Element {
            name,
            attrs: decoded_attrs(&tag.attrs, ""),
            children: Vec::new(),
        }),
        TagKind::Close => {
            let Some(index) = stack.iter().rposition(|frame| frame.name == name) else {
                push_to(stack, root, Node::RawInline {
                    html: value.to_string(),
                });
                return;
            };
            while stack.len() > index + 1 {
                if let Some(inner) = stack.pop() {
                    let nodes = inner.into_unwrapped();
                    if let Some(parent) = stack.last_mut() {
                        parent.children.extend(nodes);
                    }
                }
            }
            if let Some(frame) = stack.pop() {
                let element = Node::Element {
                    name: frame.name,
                    attrs: frame.attrs,
                    children: merge_text(frame.children),
                };
                push_to(stack, root, element);
            }
        }
    }
}

fn push_to(stack: &mut [Frame], root: &mut Vec<Node>, node: Node) {
    match stack.last_mut() {
        Some(frame) => frame.children.push(node),
        None => root.push(node),
    }
}
