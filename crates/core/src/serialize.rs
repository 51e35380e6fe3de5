//! Deterministic tree to MDX text renderer.
//!
//! Style: `-` bullets, backtick fences, `***` rules, `*em*`, `**strong**`,
//! GFM pipe tables, one blank line between blocks.

use crate::code_fence::{FenceTracker, longest_run};
use crate::tag::is_void_element;
use crate::tree::{Node, TableRow, Tree, flatten_blocks, merge_adjacent_spans, spans_fuse};
use std::borrow::Cow;

/// Renders a tree into the final text.
pub fn serialize(tree: &Tree) -> String {
    let (frontmatter, body) = serialize_parts(tree);
    join_parts(&frontmatter, &body)
}

/// Renders the frontmatter block (empty when there is no metadata) and the body separately.
pub fn serialize_parts(tree: &Tree) -> (String, String) {
    let frontmatter = if tree.frontmatter.is_empty() {
        String::new()
    } else {
        format!("---\n{}---\n", tree.frontmatter.render())
    };
    (frontmatter, serialize_blocks(&tree.children))
}

/// Joins a frontmatter block and a body with exactly one blank line between them.
pub fn join_parts(frontmatter: &str, body: &str) -> String {
    match (frontmatter.is_empty(), body.trim().is_empty()) {
        (true, _) => body.to_string(),
        (false, true) => frontmatter.to_string(),
        (false, false) => format!("{frontmatter}\n{body}"),
    }
}

/// Renders block nodes as a document body ending in a single newline.
pub fn serialize_blocks(nodes: &[Node]) -> String {
    let body = tidy(&render_blocks(nodes));
    let body = body.trim_matches('\n');
    if body.is_empty() {
        String::new()
    } else {
        format!("{body}\n")
    }
}

/// Collapses runs of blank lines and trims trailing spaces outside fences.
pub fn tidy(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut fence = FenceTracker::new();
    let mut blank_run = 0;
    for line in text.split('\n') {
        let in_code = fence.consume(line.trim_start());
        if in_code {
            blank_run = 0;
            out.push_str(line);
        } else {
            let trimmed = line.trim_end();
            if trimmed.is_empty() {
                blank_run += 1;
                if blank_run > 1 {
                    continue;
                }
            } else {
                blank_run = 0;
            }
            out.push_str(trimmed);
        }
        out.push('\n');
    }
    out.pop();
    out
}

fn render_blocks(nodes: &[Node]) -> String {
    render_block_parts(nodes).join("\n\n")
}

/// Renders each block separately; adjacent lists of the same kind merge and
/// stray inline runs become paragraphs.
fn render_block_parts(nodes: &[Node]) -> Vec<String> {
    let mut parts = Vec::new();
    let mut index = 0;
    while index < nodes.len() {
        let node = &nodes[index];
        let rendered = match node {
            Node::List { ordered, start, .. } => {
                let mut items: Vec<&Node> = Vec::new();
                while let Some(Node::List {
                    ordered: next_ordered,
                    items: next_items,
                    ..
                }) = nodes.get(index)
                {
                    if next_ordered != ordered {
                        break;
                    }
                    items.extend(next_items.iter());
                    index += 1;
                }
                render_list(*ordered, *start, &items)
            }
            Node::ListItem { .. } => {
                let mut items: Vec<&Node> = Vec::new();
                while let Some(item @ Node::ListItem { .. }) = nodes.get(index) {
                    items.push(item);
                    index += 1;
                }
                render_list(false, None, &items)
            }
            other if !other.is_block() => {
                let start = index;
                while nodes.get(index).is_some_and(|n| !n.is_block()) {
                    index += 1;
                }
                render_inlines(&nodes[start..index], InlineContext::default())
                    .trim()
                    .to_string()
            }
            other => {
                index += 1;
                render_block(other)
            }
        };
        if !rendered.trim().is_empty() {
            parts.push(rendered);
        }
    }
    parts
}

fn render_block(node: &Node) -> String {
    match node {
        Node::Heading {
            depth,
            children,
            anchor,
        } => {
            let hashes = "#".repeat(usize::from((*depth).clamp(1, 6)));
            let text = render_inlines(
                children,
                InlineContext {
                    single_line: true,
                    ..InlineContext::default()
                },
            );
            let mut line = format!("{hashes} {}", text.trim());
            if let Some(id) = anchor {
                line.push(' ');
                line.push_str(&anchor_html(id));
            }
            line.trim_end().to_string()
        }
        Node::Paragraph { children, anchor } => {
            let text = render_inlines(children, InlineContext::default());
            let text = text.trim();
            match anchor {
                Some(id) if text.is_empty() => anchor_html(id),
                Some(id) => format!("{} {text}", anchor_html(id)),
                None => text.to_string(),
            }
        }
        Node::Table { rows, .. } => render_table(rows),
        Node::CodeBlock { lang, text } => {
            let ticks = "`".repeat(longest_run(text, '`').max(2) + 1);
            let info = lang
                .as_deref()
                .map(str::trim)
                .filter(|l| !l.contains('`'))
                .unwrap_or("");
            let text = text.trim_end_matches('\n');
            if text.is_empty() {
                format!("{ticks}{info}\n{ticks}")
            } else {
                format!("{ticks}{info}\n{text}\n{ticks}")
            }
        }
        Node::BlockQuote { children } => render_blocks(children)
            .lines()
            .map(|line| {
                if line.is_empty() {
                    ">".to_string()
                } else {
                    format!("> {line}")
                }
            })
            .collect::<Vec<_>>()
            .join("\n"),
        Node::ThematicBreak => "***".to_string(),
        Node::RawBlock { html } => html.trim_end().to_string(),
        Node::Component {
            name,
            props,
            children,
        } => {
            let mut open = format!("<{name}");
            for (key, value) in props {
                open.push_str(&format!(" {key}=\"{}\"", escape_attr(value)));
            }
            let inner = render_blocks(children);
            if inner.trim().is_empty() {
                format!("{open} />")
            } else {
                format!("{open}>\n{inner}\n</{name}>")
            }
        }
        Node::List {
            ordered,
            start,
            items,
        } => render_list(*ordered, *start, &items.iter().collect::<Vec<_>>()),
        Node::ListItem { .. } => render_list(false, None, &[node]),
        inline => render_inlines(std::slice::from_ref(inline), InlineContext::default()),
    }
}

fn render_list(ordered: bool, start: Option<u32>, items: &[&Node]) -> String {
    let first = start.unwrap_or(1);
    let mut rendered = Vec::with_capacity(items.len());
    let mut loose = false;

    for (offset, item) in items.iter().enumerate() {
        let marker = if ordered {
            format!("{}.", first.saturating_add(offset as u32))
        } else {
            "-".to_string()
        };
        let children: &[Node] = match item {
            Node::ListItem { children } => children,
            other => std::slice::from_ref(*other),
        };
        let parts = render_block_parts(children);
        let tight_pair = matches!(
            children,
            [Node::Paragraph { .. }, Node::List { .. }]
        ) && parts.len() == 2;
        let content = if tight_pair {
            parts.join("\n")
        } else {
            if parts.len() > 1 {
                loose = true;
            }
            parts.join("\n\n")
        };

        let indent = " ".repeat(marker.len() + 1);
        let mut text = String::new();
        for (i, line) in content.split('\n').enumerate() {
            if i == 0 {
                text.push_str(&marker);
                if !line.is_empty() {
                    text.push(' ');
                    text.push_str(line);
                }
            } else {
                text.push('\n');
                if !line.is_empty() {
                    text.push_str(&indent);
                    text.push_str(line);
                }
            }
        }
        rendered.push(text);
    }

    rendered.join(if loose { "\n\n" } else { "\n" })
}

fn render_table(rows: &[TableRow]) -> String {
    let width = rows.iter().map(|row| row.cells.len()).max().unwrap_or(0);
    if width == 0 {
        return String::new();
    }
    let context = InlineContext {
        table: true,
        single_line: true,
        ..InlineContext::default()
    };
    let render_row = |row: &TableRow| {
        let cells: Vec<String> = (0..width)
            .map(|i| {
                row.cells
                    .get(i)
                    .map(|cell| render_inlines(&cell.children, context).trim().to_string())
                    .unwrap_or_default()
            })
            .collect();
        format!("| {} |", cells.join(" | "))
    };

    let mut lines = Vec::with_capacity(rows.len() + 1);
    lines.push(render_row(&rows[0]));
    lines.push(format!("|{}|", vec![" --- "; width].join("|")));
    lines.extend(rows[1..].iter().map(render_row));
    lines.join("\n")
}

fn anchor_html(id: &str) -> String {
    format!("<a id=\"{}\"></a>", escape_attr(id))
}

/// Escapes a double-quoted attribute value.
pub fn escape_attr(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('"', "&quot;")
        .replace(['\n', '\r'], " ")
}

#[derive(Debug, Clone, Copy, Default)]
struct InlineContext {
    /// Inside a GFM table cell.
    table: bool,
    /// Newlines and breaks become spaces (headings, cells).
    single_line: bool,
    /// Inside a link label; nested links lose their destination.
    in_link: bool,
}

fn render_inlines(nodes: &[Node], cx: InlineContext) -> String {
    let mut out = String::new();
    write_inlines(nodes, cx, &mut out, false);
    out
}

/// Appends rendered inlines. `nested` buffers never start a line.
fn write_inlines(nodes: &[Node], cx: InlineContext, out: &mut String, nested: bool) {
    let fuses = nodes.windows(2).any(|pair| spans_fuse(&pair[0], &pair[1]));
    let nodes: Cow<'_, [Node]> = if fuses {
        Cow::Owned(merge_adjacent_spans(nodes.to_vec()))
    } else {
        Cow::Borrowed(nodes)
    };
    for (index, node) in nodes.iter().enumerate() {
        let at_line_start = if out.is_empty() {
            !nested
        } else {
            out.ends_with('\n')
        };
        let next_char = nodes.get(index + 1).and_then(first_char);
        write_inline(node, cx, out, nested, at_line_start, next_char);
    }
}

/// First rendered character of an inline node when it is plain text.
fn first_char(node: &Node) -> Option<char> {
    match node {
        Node::Text { value } => value.chars().next(),
        _ => None,
    }
}

fn write_inline(
    node: &Node,
    cx: InlineContext,
    out: &mut String,
    nested: bool,
    at_line_start: bool,
    next_char: Option<char>,
) {
    match node {
        Node::Text { value } => escape_text(value, cx, out, at_line_start, next_char),
        Node::Emphasis { children } => write_delimited(children, "*", cx, out),
        Node::Strong { children } => write_delimited(children, "**", cx, out),
        Node::InlineCode { value } => {
            let mut value = value.replace(['\n', '\r'], " ");
            if cx.table {
                value = value.replace('|', "\\|");
            }
            if value.is_empty() {
                return;
            }
            let ticks = "`".repeat(longest_run(&value, '`') + 1);
            let pad = value.starts_with('`')
                || value.ends_with('`')
                || (value.starts_with(' ') && value.ends_with(' ') && !value.trim().is_empty());
            out.push_str(&ticks);
            if pad {
                out.push(' ');
            }
            out.push_str(&value);
            if pad {
                out.push(' ');
            }
            out.push_str(&ticks);
        }
        Node::Link { href, children } => {
            if cx.in_link {
                write_inlines(children, cx, out, nested);
                return;
            }
            let mut label = String::new();
            write_inlines(
                children,
                InlineContext {
                    in_link: true,
                    single_line: true,
                    ..cx
                },
                &mut label,
                true,
            );
            let label = label.trim();
            out.push('[');
            if label.is_empty() {
                escape_text(href, cx, out, false, None);
            } else {
                out.push_str(label);
            }
            out.push_str("](");
            out.push_str(&encode_destination(href, cx.table));
            out.push(')');
        }
        Node::Image { src, alt, title } => {
            out.push_str("![");
            escape_text(
                alt,
                InlineContext {
                    single_line: true,
                    ..cx
                },
                out,
                false,
                None,
            );
            out.push_str("](");
            out.push_str(&encode_destination(src, cx.table));
            if let Some(title) = title.as_deref().filter(|t| !t.is_empty()) {
                out.push_str(" \"");
                out.push_str(&title.replace('\\', "\\\\").replace('"', "\\\""));
                out.push('"');
            }
            out.push(')');
        }
        Node::Anchor { id } => out.push_str(&anchor_html(id)),
        Node::Element {
            name,
            attrs,
            children,
        } => {
            let mut open = format!("<{name}");
            for (key, value) in attrs {
                open.push_str(&format!(" {key}=\"{}\"", escape_attr(value)));
            }
            if is_void_element(name) {
                out.push_str(&open);
                out.push_str(" />");
                return;
            }
            let mut inner = String::new();
            write_inlines(&without_edge_breaks(children), cx, &mut inner, true);
            if inner.is_empty() && name != "iframe" {
                return;
            }
            out.push_str(&open);
            out.push('>');
            out.push_str(&inner);
            out.push_str(&format!("</{name}>"));
        }
        Node::Marker { children, .. } => write_inlines(children, cx, out, nested),
        Node::CharRef { ch } => out.push_str(&format!("&#{};", u32::from(*ch))),
        Node::RawInline { html } => out.push_str(html),
        Node::Break => {
            if cx.table {
                out.push_str("<br />");
            } else if cx.single_line {
                out.push(' ');
            } else {
                let trimmed = out.trim_end_matches([' ', '\t']).len();
                out.truncate(trimmed);
                out.push_str("\\\n");
            }
        }
        block => {
            let inline = flatten_blocks(vec![block.clone()]);
            write_inlines(&inline, cx, out, nested);
        }
    }
}

/// Writes `children` between `delimiter`s, keeping edge whitespace outside.
fn write_delimited(children: &[Node], delimiter: &str, cx: InlineContext, out: &mut String) {
    let mut inner = String::new();
    write_inlines(&without_edge_breaks(children), cx, &mut inner, true);
    let core = inner.trim();
    if core.is_empty() {
        out.push_str(&inner);
        return;
    }
    let lead = &inner[..inner.len() - inner.trim_start().len()];
    let trail = &inner[inner.trim_end().len()..];
    out.push_str(lead);
    out.push_str(delimiter);
    out.push_str(core);
    out.push_str(delimiter);
    out.push_str(trail);
}

/// Drops hard breaks with nothing but whitespace between them and either
/// edge of a span; a closing delimiter may not follow a break.
fn without_edge_breaks(children: &[Node]) -> Cow<'_, [Node]> {
    let is_edge = |node: &Node| matches!(node, Node::Break) || node.is_blank_text();
    let lead = children.iter().take_while(|&n| is_edge(n)).count();
    let trail = children[lead..]
        .iter()
        .rev()
        .take_while(|&n| is_edge(n))
        .count();
    let tail = children.len() - trail;
    let at_edge = |index: usize| index < lead || index >= tail;
    let has_edge_break = children
        .iter()
        .enumerate()
        .any(|(index, node)| at_edge(index) && matches!(node, Node::Break));
    if !has_edge_break {
        return Cow::Borrowed(children);
    }
    Cow::Owned(
        children
            .iter()
            .enumerate()
            .filter(|(index, node)| !(at_edge(*index) && matches!(node, Node::Break)))
            .map(|(_, node)| node.clone())
            .collect(),
    )
}

fn encode_destination(href: &str, table: bool) -> String {
    let balanced = {
        let mut depth = 0i32;
        let mut ok = true;
        for c in href.chars() {
            match c {
                '(' => depth += 1,
                ')' => {
                    depth -= 1;
                    if depth < 0 {
                        ok = false;
                    }
                }
                _ => {}
            }
        }
        ok && depth == 0
    };
    let mut out = String::with_capacity(href.len());
    for c in href.trim().chars() {
        match c {
            ' ' => out.push_str("%20"),
            '<' => out.push_str("%3C"),
            '>' => out.push_str("%3E"),
            '\\' => out.push_str("%5C"),
            '\n' | '\r' => {}
            '(' if !balanced => out.push_str("%28"),
            ')' if !balanced => out.push_str("%29"),
            '|' if table => out.push_str("%7C"),
            c => out.push(c),
        }
    }
    out
}

fn looks_like_entity(rest: &str) -> bool {
    let Some(body) = rest.strip_prefix('&') else {
        return false;
    };
    let Some(end) = body.find(';') else {
        return false;
    };
    let name = &body[..end];
    if let Some(numeric) = name.strip_prefix('#') {
        return match numeric.strip_prefix(['x', 'X']) {
            Some(hex) => !hex.is_empty() && hex.chars().all(|c| c.is_ascii_hexdigit()),
            None => !numeric.is_empty() && numeric.chars().all(|c| c.is_ascii_digit()),
        };
    }
    name.chars().next().is_some_and(|c| c.is_ascii_alphabetic())
        && name.chars().all(|c| c.is_ascii_alphanumeric())
}

/// Escapes text so it re-parses to the same value.
fn escape_text(
    value: &str,
    cx: InlineContext,
    out: &mut String,
    at_line_start: bool,
    next_char: Option<char>,
) {
    let flattened;
    let value = if cx.single_line {
        flattened = value.replace(['\n', '\r'], " ");
        flattened.as_str()
    } else {
        value
    };

    let lines: Vec<&str> = value.split('\n').collect();
    let last = lines.len() - 1;
    for (line_index, line) in lines.into_iter().enumerate() {
        let line_start = if line_index > 0 {
            let trimmed = out.trim_end_matches([' ', '\t']).len();
            out.truncate(trimmed);
            out.push('\n');
            true
        } else {
            at_line_start
        };
        let line = if line_start { line.trim_start() } else { line };
        let trailing = if line_index == last { next_char } else { None };
        escape_line(line, cx, out, line_start, trailing);
    }
}

fn escape_line(
    line: &str,
    cx: InlineContext,
    out: &mut String,
    line_start: bool,
    next_char: Option<char>,
) {
    let chars: Vec<(usize, char)> = line.char_indices().collect();
    let mut skip_until = 0;

    if line_start {
        let digits = line.chars().take_while(char::is_ascii_digit).count();
        if digits > 0 && digits <= 9 && matches!(line[digits..].chars().next(), Some('.' | ')')) {
            out.push_str(&line[..digits]);
            out.push('\\');
            skip_until = digits;
        }
    }

    for (position, &(offset, c)) in chars.iter().enumerate() {
        if offset < skip_until {
            continue;
        }
        let first = line_start && offset == 0;
        match c {
            '\\' | '`' | '*' | '[' | ']' => {
                out.push('\\');
                out.push(c);
            }
            '_' => {
                let previous = if position == 0 {
                    out.chars().last()
                } else {
                    Some(chars[position - 1].1)
                };
                let following = chars.get(position + 1).map(|&(_, c)| c).or(next_char);
                let intraword = previous.is_some_and(char::is_alphanumeric)
                    && following.is_some_and(char::is_alphanumeric);
                if !intraword {
                    out.push('\\');
                }
                out.push('_');
            }
            '<' => out.push_str("&lt;"),
            '&' if looks_like_entity(&line[offset..]) => out.push_str("&amp;"),
            '|' if cx.table => out.push_str("\\|"),
            '#' | '>' | '-' | '+' | '=' | '~' if first => {
                out.push('\\');
                out.push(c);
            }
            c => out.push(c),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frontmatter::Frontmatter;
    use crate::tree::TableCell;

    fn body(nodes: Vec<Node>) -> String {
        serialize_blocks(&nodes)
    }

    fn text(value: &str) -> Node {
        Node::text(value)
    }

    #[test]
    fn frontmatter_block_only_when_present() {
        let mut tree = Tree::new(vec![Node::paragraph(vec![text("Body")])]);
        assert_eq!(serialize(&tree), "Body\n");

        let mut frontmatter = Frontmatter::new();
        frontmatter.insert("title", "It's here");
        tree.frontmatter = frontmatter;
        assert_eq!(serialize(&tree), "---\ntitle: 'It''s here'\n---\n\nBody\n");
    }

    #[test]
    fn frontmatter_without_body() {
        let mut tree = Tree::default();
        tree.frontmatter.insert("title", "Hello World");
        assert_eq!(serialize(&tree), "---\ntitle: 'Hello World'\n---\n");
    }

    #[test]
    fn escapes_markdown_significant_text() {
        let out = body(vec![Node::paragraph(vec![text(
            "# not a heading *x* [y] a<b snake_case _lead 1. &amp; & ok",
        )])]);
        assert_eq!(
            out,
            "\\# not a heading \\*x\\* \\[y\\] a&lt;b snake_case \\_lead 1. &amp;amp; & ok\n"
        );
    }

    #[test]
    fn escapes_ordered_list_lookalike_at_line_start() {
        let out = body(vec![Node::paragraph(vec![text("2024. was a year\n- dash")])]);
        assert_eq!(out, "2024\\. was a year\n\\- dash\n");
    }

    #[test]
    fn renders_lists_with_marker_width_indent() {
        let list = Node::List {
            ordered: true,
            start: Some(9),
            items: vec![
                Node::ListItem {
                    children: vec![
                        Node::paragraph(vec![text("nine")]),
                        Node::List {
                            ordered: false,
                            start: None,
                            items: vec![Node::ListItem {
                                children: vec![Node::paragraph(vec![text("nested")])],
                            }],
                        },
                    ],
                },
                Node::ListItem {
                    children: vec![Node::paragraph(vec![text("ten")])],
                },
            ],
        };
        assert_eq!(body(vec![list]), "9. nine\n   - nested\n10. ten\n");
    }

    #[test]
    fn adjacent_lists_merge() {
        let item = |t: &str| Node::ListItem {
            children: vec![Node::paragraph(vec![text(t)])],
        };
        let nodes = vec![
            Node::List {
                ordered: false,
                start: None,
                items: vec![item("a")],
            },
            Node::List {
                ordered: false,
                start: None,
                items: vec![item("b")],
            },
        ];
        assert_eq!(body(nodes), "- a\n- b\n");
    }

    #[test]
    fn code_fence_outgrows_inner_backticks() {
        let out = body(vec![Node::CodeBlock {
            lang: Some("md".into()),
            text: "```\ninner\n```".into(),
        }]);
        assert_eq!(out, "````md\n```\ninner\n```\n````\n");
    }

    #[test]
    fn inline_code_and_links() {
        let out = body(vec![Node::paragraph(vec![
            Node::InlineCode {
                value: "a`b".into(),
            },
            text(" "),
            Node::Link {
                href: "/a b".into(),
                children: vec![text("x")],
            },
            text(" "),
            Node::Emphasis {
                children: vec![text(" still works ")],
            },
        ])]);
        assert_eq!(out, "``a`b`` [x](/a%20b)  *still works*\n");
    }

    #[test]
    fn table_pads_rows_and_escapes_pipes() {
        let cell = |t: &str| TableCell {
            children: vec![text(t)],
        };
        let out = body(vec![Node::Table {
            rows: vec![
                TableRow {
                    cells: vec![cell("a|b"), cell("c")],
                },
                TableRow {
                    cells: vec![TableCell {
                        children: vec![text("x"), Node::Break, text("y")],
                    }],
                },
            ],
            marker: None,
        }]);
        assert_eq!(out, "| a\\|b | c |\n| --- | --- |\n| x<br />y |  |\n");
    }

    #[test]
    fn component_with_and_without_children() {
        let out = body(vec![
            Node::Component {
                name: "Aside".into(),
                props: vec![
                    ("type".into(), "success".into()),
                    ("title".into(), "Say \"hi\"".into()),
                ],
                children: vec![Node::paragraph(vec![text("Body")])],
            },
            Node::Component {
                name: "Divider".into(),
                props: vec![],
                children: vec![],
            },
        ]);
        assert_eq!(
            out,
            "<Aside type=\"success\" title=\"Say &quot;hi&quot;\">\nBody\n</Aside>\n\n<Divider />\n"
        );
    }

    #[test]
    fn heading_and_paragraph_anchors() {
        let out = body(vec![
            Node::Heading {
                depth: 2,
                children: vec![text("Setup")],
                anchor: Some("setup".into()),
            },
            Node::Paragraph {
                children: vec![text("Body")],
                anchor: Some("p1".into()),
            },
        ]);
        assert_eq!(out, "## Setup <a id=\"setup\"></a>\n\n<a id=\"p1\"></a> Body\n");
    }

    #[test]
    fn char_refs_and_breaks() {
        let out = body(vec![Node::paragraph(vec![
            text("a "),
            Node::CharRef { ch: '{' },
            Node::Break,
            text("b"),
        ])]);
        assert_eq!(out, "a &#123;\\\nb\n");
    }

    #[test]
    fn adjacent_spans_render_as_one() {
        let out = body(vec![Node::paragraph(vec![
            Node::InlineCode {
                value: "--flag".into(),
            },
            Node::InlineCode {
                value: "=value".into(),
            },
            text(" "),
            Node::Strong {
                children: vec![text("a")],
            },
            Node::Strong {
                children: vec![text("b")],
            },
        ])]);
        assert_eq!(out, "`--flag=value` **ab**\n");
    }

    #[test]
    fn breaks_at_span_edges_are_dropped() {
        let out = body(vec![Node::paragraph(vec![
            Node::Emphasis {
                children: vec![text("note"), Node::Break],
            },
            text(" then "),
            Node::Element {
                name: "kbd".into(),
                attrs: Vec::new(),
                children: vec![Node::Break, text("Enter"), Node::Break],
            },
        ])]);
        assert_eq!(out, "*note* then <kbd>Enter</kbd>\n");
    }

    #[test]
    fn blockquote_prefixes_every_line() {
        let out = body(vec![Node::BlockQuote {
            children: vec![
                Node::paragraph(vec![text("one")]),
                Node::paragraph(vec![text("two")]),
            ],
        }]);
        assert_eq!(out, "> one\n>\n> two\n");
    }

    #[test]
    fn tidy_collapses_blank_lines_outside_fences() {
        assert_eq!(tidy("a\n\n\n\nb  \n```\n\n\n```"), "a\n\nb\n```\n\n\n```");
    }
}
