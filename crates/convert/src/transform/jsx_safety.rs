//! JSX-safety: tree-level escaping and a conservative text sanitizer.
//!
//! The tree pass turns braces in text into character references and drops
//! `style` attributes. [`sanitize_mdx_text`] then re-walks the serialized body
//! outside code: it rewrites autolinks, self-closes void elements, quotes
//! attribute values, strips comments and escapes whatever `<`, `{` or `}`
//! could still be read as JSX. Running it on its own output changes nothing.

use devmdx_core::code_fence::FenceTracker;
use devmdx_core::tag::{TagAttr, TagKind, is_custom_element, is_void_element, parse_tag_at};
use devmdx_core::tree::rewrite_nodes;
use devmdx_core::{Diagnostics, Node, SourceLocation, Tree};

use super::{Pass, PassContext};

/// Escapes braces in text nodes and removes style attributes.
#[derive(Debug, Default, Clone, Copy)]
pub struct JsxSafety;

impl Pass for JsxSafety {
    fn name(&self) -> &str {
        "jsx-safety"
    }

    fn run(&self, tree: Tree, _cx: &mut PassContext<'_>) -> Tree {
        let children = rewrite_nodes(tree.children, &mut |node| match node {
            Node::Text { value } => escape_braces(value),
            Node::Element {
                name,
                attrs,
                children,
            } => vec![Node::Element {
                name,
                attrs: without_style(attrs),
                children,
            }],
            Node::Component {
                name,
                props,
                children,
            } => vec![Node::Component {
                name,
                props: without_style(props),
                children,
            }],
            other => vec![other],
        });
        Tree {
            frontmatter: tree.frontmatter,
            children,
        }
    }
}

fn without_style(attrs: Vec<(String, String)>) -> Vec<(String, String)> {
    attrs
        .into_iter()
        .filter(|(name, _)| !name.eq_ignore_ascii_case("style"))
        .collect()
}

fn escape_braces(value: String) -> Vec<Node> {
    if !value.contains(['{', '}']) {
        return vec![Node::Text { value }];
    }
    let mut out = Vec::new();
    let mut buffer = String::new();
    for c in value.chars() {
        if c == '{' || c == '}' {
            if !buffer.is_empty() {
                out.push(Node::text(std::mem::take(&mut buffer)));
            }
            out.push(Node::CharRef { ch: c });
        } else {
            buffer.push(c);
        }
    }
    if !buffer.is_empty() {
        out.push(Node::text(buffer));
    }
    out
}

/// A tag written to the sanitized output.
#[derive(Debug)]
struct TagEvent {
    name: String,
    kind: TagKind,
    /// Byte offset of `<` in the output.
    offset: usize,
    /// Rendered length.
    len: usize,
    line: usize,
}

/// Makes serialized MDX body text safe for a JSX-aware parser.
///
/// Tags left unbalanced are escaped as text with a warning, except custom
/// elements and components, whose scope cannot be recovered: those raise a
/// fatal diagnostic.
pub fn sanitize_mdx_text(text: &str, diagnostics: &mut Diagnostics) -> String {
    let mut out = String::with_capacity(text.len());
    let mut fence = FenceTracker::new();
    let mut events = Vec::new();

    for (index, line) in text.split_inclusive('\n').enumerate() {
        let (content, newline) = match line.strip_suffix('\n') {
            Some(content) => (content, "\n"),
            None => (line, ""),
        };
        if fence.consume(fence_content(content)) {
            out.push_str(line);
            continue;
        }
        sanitize_line(content, index + 1, &mut out, &mut events);
        out.push_str(newline);
    }

    repair_unbalanced(out, &events, diagnostics)
}

/// Strips container prefixes (quote markers, list markers) so fences nested in
/// block quotes and list items are tracked.
fn fence_content(line: &str) -> &str {
    let mut rest = line;
    loop {
        let trimmed = rest.trim_start_matches([' ', '\t', '>']);
        let trimmed = match trimmed.as_bytes() {
            [b'-' | b'*' | b'+', b' ', ..] => &trimmed[2..],
            _ => {
                let digits = trimmed.bytes().take_while(u8::is_ascii_digit).count();
                match trimmed.as_bytes().get(digits..digits + 2) {
                    Some([b'.' | b')', b' ']) if digits > 0 => &trimmed[digits + 2..],
                    _ => trimmed,
                }
            }
        };
        if trimmed.len() == rest.len() {
            return rest;
        }
        rest = trimmed;
    }
}

fn sanitize_line(line: &str, line_no: usize, out: &mut String, events: &mut Vec<TagEvent>) {
    let mut i = 0;
    while let Some(c) = line[i..].chars().next() {
        match c {
            '\\' => {
                out.push('\\');
                i += 1;
                if let Some(next) = line[i..].chars().next() {
                    out.push(next);
                    i += next.len_utf8();
                }
            }
            '`' => {
                let run = line[i..].bytes().take_while(|&b| b == b'`').count();
                let end = match find_code_span_close(line, i + run, run) {
                    Some(close) => close + run,
                    None => i + run,
                };
                out.push_str(&line[i..end]);
                i = end;
            }
            '{' => {
                out.push_str("&#123;");
                i += 1;
            }
            '}' => {
                out.push_str("&#125;");
                i += 1;
            }
            '<' => i = sanitize_angle(line, i, line_no, out, events),
            c => {
                out.push(c);
                i += c.len_utf8();
            }
        }
    }
}

/// Finds a closing backtick run of exactly `run` characters at or after `from`.
fn find_code_span_close(line: &str, from: usize, run: usize) -> Option<usize> {
    let bytes = line.as_bytes();
    let mut i = from;
    while i < bytes.len() {
        if bytes[i] == b'`' {
            let len = bytes[i..].iter().take_while(|&&b| b == b'`').count();
            if len == run {
                return Some(i);
            }
            i += len;
        } else {
            i += 1;
        }
    }
    None
}

/// Handles a `<` at `i`, returning the offset to continue from.
fn sanitize_angle(
    line: &str,
    i: usize,
    line_no: usize,
    out: &mut String,
    events: &mut Vec<TagEvent>,
) -> usize {
    let rest = &line[i..];
    if rest.starts_with("<!--") {
        if let Some(end) = rest.find("-->") {
            return i + end + 3;
        }
        out.push_str("&lt;");
        return i + 1;
    }
    if let Some((len, label, target)) = autolink(rest) {
        out.push_str(&format!("[{}]({target})", escape_label(label)));
        return i + len;
    }
    if let Some(tag) = parse_tag_at(line, i) {
        let (rendered, kind) = render_tag(&tag.name, tag.kind, &tag.attrs);
        events.push(TagEvent {
            name: tag.name.clone(),
            kind,
            offset: out.len(),
            len: rendered.len(),
            line: line_no,
        });
        out.push_str(&rendered);
        return tag.end;
    }
    out.push_str("&lt;");
    i + 1
}

/// Recognizes `<scheme:...>` and `<user@host>` autolinks.
fn autolink(rest: &str) -> Option<(usize, &str, String)> {
    let end = rest.find('>')?;
    let inner = &rest[1..end];
    if inner.is_empty() || inner.contains(|c: char| c.is_whitespace() || c == '<') {
        return None;
    }
    if let Some((scheme, _)) = inner.split_once(':') {
        let valid = (2..=32).contains(&scheme.len())
            && scheme.starts_with(|c: char| c.is_ascii_alphabetic())
            && scheme
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'));
        return valid.then(|| (end + 1, inner, inner.to_string()));
    }
    let (local, domain) = inner.split_once('@')?;
    let valid = !local.is_empty()
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.');
    valid.then(|| (end + 1, inner, format!("mailto:{inner}")))
}

fn escape_label(label: &str) -> String {
    let mut out = String::with_capacity(label.len());
    for c in label.chars() {
        if matches!(c, '\\' | '*' | '_' | '[' | ']' | '`') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Renders a tag with quoted attributes, no `style`, void elements self-closed.
fn render_tag(name: &str, kind: TagKind, attrs: &[TagAttr]) -> (String, TagKind) {
    if kind == TagKind::Close {
        return (format!("</{name}>"), kind);
    }
    let mut rendered = format!("<{name}");
    for attr in attrs {
        if attr.name.eq_ignore_ascii_case("style") {
            continue;
        }
        rendered.push(' ');
        rendered.push_str(&attr.name);
        if let Some(value) = &attr.value {
            rendered.push_str("=\"");
            rendered.push_str(&value.replace('"', "&quot;"));
            rendered.push('"');
        }
    }
    if kind == TagKind::SelfClosing || is_void_element(name) {
        rendered.push_str(" />");
        (rendered, TagKind::SelfClosing)
    } else {
        rendered.push('>');
        (rendered, TagKind::Open)
    }
}

fn repair_unbalanced(mut out: String, events: &[TagEvent], diagnostics: &mut Diagnostics) -> String {
    let mut stack: Vec<usize> = Vec::new();
    let mut unmatched: Vec<usize> = Vec::new();
    for (index, event) in events.iter().enumerate() {
        match event.kind {
            TagKind::SelfClosing => {}
            TagKind::Open => stack.push(index),
            TagKind::Close => match stack.iter().rposition(|&open| events[open].name == event.name) {
                Some(position) => {
                    unmatched.extend(stack.drain(position + 1..));
                    stack.pop();
                }
                None => unmatched.push(index),
            },
        }
    }
    unmatched.extend(stack);
    unmatched.sort_by_key(|&index| std::cmp::Reverse(events[index].offset));

    for index in unmatched {
        let event = &events[index];
        let location = SourceLocation::new(event.line, 1);
        if is_custom_element(&event.name) {
            diagnostics.fatal_at(
                format!("unbalanced <{}> cannot be made JSX-safe", event.name),
                location,
            );
            continue;
        }
        let span = event.offset..event.offset + event.len;
        let escaped = out[span.clone()]
            .replacen('<', "&lt;", 1)
            .replace('{', "&#123;")
            .replace('}', "&#125;");
        out.replace_range(span, &escaped);
        diagnostics.warn_at(
            format!("unbalanced <{}> escaped as text", event.name),
            location,
        );
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sanitize(text: &str) -> (String, Diagnostics) {
        let mut diagnostics = Diagnostics::new("doc.mdx");
        let out = sanitize_mdx_text(text, &mut diagnostics);
        (out, diagnostics)
    }

    #[test]
    fn escapes_braces_outside_code() {
        let (out, _) = sanitize("Example {'cpu': 'ppc'} and `{kept}`\n\n```js\nconst a = {};\n```\n");
        assert_eq!(
            out,
            "Example &#123;'cpu': 'ppc'&#125; and `{kept}`\n\n```js\nconst a = {};\n```\n"
        );
    }

    #[test]
    fn fences_inside_list_items_are_skipped() {
        let text = "- item\n\n  ```\n  {x}\n  ```\n";
        assert_eq!(sanitize(text).0, text);
    }

    #[test]
    fn rewrites_autolinks() {
        let (out, _) = sanitize("See <https://example.com/a_b> or <team@example.com>.\n");
        assert_eq!(
            out,
            "See [https://example.com/a\\_b](https://example.com/a_b) or [team@example.com](mailto:team@example.com).\n"
        );
    }

    #[test]
    fn normalizes_tags() {
        let (out, diagnostics) =
            sanitize("a<br>b <img src=x.png alt='say \"hi\"'> <sup style=\"color:red\">1</sup>\n");
        assert!(diagnostics.is_empty());
        assert_eq!(
            out,
            "a<br />b <img src=\"x.png\" alt=\"say &quot;hi&quot;\" /> <sup>1</sup>\n"
        );
    }

    #[test]
    fn strips_comments_and_escapes_stray_angles() {
        let (out, _) = sanitize("a <!-- note --> b < c <3\n");
        assert_eq!(out, "a  b &lt; c &lt;3\n");
    }

    #[test]
    fn escapes_unbalanced_html_with_warning() {
        let (out, diagnostics) = sanitize("<div>\n\ntext </span>\n");
        assert_eq!(out, "&lt;div>\n\ntext &lt;/span>\n");
        assert_eq!(diagnostics.len(), 2);
        assert!(!diagnostics.has_fatal());
    }

    #[test]
    fn unbalanced_component_is_fatal() {
        let (_, diagnostics) = sanitize("<Aside type=\"note\">\n\nnever closed\n");
        assert!(diagnostics.has_fatal());
    }

    #[test]
    fn output_is_a_fixed_point() {
        let input = "x {y} <br> <https://a.example> <b>bold</b> <div> `<code>`\n";
        let (once, _) = sanitize(input);
        let (twice, _) = sanitize(&once);
        assert_eq!(once, twice);
    }

    #[test]
    fn tree_pass_turns_braces_into_char_refs() {
        assert_eq!(
            escape_braces("a{b}".to_string()),
            vec![
                Node::text("a"),
                Node::CharRef { ch: '{' },
                Node::text("b"),
                Node::CharRef { ch: '}' },
            ]
        );
    }
}
