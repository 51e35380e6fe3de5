//! CMS directive stripping, attribute annotations, frontmatter promotion and anchors.

use std::collections::BTreeMap;

use devmdx_core::slug::{AnchorRegistry, extract_custom_id, is_valid_id};
use devmdx_core::tree::{merge_text, plain_text, rewrite_nodes, trim_inline_edges};
use devmdx_core::{Diagnostics, Frontmatter, Node, Tree};

use super::{Pass, PassContext};

/// Descriptor files whose references are dropped from the metadata preamble.
const BOOKKEEPING_FILES: &[&str] = &["_project.yaml", "_book.yaml"];

/// Removes templating syntax and promotes the title block into frontmatter.
#[derive(Debug, Default, Clone, Copy)]
pub struct Directives;

impl Pass for Directives {
    fn name(&self) -> &str {
        "directives"
    }

    fn run(&self, tree: Tree, cx: &mut PassContext<'_>) -> Tree {
        let variables = &cx.config.variables;
        let children = rewrite_nodes(tree.children, &mut |node| {
            vec![strip_node(node, variables)]
        });
        let children = resolve_annotations(children);

        let mut frontmatter = tree.frontmatter;
        let mut children = extract_metadata(children, &mut frontmatter, cx.diagnostics);
        children = drop_empty_paragraphs(children);

        let mut registry = AnchorRegistry::new();
        dedupe_anchors(&mut children, &mut registry);

        Tree {
            frontmatter,
            children,
        }
    }
}

fn strip_node(mut node: Node, variables: &BTreeMap<String, String>) -> Node {
    match &mut node {
        Node::Table { rows, .. } => {
            for cell in rows.iter_mut().flat_map(|row| row.cells.iter_mut()) {
                cell.children = strip_inline(std::mem::take(&mut cell.children), variables);
            }
        }
        Node::Paragraph { children, .. }
        | Node::Heading { children, .. }
        | Node::Emphasis { children }
        | Node::Strong { children }
        | Node::Link { children, .. }
        | Node::Element { children, .. }
        | Node::Marker { children, .. } => {
            *children = strip_inline(std::mem::take(children), variables);
        }
        _ => {}
    }
    node
}

/// Removes directive spans and `[TOC]` markers from an inline run.
pub fn strip_inline(children: Vec<Node>, variables: &BTreeMap<String, String>) -> Vec<Node> {
    let mut nodes = strip_directive_spans(children, variables);
    for node in nodes.iter_mut() {
        if let Node::Text { value } = node
            && value.contains("[TOC]")
        {
            *value = squeeze_blank_lines(&value.replace("[TOC]", ""));
        }
    }
    nodes.retain(|n| !matches!(n, Node::Text { value } if value.is_empty()));
    nodes
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Shape {
    /// `{% ... %}`
    Statement,
    /// `{{ ... }}`
    Variable,
    /// `{# ... #}`
    Comment,
}

impl Shape {
    fn closer(self) -> &'static str {
        match self {
            Shape::Statement => "%}",
            Shape::Variable => "}}",
            Shape::Comment => "#}",
        }
    }

    fn replacement(self, inner: &str, variables: &BTreeMap<String, String>) -> String {
        match self {
            Shape::Variable => {
                let name = inner.split('|').next().unwrap_or("").trim();
                match variables.get(name) {
                    Some(value) => value.clone(),
                    None => {
                        log::debug!("dropping unresolved variable `{name}`");
                        String::new()
                    }
                }
            }
            Shape::Statement | Shape::Comment => String::new(),
        }
    }
}

/// Finds the next directive opener at or after `from`.
fn find_opener(value: &str, from: usize) -> Option<(usize, Shape)> {
    let bytes = value.as_bytes();
    let mut index = from;
    while let Some(offset) = value.get(index..)?.find('{') {
        let start = index + offset;
        let shape = match bytes.get(start + 1) {
            Some(b'%') => Some(Shape::Statement),
            Some(b'{') => Some(Shape::Variable),
            Some(b'#') if value[start + 2..].contains("#}") => Some(Shape::Comment),
            _ => None,
        };
        if let Some(shape) = shape {
            return Some((start, shape));
        }
        index = start + 1;
    }
    None
}

/// Strips `{% %}`, `{{ }}` and `{# #}` spans, including spans that inline
/// markup split across several siblings.
fn strip_directive_spans(children: Vec<Node>, variables: &BTreeMap<String, String>) -> Vec<Node> {
    let mut nodes = merge_text(children);
    let mut index = 0;
    let mut from = 0;

    while index < nodes.len() {
        let value = match &nodes[index] {
            Node::Text { value } => value.clone(),
            _ => {
                index += 1;
                from = 0;
                continue;
            }
        };
        let Some((start, shape)) = find_opener(&value, from) else {
            index += 1;
            from = 0;
            continue;
        };
        let closer = shape.closer();

        if let Some(offset) = value[start + 2..].find(closer) {
            let end = start + 2 + offset + closer.len();
            let replacement = shape.replacement(&value[start + 2..end - closer.len()], variables);
            let mut rewritten = value[..start].to_string();
            rewritten.push_str(&replacement);
            from = rewritten.len();
            rewritten.push_str(&value[end..]);
            nodes[index] = Node::text(squeeze_blank_lines(&rewritten));
            from = from.min(text_len(&nodes[index]));
            continue;
        }

        let crossing = match shape {
            Shape::Comment => None,
            _ => find_closer_after(&nodes, index + 1, closer),
        };
        match crossing {
            Some((last, offset)) => {
                let mut inner = value[start + 2..].to_string();
                inner.push_str(&plain_text(&nodes[index + 1..last]));
                let tail = match &nodes[last] {
                    Node::Text { value } => value.clone(),
                    _ => String::new(),
                };
                inner.push_str(&tail[..offset]);
                let mut rewritten = value[..start].to_string();
                rewritten.push_str(&shape.replacement(&inner, variables));
                from = rewritten.len();
                rewritten.push_str(&tail[offset + closer.len()..]);
                nodes.splice(index..=last, [Node::text(squeeze_blank_lines(&rewritten))]);
                from = from.min(text_len(&nodes[index]));
            }
            None => from = start + 2,
        }
    }

    nodes.retain(|n| !matches!(n, Node::Text { value } if value.is_empty()));
    nodes
}

fn text_len(node: &Node) -> usize {
    match node {
        Node::Text { value } => value.len(),
        _ => 0,
    }
}

fn find_closer_after(nodes: &[Node], from: usize, closer: &str) -> Option<(usize, usize)> {
    for (index, node) in nodes.iter().enumerate().skip(from) {
        match node {
            Node::Text { value } => {
                if let Some(offset) = value.find(closer) {
                    return Some((index, offset));
                }
            }
            other if other.is_block() => return None,
            _ => {}
        }
    }
    None
}

/// Drops interior lines left blank by a removal so the paragraph stays one block.
fn squeeze_blank_lines(value: &str) -> String {
    let pieces: Vec<&str> = value.split('\n').collect();
    let last = pieces.len().saturating_sub(1);
    pieces
        .iter()
        .enumerate()
        .filter(|(index, piece)| *index == 0 || *index == last || !piece.trim().is_empty())
        .map(|(_, piece)| *piece)
        .collect::<Vec<_>>()
        .join("\n")
}

/// Removes `{: ...}` spans from top-level text, returning the ids they carried.
fn take_annotations(children: &mut Vec<Node>) -> (Vec<String>, bool) {
    let mut ids = Vec::new();
    let mut removed = false;
    for node in children.iter_mut() {
        if let Node::Text { value } = node
            && value.contains("{:")
        {
            let (rest, found) = remove_annotations(value, &mut ids);
            if found {
                removed = true;
                *value = rest;
            }
        }
    }
    children.retain(|n| !matches!(n, Node::Text { value } if value.is_empty()));
    (ids, removed)
}

fn remove_annotations(value: &str, ids: &mut Vec<String>) -> (String, bool) {
    let mut out = String::with_capacity(value.len());
    let mut rest = value;
    let mut found = false;
    while let Some(start) = rest.find("{:") {
        let Some(len) = rest[start..].find('}') else {
            break;
        };
        out.push_str(&rest[..start]);
        for token in rest[start + 2..start + len].split_whitespace() {
            let id = token
                .strip_prefix('#')
                .or_else(|| token.strip_prefix("id="))
                .map(|id| id.trim_matches(|c| c == '"' || c == '\''));
            if let Some(id) = id
                && is_valid_id(id)
            {
                ids.push(id.to_string());
            }
        }
        rest = &rest[start + len + 1..];
        found = true;
    }
    out.push_str(rest);
    (squeeze_blank_lines(&out), found)
}

/// Strips a trailing `{#id}` from the last text child of a heading.
fn take_custom_id(children: &mut [Node]) -> Option<String> {
    let Some(Node::Text { value }) = children.last_mut() else {
        return None;
    };
    let (text, id) = extract_custom_id(value);
    let id = id?.to_string();
    let text = text.to_string();
    *value = text;
    Some(id)
}

/// Moves an inline `Anchor` into the block's anchor slot.
fn lift_anchor(children: &mut Vec<Node>, anywhere: bool) -> Option<String> {
    let position = if anywhere {
        children.iter().position(|n| matches!(n, Node::Anchor { .. }))
    } else {
        children
            .iter()
            .position(|n| !n.is_blank_text())
            .filter(|&i| matches!(children[i], Node::Anchor { .. }))
    }?;
    match children.remove(position) {
        Node::Anchor { id } => Some(id),
        _ => None,
    }
}

fn is_empty_inline(children: &[Node]) -> bool {
    children.iter().all(Node::is_blank_text)
}

fn resolve_annotations(nodes: Vec<Node>) -> Vec<Node> {
    let mut out: Vec<Node> = Vec::with_capacity(nodes.len());
    for node in nodes {
        match node {
            Node::Heading {
                depth,
                mut children,
                anchor,
            } => {
                let (mut ids, _) = take_annotations(&mut children);
                if let Some(id) = take_custom_id(&mut children) {
                    ids.push(id);
                }
                let mut anchor = anchor.or_else(|| ids.into_iter().next());
                if anchor.is_none() {
                    anchor = lift_anchor(&mut children, true);
                }
                let after_empty_anchor = matches!(
                    out.last(),
                    Some(Node::Paragraph { children: previous, anchor: Some(_) })
                        if is_empty_inline(previous)
                );
                if anchor.is_none()
                    && after_empty_anchor
                    && let Some(Node::Paragraph { anchor: moved, .. }) = out.pop()
                {
                    anchor = moved;
                }
                trim_inline_edges(&mut children);
                out.push(Node::Heading {
                    depth,
                    children,
                    anchor,
                });
            }
            Node::Paragraph {
                mut children,
                anchor,
            } => {
                let (ids, removed) = take_annotations(&mut children);
                trim_inline_edges(&mut children);
                if removed && children.is_empty() && anchor.is_none() {
                    if let Some(id) = ids.into_iter().next() {
                        attach_to_previous(&mut out, id);
                    }
                    continue;
                }
                let mut anchor = anchor.or_else(|| ids.into_iter().next());
                if anchor.is_none() {
                    anchor = lift_anchor(&mut children, false);
                    trim_inline_edges(&mut children);
                }
                out.push(Node::Paragraph { children, anchor });
            }
            Node::List {
                ordered,
                start,
                items,
            } => out.push(Node::List {
                ordered,
                start,
                items: resolve_annotations(items),
            }),
            Node::ListItem { children } => out.push(Node::ListItem {
                children: resolve_annotations(children),
            }),
            Node::BlockQuote { children } => out.push(Node::BlockQuote {
                children: resolve_annotations(children),
            }),
            Node::Component {
                name,
                props,
                children,
            } => out.push(Node::Component {
                name,
                props,
                children: resolve_annotations(children),
            }),
            other => out.push(other),
        }
    }
    out
}

/// Gives a standalone annotation's id to the preceding block.
fn attach_to_previous(out: &mut Vec<Node>, id: String) {
    let attached = match out.last_mut() {
        Some(Node::Heading { anchor, .. } | Node::Paragraph { anchor, .. }) if anchor.is_none() => {
            *anchor = Some(id.clone());
            true
        }
        _ => false,
    };
    if !attached {
        out.push(Node::Paragraph {
            children: Vec::new(),
            anchor: Some(id),
        });
    }
}

fn is_bookkeeping_line(line: &str) -> bool {
    let line = line.trim();
    BOOKKEEPING_FILES.iter().any(|file| line.contains(file))
        || ["Project:", "Book:"].iter().any(|label| {
            line.strip_prefix(label)
                .is_some_and(|rest| rest.trim_start().starts_with('/'))
        })
}

/// Splits an inline run at newlines and hard breaks; a break stays on its line.
fn split_inline_lines(children: Vec<Node>) -> Vec<Vec<Node>> {
    let mut lines = vec![Vec::new()];
    for node in children {
        match node {
            Node::Text { value } if value.contains('\n') => {
                let mut pieces = value.split('\n');
                if let Some(first) = pieces.next()
                    && let Some(line) = lines.last_mut()
                {
                    line.push(Node::text(first));
                }
                for piece in pieces {
                    lines.push(vec![Node::text(piece)]);
                }
            }
            Node::Break => {
                if let Some(line) = lines.last_mut() {
                    line.push(Node::Break);
                }
                lines.push(Vec::new());
            }
            other => {
                if let Some(line) = lines.last_mut() {
                    line.push(other);
                }
            }
        }
    }
    lines
}

/// Removes lines pointing at CMS bookkeeping files from the paragraphs ahead
/// of the first heading, leaving the rest of each paragraph in place.
fn drop_bookkeeping_lines(children: Vec<Node>) -> Vec<Node> {
    let first_heading = children
        .iter()
        .position(|n| matches!(n, Node::Heading { .. }))
        .unwrap_or(children.len());
    children
        .into_iter()
        .enumerate()
        .map(|(index, node)| match node {
            Node::Paragraph { children, anchor }
                if index < first_heading
                    && plain_text(&children).lines().any(is_bookkeeping_line) =>
            {
                let mut kept = Vec::new();
                for line in split_inline_lines(children) {
                    if is_bookkeeping_line(&plain_text(&line)) {
                        continue;
                    }
                    if !kept.is_empty() && !matches!(kept.last(), Some(Node::Break)) {
                        kept.push(Node::text("\n"));
                    }
                    kept.extend(line);
                }
                let mut kept = merge_text(kept);
                trim_inline_edges(&mut kept);
                log::debug!("dropped bookkeeping lines from the preamble");
                Node::Paragraph {
                    children: kept,
                    anchor,
                }
            }
            other => other,
        })
        .collect()
}

/// Parses a paragraph made only of `key: value` lines.
///
/// Returns `None` when any line does not match.
fn key_value_lines(text: &str) -> Option<Vec<(String, String)>> {
    let mut pairs = Vec::new();
    for line in text.lines().map(str::trim).filter(|l| !l.is_empty()) {
        let (key, value) = line.split_once(':')?;
        let mut chars = key.chars();
        let valid_key = chars
            .next()
            .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
            && chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
        if !valid_key || !(value.is_empty() || value.starts_with([' ', '\t'])) {
            return None;
        }
        pairs.push((key.to_string(), value.trim().to_string()));
    }
    Some(pairs)
}

fn extract_metadata(
    children: Vec<Node>,
    frontmatter: &mut Frontmatter,
    diagnostics: &mut Diagnostics,
) -> Vec<Node> {
    let children = drop_bookkeeping_lines(children);
    let h1 = children
        .iter()
        .position(|n| matches!(n, Node::Heading { depth: 1, .. }));
    let Some(h1) = h1 else {
        return children;
    };

    let mut out = Vec::with_capacity(children.len());
    for (index, node) in children.into_iter().enumerate() {
        if index < h1
            && let Node::Paragraph {
                children: inline,
                anchor: None,
            } = &node
            && let Some(pairs) = key_value_lines(&plain_text(inline))
        {
            for (key, value) in pairs {
                if let Some(previous) = frontmatter.insert(key.as_str(), value.as_str())
                    && previous != value
                {
                    diagnostics.warn(format!(
                        "frontmatter key `{key}` set more than once; last value wins"
                    ));
                }
            }
            continue;
        }

        if index == h1
            && let Node::Heading { children, .. } = &node
        {
            let title = plain_text(children).trim().to_string();
            let existing = frontmatter.get("title").map(str::to_string);
            match existing {
                Some(existing) if existing.trim().to_lowercase() == title.to_lowercase() => {
                    continue;
                }
                Some(_) => {}
                None if title.is_empty() => {}
                None => {
                    frontmatter.insert("title", title);
                    continue;
                }
            }
        }
        out.push(node);
    }
    log::debug!("frontmatter now has {} keys", frontmatter.len());
    out
}

fn drop_empty_paragraphs(nodes: Vec<Node>) -> Vec<Node> {
    nodes
        .into_iter()
        .filter_map(|node| match node {
            Node::Paragraph {
                ref children,
                anchor: None,
            } if is_empty_inline(children) => None,
            Node::List {
                ordered,
                start,
                items,
            } => Some(Node::List {
                ordered,
                start,
                items: drop_empty_paragraphs(items),
            }),
            Node::ListItem { children } => Some(Node::ListItem {
                children: drop_empty_paragraphs(children),
            }),
            Node::BlockQuote { children } => Some(Node::BlockQuote {
                children: drop_empty_paragraphs(children),
            }),
            Node::Component {
                name,
                props,
                children,
            } => Some(Node::Component {
                name,
                props,
                children: drop_empty_paragraphs(children),
            }),
            other => Some(other),
        })
        .collect()
}

fn dedupe_anchors(nodes: &mut [Node], registry: &mut AnchorRegistry) {
    for node in nodes.iter_mut() {
        match node {
            Node::Heading {
                anchor: Some(id), ..
            }
            | Node::Paragraph {
                anchor: Some(id), ..
            }
            | Node::Anchor { id } => {
                let claimed = registry.claim(id);
                if claimed != *id {
                    log::debug!("anchor `{id}` renamed to `{claimed}`");
                    *id = claimed;
                }
            }
            Node::Table { rows, .. } => {
                for cell in rows.iter_mut().flat_map(|row| row.cells.iter_mut()) {
                    dedupe_anchors(&mut cell.children, registry);
                }
            }
            _ => {}
        }
        if let Some(children) = node.children_mut() {
            dedupe_anchors(children, registry);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConvertConfig;
    use devmdx_core::{NormalizeOptions, normalize, parse_document};

    fn run_with(source: &str, config: &ConvertConfig) -> (Tree, Diagnostics) {
        let mut diagnostics = Diagnostics::new("doc.md");
        let tree = parse_document(source, &mut diagnostics);
        let tree = normalize(tree, &NormalizeOptions::default(), &mut diagnostics);
        let mut cx = PassContext {
            config,
            diagnostics: &mut diagnostics,
        };
        let tree = Directives.run(tree, &mut cx);
        (tree, diagnostics)
    }

    fn run(source: &str) -> Tree {
        run_with(source, &ConvertConfig::default()).0
    }

    fn text(value: &str) -> Node {
        Node::text(value)
    }

    #[test]
    fn strips_statements_and_resolves_variables() {
        let mut config = ConvertConfig::default();
        config
            .variables
            .insert("product".to_string(), "Widgets".to_string());
        let (tree, _) = run_with(
            "{% include \"shared/banner.html\" %}\n\nUse {{ product }} and {{ missing }} today.\n",
            &config,
        );
        assert_eq!(
            tree.children,
            vec![Node::paragraph(vec![text("Use Widgets and  today.")])]
        );
    }

    #[test]
    fn strips_span_split_by_inline_markup() {
        let nodes = vec![
            text("before {% include \"a"),
            Node::Emphasis {
                children: vec![text("shared")],
            },
            text("b.md\" %} after"),
        ];
        let stripped = strip_inline(nodes, &BTreeMap::new());
        assert_eq!(stripped, vec![text("before  after")]);
    }

    #[test]
    fn strips_lines_inside_a_paragraph() {
        let tree = run("First line\n{% if x %}\nSecond line\n{% endif %}\n");
        assert_eq!(
            tree.children,
            vec![Node::paragraph(vec![text("First line\nSecond line")])]
        );
    }

    #[test]
    fn drops_toc_and_comments() {
        let tree = run("[TOC]\n\n{# wf_updated_on: 2020-01-01 #}\n\nBody\n");
        assert_eq!(tree.children, vec![Node::paragraph(vec![text("Body")])]);
    }

    #[test]
    fn heading_annotations_become_anchors() {
        let tree = run("## Setup {: #setup-steps .hide-from-toc }\n\n## Build {#build}\n");
        assert_eq!(
            tree.children,
            vec![
                Node::Heading {
                    depth: 2,
                    children: vec![text("Setup")],
                    anchor: Some("setup-steps".into()),
                },
                Node::Heading {
                    depth: 2,
                    children: vec![text("Build")],
                    anchor: Some("build".into()),
                },
            ]
        );
    }

    #[test]
    fn trailing_annotation_line_applies_to_its_paragraph() {
        let tree = run("Some text.\n{: .note #intro }\n\n{: .wide }\n");
        assert_eq!(
            tree.children,
            vec![Node::Paragraph {
                children: vec![text("Some text.")],
                anchor: Some("intro".into()),
            }]
        );
    }

    #[test]
    fn standalone_annotation_applies_to_previous_block() {
        let tree = run("Intro.\n\n{: #intro }\n");
        assert_eq!(
            tree.children,
            vec![Node::Paragraph {
                children: vec![text("Intro.")],
                anchor: Some("intro".into()),
            }]
        );
    }

    #[test]
    fn promotes_preamble_and_title() {
        let (tree, diagnostics) = run_with(
            "project_path: /_project.yaml\nbook_path: /_book.yaml\ndescription: First.\ndescription: Second.\n\n# Hello World {: .page-title }\n\nBody\n",
            &ConvertConfig::default(),
        );
        let entries: Vec<_> = tree.frontmatter.iter().collect();
        assert_eq!(
            entries,
            vec![("description", "Second."), ("title", "Hello World")]
        );
        assert_eq!(tree.children, vec![Node::paragraph(vec![text("Body")])]);
        assert_eq!(diagnostics.len(), 1);
    }

    #[test]
    fn bookkeeping_lines_dropped_without_h1() {
        let tree = run("Project: /docs/_project.yaml\nBook: /docs/_book.yaml\n\nBody\n");
        assert!(tree.frontmatter.is_empty());
        assert_eq!(tree.children, vec![Node::paragraph(vec![text("Body")])]);
    }

    #[test]
    fn bookkeeping_lines_dropped_from_prose() {
        let tree = run("Project: /docs/_project.yaml\nSee *this* page.\n\n# Title\n\nBody\n");
        assert_eq!(tree.frontmatter.get("title"), Some("Title"));
        assert_eq!(
            tree.children,
            vec![
                Node::paragraph(vec![
                    text("See "),
                    Node::Emphasis {
                        children: vec![text("this")],
                    },
                    text(" page."),
                ]),
                Node::paragraph(vec![text("Body")]),
            ]
        );
    }

    #[test]
    fn without_h1_nothing_is_collected() {
        let tree = run("note: keep me\n\n## Section\n");
        assert!(tree.frontmatter.is_empty());
        assert_eq!(tree.children.len(), 2);
    }

    #[test]
    fn existing_title_keeps_a_different_h1() {
        let tree = run("---\ntitle: Guide\n---\n\n# Other Heading\n\nBody\n");
        assert_eq!(tree.frontmatter.get("title"), Some("Guide"));
        assert!(matches!(tree.children[0], Node::Heading { depth: 1, .. }));

        let tree = run("---\ntitle: Guide\n---\n\n# guide\n\nBody\n");
        assert_eq!(tree.children, vec![Node::paragraph(vec![text("Body")])]);
    }

    #[test]
    fn named_anchor_moves_onto_following_heading() {
        let tree = run("<a name=\"details\"></a>\n## Details\n");
        assert_eq!(
            tree.children,
            vec![Node::Heading {
                depth: 2,
                children: vec![text("Details")],
                anchor: Some("details".into()),
            }]
        );
    }

    #[test]
    fn duplicate_anchors_get_suffixes() {
        let tree = run("## A {: #dup }\n\n## B {: #dup }\n\n## C {: #dup }\n");
        let anchors: Vec<_> = tree
            .children
            .iter()
            .filter_map(|n| match n {
                Node::Heading { anchor, .. } => anchor.clone(),
                _ => None,
            })
            .collect();
        assert_eq!(anchors, vec!["dup", "dup-2", "dup-3"]);
    }
}
