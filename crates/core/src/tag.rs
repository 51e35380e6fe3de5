//! Hand-rolled scanner for single HTML/JSX tags.
//!
//! The scanner works on raw text so that block masking and the final
//! text sanitizer can reason about tags without building a DOM.

/// Shape of a scanned tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagKind {
    /// `<name ...>`
    Open,
    /// `</name>`
    Close,
    /// `<name ... />`
    SelfClosing,
}

/// One attribute as written in the source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagAttr {
    /// Attribute name as written.
    pub name: String,
    /// Raw (undecoded) value, if any.
    pub value: Option<String>,
    /// Quote character used around the value, if any.
    pub quote: Option<char>,
}

/// A tag located in some input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tag {
    /// Tag name with original casing.
    pub name: String,
    /// Open, close or self-closing.
    pub kind: TagKind,
    /// Attributes in source order (empty for close tags).
    pub attrs: Vec<TagAttr>,
    /// Byte offset of `<`.
    pub start: usize,
    /// Byte offset just after `>`.
    pub end: usize,
}

impl Tag {
    /// Lowercased tag name.
    pub fn lower_name(&self) -> String {
        self.name.to_ascii_lowercase()
    }

    /// Looks up an attribute value by case-insensitive name.
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|a| a.name.eq_ignore_ascii_case(name))
            .and_then(|a| a.value.as_deref())
    }

    /// Whether the tag names a custom component or custom element.
    pub fn is_custom(&self) -> bool {
        is_custom_element(&self.name)
    }
}

const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param", "source",
    "track", "wbr",
];

/// Elements whose content is not scanned for nested tags.
const RAW_TEXT_ELEMENTS: &[&str] = &["pre", "script", "style", "textarea"];

/// Names that open an HTML block on their own line.
const BLOCK_ELEMENTS: &[&str] = &[
    "address", "article", "aside", "blockquote", "center", "details", "dialog", "dd", "div", "dl",
    "dt", "figcaption", "figure", "footer", "form", "h1", "h2", "h3", "h4", "h5", "h6", "header",
    "iframe", "main", "nav", "ol", "p", "pre", "script", "section", "style", "summary", "table",
    "tbody", "td", "tfoot", "th", "thead", "tr", "ul", "video",
];

/// Whether `name` is an HTML void element (case-insensitive).
pub fn is_void_element(name: &str) -> bool {
    VOID_ELEMENTS.iter().any(|v| v.eq_ignore_ascii_case(name))
}

/// Whether `name` is a block-level HTML element (case-insensitive).
pub fn is_block_element(name: &str) -> bool {
    BLOCK_ELEMENTS.iter().any(|v| v.eq_ignore_ascii_case(name))
}

/// Whether `name` is a raw-text element whose body is never scanned.
pub fn is_raw_text_element(name: &str) -> bool {
    RAW_TEXT_ELEMENTS.iter().any(|v| v.eq_ignore_ascii_case(name))
}

/// Custom elements carry a hyphen; components start with an uppercase letter.
pub fn is_custom_element(name: &str) -> bool {
    name.contains('-') || name.chars().next().is_some_and(|c| c.is_ascii_uppercase())
}

/// Whether `name` starts with an uppercase letter (a component).
pub fn is_component_name(name: &str) -> bool {
    name.chars().next().is_some_and(|c| c.is_ascii_uppercase())
}

fn is_name_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | ':' | '.')
}

fn is_attr_name_char(c: char) -> bool {
    !c.is_whitespace() && !matches!(c, '/' | '>' | '=' | '"' | '\'' | '<' | '{' | '}')
}

/// Scans a single tag starting at byte offset `start` (which must hold `<`).
///
/// Returns `None` when the text at `start` is not a well-formed tag.
pub fn parse_tag_at(input: &str, start: usize) -> Option<Tag> {
    let rest = input.get(start..)?;
    let mut chars = rest.char_indices().peekable();
    if chars.next()?.1 != '<' {
        return None;
    }

    let closing = matches!(chars.peek(), Some((_, '/')));
    if closing {
        chars.next();
    }

    let (name_start, first) = *chars.peek()?;
    if !first.is_ascii_alphabetic() {
        return None;
    }
    let mut name_end = name_start;
    while let Some(&(i, c)) = chars.peek() {
        if is_name_char(c) {
            name_end = i + c.len_utf8();
            chars.next();
        } else {
            break;
        }
    }
    let name = rest[name_start..name_end].to_string();

    if closing {
        skip_whitespace(&mut chars);
        let (i, c) = chars.next()?;
        if c != '>' {
            return None;
        }
        return Some(Tag {
            name,
            kind: TagKind::Close,
            attrs: Vec::new(),
            start,
            end: start + i + 1,
        });
    }

    let mut attrs = Vec::new();
    loop {
        let had_space = skip_whitespace(&mut chars);
        let (i, c) = *chars.peek()?;
        match c {
            '>' => {
                return Some(Tag {
                    name,
                    kind: TagKind::Open,
                    attrs,
                    start,
                    end: start + i + 1,
                });
            }
            '/' => {
                chars.next();
                let (j, next) = chars.next()?;
                if next != '>' {
                    return None;
                }
                return Some(Tag {
                    name,
                    kind: TagKind::SelfClosing,
                    attrs,
                    start,
                    end: start + j + 1,
                });
            }
            c if is_attr_name_char(c) => {
                if !had_space {
                    return None;
                }
                let attr_start = i;
                let mut attr_end = i;
                while let Some(&(k, c)) = chars.peek() {
                    if is_attr_name_char(c) {
                        attr_end = k + c.len_utf8();
                        chars.next();
                    } else {
                        break;
                    }
                }
                let attr_name = rest[attr_start..attr_end].to_string();

                // Peek past whitespace for `=` without consuming a following attribute.
                let mut lookahead = chars.clone();
                skip_whitespace(&mut lookahead);
                if matches!(lookahead.peek(), Some((_, '='))) {
                    lookahead.next();
                    skip_whitespace(&mut lookahead);
                    chars = lookahead;
                    let (value, quote) = scan_value(rest, &mut chars)?;
                    attrs.push(TagAttr {
                        name: attr_name,
                        value: Some(value),
                        quote,
                    });
                } else {
                    attrs.push(TagAttr {
                        name: attr_name,
                        value: None,
                        quote: None,
                    });
                }
            }
            _ => return None,
        }
    }
}

type CharIter<'a> = std::iter::Peekable<std::str::CharIndices<'a>>;

fn skip_whitespace(chars: &mut CharIter<'_>) -> bool {
    let mut skipped = false;
    while let Some(&(_, c)) = chars.peek() {
        if c.is_whitespace() {
            skipped = true;
            chars.next();
        } else {
            break;
        }
    }
    skipped
}

fn scan_value(rest: &str, chars: &mut CharIter<'_>) -> Option<(String, Option<char>)> {
    let (i, c) = *chars.peek()?;
    if c == '"' || c == '\'' {
        chars.next();
        let value_start = i + 1;
        for (k, next) in chars.by_ref() {
            if next == c {
                return Some((rest[value_start..k].to_string(), Some(c)));
            }
        }
        return None;
    }

    let value_start = i;
    let mut value_end = i;
    while let Some(&(k, next)) = chars.peek() {
        if next.is_whitespace() || next == '>' || next == '<' || next == '"' || next == '\'' {
            break;
        }
        // `/>` ends a self-closing tag; a lone `/` belongs to the value (paths).
        if next == '/' {
            let mut lookahead = chars.clone();
            lookahead.next();
            if matches!(lookahead.peek(), Some((_, '>'))) {
                break;
            }
        }
        value_end = k + next.len_utf8();
        chars.next();
    }
    if value_end == value_start {
        return None;
    }
    Some((rest[value_start..value_end].to_string(), None))
}

/// Finds the close tag matching `open` and returns `(close_start, close_end)`.
///
/// Nested tags of the same name are counted. Raw-text elements search for
/// the literal close tag only.
pub fn find_matching_close(input: &str, open: &Tag) -> Option<(usize, usize)> {
    let matches_name = |name: &str| {
        if is_component_name(&open.name) {
            name == open.name
        } else {
            name.eq_ignore_ascii_case(&open.name)
        }
    };

    if is_raw_text_element(&open.name) {
        let needle = format!("</{}", open.name.to_ascii_lowercase());
        let lower = input.to_ascii_lowercase();
        let mut from = open.end;
        while let Some(rel) = lower.get(from..)?.find(&needle) {
            let at = from + rel;
            if let Some(tag) = parse_tag_at(input, at)
                && tag.kind == TagKind::Close
                && matches_name(&tag.name)
            {
                return Some((tag.start, tag.end));
            }
            from = at + needle.len();
        }
        return None;
    }

    let mut depth = 1usize;
    let mut cursor = open.end;
    while let Some(rel) = input.get(cursor..)?.find('<') {
        let at = cursor + rel;
        if input[at..].starts_with("<!--") {
            cursor = match input[at..].find("-->") {
                Some(end) => at + end + 3,
                None => return None,
            };
            continue;
        }
        match parse_tag_at(input, at) {
            Some(tag) if matches_name(&tag.name) => {
                match tag.kind {
                    TagKind::Open => depth += 1,
                    TagKind::Close => {
                        depth -= 1;
                        if depth == 0 {
                            return Some((tag.start, tag.end));
                        }
                    }
                    TagKind::SelfClosing => {}
                }
                cursor = tag.end;
            }
            Some(tag) => cursor = tag.end,
            None => cursor = at + 1,
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tag(input: &str) -> Tag {
        parse_tag_at(input, 0).expect("tag should parse")
    }

    #[test]
    fn parses_open_tag_with_mixed_attributes() {
        let t = tag(r#"<td class=nav colspan="2" hidden data-x='a b'>rest"#);
        assert_eq!(t.name, "td");
        assert_eq!(t.kind, TagKind::Open);
        assert_eq!(t.attr("class"), Some("nav"));
        assert_eq!(t.attr("colspan"), Some("2"));
        assert_eq!(t.attr("data-x"), Some("a b"));
        assert_eq!(t.attrs[2].value, None);
        assert_eq!(t.attrs[0].quote, None);
        assert_eq!(&r#"<td class=nav colspan="2" hidden data-x='a b'>rest"#[t.end..], "rest");
    }

    #[test]
    fn parses_close_and_self_closing() {
        assert_eq!(tag("</Aside >").kind, TagKind::Close);
        let t = tag(r#"<img src="/a.png"/>"#);
        assert_eq!(t.kind, TagKind::SelfClosing);
        assert_eq!(t.attr("src"), Some("/a.png"));
    }

    #[test]
    fn unquoted_path_value_keeps_slashes() {
        let t = tag("<a href=/docs/setup>");
        assert_eq!(t.attr("href"), Some("/docs/setup"));
        assert_eq!(t.kind, TagKind::Open);
    }

    #[test]
    fn rejects_non_tags() {
        assert!(parse_tag_at("< b", 0).is_none());
        assert!(parse_tag_at("<3 love", 0).is_none());
        assert!(parse_tag_at("<a href=\"x", 0).is_none());
        assert!(parse_tag_at("<!-- c -->", 0).is_none());
    }

    #[test]
    fn matching_close_counts_nesting() {
        let input = "<div><div>x</div></div>tail";
        let open = tag(input);
        let (start, end) = find_matching_close(input, &open).unwrap();
        assert_eq!(&input[start..end], "</div>");
        assert_eq!(&input[end..], "tail");
    }

    #[test]
    fn matching_close_is_case_sensitive_for_components() {
        let input = "<Tabs>\n<tabs></tabs>\n</Tabs>";
        let open = tag(input);
        let (start, _) = find_matching_close(input, &open).unwrap();
        assert_eq!(start, input.rfind("</Tabs>").unwrap());
    }

    #[test]
    fn pre_body_is_not_scanned() {
        let input = "<pre><div></pre>";
        let open = tag(input);
        let (start, _) = find_matching_close(input, &open).unwrap();
        assert_eq!(start, 10);
    }

    #[test]
    fn missing_close_returns_none() {
        let input = "<devsite-selector>\nbody";
        assert!(find_matching_close(input, &tag(input)).is_none());
    }

    #[test]
    fn element_classification() {
        assert!(is_void_element("BR"));
        assert!(is_custom_element("devsite-selector"));
        assert!(is_custom_element("Aside"));
        assert!(!is_custom_element("table"));
        assert!(is_block_element("table"));
    }
}
