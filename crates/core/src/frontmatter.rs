use serde::Serialize;
use serde::ser::{SerializeMap, Serializer};
use thiserror::Error;

/// Ordered metadata record emitted ahead of the body.
///
/// Keys keep their first insertion position; re-inserting a key overwrites
/// its value in place (last write wins).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Frontmatter {
    entries: Vec<(String, String)>,
}

impl Frontmatter {
    /// Creates an empty record.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or overwrites a key, returning the previous value.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) -> Option<String> {
        let key = key.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some((_, existing)) => Some(std::mem::replace(existing, value)),
            None => {
                self.entries.push((key, value));
                None
            }
        }
    }

    /// Looks up a value.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Whether the record has no keys.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of keys.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Iterates over entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Renders the record as YAML lines (`key: 'value'`), without fences.
    pub fn render(&self) -> String {
        let mut out = String::new();
        for (key, value) in &self.entries {
            out.push_str(key);
            out.push_str(": ");
            out.push_str(&quote_scalar(value));
            out.push('\n');
        }
        out
    }
}

impl Serialize for Frontmatter {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (key, value) in &self.entries {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

/// Single-quotes a YAML scalar; embedded quotes are doubled and line breaks folded.
pub fn quote_scalar(value: &str) -> String {
    let folded: String = value
        .split(['\r', '\n'])
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ");
    format!("'{}'", folded.replace('\'', "''"))
}

/// Result returned after extracting a leading YAML block.
#[derive(Debug, Default)]
pub struct FrontmatterExtraction {
    /// Scalar entries of the block in source order.
    pub frontmatter: Frontmatter,
    /// Byte offset inside the original document where the body begins.
    pub body_start: usize,
    /// Keys whose values were not scalars and were dropped.
    pub dropped_keys: Vec<String>,
}

/// Errors emitted while parsing or extracting frontmatter.
#[derive(Debug, Error)]
pub enum FrontmatterError {
    /// Unclosed YAML fence (e.g., missing terminating `---`).
    #[error("Unterminated YAML frontmatter block: expected closing '---'")]
    Unterminated,
    /// YAML failed to parse.
    #[error("Frontmatter parse error: {0}")]
    Parse(String),
    /// Top-level YAML node was not a mapping.
    #[error("Frontmatter must be a YAML mapping at the top level")]
    InvalidRootType,
}

/// Extracts a leading YAML block from an input document.
pub fn extract_frontmatter(input: &str) -> Result<FrontmatterExtraction, FrontmatterError> {
    match find_yaml_block(input)? {
        Some((block, body_start)) => {
            let mut extraction = parse_yaml_block(&block)?;
            extraction.body_start = body_start;
            Ok(extraction)
        }
        None => Ok(FrontmatterExtraction::default()),
    }
}

/// Byte offset just past the closing fence of a leading YAML block, whether or
/// not the block parses.
pub fn yaml_block_end(input: &str) -> Option<usize> {
    find_yaml_block(input).ok().flatten().map(|(_, end)| end)
}

fn parse_yaml_block(block: &str) -> Result<FrontmatterExtraction, FrontmatterError> {
    let mut extraction = FrontmatterExtraction::default();
    if block.trim().is_empty() {
        return Ok(extraction);
    }

    let value: serde_yaml::Value =
        serde_yaml::from_str(block).map_err(|err| FrontmatterError::Parse(err.to_string()))?;
    let mapping = match value {
        serde_yaml::Value::Null => return Ok(extraction),
        serde_yaml::Value::Mapping(mapping) => mapping,
        _ => return Err(FrontmatterError::InvalidRootType),
    };

    for (key, value) in mapping {
        let Some(key) = scalar_to_string(&key) else {
            continue;
        };
        match scalar_to_string(&value) {
            Some(value) => {
                extraction.frontmatter.insert(key, value);
            }
            None => extraction.dropped_keys.push(key),
        }
    }
    Ok(extraction)
}

fn scalar_to_string(value: &serde_yaml::Value) -> Option<String> {
    match value {
        serde_yaml::Value::String(s) => Some(s.clone()),
        serde_yaml::Value::Bool(b) => Some(b.to_string()),
        serde_yaml::Value::Number(n) => Some(n.to_string()),
        serde_yaml::Value::Null => Some(String::new()),
        serde_yaml::Value::Tagged(tagged) => scalar_to_string(&tagged.value),
        serde_yaml::Value::Sequence(_) | serde_yaml::Value::Mapping(_) => None,
    }
}

fn find_yaml_block(input: &str) -> Result<Option<(String, usize)>, FrontmatterError> {
    let (without_bom, bom_len) = strip_bom(input);

    // The fence must be the first line of the document.
    let Some((first, block_start)) = next_line(without_bom, 0) else {
        return Ok(None);
    };
    if !is_yaml_fence(first) {
        return Ok(None);
    }

    let mut scan_cursor = block_start;
    loop {
        match next_line(without_bom, scan_cursor) {
            Some((block_line, next_line_cursor)) => {
                if is_yaml_fence(block_line) {
                    let raw_block = &without_bom[block_start..scan_cursor];
                    let trimmed = raw_block.trim_end_matches(['\r', '\n']);
                    let body_index = bom_len + next_line_cursor;
                    return Ok(Some((trimmed.to_string(), body_index)));
                }
                scan_cursor = next_line_cursor;
            }
            None => return Err(FrontmatterError::Unterminated),
        }
    }
}

fn strip_bom(input: &str) -> (&str, usize) {
    if let Some(stripped) = input.strip_prefix('\u{feff}') {
        (stripped, '\u{feff}'.len_utf8())
    } else {
        (input, 0)
    }
}

fn next_line(input: &str, start: usize) -> Option<(&str, usize)> {
    if start >= input.len() {
        return None;
    }

    let bytes = &input.as_bytes()[start..];
    if let Some(pos) = bytes.iter().position(|b| *b == b'\n') {
        let line_end = start + pos;
        let line = &input[start..line_end];
        Some((line, line_end + 1))
    } else {
        Some((&input[start..], input.len()))
    }
}

fn is_yaml_fence(line: &str) -> bool {
    line.trim_end() == "---"
}
