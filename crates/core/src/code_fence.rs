//! Line-level fenced code tracking.
//!
//! Several stages scan raw text line by line (HTML block masking, the
//! post-serialization sanitizer) and must leave fenced code untouched.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct OpenFence {
    marker: char,
    length: usize,
}

/// Tracks whether successive lines fall inside a fenced code block.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FenceTracker {
    open: Option<OpenFence>,
}

impl FenceTracker {
    /// Creates a tracker positioned outside any fence.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the tracker is currently inside a fence.
    pub fn in_fence(&self) -> bool {
        self.open.is_some()
    }

    /// Consumes one line and reports whether it belongs to a fence
    /// (the opener and closer lines included).
    pub fn consume(&mut self, line: &str) -> bool {
        let (visual_indent, byte_offset) = leading_whitespace_info(line);
        let after_indent = &line[byte_offset..];

        match self.open {
            None => {
                // 4+ columns is indented code, not a fence opener
                if visual_indent > 3 {
                    return false;
                }
                match detect_fence_marker(after_indent) {
                    Some((marker, length)) => {
                        if marker == '`' && after_indent[length..].contains('`') {
                            return false;
                        }
                        self.open = Some(OpenFence { marker, length });
                        true
                    }
                    None => false,
                }
            }
            Some(open) => {
                if visual_indent <= 3
                    && is_closing_fence(after_indent)
                    && let Some((marker, length)) = detect_fence_marker(after_indent)
                    && marker == open.marker
                    && length >= open.length
                {
                    self.open = None;
                }
                true
            }
        }
    }
}

/// Longest run of consecutive `ch` in `text`.
pub fn longest_run(text: &str, ch: char) -> usize {
    let mut best = 0;
    let mut current = 0;
    for c in text.chars() {
        if c == ch {
            current += 1;
            best = best.max(current);
        } else {
            current = 0;
        }
    }
    best
}

/// Returns (visual_columns, byte_offset) for leading whitespace.
/// Tabs expand to 4-column boundaries.
pub(crate) fn leading_whitespace_info(line: &str) -> (usize, usize) {
    let mut col = 0;
    let mut bytes = 0;
    for b in line.bytes() {
        match b {
            b' ' => {
                col += 1;
                bytes += 1;
            }
            b'\t' => {
                col += 4 - (col % 4);
                bytes += 1;
            }
            _ => break,
        }
    }
    (col, bytes)
}

fn detect_fence_marker(after_indent: &str) -> Option<(char, usize)> {
    let mut chars = after_indent.chars();
    let first = chars.next()?;
    if first != '`' && first != '~' {
        return None;
    }
    let run_len = 1 + chars.take_while(|c| *c == first).count();
    if run_len >= 3 {
        Some((first, run_len))
    } else {
        None
    }
}

/// A closing fence has only fence markers followed by optional whitespace.
fn is_closing_fence(after_indent: &str) -> bool {
    let mut chars = after_indent.chars();
    let first = match chars.next() {
        Some(c) if c == '`' || c == '~' => c,
        _ => return false,
    };
    let mut count = 1;
    for c in chars.by_ref() {
        if c == first {
            count += 1;
        } else {
            return count >= 3 && c.is_whitespace() && chars.all(|c| c.is_whitespace());
        }
    }
    count >= 3
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flags(input: &str) -> Vec<bool> {
        let mut tracker = FenceTracker::new();
        input.lines().map(|line| tracker.consume(line)).collect()
    }

    #[test]
    fn marks_opener_body_and_closer() {
        assert_eq!(
            flags("text\n```js\n{a}\n```\nafter"),
            [false, true, true, true, false]
        );
    }

    #[test]
    fn closer_needs_same_marker_and_length() {
        let marks = flags("````\n```\n~~~~\n````\nout");
        assert_eq!(marks, [true, true, true, true, false]);
    }

    #[test]
    fn closer_with_info_string_does_not_close() {
        let mut tracker = FenceTracker::new();
        tracker.consume("```");
        tracker.consume("``` rust");
        assert!(tracker.in_fence());
    }

    #[test]
    fn indented_four_spaces_is_not_a_fence() {
        assert_eq!(flags("    ```\nx"), [false, false]);
    }

    #[test]
    fn tab_indent_counts_as_four_columns() {
        assert_eq!(flags("\t```\nx"), [false, false]);
    }

    #[test]
    fn backtick_in_info_string_is_inline_code() {
        assert_eq!(flags("``` a ` b\nx"), [false, false]);
    }

    #[test]
    fn longest_run_counts_consecutive_characters() {
        assert_eq!(longest_run("a ``` b `` c", '`'), 3);
        assert_eq!(longest_run("none", '`'), 0);
    }
}
