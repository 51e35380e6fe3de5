use std::collections::HashMap;

/// Extracts a `{#custom-id}` suffix from heading text.
///
/// If the text ends with `{#some-id}` (where the id contains ASCII alphanumerics,
/// hyphens, or underscores), returns the trimmed text without the suffix and `Some(id)`.
/// Otherwise returns the original text and `None`.
///
/// # Examples
///
/// ```
/// use devmdx_core::slug::extract_custom_id;
///
/// let (text, id) = extract_custom_id("My Heading {#my-heading}");
/// assert_eq!(text, "My Heading");
/// assert_eq!(id, Some("my-heading"));
///
/// let (text, id) = extract_custom_id("Plain heading");
/// assert_eq!(text, "Plain heading");
/// assert_eq!(id, None);
/// ```
pub fn extract_custom_id(text: &str) -> (&str, Option<&str>) {
    let trimmed = text.trim_end();
    if !trimmed.ends_with('}') {
        return (text, None);
    }

    if let Some(open) = trimmed.rfind("{#") {
        let id = &trimmed[open + 2..trimmed.len() - 1];
        if is_valid_id(id) {
            let before = trimmed[..open].trim_end();
            return (before, Some(id));
        }
    }

    (text, None)
}

/// Whether `id` is a non-empty run of `[A-Za-z0-9_-]`.
pub fn is_valid_id(id: &str) -> bool {
    !id.is_empty()
        && id
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
}

/// Hands out unique anchor ids within one document.
///
/// The first claim of an id keeps it; later claims get `-2`, `-3`, ...
#[derive(Debug, Default)]
pub struct AnchorRegistry {
    counts: HashMap<String, usize>,
}

impl AnchorRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Claims `id`, returning it or a suffixed variant that is still free.
    pub fn claim(&mut self, id: &str) -> String {
        let count = self.counts.entry(id.to_string()).or_insert(0);
        *count += 1;
        if *count == 1 {
            return id.to_string();
        }
        let mut suffix = *count;
        loop {
            let candidate = format!("{id}-{suffix}");
            if !self.counts.contains_key(&candidate) {
                self.counts.insert(candidate.clone(), 1);
                return candidate;
            }
            suffix += 1;
        }
    }

    /// Whether `id` has been handed out already.
    pub fn contains(&self, id: &str) -> bool {
        self.counts.contains_key(id)
    }
}
