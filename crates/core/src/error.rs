use serde::Serialize;

/// Source location information for diagnostics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SourceLocation {
    /// Line number (1-indexed)
    pub line: usize,
    /// Column number (1-indexed)
    pub column: usize,
}

impl SourceLocation {
    /// Create a new source location
    pub fn new(line: usize, column: usize) -> Self {
        Self { line, column }
    }
}

impl std::fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// Diagnostic severity level
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Content was rewritten conservatively; output is still emitted.
    Warning,
    /// Content cannot be made JSX-safe; the document should be quarantined.
    Fatal,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Warning => f.write_str("warning"),
            Severity::Fatal => f.write_str("fatal"),
        }
    }
}

/// A problem detected while converting one document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    /// Path of the source document.
    pub path: String,
    /// Severity of the problem.
    pub severity: Severity,
    /// Human readable description.
    pub message: String,
    /// Location inside the source, when known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<SourceLocation>,
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.location {
            Some(location) => write!(
                f,
                "{}:{}: {}: {}",
                self.path, location, self.severity, self.message
            ),
            None => write!(f, "{}: {}: {}", self.path, self.severity, self.message),
        }
    }
}

/// Collection of diagnostics for a single document.
#[derive(Debug, Clone, Default)]
pub struct Diagnostics {
    path: String,
    entries: Vec<Diagnostic>,
}

impl Diagnostics {
    /// Create an empty collection for the document at `path`.
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            entries: Vec::new(),
        }
    }

    /// Path of the document these diagnostics belong to.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Record a warning.
    pub fn warn(&mut self, message: impl Into<String>) {
        self.record(Severity::Warning, message.into(), None);
    }

    /// Record a warning with location.
    pub fn warn_at(&mut self, message: impl Into<String>, location: SourceLocation) {
        self.record(Severity::Warning, message.into(), Some(location));
    }

    /// Record a fatal diagnostic.
    pub fn fatal(&mut self, message: impl Into<String>) {
        self.record(Severity::Fatal, message.into(), None);
    }

    /// Record a fatal diagnostic with location.
    pub fn fatal_at(&mut self, message: impl Into<String>, location: SourceLocation) {
        self.record(Severity::Fatal, message.into(), Some(location));
    }

    fn record(&mut self, severity: Severity, message: String, location: Option<SourceLocation>) {
        self.entries.push(Diagnostic {
            path: self.path.clone(),
            severity,
            message,
            location,
        });
    }

    /// Check if any fatal diagnostic was recorded
    pub fn has_fatal(&self) -> bool {
        self.entries.iter().any(|d| d.severity == Severity::Fatal)
    }

    /// Check if there are any diagnostics
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Get total count of all diagnostics
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Iterate over recorded diagnostics in order.
    pub fn iter(&self) -> std::slice::Iter<'_, Diagnostic> {
        self.entries.iter()
    }

    /// Consume the collection.
    pub fn into_vec(self) -> Vec<Diagnostic> {
        self.entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_path_on_every_entry() {
        let mut diagnostics = Diagnostics::new("docs/intro.md");
        diagnostics.warn("unknown icon");
        diagnostics.fatal_at("unbalanced <devsite-selector>", SourceLocation::new(3, 1));

        assert_eq!(diagnostics.len(), 2);
        assert!(diagnostics.has_fatal());
        assert!(diagnostics.iter().all(|d| d.path == "docs/intro.md"));
    }

    #[test]
    fn display_includes_location_when_known() {
        let mut diagnostics = Diagnostics::new("a.md");
        diagnostics.fatal_at("bad tag", SourceLocation::new(4, 2));
        diagnostics.warn("odd marker");
        let rendered: Vec<String> = diagnostics.iter().map(|d| d.to_string()).collect();
        assert_eq!(rendered[0], "a.md:4:2: fatal: bad tag");
        assert_eq!(rendered[1], "a.md: warning: odd marker");
    }

    #[test]
    fn warnings_alone_are_not_fatal() {
        let mut diagnostics = Diagnostics::new("a.md");
        diagnostics.warn("x");
        assert!(!diagnostics.has_fatal());
        assert!(!diagnostics.is_empty());
    }
}
