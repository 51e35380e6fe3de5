//! Persisted list of documents excluded from conversion.
//!
//! One relative path per line, `/`-separated. Blank lines and lines starting
//! with `#` are ignored.

use std::collections::BTreeSet;
use std::fs;
use std::io;
use std::path::{Component, Path};

use crate::batch::BatchError;

const HEADER: &str = "# Documents skipped by `devmdx convert`.\n# Remove a line once the source has been fixed.\n";

/// Sorted set of quarantined relative paths.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QuarantineList {
    entries: BTreeSet<String>,
}

impl QuarantineList {
    /// Parses the file format described in the module docs.
    pub fn parse(text: &str) -> Self {
        let entries = text
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with('#'))
            .map(|line| line.trim_start_matches("./").replace('\\', "/"))
            .collect();
        Self { entries }
    }

    /// Loads a list from disk. A missing file is an empty list.
    pub fn load(path: &Path) -> Result<Self, BatchError> {
        match fs::read_to_string(path) {
            Ok(text) => Ok(Self::parse(&text)),
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                log::debug!("exclude list {} not found; starting empty", path.display());
                Ok(Self::default())
            }
            Err(source) => Err(BatchError::Read {
                path: path.to_path_buf(),
                source,
            }),
        }
    }

    /// Writes the list, header first, one entry per line.
    pub fn save(&self, path: &Path) -> Result<(), BatchError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|source| BatchError::Write {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        fs::write(path, self.render()).map_err(|source| BatchError::Write {
            path: path.to_path_buf(),
            source,
        })
    }

    /// File contents for [`QuarantineList::save`].
    pub fn render(&self) -> String {
        let mut out = String::from(HEADER);
        for entry in &self.entries {
            out.push_str(entry);
            out.push('\n');
        }
        out
    }

    /// Whether `relative` is listed.
    pub fn contains(&self, relative: &Path) -> bool {
        self.entries.contains(&list_key(relative))
    }

    /// Adds `relative`; returns `false` when it was already listed.
    pub fn insert(&mut self, relative: &Path) -> bool {
        self.entries.insert(list_key(relative))
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the list is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in sorted order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(String::as_str)
    }
}

/// Platform independent key for a relative path.
pub fn list_key(relative: &Path) -> String {
    relative
        .components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_skips_comments_and_normalizes() {
        let list = QuarantineList::parse("# header\n\nguide/intro.md\n./api/ref.html\n  \n");
        assert_eq!(list.iter().collect::<Vec<_>>(), vec!["api/ref.html", "guide/intro.md"]);
        assert!(list.contains(Path::new("guide/intro.md")));
        assert!(!list.contains(Path::new("guide/other.md")));
    }

    #[test]
    fn render_round_trips() {
        let mut list = QuarantineList::default();
        assert!(list.insert(Path::new("b.md")));
        assert!(list.insert(Path::new("a/c.md")));
        assert!(!list.insert(Path::new("b.md")));
        assert_eq!(QuarantineList::parse(&list.render()), list);
    }

    #[test]
    fn missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let list = QuarantineList::load(&dir.path().join("none.txt")).unwrap();
        assert!(list.is_empty());
    }
}
