//! Parallel conversion of a source tree into one or more destination roots.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::{Instant, SystemTime};

use devmdx_convert::Pipeline;
use devmdx_core::{Diagnostic, Severity, validate_mdx};
use rayon::prelude::*;
use serde::Serialize;
use thiserror::Error;
use walkdir::WalkDir;

use crate::quarantine::{QuarantineList, list_key};

/// Source extensions picked up by the walker.
pub const SOURCE_EXTENSIONS: &[&str] = &["md", "html"];

/// I/O failures of the batch driver.
#[derive(Debug, Error)]
pub enum BatchError {
    /// The source root is missing or not a directory.
    #[error("source directory {} does not exist", .0.display())]
    MissingSource(PathBuf),
    /// No destination root was given.
    #[error("at least one destination root is required")]
    NoDestination,
    /// Walking the source tree failed.
    #[error("failed to walk {}", .path.display())]
    Walk {
        /// Entry that could not be read.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: walkdir::Error,
    },
    /// Reading a file failed.
    #[error("failed to read {}", .path.display())]
    Read {
        /// File being read.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: io::Error,
    },
    /// Writing a file or directory failed.
    #[error("failed to write {}", .path.display())]
    Write {
        /// File or directory being written.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: io::Error,
    },
}

/// Options for [`run_batch`].
#[derive(Debug, Clone)]
pub struct BatchOptions {
    /// Root of the source tree.
    pub source: PathBuf,
    /// Destination roots; every converted document is written under each.
    pub dests: Vec<PathBuf>,
    /// Extension of written documents, without the dot.
    pub extension: String,
    /// Worker threads. Defaults to the number of CPU cores.
    pub jobs: Option<usize>,
    /// Convert without writing anything.
    pub dry_run: bool,
    /// Skip sources whose destinations are all newer.
    pub incremental: bool,
    /// Compile every output as MDX; rejected output is quarantined.
    pub validate: bool,
    /// Documents skipped without conversion.
    pub exclude: QuarantineList,
}

impl BatchOptions {
    /// Options for converting `source` into `dests` with the defaults.
    pub fn new(source: impl Into<PathBuf>, dests: Vec<PathBuf>) -> Self {
        Self {
            source: source.into(),
            dests,
            extension: "mdx".to_string(),
            jobs: None,
            dry_run: false,
            incremental: false,
            validate: false,
            exclude: QuarantineList::default(),
        }
    }
}

/// What happened to one source document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum FileOutcome {
    /// Converted and written (or would have been, on a dry run).
    Converted,
    /// Every destination was newer than the source.
    UpToDate,
    /// Listed in the exclude list.
    Excluded,
    /// Fatal diagnostics; nothing was written.
    Quarantined,
    /// An I/O error stopped this document.
    Failed {
        /// Error chain, outermost first.
        error: String,
    },
}

/// Per-document result.
#[derive(Debug, Clone, Serialize)]
pub struct FileReport {
    /// Path relative to the source root.
    pub relative: PathBuf,
    /// What happened.
    #[serde(flatten)]
    pub outcome: FileOutcome,
    /// Diagnostics produced by the conversion.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub diagnostics: Vec<Diagnostic>,
}

/// Counters for a finished batch.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BatchStats {
    /// Source documents found.
    pub total: u32,
    /// Documents converted.
    pub converted: u32,
    /// Documents skipped as up to date.
    pub up_to_date: u32,
    /// Documents skipped through the exclude list.
    pub excluded: u32,
    /// Documents held back by fatal diagnostics.
    pub quarantined: u32,
    /// Documents that hit an I/O error.
    pub failed: u32,
    /// Wall time in milliseconds.
    pub processing_time_ms: f64,
}

/// Result of [`run_batch`].
#[derive(Debug, Clone, Serialize)]
pub struct BatchReport {
    /// One entry per source document, in walk order.
    pub files: Vec<FileReport>,
    /// Summary counters.
    pub stats: BatchStats,
}

impl BatchReport {
    /// Relative paths of the documents quarantined by this run.
    pub fn quarantined(&self) -> impl Iterator<Item = &Path> {
        self.files
            .iter()
            .filter(|f| f.outcome == FileOutcome::Quarantined)
            .map(|f| f.relative.as_path())
    }

    /// Whether any document was quarantined or failed.
    pub fn has_problems(&self) -> bool {
        self.stats.quarantined > 0 || self.stats.failed > 0
    }
}

#[derive(Default)]
struct Counters {
    converted: AtomicU32,
    up_to_date: AtomicU32,
    excluded: AtomicU32,
    quarantined: AtomicU32,
    failed: AtomicU32,
}

impl Counters {
    fn record(&self, outcome: &FileOutcome) {
        let counter = match outcome {
            FileOutcome::Converted => &self.converted,
            FileOutcome::UpToDate => &self.up_to_date,
            FileOutcome::Excluded => &self.excluded,
            FileOutcome::Quarantined => &self.quarantined,
            FileOutcome::Failed { .. } => &self.failed,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

/// Source documents under `source`, relative to it and sorted by name.
pub fn discover_sources(source: &Path) -> Result<Vec<PathBuf>, BatchError> {
    if !source.is_dir() {
        return Err(BatchError::MissingSource(source.to_path_buf()));
    }
    let mut found = Vec::new();
    for entry in WalkDir::new(source).sort_by_file_name() {
        let entry = entry.map_err(|err| BatchError::Walk {
            path: err.path().unwrap_or(source).to_path_buf(),
            source: err,
        })?;
        if !entry.file_type().is_file() || !is_source(entry.path()) {
            continue;
        }
        if let Ok(relative) = entry.path().strip_prefix(source) {
            found.push(relative.to_path_buf());
        }
    }
    Ok(found)
}

fn is_source(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| SOURCE_EXTENSIONS.iter().any(|e| ext.eq_ignore_ascii_case(e)))
}

/// `relative` under `root` with its extension replaced.
pub fn destination_path(root: &Path, relative: &Path, extension: &str) -> PathBuf {
    let mut path = root.join(relative);
    path.set_extension(extension);
    path
}

/// Dedicated pool of `jobs` threads; `None` runs on rayon's global pool.
fn worker_pool(jobs: Option<usize>) -> Option<rayon::ThreadPool> {
    let jobs = jobs?;
    match rayon::ThreadPoolBuilder::new().num_threads(jobs).build() {
        Ok(pool) => Some(pool),
        Err(err) => {
            log::warn!("failed to build a {jobs}-thread pool ({err}); using the global pool");
            None
        }
    }
}

/// Converts every source document under `options.source`.
///
/// Per-document failures are reported in the returned [`BatchReport`];
/// only problems with the source root itself are errors.
pub fn run_batch(pipeline: &Pipeline, options: &BatchOptions) -> Result<BatchReport, BatchError> {
    let start = Instant::now();
    if options.dests.is_empty() {
        return Err(BatchError::NoDestination);
    }
    let sources = discover_sources(&options.source)?;
    log::info!(
        "converting {} documents from {}",
        sources.len(),
        options.source.display()
    );

    let pool = worker_pool(options.jobs);

    let total = sources.len() as u32;
    let counters = Counters::default();

    let process = |relative: PathBuf| -> FileReport {
        let report = match convert_one(pipeline, options, &relative) {
            Ok(report) => report,
            Err(err) => {
                log::warn!("{}: {err}", relative.display());
                FileReport {
                    relative,
                    outcome: FileOutcome::Failed {
                        error: error_chain(&err),
                    },
                    diagnostics: Vec::new(),
                }
            }
        };
        counters.record(&report.outcome);
        report
    };

    let files: Vec<FileReport> = if let Some(pool) = pool {
        pool.install(|| sources.into_par_iter().map(process).collect())
    } else {
        sources.into_par_iter().map(process).collect()
    };

    let stats = BatchStats {
        total,
        converted: counters.converted.load(Ordering::Relaxed),
        up_to_date: counters.up_to_date.load(Ordering::Relaxed),
        excluded: counters.excluded.load(Ordering::Relaxed),
        quarantined: counters.quarantined.load(Ordering::Relaxed),
        failed: counters.failed.load(Ordering::Relaxed),
        processing_time_ms: start.elapsed().as_secs_f64() * 1000.0,
    };
    Ok(BatchReport { files, stats })
}

fn convert_one(
    pipeline: &Pipeline,
    options: &BatchOptions,
    relative: &Path,
) -> Result<FileReport, BatchError> {
    let report = |outcome, diagnostics| FileReport {
        relative: relative.to_path_buf(),
        outcome,
        diagnostics,
    };

    if options.exclude.contains(relative) {
        log::debug!("{}: excluded", relative.display());
        return Ok(report(FileOutcome::Excluded, Vec::new()));
    }

    let source_path = options.source.join(relative);
    let targets: Vec<PathBuf> = options
        .dests
        .iter()
        .map(|root| destination_path(root, relative, &options.extension))
        .collect();

    if options.incremental && is_up_to_date(&source_path, &targets) {
        log::debug!("{}: up to date", relative.display());
        return Ok(report(FileOutcome::UpToDate, Vec::new()));
    }

    let raw = fs::read_to_string(&source_path).map_err(|source| BatchError::Read {
        path: source_path.clone(),
        source,
    })?;
    let key = list_key(relative);
    let mut converted = pipeline.transform(&key, &raw);

    if options.validate
        && !converted.has_fatal()
        && let Err(err) = validate_mdx(&converted.output, &key)
    {
        converted.diagnostics.push(Diagnostic {
            path: key.clone(),
            severity: Severity::Fatal,
            message: format!("output rejected by the MDX compiler: {err}"),
            location: None,
        });
    }

    if converted.has_fatal() {
        log::warn!("{key}: quarantined");
        return Ok(report(FileOutcome::Quarantined, converted.diagnostics));
    }

    if !options.dry_run {
        for target in &targets {
            write_output(target, &converted.output)?;
        }
    }
    Ok(report(FileOutcome::Converted, converted.diagnostics))
}

fn write_output(target: &Path, text: &str) -> Result<(), BatchError> {
    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent).map_err(|source| BatchError::Write {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    fs::write(target, text).map_err(|source| BatchError::Write {
        path: target.to_path_buf(),
        source,
    })
}

fn modified(path: &Path) -> Option<SystemTime> {
    fs::metadata(path).and_then(|m| m.modified()).ok()
}

fn is_up_to_date(source: &Path, targets: &[PathBuf]) -> bool {
    let Some(source_time) = modified(source) else {
        return false;
    };
    targets
        .iter()
        .all(|target| modified(target).is_some_and(|t| t >= source_time))
}

fn error_chain(err: &dyn std::error::Error) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn destination_renames_extension() {
        assert_eq!(
            destination_path(Path::new("out/v2"), Path::new("guide/intro.html"), "mdx"),
            PathBuf::from("out/v2/guide/intro.mdx")
        );
    }

    #[test]
    fn source_extensions_are_case_insensitive() {
        assert!(is_source(Path::new("a/B.MD")));
        assert!(is_source(Path::new("page.html")));
        assert!(!is_source(Path::new("image.png")));
        assert!(!is_source(Path::new("README")));
    }

    #[test]
    fn worker_pool_honours_job_count() {
        assert!(worker_pool(None).is_none());
        let pool = worker_pool(Some(3)).unwrap();
        assert_eq!(pool.current_num_threads(), 3);
    }

    #[test]
    fn missing_source_is_an_error() {
        let err = discover_sources(Path::new("/definitely/not/here")).unwrap_err();
        assert!(matches!(err, BatchError::MissingSource(_)));
    }
}
