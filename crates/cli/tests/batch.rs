use std::fs;
use std::path::{Path, PathBuf};

use devmdx_cli::{BatchOptions, FileOutcome, QuarantineList, run_batch};
use devmdx_convert::{ConvertConfig, Pipeline};

fn write(root: &Path, relative: &str, text: &str) {
    let path = root.join(relative);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, text).unwrap();
}

fn source_tree() -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    let src = dir.path().join("src");
    write(&src, "index.md", "# Welcome\n\nStart {here}.\n");
    write(&src, "guide/setup.html", "<p>Install <code>devmdx</code>.</p>\n");
    write(&src, "guide/broken.md", "Intro\n\n<devsite-selector>\n\nNever closed\n");
    write(&src, "guide/notes.txt", "not a document\n");
    dir
}

fn outcome<'a>(report: &'a devmdx_cli::BatchReport, relative: &str) -> &'a FileOutcome {
    &report
        .files
        .iter()
        .find(|f| f.relative == PathBuf::from(relative))
        .unwrap_or_else(|| panic!("{relative} missing from report"))
        .outcome
}

#[test]
fn converts_and_fans_out() {
    let dir = source_tree();
    let dests = vec![dir.path().join("out/v1"), dir.path().join("out/v2")];
    let options = BatchOptions::new(dir.path().join("src"), dests.clone());
    let pipeline = Pipeline::standard(ConvertConfig::default());

    let report = run_batch(&pipeline, &options).unwrap();

    assert_eq!(report.stats.total, 3);
    assert_eq!(report.stats.converted, 2);
    assert_eq!(report.stats.quarantined, 1);
    assert!(report.has_problems());
    for root in &dests {
        assert_eq!(
            fs::read_to_string(root.join("index.mdx")).unwrap(),
            "---\ntitle: 'Welcome'\n---\n\nStart &#123;here&#125;.\n"
        );
        assert_eq!(
            fs::read_to_string(root.join("guide/setup.mdx")).unwrap(),
            "Install `devmdx`.\n"
        );
        assert!(!root.join("guide/broken.mdx").exists());
        assert!(!root.join("guide/notes.mdx").exists());
    }
    assert_eq!(
        report.quarantined().collect::<Vec<_>>(),
        vec![Path::new("guide/broken.md")]
    );
}

#[test]
fn excluded_documents_are_skipped() {
    let dir = source_tree();
    let mut options = BatchOptions::new(dir.path().join("src"), vec![dir.path().join("out")]);
    options.exclude = QuarantineList::parse("guide/broken.md\n");
    let pipeline = Pipeline::standard(ConvertConfig::default());

    let report = run_batch(&pipeline, &options).unwrap();

    assert_eq!(outcome(&report, "guide/broken.md"), &FileOutcome::Excluded);
    assert!(!report.has_problems());
}

#[test]
fn dry_run_writes_nothing() {
    let dir = source_tree();
    let out = dir.path().join("out");
    let mut options = BatchOptions::new(dir.path().join("src"), vec![out.clone()]);
    options.dry_run = true;
    options.jobs = Some(2);
    let pipeline = Pipeline::standard(ConvertConfig::default());

    let report = run_batch(&pipeline, &options).unwrap();

    assert_eq!(report.stats.converted, 2);
    assert!(!out.exists());
}

#[test]
fn incremental_run_skips_fresh_outputs() {
    let dir = source_tree();
    let mut options = BatchOptions::new(dir.path().join("src"), vec![dir.path().join("out")]);
    options.exclude = QuarantineList::parse("guide/broken.md\n");
    let pipeline = Pipeline::standard(ConvertConfig::default());
    run_batch(&pipeline, &options).unwrap();

    options.incremental = true;
    let report = run_batch(&pipeline, &options).unwrap();

    assert_eq!(report.stats.up_to_date, 2);
    assert_eq!(outcome(&report, "index.md"), &FileOutcome::UpToDate);
}

#[test]
fn validation_accepts_clean_output() {
    let dir = source_tree();
    let mut options = BatchOptions::new(dir.path().join("src"), vec![dir.path().join("out")]);
    options.validate = true;
    let pipeline = Pipeline::standard(ConvertConfig::default());

    let report = run_batch(&pipeline, &options).unwrap();

    assert_eq!(outcome(&report, "index.md"), &FileOutcome::Converted);
    assert_eq!(outcome(&report, "guide/setup.html"), &FileOutcome::Converted);
}

#[test]
fn parser_panic_quarantines_only_that_document() {
    let dir = tempfile::tempdir().unwrap();
    let src = dir.path().join("src");
    write(&src, "steps.md", "1. Install:\n\n   ```sh\n   make\n- next\n");
    write(&src, "good.md", "Fine.\n");
    let options = BatchOptions::new(src, vec![dir.path().join("out")]);
    let pipeline = Pipeline::standard(ConvertConfig::default());

    let report = run_batch(&pipeline, &options).unwrap();

    assert_eq!(outcome(&report, "steps.md"), &FileOutcome::Quarantined);
    assert_eq!(outcome(&report, "good.md"), &FileOutcome::Converted);
    assert!(!dir.path().join("out/steps.mdx").exists());
}
