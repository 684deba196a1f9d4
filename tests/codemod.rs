use std::{fs, path::PathBuf, sync::Arc};

use i18n_codemod::{process_file, run, CodegenStyle, Config, Outcome, RunSummary};
use pretty_assertions::assert_eq;
use regex::Regex;
use tempfile::TempDir;

fn write(dir: &TempDir, rel: &str, contents: &str) -> PathBuf {
    let path = dir.path().join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(&path, contents).unwrap();
    path
}

fn config_for(dir: &TempDir) -> Config {
    Config {
        root: dir.path().to_path_buf(),
        match_pattern: Regex::new(r"app/web/.*\.jsx?$").unwrap(),
        ignore_patterns: vec![Regex::new(r"app/web/test").unwrap()],
        style: CodegenStyle::default(),
    }
}

#[tokio::test]
async fn batch_run_reports_per_file_outcomes() {
    let dir = TempDir::new().unwrap();
    write(
        &dir,
        "app/web/greeting.jsx",
        "export const greeting = translations.greeting;\n",
    );
    write(&dir, "app/web/plain.js", "export const n = 1;\n");
    write(
        &dir,
        "app/web/test/skipped.jsx",
        "export const greeting = translations.greeting;\n",
    );
    write(&dir, "README.md", "not a candidate\n");

    let summary = run(config_for(&dir)).await.unwrap();
    assert_eq!(
        summary,
        RunSummary {
            changed: 1,
            unchanged: 1,
            skipped: 1,
        }
    );
}

#[tokio::test]
async fn run_never_writes_rewritten_text_back() {
    let dir = TempDir::new().unwrap();
    let src = "export const greeting = translations.greeting;\n";
    let path = write(&dir, "app/web/greeting.jsx", src);

    run(config_for(&dir)).await.unwrap();
    assert_eq!(fs::read_to_string(path).unwrap(), src);
}

#[tokio::test]
async fn changed_outcome_carries_a_diff() {
    let dir = TempDir::new().unwrap();
    let path = write(
        &dir,
        "app/web/greeting.jsx",
        "const g = translations.greeting;\n",
    );

    let outcome = process_file(path, Arc::new(config_for(&dir))).await.unwrap();
    match outcome {
        Outcome::Changed { diff } => {
            assert!(diff.contains("+import { t } from 'i18next';"));
            assert!(diff.contains("-const g = translations.greeting;"));
            assert!(diff.contains("+const g = t('greeting');"));
        }
        other => panic!("expected a changed outcome, got {other:?}"),
    }
}

#[tokio::test]
async fn ignored_file_is_skipped_without_a_read() {
    let dir = TempDir::new().unwrap();
    // Invalid syntax: a skip must happen before any read or parse.
    let path = write(&dir, "app/web/test/broken.jsx", "const = ;\n");

    let outcome = process_file(path, Arc::new(config_for(&dir))).await.unwrap();
    assert_eq!(outcome, Outcome::Skipped);
}

#[tokio::test]
async fn parse_failure_aborts_the_run() {
    let dir = TempDir::new().unwrap();
    write(
        &dir,
        "app/web/ok.jsx",
        "const g = translations.greeting;\n",
    );
    write(&dir, "app/web/broken.jsx", "const = ;\n");

    let err = run(config_for(&dir)).await.unwrap_err();
    assert!(format!("{err:#}").contains("broken.jsx"));
}
