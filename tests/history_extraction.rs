mod common;

use common::{Fixture, service_history};
use git_archaeologist::config::ExtractionConfig;
use git_archaeologist::git::diff::{ROOT_COMMIT_SENTINEL, TRUNCATION_MARKER};
use git_archaeologist::git::{CommitDocument, ExtractionOptions, HistoryWalker, normalize};

#[test]
fn test_walk_service_history() {
    let fx = service_history();
    let walker = HistoryWalker::open(fx.path()).expect("Should open repo");
    let options = ExtractionOptions::default();

    let records: Vec<_> = walker.commits("main", &options).unwrap().collect();
    assert_eq!(records.len(), 4);

    let subjects: Vec<&str> = records.iter().map(|r| r.message.as_str()).collect();
    assert_eq!(
        subjects,
        vec![
            "Log startup banner",
            "Increase timeout for slow upstreams",
            "Pin dependencies",
            "Bootstrap service",
        ]
    );

    assert_eq!(records[3].diff_text, ROOT_COMMIT_SENTINEL);
    // Rendered in the commit's own +01:00 offset
    assert_eq!(records[0].date, "2023-11-15 03:13:20");
}

#[test]
fn test_ignored_paths_listed_but_not_rendered() {
    let fx = service_history();
    let walker = HistoryWalker::open(fx.path()).unwrap();
    let options = ExtractionOptions::default();

    let pin = walker
        .commits("main", &options)
        .unwrap()
        .find(|r| r.message == "Pin dependencies")
        .unwrap();

    assert!(pin.changed_files.contains(&"Cargo.lock".to_string()));
    assert!(pin.changed_files.contains(&"docs/logo.png".to_string()));
    assert!(!pin.diff_text.contains("File:"));
}

#[test]
fn test_custom_ignore_policy_from_config() {
    let fx = service_history();
    let walker = HistoryWalker::open(fx.path()).unwrap();

    let mut config = ExtractionConfig::default();
    config.ignore_extensions.push(".toml".to_string());
    let options = ExtractionOptions::from_config(&config).unwrap();

    let bump = walker
        .commits("main", &options)
        .unwrap()
        .find(|r| r.message.starts_with("Increase timeout"))
        .unwrap();
    assert_eq!(bump.changed_files, vec!["service.toml".to_string()]);
    assert!(bump.diff_text.is_empty());
}

#[test]
fn test_document_for_config_change() {
    let fx = service_history();
    let walker = HistoryWalker::open(fx.path()).unwrap();
    let options = ExtractionOptions::default();

    let record = walker
        .commits("main", &options)
        .unwrap()
        .find(|r| r.message.starts_with("Increase timeout"))
        .unwrap();
    let document = CommitDocument::new(record.clone());

    assert_eq!(document.content(), normalize(&record));
    assert!(document.content().starts_with(&format!("Commit: {}\n", record.hash)));
    assert!(document.content().contains("Author: Ada\n"));
    assert!(document.content().contains("--- CODE CHANGES ---\n\nFile: service.toml\n"));
    assert!(document.content().contains("-timeout = 5"));
    assert!(document.content().contains("+timeout = 30"));
    assert!(document.content().len() <= options.content_ceiling());
}

#[test]
fn test_tight_budget_bounds_every_document() {
    let mut fx = Fixture::new("main");
    fx.commit("Ada", "Seed", &[("a.txt", "a\n")]);
    let body = "0123456789abcdef\n".repeat(10_000);
    fx.commit(
        "Ada",
        "Many large files",
        &[("one.txt", &body), ("two.txt", &body), ("three.txt", &body)],
    );

    let mut config = ExtractionConfig::default();
    config.per_file_diff_ceiling = 100;
    config.total_diff_ceiling = 250;
    let options = ExtractionOptions::from_config(&config).unwrap();

    let walker = HistoryWalker::open(fx.path()).unwrap();
    for record in walker.commits("main", &options).unwrap() {
        let content = normalize(&record);
        assert!(content.len() <= options.content_ceiling());
        if record.message == "Many large files" {
            assert!(record.diff_text.ends_with(TRUNCATION_MARKER));
            assert_eq!(record.changed_files.len(), 3);
        }
    }
}

#[test]
fn test_master_only_repository_falls_back() {
    let mut fx = Fixture::new("master");
    fx.commit("Ada", "Legacy default branch", &[("README", "old\n")]);

    let walker = HistoryWalker::open(fx.path()).unwrap();
    let options = ExtractionOptions::default();
    let iter = walker.commits("main", &options).unwrap();
    assert_eq!(iter.branch(), "master");
    assert_eq!(iter.count(), 1);
}
