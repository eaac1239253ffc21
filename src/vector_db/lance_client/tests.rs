use super::*;
use tempfile::TempDir;

fn metadata(author: &str, committed_at: i64, files: Option<Vec<&str>>) -> CommitMetadata {
    CommitMetadata {
        author: author.to_string(),
        date: "2024-01-01 00:00:00".to_string(),
        committed_at,
        files: files.map(|f| f.into_iter().map(String::from).collect()),
    }
}

fn unit(dimension: usize, axis: usize) -> Vec<f32> {
    let mut v = vec![0.0; dimension];
    v[axis] = 1.0;
    v
}

async fn create_index(temp_dir: &TempDir) -> LanceCommitIndex {
    LanceCommitIndex::with_path(&temp_dir.path().join("index"), "git_commits")
        .await
        .unwrap()
}

async fn seed(index: &LanceCommitIndex) {
    index.reset(4).await.unwrap();
    index
        .upsert(
            vec![unit(4, 0), unit(4, 1), unit(4, 2)],
            vec!["aaa".into(), "bbb".into(), "ccc".into()],
            vec![
                metadata("Alice", 100, Some(vec!["src/a.rs"])),
                metadata("Bob", 200, None),
                metadata("Carol", 300, Some(vec![])),
            ],
            vec![
                "Commit: aaa".into(),
                "Commit: bbb".into(),
                "Commit: ccc".into(),
            ],
        )
        .await
        .unwrap();
}

#[tokio::test]
async fn test_with_path_sets_fields() {
    let temp_dir = TempDir::new().unwrap();
    let index = create_index(&temp_dir).await;
    assert_eq!(index.table_name(), "git_commits");
    assert!(index.db_path().ends_with("index"));
    assert!(!index.exists().await.unwrap());
    assert_eq!(index.count().await.unwrap(), 0);
}

#[tokio::test]
async fn test_reset_creates_empty_table() {
    let temp_dir = TempDir::new().unwrap();
    let index = create_index(&temp_dir).await;

    index.reset(4).await.unwrap();
    assert!(index.exists().await.unwrap());
    assert_eq!(index.count().await.unwrap(), 0);
}

#[tokio::test]
async fn test_reset_rejects_zero_dimension() {
    let temp_dir = TempDir::new().unwrap();
    let index = create_index(&temp_dir).await;
    assert!(index.reset(0).await.is_err());
}

#[tokio::test]
async fn test_reset_discards_previous_rows() {
    let temp_dir = TempDir::new().unwrap();
    let index = create_index(&temp_dir).await;
    seed(&index).await;
    assert_eq!(index.count().await.unwrap(), 3);

    index.reset(4).await.unwrap();
    assert_eq!(index.count().await.unwrap(), 0);
    assert!(index.ids().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_upsert_replaces_existing_ids() {
    let temp_dir = TempDir::new().unwrap();
    let index = create_index(&temp_dir).await;
    seed(&index).await;

    index
        .upsert(
            vec![unit(4, 3)],
            vec!["bbb".into()],
            vec![metadata("Bob", 200, None)],
            vec!["Commit: bbb (rewritten)".into()],
        )
        .await
        .unwrap();

    assert_eq!(index.count().await.unwrap(), 3);
    let hits = index.search(unit(4, 3), 1, 0.0).await.unwrap();
    assert_eq!(hits[0].hash, "bbb");
    assert_eq!(hits[0].content, "Commit: bbb (rewritten)");
}

#[tokio::test]
async fn test_upsert_empty_is_noop() {
    let temp_dir = TempDir::new().unwrap();
    let index = create_index(&temp_dir).await;
    index.reset(4).await.unwrap();
    let stored = index
        .upsert(vec![], vec![], vec![], vec![])
        .await
        .unwrap();
    assert_eq!(stored, 0);
}

#[tokio::test]
async fn test_upsert_rejects_mismatched_lengths() {
    let temp_dir = TempDir::new().unwrap();
    let index = create_index(&temp_dir).await;
    index.reset(4).await.unwrap();

    let result = index
        .upsert(
            vec![unit(4, 0), unit(4, 1)],
            vec!["aaa".into()],
            vec![metadata("Alice", 1, None)],
            vec!["x".into()],
        )
        .await;
    assert!(result.is_err());
}

#[tokio::test]
async fn test_upsert_without_table_fails() {
    let temp_dir = TempDir::new().unwrap();
    let index = create_index(&temp_dir).await;

    let result = index
        .upsert(
            vec![unit(4, 0)],
            vec!["aaa".into()],
            vec![metadata("Alice", 1, None)],
            vec!["x".into()],
        )
        .await;
    assert!(result.is_err());
}

#[tokio::test]
async fn test_search_orders_by_score() {
    let temp_dir = TempDir::new().unwrap();
    let index = create_index(&temp_dir).await;
    seed(&index).await;

    let hits = index.search(vec![0.9, 0.1, 0.0, 0.0], 3, 0.0).await.unwrap();
    assert_eq!(hits.len(), 3);
    assert_eq!(hits[0].hash, "aaa");
    assert_eq!(hits[1].hash, "bbb");
    assert!(hits.windows(2).all(|w| w[0].score >= w[1].score));
    assert!(hits.iter().all(|h| h.score > 0.0 && h.score <= 1.0));
}

#[tokio::test]
async fn test_search_returns_metadata() {
    let temp_dir = TempDir::new().unwrap();
    let index = create_index(&temp_dir).await;
    seed(&index).await;

    let hits = index.search(unit(4, 0), 1, 0.0).await.unwrap();
    assert_eq!(hits[0].author, "Alice");
    assert_eq!(hits[0].date, "2024-01-01 00:00:00");
    assert_eq!(hits[0].committed_at, 100);
    assert_eq!(hits[0].files, Some(vec!["src/a.rs".to_string()]));
    assert!((hits[0].score - 1.0).abs() < 1e-5);

    let hits = index.search(unit(4, 1), 1, 0.0).await.unwrap();
    assert_eq!(hits[0].files, None);

    let hits = index.search(unit(4, 2), 1, 0.0).await.unwrap();
    assert_eq!(hits[0].files, Some(vec![]));
}

#[tokio::test]
async fn test_search_respects_limit_and_min_score() {
    let temp_dir = TempDir::new().unwrap();
    let index = create_index(&temp_dir).await;
    seed(&index).await;

    assert_eq!(index.search(unit(4, 0), 2, 0.0).await.unwrap().len(), 2);
    assert!(index.search(unit(4, 0), 0, 0.0).await.unwrap().is_empty());

    // Exact match scores 1.0; orthogonal unit vectors sit at squared distance 2
    let strict = index.search(unit(4, 0), 3, 0.9).await.unwrap();
    assert_eq!(strict.len(), 1);
    assert_eq!(strict[0].hash, "aaa");
}

#[tokio::test]
async fn test_search_empty_table() {
    let temp_dir = TempDir::new().unwrap();
    let index = create_index(&temp_dir).await;
    index.reset(4).await.unwrap();
    assert!(index.search(unit(4, 0), 5, 0.0).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_search_without_table_fails() {
    let temp_dir = TempDir::new().unwrap();
    let index = create_index(&temp_dir).await;
    assert!(index.search(unit(4, 0), 5, 0.0).await.is_err());
}

#[tokio::test]
async fn test_ids_and_drop() {
    let temp_dir = TempDir::new().unwrap();
    let index = create_index(&temp_dir).await;
    seed(&index).await;

    let mut ids = index.ids().await.unwrap();
    ids.sort();
    assert_eq!(ids, vec!["aaa", "bbb", "ccc"]);

    index.drop_index().await.unwrap();
    assert!(!index.exists().await.unwrap());
    // Dropping twice is fine
    index.drop_index().await.unwrap();
}

#[test]
fn test_distance_to_score() {
    assert_eq!(distance_to_score(0.0), 1.0);
    assert_eq!(distance_to_score(1.0), 0.5);
    assert!(distance_to_score(100.0) < 0.01);
    assert_eq!(distance_to_score(-0.5), 1.0);
}
