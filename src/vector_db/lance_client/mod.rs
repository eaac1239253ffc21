//! LanceDB-backed commit index (embedded, no server required)

use crate::git::CommitMetadata;
use crate::types::CommitHit;
use crate::vector_db::CommitIndex;
use anyhow::{Context, Result, bail};
use arrow_array::{
    Array, FixedSizeListArray, Float32Array, Int64Array, RecordBatch, RecordBatchIterator,
    StringArray, types::Float32Type,
};
use arrow_schema::{DataType, Field, Schema};
use futures::stream::TryStreamExt;
use lancedb::Table;
use lancedb::connection::Connection;
use lancedb::query::{ExecutableQuery, QueryBase, Select};
use std::path::Path;
use std::sync::Arc;

/// Commit index stored as a single LanceDB table
pub struct LanceCommitIndex {
    connection: Connection,
    table_name: String,
    db_path: String,
}

impl LanceCommitIndex {
    /// Connect to (or create) the database directory at `db_path`
    pub async fn with_path(db_path: &Path, table_name: &str) -> Result<Self> {
        let db_path = db_path.to_string_lossy().to_string();
        tracing::info!("Connecting to LanceDB at: {}", db_path);

        let connection = lancedb::connect(&db_path)
            .execute()
            .await
            .context("Failed to connect to LanceDB")?;

        Ok(Self {
            connection,
            table_name: table_name.to_string(),
            db_path,
        })
    }

    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    pub fn db_path(&self) -> &str {
        &self.db_path
    }

    /// Create schema for the commits table
    fn create_schema(dimension: usize) -> Arc<Schema> {
        Arc::new(Schema::new(vec![
            Field::new(
                "vector",
                DataType::FixedSizeList(
                    Arc::new(Field::new("item", DataType::Float32, true)),
                    dimension as i32,
                ),
                false,
            ),
            Field::new("id", DataType::Utf8, false),
            Field::new("content", DataType::Utf8, false),
            Field::new("author", DataType::Utf8, false),
            Field::new("date", DataType::Utf8, false),
            Field::new("committed_at", DataType::Int64, false),
            Field::new("files", DataType::Utf8, true),
        ]))
    }

    async fn get_table(&self) -> Result<Table> {
        self.connection
            .open_table(&self.table_name)
            .execute()
            .await
            .context("Failed to open table")
    }

    /// Convert embeddings and metadata to a RecordBatch
    fn create_record_batch(
        embeddings: Vec<Vec<f32>>,
        ids: Vec<String>,
        metadata: Vec<CommitMetadata>,
        contents: Vec<String>,
        schema: Arc<Schema>,
    ) -> Result<RecordBatch> {
        let dimension = embeddings[0].len();

        let vector_array = FixedSizeListArray::from_iter_primitive::<Float32Type, _, _>(
            embeddings
                .into_iter()
                .map(|v| Some(v.into_iter().map(Some))),
            dimension as i32,
        );

        let id_array = StringArray::from(ids);
        let content_array = StringArray::from(contents);
        let author_array = StringArray::from(
            metadata
                .iter()
                .map(|m| m.author.as_str())
                .collect::<Vec<_>>(),
        );
        let date_array = StringArray::from(
            metadata
                .iter()
                .map(|m| m.date.as_str())
                .collect::<Vec<_>>(),
        );
        let committed_at_array = Int64Array::from(
            metadata
                .iter()
                .map(|m| m.committed_at)
                .collect::<Vec<_>>(),
        );
        let files_array = StringArray::from(
            metadata
                .iter()
                .map(|m| {
                    m.files
                        .as_ref()
                        .map(serde_json::to_string)
                        .transpose()
                })
                .collect::<Result<Vec<_>, _>>()
                .context("Failed to encode changed files")?,
        );

        RecordBatch::try_new(
            schema,
            vec![
                Arc::new(vector_array),
                Arc::new(id_array),
                Arc::new(content_array),
                Arc::new(author_array),
                Arc::new(date_array),
                Arc::new(committed_at_array),
                Arc::new(files_array),
            ],
        )
        .context("Failed to create RecordBatch")
    }

    /// Decode one result batch into hits, computing scores from `_distance`
    fn hits_from_batch(batch: &RecordBatch, min_score: f32) -> Result<Vec<CommitHit>> {
        let distance_array = batch
            .column_by_name("_distance")
            .context("Missing _distance column")?
            .as_any()
            .downcast_ref::<Float32Array>()
            .context("Invalid _distance type")?;
        let id_array = string_column(batch, "id")?;
        let content_array = string_column(batch, "content")?;
        let author_array = string_column(batch, "author")?;
        let date_array = string_column(batch, "date")?;
        let committed_at_array = batch
            .column_by_name("committed_at")
            .context("Missing committed_at column")?
            .as_any()
            .downcast_ref::<Int64Array>()
            .context("Invalid committed_at type")?;
        let files_array = string_column(batch, "files")?;

        let mut hits = Vec::with_capacity(batch.num_rows());
        for i in 0..batch.num_rows() {
            let score = distance_to_score(distance_array.value(i));
            if score < min_score {
                continue;
            }

            let files = if files_array.is_null(i) {
                None
            } else {
                Some(
                    serde_json::from_str::<Vec<String>>(files_array.value(i))
                        .context("Invalid files metadata")?,
                )
            };

            hits.push(CommitHit {
                hash: id_array.value(i).to_string(),
                content: content_array.value(i).to_string(),
                author: author_array.value(i).to_string(),
                date: date_array.value(i).to_string(),
                committed_at: committed_at_array.value(i),
                files,
                score,
            });
        }
        Ok(hits)
    }
}

fn string_column<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a StringArray> {
    batch
        .column_by_name(name)
        .with_context(|| format!("Missing {} column", name))?
        .as_any()
        .downcast_ref::<StringArray>()
        .with_context(|| format!("Invalid {} type", name))
}

/// Map an L2 distance onto (0, 1], higher is closer
pub fn distance_to_score(distance: f32) -> f32 {
    1.0 / (1.0 + distance.max(0.0))
}

#[async_trait::async_trait]
impl CommitIndex for LanceCommitIndex {
    async fn reset(&self, dimension: usize) -> Result<()> {
        if dimension == 0 {
            bail!("Embedding dimension must be positive");
        }

        self.drop_index().await?;

        let schema = Self::create_schema(dimension);
        let empty_batch = RecordBatch::new_empty(schema.clone());
        let batches =
            RecordBatchIterator::new(vec![empty_batch].into_iter().map(Ok), schema.clone());

        self.connection
            .create_table(&self.table_name, Box::new(batches))
            .execute()
            .await
            .context("Failed to create table")?;

        tracing::info!(
            "Created table '{}' (dimension {}) at {}",
            self.table_name,
            dimension,
            self.db_path
        );
        Ok(())
    }

    async fn upsert(
        &self,
        embeddings: Vec<Vec<f32>>,
        ids: Vec<String>,
        metadata: Vec<CommitMetadata>,
        contents: Vec<String>,
    ) -> Result<usize> {
        if embeddings.is_empty() {
            return Ok(0);
        }
        if ids.len() != embeddings.len()
            || metadata.len() != embeddings.len()
            || contents.len() != embeddings.len()
        {
            bail!(
                "Mismatched batch: {} embeddings, {} ids, {} metadata, {} contents",
                embeddings.len(),
                ids.len(),
                metadata.len(),
                contents.len()
            );
        }

        let dimension = embeddings[0].len();
        if let Some(bad) = embeddings.iter().find(|e| e.len() != dimension) {
            bail!(
                "Inconsistent embedding dimension: expected {}, got {}",
                dimension,
                bad.len()
            );
        }

        let schema = Self::create_schema(dimension);
        let table = self.get_table().await?;

        let batch = Self::create_record_batch(embeddings, ids, metadata, contents, schema.clone())?;
        let count = batch.num_rows();
        let batches = RecordBatchIterator::new(vec![batch].into_iter().map(Ok), schema);

        let mut merge = table.merge_insert(&["id"]);
        merge
            .when_matched_update_all(None)
            .when_not_matched_insert_all();
        merge
            .execute(Box::new(batches))
            .await
            .context("Failed to upsert commits")?;

        tracing::debug!("Upserted {} commits into '{}'", count, self.table_name);
        Ok(count)
    }

    async fn search(
        &self,
        query_vector: Vec<f32>,
        limit: usize,
        min_score: f32,
    ) -> Result<Vec<CommitHit>> {
        if limit == 0 {
            return Ok(Vec::new());
        }

        let table = self.get_table().await?;
        let stream = table
            .vector_search(query_vector)
            .context("Failed to create vector search")?
            .limit(limit)
            .execute()
            .await
            .context("Failed to execute search")?;

        let batches: Vec<RecordBatch> = stream
            .try_collect()
            .await
            .context("Failed to collect search results")?;

        let mut hits = Vec::new();
        for batch in &batches {
            hits.extend(Self::hits_from_batch(batch, min_score)?);
        }

        hits.sort_by(|a, b| {
            b.score
                .total_cmp(&a.score)
                .then_with(|| b.committed_at.cmp(&a.committed_at))
        });
        hits.truncate(limit);
        Ok(hits)
    }

    async fn exists(&self) -> Result<bool> {
        let table_names = self
            .connection
            .table_names()
            .execute()
            .await
            .context("Failed to list tables")?;
        Ok(table_names.contains(&self.table_name))
    }

    async fn count(&self) -> Result<usize> {
        if !self.exists().await? {
            return Ok(0);
        }
        self.get_table()
            .await?
            .count_rows(None)
            .await
            .context("Failed to count rows")
    }

    async fn ids(&self) -> Result<Vec<String>> {
        if !self.exists().await? {
            return Ok(Vec::new());
        }

        let stream = self
            .get_table()
            .await?
            .query()
            .select(Select::Columns(vec!["id".to_string()]))
            .execute()
            .await
            .context("Failed to query ids")?;

        let batches: Vec<RecordBatch> = stream
            .try_collect()
            .await
            .context("Failed to collect ids")?;

        let mut ids = Vec::new();
        for batch in &batches {
            let id_array = string_column(batch, "id")?;
            ids.extend((0..batch.num_rows()).map(|i| id_array.value(i).to_string()));
        }
        Ok(ids)
    }

    async fn drop_index(&self) -> Result<()> {
        if !self.exists().await? {
            return Ok(());
        }
        self.connection
            .drop_table(&self.table_name, &[])
            .await
            .context("Failed to drop table")?;
        tracing::info!("Dropped table '{}'", self.table_name);
        Ok(())
    }
}

#[cfg(test)]
mod tests;
