use crate::git::walker::{CommitRecord, ExtractionOptions};

/// Fixed characters of the document template, excluding field values
pub const TEMPLATE_OVERHEAD: usize = "Commit: \nAuthor: \nDate: \nMessage: \n\n--- CODE CHANGES ---\n"
    .len();

/// Upper bound on a rendered date (covers the epoch-seconds fallback too)
const DATE_CEILING: usize = 32;

/// Upper bound on an object id (SHA-256 repositories use 64 hex chars)
const HASH_CEILING: usize = 64;

/// Render a commit into the single text used for both embedding and model context
pub fn normalize(record: &CommitRecord) -> String {
    let mut content = String::with_capacity(
        TEMPLATE_OVERHEAD
            + record.hash.len()
            + record.author.len()
            + record.date.len()
            + record.message.len()
            + record.diff_text.len(),
    );

    content.push_str("Commit: ");
    content.push_str(&record.hash);
    content.push_str("\nAuthor: ");
    content.push_str(&record.author);
    content.push_str("\nDate: ");
    content.push_str(&record.date);
    content.push_str("\nMessage: ");
    content.push_str(&record.message);
    content.push_str("\n\n--- CODE CHANGES ---\n");
    content.push_str(&record.diff_text);

    content
}

/// Largest `content` a record extracted with `options` can produce
pub fn content_ceiling(options: &ExtractionOptions) -> usize {
    let marker = crate::git::diff::TRUNCATION_MARKER.len();
    TEMPLATE_OVERHEAD
        + HASH_CEILING
        + options.author_ceiling
        + marker
        + DATE_CEILING
        + options.message_ceiling
        + marker
        + options.budget().max_len()
}

/// Metadata stored next to each commit document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitMetadata {
    pub author: String,
    pub date: String,
    pub committed_at: i64,
    /// Present only when changed files are stored
    pub files: Option<Vec<String>>,
}

/// A commit record with its immutable rendered content
#[derive(Debug, Clone)]
pub struct CommitDocument {
    record: CommitRecord,
    content: String,
}

impl CommitDocument {
    pub fn new(record: CommitRecord) -> Self {
        let content = normalize(&record);
        Self { record, content }
    }

    /// Index key
    pub fn id(&self) -> &str {
        &self.record.hash
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn record(&self) -> &CommitRecord {
        &self.record
    }

    pub fn metadata(&self, store_changed_files: bool) -> CommitMetadata {
        CommitMetadata {
            author: self.record.author.clone(),
            date: self.record.date.clone(),
            committed_at: self.record.committed_at,
            files: store_changed_files.then(|| self.record.changed_files.clone()),
        }
    }

    pub fn into_parts(self) -> (CommitRecord, String) {
        (self.record, self.content)
    }
}
