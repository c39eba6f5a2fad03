//! Rows and results for the retrieval service.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A stored, embedded text chunk. Scoped to a user and optionally to a
/// logical group key partitioning that user's corpus.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkRecord {
    pub chunk_id: Uuid,
    /// Originating document/message/file.
    pub source_id: Uuid,
    pub user_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_key: Option<String>,
    pub text: String,
    pub embedding: Vec<f32>,
}

impl ChunkRecord {
    pub fn new(
        source_id: Uuid,
        user_id: impl Into<String>,
        group_key: Option<String>,
        text: impl Into<String>,
        embedding: Vec<f32>,
    ) -> Self {
        Self {
            chunk_id: Uuid::new_v4(),
            source_id,
            user_id: user_id.into(),
            group_key,
            text: text.into(),
            embedding,
        }
    }
}

/// Read-only enrichment describing a hit's originating source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceMeta {
    pub label: String,
    /// "message", "file", ...
    pub kind: String,
    /// Unix epoch seconds.
    pub created_at: u64,
}

/// A ranked retrieval result. Ephemeral, never stored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchHit {
    pub chunk_id: Uuid,
    pub source_id: Uuid,
    pub text: String,
    /// 1 − cosine distance, clamped to [0, 1].
    pub score: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<SourceMeta>,
}

/// Aggregate counters over one user's corpus.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CorpusStats {
    /// Distinct source documents.
    pub documents: usize,
    pub chunks: usize,
    /// Distinct group keys in use.
    pub group_keys: usize,
    pub avg_chunk_chars: f64,
}

/// Parameters for a nearest-neighbor query against the store.
#[derive(Debug, Clone)]
pub struct NearestQuery {
    pub user_id: String,
    /// Restrict to one partition of the user's corpus.
    pub group_key: Option<String>,
    pub limit: usize,
    /// Drop chunks of this source (used by find-similar).
    pub exclude_source: Option<Uuid>,
    /// Push-down filter: keep rows with cosine distance ≤ this.
    pub max_distance: Option<f32>,
}

impl NearestQuery {
    pub fn for_user(user_id: impl Into<String>, limit: usize) -> Self {
        Self {
            user_id: user_id.into(),
            group_key: None,
            limit,
            exclude_source: None,
            max_distance: None,
        }
    }

    pub fn with_group_key(mut self, group_key: Option<String>) -> Self {
        self.group_key = group_key;
        self
    }

    pub fn excluding_source(mut self, source_id: Uuid) -> Self {
        self.exclude_source = Some(source_id);
        self
    }

    pub fn with_max_distance(mut self, max_distance: f32) -> Self {
        self.max_distance = Some(max_distance);
        self
    }
}

/// A chunk returned by the store with its raw cosine distance.
#[derive(Debug, Clone)]
pub struct ScoredChunk {
    pub chunk_id: Uuid,
    pub source_id: Uuid,
    pub text: String,
    pub group_key: Option<String>,
    pub distance: f32,
}
