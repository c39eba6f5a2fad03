//! The similarity-search primitive.
//!
//! Persistent vector storage is outside this crate; production deployments
//! back [`VectorStore`] with a database exposing a cosine-distance operator.
//! [`MemoryVectorStore`] is the exact-scan reference implementation used by
//! tests and small deployments.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::RwLock;
use uuid::Uuid;

use super::types::{ChunkRecord, CorpusStats, NearestQuery, ScoredChunk, SourceMeta};
use super::vectors::cosine_distance;
use crate::{Error, Result};

#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Chunks nearest to `vector` in the query's partition, ordered by
    /// ascending cosine distance, filtered by `max_distance` and capped at
    /// `limit`. Unknown users yield an empty result.
    async fn nearest(&self, query: &NearestQuery, vector: &[f32]) -> Result<Vec<ScoredChunk>>;

    /// The stored embedding of a source's first chunk, if the source exists.
    async fn source_embedding(&self, user_id: &str, source_id: Uuid) -> Result<Option<Vec<f32>>>;

    /// Metadata for the given sources (read-only enrichment join).
    async fn describe_sources(
        &self,
        user_id: &str,
        source_ids: &[Uuid],
    ) -> Result<HashMap<Uuid, SourceMeta>>;

    async fn stats(&self, user_id: &str) -> Result<CorpusStats>;
}

/// In-memory exact-scan store with a fixed embedding dimension.
pub struct MemoryVectorStore {
    dimension: usize,
    /// user_id → chunks in insertion order.
    chunks: RwLock<HashMap<String, Vec<ChunkRecord>>>,
    /// (user_id, source_id) → metadata.
    sources: RwLock<HashMap<(String, Uuid), SourceMeta>>,
}

impl MemoryVectorStore {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            chunks: RwLock::new(HashMap::new()),
            sources: RwLock::new(HashMap::new()),
        }
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn insert_source(&self, user_id: impl Into<String>, source_id: Uuid, meta: SourceMeta) {
        self.sources
            .write()
            .unwrap_or_else(|p| p.into_inner())
            .insert((user_id.into(), source_id), meta);
    }

    pub fn insert_chunk(&self, record: ChunkRecord) -> Result<()> {
        if record.embedding.len() != self.dimension {
            return Err(Error::invalid_input(format!(
                "embedding dimension {} does not match store dimension {}",
                record.embedding.len(),
                self.dimension
            )));
        }
        self.chunks
            .write()
            .unwrap_or_else(|p| p.into_inner())
            .entry(record.user_id.clone())
            .or_default()
            .push(record);
        Ok(())
    }
}

#[async_trait]
impl VectorStore for MemoryVectorStore {
    async fn nearest(&self, query: &NearestQuery, vector: &[f32]) -> Result<Vec<ScoredChunk>> {
        let chunks = self.chunks.read().unwrap_or_else(|p| p.into_inner());
        let Some(rows) = chunks.get(&query.user_id) else {
            return Ok(vec![]);
        };

        let mut scored = Vec::new();
        for row in rows {
            if let Some(group) = &query.group_key {
                if row.group_key.as_deref() != Some(group.as_str()) {
                    continue;
                }
            }
            if query.exclude_source == Some(row.source_id) {
                continue;
            }
            let distance = cosine_distance(vector, &row.embedding)?;
            if let Some(max) = query.max_distance {
                if distance > max {
                    continue;
                }
            }
            scored.push(ScoredChunk {
                chunk_id: row.chunk_id,
                source_id: row.source_id,
                text: row.text.clone(),
                group_key: row.group_key.clone(),
                distance,
            });
        }

        scored.sort_by(|a, b| {
            a.distance
                .partial_cmp(&b.distance)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        scored.truncate(query.limit);
        Ok(scored)
    }

    async fn source_embedding(&self, user_id: &str, source_id: Uuid) -> Result<Option<Vec<f32>>> {
        let chunks = self.chunks.read().unwrap_or_else(|p| p.into_inner());
        Ok(chunks.get(user_id).and_then(|rows| {
            rows.iter()
                .find(|r| r.source_id == source_id)
                .map(|r| r.embedding.clone())
        }))
    }

    async fn describe_sources(
        &self,
        user_id: &str,
        source_ids: &[Uuid],
    ) -> Result<HashMap<Uuid, SourceMeta>> {
        let sources = self.sources.read().unwrap_or_else(|p| p.into_inner());
        Ok(source_ids
            .iter()
            .filter_map(|id| {
                sources
                    .get(&(user_id.to_string(), *id))
                    .map(|meta| (*id, meta.clone()))
            })
            .collect())
    }

    async fn stats(&self, user_id: &str) -> Result<CorpusStats> {
        let chunks = self.chunks.read().unwrap_or_else(|p| p.into_inner());
        let Some(rows) = chunks.get(user_id) else {
            return Ok(CorpusStats::default());
        };
        let documents: HashSet<Uuid> = rows.iter().map(|r| r.source_id).collect();
        let group_keys: HashSet<&str> = rows
            .iter()
            .filter_map(|r| r.group_key.as_deref())
            .collect();
        let total_chars: usize = rows.iter().map(|r| r.text.chars().count()).sum();
        let avg_chunk_chars = if rows.is_empty() {
            0.0
        } else {
            total_chars as f64 / rows.len() as f64
        };
        Ok(CorpusStats {
            documents: documents.len(),
            chunks: rows.len(),
            group_keys: group_keys.len(),
            avg_chunk_chars,
        })
    }
}
