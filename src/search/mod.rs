//! Cosine-similarity retrieval over a user's embedded text corpus.
//!
//! Backs RAG context lookup and "find similar" features. The service embeds
//! the query through the facade, delegates the distance scan to the
//! [`VectorStore`] primitive, converts distances to scores, filters, ranks,
//! and enriches hits with source metadata.

pub mod store;
pub mod types;
pub mod vectors;

use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::facade::AiFacade;
use crate::Result;

pub use store::{MemoryVectorStore, VectorStore};
pub use types::{ChunkRecord, CorpusStats, NearestQuery, ScoredChunk, SearchHit, SourceMeta};
pub use vectors::score_from_distance;

pub struct VectorSearchService {
    facade: Arc<AiFacade>,
    store: Arc<dyn VectorStore>,
}

impl VectorSearchService {
    pub fn new(facade: Arc<AiFacade>, store: Arc<dyn VectorStore>) -> Self {
        Self { facade, store }
    }

    /// Ranked semantic retrieval for a query string.
    ///
    /// Embedding failure or an empty query vector aborts with an empty
    /// result rather than an error: retrieval augments a flow, it must not
    /// break one.
    pub async fn semantic_search(
        &self,
        query: &str,
        user_id: &str,
        group_key: Option<&str>,
        limit: usize,
        min_score: f32,
    ) -> Result<Vec<SearchHit>> {
        if limit == 0 || query.trim().is_empty() {
            return Ok(vec![]);
        }

        let vector = match self
            .facade
            .embed(query, Some(user_id), Default::default())
            .await
        {
            Ok(v) if !v.is_empty() => v,
            Ok(_) => {
                warn!(user_id, "query embedding came back empty, returning no hits");
                return Ok(vec![]);
            }
            Err(e) => {
                warn!(user_id, error = %e, "query embedding failed, returning no hits");
                return Ok(vec![]);
            }
        };

        let mut nearest = NearestQuery::for_user(user_id, limit)
            .with_group_key(group_key.map(str::to_string));
        if min_score > 0.0 {
            // score = 1 − distance, so the threshold pushes down directly.
            nearest = nearest.with_max_distance(1.0 - min_score);
        }
        let scored = self.store.nearest(&nearest, &vector).await?;
        self.rank_and_enrich(user_id, scored, limit, min_score).await
    }

    /// Chunks similar to an existing source, ranked by the embedding already
    /// stored for that source's first chunk. No new embedding call is made,
    /// and the source itself never appears in the results.
    pub async fn find_similar(
        &self,
        source_id: Uuid,
        user_id: &str,
        limit: usize,
    ) -> Result<Vec<SearchHit>> {
        if limit == 0 {
            return Ok(vec![]);
        }
        let Some(vector) = self.store.source_embedding(user_id, source_id).await? else {
            debug!(user_id, %source_id, "unknown source, returning no hits");
            return Ok(vec![]);
        };
        let nearest = NearestQuery::for_user(user_id, limit).excluding_source(source_id);
        let scored = self.store.nearest(&nearest, &vector).await?;
        self.rank_and_enrich(user_id, scored, limit, 0.0).await
    }

    /// Aggregate counters over the user's corpus.
    pub async fn stats(&self, user_id: &str) -> Result<CorpusStats> {
        self.store.stats(user_id).await
    }

    /// Distance → score conversion, threshold filter, descending rank, cap,
    /// then the read-only metadata join.
    async fn rank_and_enrich(
        &self,
        user_id: &str,
        scored: Vec<ScoredChunk>,
        limit: usize,
        min_score: f32,
    ) -> Result<Vec<SearchHit>> {
        let mut hits: Vec<SearchHit> = scored
            .into_iter()
            .filter_map(|c| {
                let score = score_from_distance(c.distance);
                if score < min_score {
                    return None;
                }
                Some(SearchHit {
                    chunk_id: c.chunk_id,
                    source_id: c.source_id,
                    text: c.text,
                    score,
                    group_key: c.group_key,
                    source: None,
                })
            })
            .collect();
        hits.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        hits.truncate(limit);

        if hits.is_empty() {
            return Ok(hits);
        }
        let source_ids: Vec<Uuid> = hits
            .iter()
            .map(|h| h.source_id)
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();
        let sources = self.store.describe_sources(user_id, &source_ids).await?;
        for hit in &mut hits {
            hit.source = sources.get(&hit.source_id).cloned();
        }
        debug!(user_id, hits = hits.len(), "semantic retrieval completed");
        Ok(hits)
    }
}
