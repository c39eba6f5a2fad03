//! Minimal end-to-end run against the sentinel provider: chat, streaming,
//! and semantic retrieval, with no external services.
//!
//! ```bash
//! cargo run --example quickstart
//! ```

use std::sync::Arc;
use uuid::Uuid;

use ai_hub::provider::SentinelProvider;
use ai_hub::search::{ChunkRecord, MemoryVectorStore, SourceMeta, VectorSearchService};
use ai_hub::{AiFacade, CallOptions, ProviderRegistry, StaticEnablement};

#[tokio::main]
async fn main() -> ai_hub::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let sentinel = Arc::new(SentinelProvider::new());
    let registry = Arc::new(
        ProviderRegistry::builder()
            .register_chat(sentinel.clone())
            .register_embedding(sentinel)
            .enablement(Arc::new(StaticEnablement::allow_all(["sentinel"])))
            .build()?,
    );
    let facade = Arc::new(AiFacade::builder().registry(registry).build()?);

    // Synchronous chat.
    let reply = facade.chat("Hello!", None, CallOptions::new()).await?;
    println!("[{}] {}", reply.provider, reply.content);

    // Streaming chat, chunks printed as they arrive.
    facade
        .chat_stream(
            "Stream this back to me",
            |chunk| print!("{}", chunk),
            None,
            CallOptions::new(),
        )
        .await?;
    println!();

    // Embed a tiny corpus and search it.
    let store = Arc::new(MemoryVectorStore::new(768));
    for text in ["the quick brown fox", "an unrelated memo"] {
        let vector = facade.embed(text, Some("demo"), CallOptions::new()).await?;
        let source_id = Uuid::new_v4();
        store.insert_source(
            "demo",
            source_id,
            SourceMeta {
                label: text.to_string(),
                kind: "message".to_string(),
                created_at: 0,
            },
        );
        store.insert_chunk(ChunkRecord::new(source_id, "demo", None, text, vector))?;
    }
    let search = VectorSearchService::new(facade, store);
    for hit in search
        .semantic_search("quick fox", "demo", None, 5, 0.0)
        .await?
    {
        println!("{:.3}  {}", hit.score, hit.text);
    }
    Ok(())
}
