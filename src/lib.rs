//! # ai-hub
//!
//! Orchestration core for routing chat, embedding, vision, and
//! media-generation requests across a pluggable set of AI backends, with
//! per-provider failure isolation and cosine-similarity retrieval over
//! previously embedded text.
//!
//! ## Components
//!
//! - **[`registry`]** — capability-based provider index. Providers are
//!   registered explicitly at a composition root, one typed slot per
//!   capability; resolution honors local availability and an
//!   administratively controlled enablement map (cached per process,
//!   refreshed only on operator request).
//! - **[`resilience`]** — a keyed circuit breaker. One Closed/Open/HalfOpen
//!   state machine per service name, shared safely across concurrent
//!   callers, with a single half-open probe per cooldown.
//! - **[`facade`]** — the single entry point unifying sync chat, streaming
//!   chat, embeddings, vision, media generation, and speech. Resolves
//!   per-user defaults and wraps every downstream call in the breaker.
//! - **[`search`]** — ranked cosine-similarity retrieval for RAG and
//!   "find similar", over a [`search::VectorStore`] primitive.
//! - **[`provider`]** — the capability traits plus three adapters: the
//!   always-available sentinel, a local Ollama daemon, and any
//!   OpenAI-compatible endpoint.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use ai_hub::facade::AiFacade;
//! use ai_hub::provider::SentinelProvider;
//! use ai_hub::registry::{ProviderRegistry, StaticEnablement};
//!
//! # #[tokio::main]
//! # async fn main() -> ai_hub::Result<()> {
//! let sentinel = Arc::new(SentinelProvider::new());
//! let registry = Arc::new(
//!     ProviderRegistry::builder()
//!         .register_chat(sentinel.clone())
//!         .register_embedding(sentinel)
//!         .enablement(Arc::new(StaticEnablement::allow_all(["sentinel"])))
//!         .build()?,
//! );
//! let facade = AiFacade::builder().registry(registry).build()?;
//!
//! let reply = facade.chat("Hello!", None, Default::default()).await?;
//! println!("{} said: {}", reply.provider, reply.content);
//! # Ok(())
//! # }
//! ```

pub mod capability;
pub mod error;
pub mod facade;
pub mod provider;
pub mod registry;
pub mod resilience;
pub mod search;
pub mod types;

pub use capability::{Capability, Purpose};
pub use error::{Error, ErrorKind};
pub use facade::{AiFacade, AiFacadeBuilder, ChatInput, ModelPreferences, StaticPreferences};
pub use registry::{EnablementMap, ProviderRegistry, RegistryBuilder, StaticEnablement};
pub use resilience::{CircuitBreaker, CircuitBreakerConfig};
pub use search::{MemoryVectorStore, SearchHit, VectorSearchService, VectorStore};
pub use types::{CallOptions, ChatOutcome, Message, MessageRole, StreamEvent};

use futures::Stream;
use std::pin::Pin;

/// Result type alias for the library
pub type Result<T> = std::result::Result<T, Error>;

/// A unified pinned, boxed stream of fallible items.
pub type BoxStream<'a, T> = Pin<Box<dyn Stream<Item = Result<T>> + Send + 'a>>;
