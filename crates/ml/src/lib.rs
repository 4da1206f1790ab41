//! Classification and scoring layer.
//!
//! Category classification is a cheap regex pass. Urgency scoring routes
//! through [`router::ModelRouter`], which guards the expensive model with
//! a circuit breaker and falls back to the keyword baseline. Embeddings
//! feed the semantic dedup window.

pub mod classifier;
pub mod embedding;
pub mod router;
pub mod urgency;

pub use classifier::match_category;
pub use embedding::{cosine_similarity, embed_ticket, Embedder, EmbeddingError, HashEmbedder, HttpEmbedder};
pub use router::{CircuitState, ModelRouter};
pub use urgency::{baseline_urgency, HttpModel, LexiconModel, ModelError, UrgencyModel};
