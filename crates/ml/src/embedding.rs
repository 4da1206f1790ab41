//! Ticket text embeddings for the semantic dedup window.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EmbeddingError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error: {0}")]
    Api(String),

    #[error("dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
}

/// Trait for embedding backends.
///
/// Output vectors are unit-length (L2) except for empty text, which maps
/// to the zero vector. `embed_batch` is equivalent to per-item embedding.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embed a batch of texts, returning one vector per input text (in order).
    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbeddingError>;

    /// The dimensionality of the output vectors.
    fn dimensions(&self) -> usize;
}

/// Embed ticket text (subject + body) into a single vector.
pub async fn embed_ticket(
    embedder: &dyn Embedder,
    subject: &str,
    body: &str,
) -> Result<Vec<f32>, EmbeddingError> {
    let text = format!("{subject} {body}");
    let mut vectors = embedder.embed_batch(&[text.as_str()]).await?;
    vectors
        .pop()
        .ok_or_else(|| EmbeddingError::Api("embedder returned no vectors".to_string()))
}

/// Cosine similarity between two normalized vectors: clamp(a·b, −1, 1).
/// Mismatched dimensions similarity is 0.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    if a.len() != b.len() {
        return 0.0;
    }
    let dot: f64 = a.iter().zip(b.iter()).map(|(x, y)| (*x as f64) * (*y as f64)).sum();
    dot.clamp(-1.0, 1.0)
}

// ── Feature-hash embedder ─────────────────────────────────────

/// Deterministic feature-hashing embedder: the default backend.
///
/// Tokens are hashed into `dimensions` signed buckets and the result is
/// L2-normalized, so identical texts embed identically and texts sharing
/// vocabulary score high cosine similarity. Empty text is the zero vector.
pub struct HashEmbedder {
    dimensions: usize,
}

impl HashEmbedder {
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions: dimensions.max(1),
        }
    }

    fn embed_one(&self, text: &str) -> Vec<f32> {
        let mut v = vec![0.0f32; self.dimensions];
        for token in text
            .to_lowercase()
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
        {
            let h = fnv1a(token.as_bytes());
            let idx = (h % self.dimensions as u64) as usize;
            let sign = if (h >> 17) & 1 == 0 { 1.0 } else { -1.0 };
            v[idx] += sign;
        }
        let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for x in &mut v {
                *x /= norm;
            }
        }
        v
    }
}

fn fnv1a(bytes: &[u8]) -> u64 {
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    for b in bytes {
        hash ^= *b as u64;
        hash = hash.wrapping_mul(0x1000_0000_01b3);
    }
    hash
}

#[async_trait]
impl Embedder for HashEmbedder {
    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        Ok(texts.iter().map(|t| self.embed_one(t)).collect())
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}

// ── HTTP embedder ─────────────────────────────────────────────

#[derive(Serialize)]
struct EmbedRequest {
    input: Vec<String>,
}

#[derive(Deserialize)]
struct EmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

/// Embedder backed by an external embedding endpoint.
pub struct HttpEmbedder {
    client: reqwest::Client,
    url: String,
    dimensions: usize,
}

impl HttpEmbedder {
    pub fn new(url: String, dimensions: usize) -> Self {
        Self {
            client: reqwest::Client::new(),
            url,
            dimensions,
        }
    }
}

#[async_trait]
impl Embedder for HttpEmbedder {
    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        let request = EmbedRequest {
            input: texts.iter().map(|s| s.to_string()).collect(),
        };
        let response = self.client.post(&self.url).json(&request).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(EmbeddingError::Api(format!("{status}: {body}")));
        }

        let parsed: EmbedResponse = response.json().await?;
        for vector in &parsed.embeddings {
            if vector.len() != self.dimensions {
                return Err(EmbeddingError::DimensionMismatch {
                    expected: self.dimensions,
                    actual: vector.len(),
                });
            }
        }
        Ok(parsed.embeddings)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn identical_texts_embed_identically() {
        let embedder = HashEmbedder::new(64);
        let a = embed_ticket(&embedder, "Payment gateway down", "").await.unwrap();
        let b = embed_ticket(&embedder, "Payment gateway down", "").await.unwrap();
        assert!((cosine_similarity(&a, &b) - 1.0).abs() < 1e-6);
    }

    #[tokio::test]
    async fn embeddings_are_unit_length() {
        let embedder = HashEmbedder::new(64);
        let v = embed_ticket(&embedder, "refund request", "charged twice for one plan").await.unwrap();
        let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[tokio::test]
    async fn empty_text_is_zero_vector() {
        let embedder = HashEmbedder::new(64);
        let v = embed_ticket(&embedder, "", "  ").await.unwrap();
        assert!(v.iter().all(|x| *x == 0.0));
        assert_eq!(v.len(), 64);
    }

    #[tokio::test]
    async fn unrelated_texts_score_below_threshold() {
        let embedder = HashEmbedder::new(384);
        let a = embed_ticket(&embedder, "Payment gateway down", "").await.unwrap();
        let b = embed_ticket(&embedder, "GDPR deletion request", "please remove my data").await.unwrap();
        assert!(cosine_similarity(&a, &b) < 0.9);
    }

    #[tokio::test]
    async fn batch_matches_per_item_embedding() {
        let embedder = HashEmbedder::new(64);
        let batch = embedder.embed_batch(&["one two", "three"]).await.unwrap();
        let single = embedder.embed_batch(&["one two"]).await.unwrap();
        assert_eq!(batch[0], single[0]);
        assert_eq!(batch.len(), 2);
    }

    #[test]
    fn cosine_is_clamped() {
        let a = vec![1.0f32, 0.0];
        let b = vec![1.0f32, 0.0];
        assert!(cosine_similarity(&a, &b) <= 1.0);
        assert_eq!(cosine_similarity(&a, &[1.0f32]), 0.0);
    }
}
