//! Ordered embedding backend chain, generalizing the teacher's single
//! `Embedder` trait into a fallback chain per spec.md §9.

use crate::config::ProviderSettings;
use crate::embedding::{Embedder, OpenAIEmbedder};
use crate::error::{YtCoreError, Result};
use std::sync::Arc;
use tracing::warn;

/// A deterministic, dependency-free embedder used as a last resort so
/// semantic search degrades rather than failing outright when no real
/// embedding backend is reachable. Not semantically meaningful beyond
/// grouping identical/near-identical text.
pub struct LocalHashEmbedder {
    dimensions: usize,
}

impl LocalHashEmbedder {
    pub fn new(dimensions: usize) -> Self {
        Self { dimensions: dimensions.max(8) }
    }
}

#[async_trait::async_trait]
impl Embedder for LocalHashEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        Ok(hash_embed(text, self.dimensions))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| hash_embed(t, self.dimensions)).collect())
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}

fn hash_embed(text: &str, dimensions: usize) -> Vec<f32> {
    use sha2::{Digest, Sha256};
    let mut out = vec![0f32; dimensions];
    let mut seed = text.as_bytes().to_vec();
    let mut i = 0;
    while i < dimensions {
        let digest = Sha256::digest(&seed);
        for byte in digest.iter() {
            if i >= dimensions {
                break;
            }
            out[i] = (*byte as f32 / 255.0) * 2.0 - 1.0;
            i += 1;
        }
        seed = digest.to_vec();
    }
    out
}

/// An ordered list of embedder backends, attempted in turn until one
/// succeeds. Each entry carries a `"<provider>:<model>"` label so callers
/// can record which backend actually answered (spec.md §4.4).
pub struct EmbedChain {
    backends: Vec<(Arc<dyn Embedder>, String)>,
}

impl EmbedChain {
    pub fn new(backends: Vec<Arc<dyn Embedder>>) -> Self {
        Self { backends: backends.into_iter().map(|b| (b, "embed:unknown".to_string())).collect() }
    }

    pub fn from_names(names: &[String], _settings: &ProviderSettings, dimensions: usize) -> Self {
        let mut backends: Vec<(Arc<dyn Embedder>, String)> = Vec::new();
        for name in names {
            match name.as_str() {
                "openai" => backends.push((
                    Arc::new(OpenAIEmbedder::with_config("text-embedding-3-small", dimensions)),
                    "openai:text-embedding-3-small".to_string(),
                )),
                "local" => backends.push((Arc::new(LocalHashEmbedder::new(dimensions)), "local:hash".to_string())),
                other => warn!("unknown embedding backend '{other}', skipping"),
            }
        }
        if backends.is_empty() {
            backends.push((Arc::new(LocalHashEmbedder::new(dimensions)), "local:hash".to_string()));
        }
        Self { backends }
    }

    pub async fn embed(&self, text: &str) -> Result<(Vec<f32>, String)> {
        let mut last_err = None;
        for (backend, label) in &self.backends {
            match backend.embed(text).await {
                Ok(vec) => return Ok((vec, label.clone())),
                Err(e) => {
                    warn!("embedding backend failed: {e}");
                    last_err = Some(e);
                }
            }
        }
        Err(last_err.unwrap_or_else(|| YtCoreError::ProviderTransient("no embedding backends configured".to_string())))
    }

    pub async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut last_err = None;
        for (backend, _label) in &self.backends {
            match backend.embed_batch(texts).await {
                Ok(vecs) => return Ok(vecs),
                Err(e) => {
                    warn!("embedding backend failed: {e}");
                    last_err = Some(e);
                }
            }
        }
        Err(last_err.unwrap_or_else(|| YtCoreError::ProviderTransient("no embedding backends configured".to_string())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn local_hash_embedder_is_deterministic() {
        let embedder = LocalHashEmbedder::new(16);
        let a = embedder.embed("hello world").await.unwrap();
        let b = embedder.embed("hello world").await.unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 16);
    }

    #[tokio::test]
    async fn chain_falls_back_to_local() {
        let chain = EmbedChain::new(vec![Arc::new(LocalHashEmbedder::new(8))]);
        let (vec, _) = chain.embed("x").await.unwrap();
        assert_eq!(vec.len(), 8);
    }
}
