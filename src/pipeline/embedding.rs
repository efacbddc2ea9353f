//! Embedding capability for policy retrieval.
//!
//! The default backend is a deterministic hash-seeded embedder: the same
//! text always maps to the same unit vector, which is all the engine's
//! observable contract requires (identical clauses retrieve identically, and
//! a real model backend can be substituted through the trait).

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use sha2::{Digest, Sha256};

use super::EvalError;

/// Text-to-vector capability used by the policy index and the evaluators.
pub trait EmbeddingModel {
    fn embed(&self, text: &str) -> Result<Vec<f32>, EvalError>;
    fn dimension(&self) -> usize;
}

/// Allow `Box<dyn EmbeddingModel>` to be used as `&impl EmbeddingModel`.
impl EmbeddingModel for Box<dyn EmbeddingModel> {
    fn embed(&self, text: &str) -> Result<Vec<f32>, EvalError> {
        (**self).embed(text)
    }

    fn dimension(&self) -> usize {
        (**self).dimension()
    }
}

/// Deterministic embedder seeded from a SHA-256 digest of the input.
pub struct HashEmbedder {
    dim: usize,
}

impl HashEmbedder {
    pub fn new(dim: usize) -> Self {
        Self { dim }
    }
}

impl Default for HashEmbedder {
    fn default() -> Self {
        Self::new(crate::config::EMBEDDING_DIM)
    }
}

impl EmbeddingModel for HashEmbedder {
    fn embed(&self, text: &str) -> Result<Vec<f32>, EvalError> {
        let digest = Sha256::digest(text.trim().to_lowercase().as_bytes());
        let mut seed = [0u8; 8];
        seed.copy_from_slice(&digest[..8]);
        let mut rng = StdRng::seed_from_u64(u64::from_le_bytes(seed));

        let mut embedding: Vec<f32> = (0..self.dim).map(|_| rng.gen_range(-1.0..1.0)).collect();

        let magnitude: f32 = embedding.iter().map(|x| x * x).sum::<f32>().sqrt();
        if magnitude > 0.0 {
            for x in &mut embedding {
                *x /= magnitude;
            }
        }

        Ok(embedding)
    }

    fn dimension(&self) -> usize {
        self.dim
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_text_same_vector() {
        let embedder = HashEmbedder::new(64);
        let a = embedder.embed("Panadol → Not covered").unwrap();
        let b = embedder.embed("Panadol → Not covered").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn case_and_whitespace_insensitive() {
        let embedder = HashEmbedder::new(64);
        let a = embedder.embed("Vitamin D").unwrap();
        let b = embedder.embed("  vitamin d ").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn different_text_different_vector() {
        let embedder = HashEmbedder::new(64);
        let a = embedder.embed("Panadol").unwrap();
        let b = embedder.embed("Adol").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn vectors_are_unit_length() {
        let embedder = HashEmbedder::default();
        let v = embedder.embed("Procid 20 mg").unwrap();
        assert_eq!(v.len(), crate::config::EMBEDDING_DIM);
        let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-4);
    }
}
