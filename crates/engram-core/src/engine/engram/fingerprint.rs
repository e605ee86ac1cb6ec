// ── Engram: Neural Fingerprints ─────────────────────────────────────────────
//
// Whole-file summaries built from the same hasher and embedding tables the
// model uses per position:
//
//   token_id  anchor: the token whose unigram bucket row has the largest L2
//             norm in the order-1 table (earliest position wins ties)
//   hash      every bucket of every order folded left to right with a
//             position weight, printed as 16 hex digits
//   label     file basename
//
// Pure over its inputs: identical content always gives an identical
// fingerprint. File access goes through `ContentSource` so the extractor
// itself never does I/O.

use super::embedding_table::NGramEmbeddingTable;
use super::hasher::NGramHasher;
use super::module::EngramModule;
use super::tokenizer::TokenEncoder;
use crate::atoms::constants::{FOLD_MULT, FOLD_ROTATE, FOLD_SEED};
use crate::atoms::engram_types::NeuralFingerprint;
use crate::atoms::error::{EngramError, EngramResult};
use std::io::Read;
use std::path::Path;
use std::sync::Arc;

// ═══════════════════════════════════════════════════════════════════════════
// Digest fold
// ═══════════════════════════════════════════════════════════════════════════

/// Fold all n-gram buckets of `tokens` into one value.
///
/// Orders ascend, windows run left to right; window `t` of order `n` is
/// weighted by `(2t + 1) * P(n, 0)` before it is XORed in, so moving a
/// window changes its contribution.
pub fn fold_digest(hasher: &NGramHasher, tokens: &[u32]) -> EngramResult<u64> {
    let mut acc = FOLD_SEED;
    for n in 1..=hasher.max_ngram_size() {
        let order_weight = hasher.prime(n, 0)?;
        for (t, bucket) in hasher.hash_windows(tokens, n)?.into_iter().enumerate() {
            let weighted = (bucket + 1)
                .wrapping_mul(2 * t as u64 + 1)
                .wrapping_mul(order_weight);
            acc = (acc ^ weighted).rotate_left(FOLD_ROTATE).wrapping_mul(FOLD_MULT);
        }
    }
    Ok(acc ^ tokens.len() as u64)
}

pub fn digest_hex(digest: u64) -> String {
    format!("{:016x}", digest)
}

/// Display label for a path: its basename, or the path itself.
pub fn label_for(path: &str) -> String {
    Path::new(path)
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.to_string())
}

// ═══════════════════════════════════════════════════════════════════════════
// Content source (external I/O collaborator)
// ═══════════════════════════════════════════════════════════════════════════

pub trait ContentSource: Send + Sync {
    fn read(&self, path: &Path) -> std::io::Result<String>;
}

/// Reads UTF-8 files from disk, refusing anything over `max_bytes`.
pub struct FsContentSource {
    max_bytes: u64,
}

impl FsContentSource {
    pub fn new(max_bytes: u64) -> Self {
        Self { max_bytes }
    }
}

impl ContentSource for FsContentSource {
    fn read(&self, path: &Path) -> std::io::Result<String> {
        let too_big = |len: u64| {
            std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                format!("file is {} bytes, limit is {}", len, self.max_bytes),
            )
        };
        let file = std::fs::File::open(path)?;
        let len = file.metadata()?.len();
        if len > self.max_bytes {
            return Err(too_big(len));
        }
        // The file may grow after the metadata check; one byte past the
        // limit is enough to tell.
        let mut content = String::with_capacity(len as usize);
        file.take(self.max_bytes.saturating_add(1)).read_to_string(&mut content)?;
        if content.len() as u64 > self.max_bytes {
            return Err(too_big(content.len() as u64));
        }
        Ok(content)
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Extractor
// ═══════════════════════════════════════════════════════════════════════════

pub struct FingerprintExtractor {
    hasher: Arc<NGramHasher>,
    tokenizer: Arc<dyn TokenEncoder>,
    /// L2 norm of every order-1 row, indexed by bucket.
    anchor_norms: Vec<f32>,
}

impl FingerprintExtractor {
    pub fn new(
        hasher: Arc<NGramHasher>,
        tables: &NGramEmbeddingTable,
        tokenizer: Arc<dyn TokenEncoder>,
    ) -> EngramResult<Self> {
        if tokenizer.vocab_size() > hasher.vocab_size() {
            return Err(EngramError::Config(format!(
                "tokenizer vocab ({}) exceeds model vocab ({})",
                tokenizer.vocab_size(),
                hasher.vocab_size()
            )));
        }
        let rows = hasher.table_size(1)?;
        let anchor_norms = (0..rows)
            .map(|b| tables.row_norm(1, b))
            .collect::<EngramResult<Vec<f32>>>()?;

        Ok(Self {
            hasher,
            tokenizer,
            anchor_norms,
        })
    }

    pub fn from_module(module: &EngramModule, tokenizer: Arc<dyn TokenEncoder>) -> EngramResult<Self> {
        Self::new(module.hasher(), &module.tables(), tokenizer)
    }

    pub fn tokenizer(&self) -> &dyn TokenEncoder {
        self.tokenizer.as_ref()
    }

    pub fn hasher(&self) -> &NGramHasher {
        &self.hasher
    }

    /// The anchor token of a sequence; 0 for an empty one.
    pub fn anchor_token(&self, tokens: &[u32]) -> EngramResult<u32> {
        let buckets = self.hasher.hash_windows(tokens, 1)?;
        let mut best: Option<(u32, f32)> = None;
        for (&token, bucket) in tokens.iter().zip(buckets) {
            let norm = self.anchor_norms[bucket as usize];
            match best {
                Some((_, best_norm)) if norm <= best_norm => {}
                _ => best = Some((token, norm)),
            }
        }
        Ok(best.map(|(t, _)| t).unwrap_or(0))
    }

    /// Fingerprint already-tokenized content.
    pub fn extract_tokens(&self, path: &str, tokens: &[u32]) -> EngramResult<NeuralFingerprint> {
        Ok(NeuralFingerprint {
            token_id: self.anchor_token(tokens)?,
            label: label_for(path),
            hash: digest_hex(fold_digest(&self.hasher, tokens)?),
        })
    }

    /// Read `path` through `source` and fingerprint it.
    pub fn extract_file(
        &self,
        source: &dyn ContentSource,
        path: &Path,
    ) -> EngramResult<NeuralFingerprint> {
        let key = path.to_string_lossy();
        let content = source
            .read(path)
            .map_err(|e| EngramError::extraction(key.to_string(), e))?;
        self.extract(&key, &content)
    }

    /// Fingerprint `content` as the body of `path`.
    pub fn extract(&self, path: &str, content: &str) -> EngramResult<NeuralFingerprint> {
        let tokens = self.tokenizer.encode(content);
        log::trace!("[engram:fingerprint] {} → {} tokens", path, tokens.len());
        self.extract_tokens(path, &tokens)
    }
}
