// ── Engram: Context Metadata ────────────────────────────────────────────────
//
// Builds the `engram` block attached to chat-completion responses.
//
// context_utilization = distinct buckets of the dominant order touched by
// the context ÷ that order's table size. The dominant order is the highest
// order that has at least one full window in the context. It is a
// saturation heuristic, not a hard limit.

use super::fingerprint::{digest_hex, fold_digest};
use super::hasher::NGramHasher;
use crate::atoms::engram_types::{EngramConfig, EngramMetadata};
use crate::atoms::error::EngramResult;
use std::collections::HashSet;

/// Highest order with a full window in a context of `len` tokens (0 if none).
pub fn dominant_order(hasher: &NGramHasher, len: usize) -> usize {
    hasher.max_ngram_size().min(len)
}

pub fn context_utilization(hasher: &NGramHasher, tokens: &[u32]) -> EngramResult<f64> {
    let n = dominant_order(hasher, tokens.len());
    if n == 0 {
        return Ok(0.0);
    }
    let distinct: HashSet<u64> = hasher.hash_windows(tokens, n)?.into_iter().collect();
    let ratio = distinct.len() as f64 / hasher.table_size(n)? as f64;
    Ok(ratio.clamp(0.0, 1.0))
}

pub fn context_metadata(
    config: &EngramConfig,
    hasher: &NGramHasher,
    tokens: &[u32],
) -> EngramResult<EngramMetadata> {
    Ok(EngramMetadata {
        hashing_active: config.enabled && !tokens.is_empty(),
        current_fingerprint: digest_hex(fold_digest(hasher, tokens)?),
        context_utilization: context_utilization(hasher, tokens)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_hasher() -> NGramHasher {
        NGramHasher::with_constants(
            vec![vec![2], vec![5, 11], vec![3, 7, 13]],
            vec![8, 8, 4],
            1_000,
        )
        .unwrap()
    }

    #[test]
    fn test_empty_context() {
        let hasher = small_hasher();
        let meta = context_metadata(&EngramConfig::tiny(), &hasher, &[]).unwrap();
        assert!(!meta.hashing_active);
        assert_eq!(meta.context_utilization, 0.0);
    }

    #[test]
    fn test_dominant_order_follows_context_length() {
        let hasher = small_hasher();
        assert_eq!(dominant_order(&hasher, 0), 0);
        assert_eq!(dominant_order(&hasher, 2), 2);
        assert_eq!(dominant_order(&hasher, 50), 3);
    }

    #[test]
    fn test_utilization_counts_distinct_buckets() {
        let hasher = small_hasher();
        // Three identical trigrams touch exactly one of 4 buckets.
        let tokens = [1, 1, 1, 1, 1];
        let util = context_utilization(&hasher, &tokens).unwrap();
        assert!((util - 0.25).abs() < 1e-12);
    }

    #[test]
    fn test_utilization_is_clamped() {
        let hasher = small_hasher();
        let tokens: Vec<u32> = (0..500).collect();
        let util = context_utilization(&hasher, &tokens).unwrap();
        assert!(util > 0.0 && util <= 1.0);
    }

    #[test]
    fn test_disabled_config_reports_inactive() {
        let hasher = small_hasher();
        let config = EngramConfig {
            enabled: false,
            ..EngramConfig::tiny()
        };
        let meta = context_metadata(&config, &hasher, &[1, 2, 3]).unwrap();
        assert!(!meta.hashing_active);
        assert_eq!(meta.current_fingerprint.len(), 16);
    }
}
