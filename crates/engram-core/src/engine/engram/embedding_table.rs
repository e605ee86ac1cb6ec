// ── Engram: N-gram Embedding Tables ─────────────────────────────────────────
//
// One learned table per n-gram order, indexed by hash bucket. Rows are
// `embed_dim_per_ngram` wide and split into `heads_per_ngram` equal heads.
//
// Tables are trained parameters owned by whoever loads the model. At
// inference they are read-only and shared across threads behind an `Arc`.
//
// Lookups for several orders of the same position are independent; their
// rows are concatenated (never summed) so the mixer sees each order's
// signal separately.

use super::hasher::NGramHasher;
use super::init::ParamRng;
use crate::atoms::engram_types::EngramConfig;
use crate::atoms::error::{EngramError, EngramResult};
use serde::{Deserialize, Serialize};

/// Weights of a single order, row-major `[table_size, embed_dim]`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OrderTable {
    pub n: usize,
    pub table_size: u64,
    pub weights: Vec<f32>,
}

/// `rows * dim` as a buffer length, or a Config error when it cannot be one.
fn weight_len(n: usize, rows: u64, dim: usize) -> EngramResult<usize> {
    usize::try_from(rows)
        .ok()
        .and_then(|rows| rows.checked_mul(dim))
        .ok_or_else(|| {
            EngramError::Config(format!(
                "order {} table of {} rows × {} dims does not fit in memory",
                n, rows, dim
            ))
        })
}

#[derive(Debug, Clone)]
pub struct NGramEmbeddingTable {
    /// `tables[n - 1]` holds order `n`.
    tables: Vec<OrderTable>,
    embed_dim: usize,
    heads: usize,
}

impl NGramEmbeddingTable {
    /// Deterministically initialised tables sized from the hasher.
    pub fn seeded(hasher: &NGramHasher, config: &EngramConfig, seed: u64) -> EngramResult<Self> {
        let dim = config.embed_dim_per_ngram;
        let scale = (1.0 / dim as f32).sqrt();
        let mut tables = Vec::with_capacity(hasher.max_ngram_size());

        for n in 1..=hasher.max_ngram_size() {
            let table_size = hasher.table_size(n)?;
            let mut weights = vec![0.0f32; weight_len(n, table_size, dim)?];
            ParamRng::derive(seed, n as u64).fill_uniform(&mut weights, scale);
            tables.push(OrderTable {
                n,
                table_size,
                weights,
            });
        }

        log::info!(
            "[engram:embedding] Initialised {} tables ({} rows total, dim {})",
            tables.len(),
            tables.iter().map(|t| t.table_size).sum::<u64>(),
            dim
        );

        Self::from_weights(tables, hasher, config)
    }

    /// Wrap trained weights, checking every table against the hasher and config.
    pub fn from_weights(
        tables: Vec<OrderTable>,
        hasher: &NGramHasher,
        config: &EngramConfig,
    ) -> EngramResult<Self> {
        if tables.len() != hasher.max_ngram_size() {
            return Err(EngramError::shape(
                "embedding table count",
                hasher.max_ngram_size(),
                tables.len(),
            ));
        }
        let dim = config.embed_dim_per_ngram;
        for (idx, table) in tables.iter().enumerate() {
            let n = idx + 1;
            if table.n != n {
                return Err(EngramError::shape("embedding table order", n, table.n));
            }
            let expected_rows = hasher.table_size(n)?;
            if table.table_size != expected_rows {
                return Err(EngramError::shape(
                    format!("order {} table rows", n),
                    expected_rows as usize,
                    table.table_size as usize,
                ));
            }
            let expected_len = weight_len(n, expected_rows, dim)?;
            if table.weights.len() != expected_len {
                return Err(EngramError::shape(
                    format!("order {} table weights", n),
                    expected_len,
                    table.weights.len(),
                ));
            }
        }
        Ok(Self {
            tables,
            embed_dim: dim,
            heads: config.heads_per_ngram,
        })
    }

    pub fn embed_dim(&self) -> usize {
        self.embed_dim
    }

    pub fn heads_per_ngram(&self) -> usize {
        self.heads
    }

    pub fn max_ngram_size(&self) -> usize {
        self.tables.len()
    }

    /// Width of a full concatenation across all orders.
    pub fn concat_width(&self) -> usize {
        self.tables.len() * self.embed_dim
    }

    /// Raw tables, for checkpointing.
    pub fn tables(&self) -> &[OrderTable] {
        &self.tables
    }

    /// The embedding row for `bucket` in the order-`n` table.
    pub fn lookup(&self, n: usize, bucket: u64) -> EngramResult<&[f32]> {
        let table = n
            .checked_sub(1)
            .and_then(|i| self.tables.get(i))
            .ok_or(EngramError::InvalidNGramOrder {
                n,
                max: self.tables.len(),
            })?;
        if bucket >= table.table_size {
            return Err(EngramError::BucketOutOfRange {
                n,
                bucket,
                table_size: table.table_size,
            });
        }
        let start = bucket as usize * self.embed_dim;
        Ok(&table.weights[start..start + self.embed_dim])
    }

    /// The row split into `heads_per_ngram` equal heads.
    pub fn heads(&self, n: usize, bucket: u64) -> EngramResult<impl Iterator<Item = &[f32]>> {
        let row = self.lookup(n, bucket)?;
        Ok(row.chunks_exact(self.embed_dim / self.heads))
    }

    /// L2 norm of a row.
    pub fn row_norm(&self, n: usize, bucket: u64) -> EngramResult<f32> {
        let row = self.lookup(n, bucket)?;
        Ok(row.iter().map(|v| v * v).sum::<f32>().sqrt())
    }

    /// Concatenate one row per order. `buckets[n - 1]` is order `n`'s bucket
    /// or `None` when that order has no full window here; missing orders are
    /// zero-filled so the width is always `concat_width()`.
    pub fn concat(&self, buckets: &[Option<u64>]) -> EngramResult<Vec<f32>> {
        if buckets.len() != self.tables.len() {
            return Err(EngramError::shape(
                "bucket list length",
                self.tables.len(),
                buckets.len(),
            ));
        }
        let mut out = Vec::with_capacity(self.concat_width());
        for (idx, bucket) in buckets.iter().enumerate() {
            match bucket {
                Some(b) => out.extend_from_slice(self.lookup(idx + 1, *b)?),
                None => out.extend(std::iter::repeat(0.0).take(self.embed_dim)),
            }
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tiny() -> (EngramConfig, NGramHasher, NGramEmbeddingTable) {
        let cfg = EngramConfig::tiny();
        let hasher = NGramHasher::from_config(&cfg).unwrap();
        let table = NGramEmbeddingTable::seeded(&hasher, &cfg, 7).unwrap();
        (cfg, hasher, table)
    }

    #[test]
    fn test_lookup_shape() {
        let (cfg, _, table) = tiny();
        let row = table.lookup(2, 100).unwrap();
        assert_eq!(row.len(), cfg.embed_dim_per_ngram);
        assert!(row.iter().any(|v| *v != 0.0));
    }

    #[test]
    fn test_unallocatable_table_is_config_error() {
        let cfg = EngramConfig::tiny();
        let hasher = NGramHasher::with_constants(vec![vec![2]], vec![u64::MAX], 100).unwrap();
        assert!(matches!(
            NGramEmbeddingTable::seeded(&hasher, &cfg, 7),
            Err(EngramError::Config(_))
        ));
        let claimed = OrderTable {
            n: 1,
            table_size: u64::MAX,
            weights: Vec::new(),
        };
        assert!(matches!(
            NGramEmbeddingTable::from_weights(vec![claimed], &hasher, &cfg),
            Err(EngramError::Config(_))
        ));
    }

    #[test]
    fn test_heads_split_evenly() {
        let (cfg, _, table) = tiny();
        let heads: Vec<&[f32]> = table.heads(1, 3).unwrap().collect();
        assert_eq!(heads.len(), cfg.heads_per_ngram);
        assert!(heads.iter().all(|h| h.len() == cfg.head_dim()));
        let joined: Vec<f32> = heads.concat();
        assert_eq!(joined.as_slice(), table.lookup(1, 3).unwrap());
    }

    #[test]
    fn test_bounds_check() {
        let (_, hasher, table) = tiny();
        let size = hasher.table_size(3).unwrap();
        assert!(table.lookup(3, size - 1).is_ok());
        assert!(matches!(
            table.lookup(3, size),
            Err(EngramError::BucketOutOfRange { n: 3, .. })
        ));
        assert!(matches!(
            table.lookup(0, 0),
            Err(EngramError::InvalidNGramOrder { n: 0, .. })
        ));
        assert!(matches!(
            table.lookup(4, 0),
            Err(EngramError::InvalidNGramOrder { n: 4, .. })
        ));
    }

    #[test]
    fn test_seeded_is_deterministic() {
        let (cfg, hasher, a) = tiny();
        let b = NGramEmbeddingTable::seeded(&hasher, &cfg, 7).unwrap();
        let c = NGramEmbeddingTable::seeded(&hasher, &cfg, 8).unwrap();
        assert_eq!(a.lookup(3, 11).unwrap(), b.lookup(3, 11).unwrap());
        assert_ne!(a.lookup(3, 11).unwrap(), c.lookup(3, 11).unwrap());
    }

    #[test]
    fn test_concat_preserves_each_order() {
        let (cfg, _, table) = tiny();
        let dim = cfg.embed_dim_per_ngram;
        let out = table.concat(&[Some(1), Some(2), Some(3)]).unwrap();
        assert_eq!(out.len(), 3 * dim);
        assert_eq!(&out[..dim], table.lookup(1, 1).unwrap());
        assert_eq!(&out[dim..2 * dim], table.lookup(2, 2).unwrap());
        assert_eq!(&out[2 * dim..], table.lookup(3, 3).unwrap());
    }

    #[test]
    fn test_concat_zero_fills_missing_orders() {
        let (cfg, _, table) = tiny();
        let dim = cfg.embed_dim_per_ngram;
        let out = table.concat(&[Some(5), None, None]).unwrap();
        assert_eq!(out.len(), table.concat_width());
        assert!(out[dim..].iter().all(|v| *v == 0.0));
    }

    #[test]
    fn test_from_weights_rejects_bad_shape() {
        let (cfg, hasher, table) = tiny();
        let mut tables = table.tables().to_vec();
        tables[1].weights.pop();
        assert!(matches!(
            NGramEmbeddingTable::from_weights(tables, &hasher, &cfg),
            Err(EngramError::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn test_row_norm_positive() {
        let (_, _, table) = tiny();
        assert!(table.row_norm(1, 0).unwrap() > 0.0);
    }
}
