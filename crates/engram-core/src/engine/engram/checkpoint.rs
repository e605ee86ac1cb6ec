// ── Engram: Parameter Checkpoints ───────────────────────────────────────────
//
// MessagePack snapshot of every trained parameter (tables + mixers) plus the
// config they were trained under. Loading never reshapes anything: any
// dimension that disagrees with the active config is a ShapeMismatch.

use super::embedding_table::OrderTable;
use super::hyper_connection::MixerParams;
use crate::atoms::engram_types::EngramConfig;
use crate::atoms::error::{EngramError, EngramResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

pub const CHECKPOINT_FORMAT_VERSION: u32 = 1;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EngramCheckpoint {
    pub format_version: u32,
    pub config: EngramConfig,
    pub tables: Vec<OrderTable>,
    pub mixers: BTreeMap<usize, MixerParams>,
}

impl EngramCheckpoint {
    pub fn new(
        config: EngramConfig,
        tables: Vec<OrderTable>,
        mixers: BTreeMap<usize, MixerParams>,
    ) -> Self {
        Self {
            format_version: CHECKPOINT_FORMAT_VERSION,
            config,
            tables,
            mixers,
        }
    }

    pub fn save(&self, path: &Path) -> EngramResult<()> {
        let bytes = rmp_serde::to_vec_named(self)?;
        std::fs::write(path, &bytes)?;
        log::info!(
            "[engram:checkpoint] Saved {} bytes to {}",
            bytes.len(),
            path.display()
        );
        Ok(())
    }

    pub fn load(path: &Path) -> EngramResult<Self> {
        let bytes = std::fs::read(path)?;
        let ckpt: Self = rmp_serde::from_slice(&bytes)?;
        if ckpt.format_version != CHECKPOINT_FORMAT_VERSION {
            return Err(EngramError::Checkpoint(format!(
                "unsupported checkpoint format {} (expected {})",
                ckpt.format_version, CHECKPOINT_FORMAT_VERSION
            )));
        }
        log::info!("[engram:checkpoint] Loaded {}", path.display());
        Ok(ckpt)
    }

    /// Every shape-bearing field must match the active config exactly.
    pub fn check_compatible(&self, active: &EngramConfig) -> EngramResult<()> {
        let ours = &self.config;
        let pairs = [
            ("checkpoint max_ngram_size", active.max_ngram_size, ours.max_ngram_size),
            ("checkpoint embed_dim_per_ngram", active.embed_dim_per_ngram, ours.embed_dim_per_ngram),
            ("checkpoint heads_per_ngram", active.heads_per_ngram, ours.heads_per_ngram),
            ("checkpoint hidden_size", active.hidden_size, ours.hidden_size),
            ("checkpoint hc_multiplier", active.hc_multiplier, ours.hc_multiplier),
            ("checkpoint hc_groups", active.hc_groups, ours.hc_groups),
            ("checkpoint vocab_size", active.vocab_size as usize, ours.vocab_size as usize),
        ];
        for (what, expected, actual) in pairs {
            if expected != actual {
                return Err(EngramError::shape(what, expected, actual));
            }
        }
        if active.table_sizes != ours.table_sizes {
            return Err(EngramError::Config(format!(
                "checkpoint table sizes {:?} differ from configured {:?}",
                ours.table_sizes, active.table_sizes
            )));
        }
        Ok(())
    }
}
