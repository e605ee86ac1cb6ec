// ── Engram Atoms: Types ────────────────────────────────────────────────────
//
// Configuration and data types for the Engram n-gram memory core.
// These are pure data types (no logic beyond validation, no I/O).
//
// Follows the project pattern: structs in atoms/, impls in engine/.

use super::constants::*;
use super::error::{EngramError, EngramResult};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

// ═══════════════════════════════════════════════════════════════════════════
// SECTION 1: Engram Model Configuration
// ═══════════════════════════════════════════════════════════════════════════

/// Which built-in tokenizer to use when no pretrained tokenizer is plugged in.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum TokenizerType {
    /// Word / number / punctuation runs, hashed into the vocabulary.
    #[default]
    Lexical,
    /// One token per UTF-8 byte.
    Byte,
}

/// Engram model configuration. Consumed read-only by every component.
///
/// Shape relationships:
/// - `embed_dim_per_ngram` must be divisible by `heads_per_ngram`.
/// - `hidden_size` must be divisible by `hc_groups` (grouped expand blocks).
/// - every entry of `layer_ids` must be `< num_layers`.
/// - `table_sizes` is either empty (derived per order) or one size per order.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EngramConfig {
    /// Master switch; when false the metadata block reports `hashing_active: false`.
    pub enabled: bool,
    pub max_ngram_size: usize,
    pub embed_dim_per_ngram: usize,
    pub heads_per_ngram: usize,
    /// Backbone layers at which the hyper-connection mixer is applied.
    pub layer_ids: Vec<usize>,
    pub hidden_size: usize,
    pub vocab_size: u32,
    pub num_layers: usize,
    /// Number of parallel hyper-connection branches.
    pub hc_multiplier: usize,
    /// Block count of the grouped expand projection.
    pub hc_groups: usize,
    /// Explicit per-order table sizes (index 0 = order 1). Empty = derived.
    pub table_sizes: Vec<u64>,
    /// Seed for deterministic parameter initialisation.
    pub seed: u64,
    pub tokenizer: TokenizerType,
    /// Trained parameters to load instead of seeding. The checkpoint's
    /// shapes must match this config exactly.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub checkpoint: Option<PathBuf>,
}

impl Default for EngramConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_ngram_size: DEFAULT_MAX_NGRAM_SIZE,
            embed_dim_per_ngram: DEFAULT_EMBED_DIM_PER_NGRAM,
            heads_per_ngram: DEFAULT_HEADS_PER_NGRAM,
            layer_ids: DEFAULT_LAYER_IDS.to_vec(),
            hidden_size: DEFAULT_HIDDEN_SIZE,
            vocab_size: DEFAULT_VOCAB_SIZE,
            num_layers: DEFAULT_NUM_LAYERS,
            hc_multiplier: DEFAULT_HC_MULTIPLIER,
            hc_groups: DEFAULT_HC_GROUPS,
            table_sizes: Vec::new(),
            seed: DEFAULT_PARAM_SEED,
            tokenizer: TokenizerType::Lexical,
            checkpoint: None,
        }
    }
}

impl EngramConfig {
    /// Small configuration for unit tests and benchmarks.
    pub fn tiny() -> Self {
        Self {
            max_ngram_size: 3,
            embed_dim_per_ngram: 16,
            heads_per_ngram: 4,
            layer_ids: vec![1, 3],
            hidden_size: 32,
            vocab_size: 1_000,
            num_layers: 4,
            hc_multiplier: 4,
            hc_groups: 4,
            table_sizes: vec![257, 521, 1_031],
            ..Self::default()
        }
    }

    /// Width of the concatenated n-gram embedding fed to the mixer.
    pub fn embed_width(&self) -> usize {
        self.max_ngram_size * self.embed_dim_per_ngram
    }

    /// Dimension of one embedding head.
    pub fn head_dim(&self) -> usize {
        self.embed_dim_per_ngram / self.heads_per_ngram.max(1)
    }

    /// Rows of the order-`n` table: the listed size, or the base the
    /// derived size is rounded up from (the next prime is a few rows more).
    fn rows_for(&self, n: usize) -> u64 {
        match self.table_sizes.get(n - 1) {
            Some(&rows) => rows,
            None => DEFAULT_TABLE_BASE << (n - 1).min(20),
        }
    }

    /// Number of f32 parameters the module allocates for this config, or
    /// `None` when the count does not fit in a u64.
    pub fn parameter_count(&self) -> Option<u64> {
        let dim = self.embed_dim_per_ngram as u64;
        let mut total = 0u64;
        for n in 1..=self.max_ngram_size {
            total = total.checked_add(self.rows_for(n).checked_mul(dim)?)?;
        }

        let hidden = self.hidden_size as u64;
        let group_dim = hidden / (self.hc_groups.max(1) as u64);
        let expand = (self.hc_multiplier as u64)
            .checked_mul(hidden)?
            .checked_mul(group_dim)?;
        let width = (self.max_ngram_size as u64).checked_mul(dim)?;
        let value = hidden.checked_mul(width)?;
        let per_layer = expand.checked_add(value)?.checked_add(3 * self.hc_multiplier as u64)?;
        total.checked_add(per_layer.checked_mul(self.layer_ids.len() as u64)?)
    }

    /// Check every shape relationship. Never auto-corrects.
    pub fn validate(&self) -> EngramResult<()> {
        let fail = |msg: String| Err(EngramError::Config(msg));

        if self.max_ngram_size == 0 {
            return fail("max_ngram_size must be at least 1".into());
        }
        if self.max_ngram_size > MAX_NGRAM_SIZE {
            return fail(format!(
                "max_ngram_size ({}) exceeds the limit of {}",
                self.max_ngram_size, MAX_NGRAM_SIZE
            ));
        }
        if self.vocab_size == 0 {
            return fail("vocab_size must be positive".into());
        }
        if self.embed_dim_per_ngram == 0 || self.heads_per_ngram == 0 {
            return fail("embed_dim_per_ngram and heads_per_ngram must be positive".into());
        }
        if self.embed_dim_per_ngram % self.heads_per_ngram != 0 {
            return fail(format!(
                "embed_dim_per_ngram ({}) is not divisible by heads_per_ngram ({})",
                self.embed_dim_per_ngram, self.heads_per_ngram
            ));
        }
        if self.hidden_size == 0 || self.hc_multiplier == 0 || self.hc_groups == 0 {
            return fail("hidden_size, hc_multiplier and hc_groups must be positive".into());
        }
        if self.hidden_size % self.hc_groups != 0 {
            return fail(format!(
                "hidden_size ({}) is not divisible by hc_groups ({})",
                self.hidden_size, self.hc_groups
            ));
        }
        if let Some(bad) = self.layer_ids.iter().find(|&&l| l >= self.num_layers) {
            return fail(format!(
                "layer id {} is outside the backbone's {} layers",
                bad, self.num_layers
            ));
        }
        if !self.table_sizes.is_empty() {
            if self.table_sizes.len() != self.max_ngram_size {
                return fail(format!(
                    "table_sizes lists {} orders but max_ngram_size is {}",
                    self.table_sizes.len(),
                    self.max_ngram_size
                ));
            }
            if self.table_sizes.iter().any(|&s| s == 0) {
                return fail("table sizes must be positive".into());
            }
            if let Some(big) = self.table_sizes.iter().find(|&&s| s > MAX_TABLE_SIZE) {
                return fail(format!(
                    "table size {} exceeds the limit of {} rows",
                    big, MAX_TABLE_SIZE
                ));
            }
        }
        match self.parameter_count() {
            Some(count) if count <= MAX_PARAM_COUNT => Ok(()),
            Some(count) => fail(format!(
                "config needs {} parameters, the limit is {}",
                count, MAX_PARAM_COUNT
            )),
            None => fail("parameter count overflows".into()),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// SECTION 2: Fingerprint & Server Configuration
// ═══════════════════════════════════════════════════════════════════════════

/// Which files the project fingerprint map covers.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct FingerprintConfig {
    pub project_root: PathBuf,
    /// Lowercase extensions without the dot. Empty = every file.
    pub extensions: Vec<String>,
    pub ignored_dirs: Vec<String>,
    pub max_files: usize,
    pub max_file_bytes: u64,
}

impl Default for FingerprintConfig {
    fn default() -> Self {
        Self {
            project_root: PathBuf::from("."),
            extensions: ["rs", "py", "ts", "js", "go", "toml", "md", "json", "yaml"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            ignored_dirs: DEFAULT_IGNORED_DIRS.iter().map(|s| s.to_string()).collect(),
            max_files: DEFAULT_MAX_FILES,
            max_file_bytes: DEFAULT_MAX_FILE_BYTES,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    /// "127.0.0.1" (local only) or "0.0.0.0" (LAN)
    pub bind_address: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: DEFAULT_BIND_ADDRESS.into(),
            port: DEFAULT_PORT,
        }
    }
}

/// Top-level `engram.toml` layout.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    pub engram: EngramConfig,
    pub fingerprint: FingerprintConfig,
    pub server: ServerConfig,
}

// ═══════════════════════════════════════════════════════════════════════════
// SECTION 3: Fingerprints & Metadata
// ═══════════════════════════════════════════════════════════════════════════

/// Per-file digest exposed to the UI.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NeuralFingerprint {
    /// Representative anchor token of the file.
    pub token_id: u32,
    /// Display label (file basename).
    pub label: String,
    /// 16-digit lowercase hex digest.
    pub hash: String,
}

/// Cache value. Replaced whole, never mutated in place.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FingerprintEntry {
    pub fingerprint: NeuralFingerprint,
    /// True when the last recomputation failed or the path was invalidated.
    pub stale: bool,
    pub computed_at: chrono::DateTime<chrono::Utc>,
}

/// The `engram` block attached to chat-completion responses.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EngramMetadata {
    pub hashing_active: bool,
    pub current_fingerprint: String,
    /// Distinct buckets touched ÷ table size of the dominant order, in [0, 1].
    pub context_utilization: f64,
}

/// Outcome of one refresh pass over a set of files.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RefreshReport {
    pub updated: usize,
    /// Files invalidated while being read; stored stale for the next pass.
    pub superseded: usize,
    pub failed: usize,
    /// Failed files whose previous entry was kept (marked stale).
    pub stale_retained: usize,
    /// Entries dropped because their file disappeared from the project.
    pub removed: usize,
}
