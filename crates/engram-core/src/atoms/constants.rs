// ── Engram Atoms: Constants ────────────────────────────────────────────────
// All named constants for the core live here.
// Hashing and fold constants are part of the on-disk/over-the-wire contract:
// changing any of them changes every bucket and every fingerprint digest.

// ── Model shape defaults ──────────────────────────────────────────────────
pub const DEFAULT_MAX_NGRAM_SIZE: usize = 3;
pub const DEFAULT_EMBED_DIM_PER_NGRAM: usize = 512;
pub const DEFAULT_HEADS_PER_NGRAM: usize = 8;
pub const DEFAULT_LAYER_IDS: [usize; 2] = [1, 15];
pub const DEFAULT_HIDDEN_SIZE: usize = 1024;
pub const DEFAULT_VOCAB_SIZE: u32 = 129_280;
pub const DEFAULT_NUM_LAYERS: usize = 30;
pub const DEFAULT_HC_MULTIPLIER: usize = 4;
pub const DEFAULT_HC_GROUPS: usize = 8;

/// Seed for deterministic parameter initialisation when no checkpoint is loaded.
pub const DEFAULT_PARAM_SEED: u64 = 0x5EED_E6A7_0000_0001;

// ── Hash table sizing ─────────────────────────────────────────────────────
// table_size(n) = next_prime(DEFAULT_TABLE_BASE << (n - 1)) unless the
// config lists explicit sizes. Higher orders see more distinct windows,
// so each order doubles the previous capacity.
pub const DEFAULT_TABLE_BASE: u64 = 4_096;

// ── Size limits ───────────────────────────────────────────────────────────
// Upper bounds checked by `EngramConfig::validate` before anything is
// allocated. MAX_PARAM_COUNT counts f32 values (tables plus every mixer).
pub const MAX_NGRAM_SIZE: usize = 8;
pub const MAX_TABLE_SIZE: u64 = 1 << 31;
pub const MAX_PARAM_COUNT: u64 = 1 << 31;

// ── Per-position primes ───────────────────────────────────────────────────
// P(n, i) = next_prime(PRIME_BASE + slot(n, i) * PRIME_STRIDE)
// with slot(n, i) = n(n-1)/2 + i. The stride is far larger than the prime
// gap at this magnitude, so every (n, i) pair gets a distinct prime.
pub const PRIME_BASE: u64 = 1_000_000_007;
pub const PRIME_STRIDE: u64 = 104_729;

// ── Fingerprint fold ──────────────────────────────────────────────────────
pub const FOLD_SEED: u64 = 0xcbf2_9ce4_8422_2325;
pub const FOLD_MULT: u64 = 0x9E37_79B9_7F4A_7C15;
pub const FOLD_ROTATE: u32 = 17;

// ── Lexical tokenizer (FNV-1a) ────────────────────────────────────────────
pub const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
pub const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

// ── Fingerprint project scan ──────────────────────────────────────────────
pub const DEFAULT_MAX_FILES: usize = 2_000;
pub const DEFAULT_MAX_FILE_BYTES: u64 = 1_048_576; // 1 MiB
pub const DEFAULT_IGNORED_DIRS: [&str; 7] = [
    ".git",
    "target",
    "node_modules",
    "dist",
    "build",
    "__pycache__",
    ".venv",
];

// ── HTTP server ───────────────────────────────────────────────────────────
pub const DEFAULT_BIND_ADDRESS: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 3940;

// ── Config file location ──────────────────────────────────────────────────
pub const CONFIG_DIR_NAME: &str = "openengram";
pub const CONFIG_FILE_NAME: &str = "engram.toml";
