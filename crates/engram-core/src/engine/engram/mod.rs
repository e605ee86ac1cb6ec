// ── Engram: N-gram Memory Core ──────────────────────────────────────────────
//
// Conditional memory for a transformer backbone: every causal n-gram window
// of the token stream is hashed into a fixed embedding table, and the
// retrieved rows are gated into the residual stream at a few chosen layers.
//
// Pipeline:
//   tokens → hasher → embedding_table → hyper_connection (per engram layer)
//
// Sub-modules:
//   - tokenizer: Built-in text → token id encoders (lexical, byte)
//   - primes: Deterministic prime constants and default table sizes
//   - hasher: Multiplicative-XOR n-gram hashing into bounded buckets
//   - init: Seeded parameter initialisation
//   - embedding_table: Per-order bucket → multi-head embedding rows
//   - hyper_connection: Multi-branch gated mixing into hidden states
//   - module: Backbone integration (hash → lookup → mix per layer)
//   - checkpoint: MessagePack parameter snapshots
//   - fingerprint: Whole-file anchor token + digest extraction
//   - fingerprint_cache: Path → fingerprint cache and refresh service
//   - project_scan: Deterministic project file listing
//   - context: `engram` metadata block for chat responses

pub mod checkpoint;
pub mod context;
pub mod embedding_table;
pub mod fingerprint;
pub mod fingerprint_cache;
pub mod hasher;
pub mod hyper_connection;
pub mod init;
pub mod module;
pub mod primes;
pub mod project_scan;
pub mod tokenizer;

pub use checkpoint::EngramCheckpoint;
pub use embedding_table::NGramEmbeddingTable;
pub use fingerprint::{ContentSource, FingerprintExtractor, FsContentSource};
pub use fingerprint_cache::{Commit, FingerprintCache, FingerprintService, ReadTicket};
pub use hasher::NGramHasher;
pub use hyper_connection::{HyperConnectionMixer, MixerParams, MixerShape};
pub use module::EngramModule;
pub use tokenizer::{TokenEncoder, Tokenizer};
