// OpenEngram core: n-gram hashing, embedding tables, hyper-connection mixing
// and neural fingerprints. No I/O outside `engine::config`, the checkpoint
// files and `FsContentSource`.

pub mod atoms;
pub mod engine;

pub use atoms::engram_types::{
    AppConfig, EngramConfig, EngramMetadata, FingerprintConfig, FingerprintEntry,
    NeuralFingerprint, RefreshReport, ServerConfig, TokenizerType,
};
pub use atoms::error::{EngramError, EngramResult};
pub use engine::config::{default_config_path, load_config, to_toml};
pub use engine::engram::{
    EngramModule, FingerprintExtractor, FingerprintService, NGramEmbeddingTable, NGramHasher,
    HyperConnectionMixer, TokenEncoder, Tokenizer,
};
