// ── Engram Atoms: Error Types ──────────────────────────────────────────────
// Single canonical error enum for the core, built with `thiserror`.
//
// Design rules:
//   • Configuration-class variants (order, token, shape) are never patched
//     up by the callee; they surface to whoever built the bad input.
//   • `FingerprintExtraction` is the only variant callers are expected to
//     recover from, and only per file.
//   • The `#[from]` attribute wires std/external error conversions automatically.

use thiserror::Error;

// ── Primary error enum ─────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum EngramError {
    /// N-gram order outside `[1, max_ngram_size]`.
    #[error("Invalid n-gram order {n}: expected 1..={max}")]
    InvalidNGramOrder { n: usize, max: usize },

    /// Token id outside `[0, vocab_size)`.
    #[error("Invalid token id {token}: vocab size is {vocab_size}")]
    InvalidToken { token: u32, vocab_size: u32 },

    /// Window length does not match the requested order.
    #[error("Window length {actual} does not match n-gram order {expected}")]
    WindowLength { expected: usize, actual: usize },

    /// Bucket index past the end of an embedding table.
    #[error("Bucket {bucket} out of range for order {n} (table size {table_size})")]
    BucketOutOfRange { n: usize, bucket: u64, table_size: u64 },

    /// Dimension disagreement between mixer, backbone, parameters or inputs.
    #[error("Shape mismatch in {context}: expected {expected}, got {actual}")]
    ShapeMismatch {
        context: String,
        expected: usize,
        actual: usize,
    },

    /// File content could not be read for fingerprinting.
    #[error("Fingerprint extraction failed for {path}: {source}")]
    FingerprintExtraction {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Engram configuration is invalid.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Filesystem or OS-level I/O failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization / deserialization failure.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// TOML config parse failure.
    #[error("Config parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Parameter checkpoint encode/decode failure.
    #[error("Checkpoint error: {0}")]
    Checkpoint(String),
}

// ── Convenience constructors ───────────────────────────────────────────────

impl EngramError {
    /// Create a shape mismatch error for the named tensor or parameter.
    pub fn shape(context: impl Into<String>, expected: usize, actual: usize) -> Self {
        Self::ShapeMismatch { context: context.into(), expected, actual }
    }

    /// Create a per-file extraction error.
    pub fn extraction(path: impl Into<String>, source: std::io::Error) -> Self {
        Self::FingerprintExtraction { path: path.into(), source }
    }

    /// True for errors caused by the caller's input rather than by the
    /// environment. The HTTP layer maps these to 400.
    pub fn is_caller_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidNGramOrder { .. }
                | Self::InvalidToken { .. }
                | Self::WindowLength { .. }
                | Self::BucketOutOfRange { .. }
                | Self::ShapeMismatch { .. }
        )
    }
}

impl From<rmp_serde::encode::Error> for EngramError {
    fn from(e: rmp_serde::encode::Error) -> Self {
        EngramError::Checkpoint(e.to_string())
    }
}

impl From<rmp_serde::decode::Error> for EngramError {
    fn from(e: rmp_serde::decode::Error) -> Self {
        EngramError::Checkpoint(e.to_string())
    }
}

// ── Convenience alias ──────────────────────────────────────────────────────

/// All core operations return this type.
pub type EngramResult<T> = Result<T, EngramError>;
