// state.rs: Shared server state.
// One EngramModule and one FingerprintService per process; handlers clone
// the cheap `EngramState` handle and read through the Arcs.

use engram_core::atoms::engram_types::AppConfig;
use engram_core::atoms::error::EngramResult;
use engram_core::engine::engram::{
    EngramModule, FingerprintExtractor, FingerprintService, FsContentSource, TokenEncoder,
    Tokenizer,
};
use log::info;
use std::sync::Arc;

#[derive(Clone)]
pub struct EngramState {
    inner: Arc<StateInner>,
}

struct StateInner {
    config: AppConfig,
    module: Arc<EngramModule>,
    tokenizer: Arc<dyn TokenEncoder>,
    fingerprints: Arc<FingerprintService>,
}

impl EngramState {
    /// Build the module (from `engram.checkpoint` when set, seeded
    /// otherwise) and a filesystem-backed fingerprint service rooted at
    /// `config.fingerprint.project_root`.
    pub fn new(config: AppConfig) -> EngramResult<Self> {
        let tokenizer: Arc<dyn TokenEncoder> = Arc::new(Tokenizer::new(
            config.engram.tokenizer,
            config.engram.vocab_size,
        ));
        Self::with_tokenizer(config, tokenizer)
    }

    /// Same as `new` with a caller-supplied tokenizer (e.g. a pretrained one).
    pub fn with_tokenizer(config: AppConfig, tokenizer: Arc<dyn TokenEncoder>) -> EngramResult<Self> {
        let module = Arc::new(EngramModule::load(
            config.engram.clone(),
            config.engram.hidden_size,
        )?);
        let extractor = FingerprintExtractor::from_module(&module, Arc::clone(&tokenizer))?;
        let fingerprints = Arc::new(FingerprintService::new(
            extractor,
            Box::new(FsContentSource::new(config.fingerprint.max_file_bytes)),
            config.fingerprint.clone(),
        ));

        info!(
            "[server] Engram state ready (project root {})",
            config.fingerprint.project_root.display()
        );

        Ok(Self {
            inner: Arc::new(StateInner {
                config,
                module,
                tokenizer,
                fingerprints,
            }),
        })
    }

    pub fn config(&self) -> &AppConfig {
        &self.inner.config
    }

    pub fn module(&self) -> Arc<EngramModule> {
        Arc::clone(&self.inner.module)
    }

    pub fn tokenizer(&self) -> Arc<dyn TokenEncoder> {
        Arc::clone(&self.inner.tokenizer)
    }

    pub fn fingerprints(&self) -> Arc<FingerprintService> {
        Arc::clone(&self.inner.fingerprints)
    }
}
