// ── Engram: Module (backbone integration) ───────────────────────────────────
//
// Ties the pieces together for one backbone:
//   tokens → NGramHasher (all orders, causal) → NGramEmbeddingTable (concat)
//          → HyperConnectionMixer at each layer in `layer_ids`
//
// Parameters are passed in explicitly (seeded or from a checkpoint); there
// is no global state. The module is immutable after construction, so one
// `Arc<EngramModule>` serves any number of concurrent forward passes.

use super::checkpoint::EngramCheckpoint;
use super::context::context_metadata;
use super::embedding_table::{NGramEmbeddingTable, OrderTable};
use super::hasher::NGramHasher;
use super::hyper_connection::{HyperConnectionMixer, MixerParams, MixerShape};
use crate::atoms::engram_types::{EngramConfig, EngramMetadata};
use crate::atoms::error::{EngramError, EngramResult};
use std::borrow::Cow;
use std::collections::BTreeMap;
use std::sync::Arc;

pub struct EngramModule {
    config: EngramConfig,
    hasher: Arc<NGramHasher>,
    tables: Arc<NGramEmbeddingTable>,
    mixers: BTreeMap<usize, HyperConnectionMixer>,
}

impl EngramModule {
    /// Build a module with deterministically seeded parameters.
    pub fn new(config: EngramConfig, backbone_hidden_size: usize) -> EngramResult<Self> {
        config.validate()?;
        let hasher = NGramHasher::from_config(&config)?;
        let tables = NGramEmbeddingTable::seeded(&hasher, &config, config.seed)?;
        let shape = MixerShape::from_config(&config);
        let mixers = config
            .layer_ids
            .iter()
            .map(|&layer| (layer, MixerParams::seeded(shape, config.seed ^ layer as u64)))
            .collect();
        Self::assemble(config, hasher, tables, mixers, backbone_hidden_size)
    }

    /// Build a module from trained parameters.
    pub fn from_parts(
        config: EngramConfig,
        tables: Vec<OrderTable>,
        mixers: BTreeMap<usize, MixerParams>,
        backbone_hidden_size: usize,
    ) -> EngramResult<Self> {
        config.validate()?;
        let hasher = NGramHasher::from_config(&config)?;
        let tables = NGramEmbeddingTable::from_weights(tables, &hasher, &config)?;
        Self::assemble(config, hasher, tables, mixers, backbone_hidden_size)
    }

    /// Build the module the config asks for: trained parameters from
    /// `config.checkpoint` when set, seeded parameters otherwise.
    pub fn load(config: EngramConfig, backbone_hidden_size: usize) -> EngramResult<Self> {
        match config.checkpoint.clone() {
            Some(path) => {
                config.validate()?;
                let checkpoint = EngramCheckpoint::load(&path)?;
                Self::from_checkpoint(config, checkpoint, backbone_hidden_size)
            }
            None => Self::new(config, backbone_hidden_size),
        }
    }

    /// Build a module from a checkpoint, checking it against the active config.
    pub fn from_checkpoint(
        config: EngramConfig,
        checkpoint: EngramCheckpoint,
        backbone_hidden_size: usize,
    ) -> EngramResult<Self> {
        checkpoint.check_compatible(&config)?;
        Self::from_parts(config, checkpoint.tables, checkpoint.mixers, backbone_hidden_size)
    }

    fn assemble(
        config: EngramConfig,
        hasher: NGramHasher,
        tables: NGramEmbeddingTable,
        mixers: BTreeMap<usize, MixerParams>,
        backbone_hidden_size: usize,
    ) -> EngramResult<Self> {
        let mut bound = BTreeMap::new();
        for &layer in &config.layer_ids {
            let params = mixers.get(&layer).cloned().ok_or_else(|| {
                EngramError::Config(format!("no mixer parameters for engram layer {}", layer))
            })?;
            bound.insert(layer, HyperConnectionMixer::new(&config, params, backbone_hidden_size)?);
        }
        if let Some(extra) = mixers.keys().find(|l| !config.layer_ids.contains(l)) {
            return Err(EngramError::Config(format!(
                "mixer parameters for layer {} which is not an engram layer",
                extra
            )));
        }

        log::info!(
            "[engram] Module ready: orders 1..={}, layers {:?}, hidden {}, multiplier {}",
            hasher.max_ngram_size(),
            config.layer_ids,
            config.hidden_size,
            config.hc_multiplier
        );

        Ok(Self {
            config,
            hasher: Arc::new(hasher),
            tables: Arc::new(tables),
            mixers: bound,
        })
    }

    pub fn config(&self) -> &EngramConfig {
        &self.config
    }

    pub fn hasher(&self) -> Arc<NGramHasher> {
        Arc::clone(&self.hasher)
    }

    pub fn tables(&self) -> Arc<NGramEmbeddingTable> {
        Arc::clone(&self.tables)
    }

    pub fn mixer(&self, layer: usize) -> Option<&HyperConnectionMixer> {
        self.mixers.get(&layer)
    }

    pub fn is_engram_layer(&self, layer: usize) -> bool {
        self.mixers.contains_key(&layer)
    }

    /// Concatenated n-gram embeddings for every position, `[T, embed_width]`.
    pub fn ngram_embeddings(&self, tokens: &[u32]) -> EngramResult<Vec<f32>> {
        let per_position = self.hasher.hash_all_orders(tokens)?;
        let mut out = Vec::with_capacity(tokens.len() * self.tables.concat_width());
        for buckets in &per_position {
            out.extend(self.tables.concat(buckets)?);
        }
        Ok(out)
    }

    /// Apply the engram branch at `layer`. Non-engram layers return the
    /// hidden states untouched (borrowed, no copy).
    pub fn forward_layer<'a>(
        &self,
        layer: usize,
        tokens: &[u32],
        hidden: &'a [f32],
    ) -> EngramResult<Cow<'a, [f32]>> {
        let Some(mixer) = self.mixers.get(&layer) else {
            return Ok(Cow::Borrowed(hidden));
        };
        let expected = tokens.len() * self.config.hidden_size;
        if hidden.len() != expected {
            return Err(EngramError::shape("layer hidden states", expected, hidden.len()));
        }
        let ngram = self.ngram_embeddings(tokens)?;
        log::debug!("[engram] layer {}: mixing {} positions", layer, tokens.len());
        Ok(Cow::Owned(mixer.mix_sequence(hidden, &ngram)?))
    }

    /// The `engram` metadata block for a context window.
    pub fn metadata(&self, tokens: &[u32]) -> EngramResult<EngramMetadata> {
        context_metadata(&self.config, &self.hasher, tokens)
    }

    /// Snapshot all parameters for `EngramCheckpoint::save`.
    pub fn checkpoint(&self) -> EngramCheckpoint {
        EngramCheckpoint::new(
            self.config.clone(),
            self.tables.tables().to_vec(),
            self.mixers
                .iter()
                .map(|(&l, m)| (l, m.params().clone()))
                .collect(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tiny_module() -> EngramModule {
        let config = EngramConfig::tiny();
        let hidden = config.hidden_size;
        EngramModule::new(config, hidden).unwrap()
    }

    fn hidden_states(tokens: usize, hidden: usize) -> Vec<f32> {
        (0..tokens * hidden).map(|i| (i as f32 * 0.01).cos()).collect()
    }

    #[test]
    fn test_oversized_config_is_error_not_panic() {
        let config = EngramConfig {
            table_sizes: vec![1 << 62, 521, 1_031],
            ..EngramConfig::tiny()
        };
        assert!(matches!(
            EngramModule::new(config, 32),
            Err(EngramError::Config(_))
        ));
    }

    #[test]
    fn test_load_uses_configured_checkpoint() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("trained.ckpt");
        let trained = EngramModule::new(
            EngramConfig {
                seed: 99,
                ..EngramConfig::tiny()
            },
            32,
        )
        .unwrap();
        trained.checkpoint().save(&path).unwrap();

        let config = EngramConfig {
            checkpoint: Some(path),
            ..EngramConfig::tiny()
        };
        let loaded = EngramModule::load(config, 32).unwrap();
        let seeded = EngramModule::load(EngramConfig::tiny(), 32).unwrap();

        let tokens = [5, 6, 7];
        let hidden = hidden_states(3, 32);
        let want = trained.forward_layer(1, &tokens, &hidden).unwrap();
        assert_eq!(loaded.forward_layer(1, &tokens, &hidden).unwrap(), want);
        assert_ne!(seeded.forward_layer(1, &tokens, &hidden).unwrap(), want);
    }

    #[test]
    fn test_load_missing_checkpoint_fails() {
        let dir = tempfile::tempdir().unwrap();
        let config = EngramConfig {
            checkpoint: Some(dir.path().join("absent.ckpt")),
            ..EngramConfig::tiny()
        };
        assert!(matches!(
            EngramModule::load(config, 32),
            Err(EngramError::Io(_))
        ));
    }

    #[test]
    fn test_non_engram_layer_is_identity() {
        let module = tiny_module();
        let tokens = [1, 2, 3, 4];
        let hidden = hidden_states(4, 32);
        let out = module.forward_layer(0, &tokens, &hidden).unwrap();
        assert!(matches!(out, Cow::Borrowed(_)));
        assert_eq!(out.as_ref(), hidden.as_slice());
    }

    #[test]
    fn test_engram_layer_mixes_and_keeps_shape() {
        let module = tiny_module();
        let tokens = [1, 2, 3, 4];
        let hidden = hidden_states(4, 32);
        let out = module.forward_layer(1, &tokens, &hidden).unwrap();
        assert_eq!(out.len(), hidden.len());
        assert_ne!(out.as_ref(), hidden.as_slice());
    }

    #[test]
    fn test_ngram_embedding_width() {
        let module = tiny_module();
        let emb = module.ngram_embeddings(&[5, 6, 7, 8, 9]).unwrap();
        assert_eq!(emb.len(), 5 * module.config().embed_width());
        // Position 0 has only a unigram: the 2- and 3-gram parts are zero.
        let dim = module.config().embed_dim_per_ngram;
        assert!(emb[dim..3 * dim].iter().all(|v| *v == 0.0));
    }

    #[test]
    fn test_backbone_mismatch_aborts_load() {
        let config = EngramConfig::tiny();
        assert!(matches!(
            EngramModule::new(config, 64),
            Err(EngramError::ShapeMismatch { expected: 32, actual: 64, .. })
        ));
    }

    #[test]
    fn test_invalid_token_surfaces() {
        let module = tiny_module();
        let hidden = hidden_states(2, 32);
        assert!(matches!(
            module.forward_layer(1, &[1, 5_000], &hidden),
            Err(EngramError::InvalidToken { token: 5_000, .. })
        ));
    }

    #[test]
    fn test_missing_mixer_rejected() {
        let config = EngramConfig::tiny();
        let module = tiny_module();
        let mut ckpt = module.checkpoint();
        ckpt.mixers.remove(&3);
        assert!(matches!(
            EngramModule::from_parts(config, ckpt.tables, ckpt.mixers, 32),
            Err(EngramError::Config(_))
        ));
    }
}
