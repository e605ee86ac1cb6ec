// ── Engram: Hyper-Connection Mixer ──────────────────────────────────────────
//
// Injects the concatenated n-gram embedding into a backbone hidden state
// without overwriting the backbone's own representation:
//
//   expand   b_m = Expand_m(h)                      m = 0..multiplier
//   fuse     v_m = Value_m(e[slice_m])
//            g_m = σ( gate_m · ⟨rms(b_m), rms(v_m)⟩ / √H )
//            f_m = b_m + coef_m · g_m · v_m
//   reduce   out = Σ_m reduce_m · f_m
//
// `Expand_m` is a block-diagonal (grouped) projection. Each branch reads its
// own contiguous slice of the n-gram embedding, so branches can specialise
// on different orders / heads. With identity expand, `reduce = 1/M` and
// `coef = 0` the mixer is exactly the residual identity.
//
// Shape invariant: output length == `hidden_size`, always. Every dimension
// mismatch is a `ShapeMismatch` at construction or call time; nothing is
// truncated or padded.

use super::init::ParamRng;
use crate::atoms::engram_types::EngramConfig;
use crate::atoms::error::{EngramError, EngramResult};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::ops::Range;

const RMS_EPS: f32 = 1e-6;

/// Static dimensions of one mixer.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct MixerShape {
    pub hidden_size: usize,
    pub multiplier: usize,
    pub groups: usize,
    /// Width of the concatenated n-gram embedding.
    pub embed_width: usize,
}

impl MixerShape {
    pub fn from_config(config: &EngramConfig) -> Self {
        Self {
            hidden_size: config.hidden_size,
            multiplier: config.hc_multiplier,
            groups: config.hc_groups,
            embed_width: config.embed_width(),
        }
    }

    pub fn group_dim(&self) -> usize {
        self.hidden_size / self.groups
    }

    /// The embedding slice branch `m` reads. Slices partition the embedding.
    pub fn branch_slice(&self, m: usize) -> Range<usize> {
        let e = self.embed_width;
        let k = self.multiplier;
        (m * e / k)..((m + 1) * e / k)
    }

    fn expand_len(&self) -> usize {
        self.multiplier * self.groups * self.group_dim() * self.group_dim()
    }

    fn validate(&self) -> EngramResult<()> {
        if self.hidden_size == 0 || self.multiplier == 0 || self.groups == 0 || self.embed_width == 0 {
            return Err(EngramError::Config(format!(
                "mixer dimensions must be positive: {:?}",
                self
            )));
        }
        if self.hidden_size % self.groups != 0 {
            return Err(EngramError::shape(
                "hidden_size divisible by hc_groups",
                self.groups * (self.hidden_size / self.groups).max(1),
                self.hidden_size,
            ));
        }
        Ok(())
    }
}

/// Learned mixer weights. Flat row-major buffers.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MixerParams {
    pub shape: MixerShape,
    /// `[multiplier][groups][group_dim][group_dim]`
    pub expand: Vec<f32>,
    /// Per branch `[hidden_size][slice_len(m)]`.
    pub value: Vec<Vec<f32>>,
    pub gate_scale: Vec<f32>,
    pub mix_coef: Vec<f32>,
    pub reduce: Vec<f32>,
}

impl MixerParams {
    /// Parameters for which `mix` returns the hidden state unchanged.
    pub fn identity(shape: MixerShape) -> Self {
        let m = shape.multiplier;
        let g = shape.group_dim();
        let mut expand = vec![0.0f32; shape.expand_len()];
        for block in expand.chunks_exact_mut(g * g) {
            for i in 0..g {
                block[i * g + i] = 1.0;
            }
        }
        let value = (0..m)
            .map(|b| vec![0.0f32; shape.hidden_size * shape.branch_slice(b).len()])
            .collect();
        Self {
            shape,
            expand,
            value,
            gate_scale: vec![1.0; m],
            mix_coef: vec![0.0; m],
            reduce: vec![1.0 / m as f32; m],
        }
    }

    /// Identity plus deterministic noise, with the injection path switched on.
    pub fn seeded(shape: MixerShape, seed: u64) -> Self {
        let mut params = Self::identity(shape);
        let g = shape.group_dim();

        let mut rng = ParamRng::derive(seed, 0x4D49_5845);
        for v in params.expand.iter_mut() {
            *v += rng.uniform(0.02 / (g as f32).sqrt());
        }
        for (b, value) in params.value.iter_mut().enumerate() {
            let fan_in = shape.branch_slice(b).len().max(1);
            let mut rng = ParamRng::derive(seed, 0x5641_4C00 + b as u64);
            rng.fill_uniform(value, (1.0 / fan_in as f32).sqrt());
        }
        params.mix_coef = vec![0.1; shape.multiplier];
        params
    }

    /// Check every buffer length against `shape`.
    pub fn validate(&self) -> EngramResult<()> {
        self.shape.validate()?;
        let s = &self.shape;
        let m = s.multiplier;

        if self.expand.len() != s.expand_len() {
            return Err(EngramError::shape("mixer expand weights", s.expand_len(), self.expand.len()));
        }
        if self.value.len() != m {
            return Err(EngramError::shape("mixer value branches", m, self.value.len()));
        }
        for (b, value) in self.value.iter().enumerate() {
            let expected = s.hidden_size * s.branch_slice(b).len();
            if value.len() != expected {
                return Err(EngramError::shape(format!("mixer value branch {}", b), expected, value.len()));
            }
        }
        for (name, buf) in [
            ("mixer gate_scale", &self.gate_scale),
            ("mixer mix_coef", &self.mix_coef),
            ("mixer reduce", &self.reduce),
        ] {
            if buf.len() != m {
                return Err(EngramError::shape(name, m, buf.len()));
            }
        }
        Ok(())
    }
}

fn rms_normalized(x: &[f32]) -> Vec<f32> {
    let ms = x.iter().map(|v| v * v).sum::<f32>() / x.len().max(1) as f32;
    let inv = 1.0 / (ms + RMS_EPS).sqrt();
    x.iter().map(|v| v * inv).collect()
}

fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}

/// One hyper-connection mixer (one per engram layer).
#[derive(Debug, Clone)]
pub struct HyperConnectionMixer {
    params: MixerParams,
}

impl HyperConnectionMixer {
    /// Bind parameters to a backbone. Fails fast when the backbone's hidden
    /// size, the config, or the parameter buffers disagree.
    pub fn new(
        config: &EngramConfig,
        params: MixerParams,
        backbone_hidden_size: usize,
    ) -> EngramResult<Self> {
        if backbone_hidden_size != config.hidden_size {
            return Err(EngramError::shape(
                "backbone hidden_size",
                config.hidden_size,
                backbone_hidden_size,
            ));
        }
        let expected = MixerShape::from_config(config);
        if params.shape != expected {
            if params.shape.hidden_size != expected.hidden_size {
                return Err(EngramError::shape(
                    "mixer hidden_size",
                    expected.hidden_size,
                    params.shape.hidden_size,
                ));
            }
            if params.shape.embed_width != expected.embed_width {
                return Err(EngramError::shape(
                    "mixer embed_width",
                    expected.embed_width,
                    params.shape.embed_width,
                ));
            }
            if params.shape.multiplier != expected.multiplier {
                return Err(EngramError::shape(
                    "mixer multiplier",
                    expected.multiplier,
                    params.shape.multiplier,
                ));
            }
            return Err(EngramError::shape("mixer groups", expected.groups, params.shape.groups));
        }
        params.validate()?;
        Ok(Self { params })
    }

    pub fn shape(&self) -> MixerShape {
        self.params.shape
    }

    pub fn params(&self) -> &MixerParams {
        &self.params
    }

    fn expand_branch(&self, m: usize, hidden: &[f32]) -> Vec<f32> {
        let s = &self.params.shape;
        let g = s.group_dim();
        let mut out = vec![0.0f32; s.hidden_size];
        for grp in 0..s.groups {
            let base = (m * s.groups + grp) * g * g;
            let block = &self.params.expand[base..base + g * g];
            let input = &hidden[grp * g..(grp + 1) * g];
            for (row, o) in out[grp * g..(grp + 1) * g].iter_mut().enumerate() {
                let weights = &block[row * g..(row + 1) * g];
                *o = weights.iter().zip(input).map(|(w, x)| w * x).sum();
            }
        }
        out
    }

    fn value_branch(&self, m: usize, slice: &[f32]) -> Vec<f32> {
        let weights = &self.params.value[m];
        let k = slice.len();
        if k == 0 {
            return vec![0.0; self.params.shape.hidden_size];
        }
        weights
            .chunks_exact(k)
            .map(|row| row.iter().zip(slice).map(|(w, x)| w * x).sum())
            .collect()
    }

    /// Mix one position. `hidden.len()` must equal `hidden_size` and
    /// `ngram_embedding.len()` the concatenated embedding width.
    pub fn mix(&self, hidden: &[f32], ngram_embedding: &[f32]) -> EngramResult<Vec<f32>> {
        let s = self.params.shape;
        if hidden.len() != s.hidden_size {
            return Err(EngramError::shape("hidden state", s.hidden_size, hidden.len()));
        }
        if ngram_embedding.len() != s.embed_width {
            return Err(EngramError::shape("n-gram embedding", s.embed_width, ngram_embedding.len()));
        }

        let norm = (s.hidden_size as f32).sqrt();
        let mut out = vec![0.0f32; s.hidden_size];

        for m in 0..s.multiplier {
            let mut branch = self.expand_branch(m, hidden);
            let coef = self.params.mix_coef[m];

            if coef != 0.0 {
                let value = self.value_branch(m, &ngram_embedding[s.branch_slice(m)]);
                let score: f32 = rms_normalized(&branch)
                    .iter()
                    .zip(rms_normalized(&value))
                    .map(|(a, b)| a * b)
                    .sum();
                let gate = sigmoid(self.params.gate_scale[m] * score / norm);
                for (b, v) in branch.iter_mut().zip(&value) {
                    *b += coef * gate * v;
                }
            }

            let weight = self.params.reduce[m];
            for (o, b) in out.iter_mut().zip(&branch) {
                *o += weight * b;
            }
        }

        log::trace!("[engram:mixer] mixed position, multiplier {}", s.multiplier);
        Ok(out)
    }

    /// Mix every position of a sequence in parallel.
    /// `hidden` is `[T, hidden_size]`, `ngram` is `[T, embed_width]`.
    pub fn mix_sequence(&self, hidden: &[f32], ngram: &[f32]) -> EngramResult<Vec<f32>> {
        let s = self.params.shape;
        if hidden.len() % s.hidden_size != 0 {
            return Err(EngramError::shape(
                "hidden sequence length (multiple of hidden_size)",
                hidden.len().next_multiple_of(s.hidden_size),
                hidden.len(),
            ));
        }
        let positions = hidden.len() / s.hidden_size;
        if ngram.len() != positions * s.embed_width {
            return Err(EngramError::shape(
                "n-gram embedding sequence",
                positions * s.embed_width,
                ngram.len(),
            ));
        }

        let mixed: Vec<Vec<f32>> = hidden
            .par_chunks(s.hidden_size)
            .zip(ngram.par_chunks(s.embed_width))
            .map(|(h, e)| self.mix(h, e))
            .collect::<EngramResult<_>>()?;

        Ok(mixed.into_iter().flatten().collect())
    }
}
