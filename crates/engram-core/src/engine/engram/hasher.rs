// ── Engram: N-gram Hasher ───────────────────────────────────────────────────
//
// Maps a window of `n` consecutive token ids to a bucket in the order-`n`
// embedding table:
//
//   bucket = XOR_i( token_i * P(n, i) ) mod table_size(n)
//
// Every (n, i) pair has its own prime, so swapping two tokens of a window
// almost always moves it to a different bucket. Orders are data (one row of
// primes and one table size per order), not separate types.
//
// The hasher is immutable after construction and safe to share across
// threads; every method is a pure function of its inputs.

use super::primes::{default_primes, default_table_size};
use crate::atoms::engram_types::EngramConfig;
use crate::atoms::error::{EngramError, EngramResult};
use std::collections::HashSet;

#[derive(Debug, Clone)]
pub struct NGramHasher {
    /// `primes[n - 1][i]` = P(n, i)
    primes: Vec<Vec<u64>>,
    /// `table_sizes[n - 1]` = table_size(n)
    table_sizes: Vec<u64>,
    vocab_size: u32,
}

impl NGramHasher {
    /// Build a hasher from the engram configuration, deriving primes and
    /// (unless listed explicitly) table sizes.
    pub fn from_config(config: &EngramConfig) -> EngramResult<Self> {
        config.validate()?;
        let table_sizes = if config.table_sizes.is_empty() {
            (1..=config.max_ngram_size).map(default_table_size).collect()
        } else {
            config.table_sizes.clone()
        };
        Self::with_constants(
            default_primes(config.max_ngram_size),
            table_sizes,
            config.vocab_size,
        )
    }

    /// Build a hasher from explicit constants.
    ///
    /// `primes[n - 1]` must hold exactly `n` values and no value may repeat
    /// anywhere in the set.
    pub fn with_constants(
        primes: Vec<Vec<u64>>,
        table_sizes: Vec<u64>,
        vocab_size: u32,
    ) -> EngramResult<Self> {
        if primes.is_empty() {
            return Err(EngramError::Config("hasher needs at least one order".into()));
        }
        if primes.len() != table_sizes.len() {
            return Err(EngramError::Config(format!(
                "{} prime rows but {} table sizes",
                primes.len(),
                table_sizes.len()
            )));
        }
        if vocab_size == 0 {
            return Err(EngramError::Config("vocab_size must be positive".into()));
        }

        let mut seen = HashSet::new();
        for (idx, row) in primes.iter().enumerate() {
            let n = idx + 1;
            if row.len() != n {
                return Err(EngramError::Config(format!(
                    "order {} needs {} primes, got {}",
                    n,
                    n,
                    row.len()
                )));
            }
            for &p in row {
                if !seen.insert(p) {
                    return Err(EngramError::Config(format!(
                        "prime {} is used by more than one position",
                        p
                    )));
                }
            }
        }
        if let Some(idx) = table_sizes.iter().position(|&s| s == 0) {
            return Err(EngramError::Config(format!(
                "table size for order {} must be positive",
                idx + 1
            )));
        }

        log::debug!(
            "[engram:hasher] {} orders, table sizes {:?}",
            primes.len(),
            table_sizes
        );

        Ok(Self {
            primes,
            table_sizes,
            vocab_size,
        })
    }

    pub fn max_ngram_size(&self) -> usize {
        self.primes.len()
    }

    pub fn vocab_size(&self) -> u32 {
        self.vocab_size
    }

    fn check_order(&self, n: usize) -> EngramResult<()> {
        if n == 0 || n > self.max_ngram_size() {
            return Err(EngramError::InvalidNGramOrder {
                n,
                max: self.max_ngram_size(),
            });
        }
        Ok(())
    }

    fn check_tokens(&self, tokens: &[u32]) -> EngramResult<()> {
        match tokens.iter().find(|&&t| t >= self.vocab_size) {
            Some(&token) => Err(EngramError::InvalidToken {
                token,
                vocab_size: self.vocab_size,
            }),
            None => Ok(()),
        }
    }

    /// `table_size(n)`.
    pub fn table_size(&self, n: usize) -> EngramResult<u64> {
        self.check_order(n)?;
        Ok(self.table_sizes[n - 1])
    }

    /// `P(n, i)`.
    pub fn prime(&self, n: usize, i: usize) -> EngramResult<u64> {
        self.check_order(n)?;
        self.primes[n - 1]
            .get(i)
            .copied()
            .ok_or(EngramError::WindowLength {
                expected: n,
                actual: i + 1,
            })
    }

    // Caller has validated order, length and token range.
    fn bucket_unchecked(&self, window: &[u32], n: usize) -> u64 {
        let row = &self.primes[n - 1];
        let mixed = window
            .iter()
            .zip(row)
            .fold(0u64, |acc, (&t, &p)| acc ^ (t as u64).wrapping_mul(p));
        mixed % self.table_sizes[n - 1]
    }

    /// Bucket of one window. `window.len()` must equal `n`.
    pub fn compute_hash(&self, window: &[u32], n: usize) -> EngramResult<u64> {
        self.check_order(n)?;
        if window.len() != n {
            return Err(EngramError::WindowLength {
                expected: n,
                actual: window.len(),
            });
        }
        self.check_tokens(window)?;
        Ok(self.bucket_unchecked(window, n))
    }

    /// Bucket of every full window, start-aligned: entry `t` hashes
    /// `tokens[t..t + n]`. Empty when the sequence is shorter than `n`.
    pub fn hash_windows(&self, tokens: &[u32], n: usize) -> EngramResult<Vec<u64>> {
        self.check_order(n)?;
        self.check_tokens(tokens)?;
        Ok(tokens
            .windows(n)
            .map(|w| self.bucket_unchecked(w, n))
            .collect())
    }

    /// Causal per-position buckets: entry `t` hashes the window ending at
    /// `t`, or is `None` while fewer than `n` tokens have been seen.
    /// Output length always equals `tokens.len()`.
    pub fn hash_positions(&self, tokens: &[u32], n: usize) -> EngramResult<Vec<Option<u64>>> {
        let full = self.hash_windows(tokens, n)?;
        let lead = tokens.len().min(n - 1);
        let mut out = Vec::with_capacity(tokens.len());
        out.extend(std::iter::repeat(None).take(lead));
        out.extend(full.into_iter().map(Some));
        Ok(out)
    }

    /// Per-position buckets for every order at once: `result[t][n - 1]`.
    pub fn hash_all_orders(&self, tokens: &[u32]) -> EngramResult<Vec<Vec<Option<u64>>>> {
        let per_order: Vec<Vec<Option<u64>>> = (1..=self.max_ngram_size())
            .map(|n| self.hash_positions(tokens, n))
            .collect::<EngramResult<_>>()?;

        Ok((0..tokens.len())
            .map(|t| per_order.iter().map(|row| row[t]).collect())
            .collect())
    }
}
