// ── Engram: Prime Constants ─────────────────────────────────────────────────
//
// Deterministic prime generation for the hasher's per-position multipliers
// and the default table sizes. Miller-Rabin with the first twelve prime
// bases is exact for every u64, so the same inputs always give the same
// primes on every machine.

use crate::atoms::constants::{DEFAULT_TABLE_BASE, PRIME_BASE, PRIME_STRIDE};

const WITNESSES: [u64; 12] = [2, 3, 5, 7, 11, 13, 17, 19, 23, 29, 31, 37];

fn mul_mod(a: u64, b: u64, m: u64) -> u64 {
    ((a as u128 * b as u128) % m as u128) as u64
}

fn pow_mod(mut base: u64, mut exp: u64, m: u64) -> u64 {
    let mut result = 1 % m;
    base %= m;
    while exp > 0 {
        if exp & 1 == 1 {
            result = mul_mod(result, base, m);
        }
        base = mul_mod(base, base, m);
        exp >>= 1;
    }
    result
}

/// Deterministic primality test for any `u64`.
pub fn is_prime(n: u64) -> bool {
    if n < 2 {
        return false;
    }
    for &p in &WITNESSES {
        if n % p == 0 {
            return n == p;
        }
    }

    let mut d = n - 1;
    let mut s = 0;
    while d % 2 == 0 {
        d /= 2;
        s += 1;
    }

    'witness: for &a in &WITNESSES {
        let mut x = pow_mod(a, d, n);
        if x == 1 || x == n - 1 {
            continue;
        }
        for _ in 1..s {
            x = mul_mod(x, x, n);
            if x == n - 1 {
                continue 'witness;
            }
        }
        return false;
    }
    true
}

/// Smallest prime `>= n`.
pub fn next_prime(n: u64) -> u64 {
    let mut candidate = n.max(2);
    while !is_prime(candidate) {
        candidate += 1;
    }
    candidate
}

/// Flat slot of position `i` inside an order-`n` window.
/// Orders are laid out back to back: order 1 uses slot 0, order 2 slots 1-2, ...
pub fn prime_slot(n: usize, i: usize) -> usize {
    n * (n - 1) / 2 + i
}

/// The multiplier `P(n, i)`.
pub fn position_prime(n: usize, i: usize) -> u64 {
    next_prime(PRIME_BASE + prime_slot(n, i) as u64 * PRIME_STRIDE)
}

/// All multipliers for orders `1..=max_ngram_size`, indexed `[n - 1][i]`.
pub fn default_primes(max_ngram_size: usize) -> Vec<Vec<u64>> {
    (1..=max_ngram_size)
        .map(|n| (0..n).map(|i| position_prime(n, i)).collect())
        .collect()
}

/// Default table size for order `n`.
pub fn default_table_size(n: usize) -> u64 {
    let shift = (n - 1).min(20) as u32;
    next_prime(DEFAULT_TABLE_BASE << shift)
}
