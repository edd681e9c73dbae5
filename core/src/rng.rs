//! Referral code randomness.
//!
//! Codes are drawn from a single PCG stream. Production engines seed it
//! from OS entropy; tests pass a fixed seed so issued codes are
//! reproducible.

use rand::SeedableRng;
use rand_pcg::Pcg64Mcg;

/// Characters a referral code may contain.
pub const CODE_ALPHABET: &[u8] =
    b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";

pub struct CodeRng {
    inner: Pcg64Mcg,
}

impl CodeRng {
    pub fn from_seed(seed: u64) -> Self {
        Self { inner: Pcg64Mcg::seed_from_u64(seed) }
    }

    pub fn from_entropy() -> Self {
        Self::from_seed(rand::random::<u64>())
    }

    /// Roll a u64 in [0, n).
    pub fn next_u64_below(&mut self, n: u64) -> u64 {
        use rand::RngCore;
        assert!(n > 0, "n must be > 0");
        self.inner.next_u64() % n
    }

    /// Draw a fresh alphanumeric code of `len` characters.
    pub fn next_code(&mut self, len: usize) -> String {
        (0..len)
            .map(|_| {
                let idx = self.next_u64_below(CODE_ALPHABET.len() as u64) as usize;
                CODE_ALPHABET[idx] as char
            })
            .collect()
    }
}
