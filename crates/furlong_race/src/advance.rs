//! # Random Advance Generation
//!
//! Produces the per-tick movement of every competitor.
//!
//! ## Chunked Mode
//!
//! One random number of `digits` decimal digits is drawn, then its digit
//! string is cut into `split` equal contiguous chunks of `digits / split`
//! digits each. Leftover digits at the end are discarded.
//!
//! ```text
//! digits = 8, split = 4
//! 73 05 41 98  ->  [73, 5, 41, 98]
//! ```
//!
//! The chunk boundaries make the per-slot distribution non-uniform (a chunk
//! may start with zeros, the first chunk never does with the full alphabet).
//! [`AdvanceMode::Independent`] draws `split` separate numbers of the chunk
//! width instead, which changes race statistics.
//!
//! When `digits / split` is zero the result is empty; callers treat missing
//! entries as zero movement.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

/// Which digits a drawn number may contain.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DigitAlphabet {
    /// Uniform over all numbers with exactly `digits` digits.
    #[default]
    Full,
    /// Every digit is drawn from 1-9.
    NonZero,
}

/// How the per-competitor values are produced.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdvanceMode {
    /// One number, split into equal digit chunks.
    #[default]
    Chunked,
    /// One number per competitor, each of the chunk width.
    Independent,
}

/// Seedable advance generator.
#[derive(Clone, Debug)]
pub struct AdvanceGenerator {
    rng: ChaCha8Rng,
    alphabet: DigitAlphabet,
    mode: AdvanceMode,
}

impl AdvanceGenerator {
    /// Creates a deterministic generator.
    #[must_use]
    pub fn seeded(seed: u64, alphabet: DigitAlphabet, mode: AdvanceMode) -> Self {
        Self {
            rng: ChaCha8Rng::seed_from_u64(seed),
            alphabet,
            mode,
        }
    }

    /// Creates a generator seeded from OS entropy.
    #[must_use]
    pub fn from_entropy(alphabet: DigitAlphabet, mode: AdvanceMode) -> Self {
        Self {
            rng: ChaCha8Rng::from_entropy(),
            alphabet,
            mode,
        }
    }

    /// Returns `split` advances built from `digits` random digits, or an
    /// empty vector when there are too few digits.
    pub fn generate(&mut self, digits: usize, split: usize) -> Vec<u64> {
        let Some(width) = digits.checked_div(split).filter(|w| *w > 0) else {
            return Vec::new();
        };

        match self.mode {
            AdvanceMode::Chunked => {
                let drawn = self.draw_digits(digits);
                split_digits(&drawn, split)
            }
            AdvanceMode::Independent => (0..split)
                .map(|_| {
                    let drawn = self.draw_digits(width);
                    parse_digits(&drawn)
                })
                .collect(),
        }
    }

    /// Draws `len` decimal digits, most significant first.
    fn draw_digits(&mut self, len: usize) -> Vec<u8> {
        (0..len)
            .map(|i| match self.alphabet {
                DigitAlphabet::Full if i == 0 => self.rng.gen_range(1..=9),
                DigitAlphabet::Full => self.rng.gen_range(0..=9),
                DigitAlphabet::NonZero => self.rng.gen_range(1..=9),
            })
            .collect()
    }
}

/// Splits a digit string into `split` equal chunks and parses each one.
///
/// Returns an empty vector when `split` is zero or larger than the number of
/// digits.
#[must_use]
pub fn split_digits(digits: &[u8], split: usize) -> Vec<u64> {
    let Some(width) = digits.len().checked_div(split).filter(|w| *w > 0) else {
        return Vec::new();
    };
    digits
        .chunks_exact(width)
        .take(split)
        .map(parse_digits)
        .collect()
}

/// Parses decimal digits, saturating at `u64::MAX`.
fn parse_digits(digits: &[u8]) -> u64 {
    digits.iter().fold(0u64, |acc, d| {
        acc.saturating_mul(10).saturating_add(u64::from(*d))
    })
}
