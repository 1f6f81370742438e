//! Deterministic Random Number Generator
//!
//! WELL-512 generator over sixteen 64-bit words, seeded from a SHA-512 digest
//! of the match seed string. Every participant that replays the same turn log
//! draws the same values in the same order.

use serde::{Serialize, Deserialize};
use sha2::{Sha512, Digest};

/// Number of state words.
pub const STATE_WORDS: usize = 16;

/// Mask applied in the tempering step.
const TEMPER_MASK: u64 = 0xDA44_2D24;

/// Deterministic PRNG using the WELL-512 recurrence.
///
/// # Determinism Guarantee
///
/// Given the same seed string, this RNG produces the exact same sequence
/// of values on any platform. All shifts operate on the full 64-bit word
/// and discard overflowed bits; only the returned value is truncated to
/// 32 bits.
///
/// # Example
///
/// ```
/// use armada::core::rng::DeterministicRng;
///
/// let mut rng = DeterministicRng::from_seed_str("armada");
/// assert_eq!(rng.next_uint(), 3366863410); // Always the same!
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeterministicRng {
    state: [u64; STATE_WORDS],
    index: usize,
}

impl Default for DeterministicRng {
    fn default() -> Self {
        Self::from_seed_str("")
    }
}

impl DeterministicRng {
    /// Create a new RNG from a seed string.
    pub fn from_seed_str(seed: &str) -> Self {
        Self {
            state: derive_state(seed),
            index: 0,
        }
    }

    /// Replace the whole state with one derived from `seed` and reset the index.
    pub fn reseed(&mut self, seed: &str) {
        self.state = derive_state(seed);
        self.index = 0;
    }

    /// Generate the next 32-bit random value.
    #[inline]
    pub fn next_uint(&mut self) -> u32 {
        let i = self.index;
        let mut a = self.state[i];
        let mut c = self.state[(i + 13) & 15];
        let b = a ^ c ^ (a << 16) ^ (c << 15);
        c = self.state[(i + 9) & 15];
        c ^= c >> 11;
        a = b ^ c;
        self.state[i] = a;
        let d = a ^ ((a << 5) & TEMPER_MASK);

        self.index = (i + 15) & 15;
        a = self.state[self.index];
        self.state[self.index] = a ^ b ^ d ^ (a << 2) ^ (b << 18) ^ (c << 28);

        self.state[self.index] as u32
    }

    /// Generate a random integer in range [min, max] (inclusive).
    ///
    /// Returns `min` without drawing when the range is empty or a single value.
    #[inline]
    pub fn next_int(&mut self, min: i32, max: i32) -> i32 {
        if min >= max {
            return min;
        }
        let range = (max as i64 - min as i64 + 1) as u64;
        let offset = self.next_uint() as u64 % range;
        (min as i64 + offset as i64) as i32
    }

    /// Generate a random float in range [min, max].
    #[inline]
    pub fn next_float(&mut self, min: f64, max: f64) -> f64 {
        let unit = self.next_uint() as f64 / u32::MAX as f64;
        min + (max - min) * unit
    }

    /// Roll a single six-sided die.
    #[inline]
    pub fn roll_d6(&mut self) -> u8 {
        self.next_int(1, 6) as u8
    }

    /// Roll `count` six-sided dice.
    pub fn roll_d6s(&mut self, count: u32) -> Vec<u8> {
        (0..count).map(|_| self.roll_d6()).collect()
    }

    /// Roll `count` dice and count the faces at or above `target`.
    pub fn count_successes(&mut self, count: u32, target: u8) -> u32 {
        self.roll_d6s(count)
            .into_iter()
            .filter(|face| *face >= target)
            .count() as u32
    }

    /// Select a random element from a slice.
    pub fn choose<'a, T>(&mut self, slice: &'a [T]) -> Option<&'a T> {
        if slice.is_empty() {
            None
        } else {
            let idx = self.next_int(0, slice.len() as i32 - 1) as usize;
            slice.get(idx)
        }
    }

    /// Get current state (for checkpointing/debugging).
    pub fn state(&self) -> ([u64; STATE_WORDS], usize) {
        (self.state, self.index)
    }

    /// Restore from saved state.
    pub fn set_state(&mut self, state: [u64; STATE_WORDS], index: usize) {
        self.state = state;
        self.index = index & 15;
    }
}

/// Expand a seed string into the sixteen-word state.
///
/// The SHA-512 digest is read as eight little-endian words, which fill
/// both halves of the state.
fn derive_state(seed: &str) -> [u64; STATE_WORDS] {
    let digest = Sha512::digest(seed.as_bytes());
    let mut state = [0u64; STATE_WORDS];
    for (i, chunk) in digest.chunks_exact(8).enumerate() {
        let mut word = [0u8; 8];
        word.copy_from_slice(chunk);
        state[i] = u64::from_le_bytes(word);
        state[i + 8] = state[i];
    }
    state
}

// =============================================================================
// TESTS
// =============================================================================
