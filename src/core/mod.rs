//! Core deterministic primitives.
//!
//! All types in this module are designed for cross-platform determinism.
//! They form the foundation every client relies on to replay the turn log
//! to identical results.

pub mod vec2;
pub mod rng;
pub mod hash;

// Re-export core types
pub use vec2::Vec2;
pub use rng::DeterministicRng;
pub use hash::{StateHash, compute_state_hash};
