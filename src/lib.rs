//! # Armada Simulation Core
//!
//! Deterministic turn-log simulation for Armada tactical fleet combat.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    ARMADA CORE                               │
//! ├─────────────────────────────────────────────────────────────┤
//! │  core/           - Deterministic primitives                  │
//! │  ├── vec2.rs     - 2D vector and segment geometry            │
//! │  ├── rng.rs      - WELL-512 PRNG seeded from SHA-512         │
//! │  └── hash.rs     - State hashing and log digest              │
//! │                                                              │
//! │  game/           - Match rules (deterministic)               │
//! │  ├── state.rs    - Players, ships, match registry            │
//! │  ├── tick.rs     - Log entry application, phase machine      │
//! │  ├── cursor.rs   - Replication cursor                        │
//! │  ├── context.rs  - Fetch / apply / submit per client         │
//! │  └── ...         - Phase resolvers, combat, hazards          │
//! │                                                              │
//! │  network/        - Collaborators (non-deterministic)         │
//! │  ├── protocol.rs - Game state and roster records             │
//! │  ├── transport.rs- Transport trait, in-memory log            │
//! │  └── driver.rs   - Async polling loop                        │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Determinism Guarantee
//!
//! Every client replays the same append-only log:
//! - No HashMap (uses BTreeMap for sorted iteration)
//! - No system time dependencies
//! - All randomness from one seeded WELL-512 stream, drawn in log order
//! - Local entries take effect only when read back from the log
//!
//! Given identical seed, roster and log, the simulation produces
//! **identical state hashes** on every client.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod core;
pub mod game;
pub mod network;

// Re-export commonly used types
pub use core::rng::DeterministicRng;
pub use core::vec2::Vec2;
pub use game::context::{LocalCommander, MatchContext};
pub use game::state::{MatchState, PlayerId, ShipId};
pub use game::tick::Simulation;
pub use network::transport::Transport;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
