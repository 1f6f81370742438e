//! Game Logic Module
//!
//! All match rules. Deterministic: every client applying the same log to the
//! same roster ends in the same state.
//!
//! ## Module Structure
//!
//! - `config`: Rules constants shared by all participants
//! - `systems`: Ship designs, systems and the template catalog
//! - `state`: Players, ships and the match registry
//! - `turn`: Log entry record
//! - `phase`: Phase machine counters
//! - `initiative`: Rolls, starter selection and rotation
//! - `deploy` / `command` / `movement` / `action`: Per-phase resolvers
//! - `combat` / `hazard`: Dice resolution and asteroid strikes
//! - `tick`: Log entry application and automatic phases
//! - `cursor`: Replication cursor over the log
//! - `context`: Per-client driver of fetch, apply and submit
//! - `autopilot`: Computer commander
//! - `events`: Game events for rendering and replay verification

pub mod config;
pub mod error;
pub mod systems;
pub mod state;
pub mod turn;
pub mod phase;
pub mod initiative;
pub mod deploy;
pub mod command;
pub mod movement;
pub mod action;
pub mod combat;
pub mod hazard;
pub mod events;
pub mod tick;
pub mod cursor;
pub mod context;
pub mod autopilot;

// Re-export key types
pub use config::MatchConfig;
pub use error::{GameError, ViolationKind};
pub use systems::{ShipCatalog, ShipTemplate, TemplateId, Training};
pub use state::{MatchState, Order, PlayerId, Ship, ShipId};
pub use turn::{Turn, TurnAction};
pub use phase::Phase;
pub use events::{GameEvent, GameEventData};
pub use tick::{Expectation, Simulation};
pub use cursor::ReplicationCursor;
pub use context::{AdvanceOutcome, LocalCommander, MatchContext};
pub use autopilot::Autopilot;
