//! Network Layer
//!
//! Interfaces to the authoritative game record and the host scheduler.
//! This layer is **non-deterministic** - all rules run through `game/`.

pub mod protocol;
pub mod transport;
pub mod driver;

pub use protocol::{FleetRoster, GameState, RosterShip};
pub use transport::{InMemoryTransport, Transport, TransportError};
pub use driver::{drive, DriveSummary, DriverConfig, StopReason};
