//! Simulation Errors
//!
//! Local rejections never mutate shared state and never reach the log.
//! Protocol violations halt replay; transport failures are handed back to
//! the caller untouched.

use thiserror::Error;

use crate::game::phase::Phase;
use crate::game::state::{PlayerId, ShipId};
use crate::game::turn::TurnAction;
use crate::network::transport::TransportError;

/// Result alias used across the game layer.
pub type Result<T> = std::result::Result<T, GameError>;

/// Errors surfaced by the simulation core.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GameError {
    /// A log entry cannot be applied. Fatal to the local replay.
    #[error("protocol violation at log index {index}: {kind}")]
    ProtocolViolation {
        /// Index of the offending log entry
        index: usize,
        /// What went wrong
        kind: ViolationKind,
    },

    /// The requested action needs more of a per-round resource than remains.
    #[error("ship {ship} needs {required} thrust but has {remaining}")]
    InsufficientResource {
        /// Ship attempting the action
        ship: ShipId,
        /// Thrust required
        required: i32,
        /// Thrust remaining
        remaining: i32,
    },

    /// The target lies beyond the weapon envelope.
    #[error("target {target} is {distance:.2} away, beyond range {max_range:.2}")]
    OutOfRange {
        /// Intended target
        target: ShipId,
        /// Distance to the target
        distance: f64,
        /// Longest band of the weapon
        max_range: f64,
    },

    /// A local selection does not name something the actor may use.
    #[error("invalid selection: {0}")]
    InvalidSelection(String),

    /// The roster in the fetched game state cannot be turned into a fleet.
    #[error("invalid roster: {0}")]
    InvalidRoster(String),

    /// Fetching or submitting through the transport failed.
    #[error("transport failure: {0}")]
    Transport(#[from] TransportError),

    /// Replay stopped earlier and refuses to continue.
    #[error("replay halted by protocol violation at log index {0}")]
    Halted(usize),
}

impl GameError {
    /// Whether this error stops further log application.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            GameError::ProtocolViolation { .. } | GameError::InvalidRoster(_) | GameError::Halted(_)
        )
    }
}

/// Detail of a protocol violation.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ViolationKind {
    /// The entry names a player not in the roster.
    #[error("unknown player {0}")]
    UnknownPlayer(PlayerId),

    /// The entry names a ship not in any fleet.
    #[error("unknown ship {0}")]
    UnknownShip(ShipId),

    /// The acting player does not own the acting ship.
    #[error("player {player} does not own ship {ship}")]
    NotOwner {
        /// Claimed owner
        player: PlayerId,
        /// Ship in the entry
        ship: ShipId,
    },

    /// The action does not belong to the current phase step.
    #[error("{found:?} is not allowed during {phase:?}")]
    UnexpectedAction {
        /// Phase the machine is in
        phase: Phase,
        /// Action in the entry
        found: TurnAction,
    },

    /// Someone other than the player whose turn it is acted.
    #[error("player {found} acted while waiting on {expected:?}")]
    OutOfTurn {
        /// Player the machine waits on
        expected: Option<PlayerId>,
        /// Player in the entry
        found: PlayerId,
    },

    /// The ship may not act at this step.
    #[error("ship {0} is not eligible at this step")]
    IneligibleShip(ShipId),

    /// The acting player is blocked until a response arrives.
    #[error("challenge against {0} is still awaiting a response")]
    AwaitingResponse(ShipId),

    /// A required optional field is absent.
    #[error("missing field `{0}`")]
    MissingField(&'static str),

    /// A field carries a value the replaying client computes differently.
    #[error("field `{field}` is {found} but replay computed {expected}")]
    Mismatch {
        /// Field name
        field: &'static str,
        /// Value computed locally
        expected: String,
        /// Value in the entry
        found: String,
    },

    /// The entry would have been rejected locally before submission.
    #[error("rejected: {0}")]
    Rejected(String),

    /// The fetched log is shorter than what was already applied.
    #[error("log shrank from {applied} to {fetched} entries")]
    LogRewound {
        /// Entries already applied
        applied: usize,
        /// Entries in the fetched log
        fetched: usize,
    },

    /// The fetched game state belongs to another match.
    #[error("game state seed changed from {expected:?} to {found:?}")]
    SeedChanged {
        /// Seed the simulation was built from
        expected: String,
        /// Seed in the fetched state
        found: String,
    },

    /// An entry arrived while no living ships remain.
    #[error("no ship can act")]
    NothingToResolve,
}

impl From<GameError> for ViolationKind {
    fn from(err: GameError) -> Self {
        ViolationKind::Rejected(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_fatality() {
        let ship = ShipId(Uuid::from_u128(1));
        assert!(GameError::Halted(3).is_fatal());
        assert!(GameError::ProtocolViolation { index: 0, kind: ViolationKind::UnknownShip(ship) }.is_fatal());
        assert!(!GameError::InsufficientResource { ship, required: 3, remaining: 1 }.is_fatal());
        assert!(!GameError::Transport(TransportError::Unavailable("down".into())).is_fatal());
    }

    #[test]
    fn test_rejection_wraps_message() {
        let ship = ShipId(Uuid::from_u128(1));
        let kind: ViolationKind = GameError::InsufficientResource { ship, required: 3, remaining: 1 }.into();
        assert!(matches!(kind, ViolationKind::Rejected(msg) if msg.contains("needs 3 thrust")));
    }
}
