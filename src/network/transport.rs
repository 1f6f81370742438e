//! Transport Collaborator
//!
//! The core reads the authoritative game state and appends turns through
//! this interface only. HTTP verbs, auth and retry policy live behind it.

use std::sync::{Arc, Mutex};
use thiserror::Error;
use tracing::debug;

use crate::game::turn::Turn;
use crate::network::protocol::{FleetRoster, GameState};
use crate::game::state::PlayerId;

/// Transport failures, opaque to the core.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TransportError {
    /// The backing service could not be reached.
    #[error("transport unavailable: {0}")]
    Unavailable(String),

    /// The service refused the request.
    #[error("request rejected: {0}")]
    Rejected(String),

    /// A payload could not be encoded or decoded.
    #[error("malformed payload: {0}")]
    Decode(String),
}

/// Access to the authoritative game record.
pub trait Transport {
    /// Fetch the current game state.
    fn fetch_state(&self) -> Result<GameState, TransportError>;

    /// Append a turn and return the refreshed state.
    fn submit_turn(&self, turn: Turn) -> Result<GameState, TransportError>;
}

impl<T: Transport + ?Sized> Transport for Arc<T> {
    fn fetch_state(&self) -> Result<GameState, TransportError> {
        (**self).fetch_state()
    }

    fn submit_turn(&self, turn: Turn) -> Result<GameState, TransportError> {
        (**self).submit_turn(turn)
    }
}

#[derive(Debug)]
struct Backend {
    state: GameState,
    failing_fetches: u32,
    failing_submits: u32,
}

/// Single serializing log writer held in memory.
///
/// Clones share the same record, so several clients can be attached to one
/// game. Payloads go through their JSON encoding on every call.
#[derive(Debug, Clone)]
pub struct InMemoryTransport {
    backend: Arc<Mutex<Backend>>,
}

impl InMemoryTransport {
    /// Serve an existing game record.
    pub fn new(state: GameState) -> Self {
        Self {
            backend: Arc::new(Mutex::new(Backend { state, failing_fetches: 0, failing_submits: 0 })),
        }
    }

    fn with_backend<R>(&self, f: impl FnOnce(&mut Backend) -> R) -> Result<R, TransportError> {
        let mut backend = self
            .backend
            .lock()
            .map_err(|_| TransportError::Unavailable("backend lock poisoned".into()))?;
        Ok(f(&mut backend))
    }

    /// Seat a player with their fleet list.
    pub fn join(&self, player: PlayerId, roster: FleetRoster) -> Result<(), TransportError> {
        self.with_backend(|b| {
            if b.state.players.len() >= b.state.no_players && !b.state.players.contains(&player) {
                return Err(TransportError::Rejected("game is full".into()));
            }
            if !b.state.players.contains(&player) {
                b.state.players.push(player);
            }
            b.state.rosters.insert(player, roster);
            Ok(())
        })?
    }

    /// Append an entry without any checks, as a misbehaving peer would.
    pub fn append_raw(&self, turn: Turn) -> Result<(), TransportError> {
        self.with_backend(|b| b.state.turns.push(turn))
    }

    /// Make the next `count` fetches fail.
    pub fn fail_fetches(&self, count: u32) -> Result<(), TransportError> {
        self.with_backend(|b| b.failing_fetches = count)
    }

    /// Make the next `count` submissions fail.
    pub fn fail_submits(&self, count: u32) -> Result<(), TransportError> {
        self.with_backend(|b| b.failing_submits = count)
    }

    /// Number of entries in the log.
    pub fn log_len(&self) -> Result<usize, TransportError> {
        self.with_backend(|b| b.state.turns.len())
    }
}

fn through_wire(state: &GameState) -> Result<GameState, TransportError> {
    let json = state.to_json().map_err(|e| TransportError::Decode(e.to_string()))?;
    GameState::from_json(&json).map_err(|e| TransportError::Decode(e.to_string()))
}

impl Transport for InMemoryTransport {
    fn fetch_state(&self) -> Result<GameState, TransportError> {
        self.with_backend(|b| {
            if b.failing_fetches > 0 {
                b.failing_fetches -= 1;
                return Err(TransportError::Unavailable("fetch failed".into()));
            }
            through_wire(&b.state)
        })?
    }

    fn submit_turn(&self, turn: Turn) -> Result<GameState, TransportError> {
        let encoded = serde_json::to_string(&turn).map_err(|e| TransportError::Decode(e.to_string()))?;
        let decoded: Turn = serde_json::from_str(&encoded).map_err(|e| TransportError::Decode(e.to_string()))?;

        self.with_backend(|b| {
            if b.failing_submits > 0 {
                b.failing_submits -= 1;
                return Err(TransportError::Unavailable("submit failed".into()));
            }
            if !b.state.players.contains(&decoded.player) {
                return Err(TransportError::Rejected(format!("player {} is not seated", decoded.player)));
            }
            b.state.turns.push(decoded);
            debug!("Log entry {} appended", b.state.turns.len() - 1);
            through_wire(&b.state)
        })?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::state::ShipId;
    use uuid::Uuid;

    const A: PlayerId = PlayerId(Uuid::from_u128(0xA));

    fn transport() -> InMemoryTransport {
        let transport = InMemoryTransport::new(GameState::new("g", "Skirmish", "seed", 1));
        transport.join(A, FleetRoster { faction: "Terran".into(), ships: vec![] }).unwrap();
        transport
    }

    #[test]
    fn test_submit_appends_and_returns_state() {
        let transport = transport();
        let turn = Turn::action_end(A, ShipId(Uuid::from_u128(1)));
        let state = transport.submit_turn(turn.clone()).unwrap();
        assert_eq!(state.turns, vec![turn]);
        assert_eq!(transport.fetch_state().unwrap(), state);
    }

    #[test]
    fn test_injected_failures_are_consumed() {
        let transport = transport();
        transport.fail_fetches(1).unwrap();
        assert!(matches!(transport.fetch_state(), Err(TransportError::Unavailable(_))));
        assert!(transport.fetch_state().is_ok());

        transport.fail_submits(1).unwrap();
        let turn = Turn::action_end(A, ShipId(Uuid::from_u128(1)));
        assert!(transport.submit_turn(turn.clone()).is_err());
        assert_eq!(transport.log_len().unwrap(), 0);
        assert!(transport.submit_turn(turn).is_ok());
    }

    #[test]
    fn test_unseated_players_rejected() {
        let transport = transport();
        let stranger = PlayerId(Uuid::from_u128(0xB));
        assert!(matches!(
            transport.join(stranger, FleetRoster { faction: "Kel".into(), ships: vec![] }),
            Err(TransportError::Rejected(_))
        ));
        let turn = Turn::action_end(stranger, ShipId(Uuid::from_u128(1)));
        assert!(matches!(transport.submit_turn(turn), Err(TransportError::Rejected(_))));
    }
}
