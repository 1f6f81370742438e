//! Initiative Resolution
//!
//! Rolls per-round initiative, picks the starting player of each initiative
//! step and rotates play through the players holding eligible ships.
//!
//! ## Starter selection
//!
//! 1. A single player with eligible ships starts.
//! 2. Otherwise the players with the fewest eligible ships are candidates.
//! 3. A single candidate starts.
//! 4. Otherwise candidates absent from the fairness queue are preferred; a
//!    single such candidate starts.
//! 5. Otherwise the shared RNG picks among the remaining candidates.

use std::collections::{BTreeSet, VecDeque};
use serde::{Serialize, Deserialize};
use tracing::debug;

use crate::core::rng::DeterministicRng;
use crate::game::events::{GameEvent, GameEventData};
use crate::game::state::{MatchState, PlayerId, ShipId};

/// Recency record of players who went first on a contested step.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FairnessQueue {
    recent: VecDeque<PlayerId>,
    window: usize,
}

impl FairnessQueue {
    /// Create a queue remembering the last `window` starters.
    pub fn new(window: usize) -> Self {
        Self { recent: VecDeque::with_capacity(window), window }
    }

    /// Whether a player went first recently.
    pub fn contains(&self, player: &PlayerId) -> bool {
        self.recent.contains(player)
    }

    /// Record a starter as the most recent one.
    pub fn record(&mut self, player: PlayerId) {
        self.recent.retain(|p| *p != player);
        self.recent.push_back(player);
        while self.recent.len() > self.window {
            self.recent.pop_front();
        }
    }

    /// Recorded starters, oldest first.
    pub fn recent(&self) -> impl Iterator<Item = &PlayerId> {
        self.recent.iter()
    }
}

/// Roll 2d6 initiative for every ship in seat order, then fleet order.
///
/// Ships that are dead or not deployed get 0 and draw nothing.
pub fn roll_initiative(state: &mut MatchState) {
    let round = state.round;
    for id in state.ships_in_seat_order() {
        let active = state.ship(&id).is_some_and(|s| s.active());
        let value = if active {
            state.rng.roll_d6() + state.rng.roll_d6()
        } else {
            0
        };
        if let Some(ship) = state.ship_mut(&id) {
            ship.initiative = value;
        }
        if active {
            debug!("Ship {} rolled initiative {}", id.short(), value);
            state.push_event(GameEvent::new(round, GameEventData::InitiativeRolled { ship: id, value }));
        }
    }
}

/// Whether a ship may be selected at `step`.
pub fn is_eligible(state: &MatchState, resolved: &BTreeSet<ShipId>, step: u8, ship: &ShipId) -> bool {
    state
        .ship(ship)
        .is_some_and(|s| s.active() && s.initiative == step && !resolved.contains(ship))
}

/// Eligible ships of one player at `step`, in fleet order.
pub fn eligible_ships(state: &MatchState, resolved: &BTreeSet<ShipId>, step: u8, player: &PlayerId) -> Vec<ShipId> {
    state
        .fleet(player)
        .filter(|s| is_eligible(state, resolved, step, &s.id))
        .map(|s| s.id)
        .collect()
}

/// Players holding eligible ships at `step`, in seat order, with their counts.
pub fn eligible_players(state: &MatchState, resolved: &BTreeSet<ShipId>, step: u8) -> Vec<(PlayerId, usize)> {
    state
        .seats
        .iter()
        .map(|p| (*p, eligible_ships(state, resolved, step, p).len()))
        .filter(|(_, count)| *count > 0)
        .collect()
}

/// Pick the starting player for a step.
///
/// `eligible` must be in seat order. Draws from the RNG only when the
/// candidates cannot be separated otherwise.
pub fn select_starter(
    eligible: &[(PlayerId, usize)],
    fairness: &FairnessQueue,
    rng: &mut DeterministicRng,
) -> Option<PlayerId> {
    if eligible.len() <= 1 {
        return eligible.first().map(|(p, _)| *p);
    }

    let fewest = eligible.iter().map(|(_, n)| *n).min()?;
    let candidates: Vec<PlayerId> = eligible
        .iter()
        .filter(|(_, n)| *n == fewest)
        .map(|(p, _)| *p)
        .collect();
    if candidates.len() == 1 {
        return candidates.first().copied();
    }

    let fresh: Vec<PlayerId> = candidates.iter().filter(|p| !fairness.contains(p)).copied().collect();
    if fresh.len() == 1 {
        return fresh.first().copied();
    }

    let pool = if fresh.is_empty() { &candidates } else { &fresh };
    rng.choose(pool).copied()
}

/// Next player after `current` in seat order holding eligible ships.
///
/// The current player is considered last.
pub fn next_in_rotation(seats: &[PlayerId], current: &PlayerId, eligible: &[(PlayerId, usize)]) -> Option<PlayerId> {
    let start = seats.iter().position(|p| p == current)?;
    (1..=seats.len())
        .map(|offset| seats[(start + offset) % seats.len()])
        .find(|p| eligible.iter().any(|(e, _)| e == p))
}
