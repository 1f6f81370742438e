//! Phase State
//!
//! Counters of the phase machine: phase, round, initiative step, acting
//! player and the ships already resolved at the current step.

use std::collections::BTreeSet;
use std::fmt;
use serde::{Serialize, Deserialize};

use crate::game::state::{PlayerId, ShipId};

/// Highest initiative value (2d6).
pub const STEP_HIGHEST: u8 = 12;

/// Lowest initiative value (2d6).
pub const STEP_LOWEST: u8 = 2;

/// Sentinel step meaning no steps remain; forces phase completion.
pub const STEP_EXHAUSTED: u8 = 13;

/// Match phase.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum Phase {
    /// Ships are being placed, before round 1
    Deployment = 0,
    /// Initiative is rolled (automatic)
    Initiative = 1,
    /// Selections and standing orders (gated)
    Command = 2,
    /// Movement (gated)
    Movement = 3,
    /// Challenges and responses (gated)
    Action = 4,
    /// Per-round resets (automatic)
    Cleanup = 5,
}

impl Phase {
    /// Whether the phase consumes log entries per initiative step.
    pub fn is_gated(self) -> bool {
        matches!(self, Phase::Command | Phase::Movement | Phase::Action)
    }

    /// Phase that follows a completed one.
    pub fn next(self) -> Phase {
        match self {
            Phase::Deployment => Phase::Initiative,
            Phase::Initiative => Phase::Command,
            Phase::Command => Phase::Movement,
            Phase::Movement => Phase::Action,
            Phase::Action => Phase::Cleanup,
            Phase::Cleanup => Phase::Initiative,
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// A challenge waiting for the target owner's response.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PendingChallenge {
    /// Firing ship
    pub attacker: ShipId,
    /// Target ship
    pub target: ShipId,
    /// Owner of the target, who must respond
    pub responder: PlayerId,
    /// Index of the firing system
    pub system: usize,
    /// Dice thrown
    pub shots: u32,
    /// Damage per hit
    pub damage: u32,
    /// Range band modifier
    pub modifier: i32,
}

/// Transient phase machine counters.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PhaseState {
    /// Current phase
    pub phase: Phase,
    /// Round counter (0 during deployment)
    pub round: u32,
    /// Log entries applied
    pub turn: usize,
    /// Current initiative step (12..2, or 13 when exhausted)
    pub step: u8,
    /// Player whose turn it is
    pub acting: Option<PlayerId>,
    /// Ships resolved in the current phase
    pub resolved: BTreeSet<ShipId>,
    /// Ship mid-activation in the action phase
    pub active_ship: Option<ShipId>,
    /// Challenge awaiting a response
    pub challenge: Option<PendingChallenge>,
}

impl Default for PhaseState {
    fn default() -> Self {
        Self {
            phase: Phase::Deployment,
            round: 0,
            turn: 0,
            step: STEP_EXHAUSTED,
            acting: None,
            resolved: BTreeSet::new(),
            active_ship: None,
            challenge: None,
        }
    }
}

impl PhaseState {
    /// Enter a phase, clearing per-phase bookkeeping.
    pub fn enter(&mut self, phase: Phase) {
        self.phase = phase;
        self.step = STEP_HIGHEST;
        self.acting = None;
        self.resolved.clear();
        self.active_ship = None;
        self.challenge = None;
    }

    /// Whether a ship was already resolved this phase.
    pub fn is_resolved(&self, ship: &ShipId) -> bool {
        self.resolved.contains(ship)
    }
}
