//! Game Events
//!
//! Events generated while the log is applied, for rendering and UI
//! collaborators. Every client replaying the same log emits the same events.

use serde::{Serialize, Deserialize};
use crate::core::vec2::Vec2;
use crate::game::phase::Phase;
use crate::game::state::{Order, PlayerId, ShipId};

/// Game event data.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum GameEventData {
    /// Phase machine moved on
    PhaseChanged {
        old_phase: Phase,
        new_phase: Phase,
    },

    /// A new round began
    RoundStarted {
        round: u32,
    },

    /// A ship rolled initiative
    InitiativeRolled {
        ship: ShipId,
        value: u8,
    },

    /// An initiative step opened with this starter
    StepStarted {
        step: u8,
        starter: PlayerId,
    },

    /// Ship placed on the map
    ShipDeployed {
        ship: ShipId,
        position: Vec2,
    },

    /// Command phase selections applied
    OrdersIssued {
        ship: ShipId,
        order: Option<Order>,
        thrust_capacity: i32,
    },

    /// Ship completed a movement
    ShipMoved {
        ship: ShipId,
        from: Vec2,
        to: Vec2,
        thrust_spent: i32,
    },

    /// Movement segment crossed an asteroid field
    HazardStruck {
        ship: ShipId,
        field: usize,
        damage: u32,
    },

    /// Attack announced
    ChallengeIssued {
        attacker: ShipId,
        target: ShipId,
        weapon: String,
        shots: u32,
    },

    /// Attack dice resolved
    ChallengeResolved {
        attacker: ShipId,
        target: ShipId,
        hits: u32,
        intercepted: u32,
        damage: u32,
    },

    /// Hull damage taken
    ShipDamaged {
        ship: ShipId,
        amount: u32,
        remaining: u32,
    },

    /// A system was knocked out
    SystemDamaged {
        ship: ShipId,
        system: usize,
    },

    /// Ship destroyed (retained in the registry)
    ShipDestroyed {
        ship: ShipId,
        by: Option<ShipId>,
    },

    /// Ship finished its action phase activation
    ActivationEnded {
        ship: ShipId,
    },

    /// Only one player has ships left
    MatchDecided {
        winner: PlayerId,
    },
}

/// A game event stamped with the round it occurred in.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GameEvent {
    /// Round when event occurred (0 during deployment)
    pub round: u32,

    /// Ship involved, for filtering
    pub ship: Option<ShipId>,

    /// Event data
    pub data: GameEventData,
}

impl GameEvent {
    /// Create a new event.
    pub fn new(round: u32, data: GameEventData) -> Self {
        let ship = match &data {
            GameEventData::InitiativeRolled { ship, .. }
            | GameEventData::ShipDeployed { ship, .. }
            | GameEventData::OrdersIssued { ship, .. }
            | GameEventData::ShipMoved { ship, .. }
            | GameEventData::HazardStruck { ship, .. }
            | GameEventData::ShipDamaged { ship, .. }
            | GameEventData::SystemDamaged { ship, .. }
            | GameEventData::ShipDestroyed { ship, .. }
            | GameEventData::ActivationEnded { ship } => Some(*ship),
            GameEventData::ChallengeIssued { attacker, .. }
            | GameEventData::ChallengeResolved { attacker, .. } => Some(*attacker),
            _ => None,
        };

        Self { round, ship, data }
    }

    /// Create phase changed event.
    pub fn phase_changed(round: u32, old_phase: Phase, new_phase: Phase) -> Self {
        Self::new(round, GameEventData::PhaseChanged { old_phase, new_phase })
    }

    /// Whether this event reports a loss of hull or systems.
    pub fn is_damage(&self) -> bool {
        matches!(
            self.data,
            GameEventData::ShipDamaged { .. }
                | GameEventData::SystemDamaged { .. }
                | GameEventData::ShipDestroyed { .. }
        )
    }
}
