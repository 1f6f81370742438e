//! Turn Log Entries
//!
//! A `Turn` is one immutable entry of the authoritative log. Its JSON form is
//! consumed and produced verbatim; optional fields are omitted when absent.

use std::collections::BTreeMap;
use serde::{Serialize, Deserialize};

use crate::core::vec2::Vec2;
use crate::game::error::ViolationKind;
use crate::game::state::{Order, PlayerId, ShipId};

/// Kind of action a log entry carries.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TurnAction {
    /// Composite selections and standing order
    CommandPhase,
    /// Ship movement
    MovementPhase,
    /// Attack announcement
    ActionChallenge,
    /// Target owner's reply to a challenge
    ActionResponse,
    /// Ship finished its action activation
    ActionEnd,
    /// Initial placement
    Deploy,
}

/// One entry of the turn log.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    /// Action kind
    pub action: TurnAction,
    /// Acting player
    pub player: PlayerId,
    /// Acting ship
    pub ship: ShipId,

    /// Attack target
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<ShipId>,
    /// Weapon system name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weapon: Option<String>,
    /// Weapon damage per hit
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub damage: Option<i32>,
    /// Dice thrown
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shots: Option<i32>,
    /// Range band modifier
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub defence_modifier: Option<i32>,

    /// Destination or deployment point
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<[f64; 2]>,
    /// Facing in degrees
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rotation: Option<f64>,
    /// Resulting speed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speed: Option<i32>,

    /// Standing order wire value
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order: Option<i32>,
    /// System index to selection (composite variant, or 1 = engaged defence)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_status: Option<BTreeMap<i32, i32>>,
}

impl Turn {
    fn bare(action: TurnAction, player: PlayerId, ship: ShipId) -> Self {
        Self {
            action,
            player,
            ship,
            target: None,
            weapon: None,
            damage: None,
            shots: None,
            defence_modifier: None,
            location: None,
            rotation: None,
            speed: None,
            order: None,
            system_status: None,
        }
    }

    /// Deployment at `location`.
    pub fn deploy(player: PlayerId, ship: ShipId, location: Vec2, rotation: f64) -> Self {
        Self {
            location: Some(location.to_array()),
            rotation: Some(rotation),
            ..Self::bare(TurnAction::Deploy, player, ship)
        }
    }

    /// Command phase selections.
    pub fn command(
        player: PlayerId,
        ship: ShipId,
        order: Option<Order>,
        selections: BTreeMap<i32, i32>,
    ) -> Self {
        Self {
            order: Some(Order::to_wire(order)),
            system_status: Some(selections),
            ..Self::bare(TurnAction::CommandPhase, player, ship)
        }
    }

    /// Movement to `location`.
    pub fn movement(player: PlayerId, ship: ShipId, location: Vec2, rotation: f64, speed: i32) -> Self {
        Self {
            location: Some(location.to_array()),
            rotation: Some(rotation),
            speed: Some(speed),
            ..Self::bare(TurnAction::MovementPhase, player, ship)
        }
    }

    /// Attack announcement.
    pub fn challenge(
        player: PlayerId,
        ship: ShipId,
        target: ShipId,
        weapon: &str,
        damage: i32,
        shots: i32,
        defence_modifier: i32,
    ) -> Self {
        Self {
            target: Some(target),
            weapon: Some(weapon.to_string()),
            damage: Some(damage),
            shots: Some(shots),
            defence_modifier: Some(defence_modifier),
            ..Self::bare(TurnAction::ActionChallenge, player, ship)
        }
    }

    /// Reply to the challenge against `ship`, engaging the listed defences.
    pub fn response(player: PlayerId, ship: ShipId, attacker: ShipId, engaged: &[usize]) -> Self {
        Self {
            target: Some(attacker),
            system_status: Some(engaged.iter().map(|i| (*i as i32, 1)).collect()),
            ..Self::bare(TurnAction::ActionResponse, player, ship)
        }
    }

    /// End of an action activation.
    pub fn action_end(player: PlayerId, ship: ShipId) -> Self {
        Self::bare(TurnAction::ActionEnd, player, ship)
    }

    /// Location as a vector; required by deploy and movement entries.
    pub fn require_location(&self) -> Result<Vec2, ViolationKind> {
        let location = self.location.ok_or(ViolationKind::MissingField("location"))?;
        let point = Vec2::from_array(location);
        if !point.is_finite() {
            return Err(ViolationKind::Rejected(format!("non-finite location {location:?}")));
        }
        Ok(point)
    }

    /// Encode for the log digest and the wire.
    pub fn to_json(&self) -> Vec<u8> {
        // Plain data with string keys; serialization cannot fail.
        serde_json::to_vec(self).unwrap_or_default()
    }
}
