//! Movement Phase
//!
//! A ship coasts along its heading at its current speed; thrust buys
//! deviation from that coast point. Heading and speed for the next round are
//! taken from the travelled displacement.

use tracing::debug;

use crate::core::vec2::Vec2;
use crate::game::config::MatchConfig;
use crate::game::error::{GameError, Result, ViolationKind};
use crate::game::events::{GameEvent, GameEventData};
use crate::game::hazard::resolve_movement;
use crate::game::state::{MatchState, Ship, ShipId};
use crate::game::turn::Turn;

/// Validated movement.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MovePlan {
    /// Start point
    pub from: Vec2,
    /// End point
    pub to: Vec2,
    /// Thrust spent
    pub cost: i32,
    /// Speed after the move
    pub speed: i32,
    /// Facing after the move, in degrees
    pub rotation: f64,
}

/// Thrust needed to reach `destination` from the ship's coast point.
pub fn thrust_cost(ship: &Ship, destination: Vec2, config: &MatchConfig) -> i32 {
    let deviation = destination.distance(ship.coast_point());
    (deviation / config.distance_per_thrust).ceil() as i32
}

/// Check a destination against the ship's thrust budget.
pub fn plan_move(state: &MatchState, ship_id: &ShipId, destination: Vec2) -> Result<MovePlan> {
    let ship = state
        .ship(ship_id)
        .filter(|s| s.active())
        .ok_or_else(|| GameError::InvalidSelection(format!("ship {ship_id} cannot move")))?;
    if !destination.is_finite() {
        return Err(GameError::InvalidSelection(format!("destination {destination:?} is not a point")));
    }

    let cost = thrust_cost(ship, destination, &state.config);
    if cost > ship.thrust_remaining {
        return Err(GameError::InsufficientResource {
            ship: *ship_id,
            required: cost,
            remaining: ship.thrust_remaining,
        });
    }

    let displacement = destination - ship.position;
    let rotation = if displacement.length_squared() > 0.0 {
        displacement.heading_degrees()
    } else {
        ship.rotation
    };
    Ok(MovePlan {
        from: ship.position,
        to: destination,
        cost,
        speed: displacement.length().round() as i32,
        rotation,
    })
}

/// Apply a movement entry, then resolve hazards along the path.
pub fn apply_movement(state: &mut MatchState, turn: &Turn) -> std::result::Result<MovePlan, ViolationKind> {
    let destination = turn.require_location()?;
    let plan = plan_move(state, &turn.ship, destination)?;
    let speed = turn.speed.ok_or(ViolationKind::MissingField("speed"))?;
    if speed != plan.speed {
        return Err(ViolationKind::Mismatch {
            field: "speed",
            expected: plan.speed.to_string(),
            found: speed.to_string(),
        });
    }

    let round = state.round;
    let ship = state.ship_mut(&turn.ship).ok_or(ViolationKind::UnknownShip(turn.ship))?;
    let displacement = plan.to - plan.from;
    if displacement.length_squared() > 0.0 {
        ship.heading = displacement.normalize();
    }
    ship.position = plan.to;
    ship.speed = plan.speed;
    ship.rotation = turn.rotation.unwrap_or(plan.rotation);
    ship.thrust_remaining -= plan.cost;

    debug!(
        "Ship {} moved {:?} -> {:?} for {} thrust",
        turn.ship.short(),
        plan.from,
        plan.to,
        plan.cost
    );
    state.push_event(GameEvent::new(
        round,
        GameEventData::ShipMoved { ship: turn.ship, from: plan.from, to: plan.to, thrust_spent: plan.cost },
    ));

    resolve_movement(state, turn.ship, plan.from, plan.to);
    Ok(plan)
}
