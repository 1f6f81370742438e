//! Deployment
//!
//! Initial placement of ships before round 1. Placement is restricted to the
//! arena bounds the asteroid fields are generated in.

use tracing::debug;

use crate::core::vec2::Vec2;
use crate::game::error::{GameError, Result, ViolationKind};
use crate::game::events::{GameEvent, GameEventData};
use crate::game::state::{MatchState, PlayerId, ShipId};
use crate::game::turn::Turn;

/// Check a deployment point for a ship.
pub fn validate_deployment(state: &MatchState, ship: &ShipId, location: Vec2) -> Result<()> {
    let Some(s) = state.ship(ship) else {
        return Err(GameError::InvalidSelection(format!("unknown ship {ship}")));
    };
    if !s.alive || s.deployed {
        return Err(GameError::InvalidSelection(format!("ship {} cannot be deployed", ship.short())));
    }
    let config = &state.config;
    if !location.is_finite()
        || location.x.abs() > config.arena_half_width
        || location.y.abs() > config.arena_half_height
    {
        return Err(GameError::InvalidSelection(format!("deployment point {location:?} is outside the arena")));
    }
    Ok(())
}

/// Apply a deploy entry.
pub fn apply_deployment(state: &mut MatchState, turn: &Turn) -> std::result::Result<(), ViolationKind> {
    let location = turn.require_location()?;
    validate_deployment(state, &turn.ship, location)?;

    let round = state.round;
    let ship = state.ship_mut(&turn.ship).ok_or(ViolationKind::UnknownShip(turn.ship))?;
    ship.position = location;
    ship.heading = Vec2::ZERO;
    ship.rotation = turn.rotation.unwrap_or(0.0);
    ship.speed = 0;
    ship.deployed = true;

    debug!("Ship {} deployed at {:?}", turn.ship.short(), location);
    state.push_event(GameEvent::new(round, GameEventData::ShipDeployed { ship: turn.ship, position: location }));
    Ok(())
}

/// Ships of a player still waiting to be placed, in fleet order.
pub fn undeployed_ships(state: &MatchState, player: &PlayerId) -> Vec<ShipId> {
    state.fleet(player).filter(|s| s.alive && !s.deployed).map(|s| s.id).collect()
}
