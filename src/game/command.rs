//! Command Phase
//!
//! Composite selections and standing orders. Applying a command entry
//! recomputes the ship's thrust for the round.

use std::collections::BTreeMap;
use tracing::debug;

use crate::game::error::{GameError, Result, ViolationKind};
use crate::game::events::{GameEvent, GameEventData};
use crate::game::state::{MatchState, Order, Ship, ShipId};
use crate::game::turn::Turn;

/// Validated contents of a command entry.
#[derive(Clone, Debug, PartialEq)]
pub struct CommandPlan {
    /// Order to stand
    pub order: Option<Order>,
    /// Composite selections to store
    pub selections: Vec<(usize, i8)>,
}

/// Check selections and order for a ship.
pub fn validate_command(
    state: &MatchState,
    ship_id: &ShipId,
    order: i32,
    selections: &BTreeMap<i32, i32>,
) -> Result<CommandPlan> {
    let ship = state
        .ship(ship_id)
        .filter(|s| s.active())
        .ok_or_else(|| GameError::InvalidSelection(format!("ship {ship_id} cannot take orders")))?;
    let template = state
        .template_of(ship)
        .ok_or_else(|| GameError::InvalidSelection(format!("ship {ship_id} has no template")))?;

    let mut plan = CommandPlan { order: None, selections: Vec::new() };
    for (&index, &value) in selections {
        let composite = usize::try_from(index)
            .ok()
            .and_then(|i| template.system(i).map(|s| (i, s)))
            .filter(|(_, s)| s.is_composite());
        let Some((index, _)) = composite else {
            return Err(GameError::InvalidSelection(format!("system {index} is not selectable")));
        };
        if !(-1..=1).contains(&value) {
            return Err(GameError::InvalidSelection(format!("system {index} has no variant {value}")));
        }
        plan.selections.push((index, value as i8));
    }

    plan.order = Order::from_wire(order)
        .ok_or_else(|| GameError::InvalidSelection(format!("unknown order {order}")))?;
    if plan.order.is_some() {
        let mut preview: Ship = ship.clone();
        apply_selections(&mut preview, &plan.selections);
        if !preview.has_command(template) {
            return Err(GameError::InvalidSelection(format!(
                "ship {} has no operational command system",
                ship_id.short()
            )));
        }
    }

    Ok(plan)
}

fn apply_selections(ship: &mut Ship, selections: &[(usize, i8)]) {
    for (index, value) in selections {
        if let Some(status) = ship.systems.get_mut(*index) {
            status.selected = *value;
        }
    }
}

/// Apply a command entry.
pub fn apply_command(state: &mut MatchState, turn: &Turn) -> std::result::Result<(), ViolationKind> {
    let order = turn.order.unwrap_or(0);
    let empty = BTreeMap::new();
    let selections = turn.system_status.as_ref().unwrap_or(&empty);
    let plan = validate_command(state, &turn.ship, order, selections)?;

    let config = state.config.clone();
    let template = state
        .ship(&turn.ship)
        .and_then(|s| state.template_of(s))
        .cloned()
        .ok_or(ViolationKind::UnknownShip(turn.ship))?;
    let round = state.round;
    let ship = state.ship_mut(&turn.ship).ok_or(ViolationKind::UnknownShip(turn.ship))?;

    apply_selections(ship, &plan.selections);
    ship.order = plan.order;
    ship.thrust_capacity = ship.compute_thrust_capacity(&template, &config);
    ship.thrust_remaining = ship.thrust_capacity;
    let thrust_capacity = ship.thrust_capacity;

    debug!("Ship {} orders {:?} thrust {}", turn.ship.short(), plan.order, thrust_capacity);
    state.push_event(GameEvent::new(
        round,
        GameEventData::OrdersIssued { ship: turn.ship, order: plan.order, thrust_capacity },
    ));
    Ok(())
}
