//! Match Context
//!
//! Owns one client's view of a match: the simulation, the replication
//! cursor and the local player's identity. `advance` is the single entry
//! point a host calls once per tick.
//!
//! Local entries are never applied directly. They are validated against the
//! local simulation, submitted, and applied when they come back through the
//! log, so every client consumes the shared RNG at the same points.

use std::collections::BTreeMap;
use tracing::{info, warn};

use crate::core::hash::StateHash;
use crate::core::vec2::Vec2;
use crate::game::action::{engaged_defences, plan_challenge};
use crate::game::command::validate_command;
use crate::game::config::MatchConfig;
use crate::game::cursor::ReplicationCursor;
use crate::game::deploy::validate_deployment;
use crate::game::error::{GameError, Result, ViolationKind};
use crate::game::events::GameEvent;
use crate::game::movement::plan_move;
use crate::game::phase::{PendingChallenge, Phase};
use crate::game::state::{MatchState, Order, PlayerId, ShipId};
use crate::game::systems::ShipCatalog;
use crate::game::tick::{Expectation, Simulation};
use crate::game::turn::Turn;
use crate::network::protocol::GameState;
use crate::network::transport::Transport;

// =============================================================================
// LOCAL DECISIONS
// =============================================================================

/// Placement of one ship.
#[derive(Clone, Debug, PartialEq)]
pub struct DeployDecision {
    /// Ship to place
    pub ship: ShipId,
    /// Placement point
    pub location: Vec2,
    /// Facing in degrees
    pub rotation: f64,
}

/// Command phase selections for one ship.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CommandDecision {
    /// Ship receiving orders
    pub ship: ShipId,
    /// Standing order
    pub order: Option<Order>,
    /// Composite system index to variant
    pub selections: BTreeMap<usize, i8>,
}

/// Movement of one ship.
#[derive(Clone, Debug, PartialEq)]
pub struct MoveDecision {
    /// Ship to move
    pub ship: ShipId,
    /// Destination
    pub destination: Vec2,
}

/// Action phase choice.
#[derive(Clone, Debug, PartialEq)]
pub enum ActionDecision {
    /// Fire a weapon at a target
    Fire {
        /// Firing ship
        ship: ShipId,
        /// Weapon system name
        weapon: String,
        /// Target ship
        target: ShipId,
    },
    /// Close the ship's activation
    End {
        /// Ship done acting
        ship: ShipId,
    },
}

/// Interactive input for the local participant.
///
/// Each method returns `None` while no choice has been made yet; `advance`
/// then returns without submitting and asks again next tick.
pub trait LocalCommander {
    /// Pick a ship to place and where.
    fn deploy(&mut self, sim: &Simulation, ships: &[ShipId]) -> Option<DeployDecision>;

    /// Pick a ship and its command phase selections.
    fn command(&mut self, sim: &Simulation, ships: &[ShipId]) -> Option<CommandDecision>;

    /// Pick a ship and its destination.
    fn movement(&mut self, sim: &Simulation, ships: &[ShipId]) -> Option<MoveDecision>;

    /// Pick a ship to activate, or continue the active one.
    fn action(&mut self, sim: &Simulation, ships: &[ShipId], active: Option<ShipId>) -> Option<ActionDecision>;

    /// Pick defences to engage against a challenge.
    fn respond(&mut self, sim: &Simulation, challenge: &PendingChallenge) -> Option<Vec<usize>>;
}

// =============================================================================
// CONTEXT
// =============================================================================

/// Result of one `advance` call.
#[derive(Clone, Debug, PartialEq)]
pub enum AdvanceOutcome {
    /// Seats or fleet lists are still missing
    AwaitingRoster,
    /// Entries applied; the next one belongs to someone else
    Waiting {
        /// Entries applied this call
        applied: usize,
    },
    /// The local submission has not come back through the log yet
    AwaitingEcho {
        /// Entries applied this call
        applied: usize,
    },
    /// It is the local player's turn but no choice was made
    AwaitingInput {
        /// Entries applied this call
        applied: usize,
    },
    /// A local entry was submitted
    Submitted {
        /// Entries applied this call
        applied: usize,
        /// Log length after the submission
        log_len: usize,
    },
    /// Nothing can happen any more
    Finished {
        /// Last player standing, if any
        winner: Option<PlayerId>,
    },
}

/// One client's view of a match.
#[derive(Debug)]
pub struct MatchContext {
    local: Option<PlayerId>,
    config: MatchConfig,
    catalog: ShipCatalog,
    sim: Option<Simulation>,
    cursor: ReplicationCursor,
    halted: Option<usize>,
    pending_echo: Option<usize>,
}

impl MatchContext {
    /// Context for a seated player.
    pub fn new(local: PlayerId, config: MatchConfig, catalog: ShipCatalog) -> Self {
        Self::build(Some(local), config, catalog)
    }

    /// Context that only replays the log.
    pub fn observer(config: MatchConfig, catalog: ShipCatalog) -> Self {
        Self::build(None, config, catalog)
    }

    fn build(local: Option<PlayerId>, config: MatchConfig, catalog: ShipCatalog) -> Self {
        Self {
            local,
            config,
            catalog,
            sim: None,
            cursor: ReplicationCursor::new(),
            halted: None,
            pending_echo: None,
        }
    }

    /// Local player, if seated.
    pub fn local_player(&self) -> Option<PlayerId> {
        self.local
    }

    /// Simulation, once rosters are final.
    pub fn simulation(&self) -> Option<&Simulation> {
        self.sim.as_ref()
    }

    /// Log index of the next entry to apply.
    pub fn cursor_position(&self) -> usize {
        self.cursor.position()
    }

    /// Digest of the applied log prefix.
    pub fn log_digest(&self) -> StateHash {
        self.cursor.digest()
    }

    /// Log index of the violation that stopped replay.
    pub fn halted_at(&self) -> Option<usize> {
        self.halted
    }

    /// State hash, once rosters are final.
    pub fn state_hash(&self) -> Option<StateHash> {
        self.sim.as_ref().map(Simulation::state_hash)
    }

    /// Drain simulation events.
    pub fn take_events(&mut self) -> Vec<GameEvent> {
        self.sim.as_mut().map(Simulation::take_events).unwrap_or_default()
    }

    /// Whether the match can make no further progress.
    pub fn is_finished(&self) -> bool {
        self.sim.as_ref().is_some_and(|s| s.expected() == Expectation::Idle)
    }

    /// Apply a fetched game state: build the simulation on first complete
    /// roster, then apply every new log entry as one batch.
    pub fn sync(&mut self, game: &GameState) -> Result<usize> {
        if let Some(index) = self.halted {
            return Err(GameError::Halted(index));
        }

        if self.sim.is_none() {
            if !game.rosters_complete() {
                return Ok(0);
            }
            let sim = finalize_roster(game, &self.config, &self.catalog).map_err(|err| {
                self.halted = Some(0);
                err
            })?;
            info!("Rosters final for game {} ({} ships)", game.id, sim.state.ships.len());
            self.sim = Some(sim);
        }

        let Some(sim) = self.sim.as_mut() else {
            return Ok(0);
        };
        if sim.state.seed != game.seed {
            self.halted = Some(self.cursor.position());
            return Err(GameError::ProtocolViolation {
                index: self.cursor.position(),
                kind: ViolationKind::SeedChanged { expected: sim.state.seed.clone(), found: game.seed.clone() },
            });
        }

        match self.cursor.apply_batch(sim, &game.turns) {
            Ok(applied) => Ok(applied),
            Err(err) => {
                if let GameError::ProtocolViolation { index, .. } = &err {
                    self.halted = Some(*index);
                }
                Err(err)
            }
        }
    }

    /// One tick: fetch, apply, and submit the local entry if it is our turn.
    pub fn advance<T, C>(&mut self, transport: &T, commander: &mut C) -> Result<AdvanceOutcome>
    where
        T: Transport + ?Sized,
        C: LocalCommander + ?Sized,
    {
        if let Some(index) = self.halted {
            return Err(GameError::Halted(index));
        }

        let game = transport.fetch_state().map_err(|err| {
            warn!("Fetch failed: {}", err);
            GameError::from(err)
        })?;
        let applied = self.sync(&game)?;

        let Some(sim) = self.sim.as_ref() else {
            return Ok(AdvanceOutcome::AwaitingRoster);
        };

        if let Some(echo) = self.pending_echo {
            if self.cursor.position() < echo {
                return Ok(AdvanceOutcome::AwaitingEcho { applied });
            }
            self.pending_echo = None;
        }

        let expectation = sim.expected();
        if expectation == Expectation::Idle {
            return Ok(AdvanceOutcome::Finished { winner: sim.winner });
        }
        let Some(local) = self.local.filter(|p| expectation.player() == Some(*p)) else {
            return Ok(AdvanceOutcome::Waiting { applied });
        };

        let turn = match local_turn(sim, local, &expectation, commander) {
            Ok(Some(turn)) => turn,
            Ok(None) => return Ok(AdvanceOutcome::AwaitingInput { applied }),
            Err(err) => {
                warn!("Local selection rejected: {}", err);
                return Err(err);
            }
        };

        let refreshed = transport.submit_turn(turn).map_err(|err| {
            warn!("Submit failed: {}", err);
            GameError::from(err)
        })?;
        let log_len = refreshed.turns.len();
        self.pending_echo = Some(log_len);
        Ok(AdvanceOutcome::Submitted { applied, log_len })
    }
}

/// Build the simulation from complete rosters: seats in `players` order,
/// fleets in roster order.
pub fn finalize_roster(game: &GameState, config: &MatchConfig, catalog: &ShipCatalog) -> Result<Simulation> {
    let mut state = MatchState::new(&game.seed, config.clone(), catalog.clone());
    for player in &game.players {
        let roster = game
            .rosters
            .get(player)
            .ok_or_else(|| GameError::InvalidRoster(format!("player {player} has no fleet list")))?;
        state.add_player(*player, &roster.faction)?;
        for ship in &roster.ships {
            state.add_ship(*player, ship.ship_uuid, ship.template_uuid, ship.training)?;
        }
    }
    Ok(Simulation::new(state))
}

/// Ask the commander for the entry the expectation calls for and validate it.
fn local_turn<C>(sim: &Simulation, local: PlayerId, expectation: &Expectation, commander: &mut C) -> Result<Option<Turn>>
where
    C: LocalCommander + ?Sized,
{
    let state = &sim.state;
    let require_listed = |ship: &ShipId, ships: &[ShipId]| {
        if ships.contains(ship) {
            Ok(())
        } else {
            Err(GameError::InvalidSelection(format!("ship {} cannot act now", ship.short())))
        }
    };

    match expectation {
        Expectation::Idle => Ok(None),

        Expectation::Deploy { ships, .. } => {
            let Some(decision) = commander.deploy(sim, ships) else {
                return Ok(None);
            };
            require_listed(&decision.ship, ships)?;
            validate_deployment(state, &decision.ship, decision.location)?;
            Ok(Some(Turn::deploy(local, decision.ship, decision.location, decision.rotation)))
        }

        Expectation::Activate { phase, ships, .. } => match phase {
            Phase::Command => {
                let Some(decision) = commander.command(sim, ships) else {
                    return Ok(None);
                };
                require_listed(&decision.ship, ships)?;
                let selections: BTreeMap<i32, i32> = decision
                    .selections
                    .iter()
                    .map(|(index, value)| (*index as i32, i32::from(*value)))
                    .collect();
                let order = Order::to_wire(decision.order);
                validate_command(state, &decision.ship, order, &selections)?;
                Ok(Some(Turn::command(local, decision.ship, decision.order, selections)))
            }
            Phase::Movement => {
                let Some(decision) = commander.movement(sim, ships) else {
                    return Ok(None);
                };
                require_listed(&decision.ship, ships)?;
                let plan = plan_move(state, &decision.ship, decision.destination)?;
                Ok(Some(Turn::movement(local, decision.ship, plan.to, plan.rotation, plan.speed)))
            }
            _ => action_turn(sim, local, ships, None, commander),
        },

        Expectation::Continue { ship, .. } => action_turn(sim, local, &[*ship], Some(*ship), commander),

        Expectation::Respond { challenge, .. } => {
            let Some(engaged) = commander.respond(sim, challenge) else {
                return Ok(None);
            };
            let selections: BTreeMap<i32, i32> = engaged.iter().map(|i| (*i as i32, 1)).collect();
            engaged_defences(state, &challenge.target, &selections)?;
            Ok(Some(Turn::response(local, challenge.target, challenge.attacker, &engaged)))
        }
    }
}

fn action_turn<C>(
    sim: &Simulation,
    local: PlayerId,
    ships: &[ShipId],
    active: Option<ShipId>,
    commander: &mut C,
) -> Result<Option<Turn>>
where
    C: LocalCommander + ?Sized,
{
    let Some(decision) = commander.action(sim, ships, active) else {
        return Ok(None);
    };
    match decision {
        ActionDecision::Fire { ship, weapon, target } => {
            if !ships.contains(&ship) {
                return Err(GameError::InvalidSelection(format!("ship {} cannot act now", ship.short())));
            }
            let plan = plan_challenge(&sim.state, &ship, &target, &weapon)?;
            Ok(Some(Turn::challenge(
                local,
                ship,
                target,
                &weapon,
                plan.damage as i32,
                plan.shots as i32,
                plan.modifier,
            )))
        }
        ActionDecision::End { ship } => {
            if !ships.contains(&ship) {
                return Err(GameError::InvalidSelection(format!("ship {} cannot act now", ship.short())));
            }
            Ok(Some(Turn::action_end(local, ship)))
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::phase::Phase;
    use crate::game::systems::{Training, CORVETTE};
    use crate::network::protocol::{FleetRoster, RosterShip};
    use crate::network::transport::{InMemoryTransport, TransportError};
    use uuid::Uuid;

    const A: PlayerId = PlayerId(Uuid::from_u128(0xA));
    const B: PlayerId = PlayerId(Uuid::from_u128(0xB));
    const A1: ShipId = ShipId(Uuid::from_u128(0xA1));
    const B1: ShipId = ShipId(Uuid::from_u128(0xB1));

    /// Commander with scripted answers; `None` means "not decided".
    #[derive(Default)]
    struct Scripted {
        deploy_at: Option<Vec2>,
        move_to: Option<Vec2>,
        asked: usize,
    }

    impl LocalCommander for Scripted {
        fn deploy(&mut self, _: &Simulation, ships: &[ShipId]) -> Option<DeployDecision> {
            self.asked += 1;
            let location = self.deploy_at?;
            Some(DeployDecision { ship: ships[0], location, rotation: 0.0 })
        }

        fn command(&mut self, _: &Simulation, ships: &[ShipId]) -> Option<CommandDecision> {
            self.asked += 1;
            Some(CommandDecision { ship: ships[0], ..Default::default() })
        }

        fn movement(&mut self, _: &Simulation, ships: &[ShipId]) -> Option<MoveDecision> {
            self.asked += 1;
            Some(MoveDecision { ship: ships[0], destination: self.move_to? })
        }

        fn action(&mut self, _: &Simulation, ships: &[ShipId], active: Option<ShipId>) -> Option<ActionDecision> {
            self.asked += 1;
            Some(ActionDecision::End { ship: active.unwrap_or(ships[0]) })
        }

        fn respond(&mut self, _: &Simulation, _: &PendingChallenge) -> Option<Vec<usize>> {
            self.asked += 1;
            Some(Vec::new())
        }
    }

    fn roster(ship: ShipId) -> FleetRoster {
        FleetRoster {
            faction: "Fleet".into(),
            ships: vec![RosterShip { ship_uuid: ship, template_uuid: CORVETTE, training: Training::Regular }],
        }
    }

    fn transport() -> InMemoryTransport {
        let transport = InMemoryTransport::new(GameState::new("ctx", "Skirmish", "context", 2));
        transport.join(A, roster(A1)).unwrap();
        transport.join(B, roster(B1)).unwrap();
        transport
    }

    /// Commander that deploys at `(x, 0)` and holds position there.
    fn commander(x: f64) -> Scripted {
        let point = Vec2::new(x, 0.0);
        Scripted { deploy_at: Some(point), move_to: Some(point), asked: 0 }
    }

    fn clear_skies() -> MatchConfig {
        MatchConfig { min_asteroid_fields: 0, max_asteroid_fields: 0, ..MatchConfig::default() }
    }

    #[test]
    fn test_default_command_decision_is_empty() {
        let decision = CommandDecision::default();
        assert_eq!(decision.ship, ShipId(Uuid::nil()));
        assert!(decision.order.is_none());
        assert!(decision.selections.is_empty());
        assert_eq!(PlayerId::default(), PlayerId(Uuid::nil()));
    }

    #[test]
    fn test_waits_for_roster() {
        let transport = InMemoryTransport::new(GameState::new("ctx", "Skirmish", "context", 2));
        transport.join(A, roster(A1)).unwrap();
        let mut ctx = MatchContext::new(A, MatchConfig::default(), ShipCatalog::standard());
        let outcome = ctx.advance(&transport, &mut commander(-40.0)).unwrap();
        assert_eq!(outcome, AdvanceOutcome::AwaitingRoster);
        assert!(ctx.simulation().is_none());
    }

    #[test]
    fn test_submit_then_wait_for_echo() {
        let transport = transport();
        let mut ctx = MatchContext::new(A, MatchConfig::default(), ShipCatalog::standard());
        let mut local = commander(-40.0);

        let outcome = ctx.advance(&transport, &mut local).unwrap();
        assert_eq!(outcome, AdvanceOutcome::Submitted { applied: 0, log_len: 1 });
        // Not applied locally until it comes back
        assert_eq!(ctx.cursor_position(), 0);
        assert!(!ctx.simulation().unwrap().state.ship(&A1).unwrap().deployed);

        let outcome = ctx.advance(&transport, &mut local).unwrap();
        assert_eq!(outcome, AdvanceOutcome::Waiting { applied: 1 });
        assert!(ctx.simulation().unwrap().state.ship(&A1).unwrap().deployed);
    }

    #[test]
    fn test_undecided_commander_submits_nothing() {
        let transport = transport();
        let mut ctx = MatchContext::new(A, MatchConfig::default(), ShipCatalog::standard());
        let mut undecided = Scripted::default();
        assert_eq!(ctx.advance(&transport, &mut undecided).unwrap(), AdvanceOutcome::AwaitingInput { applied: 0 });
        assert_eq!(transport.log_len().unwrap(), 0);
        assert_eq!(undecided.asked, 1);
    }

    #[test]
    fn test_transport_failure_propagates() {
        let transport = transport();
        let mut ctx = MatchContext::new(A, MatchConfig::default(), ShipCatalog::standard());
        transport.fail_fetches(1).unwrap();
        let err = ctx.advance(&transport, &mut commander(-40.0)).unwrap_err();
        assert!(matches!(err, GameError::Transport(TransportError::Unavailable(_))));
        assert!(!err.is_fatal());

        transport.fail_submits(1).unwrap();
        assert!(ctx.advance(&transport, &mut commander(-40.0)).is_err());
        assert_eq!(transport.log_len().unwrap(), 0);
        // Next tick retries and succeeds
        assert!(matches!(ctx.advance(&transport, &mut commander(-40.0)), Ok(AdvanceOutcome::Submitted { .. })));
    }

    #[test]
    fn test_thrust_overrun_rejected_locally() {
        let transport = transport();
        let mut a = MatchContext::new(A, clear_skies(), ShipCatalog::standard());
        let mut b = MatchContext::new(B, clear_skies(), ShipCatalog::standard());
        // A decides everything except where to move
        let mut cmd_a = Scripted { move_to: None, ..commander(-40.0) };
        let mut cmd_b = commander(40.0);

        let mut waiting = false;
        for _ in 0..40 {
            if matches!(a.advance(&transport, &mut cmd_a).unwrap(), AdvanceOutcome::AwaitingInput { .. }) {
                waiting = true;
                break;
            }
            b.advance(&transport, &mut cmd_b).unwrap();
        }
        assert!(waiting);
        assert_eq!(a.simulation().unwrap().current_phase(), Phase::Movement);

        let log_before = transport.log_len().unwrap();
        let hash_before = a.state_hash();
        let mut far = Scripted { move_to: Some(Vec2::new(-40.0, 30.0)), ..Default::default() };
        let err = a.advance(&transport, &mut far).unwrap_err();

        assert!(matches!(err, GameError::InsufficientResource { ship: A1, required: 15, remaining: 4 }));
        assert_eq!(transport.log_len().unwrap(), log_before);
        assert_eq!(a.state_hash(), hash_before);
        assert!(a.halted_at().is_none());
    }

    #[test]
    fn test_late_observer_matches_players() {
        let transport = transport();
        let mut a = MatchContext::new(A, clear_skies(), ShipCatalog::standard());
        let mut b = MatchContext::new(B, clear_skies(), ShipCatalog::standard());
        let mut cmd_a = commander(-40.0);
        let mut cmd_b = commander(40.0);
        for _ in 0..30 {
            a.advance(&transport, &mut cmd_a).unwrap();
            b.advance(&transport, &mut cmd_b).unwrap();
        }
        // Bring both players up to the full log
        a.sync(&transport.fetch_state().unwrap()).unwrap();
        b.sync(&transport.fetch_state().unwrap()).unwrap();

        let mut observer = MatchContext::observer(clear_skies(), ShipCatalog::standard());
        let outcome = observer.advance(&transport, &mut Scripted::default()).unwrap();
        assert!(matches!(outcome, AdvanceOutcome::Waiting { .. }));

        assert!(transport.log_len().unwrap() > 6);
        assert_eq!(observer.cursor_position(), a.cursor_position());
        assert_eq!(observer.state_hash(), a.state_hash());
        assert_eq!(observer.state_hash(), b.state_hash());
        assert_eq!(observer.log_digest(), a.log_digest());
    }

    #[test]
    fn test_seed_change_halts() {
        let transport = transport();
        let mut ctx = MatchContext::observer(MatchConfig::default(), ShipCatalog::standard());
        let mut game = transport.fetch_state().unwrap();
        ctx.sync(&game).unwrap();

        game.seed = "other".into();
        let err = ctx.sync(&game).unwrap_err();
        assert!(matches!(err, GameError::ProtocolViolation { kind: ViolationKind::SeedChanged { .. }, .. }));
        assert!(ctx.halted_at().is_some());
    }

    #[test]
    fn test_bad_entry_halts_replay() {
        let transport = transport();
        transport.append_raw(Turn::deploy(B, B1, Vec2::ZERO, 0.0)).unwrap();
        let mut observer = MatchContext::observer(MatchConfig::default(), ShipCatalog::standard());

        let err = observer.advance(&transport, &mut Scripted::default()).unwrap_err();
        assert!(matches!(err, GameError::ProtocolViolation { index: 0, .. }));
        assert!(err.is_fatal());
        assert_eq!(observer.halted_at(), Some(0));
        assert_eq!(observer.cursor_position(), 0);
        assert_eq!(observer.advance(&transport, &mut Scripted::default()), Err(GameError::Halted(0)));
    }

    #[test]
    fn test_unknown_template_is_invalid_roster() {
        let transport = InMemoryTransport::new(GameState::new("ctx", "Skirmish", "context", 1));
        let mut bad = roster(A1);
        bad.ships[0].template_uuid = crate::game::systems::TemplateId(Uuid::nil());
        transport.join(A, bad).unwrap();

        let mut ctx = MatchContext::new(A, MatchConfig::default(), ShipCatalog::standard());
        let err = ctx.advance(&transport, &mut Scripted::default()).unwrap_err();
        assert!(matches!(err, GameError::InvalidRoster(_)));
        assert!(err.is_fatal());
    }
}
