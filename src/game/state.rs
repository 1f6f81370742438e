//! Match State Definitions
//!
//! Id-indexed registry of players and ships. Ships store their owner's id and
//! players store an ordered list of ship ids; neither embeds the other.
//! Uses BTreeMap for deterministic iteration order.

use std::collections::BTreeMap;
use std::fmt;
use serde::{Serialize, Deserialize};
use tracing::info;
use uuid::Uuid;

use crate::core::hash::{StateHash, StateHasher, compute_state_hash};
use crate::core::rng::DeterministicRng;
use crate::core::vec2::Vec2;
use crate::game::config::MatchConfig;
use crate::game::error::{GameError, Result};
use crate::game::events::{GameEvent, GameEventData};
use crate::game::hazard::{AsteroidField, generate_asteroid_fields};
use crate::game::systems::{ShipCatalog, ShipSystem, ShipTemplate, SystemKind, TemplateId, Training};

// =============================================================================
// IDENTIFIERS
// =============================================================================

/// Unique player identifier.
///
/// Implements Ord for deterministic BTreeMap ordering.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlayerId(pub Uuid);

impl PlayerId {
    /// Create from UUID string.
    pub fn from_uuid_str(s: &str) -> Option<Self> {
        Uuid::parse_str(s).ok().map(Self)
    }

    /// Get raw bytes.
    pub fn as_bytes(&self) -> &[u8; 16] {
        self.0.as_bytes()
    }

    /// First four bytes as hex, for log lines.
    pub fn short(&self) -> String {
        hex::encode(&self.as_bytes()[..4])
    }
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Unique ship instance identifier.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ShipId(pub Uuid);

impl ShipId {
    /// Create from UUID string.
    pub fn from_uuid_str(s: &str) -> Option<Self> {
        Uuid::parse_str(s).ok().map(Self)
    }

    /// Get raw bytes.
    pub fn as_bytes(&self) -> &[u8; 16] {
        self.0.as_bytes()
    }

    /// First four bytes as hex, for log lines.
    pub fn short(&self) -> String {
        hex::encode(&self.as_bytes()[..4])
    }
}

impl fmt::Display for ShipId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

// =============================================================================
// STANDING ORDERS
// =============================================================================

/// Standing order issued in the command phase.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum Order {
    /// Reroll failed attack dice
    LockOnTarget = 1,
    /// Force successful attack dice against this ship to be rerolled
    BraceForImpact = 2,
    /// Extra thrust, no firing
    AllAheadFull = 3,
}

impl Order {
    /// Decode the wire value; 0 clears the order.
    pub fn from_wire(value: i32) -> Option<Option<Order>> {
        match value {
            0 => Some(None),
            1 => Some(Some(Order::LockOnTarget)),
            2 => Some(Some(Order::BraceForImpact)),
            3 => Some(Some(Order::AllAheadFull)),
            _ => None,
        }
    }

    /// Encode for the wire.
    pub fn to_wire(order: Option<Order>) -> i32 {
        order.map(|o| o as i32).unwrap_or(0)
    }
}

// =============================================================================
// PLAYER
// =============================================================================

/// A participant in the match.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Player {
    /// Unique player ID
    pub id: PlayerId,
    /// Faction name from the roster
    pub faction: String,
    /// Seat number (0-based, defines rotation order)
    pub seat: u8,
    /// Ship ids in fleet order
    pub fleet: Vec<ShipId>,
}

// =============================================================================
// SHIP
// =============================================================================

/// Per-instance status of one template system.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemStatus {
    /// Damage taken; any damage makes the system inoperative
    pub damage: u32,
    /// Already used this round
    pub used: bool,
    /// Selected composite variant (-1 = unset)
    pub selected: i8,
}

impl Default for SystemStatus {
    fn default() -> Self {
        Self { damage: 0, used: false, selected: -1 }
    }
}

impl SystemStatus {
    /// Whether the system still works.
    #[inline]
    pub fn operational(&self) -> bool {
        self.damage == 0
    }
}

/// State of a single ship.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Ship {
    /// Instance id
    pub id: ShipId,
    /// Template id
    pub template: TemplateId,
    /// Owning player
    pub owner: PlayerId,
    /// Crew training
    pub training: Training,

    /// Current position
    pub position: Vec2,
    /// Unit direction of travel (zero until the ship first moves)
    pub heading: Vec2,
    /// Facing in degrees as reported by the mover (presentation)
    pub rotation: f64,
    /// Distance covered by the last move, rounded
    pub speed: i32,

    /// Thrust available this round
    pub thrust_capacity: i32,
    /// Thrust not yet spent this round
    pub thrust_remaining: i32,

    /// Hull damage taken
    pub damage: u32,
    /// Hull damage that destroys the ship
    pub hull: u32,
    /// One status per template system, same indices
    pub systems: Vec<SystemStatus>,

    /// Initiative for the current round (0 = not rolled)
    pub initiative: u8,
    /// Current standing order
    pub order: Option<Order>,
    /// Still in the fight
    pub alive: bool,
    /// Placed on the map
    pub deployed: bool,
}

impl Ship {
    /// Create an undeployed ship from its template.
    pub fn new(id: ShipId, owner: PlayerId, template: &ShipTemplate, training: Training) -> Self {
        Self {
            id,
            template: template.id,
            owner,
            training,
            position: Vec2::ZERO,
            heading: Vec2::ZERO,
            rotation: 0.0,
            speed: 0,
            thrust_capacity: 0,
            thrust_remaining: 0,
            damage: 0,
            hull: template.hull,
            systems: vec![SystemStatus::default(); template.systems.len()],
            initiative: 0,
            order: None,
            alive: true,
            deployed: false,
        }
    }

    /// Whether the ship can be selected this round.
    #[inline]
    pub fn active(&self) -> bool {
        self.alive && self.deployed
    }

    /// Point the ship reaches next movement if it spends no thrust.
    #[inline]
    pub fn coast_point(&self) -> Vec2 {
        self.position + self.heading * self.speed as f64
    }

    /// Operational system in effect at `index`, with composites resolved.
    pub fn effective_system<'a>(&self, template: &'a ShipTemplate, index: usize) -> Option<&'a ShipSystem> {
        let status = self.systems.get(index)?;
        if !status.operational() {
            return None;
        }
        template.system(index)?.resolve(status.selected)
    }

    /// Index of the effective system called `name`.
    pub fn find_system(&self, template: &ShipTemplate, name: &str) -> Option<usize> {
        (0..self.systems.len())
            .find(|i| self.effective_system(template, *i).is_some_and(|s| s.name == name))
    }

    /// Whether an operational command system is in effect.
    pub fn has_command(&self, template: &ShipTemplate) -> bool {
        (0..self.systems.len()).any(|i| {
            matches!(self.effective_system(template, i).map(|s| &s.kind), Some(SystemKind::Command))
        })
    }

    /// Thrust from operational thrusters plus the order bonus.
    pub fn compute_thrust_capacity(&self, template: &ShipTemplate, config: &MatchConfig) -> i32 {
        let base: i32 = (0..self.systems.len())
            .filter_map(|i| match self.effective_system(template, i).map(|s| &s.kind) {
                Some(SystemKind::Thruster { thrust }) => Some(*thrust),
                _ => None,
            })
            .sum();
        if self.order == Some(Order::AllAheadFull) {
            base + config.all_ahead_thrust_bonus
        } else {
            base
        }
    }

    /// Hash this ship's state for verification.
    pub fn hash_into(&self, hasher: &mut StateHasher) {
        hasher.update_uuid(self.id.as_bytes());
        hasher.update_vec2(self.position);
        hasher.update_vec2(self.heading);
        hasher.update_i32(self.speed);
        hasher.update_i32(self.thrust_capacity);
        hasher.update_i32(self.thrust_remaining);
        hasher.update_u32(self.damage);
        for status in &self.systems {
            hasher.update_u32(status.damage);
            hasher.update_bool(status.used);
            hasher.update_u8(status.selected as u8);
        }
        hasher.update_u8(self.initiative);
        hasher.update_i32(Order::to_wire(self.order));
        hasher.update_bool(self.alive);
        hasher.update_bool(self.deployed);
    }
}

// =============================================================================
// MATCH STATE
// =============================================================================

/// Complete entity state of a match.
///
/// Uses BTreeMap for deterministic iteration order; seat order lives in
/// `seats`, fleet order in each `Player::fleet`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MatchState {
    /// Match seed string
    pub seed: String,

    /// Rules constants
    pub config: MatchConfig,

    /// Ship templates
    pub catalog: ShipCatalog,

    /// Shared deterministic RNG
    pub rng: DeterministicRng,

    /// Player ids in seat order
    pub seats: Vec<PlayerId>,

    /// All players
    pub players: BTreeMap<PlayerId, Player>,

    /// All ships, dead ones included
    pub ships: BTreeMap<ShipId, Ship>,

    /// Hazards, fixed for the match
    pub asteroid_fields: Vec<AsteroidField>,

    /// Current round (0 during deployment)
    pub round: u32,

    /// Events not yet drained
    #[serde(skip)]
    pub pending_events: Vec<GameEvent>,
}

impl MatchState {
    /// Create a new match state and generate its asteroid fields.
    pub fn new(seed: &str, config: MatchConfig, catalog: ShipCatalog) -> Self {
        let asteroid_fields = generate_asteroid_fields(seed, &config);
        Self {
            seed: seed.to_string(),
            config,
            catalog,
            rng: DeterministicRng::from_seed_str(seed),
            seats: Vec::new(),
            players: BTreeMap::new(),
            ships: BTreeMap::new(),
            asteroid_fields,
            round: 0,
            pending_events: Vec::new(),
        }
    }

    /// Add a player in the next seat.
    pub fn add_player(&mut self, id: PlayerId, faction: &str) -> Result<()> {
        if self.players.contains_key(&id) {
            return Err(GameError::InvalidRoster(format!("player {id} seated twice")));
        }
        let seat = self.seats.len() as u8;
        self.seats.push(id);
        self.players.insert(id, Player { id, faction: faction.to_string(), seat, fleet: Vec::new() });
        Ok(())
    }

    /// Add a ship to the end of a player's fleet.
    pub fn add_ship(&mut self, owner: PlayerId, id: ShipId, template: TemplateId, training: Training) -> Result<()> {
        if self.ships.contains_key(&id) {
            return Err(GameError::InvalidRoster(format!("ship {id} listed twice")));
        }
        let template = self
            .catalog
            .get(&template)
            .ok_or_else(|| GameError::InvalidRoster(format!("unknown template {}", template.0)))?;
        let ship = Ship::new(id, owner, template, training);
        let player = self
            .players
            .get_mut(&owner)
            .ok_or_else(|| GameError::InvalidRoster(format!("ship {id} owned by unseated player {owner}")))?;
        player.fleet.push(id);
        self.ships.insert(id, ship);
        Ok(())
    }

    /// Get a player by ID.
    pub fn player(&self, id: &PlayerId) -> Option<&Player> {
        self.players.get(id)
    }

    /// Get a ship by ID.
    pub fn ship(&self, id: &ShipId) -> Option<&Ship> {
        self.ships.get(id)
    }

    /// Get a ship mutably by ID.
    pub fn ship_mut(&mut self, id: &ShipId) -> Option<&mut Ship> {
        self.ships.get_mut(id)
    }

    /// Template of a ship.
    pub fn template_of(&self, ship: &Ship) -> Option<&ShipTemplate> {
        self.catalog.get(&ship.template)
    }

    /// Ships of a player in fleet order.
    pub fn fleet<'a>(&'a self, player: &PlayerId) -> impl Iterator<Item = &'a Ship> + 'a {
        self.players
            .get(player)
            .into_iter()
            .flat_map(|p| p.fleet.iter())
            .filter_map(|id| self.ships.get(id))
    }

    /// Every ship in seat order, then fleet order.
    pub fn ships_in_seat_order(&self) -> Vec<ShipId> {
        self.seats
            .iter()
            .filter_map(|id| self.players.get(id))
            .flat_map(|p| p.fleet.iter().copied())
            .collect()
    }

    /// Whether a player still has a living ship.
    pub fn has_living_ships(&self, player: &PlayerId) -> bool {
        self.fleet(player).any(|s| s.alive)
    }

    /// Number of ships that can act.
    pub fn active_ship_count(&self) -> usize {
        self.ships.values().filter(|s| s.active()).count()
    }

    /// The only player with living ships, once all others are wiped out.
    pub fn sole_survivor(&self) -> Option<PlayerId> {
        let mut survivors = self.seats.iter().filter(|p| self.has_living_ships(p));
        match (survivors.next(), survivors.next()) {
            (Some(p), None) if self.seats.len() > 1 => Some(*p),
            _ => None,
        }
    }

    /// Apply hull damage; returns true if this destroyed the ship.
    pub fn apply_damage(&mut self, target: ShipId, amount: u32, source: Option<ShipId>) -> bool {
        let round = self.round;
        let Some(ship) = self.ships.get_mut(&target) else {
            return false;
        };
        if !ship.alive || amount == 0 {
            return false;
        }
        ship.damage = ship.damage.saturating_add(amount);
        let remaining = ship.hull.saturating_sub(ship.damage);
        self.push_event(GameEvent::new(round, GameEventData::ShipDamaged { ship: target, amount, remaining }));
        self.check_destroyed(target, source)
    }

    /// Mark a ship dead if its hull is exhausted; returns true on destruction.
    pub fn check_destroyed(&mut self, target: ShipId, source: Option<ShipId>) -> bool {
        let round = self.round;
        let Some(ship) = self.ships.get_mut(&target) else {
            return false;
        };
        if !ship.alive || ship.damage < ship.hull {
            return false;
        }
        ship.alive = false;
        info!("Ship {} destroyed in round {}", target.short(), round);
        self.push_event(GameEvent::new(round, GameEventData::ShipDestroyed { ship: target, by: source }));
        true
    }

    /// Damage one system of a ship.
    pub fn damage_system(&mut self, target: ShipId, index: usize) {
        let round = self.round;
        if let Some(status) = self.ships.get_mut(&target).and_then(|s| s.systems.get_mut(index)) {
            status.damage = status.damage.saturating_add(1);
            self.push_event(GameEvent::new(round, GameEventData::SystemDamaged { ship: target, system: index }));
        }
    }

    /// Compute hash of current state for verification.
    pub fn compute_hash(&self) -> StateHash {
        compute_state_hash(self.round, &self.seed, |hasher| {
            let (words, index) = self.rng.state();
            for word in words {
                hasher.update_u64(word);
            }
            hasher.update_u32(index as u32);

            // Seat order, then fleet order
            for id in self.ships_in_seat_order() {
                if let Some(ship) = self.ships.get(&id) {
                    ship.hash_into(hasher);
                }
            }
        })
    }

    /// Take pending events (consumes them).
    pub fn take_events(&mut self) -> Vec<GameEvent> {
        std::mem::take(&mut self.pending_events)
    }

    /// Push a game event.
    pub fn push_event(&mut self, event: GameEvent) {
        self.pending_events.push(event);
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::systems::{CORVETTE, FRIGATE};

    fn pid(n: u128) -> PlayerId {
        PlayerId(Uuid::from_u128(n))
    }

    fn sid(n: u128) -> ShipId {
        ShipId(Uuid::from_u128(n))
    }

    fn state() -> MatchState {
        let mut state = MatchState::new("state-test", MatchConfig::default(), ShipCatalog::standard());
        state.add_player(pid(2), "Terran").unwrap();
        state.add_player(pid(1), "Kel").unwrap();
        state.add_ship(pid(2), sid(20), CORVETTE, Training::Regular).unwrap();
        state.add_ship(pid(2), sid(10), FRIGATE, Training::Veteran).unwrap();
        state.add_ship(pid(1), sid(30), CORVETTE, Training::Green).unwrap();
        state
    }

    #[test]
    fn test_seat_and_fleet_order_preserved() {
        let state = state();
        assert_eq!(state.player(&pid(2)).unwrap().seat, 0);
        assert_eq!(state.player(&pid(1)).unwrap().seat, 1);
        assert_eq!(state.ships_in_seat_order(), vec![sid(20), sid(10), sid(30)]);
    }

    #[test]
    fn test_roster_errors() {
        let mut state = state();
        assert!(matches!(state.add_player(pid(1), "Again"), Err(GameError::InvalidRoster(_))));
        assert!(matches!(
            state.add_ship(pid(1), sid(30), CORVETTE, Training::Green),
            Err(GameError::InvalidRoster(_))
        ));
        assert!(matches!(
            state.add_ship(pid(1), sid(99), TemplateId(Uuid::nil()), Training::Green),
            Err(GameError::InvalidRoster(_))
        ));
        assert!(matches!(
            state.add_ship(pid(7), sid(98), CORVETTE, Training::Green),
            Err(GameError::InvalidRoster(_))
        ));
    }

    #[test]
    fn test_damage_destroys_but_retains_ship() {
        let mut state = state();
        assert!(!state.apply_damage(sid(30), 3, None));
        assert!(state.apply_damage(sid(30), 1, Some(sid(20))));

        let ship = state.ship(&sid(30)).unwrap();
        assert!(!ship.alive);
        assert_eq!(ship.damage, 4);
        assert_eq!(state.sole_survivor(), Some(pid(2)));

        // Dead ships take no further damage
        assert!(!state.apply_damage(sid(30), 2, None));
        assert_eq!(state.ship(&sid(30)).unwrap().damage, 4);
    }

    #[test]
    fn test_thrust_capacity_follows_selection_and_damage() {
        let mut state = state();
        let config = MatchConfig::default();
        let template = state.catalog.get(&FRIGATE).unwrap().clone();
        let ship = state.ship_mut(&sid(10)).unwrap();

        assert_eq!(ship.compute_thrust_capacity(&template, &config), 3);
        ship.systems[1].selected = 0;
        assert_eq!(ship.compute_thrust_capacity(&template, &config), 5);
        ship.order = Some(Order::AllAheadFull);
        assert_eq!(ship.compute_thrust_capacity(&template, &config), 7);
        ship.systems[0].damage = 1;
        assert_eq!(ship.compute_thrust_capacity(&template, &config), 4);
    }

    #[test]
    fn test_find_system_by_effective_name() {
        let mut state = state();
        let template = state.catalog.get(&FRIGATE).unwrap().clone();
        let ship = state.ship_mut(&sid(10)).unwrap();

        assert_eq!(ship.find_system(&template, "Light Guns"), Some(2));
        assert_eq!(ship.find_system(&template, "Lance"), None);
        ship.systems[1].selected = 1;
        assert_eq!(ship.find_system(&template, "Lance"), Some(1));
        assert!(ship.has_command(&template));
    }

    #[test]
    fn test_order_wire_values() {
        assert_eq!(Order::from_wire(0), Some(None));
        assert_eq!(Order::from_wire(2), Some(Some(Order::BraceForImpact)));
        assert_eq!(Order::from_wire(9), None);
        assert_eq!(Order::to_wire(Some(Order::AllAheadFull)), 3);
        assert_eq!(Order::to_wire(None), 0);
    }

    #[test]
    fn test_match_state_determinism() {
        let state1 = state();
        let state2 = state();
        assert_eq!(state1.asteroid_fields, state2.asteroid_fields);
        assert_eq!(state1.compute_hash(), state2.compute_hash());
    }

    #[test]
    fn test_hash_tracks_damage() {
        let mut state = state();
        let before = state.compute_hash();
        state.apply_damage(sid(20), 1, None);
        assert_ne!(before, state.compute_hash());
    }
}
