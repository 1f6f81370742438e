//! Protocol Records
//!
//! Wire format of the authoritative game state as served by the transport.
//! All records are JSON; field names are consumed and produced verbatim.

use std::collections::BTreeMap;
use serde::{Serialize, Deserialize};

use crate::game::state::{PlayerId, ShipId};
use crate::game::systems::{ShipCatalog, TemplateId, Training};
use crate::game::turn::Turn;

// =============================================================================
// ROSTERS
// =============================================================================

/// One ship of a fleet list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RosterShip {
    /// Instance id
    pub ship_uuid: ShipId,
    /// Template id
    pub template_uuid: TemplateId,
    /// Crew training rating (0 = green .. 3 = elite)
    #[serde(default)]
    pub training: Training,
}

/// A player's fleet list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FleetRoster {
    /// Faction name
    pub faction: String,
    /// Ships in fleet order
    pub ships: Vec<RosterShip>,
}

impl FleetRoster {
    /// Points cost of the fleet, or None if a template is unknown.
    pub fn cost(&self, catalog: &ShipCatalog) -> Option<u32> {
        self.ships
            .iter()
            .map(|s| catalog.get(&s.template_uuid).map(|t| t.cost(s.training)))
            .sum()
    }
}

// =============================================================================
// GAME STATE
// =============================================================================

/// Authoritative game record: roster plus ordered turn log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameState {
    /// Game id
    pub id: String,
    /// Scenario name
    #[serde(default)]
    pub scenario: String,
    /// Match seed string
    pub seed: String,
    /// Seats in the match
    pub no_players: usize,
    /// Joined players in seat order
    #[serde(default)]
    pub players: Vec<PlayerId>,
    /// Append-only turn log
    #[serde(default)]
    pub turns: Vec<Turn>,
    /// Fleet lists by player
    #[serde(default)]
    pub rosters: BTreeMap<PlayerId, FleetRoster>,
}

impl GameState {
    /// Create an empty game.
    pub fn new(id: &str, scenario: &str, seed: &str, no_players: usize) -> Self {
        Self {
            id: id.to_string(),
            scenario: scenario.to_string(),
            seed: seed.to_string(),
            no_players,
            players: Vec::new(),
            turns: Vec::new(),
            rosters: BTreeMap::new(),
        }
    }

    /// Whether every seat is filled and has a fleet list.
    pub fn rosters_complete(&self) -> bool {
        self.no_players > 0
            && self.players.len() == self.no_players
            && self.players.iter().all(|p| self.rosters.contains_key(p))
    }

    /// Serialize to JSON string.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserialize from JSON string.
    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::systems::{CORVETTE, FRIGATE};
    use crate::game::turn::TurnAction;
    use uuid::Uuid;

    const SAMPLE: &str = r#"{
        "id": "g-1",
        "scenario": "Skirmish",
        "seed": "armada",
        "no_players": 2,
        "players": ["00000000-0000-0000-0000-00000000000a"],
        "turns": [
            { "action": "Deploy",
              "player": "00000000-0000-0000-0000-00000000000a",
              "ship": "00000000-0000-0000-0000-0000000000a1",
              "location": [-40.0, 0.0], "rotation": 0.0 }
        ],
        "rosters": {
            "00000000-0000-0000-0000-00000000000a": {
                "faction": "Terran",
                "ships": [
                    { "ship_uuid": "00000000-0000-0000-0000-0000000000a1",
                      "template_uuid": "6c1e0a0e-0000-4000-8000-000000000001",
                      "training": 2 }
                ]
            }
        }
    }"#;

    #[test]
    fn test_parse_game_state() {
        let game = GameState::from_json(SAMPLE).unwrap();
        let player = PlayerId(Uuid::from_u128(0xA));

        assert_eq!(game.seed, "armada");
        assert_eq!(game.players, vec![player]);
        assert_eq!(game.turns.len(), 1);
        assert_eq!(game.turns[0].action, TurnAction::Deploy);

        let roster = &game.rosters[&player];
        assert_eq!(roster.ships[0].template_uuid, CORVETTE);
        assert_eq!(roster.ships[0].training, Training::Veteran);
        assert!(!game.rosters_complete());
    }

    #[test]
    fn test_unknown_training_rejected() {
        let bad = SAMPLE.replace("\"training\": 2", "\"training\": 9");
        assert!(GameState::from_json(&bad).is_err());
    }

    #[test]
    fn test_fleet_cost() {
        let catalog = ShipCatalog::standard();
        let roster = FleetRoster {
            faction: "Kel".into(),
            ships: vec![
                RosterShip { ship_uuid: ShipId(Uuid::from_u128(1)), template_uuid: CORVETTE, training: Training::Green },
                RosterShip { ship_uuid: ShipId(Uuid::from_u128(2)), template_uuid: FRIGATE, training: Training::Green },
            ],
        };
        let corvette = catalog.get(&CORVETTE).unwrap().cost(Training::Green);
        let frigate = catalog.get(&FRIGATE).unwrap().cost(Training::Green);
        assert_eq!(roster.cost(&catalog), Some(corvette + frigate));

        let mut unknown = roster.clone();
        unknown.ships[0].template_uuid = TemplateId(Uuid::nil());
        assert_eq!(unknown.cost(&catalog), None);
    }

    #[test]
    fn test_state_json_roundtrip_keeps_log() {
        let game = GameState::from_json(SAMPLE).unwrap();
        let back = GameState::from_json(&game.to_json().unwrap()).unwrap();
        assert_eq!(game, back);
    }
}
