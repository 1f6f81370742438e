//! Ship Systems and Templates
//!
//! Immutable template data. Ships reference templates by id and keep only
//! their per-instance status (damage, used, selected variant) in `Ship`.

use std::collections::BTreeMap;
use serde::{Serialize, Deserialize};
use uuid::Uuid;

// =============================================================================
// TRAINING
// =============================================================================

/// Crew training rating. Gates both system cost and dice target numbers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
#[repr(u8)]
#[derive(Default)]
pub enum Training {
    /// Fresh crews: succeed on 6
    Green = 0,
    /// Line crews: succeed on 5+
    #[default]
    Regular = 1,
    /// Seasoned crews: succeed on 4+
    Veteran = 2,
    /// Best in the fleet: succeed on 3+
    Elite = 3,
}

impl Training {
    /// Number of training ratings (length of every cost table).
    pub const COUNT: usize = 4;

    /// Minimum die face that counts as a success.
    pub fn target_number(self) -> u8 {
        match self {
            Training::Green => 6,
            Training::Regular => 5,
            Training::Veteran => 4,
            Training::Elite => 3,
        }
    }

    /// Get training from index (0-3).
    pub fn from_index(index: u8) -> Option<Self> {
        match index {
            0 => Some(Training::Green),
            1 => Some(Training::Regular),
            2 => Some(Training::Veteran),
            3 => Some(Training::Elite),
            _ => None,
        }
    }
}

impl TryFrom<u8> for Training {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Training::from_index(value).ok_or_else(|| format!("unknown training rating {value}"))
    }
}

impl From<Training> for u8 {
    fn from(training: Training) -> Self {
        training as u8
    }
}

// =============================================================================
// RANGE BANDS
// =============================================================================

/// Three ascending range thresholds, each with its own attack modifier.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct RangeBands {
    /// Upper bound of short range
    pub short: f64,
    /// Upper bound of medium range
    pub medium: f64,
    /// Upper bound of long range (total range)
    pub long: f64,
    /// Modifier inside short range
    pub short_modifier: i32,
    /// Modifier inside medium range
    pub medium_modifier: i32,
    /// Modifier inside long range
    pub long_modifier: i32,
}

impl RangeBands {
    /// Modifier for a target at `distance`, or `None` when out of range.
    ///
    /// The first threshold the distance falls under wins; anything up to and
    /// including total range that missed both inner bands uses the long
    /// modifier.
    pub fn modifier_at(&self, distance: f64) -> Option<i32> {
        if distance < self.short {
            Some(self.short_modifier)
        } else if distance < self.medium {
            Some(self.medium_modifier)
        } else if distance <= self.long {
            Some(self.long_modifier)
        } else {
            None
        }
    }
}

// =============================================================================
// SYSTEMS
// =============================================================================

/// Weapon statistics.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct WeaponStats {
    /// Hull damage per unintercepted hit
    pub damage: u32,
    /// Dice rolled per firing
    pub shots: u32,
    /// Range envelope
    pub ranges: RangeBands,
}

/// What a system does.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum SystemKind {
    /// Contributes thrust each round
    Thruster {
        /// Thrust points
        thrust: i32,
    },
    /// Fires once per round in the action phase
    Weapon(WeaponStats),
    /// Allows standing orders
    Command,
    /// Carries small craft
    Hangar {
        /// Craft carried
        capacity: u32,
    },
    /// Point defence: cancels incoming hits
    Defence {
        /// Dice rolled when engaged
        dice: u32,
    },
    /// Two mutually exclusive variants, chosen in the command phase
    Composite(Box<[ShipSystem; 2]>),
}

/// A ship system template.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ShipSystem {
    /// Display name, unique within a template
    pub name: String,
    /// Behaviour
    pub kind: SystemKind,
    /// Cost indexed by training rating
    pub cost: [u32; Training::COUNT],
}

impl ShipSystem {
    /// Create a thruster.
    pub fn thruster(name: &str, thrust: i32, cost: [u32; Training::COUNT]) -> Self {
        Self { name: name.to_string(), kind: SystemKind::Thruster { thrust }, cost }
    }

    /// Create a weapon.
    pub fn weapon(name: &str, stats: WeaponStats, cost: [u32; Training::COUNT]) -> Self {
        Self { name: name.to_string(), kind: SystemKind::Weapon(stats), cost }
    }

    /// Create a command system.
    pub fn command(name: &str, cost: [u32; Training::COUNT]) -> Self {
        Self { name: name.to_string(), kind: SystemKind::Command, cost }
    }

    /// Create a hangar.
    pub fn hangar(name: &str, capacity: u32, cost: [u32; Training::COUNT]) -> Self {
        Self { name: name.to_string(), kind: SystemKind::Hangar { capacity }, cost }
    }

    /// Create a point defence system.
    pub fn defence(name: &str, dice: u32, cost: [u32; Training::COUNT]) -> Self {
        Self { name: name.to_string(), kind: SystemKind::Defence { dice }, cost }
    }

    /// Create a composite of exactly two variants.
    ///
    /// Costs the more expensive variant at each training rating.
    pub fn composite(name: &str, first: ShipSystem, second: ShipSystem) -> Self {
        let mut cost = [0; Training::COUNT];
        for (i, slot) in cost.iter_mut().enumerate() {
            *slot = first.cost[i].max(second.cost[i]);
        }
        Self {
            name: name.to_string(),
            kind: SystemKind::Composite(Box::new([first, second])),
            cost,
        }
    }

    /// Whether this system has selectable variants.
    pub fn is_composite(&self) -> bool {
        matches!(self.kind, SystemKind::Composite(_))
    }

    /// The system in effect given a selector (-1 = unset).
    ///
    /// Plain systems ignore the selector; an unset composite is inert.
    pub fn resolve(&self, selected: i8) -> Option<&ShipSystem> {
        match &self.kind {
            SystemKind::Composite(variants) => match selected {
                0 | 1 => variants.get(selected as usize),
                _ => None,
            },
            _ => Some(self),
        }
    }

    /// Cost at a given training rating.
    pub fn cost_for(&self, training: Training) -> u32 {
        self.cost[training as usize]
    }
}

// =============================================================================
// TEMPLATES
// =============================================================================

/// Ship template identifier.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TemplateId(pub Uuid);

/// A ship design.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ShipTemplate {
    /// Template identity
    pub id: TemplateId,
    /// Class name
    pub name: String,
    /// Damage the hull absorbs before the ship is destroyed
    pub hull: u32,
    /// Ordered systems; indices are stable for the life of a match
    pub systems: Vec<ShipSystem>,
}

impl ShipTemplate {
    /// Total cost of the design at a training rating.
    pub fn cost(&self, training: Training) -> u32 {
        self.systems.iter().map(|s| s.cost_for(training)).sum()
    }

    /// Get a system by index.
    pub fn system(&self, index: usize) -> Option<&ShipSystem> {
        self.systems.get(index)
    }
}

/// Id-indexed template registry.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ShipCatalog {
    templates: BTreeMap<TemplateId, ShipTemplate>,
}

/// Builtin corvette template id.
pub const CORVETTE: TemplateId = TemplateId(Uuid::from_u128(0x6c1e_0a0e_0000_4000_8000_0000_0000_0001));
/// Builtin frigate template id.
pub const FRIGATE: TemplateId = TemplateId(Uuid::from_u128(0x6c1e_0a0e_0000_4000_8000_0000_0000_0002));
/// Builtin cruiser template id.
pub const CRUISER: TemplateId = TemplateId(Uuid::from_u128(0x6c1e_0a0e_0000_4000_8000_0000_0000_0003));

impl ShipCatalog {
    /// Create an empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a template, replacing any with the same id.
    pub fn insert(&mut self, template: ShipTemplate) {
        self.templates.insert(template.id, template);
    }

    /// Look up a template.
    pub fn get(&self, id: &TemplateId) -> Option<&ShipTemplate> {
        self.templates.get(id)
    }

    /// Number of templates.
    pub fn len(&self) -> usize {
        self.templates.len()
    }

    /// Whether the catalog is empty.
    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }

    /// The builtin designs.
    pub fn standard() -> Self {
        let light_guns = WeaponStats {
            damage: 1,
            shots: 2,
            ranges: RangeBands {
                short: 8.0,
                medium: 16.0,
                long: 24.0,
                short_modifier: 1,
                medium_modifier: 0,
                long_modifier: -1,
            },
        };
        let lance = WeaponStats {
            damage: 2,
            shots: 1,
            ranges: RangeBands {
                short: 12.0,
                medium: 24.0,
                long: 36.0,
                short_modifier: 0,
                medium_modifier: 0,
                long_modifier: -1,
            },
        };
        let broadside = WeaponStats {
            damage: 1,
            shots: 4,
            ranges: RangeBands {
                short: 6.0,
                medium: 12.0,
                long: 18.0,
                short_modifier: 2,
                medium_modifier: 1,
                long_modifier: 0,
            },
        };

        let mut catalog = Self::new();
        catalog.insert(ShipTemplate {
            id: CORVETTE,
            name: "Corvette".to_string(),
            hull: 4,
            systems: vec![
                ShipSystem::thruster("Main Drive", 4, [6, 8, 10, 12]),
                ShipSystem::weapon("Light Guns", light_guns, [4, 5, 6, 8]),
                ShipSystem::defence("Flak", 1, [2, 3, 3, 4]),
            ],
        });
        catalog.insert(ShipTemplate {
            id: FRIGATE,
            name: "Frigate".to_string(),
            hull: 6,
            systems: vec![
                ShipSystem::thruster("Main Drive", 3, [6, 8, 10, 12]),
                ShipSystem::composite(
                    "Reactor Tap",
                    ShipSystem::thruster("Afterburner", 2, [3, 4, 5, 6]),
                    ShipSystem::weapon("Lance", lance, [5, 6, 7, 9]),
                ),
                ShipSystem::weapon("Light Guns", light_guns, [4, 5, 6, 8]),
                ShipSystem::command("Bridge", [2, 3, 4, 5]),
            ],
        });
        catalog.insert(ShipTemplate {
            id: CRUISER,
            name: "Cruiser".to_string(),
            hull: 10,
            systems: vec![
                ShipSystem::thruster("Main Drive", 2, [8, 10, 12, 14]),
                ShipSystem::weapon("Broadside", broadside, [8, 10, 12, 15]),
                ShipSystem::weapon("Lance", lance, [5, 6, 7, 9]),
                ShipSystem::defence("Point Defence", 2, [4, 5, 6, 7]),
                ShipSystem::command("Flag Bridge", [3, 4, 5, 6]),
                ShipSystem::hangar("Launch Bay", 2, [4, 5, 6, 7]),
            ],
        });
        catalog
    }
}
