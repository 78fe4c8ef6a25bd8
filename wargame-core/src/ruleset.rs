//! RuleSet - combat tables, board rules and initial layout

use crate::board::{Adjacency, Coord};
use crate::combat::{default_damage_table, default_repair_table, DamageTable, RepairTable};
use crate::error::SetupError;
use crate::game::GameState;
use crate::units::{Player, Unit, UnitType, DEFAULT_MAX_HEALTH};
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;

/// One unit of the initial layout
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Placement {
    pub at: Coord,
    pub owner: Player,
    pub unit_type: UnitType,
    /// Starting health; full health when omitted
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub health: Option<u8>,
}

impl Placement {
    pub fn new(at: Coord, owner: Player, unit_type: UnitType) -> Self {
        Self {
            at,
            owner,
            unit_type,
            health: None,
        }
    }

    pub fn with_health(mut self, health: u8) -> Self {
        self.health = Some(health);
        self
    }

    pub(crate) fn to_unit(&self, max_health: u8) -> Unit {
        Unit::new(self.unit_type, self.owner, self.health.unwrap_or(max_health))
    }
}

/// Static game configuration, loaded once and shared read-only by every
/// state of a game.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleSet {
    pub name: String,
    pub damage_table: DamageTable,
    pub repair_table: RepairTable,
    pub max_health: u8,
    /// Reach of engagement, attack and repair
    #[serde(default)]
    pub adjacency: Adjacency,
    pub layout: Vec<Placement>,
}

impl RuleSet {
    /// Build the opening position
    pub fn to_game_state(&self, max_turns: u32) -> Result<GameState, SetupError> {
        GameState::new(&self.layout, Arc::new(self.clone()), max_turns)
    }

    /// Same tables, different layout (used for custom positions and tests)
    pub fn with_layout(&self, layout: Vec<Placement>) -> Self {
        Self {
            layout,
            ..self.clone()
        }
    }

    pub fn with_adjacency(mut self, adjacency: Adjacency) -> Self {
        self.adjacency = adjacency;
        self
    }

    /// Load from a JSON file
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read ruleset: {}", path.display()))?;
        let ruleset: RuleSet = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse ruleset: {}", path.display()))?;

        // Surface layout problems at load time rather than at game start
        ruleset
            .to_game_state(1)
            .with_context(|| format!("Invalid layout in ruleset: {}", path.display()))?;

        Ok(ruleset)
    }

    /// Save to a JSON file
    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Standard opening: defender in the top-left corner, attacker in the
    /// bottom-right.
    fn standard_layout() -> Vec<Placement> {
        use Player::{Attacker, Defender};
        use UnitType::*;

        let at = Coord::new;
        vec![
            Placement::new(at(0, 0), Defender, AI),       // A1
            Placement::new(at(0, 1), Defender, Tech),     // A2
            Placement::new(at(1, 0), Defender, Tech),     // B1
            Placement::new(at(0, 2), Defender, Firewall), // A3
            Placement::new(at(2, 0), Defender, Firewall), // C1
            Placement::new(at(1, 1), Defender, Program),  // B2
            Placement::new(at(4, 4), Attacker, AI),       // E5
            Placement::new(at(4, 3), Attacker, Virus),    // E4
            Placement::new(at(3, 4), Attacker, Virus),    // D5
            Placement::new(at(4, 2), Attacker, Program),  // E3
            Placement::new(at(2, 4), Attacker, Program),  // C5
            Placement::new(at(3, 3), Attacker, Firewall), // D4
        ]
    }
}

impl Default for RuleSet {
    fn default() -> Self {
        Self {
            name: "standard".to_string(),
            damage_table: default_damage_table(),
            repair_table: default_repair_table(),
            max_health: DEFAULT_MAX_HEALTH,
            adjacency: Adjacency::Orthogonal,
            layout: Self::standard_layout(),
        }
    }
}
