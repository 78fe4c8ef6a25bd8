//! Combat resolution: damage and repair magnitudes

use crate::units::{Unit, UnitType, UNIT_TYPE_COUNT};
use serde::{Deserialize, Serialize};

/// Damage dealt to every surrounding unit by a self-destruct
pub const SELF_DESTRUCT_DAMAGE: u8 = 2;

/// Square table keyed by (acting unit type, other unit type)
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UnitTable(pub [[u8; UNIT_TYPE_COUNT]; UNIT_TYPE_COUNT]);

impl UnitTable {
    pub fn get(&self, actor: UnitType, other: UnitType) -> u8 {
        self.0[actor.index()][other.index()]
    }
}

/// Damage an attacker deals to a defender of the given types
pub type DamageTable = UnitTable;

/// Health a repairer restores to a friendly target of the given types
pub type RepairTable = UnitTable;

/// Standard damage table (rows: AI, Tech, Virus, Program, Firewall)
pub fn default_damage_table() -> DamageTable {
    UnitTable([
        [3, 3, 3, 3, 1], // AI
        [1, 1, 6, 1, 1], // Tech
        [9, 6, 1, 6, 1], // Virus
        [3, 3, 3, 3, 1], // Program
        [1, 1, 1, 1, 1], // Firewall
    ])
}

/// Standard repair table. Only AI and Tech repair.
pub fn default_repair_table() -> RepairTable {
    UnitTable([
        [0, 1, 1, 0, 0], // AI
        [3, 0, 0, 3, 3], // Tech
        [0, 0, 0, 0, 0], // Virus
        [0, 0, 0, 0, 0], // Program
        [0, 0, 0, 0, 0], // Firewall
    ])
}

/// Damage `attacker` inflicts on `target`, clamped to the target's health
pub fn damage_amount(table: &DamageTable, attacker: &Unit, target: &Unit) -> u8 {
    table.get(attacker.unit_type, target.unit_type).min(target.health)
}

/// Health `repairer` restores to `target`, clamped to the missing health
pub fn repair_amount(table: &RepairTable, repairer: &Unit, target: &Unit, max_health: u8) -> u8 {
    table
        .get(repairer.unit_type, target.unit_type)
        .min(max_health.saturating_sub(target.health))
}

/// Mutual attack outcome: (damage to target, counter-damage to attacker).
///
/// Both amounts are computed from the pre-combat units so resolution order
/// never matters.
pub fn resolve_attack(table: &DamageTable, attacker: &Unit, target: &Unit) -> (u8, u8) {
    (
        damage_amount(table, attacker, target),
        damage_amount(table, target, attacker),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::units::Player;

    fn unit(unit_type: UnitType, owner: Player, health: u8) -> Unit {
        Unit::new(unit_type, owner, health)
    }

    #[test]
    fn test_virus_kills_ai() {
        let table = default_damage_table();
        let virus = unit(UnitType::Virus, Player::Attacker, 9);
        let ai = unit(UnitType::AI, Player::Defender, 9);
        assert_eq!(damage_amount(&table, &virus, &ai), 9);
        assert_eq!(damage_amount(&table, &ai, &virus), 3);
    }

    #[test]
    fn test_damage_clamped_to_health() {
        let table = default_damage_table();
        let virus = unit(UnitType::Virus, Player::Attacker, 9);
        let tech = unit(UnitType::Tech, Player::Defender, 2);
        assert_eq!(damage_amount(&table, &virus, &tech), 2);
    }

    #[test]
    fn test_resolve_attack_is_symmetric_lookup() {
        let table = default_damage_table();
        let tech = unit(UnitType::Tech, Player::Attacker, 9);
        let virus = unit(UnitType::Virus, Player::Defender, 9);
        assert_eq!(resolve_attack(&table, &tech, &virus), (6, 6));
        let program = unit(UnitType::Program, Player::Attacker, 9);
        let firewall = unit(UnitType::Firewall, Player::Defender, 9);
        assert_eq!(resolve_attack(&table, &program, &firewall), (1, 1));
    }

    #[test]
    fn test_repair_clamped_to_max() {
        let table = default_repair_table();
        let tech = unit(UnitType::Tech, Player::Defender, 9);
        let ai = unit(UnitType::AI, Player::Defender, 8);
        assert_eq!(repair_amount(&table, &tech, &ai, 9), 1);
        let full = unit(UnitType::AI, Player::Defender, 9);
        assert_eq!(repair_amount(&table, &tech, &full, 9), 0);
    }

    #[test]
    fn test_only_ai_and_tech_repair() {
        let table = default_repair_table();
        for actor in [UnitType::Virus, UnitType::Program, UnitType::Firewall] {
            for other in UnitType::ALL {
                assert_eq!(table.get(actor, other), 0);
            }
        }
        assert_eq!(table.get(UnitType::AI, UnitType::Virus), 1);
        assert_eq!(table.get(UnitType::Tech, UnitType::Firewall), 3);
    }
}
