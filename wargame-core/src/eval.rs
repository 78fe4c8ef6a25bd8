//! Position evaluation

use crate::error::ParseError;
use crate::game::GameState;
use crate::units::{Player, UnitType, UNIT_TYPE_COUNT};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Heuristic selector
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Heuristic {
    /// Unit counts: 3 per unit, 9999 per AI
    #[default]
    E0,
    /// Health-weighted material plus mobility
    E1,
    /// `E1` plus threat on the enemy AI, proximity and engagement
    E2,
}

impl FromStr for Heuristic {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "e0" => Ok(Heuristic::E0),
            "e1" => Ok(Heuristic::E1),
            "e2" => Ok(Heuristic::E2),
            _ => Err(ParseError::UnknownHeuristic(s.to_string())),
        }
    }
}

impl fmt::Display for Heuristic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Heuristic::E0 => "e0",
            Heuristic::E1 => "e1",
            Heuristic::E2 => "e2",
        })
    }
}

/// Win value. Dominates any heuristic magnitude.
pub const WIN_SCORE: i64 = 100_000_000;

/// Value of an AI unit in the material terms
pub const AI_WEIGHT: i64 = 9999;

/// e0 value of every other unit
const E0_UNIT_WEIGHT: i64 = 3;

/// e1 per-health-point weights, indexed by `UnitType::index()`
const HEALTH_WEIGHTS: [i64; UNIT_TYPE_COUNT] = [
    AI_WEIGHT, // AI
    4,         // Tech
    5,         // Virus
    3,         // Program
    2,         // Firewall
];

const MOBILITY_WEIGHT: i64 = 1;
const THREAT_WEIGHT: i64 = 20;
const PROXIMITY_WEIGHT: i64 = 2;
const ENGAGEMENT_WEIGHT: i64 = 5;

/// Largest Manhattan distance on the board
const MAX_DISTANCE: i64 = 8;

/// Evaluate a position from the Attacker's perspective (positive favors the
/// Attacker).
pub fn evaluate(state: &GameState, heuristic: Heuristic) -> i64 {
    if let Some(winner) = state.winner() {
        return winner.sign() * WIN_SCORE;
    }

    match heuristic {
        Heuristic::E0 => e0(state),
        Heuristic::E1 => e1(state),
        Heuristic::E2 => e1(state) + e2_terms(state),
    }
}

/// Evaluate with a depth bonus so that faster wins and slower losses are
/// preferred. `depth_remaining` is the unused search depth at this node.
pub fn evaluate_with_depth(state: &GameState, heuristic: Heuristic, depth_remaining: u32) -> i64 {
    match state.winner() {
        Some(winner) => winner.sign() * (WIN_SCORE + depth_remaining as i64),
        None => evaluate(state, heuristic),
    }
}

/// Whether a score is a proven win or loss
pub fn is_decisive(score: i64) -> bool {
    score.abs() >= WIN_SCORE
}

// ============================================================================
// HEURISTICS
// ============================================================================

fn e0(state: &GameState) -> i64 {
    state
        .units()
        .map(|(_, unit)| {
            let value = if unit.is_ai() { AI_WEIGHT } else { E0_UNIT_WEIGHT };
            unit.owner.sign() * value
        })
        .sum()
}

fn e1(state: &GameState) -> i64 {
    let material: i64 = state
        .units()
        .map(|(_, unit)| {
            unit.owner.sign() * unit.health as i64 * HEALTH_WEIGHTS[unit.unit_type.index()]
        })
        .sum();

    let mobility =
        state.mobility(Player::Attacker) as i64 - state.mobility(Player::Defender) as i64;

    material + MOBILITY_WEIGHT * mobility
}

fn e2_terms(state: &GameState) -> i64 {
    side_pressure(state, Player::Attacker) - side_pressure(state, Player::Defender)
}

/// Threat, proximity and engagement pressure `player` exerts on the opponent
fn side_pressure(state: &GameState, player: Player) -> i64 {
    let Some(enemy_ai) = state.ai_pos(player.opponent()) else {
        return 0;
    };
    let rules = state.rules();
    let adjacency = rules.adjacency;

    let mut threat = 0;
    let mut proximity = 0;
    for (at, unit) in state.units_of(player) {
        if at.is_adjacent(enemy_ai, adjacency) {
            threat += rules.damage_table.get(unit.unit_type, UnitType::AI) as i64;
        }
        if !unit.is_ai() {
            proximity += MAX_DISTANCE - at.distance_to(enemy_ai) as i64;
        }
    }

    // Enemy units pinned in place by contact
    let pinned = state
        .units_of(player.opponent())
        .filter(|(at, unit)| !unit.unit_type.moves_while_engaged() && state.is_engaged(*at))
        .count() as i64;

    THREAT_WEIGHT * threat + PROXIMITY_WEIGHT * proximity + ENGAGEMENT_WEIGHT * pinned
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::Coord;
    use crate::game::Action;
    use crate::ruleset::{Placement, RuleSet};

    fn c(s: &str) -> Coord {
        s.parse().unwrap()
    }

    #[test]
    fn test_e0_standard_opening_is_even() {
        let game = RuleSet::default().to_game_state(100).unwrap();
        assert_eq!(evaluate(&game, Heuristic::E0), 0);
    }

    #[test]
    fn test_e0_counts_units() {
        let game = RuleSet::default()
            .with_layout(vec![
                Placement::new(c("A1"), Player::Defender, UnitType::AI),
                Placement::new(c("E5"), Player::Attacker, UnitType::AI),
                Placement::new(c("E4"), Player::Attacker, UnitType::Virus),
                Placement::new(c("D5"), Player::Attacker, UnitType::Program),
            ])
            .to_game_state(100)
            .unwrap();
        assert_eq!(evaluate(&game, Heuristic::E0), 6);
    }

    #[test]
    fn test_e1_rewards_health() {
        let layout = |health| {
            vec![
                Placement::new(c("A1"), Player::Defender, UnitType::AI),
                Placement::new(c("E5"), Player::Attacker, UnitType::AI),
                Placement::new(c("B1"), Player::Defender, UnitType::Tech).with_health(health),
            ]
        };
        let rules = RuleSet::default();
        let healthy = rules.with_layout(layout(9)).to_game_state(100).unwrap();
        let wounded = rules.with_layout(layout(3)).to_game_state(100).unwrap();
        assert!(evaluate(&wounded, Heuristic::E1) > evaluate(&healthy, Heuristic::E1));
    }

    #[test]
    fn test_e2_rewards_threat_on_ai() {
        let rules = RuleSet::default();
        let near = rules
            .with_layout(vec![
                Placement::new(c("A1"), Player::Defender, UnitType::AI),
                Placement::new(c("E5"), Player::Attacker, UnitType::AI),
                Placement::new(c("A2"), Player::Attacker, UnitType::Virus),
            ])
            .to_game_state(100)
            .unwrap();
        let far = rules
            .with_layout(vec![
                Placement::new(c("A1"), Player::Defender, UnitType::AI),
                Placement::new(c("E5"), Player::Attacker, UnitType::AI),
                Placement::new(c("D4"), Player::Attacker, UnitType::Virus),
            ])
            .to_game_state(100)
            .unwrap();
        assert!(evaluate(&near, Heuristic::E2) > evaluate(&far, Heuristic::E2));
        assert_eq!(evaluate(&near, Heuristic::E0), evaluate(&far, Heuristic::E0));
    }

    #[test]
    fn test_terminal_dominates() {
        let game = RuleSet::default()
            .with_layout(vec![
                Placement::new(c("A1"), Player::Defender, UnitType::AI),
                Placement::new(c("A2"), Player::Attacker, UnitType::Virus),
                Placement::new(c("E5"), Player::Attacker, UnitType::AI),
            ])
            .to_game_state(100)
            .unwrap();
        let won = game
            .apply(Action::Attack { from: c("A2"), target: c("A1") })
            .unwrap()
            .state;
        for h in [Heuristic::E0, Heuristic::E1, Heuristic::E2] {
            assert_eq!(evaluate(&won, h), WIN_SCORE);
        }
        assert!(evaluate_with_depth(&won, Heuristic::E0, 3) > evaluate_with_depth(&won, Heuristic::E0, 1));
        assert!(is_decisive(evaluate_with_depth(&won, Heuristic::E0, 0)));
    }

    #[test]
    fn test_turn_limit_scores_for_defender() {
        let game = RuleSet::default().to_game_state(0).unwrap();
        assert_eq!(evaluate(&game, Heuristic::E1), -WIN_SCORE);
        assert_eq!(evaluate_with_depth(&game, Heuristic::E1, 2), -(WIN_SCORE + 2));
    }

    #[test]
    fn test_heuristic_parse() {
        assert_eq!("E2".parse::<Heuristic>(), Ok(Heuristic::E2));
        assert_eq!(Heuristic::E1.to_string(), "e1");
        assert!("e3".parse::<Heuristic>().is_err());
    }
}
