//! Unit types, players and per-type rule tables

use crate::board::Direction;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Number of unit types (size of the damage/repair tables)
pub const UNIT_TYPE_COUNT: usize = 5;

/// Default maximum health
pub const DEFAULT_MAX_HEALTH: u8 = 9;

/// Unit type. The discriminant is the index into the combat tables.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UnitType {
    AI = 0,
    Tech = 1,
    Virus = 2,
    Program = 3,
    Firewall = 4,
}

impl UnitType {
    pub const ALL: [UnitType; UNIT_TYPE_COUNT] = [
        UnitType::AI,
        UnitType::Tech,
        UnitType::Virus,
        UnitType::Program,
        UnitType::Firewall,
    ];

    pub const fn index(self) -> usize {
        self as usize
    }

    /// Single-letter label used on the rendered board
    pub fn symbol(self) -> char {
        match self {
            UnitType::AI => 'A',
            UnitType::Tech => 'T',
            UnitType::Virus => 'V',
            UnitType::Program => 'P',
            UnitType::Firewall => 'F',
        }
    }

    /// Tech and Virus may leave combat; everything else is pinned
    pub fn moves_while_engaged(self) -> bool {
        MOVE_RULES[self.index()].moves_while_engaged
    }
}

/// Player side
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Player {
    Attacker = 0,
    Defender = 1,
}

impl Player {
    pub fn opponent(self) -> Self {
        match self {
            Player::Attacker => Player::Defender,
            Player::Defender => Player::Attacker,
        }
    }

    /// +1 for the Attacker, -1 for the Defender (evaluation sign convention)
    pub fn sign(self) -> i64 {
        match self {
            Player::Attacker => 1,
            Player::Defender => -1,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Player::Attacker => "Attacker",
            Player::Defender => "Defender",
        }
    }
}

impl fmt::Display for Player {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A unit on the board. Its position is the key it is stored under.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Unit {
    pub unit_type: UnitType,
    pub owner: Player,
    pub health: u8,
}

impl Unit {
    pub const fn new(unit_type: UnitType, owner: Player, health: u8) -> Self {
        Self { unit_type, owner, health }
    }

    pub fn is_ai(&self) -> bool {
        self.unit_type == UnitType::AI
    }

    pub fn is_alive(&self) -> bool {
        self.health > 0
    }

    /// Whether this unit may step in `direction` when not engaged
    pub fn can_move(&self, direction: Direction) -> bool {
        direction.is_orthogonal()
            && MOVE_RULES[self.unit_type.index()].directions[self.owner as usize]
                & direction_bit(direction)
                != 0
    }
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let owner = match self.owner {
            Player::Attacker => 'a',
            Player::Defender => 'd',
        };
        write!(f, "{}{}{}", owner, self.unit_type.symbol(), self.health)
    }
}

// ============================================================================
// MOVEMENT TABLE
// ============================================================================

/// Direction bitmasks (orthogonal only)
const DIR_UP: u8 = 1 << 0;
const DIR_LEFT: u8 = 1 << 1;
const DIR_DOWN: u8 = 1 << 2;
const DIR_RIGHT: u8 = 1 << 3;

const ALL_DIRS: u8 = DIR_UP | DIR_LEFT | DIR_DOWN | DIR_RIGHT;
const ATTACKER_ADVANCE: u8 = DIR_UP | DIR_LEFT;
const DEFENDER_ADVANCE: u8 = DIR_DOWN | DIR_RIGHT;

fn direction_bit(direction: Direction) -> u8 {
    match direction {
        Direction::Up => DIR_UP,
        Direction::Left => DIR_LEFT,
        Direction::Down => DIR_DOWN,
        Direction::Right => DIR_RIGHT,
        _ => 0,
    }
}

/// Movement rules for one unit type
struct MoveRule {
    /// Allowed directions, indexed by owner
    directions: [u8; 2],
    moves_while_engaged: bool,
}

impl MoveRule {
    const fn new(attacker: u8, defender: u8, moves_while_engaged: bool) -> Self {
        Self {
            directions: [attacker, defender],
            moves_while_engaged,
        }
    }
}

/// Indexed by `UnitType::index()`
static MOVE_RULES: [MoveRule; UNIT_TYPE_COUNT] = [
    MoveRule::new(ATTACKER_ADVANCE, DEFENDER_ADVANCE, false), // AI
    MoveRule::new(ALL_DIRS, ALL_DIRS, true),                  // Tech
    MoveRule::new(ALL_DIRS, ALL_DIRS, true),                  // Virus
    MoveRule::new(ATTACKER_ADVANCE, DEFENDER_ADVANCE, false), // Program
    MoveRule::new(ATTACKER_ADVANCE, DEFENDER_ADVANCE, false), // Firewall
];
