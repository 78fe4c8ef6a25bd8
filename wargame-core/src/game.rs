//! Game state, action validation and application

use crate::board::{Adjacency, Coord, CoordPair, Direction, BOARD_DIM};
use crate::combat::{repair_amount, resolve_attack, SELF_DESTRUCT_DAMAGE};
use crate::error::{Rejection, SetupError};
use crate::ruleset::{Placement, RuleSet};
use crate::units::{Player, Unit};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

// ============================================================================
// CORE TYPES
// ============================================================================

/// Game result
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum GameResult {
    Ongoing,
    AttackerWins,
    DefenderWins,
}

impl GameResult {
    pub fn winner(self) -> Option<Player> {
        match self {
            GameResult::Ongoing => None,
            GameResult::AttackerWins => Some(Player::Attacker),
            GameResult::DefenderWins => Some(Player::Defender),
        }
    }
}

impl From<Player> for GameResult {
    fn from(winner: Player) -> Self {
        match winner {
            Player::Attacker => GameResult::AttackerWins,
            Player::Defender => GameResult::DefenderWins,
        }
    }
}

/// A player action
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Action {
    Move { from: Coord, to: Coord },
    Attack { from: Coord, target: Coord },
    Repair { from: Coord, target: Coord },
    SelfDestruct { at: Coord },
}

impl Action {
    /// Cell of the acting unit
    pub fn source(&self) -> Coord {
        match *self {
            Action::Move { from, .. }
            | Action::Attack { from, .. }
            | Action::Repair { from, .. } => from,
            Action::SelfDestruct { at } => at,
        }
    }

    /// Destination or target cell (the source itself for self-destruct)
    pub fn target(&self) -> Coord {
        match *self {
            Action::Move { to, .. } => to,
            Action::Attack { target, .. } | Action::Repair { target, .. } => target,
            Action::SelfDestruct { at } => at,
        }
    }

    /// Boundary notation for this action
    pub fn to_pair(&self) -> CoordPair {
        CoordPair::new(self.source(), self.target())
    }

    /// Human-readable description, e.g. `attack from D4 to D3`
    pub fn describe(&self) -> String {
        match *self {
            Action::Move { from, to } => format!("move from {} to {}", from, to),
            Action::Attack { from, target } => format!("attack from {} to {}", from, target),
            Action::Repair { from, target } => format!("repair from {} to {}", from, target),
            Action::SelfDestruct { at } => format!("self-destruct at {}", at),
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.to_pair().fmt(f)
    }
}

/// A unit removed from the board by an action
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DestroyedUnit {
    pub at: Coord,
    pub unit: Unit,
}

/// Result of an accepted action
#[derive(Clone, Debug)]
pub struct Applied {
    pub state: GameState,
    pub destroyed: Vec<DestroyedUnit>,
}

// ============================================================================
// GAME STATE
// ============================================================================

/// Game state (clone to mutate)
#[derive(Clone, Debug)]
pub struct GameState {
    /// Board: cell -> unit (sparse representation)
    board: FxHashMap<Coord, Unit>,

    /// Static tables and adjacency, shared by every state of a game
    rules: Arc<RuleSet>,

    /// AI positions for quick terminal checks
    attacker_ai_pos: Option<Coord>,
    defender_ai_pos: Option<Coord>,

    active_player: Player,

    /// Number of the next turn (1-based)
    turn: u32,
    max_turns: u32,

    /// Player who lost by forfeit (illegal AI action or timeout)
    forfeited: Option<Player>,
}

impl GameState {
    // ========================================================================
    // CONSTRUCTORS
    // ========================================================================

    /// Create a game from an initial layout. The Attacker moves first.
    pub fn new(
        layout: &[Placement],
        rules: Arc<RuleSet>,
        max_turns: u32,
    ) -> Result<Self, SetupError> {
        if rules.max_health == 0 {
            return Err(SetupError::ZeroMaxHealth);
        }

        let mut board = FxHashMap::default();
        let mut attacker_ais = Vec::new();
        let mut defender_ais = Vec::new();

        for placement in layout {
            let at = placement.at;
            if !at.is_valid() {
                return Err(SetupError::OffBoard(at));
            }
            let unit = placement.to_unit(rules.max_health);
            if unit.health == 0 || unit.health > rules.max_health {
                return Err(SetupError::BadHealth {
                    coord: at,
                    health: unit.health,
                    max: rules.max_health,
                });
            }
            if board.insert(at, unit).is_some() {
                return Err(SetupError::DuplicateCell(at));
            }
            if unit.is_ai() {
                match unit.owner {
                    Player::Attacker => attacker_ais.push(at),
                    Player::Defender => defender_ais.push(at),
                }
            }
        }

        for (player, ais) in [(Player::Attacker, &attacker_ais), (Player::Defender, &defender_ais)] {
            if ais.len() != 1 {
                return Err(SetupError::AiCount {
                    player: player.name(),
                    count: ais.len(),
                });
            }
        }

        Ok(Self {
            board,
            rules,
            attacker_ai_pos: attacker_ais.first().copied(),
            defender_ai_pos: defender_ais.first().copied(),
            active_player: Player::Attacker,
            turn: 1,
            max_turns,
            forfeited: None,
        })
    }

    /// Hand the move to `player` (custom positions)
    pub fn with_active_player(mut self, player: Player) -> Self {
        self.active_player = player;
        self
    }

    // ========================================================================
    // ACCESSORS
    // ========================================================================

    pub fn active_player(&self) -> Player {
        self.active_player
    }

    /// Number of the next turn, starting at 1
    pub fn turn(&self) -> u32 {
        self.turn
    }

    pub fn turns_played(&self) -> u32 {
        self.turn - 1
    }

    pub fn max_turns(&self) -> u32 {
        self.max_turns
    }

    pub fn rules(&self) -> &RuleSet {
        &self.rules
    }

    pub fn get_unit(&self, at: Coord) -> Option<&Unit> {
        self.board.get(&at)
    }

    pub fn is_empty(&self, at: Coord) -> bool {
        !self.board.contains_key(&at)
    }

    /// Units in row-major order
    pub fn units(&self) -> impl Iterator<Item = (Coord, Unit)> + '_ {
        Coord::all().filter_map(move |at| self.board.get(&at).map(|&unit| (at, unit)))
    }

    /// Units owned by `player`, in row-major order
    pub fn units_of(&self, player: Player) -> impl Iterator<Item = (Coord, Unit)> + '_ {
        self.units().filter(move |(_, unit)| unit.owner == player)
    }

    pub fn unit_count(&self) -> usize {
        self.board.len()
    }

    pub fn ai_pos(&self, player: Player) -> Option<Coord> {
        match player {
            Player::Attacker => self.attacker_ai_pos,
            Player::Defender => self.defender_ai_pos,
        }
    }

    /// Whether the unit at `at` has an opposing unit within combat reach
    pub fn is_engaged(&self, at: Coord) -> bool {
        let Some(unit) = self.board.get(&at) else {
            return false;
        };
        at.neighbors(self.rules.adjacency).any(|n| {
            self.board
                .get(&n)
                .map_or(false, |other| other.owner != unit.owner)
        })
    }

    // ========================================================================
    // TERMINATION
    // ========================================================================

    /// Winner, if the game is over.
    ///
    /// AI destruction takes precedence over the turn limit; if both AIs are
    /// gone the Defender wins. The turn limit always favors the Defender.
    pub fn winner(&self) -> Option<Player> {
        if let Some(loser) = self.forfeited {
            return Some(loser.opponent());
        }
        match (self.attacker_ai_pos, self.defender_ai_pos) {
            (None, _) => Some(Player::Defender),
            (Some(_), None) => Some(Player::Attacker),
            _ if self.turn > self.max_turns => Some(Player::Defender),
            _ => None,
        }
    }

    pub fn result(&self) -> GameResult {
        self.winner().map_or(GameResult::Ongoing, GameResult::from)
    }

    pub fn is_over(&self) -> bool {
        self.winner().is_some()
    }

    /// Record a loss by forfeit (illegal AI action or timeout)
    pub fn forfeit(&mut self, player: Player) {
        if self.forfeited.is_none() {
            self.forfeited = Some(player);
        }
    }

    // ========================================================================
    // ACTION GENERATION
    // ========================================================================

    /// All legal actions for the active player, in a fixed order
    pub fn legal_actions(&self) -> Vec<Action> {
        if self.is_over() {
            return vec![];
        }
        let mut actions = Vec::with_capacity(32);
        self.for_each_action(self.active_player, |a| actions.push(a));
        actions
    }

    /// Number of actions `player` would have if it were their turn
    pub fn mobility(&self, player: Player) -> usize {
        let mut count = 0;
        self.for_each_action(player, |_| count += 1);
        count
    }

    fn for_each_action(&self, player: Player, mut emit: impl FnMut(Action)) {
        let adjacency = self.rules.adjacency;

        for (from, unit) in self.units_of(player) {
            let pinned = !unit.unit_type.moves_while_engaged() && self.is_engaged(from);

            if !pinned {
                for dir in Direction::ORTHOGONAL {
                    let to = from.step(dir);
                    if to.is_valid() && self.is_empty(to) && unit.can_move(dir) {
                        emit(Action::Move { from, to });
                    }
                }
            }

            for target in from.neighbors(adjacency) {
                let Some(other) = self.board.get(&target) else {
                    continue;
                };
                if other.owner != unit.owner {
                    emit(Action::Attack { from, target });
                } else if repair_amount(&self.rules.repair_table, &unit, other, self.rules.max_health) > 0 {
                    emit(Action::Repair { from, target });
                }
            }

            emit(Action::SelfDestruct { at: from });
        }
    }

    // ========================================================================
    // VALIDATION
    // ========================================================================

    /// Interpret boundary notation against this position.
    ///
    /// Identical cells mean self-destruct; an empty target means move; a
    /// friendly target means repair; anything else is an attack.
    pub fn action_from_pair(&self, pair: CoordPair) -> Result<Action, Rejection> {
        let CoordPair { src, dst } = pair;
        for c in [src, dst] {
            if !c.is_valid() {
                return Err(Rejection::InvalidCoordinate(c));
            }
        }
        if src == dst {
            return Ok(Action::SelfDestruct { at: src });
        }
        let source = self.board.get(&src).ok_or(Rejection::EmptySource(src))?;
        Ok(match self.board.get(&dst) {
            None => Action::Move { from: src, to: dst },
            Some(target) if target.owner == source.owner => Action::Repair { from: src, target: dst },
            Some(_) => Action::Attack { from: src, target: dst },
        })
    }

    /// Check an action against the rules without applying it
    pub fn validate(&self, action: Action) -> Result<(), Rejection> {
        if self.is_over() {
            return Err(Rejection::GameOver);
        }

        let from = action.source();
        let to = action.target();
        for c in [from, to] {
            if !c.is_valid() {
                return Err(Rejection::InvalidCoordinate(c));
            }
        }

        let unit = self.board.get(&from).ok_or(Rejection::EmptySource(from))?;
        if unit.owner != self.active_player {
            return Err(Rejection::WrongOwner(from));
        }

        match action {
            Action::SelfDestruct { .. } => Ok(()),

            Action::Move { .. } => {
                let dir = from
                    .direction_to(to)
                    .filter(|d| d.is_orthogonal())
                    .ok_or(Rejection::NotAdjacent { from, to })?;
                if !self.is_empty(to) {
                    return Err(Rejection::DestinationOccupied(to));
                }
                if !unit.can_move(dir) {
                    return Err(Rejection::IllegalDirection { from, to });
                }
                if !unit.unit_type.moves_while_engaged() && self.is_engaged(from) {
                    return Err(Rejection::EngagedCannotMove(from));
                }
                Ok(())
            }

            Action::Attack { .. } => {
                if !from.is_adjacent(to, self.rules.adjacency) {
                    return Err(Rejection::NotAdjacent { from, to });
                }
                let target = self.board.get(&to).ok_or(Rejection::EmptyTarget(to))?;
                if target.owner == unit.owner {
                    return Err(Rejection::FriendlyTarget(to));
                }
                Ok(())
            }

            Action::Repair { .. } => {
                if !from.is_adjacent(to, self.rules.adjacency) {
                    return Err(Rejection::NotAdjacent { from, to });
                }
                let target = self.board.get(&to).ok_or(Rejection::EmptyTarget(to))?;
                if target.owner != unit.owner {
                    return Err(Rejection::TargetNotOwned(to));
                }
                if self.rules.repair_table.get(unit.unit_type, target.unit_type) == 0 {
                    return Err(Rejection::RepairNotPermitted { from, target: to });
                }
                if target.health >= self.rules.max_health {
                    return Err(Rejection::RepairTargetFull(to));
                }
                Ok(())
            }
        }
    }

    // ========================================================================
    // APPLY ACTION
    // ========================================================================

    /// Validate and apply an action, returning the successor state
    pub fn apply(&self, action: Action) -> Result<Applied, Rejection> {
        self.validate(action)?;
        Ok(self.apply_unchecked(action))
    }

    /// Apply an action already known to be legal (search hot path)
    pub(crate) fn apply_unchecked(&self, action: Action) -> Applied {
        let mut state = self.clone();
        let mut destroyed = Vec::new();

        match action {
            Action::Move { from, to } => state.apply_move(from, to),
            Action::Attack { from, target } => state.apply_attack(from, target, &mut destroyed),
            Action::Repair { from, target } => state.apply_repair(from, target),
            Action::SelfDestruct { at } => state.apply_self_destruct(at, &mut destroyed),
        }

        state.end_turn();
        Applied { state, destroyed }
    }

    fn apply_move(&mut self, from: Coord, to: Coord) {
        if let Some(unit) = self.board.remove(&from) {
            if unit.is_ai() {
                self.set_ai_pos(unit.owner, Some(to));
            }
            self.board.insert(to, unit);
        }
    }

    fn apply_attack(&mut self, from: Coord, target: Coord, destroyed: &mut Vec<DestroyedUnit>) {
        let (Some(&attacker), Some(&defender)) = (self.board.get(&from), self.board.get(&target)) else {
            return;
        };
        let (to_target, to_attacker) = resolve_attack(&self.rules.damage_table, &attacker, &defender);
        self.damage(target, to_target, destroyed);
        self.damage(from, to_attacker, destroyed);
    }

    fn apply_repair(&mut self, from: Coord, target: Coord) {
        let Some(&repairer) = self.board.get(&from) else {
            return;
        };
        let max_health = self.rules.max_health;
        let table = &self.rules.repair_table;
        if let Some(unit) = self.board.get_mut(&target) {
            unit.health += repair_amount(table, &repairer, unit, max_health);
        }
    }

    fn apply_self_destruct(&mut self, at: Coord, destroyed: &mut Vec<DestroyedUnit>) {
        if let Some(health) = self.board.get(&at).map(|u| u.health) {
            self.damage(at, health, destroyed);
        }
        for cell in at.neighbors(Adjacency::Surrounding) {
            self.damage(cell, SELF_DESTRUCT_DAMAGE, destroyed);
        }
    }

    /// Subtract health and remove the unit if it drops to zero
    fn damage(&mut self, at: Coord, amount: u8, destroyed: &mut Vec<DestroyedUnit>) {
        let Some(unit) = self.board.get_mut(&at) else {
            return;
        };
        unit.health = unit.health.saturating_sub(amount);
        if unit.is_alive() {
            return;
        }
        let unit = *unit;
        self.board.remove(&at);
        if unit.is_ai() {
            self.set_ai_pos(unit.owner, None);
        }
        destroyed.push(DestroyedUnit { at, unit });
    }

    fn set_ai_pos(&mut self, player: Player, pos: Option<Coord>) {
        match player {
            Player::Attacker => self.attacker_ai_pos = pos,
            Player::Defender => self.defender_ai_pos = pos,
        }
    }

    fn end_turn(&mut self) {
        self.active_player = self.active_player.opponent();
        self.turn += 1;
    }
}

impl fmt::Display for GameState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Next player: {}", self.active_player)?;
        writeln!(f, "Turns played: {}", self.turns_played())?;
        writeln!(f)?;
        write!(f, "   ")?;
        for col in 0..BOARD_DIM {
            write!(f, " {}  ", (b'A' + col as u8) as char)?;
        }
        writeln!(f)?;
        for row in 0..BOARD_DIM {
            write!(f, "{}: ", row + 1)?;
            for col in 0..BOARD_DIM {
                match self.board.get(&Coord::new(col, row)) {
                    Some(unit) => write!(f, "{:^3} ", unit.to_string())?,
                    None => write!(f, " .  ")?,
                }
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

// ============================================================================
// TESTS
// ============================================================================
