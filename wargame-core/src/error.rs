//! Error types for the rules engine and search

use crate::board::Coord;
use crate::game::Action;
use std::time::Duration;
use thiserror::Error;

/// Why an action was refused by the rules engine.
///
/// Rejections are ordinary values: `apply` never panics on bad input, and a
/// rejected action leaves the state untouched.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
pub enum Rejection {
    #[error("coordinate {0} is off the board")]
    InvalidCoordinate(Coord),
    #[error("no unit at {0}")]
    EmptySource(Coord),
    #[error("unit at {0} belongs to the other player")]
    WrongOwner(Coord),
    #[error("unit at {from} cannot move in the direction of {to}")]
    IllegalDirection { from: Coord, to: Coord },
    #[error("destination {0} is occupied")]
    DestinationOccupied(Coord),
    #[error("{to} is not adjacent to {from}")]
    NotAdjacent { from: Coord, to: Coord },
    #[error("unit at {0} is engaged in combat and cannot move")]
    EngagedCannotMove(Coord),
    #[error("unit at {0} is already at full health")]
    RepairTargetFull(Coord),
    #[error("unit at {from} cannot repair the unit at {target}")]
    RepairNotPermitted { from: Coord, target: Coord },
    #[error("unit at {0} is not owned by the acting player")]
    TargetNotOwned(Coord),
    #[error("no unit to target at {0}")]
    EmptyTarget(Coord),
    #[error("unit at {0} is friendly and cannot be attacked")]
    FriendlyTarget(Coord),
    #[error("the game is already over")]
    GameOver,
}

/// Failure to parse move notation such as `E2 D2`.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("expected {expected} characters, got {input:?}")]
    WrongLength { input: String, expected: usize },
    #[error("invalid column {0:?} (expected A-E)")]
    InvalidColumn(char),
    #[error("invalid row {0:?} (expected 1-5)")]
    InvalidRow(char),
    #[error("unknown heuristic {0:?} (expected e0, e1 or e2)")]
    UnknownHeuristic(String),
    #[error("unknown search algorithm {0:?} (expected minimax or alphabeta)")]
    UnknownAlgorithm(String),
}

/// Invalid initial layout or ruleset.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum SetupError {
    #[error("layout places a unit off the board at {0}")]
    OffBoard(Coord),
    #[error("layout places two units at {0}")]
    DuplicateCell(Coord),
    #[error("{player} must have exactly one AI unit, found {count}")]
    AiCount { player: &'static str, count: usize },
    #[error("unit at {coord} has health {health}, expected 1..={max}")]
    BadHealth { coord: Coord, health: u8, max: u8 },
    #[error("max health must be at least 1")]
    ZeroMaxHealth,
}

/// Search could not produce an action.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
pub enum SearchError {
    #[error("the game is already over")]
    GameOver,
    #[error("no legal actions available")]
    NoLegalActions,
}

/// Why a computer player lost its turn, and with it the game.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum Forfeit {
    #[error("search failed: {0}")]
    Search(#[from] SearchError),
    #[error("took {elapsed:?}, over the {limit:?} limit")]
    Timeout { elapsed: Duration, limit: Duration },
    #[error("proposed illegal action {action}: {rejection}")]
    IllegalAction { action: Action, rejection: Rejection },
}
