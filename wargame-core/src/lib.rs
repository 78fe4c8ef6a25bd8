//! WARGAME Core - Rules engine and AI
//!
//! This crate provides the core game logic for WARGAME:
//! - Board geometry (5x5 grid, `E2 D2` notation)
//! - Unit types and movement tables
//! - Combat and repair resolution
//! - Game state, action validation and application
//! - Position evaluation heuristics (e0, e1, e2)
//! - Minimax / alpha-beta search with iterative deepening

pub mod board;
pub mod units;
pub mod combat;
pub mod error;
pub mod game;
pub mod eval;
pub mod ai;
pub mod ruleset;

// Re-exports for convenient access
pub use board::{Adjacency, Coord, CoordPair, Direction, BOARD_DIM};
pub use units::{Player, Unit, UnitType, DEFAULT_MAX_HEALTH};
pub use combat::{DamageTable, RepairTable, SELF_DESTRUCT_DAMAGE};
pub use error::{Forfeit, ParseError, Rejection, SearchError, SetupError};
pub use game::{Action, Applied, DestroyedUnit, GameResult, GameState};
pub use eval::{evaluate, Heuristic, WIN_SCORE};
pub use ai::{choose_action, play_turn, random_action, Algorithm, ComputerPlayer, SearchConfig, SearchOutcome, SearchStats};
pub use ruleset::{Placement, RuleSet};
