//! Match command - computer vs computer series between two heuristics
//!
//! ## Architecture (4-layer granularity)
//!
//! - Level 1: run() - orchestration
//! - Level 2: play_match(), report_results()
//! - Level 3: play_single_game(), compute_match_statistics()
//! - Level 4: formatting utilities

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Args;
use indicatif::{ProgressBar, ProgressStyle};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use wargame_core::{
    random_action, Action, Algorithm, ComputerPlayer, GameResult, GameState, Heuristic, Player,
    RuleSet, SearchConfig,
};

use crate::play::load_rules;

// ============================================================================
// COMMAND ARGUMENTS (Level 4 - Configuration)
// ============================================================================

#[derive(Args)]
pub struct MatchArgs {
    /// Heuristic used by the attacking computer
    #[arg(long, default_value = "e2")]
    pub attacker_heuristic: Heuristic,

    /// Heuristic used by the defending computer
    #[arg(long, default_value = "e0")]
    pub defender_heuristic: Heuristic,

    /// Number of games to play
    #[arg(long, default_value = "10")]
    pub games: usize,

    /// Maximum search depth
    #[arg(long, default_value = "3")]
    pub max_depth: u32,

    /// Seconds each computer may spend per action
    #[arg(long, default_value = "1.0")]
    pub max_time: f64,

    /// Search algorithm (alphabeta or minimax)
    #[arg(long, default_value = "alphabeta")]
    pub algorithm: Algorithm,

    /// Maximum turns per game
    #[arg(long, default_value = "100")]
    pub max_turns: u32,

    /// Random actions played before the computers take over
    #[arg(long, default_value = "2")]
    pub opening_moves: usize,

    /// Ruleset JSON file (standard rules when omitted)
    #[arg(long, value_name = "FILE")]
    pub rules: Option<PathBuf>,

    /// Output results as JSON
    #[arg(long)]
    pub json: bool,
}

impl MatchArgs {
    fn search_config(&self, heuristic: Heuristic) -> Result<SearchConfig> {
        let time_limit = Duration::try_from_secs_f64(self.max_time)
            .with_context(|| format!("Invalid --max-time: {}", self.max_time))?;
        Ok(SearchConfig::new(self.max_depth, time_limit)
            .with_algorithm(self.algorithm)
            .with_heuristic(heuristic))
    }
}

/// Result of a single game
#[derive(Clone, Debug)]
struct GameRecord {
    game_number: usize,
    result: GameResult,
    turns: u32,
    forfeit: bool,
    actions: Vec<Action>,
}

/// Aggregated match results
#[derive(Clone, Debug)]
struct MatchResults {
    games: Vec<GameRecord>,
    attacker_wins: usize,
    defender_wins: usize,
    forfeits: usize,
    avg_turns: f32,
}

// ============================================================================
// LEVEL 1 - ORCHESTRATION
// ============================================================================

/// Run match command
///
/// 1. Load the rules
/// 2. Play the match (multiple games)
/// 3. Report results
pub fn run(args: MatchArgs, seed: Option<u64>) -> Result<()> {
    let rules = load_rules(args.rules.as_deref())?;

    tracing::info!(
        "Starting match: {} (attacker) vs {} (defender), {} games, depth={}, rules={}",
        args.attacker_heuristic,
        args.defender_heuristic,
        args.games,
        args.max_depth,
        rules.name
    );

    let results = play_match(&rules, &args, seed)?;

    report_results(&results, &args);

    Ok(())
}

// ============================================================================
// LEVEL 2 - PHASES
// ============================================================================

/// Play all games in the match
fn play_match(rules: &RuleSet, args: &MatchArgs, seed: Option<u64>) -> Result<MatchResults> {
    let mut rng = create_rng(seed);
    let mut games = Vec::with_capacity(args.games);

    let progress = if args.json {
        ProgressBar::hidden()
    } else {
        ProgressBar::new(args.games as u64)
    };
    progress.set_style(
        ProgressStyle::with_template("[{elapsed_precise}] {bar:40} {pos}/{len} {msg}")?
            .progress_chars("##-"),
    );

    for game_num in 0..args.games {
        let record = play_single_game(rules, game_num + 1, args, &mut rng)?;

        tracing::debug!(
            "Game {}: {:?} ({} turns)",
            record.game_number,
            record.result,
            record.turns
        );
        progress.set_message(format!("game {}: {:?}", record.game_number, record.result));
        progress.inc(1);

        games.push(record);
    }
    progress.finish_and_clear();

    Ok(compute_match_statistics(games))
}

/// Report match results
fn report_results(results: &MatchResults, args: &MatchArgs) {
    if args.json {
        print_json_results(results, args);
    } else {
        print_text_results(results, args);
    }
}

// ============================================================================
// LEVEL 3 - STEPS
// ============================================================================

/// Play one game: a few random opening actions, then search on both sides
fn play_single_game(
    rules: &RuleSet,
    game_number: usize,
    args: &MatchArgs,
    rng: &mut ChaCha8Rng,
) -> Result<GameRecord> {
    let mut state = rules.to_game_state(args.max_turns)?;
    let mut actions = Vec::new();

    for _ in 0..args.opening_moves {
        let Some(action) = random_action(&state, rng) else {
            break;
        };
        state = state.apply(action)?.state;
        actions.push(action);
    }

    let mut attacker = ComputerPlayer::new(args.search_config(args.attacker_heuristic)?);
    let mut defender = ComputerPlayer::new(args.search_config(args.defender_heuristic)?);
    let mut forfeit = false;

    while !state.is_over() {
        let player = state.active_player();
        let ai = match player {
            Player::Attacker => &mut attacker,
            Player::Defender => &mut defender,
        };

        match ai.play_turn(&state) {
            Ok((outcome, applied)) => {
                state = applied.state;
                actions.push(outcome.action);
            }
            Err(reason) => {
                tracing::warn!("Game {}: {} forfeits: {}", game_number, player, reason);
                state.forfeit(player);
                forfeit = true;
            }
        }
    }

    Ok(record_game(game_number, &state, forfeit, actions))
}

fn record_game(game_number: usize, state: &GameState, forfeit: bool, actions: Vec<Action>) -> GameRecord {
    GameRecord {
        game_number,
        result: state.result(),
        turns: state.turns_played(),
        forfeit,
        actions,
    }
}

/// Compute aggregate statistics from game records
fn compute_match_statistics(games: Vec<GameRecord>) -> MatchResults {
    let attacker_wins = games
        .iter()
        .filter(|g| g.result == GameResult::AttackerWins)
        .count();
    let defender_wins = games
        .iter()
        .filter(|g| g.result == GameResult::DefenderWins)
        .count();
    let forfeits = games.iter().filter(|g| g.forfeit).count();

    let total_turns: u32 = games.iter().map(|g| g.turns).sum();
    let avg_turns = if games.is_empty() {
        0.0
    } else {
        total_turns as f32 / games.len() as f32
    };

    MatchResults {
        games,
        attacker_wins,
        defender_wins,
        forfeits,
        avg_turns,
    }
}

// ============================================================================
// LEVEL 4 - UTILITIES
// ============================================================================

/// Create RNG from seed or random
fn create_rng(seed: Option<u64>) -> ChaCha8Rng {
    match seed {
        Some(s) => ChaCha8Rng::seed_from_u64(s),
        None => ChaCha8Rng::from_entropy(),
    }
}

fn percent(count: usize, total: usize) -> f32 {
    if total > 0 {
        count as f32 / total as f32 * 100.0
    } else {
        0.0
    }
}

#[derive(serde::Serialize)]
struct JsonGame {
    game_number: usize,
    result: String,
    turns: u32,
    forfeit: bool,
    actions: Vec<String>,
}

#[derive(serde::Serialize)]
struct JsonOutput {
    attacker_heuristic: String,
    defender_heuristic: String,
    total_games: usize,
    attacker_wins: usize,
    defender_wins: usize,
    forfeits: usize,
    avg_turns: f32,
    attacker_win_rate: f32,
    games: Vec<JsonGame>,
}

/// Game records in JSON form, actions in move notation for replay
fn json_output(results: &MatchResults, args: &MatchArgs) -> JsonOutput {
    let total = results.games.len();
    JsonOutput {
        attacker_heuristic: args.attacker_heuristic.to_string(),
        defender_heuristic: args.defender_heuristic.to_string(),
        total_games: total,
        attacker_wins: results.attacker_wins,
        defender_wins: results.defender_wins,
        forfeits: results.forfeits,
        avg_turns: results.avg_turns,
        attacker_win_rate: percent(results.attacker_wins, total) / 100.0,
        games: results
            .games
            .iter()
            .map(|g| JsonGame {
                game_number: g.game_number,
                result: format!("{:?}", g.result),
                turns: g.turns,
                forfeit: g.forfeit,
                actions: g.actions.iter().map(|a| a.to_string()).collect(),
            })
            .collect(),
    }
}

/// Print results as JSON
fn print_json_results(results: &MatchResults, args: &MatchArgs) {
    if let Ok(json) = serde_json::to_string_pretty(&json_output(results, args)) {
        println!("{}", json);
    }
}

/// Print results as text
fn print_text_results(results: &MatchResults, args: &MatchArgs) {
    let total = results.games.len();

    println!("\n=== Match Results ===");
    println!(
        "Attacker ({}) vs Defender ({})",
        args.attacker_heuristic, args.defender_heuristic
    );
    println!("Total games:    {}", total);
    println!(
        "Attacker wins:  {} ({:.1}%)",
        results.attacker_wins,
        percent(results.attacker_wins, total)
    );
    println!(
        "Defender wins:  {} ({:.1}%)",
        results.defender_wins,
        percent(results.defender_wins, total)
    );
    println!("Forfeits:       {}", results.forfeits);
    println!("Avg turns:      {:.1}", results.avg_turns);

    println!("\nGame details:");
    for game in &results.games {
        let note = if game.forfeit { " (forfeit)" } else { "" };
        println!(
            "  Game {}: {:?} in {} turns{}",
            game.game_number, game.result, game.turns, note
        );
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use wargame_core::CoordPair;

    fn record(game_number: usize, result: GameResult, turns: u32) -> GameRecord {
        GameRecord {
            game_number,
            result,
            turns,
            forfeit: false,
            actions: vec![],
        }
    }

    fn args(games: usize) -> MatchArgs {
        MatchArgs {
            attacker_heuristic: Heuristic::E2,
            defender_heuristic: Heuristic::E0,
            games,
            max_depth: 2,
            max_time: 30.0,
            algorithm: Algorithm::AlphaBeta,
            max_turns: 12,
            opening_moves: 2,
            rules: None,
            json: true,
        }
    }

    #[test]
    fn test_compute_match_statistics_empty() {
        let results = compute_match_statistics(vec![]);
        assert_eq!(results.attacker_wins, 0);
        assert_eq!(results.defender_wins, 0);
        assert_eq!(results.forfeits, 0);
        assert_eq!(results.avg_turns, 0.0);
    }

    #[test]
    fn test_compute_match_statistics() {
        let games = vec![
            record(1, GameResult::AttackerWins, 10),
            record(2, GameResult::DefenderWins, 20),
            record(3, GameResult::AttackerWins, 30),
        ];

        let results = compute_match_statistics(games);
        assert_eq!(results.attacker_wins, 2);
        assert_eq!(results.defender_wins, 1);
        assert_eq!(results.avg_turns, 20.0);
    }

    #[test]
    fn test_create_rng_deterministic() {
        let mut rng1 = create_rng(Some(42));
        let mut rng2 = create_rng(Some(42));

        use rand::Rng;
        assert_eq!(rng1.gen::<u64>(), rng2.gen::<u64>());
    }

    #[test]
    fn test_single_game_finishes() {
        let args = args(1);
        let mut rng = create_rng(Some(3));
        let record = play_single_game(&RuleSet::default(), 1, &args, &mut rng).unwrap();
        assert_ne!(record.result, GameResult::Ongoing);
        assert!(record.turns <= 12);
        assert_eq!(record.actions.len() as u32, record.turns);
    }

    #[test]
    fn test_json_output_lists_actions_in_notation() {
        let args = args(1);
        let mut rng = create_rng(Some(5));
        let record = play_single_game(&RuleSet::default(), 1, &args, &mut rng).unwrap();
        let expected: Vec<String> = record.actions.iter().map(|a| a.to_string()).collect();
        let results = compute_match_statistics(vec![record]);

        let output = json_output(&results, &args);
        assert_eq!(output.games.len(), 1);
        assert_eq!(output.games[0].actions, expected);
        assert_eq!(output.games[0].actions.len() as u32, output.games[0].turns);

        let json: serde_json::Value = serde_json::to_value(&output).unwrap();
        let replay = json["games"][0]["actions"].as_array().unwrap();
        let first = replay[0].as_str().unwrap();
        assert!(first.parse::<CoordPair>().is_ok(), "{} is not move notation", first);
    }

    #[test]
    fn test_zero_budget_side_forfeits() {
        let mut args = args(1);
        args.max_time = 0.0;
        args.opening_moves = 0;
        let mut rng = create_rng(Some(1));
        let record = play_single_game(&RuleSet::default(), 1, &args, &mut rng).unwrap();
        assert!(record.forfeit);
        assert_eq!(record.result, GameResult::DefenderWins);
        assert!(record.actions.is_empty());
    }

    #[test]
    fn test_seeded_match_is_reproducible() {
        let args = args(2);
        let first = play_match(&RuleSet::default(), &args, Some(11)).unwrap();
        let second = play_match(&RuleSet::default(), &args, Some(11)).unwrap();
        let results = |r: &MatchResults| r.games.iter().map(|g| (g.result, g.turns)).collect::<Vec<_>>();
        assert_eq!(results(&first), results(&second));
    }
}
