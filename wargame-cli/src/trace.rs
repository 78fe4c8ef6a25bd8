//! Game trace file: settings, every action, AI statistics and the winner

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use anyhow::{Context, Result};
use chrono::Local;

use wargame_core::{Action, Algorithm, GameState, Player, SearchConfig, SearchStats};

/// Settings recorded at the top of a trace
pub struct TraceHeader {
    pub config: SearchConfig,
    pub max_turns: u32,
    pub attacker: &'static str,
    pub defender: &'static str,
}

pub struct TraceWriter<W: Write> {
    out: W,
}

impl TraceWriter<BufWriter<File>> {
    pub fn create(path: &Path) -> Result<Self> {
        let file = File::create(path)
            .with_context(|| format!("Failed to create trace file: {}", path.display()))?;
        Ok(Self::new(BufWriter::new(file)))
    }
}

impl<W: Write> TraceWriter<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn header(&mut self, header: &TraceHeader, initial: &GameState) -> Result<()> {
        let config = &header.config;
        let alpha_beta = if config.algorithm == Algorithm::AlphaBeta { "on" } else { "off" };

        writeln!(self.out, "Game trace, started {}", Local::now().format("%Y-%m-%d %H:%M:%S"))?;
        writeln!(self.out)?;
        writeln!(self.out, "Timeout: {:.1} s", config.time_limit.as_secs_f64())?;
        writeln!(self.out, "Max turns: {}", header.max_turns)?;
        writeln!(self.out, "Max depth: {}", config.max_depth)?;
        writeln!(self.out, "Alpha-beta: {}", alpha_beta)?;
        writeln!(self.out, "Heuristic: {}", config.heuristic)?;
        writeln!(self.out, "Attacker: {}", header.attacker)?;
        writeln!(self.out, "Defender: {}", header.defender)?;
        writeln!(self.out)?;
        writeln!(self.out, "{}", initial)?;
        self.out.flush()?;
        Ok(())
    }

    /// One accepted action. `stats` is present for computer turns and
    /// `totals` holds the running totals over every computer turn so far.
    pub fn turn(
        &mut self,
        turn_number: u32,
        player: Player,
        action: &Action,
        stats: Option<&SearchStats>,
        totals: &SearchStats,
        after: &GameState,
    ) -> Result<()> {
        writeln!(self.out, "Turn #{}: {}: {}", turn_number, player, action.describe())?;

        if let Some(stats) = stats {
            writeln!(self.out, "Time for this action: {:.2} s", stats.elapsed.as_secs_f64())?;
            writeln!(self.out, "Heuristic score: {}", stats.score)?;
            writeln!(self.out, "Depth reached: {}", stats.depth_reached)?;
            self.write_totals(totals)?;
        }

        writeln!(self.out)?;
        writeln!(self.out, "{}", after)?;
        self.out.flush()?;
        Ok(())
    }

    pub fn forfeit(&mut self, player: Player, reason: &str) -> Result<()> {
        writeln!(self.out, "{} forfeits: {}", player, reason)?;
        self.out.flush()?;
        Ok(())
    }

    pub fn finish(&mut self, winner: Player, turns: u32) -> Result<()> {
        writeln!(self.out, "{} wins in {} turns", winner, turns)?;
        self.out.flush()?;
        Ok(())
    }

    fn write_totals(&mut self, totals: &SearchStats) -> Result<()> {
        let evaluations = totals.evaluations();
        writeln!(self.out, "Cumulative evals: {}", evaluations)?;

        let by_depth: Vec<String> = totals
            .evaluations_per_depth
            .iter()
            .map(|(depth, count)| format!("{}={}", depth, count))
            .collect();
        writeln!(self.out, "Cumulative evals by depth: {}", by_depth.join(" "))?;

        let share: Vec<String> = totals
            .evaluations_per_depth
            .iter()
            .map(|(depth, &count)| {
                let pct = if evaluations > 0 {
                    count as f64 * 100.0 / evaluations as f64
                } else {
                    0.0
                };
                format!("{}={:.1}%", depth, pct)
            })
            .collect();
        writeln!(self.out, "Cumulative % evals by depth: {}", share.join(" "))?;

        writeln!(self.out, "Average branching factor: {:.1}", totals.branching_factor())?;
        Ok(())
    }
}
