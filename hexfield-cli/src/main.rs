//! HEXFIELD CLI - Command-line driver
//!
//! Commands:
//! - generate: write a fresh map file
//! - play: run an AI-vs-AI game on a map
//! - dump: inspect a map file

use anyhow::Context;
use clap::{Parser, Subcommand};
use hexfield_core::{ai, map, GameState, Side};
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "hexfield")]
#[command(about = "HEXFIELD turn-based hex territory game")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a map file
    Generate {
        #[arg(long, default_value = "10")]
        cols: usize,
        #[arg(long, default_value = "6")]
        rows: usize,
        #[arg(long, default_value = "2")]
        sides: usize,
        #[arg(long, default_value = "0")]
        seed: u64,
        #[arg(long)]
        output: PathBuf,
    },
    /// Run an AI-vs-AI game on a map
    Play {
        #[arg(long)]
        map: PathBuf,
        #[arg(long, default_value = "200")]
        max_turns: u32,
    },
    /// Inspect a map file
    Dump {
        #[arg(long)]
        map: PathBuf,
        #[arg(long)]
        json: bool,
    },
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Generate {
            cols,
            rows,
            sides,
            seed,
            output,
        } => {
            let grid = map::generate(cols, rows, sides, seed);
            let file = File::create(&output)
                .with_context(|| format!("creating {}", output.display()))?;
            map::save(BufWriter::new(file), &grid)?;
            println!("wrote {} cells to {}", grid.len(), output.display());
        }

        Commands::Play { map: path, max_turns } => {
            let grid = load_map(&path, true)?;
            let sides = sides_present(&grid);
            anyhow::ensure!(
                sides.len() >= 2,
                "map holds {} faction(s), need at least 2",
                sides.len()
            );
            let mut state = GameState::with_sides(grid, &sides);
            for &side in &sides {
                state.set_ai(side, true);
            }

            while state.winner().is_none() && state.turn <= max_turns {
                let mut script = ai::plan_turn(&mut state);
                script.run_all(&mut state);
                for message in state.drain_messages() {
                    tracing::info!(turn = state.turn, "{message}");
                }
                state.end_turn();
            }

            match state.winner() {
                Some(side) => println!("winner after {} turns: {side:?}", state.turn),
                None => println!("no winner within {max_turns} turns"),
            }
        }

        Commands::Dump { map: path, json } => {
            let grid = load_map(&path, false)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&grid.cells)?);
                return Ok(());
            }
            let islands = ai::analyze(&grid);
            let blobs: usize = islands.iter().map(|i| i.blobs.len()).sum();
            println!("{} cells, {} islands, {} blobs", grid.len(), islands.len(), blobs);
            for side in [Side::Neutral, Side::Red, Side::Green, Side::Blue, Side::Yellow] {
                let cells = grid.cells.iter().filter(|c| c.side == side).count();
                let units: u32 = grid
                    .cells
                    .iter()
                    .filter(|c| c.side == side)
                    .map(|c| c.units())
                    .sum();
                if cells > 0 {
                    println!("{side:?}: {cells} cells, {units} units");
                }
            }
        }
    }

    Ok(())
}

fn load_map(path: &PathBuf, prune: bool) -> anyhow::Result<hexfield_core::HexGrid> {
    let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    let grid = map::load(BufReader::new(file), prune)?;
    Ok(grid)
}

/// The factions actually holding cells on the map, in turn order.
fn sides_present(grid: &hexfield_core::HexGrid) -> Vec<Side> {
    hexfield_core::PLAYABLE_SIDES
        .iter()
        .copied()
        .filter(|&side| grid.cells.iter().any(|c| c.side == side))
        .collect()
}
