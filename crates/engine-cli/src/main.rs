//! Command-line driver for the engine core.
//!
//! Runs perft, divide and timed searches against a FEN position, mostly for
//! validating move generation and measuring search speed.

use anyhow::Context;
use chess_core::FenParser;
use chess_engine::search::mate_distance;
use chess_engine::{perft, perft_divide, Engine, EngineConfig, Position, SearchLimits};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::time::{Duration, Instant};

/// Chess engine driver - perft, divide and search.
#[derive(Parser)]
#[command(name = "chess-engine-cli")]
#[command(about = "Runs perft, divide and search on a chess position")]
struct Cli {
    /// Engine config file (TOML)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Count leaf nodes at a fixed depth
    Perft {
        #[command(flatten)]
        position: PositionArgs,

        /// Depth in plies
        #[arg(short, long)]
        depth: u32,
    },
    /// Leaf counts per root move
    Divide {
        #[command(flatten)]
        position: PositionArgs,

        /// Depth in plies
        #[arg(short, long)]
        depth: u32,
    },
    /// Search for the best move
    Search {
        #[command(flatten)]
        position: PositionArgs,

        /// Maximum iteration depth
        #[arg(short, long)]
        depth: Option<u32>,

        /// Time budget in milliseconds
        #[arg(long)]
        movetime: Option<u64>,
    },
}

#[derive(Args)]
struct PositionArgs {
    /// Position in FEN notation
    #[arg(long, default_value = FenParser::STARTPOS)]
    fen: String,

    /// Moves to play from the position, in coordinate notation
    #[arg(long, num_args = 1.., value_delimiter = ' ')]
    moves: Vec<String>,
}

impl PositionArgs {
    fn build(&self) -> anyhow::Result<Position> {
        let mut position =
            Position::from_fen(&self.fen).with_context(|| format!("invalid FEN '{}'", self.fen))?;
        for text in &self.moves {
            let mv = position.parse_move(text)?;
            position.make_move(mv);
        }
        Ok(position)
    }
}

fn load_config(path: Option<&PathBuf>) -> anyhow::Result<EngineConfig> {
    match path {
        Some(path) => EngineConfig::load(path)
            .with_context(|| format!("loading config from {}", path.display())),
        None => Ok(EngineConfig::default()),
    }
}

fn run_perft(mut position: Position, depth: u32) {
    let start = Instant::now();
    let nodes = perft(&mut position, depth);
    let elapsed = start.elapsed();
    let nps = nodes as f64 / elapsed.as_secs_f64().max(1e-9);
    println!("nodes {nodes}");
    println!("time {:.3}s ({:.0} nps)", elapsed.as_secs_f64(), nps);
}

fn run_divide(mut position: Position, depth: u32) {
    let divided = perft_divide(&mut position, depth);
    for (mv, nodes) in &divided {
        println!("{mv}: {nodes}");
    }
    println!();
    println!("moves {}", divided.len());
    println!("nodes {}", divided.iter().map(|(_, n)| n).sum::<u64>());
}

fn run_search(position: Position, config: EngineConfig, limits: SearchLimits) -> anyhow::Result<()> {
    let mut engine = Engine::new(config);
    engine.set_position(position);
    engine.start_search(limits, |report| {
        tracing::info!(depth = report.depth, nodes = report.nodes, "search thread done");
    });
    let report = engine.wait().context("search thread produced no report")?;

    let score = match mate_distance(report.score) {
        Some(plies) => format!("mate {}", (plies + plies.signum()) / 2),
        None => format!("cp {}", report.score),
    };
    println!(
        "depth {} score {} nodes {} time {}ms",
        report.depth,
        score,
        report.nodes,
        report.elapsed.as_millis()
    );
    match report.best_move {
        Some(mv) => println!("bestmove {mv}"),
        None => println!("bestmove 0000"),
    }
    Ok(())
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();
    let cli = Cli::parse();
    let config = load_config(cli.config.as_ref())?;
    tracing::debug!(?config, "engine config");

    match cli.command {
        Command::Perft { position, depth } => run_perft(position.build()?, depth),
        Command::Divide { position, depth } => run_divide(position.build()?, depth),
        Command::Search {
            position,
            depth,
            movetime,
        } => {
            let limits = SearchLimits {
                max_depth: depth,
                time_budget: movetime.map(Duration::from_millis),
            };
            let limits = if limits == SearchLimits::infinite() {
                SearchLimits::movetime(Duration::from_secs(1))
            } else {
                limits
            };
            run_search(position.build()?, config, limits)?;
        }
    }
    Ok(())
}
