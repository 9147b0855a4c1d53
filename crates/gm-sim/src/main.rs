//! Headless battle runner
//!
//! Loads a roster, generates a battlefield and plays the battle to the end,
//! printing the battle log to stdout.

mod roster;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use async_trait::async_trait;
use clap::Parser;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use gm_core::{
    BattleConfig, BattleLog, BattleSession, Effect, GameRng, Presenter, Scenario, TerrainGrid,
    Weather, run_battle,
};

use crate::roster::{Roster, deploy, initiative};

/// Grid battle simulator
#[derive(Parser, Debug)]
#[command(name = "gm-sim")]
#[command(author, version, about = "Run a grid battle from a roster file", long_about = None)]
struct Args {
    /// Roster file (JSON, `{"teams": [[...], [...]]}`)
    #[arg(short = 'r', long = "roster")]
    roster: PathBuf,

    /// Battle config file (JSON); defaults apply when omitted
    #[arg(short = 'c', long = "config")]
    config: Option<PathBuf>,

    /// RNG seed; random when omitted
    #[arg(short = 's', long = "seed")]
    seed: Option<u64>,

    /// Terrain mix (plains, volcanic, tundra, wetlands, highlands, mixed)
    #[arg(long = "scenario", default_value = "plains")]
    scenario: Scenario,

    /// Weather (clear, rain, sandstorm, hail, fog, harsh_sun)
    #[arg(short = 'w', long = "weather", default_value = "clear")]
    weather: Weather,

    #[arg(long = "width", default_value_t = 12)]
    width: usize,

    #[arg(long = "height", default_value_t = 8)]
    height: usize,

    /// Round cap before the battle is called a draw
    #[arg(long = "rounds", default_value_t = 50)]
    rounds: u32,

    /// Print the battlefield before the battle starts
    #[arg(long = "show-grid")]
    show_grid: bool,
}

/// Battle log straight to stdout
struct ConsoleLog;

impl BattleLog for ConsoleLog {
    fn log_event(&self, message: &str) {
        println!("{message}");
    }
}

/// No animations here; effects only show up in the trace output
struct TracePresenter;

#[async_trait]
impl Presenter for TracePresenter {
    async fn play_effect(&self, effect: Effect) {
        debug!(?effect, "effect");
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let config = match &args.config {
        Some(path) => BattleConfig::from_path(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => BattleConfig::default(),
    };
    let roster = Roster::load(&args.roster)?;

    let mut rng = match args.seed {
        Some(seed) => GameRng::new(seed),
        None => GameRng::from_entropy(),
    };
    let seed = rng.seed();
    let grid = TerrainGrid::generate(args.scenario, args.width, args.height, &mut rng);
    info!(seed, scenario = %args.scenario, weather = %args.weather, "battle setup");

    let mut session = BattleSession::new(grid, config, rng)
        .with_presenter(Arc::new(TracePresenter))
        .with_log(Arc::new(ConsoleLog))
        .with_weather(args.weather);

    let ids = deploy(&mut session, &roster)?;
    let order = initiative(&session, &ids);

    if args.show_grid {
        for row in session.grid().to_rows() {
            println!("{row}");
        }
        println!();
    }

    let summary = run_battle(&mut session, &order, args.rounds).await;

    println!();
    match summary.winner {
        Some(team) => println!("Team {team} wins after {} rounds.", summary.rounds),
        None => println!("No winner after {} rounds.", summary.rounds),
    }
    for c in session.combatants() {
        println!(
            "  [{}] {:<12} team {} hp {:>3}/{:<3} luck {}",
            c.id, c.species, c.team, c.hp, c.max_hp, c.luck_tokens
        );
    }
    Ok(())
}
