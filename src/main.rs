//! Pairstake CLI
//!
//! Runs a demo duel, a seeded fairness simulation, or prints the default
//! configuration.

use clap::{Parser, Subcommand};
use pairstake::{
    common::config::render_toml, commitment_for, wagers::FlipWinner, Address, ConfigLoader,
    Engine, ItemId, ManualClock, PairstakeConfig, RevealOutcome, Role, Secret, SettlementKind,
    SettlementReceipt,
};
use rand::{rngs::StdRng, Rng, SeedableRng};
use std::{path::PathBuf, sync::Arc};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Pairstake CLI
#[derive(Parser)]
#[command(name = "pairstake")]
#[command(about = "Wager-aware currency ledger with commit-reveal item duels")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Play one duel between two freshly minted items
    Demo {
        /// Stake placed by each side
        #[arg(short, long, default_value = "20")]
        stake: u64,
    },

    /// Play many duels with seeded secrets and report how often each side wins
    Simulate {
        /// Number of duels
        #[arg(short, long, default_value = "1000")]
        rounds: u64,

        /// RNG seed for secrets and reveal order
        #[arg(short, long, default_value = "42")]
        seed: u64,

        /// Stake placed by each side
        #[arg(long, default_value = "1")]
        stake: u64,
    },

    /// Print the effective configuration as TOML
    Config,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut loader = ConfigLoader::new();
    if let Some(path) = &cli.config {
        loader = loader.with_path(path);
    }
    let config = loader.load()?;

    let default_level = if cli.verbose {
        "debug"
    } else {
        config.logging.level.as_directive()
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();

    match cli.command {
        Commands::Demo { stake } => run_demo(&config, stake),
        Commands::Simulate {
            rounds,
            seed,
            stake,
        } => run_simulation(&config, rounds, seed, stake),
        Commands::Config => {
            println!("{}", render_toml(&config)?);
            Ok(())
        }
    }
}

/// Two owners, one item each, one full commit-reveal round
fn run_demo(config: &PairstakeConfig, stake: u64) -> Result<(), Box<dyn std::error::Error>> {
    let engine = Engine::new(config)?;
    let mut events = engine.subscribe();
    let minter = engine.role_holder(Role::Minter);
    let (alice, bob) = (Address::random(), Address::random());

    let a = engine.mint_item(minter, alice, "Bruno", rand::random())?;
    let b = engine.mint_item(minter, bob, "Kodiak", rand::random())?;
    engine.approve_currency(alice, engine.address(), stake)?;
    engine.approve_currency(bob, engine.address(), stake)?;
    engine.place_bet(alice, a, b, stake)?;
    engine.place_bet(bob, b, a, stake)?;

    let (secret_a, secret_b) = (Secret::random(), Secret::random());
    engine.commit(alice, a, b, commitment_for(a, b, &secret_a))?;
    engine.commit(bob, b, a, commitment_for(b, a, &secret_b))?;
    engine.reveal(alice, a, b, secret_a)?;
    let receipt = match engine.reveal(bob, b, a, secret_b)? {
        RevealOutcome::Settled(receipt) => receipt,
        RevealOutcome::Recorded => return Err("second reveal did not settle".into()),
    };

    while let Ok(event) = events.try_recv() {
        println!("{}", serde_json::to_string(&event)?);
    }
    println!("{}", serde_json::to_string_pretty(&receipt)?);
    for (name, owner) in [("alice", alice), ("bob", bob)] {
        println!("{}: {}", name, serde_json::to_string(&engine.account(owner))?);
    }
    engine.audit()?;
    Ok(())
}

#[derive(Debug, Default, serde::Serialize)]
struct SimulationReport {
    rounds: u64,
    seed: u64,
    first_item_wins: u64,
    last_revealer_wins: u64,
    first_item_win_rate: f64,
    last_revealer_win_rate: f64,
    total_supply: u64,
}

fn run_simulation(
    config: &PairstakeConfig,
    rounds: u64,
    seed: u64,
    stake: u64,
) -> Result<(), Box<dyn std::error::Error>> {
    let clock = Arc::new(ManualClock::new(0));
    let engine = Engine::with_clock(config, Address::random(), clock.clone())?;
    let mut rng = StdRng::seed_from_u64(seed);
    let minter = engine.role_holder(Role::Minter);
    let owners = [Address::from_low_u64(1), Address::from_low_u64(2)];
    let items: Vec<ItemId> = owners
        .iter()
        .map(|owner| engine.mint_item(minter, *owner, "sim", rng.gen()))
        .collect::<Result<_, _>>()?;
    for owner in owners {
        engine.approve_currency(owner, engine.address(), u64::MAX)?;
    }

    let mut report = SimulationReport {
        rounds,
        seed,
        ..Default::default()
    };
    let feeding_cost = config.economy.feeding_cost;
    for round in 0..rounds {
        clock.advance(config.wagers.rebet_cooldown_secs.max(1));
        for (owner, item) in owners.iter().zip(&items) {
            let meals = engine.meals_needed(*item)?;
            let topped_up = stake + meals * feeding_cost;
            if engine.balance_of(*owner) < topped_up {
                engine.mint_currency(minter, *owner, topped_up)?;
            }
            if meals > 0 {
                engine.feed(*owner, *item, meals * feeding_cost)?;
            }
        }

        let receipt = play_round(&engine, &owners, &items, stake, &mut rng)?;
        if receipt.winner_item == items[0] {
            report.first_item_wins += 1;
        }
        if let SettlementKind::Flip { winner_side, .. } = receipt.kind {
            if winner_side == FlipWinner::LastRevealer {
                report.last_revealer_wins += 1;
            }
        }
        if round % 1000 == 999 {
            info!(round = round + 1, "simulation progress");
        }
    }

    engine.audit()?;
    if rounds > 0 {
        report.first_item_win_rate = report.first_item_wins as f64 / rounds as f64;
        report.last_revealer_win_rate = report.last_revealer_wins as f64 / rounds as f64;
    }
    report.total_supply = engine.total_supply();
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

fn play_round(
    engine: &Engine,
    owners: &[Address; 2],
    items: &[ItemId],
    stake: u64,
    rng: &mut StdRng,
) -> Result<SettlementReceipt, Box<dyn std::error::Error>> {
    let secrets = [Secret::new(rng.gen()), Secret::new(rng.gen())];
    for side in 0..2 {
        let (me, them) = (items[side], items[1 - side]);
        engine.place_bet(owners[side], me, them, stake)?;
    }
    for side in 0..2 {
        let (me, them) = (items[side], items[1 - side]);
        engine.commit(owners[side], me, them, commitment_for(me, them, &secrets[side]))?;
    }

    let first = usize::from(rng.gen::<bool>());
    let order = [first, 1 - first];
    let mut settled = None;
    for side in order {
        let (me, them) = (items[side], items[1 - side]);
        if let RevealOutcome::Settled(receipt) = engine.reveal(owners[side], me, them, secrets[side])? {
            settled = Some(receipt);
        }
    }
    settled.ok_or_else(|| "round ended without settlement".into())
}

