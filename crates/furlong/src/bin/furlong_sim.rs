//! # FURLONG Simulator
//!
//! Headless driver: runs a set of races, has simulated bettors wager on them
//! while they are open, and logs results and payouts.
//!
//! ```bash
//! # Fast mode: virtual time jumps between timer deadlines
//! ./furlong_sim --config crates/furlong/config/furlong.toml
//!
//! # Wall-clock mode with tick logging
//! RUST_LOG=furlong=debug ./furlong_sim --realtime --races 1
//! ```

use clap::Parser;
use furlong::{FurlongConfig, Paddock};
use furlong_core::{Scheduler, TimerDriver, MIN_PERIOD};
use furlong_race::{RaceError, RaceId, RaceOutcome};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;
use thiserror::Error;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// Wall-clock driver resolution.
const DRIVER_RESOLUTION: Duration = Duration::from_millis(10);

#[derive(Parser, Debug)]
#[command(name = "furlong_sim")]
#[command(about = "Run simulated races with pari-mutuel betting")]
struct Args {
    /// TOML configuration file
    #[arg(long, env = "FURLONG_CONFIG")]
    config: Option<PathBuf>,

    /// Number of races (overrides the config)
    #[arg(long)]
    races: Option<u64>,

    /// Runs per race (overrides the config)
    #[arg(long)]
    runs: Option<u32>,

    /// Seed for races and bettors (overrides the config)
    #[arg(long)]
    seed: Option<u64>,

    /// Drive timers from the wall clock
    #[arg(long)]
    realtime: bool,
}

#[derive(Error, Debug)]
enum SimError {
    #[error(transparent)]
    Config(#[from] furlong::ConfigError),

    #[error(transparent)]
    Race(#[from] RaceError),

    #[error("failed to start timer driver: {0}")]
    Driver(#[from] std::io::Error),
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("furlong=info")),
        )
        .with_target(true)
        .init();
}

fn load_config(args: &Args) -> Result<FurlongConfig, SimError> {
    let mut config = match &args.config {
        Some(path) => FurlongConfig::from_file(path)?,
        None => FurlongConfig::default(),
    };
    if let Some(races) = args.races {
        config.simulation.race_count = races;
    }
    if let Some(runs) = args.runs {
        config.simulation.runs = runs;
    }
    if let Some(seed) = args.seed {
        config.race.seed = Some(seed);
        config.simulation.seed = Some(seed);
    }
    config.simulation.realtime |= args.realtime;
    config.validate()?;
    Ok(config)
}

/// Every simulated bettor backs a random runner in every open race.
/// Returns the accepted and rejected wager counts.
fn place_bets(
    paddock: &Paddock,
    config: &FurlongConfig,
    race_ids: &[RaceId],
    rng: &mut ChaCha8Rng,
) -> (usize, usize) {
    let competitors = config.race.competitor_count;
    let (mut all_accepted, mut all_rejected) = (0, 0);
    for &race_id in race_ids {
        let (mut accepted, mut rejected) = (0usize, 0usize);
        for bettor in 0..config.simulation.bettor_count {
            let name = format!("bettor-{bettor}");
            let slot = rng.gen_range(0..competitors);
            let amount = rng.gen_range(1..=config.simulation.max_stake);
            match paddock.place_bet(race_id, &name, slot, amount) {
                Ok(_) => accepted += 1,
                Err(_) => rejected += 1,
            }
        }
        if let Some(pool) = paddock.pool(race_id) {
            info!(
                race_id,
                accepted,
                rejected,
                total = pool.total(),
                odds = ?pool.odds(),
                "book closed"
            );
        }
        all_accepted += accepted;
        all_rejected += rejected;
    }
    (all_accepted, all_rejected)
}

fn all_completed(paddock: &Paddock, race_ids: &[RaceId]) -> bool {
    race_ids.iter().all(|&id| {
        paddock
            .registry()
            .race(id)
            .map_or(true, |race| race.is_completed())
    })
}

/// Jumps virtual time from deadline to deadline until every race is done.
fn drive_virtual(scheduler: &Scheduler, paddock: &Paddock, race_ids: &[RaceId]) {
    while !all_completed(paddock, race_ids) {
        let Some(step) = scheduler.next_deadline() else {
            warn!("no timers pending before completion");
            return;
        };
        scheduler.advance(step.max(MIN_PERIOD));
    }
}

/// Lets a driver thread advance time until every race is done.
fn drive_realtime(scheduler: &Scheduler, paddock: &Paddock, race_ids: &[RaceId]) -> Result<(), SimError> {
    let mut driver = TimerDriver::spawn(scheduler.clone(), DRIVER_RESOLUTION)?;
    while !all_completed(paddock, race_ids) {
        std::thread::sleep(Duration::from_millis(100));
    }
    driver.stop();
    Ok(())
}

fn report(paddock: &Paddock, outcome: &RaceOutcome) {
    let names: Vec<&str> = outcome
        .standings
        .iter()
        .map(|c| c.name.as_str())
        .collect();
    info!(
        race_id = outcome.race_id,
        run = outcome.run,
        ticks = outcome.ticks,
        order = ?names,
        "result"
    );

    match paddock.settle(outcome.race_id) {
        Ok(Some(payouts)) if payouts.is_empty() => {
            info!(race_id = outcome.race_id, "no winning bets");
        }
        Ok(Some(payouts)) => {
            for payout in payouts {
                info!(
                    race_id = outcome.race_id,
                    bet_id = payout.bet_id,
                    bettor = %payout.bettor,
                    stake = payout.stake,
                    amount = payout.amount,
                    "payout"
                );
            }
        }
        Ok(None) => warn!(race_id = outcome.race_id, "race not settled"),
        Err(e) => error!(race_id = outcome.race_id, error = %e, "settlement failed"),
    }
}

fn run(args: &Args) -> Result<(), SimError> {
    let config = load_config(args)?;
    let scheduler = Scheduler::new();
    let paddock = Paddock::new(config.race.clone(), scheduler.clone());

    let race_ids: Vec<RaceId> = (1..=config.simulation.race_count).collect();
    let mut outcome_feeds = Vec::with_capacity(race_ids.len());
    for &race_id in &race_ids {
        let race = paddock.create_race(race_id, config.race.pre_race_secs)?;
        outcome_feeds.push(race.signals().finished.subscribe_channel(4));
    }

    let mut rng = match config.simulation.seed {
        Some(seed) => ChaCha8Rng::seed_from_u64(seed),
        None => ChaCha8Rng::from_entropy(),
    };

    info!(
        races = race_ids.len(),
        runs = config.simulation.runs,
        realtime = config.simulation.realtime,
        "simulation starting"
    );

    for run in 1..=config.simulation.runs {
        info!(run, "starting run");
        for &race_id in &race_ids {
            paddock.start_race(race_id)?;
        }
        let (accepted, rejected) = place_bets(&paddock, &config, &race_ids, &mut rng);
        info!(run, accepted, rejected, "wagers placed");

        if config.simulation.realtime {
            drive_realtime(&scheduler, &paddock, &race_ids)?;
        } else {
            drive_virtual(&scheduler, &paddock, &race_ids);
        }

        // Completed races stay in POST, so they can still be settled here.
        let mut reported = 0;
        for feed in &outcome_feeds {
            while let Some(outcome) = feed.try_recv() {
                report(&paddock, &outcome);
                reported += 1;
            }
        }
        info!(run, reported, "run complete");
    }

    paddock.shutdown();
    Ok(())
}

fn main() -> ExitCode {
    init_tracing();
    let args = Args::parse();

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "simulation failed");
            ExitCode::FAILURE
        }
    }
}
