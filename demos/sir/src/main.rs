//! sir — a small SIR epidemic run with and without a vaccination campaign.
//!
//! Both scenarios share a seed.  Because every stream is keyed by its path
//! in the model tree, adding the vaccination module leaves the disease's
//! own draws untouched; the difference in infections is the campaign's
//! effect rather than sampling noise.

mod model;

use std::collections::HashMap;
use std::time::Instant;

use anyhow::Result;
use tracing_subscriber::EnvFilter;

use cohort_agent::People;
use cohort_core::SimConfig;
use cohort_sim::{
    BackgroundDeaths, BirthRate, Births, DeathRate, SimBuilder, SimObserver, SimResult, StepSummary,
    replicate_seeds, run_replicates,
};

use model::{InfRemaining, RelSus, Sir, SirDisease, SirPars, Vaccination, sir_counts};

// ── Constants ─────────────────────────────────────────────────────────────────

const AGENT_COUNT: usize = 5_000;
const SEED:        u64   = 42;
const START_YEAR:  f64   = 2000.0;
const YEARS:       f64   = 10.0;
const DT:          f64   = 0.25;    // quarterly steps
const BIRTH_RATE:  f64   = 20.0;    // per 1000 per year
const DEATH_RATE:  f64   = 0.01;    // annual
const VX_YEAR:     f64   = 2002.0;
const VX_COVERAGE: f64   = 0.6;
const VX_EFFICACY: f64   = 0.9;
const REPLICATES:  usize = 8;

// ── Observer ──────────────────────────────────────────────────────────────────

/// Records `(year, S, I, R)` after every step.
#[derive(Default)]
struct Prevalence {
    rows: Vec<(f64, usize, usize, usize)>,
}

impl SimObserver for Prevalence {
    fn on_step_end(&mut self, summary: &StepSummary, people: &People) {
        let (s, i, r) = sir_counts(people);
        self.rows.push((summary.year, s, i, r));
    }
}

// ── Scenario ──────────────────────────────────────────────────────────────────

struct Outcome {
    infections: usize,
    alive:      usize,
    prevalence: Vec<(f64, usize, usize, usize)>,
    /// `(path, stream seed)` for every registered stream.
    streams:    Vec<(String, u64)>,
}

fn config(seed: u64) -> SimConfig {
    SimConfig {
        seed,
        n_agents: AGENT_COUNT,
        n_steps: (YEARS / DT).round() as u64,
        start: START_YEAR,
        dt: DT,
        compact_interval: 8,
    }
}

fn run_scenario(seed: u64, vaccinate: bool) -> SimResult<Outcome> {
    let disease = SirDisease::new(SirPars::default())?;
    let infections = disease.infections();

    let mut builder = SimBuilder::new(config(seed))
        .state::<Sir>()
        .state::<InfRemaining>()
        .state::<RelSus>()
        .module(Births::new(BirthRate::Constant(BIRTH_RATE))?)
        .module(BackgroundDeaths::new(DeathRate::Constant(DEATH_RATE))?)
        .module(disease);
    if vaccinate {
        builder = builder.module(Vaccination::new(VX_YEAR, VX_COVERAGE, VX_EFFICACY)?);
    }
    let mut sim = builder.build()?;

    let mut obs = Prevalence::default();
    sim.run(&mut obs)?;

    Ok(Outcome {
        infections: infections.get(),
        alive:      sim.people.n_alive(),
        prevalence: obs.rows,
        streams:    sim.streams().map(|e| (e.identity.to_string(), e.seed)).collect(),
    })
}

// ── main ──────────────────────────────────────────────────────────────────────

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    println!("=== sir — cohort agent simulation ===");
    println!("Agents: {AGENT_COUNT}  |  Years: {YEARS}  |  dt: {DT}  |  Seed: {SEED}");
    println!();

    // 1. Paired scenarios on one seed.
    let t0 = Instant::now();
    let baseline = run_scenario(SEED, false)?;
    let vaccinated = run_scenario(SEED, true)?;
    println!("Both scenarios complete in {:.3} s", t0.elapsed().as_secs_f64());
    println!();

    println!("{:<8} {:>8} {:>8} {:>8}   {:>8} {:>8} {:>8}", "Year", "S", "I", "R", "S(vx)", "I(vx)", "R(vx)");
    println!("{}", "-".repeat(64));
    for (b, v) in baseline.prevalence.iter().zip(&vaccinated.prevalence).step_by(4) {
        println!(
            "{:<8.2} {:>8} {:>8} {:>8}   {:>8} {:>8} {:>8}",
            b.0, b.1, b.2, b.3, v.1, v.2, v.3
        );
    }
    println!();

    println!("Cumulative infections");
    println!("  baseline    : {}", baseline.infections);
    println!("  vaccination : {}", vaccinated.infections);
    println!(
        "  averted     : {}",
        baseline.infections as i64 - vaccinated.infections as i64
    );
    println!("Alive at end  : {} vs {}", baseline.alive, vaccinated.alive);
    println!();

    // 2. Stream coherence: every path present in both runs has the same seed.
    let base_seeds: HashMap<&str, u64> =
        baseline.streams.iter().map(|(path, seed)| (path.as_str(), *seed)).collect();
    let mut shared = 0;
    let mut mismatched = 0;
    for (path, seed) in &vaccinated.streams {
        match base_seeds.get(path.as_str()) {
            Some(s) if s == seed => shared += 1,
            Some(_) => mismatched += 1,
            None => println!("  new stream   : {path}"),
        }
    }
    println!("Streams shared by both scenarios: {shared} ({mismatched} with differing seeds)");
    println!();

    // 3. Replicates: each seed runs both arms.
    let seeds = replicate_seeds(SEED, REPLICATES);
    let results = run_replicates(&seeds, |seed| {
        let b = run_scenario(seed, false)?;
        let v = run_scenario(seed, true)?;
        Ok((b.infections, v.infections))
    });

    println!("{:<8} {:>10} {:>10} {:>10}", "Seed", "Baseline", "Vx", "Averted");
    println!("{}", "-".repeat(42));
    let mut averted = Vec::with_capacity(seeds.len());
    for (seed, result) in seeds.iter().zip(results) {
        let (b, v) = result?;
        let diff = b as i64 - v as i64;
        averted.push(diff as f64);
        println!("{seed:<8} {b:>10} {v:>10} {diff:>10}");
    }
    let mean = averted.iter().sum::<f64>() / averted.len().max(1) as f64;
    println!();
    println!("Mean infections averted over {} replicates: {mean:.1}", averted.len());

    Ok(())
}
