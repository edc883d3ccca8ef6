//! A toy SIR disease and a one-off vaccination campaign.

use std::cell::Cell;
use std::rc::Rc;

use cohort_agent::People;
use cohort_core::Uid;
use cohort_dist::{Distribution, StreamPath};
use cohort_sim::{Module, ModuleKind, SimError, SimResult, StepContext};

// ── Per-agent state ───────────────────────────────────────────────────────────

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Sir {
    #[default]
    Susceptible,
    Infected,
    Recovered,
}

/// Years of infection left; meaningful only while infected.
#[derive(Clone, Copy, Debug, Default)]
pub struct InfRemaining(pub f64);

/// Relative susceptibility (1 = fully susceptible).
#[derive(Clone, Copy, Debug)]
pub struct RelSus(pub f64);

impl Default for RelSus {
    fn default() -> Self {
        RelSus(1.0)
    }
}

fn column_err(module: &str, what: &str) -> SimError {
    SimError::module(module, format!("state column `{what}` is not registered"))
}

// ── Disease ───────────────────────────────────────────────────────────────────

#[derive(Clone, Copy, Debug)]
pub struct SirPars {
    /// Transmission rate per year.
    pub beta:         f64,
    pub init_prev:    f64,
    /// Mean and standard deviation of the infection duration, in years.
    pub dur_inf_mean: f64,
    pub dur_inf_std:  f64,
    /// Probability that an infection ends in death.
    pub p_death:      f64,
}

impl Default for SirPars {
    fn default() -> Self {
        Self {
            beta:         8.0,
            init_prev:    0.01,
            dur_inf_mean: 0.5,
            dur_inf_std:  0.2,
            p_death:      0.02,
        }
    }
}

pub struct SirDisease {
    pars:       SirPars,
    init_prev:  Distribution,
    dur_inf:    Distribution,
    p_acquire:  Distribution,
    p_death:    Distribution,
    infections: Rc<Cell<usize>>,
}

impl SirDisease {
    pub fn new(pars: SirPars) -> SimResult<Self> {
        Ok(Self {
            init_prev: Distribution::bernoulli(pars.init_prev)?.with_label("init_prev"),
            dur_inf: Distribution::lognormal_explicit(pars.dur_inf_mean, pars.dur_inf_std)?
                .with_label("dur_inf"),
            p_acquire: Distribution::uniform(0.0, 1.0)?.with_label("p_acquire"),
            p_death: Distribution::bernoulli(pars.p_death)?.with_label("p_death"),
            pars,
            infections: Rc::new(Cell::new(0)),
        })
    }

    /// Running count of infections, readable after the module is handed to
    /// the simulation.
    pub fn infections(&self) -> Rc<Cell<usize>> {
        Rc::clone(&self.infections)
    }

    fn infect(&mut self, people: &mut People, uids: &[Uid]) -> SimResult<()> {
        if uids.is_empty() {
            return Ok(());
        }
        let durations: Vec<InfRemaining> = self.dur_inf.draw_for(uids)?.into_iter().map(InfRemaining).collect();
        people
            .state_mut::<Sir>()
            .ok_or_else(|| column_err("sir", "Sir"))?
            .fill(uids, Sir::Infected)?;
        people
            .state_mut::<InfRemaining>()
            .ok_or_else(|| column_err("sir", "InfRemaining"))?
            .set_many(uids, &durations)?;
        self.infections.set(self.infections.get() + uids.len());
        Ok(())
    }
}

impl Module for SirDisease {
    fn kind(&self) -> ModuleKind {
        ModuleKind::Disease
    }

    fn name(&self) -> &str {
        "sir"
    }

    fn distributions(&mut self) -> Vec<(StreamPath, &mut Distribution)> {
        vec![
            (StreamPath::of(["pars", "init_prev"]), &mut self.init_prev),
            (StreamPath::of(["pars", "dur_inf"]), &mut self.dur_inf),
            (StreamPath::of(["p_acquire"]), &mut self.p_acquire),
            (StreamPath::of(["pars", "p_death"]), &mut self.p_death),
        ]
    }

    fn init(&mut self, people: &mut People) -> SimResult<()> {
        let seeds = self.init_prev.filter_alive(people.allocator())?;
        self.infect(people, &seeds)
    }

    fn step(&mut self, ctx: &mut StepContext<'_>) -> SimResult<()> {
        let people = &mut *ctx.people;
        let alive = people.alive();
        let states = people.state::<Sir>().ok_or_else(|| column_err("sir", "Sir"))?;
        let statuses = states.get_many(&alive)?;

        // Recoveries.
        let infected: Vec<Uid> = alive
            .iter()
            .zip(&statuses)
            .filter(|(_, s)| **s == Sir::Infected)
            .map(|(&u, _)| u)
            .collect();
        let remaining = people
            .state_mut::<InfRemaining>()
            .ok_or_else(|| column_err("sir", "InfRemaining"))?;
        let mut recovering = Vec::new();
        for &uid in &infected {
            let r = remaining.get_mut(uid)?;
            r.0 -= ctx.dt;
            if r.0 <= 0.0 {
                recovering.push(uid);
            }
        }
        let dying = self.p_death.filter(&recovering)?;
        people.request_death(&dying);
        people
            .state_mut::<Sir>()
            .ok_or_else(|| column_err("sir", "Sir"))?
            .fill(&recovering, Sir::Recovered)?;

        // Transmission.
        let n_alive = alive.len();
        let n_infected = infected.len() - recovering.len();
        if n_alive == 0 || n_infected == 0 {
            return Ok(());
        }
        let foi = self.pars.beta * n_infected as f64 / n_alive as f64 * ctx.dt;
        let susceptible: Vec<Uid> = alive
            .iter()
            .zip(&statuses)
            .filter(|(_, s)| **s == Sir::Susceptible)
            .map(|(&u, _)| u)
            .collect();
        let rel_sus = people
            .state::<RelSus>()
            .ok_or_else(|| column_err("sir", "RelSus"))?
            .get_many(&susceptible)?;
        let draws = self.p_acquire.draw_for(&susceptible)?;
        let newly: Vec<Uid> = susceptible
            .iter()
            .zip(rel_sus.iter().zip(&draws))
            .filter(|(_, (rs, u))| **u < 1.0 - (-foi * rs.0).exp())
            .map(|(&uid, _)| uid)
            .collect();
        self.infect(people, &newly)
    }
}

// ── Vaccination ───────────────────────────────────────────────────────────────

/// Vaccinates a share of susceptible agents once, at `start_year`.
pub struct Vaccination {
    start_year: f64,
    efficacy:   f64,
    p_take:     Distribution,
    done:       bool,
}

impl Vaccination {
    pub fn new(start_year: f64, coverage: f64, efficacy: f64) -> SimResult<Self> {
        if !(0.0..=1.0).contains(&efficacy) {
            return Err(SimError::module("vx", format!("efficacy {efficacy} outside [0, 1]")));
        }
        Ok(Self {
            start_year,
            efficacy,
            p_take: Distribution::bernoulli(coverage)?.with_label("p_take"),
            done: false,
        })
    }
}

impl Module for Vaccination {
    fn kind(&self) -> ModuleKind {
        ModuleKind::Intervention
    }

    fn name(&self) -> &str {
        "vx"
    }

    fn distributions(&mut self) -> Vec<(StreamPath, &mut Distribution)> {
        vec![(StreamPath::of(["p_take"]), &mut self.p_take)]
    }

    fn step(&mut self, ctx: &mut StepContext<'_>) -> SimResult<()> {
        if self.done || ctx.year < self.start_year {
            return Ok(());
        }
        self.done = true;
        let states = ctx.people.state::<Sir>().ok_or_else(|| column_err("vx", "Sir"))?;
        let eligible = states.uids_where(|s| *s == Sir::Susceptible);
        let eligible: Vec<Uid> = eligible.into_iter().filter(|&u| ctx.people.is_alive(u)).collect();
        let vaccinated = self.p_take.filter(&eligible)?;
        ctx.people
            .state_mut::<RelSus>()
            .ok_or_else(|| column_err("vx", "RelSus"))?
            .fill(&vaccinated, RelSus(1.0 - self.efficacy))?;
        tracing::info!(year = ctx.year, vaccinated = vaccinated.len(), "vaccination campaign");
        Ok(())
    }
}

// ── Counting ──────────────────────────────────────────────────────────────────

/// `(susceptible, infected, recovered)` among the living.
pub fn sir_counts(people: &People) -> (usize, usize, usize) {
    let Some(states) = people.state::<Sir>() else {
        return (0, 0, 0);
    };
    let mut counts = (0, 0, 0);
    for (uid, state) in states.iter() {
        if !people.is_alive(uid) {
            continue;
        }
        match state {
            Sir::Susceptible => counts.0 += 1,
            Sir::Infected => counts.1 += 1,
            Sir::Recovered => counts.2 += 1,
        }
    }
    counts
}
