//! Built-in demographic modules: births and background deaths.
//!
//! | Module              | Streams                               | Effect                      |
//! |---------------------|---------------------------------------|-----------------------------|
//! | [`Births`]          | `demographics.births.female`          | `floor(n_alive · cbr · dt / 1000)` newborns per step |
//! | [`BackgroundDeaths`]| `demographics.deaths.death_prob`      | Bernoulli death per alive agent per step |
//!
//! Both draw per UID, so an agent's fate in a given step does not depend on
//! how many other agents exist.

use cohort_agent::People;
use cohort_core::Uid;
use cohort_dist::{Distribution, Param, StreamPath};
use tracing::debug;

use crate::{Module, ModuleKind, SimError, SimResult, StepContext};

// ── Births ────────────────────────────────────────────────────────────────────

/// Crude birth rate (births per 1000 alive per year), constant or
/// interpolated by year.
#[derive(Clone, Debug, PartialEq)]
pub enum BirthRate {
    Constant(f64),
    /// `(year, rate)` points, strictly increasing in year.  Linearly
    /// interpolated; held flat outside the table.
    ByYear(Vec<(f64, f64)>),
}

impl BirthRate {
    pub fn at(&self, year: f64) -> f64 {
        match self {
            BirthRate::Constant(r) => *r,
            BirthRate::ByYear(points) => interpolate(points, year),
        }
    }

    fn validate(&self) -> Result<(), String> {
        let rates: Vec<f64> = match self {
            BirthRate::Constant(r) => vec![*r],
            BirthRate::ByYear(points) => {
                if points.is_empty() {
                    return Err("birth rate table is empty".into());
                }
                if points.windows(2).any(|w| !(w[0].0 < w[1].0)) {
                    return Err("birth rate years must be strictly increasing".into());
                }
                points.iter().map(|p| p.1).collect()
            }
        };
        match rates.iter().find(|r| !r.is_finite() || **r < 0.0) {
            Some(bad) => Err(format!("invalid birth rate {bad}")),
            None => Ok(()),
        }
    }
}

fn interpolate(points: &[(f64, f64)], x: f64) -> f64 {
    let Some(&(x0, y0)) = points.first() else {
        return 0.0;
    };
    if x <= x0 {
        return y0;
    }
    for w in points.windows(2) {
        let ((xa, ya), (xb, yb)) = (w[0], w[1]);
        if x <= xb {
            return ya + (yb - ya) * (x - xa) / (xb - xa);
        }
    }
    points.last().map_or(y0, |p| p.1)
}

/// Adds newborns each step in proportion to the alive population.
#[derive(Debug)]
pub struct Births {
    name:      String,
    rate:      BirthRate,
    /// Multiplier on the crude birth rate (scenario lever).
    rel_birth: f64,
    female:    Distribution,
    total:     usize,
}

impl Births {
    pub fn new(rate: BirthRate) -> SimResult<Self> {
        Ok(Self {
            name: "births".into(),
            rate,
            rel_birth: 1.0,
            female: Distribution::bernoulli(0.5)?.with_label("female"),
            total: 0,
        })
    }

    pub fn with_rel_birth(mut self, rel_birth: f64) -> Self {
        self.rel_birth = rel_birth;
        self
    }

    /// Newborns added so far.
    pub fn total(&self) -> usize {
        self.total
    }

    /// Births due this step for `n_alive` agents.
    pub fn births_for(&self, n_alive: usize, year: f64, dt: f64) -> usize {
        let per_agent = self.rate.at(year) * 1e-3 * self.rel_birth * dt;
        (n_alive as f64 * per_agent).floor() as usize
    }
}

impl Module for Births {
    fn kind(&self) -> ModuleKind {
        ModuleKind::Demographics
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn distributions(&mut self) -> Vec<(StreamPath, &mut Distribution)> {
        vec![(StreamPath::of(["female"]), &mut self.female)]
    }

    fn init(&mut self, _people: &mut People) -> SimResult<()> {
        self.rate.validate().map_err(|m| SimError::module(&self.name, m))?;
        if !self.rel_birth.is_finite() || self.rel_birth < 0.0 {
            return Err(SimError::module(&self.name, format!("invalid rel_birth {}", self.rel_birth)));
        }
        Ok(())
    }

    fn step(&mut self, ctx: &mut StepContext<'_>) -> SimResult<()> {
        let n_new = self.births_for(ctx.people.n_alive(), ctx.year, ctx.dt);
        if n_new == 0 {
            return Ok(());
        }
        let uids = ctx.people.grow(n_new)?;
        let female: Vec<bool> = self.female.draw_for(&uids)?.into_iter().map(|v| v != 0.0).collect();
        ctx.people.female.set_many(&uids, &female)?;
        self.total += uids.len();
        debug!(step = %ctx.step, births = uids.len(), "births");
        Ok(())
    }
}

// ── Background deaths ─────────────────────────────────────────────────────────

/// Per-agent annual death probabilities computed from the population.
pub type DeathProbFn = Box<dyn Fn(&People, &[Uid]) -> Vec<f64>>;

/// Annual probability of death, for everyone or per agent.
pub enum DeathRate {
    Constant(f64),
    /// Called with the population and the alive UIDs; must return one
    /// probability per UID.
    ByAgent(DeathProbFn),
}

impl std::fmt::Debug for DeathRate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeathRate::Constant(p) => write!(f, "Constant({p})"),
            DeathRate::ByAgent(_) => f.write_str("ByAgent"),
        }
    }
}

/// Removes agents with a per-step Bernoulli trial.
///
/// The per-step probability is `rate · rel_death · dt`, clamped to `[0, 1]`.
#[derive(Debug)]
pub struct BackgroundDeaths {
    name:       String,
    rate:       DeathRate,
    rel_death:  f64,
    death_prob: Distribution,
    total:      usize,
}

impl BackgroundDeaths {
    pub fn new(rate: DeathRate) -> SimResult<Self> {
        Ok(Self {
            name: "deaths".into(),
            rate,
            rel_death: 1.0,
            death_prob: Distribution::bernoulli(0.0)?.with_label("death_prob"),
            total: 0,
        })
    }

    /// Age- or sex-dependent rates: `f(people, alive_uids)` returns one annual
    /// probability per UID.
    pub fn by_agent(f: impl Fn(&People, &[Uid]) -> Vec<f64> + 'static) -> SimResult<Self> {
        Self::new(DeathRate::ByAgent(Box::new(f)))
    }

    pub fn with_rel_death(mut self, rel_death: f64) -> Self {
        self.rel_death = rel_death;
        self
    }

    /// Deaths caused so far.
    pub fn total(&self) -> usize {
        self.total
    }

    fn per_step(&self, annual: f64, dt: f64) -> f64 {
        (annual * self.rel_death * dt).clamp(0.0, 1.0)
    }
}

impl Module for BackgroundDeaths {
    fn kind(&self) -> ModuleKind {
        ModuleKind::Demographics
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn distributions(&mut self) -> Vec<(StreamPath, &mut Distribution)> {
        vec![(StreamPath::of(["death_prob"]), &mut self.death_prob)]
    }

    fn init(&mut self, _people: &mut People) -> SimResult<()> {
        if let DeathRate::Constant(p) = self.rate {
            if !(0.0..=1.0).contains(&p) {
                return Err(SimError::module(&self.name, format!("death probability {p} outside [0, 1]")));
            }
        }
        if !self.rel_death.is_finite() || self.rel_death < 0.0 {
            return Err(SimError::module(&self.name, format!("invalid rel_death {}", self.rel_death)));
        }
        Ok(())
    }

    fn step(&mut self, ctx: &mut StepContext<'_>) -> SimResult<()> {
        let alive = ctx.people.alive();
        if alive.is_empty() {
            return Ok(());
        }
        let p = match &self.rate {
            DeathRate::Constant(annual) => Param::Scalar(self.per_step(*annual, ctx.dt)),
            DeathRate::ByAgent(f) => {
                let annual = f(&*ctx.people, &alive);
                if annual.len() != alive.len() {
                    return Err(SimError::module(
                        &self.name,
                        format!("death rate returned {} values for {} agents", annual.len(), alive.len()),
                    ));
                }
                Param::Array(annual.into_iter().map(|a| self.per_step(a, ctx.dt)).collect())
            }
        };
        self.death_prob.set("p", p)?;
        let dying = self.death_prob.filter(&alive)?;
        self.total += dying.len();
        ctx.people.request_death(&dying);
        Ok(())
    }
}
