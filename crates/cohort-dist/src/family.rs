//! Distribution families and per-variate sampling.
//!
//! | Family               | Parameters        | Sampler                              |
//! |----------------------|-------------------|--------------------------------------|
//! | `Uniform`            | `low`, `high`     | affine map of one uniform            |
//! | `Normal`             | `loc`, `scale`    | `rand_distr::Normal`                 |
//! | `LogNormalImplicit`  | `mean`, `sigma`   | `rand_distr::LogNormal` as given     |
//! | `LogNormalExplicit`  | `mean`, `std`     | converted by [`lognormal_underlying`]|
//! | `Weibull`            | `shape`, `scale`  | `rand_distr::Weibull`                |
//! | `Exponential`        | `scale`           | `rand_distr::Exp` with rate `1/scale`|
//! | `Poisson`            | `lam`             | `rand_distr::Poisson`                |
//! | `RandInt`            | `low`, `high`     | integer in `[low, high)`             |
//! | `Bernoulli`          | `p`               | `1.0` if `u < p`, else `0.0`         |
//! | `Choice`             | (table)           | `rand::distributions::WeightedIndex` |
//! | `Delta`              | `value`           | constant                             |
//! | `External`           | (none)            | [`ExternalSampler::sample_n`]        |
//!
//! Every call to [`Family::sample`] gets its own freshly keyed `StreamRng`, so
//! a sampler may consume as much entropy as it likes without affecting any
//! other variate.

use std::fmt;
use std::sync::Arc;

use cohort_core::StreamRng;
use rand::distributions::WeightedIndex;
use rand::{Rng, RngCore};
use rand_distr::{Distribution as _, Exp, LogNormal, Normal, Poisson, Weibull};

/// Plug-in sampler for families this crate does not provide.
pub trait ExternalSampler: Send + Sync {
    /// Draw `n` values from `rng`.
    fn sample_n(&self, n: usize, rng: &mut dyn RngCore) -> Vec<f64>;

    /// Short name used in logs and errors.
    fn name(&self) -> &str {
        "external"
    }
}

// ── Choice table ──────────────────────────────────────────────────────────────

/// Fixed values with selection weights, validated once at construction.
#[derive(Clone, Debug)]
pub struct ChoiceTable {
    values:  Vec<f64>,
    weights: Vec<f64>,
    index:   WeightedIndex<f64>,
}

impl ChoiceTable {
    /// Fails if the lengths differ, the table is empty, or the weights are
    /// negative, non-finite, or all zero.
    pub fn new(values: Vec<f64>, weights: Vec<f64>) -> Result<Self, String> {
        if values.len() != weights.len() {
            return Err(format!(
                "{} values but {} weights",
                values.len(),
                weights.len()
            ));
        }
        if weights.iter().any(|w| !w.is_finite()) {
            return Err("weights must be finite".into());
        }
        let index = WeightedIndex::new(&weights).map_err(|e| e.to_string())?;
        Ok(Self { values, weights, index })
    }

    /// Equal weights over `values`.
    pub fn uniform(values: Vec<f64>) -> Result<Self, String> {
        let weights = vec![1.0; values.len()];
        Self::new(values, weights)
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn weights(&self) -> &[f64] {
        &self.weights
    }
}

// ── Family ────────────────────────────────────────────────────────────────────

/// Integer parameters must be exactly representable as `f64`.
const MAX_EXACT_INT: f64 = 9_007_199_254_740_992.0;

#[derive(Clone)]
pub enum Family {
    Uniform,
    Normal,
    LogNormalImplicit,
    LogNormalExplicit,
    Weibull,
    Exponential,
    Poisson,
    /// Integers drawn uniformly from `[low, high)`, returned as `f64`.
    RandInt,
    Bernoulli,
    Choice(ChoiceTable),
    Delta,
    External(Arc<dyn ExternalSampler>),
}

impl fmt::Debug for Family {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Family::Choice(table) => f.debug_tuple("Choice").field(table).finish(),
            Family::External(s) => f.debug_tuple("External").field(&s.name()).finish(),
            other => f.write_str(other.name()),
        }
    }
}

impl Family {
    pub fn name(&self) -> &'static str {
        match self {
            Family::Uniform => "uniform",
            Family::Normal => "normal",
            Family::LogNormalImplicit => "lognorm_im",
            Family::LogNormalExplicit => "lognorm_ex",
            Family::Weibull => "weibull",
            Family::Exponential => "expon",
            Family::Poisson => "poisson",
            Family::RandInt => "randint",
            Family::Bernoulli => "bernoulli",
            Family::Choice(_) => "choice",
            Family::Delta => "delta",
            Family::External(_) => "external",
        }
    }

    /// Parameter names, in the order [`sample`](Self::sample) expects them.
    pub fn param_names(&self) -> &'static [&'static str] {
        match self {
            Family::Uniform => &["low", "high"],
            Family::Normal => &["loc", "scale"],
            Family::LogNormalImplicit => &["mean", "sigma"],
            Family::LogNormalExplicit => &["mean", "std"],
            Family::Weibull => &["shape", "scale"],
            Family::Exponential => &["scale"],
            Family::Poisson => &["lam"],
            Family::RandInt => &["low", "high"],
            Family::Bernoulli => &["p"],
            Family::Delta => &["value"],
            Family::Choice(_) | Family::External(_) => &[],
        }
    }

    /// Default parameter values, aligned with [`param_names`](Self::param_names).
    pub fn defaults(&self) -> &'static [f64] {
        match self {
            Family::Uniform => &[0.0, 1.0],
            Family::Normal => &[0.0, 1.0],
            Family::LogNormalImplicit => &[0.0, 1.0],
            Family::LogNormalExplicit => &[1.0, 1.0],
            Family::Weibull => &[1.0, 1.0],
            Family::Exponential => &[1.0],
            Family::Poisson => &[1.0],
            Family::RandInt => &[0.0, 2.0],
            Family::Bernoulli => &[0.5],
            Family::Delta => &[0.0],
            Family::Choice(_) | Family::External(_) => &[],
        }
    }

    pub fn is_bernoulli(&self) -> bool {
        matches!(self, Family::Bernoulli)
    }

    /// Domain check for one parameter taken on its own.
    ///
    /// Constraints between parameters (`low <= high`, `low < high` for
    /// integers) are checked per variate
    /// in [`sample`](Self::sample).
    pub fn check_value(&self, param: &str, v: f64) -> Result<(), String> {
        if v.is_nan() {
            return Err("value is NaN".into());
        }
        let ok = match (self, param) {
            (Family::Normal, "scale") | (Family::LogNormalImplicit, "sigma") => v >= 0.0 && v.is_finite(),
            (Family::LogNormalExplicit, "mean") => v > 0.0 && v.is_finite(),
            (Family::LogNormalExplicit, "std") => v >= 0.0 && v.is_finite(),
            (Family::Weibull, _) | (Family::Exponential, "scale") => v > 0.0 && v.is_finite(),
            (Family::Poisson, "lam") => v >= 0.0 && v.is_finite(),
            (Family::RandInt, _) => v.is_finite() && v.fract() == 0.0 && v.abs() <= MAX_EXACT_INT,
            (Family::Bernoulli, "p") => (0.0..=1.0).contains(&v),
            _ => v.is_finite(),
        };
        if ok {
            Ok(())
        } else {
            Err(format!("{v} is outside the domain of {} `{param}`", self.name()))
        }
    }

    /// Draw one variate with the resolved parameter values `p`.
    ///
    /// On failure, returns the offending parameter name and a reason.
    pub fn sample(&self, p: &[f64], rng: &mut StreamRng) -> Result<f64, (&'static str, String)> {
        for (&name, &v) in self.param_names().iter().zip(p) {
            self.check_value(name, v).map_err(|reason| (name, reason))?;
        }
        let value = match self {
            Family::Uniform => {
                let (low, high) = (p[0], p[1]);
                if low > high {
                    return Err(("high", format!("high ({high}) is below low ({low})")));
                }
                low + (high - low) * rng.uniform()
            }
            Family::Normal => Normal::new(p[0], p[1])
                .map_err(|e| ("scale", e.to_string()))?
                .sample(rng),
            Family::LogNormalImplicit => LogNormal::new(p[0], p[1])
                .map_err(|e| ("sigma", e.to_string()))?
                .sample(rng),
            Family::LogNormalExplicit => {
                let (mu, sigma) = lognormal_underlying(p[0], p[1]);
                LogNormal::new(mu, sigma)
                    .map_err(|e| ("std", e.to_string()))?
                    .sample(rng)
            }
            Family::Weibull => Weibull::new(p[1], p[0])
                .map_err(|e| ("shape", e.to_string()))?
                .sample(rng),
            Family::Exponential => Exp::new(1.0 / p[0])
                .map_err(|e| ("scale", e.to_string()))?
                .sample(rng),
            Family::Poisson => {
                if p[0] == 0.0 {
                    0.0
                } else {
                    Poisson::new(p[0]).map_err(|e| ("lam", e.to_string()))?.sample(rng)
                }
            }
            Family::RandInt => {
                let (low, high) = (p[0] as i64, p[1] as i64);
                if low >= high {
                    return Err(("high", format!("high ({high}) must exceed low ({low})")));
                }
                rng.gen_range(low..high) as f64
            }
            Family::Bernoulli => {
                if rng.uniform() < p[0] {
                    1.0
                } else {
                    0.0
                }
            }
            Family::Choice(table) => table.values[table.index.sample(rng)],
            Family::Delta => p[0],
            Family::External(sampler) => sampler
                .sample_n(1, rng)
                .first()
                .copied()
                .ok_or_else(|| ("sampler", format!("`{}` returned no values", sampler.name())))?,
        };
        Ok(value)
    }
}

/// Parameters `(mu, sigma)` of the underlying normal for a lognormal with the
/// given `mean` and `std`:
///
/// ```text
/// sigma² = ln(1 + std² / mean²)
/// mu     = ln(mean) − sigma² / 2
/// ```
pub fn lognormal_underlying(mean: f64, std: f64) -> (f64, f64) {
    let sigma2 = (1.0 + (std / mean).powi(2)).ln();
    (mean.ln() - sigma2 / 2.0, sigma2.sqrt())
}
