//! Integration tests for cohort-sim.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use cohort_core::{SimConfig, Step, Uid};
use cohort_dist::{Distribution, StreamPath};

use crate::{
    BackgroundDeaths, BirthRate, Births, DeathRate, HistoryObserver, Module, ModuleKind,
    NoopObserver, SimBuilder, SimError, SimResult, StepContext,
};

// ── Helpers ───────────────────────────────────────────────────────────────────

fn test_config(n_agents: usize, n_steps: u64) -> SimConfig {
    SimConfig {
        seed: 42,
        n_agents,
        n_steps,
        start: 2000.0,
        dt: 1.0,
        compact_interval: 5,
    }
}

/// `(module.dist, step) → values`, shared between a recorder and the test.
type Log = Rc<RefCell<HashMap<(String, u64), Vec<f64>>>>;

/// A module that draws from each of its distributions every step and records
/// what it saw.
struct Recorder {
    kind:  ModuleKind,
    name:  String,
    dists: Vec<(String, Distribution)>,
    log:   Log,
}

impl Recorder {
    fn new(kind: ModuleKind, name: &str, dists: Vec<(&str, Distribution)>, log: &Log) -> Self {
        Self {
            kind,
            name: name.to_owned(),
            dists: dists.into_iter().map(|(n, d)| (n.to_owned(), d)).collect(),
            log: Rc::clone(log),
        }
    }
}

impl Module for Recorder {
    fn kind(&self) -> ModuleKind {
        self.kind
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn distributions(&mut self) -> Vec<(StreamPath, &mut Distribution)> {
        self.dists
            .iter_mut()
            .map(|(n, d)| (StreamPath::of([n.as_str()]), d))
            .collect()
    }

    fn step(&mut self, ctx: &mut StepContext<'_>) -> SimResult<()> {
        let alive = ctx.people.alive();
        let first_two = &alive[..alive.len().min(2)];
        for (n, d) in &mut self.dists {
            let mut values = d.draw(3usize)?;
            values.extend(d.draw_for(first_two)?);
            self.log
                .borrow_mut()
                .insert((format!("{}.{}", self.name, n), ctx.step.0), values);
        }
        Ok(())
    }
}

fn new_log() -> Log {
    Rc::new(RefCell::new(HashMap::new()))
}

fn series(log: &Log, key: &str) -> Vec<Vec<f64>> {
    let log = log.borrow();
    let mut steps: Vec<_> = log.iter().filter(|((k, _), _)| k == key).collect();
    steps.sort_by_key(|((_, s), _)| *s);
    steps.into_iter().map(|(_, v)| v.clone()).collect()
}

// ── SimBuilder validation ─────────────────────────────────────────────────────

#[cfg(test)]
mod builder_tests {
    use super::*;

    #[test]
    fn builds_with_defaults() {
        let sim = SimBuilder::new(test_config(10, 5)).build().unwrap();
        assert_eq!(sim.people.n_alive(), 10);
        assert!(!sim.is_initialized());
        assert_eq!(sim.current_step(), Step(0));
    }

    #[test]
    fn invalid_config_rejected() {
        let mut config = test_config(10, 5);
        config.dt = 0.0;
        assert!(matches!(SimBuilder::new(config).build(), Err(SimError::Core(_))));
    }

    #[test]
    fn duplicate_module_rejected() {
        let log = new_log();
        let result = SimBuilder::new(test_config(10, 5))
            .module(Recorder::new(ModuleKind::Disease, "sir", vec![], &log))
            .module(Recorder::new(ModuleKind::Disease, "sir", vec![], &log))
            .build();
        assert!(matches!(result, Err(SimError::Config(_))));
    }

    #[test]
    fn same_name_under_different_kinds_is_fine() {
        let log = new_log();
        let result = SimBuilder::new(test_config(10, 5))
            .module(Recorder::new(ModuleKind::Disease, "x", vec![], &log))
            .module(Recorder::new(ModuleKind::Intervention, "x", vec![], &log))
            .build();
        assert!(result.is_ok());
    }

    #[test]
    fn modules_sorted_by_kind_then_declaration() {
        let log = new_log();
        let sim = SimBuilder::new(test_config(10, 5))
            .module(Recorder::new(ModuleKind::Analyzer, "report", vec![], &log))
            .module(Recorder::new(ModuleKind::Disease, "sir", vec![], &log))
            .module(Recorder::new(ModuleKind::Demographics, "births", vec![], &log))
            .module(Recorder::new(ModuleKind::Disease, "hiv", vec![], &log))
            .build()
            .unwrap();
        let order: Vec<(ModuleKind, &str)> = sim.modules().collect();
        assert_eq!(order, vec![
            (ModuleKind::Demographics, "births"),
            (ModuleKind::Disease, "sir"),
            (ModuleKind::Disease, "hiv"),
            (ModuleKind::Analyzer, "report"),
        ]);
    }
}

// ── Initialization ────────────────────────────────────────────────────────────

#[cfg(test)]
mod init_tests {
    use super::*;

    #[test]
    fn binds_every_distribution_at_its_path() {
        let log = new_log();
        let mut sim = SimBuilder::new(test_config(10, 5))
            .module(Recorder::new(
                ModuleKind::Disease,
                "sir",
                vec![("dur_inf", Distribution::normal(5.0, 1.0).unwrap())],
                &log,
            ))
            .build()
            .unwrap();
        sim.init().unwrap();
        let paths: Vec<String> = sim.streams().map(|e| e.identity.to_string()).collect();
        assert_eq!(paths, vec!["people.age", "people.female", "diseases.sir.dur_inf"]);
    }

    #[test]
    fn duplicate_relative_paths_abort_init() {
        let log = new_log();
        let mut sim = SimBuilder::new(test_config(10, 5))
            .module(Recorder::new(
                ModuleKind::Disease,
                "sir",
                vec![
                    ("p", Distribution::bernoulli(0.1).unwrap()),
                    ("p", Distribution::bernoulli(0.2).unwrap()),
                ],
                &log,
            ))
            .build()
            .unwrap();
        assert!(matches!(sim.init(), Err(SimError::Dist(_))));
    }

    #[test]
    fn init_twice_fails_and_step_requires_init() {
        let mut sim = SimBuilder::new(test_config(10, 5)).build().unwrap();
        assert!(matches!(sim.step(&mut NoopObserver), Err(SimError::NotInitialized)));
        sim.init().unwrap();
        assert!(matches!(sim.init(), Err(SimError::AlreadyInitialized)));
    }

    #[test]
    fn initial_attributes_drawn_per_uid() {
        let mut sim = SimBuilder::new(test_config(2_000, 1)).build().unwrap();
        sim.init().unwrap();
        assert!(sim.people.age.values().iter().all(|a| (0.0..80.0).contains(a)));
        let females = sim.people.female.values().iter().filter(|f| **f).count();
        assert!((800..1200).contains(&females), "females {females}");
    }

    #[test]
    fn custom_initial_age() {
        let mut sim = SimBuilder::new(test_config(5, 3))
            .initial_age(Distribution::delta(30.0).unwrap())
            .build()
            .unwrap();
        sim.run(&mut NoopObserver).unwrap();
        assert!(sim.people.age.values().iter().all(|&a| a == 33.0));
    }

    #[test]
    fn negative_initial_age_rejected() {
        let mut sim = SimBuilder::new(test_config(5, 3))
            .initial_age(Distribution::delta(-1.0).unwrap())
            .build()
            .unwrap();
        assert!(matches!(sim.init(), Err(SimError::Config(_))));
    }
}

// ── Running ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod run_tests {
    use super::*;

    #[test]
    fn runs_to_end_step() {
        let mut sim = SimBuilder::new(test_config(20, 7)).build().unwrap();
        let mut history = HistoryObserver::default();
        sim.run(&mut history).unwrap();
        assert_eq!(sim.current_step(), Step(7));
        assert_eq!(history.steps.len(), 7);
        assert_eq!(history.steps[3].step, Step(3));
        assert_eq!(history.steps[3].year, 2003.0);
    }

    #[test]
    fn run_steps_ignores_end_step() {
        let mut sim = SimBuilder::new(test_config(20, 2)).build().unwrap();
        sim.init().unwrap();
        sim.run_steps(5, &mut NoopObserver).unwrap();
        assert_eq!(sim.current_step(), Step(5));
    }

    #[test]
    fn recorded_draws_are_reproducible() {
        let run = || {
            let log = new_log();
            let mut sim = SimBuilder::new(test_config(10, 4))
                .module(Recorder::new(
                    ModuleKind::Disease,
                    "sir",
                    vec![("x", Distribution::normal(0.0, 1.0).unwrap())],
                    &log,
                ))
                .build()
                .unwrap();
            sim.run(&mut NoopObserver).unwrap();
            series(&log, "sir.x")
        };
        let a = run();
        assert_eq!(a.len(), 4);
        assert_eq!(a, run());
        assert_ne!(a[0], a[1]);
    }
}

// ── Scenario coherence ────────────────────────────────────────────────────────

#[cfg(test)]
mod scenario_tests {
    use super::*;

    /// Three draw sites A, B, C; only A's location depends on `p`.
    fn run_scenario(p: f64, extra_module: bool, reverse_declaration: bool) -> Log {
        let log = new_log();
        let mut modules: Vec<Box<dyn Module>> = vec![
            Box::new(Recorder::new(
                ModuleKind::Disease,
                "sir",
                vec![("a", Distribution::normal(p, 1.0).unwrap())],
                &log,
            )),
            Box::new(Recorder::new(
                ModuleKind::Disease,
                "sis",
                vec![("b", Distribution::weibull(2.0, 3.0).unwrap())],
                &log,
            )),
            Box::new(Recorder::new(
                ModuleKind::Intervention,
                "vx",
                vec![("c", Distribution::uniform(0.0, 1.0).unwrap())],
                &log,
            )),
        ];
        if extra_module {
            modules.push(Box::new(Recorder::new(
                ModuleKind::Network,
                "random",
                vec![("dur", Distribution::lognormal_explicit(2.0, 1.0).unwrap())],
                &log,
            )));
        }
        if reverse_declaration {
            modules.reverse();
        }
        let mut builder = SimBuilder::new(test_config(50, 6));
        for m in modules {
            builder = builder.boxed_module(m);
        }
        let mut sim = builder.build().unwrap();
        sim.run(&mut NoopObserver).unwrap();
        log
    }

    #[test]
    fn changing_one_parameter_only_moves_its_own_stream() {
        let p1 = run_scenario(1.0, false, false);
        let p2 = run_scenario(2.0, false, false);
        assert_ne!(series(&p1, "sir.a"), series(&p2, "sir.a"));
        assert_eq!(series(&p1, "sis.b"), series(&p2, "sis.b"));
        assert_eq!(series(&p1, "vx.c"), series(&p2, "vx.c"));
    }

    #[test]
    fn shifted_location_preserves_normal_innovations() {
        let p1 = series(&run_scenario(1.0, false, false), "sir.a");
        let p2 = series(&run_scenario(2.0, false, false), "sir.a");
        for (x1, x2) in p1.iter().flatten().zip(p2.iter().flatten()) {
            assert!((x2 - x1 - 1.0).abs() < 1e-9);
        }
    }

    #[test]
    fn adding_a_module_leaves_existing_streams_alone() {
        let base = run_scenario(1.0, false, false);
        let extended = run_scenario(1.0, true, false);
        for key in ["sir.a", "sis.b", "vx.c"] {
            assert_eq!(series(&base, key), series(&extended, key), "{key}");
        }
        assert_eq!(series(&extended, "random.dur").len(), 6);
    }

    #[test]
    fn declaration_order_does_not_matter() {
        let fwd = run_scenario(1.0, true, false);
        let rev = run_scenario(1.0, true, true);
        for key in ["sir.a", "sis.b", "vx.c", "random.dur"] {
            assert_eq!(series(&fwd, key), series(&rev, key), "{key}");
        }
    }

    #[test]
    fn deaths_among_initial_agents_ignore_births() {
        let dead_initial = |with_births: bool| -> Vec<Uid> {
            let mut builder = SimBuilder::new(test_config(500, 3));
            if with_births {
                builder = builder.module(Births::new(BirthRate::Constant(40.0)).unwrap());
            }
            let mut sim = builder
                .module(BackgroundDeaths::new(DeathRate::Constant(0.1)).unwrap())
                .build()
                .unwrap();
            sim.run(&mut NoopObserver).unwrap();
            (0..500).map(Uid).filter(|&u| !sim.people.is_alive(u)).collect()
        };
        let without = dead_initial(false);
        assert!(!without.is_empty());
        assert_eq!(without, dead_initial(true));
    }
}

// ── Demographics ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod demographics_tests {
    use super::*;

    #[test]
    fn birth_rate_interpolates() {
        let rate = BirthRate::ByYear(vec![(2000.0, 10.0), (2010.0, 30.0)]);
        assert_eq!(rate.at(1990.0), 10.0);
        assert_eq!(rate.at(2005.0), 20.0);
        assert_eq!(rate.at(2020.0), 30.0);
        assert_eq!(BirthRate::Constant(12.0).at(1800.0), 12.0);
    }

    #[test]
    fn births_follow_crude_rate() {
        let mut sim = SimBuilder::new(test_config(1_000, 1))
            .module(Births::new(BirthRate::Constant(100.0)).unwrap())
            .build()
            .unwrap();
        sim.run(&mut NoopObserver).unwrap();
        assert_eq!(sim.people.n_alive(), 1_100);
        assert_eq!(sim.people.age.len(), 1_100);
        // Newborns start at 0 and age one step.
        assert_eq!(*sim.people.age.get(Uid(1_050)).unwrap(), 1.0);
    }

    #[test]
    fn births_scale_with_dt() {
        let births = Births::new(BirthRate::Constant(20.0)).unwrap();
        assert_eq!(births.births_for(1_000, 2000.0, 1.0), 20);
        assert_eq!(births.births_for(1_000, 2000.0, 0.5), 10);
        assert_eq!(births.births_for(10, 2000.0, 1.0), 0);
        let doubled = Births::new(BirthRate::Constant(20.0)).unwrap().with_rel_birth(2.0);
        assert_eq!(doubled.births_for(1_000, 2000.0, 1.0), 40);
    }

    #[test]
    fn bad_birth_table_fails_init() {
        let mut sim = SimBuilder::new(test_config(10, 1))
            .module(Births::new(BirthRate::ByYear(vec![(2010.0, 1.0), (2000.0, 1.0)])).unwrap())
            .build()
            .unwrap();
        assert!(matches!(sim.init(), Err(SimError::Module { .. })));
    }

    #[test]
    fn certain_death_empties_population_and_compacts() {
        let mut config = test_config(100, 2);
        config.compact_interval = 1;
        let mut sim = SimBuilder::new(config)
            .module(BackgroundDeaths::new(DeathRate::Constant(1.0)).unwrap())
            .build()
            .unwrap();
        let mut history = HistoryObserver::default();
        sim.run(&mut history).unwrap();
        assert_eq!(sim.people.n_alive(), 0);
        assert_eq!(history.steps[0].deaths, 100);
        assert_eq!(history.compacted, vec![(Step(0), 100)]);
        assert!(sim.people.age.is_empty());
    }

    #[test]
    fn dead_agents_readable_until_compaction() {
        let mut sim = SimBuilder::new(test_config(10, 1))
            .module(BackgroundDeaths::new(DeathRate::Constant(1.0)).unwrap())
            .build()
            .unwrap();
        sim.run(&mut NoopObserver).unwrap();
        assert_eq!(sim.people.n_alive(), 0);
        assert_eq!(sim.people.pending_compaction().len(), 10);
        assert!(sim.people.age.get(Uid(3)).is_ok());
    }

    #[test]
    fn no_deaths_at_zero_probability() {
        let mut sim = SimBuilder::new(test_config(100, 5))
            .module(BackgroundDeaths::new(DeathRate::Constant(0.0)).unwrap())
            .build()
            .unwrap();
        sim.run(&mut NoopObserver).unwrap();
        assert_eq!(sim.people.n_alive(), 100);
    }

    #[test]
    fn per_agent_death_rates() {
        let deaths = BackgroundDeaths::by_agent(|people, uids| {
            uids.iter()
                .map(|&u| match people.age.get(u) {
                    Ok(&age) if age > 50.0 => 1.0,
                    _ => 0.0,
                })
                .collect()
        })
        .unwrap();
        let mut sim = SimBuilder::new(test_config(500, 1))
            .initial_age(Distribution::uniform(0.0, 100.0).unwrap())
            .module(deaths)
            .build()
            .unwrap();
        sim.run(&mut NoopObserver).unwrap();
        assert!(sim.people.n_alive() < 500);
        for uid in sim.people.alive() {
            assert!(*sim.people.age.get(uid).unwrap() <= 51.0);
        }
    }

    #[test]
    fn per_agent_rate_with_wrong_length_fails() {
        let deaths = BackgroundDeaths::by_agent(|_, _| vec![0.1]).unwrap();
        let mut sim = SimBuilder::new(test_config(5, 1)).module(deaths).build().unwrap();
        assert!(matches!(sim.run(&mut NoopObserver), Err(SimError::Module { .. })));
    }

    #[test]
    fn death_probability_out_of_range_fails_init() {
        let mut sim = SimBuilder::new(test_config(5, 1))
            .module(BackgroundDeaths::new(DeathRate::Constant(1.5)).unwrap())
            .build()
            .unwrap();
        assert!(matches!(sim.init(), Err(SimError::Module { .. })));
    }
}

// ── Snapshots ─────────────────────────────────────────────────────────────────

#[cfg(test)]
mod snapshot_tests {
    use super::*;

    fn recording_sim(log: &Log, extra: bool) -> crate::Sim {
        let mut builder = SimBuilder::new(test_config(20, 10)).module(Recorder::new(
            ModuleKind::Disease,
            "sir",
            vec![("x", Distribution::normal(0.0, 1.0).unwrap())],
            log,
        ));
        if extra {
            builder = builder.module(Recorder::new(
                ModuleKind::Analyzer,
                "extra",
                vec![("y", Distribution::uniform(0.0, 1.0).unwrap())],
                log,
            ));
        }
        let mut sim = builder.build().unwrap();
        sim.init().unwrap();
        sim
    }

    #[test]
    fn snapshot_requires_init() {
        let mut sim = SimBuilder::new(test_config(5, 1)).build().unwrap();
        assert!(matches!(sim.snapshot(), Err(SimError::NotInitialized)));
    }

    #[test]
    fn restored_streams_continue_identically() {
        let log_a = new_log();
        let mut a = recording_sim(&log_a, false);
        a.run_steps(3, &mut NoopObserver).unwrap();
        let snap = a.snapshot().unwrap();
        assert_eq!(snap.step, Step(3));
        assert_eq!(snap.streams.len(), 3);
        assert_eq!(&snap.people.allocator, a.people.allocator());
        a.run_steps(2, &mut NoopObserver).unwrap();

        let log_b = new_log();
        let mut b = recording_sim(&log_b, false);
        b.restore_streams(&snap).unwrap();
        assert_eq!(b.current_step(), Step(3));
        b.run_steps(2, &mut NoopObserver).unwrap();

        let tail_a: Vec<Vec<f64>> = series(&log_a, "sir.x").into_iter().skip(3).collect();
        assert_eq!(series(&log_b, "sir.x"), tail_a);
    }

    #[test]
    fn restore_with_unknown_stream_fails() {
        let log = new_log();
        let mut a = recording_sim(&log, false);
        let snap = a.snapshot().unwrap();
        let mut b = recording_sim(&log, true);
        assert!(matches!(b.restore_streams(&snap), Err(SimError::Snapshot(_))));
    }

    #[derive(Default, Clone, PartialEq, Debug)]
    struct Exposed(u32);

    fn mortal_sim(with_state: bool) -> crate::Sim {
        let mut builder = SimBuilder::new(test_config(200, 10))
            .module(BackgroundDeaths::new(DeathRate::Constant(0.2)).unwrap());
        if with_state {
            builder = builder.state::<Exposed>();
        }
        let mut sim = builder.build().unwrap();
        sim.init().unwrap();
        sim
    }

    #[test]
    fn restore_resumes_through_deaths_and_compaction() {
        let mut a = mortal_sim(true);
        a.run_steps(3, &mut NoopObserver).unwrap();
        let alive = a.people.alive();
        a.people.state_mut::<Exposed>().unwrap().fill(&alive[..5], Exposed(7)).unwrap();
        let snap = a.snapshot().unwrap();
        assert!(!snap.people.pending.is_empty());
        assert_eq!(snap.people.stored.len(), 200);

        let mut b = mortal_sim(true);
        b.restore(snap).unwrap();
        assert_eq!(b.current_step(), Step(3));
        assert_eq!(b.people.stored(), a.people.stored());

        let mut hist_a = HistoryObserver::default();
        let mut hist_b = HistoryObserver::default();
        a.run_steps(2, &mut hist_a).unwrap();
        b.run_steps(2, &mut hist_b).unwrap();

        assert_eq!(hist_b.steps, hist_a.steps);
        assert_eq!(hist_b.compacted, hist_a.compacted);
        assert_eq!(hist_a.compacted.len(), 1);
        assert!(b.people.pending_compaction().is_empty());
        assert_eq!(b.people.stored().len(), b.people.n_alive());
        assert_eq!(b.people.age, a.people.age);
        assert_eq!(b.people.female, a.people.female);
        assert_eq!(b.people.state::<Exposed>(), a.people.state::<Exposed>());
        assert_eq!(b.people.state::<Exposed>().unwrap().len(), b.people.n_alive());
    }

    #[test]
    fn restore_checks_before_changing_anything() {
        let mut a = mortal_sim(true);
        a.run_steps(2, &mut NoopObserver).unwrap();
        let snap = a.snapshot().unwrap();

        let mut plain = mortal_sim(false);
        assert!(matches!(
            plain.restore(snap.clone()),
            Err(SimError::Agent(cohort_agent::AgentError::SnapshotMismatch(_)))
        ));
        assert_eq!(plain.current_step(), Step(0));
        assert_eq!(plain.people.n_alive(), 200);

        let log = new_log();
        let mut other = recording_sim(&log, false);
        assert!(matches!(other.restore(snap), Err(SimError::Snapshot(_))));
        assert_eq!(other.people.n_alive(), 20);
    }

    #[test]
    fn rewind_replays_a_step() {
        let log = new_log();
        let mut sim = recording_sim(&log, false);
        sim.step(&mut NoopObserver).unwrap();
        let first = series(&log, "sir.x");
        sim.rewind_streams(Step(0)).unwrap();
        sim.step(&mut NoopObserver).unwrap();
        assert_eq!(series(&log, "sir.x"), first);
        assert_eq!(sim.current_step(), Step(1));
    }
}

// ── Replicates ────────────────────────────────────────────────────────────────

#[cfg(test)]
mod replicate_tests {
    use crate::{replicate_seeds, run_replicates};

    use super::*;

    fn survivors(seed: u64) -> SimResult<usize> {
        let mut config = test_config(300, 5);
        config.seed = seed;
        let mut sim = SimBuilder::new(config)
            .module(BackgroundDeaths::new(DeathRate::Constant(0.2))?)
            .build()?;
        sim.run(&mut NoopObserver)?;
        Ok(sim.people.n_alive())
    }

    #[test]
    fn results_come_back_in_seed_order() {
        let seeds = replicate_seeds(100, 4);
        assert_eq!(seeds, vec![100, 101, 102, 103]);
        let results = run_replicates(&seeds, survivors);
        assert_eq!(results.len(), 4);
        for (seed, result) in seeds.iter().zip(&results) {
            assert_eq!(result.as_ref().unwrap(), &survivors(*seed).unwrap());
        }
    }

    #[test]
    fn different_seeds_give_different_runs() {
        let results: Vec<usize> = run_replicates(&replicate_seeds(1, 6), survivors)
            .into_iter()
            .map(Result::unwrap)
            .collect();
        assert!(results.iter().any(|&r| r != results[0]));
    }

    #[test]
    fn a_failing_replicate_does_not_stop_others() {
        let results = run_replicates(&[1, 2, 3], |seed| {
            if seed == 2 {
                Err(SimError::Config("boom".into()))
            } else {
                survivors(seed)
            }
        });
        assert!(results[0].is_ok());
        assert!(results[1].is_err());
        assert!(results[2].is_ok());
    }
}
