//! The outer loop over a run's seed sequence (spec.md §4.9): config
//! validation, PRNG/bloom/model setup, `pre_run`/`post_run` hook dispatch,
//! and accounting.
//!
//! Grounded on `original_source/src/run.c`'s `fuzz_run` driver loop — the
//! always-seeds-then-run-seed-then-PRNG-derived seed sequence, and the
//! `pass`/`fail`/`skip`/`dup` tallies `struct fuzz_post_run_info` carries.

use crate::autoshrink::Model;
use crate::bloom::Bloom;
use crate::config::RunConfig;
use crate::error::{EngineError, EngineResult};
use crate::hooks::{Hooks, PostRunInfo, PreRunInfo};
use crate::rng::Rng;
use crate::trial::{check_hook, run_trial, PropertyResult, TrialContext, TrialResult};
use crate::type_info::{self, TypeInfo};

/// Verdict at the run boundary (spec.md §4.9: "`FAIL` if any trial failed;
/// otherwise `OK` if any trial passed; otherwise `SKIP`"). Engine-fatal
/// conditions (`ERROR`/`ERROR_MEMORY`) are not variants here — they surface
/// as `Err(EngineError)` from [`Run::run`] instead, since they abort before
/// a verdict can be computed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum RunVerdict {
    Pass,
    Fail,
    Skip,
}

/// Final tallies and verdict for one run, returned by [`Run::run`] and also
/// threaded through `post_run` (spec.md §3's run counters, plus the
/// computed verdict).
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RunReport {
    pub verdict: RunVerdict,
    pub pass: u64,
    pub fail: u64,
    pub skip: u64,
    pub dup: u64,
    /// Number of trials actually executed; may be less than
    /// `config.trials` if a hook requested `Halt`.
    pub trials_run: u64,
}

impl RunReport {
    fn empty() -> Self {
        RunReport {
            verdict: RunVerdict::Skip,
            pass: 0,
            fail: 0,
            skip: 0,
            dup: 0,
            trials_run: 0,
        }
    }

    fn verdict_from_tallies(pass: u64, fail: u64) -> RunVerdict {
        if fail > 0 {
            RunVerdict::Fail
        } else if pass > 0 {
            RunVerdict::Pass
        } else {
            RunVerdict::Skip
        }
    }
}

/// The run controller. Stateless — every method takes the config, a
/// descriptor, and hooks as arguments rather than being built up first,
/// since (per spec.md §5) all mutable state belongs to one run and has no
/// reason to outlive it.
pub struct Run;

impl Run {
    /// Validates `config`/`descriptor`, then runs `config.trials` trials
    /// (spec.md §4.9), dispatching `pre_run`/`post_run` around the loop.
    pub fn run<D, H>(
        config: &RunConfig,
        descriptor: &D,
        mut property: impl FnMut(&D::Value) -> PropertyResult,
        hooks: &mut H,
    ) -> EngineResult<RunReport>
    where
        D: TypeInfo,
        D::Value: Clone,
        H: Hooks,
    {
        type_info::validate(descriptor, 0)?;

        let seed = config.effective_seed();

        // Fork-less host, fork mode requested: short-circuit to SKIP at the
        // run boundary before the PRNG, bloom filter, or autoshrink model
        // are even created (spec.md §9's fork-less-host requirement). No
        // trial is generated, so no signal/wait/rlimit code path is ever
        // reached; `pre_run`/`post_run` still bracket the (empty) run so a
        // caller's logging/reporting sees every run attempted.
        if config.fork.enable && !cfg!(unix) {
            tracing::warn!("fork mode requested on a host without fork support; run will SKIP");
            let report = RunReport::empty();
            check_hook(
                hooks.pre_run(&PreRunInfo {
                    name: config.name.as_deref(),
                    trials: config.trials,
                    seed,
                }),
                "pre_run",
            )?;
            check_hook(
                hooks.post_run(&PostRunInfo {
                    name: config.name.as_deref(),
                    report: &report,
                }),
                "post_run",
            )?;
            return Ok(report);
        }

        let span = tracing::info_span!("run", name = config.name.as_deref().unwrap_or(""), seed);
        let _enter = span.enter();

        use crate::hooks::HookAction;
        let pre_run_action = check_hook(
            hooks.pre_run(&PreRunInfo {
                name: config.name.as_deref(),
                trials: config.trials,
                seed,
            }),
            "pre_run",
        )?;
        if let HookAction::Halt = pre_run_action {
            let report = RunReport::empty();
            hooks.post_run(&PostRunInfo {
                name: config.name.as_deref(),
                report: &report,
            });
            return Ok(report);
        }

        let mut rng = Rng::new(seed);
        let mut bloom = Bloom::new(config.bloom_bits);
        let mut model = Model::default();

        let mut pass = 0u64;
        let mut fail = 0u64;
        let mut skip = 0u64;
        let mut dup = 0u64;
        let mut trials_run = 0u64;

        let mut next_derived_seed = seed;

        for i in 0..config.trials as u64 {
            let trial_seed = if (i as usize) < config.always_seeds.len() {
                config.always_seeds[i as usize]
            } else if i as usize == config.always_seeds.len() {
                seed
            } else {
                next_derived_seed
            };

            let trial_span = tracing::trace_span!("trial", index = i, seed = trial_seed);
            let _trial_enter = trial_span.enter();

            let mut ctx = TrialContext {
                rng: &mut rng,
                bloom: Some(&mut bloom),
                fork: if config.fork.enable { Some(&config.fork) } else { None },
                model: &mut model,
            };

            let outcome = run_trial(
                descriptor,
                config.name.as_deref(),
                i,
                trial_seed,
                &mut property,
                &mut ctx,
                hooks,
            )?;

            // Whatever trial.rs leaves `rng` at becomes this trial's
            // trailing draw, the seed for the first non-always-seed,
            // non-run-seed trial that follows (spec.md §3/§4.9).
            next_derived_seed = rng.next();

            trials_run += 1;
            match outcome.result {
                TrialResult::Pass => pass += 1,
                TrialResult::Fail => fail += 1,
                TrialResult::Skip => skip += 1,
                TrialResult::Duplicate => dup += 1,
                TrialResult::Error => return Err(EngineError::PropertyError { trial_index: i }),
            }

            if outcome.halt_requested {
                break;
            }
        }

        let report = RunReport {
            verdict: RunReport::verdict_from_tallies(pass, fail),
            pass,
            fail,
            skip,
            dup,
            trials_run,
        };

        check_hook(
            hooks.post_run(&PostRunInfo {
                name: config.name.as_deref(),
                report: &report,
            }),
            "post_run",
        )?;

        Ok(report)
    }

    /// Convenience matching spec.md §4.9's `generate`: runs `alloc` once
    /// against `descriptor`, prints the result to `out`, frees it, and
    /// returns. Shares no mutable state with [`Run::run`] — each call is
    /// self-contained.
    pub fn generate<D>(descriptor: &D, seed: u64, out: &mut dyn std::fmt::Write) -> EngineResult<()>
    where
        D: TypeInfo,
    {
        use crate::bits::PrngBuffer;
        use crate::type_info::AllocOutcome;

        let mut prng = PrngBuffer::new(Rng::new(seed));
        match descriptor.alloc(&mut prng)? {
            AllocOutcome::Value(value) => {
                let _ = descriptor.print(&value, out);
                descriptor.free(&value);
                Ok(())
            }
            AllocOutcome::Skip => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builtins::bool_info;
    use crate::hooks::DefaultHooks;

    #[test]
    fn tautological_failure_produces_fail_plus_dup_near_trial_count() {
        // spec.md §8 scenario 6: fail + dup == 100, fail <= 2.
        let descriptor = bool_info();
        let config = RunConfig::builder().trials(100).seed(0xabad5eed).build();
        let mut hooks = DefaultHooks::new();
        let report = Run::run(&config, &descriptor, |_v| PropertyResult::Fail, &mut hooks).unwrap();
        assert_eq!(report.fail + report.dup, 100);
        assert!(report.fail <= 2);
        assert_eq!(report.verdict, RunVerdict::Fail);
    }

    #[test]
    fn always_passing_property_yields_pass_verdict() {
        let descriptor = bool_info();
        let config = RunConfig::builder().trials(20).seed(1).build();
        let mut hooks = DefaultHooks::new();
        let report = Run::run(&config, &descriptor, |_v| PropertyResult::Pass, &mut hooks).unwrap();
        assert_eq!(report.verdict, RunVerdict::Pass);
        assert_eq!(report.fail, 0);
    }

    #[test]
    fn always_seeds_run_before_derived_seeds() {
        let descriptor = bool_info();
        let config = RunConfig::builder()
            .always_seeds(vec![0x600d5eed, 0xabad5eed])
            .seed(0x600dd06)
            .trials(5)
            .build();
        let mut hooks = DefaultHooks::new();
        let mut seen = Vec::new();
        {
            struct SeedRecorder<'a> {
                seen: &'a mut Vec<u64>,
            }
            impl Hooks for SeedRecorder<'_> {
                fn pre_trial(&mut self, info: &crate::hooks::PreTrialInfo) -> crate::hooks::HookAction {
                    self.seen.push(info.seed);
                    crate::hooks::HookAction::Continue
                }
            }
            let mut recorder = SeedRecorder { seen: &mut seen };
            Run::run(&config, &descriptor, |_v| PropertyResult::Pass, &mut recorder).unwrap();
        }
        let _ = &mut hooks;
        assert_eq!(&seen[0..3], &[0x600d5eed, 0xabad5eed, 0x600dd06]);
    }

    #[test]
    fn zero_trials_skips_cleanly() {
        let descriptor = bool_info();
        let config = RunConfig::builder().trials(0).build();
        let mut hooks = DefaultHooks::new();
        let report = Run::run(&config, &descriptor, |_v| PropertyResult::Pass, &mut hooks).unwrap();
        assert_eq!(report.verdict, RunVerdict::Skip);
        assert_eq!(report.trials_run, 0);
    }

    #[cfg(not(unix))]
    #[test]
    fn fork_enabled_on_a_forkless_host_skips_without_running_trials() {
        use crate::worker::ForkConfig;

        let descriptor = bool_info();
        let config = RunConfig::builder()
            .trials(50)
            .fork(ForkConfig {
                enable: true,
                ..ForkConfig::default()
            })
            .build();
        let mut hooks = DefaultHooks::new();
        let report = Run::run(&config, &descriptor, |_v| PropertyResult::Pass, &mut hooks).unwrap();
        assert_eq!(report.verdict, RunVerdict::Skip);
        assert_eq!(report.trials_run, 0);
    }
}
