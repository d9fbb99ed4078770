//! Per-trial state machine: generate → dedupe → call → shrink → hook
//! (spec.md §4.8).
//!
//! Grounded on `original_source/src/trial.c`'s `fuzz_trial` main loop.
//! Arity: rather than the source's union of seven differently-typed
//! property pointers (spec.md §9 Design Notes explicitly invites a cleaner
//! re-implementation choice here), this crate dispatches on a single
//! generic argument type `D: TypeInfo`; properties over several arguments
//! compose a [`crate::type_info::TypeInfo`] for a tuple, so arity 2+ is
//! "arity 1 over a tuple" rather than a separate code path.

use crate::autoshrink::{self, Model};
use crate::bits::PrngBuffer;
use crate::bloom::Bloom;
use crate::error::{EngineError, EngineResult};
use crate::hooks::{
    CounterexampleInfo, HookAction, Hooks, PostForkInfo, PostShrinkInfo, PostShrinkTrialInfo, PostTrialInfo,
    PreGenArgsInfo, PreShrinkInfo, PreTrialInfo,
};
use crate::pool::{BitPool, Recording, Replaying};
use crate::rng::Rng;
use crate::type_info::{AllocOutcome, ShrinkOutcome, TypeInfo};
use crate::worker::{ForkConfig, WorkerOutcome};

/// Outcome of one trial (spec.md §3/§6). Mirrors the run-boundary result
/// codes but adds `Duplicate`, which only ever appears at trial level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrialResult {
    Pass,
    Fail,
    Skip,
    Duplicate,
    Error,
}

/// What a property invocation reported (spec.md §4.6/§4.8).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PropertyResult {
    Pass,
    Fail,
    Skip,
    Error,
}

/// Everything the trial runner needs that outlives a single trial: the
/// run's PRNG, optional bloom filter, optional fork config, and the
/// autoshrink model. Owned by [`crate::run::Run`] and threaded through by
/// mutable reference so state (PRNG draws, bloom marks, model weights)
/// carries across trial boundaries (spec.md §5's ordering guarantee).
pub struct TrialContext<'a> {
    pub rng: &'a mut Rng,
    pub bloom: Option<&'a mut Bloom>,
    pub fork: Option<&'a ForkConfig>,
    pub model: &'a mut Model,
}

/// Result of running one trial to completion.
pub struct TrialOutcome<V> {
    pub result: TrialResult,
    /// The (possibly shrunk) argument, present whenever a value was
    /// generated — even on `Pass`, so a caller can log it if desired.
    pub value: Option<V>,
    pub shrink_rounds: u64,
    /// Set when a hook requested `Halt`; the run controller stops after
    /// this trial (spec.md §5: "Any hook can return HALT to request
    /// orderly termination after the current trial").
    pub halt_requested: bool,
}

fn fmt_value<D: TypeInfo>(descriptor: &D, value: &D::Value) -> String {
    let mut s = String::new();
    let _ = descriptor.print(value, &mut s);
    s
}

/// Turns a hook's `Error` return into an aborting [`EngineError`]; anything
/// else passes through unchanged (spec.md §7: "Hook ERROR return: aborts
/// the run with ERROR").
pub(crate) fn check_hook(action: HookAction, hook: &'static str) -> EngineResult<HookAction> {
    match action {
        HookAction::Error => Err(EngineError::HookError { hook }),
        other => Ok(other),
    }
}

fn to_trial_result(outcome: PropertyResult) -> TrialResult {
    match outcome {
        PropertyResult::Pass => TrialResult::Pass,
        PropertyResult::Skip => TrialResult::Skip,
        PropertyResult::Error => TrialResult::Error,
        PropertyResult::Fail => TrialResult::Fail,
    }
}

/// Runs exactly one trial: generation, dedup, the property call (direct or
/// forked — `post_fork` fires inside the child via [`invoke_property`] when
/// fork mode is on), shrinking on failure, and every hook point spec.md
/// §4.8 names except `pre_run`/`post_run` (owned by the run controller).
#[allow(clippy::too_many_arguments)]
pub fn run_trial<D, H>(
    descriptor: &D,
    property_name: Option<&str>,
    trial_index: u64,
    seed: u64,
    mut property: impl FnMut(&D::Value) -> PropertyResult,
    ctx: &mut TrialContext<'_>,
    hooks: &mut H,
) -> EngineResult<TrialOutcome<D::Value>>
where
    D: TypeInfo,
    D::Value: Clone,
    H: Hooks,
{
    let skip_outcome = |halt_requested: bool| TrialOutcome {
        result: TrialResult::Skip,
        value: None,
        shrink_rounds: 0,
        halt_requested,
    };

    if let HookAction::Halt = check_hook(hooks.pre_gen_args(&PreGenArgsInfo { trial_index }), "pre_gen_args")? {
        return Ok(skip_outcome(true));
    }

    ctx.rng.reset(seed);
    let mut prng = PrngBuffer::new(ctx.rng.clone());

    // A descriptor's `alloc` callback is a caller-supplied closure; whatever
    // it returns on `Err` is reported as the argument-generation failure
    // spec.md §7 names, not propagated as some other run-abort cause.
    let to_generator_error = |_: EngineError| EngineError::GeneratorError { index: 0 };

    let (value, pool) = if descriptor.uses_autoshrink() {
        let mut pool = BitPool::new();
        let outcome = {
            let mut source = Recording {
                pool: &mut pool,
                prng: &mut prng,
            };
            descriptor.alloc(&mut source).map_err(to_generator_error)?
        };
        pool.seal_for_replay();
        match outcome {
            AllocOutcome::Skip => {
                *ctx.rng = prng.rng_mut().clone();
                return Ok(skip_outcome(false));
            }
            AllocOutcome::Value(v) => (v, Some(pool)),
        }
    } else {
        match descriptor.alloc(&mut prng).map_err(to_generator_error)? {
            AllocOutcome::Skip => {
                *ctx.rng = prng.rng_mut().clone();
                return Ok(skip_outcome(false));
            }
            AllocOutcome::Value(v) => (v, None),
        }
    };
    *ctx.rng = prng.rng_mut().clone();

    let fingerprint = match &pool {
        Some(p) => p.hash(),
        None => descriptor.hash(&value),
    };
    let fingerprint_bytes = fingerprint.to_le_bytes();

    if let Some(bloom) = ctx.bloom.as_deref_mut() {
        if bloom.check(&fingerprint_bytes) {
            descriptor.free(&value);
            return Ok(TrialOutcome {
                result: TrialResult::Duplicate,
                value: None,
                shrink_rounds: 0,
                halt_requested: false,
            });
        }
        bloom.mark(&fingerprint_bytes);
    }

    if let HookAction::Halt = check_hook(hooks.pre_trial(&PreTrialInfo { trial_index, seed }), "pre_trial")? {
        descriptor.free(&value);
        return Ok(skip_outcome(true));
    }

    let outcome = invoke_property(ctx.fork, trial_index, &mut property, &value, hooks);

    let mut current_value = value;
    let mut current_pool = pool;
    let mut result = to_trial_result(outcome);
    let mut shrink_rounds = 0u64;
    let mut halt_requested = false;

    if result == TrialResult::Fail {
        let (rounds, halted) = shrink_loop(
            descriptor,
            trial_index,
            &mut property,
            &mut current_value,
            &mut current_pool,
            ctx,
            hooks,
        )?;
        shrink_rounds = rounds;
        halt_requested = halted;

        let rendered = fmt_value(descriptor, &current_value);
        check_hook(
            hooks.counterexample(&CounterexampleInfo {
                name: property_name,
                trial_index,
                seed,
                arguments: &[rendered],
            }),
            "counterexample",
        )?;
    }

    loop {
        let action = check_hook(
            hooks.post_trial(&PostTrialInfo {
                trial_index,
                seed,
                result,
            }),
            "post_trial",
        )?;
        match action {
            HookAction::Repeat => {
                let again = invoke_property(ctx.fork, trial_index, &mut property, &current_value, hooks);
                if result == TrialResult::Fail && again == PropertyResult::Pass {
                    tracing::warn!(trial_index, "repeat invocation passed on a previously failing input (flake)");
                }
                result = to_trial_result(again);
            }
            HookAction::RepeatOnce => {
                let again = invoke_property(ctx.fork, trial_index, &mut property, &current_value, hooks);
                result = to_trial_result(again);
                break;
            }
            HookAction::Halt => {
                halt_requested = true;
                break;
            }
            _ => break,
        }
    }

    descriptor.free(&current_value);

    Ok(TrialOutcome {
        result,
        value: Some(current_value),
        shrink_rounds,
        halt_requested,
    })
}

/// Invokes `property` directly, or forked and isolated when `fork.enable`.
/// In fork mode, `hooks.post_fork` runs in the freshly forked child, before
/// the property, per spec.md §4.7.
fn invoke_property<D, H>(
    fork: Option<&ForkConfig>,
    trial_index: u64,
    property: &mut impl FnMut(&D) -> PropertyResult,
    value: &D,
    hooks: &mut H,
) -> PropertyResult
where
    D: Clone,
    H: Hooks,
{
    match fork {
        Some(config) if config.enable => {
            let value = value.clone();
            let property_ref = property;
            let outcome = crate::worker::run_isolated(
                config,
                move || {
                    // Runs inside the child; a Halt/Error return here has
                    // nothing to abort but this isolated invocation, which
                    // the parent already observes via the pipe result byte.
                    let _ = hooks.post_fork(&PostForkInfo {
                        trial_index,
                        child_pid: std::process::id() as i32,
                    });
                },
                move || match property_ref(&value) {
                    PropertyResult::Pass => WorkerOutcome::Pass,
                    PropertyResult::Skip => WorkerOutcome::Skip,
                    PropertyResult::Fail | PropertyResult::Error => WorkerOutcome::Fail,
                },
            );
            match outcome {
                Ok(Some(WorkerOutcome::Pass)) => PropertyResult::Pass,
                Ok(Some(WorkerOutcome::Skip)) => PropertyResult::Skip,
                Ok(Some(WorkerOutcome::Fail)) => PropertyResult::Fail,
                Ok(Some(WorkerOutcome::NoResult)) => PropertyResult::Fail,
                Ok(None) => PropertyResult::Skip, // fork-less host: skip the whole run
                Err(_) => PropertyResult::Error,
            }
        }
        _ => property(value),
    }
}

/// Runs the shrink loop for a failing trial. Returns the number of rounds
/// attempted and whether a hook requested `Halt`.
#[allow(clippy::too_many_arguments)]
fn shrink_loop<D, H>(
    descriptor: &D,
    trial_index: u64,
    property: &mut impl FnMut(&D::Value) -> PropertyResult,
    current_value: &mut D::Value,
    current_pool: &mut Option<BitPool>,
    ctx: &mut TrialContext<'_>,
    hooks: &mut H,
) -> EngineResult<(u64, bool)>
where
    D: TypeInfo,
    D::Value: Clone,
    H: Hooks,
{
    let mut rounds = 0u64;
    let mut halt_requested = false;

    if descriptor.uses_autoshrink() {
        let policy = descriptor.shrink_policy();
        let Some(pool) = current_pool.as_mut() else {
            return Ok((0, false));
        };
        let mut hook_rng = PrngBuffer::new(ctx.rng.clone());

        'rounds: loop {
            if let HookAction::Halt = check_hook(
                hooks.pre_shrink(&PreShrinkInfo {
                    trial_index,
                    shrink_round: rounds,
                }),
                "pre_shrink",
            )? {
                halt_requested = true;
                break;
            }

            let tactic = ctx.model.select(&mut hook_rng);
            let Some(mut candidate) = autoshrink::produce_candidate(pool, tactic, &mut hook_rng, &policy) else {
                ctx.model.feedback(tactic, false);
                break;
            };

            let mut source = Replaying { pool: &mut candidate };
            let candidate_value = match descriptor.alloc(&mut source) {
                Ok(AllocOutcome::Value(v)) => v,
                _ => {
                    ctx.model.feedback(tactic, false);
                    continue;
                }
            };

            let outcome = invoke_property(ctx.fork, trial_index, property, &candidate_value, hooks);
            let accepted = outcome == PropertyResult::Fail;

            let action = check_hook(
                hooks.post_shrink_trial(&PostShrinkTrialInfo {
                    trial_index,
                    shrink_round: rounds,
                    accepted,
                }),
                "post_shrink_trial",
            )?;

            ctx.model.feedback(tactic, accepted);
            rounds += 1;

            if accepted {
                descriptor.free(current_value);
                *pool = candidate;
                *current_value = candidate_value;
            } else {
                descriptor.free(&candidate_value);
            }

            if let HookAction::Halt = action {
                halt_requested = true;
                break 'rounds;
            }

            if rounds > autoshrink_round_guard(pool) {
                break;
            }
        }

        *ctx.rng = hook_rng.rng_mut().clone();
    } else {
        let mut tactic: u32 = 0;
        'rounds: loop {
            if let HookAction::Halt = check_hook(
                hooks.pre_shrink(&PreShrinkInfo {
                    trial_index,
                    shrink_round: rounds,
                }),
                "pre_shrink",
            )? {
                halt_requested = true;
                break;
            }

            match descriptor.shrink(current_value, tactic) {
                ShrinkOutcome::NoMore => break,
                ShrinkOutcome::DeadEnd => {
                    tactic += 1;
                }
                ShrinkOutcome::Candidate(candidate) => {
                    let outcome = invoke_property(ctx.fork, trial_index, property, &candidate, hooks);
                    let accepted = outcome == PropertyResult::Fail;
                    let action = check_hook(
                        hooks.post_shrink_trial(&PostShrinkTrialInfo {
                            trial_index,
                            shrink_round: rounds,
                            accepted,
                        }),
                        "post_shrink_trial",
                    )?;
                    rounds += 1;
                    if accepted {
                        descriptor.free(current_value);
                        *current_value = candidate;
                        tactic = 0;
                    } else {
                        descriptor.free(&candidate);
                        tactic += 1;
                    }
                    if let HookAction::Halt = action {
                        halt_requested = true;
                        break 'rounds;
                    }
                }
            }
        }
    }

    if let HookAction::Halt = check_hook(
        hooks.post_shrink(&PostShrinkInfo {
            trial_index,
            total_rounds: rounds,
        }),
        "post_shrink",
    )? {
        halt_requested = true;
    }

    Ok((rounds, halt_requested))
}

/// A generous, non-authoritative backstop so a pathological model/tactic
/// combination cannot loop forever inside one trial; scales with pool size
/// so large pools still get proportionally many shrink attempts.
fn autoshrink_round_guard(pool: &BitPool) -> u64 {
    (pool.request_count() as u64).max(16) * 64
}
