//! Crate-wide error type.
//!
//! The engine's trial-level outcomes (`pass`/`fail`/`skip`/`dup`) are *not*
//! errors — they are represented as [`crate::run::RunVerdict`] and
//! [`crate::trial::TrialResult`] variants. [`EngineError`] is reserved for
//! the failure modes spec.md §7 calls out as escalating to run abort: bad
//! configuration, allocation failure, and a hook or generator reporting
//! `ERROR`.

use thiserror::Error;

/// Failure modes that abort a run before or during execution.
#[derive(Debug, Error)]
pub enum EngineError {
    /// A descriptor enabled autoshrink and also supplied a bespoke `shrink`
    /// callback; spec.md §4.6 requires these to be mutually exclusive.
    #[error(
        "type descriptor at argument position {index} enables autoshrink \
         and also defines a bespoke shrink callback"
    )]
    ConflictingShrinkStrategy {
        /// Zero-based argument position.
        index: usize,
    },

    /// Allocation failed while growing engine-owned buffers (the bit pool's
    /// raw buffer or request log, the bloom filter's bitset).
    #[error("allocation failure: {0}")]
    Memory(&'static str),

    /// A generator's `alloc` callback reported an unrecoverable error.
    #[error("argument generation failed at position {index}")]
    GeneratorError {
        /// Zero-based argument position.
        index: usize,
    },

    /// The property itself reported `ERROR` (spec.md §7: "`ERROR` from the
    /// property aborts the run"), as opposed to `FAIL`/`SKIP`.
    #[error("property reported ERROR on trial {trial_index}")]
    PropertyError {
        /// Zero-based trial index.
        trial_index: u64,
    },

    /// A hook returned `ERROR`.
    #[error("hook '{hook}' returned ERROR")]
    HookError {
        /// Name of the hook point that failed, e.g. `"pre_trial"`.
        hook: &'static str,
    },

    /// Worker isolation (fork/pipe/wait) failed at the OS boundary, as
    /// opposed to the child reporting a failing trial.
    #[error("worker isolation failure: {0}")]
    Worker(&'static str),
}

/// Convenience alias used throughout the crate for fallible internal setup.
pub type EngineResult<T> = Result<T, EngineError>;
