//! Run configuration (spec.md §6): "the only external data structure a
//! user must populate."
//!
//! Grounded on `proptest`'s `test_runner::config::Config` (a plain struct
//! with `Default`, constructed ergonomically via a builder) — the teacher
//! carries no config type of its own, so this is an enrichment from the
//! retrieved `other_examples/` proptest source, noted in DESIGN.md. Unlike
//! `proptest::Config`, this reads **no environment variables**: spec.md §6
//! is explicit that the engine consumes none.

use crate::worker::ForkConfig;

/// Seed used when a caller passes `seed: 0` (spec.md §4.9: "seeds the PRNG
/// with `seed`, defaulting to a fixed sentinel if zero").
pub const DEFAULT_SEED_SENTINEL: u64 = 0x5eed_0000_c0de_5eed;

/// Default number of trials run per property, absent an explicit override
/// (spec.md §6: "count (default implementation-defined, e.g. 100)").
pub const DEFAULT_TRIALS: usize = 100;

/// How many glyph columns [`crate::hooks::ProgressPrinter`] wraps at when a
/// caller hasn't installed custom hooks.
pub const DEFAULT_PROGRESS_WIDTH: usize = 72;

/// Everything [`crate::run::Run::run`] needs to know about one property run.
///
/// Property and type-descriptor values are not part of this struct: unlike
/// the C source's `propN`/`type_info[7]` arrays (arity encoded as which of
/// seven slots is non-null), this crate dispatches on a single generic
/// `D: TypeInfo` and an `impl FnMut(&D::Value) -> PropertyResult` passed
/// directly to `Run::run`, so arity lives in the type system instead of in
/// this struct (see `src/trial.rs`'s module doc for the tuple-composition
/// convention for arity ≥ 2).
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RunConfig {
    /// Optional name surfaced in `pre_run`/`counterexample`/`post_run`
    /// reports.
    pub name: Option<String>,
    /// Number of trials to run after the always-seeds are exhausted.
    pub trials: usize,
    /// Initial seed; `0` is replaced with [`DEFAULT_SEED_SENTINEL`].
    pub seed: u64,
    /// Regression seeds run first, in order, before `seed`-derived trials
    /// (spec.md §3/§4.9).
    pub always_seeds: Vec<u64>,
    /// Fork/timeout isolation settings (spec.md §4.7). `enable: false` by
    /// default runs the property in-process.
    pub fork: ForkConfig,
    /// Overrides the bloom filter's default sizing (spec.md §6's
    /// `bloom_bits`).
    pub bloom_bits: Option<crate::bloom::BloomConfig>,
    /// Column width for the built-in progress printer, when no custom
    /// `post_trial` hook is installed.
    pub progress_width: usize,
}

impl Default for RunConfig {
    fn default() -> Self {
        RunConfig {
            name: None,
            trials: DEFAULT_TRIALS,
            seed: 0,
            always_seeds: Vec::new(),
            fork: ForkConfig::default(),
            bloom_bits: None,
            progress_width: DEFAULT_PROGRESS_WIDTH,
        }
    }
}

impl RunConfig {
    /// The seed actually used to initialize the PRNG: `seed`, or
    /// [`DEFAULT_SEED_SENTINEL`] if it was left at `0`.
    pub fn effective_seed(&self) -> u64 {
        if self.seed == 0 {
            DEFAULT_SEED_SENTINEL
        } else {
            self.seed
        }
    }

    /// Starts a [`RunConfigBuilder`] with every field at its default.
    pub fn builder() -> RunConfigBuilder {
        RunConfigBuilder::default()
    }
}

/// Ergonomic construction for [`RunConfig`], mirroring `proptest::Config`'s
/// `with_*`-less builder shape (plain setters, consumed by `build`).
#[derive(Debug, Clone, Default)]
pub struct RunConfigBuilder {
    config: RunConfig,
}

impl RunConfigBuilder {
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.config.name = Some(name.into());
        self
    }

    pub fn trials(mut self, trials: usize) -> Self {
        self.config.trials = trials;
        self
    }

    pub fn seed(mut self, seed: u64) -> Self {
        self.config.seed = seed;
        self
    }

    pub fn always_seeds(mut self, seeds: impl Into<Vec<u64>>) -> Self {
        self.config.always_seeds = seeds.into();
        self
    }

    pub fn fork(mut self, fork: ForkConfig) -> Self {
        self.config.fork = fork;
        self
    }

    pub fn bloom_bits(mut self, bloom_bits: crate::bloom::BloomConfig) -> Self {
        self.config.bloom_bits = Some(bloom_bits);
        self
    }

    pub fn progress_width(mut self, width: usize) -> Self {
        self.config.progress_width = width;
        self
    }

    pub fn build(self) -> RunConfig {
        self.config
    }
}
