//! Deterministic property-based testing engine core.
//!
//! A property is a predicate over generated arguments; a run repeatedly
//! generates arguments, invokes the property, and on failure shrinks toward
//! a minimal reproducing case. Everything here is reusable outside of any
//! particular test harness: the engine drives a run given a [`type_info::TypeInfo`]
//! descriptor, a property closure, a [`config::RunConfig`], and a
//! [`hooks::Hooks`] implementation, and returns a [`run::RunReport`].
//!
//! Module map:
//! - [`rng`] / [`bits`]: the deterministic PRNG and the [`bits::BitSource`]
//!   seam generators draw bits from.
//! - [`pool`]: the bit pool that makes autoshrink possible by recording and
//!   replaying a generation's bit requests.
//! - [`autoshrink`]: the DROP/SHIFT/MASK/SWAP/SUB tactics and their weighted
//!   selection model.
//! - [`hash`]: the FNV-1a hasher used for argument fingerprints.
//! - [`bloom`]: duplicate-argument detection.
//! - [`type_info`]: the external contract a generated argument type
//!   satisfies, and the typestate builder for constructing one.
//! - [`builtins`]: ready-made descriptors for primitive types.
//! - [`tuple`]: composing descriptors for properties of arity ≥ 2.
//! - [`worker`]: optional fork/timeout isolation of a single trial.
//! - [`hooks`]: the ten-point hook surface and the built-in progress hooks.
//! - [`trial`]: the per-trial state machine.
//! - [`config`] / [`run`]: run configuration and the outer run loop.

pub mod autoshrink;
pub mod bits;
pub mod bloom;
pub mod builtins;
pub mod config;
pub mod error;
pub mod hash;
pub mod hooks;
pub mod pool;
pub mod rng;
pub mod run;
pub mod trial;
pub mod tuple;
pub mod type_info;
pub mod worker;

/// Common imports for crates driving a run.
pub mod prelude {
    pub use crate::config::{RunConfig, RunConfigBuilder};
    pub use crate::error::{EngineError, EngineResult};
    pub use crate::hooks::{DefaultHooks, HookAction, Hooks};
    pub use crate::run::{Run, RunReport, RunVerdict};
    pub use crate::trial::PropertyResult;
    pub use crate::tuple::{Tuple2, Tuple3};
    pub use crate::type_info::{AllocOutcome, ShrinkOutcome, TypeInfo, TypeInfoBuilder};
}
