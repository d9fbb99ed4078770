//! The external contract a property's argument type satisfies (spec.md §4.6).
//!
//! Grounded on `original_source/src/types_internal.h`'s `struct prop_info`
//! (which holds a `struct fuzz_type_info* type_info[FUZZ_MAX_ARITY]`
//! array of alloc/free/hash/print/shrink callback tables) and
//! `original_source/src/call.h`'s alloc/hash/bloom-mark call protocol,
//! together with the teacher's typestate pattern in `src/scalar/kinds.rs`
//! (deterministic-vs-nondeterministic scalars tracked at the type level,
//! enforced with `trybuild` compile-fail tests). Here the typestate tracks
//! whether a descriptor has opted into
//! autoshrink, since spec.md §4.6 forbids combining a bespoke `shrink`
//! callback with autoshrink: the two strategies are mutually exclusive.

use crate::autoshrink::ShrinkPolicy;
use crate::bits::BitSource;
use crate::error::{EngineError, EngineResult};

/// Result of one bespoke `shrink(value, tactic)` call (spec.md §4.6: the
/// shrinker tries `tactic = 0, 1, 2, …` until `NoMore`).
pub enum ShrinkOutcome<T> {
    /// `tactic` produced a smaller candidate worth re-testing.
    Candidate(T),
    /// `tactic` produced no candidate this time, but a later tactic index
    /// might; equivalent to a passing try for control-flow purposes.
    DeadEnd,
    /// No further tactics remain; shrinking for this value is done.
    NoMore,
}

/// Result of one `alloc` call (spec.md §4.6: `Ok(value) | Skip | Error`).
/// `Error` is not a variant here — it is the `Err` side of the surrounding
/// [`EngineResult`], since it aborts the run the same way any other
/// engine-fatal condition does.
pub enum AllocOutcome<T> {
    /// A value was produced.
    Value(T),
    /// The current trial should be skipped; no value was produced.
    Skip,
}

/// The external contract a property's argument type must satisfy.
///
/// `alloc` and `hash` are mandatory. `free`, `print`, and a bespoke `shrink`
/// are optional; autoshrink (enabled via [`TypeInfoBuilder::autoshrink`]) is
/// mutually exclusive with a bespoke `shrink` (spec.md §4.6).
pub trait TypeInfo {
    /// The generated value type.
    type Value;

    /// Produces one value, drawing bits from `source`. `Skip` causes the
    /// current trial to be skipped; `Err` aborts the run (spec.md §4.6).
    fn alloc(&self, source: &mut dyn BitSource) -> EngineResult<AllocOutcome<Self::Value>>;

    /// Releases resources owned by `value`. Default: no-op (for `Copy`-like
    /// values with nothing to free).
    fn free(&self, _value: &Self::Value) {}

    /// Computes a stable fingerprint for deduplication (spec.md §4.4).
    fn hash(&self, value: &Self::Value) -> u64;

    /// Renders `value` for diagnostics. Default: no output.
    fn print(&self, _value: &Self::Value, _out: &mut dyn std::fmt::Write) -> std::fmt::Result {
        Ok(())
    }

    /// Whether this descriptor drives autoshrink over the recorded bit pool
    /// rather than a bespoke `shrink` callback.
    fn uses_autoshrink(&self) -> bool {
        false
    }

    /// The autoshrink policy to use, if [`TypeInfo::uses_autoshrink`].
    fn shrink_policy(&self) -> ShrinkPolicy {
        ShrinkPolicy::default()
    }

    /// Tries shrink tactic `tactic` against `value`. Only called when
    /// [`TypeInfo::uses_autoshrink`] is `false`; the trial runner starts at
    /// `tactic = 0` and increments on `DeadEnd`, resets to `0` on an
    /// accepted `Candidate`, and stops on `NoMore`.
    fn shrink(&self, _value: &Self::Value, _tactic: u32) -> ShrinkOutcome<Self::Value> {
        ShrinkOutcome::NoMore
    }

    /// Whether this descriptor installed a bespoke [`TypeInfo::shrink`]
    /// callback, as opposed to relying on the default `NoMore`. Used by
    /// [`validate`] to catch a hand-written `impl TypeInfo` that enables
    /// autoshrink and also overrides `shrink` — a conflict the typestate
    /// builder rules out at compile time, but a manual impl can still commit.
    fn has_bespoke_shrink(&self) -> bool {
        false
    }
}

/// Marker for [`TypeInfoBuilder`]'s typestate: has a shrink strategy been
/// picked yet, and if so, which.
pub mod strategy {
    /// No shrink strategy chosen yet.
    pub struct Undecided;
    /// Autoshrink over the recorded bit pool.
    pub struct Autoshrink;
    /// A bespoke `shrink` callback.
    pub struct Bespoke;
}

/// Builds a [`TypeInfo`] descriptor while enforcing, at compile time, that
/// autoshrink and a bespoke shrinker are never both configured.
///
/// ```compile_fail
/// use fuzzcheck_core::type_info::TypeInfoBuilder;
/// // Calling both `.autoshrink()` and `.shrink(..)` does not type-check:
/// // `autoshrink()` only exists on `Undecided`, and so does `shrink(..)`,
/// // but each consumes `self` into a different, non-overlapping state.
/// let _ = TypeInfoBuilder::<u8, _>::new(|_s| Ok(0u8), |v| *v as u64)
///     .autoshrink()
///     .shrink(|_v, _t| fuzzcheck_core::type_info::ShrinkOutcome::NoMore);
/// ```
pub struct TypeInfoBuilder<T, S = strategy::Undecided> {
    alloc: Box<dyn Fn(&mut dyn BitSource) -> EngineResult<AllocOutcome<T>>>,
    free: Option<Box<dyn Fn(&T)>>,
    hash: Box<dyn Fn(&T) -> u64>,
    print: Option<Box<dyn Fn(&T, &mut dyn std::fmt::Write) -> std::fmt::Result>>,
    shrink_policy: ShrinkPolicy,
    shrink_fn: Option<Box<dyn Fn(&T, u32) -> ShrinkOutcome<T>>>,
    _state: std::marker::PhantomData<S>,
}

impl<T> TypeInfoBuilder<T, strategy::Undecided> {
    /// Starts a descriptor with the two mandatory callbacks. `alloc` always
    /// produces a value; use [`TypeInfoBuilder::new_with_skip`] for a
    /// generator that sometimes needs to skip the trial instead.
    pub fn new(
        alloc: impl Fn(&mut dyn BitSource) -> EngineResult<T> + 'static,
        hash: impl Fn(&T) -> u64 + 'static,
    ) -> Self {
        Self::new_with_skip(move |s| alloc(s).map(AllocOutcome::Value), hash)
    }

    /// Starts a descriptor whose `alloc` may return [`AllocOutcome::Skip`].
    pub fn new_with_skip(
        alloc: impl Fn(&mut dyn BitSource) -> EngineResult<AllocOutcome<T>> + 'static,
        hash: impl Fn(&T) -> u64 + 'static,
    ) -> Self {
        TypeInfoBuilder {
            alloc: Box::new(alloc),
            free: None,
            hash: Box::new(hash),
            print: None,
            shrink_policy: ShrinkPolicy::default(),
            shrink_fn: None,
            _state: std::marker::PhantomData,
        }
    }

    /// Opts into autoshrink over the recorded bit pool.
    pub fn autoshrink(self) -> TypeInfoBuilder<T, strategy::Autoshrink> {
        self.autoshrink_with(ShrinkPolicy::default())
    }

    /// Opts into autoshrink with a non-default policy.
    pub fn autoshrink_with(self, policy: ShrinkPolicy) -> TypeInfoBuilder<T, strategy::Autoshrink> {
        TypeInfoBuilder {
            alloc: self.alloc,
            free: self.free,
            hash: self.hash,
            print: self.print,
            shrink_policy: policy,
            shrink_fn: None,
            _state: std::marker::PhantomData,
        }
    }

    /// Installs a bespoke shrink callback instead of autoshrink.
    pub fn shrink(
        self,
        shrink_fn: impl Fn(&T, u32) -> ShrinkOutcome<T> + 'static,
    ) -> TypeInfoBuilder<T, strategy::Bespoke> {
        TypeInfoBuilder {
            alloc: self.alloc,
            free: self.free,
            hash: self.hash,
            print: self.print,
            shrink_policy: self.shrink_policy,
            shrink_fn: Some(Box::new(shrink_fn)),
            _state: std::marker::PhantomData,
        }
    }
}

impl<T, S> TypeInfoBuilder<T, S> {
    /// Installs an optional `free` callback.
    pub fn free(mut self, free: impl Fn(&T) + 'static) -> Self {
        self.free = Some(Box::new(free));
        self
    }

    /// Installs an optional `print` callback.
    pub fn print(mut self, print: impl Fn(&T, &mut dyn std::fmt::Write) -> std::fmt::Result + 'static) -> Self {
        self.print = Some(Box::new(print));
        self
    }
}

impl<T> TypeInfoBuilder<T, strategy::Undecided> {
    /// Finalizes a descriptor that uses neither autoshrink nor a bespoke
    /// shrinker (shrinking never proposes a smaller candidate).
    pub fn build(self) -> BuiltTypeInfo<T> {
        BuiltTypeInfo {
            alloc: self.alloc,
            free: self.free,
            hash: self.hash,
            print: self.print,
            autoshrink: false,
            shrink_policy: self.shrink_policy,
            shrink_fn: None,
        }
    }
}

impl<T> TypeInfoBuilder<T, strategy::Autoshrink> {
    /// Finalizes an autoshrink-enabled descriptor.
    pub fn build(self) -> BuiltTypeInfo<T> {
        BuiltTypeInfo {
            alloc: self.alloc,
            free: self.free,
            hash: self.hash,
            print: self.print,
            autoshrink: true,
            shrink_policy: self.shrink_policy,
            shrink_fn: None,
        }
    }
}

impl<T> TypeInfoBuilder<T, strategy::Bespoke> {
    /// Finalizes a descriptor driven by its bespoke `shrink` callback.
    pub fn build(self) -> BuiltTypeInfo<T> {
        BuiltTypeInfo {
            alloc: self.alloc,
            free: self.free,
            hash: self.hash,
            print: self.print,
            autoshrink: false,
            shrink_policy: self.shrink_policy,
            shrink_fn: self.shrink_fn,
        }
    }
}

/// A finalized, runtime descriptor produced by [`TypeInfoBuilder::build`].
pub struct BuiltTypeInfo<T> {
    alloc: Box<dyn Fn(&mut dyn BitSource) -> EngineResult<AllocOutcome<T>>>,
    free: Option<Box<dyn Fn(&T)>>,
    hash: Box<dyn Fn(&T) -> u64>,
    print: Option<Box<dyn Fn(&T, &mut dyn std::fmt::Write) -> std::fmt::Result>>,
    autoshrink: bool,
    shrink_policy: ShrinkPolicy,
    shrink_fn: Option<Box<dyn Fn(&T, u32) -> ShrinkOutcome<T>>>,
}

impl<T> TypeInfo for BuiltTypeInfo<T> {
    type Value = T;

    fn alloc(&self, source: &mut dyn BitSource) -> EngineResult<AllocOutcome<T>> {
        (self.alloc)(source)
    }

    fn free(&self, value: &T) {
        if let Some(f) = &self.free {
            f(value);
        }
    }

    fn hash(&self, value: &T) -> u64 {
        (self.hash)(value)
    }

    fn print(&self, value: &T, out: &mut dyn std::fmt::Write) -> std::fmt::Result {
        match &self.print {
            Some(f) => f(value, out),
            None => Ok(()),
        }
    }

    fn uses_autoshrink(&self) -> bool {
        self.autoshrink
    }

    fn shrink_policy(&self) -> ShrinkPolicy {
        self.shrink_policy
    }

    fn shrink(&self, value: &T, tactic: u32) -> ShrinkOutcome<T> {
        match &self.shrink_fn {
            Some(f) => f(value, tactic),
            None => ShrinkOutcome::NoMore,
        }
    }

    fn has_bespoke_shrink(&self) -> bool {
        self.shrink_fn.is_some()
    }
}

/// Runtime double-check for descriptors not built through
/// [`TypeInfoBuilder`] (e.g. a hand-written [`TypeInfo`] impl): the
/// typestate builder prevents this at compile time, but a manual impl can
/// still violate it, so callers that accept arbitrary `dyn TypeInfo` should
/// call this before running a trial.
pub fn validate<V>(info: &dyn TypeInfo<Value = V>, index: usize) -> EngineResult<()> {
    if info.uses_autoshrink() && info.has_bespoke_shrink() {
        return Err(EngineError::ConflictingShrinkStrategy { index });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_without_shrink_choice_never_proposes_a_candidate() {
        let info = TypeInfoBuilder::<u8, _>::new(|s| Ok(s.bits(8) as u8), |v| *v as u64).build();
        assert!(matches!(info.shrink(&5, 0), ShrinkOutcome::NoMore));
        assert!(!info.uses_autoshrink());
    }

    #[test]
    fn builder_with_autoshrink_reports_it() {
        let info = TypeInfoBuilder::<u8, _>::new(|s| Ok(s.bits(8) as u8), |v| *v as u64)
            .autoshrink()
            .build();
        assert!(info.uses_autoshrink());
    }

    #[test]
    fn builder_with_bespoke_shrink_runs_it() {
        let info = TypeInfoBuilder::<u8, _>::new(|s| Ok(s.bits(8) as u8), |v| *v as u64)
            .shrink(|v, _tactic| {
                if *v == 0 {
                    ShrinkOutcome::NoMore
                } else {
                    ShrinkOutcome::Candidate(v / 2)
                }
            })
            .build();
        match info.shrink(&10, 0) {
            ShrinkOutcome::Candidate(v) => assert_eq!(v, 5),
            _ => panic!("expected a smaller candidate"),
        }
        assert!(!info.uses_autoshrink());
    }
}
