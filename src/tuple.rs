//! Composes [`TypeInfo`] descriptors for properties of arity ≥ 2.
//!
//! spec.md §9 Design Notes: the source statically unions seven differently
//! typed property pointers to cover arities 1–7; this crate instead
//! dispatches on one generic `D: TypeInfo` (`src/trial.rs`'s module doc), so
//! arity 2+ is "arity 1 over a composed value" rather than a distinct code
//! path. [`Tuple2`]/[`Tuple3`] are that composition: each wraps two or three
//! descriptors and draws their arguments from the same [`crate::bits::BitSource`]
//! in order, so autoshrink (which only ever sees the combined bit pool, not
//! which descriptor made which request) composes for free as long as every
//! wrapped descriptor uses it.

use crate::bits::BitSource;
use crate::error::EngineResult;
use crate::hash::Hasher;
use crate::type_info::{AllocOutcome, TypeInfo};

/// Composes two descriptors into one over `(A::Value, B::Value)`.
pub struct Tuple2<A, B> {
    pub first: A,
    pub second: B,
}

impl<A, B> Tuple2<A, B> {
    pub fn new(first: A, second: B) -> Self {
        Tuple2 { first, second }
    }
}

impl<A: TypeInfo, B: TypeInfo> TypeInfo for Tuple2<A, B> {
    type Value = (A::Value, B::Value);

    fn alloc(&self, source: &mut dyn BitSource) -> EngineResult<AllocOutcome<Self::Value>> {
        let a = match self.first.alloc(source)? {
            AllocOutcome::Value(v) => v,
            AllocOutcome::Skip => return Ok(AllocOutcome::Skip),
        };
        let b = match self.second.alloc(source)? {
            AllocOutcome::Value(v) => v,
            AllocOutcome::Skip => {
                self.first.free(&a);
                return Ok(AllocOutcome::Skip);
            }
        };
        Ok(AllocOutcome::Value((a, b)))
    }

    fn free(&self, value: &Self::Value) {
        self.first.free(&value.0);
        self.second.free(&value.1);
    }

    fn hash(&self, value: &Self::Value) -> u64 {
        let mut h = Hasher::new();
        h.sink(&self.first.hash(&value.0).to_le_bytes());
        h.sink(&self.second.hash(&value.1).to_le_bytes());
        h.finish()
    }

    fn print(&self, value: &Self::Value, out: &mut dyn std::fmt::Write) -> std::fmt::Result {
        self.first.print(&value.0, out)?;
        writeln!(out)?;
        self.second.print(&value.1, out)
    }

    fn uses_autoshrink(&self) -> bool {
        self.first.uses_autoshrink() && self.second.uses_autoshrink()
    }

    // Bespoke per-element shrinking does not compose across a tuple (there
    // is no single `tactic` index that means the same thing to both
    // elements), so a `Tuple2` only shrinks when every element autoshrinks;
    // `shrink`/`has_bespoke_shrink` keep their `TypeInfo` defaults
    // (`NoMore`/`false`).
}

/// Composes three descriptors into one over `(A::Value, B::Value, C::Value)`.
pub struct Tuple3<A, B, C> {
    pub first: A,
    pub second: B,
    pub third: C,
}

impl<A, B, C> Tuple3<A, B, C> {
    pub fn new(first: A, second: B, third: C) -> Self {
        Tuple3 { first, second, third }
    }
}

impl<A: TypeInfo, B: TypeInfo, C: TypeInfo> TypeInfo for Tuple3<A, B, C> {
    type Value = (A::Value, B::Value, C::Value);

    fn alloc(&self, source: &mut dyn BitSource) -> EngineResult<AllocOutcome<Self::Value>> {
        let a = match self.first.alloc(source)? {
            AllocOutcome::Value(v) => v,
            AllocOutcome::Skip => return Ok(AllocOutcome::Skip),
        };
        let b = match self.second.alloc(source)? {
            AllocOutcome::Value(v) => v,
            AllocOutcome::Skip => {
                self.first.free(&a);
                return Ok(AllocOutcome::Skip);
            }
        };
        let c = match self.third.alloc(source)? {
            AllocOutcome::Value(v) => v,
            AllocOutcome::Skip => {
                self.first.free(&a);
                self.second.free(&b);
                return Ok(AllocOutcome::Skip);
            }
        };
        Ok(AllocOutcome::Value((a, b, c)))
    }

    fn free(&self, value: &Self::Value) {
        self.first.free(&value.0);
        self.second.free(&value.1);
        self.third.free(&value.2);
    }

    fn hash(&self, value: &Self::Value) -> u64 {
        let mut h = Hasher::new();
        h.sink(&self.first.hash(&value.0).to_le_bytes());
        h.sink(&self.second.hash(&value.1).to_le_bytes());
        h.sink(&self.third.hash(&value.2).to_le_bytes());
        h.finish()
    }

    fn print(&self, value: &Self::Value, out: &mut dyn std::fmt::Write) -> std::fmt::Result {
        self.first.print(&value.0, out)?;
        writeln!(out)?;
        self.second.print(&value.1, out)?;
        writeln!(out)?;
        self.third.print(&value.2, out)
    }

    fn uses_autoshrink(&self) -> bool {
        self.first.uses_autoshrink() && self.second.uses_autoshrink() && self.third.uses_autoshrink()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bits::PrngBuffer;
    use crate::builtins::{bool_info, u8_info};
    use crate::rng::Rng;

    #[test]
    fn tuple2_allocates_both_members_in_order() {
        let info = Tuple2::new(bool_info(), u8_info());
        let mut src = PrngBuffer::new(Rng::new(42));
        let (_, _) = match info.alloc(&mut src).unwrap() {
            AllocOutcome::Value(v) => v,
            AllocOutcome::Skip => panic!("tuple alloc unexpectedly skipped"),
        };
    }

    #[test]
    fn tuple2_hash_is_order_sensitive() {
        let info_ab = Tuple2::new(bool_info(), u8_info());
        let mut src = PrngBuffer::new(Rng::new(7));
        let value = match info_ab.alloc(&mut src).unwrap() {
            AllocOutcome::Value(v) => v,
            AllocOutcome::Skip => panic!("unexpected skip"),
        };
        let swapped = (!value.0, value.1);
        assert_ne!(info_ab.hash(&value), info_ab.hash(&swapped));
    }

    #[test]
    fn tuple2_uses_autoshrink_only_when_both_members_do() {
        let info = Tuple2::new(bool_info(), u8_info());
        assert!(info.uses_autoshrink());
    }
}
