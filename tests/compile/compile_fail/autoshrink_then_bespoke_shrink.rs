// This file is expected to fail compilation: `.autoshrink()` moves the
// builder into `TypeInfoBuilder<T, strategy::Autoshrink>`, which has no
// `.shrink(..)` method (only `strategy::Undecided` does).
use fuzzcheck_core::type_info::{ShrinkOutcome, TypeInfoBuilder};

fn main() {
    let _ = TypeInfoBuilder::<u8, _>::new(|_s| Ok(0u8), |v| *v as u64)
        .autoshrink()
        .shrink(|_v, _t| ShrinkOutcome::NoMore);
}
