//! Built-in [`TypeInfo`] descriptors for primitive argument types.
//!
//! Grounded on `original_source/test/test_fuzz_integration.c`'s
//! hand-written `bool_info`/`bool_alloc`/`bool_hash` descriptor (and its
//! integer/byte-buffer counterparts elsewhere in the same file), all
//! autoshrink-enabled per spec.md §4.6 ("most built-ins should just use
//! autoshrink").

use crate::bits::BitSource;
use crate::type_info::{BuiltTypeInfo, TypeInfoBuilder};

/// A `bool` drawn from a single bit.
pub fn bool_info() -> BuiltTypeInfo<bool> {
    TypeInfoBuilder::<bool, _>::new(|s| Ok(s.bits(1) != 0), |v| *v as u64)
        .print(|v, out| write!(out, "{v}"))
        .autoshrink()
        .build()
}

macro_rules! uint_info {
    ($name:ident, $ty:ty, $bits:expr) => {
        /// An autoshrink-enabled descriptor for
        #[doc = concat!("`", stringify!($ty), "`.")]
        pub fn $name() -> BuiltTypeInfo<$ty> {
            TypeInfoBuilder::<$ty, _>::new(|s| Ok(s.bits($bits) as $ty), |v| *v as u64)
                .print(|v, out| write!(out, "{v}"))
                .autoshrink()
                .build()
        }
    };
}

uint_info!(u8_info, u8, 8);
uint_info!(u16_info, u16, 16);
uint_info!(u32_info, u32, 32);
uint_info!(u64_info, u64, 64);

/// A variable-length `Vec<u8>`, capped at `max_len` bytes.
///
/// Length is itself drawn from the bit stream (so autoshrink can reduce it
/// by dropping the requests that encode trailing bytes), matching how
/// `original_source/test/test_fuzz_autoshrink.c`'s `bulk_buffer`/`bb_info`
/// fixture treats a buffer's size as ordinary generated state shrunk the
/// same way as its contents, rather than a privileged field.
pub fn bytes_info(max_len: usize) -> BuiltTypeInfo<Vec<u8>> {
    let len_bits = bits_for_count(max_len + 1);
    TypeInfoBuilder::<Vec<u8>, _>::new(
        move |s| {
            let len = if len_bits == 0 {
                0
            } else {
                (s.bits(len_bits) as usize) % (max_len + 1)
            };
            let mut out = Vec::with_capacity(len);
            for _ in 0..len {
                out.push(s.bits(8) as u8);
            }
            Ok(out)
        },
        |v| crate::hash::onepass(v),
    )
    .print(|v, out| write!(out, "{v:?}"))
    .autoshrink()
    .build()
}

fn bits_for_count(n: usize) -> u8 {
    if n <= 1 {
        0
    } else {
        (usize::BITS - (n - 1).leading_zeros()) as u8
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bits::PrngBuffer;
    use crate::rng::Rng;
    use crate::type_info::{AllocOutcome, TypeInfo};

    fn value<T>(outcome: AllocOutcome<T>) -> T {
        match outcome {
            AllocOutcome::Value(v) => v,
            AllocOutcome::Skip => panic!("built-in descriptor unexpectedly skipped"),
        }
    }

    #[test]
    fn bool_info_draws_both_values_over_many_trials() {
        let info = bool_info();
        let mut src = PrngBuffer::new(Rng::new(1));
        let mut saw_true = false;
        let mut saw_false = false;
        for _ in 0..100 {
            match value(info.alloc(&mut src).unwrap()) {
                true => saw_true = true,
                false => saw_false = true,
            }
        }
        assert!(saw_true && saw_false);
    }

    #[test]
    fn u8_info_stays_in_range() {
        let info = u8_info();
        let mut src = PrngBuffer::new(Rng::new(2));
        for _ in 0..100 {
            let _v: u8 = value(info.alloc(&mut src).unwrap());
        }
    }

    #[test]
    fn bytes_info_never_exceeds_max_len() {
        let info = bytes_info(16);
        let mut src = PrngBuffer::new(Rng::new(3));
        for _ in 0..200 {
            let v = value(info.alloc(&mut src).unwrap());
            assert!(v.len() <= 16);
        }
    }

    #[test]
    fn bytes_info_hash_is_stable() {
        let info = bytes_info(8);
        assert_eq!(info.hash(&vec![1, 2, 3]), info.hash(&vec![1, 2, 3]));
    }
}
