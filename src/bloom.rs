//! Remembers fingerprints of already-tried argument tuples.
//!
//! Ported from `original_source/src/bloom.h`'s `fuzz_bloom_config`
//! (`top_block_bits`/`min_filter_bits`) and the word-based bitset style used
//! by `examples/other_examples/..._Disentinel-grafema__...bloom.rs.rs`: a
//! `Vec<u64>` bitset, probe positions derived from a single hash split into
//! a sub-filter selector and several within-filter positions.
//!
//! spec.md §4.4's ambiguity about exactly how `top_block_bits`/
//! `min_filter_bits` interact is resolved here (see SPEC_FULL.md §4): the
//! bitset is partitioned into `2^top_block_bits` equal sub-filters, each
//! sized up to the next multiple of 64 bits that is at least
//! `min_filter_bits`. `mark`/`check` never produce a false negative (spec.md
//! §8 invariant 4): every bit `mark` sets is also tested by `check`.

use crate::hash::onepass;

/// Number of probe positions derived per sub-filter lookup.
const HASHES_PER_LOOKUP: u32 = 4;

/// Bloom filter sizing knobs (spec.md §3/§4.4).
#[derive(Debug, Clone, Copy)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BloomConfig {
    /// `2^top_block_bits` sub-filters are allocated.
    pub top_block_bits: u8,
    /// Each sub-filter is sized to at least this many bits.
    pub min_filter_bits: u32,
}

impl Default for BloomConfig {
    /// Targets at least 2^23 total bits across all sub-filters (spec.md
    /// §4.4's default sizing).
    fn default() -> Self {
        // 2^8 sub-filters * 2^15 bits each = 2^23 bits total.
        BloomConfig {
            top_block_bits: 8,
            min_filter_bits: 1 << 15,
        }
    }
}

#[derive(Debug, Clone)]
struct SubFilter {
    words: Vec<u64>,
    bits: u64,
}

impl SubFilter {
    fn new(bits: u32) -> Self {
        let words = ((bits as usize) + 63) / 64;
        SubFilter {
            words: vec![0u64; words.max(1)],
            bits: (words.max(1) * 64) as u64,
        }
    }

    fn mark(&mut self, pos: u64) {
        let word = (pos / 64) as usize;
        let bit = pos % 64;
        self.words[word] |= 1u64 << bit;
    }

    fn is_set(&self, pos: u64) -> bool {
        let word = (pos / 64) as usize;
        let bit = pos % 64;
        (self.words[word] >> bit) & 1 == 1
    }
}

/// Approximate duplicate-argument-tuple detector.
///
/// Queries are approximate (false positives are permitted and treated as
/// duplicates); absence is exact (spec.md §3).
#[derive(Debug, Clone)]
pub struct Bloom {
    sub_filters: Vec<SubFilter>,
    selector_bits: u8,
}

impl Bloom {
    /// Builds a filter from `config`, or [`BloomConfig::default`] if `None`.
    pub fn new(config: Option<BloomConfig>) -> Self {
        let config = config.unwrap_or_default();
        let count = 1usize << config.top_block_bits;
        let sub_filters = (0..count)
            .map(|_| SubFilter::new(config.min_filter_bits))
            .collect();
        Bloom {
            sub_filters,
            selector_bits: config.top_block_bits,
        }
    }

    fn locate(&self, data: &[u8]) -> (usize, Vec<u64>) {
        let h = onepass(data);
        let sub_count = self.sub_filters.len() as u64;
        let selector = if self.selector_bits == 0 {
            0
        } else {
            h & (sub_count - 1)
        };
        let sub = &self.sub_filters[selector as usize];

        // Derive HASHES_PER_LOOKUP positions from the remaining hash bits
        // via double hashing (h1 + i*h2), h2 forced odd for full coverage
        // of a power-of-two-sized bitset.
        let h1 = h.rotate_right(u32::from(self.selector_bits));
        let h2 = onepass(&h.to_le_bytes()) | 1;
        let positions = (0..u64::from(HASHES_PER_LOOKUP))
            .map(|i| h1.wrapping_add(i.wrapping_mul(h2)) % sub.bits)
            .collect();
        (selector as usize, positions)
    }

    /// Marks `data`'s fingerprint as seen.
    pub fn mark(&mut self, data: &[u8]) {
        let (selector, positions) = self.locate(data);
        let sub = &mut self.sub_filters[selector];
        for pos in positions {
            sub.mark(pos);
        }
    }

    /// Reports whether `data`'s fingerprint has (probably) been marked.
    pub fn check(&self, data: &[u8]) -> bool {
        let (selector, positions) = self.locate(data);
        let sub = &self.sub_filters[selector];
        positions.into_iter().all(|pos| sub.is_set(pos))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mark_then_check_is_always_true() {
        // spec.md §8 invariant 4.
        let mut b = Bloom::new(None);
        for i in 0..500u32 {
            let data = i.to_le_bytes();
            b.mark(&data);
            assert!(b.check(&data), "check failed right after mark for {i}");
        }
    }

    #[test]
    fn absence_is_exact_for_a_sparse_filter() {
        let mut b = Bloom::new(Some(BloomConfig {
            top_block_bits: 4,
            min_filter_bits: 1 << 12,
        }));
        b.mark(b"marked-value");
        assert!(!b.check(b"never-marked-value"));
    }

    #[test]
    fn small_config_still_rounds_up_to_one_word() {
        let b = Bloom::new(Some(BloomConfig {
            top_block_bits: 0,
            min_filter_bits: 1,
        }));
        assert_eq!(b.sub_filters.len(), 1);
        assert!(b.sub_filters[0].bits >= 64);
    }
}
