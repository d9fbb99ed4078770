//! Replayable record of every bit request: the substrate autoshrinking
//! mutates instead of mutating generated values directly.
//!
//! Grounded on spec.md §3/§4.5 and on how `original_source/src/random.c`'s
//! `fuzz_random_bits_bulk` packs bits, generalized from "always read from
//! the live PRNG" to "read from a buffer that was either just recorded, or
//! recorded in a previous generation and is now being replayed, possibly
//! with a smaller `limit` or mutated request values."

use crate::bits::BitSource;
use crate::error::{EngineError, EngineResult};

/// Default cap on the number of bit requests a single pool will record,
/// guarding against unbounded growth from a runaway generator.
pub const DEFAULT_REQUEST_CEILING: usize = 1 << 16;

fn words_for_bits(bits: u64) -> usize {
    ((bits + 63) / 64) as usize
}

fn get_bits(raw: &[u64], offset: u64, width: u8) -> u64 {
    if width == 0 {
        return 0;
    }
    let word = (offset / 64) as usize;
    let bit = (offset % 64) as u32;
    let lo = raw.get(word).copied().unwrap_or(0) >> bit;
    let hi = if bit == 0 {
        0
    } else {
        raw.get(word + 1).copied().unwrap_or(0) << (64 - bit)
    };
    let combined = lo | hi;
    if width >= 64 {
        combined
    } else {
        combined & ((1u64 << width) - 1)
    }
}

fn set_bits(raw: &mut Vec<u64>, offset: u64, width: u8, value: u64) {
    if width == 0 {
        return;
    }
    let needed = words_for_bits(offset + u64::from(width));
    if raw.len() < needed {
        raw.resize(needed, 0);
    }
    let value = if width >= 64 {
        value
    } else {
        value & ((1u64 << width) - 1)
    };
    let word = (offset / 64) as usize;
    let bit = (offset % 64) as u32;
    raw[word] |= value << bit;
    if bit != 0 && width as u32 > 64 - bit {
        raw[word + 1] |= value >> (64 - bit);
    }
}

/// Whether a [`BitPool`] is currently being filled from the PRNG, or is
/// being replayed (possibly after mutation) to re-decode a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Generation: every request also draws from the live PRNG.
    Record,
    /// Re-generation: every request reads from the recorded buffer.
    Replay,
}

/// An append-only record of bits drawn during one generation, plus the
/// per-request width log needed to validate and mutate it (spec.md §3).
#[derive(Debug, Clone)]
pub struct BitPool {
    raw: Vec<u64>,
    bits_filled: u64,
    consumed: u64,
    requests: Vec<u8>,
    request_ceil: usize,
    limit: Option<u64>,
    mode: Mode,
    /// Set once a replay request's width disagrees with the recorded
    /// width, or runs past `limit`; from then on every further read in
    /// this replay pass returns zero (spec.md §3's pool degradation rule).
    degraded: bool,
    replay_cursor: usize,
    /// Lazily-built prefix sum of request widths, in bits, used to locate
    /// the bit range owned by a given request index during mutation.
    offsets: Option<Vec<u64>>,
}

impl BitPool {
    /// Creates an empty pool in recording mode.
    pub fn new() -> Self {
        Self::with_ceiling(DEFAULT_REQUEST_CEILING)
    }

    /// Creates an empty pool with a custom request-count ceiling.
    pub fn with_ceiling(request_ceil: usize) -> Self {
        BitPool {
            raw: Vec::new(),
            bits_filled: 0,
            consumed: 0,
            requests: Vec::new(),
            request_ceil,
            limit: None,
            mode: Mode::Record,
            degraded: false,
            replay_cursor: 0,
            offsets: None,
        }
    }

    /// Number of requests recorded (or being replayed).
    pub fn request_count(&self) -> usize {
        self.requests.len()
    }

    /// Total valid bits recorded.
    pub fn bits_filled(&self) -> u64 {
        self.bits_filled
    }

    /// The request-width log, in order.
    pub fn requests(&self) -> &[u8] {
        &self.requests
    }

    /// Current truncation point, if shrinking has set one.
    pub fn limit(&self) -> Option<u64> {
        self.limit
    }

    fn effective_limit(&self) -> u64 {
        self.limit.unwrap_or(self.bits_filled).min(self.bits_filled)
    }

    /// Services one bit request, recording or replaying depending on
    /// [`Mode`]. `prng` is consulted only in [`Mode::Record`] — the
    /// "pluggable PRNG hook" spec.md §4.5 describes, normally the run's
    /// PRNG but overridable for deterministic testing.
    pub fn next(&mut self, prng: &mut dyn BitSource, width: u8) -> u64 {
        assert!((1..=64).contains(&width), "bit width out of range: {width}");
        match self.mode {
            Mode::Record => self.record(prng, width),
            Mode::Replay => self.replay(width),
        }
    }

    fn record(&mut self, prng: &mut dyn BitSource, width: u8) -> u64 {
        let value = prng.bits(width);
        let offset = self.bits_filled;
        set_bits(&mut self.raw, offset, width, value);
        self.bits_filled += u64::from(width);
        self.requests.push(width);
        self.offsets = None;
        value
    }

    fn replay(&mut self, width: u8) -> u64 {
        let idx = self.replay_cursor;
        self.replay_cursor += 1;

        if self.degraded {
            return 0;
        }
        let recorded_width = match self.requests.get(idx) {
            Some(w) => *w,
            None => {
                self.degraded = true;
                return 0;
            }
        };
        if recorded_width != width {
            self.degraded = true;
            return 0;
        }

        let offsets = self.ensure_offsets();
        let offset = offsets[idx];
        let limit = self.effective_limit();
        if offset + u64::from(width) > limit {
            self.degraded = true;
            return 0;
        }
        get_bits(&self.raw, offset, width)
    }

    /// Rewinds the replay cursor to the start without discarding the
    /// recorded buffer; used to re-decode the same pool repeatedly.
    pub fn rewind(&mut self) {
        self.consumed = 0;
        self.replay_cursor = 0;
        self.degraded = false;
    }

    /// Switches a freshly-recorded pool into replay mode, ready to be
    /// re-decoded (or mutated and then re-decoded) from the start.
    pub fn seal_for_replay(&mut self) {
        self.mode = Mode::Replay;
        self.rewind();
    }

    fn ensure_offsets(&mut self) -> &[u64] {
        if self.offsets.is_none() {
            let mut offs = Vec::with_capacity(self.requests.len());
            let mut acc = 0u64;
            for &w in &self.requests {
                offs.push(acc);
                acc += u64::from(w);
            }
            self.offsets = Some(offs);
        }
        self.offsets.as_deref().unwrap()
    }

    /// Bit range `[start, start+width)` owned by request `idx`, if it
    /// exists.
    pub fn request_bit_range(&mut self, idx: usize) -> Option<(u64, u8)> {
        let width = *self.requests.get(idx)?;
        let offsets = self.ensure_offsets();
        Some((offsets[idx], width))
    }

    /// Reads the current value of request `idx` without affecting the
    /// replay cursor.
    pub fn request_value(&mut self, idx: usize) -> Option<u64> {
        let (offset, width) = self.request_bit_range(idx)?;
        Some(get_bits(&self.raw, offset, width))
    }

    /// Overwrites the value of request `idx` in place (its width is
    /// unchanged). Used by the SHIFT/MASK/SUB/SWAP tactics.
    pub fn set_request_value(&mut self, idx: usize, value: u64) {
        if let Some((offset, width)) = self.request_bit_range(idx) {
            // Clear the existing bits before OR-ing in the new value so a
            // shrink toward zero actually clears bits instead of only
            // ever setting new ones.
            let word = (offset / 64) as usize;
            let bit = (offset % 64) as u32;
            let clear_mask = if width >= 64 {
                u64::MAX
            } else {
                (1u64 << width) - 1
            };
            if word < self.raw.len() {
                self.raw[word] &= !(clear_mask << bit);
            }
            if bit != 0 && width as u32 > 64 - bit && word + 1 < self.raw.len() {
                self.raw[word + 1] &= !(clear_mask >> (64 - bit));
            }
            set_bits(&mut self.raw, offset, width, value);
        }
    }

    /// Removes requests `start..end` from the log, compacting the
    /// remaining requests' bits down to fill the gap. Used by DROP.
    pub fn drop_requests(&mut self, start: usize, end: usize) {
        let end = end.min(self.requests.len());
        if start >= end {
            return;
        }
        let offsets = self.ensure_offsets().to_vec();
        let remaining: Vec<(u8, u64)> = self
            .requests
            .iter()
            .enumerate()
            .filter(|(i, _)| *i < start || *i >= end)
            .map(|(i, &w)| (w, get_bits(&self.raw, offsets[i], w)))
            .collect();

        self.raw.clear();
        self.requests.clear();
        self.bits_filled = 0;
        self.offsets = None;
        for (w, v) in remaining {
            let offset = self.bits_filled;
            set_bits(&mut self.raw, offset, w, v);
            self.bits_filled += u64::from(w);
            self.requests.push(w);
        }
    }

    /// Truncates trailing all-zero bits, reducing `bits_filled` to just
    /// past the last set bit (spec.md §4.5 step 5, DROP's fallback
    /// behavior). A no-op if `leave_trailing_zeroes` policy is honored by
    /// the caller choosing not to call this.
    pub fn truncate_trailing_zeroes(&mut self) {
        let mut last_one = None;
        for bit in (0..self.bits_filled).rev() {
            if get_bits(&self.raw, bit, 1) != 0 {
                last_one = Some(bit);
                break;
            }
        }
        self.bits_filled = match last_one {
            Some(bit) => bit + 1,
            None => 0,
        };
        self.limit = Some(self.bits_filled);
    }

    /// Sets the truncation point used during replay; reads past `limit`
    /// behave as if they ran off the end of the pool.
    pub fn set_limit(&mut self, limit: u64) {
        self.limit = Some(limit.min(self.bits_filled));
    }

    /// Computes a fingerprint over the recorded bits and request log,
    /// used for deduplication when an argument is autoshrink-enabled
    /// (spec.md §4.8: "the pool's hash for autoshrink slots").
    pub fn hash(&self) -> u64 {
        let mut h = crate::hash::Hasher::new();
        h.sink(&self.bits_filled.to_le_bytes());
        for word in &self.raw {
            h.sink(&word.to_le_bytes());
        }
        for &w in &self.requests {
            h.sink(&[w]);
        }
        h.finish()
    }

    /// Guards against pathological generators that would make the request
    /// log grow without bound.
    pub fn check_capacity(&self) -> EngineResult<()> {
        if self.requests.len() >= self.request_ceil {
            return Err(EngineError::Memory("bit pool request log exceeded its ceiling"));
        }
        Ok(())
    }
}

impl Default for BitPool {
    fn default() -> Self {
        Self::new()
    }
}

/// Adapter letting a [`BitPool`] in [`Mode::Record`] double as a
/// [`BitSource`] driven by a buffered PRNG, so existing generator code that
/// only knows about [`BitSource`] can record into a pool transparently.
pub struct Recording<'a> {
    pub pool: &'a mut BitPool,
    pub prng: &'a mut crate::bits::PrngBuffer,
}

impl BitSource for Recording<'_> {
    fn bits(&mut self, n: u8) -> u64 {
        self.pool.next(self.prng, n)
    }
}

/// Adapter letting a [`BitPool`] in [`Mode::Replay`] double as a
/// [`BitSource`] for re-decoding a value from a (possibly mutated) pool.
/// The PRNG argument `next` requires is never consulted in replay mode.
pub struct Replaying<'a> {
    pub pool: &'a mut BitPool,
}

struct NoPrng;

impl BitSource for NoPrng {
    fn bits(&mut self, _n: u8) -> u64 {
        0
    }
}

impl BitSource for Replaying<'_> {
    fn bits(&mut self, n: u8) -> u64 {
        self.pool.next(&mut NoPrng, n)
    }
}
