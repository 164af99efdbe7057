//! Booster multisets as combinations-with-replacement over catalog indices.
//!
//! The sequence is lexicographic with non-decreasing indices, e.g. for three
//! variants and two slots: `[0,0] [0,1] [0,2] [1,1] [1,2] [2,2]`. Every
//! position in that sequence has a rank, and [`Combinations::range`] starts
//! directly at any rank, so chunks can be evaluated independently without
//! ever materializing the whole space.

use std::ops::Range;

/// Number of multisets of size `slots` drawn from `variants` values:
/// `C(variants + slots - 1, slots)`. `None` on overflow.
pub fn multiset_count(variants: usize, slots: usize) -> Option<u64> {
    if slots == 0 {
        return Some(1);
    }
    if variants == 0 {
        return Some(0);
    }

    // After step i the accumulator holds C(variants - 1 + i, i), always exact.
    let mut count: u128 = 1;
    for i in 1..=slots as u128 {
        count = count.checked_mul(variants as u128 - 1 + i)? / i;
    }
    u64::try_from(count).ok()
}

/// Total candidates: booster multisets times generator variants.
pub fn candidate_count(variants: usize, slots: usize, generators: usize) -> Option<u64> {
    multiset_count(variants, slots)?.checked_mul(generators as u64)
}

/// Combination at position `rank` of the lexicographic sequence.
pub fn unrank(variants: usize, slots: usize, mut rank: u64) -> Option<Vec<usize>> {
    if rank >= multiset_count(variants, slots)? {
        return None;
    }

    let mut combination = Vec::with_capacity(slots);
    let mut low = 0;
    for position in 0..slots {
        let rest = slots - position - 1;
        let mut value = low;
        loop {
            // Multisets that keep `value` here and fill the rest from [value, variants).
            let block = multiset_count(variants - value, rest)?;
            if rank < block {
                break;
            }
            rank -= block;
            value += 1;
        }
        combination.push(value);
        low = value;
    }
    Some(combination)
}

/// Contiguous rank ranges of at most `chunk_size` combinations.
pub fn chunk_ranges(total: u64, chunk_size: u64) -> Vec<Range<u64>> {
    let chunk_size = chunk_size.max(1);
    (0..total.div_ceil(chunk_size))
        .map(|chunk| {
            let start = chunk * chunk_size;
            start..(start + chunk_size).min(total)
        })
        .collect()
}

/// Restartable cursor over a contiguous rank range.
///
/// [`Combinations::next_slice`] lends the current combination without
/// allocating; the [`Iterator`] impl copies it into a `Vec`.
#[derive(Clone, Debug)]
pub struct Combinations {
    variants: usize,
    current: Vec<usize>,
    remaining: u64,
    started: bool,
}

impl Combinations {
    /// The full sequence.
    pub fn new(variants: usize, slots: usize) -> Option<Self> {
        Self::range(variants, slots, 0..multiset_count(variants, slots)?)
    }

    /// Ranks in `ranks`, clamped to the size of the space.
    pub fn range(variants: usize, slots: usize, ranks: Range<u64>) -> Option<Self> {
        let total = multiset_count(variants, slots)?;
        let end = ranks.end.min(total);
        if ranks.start >= end {
            return Some(Self {
                variants,
                current: Vec::new(),
                remaining: 0,
                started: false,
            });
        }
        Some(Self {
            variants,
            current: unrank(variants, slots, ranks.start)?,
            remaining: end - ranks.start,
            started: false,
        })
    }

    pub fn remaining(&self) -> u64 {
        self.remaining
    }

    pub fn next_slice(&mut self) -> Option<&[usize]> {
        if self.remaining == 0 {
            return None;
        }
        if self.started {
            self.advance();
        }
        self.started = true;
        self.remaining -= 1;
        Some(&self.current)
    }

    fn advance(&mut self) {
        let last = self.variants - 1;
        if let Some(pivot) = self.current.iter().rposition(|&value| value < last) {
            let value = self.current[pivot] + 1;
            for slot in &mut self.current[pivot..] {
                *slot = value;
            }
        }
    }
}

impl Iterator for Combinations {
    type Item = Vec<usize>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_slice().map(<[usize]>::to_vec)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        match usize::try_from(self.remaining) {
            Ok(n) => (n, Some(n)),
            Err(_) => (usize::MAX, None),
        }
    }
}
