//! Survival time of a single candidate, and the per-chunk evaluation loop.

use std::ops::Range;

use crate::combinations::Combinations;
use crate::config::TestCase;
use crate::stats::{apply_generator, combine_booster_indices, ShieldStats};

/// Booster multiset (non-decreasing catalog indices) plus one loadout.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Candidate {
    pub boosters: Vec<usize>,
    pub loadout: usize,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Evaluation {
    /// Seconds until the shield is down. Zero or negative when net damage is
    /// not positive and the shield never depletes.
    pub survival_time: f64,
    pub actual_dps: f64,
    pub candidate: Candidate,
}

impl Evaluation {
    pub fn never_dies(&self) -> bool {
        self.actual_dps <= 0.0
    }

    /// Whether a result with `survival_time`/`actual_dps` should replace
    /// `self` as the best one seen so far. Exact ties keep `self`.
    ///
    /// Among never-dies results the *smaller* survival time wins; this
    /// comparison of negative times is kept as-is.
    pub fn is_beaten_by(&self, survival_time: f64, actual_dps: f64) -> bool {
        if self.never_dies() {
            survival_time < self.survival_time
        } else if actual_dps <= 0.0 {
            true
        } else {
            survival_time > self.survival_time
        }
    }
}

/// Net damage per second actually eaten by the shield. Regeneration only
/// happens in the share of time the shield is not under fire.
pub fn actual_dps(test_case: &TestCase, stats: &ShieldStats) -> f64 {
    let effectiveness = test_case.damage_effectiveness;
    let damage = &test_case.damage;
    effectiveness
        * (damage.explosive * stats.explosive_vulnerability
            + damage.kinetic * stats.kinetic_vulnerability
            + damage.thermal * stats.thermal_vulnerability
            + damage.absolute)
        - stats.regen * (1.0 - effectiveness)
}

/// `hitpoints / actual_dps`, with exactly zero damage mapped to `0.0`
/// ("never depletes") instead of an infinity.
pub fn survival_time(hitpoints: f64, actual_dps: f64) -> f64 {
    if actual_dps == 0.0 {
        0.0
    } else {
        hitpoints / actual_dps
    }
}

/// `(survival_time, actual_dps)` for already-combined stats.
pub fn score(test_case: &TestCase, stats: &ShieldStats) -> (f64, f64) {
    let dps = actual_dps(test_case, stats);
    (survival_time(stats.hitpoints + test_case.flat_pool(), dps), dps)
}

pub fn shield_stats(test_case: &TestCase, candidate: &Candidate) -> ShieldStats {
    let mods = combine_booster_indices(&test_case.booster_variants, &candidate.boosters);
    apply_generator(&test_case.loadouts[candidate.loadout], &mods)
}

pub fn evaluate(test_case: &TestCase, candidate: &Candidate) -> Evaluation {
    let (survival_time, actual_dps) = score(test_case, &shield_stats(test_case, candidate));
    Evaluation {
        survival_time,
        actual_dps,
        candidate: candidate.clone(),
    }
}

/// Best result of one contiguous rank range of booster combinations, each
/// tried against every loadout of the test case.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ChunkResult {
    pub best: Option<Evaluation>,
    pub tested: u64,
}

impl ChunkResult {
    fn offer(&mut self, survival_time: f64, actual_dps: f64, boosters: &[usize], loadout: usize) {
        if survival_time.is_nan() || actual_dps.is_nan() {
            return;
        }
        let replace = match &self.best {
            None => true,
            Some(best) => best.is_beaten_by(survival_time, actual_dps),
        };
        if replace {
            self.best = Some(Evaluation {
                survival_time,
                actual_dps,
                candidate: Candidate {
                    boosters: boosters.to_vec(),
                    loadout,
                },
            });
        }
    }

    /// Folds a later result into this one. `self` must cover the earlier
    /// part of the candidate sequence so ties keep the first-seen winner.
    pub fn merge(mut self, later: ChunkResult) -> ChunkResult {
        self.tested += later.tested;
        if let Some(other) = later.best {
            let candidate = other.candidate;
            self.offer(
                other.survival_time,
                other.actual_dps,
                &candidate.boosters,
                candidate.loadout,
            );
        }
        self
    }
}

/// Evaluates every candidate whose booster combination rank is in `ranks`.
pub fn evaluate_range(test_case: &TestCase, ranks: Range<u64>) -> ChunkResult {
    let mut result = ChunkResult::default();
    let Some(mut combinations) = Combinations::range(
        test_case.booster_variants.len(),
        test_case.booster_slots,
        ranks,
    ) else {
        return result;
    };

    while let Some(boosters) = combinations.next_slice() {
        // Booster stacking is shared by every loadout.
        let mods = combine_booster_indices(&test_case.booster_variants, boosters);
        for (index, loadout) in test_case.loadouts.iter().enumerate() {
            let (time, dps) = score(test_case, &apply_generator(loadout, &mods));
            result.offer(time, dps, boosters, index);
        }
        result.tested += test_case.loadouts.len() as u64;
    }
    result
}
