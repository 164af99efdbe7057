//! Stacking rules for boosters and generators.
//!
//! Resistances are tracked as *remaining vulnerability* fractions: 1.0 means
//! the full damage lands, 0.4 means 60% resistance. Percentages only appear
//! at the presentation boundary.

use crate::catalog::{BoosterVariant, LoadoutBase};

/// Stacked booster modifiers below this value only count half.
pub const DIMINISHING_RETURNS_THRESHOLD: f64 = 0.7;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BoosterModifiers {
    pub explosive: f64,
    pub kinetic: f64,
    pub thermal: f64,
    /// Multiplier on the generator's shield strength.
    pub hitpoint_bonus: f64,
}

impl BoosterModifiers {
    pub const NEUTRAL: Self = Self {
        explosive: 1.0,
        kinetic: 1.0,
        thermal: 1.0,
        hitpoint_bonus: 1.0,
    };
}

impl Default for BoosterModifiers {
    fn default() -> Self {
        Self::NEUTRAL
    }
}

/// Soft cap for a fully accumulated modifier.
pub fn diminish(modifier: f64) -> f64 {
    if modifier < DIMINISHING_RETURNS_THRESHOLD {
        DIMINISHING_RETURNS_THRESHOLD - (DIMINISHING_RETURNS_THRESHOLD - modifier) / 2.0
    } else {
        modifier
    }
}

/// Resistance bonuses stack multiplicatively, hitpoint bonuses additively.
/// The diminishing-returns cap is applied once, after every booster is in.
pub fn combine_boosters<'a, I>(boosters: I) -> BoosterModifiers
where
    I: IntoIterator<Item = &'a BoosterVariant>,
{
    let mut mods = BoosterModifiers::NEUTRAL;
    for booster in boosters {
        mods.explosive *= 1.0 - booster.exp_res_bonus;
        mods.kinetic *= 1.0 - booster.kin_res_bonus;
        mods.thermal *= 1.0 - booster.therm_res_bonus;
        mods.hitpoint_bonus += booster.shield_strength_bonus;
    }

    BoosterModifiers {
        explosive: diminish(mods.explosive),
        kinetic: diminish(mods.kinetic),
        thermal: diminish(mods.thermal),
        hitpoint_bonus: mods.hitpoint_bonus,
    }
}

/// Same as [`combine_boosters`] for a multiset given as catalog indices.
pub fn combine_booster_indices(variants: &[BoosterVariant], indices: &[usize]) -> BoosterModifiers {
    combine_boosters(indices.iter().map(|&index| &variants[index]))
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ShieldStats {
    pub explosive_vulnerability: f64,
    pub kinetic_vulnerability: f64,
    pub thermal_vulnerability: f64,
    /// Generator and booster hitpoints only; flat pools are added by the
    /// evaluator.
    pub hitpoints: f64,
    pub regen: f64,
}

impl ShieldStats {
    pub fn explosive_resistance_pct(&self) -> f64 {
        vulnerability_to_pct(self.explosive_vulnerability)
    }

    pub fn kinetic_resistance_pct(&self) -> f64 {
        vulnerability_to_pct(self.kinetic_vulnerability)
    }

    pub fn thermal_resistance_pct(&self) -> f64 {
        vulnerability_to_pct(self.thermal_vulnerability)
    }
}

pub fn vulnerability_to_pct(vulnerability: f64) -> f64 {
    (1.0 - vulnerability) * 100.0
}

pub fn apply_generator(loadout: &LoadoutBase, mods: &BoosterModifiers) -> ShieldStats {
    let generator = &loadout.generator;
    ShieldStats {
        explosive_vulnerability: (1.0 - generator.explres) * mods.explosive,
        kinetic_vulnerability: (1.0 - generator.kinres) * mods.kinetic,
        thermal_vulnerability: (1.0 - generator.thermres) * mods.thermal,
        hitpoints: loadout.shield_strength * mods.hitpoint_bonus,
        regen: generator.regen,
    }
}
