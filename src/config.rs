use std::env;

use serde::{Deserialize, Serialize};

use crate::catalog::{BoosterVariant, LoadoutBase, Ship, MAX_BOOSTER_SLOTS};
use crate::combinations::candidate_count;
use crate::error::ConfigError;

/// Booster combinations per chunk handed to one worker.
pub const DEFAULT_CHUNK_SIZE: usize = 10_000;

pub const JOBS_ENV: &str = "SHIELD_TESTER_JOBS";
pub const CHUNK_SIZE_ENV: &str = "SHIELD_TESTER_CHUNK_SIZE";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchOptions {
    /// Worker threads. `None` uses rayon's global pool, `Some(1)` runs the
    /// search serially on the calling thread.
    pub jobs: Option<usize>,
    pub chunk_size: usize,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            jobs: None,
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }
}

impl SearchOptions {
    pub fn from_env() -> Self {
        Self {
            jobs: read_env_optional_usize(JOBS_ENV),
            chunk_size: read_env_usize(CHUNK_SIZE_ENV, DEFAULT_CHUNK_SIZE),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.chunk_size == 0 {
            return Err(ConfigError::ChunkSize);
        }
        if self.jobs == Some(0) {
            return Err(ConfigError::Jobs);
        }
        Ok(())
    }
}

pub(crate) fn read_env_usize(name: &str, default: usize) -> usize {
    read_env_optional_usize(name).unwrap_or(default)
}

pub(crate) fn read_env_optional_usize(name: &str) -> Option<usize> {
    env::var(name)
        .ok()
        .and_then(|value| value.trim().parse::<usize>().ok())
        .filter(|value| *value > 0)
}

/// Incoming damage per second, by type. Absolute damage ignores resistances.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct DamageProfile {
    pub explosive: f64,
    pub kinetic: f64,
    pub thermal: f64,
    pub absolute: f64,
}

impl DamageProfile {
    pub fn total(&self) -> f64 {
        self.explosive + self.kinetic + self.thermal + self.absolute
    }
}

/// User-facing knobs for one test run, before the catalog is filtered.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TestSettings {
    pub damage: DamageProfile,
    /// Fraction of time the shield is under fire; the rest is spent
    /// regenerating.
    pub damage_effectiveness: f64,
    pub scb_hitpoints: f64,
    pub guardian_hitpoints: f64,
    /// Defaults to every utility slot of the ship.
    pub booster_slots: Option<usize>,
    pub short_list: bool,
    pub use_prismatics: bool,
}

impl Default for TestSettings {
    fn default() -> Self {
        Self {
            damage: DamageProfile {
                explosive: 0.0,
                kinetic: 50.0,
                thermal: 50.0,
                absolute: 0.0,
            },
            damage_effectiveness: 0.25,
            scb_hitpoints: 0.0,
            guardian_hitpoints: 0.0,
            booster_slots: None,
            short_list: true,
            use_prismatics: true,
        }
    }
}

/// A validated, self-contained run configuration: the ship, the damage
/// profile and the already-filtered equipment to combine.
#[derive(Clone, Debug, PartialEq)]
pub struct TestCase {
    pub ship: Ship,
    pub damage: DamageProfile,
    pub damage_effectiveness: f64,
    pub scb_hitpoints: f64,
    pub guardian_hitpoints: f64,
    pub booster_slots: usize,
    pub short_list: bool,
    pub use_prismatics: bool,
    pub booster_variants: Vec<BoosterVariant>,
    pub loadouts: Vec<LoadoutBase>,
}

fn non_negative(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(ConfigError::NegativeOrNonFinite { field, value })
    }
}

impl TestCase {
    pub fn new(
        ship: Ship,
        settings: &TestSettings,
        booster_variants: Vec<BoosterVariant>,
        loadouts: Vec<LoadoutBase>,
    ) -> Result<Self, ConfigError> {
        let effectiveness = settings.damage_effectiveness;
        if !(effectiveness > 0.0 && effectiveness <= 1.0) {
            return Err(ConfigError::Effectiveness(effectiveness));
        }
        non_negative("explosive dps", settings.damage.explosive)?;
        non_negative("kinetic dps", settings.damage.kinetic)?;
        non_negative("thermal dps", settings.damage.thermal)?;
        non_negative("absolute dps", settings.damage.absolute)?;
        non_negative("shield cell bank hitpoints", settings.scb_hitpoints)?;
        non_negative("guardian hitpoints", settings.guardian_hitpoints)?;

        if ship.utility_slots > MAX_BOOSTER_SLOTS {
            return Err(ConfigError::UtilitySlots(ship.utility_slots));
        }
        let booster_slots = settings.booster_slots.unwrap_or(ship.utility_slots);
        if booster_slots > ship.utility_slots {
            return Err(ConfigError::TooManySlots {
                slots: booster_slots,
                available: ship.utility_slots,
            });
        }

        Ok(Self {
            ship,
            damage: settings.damage,
            damage_effectiveness: effectiveness,
            scb_hitpoints: settings.scb_hitpoints,
            guardian_hitpoints: settings.guardian_hitpoints,
            booster_slots,
            short_list: settings.short_list,
            use_prismatics: settings.use_prismatics,
            booster_variants,
            loadouts,
        })
    }

    /// Hitpoints added on top of every loadout's shield.
    pub fn flat_pool(&self) -> f64 {
        self.scb_hitpoints + self.guardian_hitpoints
    }

    pub fn is_empty(&self) -> bool {
        self.booster_variants.is_empty() || self.loadouts.is_empty()
    }

    pub fn candidate_count(&self) -> Option<u64> {
        candidate_count(
            self.booster_variants.len(),
            self.booster_slots,
            self.loadouts.len(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::fixtures::{booster, ship};

    fn settings() -> TestSettings {
        TestSettings::default()
    }

    #[test]
    fn slots_default_to_ship_utility_slots() {
        let case = TestCase::new(ship(), &settings(), vec![], vec![]).unwrap();
        assert_eq!(case.booster_slots, 8);
        assert!(case.is_empty());
    }

    #[test]
    fn rejects_effectiveness_outside_unit_interval() {
        for bad in [0.0, -0.1, 1.01, f64::NAN] {
            let mut s = settings();
            s.damage_effectiveness = bad;
            let err = TestCase::new(ship(), &s, vec![], vec![]).unwrap_err();
            assert!(matches!(err, ConfigError::Effectiveness(_)), "value={bad}");
        }
        let mut s = settings();
        s.damage_effectiveness = 1.0;
        assert!(TestCase::new(ship(), &s, vec![], vec![]).is_ok());
    }

    #[test]
    fn rejects_more_slots_than_the_ship_has() {
        let mut small = ship();
        small.utility_slots = 2;
        let mut s = settings();
        s.booster_slots = Some(3);
        assert_eq!(
            TestCase::new(small, &s, vec![], vec![]).unwrap_err(),
            ConfigError::TooManySlots {
                slots: 3,
                available: 2
            }
        );
    }

    #[test]
    fn rejects_negative_damage_and_pools() {
        let mut s = settings();
        s.damage.thermal = -1.0;
        assert!(matches!(
            TestCase::new(ship(), &s, vec![], vec![]),
            Err(ConfigError::NegativeOrNonFinite { field: "thermal dps", .. })
        ));

        let mut s = settings();
        s.scb_hitpoints = f64::INFINITY;
        assert!(TestCase::new(ship(), &s, vec![], vec![]).is_err());
    }

    #[test]
    fn zero_slots_are_a_valid_configuration() {
        let mut s = settings();
        s.booster_slots = Some(0);
        let case = TestCase::new(ship(), &s, vec![booster(0.1, 0.1, 0.1, 0.1)], vec![]).unwrap();
        assert_eq!(case.booster_slots, 0);
        assert_eq!(case.candidate_count(), Some(0));
    }

    #[test]
    fn search_options_reject_zero_values() {
        let zero_chunk = SearchOptions {
            jobs: None,
            chunk_size: 0,
        };
        assert_eq!(zero_chunk.validate(), Err(ConfigError::ChunkSize));
        let zero_jobs = SearchOptions {
            jobs: Some(0),
            chunk_size: 1,
        };
        assert_eq!(zero_jobs.validate(), Err(ConfigError::Jobs));
        assert_eq!(SearchOptions::default().validate(), Ok(()));
    }

    #[test]
    fn env_values_fall_back_when_unusable() {
        let name = "SHIELD_TESTER_TEST_ENV_VALUE";
        env::set_var(name, " 12 ");
        assert_eq!(read_env_optional_usize(name), Some(12));
        env::set_var(name, "0");
        assert_eq!(read_env_usize(name, 7), 7);
        env::set_var(name, "lots");
        assert_eq!(read_env_optional_usize(name), None);
        env::remove_var(name);
        assert_eq!(read_env_usize(name, 3), 3);
    }
}
