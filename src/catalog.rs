//! Equipment catalog: ships, shield booster variants and shield generator
//! variants.
//!
//! Records are built once (from the JSON data file or in code) and never
//! mutated afterwards. A [`Catalog`] is passed explicitly to whatever needs
//! it; there is no process-wide cache.

use crate::config::{TestCase, TestSettings};
use crate::error::{CatalogError, ConfigError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

/// Hard upper bound on utility mounts any ship offers.
pub const MAX_BOOSTER_SLOTS: usize = 8;

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct BoosterVariant {
    pub engineering: String,
    pub experimental: String,
    pub shield_strength_bonus: f64,
    pub exp_res_bonus: f64,
    pub kin_res_bonus: f64,
    pub therm_res_bonus: f64,
    /// Excluded from the short list.
    #[serde(default)]
    pub can_skip: bool,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum GeneratorKind {
    #[default]
    Normal,
    BiWeave,
    Prismatic,
}

impl GeneratorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Normal => "normal",
            Self::BiWeave => "bi-weave",
            Self::Prismatic => "prismatic",
        }
    }

    pub fn from_key(key: &str) -> Result<Self, CatalogError> {
        match key {
            "normal" => Ok(Self::Normal),
            "bi-weave" => Ok(Self::BiWeave),
            "prismatic" => Ok(Self::Prismatic),
            other => Err(CatalogError::UnknownGeneratorKind(other.to_string())),
        }
    }
}

fn not_engineered() -> String {
    "not engineered".to_string()
}

fn no_experimental() -> String {
    "no experimental effect".to_string()
}

/// A shield generator module, either stock or with one blueprint and one
/// experimental effect applied.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ShieldGenerator {
    pub symbol: String,
    pub name: String,
    #[serde(rename = "class")]
    pub module_class: u8,
    /// Filled from the section of the data file the module was listed under.
    #[serde(skip_deserializing)]
    pub kind: GeneratorKind,
    pub integrity: f64,
    pub power: f64,
    pub explres: f64,
    pub kinres: f64,
    pub thermres: f64,
    pub regen: f64,
    pub brokenregen: f64,
    pub distdraw: f64,
    pub minmass: f64,
    pub optmass: f64,
    pub maxmass: f64,
    pub minmul: f64,
    pub optmul: f64,
    pub maxmul: f64,
    #[serde(default = "not_engineered")]
    pub engineered_name: String,
    #[serde(default = "no_experimental")]
    pub experimental_name: String,
}

/// A blueprint or experimental effect: a named set of feature deltas.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Modification {
    pub symbol: String,
    pub name: String,
    #[serde(default)]
    pub features: BTreeMap<String, f64>,
}

#[derive(Clone, Copy, Debug)]
enum FeatureRule {
    Scale,
    Multiplier,
    Resistance,
}

fn round4(value: f64) -> f64 {
    (value * 10_000.0).round() / 10_000.0
}

fn apply_feature(
    current: f64,
    features: &BTreeMap<String, f64>,
    key: &str,
    rule: FeatureRule,
    percentage: bool,
) -> f64 {
    let Some(&delta) = features.get(key) else {
        return current;
    };
    let next = match rule {
        FeatureRule::Scale => current * (1.0 + delta),
        FeatureRule::Multiplier => (current * 100.0) * (1.0 + delta) / 100.0,
        FeatureRule::Resistance => {
            let delta = if percentage { delta / 100.0 } else { delta };
            1.0 - (1.0 - current) * (1.0 - delta)
        }
    };
    round4(next)
}

impl ShieldGenerator {
    fn apply_engineering(&mut self, features: &BTreeMap<String, f64>, percentage: bool) {
        use FeatureRule::*;

        self.integrity = apply_feature(self.integrity, features, "integrity", Scale, percentage);
        self.brokenregen =
            apply_feature(self.brokenregen, features, "brokenregen", Scale, percentage);
        self.regen = apply_feature(self.regen, features, "regen", Scale, percentage);
        self.distdraw = apply_feature(self.distdraw, features, "distdraw", Scale, percentage);
        self.power = apply_feature(self.power, features, "power", Scale, percentage);

        // The whole strength curve moves with the optimal multiplier.
        self.optmul = apply_feature(self.optmul, features, "optmul", Multiplier, percentage);
        self.minmul = apply_feature(self.minmul, features, "optmul", Multiplier, percentage);
        self.maxmul = apply_feature(self.maxmul, features, "optmul", Multiplier, percentage);

        self.kinres = apply_feature(self.kinres, features, "kinres", Resistance, percentage);
        self.thermres = apply_feature(self.thermres, features, "thermres", Resistance, percentage);
        self.explres = apply_feature(self.explres, features, "explres", Resistance, percentage);
    }

    /// Every blueprint × experimental combination of this (stock) module.
    pub fn engineered_variants(
        &self,
        blueprints: &[Modification],
        experimentals: &[Modification],
    ) -> Vec<ShieldGenerator> {
        if blueprints.is_empty() && experimentals.is_empty() {
            return vec![self.clone()];
        }

        let mut variants = Vec::with_capacity(blueprints.len() * experimentals.len());
        for blueprint in blueprints {
            let mut engineered = self.clone();
            engineered.engineered_name = blueprint.name.clone();
            engineered.apply_engineering(&blueprint.features, false);
            for experimental in experimentals {
                let mut variant = engineered.clone();
                variant.experimental_name = experimental.name.clone();
                variant.apply_engineering(&experimental.features, true);
                variants.push(variant);
            }
        }
        variants
    }

    /// Shield strength of this generator fitted to `ship`, following the
    /// mass curve between `minmass` and `maxmass`. Hulls outside that range
    /// get the multiplier of the nearest end.
    pub fn shield_strength(&self, ship: &Ship) -> f64 {
        let mass_range = self.maxmass - self.minmass;
        let xnorm = ((self.maxmass - ship.hull_mass) / mass_range).clamp(0.0, 1.0);
        let exponent = ((self.optmul - self.minmul) / (self.maxmul - self.minmul)).ln()
            / ((self.maxmass - self.optmass) / mass_range).min(1.0).ln();
        let ynorm = xnorm.powf(exponent);
        let multiplier = self.minmul + ynorm * (self.maxmul - self.minmul);
        round4(ship.base_shield_strength * multiplier)
    }

    /// Whether a hull of this mass is within the generator's rated range.
    pub fn supports_hull(&self, ship: &Ship) -> bool {
        ship.hull_mass <= self.maxmass
    }

    pub fn display_name(&self) -> String {
        format!(
            "[{}] - [{}] - [{}]",
            self.name, self.engineered_name, self.experimental_name
        )
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Ship {
    #[serde(rename = "ship")]
    pub name: String,
    pub symbol: String,
    #[serde(rename = "baseShieldStrength")]
    pub base_shield_strength: f64,
    #[serde(rename = "hullMass")]
    pub hull_mass: f64,
    pub utility_slots: usize,
    pub highest_internal: u8,
}

/// A generator variant resolved against one ship. The shield strength only
/// depends on the ship's hull mass, so it is computed once and reused for
/// every booster combination.
#[derive(Clone, Debug, PartialEq)]
pub struct LoadoutBase {
    pub generator: ShieldGenerator,
    pub shield_strength: f64,
}

impl LoadoutBase {
    pub fn new(generator: ShieldGenerator, ship: &Ship) -> Self {
        let shield_strength = generator.shield_strength(ship);
        Self {
            generator,
            shield_strength,
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawEngineering {
    #[serde(default)]
    blueprints: Vec<Modification>,
    #[serde(default)]
    experimental_effects: Vec<Modification>,
}

#[derive(Debug, Deserialize)]
struct RawGenerators {
    modules: BTreeMap<String, Vec<ShieldGenerator>>,
    engineering: RawEngineering,
}

#[derive(Debug, Deserialize)]
struct RawCatalog {
    ships: Vec<Ship>,
    shield_booster_variants: Vec<BoosterVariant>,
    shield_generators: RawGenerators,
}

#[derive(Clone, Debug, Default)]
pub struct Catalog {
    ships: Vec<Ship>,
    booster_variants: Vec<BoosterVariant>,
    generators: BTreeMap<GeneratorKind, BTreeMap<u8, Vec<ShieldGenerator>>>,
    stock_generators: BTreeMap<String, ShieldGenerator>,
}

impl Catalog {
    pub fn new(ships: Vec<Ship>, booster_variants: Vec<BoosterVariant>) -> Self {
        Self {
            ships,
            booster_variants,
            ..Self::default()
        }
    }

    pub fn load(path: &Path) -> Result<Self, CatalogError> {
        let raw = fs::read_to_string(path).map_err(|source| CatalogError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json(&raw)
    }

    pub fn from_json(raw: &str) -> Result<Self, CatalogError> {
        let data: RawCatalog = serde_json::from_str(raw)?;
        let mut catalog = Self::new(data.ships, data.shield_booster_variants);
        let engineering = &data.shield_generators.engineering;

        for (key, modules) in data.shield_generators.modules {
            let kind = GeneratorKind::from_key(&key)?;
            for mut module in modules {
                module.kind = kind;
                catalog.add_generator_module(
                    module,
                    &engineering.blueprints,
                    &engineering.experimental_effects,
                );
            }
        }

        tracing::debug!(
            ships = catalog.ships.len(),
            booster_variants = catalog.booster_variants.len(),
            generator_variants = catalog.generator_variant_count(),
            "catalog loaded"
        );
        Ok(catalog)
    }

    /// Registers a stock module and all of its engineered variants.
    pub fn add_generator_module(
        &mut self,
        module: ShieldGenerator,
        blueprints: &[Modification],
        experimentals: &[Modification],
    ) {
        let variants = module.engineered_variants(blueprints, experimentals);
        self.generators
            .entry(module.kind)
            .or_default()
            .entry(module.module_class)
            .or_default()
            .extend(variants);
        self.stock_generators
            .entry(module.symbol.clone())
            .or_insert(module);
    }

    pub fn ships(&self) -> &[Ship] {
        &self.ships
    }

    pub fn ship(&self, name: &str) -> Option<&Ship> {
        self.ships.iter().find(|ship| ship.name == name)
    }

    pub fn booster_variants(&self) -> &[BoosterVariant] {
        &self.booster_variants
    }

    pub fn generator_variant_count(&self) -> usize {
        self.generators
            .values()
            .flat_map(|by_class| by_class.values())
            .map(Vec::len)
            .sum()
    }

    /// The unengineered module a variant was derived from.
    pub fn stock_generator(&self, symbol: &str) -> Option<&ShieldGenerator> {
        self.stock_generators.get(symbol)
    }

    pub fn boosters_to_test(&self, short_list: bool) -> Vec<BoosterVariant> {
        self.booster_variants
            .iter()
            .filter(|booster| !(short_list && booster.can_skip))
            .cloned()
            .collect()
    }

    /// Bi-weave first, then normal, then prismatic when allowed.
    pub fn generators_to_test(&self, module_class: u8, use_prismatics: bool) -> Vec<&ShieldGenerator> {
        let mut kinds = vec![GeneratorKind::BiWeave, GeneratorKind::Normal];
        if use_prismatics {
            kinds.push(GeneratorKind::Prismatic);
        }
        kinds
            .into_iter()
            .filter_map(|kind| self.generators.get(&kind))
            .filter_map(|by_class| by_class.get(&module_class))
            .flatten()
            .collect()
    }

    pub fn test_case(&self, ship_name: &str, settings: &TestSettings) -> Result<TestCase, ConfigError> {
        let ship = self.ship(ship_name).ok_or_else(|| ConfigError::UnknownShip {
            name: ship_name.to_string(),
        })?;
        let loadouts = self
            .generators_to_test(ship.highest_internal, settings.use_prismatics)
            .into_iter()
            // Too heavy a hull cannot fit the generator at all.
            .filter(|generator| generator.supports_hull(ship))
            .map(|generator| LoadoutBase::new(generator.clone(), ship))
            .collect();
        TestCase::new(
            ship.clone(),
            settings,
            self.boosters_to_test(settings.short_list),
            loadouts,
        )
    }
}
