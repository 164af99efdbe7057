//! Text blocks for the test setup and result, and the JSON summary written
//! by `run --output`.

use std::fmt::Write as _;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::config::{DamageProfile, SearchOptions, TestCase};
use crate::evaluate::{shield_stats, Evaluation};
use crate::search::{SearchReport, SearchStatus};

pub fn render_setup(test_case: &TestCase) -> String {
    let mut out = String::new();
    let generator_size = test_case
        .loadouts
        .first()
        .map(|loadout| loadout.generator.module_class.to_string())
        .unwrap_or_else(|| "none available".to_string());

    let _ = writeln!(out, "------------ TEST SETUP ------------");
    let _ = writeln!(out, "                    Ship Type: [{}]", test_case.ship.name);
    let _ = writeln!(out, "        Shield Generator Size: [{generator_size}]");
    let _ = writeln!(out, "         Shield Booster Count: [{}]", test_case.booster_slots);
    let _ = writeln!(out, "             Shield Cell Bank: [{}]", test_case.scb_hitpoints);
    let _ = writeln!(out, "Guardian Shield Reinforcement: [{}]", test_case.guardian_hitpoints);
    let _ = writeln!(
        out,
        "  Access to Prismatic Shields: [{}]",
        if test_case.use_prismatics { "Yes" } else { "No" }
    );
    let _ = writeln!(out, "                Explosive DPS: [{}]", test_case.damage.explosive);
    let _ = writeln!(out, "                  Kinetic DPS: [{}]", test_case.damage.kinetic);
    let _ = writeln!(out, "                  Thermal DPS: [{}]", test_case.damage.thermal);
    let _ = writeln!(out, "                 Absolute DPS: [{}]", test_case.damage.absolute);
    let _ = writeln!(
        out,
        "         Damage Effectiveness: [{:.0}%]",
        test_case.damage_effectiveness * 100.0
    );
    out
}

pub fn render_plan(test_case: &TestCase) -> String {
    let candidates = test_case
        .candidate_count()
        .map(|count| count.to_string())
        .unwrap_or_else(|| "too many to count".to_string());

    let mut out = String::new();
    let _ = writeln!(out, "------------ TEST RUN ------------");
    let _ = writeln!(out, "        Shield Booster Count: [{}]", test_case.booster_slots);
    let _ = writeln!(out, "   Shield Generator Variants: [{}]", test_case.loadouts.len());
    let _ = writeln!(out, "     Shield Booster Variants: [{}]", test_case.booster_variants.len());
    let _ = writeln!(out, "Shield loadouts to be tested: [{candidates}]");
    out
}

pub fn render_result(test_case: &TestCase, status: &SearchStatus) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "------------ TEST RESULTS ------------");
    let report = match status {
        SearchStatus::Completed(report) => report,
        SearchStatus::Cancelled {
            completed_chunks,
            total_chunks,
        } => {
            let _ = writeln!(
                out,
                "Cancelled after {completed_chunks} of {total_chunks} chunks; no result."
            );
            return out;
        }
        SearchStatus::NothingToTest => {
            let _ = writeln!(
                out,
                "Nothing to test. No shield boosters or generators match this setup."
            );
            return out;
        }
    };

    let summary = ResultSummary::new(test_case, &report.best);
    if summary.never_dies {
        let _ = writeln!(out, "    Survival Time [s]: [Didn't die]");
    } else {
        let _ = writeln!(out, "    Survival Time [s]: [{:.3}]", summary.survival_time);
    }
    let _ = writeln!(
        out,
        "     Shield Generator: [{}] - [{}] - [{}]",
        summary.generator.name, summary.generator.engineering, summary.generator.experimental
    );
    for (i, booster) in summary.boosters.iter().enumerate() {
        let label = if i == 0 {
            format!("     Shield Booster {}", i + 1)
        } else {
            format!("{:>21}", i + 1)
        };
        let _ = writeln!(
            out,
            "{label}: [{}] - [{}]",
            booster.engineering, booster.experimental
        );
    }
    let _ = writeln!(out);
    let _ = writeln!(out, "Shield Hitpoints [MJ]: [{:.3}]", summary.shield_hitpoints);
    match summary.regen_time_from_half {
        Some(time) => {
            let _ = writeln!(
                out,
                "  Shield Regen [MJ/s]: [{}] ({time:.2}s from 50%)",
                summary.regen
            );
        }
        None => {
            let _ = writeln!(out, "  Shield Regen [MJ/s]: [{}]", summary.regen);
        }
    }
    let _ = writeln!(out, " Explosive Resistance: [{:.3}]", summary.explosive_resistance);
    let _ = writeln!(out, "   Kinetic Resistance: [{:.3}]", summary.kinetic_resistance);
    let _ = writeln!(out, "   Thermal Resistance: [{:.3}]", summary.thermal_resistance);
    let _ = writeln!(
        out,
        "Tested {} loadouts in {:.2}s",
        report.candidates_tested,
        report.elapsed.as_secs_f64()
    );
    out
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NamedModule {
    pub name: String,
    pub engineering: String,
    pub experimental: String,
}

/// The winning loadout, resolved back to names and display values.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ResultSummary {
    pub survival_time: f64,
    pub actual_dps: f64,
    pub never_dies: bool,
    pub generator: NamedModule,
    pub boosters: Vec<NamedModule>,
    /// Generator and booster hitpoints plus guardian reinforcement.
    pub shield_hitpoints: f64,
    pub regen: f64,
    /// Seconds to regenerate from half strength; absent without regen.
    pub regen_time_from_half: Option<f64>,
    pub explosive_resistance: f64,
    pub kinetic_resistance: f64,
    pub thermal_resistance: f64,
}

impl ResultSummary {
    pub fn new(test_case: &TestCase, best: &Evaluation) -> Self {
        let stats = shield_stats(test_case, &best.candidate);
        let generator = &test_case.loadouts[best.candidate.loadout].generator;
        let shield_hitpoints = stats.hitpoints + test_case.guardian_hitpoints;
        let regen_time_from_half =
            (stats.regen > 0.0).then(|| shield_hitpoints / (2.0 * stats.regen));

        Self {
            survival_time: best.survival_time,
            actual_dps: best.actual_dps,
            never_dies: best.never_dies(),
            generator: NamedModule {
                name: generator.name.clone(),
                engineering: generator.engineered_name.clone(),
                experimental: generator.experimental_name.clone(),
            },
            boosters: best
                .candidate
                .boosters
                .iter()
                .map(|&index| {
                    let booster = &test_case.booster_variants[index];
                    NamedModule {
                        name: "Shield Booster".to_string(),
                        engineering: booster.engineering.clone(),
                        experimental: booster.experimental.clone(),
                    }
                })
                .collect(),
            shield_hitpoints,
            regen: stats.regen,
            regen_time_from_half,
            explosive_resistance: stats.explosive_resistance_pct(),
            kinetic_resistance: stats.kinetic_resistance_pct(),
            thermal_resistance: stats.thermal_resistance_pct(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SummaryStatus {
    Completed,
    Cancelled,
    NothingToTest,
}

/// Everything about one run, for `run --output`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SearchSummary {
    pub generated_unix_s: u64,
    pub ship: String,
    pub damage: DamageProfile,
    pub damage_effectiveness: f64,
    pub scb_hitpoints: f64,
    pub guardian_hitpoints: f64,
    pub booster_slots: usize,
    pub short_list: bool,
    pub use_prismatics: bool,
    pub jobs: Option<usize>,
    pub chunk_size: usize,
    pub booster_variants: usize,
    pub generator_variants: usize,
    pub status: SummaryStatus,
    pub candidates_tested: u64,
    pub total_chunks: u64,
    pub elapsed_s: f64,
    pub result: Option<ResultSummary>,
}

impl SearchSummary {
    pub fn new(test_case: &TestCase, options: &SearchOptions, status: &SearchStatus) -> Self {
        let (summary_status, report): (SummaryStatus, Option<&SearchReport>) = match status {
            SearchStatus::Completed(report) => (SummaryStatus::Completed, Some(report)),
            SearchStatus::Cancelled { .. } => (SummaryStatus::Cancelled, None),
            SearchStatus::NothingToTest => (SummaryStatus::NothingToTest, None),
        };
        let total_chunks = match status {
            SearchStatus::Completed(report) => report.total_chunks,
            SearchStatus::Cancelled { total_chunks, .. } => *total_chunks,
            SearchStatus::NothingToTest => 0,
        };

        Self {
            generated_unix_s: SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .unwrap_or_default()
                .as_secs(),
            ship: test_case.ship.name.clone(),
            damage: test_case.damage,
            damage_effectiveness: test_case.damage_effectiveness,
            scb_hitpoints: test_case.scb_hitpoints,
            guardian_hitpoints: test_case.guardian_hitpoints,
            booster_slots: test_case.booster_slots,
            short_list: test_case.short_list,
            use_prismatics: test_case.use_prismatics,
            jobs: options.jobs,
            chunk_size: options.chunk_size,
            booster_variants: test_case.booster_variants.len(),
            generator_variants: test_case.loadouts.len(),
            status: summary_status,
            candidates_tested: report.map_or(0, |report| report.candidates_tested),
            total_chunks,
            elapsed_s: report.map_or(0.0, |report| report.elapsed.as_secs_f64()),
            result: report.map(|report| ResultSummary::new(test_case, &report.best)),
        }
    }
}
