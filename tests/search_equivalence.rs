use anyhow::{anyhow, Result};
use shield_tester::evaluate::evaluate;
use shield_tester::{
    Candidate, CancelToken, Catalog, DamageProfile, Evaluation, Progress, SearchObserver,
    SearchOptions, SearchStatus, ShieldSearch, TestCase, TestSettings,
};
use std::path::PathBuf;

fn repo_path(path: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join(path)
}

fn demo_catalog() -> Result<Catalog> {
    Ok(Catalog::load(&repo_path("demos/catalog.json"))?)
}

fn anaconda(slots: usize, damage: DamageProfile) -> Result<TestCase> {
    let settings = TestSettings {
        damage,
        booster_slots: Some(slots),
        short_list: false,
        ..TestSettings::default()
    };
    Ok(demo_catalog()?.test_case("Anaconda", &settings)?)
}

fn completed(status: SearchStatus) -> Result<(Evaluation, u64)> {
    match status {
        SearchStatus::Completed(report) => Ok((report.best, report.candidates_tested)),
        other => Err(anyhow!("expected a completed search, got {other:?}")),
    }
}

fn serial(test_case: &TestCase) -> Result<(Evaluation, u64)> {
    let options = SearchOptions {
        jobs: Some(1),
        chunk_size: 10_000,
    };
    completed(ShieldSearch::new(test_case, options).run()?)
}

fn parallel(test_case: &TestCase, chunk_size: usize) -> Result<(Evaluation, u64)> {
    let options = SearchOptions {
        jobs: Some(4),
        chunk_size,
    };
    completed(ShieldSearch::new(test_case, options).run()?)
}

fn default_damage() -> DamageProfile {
    TestSettings::default().damage
}

#[test]
fn parallel_and_serial_agree_for_zero_one_and_eight_slots() -> Result<()> {
    for slots in [0, 1, 8] {
        let test_case = anaconda(slots, default_damage())?;
        let expected = serial(&test_case)?;
        for chunk_size in [1, 7, 10_000] {
            let actual = parallel(&test_case, chunk_size)?;
            assert_eq!(actual, expected, "slots={slots} chunk_size={chunk_size}");
        }
        assert_eq!(Some(expected.1), test_case.candidate_count());
    }
    Ok(())
}

#[test]
fn parallel_search_matches_exhaustive_scan() -> Result<()> {
    let damage = DamageProfile {
        explosive: 30.0,
        kinetic: 80.0,
        thermal: 120.0,
        absolute: 10.0,
    };
    let test_case = anaconda(3, damage)?;

    let mut brute: Option<Evaluation> = None;
    let combinations = shield_tester::combinations::Combinations::new(
        test_case.booster_variants.len(),
        test_case.booster_slots,
    )
    .ok_or_else(|| anyhow!("space too large"))?;
    for boosters in combinations {
        for loadout in 0..test_case.loadouts.len() {
            let candidate = Candidate {
                boosters: boosters.clone(),
                loadout,
            };
            let result = evaluate(&test_case, &candidate);
            let replace = match &brute {
                None => true,
                Some(best) => best.is_beaten_by(result.survival_time, result.actual_dps),
            };
            if replace {
                brute = Some(result);
            }
        }
    }

    let (best, _) = parallel(&test_case, 5)?;
    assert_eq!(Some(best), brute);
    Ok(())
}

#[test]
fn candidate_count_covers_every_booster_and_generator_pairing() -> Result<()> {
    let test_case = anaconda(2, default_damage())?;
    let (_, tested) = parallel(&test_case, 3)?;
    // 6 boosters over 2 slots, 3 generator types x 3 blueprints x 2 experimentals.
    assert_eq!(tested, 21 * 18);
    Ok(())
}

#[test]
fn zero_incoming_damage_never_dies_on_every_path() -> Result<()> {
    let test_case = anaconda(4, DamageProfile::default())?;
    let (serial_best, _) = serial(&test_case)?;
    let (parallel_best, _) = parallel(&test_case, 11)?;

    assert!(serial_best.never_dies());
    assert!(serial_best.survival_time < 0.0);
    assert_eq!(serial_best, parallel_best);
    Ok(())
}

struct CancelOnFirstChunk {
    token: CancelToken,
}

impl SearchObserver for CancelOnFirstChunk {
    fn on_progress(&self, _progress: Progress) {
        self.token.cancel();
    }
}

#[test]
fn cancelling_after_first_chunk_stops_the_run() -> Result<()> {
    let test_case = anaconda(8, default_damage())?;
    let token = CancelToken::new();
    let observer = CancelOnFirstChunk {
        token: token.clone(),
    };
    let options = SearchOptions {
        jobs: Some(2),
        chunk_size: 1,
    };

    let status = ShieldSearch::new(&test_case, options)
        .with_cancel_token(token)
        .run_with_observer(&observer)?;

    match status {
        SearchStatus::Cancelled {
            completed_chunks,
            total_chunks,
        } => {
            assert_eq!(total_chunks, 1287);
            assert!(completed_chunks >= 1);
            assert!(completed_chunks < total_chunks);
        }
        other => return Err(anyhow!("expected cancellation, got {other:?}")),
    }
    Ok(())
}

#[test]
fn cancelled_serial_run_discards_its_result() -> Result<()> {
    let test_case = anaconda(2, default_damage())?;
    let token = CancelToken::new();
    let observer = CancelOnFirstChunk {
        token: token.clone(),
    };
    let options = SearchOptions {
        jobs: Some(1),
        chunk_size: 10_000,
    };

    let status = ShieldSearch::new(&test_case, options)
        .with_cancel_token(token)
        .run_with_observer(&observer)?;
    assert_eq!(
        status,
        SearchStatus::Cancelled {
            completed_chunks: 1,
            total_chunks: 1,
        }
    );
    Ok(())
}

#[test]
fn ship_without_matching_generators_has_nothing_to_test() -> Result<()> {
    let test_case = demo_catalog()?.test_case("Python", &TestSettings::default())?;
    assert!(test_case.loadouts.is_empty());
    assert_eq!(
        ShieldSearch::new(&test_case, SearchOptions::default()).run()?,
        SearchStatus::NothingToTest
    );
    Ok(())
}
