//! Search coordinator: splits the candidate space into chunks, evaluates
//! them on a rayon pool and reduces the per-chunk winners.
//!
//! Chunk results are collected in chunk order and folded left to right with
//! the same rule used inside a chunk, so the parallel and serial paths pick
//! the same winner, ties included.

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use rayon::prelude::*;
use tracing::{debug, info, warn};

use crate::combinations::{chunk_ranges, multiset_count};
use crate::config::{SearchOptions, TestCase};
use crate::error::SearchError;
use crate::evaluate::{evaluate_range, ChunkResult, Evaluation};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RunState {
    Idle,
    Generating,
    Evaluating,
    Reducing,
    Completed,
    Cancelled,
}

/// Shared flag for cooperative cancellation. Workers look at it before
/// starting a chunk; a chunk already running is finished and then dropped.
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Progress {
    pub completed_chunks: u64,
    pub total_chunks: u64,
}

/// Receives run notifications. Progress may be reported from worker threads,
/// in chunk completion order.
pub trait SearchObserver: Sync {
    fn on_state(&self, _state: RunState) {}
    fn on_progress(&self, _progress: Progress) {}
}

impl SearchObserver for () {}

#[derive(Clone, Debug, PartialEq)]
pub struct SearchReport {
    pub best: Evaluation,
    pub candidates_tested: u64,
    pub total_chunks: u64,
    pub elapsed: Duration,
}

#[derive(Clone, Debug, PartialEq)]
pub enum SearchStatus {
    Completed(SearchReport),
    Cancelled {
        completed_chunks: u64,
        total_chunks: u64,
    },
    /// No eligible boosters or generators after filtering.
    NothingToTest,
}

impl SearchStatus {
    pub fn report(&self) -> Option<&SearchReport> {
        match self {
            Self::Completed(report) => Some(report),
            _ => None,
        }
    }
}

pub struct ShieldSearch<'a> {
    test_case: &'a TestCase,
    options: SearchOptions,
    cancel: CancelToken,
}

impl<'a> ShieldSearch<'a> {
    pub fn new(test_case: &'a TestCase, options: SearchOptions) -> Self {
        Self {
            test_case,
            options,
            cancel: CancelToken::new(),
        }
    }

    pub fn with_cancel_token(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    pub fn run(&self) -> Result<SearchStatus, SearchError> {
        self.run_with_observer(&())
    }

    pub fn run_with_observer(
        &self,
        observer: &dyn SearchObserver,
    ) -> Result<SearchStatus, SearchError> {
        observer.on_state(RunState::Idle);
        self.options.validate()?;
        let test_case = self.test_case;

        if test_case.is_empty() {
            warn!(
                booster_variants = test_case.booster_variants.len(),
                loadouts = test_case.loadouts.len(),
                "nothing to test"
            );
            return Ok(SearchStatus::NothingToTest);
        }

        let started = Instant::now();
        observer.on_state(RunState::Generating);

        let variants = test_case.booster_variants.len();
        let slots = test_case.booster_slots;
        let combinations = multiset_count(variants, slots).ok_or(SearchError::SpaceOverflow {
            booster_variants: variants,
            slots,
        })?;
        let candidates = test_case
            .candidate_count()
            .ok_or(SearchError::SpaceOverflow {
                booster_variants: variants,
                slots,
            })?;

        let serial = self.options.jobs == Some(1) || combinations <= self.options.chunk_size as u64;
        let ranges = if serial {
            vec![0..combinations]
        } else {
            chunk_ranges(combinations, self.options.chunk_size as u64)
        };
        let total_chunks = ranges.len() as u64;

        info!(
            ship = %test_case.ship.name,
            booster_slots = slots,
            booster_variants = variants,
            generator_variants = test_case.loadouts.len(),
            candidates,
            chunks = total_chunks,
            jobs = ?self.options.jobs,
            serial,
            "starting shield search"
        );
        if test_case.damage.total() == 0.0 {
            info!("no incoming damage; every candidate regenerates");
        }

        observer.on_state(RunState::Evaluating);
        let completed = AtomicU64::new(0);
        let run_chunk = |range: &std::ops::Range<u64>| -> Option<ChunkResult> {
            if self.cancel.is_cancelled() {
                return None;
            }
            let result = evaluate_range(test_case, range.clone());
            let done = completed.fetch_add(1, Ordering::SeqCst) + 1;
            debug!(chunk_start = range.start, chunk_end = range.end, done, "chunk evaluated");
            observer.on_progress(Progress {
                completed_chunks: done,
                total_chunks,
            });
            Some(result)
        };

        type Collected = Vec<Option<ChunkResult>>;
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| -> Result<Collected, SearchError> {
            if serial {
                return Ok(ranges.iter().map(run_chunk).collect());
            }
            match self.options.jobs {
                Some(jobs) => {
                    let pool = rayon::ThreadPoolBuilder::new().num_threads(jobs).build()?;
                    Ok(pool.install(|| ranges.par_iter().map(run_chunk).collect()))
                }
                None => Ok(ranges.par_iter().map(run_chunk).collect()),
            }
        }));
        let chunk_results = match outcome {
            Ok(results) => results?,
            Err(payload) => return Err(SearchError::WorkerPanicked(panic_message(&*payload))),
        };

        let completed_chunks = completed.load(Ordering::SeqCst);
        if self.cancel.is_cancelled() {
            info!(completed_chunks, total_chunks, "shield search cancelled");
            observer.on_state(RunState::Cancelled);
            return Ok(SearchStatus::Cancelled {
                completed_chunks,
                total_chunks,
            });
        }

        observer.on_state(RunState::Reducing);
        let mut merged = ChunkResult::default();
        for result in chunk_results {
            // Only a cancelled run skips chunks, and that returned above.
            let Some(result) = result else {
                continue;
            };
            merged = merged.merge(result);
        }

        let Some(best) = merged.best else {
            return Ok(SearchStatus::NothingToTest);
        };
        let elapsed = started.elapsed();
        info!(
            survival_time = best.survival_time,
            actual_dps = best.actual_dps,
            tested = merged.tested,
            elapsed_ms = elapsed.as_millis() as u64,
            "shield search completed"
        );
        observer.on_state(RunState::Completed);
        Ok(SearchStatus::Completed(SearchReport {
            best,
            candidates_tested: merged.tested,
            total_chunks,
            elapsed,
        }))
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Convenience wrapper: search with default cancellation and no observer.
pub fn run_search(test_case: &TestCase, options: SearchOptions) -> Result<SearchStatus, SearchError> {
    ShieldSearch::new(test_case, options).run()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::fixtures::{booster, generator, ship};
    use crate::catalog::{GeneratorKind, LoadoutBase};
    use crate::config::TestSettings;
    use std::sync::Mutex;

    fn small_case(slots: usize) -> TestCase {
        let ship = ship();
        let settings = TestSettings {
            booster_slots: Some(slots),
            ..TestSettings::default()
        };
        let loadouts = [GeneratorKind::Normal, GeneratorKind::BiWeave, GeneratorKind::Prismatic]
            .into_iter()
            .map(|kind| LoadoutBase::new(generator(kind, 2.0), &ship))
            .collect();
        let boosters = vec![
            booster(0.2, 0.0, 0.0, 0.1),
            booster(0.0, 0.25, 0.0, 0.0),
            booster(0.0, 0.0, 0.3, 0.05),
            booster(0.05, 0.05, 0.05, 0.3),
            booster(0.1, 0.1, 0.1, 0.1),
        ];
        TestCase::new(ship, &settings, boosters, loadouts).unwrap()
    }

    #[derive(Default)]
    struct Recorder {
        states: Mutex<Vec<RunState>>,
        progress: Mutex<Vec<Progress>>,
    }

    impl SearchObserver for Recorder {
        fn on_state(&self, state: RunState) {
            self.states.lock().unwrap().push(state);
        }

        fn on_progress(&self, progress: Progress) {
            self.progress.lock().unwrap().push(progress);
        }
    }

    #[test]
    fn reports_every_candidate_and_state_transition() {
        let case = small_case(2);
        let recorder = Recorder::default();
        let options = SearchOptions {
            jobs: Some(2),
            chunk_size: 4,
        };
        let status = ShieldSearch::new(&case, options)
            .run_with_observer(&recorder)
            .unwrap();

        let report = status.report().unwrap();
        assert_eq!(report.candidates_tested, 45);
        assert_eq!(report.total_chunks, 4);
        assert_eq!(recorder.progress.lock().unwrap().len(), 4);
        assert_eq!(
            *recorder.states.lock().unwrap(),
            vec![
                RunState::Idle,
                RunState::Generating,
                RunState::Evaluating,
                RunState::Reducing,
                RunState::Completed
            ]
        );
    }

    #[test]
    fn unusable_loadout_cannot_hide_the_best_one() {
        let ship = ship();
        let settings = TestSettings {
            booster_slots: Some(1),
            ..TestSettings::default()
        };
        let broken = LoadoutBase {
            generator: generator(GeneratorKind::BiWeave, 2.0),
            shield_strength: f64::NAN,
        };
        let loadouts = vec![broken, LoadoutBase::new(generator(GeneratorKind::Normal, 2.0), &ship)];
        let boosters = vec![booster(0.2, 0.0, 0.0, 0.1), booster(0.0, 0.25, 0.0, 0.0)];
        let case = TestCase::new(ship, &settings, boosters, loadouts).unwrap();

        for jobs in [Some(1), Some(2)] {
            let options = SearchOptions { jobs, chunk_size: 1 };
            let status = run_search(&case, options).unwrap();
            let report = status.report().unwrap();
            assert_eq!(report.best.candidate.loadout, 1, "jobs={jobs:?}");
            assert!(report.best.survival_time.is_finite());
            assert_eq!(report.candidates_tested, 4);
        }
    }

    #[test]
    fn small_space_runs_as_single_chunk() {
        let case = small_case(2);
        let status = run_search(&case, SearchOptions::default()).unwrap();
        assert_eq!(status.report().unwrap().total_chunks, 1);
    }

    #[test]
    fn empty_catalog_is_nothing_to_test() {
        let mut case = small_case(2);
        case.loadouts.clear();
        assert_eq!(
            run_search(&case, SearchOptions::default()).unwrap(),
            SearchStatus::NothingToTest
        );
    }

    #[test]
    fn invalid_options_fail_before_work() {
        let case = small_case(1);
        let options = SearchOptions {
            jobs: Some(0),
            chunk_size: 10,
        };
        assert!(matches!(
            run_search(&case, options),
            Err(SearchError::Config(_))
        ));
    }

    #[test]
    fn cancelled_before_start_dispatches_nothing() {
        let case = small_case(3);
        let search = ShieldSearch::new(
            &case,
            SearchOptions {
                jobs: Some(2),
                chunk_size: 2,
            },
        );
        search.cancel_token().cancel();
        assert_eq!(
            search.run().unwrap(),
            SearchStatus::Cancelled {
                completed_chunks: 0,
                total_chunks: 18,
            }
        );
    }
}
