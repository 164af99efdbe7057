use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use shield_tester::report::{render_plan, render_result, render_setup, SearchSummary};
use shield_tester::{
    Catalog, DamageProfile, Progress, RunState, SearchObserver, SearchOptions, ShieldSearch,
    TestSettings,
};
use std::fs;
use std::io::Write;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Parser, Debug)]
#[command(name = "shield-tester")]
#[command(about = "Exhaustive shield generator and booster loadout search")]
struct Cli {
    /// Equipment catalog (ships, boosters, generators and engineering)
    #[arg(long, default_value = "demos/catalog.json")]
    data: PathBuf,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List ships in the catalog
    ListShips,
    /// Find the loadout that survives longest against a damage profile
    Run {
        #[arg(long)]
        ship: String,
        #[arg(long, default_value_t = 0.0)]
        explosive: f64,
        #[arg(long, default_value_t = 50.0)]
        kinetic: f64,
        #[arg(long, default_value_t = 50.0)]
        thermal: f64,
        #[arg(long, default_value_t = 0.0)]
        absolute: f64,
        /// Fraction of time under fire, in (0, 1]
        #[arg(long, default_value_t = 0.25)]
        effectiveness: f64,
        /// Shield cell bank hitpoints added to the pool
        #[arg(long, default_value_t = 0.0)]
        scb: f64,
        /// Guardian shield reinforcement hitpoints added to the pool
        #[arg(long, default_value_t = 0.0)]
        guardian: f64,
        /// Booster slots to fill (defaults to every utility slot)
        #[arg(long)]
        boosters: Option<usize>,
        /// Also test boosters excluded from the short list
        #[arg(long)]
        full_list: bool,
        #[arg(long)]
        no_prismatics: bool,
        /// Worker threads (env SHIELD_TESTER_JOBS)
        #[arg(long)]
        jobs: Option<usize>,
        /// Booster combinations per chunk (env SHIELD_TESTER_CHUNK_SIZE)
        #[arg(long)]
        chunk_size: Option<usize>,
        /// Write a JSON summary of the run
        #[arg(long)]
        output: Option<PathBuf>,
    },
}

/// Prints whole-percent progress to stderr.
#[derive(Default)]
struct ProgressPrinter {
    last_percent: AtomicU64,
}

impl SearchObserver for ProgressPrinter {
    fn on_state(&self, state: RunState) {
        if matches!(state, RunState::Reducing | RunState::Cancelled) {
            eprintln!();
        }
    }

    fn on_progress(&self, progress: Progress) {
        let percent = progress.completed_chunks * 100 / progress.total_chunks.max(1);
        if self.last_percent.fetch_max(percent, Ordering::Relaxed) < percent {
            let mut stderr = std::io::stderr().lock();
            let _ = write!(
                stderr,
                "\rprogress={percent:>3}% ({}/{} chunks)",
                progress.completed_chunks, progress.total_chunks
            );
            let _ = stderr.flush();
        }
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::filter::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let Cli { data, command } = Cli::parse();
    let catalog = Catalog::load(&data)
        .with_context(|| format!("failed loading catalog {}", data.display()))?;

    match command {
        Commands::ListShips => {
            for ship in catalog.ships() {
                println!(
                    "{:24} utility_slots={} generator_class={}",
                    ship.name, ship.utility_slots, ship.highest_internal
                );
            }
        }
        Commands::Run {
            ship,
            explosive,
            kinetic,
            thermal,
            absolute,
            effectiveness,
            scb,
            guardian,
            boosters,
            full_list,
            no_prismatics,
            jobs,
            chunk_size,
            output,
        } => {
            let settings = TestSettings {
                damage: DamageProfile {
                    explosive,
                    kinetic,
                    thermal,
                    absolute,
                },
                damage_effectiveness: effectiveness,
                scb_hitpoints: scb,
                guardian_hitpoints: guardian,
                booster_slots: boosters,
                short_list: !full_list,
                use_prismatics: !no_prismatics,
            };
            let test_case = catalog
                .test_case(&ship, &settings)
                .context("invalid test setup")?;

            let mut options = SearchOptions::from_env();
            if jobs.is_some() {
                options.jobs = jobs;
            }
            if let Some(chunk_size) = chunk_size {
                options.chunk_size = chunk_size;
            }

            println!("{}", render_setup(&test_case));
            println!("{}", render_plan(&test_case));

            let status = ShieldSearch::new(&test_case, options)
                .run_with_observer(&ProgressPrinter::default())
                .context("shield search failed")?;
            print!("{}", render_result(&test_case, &status));

            if let Some(path) = output {
                if let Some(parent) = path.parent() {
                    fs::create_dir_all(parent)?;
                }
                let summary = SearchSummary::new(&test_case, &options, &status);
                fs::write(
                    &path,
                    serde_json::to_vec_pretty(&summary).context("failed to serialize summary json")?,
                )
                .with_context(|| format!("failed writing {}", path.display()))?;
                println!("output={}", path.display());
            }
        }
    }

    Ok(())
}
