pub mod catalog;
pub mod combinations;
pub mod config;
pub mod error;
pub mod evaluate;
pub mod report;
pub mod search;
pub mod stats;

pub use catalog::{BoosterVariant, Catalog, GeneratorKind, LoadoutBase, ShieldGenerator, Ship};
pub use config::{DamageProfile, SearchOptions, TestCase, TestSettings};
pub use error::{CatalogError, ConfigError, SearchError};
pub use evaluate::{Candidate, Evaluation};
pub use search::{
    run_search, CancelToken, Progress, RunState, SearchObserver, SearchReport, SearchStatus,
    ShieldSearch,
};
