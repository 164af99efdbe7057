//! Error types for catalog loading, test-case configuration and searches.
//!
//! Arithmetic edge cases (zero or negative net DPS) are not errors; they are
//! ordinary evaluation results handled by the search ordering.

use thiserror::Error;

use crate::catalog::MAX_BOOSTER_SLOTS;

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("failed to read catalog {path}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed catalog data")]
    Parse(#[from] serde_json::Error),

    #[error("unknown shield generator type '{0}'")]
    UnknownGeneratorKind(String),
}

/// Rejected before any candidate is generated.
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("damage effectiveness must be in (0, 1], got {0}")]
    Effectiveness(f64),

    #[error("{field} must be finite and >= 0, got {value}")]
    NegativeOrNonFinite { field: &'static str, value: f64 },

    #[error("booster slot count {slots} exceeds the {available} utility slots available")]
    TooManySlots { slots: usize, available: usize },

    #[error("ship declares {0} utility slots; at most {max} are supported", max = MAX_BOOSTER_SLOTS)]
    UtilitySlots(usize),

    #[error("chunk size must be >= 1")]
    ChunkSize,

    #[error("jobs must be >= 1 when provided")]
    Jobs,

    #[error("unknown ship '{name}'")]
    UnknownShip { name: String },
}

#[derive(Debug, Error)]
pub enum SearchError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("candidate space of {booster_variants} boosters over {slots} slots is too large to index")]
    SpaceOverflow { booster_variants: usize, slots: usize },

    #[error("failed to build rayon threadpool")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    #[error("search worker panicked: {0}")]
    WorkerPanicked(String),
}
