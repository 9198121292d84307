//! Error types for the makro workspace.
//!
//! Configuration mistakes and allocator infeasibility surface as errors.
//! Numerical degeneracies (zero variance, empty groups, missing cells) never
//! do; they are resolved where they occur.

use thiserror::Error;

/// The main error type for makro operations.
#[derive(Debug, Error)]
pub enum MakroError {
    /// A configuration value is out of range or inconsistent.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// A standardization or portfolio method name is not recognised.
    #[error("Unknown method: {0}")]
    UnknownMethod(String),

    /// The allocation floor cannot be met for every asset.
    #[error("min_alloc {min_alloc} too large for {n} assets (min_alloc * n > 1)")]
    MinAllocTooLarge {
        /// Requested per-asset floor.
        min_alloc: f64,
        /// Number of assets being allocated.
        n: usize,
    },

    /// The allocation ceiling cannot absorb the full budget.
    #[error("max_alloc {max_alloc} too small for {n} assets (max_alloc * n < 1)")]
    MaxAllocTooSmall {
        /// Requested per-asset ceiling.
        max_alloc: f64,
        /// Number of assets being allocated.
        n: usize,
    },

    /// Bounds became unsatisfiable while redistributing the budget.
    #[error("Infeasible allocation: {0}")]
    InfeasibleAllocation(String),

    /// Error due to invalid or malformed data.
    #[error("Invalid data: {0}")]
    InvalidData(String),

    /// Error when a required column is missing from the data.
    #[error("Missing required column: {0}")]
    MissingColumn(String),

    /// Error when a date cannot be parsed.
    #[error("Invalid date: {0}")]
    InvalidDate(String),

    /// Error when data is insufficient for the requested operation.
    #[error("Insufficient data: {0}")]
    InsufficientData(String),

    /// Error from Polars operations.
    #[error("Polars error: {0}")]
    Polars(#[from] polars::error::PolarsError),

    /// Error reading configuration or input files.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Error decoding JSON configuration.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error for other cases.
    #[error("Error: {0}")]
    Other(String),
}

impl MakroError {
    /// Whether this error stems from an allocation that cannot satisfy its bounds.
    pub const fn is_infeasible(&self) -> bool {
        matches!(
            self,
            Self::MinAllocTooLarge { .. }
                | Self::MaxAllocTooSmall { .. }
                | Self::InfeasibleAllocation(_)
        )
    }
}

impl From<String> for MakroError {
    fn from(s: String) -> Self {
        Self::Other(s)
    }
}

impl From<&str> for MakroError {
    fn from(s: &str) -> Self {
        Self::Other(s.to_string())
    }
}

/// A specialized Result type for makro operations.
pub type Result<T> = std::result::Result<T, MakroError>;
