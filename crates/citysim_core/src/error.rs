//! Error types for the city simulation.

use thiserror::Error;

/// Result type alias using [`SimError`].
pub type Result<T> = std::result::Result<T, SimError>;

/// Top-level error type for all simulation errors.
///
/// Errors are only returned from entry points that take caller-supplied
/// identifiers or data. A running tick never fails: lookup misses inside
/// a tick are logged and skipped.
#[derive(Debug, Error)]
pub enum SimError {
    /// Fast-forward was requested while it is unsafe to skip time.
    #[error("Fast-forward refused: {0}")]
    TurboUnavailable(String),

    /// Unknown organisation identifier.
    #[error("Organisation not found: {0}")]
    UnknownOrganisation(String),

    /// Unknown city identifier.
    #[error("City not found: {0}")]
    UnknownCity(String),

    /// Unknown vehicle identifier.
    #[error("Vehicle not found: {0}")]
    UnknownVehicle(String),

    /// Unknown vehicle type identifier.
    #[error("Vehicle type not found: {0}")]
    UnknownVehicleType(String),

    /// Unknown building identifier.
    #[error("Building not found: {0}")]
    UnknownBuilding(String),

    /// Rule data file parsing error.
    #[error("Failed to parse rule file '{path}': {message}")]
    RuleParse {
        /// Path to the file that failed to parse.
        path: String,
        /// Error message.
        message: String,
    },

    /// Rule data failed consistency checks.
    #[error("Rule validation failed: {}", .0.join("; "))]
    RuleValidation(Vec<String>),

    /// Rule data needed to start the game is missing.
    #[error("Required rule data missing: {0}")]
    MissingRule(String),

    /// Save snapshot could not be written or read.
    #[error("Persistence error: {0}")]
    Persistence(String),
}
