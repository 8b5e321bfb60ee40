//! Error types
//!
//! Each failure category has its own enum so that callers can match on the
//! part of the pipeline that failed. [`PkError`] aggregates them for the
//! operations that can fail in more than one way.

use thiserror::Error;

/// Crate-level error returned by operations spanning several stages.
#[derive(Error, Debug)]
pub enum PkError {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error(transparent)]
    State(#[from] StateError),

    #[error(transparent)]
    Integration(#[from] IntegrationError),
}

/// Invalid or incomplete model, solution or scenario configuration.
#[derive(Error, Debug)]
pub enum ConfigurationError {
    /// A required key is absent from an explicitly supplied parameter set
    #[error("Missing required parameter '{key}' for {model} models")]
    MissingParameter { key: String, model: String },

    /// A parameter is present but unusable
    #[error("Invalid parameter: {key} = {value} ({reason})")]
    InvalidParameter {
        key: String,
        value: String,
        reason: String,
    },

    /// The end time of a solution must be finite and non-negative
    #[error("Invalid time span: T = {0}")]
    InvalidTimeSpan(f64),

    /// A solution needs at least one evaluation point
    #[error("Invalid number of evaluation points: n = {0}")]
    InvalidStepCount(usize),

    /// A state vector does not match the model dimension
    #[error("State vector has {found} entries but the model has {expected} compartments")]
    StateLength { expected: usize, found: usize },

    /// The initial state contains NaN or infinite masses
    #[error("Initial state must be finite, got {0:?}")]
    NonFiniteInitialState(Vec<f64>),

    /// Solver tolerances must be strictly positive
    #[error("Invalid solver option: {name} = {value}")]
    InvalidSolverOption { name: &'static str, value: f64 },

    /// Failed to parse a scenario description
    #[error("Failed to parse scenario: {0}")]
    Parse(#[from] serde_json::Error),

    /// Failed to read a scenario file
    #[error("Failed to read scenario file '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// A global logger is already installed
    #[error("Failed to set up logging: {0}")]
    Logging(String),
}

impl ConfigurationError {
    /// Create a missing parameter error
    pub fn missing(key: impl Into<String>, model: impl Into<String>) -> Self {
        Self::MissingParameter {
            key: key.into(),
            model: model.into(),
        }
    }

    /// Create an invalid parameter error
    pub fn invalid(
        key: impl Into<String>,
        value: impl ToString,
        reason: impl Into<String>,
    ) -> Self {
        Self::InvalidParameter {
            key: key.into(),
            value: value.to_string(),
            reason: reason.into(),
        }
    }
}

/// Degenerate dosing-function parameters, surfaced when the function is evaluated.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DomainError {
    #[error("{kind} dosing requires a nonzero period")]
    ZeroPeriod { kind: &'static str },

    #[error("{kind} dosing requires a finite period, got {period}")]
    NonFinitePeriod { kind: &'static str, period: f64 },

    #[error("Dosing rate requested at a non-finite time {0}")]
    NonFiniteTime(f64),
}

/// Lifecycle misuse of a [`crate::Simulation`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StateError {
    #[error("solve must be called first")]
    NotSolved,
}

/// The ODE integrator could not reach the requested time.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("Integration failed at t = {reached} while advancing to t = {target}: {reason}")]
pub struct IntegrationError {
    /// Last time the integrator accepted a step at
    pub reached: f64,
    /// Time the failing segment was heading to
    pub target: f64,
    pub reason: String,
}
