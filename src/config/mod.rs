//! Scenario files
//!
//! A [`Scenario`] describes one simulation run as JSON: the model topology,
//! its parameters, the dosing function, the time grid and solver settings.
//! Only `model` is required.
//!
//! ```rust
//! use pkmodel::Scenario;
//!
//! let scenario = Scenario::from_json(r#"{
//!     "model": "two_compartment",
//!     "parameters": { "name": "model1", "Q_p1": 1.0, "V_c": 1.0, "V_p1": 1.0, "CL": 1.0, "X": 1.0 },
//!     "dosing": { "kind": "pulse", "strength": 1.0, "onset": 0.1, "period": 0.2 },
//!     "t_end": 1.0,
//!     "steps": 100
//! }"#).unwrap();
//!
//! let model = scenario.model().unwrap();
//! let solved = scenario.solution(&model).unwrap().solve().unwrap();
//! assert_eq!(solved.model_name(), "model1");
//! assert_eq!(solved.trajectory().shape(), &[2, 100]);
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{
    dosing::Dosing,
    error::{ConfigurationError, PkError},
    logger::LogSettings,
    model::{Compartments, DepotKinetics, Model, ModelKind, ParameterSet},
    simulator::{Solution, SolverOptions, Unsolved},
};

fn default_t_end() -> f64 {
    1.0
}

fn default_steps() -> usize {
    1000
}

/// One simulation run, as read from JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Scenario {
    /// Compartment topology
    pub model: ModelKind,

    /// Model parameters; every parameter is `1.0` when omitted
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameters: Option<ParameterSet>,

    /// Absorption form of the depot, three-compartment models only
    #[serde(default)]
    pub depot: DepotKinetics,

    /// Dosing function; constant dosing at `X` when omitted
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dosing: Option<Dosing>,

    #[serde(default = "default_t_end")]
    pub t_end: f64,

    /// Number of evaluation points
    #[serde(default = "default_steps")]
    pub steps: usize,

    /// Initial masses; all compartments start empty when omitted
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initial_state: Option<Vec<f64>>,

    #[serde(default)]
    pub solver: SolverOptions,

    #[serde(default)]
    pub log: LogSettings,
}

impl Scenario {
    /// A scenario for `kind` with every other field at its default.
    pub fn new(kind: ModelKind) -> Self {
        Self {
            model: kind,
            parameters: None,
            depot: DepotKinetics::default(),
            dosing: None,
            t_end: default_t_end(),
            steps: default_steps(),
            initial_state: None,
            solver: SolverOptions::default(),
            log: LogSettings::default(),
        }
    }

    /// Parse a JSON string into a Scenario
    pub fn from_json(json: &str) -> Result<Self, ConfigurationError> {
        let scenario: Self = serde_json::from_str(json)?;
        scenario.solver.validate()?;
        Ok(scenario)
    }

    /// Read and parse a JSON scenario file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigurationError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigurationError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json(&content)
    }

    /// Serialize to a JSON string
    pub fn to_json(&self) -> Result<String, ConfigurationError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Builds the model described by the scenario.
    pub fn model(&self) -> Result<Model, ConfigurationError> {
        let mut compartments = match &self.parameters {
            Some(set) => Compartments::from_parameter_set(self.model, set)?,
            None => Compartments::defaults(self.model),
        };
        match &mut compartments {
            Compartments::Three(params) => params.depot = self.depot,
            Compartments::Two(_) if self.depot != DepotKinetics::default() => {
                tracing::warn!(
                    depot = ?self.depot,
                    "Depot kinetics only apply to three-compartment models, ignoring"
                );
            }
            Compartments::Two(_) => {}
        }

        let model = Model::new(compartments, self.dosing)?;
        let name = match &self.parameters {
            Some(set) => set.name()?.map(str::to_string),
            None => None,
        };
        Ok(match name {
            Some(name) => model.named(name),
            None => model,
        })
    }

    /// Installs the global logger described by the `log` section.
    ///
    /// See [`crate::logger::setup_log`]; only the first call in a process
    /// succeeds.
    pub fn setup_log(&self) -> Result<(), ConfigurationError> {
        crate::logger::setup_log(&self.log)
    }

    /// Sets up the run of `model` over the scenario's time grid.
    pub fn solution<'a>(&self, model: &'a Model) -> Result<Solution<'a, Unsolved>, PkError> {
        let solution = Solution::new(model, self.t_end, self.steps)?.with_options(self.solver)?;
        match &self.initial_state {
            Some(y0) => solution.with_initial_state(y0.clone()),
            None => Ok(solution),
        }
    }
}
