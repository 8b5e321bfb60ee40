//! Compartment models
//!
//! A [`Model`] couples a fixed compartment topology ([`TwoCompartment`] or
//! [`ThreeCompartment`]) with a [`Dosing`] function and exposes the rate
//! function integrated by [`crate::Solution`].
//!
//! ```rust
//! use pkmodel::{dosing, Model, TwoCompartment};
//!
//! let model = Model::new(TwoCompartment::default(), Some(dosing::sine(0.5, 0.25)))
//!     .unwrap()
//!     .named("model1");
//! let dy = model.rhs(0.0, &[1.0, 0.0]).unwrap();
//! assert_eq!(dy.len(), 2);
//! ```

pub mod parameters;
pub mod three_compartment;
pub mod two_compartment;

use serde::{Deserialize, Serialize};

use crate::{
    dosing::{self, Dosing},
    error::{ConfigurationError, PkError},
};
pub use parameters::{ParameterSet, ParameterValue};
pub use three_compartment::{DepotKinetics, ThreeCompartment};
pub use two_compartment::TwoCompartment;

/// The supported compartment topologies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelKind {
    TwoCompartment,
    ThreeCompartment,
}

impl ModelKind {
    pub fn name(&self) -> &'static str {
        match self {
            ModelKind::TwoCompartment => TwoCompartment::NAME,
            ModelKind::ThreeCompartment => ThreeCompartment::NAME,
        }
    }

    /// Number of state variables.
    pub fn dim(&self) -> usize {
        self.labels().len()
    }

    /// Compartment label for every state index.
    pub fn labels(&self) -> &'static [&'static str] {
        match self {
            ModelKind::TwoCompartment => &TwoCompartment::LABELS,
            ModelKind::ThreeCompartment => &ThreeCompartment::LABELS,
        }
    }
}

/// Parameters of one of the supported topologies.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Compartments {
    Two(TwoCompartment),
    Three(ThreeCompartment),
}

impl From<TwoCompartment> for Compartments {
    fn from(params: TwoCompartment) -> Self {
        Compartments::Two(params)
    }
}

impl From<ThreeCompartment> for Compartments {
    fn from(params: ThreeCompartment) -> Self {
        Compartments::Three(params)
    }
}

impl Compartments {
    /// Default parameters (all `1.0`) for `kind`.
    pub fn defaults(kind: ModelKind) -> Self {
        match kind {
            ModelKind::TwoCompartment => TwoCompartment::default().into(),
            ModelKind::ThreeCompartment => ThreeCompartment::default().into(),
        }
    }

    pub fn from_parameter_set(
        kind: ModelKind,
        set: &ParameterSet,
    ) -> Result<Self, ConfigurationError> {
        Ok(match kind {
            ModelKind::TwoCompartment => TwoCompartment::from_parameter_set(set)?.into(),
            ModelKind::ThreeCompartment => ThreeCompartment::from_parameter_set(set)?.into(),
        })
    }

    pub fn kind(&self) -> ModelKind {
        match self {
            Compartments::Two(_) => ModelKind::TwoCompartment,
            Compartments::Three(_) => ModelKind::ThreeCompartment,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigurationError> {
        match self {
            Compartments::Two(params) => params.validate(),
            Compartments::Three(params) => params.validate(),
        }
    }

    /// Reference dose `X`.
    pub fn reference_dose(&self) -> f64 {
        match self {
            Compartments::Two(params) => params.x,
            Compartments::Three(params) => params.x,
        }
    }

    #[inline(always)]
    fn derivatives(&self, dose: f64, y: &[f64], dy: &mut [f64]) {
        match self {
            Compartments::Two(params) => params.derivatives(dose, y, dy),
            Compartments::Three(params) => params.derivatives(dose, y, dy),
        }
    }
}

/// A pharmacokinetic model: compartments, their parameters and a dosing function.
///
/// Models are immutable once built. Validation happens at construction so
/// the rate function never divides by a zero volume.
#[derive(Debug, Clone, PartialEq)]
pub struct Model {
    name: String,
    compartments: Compartments,
    dose: Dosing,
}

impl Model {
    /// Builds a model, dosing at the constant reference rate `X` when no
    /// dosing function is given.
    pub fn new(
        compartments: impl Into<Compartments>,
        dose: Option<Dosing>,
    ) -> Result<Self, ConfigurationError> {
        let compartments = compartments.into();
        compartments.validate()?;
        let dose = dose.unwrap_or_else(|| dosing::constant(compartments.reference_dose()));
        Ok(Self {
            name: compartments.kind().name().to_string(),
            compartments,
            dose,
        })
    }

    /// Builds a model from an optional string-keyed parameter set.
    ///
    /// Without a parameter set every parameter is `1.0`. An explicit set must
    /// hold every required key of the chosen topology; its `name` entry, when
    /// present, becomes the model name.
    pub fn from_parameter_set(
        kind: ModelKind,
        parameters: Option<&ParameterSet>,
        dose: Option<Dosing>,
    ) -> Result<Self, ConfigurationError> {
        let Some(set) = parameters else {
            return Self::new(Compartments::defaults(kind), dose);
        };
        let model = Self::new(Compartments::from_parameter_set(kind, set)?, dose)?;
        Ok(match set.name()? {
            Some(name) => model.named(name),
            None => model,
        })
    }

    pub fn two_compartment(
        parameters: Option<&ParameterSet>,
        dose: Option<Dosing>,
    ) -> Result<Self, ConfigurationError> {
        Self::from_parameter_set(ModelKind::TwoCompartment, parameters, dose)
    }

    pub fn three_compartment(
        parameters: Option<&ParameterSet>,
        dose: Option<Dosing>,
    ) -> Result<Self, ConfigurationError> {
        Self::from_parameter_set(ModelKind::ThreeCompartment, parameters, dose)
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> ModelKind {
        self.compartments.kind()
    }

    /// Dimension of the state vector.
    pub fn dim(&self) -> usize {
        self.kind().dim()
    }

    pub fn dose(&self) -> &Dosing {
        &self.dose
    }

    pub fn compartments(&self) -> &Compartments {
        &self.compartments
    }

    pub fn labels(&self) -> &'static [&'static str] {
        self.kind().labels()
    }

    /// Rate of change of every compartment mass at time `t`.
    pub fn rhs(&self, t: f64, y: &[f64]) -> Result<Vec<f64>, PkError> {
        self.check_state(y)?;
        let rate = self.dose.rate(t)?;
        let mut dy = vec![0.0; self.dim()];
        self.compartments.derivatives(rate, y, &mut dy);
        Ok(dy)
    }

    /// Rate function used inside the integrator; the dosing function has
    /// been validated and `y`, `dy` have length [`Model::dim`].
    #[inline(always)]
    pub(crate) fn rhs_into(&self, t: f64, y: &[f64], dy: &mut [f64]) {
        let rate = self.dose.rate_unchecked(t);
        self.compartments.derivatives(rate, y, dy);
    }

    pub(crate) fn check_state(&self, y: &[f64]) -> Result<(), ConfigurationError> {
        if y.len() != self.dim() {
            return Err(ConfigurationError::StateLength {
                expected: self.dim(),
                found: y.len(),
            });
        }
        Ok(())
    }
}
