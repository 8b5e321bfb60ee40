use serde::{Deserialize, Serialize};

use crate::{
    error::ConfigurationError,
    model::{
        parameters::{check, ParameterSet},
        two_compartment::TwoCompartment,
    },
};

/// Which depot mass drives absorption into the central compartment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DepotKinetics {
    /// First-order absorption of the integrated depot mass, `k_a * y[1]`
    #[default]
    StateCoupled,
    /// Absorption of the fixed depot parameter, `k_a * q0`. The depot state
    /// then never drains on its own; kept for reproducing legacy results.
    FixedReference,
}

/// Parameters of the central + absorption depot + one peripheral model.
///
/// # State
/// - `y[0]`: `q_c`, central compartment
/// - `y[1]`: `q0`, absorption depot
/// - `y[2]`: `q_p1`, peripheral compartment
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ThreeCompartment {
    pub q_p1: f64,
    pub v_c: f64,
    pub v_p1: f64,
    pub cl: f64,
    pub x: f64,
    /// Absorption rate constant `k_a`
    pub k_a: f64,
    /// Characteristic depot mass `q0`
    pub q0: f64,
    pub depot: DepotKinetics,
}

impl Default for ThreeCompartment {
    fn default() -> Self {
        Self {
            q_p1: 1.0,
            v_c: 1.0,
            v_p1: 1.0,
            cl: 1.0,
            x: 1.0,
            k_a: 1.0,
            q0: 1.0,
            depot: DepotKinetics::default(),
        }
    }
}

impl ThreeCompartment {
    pub const NAME: &'static str = "three_compartment";
    pub const LABELS: [&'static str; 3] = ["q_c", "q0", "q_p1"];

    /// Builds the parameters from a set; `k_a` and `q0` default to `1.0`.
    pub fn from_parameter_set(set: &ParameterSet) -> Result<Self, ConfigurationError> {
        let disposition = TwoCompartment::read(set, Self::NAME)?;
        Ok(Self {
            q_p1: disposition.q_p1,
            v_c: disposition.v_c,
            v_p1: disposition.v_p1,
            cl: disposition.cl,
            x: disposition.x,
            k_a: set.optional("k_a", 1.0)?,
            q0: set.optional("q0", 1.0)?,
            depot: DepotKinetics::default(),
        })
    }

    pub fn with_depot(mut self, depot: DepotKinetics) -> Self {
        self.depot = depot;
        self
    }

    /// Central/peripheral part of the model.
    pub fn disposition(&self) -> TwoCompartment {
        TwoCompartment {
            q_p1: self.q_p1,
            v_c: self.v_c,
            v_p1: self.v_p1,
            cl: self.cl,
            x: self.x,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigurationError> {
        self.disposition().validate()?;
        check("k_a", self.k_a, false)?;
        check("q0", self.q0, false)
    }

    #[inline(always)]
    pub(crate) fn derivatives(&self, dose: f64, y: &[f64], dy: &mut [f64]) {
        let (q_c, depot, q_p1) = (y[0], y[1], y[2]);
        let disposition = self.disposition();
        let transition = disposition.transition(q_c, q_p1);
        let absorbed = match self.depot {
            DepotKinetics::StateCoupled => depot,
            DepotKinetics::FixedReference => self.q0,
        };
        let dq0 = dose - self.k_a * absorbed;
        dy[0] = dose - dq0 - disposition.elimination(q_c) - transition;
        dy[1] = dq0;
        dy[2] = transition;
    }
}
