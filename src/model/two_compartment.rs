use crate::{
    error::ConfigurationError,
    model::parameters::{check, ParameterSet},
};

/// Parameters of the central + one peripheral compartment model.
///
/// # State
/// - `y[0]`: `q_c`, drug mass in the central compartment
/// - `y[1]`: `q_p1`, drug mass in the peripheral compartment
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TwoCompartment {
    /// Inter-compartment clearance `Q_p1`
    pub q_p1: f64,
    /// Central volume `V_c`
    pub v_c: f64,
    /// Peripheral volume `V_p1`
    pub v_p1: f64,
    /// Systemic clearance `CL`
    pub cl: f64,
    /// Reference dose `X`, used when no dosing function is given
    pub x: f64,
}

impl Default for TwoCompartment {
    fn default() -> Self {
        Self {
            q_p1: 1.0,
            v_c: 1.0,
            v_p1: 1.0,
            cl: 1.0,
            x: 1.0,
        }
    }
}

impl TwoCompartment {
    pub const NAME: &'static str = "two_compartment";
    pub const REQUIRED: [&'static str; 5] = ["Q_p1", "V_c", "V_p1", "CL", "X"];
    pub const LABELS: [&'static str; 2] = ["q_c", "q_p1"];

    /// Builds the parameters from a set holding every key of [`Self::REQUIRED`].
    pub fn from_parameter_set(set: &ParameterSet) -> Result<Self, ConfigurationError> {
        Self::read(set, Self::NAME)
    }

    pub(crate) fn read(set: &ParameterSet, model: &str) -> Result<Self, ConfigurationError> {
        Ok(Self {
            q_p1: set.require("Q_p1", model)?,
            v_c: set.require("V_c", model)?,
            v_p1: set.require("V_p1", model)?,
            cl: set.require("CL", model)?,
            x: set.require("X", model)?,
        })
    }

    pub fn validate(&self) -> Result<(), ConfigurationError> {
        check("Q_p1", self.q_p1, false)?;
        check("V_c", self.v_c, true)?;
        check("V_p1", self.v_p1, true)?;
        check("CL", self.cl, false)?;
        check("X", self.x, false)
    }

    /// Mass flux from the central to the peripheral compartment.
    #[inline(always)]
    pub fn transition(&self, q_c: f64, q_p1: f64) -> f64 {
        self.q_p1 * (q_c / self.v_c - q_p1 / self.v_p1)
    }

    /// Irreversible removal from the central compartment.
    #[inline(always)]
    pub fn elimination(&self, q_c: f64) -> f64 {
        q_c / self.v_c * self.cl
    }

    /// Writes `dy/dt` for a dosing rate `dose`.
    #[inline(always)]
    pub(crate) fn derivatives(&self, dose: f64, y: &[f64], dy: &mut [f64]) {
        let (q_c, q_p1) = (y[0], y[1]);
        let transition = self.transition(q_c, q_p1);
        dy[0] = dose - self.elimination(q_c) - transition;
        dy[1] = transition;
    }
}
