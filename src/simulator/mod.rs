//! Solving compartment models over time
//!
//! A [`Solution`] binds a [`Model`] to an evenly spaced time grid on
//! `[0, T]`. It starts out [`Unsolved`], holding only its configuration and
//! the total administered dose; [`Solution::solve`] integrates the model and
//! returns a [`Solved`] solution carrying the `dim × n` trajectory.
//!
//! ```rust
//! use pkmodel::{dosing, Model, Solution};
//!
//! let model = Model::two_compartment(None, Some(dosing::constant(1.0))).unwrap();
//! let solution = Solution::new(&model, 1.0, 1000).unwrap();
//! assert_eq!(solution.total_dose(), 1.0);
//!
//! let solved = solution.solve().unwrap();
//! assert_eq!(solved.trajectory().shape(), &[2, 1000]);
//! ```

mod integrator;
mod lifecycle;
pub mod quadrature;

use ndarray::{Array, Array1, Array2, ArrayBase, ArrayView1, Data, Dimension};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::{
    error::{ConfigurationError, DomainError, PkError},
    model::Model,
};
pub use lifecycle::Simulation;
pub use quadrature::{Quadrature, QuadratureOptions};

/// Decimal places kept in [`Solution::total_dose`].
const DOSE_DECIMALS: i32 = 3;

/// Tolerances of the Dormand–Prince integrator and of the dose quadrature.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverOptions {
    pub rtol: f64,
    pub atol: f64,
    pub quadrature: QuadratureOptions,
}

impl Default for SolverOptions {
    fn default() -> Self {
        Self {
            rtol: 1e-6,
            atol: 1e-9,
            quadrature: QuadratureOptions::default(),
        }
    }
}

impl SolverOptions {
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        let checks = [
            ("rtol", self.rtol),
            ("atol", self.atol),
            ("quadrature.abs_tol", self.quadrature.abs_tol),
            ("quadrature.rel_tol", self.quadrature.rel_tol),
        ];
        for (name, value) in checks {
            if !(value.is_finite() && value > 0.0) {
                return Err(ConfigurationError::InvalidSolverOption { name, value });
            }
        }
        Ok(())
    }
}

/// Marker for a solution whose trajectory has not been computed.
#[derive(Debug, Clone, Copy, Default)]
pub struct Unsolved;

/// State of a solution after integration.
#[derive(Debug, Clone)]
pub struct Solved {
    trajectory: Array2<f64>,
}

/// One simulation run of a [`Model`].
///
/// The model is borrowed, so several solutions (for instance with different
/// end times or initial states) can share it.
#[derive(Debug, Clone)]
pub struct Solution<'a, S = Unsolved> {
    model: &'a Model,
    t_end: f64,
    time_grid: Array1<f64>,
    initial_state: Vec<f64>,
    total_dose: f64,
    options: SolverOptions,
    state: S,
}

impl<'a> Solution<'a, Unsolved> {
    /// Sets up a run over `n` evenly spaced points on `[0, t_end]`, starting
    /// from empty compartments.
    ///
    /// The total dose is integrated here, so a degenerate dosing function
    /// fails with [`DomainError`] before any solve is attempted.
    pub fn new(model: &'a Model, t_end: f64, n: usize) -> Result<Self, PkError> {
        if !t_end.is_finite() || t_end < 0.0 {
            return Err(ConfigurationError::InvalidTimeSpan(t_end).into());
        }
        if n == 0 {
            return Err(ConfigurationError::InvalidStepCount(n).into());
        }
        model.dose().validate()?;

        let mut time_grid = Array1::linspace(0.0, t_end, n);
        if n > 1 {
            time_grid[n - 1] = t_end;
        }
        let options = SolverOptions::default();
        let total_dose = round_dose(integrate_dose(model, t_end, &options).value);

        Ok(Self {
            model,
            t_end,
            time_grid,
            initial_state: vec![0.0; model.dim()],
            total_dose,
            options,
            state: Unsolved,
        })
    }

    /// Replaces the initial compartment masses.
    pub fn with_initial_state(mut self, y0: impl Into<Vec<f64>>) -> Result<Self, PkError> {
        let y0 = y0.into();
        self.model.check_state(&y0)?;
        if y0.iter().any(|value| !value.is_finite()) {
            return Err(ConfigurationError::NonFiniteInitialState(y0).into());
        }
        self.initial_state = y0;
        Ok(self)
    }

    /// Replaces the solver tolerances; the total dose is integrated again
    /// with the new quadrature settings.
    pub fn with_options(mut self, options: SolverOptions) -> Result<Self, PkError> {
        options.validate()?;
        self.total_dose = round_dose(integrate_dose(self.model, self.t_end(), &options).value);
        self.options = options;
        Ok(self)
    }

    /// Integrates the model over the time grid.
    ///
    /// Fails with [`crate::IntegrationError`] when the integrator cannot
    /// reach the end of the grid; no partial trajectory is kept.
    pub fn solve(&self) -> Result<Solution<'a, Solved>, PkError> {
        tracing::debug!(
            model = self.model.name(),
            dim = self.model.dim(),
            points = self.time_grid.len(),
            dose = %self.model.dose(),
            "Solving"
        );
        let grid = self.time_grid.to_vec();
        let trajectory =
            integrator::integrate(self.model, &grid, &self.initial_state, &self.options)?;

        Ok(Solution {
            model: self.model,
            t_end: self.t_end,
            time_grid: self.time_grid.clone(),
            initial_state: self.initial_state.clone(),
            total_dose: self.total_dose,
            options: self.options,
            state: Solved { trajectory },
        })
    }
}

impl<'a, S> Solution<'a, S> {
    pub fn model(&self) -> &'a Model {
        self.model
    }

    pub fn model_name(&self) -> &str {
        self.model.name()
    }

    pub fn time_grid(&self) -> &Array1<f64> {
        &self.time_grid
    }

    /// End of the time span.
    pub fn t_end(&self) -> f64 {
        self.t_end
    }

    pub fn initial_state(&self) -> &[f64] {
        &self.initial_state
    }

    pub fn options(&self) -> &SolverOptions {
        &self.options
    }

    /// Integral of the dosing function over `[0, T]`, rounded to 3 decimals.
    pub fn total_dose(&self) -> f64 {
        self.total_dose
    }

    /// Label of every state index, `q_c` first.
    pub fn compartment_labels(&self) -> &'static [&'static str] {
        self.model.labels()
    }

    /// Dosing rate at every point of the time grid.
    pub fn dose_curve(&self) -> Array1<f64> {
        // validated in Solution::new
        let dose = self.model.dose();
        self.time_grid.mapv(|t| dose.rate_unchecked(t))
    }

    /// Dosing rate at arbitrary times.
    pub fn dose_curve_at<T, D>(&self, times: &ArrayBase<T, D>) -> Result<Array<f64, D>, DomainError>
    where
        T: Data<Elem = f64>,
        D: Dimension,
    {
        self.model.dose().rates(times)
    }
}

impl<'a> Solution<'a, Solved> {
    /// Compartment masses, one row per compartment and one column per grid point.
    pub fn trajectory(&self) -> &Array2<f64> {
        &self.state.trajectory
    }

    /// Drops the trajectory, keeping the configuration.
    pub fn to_pending(&self) -> Solution<'a, Unsolved> {
        Solution {
            model: self.model,
            t_end: self.t_end,
            time_grid: self.time_grid.clone(),
            initial_state: self.initial_state.clone(),
            total_dose: self.total_dose,
            options: self.options,
            state: Unsolved,
        }
    }

    pub fn into_trajectory(self) -> Array2<f64> {
        self.state.trajectory
    }

    /// Mass over time in compartment `index`.
    pub fn compartment(&self, index: usize) -> Option<ArrayView1<'_, f64>> {
        (index < self.model.dim()).then(|| self.state.trajectory.row(index))
    }

    /// Mass over time in the compartment labelled `label`.
    pub fn compartment_by_label(&self, label: &str) -> Option<ArrayView1<'_, f64>> {
        let index = self.compartment_labels().iter().position(|l| *l == label)?;
        self.compartment(index)
    }

    /// Compartment masses at `T`.
    pub fn final_state(&self) -> ArrayView1<'_, f64> {
        let last = self.time_grid.len() - 1;
        self.state.trajectory.column(last)
    }
}

/// Solves independent runs in parallel.
///
/// Results come back in the order of `runs`; one failing run does not affect
/// the others.
pub fn solve_all<'a>(runs: &[Solution<'a, Unsolved>]) -> Vec<Result<Solution<'a, Solved>, PkError>> {
    runs.par_iter().map(|run| run.solve()).collect()
}

fn integrate_dose(model: &Model, t_end: f64, options: &SolverOptions) -> Quadrature {
    let dose = model.dose();
    let over = |end: f64| {
        quadrature::integrate(
            |t| dose.rate_unchecked(t),
            0.0,
            end,
            &dose.breakpoints(end),
            &options.quadrature,
        )
    };

    // Whole periods contribute identical amounts, only the leftover stretch differs
    let result = match dose.period().map(f64::abs) {
        Some(period) if t_end > period => {
            let periods = (t_end / period).floor();
            let rest = (t_end - periods * period).clamp(0.0, period);
            let one = over(period);
            let tail = over(rest);
            Quadrature {
                value: periods * one.value + tail.value,
                error: periods * one.error + tail.error,
                subdivisions: one.subdivisions + tail.subdivisions,
                converged: one.converged && tail.converged,
            }
        }
        _ => over(t_end),
    };
    if !result.converged {
        tracing::warn!(
            model = model.name(),
            error = result.error,
            subdivisions = result.subdivisions,
            "Total dose quadrature did not reach the requested tolerance"
        );
    }
    result
}

fn round_dose(value: f64) -> f64 {
    let scale = 10f64.powi(DOSE_DECIMALS);
    (value * scale).round() / scale
}
