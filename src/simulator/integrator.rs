use ndarray::Array2;
use ode_solvers::dop_shared::{IntegrationError as SolverError, OutputType};
use ode_solvers::{Dopri5, SVector, System};

use crate::{
    error::IntegrationError,
    model::{Model, ModelKind},
    simulator::SolverOptions,
};

/// Segments shorter than this many machine epsilons (relative to their end
/// time) are rounding artefacts of grid and breakpoint arithmetic.
const NEGLIGIBLE_SEGMENT: f64 = 64.0;

/// Dormand–Prince step size controller constants.
const SAFETY_FACTOR: f64 = 0.9;
const BETA: f64 = 0.04;
const FAC_MIN: f64 = 0.2;
const FAC_MAX: f64 = 10.0;
const MAX_STEPS: u32 = 100_000;
const STIFFNESS_CHECK: u32 = 1000;

/// Adapts a [`Model`] to the `ode_solvers` system interface.
struct CompartmentSystem<'a> {
    model: &'a Model,
}

impl<const N: usize> System<f64, SVector<f64, N>> for CompartmentSystem<'_> {
    fn system(&self, t: f64, y: &SVector<f64, N>, dy: &mut SVector<f64, N>) {
        self.model.rhs_into(t, y.as_slice(), dy.as_mut_slice());
    }
}

/// Integrates `model` from `y0` and records the state at every point of `grid`.
///
/// The returned array is `dim × grid.len()`. The dosing function must have
/// been validated and `y0` must have length `model.dim()`.
pub(crate) fn integrate(
    model: &Model,
    grid: &[f64],
    y0: &[f64],
    options: &SolverOptions,
) -> Result<Array2<f64>, IntegrationError> {
    match model.kind() {
        ModelKind::TwoCompartment => march::<2>(model, grid, y0, options),
        ModelKind::ThreeCompartment => march::<3>(model, grid, y0, options),
    }
}

fn march<const N: usize>(
    model: &Model,
    grid: &[f64],
    y0: &[f64],
    options: &SolverOptions,
) -> Result<Array2<f64>, IntegrationError> {
    let mut trajectory = Array2::zeros((N, grid.len()));
    let Some(&t_end) = grid.last() else {
        return Ok(trajectory);
    };

    // Stop at every dosing discontinuity so no step straddles a jump
    let breakpoints = model.dose().breakpoints(t_end);
    let mut stops = breakpoints.into_iter().peekable();

    let mut y = SVector::<f64, N>::from_column_slice(y0);
    let mut t = grid[0];
    let mut evaluations: u64 = 0;

    for (j, &target) in grid.iter().enumerate() {
        while let Some(stop) = stops.next_if(|&stop| stop < target) {
            if stop > t {
                if !negligible(t, stop) {
                    y = advance(model, t, stop, y, options, &mut evaluations)?;
                }
                t = stop;
            }
        }
        if target > t {
            if !negligible(t, target) {
                y = advance(model, t, target, y, options, &mut evaluations)?;
            }
            t = target;
        }
        for (i, value) in y.iter().enumerate() {
            trajectory[[i, j]] = *value;
        }
    }

    tracing::debug!(
        model = model.name(),
        evaluations,
        "Integrated {} points up to t = {}",
        grid.len(),
        t
    );
    Ok(trajectory)
}

/// Whether `[from, to]` is too short to hand to the stepper.
///
/// A breakpoint computed as `k * period` can land a few ulps away from a
/// grid point; the stepper rejects such an interval as a step size underflow.
fn negligible(from: f64, to: f64) -> bool {
    to - from <= NEGLIGIBLE_SEGMENT * f64::EPSILON * to.abs().max(1.0)
}

/// Runs one Dormand–Prince integration from `from` to `to`.
fn advance<const N: usize>(
    model: &Model,
    from: f64,
    to: f64,
    y: SVector<f64, N>,
    options: &SolverOptions,
    evaluations: &mut u64,
) -> Result<SVector<f64, N>, IntegrationError> {
    let system = CompartmentSystem { model };
    // Sparse output: one entry per accepted step, the last one at `to`
    let mut stepper = Dopri5::from_param(
        system,
        from,
        to,
        to - from,
        y,
        options.rtol,
        options.atol,
        SAFETY_FACTOR,
        BETA,
        FAC_MIN,
        FAC_MAX,
        to - from,
        0.0,
        MAX_STEPS,
        STIFFNESS_CHECK,
        OutputType::Sparse,
    );

    match stepper.integrate() {
        Ok(stats) => *evaluations += stats.num_eval as u64,
        Err(err) => {
            let reached = match err {
                SolverError::MaxNumStepReached { x, .. }
                | SolverError::StepSizeUnderflow { x }
                | SolverError::StiffnessDetected { x } => x,
            };
            tracing::error!(
                model = model.name(),
                "ODE solver failed at t = {} (target {}): {}",
                reached,
                to,
                err
            );
            return Err(IntegrationError {
                reached,
                target: to,
                reason: err.to_string(),
            });
        }
    }
    tracing::trace!(from, to, steps = stepper.x_out().len(), "segment integrated");

    let Some(next) = stepper.y_out().last().copied() else {
        return Err(IntegrationError {
            reached: from,
            target: to,
            reason: "the solver produced no output".to_string(),
        });
    };
    if next.iter().any(|value| !value.is_finite()) {
        return Err(IntegrationError {
            reached: from,
            target: to,
            reason: "the state became non-finite".to_string(),
        });
    }
    Ok(next)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{dosing, model::TwoCompartment};
    use approx::assert_relative_eq;
    use ndarray::Array1;

    #[test]
    fn grid_points_are_recorded_in_order() {
        let model = Model::new(TwoCompartment::default(), None).unwrap();
        let grid = [0.0, 0.5, 1.0];
        let trajectory =
            integrate(&model, &grid, &[0.0, 0.0], &SolverOptions::default()).unwrap();
        assert_eq!(trajectory.shape(), &[2, 3]);
        assert_eq!(trajectory[[0, 0]], 0.0);
        assert!(trajectory[[0, 1]] > 0.0);
        assert!(trajectory[[1, 2]] > trajectory[[1, 1]]);
    }

    #[test]
    fn pure_elimination_decays_exponentially() {
        // Without transfer the central compartment follows q_c(0) * exp(-CL/V_c * t)
        let params = TwoCompartment {
            q_p1: 0.0,
            v_c: 2.0,
            v_p1: 1.0,
            cl: 1.0,
            x: 0.0,
        };
        let model = Model::new(params, Some(dosing::constant(0.0))).unwrap();
        let grid = [0.0, 1.0, 2.0, 4.0];
        let trajectory =
            integrate(&model, &grid, &[10.0, 0.0], &SolverOptions::default()).unwrap();
        for (j, &t) in grid.iter().enumerate() {
            assert_relative_eq!(
                trajectory[[0, j]],
                10.0 * (-0.5 * t).exp(),
                max_relative = 1e-5
            );
            assert_eq!(trajectory[[1, j]], 0.0);
        }
    }

    #[test]
    fn repeated_grid_points_hold_the_state() {
        let model = Model::new(TwoCompartment::default(), None).unwrap();
        let grid = [0.0, 0.0, 0.0];
        let trajectory =
            integrate(&model, &grid, &[1.0, 2.0], &SolverOptions::default()).unwrap();
        for j in 0..3 {
            assert_eq!(trajectory[[0, j]], 1.0);
            assert_eq!(trajectory[[1, j]], 2.0);
        }
    }

    #[test]
    fn one_long_segment_ends_at_its_target() {
        let params = TwoCompartment {
            q_p1: 0.0,
            v_c: 1.0,
            v_p1: 1.0,
            cl: 1.0,
            x: 0.0,
        };
        let model = Model::new(params, Some(dosing::constant(0.0))).unwrap();
        for grid in [[0.0, 10.0], [2.0, 3.0]] {
            let trajectory =
                integrate(&model, &grid, &[1.0, 0.0], &SolverOptions::default()).unwrap();
            let span = grid[1] - grid[0];
            assert_relative_eq!(
                trajectory[[0, 1]],
                (-span).exp(),
                max_relative = 1e-5,
                epsilon = 1e-7
            );
        }
    }

    #[test]
    fn breakpoints_a_rounding_error_away_from_grid_points() {
        // resets at k * 0.3 land within a few ulps of grid points such as 0.9
        let model = Model::new(TwoCompartment::default(), Some(dosing::sawtooth(2.0, 0.3))).unwrap();
        let n = 3001;
        let grid = Array1::linspace(0.0, 3.0, n).to_vec();
        let trajectory = integrate(&model, &grid, &[0.0, 0.0], &SolverOptions::default()).unwrap();
        assert_eq!(trajectory.shape(), &[2, n]);
        assert!(trajectory.iter().all(|q| q.is_finite()));

        let j = 900;
        let coarse = integrate(
            &model,
            &[0.0, grid[j], 3.0],
            &[0.0, 0.0],
            &SolverOptions::default(),
        )
        .unwrap();
        for i in 0..2 {
            assert_relative_eq!(trajectory[[i, j]], coarse[[i, 1]], max_relative = 1e-4);
            assert_relative_eq!(trajectory[[i, n - 1]], coarse[[i, 2]], max_relative = 1e-4);
        }
    }

    #[test]
    fn failures_report_where_the_solver_stopped() {
        let params = TwoCompartment {
            v_c: 1e-3,
            cl: 1e3,
            ..Default::default()
        };
        let model = Model::new(params, None).unwrap();
        let err = integrate(&model, &[0.0, 1.0], &[0.0, 0.0], &SolverOptions::default())
            .unwrap_err();
        assert!(err.reached > 0.0 && err.reached < 1.0, "reached {}", err.reached);
        assert_eq!(err.target, 1.0);
        assert!(!err.reason.is_empty());
    }

    #[test]
    fn negligible_segments_are_skipped() {
        assert!(negligible(0.9 - 1e-16, 0.9));
        assert!(negligible(1e6 * (1.0 - f64::EPSILON), 1e6));
        assert!(!negligible(0.0, 1e-9));
        assert!(!negligible(0.89, 0.9));
    }
}
