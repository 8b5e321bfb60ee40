use ndarray::{Array1, Array2};

use crate::{
    error::{PkError, StateError},
    model::Model,
    simulator::{Solution, Solved, Unsolved},
};

/// A simulation run whose solved state is only known at runtime.
///
/// [`Solution`] tracks solving in its type. When the run has to live in a
/// collection or behind a shared handle, `Simulation` holds either stage and
/// reports [`StateError::NotSolved`] when results are requested too early.
#[derive(Debug, Clone)]
pub enum Simulation<'a> {
    Pending(Solution<'a, Unsolved>),
    Complete(Solution<'a, Solved>),
}

impl<'a> Simulation<'a> {
    pub fn new(model: &'a Model, t_end: f64, n: usize) -> Result<Self, PkError> {
        Ok(Solution::new(model, t_end, n)?.into())
    }

    pub fn is_solved(&self) -> bool {
        matches!(self, Simulation::Complete(_))
    }

    /// Integrates the model. Solving again recomputes the trajectory from
    /// the same configuration.
    pub fn solve(&mut self) -> Result<&Solution<'a, Solved>, PkError> {
        let solved = match self {
            Simulation::Pending(pending) => pending.solve()?,
            Simulation::Complete(complete) => complete.to_pending().solve()?,
        };
        *self = Simulation::Complete(solved);
        Ok(self.solved()?)
    }

    /// The solved run, or [`StateError::NotSolved`].
    pub fn solved(&self) -> Result<&Solution<'a, Solved>, StateError> {
        match self {
            Simulation::Complete(solved) => Ok(solved),
            Simulation::Pending(_) => Err(StateError::NotSolved),
        }
    }

    pub fn trajectory(&self) -> Result<&Array2<f64>, StateError> {
        Ok(self.solved()?.trajectory())
    }

    pub fn model(&self) -> &'a Model {
        match self {
            Simulation::Pending(s) => s.model(),
            Simulation::Complete(s) => s.model(),
        }
    }

    pub fn time_grid(&self) -> &Array1<f64> {
        match self {
            Simulation::Pending(s) => s.time_grid(),
            Simulation::Complete(s) => s.time_grid(),
        }
    }

    pub fn initial_state(&self) -> &[f64] {
        match self {
            Simulation::Pending(s) => s.initial_state(),
            Simulation::Complete(s) => s.initial_state(),
        }
    }

    pub fn total_dose(&self) -> f64 {
        match self {
            Simulation::Pending(s) => s.total_dose(),
            Simulation::Complete(s) => s.total_dose(),
        }
    }
}

impl<'a> From<Solution<'a, Unsolved>> for Simulation<'a> {
    fn from(solution: Solution<'a, Unsolved>) -> Self {
        Simulation::Pending(solution)
    }
}

impl<'a> From<Solution<'a, Solved>> for Simulation<'a> {
    fn from(solution: Solution<'a, Solved>) -> Self {
        Simulation::Complete(solution)
    }
}
