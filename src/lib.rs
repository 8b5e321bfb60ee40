pub mod config;
pub mod dosing;
pub mod error;
pub mod logger;
pub mod model;
pub mod simulator;

pub use crate::config::Scenario;
pub use crate::dosing::Dosing;
pub use crate::model::{
    Compartments, DepotKinetics, Model, ModelKind, ParameterSet, ParameterValue,
    ThreeCompartment, TwoCompartment,
};
pub use crate::simulator::{solve_all, Simulation, Solution, Solved, SolverOptions, Unsolved};
pub use error::{ConfigurationError, DomainError, IntegrationError, PkError, StateError};

pub mod prelude {
    pub mod dosing {
        pub use crate::dosing::{constant, pulse, sawtooth, sine, Dosing};
    }
    pub mod models {
        pub use crate::model::{
            Compartments, DepotKinetics, Model, ModelKind, ThreeCompartment, TwoCompartment,
        };
    }
    pub mod simulator {
        pub use crate::simulator::{
            quadrature::{Quadrature, QuadratureOptions},
            solve_all, Simulation, Solution, Solved, SolverOptions, Unsolved,
        };
    }

    pub use crate::config::Scenario;
    pub use crate::logger::{setup_log, LogSettings};
    pub use crate::model::{ParameterSet, ParameterValue};
    pub use crate::PkError;

    /// Builds a [`ParameterSet`](crate::ParameterSet) from `key => value` pairs.
    ///
    /// ```rust
    /// use pkmodel::params;
    ///
    /// let set = params!["Q_p1" => 1.0, "V_c" => 2.0];
    /// assert_eq!(set.number("V_c").unwrap(), Some(2.0));
    /// ```
    #[macro_export]
    macro_rules! params {
        ($($k:expr => $v:expr),* $(,)?) => {{
            $crate::ParameterSet::from([$(($k, $v as f64),)*])
        }};
    }
}
