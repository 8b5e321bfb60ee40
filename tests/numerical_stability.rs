use approx::assert_relative_eq;
use pkmodel::prelude::dosing::{constant, pulse, sawtooth};
use pkmodel::*;

const REL_TOL: f64 = 1e-4;
const ABS_TOL: f64 = 1e-7;

#[test]
fn constant_infusion_matches_closed_form() {
    let params = TwoCompartment {
        q_p1: 1.0,
        v_c: 1.0,
        v_p1: 1.0,
        cl: 1.0,
        x: 1.0,
    };
    assert_matches_closed_form("reference", params, 1.0, 1000);
}

#[test]
fn stiff_exchange_matches_closed_form() {
    let params = TwoCompartment {
        q_p1: 50.0,
        v_c: 2.0,
        v_p1: 8.0,
        cl: 0.3,
        x: 4.0,
    };
    assert_matches_closed_form("stiff", params, 20.0, 401);
}

#[test]
fn slow_elimination_matches_closed_form() {
    let params = TwoCompartment {
        q_p1: 0.2,
        v_c: 10.0,
        v_p1: 1.0,
        cl: 0.05,
        x: 2.0,
    };
    assert_matches_closed_form("slow", params, 100.0, 101);
}

#[test]
fn trajectory_follows_pulse_windows() {
    let model = Model::new(TwoCompartment::default(), Some(pulse(1.0, 0.5, 1.0))).unwrap();
    let solved = Solution::new(&model, 3.0, 13).unwrap().solve().unwrap();
    let q_c = solved.compartment(0).unwrap();

    // the first half of every period is dose-free
    assert_eq!(q_c[1], 0.0);
    assert!(q_c[4] > q_c[3]);
    assert!(q_c[6] < q_c[5]);
    assert!(q_c[8] > q_c[7]);
    assert!(solved
        .trajectory()
        .iter()
        .all(|q| q.is_finite() && *q >= -1e-12));
}

#[test]
fn long_sawtooth_run_stays_bounded() {
    let params = TwoCompartment {
        cl: 2.0,
        ..Default::default()
    };
    let model = Model::new(params, Some(sawtooth(1.0, 0.05))).unwrap();
    let solved = Solution::new(&model, 50.0, 2001).unwrap().solve().unwrap();

    // steady state of the mean rate 0.5 with CL = 2, V_c = 1
    let q_c = solved.final_state()[0];
    assert!((0.2..0.3).contains(&q_c), "q_c = {q_c}");
    let q_p1 = solved.final_state()[1];
    assert_relative_eq!(q_p1, q_c, max_relative = 0.1);
}

#[test]
fn tighter_tolerances_converge() {
    let model = Model::new(TwoCompartment::default(), Some(constant(1.0))).unwrap();
    let loose = Solution::new(&model, 5.0, 11)
        .unwrap()
        .with_options(SolverOptions {
            rtol: 1e-4,
            atol: 1e-6,
            ..Default::default()
        })
        .unwrap()
        .solve()
        .unwrap();
    let tight = Solution::new(&model, 5.0, 11)
        .unwrap()
        .with_options(SolverOptions {
            rtol: 1e-10,
            atol: 1e-12,
            ..Default::default()
        })
        .unwrap()
        .solve()
        .unwrap();

    for (a, b) in loose.trajectory().iter().zip(tight.trajectory().iter()) {
        assert_relative_eq!(a, b, max_relative = 1e-3, epsilon = 1e-6);
    }
}

fn assert_matches_closed_form(label: &str, params: TwoCompartment, t_end: f64, n: usize) {
    let model = Model::new(params, None).unwrap();
    let solved = Solution::new(&model, t_end, n).unwrap().solve().unwrap();
    assert_eq!(solved.trajectory().shape(), &[2, n], "{label}: shape");

    for (j, &t) in solved.time_grid().iter().enumerate() {
        let expected = closed_form(&params, t);
        for i in 0..2 {
            let actual = solved.trajectory()[[i, j]];
            assert_relative_eq!(
                actual,
                expected[i],
                max_relative = REL_TOL,
                epsilon = ABS_TOL
            );
        }
    }
}

/// Exact solution of the linear two-compartment system under constant
/// infusion at rate `X`, starting from empty compartments.
///
/// With `dy/dt = A y + b`, `y(t) = sum_k (exp(l_k t) - 1) / l_k * P_k b`
/// where `l_k` are the eigenvalues of `A` and `P_k` its spectral projectors.
fn closed_form(params: &TwoCompartment, t: f64) -> [f64; 2] {
    let a = [
        [
            -(params.cl + params.q_p1) / params.v_c,
            params.q_p1 / params.v_p1,
        ],
        [params.q_p1 / params.v_c, -params.q_p1 / params.v_p1],
    ];
    let trace = a[0][0] + a[1][1];
    let det = a[0][0] * a[1][1] - a[0][1] * a[1][0];
    let root = (trace * trace / 4.0 - det).sqrt();
    let (l1, l2) = (trace / 2.0 + root, trace / 2.0 - root);

    // P_1 b = (A - l2 I) b / (l1 - l2), P_2 b = (A - l1 I) b / (l2 - l1), b = [X, 0]
    let b0 = params.x;
    let p1b = [(a[0][0] - l2) * b0 / (l1 - l2), a[1][0] * b0 / (l1 - l2)];
    let p2b = [(a[0][0] - l1) * b0 / (l2 - l1), a[1][0] * b0 / (l2 - l1)];

    let w1 = (l1 * t).exp_m1() / l1;
    let w2 = (l2 * t).exp_m1() / l2;
    [w1 * p1b[0] + w2 * p2b[0], w1 * p1b[1] + w2 * p2b[1]]
}

#[test]
fn stiff_elimination_fails_with_an_integration_error() {
    // elimination rate CL / V_c = 1e6 is far beyond what an explicit stepper can follow
    let params = TwoCompartment {
        v_c: 1e-3,
        cl: 1e3,
        ..Default::default()
    };
    let model = Model::new(params, None).unwrap();
    match Solution::new(&model, 1.0, 10).unwrap().solve() {
        Err(PkError::Integration(err)) => {
            assert!(err.reached > 0.0, "reached {}", err.reached);
            assert!(err.reached < err.target);
            assert!(err.target <= 1.0);
        }
        other => panic!("expected an integration error, got {other:?}"),
    }
}
