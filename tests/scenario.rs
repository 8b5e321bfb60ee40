use pkmodel::*;

const SCENARIO: &str = r#"{
    "model": "two_compartment",
    "parameters": {
        "name": "model1",
        "Q_p1": 1.0,
        "V_c": 1.0,
        "V_p1": 1.0,
        "CL": 1.0,
        "X": 1.0
    },
    "dosing": { "kind": "pulse", "strength": 1.0, "onset": 0.1, "period": 0.2 },
    "t_end": 1.0,
    "steps": 1000
}"#;

#[test]
fn scenario_file_runs_end_to_end() {
    let path = std::env::temp_dir().join(format!("pkmodel-scenario-{}.json", std::process::id()));
    std::fs::write(&path, SCENARIO).unwrap();
    let scenario = Scenario::from_file(&path).unwrap();
    std::fs::remove_file(&path).unwrap();

    let model = scenario.model().unwrap();
    assert_eq!(model.name(), "model1");
    assert_eq!(model.kind(), ModelKind::TwoCompartment);

    let solution = scenario.solution(&model).unwrap();
    assert_eq!(solution.total_dose(), 0.5);

    let solved = solution.solve().unwrap();
    assert_eq!(solved.trajectory().shape(), &[2, 1000]);
    assert!(solved.final_state().iter().all(|q| *q > 0.0));
}

#[test]
fn scenario_matches_the_programmatic_setup() {
    let scenario = Scenario::from_json(SCENARIO).unwrap();
    let from_file = scenario.model().unwrap();

    let set = params!["Q_p1" => 1.0, "V_c" => 1.0, "V_p1" => 1.0, "CL" => 1.0, "X" => 1.0]
        .with_name("model1");
    let by_hand = Model::two_compartment(Some(&set), Some(dosing::pulse(1.0, 0.1, 0.2))).unwrap();
    assert_eq!(from_file, by_hand);

    let a = scenario.solution(&from_file).unwrap().solve().unwrap();
    let b = Solution::new(&by_hand, 1.0, 1000).unwrap().solve().unwrap();
    assert_eq!(a.trajectory(), b.trajectory());
}

#[test]
fn degenerate_dosing_in_a_scenario_is_a_domain_error() {
    let scenario = Scenario::from_json(
        r#"{"model": "two_compartment", "dosing": {"kind": "sawtooth", "strength": 1.0, "period": 0.0}}"#,
    )
    .unwrap();
    let model = scenario.model().unwrap();
    assert!(matches!(
        scenario.solution(&model),
        Err(PkError::Domain(DomainError::ZeroPeriod { kind: "sawtooth" }))
    ));
}

#[test]
fn text_where_a_number_belongs_is_rejected() {
    let scenario = Scenario::from_json(
        r#"{"model": "two_compartment", "parameters": {"Q_p1": "fast", "V_c": 1.0, "V_p1": 1.0, "CL": 1.0, "X": 1.0}}"#,
    )
    .unwrap();
    assert!(matches!(
        scenario.model(),
        Err(ConfigurationError::InvalidParameter { .. })
    ));
}
