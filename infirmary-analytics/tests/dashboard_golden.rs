use std::fs;

use infirmary_analytics::build_dashboard_str;
use infirmary_core::{DashboardData, RiskThresholds};

fn fixture_path(name: &str) -> String {
    format!("{}/tests/data/{name}", env!("CARGO_MANIFEST_DIR"))
}

#[test]
fn clinic_records_match_golden() {
    let records = fs::read_to_string(fixture_path("clinic_records.json"))
        .expect("could not read records fixture");

    let actual = build_dashboard_str(&records, &RiskThresholds::default())
        .expect("could not build dashboard");

    let expected = fs::read_to_string(fixture_path("clinic_dashboard.json"))
        .expect("could not read golden dashboard");
    let expected: DashboardData = serde_json::from_str(&expected).expect("golden is not valid");

    assert_eq!(actual, expected);
}

#[test]
fn golden_serializes_with_presentation_names() {
    let records = fs::read_to_string(fixture_path("clinic_records.json"))
        .expect("could not read records fixture");
    let actual = build_dashboard_str(&records, &RiskThresholds::default())
        .expect("could not build dashboard");

    let value = serde_json::to_value(actual).expect("could not serialize dashboard");
    assert_eq!(value["criticalLDLCount"], 1);
    assert_eq!(value["bmiVsBP"][0]["user_uuid"], "p1");
    assert_eq!(value["atRiskCohort"][1]["status"], "At Risk");
    assert_eq!(value["lipidProfile"][0]["healthyLimit"], 200.0);
    assert_eq!(value["atRiskCohort"][0]["lastCheckup"], "2024-03-02T10:00:00Z");
}
