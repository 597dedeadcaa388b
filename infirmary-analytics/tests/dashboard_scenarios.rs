use infirmary_analytics::{
    build_dashboard_analytics, build_dashboard_str, build_dashboard_value,
};
use infirmary_core::{
    AnalyticsError, DashboardData, DashboardInput, MetricThreshold, RiskLevel, RiskThresholds,
};
use serde_json::{json, Value};

fn build(records: Value) -> DashboardData {
    build_dashboard_value(&records, &RiskThresholds::default()).expect("dashboard should build")
}

fn bucket(data: &DashboardData, level: RiskLevel) -> usize {
    data.risk_stratification
        .iter()
        .find(|bucket| bucket.name == level)
        .map(|bucket| bucket.value)
        .unwrap_or_default()
}

#[test]
fn critical_consultation_with_at_risk_vitals_and_critical_ldl() {
    let data = build(json!({
        "patients": [{ "uuid": "u1", "name": "Dana Cruz", "department": "Finance" }],
        "consultations": [{
            "uuid": "u1",
            "date_of_check": "2024-05-01",
            "medical_clearance": "Critical",
            "chronic_risk_factor": "Hypertension"
        }],
        "vitals": [{ "user_uuid": "u1", "date_of_check": "2024-05-01", "blood_pressure": "150/95" }],
        "results": [{ "user_uuid": "u1", "created_at": "2024-05-02", "ldl": 170 }]
    }));

    assert_eq!(bucket(&data, RiskLevel::Critical), 1);
    assert_eq!(bucket(&data, RiskLevel::AtRisk), 0);
    assert_eq!(bucket(&data, RiskLevel::Normal), 0);

    assert_eq!(data.at_risk_cohort.len(), 1);
    let entry = &data.at_risk_cohort[0];
    assert_eq!(entry.uuid, "u1");
    assert_eq!(entry.name, "Dana Cruz");
    assert_eq!(entry.status, RiskLevel::Critical);
    for factor in ["Hypertension", "BP: 150/95", "LDL: 170"] {
        assert!(entry.chronic_factors.iter().any(|f| f == factor), "missing {factor}");
    }

    assert_eq!(data.critical_ldl_count, 1);
    assert_eq!(data.hypertensive_count, 1);
    assert_eq!(data.obesity_count, 0);
    assert_eq!(data.diabetic_watch_count, 0);
}

#[test]
fn empty_input_degrades_to_identity() {
    let data = build(json!({}));
    assert_eq!(data.total_patients, 0);
    assert_eq!(data.hypertensive_count, 0);
    assert!(data.risk_stratification.iter().all(|bucket| bucket.value == 0));
    assert_eq!(data.risk_stratification.len(), 3);
    assert!(data.chronic_factors.is_empty());
    assert!(data.lipid_profile.iter().all(|row| row.average == 0.0));
    assert_eq!(data.lipid_profile.len(), 4);
    assert!(data.bmi_vs_bp.is_empty());
    assert!(data.at_risk_cohort.is_empty());
    assert!(data.department_risk_mix.is_empty());
    assert!(data.department_chronic_risk_mix.is_empty());
}

#[test]
fn only_latest_records_count() {
    let data = build(json!({
        "vitals": [
            { "user_uuid": "u1", "date_of_check": "2024-06-01", "blood_pressure": "120/80" },
            { "user_uuid": "u1", "date_of_check": "2024-01-01", "blood_pressure": "180/110" },
            { "user_uuid": "u1", "date_of_check": "garbage", "blood_pressure": "200/120" }
        ]
    }));
    assert_eq!(data.hypertensive_count, 0);
    assert_eq!(bucket(&data, RiskLevel::Normal), 1);
    assert!(data.at_risk_cohort.is_empty());
}

#[test]
fn unknown_patients_are_named_unknown() {
    let data = build(json!({
        "results": [{ "user_uuid": "ghost", "created_at": "2024-01-01", "hba1c": "9.2" }]
    }));
    assert_eq!(data.at_risk_cohort.len(), 1);
    assert_eq!(data.at_risk_cohort[0].name, "Unknown");
    assert_eq!(data.at_risk_cohort[0].status, RiskLevel::Critical);
    assert_eq!(data.diabetic_watch_count, 1);
}

#[test]
fn cohort_lists_critical_first_and_dedupes_factors() {
    let data = build(json!({
        "patients": [
            { "uuid": "a", "name": "Alpha" },
            { "uuid": "b", "name": "Bravo" }
        ],
        "consultations": [
            {
                "uuid": "a",
                "date_of_check": "2024-01-01",
                "medical_clearance": "At Risk",
                "chronic_risk_factor": "Smoking, smoking"
            },
            { "uuid": "b", "date_of_check": "2024-01-01", "medical_clearance": "Critical" }
        ]
    }));
    assert_eq!(data.at_risk_cohort.len(), 2);
    assert_eq!(data.at_risk_cohort[0].uuid, "b");
    assert_eq!(data.at_risk_cohort[0].chronic_factors, vec!["Critical Condition"]);
    assert_eq!(data.at_risk_cohort[1].uuid, "a");
    assert_eq!(data.at_risk_cohort[1].chronic_factors, vec!["Smoking"]);
    assert_eq!(data.chronic_factors[0].name, "Smoking");
    assert_eq!(data.chronic_factors[0].count, 2);
}

#[test]
fn chronic_histogram_keeps_top_six() {
    let factors = ["A", "B", "C", "D", "E", "F", "G"];
    let consultations: Vec<Value> = factors
        .iter()
        .enumerate()
        .map(|(index, _)| {
            let listed = factors[..=index].join(", ");
            json!({ "uuid": format!("u{index}"), "chronic_risk_factor": listed })
        })
        .collect();
    let data = build(json!({ "consultations": consultations }));

    let names: Vec<&str> = data
        .chronic_factors
        .iter()
        .map(|row| row.name.as_str())
        .collect();
    assert_eq!(names, vec!["A", "B", "C", "D", "E", "F"]);
    assert_eq!(data.chronic_factors[0].count, 7);
    assert_eq!(data.chronic_factors[5].count, 2);
}

#[test]
fn scatter_drops_points_without_positive_values() {
    let data = build(json!({
        "vitals": [
            { "user_uuid": "a", "blood_pressure": "130/80", "bmi": 27 },
            { "user_uuid": "b", "blood_pressure": "130/80", "bmi": 0 },
            { "user_uuid": "c", "blood_pressure": "0/80", "bmi": 27 },
            { "user_uuid": "d", "bmi": 27 }
        ]
    }));
    assert_eq!(data.bmi_vs_bp.len(), 1);
    assert_eq!(data.bmi_vs_bp[0].user_uuid, "a");
}

#[test]
fn department_fractions_sum_to_one() {
    let departments = ["Admin", "Clinic", "Ops"];
    let clearances = ["Normal", "At Risk", "Critical"];
    let factors = ["smoking", "drinking", "hypertension", "diabetes", "none", "asthma"];

    let mut patients = Vec::new();
    let mut consultations = Vec::new();
    for index in 0..29 {
        let uuid = format!("u{index}");
        patients.push(json!({ "uuid": uuid, "department": departments[index % 3] }));
        if index % 4 != 0 {
            consultations.push(json!({
                "uuid": uuid,
                "medical_clearance": clearances[(index / 2) % 3],
                "chronic_risk_factor": factors[index % 6]
            }));
        }
    }

    let data = build(json!({ "patients": patients, "consultations": consultations }));
    assert_eq!(data.department_risk_mix.len(), 3);
    for mix in &data.department_risk_mix {
        assert!(mix.total > 0);
        assert!((mix.green + mix.yellow + mix.red - 1.0).abs() < 1e-9, "{mix:?}");
    }
    for mix in &data.department_chronic_risk_mix {
        let sum = mix.smoking + mix.drinking + mix.hypertension + mix.diabetes + mix.none;
        assert!((sum - 1.0).abs() < 1e-9, "{mix:?}");
    }
}

#[test]
fn departments_sorted_by_red_then_yellow() {
    let data = build(json!({
        "patients": [
            { "uuid": "a", "department": "Calm" },
            { "uuid": "b", "department": "Busy" },
            { "uuid": "c", "department": "Busy" },
            { "uuid": "d", "department": "Hot" }
        ],
        "consultations": [
            { "uuid": "b", "medical_clearance": "At Risk" },
            { "uuid": "d", "medical_clearance": "Critical" }
        ]
    }));
    let order: Vec<&str> = data
        .department_risk_mix
        .iter()
        .map(|mix| mix.department.as_str())
        .collect();
    assert_eq!(order, vec!["Hot", "Busy", "Calm"]);
}

#[test]
fn stricter_thresholds_change_classification() {
    let input: DashboardInput = serde_json::from_value(json!({
        "vitals": [{ "user_uuid": "a", "blood_pressure": "120/80", "bmi": 27 }]
    }))
    .expect("records should parse");

    let default = build_dashboard_analytics(&input, &RiskThresholds::default());
    assert_eq!(default.obesity_count, 0);

    let strict = RiskThresholds {
        bmi: MetricThreshold::new(25.0, 26.0),
        ..RiskThresholds::default()
    };
    let data = build_dashboard_analytics(&input, &strict);
    assert_eq!(data.obesity_count, 1);
    assert_eq!(data.at_risk_cohort[0].status, RiskLevel::Critical);
}

#[test]
fn repeated_builds_are_identical() {
    let records = json!({
        "patients": [{ "uuid": "a", "department": "X" }],
        "vitals": [{ "user_uuid": "a", "blood_pressure": "165/100", "bmi": 33 }],
        "results": [{ "user_uuid": "a", "ldl": 140, "hba1c": 6.6 }]
    });
    assert_eq!(build(records.clone()), build(records));
}

#[test]
fn boundary_errors() {
    assert!(matches!(
        build_dashboard_str("{not json", &RiskThresholds::default()),
        Err(AnalyticsError::Parse(_))
    ));
    assert!(matches!(
        build_dashboard_value(&json!([]), &RiskThresholds::default()),
        Err(AnalyticsError::Parse(_))
    ));
    let inverted = RiskThresholds {
        ldl: MetricThreshold::new(170.0, 160.0),
        ..RiskThresholds::default()
    };
    assert!(matches!(
        build_dashboard_value(&json!({}), &inverted),
        Err(AnalyticsError::InvalidThresholds(_))
    ));
}

#[test]
fn patient_without_uuid_stays_apart_from_unkeyed_records() {
    let data = build(json!({
        "patients": [
            { "name": "Carlo", "department": "Ops" },
            { "uuid": "o1", "name": "Olive", "department": "Ops" }
        ],
        "results": [{ "created_at": "2024-01-01", "ldl": 190 }]
    }));
    assert_eq!(data.at_risk_cohort.len(), 1);
    assert_eq!(data.at_risk_cohort[0].uuid, "");
    assert_eq!(data.at_risk_cohort[0].name, "Unknown");
    assert_eq!(data.at_risk_cohort[0].last_checkup.as_deref(), Some("2024-01-01"));

    let ops = &data.department_risk_mix[0];
    assert_eq!(ops.department, "Ops");
    assert_eq!(ops.total, 2);
    assert_eq!(ops.green, 1.0);
    assert_eq!(ops.red, 0.0);
}
