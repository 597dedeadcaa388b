//! Risk classification and dashboard analytics over clinic records.

use infirmary_core::{AnalyticsError, DashboardData, DashboardInput, RiskThresholds};
use serde::Deserialize;
use serde_json::Value;

pub mod dashboard;
pub mod parsing;
pub mod risk;

pub use dashboard::{build_dashboard_analytics, LatestRecords, PatientRiskMap};
pub use parsing::{
    calculate_average, extract_lipid_profile, latest_by_patient, normalize_chronic_factors,
    parse_blood_pressure, patient_name_map, BloodPressure, LipidProfile,
};
pub use risk::{
    calculate_lab_risk, calculate_patient_risk, calculate_vital_risk, has_critical_ldl,
    is_diabetic_watch, is_hypertensive, is_obese, PatientSources,
};

/// Build dashboard analytics from a JSON records document.
pub fn build_dashboard_str(
    records_json: &str,
    thresholds: &RiskThresholds,
) -> Result<DashboardData, AnalyticsError> {
    let value: Value =
        serde_json::from_str(records_json).map_err(|err| AnalyticsError::Parse(err.to_string()))?;
    build_dashboard_value(&value, thresholds)
}

/// Build dashboard analytics from a `serde_json::Value` holding the
/// `patients`, `vitals`, `results` and `consultations` arrays. Missing arrays
/// count as empty.
pub fn build_dashboard_value(
    records: &Value,
    thresholds: &RiskThresholds,
) -> Result<DashboardData, AnalyticsError> {
    if !records.is_object() {
        return Err(AnalyticsError::Parse(
            "expected an object of record collections".to_string(),
        ));
    }
    thresholds.validate()?;

    let input =
        DashboardInput::deserialize(records).map_err(|err| AnalyticsError::Parse(err.to_string()))?;
    Ok(build_dashboard_analytics(&input, thresholds))
}
