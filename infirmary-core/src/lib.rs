//! Shared record, configuration and dashboard types for the infirmary risk engine.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Patient risk level, ordered `Normal < AtRisk < Critical`.
#[derive(
    Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash,
)]
pub enum RiskLevel {
    #[default]
    Normal,
    #[serde(rename = "At Risk")]
    AtRisk,
    Critical,
}

impl RiskLevel {
    /// All levels in ascending order.
    pub const ALL: [RiskLevel; 3] = [RiskLevel::Normal, RiskLevel::AtRisk, RiskLevel::Critical];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Normal => "Normal",
            Self::AtRisk => "At Risk",
            Self::Critical => "Critical",
        }
    }

    /// Reads a clinician-entered clearance label. Unknown labels yield `None`.
    pub fn from_label(label: &str) -> Option<Self> {
        let normalized = label.trim().to_lowercase().replace(['-', '_'], " ");
        match normalized.split_whitespace().collect::<Vec<_>>().join(" ").as_str() {
            "normal" => Some(Self::Normal),
            "at risk" => Some(Self::AtRisk),
            "critical" => Some(Self::Critical),
            _ => None,
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Risk level plus the human-readable factors that produced it.
///
/// Every accumulation in the engine goes through [`RiskAssessment::record`] and
/// [`RiskAssessment::absorb`], so a level can only ever be raised.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct RiskAssessment {
    pub risk: RiskLevel,
    pub factors: Vec<String>,
}

impl RiskAssessment {
    /// Raises the level to `level` if it is higher than the current one.
    pub fn escalate(&mut self, level: RiskLevel) {
        if level > self.risk {
            self.risk = level;
        }
    }

    /// Escalates and appends `factor`. A `Normal` finding is ignored.
    pub fn record(&mut self, level: RiskLevel, factor: impl Into<String>) {
        if level == RiskLevel::Normal {
            return;
        }
        self.escalate(level);
        self.factors.push(factor.into());
    }

    /// Folds another assessment in: maximum level, factors appended in order.
    pub fn absorb(&mut self, other: RiskAssessment) {
        self.escalate(other.risk);
        self.factors.extend(other.factors);
    }

    pub fn is_elevated(&self) -> bool {
        self.risk > RiskLevel::Normal
    }
}

/// At-Risk / Critical bounds for one metric. Both bounds are exclusive.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct MetricThreshold {
    pub at_risk: f64,
    pub critical: f64,
}

impl MetricThreshold {
    pub const fn new(at_risk: f64, critical: f64) -> Self {
        Self { at_risk, critical }
    }

    /// Absent values never cross a bound.
    pub fn classify(&self, value: Option<f64>) -> RiskLevel {
        match value {
            Some(v) if v > self.critical => RiskLevel::Critical,
            Some(v) if v > self.at_risk => RiskLevel::AtRisk,
            _ => RiskLevel::Normal,
        }
    }

    pub fn exceeds_at_risk(&self, value: Option<f64>) -> bool {
        matches!(value, Some(v) if v > self.at_risk)
    }
}

/// Fixed thresholds used by every risk rule.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct RiskThresholds {
    pub systolic: MetricThreshold,
    pub diastolic: MetricThreshold,
    pub bmi: MetricThreshold,
    pub ldl: MetricThreshold,
    pub hba1c: MetricThreshold,
}

impl Default for RiskThresholds {
    fn default() -> Self {
        Self {
            systolic: MetricThreshold::new(140.0, 160.0),
            diastolic: MetricThreshold::new(90.0, 100.0),
            bmi: MetricThreshold::new(30.0, 35.0),
            ldl: MetricThreshold::new(130.0, 160.0),
            hba1c: MetricThreshold::new(6.5, 8.0),
        }
    }
}

impl RiskThresholds {
    fn metrics(&self) -> [(&'static str, &MetricThreshold); 5] {
        [
            ("systolic", &self.systolic),
            ("diastolic", &self.diastolic),
            ("bmi", &self.bmi),
            ("ldl", &self.ldl),
            ("hba1c", &self.hba1c),
        ]
    }

    /// Rejects non-finite bounds and At-Risk bounds above their Critical bound.
    pub fn validate(&self) -> Result<(), AnalyticsError> {
        for (name, metric) in self.metrics() {
            if !metric.at_risk.is_finite() || !metric.critical.is_finite() {
                return Err(AnalyticsError::InvalidThresholds(format!(
                    "{name} bounds must be finite numbers"
                )));
            }
            if metric.at_risk > metric.critical {
                return Err(AnalyticsError::InvalidThresholds(format!(
                    "{name} at_risk bound {} exceeds critical bound {}",
                    metric.at_risk, metric.critical
                )));
            }
        }
        Ok(())
    }

    /// Applies a partial overlay on top of these thresholds.
    pub fn with_overrides(mut self, overrides: &ThresholdOverrides) -> Self {
        let pairs = [
            (&mut self.systolic, &overrides.systolic),
            (&mut self.diastolic, &overrides.diastolic),
            (&mut self.bmi, &overrides.bmi),
            (&mut self.ldl, &overrides.ldl),
            (&mut self.hba1c, &overrides.hba1c),
        ];
        for (metric, bound) in pairs {
            let Some(bound) = bound else {
                continue;
            };
            if let Some(at_risk) = bound.at_risk {
                metric.at_risk = at_risk;
            }
            if let Some(critical) = bound.critical {
                metric.critical = critical;
            }
        }
        self
    }
}

/// Partial thresholds as read from a config file or the JS bridge.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ThresholdOverrides {
    #[serde(default)]
    pub systolic: Option<BoundOverride>,
    #[serde(default)]
    pub diastolic: Option<BoundOverride>,
    #[serde(default)]
    pub bmi: Option<BoundOverride>,
    #[serde(default)]
    pub ldl: Option<BoundOverride>,
    #[serde(default)]
    pub hba1c: Option<BoundOverride>,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct BoundOverride {
    #[serde(default)]
    pub at_risk: Option<f64>,
    #[serde(default)]
    pub critical: Option<f64>,
}

impl From<ThresholdOverrides> for RiskThresholds {
    fn from(overrides: ThresholdOverrides) -> Self {
        RiskThresholds::default().with_overrides(&overrides)
    }
}

/// Loosely typed measurement as delivered by the records API.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum FieldValue {
    Number(f64),
    Text(String),
    Other(Value),
}

impl FieldValue {
    /// Numeric reading of the field; unparsable or non-finite values are `None`.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(n) if n.is_finite() => Some(*n),
            Self::Text(text) => parse_float_prefix(text),
            _ => None,
        }
    }

    /// Whether the field counts as filled in (non-zero number, non-empty text).
    pub fn is_truthy(&self) -> bool {
        match self {
            Self::Number(n) => *n != 0.0 && !n.is_nan(),
            Self::Text(text) => !text.is_empty(),
            Self::Other(Value::Bool(flag)) => *flag,
            Self::Other(Value::Null) => false,
            Self::Other(_) => true,
        }
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

/// Parses the longest leading decimal number of `text`, ignoring leading whitespace.
///
/// `"120 mmHg"` reads as `120`, `"abc"` and `""` as `None`.
pub fn parse_float_prefix(text: &str) -> Option<f64> {
    let trimmed = text.trim_start();
    let bytes = trimmed.as_bytes();
    let mut end = 0;

    if matches!(bytes.first(), Some(b'+' | b'-')) {
        end = 1;
    }

    let int_start = end;
    while end < bytes.len() && bytes[end].is_ascii_digit() {
        end += 1;
    }
    let mut digits = end - int_start;

    if end < bytes.len() && bytes[end] == b'.' {
        let frac_start = end + 1;
        let mut frac_end = frac_start;
        while frac_end < bytes.len() && bytes[frac_end].is_ascii_digit() {
            frac_end += 1;
        }
        digits += frac_end - frac_start;
        end = frac_end;
    }

    if digits == 0 {
        return None;
    }

    if end < bytes.len() && matches!(bytes[end], b'e' | b'E') {
        let mut exp_end = end + 1;
        if exp_end < bytes.len() && matches!(bytes[exp_end], b'+' | b'-') {
            exp_end += 1;
        }
        let exp_digits = exp_end;
        while exp_end < bytes.len() && bytes[exp_end].is_ascii_digit() {
            exp_end += 1;
        }
        if exp_end > exp_digits {
            end = exp_end;
        }
    }

    trimmed[..end]
        .parse::<f64>()
        .ok()
        .filter(|value| value.is_finite())
}

/// Accepts a string or number; any other JSON value becomes `None`.
fn lenient_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::String(text)) => Some(text),
        Some(Value::Number(number)) => Some(number.to_string()),
        _ => None,
    })
}

fn first_filled<'a>(candidates: [&'a Option<String>; 2]) -> Option<&'a str> {
    candidates
        .into_iter()
        .filter_map(|candidate| candidate.as_deref())
        .find(|text| !text.trim().is_empty())
}

/// A time-stamped record tied to a patient.
///
/// Vitals and lab results carry the patient key as `user_uuid`, consultations as
/// `uuid`; both surface here under one name.
pub trait PatientRecord {
    fn patient_uuid(&self) -> Option<&str>;

    /// Raw date text of the record, if any was filled in.
    fn recorded_on(&self) -> Option<&str>;
}

/// Patient profile. `uuid` is the join key for every other record type.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Patient {
    #[serde(default, deserialize_with = "lenient_text")]
    pub id: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub uuid: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub first_name: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub middle_name: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub last_name: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub department: Option<String>,
}

impl Patient {
    /// Join key against record `patient_uuid`s. `None` for a missing or blank
    /// uuid, so keyless records never attach to a listed patient.
    pub fn key(&self) -> Option<&str> {
        self.uuid.as_deref().filter(|uuid| !uuid.is_empty())
    }

    /// `name`, else `"first last"`, else `"Unknown"`.
    pub fn display_name(&self) -> String {
        if let Some(name) = self.name.as_deref().filter(|name| !name.is_empty()) {
            return name.to_string();
        }
        let first = self.first_name.as_deref().unwrap_or("");
        let last = self.last_name.as_deref().unwrap_or("");
        let full = format!("{first} {last}").trim().to_string();
        if full.is_empty() {
            "Unknown".to_string()
        } else {
            full
        }
    }
}

/// One vital-signs check. BP arrives either combined (`"130/85"`) or split.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct VitalRecord {
    #[serde(rename = "user_uuid", default, deserialize_with = "lenient_text")]
    pub patient_uuid: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub date_of_check: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub created_at: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub blood_pressure: Option<String>,
    #[serde(default)]
    pub systolic: Option<FieldValue>,
    #[serde(default)]
    pub diastolic: Option<FieldValue>,
    #[serde(default)]
    pub bmi: Option<FieldValue>,
    #[serde(default)]
    pub temperature: Option<FieldValue>,
    #[serde(default)]
    pub heart_rate: Option<FieldValue>,
    #[serde(default)]
    pub respiratory_rate: Option<FieldValue>,
    #[serde(default)]
    pub weight: Option<FieldValue>,
    #[serde(default)]
    pub height: Option<FieldValue>,
}

impl PatientRecord for VitalRecord {
    fn patient_uuid(&self) -> Option<&str> {
        self.patient_uuid.as_deref()
    }

    fn recorded_on(&self) -> Option<&str> {
        first_filled([&self.date_of_check, &self.created_at])
    }
}

/// One laboratory panel. Analytes the risk rules ignore are kept in `analytes`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct LabResult {
    #[serde(rename = "user_uuid", default, deserialize_with = "lenient_text")]
    pub patient_uuid: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub created_at: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub date_of_check: Option<String>,
    #[serde(default)]
    pub ldl: Option<FieldValue>,
    #[serde(default)]
    pub hba1c: Option<FieldValue>,
    #[serde(default)]
    pub tchol: Option<FieldValue>,
    #[serde(default)]
    pub hdl: Option<FieldValue>,
    #[serde(default)]
    pub trig: Option<FieldValue>,
    #[serde(flatten)]
    pub analytes: BTreeMap<String, FieldValue>,
}

impl PatientRecord for LabResult {
    fn patient_uuid(&self) -> Option<&str> {
        self.patient_uuid.as_deref()
    }

    fn recorded_on(&self) -> Option<&str> {
        first_filled([&self.created_at, &self.date_of_check])
    }
}

/// Clinician consultation carrying the overall clearance and chronic factor text.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Consultation {
    #[serde(rename = "uuid", default, deserialize_with = "lenient_text")]
    pub patient_uuid: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub date_of_check: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub created_at: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub medical_clearance: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub chronic_risk_factor: Option<String>,
}

impl PatientRecord for Consultation {
    fn patient_uuid(&self) -> Option<&str> {
        self.patient_uuid.as_deref()
    }

    fn recorded_on(&self) -> Option<&str> {
        first_filled([&self.date_of_check, &self.created_at])
    }
}

impl Consultation {
    pub fn clearance(&self) -> Option<RiskLevel> {
        self.medical_clearance
            .as_deref()
            .and_then(RiskLevel::from_label)
    }
}

/// The four record collections one analytics run consumes.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct DashboardInput {
    #[serde(default)]
    pub consultations: Vec<Consultation>,
    #[serde(default)]
    pub results: Vec<LabResult>,
    #[serde(default)]
    pub vitals: Vec<VitalRecord>,
    #[serde(default)]
    pub patients: Vec<Patient>,
}

/// Chronic factor categories used by the department mix, in match priority.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ChronicCategory {
    Smoking,
    Drinking,
    Hypertension,
    Diabetes,
    #[serde(rename = "none")]
    NoFactor,
}

impl ChronicCategory {
    pub const PRIORITY: [ChronicCategory; 4] = [
        ChronicCategory::Smoking,
        ChronicCategory::Drinking,
        ChronicCategory::Hypertension,
        ChronicCategory::Diabetes,
    ];

    pub fn keyword(&self) -> &'static str {
        match self {
            Self::Smoking => "smoking",
            Self::Drinking => "drinking",
            Self::Hypertension => "hypertension",
            Self::Diabetes => "diabetes",
            Self::NoFactor => "none",
        }
    }
}

/// Dashboard view model. Field names are what the presentation layer reads.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DashboardData {
    pub total_patients: usize,
    pub hypertensive_count: usize,
    pub obesity_count: usize,
    #[serde(rename = "criticalLDLCount")]
    pub critical_ldl_count: usize,
    pub diabetic_watch_count: usize,
    pub risk_stratification: Vec<RiskBucket>,
    pub chronic_factors: Vec<FactorCount>,
    pub lipid_profile: Vec<LipidAverage>,
    #[serde(rename = "bmiVsBP")]
    pub bmi_vs_bp: Vec<BmiBpPoint>,
    pub at_risk_cohort: Vec<CohortEntry>,
    pub department_risk_mix: Vec<DepartmentRiskMix>,
    pub department_chronic_risk_mix: Vec<DepartmentChronicMix>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RiskBucket {
    pub name: RiskLevel,
    pub value: usize,
    pub color: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FactorCount {
    pub name: String,
    pub count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LipidAverage {
    pub name: String,
    pub average: f64,
    pub healthy_limit: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BmiBpPoint {
    pub bmi: f64,
    pub systolic: f64,
    pub user_uuid: String,
}

/// Patient surfaced for follow-up.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CohortEntry {
    pub uuid: String,
    pub name: String,
    pub status: RiskLevel,
    pub chronic_factors: Vec<String>,
    /// Date text of the most recent contributing record, as recorded.
    pub last_checkup: Option<String>,
}

/// Fractions of a department's patients at each level (green/yellow/red).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DepartmentRiskMix {
    pub department: String,
    pub total: usize,
    pub green: f64,
    pub yellow: f64,
    pub red: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DepartmentChronicMix {
    pub department: String,
    pub total: usize,
    pub smoking: f64,
    pub drinking: f64,
    pub hypertension: f64,
    pub diabetes: f64,
    pub none: f64,
}

impl DepartmentChronicMix {
    /// Combined fraction of patients with any named chronic factor.
    pub fn risk_fraction(&self) -> f64 {
        self.smoking + self.drinking + self.hypertension + self.diabetes
    }
}

/// Boundary errors. The engine itself never fails on record content.
#[derive(Debug, thiserror::Error)]
pub enum AnalyticsError {
    #[error("could not read records: {0}")]
    Parse(String),
    #[error("invalid risk thresholds: {0}")]
    InvalidThresholds(String),
}
