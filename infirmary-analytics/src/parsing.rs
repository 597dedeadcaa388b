//! Normalization of loosely typed record fields.

use std::collections::{btree_map::Entry, BTreeMap, HashMap};

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use infirmary_core::{
    parse_float_prefix, ChronicCategory, FieldValue, LabResult, Patient, PatientRecord,
    VitalRecord,
};

const FACTOR_SENTINELS: [&str; 5] = ["none", "null", "n/a", "undefined", ""];

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct BloodPressure {
    pub systolic: Option<f64>,
    pub diastolic: Option<f64>,
}

/// Reads BP from the split `systolic`/`diastolic` fields when both are filled,
/// otherwise from a `"systolic/diastolic"` string.
pub fn parse_blood_pressure(vital: &VitalRecord) -> BloodPressure {
    let filled = |field: &Option<FieldValue>| {
        field
            .as_ref()
            .filter(|value| value.is_truthy())
            .cloned()
    };

    if let (Some(systolic), Some(diastolic)) =
        (filled(&vital.systolic), filled(&vital.diastolic))
    {
        return BloodPressure {
            systolic: systolic.as_number(),
            diastolic: diastolic.as_number(),
        };
    }

    let Some(combined) = vital.blood_pressure.as_deref() else {
        return BloodPressure::default();
    };

    match combined.split('/').collect::<Vec<_>>().as_slice() {
        [systolic, diastolic] => BloodPressure {
            systolic: parse_float_prefix(systolic),
            diastolic: parse_float_prefix(diastolic),
        },
        _ => BloodPressure::default(),
    }
}

pub fn vital_bmi(vital: &VitalRecord) -> Option<f64> {
    vital.bmi.as_ref().and_then(FieldValue::as_number)
}

pub fn parse_record_date(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(value, format) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

pub fn record_timestamp<R: PatientRecord>(record: &R) -> Option<DateTime<Utc>> {
    record.recorded_on().and_then(parse_record_date)
}

/// Strictly newer wins. A missing or unparsable date never wins, so ties and
/// undated records keep whichever record was seen first.
pub fn is_more_recent(candidate: Option<DateTime<Utc>>, current: Option<DateTime<Utc>>) -> bool {
    match (candidate, current) {
        (Some(a), Some(b)) => a > b,
        (Some(_), None) => true,
        _ => false,
    }
}

/// Keeps the most recent record per patient key. Records without a key share
/// the empty key.
pub fn latest_by_patient<R: PatientRecord>(records: &[R]) -> BTreeMap<String, &R> {
    let mut latest: BTreeMap<String, (&R, Option<DateTime<Utc>>)> = BTreeMap::new();

    for record in records {
        let key = record.patient_uuid().unwrap_or_default().to_string();
        let recorded_at = record_timestamp(record);
        if recorded_at.is_none() {
            tracing::trace!(
                patient = %key,
                raw = ?record.recorded_on(),
                "record has no usable date"
            );
        }

        match latest.entry(key) {
            Entry::Occupied(mut entry) => {
                if is_more_recent(recorded_at, entry.get().1) {
                    entry.insert((record, recorded_at));
                }
            }
            Entry::Vacant(entry) => {
                entry.insert((record, recorded_at));
            }
        }
    }

    latest
        .into_iter()
        .map(|(key, (record, _))| (key, record))
        .collect()
}

/// Splits free-form chronic factor text into capitalized factor names,
/// dropping placeholders such as "None" or "N/A".
pub fn normalize_chronic_factors(raw: Option<&str>) -> Vec<String> {
    let Some(raw) = raw else {
        return Vec::new();
    };

    let tokens: Vec<&str> = if raw.contains(',') {
        raw.split(',').collect()
    } else {
        vec![raw]
    };

    tokens
        .into_iter()
        .map(|token| token.trim().to_lowercase())
        .filter(|token| !FACTOR_SENTINELS.contains(&token.as_str()))
        .map(|token| capitalize_first(&token))
        .collect()
}

/// First category whose keyword occurs in the text, case-insensitively.
pub fn classify_chronic_category(raw: Option<&str>) -> ChronicCategory {
    let Some(raw) = raw else {
        return ChronicCategory::NoFactor;
    };
    let lower = raw.to_lowercase();
    ChronicCategory::PRIORITY
        .into_iter()
        .find(|category| lower.contains(category.keyword()))
        .unwrap_or(ChronicCategory::NoFactor)
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct LipidProfile {
    pub total_chol: Option<f64>,
    pub hdl: Option<f64>,
    pub ldl: Option<f64>,
    pub triglycerides: Option<f64>,
}

impl LipidProfile {
    /// Total cholesterol, HDL, LDL, triglycerides.
    pub fn values(&self) -> [Option<f64>; 4] {
        [self.total_chol, self.hdl, self.ldl, self.triglycerides]
    }
}

pub fn extract_lipid_profile(result: &LabResult) -> LipidProfile {
    let read = |field: &Option<FieldValue>| {
        field
            .as_ref()
            .filter(|value| value.is_truthy())
            .and_then(FieldValue::as_number)
    };
    LipidProfile {
        total_chol: read(&result.tchol),
        hdl: read(&result.hdl),
        ldl: read(&result.ldl),
        triglycerides: read(&result.trig),
    }
}

/// Arithmetic mean; `0.0` for no values.
pub fn calculate_average(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Display name per patient key. Patients without a uuid are left out.
pub fn patient_name_map(patients: &[Patient]) -> HashMap<String, String> {
    patients
        .iter()
        .filter_map(|patient| Some((patient.key()?.to_string(), patient.display_name())))
        .collect()
}

fn capitalize_first(input: &str) -> String {
    let mut chars = input.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}
