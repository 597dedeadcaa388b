//! Threshold rules that classify vitals, lab results and whole patients.

use infirmary_core::{
    Consultation, FieldValue, LabResult, RiskAssessment, RiskLevel, RiskThresholds, VitalRecord,
};

use crate::parsing::{normalize_chronic_factors, parse_blood_pressure, vital_bmi};

/// Latest record of each kind for one patient; any of them may be missing.
#[derive(Debug, Clone, Copy, Default)]
pub struct PatientSources<'a> {
    pub vital: Option<&'a VitalRecord>,
    pub result: Option<&'a LabResult>,
    pub consultation: Option<&'a Consultation>,
}

fn format_measure(value: Option<f64>) -> String {
    match value {
        Some(value) => value.to_string(),
        None => "?".to_string(),
    }
}

fn lab_value(field: &Option<FieldValue>) -> Option<f64> {
    field.as_ref().and_then(FieldValue::as_number)
}

/// BP is checked before BMI; a later check can raise the level but never lower it.
pub fn calculate_vital_risk(vital: &VitalRecord, thresholds: &RiskThresholds) -> RiskAssessment {
    let mut assessment = RiskAssessment::default();

    let bp = parse_blood_pressure(vital);
    let bp_level = thresholds
        .systolic
        .classify(bp.systolic)
        .max(thresholds.diastolic.classify(bp.diastolic));
    if bp_level > RiskLevel::Normal {
        assessment.record(
            bp_level,
            format!(
                "BP: {}/{}",
                format_measure(bp.systolic),
                format_measure(bp.diastolic)
            ),
        );
    }

    let bmi = vital_bmi(vital);
    let bmi_level = thresholds.bmi.classify(bmi);
    if bmi_level > RiskLevel::Normal {
        assessment.record(bmi_level, format!("BMI: {}", format_measure(bmi)));
    }

    assessment
}

/// Same escalation as vitals, over LDL then HbA1c.
pub fn calculate_lab_risk(result: &LabResult, thresholds: &RiskThresholds) -> RiskAssessment {
    let mut assessment = RiskAssessment::default();

    let ldl = lab_value(&result.ldl);
    let ldl_level = thresholds.ldl.classify(ldl);
    if ldl_level > RiskLevel::Normal {
        assessment.record(ldl_level, format!("LDL: {}", format_measure(ldl)));
    }

    let hba1c = lab_value(&result.hba1c);
    let hba1c_level = thresholds.hba1c.classify(hba1c);
    if hba1c_level > RiskLevel::Normal {
        assessment.record(hba1c_level, format!("HbA1c: {}", format_measure(hba1c)));
    }

    assessment
}

/// Clearance recorded by the clinician. A `Normal` or missing clearance
/// contributes nothing.
pub fn calculate_consultation_risk(consultation: &Consultation) -> RiskAssessment {
    let level = match consultation.clearance() {
        Some(level) if level > RiskLevel::Normal => level,
        _ => return RiskAssessment::default(),
    };

    let mut factors = normalize_chronic_factors(consultation.chronic_risk_factor.as_deref());
    if factors.is_empty() {
        factors.push(match level {
            RiskLevel::Critical => "Critical Condition".to_string(),
            _ => "At Risk Condition".to_string(),
        });
    }

    RiskAssessment {
        risk: level,
        factors,
    }
}

/// Consultation, then vitals, then labs. The result is the highest of the three
/// levels; factors are concatenated in that order.
pub fn calculate_patient_risk(
    sources: PatientSources<'_>,
    thresholds: &RiskThresholds,
) -> RiskAssessment {
    let mut assessment = RiskAssessment::default();
    if let Some(consultation) = sources.consultation {
        assessment.absorb(calculate_consultation_risk(consultation));
    }
    if let Some(vital) = sources.vital {
        assessment.absorb(calculate_vital_risk(vital, thresholds));
    }
    if let Some(result) = sources.result {
        assessment.absorb(calculate_lab_risk(result, thresholds));
    }
    assessment
}

pub fn is_hypertensive(vital: &VitalRecord, thresholds: &RiskThresholds) -> bool {
    let bp = parse_blood_pressure(vital);
    thresholds.systolic.exceeds_at_risk(bp.systolic)
        || thresholds.diastolic.exceeds_at_risk(bp.diastolic)
}

pub fn is_obese(vital: &VitalRecord, thresholds: &RiskThresholds) -> bool {
    thresholds.bmi.exceeds_at_risk(vital_bmi(vital))
}

pub fn has_critical_ldl(result: &LabResult, thresholds: &RiskThresholds) -> bool {
    thresholds.ldl.exceeds_at_risk(lab_value(&result.ldl))
}

pub fn is_diabetic_watch(result: &LabResult, thresholds: &RiskThresholds) -> bool {
    thresholds.hba1c.exceeds_at_risk(lab_value(&result.hba1c))
}
