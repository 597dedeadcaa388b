//! Aggregation of per-patient risk into the dashboard view model.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use chrono::{DateTime, Utc};
use infirmary_core::{
    BmiBpPoint, ChronicCategory, CohortEntry, Consultation, DashboardData, DashboardInput,
    DepartmentChronicMix, DepartmentRiskMix, FactorCount, LabResult, LipidAverage, Patient,
    PatientRecord, RiskAssessment, RiskBucket, RiskLevel, RiskThresholds, VitalRecord,
};

use crate::parsing::{
    calculate_average, classify_chronic_category, extract_lipid_profile, is_more_recent,
    latest_by_patient, normalize_chronic_factors, parse_blood_pressure, parse_record_date,
    patient_name_map, vital_bmi, LipidProfile,
};
use crate::risk::{
    calculate_consultation_risk, calculate_lab_risk, calculate_patient_risk,
    calculate_vital_risk, has_critical_ldl, is_diabetic_watch, is_hypertensive, is_obese,
    PatientSources,
};

const TOP_CHRONIC_FACTORS: usize = 6;
const UNASSIGNED_DEPARTMENT: &str = "Unassigned";

/// Label and healthy limit (mg/dL), in [`LipidProfile::values`] order.
const LIPID_LIMITS: [(&str, f64); 4] = [
    ("Total Chol", 200.0),
    ("HDL", 40.0),
    ("LDL", 100.0),
    ("Triglycerides", 150.0),
];

pub type PatientRiskMap = BTreeMap<String, RiskLevel>;

/// Display color of a stratification bucket.
pub fn risk_color(level: RiskLevel) -> &'static str {
    match level {
        RiskLevel::Normal => "#22c55e",
        RiskLevel::AtRisk => "#f59e0b",
        RiskLevel::Critical => "#ef4444",
    }
}

/// Latest record of each kind per patient key.
#[derive(Debug, Default)]
pub struct LatestRecords<'a> {
    pub vitals: BTreeMap<String, &'a VitalRecord>,
    pub results: BTreeMap<String, &'a LabResult>,
    pub consultations: BTreeMap<String, &'a Consultation>,
}

impl<'a> LatestRecords<'a> {
    pub fn collect(input: &'a DashboardInput) -> Self {
        Self {
            vitals: latest_by_patient(&input.vitals),
            results: latest_by_patient(&input.results),
            consultations: latest_by_patient(&input.consultations),
        }
    }

    /// Every patient key present in at least one of the three sets.
    pub fn patient_keys(&self) -> BTreeSet<&str> {
        self.vitals
            .keys()
            .chain(self.results.keys())
            .chain(self.consultations.keys())
            .map(String::as_str)
            .collect()
    }

    pub fn sources(&self, uuid: &str) -> PatientSources<'a> {
        PatientSources {
            vital: self.vitals.get(uuid).copied(),
            result: self.results.get(uuid).copied(),
            consultation: self.consultations.get(uuid).copied(),
        }
    }
}

/// Builds every dashboard section from one snapshot of the record collections.
pub fn build_dashboard_analytics(
    input: &DashboardInput,
    thresholds: &RiskThresholds,
) -> DashboardData {
    let latest = LatestRecords::collect(input);
    let risk_map = patient_risk_map(&latest, thresholds);
    let names = patient_name_map(&input.patients);

    let data = DashboardData {
        total_patients: input.patients.len(),
        hypertensive_count: latest
            .vitals
            .values()
            .filter(|vital| is_hypertensive(vital, thresholds))
            .count(),
        obesity_count: latest
            .vitals
            .values()
            .filter(|vital| is_obese(vital, thresholds))
            .count(),
        critical_ldl_count: latest
            .results
            .values()
            .filter(|result| has_critical_ldl(result, thresholds))
            .count(),
        diabetic_watch_count: latest
            .results
            .values()
            .filter(|result| is_diabetic_watch(result, thresholds))
            .count(),
        risk_stratification: risk_stratification(&latest, &risk_map),
        chronic_factors: chronic_factor_histogram(&latest),
        lipid_profile: lipid_profile(&latest),
        bmi_vs_bp: bmi_vs_bp(&latest),
        at_risk_cohort: at_risk_cohort(&latest, &risk_map, &names, thresholds),
        department_risk_mix: department_risk_mix(&input.patients, &risk_map),
        department_chronic_risk_mix: department_chronic_risk_mix(&input.patients, &latest),
    };

    tracing::debug!(
        patients = input.patients.len(),
        vitals = input.vitals.len(),
        results = input.results.len(),
        consultations = input.consultations.len(),
        cohort = data.at_risk_cohort.len(),
        departments = data.department_risk_mix.len(),
        "dashboard analytics built"
    );

    data
}

/// Combined risk level of every patient seen in the latest records.
pub fn patient_risk_map(
    latest: &LatestRecords<'_>,
    thresholds: &RiskThresholds,
) -> PatientRiskMap {
    latest
        .patient_keys()
        .into_iter()
        .map(|uuid| {
            let risk = calculate_patient_risk(latest.sources(uuid), thresholds).risk;
            (uuid.to_string(), risk)
        })
        .collect()
}

fn risk_of(risk_map: &PatientRiskMap, uuid: &str) -> RiskLevel {
    risk_map.get(uuid).copied().unwrap_or_default()
}

pub fn risk_stratification(
    latest: &LatestRecords<'_>,
    risk_map: &PatientRiskMap,
) -> Vec<RiskBucket> {
    let mut counts = [0usize; 3];
    for uuid in latest.patient_keys() {
        counts[level_index(risk_of(risk_map, uuid))] += 1;
    }

    RiskLevel::ALL
        .into_iter()
        .map(|level| RiskBucket {
            name: level,
            value: counts[level_index(level)],
            color: risk_color(level).to_string(),
        })
        .collect()
}

fn level_index(level: RiskLevel) -> usize {
    match level {
        RiskLevel::Normal => 0,
        RiskLevel::AtRisk => 1,
        RiskLevel::Critical => 2,
    }
}

/// Most frequent chronic factors across latest consultations. Equal counts keep
/// first-seen order.
pub fn chronic_factor_histogram(latest: &LatestRecords<'_>) -> Vec<FactorCount> {
    let mut tally: Vec<FactorCount> = Vec::new();
    let mut positions: HashMap<String, usize> = HashMap::new();

    for consultation in latest.consultations.values() {
        for factor in normalize_chronic_factors(consultation.chronic_risk_factor.as_deref()) {
            match positions.get(&factor) {
                Some(&index) => tally[index].count += 1,
                None => {
                    positions.insert(factor.clone(), tally.len());
                    tally.push(FactorCount {
                        name: factor,
                        count: 1,
                    });
                }
            }
        }
    }

    tally.sort_by(|a, b| b.count.cmp(&a.count));
    tally.truncate(TOP_CHRONIC_FACTORS);
    tally
}

pub fn lipid_profile(latest: &LatestRecords<'_>) -> Vec<LipidAverage> {
    let profiles: Vec<LipidProfile> = latest
        .results
        .values()
        .map(|result| extract_lipid_profile(result))
        .collect();

    LIPID_LIMITS
        .iter()
        .enumerate()
        .map(|(index, (name, healthy_limit))| {
            let values: Vec<f64> = profiles
                .iter()
                .filter_map(|profile| profile.values()[index])
                .collect();
            LipidAverage {
                name: name.to_string(),
                average: calculate_average(&values).round(),
                healthy_limit: *healthy_limit,
            }
        })
        .collect()
}

pub fn bmi_vs_bp(latest: &LatestRecords<'_>) -> Vec<BmiBpPoint> {
    latest
        .vitals
        .iter()
        .filter_map(|(uuid, vital)| {
            let bmi = vital_bmi(vital).filter(|bmi| *bmi > 0.0)?;
            let systolic = parse_blood_pressure(vital)
                .systolic
                .filter(|systolic| *systolic > 0.0)?;
            Some(BmiBpPoint {
                bmi,
                systolic,
                user_uuid: uuid.clone(),
            })
        })
        .collect()
}

#[derive(Default)]
struct CohortDraft {
    assessment: RiskAssessment,
    last_checkup: Option<DateTime<Utc>>,
    last_checkup_text: Option<String>,
}

impl CohortDraft {
    fn contribute(&mut self, finding: RiskAssessment, recorded_on: Option<&str>) {
        self.assessment.escalate(finding.risk);
        for factor in finding.factors {
            if !self.assessment.factors.contains(&factor) {
                self.assessment.factors.push(factor);
            }
        }
        let recorded_at = recorded_on.and_then(parse_record_date);
        if is_more_recent(recorded_at, self.last_checkup) {
            self.last_checkup = recorded_at;
            self.last_checkup_text = recorded_on.map(str::to_string);
        }
    }
}

/// Per-patient drafts in the order patients first contributed.
#[derive(Default)]
struct CohortDrafts<'k> {
    drafts: Vec<(&'k str, CohortDraft)>,
    positions: HashMap<&'k str, usize>,
}

impl<'k> CohortDrafts<'k> {
    fn contribute<R: PatientRecord>(
        &mut self,
        uuid: &'k str,
        finding: RiskAssessment,
        record: &R,
    ) {
        if !finding.is_elevated() {
            return;
        }
        let index = match self.positions.get(uuid) {
            Some(&index) => index,
            None => {
                self.positions.insert(uuid, self.drafts.len());
                self.drafts.push((uuid, CohortDraft::default()));
                self.drafts.len() - 1
            }
        };
        self.drafts[index].1.contribute(finding, record.recorded_on());
    }
}

/// Patients needing follow-up, Critical first. Equal statuses keep the order in
/// which patients first contributed: consultations, then vitals, then results.
pub fn at_risk_cohort(
    latest: &LatestRecords<'_>,
    risk_map: &PatientRiskMap,
    names: &HashMap<String, String>,
    thresholds: &RiskThresholds,
) -> Vec<CohortEntry> {
    let mut drafts = CohortDrafts::default();

    for (uuid, consultation) in &latest.consultations {
        drafts.contribute(uuid, calculate_consultation_risk(consultation), *consultation);
    }
    for (uuid, vital) in &latest.vitals {
        drafts.contribute(uuid, calculate_vital_risk(vital, thresholds), *vital);
    }
    for (uuid, result) in &latest.results {
        drafts.contribute(uuid, calculate_lab_risk(result, thresholds), *result);
    }

    let mut cohort: Vec<CohortEntry> = drafts
        .drafts
        .into_iter()
        .filter_map(|(uuid, mut draft)| {
            draft.assessment.escalate(risk_of(risk_map, uuid));
            if !draft.assessment.is_elevated() {
                return None;
            }
            Some(CohortEntry {
                uuid: uuid.to_string(),
                name: names
                    .get(uuid)
                    .cloned()
                    .unwrap_or_else(|| "Unknown".to_string()),
                status: draft.assessment.risk,
                chronic_factors: draft.assessment.factors,
                last_checkup: draft.last_checkup_text,
            })
        })
        .collect();

    cohort.sort_by(|a, b| b.status.cmp(&a.status));
    cohort
}

fn department_of(patient: &Patient) -> String {
    patient
        .department
        .as_deref()
        .map(str::trim)
        .filter(|department| !department.is_empty())
        .unwrap_or(UNASSIGNED_DEPARTMENT)
        .to_string()
}

/// Groups patients by department, keeping first-seen department order.
fn group_by_department<T, F>(patients: &[Patient], mut classify: F) -> Vec<(String, Vec<T>)>
where
    F: FnMut(&Patient) -> T,
{
    let mut groups: Vec<(String, Vec<T>)> = Vec::new();
    let mut positions: HashMap<String, usize> = HashMap::new();

    for patient in patients {
        let department = department_of(patient);
        let value = classify(patient);
        match positions.get(&department) {
            Some(&index) => groups[index].1.push(value),
            None => {
                positions.insert(department.clone(), groups.len());
                groups.push((department, vec![value]));
            }
        }
    }

    groups
}

fn fraction(count: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        count as f64 / total as f64
    }
}

/// Normal/At Risk/Critical fractions per department, riskiest departments first.
pub fn department_risk_mix(
    patients: &[Patient],
    risk_map: &PatientRiskMap,
) -> Vec<DepartmentRiskMix> {
    let mut mix: Vec<DepartmentRiskMix> = group_by_department(patients, |patient| {
        patient
            .key()
            .map_or(RiskLevel::Normal, |uuid| risk_of(risk_map, uuid))
    })
    .into_iter()
    .map(|(department, levels)| {
        let total = levels.len();
        let count = |wanted: RiskLevel| levels.iter().filter(|level| **level == wanted).count();
        DepartmentRiskMix {
            department,
            total,
            green: fraction(count(RiskLevel::Normal), total),
            yellow: fraction(count(RiskLevel::AtRisk), total),
            red: fraction(count(RiskLevel::Critical), total),
        }
    })
    .collect();

    mix.sort_by(|a, b| b.red.total_cmp(&a.red).then(b.yellow.total_cmp(&a.yellow)));
    mix
}

/// Chronic factor category fractions per department, by latest consultation.
pub fn department_chronic_risk_mix(
    patients: &[Patient],
    latest: &LatestRecords<'_>,
) -> Vec<DepartmentChronicMix> {
    let mut mix: Vec<DepartmentChronicMix> = group_by_department(patients, |patient| {
        classify_chronic_category(
            patient
                .key()
                .and_then(|uuid| latest.consultations.get(uuid))
                .and_then(|consultation| consultation.chronic_risk_factor.as_deref()),
        )
    })
    .into_iter()
    .map(|(department, categories)| {
        let total = categories.len();
        let share = |wanted: ChronicCategory| {
            fraction(
                categories.iter().filter(|category| **category == wanted).count(),
                total,
            )
        };
        DepartmentChronicMix {
            department,
            total,
            smoking: share(ChronicCategory::Smoking),
            drinking: share(ChronicCategory::Drinking),
            hypertension: share(ChronicCategory::Hypertension),
            diabetes: share(ChronicCategory::Diabetes),
            none: share(ChronicCategory::NoFactor),
        }
    })
    .collect();

    mix.sort_by(|a, b| b.risk_fraction().total_cmp(&a.risk_fraction()));
    mix
}
