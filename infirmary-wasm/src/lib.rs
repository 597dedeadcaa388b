//! Bridge between the dashboard UI (JavaScript) and the analytics engine.

use infirmary_core::{AnalyticsError, RiskThresholds, ThresholdOverrides};
use serde::Serialize;
use serde_wasm_bindgen::{from_value, Serializer};
use wasm_bindgen::prelude::*;

/// Builds the dashboard from `{ patients, vitals, results, consultations }`.
///
/// `thresholds` is an optional partial override such as `{ bmi: { critical: 40 } }`.
#[wasm_bindgen(js_name = buildDashboardAnalytics)]
pub fn build_dashboard(records: JsValue, thresholds: Option<JsValue>) -> Result<JsValue, JsValue> {
    #[cfg(target_arch = "wasm32")]
    console_error_panic_hook::set_once();

    let records_value = from_value::<serde_json::Value>(records)
        .map_err(|err| JsValue::from_str(&format!("could not read records: {err}")))?;

    let thresholds = match thresholds {
        Some(js_thresholds) if !js_thresholds.is_undefined() && !js_thresholds.is_null() => {
            let overrides: ThresholdOverrides = from_value(js_thresholds)
                .map_err(|err| JsValue::from_str(&format!("could not read thresholds: {err}")))?;
            RiskThresholds::from(overrides)
        }
        _ => RiskThresholds::default(),
    };

    let dashboard = infirmary_analytics::build_dashboard_value(&records_value, &thresholds)
        .map_err(|err| JsValue::from_str(&format_analytics_error(err)))?;

    // Plain objects rather than JS `Map`s, so the UI can read fields directly.
    dashboard
        .serialize(&Serializer::json_compatible())
        .map_err(|err| JsValue::from_str(&format!("could not serialize dashboard: {err}")))
}

fn format_analytics_error(err: AnalyticsError) -> String {
    format!("Analytics error: {err}")
}
