// Allow dead code: API response structs have fields for completeness
#![allow(dead_code)]

use serde::{Deserialize, Serialize};

/// One health metric entry for a user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthRecord {
    #[serde(rename = "_id")]
    pub id: String,
    pub user_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hba1c: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blood_sugar: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub systolic_pressure: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diastolic_pressure: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ldl: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hdl: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tg: Option<f64>,
    pub record_date: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
}

impl HealthRecord {
    /// Blood pressure as `systolic/diastolic`, or `-` when either is missing.
    pub fn blood_pressure(&self) -> String {
        match (self.systolic_pressure, self.diastolic_pressure) {
            (Some(sys), Some(dia)) => format!("{}/{}", sys, dia),
            _ => "-".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateRecordRequest {
    pub user_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hba1c: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blood_sugar: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub systolic_pressure: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diastolic_pressure: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ldl: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hdl: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tg: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub record_date: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateRecordRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hba1c: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blood_sugar: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub systolic_pressure: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diastolic_pressure: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ldl: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hdl: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tg: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub record_date: Option<String>,
}

/// Arguments of the date-range record query. Dates are `YYYY-MM-DD`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DateRange {
    pub user_id: String,
    pub start_date: String,
    pub end_date: String,
}
