use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, EnumString};
use utoipa::ToSchema;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema, AsRefStr, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum LogAction {
    ClockIn,
    ClockOut,
    AreaScan,
    ChecklistSubmitted,
    AssistRaised,
    AssistAccepted,
    AssistResolved,
    AssistEscalated,
    AssistCancelled,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct CleanerLog {
    pub id: u64,
    pub cleaner_id: u64,
    pub cleaner_name: String,
    #[schema(example = "area_scan")]
    pub action: String,
    pub qr_code_id: Option<u64>,
    pub area_label: Option<String>,
    pub area_category: Option<String>,
    pub customer_name: Option<String>,
    pub notes: Option<String>,
    #[schema(value_type = String, format = "date-time")]
    pub created_at: NaiveDateTime,
}
