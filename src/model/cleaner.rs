use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, EnumString};
use utoipa::ToSchema;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema, AsRefStr, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum CleanerStatus {
    Active,
    Inactive,
    Suspended,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
#[schema(
    example = json!({
        "id": 12,
        "name": "Maria Silva",
        "mobile": "07700 900123",
        "status": "active",
        "customer_name": "Harbour Offices",
        "created_at": "2026-01-05T08:00:00"
    })
)]
pub struct Cleaner {
    pub id: u64,
    pub name: String,
    pub mobile: String,
    #[schema(example = "active")]
    pub status: String,
    #[schema(nullable = true)]
    pub customer_name: Option<String>,
    #[schema(value_type = String, format = "date-time")]
    pub created_at: NaiveDateTime,
}

impl Cleaner {
    pub fn is_active(&self) -> bool {
        matches!(self.status.parse(), Ok(CleanerStatus::Active))
    }
}
