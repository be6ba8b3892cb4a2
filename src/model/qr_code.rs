use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::qr::{QrKind, QrPayload};

/// Stored QR metadata. `metadata` holds the encoded payload; the other
/// columns duplicate it for filtering.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct QrCodeRecord {
    pub id: u64,
    pub code_uid: String,
    #[schema(example = "area")]
    pub qr_type: String,
    pub customer_name: Option<String>,
    pub building_name: Option<String>,
    pub area_label: Option<String>,
    pub area_category: Option<String>,
    pub metadata: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub qr_image: Option<String>,
    pub created_by: Option<u64>,
    #[schema(value_type = String, format = "date-time")]
    pub created_at: NaiveDateTime,
}

impl QrCodeRecord {
    /// Stored metadata wins over whatever was printed; denormalised columns fill gaps.
    pub fn payload(&self) -> QrPayload {
        let stored: Option<QrPayload> = serde_json::from_str(&self.metadata).ok();
        let kind = stored
            .as_ref()
            .map(|p| p.kind)
            .or_else(|| self.qr_type.parse::<QrKind>().ok())
            .unwrap_or(QrKind::Area);

        let mut payload = stored.unwrap_or_else(|| QrPayload::new(kind));
        payload.kind = kind;
        payload.code_uid = Some(self.code_uid.clone());
        payload.customer = payload.customer.or_else(|| self.customer_name.clone());
        payload.building = payload.building.or_else(|| self.building_name.clone());
        payload.area = payload.area.or_else(|| self.area_label.clone());
        payload.category = payload.category.or_else(|| self.area_category.clone());
        payload
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn record(metadata: &str) -> QrCodeRecord {
        QrCodeRecord {
            id: 5,
            code_uid: "uid-5".to_string(),
            qr_type: "clock_in".to_string(),
            customer_name: Some("Acme".to_string()),
            building_name: None,
            area_label: Some("Front door".to_string()),
            area_category: None,
            metadata: metadata.to_string(),
            qr_image: None,
            created_by: None,
            created_at: NaiveDate::from_ymd_opt(2026, 1, 1)
                .unwrap()
                .and_hms_opt(0, 0, 0)
                .unwrap(),
        }
    }

    #[test]
    fn columns_fill_gaps_in_metadata() {
        let payload = record(r#"{"type":"clock_in","building":"HQ"}"#).payload();
        assert_eq!(payload.kind, QrKind::ClockIn);
        assert_eq!(payload.code_uid.as_deref(), Some("uid-5"));
        assert_eq!(payload.building.as_deref(), Some("HQ"));
        assert_eq!(payload.customer.as_deref(), Some("Acme"));
    }

    #[test]
    fn unreadable_metadata_uses_columns() {
        let payload = record("garbage").payload();
        assert_eq!(payload.kind, QrKind::ClockIn);
        assert_eq!(payload.area.as_deref(), Some("Front door"));
    }
}
