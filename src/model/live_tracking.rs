use chrono::{Duration, NaiveDateTime};
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, EnumString};
use utoipa::ToSchema;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema, AsRefStr, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum TrackingEvent {
    ClockIn,
    ClockOut,
    AreaScan,
    ChecklistSubmitted,
    AssistAccepted,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct LiveTracking {
    pub cleaner_id: u64,
    pub cleaner_name: String,
    #[schema(example = "area_scan")]
    pub event_type: String,
    pub area_label: Option<String>,
    pub customer_name: Option<String>,
    pub qr_code_id: Option<u64>,
    #[schema(value_type = String, format = "date-time")]
    pub updated_at: NaiveDateTime,
}

impl LiveTracking {
    /// On shift and seen recently.
    pub fn is_active(&self, now: NaiveDateTime, window_mins: i64) -> bool {
        let clocked_out = matches!(self.event_type.parse(), Ok(TrackingEvent::ClockOut));
        !clocked_out && now - self.updated_at <= Duration::minutes(window_mins)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn row(event: TrackingEvent, hh: u32) -> LiveTracking {
        LiveTracking {
            cleaner_id: 1,
            cleaner_name: "Ade".to_string(),
            event_type: event.as_ref().to_string(),
            area_label: None,
            customer_name: None,
            qr_code_id: None,
            updated_at: NaiveDate::from_ymd_opt(2026, 3, 2)
                .unwrap()
                .and_hms_opt(hh, 0, 0)
                .unwrap(),
        }
    }

    #[test]
    fn clock_out_is_never_active() {
        let now = NaiveDate::from_ymd_opt(2026, 3, 2).unwrap().and_hms_opt(9, 0, 0).unwrap();
        assert!(!row(TrackingEvent::ClockOut, 9).is_active(now, 240));
        assert!(row(TrackingEvent::AreaScan, 8).is_active(now, 240));
        assert!(!row(TrackingEvent::AreaScan, 2).is_active(now, 240));
    }
}
