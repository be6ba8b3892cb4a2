use sqlx::MySqlPool;

use crate::model::cleaner_log::LogAction;
use crate::model::live_tracking::TrackingEvent;
use crate::service::now;

/// One thing a cleaner did, written to the log and optionally to live tracking.
#[derive(Debug, Clone)]
pub struct Activity<'a> {
    pub cleaner_id: u64,
    pub cleaner_name: &'a str,
    pub action: LogAction,
    pub tracking: Option<TrackingEvent>,
    pub qr_code_id: Option<u64>,
    pub area_label: Option<&'a str>,
    pub area_category: Option<&'a str>,
    pub customer_name: Option<&'a str>,
    pub notes: Option<&'a str>,
}

impl<'a> Activity<'a> {
    pub fn new(cleaner_id: u64, cleaner_name: &'a str, action: LogAction) -> Self {
        Self {
            cleaner_id,
            cleaner_name,
            action,
            tracking: None,
            qr_code_id: None,
            area_label: None,
            area_category: None,
            customer_name: None,
            notes: None,
        }
    }

    pub fn tracked(mut self, event: TrackingEvent) -> Self {
        self.tracking = Some(event);
        self
    }
}

/// Log-and-continue: the primary write already happened, so failures here
/// never fail the request.
pub async fn record(pool: &MySqlPool, activity: &Activity<'_>) {
    let at = now();

    if let Err(e) = sqlx::query(
        r#"
        INSERT INTO cleaner_logs
        (cleaner_id, cleaner_name, action, qr_code_id, area_label, area_category, customer_name, notes, created_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(activity.cleaner_id)
    .bind(activity.cleaner_name)
    .bind(activity.action.as_ref())
    .bind(activity.qr_code_id)
    .bind(activity.area_label)
    .bind(activity.area_category)
    .bind(activity.customer_name)
    .bind(activity.notes)
    .bind(at)
    .execute(pool)
    .await
    {
        tracing::error!(error = %e, cleaner_id = activity.cleaner_id, action = activity.action.as_ref(), "Failed to write cleaner log");
    }

    let Some(event) = activity.tracking else {
        return;
    };

    if let Err(e) = sqlx::query(
        r#"
        INSERT INTO live_tracking
        (cleaner_id, cleaner_name, event_type, area_label, customer_name, qr_code_id, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        ON DUPLICATE KEY UPDATE
            cleaner_name = VALUES(cleaner_name),
            event_type = VALUES(event_type),
            area_label = VALUES(area_label),
            customer_name = VALUES(customer_name),
            qr_code_id = VALUES(qr_code_id),
            updated_at = VALUES(updated_at)
        "#,
    )
    .bind(activity.cleaner_id)
    .bind(activity.cleaner_name)
    .bind(event.as_ref())
    .bind(activity.area_label)
    .bind(activity.customer_name)
    .bind(activity.qr_code_id)
    .bind(at)
    .execute(pool)
    .await
    {
        tracing::error!(error = %e, cleaner_id = activity.cleaner_id, "Failed to update live tracking");
    }
}
