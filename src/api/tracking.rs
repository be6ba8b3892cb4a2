use crate::{
    auth::auth::AuthUser,
    config::Config,
    model::live_tracking::LiveTracking,
    service::now,
};
use actix_web::{HttpResponse, web};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use sqlx::MySqlPool;
use utoipa::{IntoParams, ToSchema};

#[derive(Debug, Deserialize, IntoParams)]
pub struct LiveQuery {
    /// Only rows updated after this instant (UTC), for polling.
    pub since: Option<NaiveDateTime>,
    pub customer: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct LiveCleaner {
    #[serde(flatten)]
    pub tracking: LiveTracking,
    /// On shift and seen within the activity window.
    pub active: bool,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct LiveResponse {
    pub data: Vec<LiveCleaner>,
    /// Pass back as `since` on the next poll.
    #[schema(value_type = String, format = "date-time")]
    pub cursor: NaiveDateTime,
}

/// Latest event per cleaner
#[utoipa::path(
    get,
    path = "/api/v1/tracking/live",
    params(LiveQuery),
    responses(
        (status = 200, description = "Latest event per cleaner", body = LiveResponse),
        (status = 403, description = "Manager/Admin only")
    ),
    security(("bearer_auth" = [])),
    tag = "Tracking"
)]
pub async fn live(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
    query: web::Query<LiveQuery>,
) -> actix_web::Result<HttpResponse> {
    auth.require_manager()?;

    let mut sql = String::from(
        r#"
        SELECT cleaner_id, cleaner_name, event_type, area_label, customer_name, qr_code_id, updated_at
        FROM live_tracking
        WHERE 1 = 1
        "#,
    );
    if query.since.is_some() {
        sql.push_str(" AND updated_at > ?");
    }
    if query.customer.is_some() {
        sql.push_str(" AND customer_name = ?");
    }
    sql.push_str(" ORDER BY updated_at DESC");

    let mut q = sqlx::query_as::<_, LiveTracking>(&sql);
    if let Some(since) = query.since {
        q = q.bind(since);
    }
    if let Some(customer) = &query.customer {
        q = q.bind(customer);
    }

    // taken before the read; rows written meanwhile show up on the next poll
    let cursor = now();
    let rows = q
        .fetch_all(pool.get_ref())
        .await
        .map_err(crate::error::ApiError::from)?;

    let data = rows
        .into_iter()
        .map(|tracking| LiveCleaner {
            active: tracking.is_active(cursor, config.activity_window_mins),
            tracking,
        })
        .collect();

    Ok(HttpResponse::Ok().json(LiveResponse { data, cursor }))
}
