use crate::{
    auth::auth::AuthUser,
    error::{ApiError, ApiResult},
    model::{
        cleaner_log::{CleanerLog, LogAction},
        photo_feedback::{Feedback, FeedbackChange, toggle},
    },
    service::now,
    utils::db_utils::page_window,
};
use actix_web::{HttpResponse, web};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::MySqlPool;
use tracing::{debug, info};
use utoipa::{IntoParams, ToSchema};

#[derive(Debug, Deserialize, IntoParams)]
pub struct PhotoQuery {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
    pub customer: Option<String>,
    pub cleaner_id: Option<u64>,
    /// Only photos this manager has not reviewed yet.
    pub unreviewed: Option<bool>,
}

/// A task photo as a manager reviews it, with the caller's own feedback.
#[derive(Debug, Serialize, sqlx::FromRow, ToSchema)]
pub struct PhotoReview {
    pub photo_id: u64,
    pub selection_id: u64,
    pub task_id: u64,
    pub task_name: Option<String>,
    pub cleaner_id: u64,
    pub cleaner_name: String,
    pub area_label: String,
    pub customer_name: Option<String>,
    #[schema(value_type = String, format = "date-time")]
    pub completed_at: NaiveDateTime,
    pub photo_data: String,
    #[schema(example = "approved", nullable = true)]
    pub feedback: Option<String>,
    pub comment: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct FeedbackRequest {
    pub feedback: Feedback,
    pub comment: Option<String>,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct ActivityQuery {
    pub cleaner_id: Option<u64>,
    /// e.g. clock_in, area_scan, assist_raised
    pub action: Option<String>,
    pub since: Option<NaiveDateTime>,
    pub limit: Option<u32>,
}

/// Task photos for review
#[utoipa::path(
    get,
    path = "/api/v1/manager/photos",
    params(PhotoQuery),
    responses(
        (status = 200, description = "Photos, newest first", body = Object, example = json!({
            "data": [], "page": 1, "per_page": 20
        })),
        (status = 403, description = "Manager/Admin only")
    ),
    security(("bearer_auth" = [])),
    tag = "Manager"
)]
pub async fn list_photos(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<PhotoQuery>,
) -> actix_web::Result<HttpResponse> {
    auth.require_manager()?;

    let (page, per_page, offset) = page_window(query.page, query.per_page, 50);

    let mut sql = String::from(
        r#"
        SELECT p.id AS photo_id, p.selection_id, p.task_id, t.task_name,
               s.cleaner_id, s.cleaner_name, s.area_label, s.customer_name,
               s.completed_at, p.photo_data, f.feedback, f.comment
        FROM uk_cleaner_task_photos p
        JOIN uk_cleaner_task_selections s ON s.id = p.selection_id
        LEFT JOIN area_tasks t ON t.id = p.task_id
        LEFT JOIN manager_photo_feedback f ON f.photo_id = p.id AND f.manager_id = ?
        WHERE 1 = 1
        "#,
    );
    if query.customer.is_some() {
        sql.push_str(" AND s.customer_name = ?");
    }
    if query.cleaner_id.is_some() {
        sql.push_str(" AND s.cleaner_id = ?");
    }
    if query.unreviewed.unwrap_or(false) {
        sql.push_str(" AND f.id IS NULL");
    }
    sql.push_str(" ORDER BY s.completed_at DESC, p.id LIMIT ? OFFSET ?");

    let mut q = sqlx::query_as::<_, PhotoReview>(&sql).bind(auth.user_id);
    if let Some(customer) = &query.customer {
        q = q.bind(customer);
    }
    if let Some(cleaner_id) = query.cleaner_id {
        q = q.bind(cleaner_id);
    }

    let photos = q
        .bind(per_page as i64)
        .bind(offset)
        .fetch_all(pool.get_ref())
        .await
        .map_err(ApiError::from)?;

    Ok(HttpResponse::Ok().json(json!({
        "data": photos,
        "page": page,
        "per_page": per_page,
    })))
}

async fn apply_feedback(
    pool: &MySqlPool,
    photo_id: u64,
    manager_id: u64,
    change: FeedbackChange,
    comment: Option<&str>,
) -> ApiResult<()> {
    match change {
        FeedbackChange::Delete => {
            sqlx::query("DELETE FROM manager_photo_feedback WHERE photo_id = ? AND manager_id = ?")
                .bind(photo_id)
                .bind(manager_id)
                .execute(pool)
                .await?;
        }
        // an insert racing another click from the same manager lands as an update
        FeedbackChange::Insert(value) | FeedbackChange::Update(value) => {
            sqlx::query(
                r#"
                INSERT INTO manager_photo_feedback (photo_id, manager_id, feedback, comment, updated_at)
                VALUES (?, ?, ?, ?, ?)
                ON DUPLICATE KEY UPDATE
                    feedback = VALUES(feedback),
                    comment = VALUES(comment),
                    updated_at = VALUES(updated_at)
                "#,
            )
            .bind(photo_id)
            .bind(manager_id)
            .bind(value.as_ref())
            .bind(comment)
            .bind(now())
            .execute(pool)
            .await?;
        }
    }
    Ok(())
}

/// Approve or flag a photo; sending the current value again clears it.
#[utoipa::path(
    put,
    path = "/api/v1/manager/photos/{id}/feedback",
    params(("id", Path, description = "Photo ID")),
    request_body = FeedbackRequest,
    responses(
        (status = 200, description = "Feedback after the toggle", body = Object, example = json!({
            "photo_id": 14, "feedback": null
        })),
        (status = 404, description = "Photo not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Manager"
)]
pub async fn set_feedback(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    body: web::Json<FeedbackRequest>,
) -> actix_web::Result<HttpResponse> {
    auth.require_manager()?;
    let photo_id = path.into_inner();

    let exists = sqlx::query_scalar::<_, bool>(
        "SELECT EXISTS(SELECT 1 FROM uk_cleaner_task_photos WHERE id = ?)",
    )
    .bind(photo_id)
    .fetch_one(pool.get_ref())
    .await
    .map_err(ApiError::from)?;
    if !exists {
        return Err(ApiError::not_found("Photo not found").into());
    }

    let current: Option<String> = sqlx::query_scalar(
        "SELECT feedback FROM manager_photo_feedback WHERE photo_id = ? AND manager_id = ?",
    )
    .bind(photo_id)
    .bind(auth.user_id)
    .fetch_optional(pool.get_ref())
    .await
    .map_err(ApiError::from)?;

    let current = current.and_then(|raw| raw.parse::<Feedback>().ok());
    let change = toggle(current, body.feedback);
    let comment = body
        .comment
        .as_deref()
        .map(str::trim)
        .filter(|c| !c.is_empty());

    apply_feedback(pool.get_ref(), photo_id, auth.user_id, change, comment).await?;

    info!(photo_id, manager_id = auth.user_id, ?change, "Photo feedback toggled");

    Ok(HttpResponse::Ok().json(json!({
        "photo_id": photo_id,
        "feedback": change.resulting(),
    })))
}

/// Cleaner activity log
#[utoipa::path(
    get,
    path = "/api/v1/manager/activity",
    params(ActivityQuery),
    responses(
        (status = 200, description = "Log rows, newest first", body = [CleanerLog]),
        (status = 400, description = "Unknown action"),
        (status = 403, description = "Manager/Admin only")
    ),
    security(("bearer_auth" = [])),
    tag = "Manager"
)]
pub async fn activity_log(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<ActivityQuery>,
) -> actix_web::Result<HttpResponse> {
    auth.require_manager()?;

    let action = match &query.action {
        Some(raw) => Some(
            raw.parse::<LogAction>()
                .map_err(|_| ApiError::bad_request("Unknown action"))?,
        ),
        None => None,
    };

    let mut sql = String::from(
        r#"
        SELECT id, cleaner_id, cleaner_name, action, qr_code_id, area_label,
               area_category, customer_name, notes, created_at
        FROM cleaner_logs
        WHERE 1 = 1
        "#,
    );
    if query.cleaner_id.is_some() {
        sql.push_str(" AND cleaner_id = ?");
    }
    if action.is_some() {
        sql.push_str(" AND action = ?");
    }
    if query.since.is_some() {
        sql.push_str(" AND created_at > ?");
    }
    sql.push_str(" ORDER BY created_at DESC, id DESC LIMIT ?");

    let mut q = sqlx::query_as::<_, CleanerLog>(&sql);
    if let Some(cleaner_id) = query.cleaner_id {
        q = q.bind(cleaner_id);
    }
    if let Some(action) = &action {
        q = q.bind(action.as_ref());
    }
    if let Some(since) = query.since {
        q = q.bind(since);
    }

    let limit = query.limit.unwrap_or(100).clamp(1, 500);
    let rows = q
        .bind(limit as i64)
        .fetch_all(pool.get_ref())
        .await
        .map_err(ApiError::from)?;

    debug!(rows = rows.len(), "Activity log read");
    Ok(HttpResponse::Ok().json(rows))
}
