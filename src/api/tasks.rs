use crate::{
    auth::auth::AuthUser,
    config::Config,
    error::{ApiError, ApiResult},
    model::{
        cleaner_log::LogAction,
        live_tracking::TrackingEvent,
        task::{
            AreaTask, PhotoUpload, TaskPhoto, TaskSelection, encode_task_ids, validate_checklist,
        },
    },
    service::{
        activity::{self, Activity},
        attendance as shifts, checklist, now,
    },
    utils::{
        area_classifier::{self, AreaCategory},
        db_utils::page_window,
        media,
    },
};
use actix_web::{HttpResponse, web};
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::MySqlPool;
use std::collections::BTreeSet;
use strum::IntoEnumIterator;
use tracing::{error, info};
use utoipa::{IntoParams, ToSchema};

#[derive(Debug, Deserialize, IntoParams)]
pub struct ChecklistQuery {
    /// Area category; when absent it is derived from `area`.
    pub category: Option<String>,
    /// Printed area label, classified when no category is given.
    pub area: Option<String>,
    pub customer: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct SubmitChecklist {
    pub qr_code_id: Option<u64>,
    #[schema(example = "Ground Floor Gents")]
    pub area_label: String,
    /// Category printed on the code, if any.
    pub area_category: Option<String>,
    pub customer_name: Option<String>,
    pub selected_task_ids: Vec<u64>,
    #[serde(default)]
    pub photos: Vec<PhotoUpload>,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct SubmissionQuery {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
    /// Managers only; cleaners always see their own.
    pub cleaner_id: Option<u64>,
    pub customer: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SubmissionDetail {
    #[serde(flatten)]
    pub selection: TaskSelection,
    pub task_ids: Vec<u64>,
    pub photos: Vec<TaskPhoto>,
}

fn parse_category(raw: &str) -> ApiResult<AreaCategory> {
    raw.trim()
        .replace([' ', '-'], "_")
        .parse()
        .map_err(|_| ApiError::bad_request(format!("Unknown area category '{raw}'")))
}

/// Checklist for an area
#[utoipa::path(
    get,
    path = "/api/v1/tasks",
    params(ChecklistQuery),
    responses(
        (status = 200, description = "Ordered checklist", body = [AreaTask]),
        (status = 400, description = "Unknown category or nothing to classify")
    ),
    security(("bearer_auth" = [])),
    tag = "Tasks"
)]
pub async fn get_checklist(
    _auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<ChecklistQuery>,
) -> ApiResult<HttpResponse> {
    let customer = query.customer.as_deref();
    let category = match (&query.category, &query.area) {
        (Some(raw), _) => parse_category(raw)?,
        (None, Some(area)) => area_classifier::classify(customer, area),
        (None, None) => return Err(ApiError::bad_request("Pass a category or an area")),
    };

    let tasks = checklist::load(pool.get_ref(), category, customer).await?;
    Ok(HttpResponse::Ok().json(tasks))
}

#[utoipa::path(
    get,
    path = "/api/v1/tasks/categories",
    responses((status = 200, description = "All area categories", body = [AreaCategory])),
    security(("bearer_auth" = [])),
    tag = "Tasks"
)]
pub async fn list_categories(_auth: AuthUser) -> HttpResponse {
    HttpResponse::Ok().json(AreaCategory::iter().collect::<Vec<_>>())
}

/// Submit a completed checklist
#[utoipa::path(
    post,
    path = "/api/v1/tasks/submissions",
    request_body = SubmitChecklist,
    responses(
        (status = 201, description = "Checklist stored", body = Object, example = json!({
            "message": "Checklist submitted", "id": 31, "photos": 2
        })),
        (status = 400, description = "Required task skipped, photo missing or photo unreadable"),
        (status = 403, description = "No cleaner profile or cleaner inactive")
    ),
    security(("bearer_auth" = [])),
    tag = "Tasks"
)]
pub async fn submit_checklist(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
    body: web::Json<SubmitChecklist>,
) -> actix_web::Result<HttpResponse> {
    let cleaner_id = auth.require_cleaner()?;
    let cleaner = shifts::load_cleaner(pool.get_ref(), cleaner_id).await?;
    let body = body.into_inner();

    let area_label = body.area_label.trim();
    if area_label.is_empty() {
        return Err(ApiError::bad_request("Area label is required").into());
    }

    let customer = body
        .customer_name
        .clone()
        .or_else(|| cleaner.customer_name.clone());
    let category = area_classifier::resolve(
        customer.as_deref(),
        area_label,
        body.area_category.as_deref(),
    );

    let tasks = checklist::load(pool.get_ref(), category, customer.as_deref()).await?;
    let selected: BTreeSet<u64> = body.selected_task_ids.iter().copied().collect();

    validate_checklist(&tasks, &selected, &body.photos)
        .map_err(|e| ApiError::bad_request(e.to_string()))?;

    let mut photos = Vec::with_capacity(body.photos.len());
    for upload in &body.photos {
        let info = media::inspect_photo(&upload.photo, config.max_photo_bytes).map_err(|e| {
            ApiError::bad_request(format!("Photo for task {}: {e}", upload.task_id))
        })?;
        photos.push((upload.task_id, media::to_data_uri(&upload.photo, &info)));
    }

    let at = now();
    let mut tx = pool.begin().await.map_err(ApiError::from)?;

    let selection_id = sqlx::query(
        r#"
        INSERT INTO uk_cleaner_task_selections
        (cleaner_id, cleaner_name, qr_code_id, area_label, area_category,
         customer_name, selected_task_ids, notes, completed_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(cleaner.id)
    .bind(&cleaner.name)
    .bind(body.qr_code_id)
    .bind(area_label)
    .bind(category.as_ref())
    .bind(&customer)
    .bind(encode_task_ids(&selected))
    .bind(body.notes.as_deref().map(str::trim).filter(|n| !n.is_empty()))
    .bind(at)
    .execute(&mut *tx)
    .await
    .map_err(ApiError::from)?
    .last_insert_id();

    for (task_id, data_uri) in &photos {
        sqlx::query(
            r#"
            INSERT INTO uk_cleaner_task_photos (selection_id, task_id, photo_data, created_at)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(selection_id)
        .bind(task_id)
        .bind(data_uri)
        .bind(at)
        .execute(&mut *tx)
        .await
        .map_err(ApiError::from)?;
    }

    tx.commit().await.map_err(ApiError::from)?;

    info!(
        cleaner_id,
        selection_id,
        tasks = selected.len(),
        photos = photos.len(),
        "Checklist submitted"
    );

    let mut event = Activity::new(cleaner.id, &cleaner.name, LogAction::ChecklistSubmitted)
        .tracked(TrackingEvent::ChecklistSubmitted);
    event.qr_code_id = body.qr_code_id;
    event.area_label = Some(area_label);
    event.area_category = Some(category.as_ref());
    event.customer_name = customer.as_deref();
    activity::record(pool.get_ref(), &event).await;

    // the draft has served its purpose
    if let Err(e) = sqlx::query("DELETE FROM work_drafts WHERE cleaner_id = ?")
        .bind(cleaner.id)
        .execute(pool.get_ref())
        .await
    {
        error!(error = %e, cleaner_id, "Failed to clear work draft");
    }

    Ok(HttpResponse::Created().json(json!({
        "message": "Checklist submitted",
        "id": selection_id,
        "photos": photos.len(),
    })))
}

/// List checklist submissions
#[utoipa::path(
    get,
    path = "/api/v1/tasks/submissions",
    params(SubmissionQuery),
    responses(
        (status = 200, description = "Submissions, newest first", body = Object, example = json!({
            "data": [], "page": 1, "per_page": 20, "total": 0
        }))
    ),
    security(("bearer_auth" = [])),
    tag = "Tasks"
)]
pub async fn list_submissions(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<SubmissionQuery>,
) -> actix_web::Result<HttpResponse> {
    let cleaner_filter = if auth.is_manager() {
        query.cleaner_id
    } else {
        Some(auth.require_cleaner()?)
    };

    let (page, per_page, offset) = page_window(query.page, query.per_page, 100);

    let mut conditions = Vec::new();
    if cleaner_filter.is_some() {
        conditions.push("cleaner_id = ?");
    }
    if query.customer.is_some() {
        conditions.push("customer_name = ?");
    }
    let where_clause = if conditions.is_empty() {
        String::new()
    } else {
        format!("WHERE {}", conditions.join(" AND "))
    };

    let count_sql = format!("SELECT COUNT(*) FROM uk_cleaner_task_selections {where_clause}");
    let mut count_query = sqlx::query_scalar::<_, i64>(&count_sql);
    if let Some(id) = cleaner_filter {
        count_query = count_query.bind(id);
    }
    if let Some(customer) = &query.customer {
        count_query = count_query.bind(customer);
    }
    let total = count_query
        .fetch_one(pool.get_ref())
        .await
        .map_err(ApiError::from)?;

    let data_sql = format!(
        r#"
        SELECT id, cleaner_id, cleaner_name, qr_code_id, area_label, area_category,
               customer_name, selected_task_ids, notes, completed_at
        FROM uk_cleaner_task_selections
        {where_clause}
        ORDER BY completed_at DESC
        LIMIT ? OFFSET ?
        "#
    );
    let mut data_query = sqlx::query_as::<_, TaskSelection>(&data_sql);
    if let Some(id) = cleaner_filter {
        data_query = data_query.bind(id);
    }
    if let Some(customer) = &query.customer {
        data_query = data_query.bind(customer);
    }
    let rows = data_query
        .bind(per_page as i64)
        .bind(offset)
        .fetch_all(pool.get_ref())
        .await
        .map_err(ApiError::from)?;

    Ok(HttpResponse::Ok().json(json!({
        "data": rows,
        "page": page,
        "per_page": per_page,
        "total": total,
    })))
}

/// One submission with its photos
#[utoipa::path(
    get,
    path = "/api/v1/tasks/submissions/{id}",
    params(("id", Path, description = "Submission ID")),
    responses(
        (status = 200, description = "Submission with photos", body = SubmissionDetail),
        (status = 404, description = "Submission not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Tasks"
)]
pub async fn get_submission(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> ApiResult<HttpResponse> {
    let id = path.into_inner();

    let selection = sqlx::query_as::<_, TaskSelection>(
        r#"
        SELECT id, cleaner_id, cleaner_name, qr_code_id, area_label, area_category,
               customer_name, selected_task_ids, notes, completed_at
        FROM uk_cleaner_task_selections
        WHERE id = ?
        "#,
    )
    .bind(id)
    .fetch_optional(pool.get_ref())
    .await?
    .ok_or_else(|| ApiError::not_found("Submission not found"))?;

    if !auth.is_manager() && auth.cleaner_id != Some(selection.cleaner_id) {
        // same answer as a missing row
        return Err(ApiError::not_found("Submission not found"));
    }

    let photos = sqlx::query_as::<_, TaskPhoto>(
        r#"
        SELECT id, selection_id, task_id, photo_data, created_at
        FROM uk_cleaner_task_photos
        WHERE selection_id = ?
        ORDER BY task_id
        "#,
    )
    .bind(id)
    .fetch_all(pool.get_ref())
    .await?;

    Ok(HttpResponse::Ok().json(SubmissionDetail {
        task_ids: selection.task_ids(),
        selection,
        photos,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn categories_accept_loose_spelling() {
        assert_eq!(parse_category("Meeting Room").unwrap(), AreaCategory::MeetingRoom);
        assert_eq!(parse_category("car-park").unwrap(), AreaCategory::CarPark);
        assert!(matches!(parse_category("moon base"), Err(ApiError::BadRequest(_))));
    }
}
