use crate::{
    auth::auth::AuthUser,
    config::Config,
    error::{ApiError, ApiResult},
    model::work_draft::{DraftSource, WorkDraft, WorkDraftRow, reconcile},
    utils::media,
};
use actix_web::{HttpResponse, web};
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::MySqlPool;
use tracing::debug;
use utoipa::ToSchema;

#[derive(Debug, Deserialize, ToSchema)]
pub struct ReconcileRequest {
    /// The copy the device holds, if any.
    pub local: Option<WorkDraft>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ReconcileResponse {
    pub source: DraftSource,
    pub draft: Option<WorkDraft>,
}

async fn load(pool: &MySqlPool, cleaner_id: u64) -> ApiResult<Option<WorkDraft>> {
    let row = sqlx::query_as::<_, WorkDraftRow>(
        r#"
        SELECT cleaner_id, draft_data, photo_count, updated_at
        FROM work_drafts
        WHERE cleaner_id = ?
        "#,
    )
    .bind(cleaner_id)
    .fetch_optional(pool)
    .await?;

    Ok(row.and_then(|r| r.decode()))
}

fn check_photos(draft: &WorkDraft, max_bytes: usize) -> ApiResult<()> {
    for (task_id, photo) in &draft.photos {
        if photo.trim().is_empty() {
            continue;
        }
        media::inspect_photo(photo, max_bytes)
            .map_err(|e| ApiError::bad_request(format!("Photo for task {task_id}: {e}")))?;
    }
    Ok(())
}

async fn store(pool: &MySqlPool, cleaner_id: u64, draft: &WorkDraft) -> ApiResult<()> {
    let data = serde_json::to_string(draft)?;

    sqlx::query(
        r#"
        INSERT INTO work_drafts (cleaner_id, draft_data, photo_count, updated_at)
        VALUES (?, ?, ?, ?)
        ON DUPLICATE KEY UPDATE
            draft_data = VALUES(draft_data),
            photo_count = VALUES(photo_count),
            updated_at = VALUES(updated_at)
        "#,
    )
    .bind(cleaner_id)
    .bind(data)
    .bind(draft.photo_count() as u32)
    .bind(draft.updated_at)
    .execute(pool)
    .await?;

    debug!(cleaner_id, photos = draft.photo_count(), "Work draft saved");
    Ok(())
}

/// Save the in-progress checklist
#[utoipa::path(
    put,
    path = "/api/v1/drafts",
    request_body = WorkDraft,
    responses(
        (status = 200, description = "Draft saved"),
        (status = 400, description = "Unreadable photo")
    ),
    security(("bearer_auth" = [])),
    tag = "Drafts"
)]
pub async fn save_draft(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
    body: web::Json<WorkDraft>,
) -> actix_web::Result<HttpResponse> {
    let cleaner_id = auth.require_cleaner()?;
    check_photos(&body, config.max_photo_bytes)?;
    store(pool.get_ref(), cleaner_id, &body).await?;

    Ok(HttpResponse::Ok().json(json!({
        "message": "Draft saved",
        "photo_count": body.photo_count(),
    })))
}

#[utoipa::path(
    get,
    path = "/api/v1/drafts",
    responses(
        (status = 200, description = "Server copy of the draft", body = WorkDraft),
        (status = 404, description = "No draft stored")
    ),
    security(("bearer_auth" = [])),
    tag = "Drafts"
)]
pub async fn get_draft(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
) -> actix_web::Result<HttpResponse> {
    let cleaner_id = auth.require_cleaner()?;
    let draft = load(pool.get_ref(), cleaner_id)
        .await?
        .ok_or_else(|| ApiError::not_found("No draft stored"))?;

    Ok(HttpResponse::Ok().json(draft))
}

#[utoipa::path(
    delete,
    path = "/api/v1/drafts",
    responses((status = 204, description = "Draft removed (idempotent)")),
    security(("bearer_auth" = [])),
    tag = "Drafts"
)]
pub async fn delete_draft(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
) -> actix_web::Result<HttpResponse> {
    let cleaner_id = auth.require_cleaner()?;

    sqlx::query("DELETE FROM work_drafts WHERE cleaner_id = ?")
        .bind(cleaner_id)
        .execute(pool.get_ref())
        .await
        .map_err(ApiError::from)?;

    Ok(HttpResponse::NoContent().finish())
}

/// Picks the copy to resume from and keeps the server copy in step with it.
#[utoipa::path(
    post,
    path = "/api/v1/drafts/reconcile",
    request_body = ReconcileRequest,
    responses((status = 200, description = "Winning draft", body = ReconcileResponse)),
    security(("bearer_auth" = [])),
    tag = "Drafts"
)]
pub async fn reconcile_draft(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
    body: web::Json<ReconcileRequest>,
) -> actix_web::Result<HttpResponse> {
    let cleaner_id = auth.require_cleaner()?;
    let local = body.into_inner().local;
    if let Some(draft) = &local {
        check_photos(draft, config.max_photo_bytes)?;
    }

    let server = load(pool.get_ref(), cleaner_id).await?;
    let (draft, source) = reconcile(local, server);

    if let (DraftSource::Local, Some(winner)) = (source, &draft) {
        store(pool.get_ref(), cleaner_id, winner).await?;
    }

    debug!(cleaner_id, ?source, "Draft reconciled");
    Ok(HttpResponse::Ok().json(ReconcileResponse { source, draft }))
}
