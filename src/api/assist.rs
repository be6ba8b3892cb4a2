use crate::{
    auth::auth::AuthUser,
    config::Config,
    error::{ApiError, ApiResult},
    model::{
        assist_request::{
            Actor, AssistRequest, AssistStatus, TransitionError, Urgency, authorize_transition,
        },
        cleaner::Cleaner,
        cleaner_log::LogAction,
        live_tracking::TrackingEvent,
    },
    service::{
        activity::{self, Activity},
        attendance::load_cleaner,
        now,
    },
    utils::media,
};
use actix_web::{HttpResponse, web};
use serde::Deserialize;
use serde_json::json;
use sqlx::MySqlPool;
use tracing::info;
use utoipa::{IntoParams, ToSchema};

const ASSIST_COLUMNS: &str = r#"
    id, requested_by, requester_name, accepted_by, accepted_by_name, qr_code_id,
    area_label, customer_name, description, urgency, status, before_media,
    after_media, escalation_reason, created_at, accepted_at, closed_at
"#;

/// At most this many photos on either side of a request.
const MAX_MEDIA: usize = 4;

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateAssist {
    pub qr_code_id: Option<u64>,
    #[schema(example = "Ladies WC, 2nd floor")]
    pub area_label: String,
    pub customer_name: Option<String>,
    #[schema(example = "Blocked sink, need a second pair of hands")]
    pub description: String,
    pub urgency: Option<Urgency>,
    /// Photos of the problem, base64 or data URIs.
    #[serde(default)]
    pub before_media: Vec<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ResolveAssist {
    /// Photos of the finished job.
    #[serde(default)]
    pub after_media: Vec<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct EscalateAssist {
    #[schema(example = "Needs a plumber")]
    pub reason: String,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct AssistQuery {
    /// pending, accepted, resolved, escalated or cancelled
    pub status: Option<String>,
    /// Only requests the caller raised or accepted.
    pub mine: Option<bool>,
}

fn transition_error(e: TransitionError) -> ApiError {
    match e {
        TransitionError::NotAllowed(_) => ApiError::forbidden(e.to_string()),
        TransitionError::Invalid { .. } | TransitionError::UnknownStatus(_) => {
            ApiError::bad_request(e.to_string())
        }
    }
}

/// Validates and normalises photos into a JSON array of data URIs.
fn encode_media(items: &[String], max_bytes: usize) -> ApiResult<Option<String>> {
    if items.is_empty() {
        return Ok(None);
    }
    if items.len() > MAX_MEDIA {
        return Err(ApiError::bad_request(format!("At most {MAX_MEDIA} photos per request")));
    }

    let uris = items
        .iter()
        .enumerate()
        .map(|(i, item)| {
            let info = media::inspect_photo(item, max_bytes)
                .map_err(|e| ApiError::bad_request(format!("Photo {}: {e}", i + 1)))?;
            Ok(media::to_data_uri(item, &info))
        })
        .collect::<ApiResult<Vec<_>>>()?;

    Ok(Some(serde_json::to_string(&uris)?))
}

async fn fetch(pool: &MySqlPool, id: u64) -> ApiResult<AssistRequest> {
    sqlx::query_as::<_, AssistRequest>(&format!(
        "SELECT {ASSIST_COLUMNS} FROM bathroom_assist_requests WHERE id = ?"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| ApiError::not_found("Assist request not found"))
}

/// Loads the request and checks the caller may drive it to `to`.
async fn prepare(
    pool: &MySqlPool,
    auth: &AuthUser,
    id: u64,
    to: AssistStatus,
) -> ApiResult<(Cleaner, AssistRequest, AssistStatus)> {
    let cleaner_id = auth
        .cleaner_id
        .ok_or_else(|| ApiError::forbidden("No cleaner profile"))?;
    let cleaner = load_cleaner(pool, cleaner_id).await?;
    let request = fetch(pool, id).await?;

    let from = authorize_transition(&request, Actor::of(&request, cleaner_id), to)
        .map_err(transition_error)?;

    Ok((cleaner, request, from))
}

/// Zero rows means someone else moved the request first.
fn ensure_applied(rows: u64) -> ApiResult<()> {
    if rows == 0 {
        return Err(ApiError::bad_request(
            "Assist request was changed by someone else, reload and try again",
        ));
    }
    Ok(())
}

fn log_event<'a>(cleaner: &'a Cleaner, request: &'a AssistRequest, action: LogAction) -> Activity<'a> {
    let mut event = Activity::new(cleaner.id, &cleaner.name, action);
    event.qr_code_id = request.qr_code_id;
    event.area_label = Some(request.area_label.as_str());
    event.customer_name = request.customer_name.as_deref();
    event
}

/// Raise an assist request
#[utoipa::path(
    post,
    path = "/api/v1/assist",
    request_body = CreateAssist,
    responses(
        (status = 201, description = "Assist request raised", body = Object, example = json!({
            "message": "Assist request raised", "id": 9
        })),
        (status = 400, description = "Missing description or unreadable photo")
    ),
    security(("bearer_auth" = [])),
    tag = "Assist"
)]
pub async fn create_assist(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
    body: web::Json<CreateAssist>,
) -> actix_web::Result<HttpResponse> {
    let cleaner_id = auth.require_cleaner()?;
    let cleaner = load_cleaner(pool.get_ref(), cleaner_id).await?;

    let area_label = body.area_label.trim();
    let description = body.description.trim();
    if area_label.is_empty() || description.is_empty() {
        return Err(ApiError::bad_request("Area and description are required").into());
    }

    let before_media = encode_media(&body.before_media, config.max_photo_bytes)?;
    let urgency = body.urgency.unwrap_or(Urgency::Normal);
    let customer = body
        .customer_name
        .clone()
        .or_else(|| cleaner.customer_name.clone());

    let id = sqlx::query(
        r#"
        INSERT INTO bathroom_assist_requests
        (requested_by, requester_name, qr_code_id, area_label, customer_name,
         description, urgency, status, before_media, created_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(cleaner.id)
    .bind(&cleaner.name)
    .bind(body.qr_code_id)
    .bind(area_label)
    .bind(&customer)
    .bind(description)
    .bind(urgency.as_ref())
    .bind(AssistStatus::Pending.as_ref())
    .bind(before_media)
    .bind(now())
    .execute(pool.get_ref())
    .await
    .map_err(ApiError::from)?
    .last_insert_id();

    info!(id, cleaner_id, urgency = urgency.as_ref(), "Assist request raised");

    let mut event = Activity::new(cleaner.id, &cleaner.name, LogAction::AssistRaised);
    event.qr_code_id = body.qr_code_id;
    event.area_label = Some(area_label);
    event.customer_name = customer.as_deref();
    event.notes = Some(description);
    activity::record(pool.get_ref(), &event).await;

    Ok(HttpResponse::Created().json(json!({ "message": "Assist request raised", "id": id })))
}

/// Managers see every request; cleaners see open requests plus their own.
#[utoipa::path(
    get,
    path = "/api/v1/assist",
    params(AssistQuery),
    responses((status = 200, description = "Assist requests, newest first", body = [AssistRequest])),
    security(("bearer_auth" = [])),
    tag = "Assist"
)]
pub async fn list_assist(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<AssistQuery>,
) -> actix_web::Result<HttpResponse> {
    let status = match &query.status {
        Some(raw) => Some(
            raw.parse::<AssistStatus>()
                .map_err(|_| ApiError::bad_request("Unknown status"))?,
        ),
        None => None,
    };

    let mut sql = format!("SELECT {ASSIST_COLUMNS} FROM bathroom_assist_requests WHERE 1 = 1");
    let mut ids: Vec<u64> = Vec::new();

    if !auth.is_manager() {
        let cleaner_id = auth.require_cleaner()?;
        if query.mine.unwrap_or(false) {
            sql.push_str(" AND (requested_by = ? OR accepted_by = ?)");
        } else {
            sql.push_str(" AND (status = 'pending' OR requested_by = ? OR accepted_by = ?)");
        }
        ids.extend([cleaner_id, cleaner_id]);
    }
    if status.is_some() {
        sql.push_str(" AND status = ?");
    }
    sql.push_str(" ORDER BY created_at DESC LIMIT 200");

    let mut q = sqlx::query_as::<_, AssistRequest>(&sql);
    for id in ids {
        q = q.bind(id);
    }
    if let Some(status) = &status {
        q = q.bind(status.as_ref());
    }

    let rows = q.fetch_all(pool.get_ref()).await.map_err(ApiError::from)?;
    Ok(HttpResponse::Ok().json(rows))
}

#[utoipa::path(
    get,
    path = "/api/v1/assist/{id}",
    params(("id", Path, description = "Assist request ID")),
    responses(
        (status = 200, description = "Assist request", body = AssistRequest),
        (status = 404, description = "Not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Assist"
)]
pub async fn get_assist(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> actix_web::Result<HttpResponse> {
    let request = fetch(pool.get_ref(), path.into_inner()).await?;
    if !auth.is_manager() {
        let cleaner_id = auth.require_cleaner()?;
        if !request.visible_to(cleaner_id) {
            return Err(ApiError::not_found("Assist request not found").into());
        }
    }
    Ok(HttpResponse::Ok().json(request))
}

#[utoipa::path(
    post,
    path = "/api/v1/assist/{id}/accept",
    params(("id", Path, description = "Assist request ID")),
    responses(
        (status = 200, description = "Accepted"),
        (status = 400, description = "Not pending any more"),
        (status = 403, description = "Own request")
    ),
    security(("bearer_auth" = [])),
    tag = "Assist"
)]
pub async fn accept_assist(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> ApiResult<HttpResponse> {
    let id = path.into_inner();
    let (cleaner, request, from) = prepare(pool.get_ref(), &auth, id, AssistStatus::Accepted).await?;

    let result = sqlx::query(
        r#"
        UPDATE bathroom_assist_requests
        SET status = ?, accepted_by = ?, accepted_by_name = ?, accepted_at = ?
        WHERE id = ? AND status = ?
        "#,
    )
    .bind(AssistStatus::Accepted.as_ref())
    .bind(cleaner.id)
    .bind(&cleaner.name)
    .bind(now())
    .bind(id)
    .bind(from.as_ref())
    .execute(pool.get_ref())
    .await?;
    ensure_applied(result.rows_affected())?;

    info!(id, cleaner_id = cleaner.id, "Assist request accepted");
    let event = log_event(&cleaner, &request, LogAction::AssistAccepted)
        .tracked(TrackingEvent::AssistAccepted);
    activity::record(pool.get_ref(), &event).await;

    Ok(HttpResponse::Ok().json(json!({ "message": "Assist request accepted" })))
}

#[utoipa::path(
    post,
    path = "/api/v1/assist/{id}/resolve",
    params(("id", Path, description = "Assist request ID")),
    request_body = ResolveAssist,
    responses(
        (status = 200, description = "Resolved"),
        (status = 400, description = "Not accepted, or unreadable photo"),
        (status = 403, description = "Only the acceptor resolves")
    ),
    security(("bearer_auth" = [])),
    tag = "Assist"
)]
pub async fn resolve_assist(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
    path: web::Path<u64>,
    body: web::Json<ResolveAssist>,
) -> ApiResult<HttpResponse> {
    let id = path.into_inner();
    let (cleaner, request, from) = prepare(pool.get_ref(), &auth, id, AssistStatus::Resolved).await?;
    let after_media = encode_media(&body.after_media, config.max_photo_bytes)?;

    let result = sqlx::query(
        r#"
        UPDATE bathroom_assist_requests
        SET status = ?, after_media = ?, closed_at = ?
        WHERE id = ? AND status = ?
        "#,
    )
    .bind(AssistStatus::Resolved.as_ref())
    .bind(after_media)
    .bind(now())
    .bind(id)
    .bind(from.as_ref())
    .execute(pool.get_ref())
    .await?;
    ensure_applied(result.rows_affected())?;

    info!(id, cleaner_id = cleaner.id, "Assist request resolved");
    activity::record(
        pool.get_ref(),
        &log_event(&cleaner, &request, LogAction::AssistResolved),
    )
    .await;

    Ok(HttpResponse::Ok().json(json!({ "message": "Assist request resolved" })))
}

#[utoipa::path(
    post,
    path = "/api/v1/assist/{id}/escalate",
    params(("id", Path, description = "Assist request ID")),
    request_body = EscalateAssist,
    responses(
        (status = 200, description = "Escalated"),
        (status = 400, description = "Not accepted, or reason missing"),
        (status = 403, description = "Neither requester nor acceptor")
    ),
    security(("bearer_auth" = [])),
    tag = "Assist"
)]
pub async fn escalate_assist(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    body: web::Json<EscalateAssist>,
) -> ApiResult<HttpResponse> {
    let reason = body.reason.trim();
    if reason.is_empty() {
        return Err(ApiError::bad_request("A reason is required to escalate"));
    }

    let id = path.into_inner();
    let (cleaner, request, from) = prepare(pool.get_ref(), &auth, id, AssistStatus::Escalated).await?;

    let result = sqlx::query(
        r#"
        UPDATE bathroom_assist_requests
        SET status = ?, escalation_reason = ?, closed_at = ?
        WHERE id = ? AND status = ?
        "#,
    )
    .bind(AssistStatus::Escalated.as_ref())
    .bind(reason)
    .bind(now())
    .bind(id)
    .bind(from.as_ref())
    .execute(pool.get_ref())
    .await?;
    ensure_applied(result.rows_affected())?;

    tracing::warn!(id, cleaner_id = cleaner.id, reason, "Assist request escalated");
    let mut event = log_event(&cleaner, &request, LogAction::AssistEscalated);
    event.notes = Some(reason);
    activity::record(pool.get_ref(), &event).await;

    Ok(HttpResponse::Ok().json(json!({ "message": "Assist request escalated" })))
}

#[utoipa::path(
    post,
    path = "/api/v1/assist/{id}/cancel",
    params(("id", Path, description = "Assist request ID")),
    responses(
        (status = 200, description = "Cancelled"),
        (status = 400, description = "Already closed"),
        (status = 403, description = "Only the requester cancels")
    ),
    security(("bearer_auth" = [])),
    tag = "Assist"
)]
pub async fn cancel_assist(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> ApiResult<HttpResponse> {
    let id = path.into_inner();
    let (cleaner, request, from) = prepare(pool.get_ref(), &auth, id, AssistStatus::Cancelled).await?;

    let result = sqlx::query(
        r#"
        UPDATE bathroom_assist_requests
        SET status = ?, closed_at = ?
        WHERE id = ? AND status = ?
        "#,
    )
    .bind(AssistStatus::Cancelled.as_ref())
    .bind(now())
    .bind(id)
    .bind(from.as_ref())
    .execute(pool.get_ref())
    .await?;
    ensure_applied(result.rows_affected())?;

    info!(id, cleaner_id = cleaner.id, "Assist request cancelled");
    activity::record(
        pool.get_ref(),
        &log_event(&cleaner, &request, LogAction::AssistCancelled),
    )
    .await;

    Ok(HttpResponse::Ok().json(json!({ "message": "Assist request cancelled" })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::media::fixtures::png_base64;

    #[test]
    fn media_is_stored_as_data_uris() {
        let stored = encode_media(&[png_base64()], 1024).unwrap().unwrap();
        let uris: Vec<String> = serde_json::from_str(&stored).unwrap();
        assert_eq!(uris.len(), 1);
        assert!(uris[0].starts_with("data:image/png;base64,"));

        assert_eq!(encode_media(&[], 1024).unwrap(), None);
    }

    #[test]
    fn media_limits_are_enforced() {
        let too_many = vec![png_base64(); MAX_MEDIA + 1];
        assert!(matches!(encode_media(&too_many, 1024), Err(ApiError::BadRequest(_))));
        assert!(matches!(
            encode_media(&["bm90IGFuIGltYWdl".to_string()], 1024),
            Err(ApiError::BadRequest(_))
        ));
    }

    #[test]
    fn transition_errors_map_to_statuses() {
        assert!(matches!(
            transition_error(TransitionError::NotAllowed("no")),
            ApiError::Forbidden(_)
        ));
        assert!(matches!(
            transition_error(TransitionError::Invalid {
                from: AssistStatus::Resolved,
                to: AssistStatus::Accepted
            }),
            ApiError::BadRequest(_)
        ));
        assert!(ensure_applied(0).is_err());
        assert!(ensure_applied(1).is_ok());
    }
}
