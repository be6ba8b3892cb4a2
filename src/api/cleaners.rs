use crate::{
    auth::auth::AuthUser,
    db::{Violation, violation},
    error::{ApiError, ApiResult},
    model::cleaner::{Cleaner, CleanerStatus},
    utils::{
        db_utils::{build_update_sql, execute_update, page_window},
        mobile_filter, roster_cache,
    },
};
use actix_web::{HttpResponse, web};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use sqlx::MySqlPool;
use tracing::{debug, info};
use utoipa::{IntoParams, ToSchema};

const UPDATABLE_COLUMNS: &[&str] = &["name", "mobile", "status", "customer_name"];

#[derive(Deserialize, Serialize, ToSchema)]
pub struct CreateCleaner {
    #[schema(example = "Maria Silva")]
    pub name: String,
    #[schema(example = "07700 900123")]
    pub mobile: String,
    #[schema(example = "Harbour Offices", nullable = true)]
    pub customer_name: Option<String>,
}

#[derive(Debug, Deserialize, IntoParams, ToSchema)]
pub struct CleanerQuery {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
    /// active, inactive or suspended
    pub status: Option<String>,
    pub customer: Option<String>,
    /// Matches name or mobile
    pub search: Option<String>,
}

#[derive(Serialize, ToSchema)]
pub struct CleanerListResponse {
    pub data: Vec<Cleaner>,
    #[schema(example = 1)]
    pub page: u32,
    #[schema(example = 20)]
    pub per_page: u32,
    #[schema(example = 42)]
    pub total: i64,
}

/// Create Cleaner
#[utoipa::path(
    post,
    path = "/api/v1/cleaners",
    request_body = CreateCleaner,
    responses(
        (status = 201, description = "Cleaner created", body = Object, example = json!({
            "message": "Cleaner created", "id": 12
        })),
        (status = 400, description = "Validation failed"),
        (status = 409, description = "Mobile already registered")
    ),
    tag = "Cleaner",
    security(("bearer_auth" = []))
)]
pub async fn create_cleaner(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    payload: web::Json<CreateCleaner>,
) -> ApiResult<HttpResponse> {
    auth.require_manager()
        .map_err(|_| ApiError::forbidden("Manager/Admin only"))?;

    let name = payload.name.trim();
    let mobile = payload.mobile.trim();
    if name.is_empty() || mobile.is_empty() {
        return Err(ApiError::bad_request("Name and mobile are required"));
    }

    if !mobile_filter::is_mobile_available(mobile, pool.get_ref()).await {
        return Err(ApiError::conflict("Mobile number already registered"));
    }

    let result = sqlx::query(
        r#"
        INSERT INTO cleaners (name, mobile, status, customer_name)
        VALUES (?, ?, ?, ?)
        "#,
    )
    .bind(name)
    .bind(mobile)
    .bind(CleanerStatus::Active.as_ref())
    .bind(payload.customer_name.as_deref().map(str::trim))
    .execute(pool.get_ref())
    .await;

    let id = result.map_err(cleaner_write_error)?.last_insert_id();

    mobile_filter::insert(mobile);
    roster_cache::invalidate().await;
    info!(cleaner_id = id, "Cleaner created");

    Ok(HttpResponse::Created().json(json!({ "message": "Cleaner created", "id": id })))
}

#[utoipa::path(
    get,
    path = "/api/v1/cleaners",
    params(CleanerQuery),
    responses(
        (status = 200, description = "Paginated cleaner list", body = CleanerListResponse)
    ),
    tag = "Cleaner",
    security(("bearer_auth" = []))
)]
pub async fn list_cleaners(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<CleanerQuery>,
) -> ApiResult<HttpResponse> {
    auth.require_manager()
        .map_err(|_| ApiError::forbidden("Manager/Admin only"))?;

    let (page, per_page, offset) = page_window(query.page, query.per_page, 100);

    // ---------- build WHERE clause dynamically ----------
    let mut conditions = Vec::new();
    let mut bindings: Vec<String> = Vec::new();

    if let Some(status) = &query.status {
        let status: CleanerStatus = status
            .parse()
            .map_err(|_| ApiError::bad_request("Unknown status"))?;
        conditions.push("status = ?");
        bindings.push(status.as_ref().to_string());
    }

    if let Some(customer) = &query.customer {
        conditions.push("customer_name = ?");
        bindings.push(customer.clone());
    }

    if let Some(search) = &query.search {
        conditions.push("(name LIKE ? OR mobile LIKE ?)");
        let like = format!("%{}%", search.trim());
        bindings.push(like.clone());
        bindings.push(like);
    }

    let where_clause = if conditions.is_empty() {
        "".to_string()
    } else {
        format!("WHERE {}", conditions.join(" AND "))
    };

    let count_sql = format!("SELECT COUNT(*) FROM cleaners {}", where_clause);
    debug!(sql = %count_sql, bindings = ?bindings, "Counting cleaners");

    let mut count_query = sqlx::query_scalar::<_, i64>(&count_sql);
    for b in &bindings {
        count_query = count_query.bind(b);
    }
    let total = count_query.fetch_one(pool.get_ref()).await?;

    let data_sql = format!(
        r#"
        SELECT id, name, mobile, status, customer_name, created_at
        FROM cleaners {}
        ORDER BY name ASC
        LIMIT ? OFFSET ?
        "#,
        where_clause
    );

    let mut data_query = sqlx::query_as::<_, Cleaner>(&data_sql);
    for b in &bindings {
        data_query = data_query.bind(b);
    }
    let cleaners = data_query
        .bind(per_page as i64)
        .bind(offset)
        .fetch_all(pool.get_ref())
        .await?;

    Ok(HttpResponse::Ok().json(CleanerListResponse {
        data: cleaners,
        page,
        per_page,
        total,
    }))
}

#[utoipa::path(
    get,
    path = "/api/v1/cleaners/{cleaner_id}",
    params(("cleaner_id", Path, description = "Cleaner ID")),
    responses(
        (status = 200, description = "Cleaner found", body = Cleaner),
        (status = 404, description = "Cleaner not found")
    ),
    tag = "Cleaner",
    security(("bearer_auth" = []))
)]
pub async fn get_cleaner(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> ApiResult<HttpResponse> {
    let cleaner_id = path.into_inner();

    // cleaners may read their own profile
    if !auth.is_manager() && auth.cleaner_id != Some(cleaner_id) {
        return Err(ApiError::forbidden("Not your profile"));
    }

    let cleaner = fetch_cleaner(pool.get_ref(), cleaner_id).await?;
    Ok(HttpResponse::Ok().json(cleaner))
}

async fn fetch_cleaner(pool: &MySqlPool, cleaner_id: u64) -> ApiResult<Cleaner> {
    sqlx::query_as::<_, Cleaner>(
        r#"
        SELECT id, name, mobile, status, customer_name, created_at
        FROM cleaners
        WHERE id = ?
        "#,
    )
    .bind(cleaner_id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| ApiError::not_found("Cleaner not found"))
}

/// Maps integrity failures on a cleaner insert or update to client errors.
fn cleaner_write_error(err: sqlx::Error) -> ApiError {
    match violation(&err) {
        Some(Violation::Unique) => ApiError::conflict("Mobile number already registered"),
        Some(Violation::NotNull) => ApiError::bad_request("Name and mobile cannot be null"),
        _ => ApiError::from(err),
    }
}

/// The previous number, when an update really changes it.
fn replaced_mobile<'a>(current: &'a str, requested: Option<&str>) -> Option<&'a str> {
    requested.filter(|new| *new != current).map(|_| current)
}

fn login_enabled(status: CleanerStatus) -> bool {
    status == CleanerStatus::Active
}

/// Any status other than active locks the cleaner's login; a locked account
/// cannot log in or refresh.
async fn sync_login(pool: &MySqlPool, cleaner_id: u64, status: CleanerStatus) -> ApiResult<()> {
    sqlx::query("UPDATE users SET is_active = ? WHERE cleaner_id = ?")
        .bind(login_enabled(status))
        .bind(cleaner_id)
        .execute(pool)
        .await?;
    debug!(cleaner_id, ?status, "Login status synced");
    Ok(())
}

/// Partial update; only name, mobile, status and customer_name may change.
#[utoipa::path(
    put,
    path = "/api/v1/cleaners/{cleaner_id}",
    params(("cleaner_id", Path, description = "Cleaner ID")),
    request_body(content = Object, example = json!({"status": "inactive"})),
    responses(
        (status = 200, description = "Cleaner updated"),
        (status = 400, description = "Unknown field or value"),
        (status = 404, description = "Cleaner not found")
    ),
    tag = "Cleaner",
    security(("bearer_auth" = []))
)]
pub async fn update_cleaner(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    body: web::Json<Value>,
) -> ApiResult<HttpResponse> {
    auth.require_manager()
        .map_err(|_| ApiError::forbidden("Manager/Admin only"))?;

    let cleaner_id = path.into_inner();

    let new_status = match body.get("status") {
        None => None,
        Some(status) => Some(
            status
                .as_str()
                .and_then(|s| s.parse::<CleanerStatus>().ok())
                .ok_or_else(|| ApiError::bad_request("Unknown status"))?,
        ),
    };

    let new_mobile = body.get("mobile").and_then(Value::as_str).map(str::trim);
    if new_mobile.is_some_and(str::is_empty) {
        return Err(ApiError::bad_request("Mobile cannot be empty"));
    }

    let update = build_update_sql("cleaners", &body, UPDATABLE_COLUMNS, "id", cleaner_id)?;
    let current = fetch_cleaner(pool.get_ref(), cleaner_id).await?;

    execute_update(pool.get_ref(), update)
        .await
        .map_err(cleaner_write_error)?;

    if let Some(old) = replaced_mobile(&current.mobile, new_mobile) {
        mobile_filter::remove(old);
    }
    if let Some(mobile) = new_mobile {
        mobile_filter::insert(mobile);
    }
    if let Some(status) = new_status {
        sync_login(pool.get_ref(), cleaner_id, status).await?;
    }
    roster_cache::invalidate().await;
    info!(cleaner_id, "Cleaner updated");

    Ok(HttpResponse::Ok().json(json!({ "message": "Cleaner updated successfully" })))
}

/// Cleaners are never hard-deleted; their history stays attributable.
#[utoipa::path(
    delete,
    path = "/api/v1/cleaners/{cleaner_id}",
    params(("cleaner_id", Path, description = "Cleaner ID")),
    responses(
        (status = 200, description = "Cleaner deactivated"),
        (status = 404, description = "Cleaner not found")
    ),
    tag = "Cleaner",
    security(("bearer_auth" = []))
)]
pub async fn deactivate_cleaner(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> ApiResult<HttpResponse> {
    auth.require_manager()
        .map_err(|_| ApiError::forbidden("Manager/Admin only"))?;

    let cleaner_id = path.into_inner();

    let result = sqlx::query("UPDATE cleaners SET status = ? WHERE id = ?")
        .bind(CleanerStatus::Inactive.as_ref())
        .bind(cleaner_id)
        .execute(pool.get_ref())
        .await?;

    if result.rows_affected() == 0 {
        let exists = sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM cleaners WHERE id = ?)")
            .bind(cleaner_id)
            .fetch_one(pool.get_ref())
            .await?;
        if !exists {
            return Err(ApiError::not_found("Cleaner not found"));
        }
    }

    sync_login(pool.get_ref(), cleaner_id, CleanerStatus::Inactive).await?;

    roster_cache::invalidate().await;
    info!(cleaner_id, "Cleaner deactivated");

    Ok(HttpResponse::Ok().json(json!({ "message": "Cleaner deactivated" })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_errors::{Kind, db_error};

    #[test]
    fn write_errors_map_to_client_statuses() {
        assert!(matches!(cleaner_write_error(db_error(Kind::Unique)), ApiError::Conflict(_)));
        assert!(matches!(cleaner_write_error(db_error(Kind::NotNull)), ApiError::BadRequest(_)));
        assert!(matches!(cleaner_write_error(db_error(Kind::Other)), ApiError::Database(_)));
    }

    #[test]
    fn only_a_different_mobile_is_replaced() {
        assert_eq!(replaced_mobile("07700 900123", Some("07700 900999")), Some("07700 900123"));
        assert_eq!(replaced_mobile("07700 900123", Some("07700 900123")), None);
        assert_eq!(replaced_mobile("07700 900123", None), None);
    }

    #[test]
    fn non_active_statuses_lock_the_login() {
        assert!(login_enabled(CleanerStatus::Active));
        assert!(!login_enabled(CleanerStatus::Inactive));
        assert!(!login_enabled(CleanerStatus::Suspended));
    }
}
