use crate::{
    auth::auth::AuthUser,
    config::Config,
    error::{ApiError, ApiResult},
    model::qr_code::QrCodeRecord,
    qr::{self, QrKind, QrPayload},
    utils::{area_classifier, media},
};
use actix_web::{HttpResponse, web};
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::MySqlPool;
use tracing::info;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateQrCode {
    pub qr_type: QrKind,
    #[schema(example = "Harbour Offices")]
    pub customer_name: Option<String>,
    pub building_name: Option<String>,
    /// Required for area codes.
    #[schema(example = "Ground Floor Gents")]
    pub area_label: Option<String>,
    /// Overrides the category derived from the label.
    pub area_category: Option<String>,
    /// Pre-rendered image as a data URI, stored as-is for reprinting.
    pub qr_image: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CreatedQrCode {
    pub id: u64,
    pub code_uid: String,
    /// Text to encode into the printed code.
    pub payload: String,
    pub metadata: QrPayload,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct QrCodeQuery {
    pub qr_type: Option<String>,
    pub customer: Option<String>,
}

fn trimmed(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// Builds the stored payload; area codes get their category resolved once, here.
fn build_payload(req: &CreateQrCode, code_uid: String) -> ApiResult<QrPayload> {
    let mut payload = QrPayload::new(req.qr_type);
    payload.code_uid = Some(code_uid);
    payload.customer = trimmed(&req.customer_name);
    payload.building = trimmed(&req.building_name);
    payload.area = trimmed(&req.area_label);

    if req.qr_type == QrKind::Area {
        let label = payload
            .area
            .as_deref()
            .ok_or_else(|| ApiError::bad_request("Area codes need an area label"))?;
        let category = area_classifier::resolve(
            payload.customer.as_deref(),
            label,
            req.area_category.as_deref(),
        );
        payload.category = Some(category.to_string());
    }

    Ok(payload)
}

/// Create QR code
#[utoipa::path(
    post,
    path = "/api/v1/qr-codes",
    request_body = CreateQrCode,
    responses(
        (status = 201, description = "QR code created", body = CreatedQrCode),
        (status = 400, description = "Missing area label or unreadable image"),
        (status = 403, description = "Manager/Admin only")
    ),
    security(("bearer_auth" = [])),
    tag = "QR Codes"
)]
pub async fn create_qr_code(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
    body: web::Json<CreateQrCode>,
) -> actix_web::Result<HttpResponse> {
    auth.require_manager()?;

    let code_uid = Uuid::new_v4().to_string();
    let payload = build_payload(&body, code_uid.clone())?;

    let image = match body.qr_image.as_deref().filter(|i| !i.trim().is_empty()) {
        Some(raw) => {
            let info = media::inspect_photo(raw, config.max_photo_bytes)
                .map_err(|e| ApiError::bad_request(format!("QR image: {e}")))?;
            Some(media::to_data_uri(raw, &info))
        }
        None => None,
    };

    let encoded = qr::encode(&payload);

    let id = sqlx::query(
        r#"
        INSERT INTO building_qr_codes
        (code_uid, qr_type, customer_name, building_name, area_label, area_category,
         metadata, qr_image, created_by)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&code_uid)
    .bind(payload.kind.as_ref())
    .bind(&payload.customer)
    .bind(&payload.building)
    .bind(&payload.area)
    .bind(&payload.category)
    .bind(&encoded)
    .bind(image)
    .bind(auth.user_id)
    .execute(pool.get_ref())
    .await
    .map_err(ApiError::from)?
    .last_insert_id();

    info!(id, %code_uid, kind = %payload.kind, "QR code created");

    Ok(HttpResponse::Created().json(CreatedQrCode {
        id,
        code_uid,
        payload: encoded,
        metadata: payload,
    }))
}

#[utoipa::path(
    get,
    path = "/api/v1/qr-codes",
    params(QrCodeQuery),
    responses((status = 200, description = "QR codes without images", body = [QrCodeRecord])),
    security(("bearer_auth" = [])),
    tag = "QR Codes"
)]
pub async fn list_qr_codes(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<QrCodeQuery>,
) -> actix_web::Result<HttpResponse> {
    auth.require_manager()?;

    let mut sql = String::from(
        r#"
        SELECT id, code_uid, qr_type, customer_name, building_name, area_label,
               area_category, metadata, NULL AS qr_image, created_by, created_at
        FROM building_qr_codes
        WHERE 1 = 1
        "#,
    );

    let kind = match &query.qr_type {
        Some(raw) => Some(
            raw.parse::<QrKind>()
                .map_err(|_| ApiError::bad_request("Unknown QR type"))?,
        ),
        None => None,
    };
    if kind.is_some() {
        sql.push_str(" AND qr_type = ?");
    }
    if query.customer.is_some() {
        sql.push_str(" AND customer_name = ?");
    }
    sql.push_str(" ORDER BY customer_name, building_name, area_label");

    let mut q = sqlx::query_as::<_, QrCodeRecord>(&sql);
    if let Some(kind) = &kind {
        q = q.bind(kind.as_ref());
    }
    if let Some(customer) = &query.customer {
        q = q.bind(customer);
    }

    let codes = q.fetch_all(pool.get_ref()).await.map_err(ApiError::from)?;
    Ok(HttpResponse::Ok().json(codes))
}

#[utoipa::path(
    get,
    path = "/api/v1/qr-codes/{id}",
    params(("id", Path, description = "QR code ID")),
    responses(
        (status = 200, description = "QR code with image", body = QrCodeRecord),
        (status = 404, description = "QR code not found")
    ),
    security(("bearer_auth" = [])),
    tag = "QR Codes"
)]
pub async fn get_qr_code(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> actix_web::Result<HttpResponse> {
    auth.require_manager()?;

    let record = sqlx::query_as::<_, QrCodeRecord>(
        r#"
        SELECT id, code_uid, qr_type, customer_name, building_name, area_label,
               area_category, metadata, qr_image, created_by, created_at
        FROM building_qr_codes
        WHERE id = ?
        "#,
    )
    .bind(path.into_inner())
    .fetch_optional(pool.get_ref())
    .await
    .map_err(ApiError::from)?
    .ok_or_else(|| ApiError::not_found("QR code not found"))?;

    Ok(HttpResponse::Ok().json(json!({
        "payload": qr::encode(&record.payload()),
        "record": record,
    })))
}

/// Existing scans keep their `qr_code_id`; the printed code simply stops resolving.
#[utoipa::path(
    delete,
    path = "/api/v1/qr-codes/{id}",
    params(("id", Path, description = "QR code ID")),
    responses(
        (status = 200, description = "QR code deleted"),
        (status = 404, description = "QR code not found")
    ),
    security(("bearer_auth" = [])),
    tag = "QR Codes"
)]
pub async fn delete_qr_code(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> actix_web::Result<HttpResponse> {
    auth.require_manager()?;
    let id = path.into_inner();

    let result = sqlx::query("DELETE FROM building_qr_codes WHERE id = ?")
        .bind(id)
        .execute(pool.get_ref())
        .await
        .map_err(ApiError::from)?;

    if result.rows_affected() == 0 {
        return Err(ApiError::not_found("QR code not found").into());
    }

    info!(id, "QR code deleted");
    Ok(HttpResponse::Ok().json(json!({ "message": "QR code deleted" })))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(kind: QrKind, area: Option<&str>) -> CreateQrCode {
        CreateQrCode {
            qr_type: kind,
            customer_name: Some(" Harbour Offices ".to_string()),
            building_name: None,
            area_label: area.map(str::to_string),
            area_category: None,
            qr_image: None,
        }
    }

    #[test]
    fn area_codes_are_classified_on_creation() {
        let payload = build_payload(&request(QrKind::Area, Some("2nd floor kitchen")), "u1".into()).unwrap();
        assert_eq!(payload.category.as_deref(), Some("kitchen"));
        assert_eq!(payload.customer.as_deref(), Some("Harbour Offices"));

        let parsed = qr::parse(&qr::encode(&payload)).unwrap();
        assert_eq!(parsed, payload);
    }

    #[test]
    fn area_codes_need_a_label() {
        assert!(matches!(
            build_payload(&request(QrKind::Area, Some("  ")), "u2".into()),
            Err(ApiError::BadRequest(_))
        ));
        let clock = build_payload(&request(QrKind::ClockIn, None), "u3".into()).unwrap();
        assert_eq!(clock.category, None);
    }
}
