use crate::{
    auth::auth::AuthUser,
    config::Config,
    error::{ApiError, ApiResult},
    model::attendance::AttendanceRecord,
    qr::{self, QrKind},
    service::{
        attendance::{self as shifts, ClockContext, ClockResult, ShiftReportRow},
        now, qr_lookup,
    },
    utils::roster_cache,
};
use actix_web::{HttpRequest, HttpResponse, web};
use chrono::{Duration, NaiveDate, NaiveDateTime};
use serde::Deserialize;
use serde_json::json;
use sqlx::MySqlPool;
use utoipa::{IntoParams, ToSchema};

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct ClockRequest {
    /// Raw text of the entrance QR code, if one was scanned.
    #[schema(example = r#"{"type":"clock_in","id":"6f1c..."}"#)]
    pub qr_text: Option<String>,
    pub lat: Option<f64>,
    pub lng: Option<f64>,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct ReportQuery {
    /// First day, inclusive (YYYY-MM-DD). Defaults to today.
    pub from: Option<NaiveDate>,
    /// Last day, inclusive. Defaults to `from`.
    pub to: Option<NaiveDate>,
    pub customer: Option<String>,
}

/// Builds the clock context from an optional scanned code plus device position.
async fn clock_context(
    req: &HttpRequest,
    pool: &MySqlPool,
    config: &Config,
    body: &ClockRequest,
    expected: QrKind,
) -> ApiResult<ClockContext> {
    let mut ctx = match body.qr_text.as_deref().filter(|t| !t.trim().is_empty()) {
        Some(text) => {
            let scan = qr_lookup::resolve(pool, qr::parse(text)?).await?;
            if scan.payload.kind != expected && scan.payload.kind != QrKind::Attendance {
                return Err(ApiError::bad_request(format!(
                    "This is a {} code, not a {} code",
                    scan.payload.kind, expected
                )));
            }
            ClockContext::from_scan(&scan, body.lat, body.lng)
        }
        None => ClockContext {
            latitude: body.lat,
            longitude: body.lng,
            ..Default::default()
        },
    };

    if expected == QrKind::ClockIn {
        let client_ip = req.connection_info().realip_remote_addr().map(str::to_string);
        ctx.locate(config, client_ip.as_deref()).await;
    }

    Ok(ctx)
}

/// Clock-in endpoint
#[utoipa::path(
    post,
    path = "/api/v1/attendance/clock-in",
    request_body = ClockRequest,
    responses(
        (status = 200, description = "Clocked in", body = ClockResult),
        (status = 400, description = "Unreadable or wrong QR code"),
        (status = 403, description = "No cleaner profile or cleaner inactive"),
        (status = 409, description = "Already clocked in", body = Object, example = json!({
            "message": "Already clocked in since 2026-03-02 06:01, clock out first"
        }))
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn clock_in(
    req: HttpRequest,
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
    body: Option<web::Json<ClockRequest>>,
) -> actix_web::Result<HttpResponse> {
    let cleaner_id = auth.require_cleaner()?;
    let body = body.map(web::Json::into_inner).unwrap_or_default();

    let cleaner = shifts::load_cleaner(pool.get_ref(), cleaner_id).await?;
    let ctx = clock_context(&req, pool.get_ref(), config.get_ref(), &body, QrKind::ClockIn).await?;
    let result = shifts::clock_in(pool.get_ref(), &cleaner, &ctx).await?;

    Ok(HttpResponse::Ok().json(result))
}

/// Clock-out endpoint
#[utoipa::path(
    post,
    path = "/api/v1/attendance/clock-out",
    request_body = ClockRequest,
    responses(
        (status = 200, description = "Clocked out", body = ClockResult),
        (status = 400, description = "No open shift", body = Object, example = json!({
            "message": "No open shift found, clock in first"
        })),
        (status = 403, description = "No cleaner profile or cleaner inactive")
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn clock_out(
    req: HttpRequest,
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
    body: Option<web::Json<ClockRequest>>,
) -> actix_web::Result<HttpResponse> {
    let cleaner_id = auth.require_cleaner()?;
    let body = body.map(web::Json::into_inner).unwrap_or_default();

    let cleaner = shifts::load_cleaner(pool.get_ref(), cleaner_id).await?;
    let ctx = clock_context(&req, pool.get_ref(), config.get_ref(), &body, QrKind::ClockOut).await?;
    let result = shifts::clock_out(pool.get_ref(), &cleaner, &ctx).await?;

    Ok(HttpResponse::Ok().json(result))
}

/// The caller's open shift, if any, and their last shifts.
#[utoipa::path(
    get,
    path = "/api/v1/attendance/me",
    responses(
        (status = 200, description = "Open shift and recent history", body = Object, example = json!({
            "open_shift": null,
            "recent": []
        }))
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn my_shift(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
) -> actix_web::Result<HttpResponse> {
    let cleaner_id = auth.require_cleaner()?;
    let cleaner = shifts::load_cleaner(pool.get_ref(), cleaner_id).await?;
    let open = shifts::open_shift(pool.get_ref(), &cleaner).await?;

    let recent = sqlx::query_as::<_, AttendanceRecord>(
        r#"
        SELECT id, cleaner_id, cleaner_name, cleaner_mobile, clock_in, clock_out,
               clock_in_qr_id, clock_out_qr_id, customer_name, site_area,
               latitude, longitude, location_label
        FROM time_attendance
        WHERE cleaner_id = ?
        ORDER BY clock_in DESC
        LIMIT 10
        "#,
    )
    .bind(cleaner_id)
    .fetch_all(pool.get_ref())
    .await
    .map_err(ApiError::from)?;

    let at = now();
    let open_json = open.map(|shift| {
        json!({
            "duration_minutes": shift.duration_minutes(at),
            "stale": shift.is_stale(at, config.stale_shift_hours),
            "shift": shift,
        })
    });

    Ok(HttpResponse::Ok().json(json!({
        "open_shift": open_json,
        "recent": recent,
    })))
}

const MAX_REPORT_DAYS: i64 = 92;

fn report_window(query: &ReportQuery, today: NaiveDate) -> ApiResult<(NaiveDateTime, NaiveDateTime)> {
    let from = query.from.unwrap_or(today);
    let to = query.to.unwrap_or(from);
    if to < from {
        return Err(ApiError::bad_request("'to' must not be before 'from'"));
    }
    if to.signed_duration_since(from) > Duration::days(MAX_REPORT_DAYS) {
        return Err(ApiError::bad_request("Report range is limited to 92 days"));
    }

    let start = from.and_hms_opt(0, 0, 0).unwrap_or_default();
    let end = to
        .succ_opt()
        .and_then(|next| next.and_hms_opt(0, 0, 0))
        .ok_or_else(|| ApiError::bad_request("Report dates are out of range"))?;
    Ok((start, end))
}

/// Manager attendance report
#[utoipa::path(
    get,
    path = "/api/v1/attendance/report",
    params(ReportQuery),
    responses(
        (status = 200, description = "Shifts attributed to roster cleaners", body = [ShiftReportRow]),
        (status = 400, description = "Invalid date range"),
        (status = 403, description = "Manager/Admin only")
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn report(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
    query: web::Query<ReportQuery>,
) -> actix_web::Result<HttpResponse> {
    auth.require_manager()?;

    let at = now();
    let (from, to) = report_window(&query, at.date())?;

    let rows = shifts::shifts_between(pool.get_ref(), from, to, query.customer.as_deref()).await?;
    let roster = roster_cache::roster(pool.get_ref()).await;
    let report = shifts::attribute_shifts(rows, &roster, at, config.stale_shift_hours);

    tracing::debug!(%from, %to, rows = report.len(), "Attendance report built");

    Ok(HttpResponse::Ok().json(report))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, d).unwrap()
    }

    #[test]
    fn report_window_defaults_to_a_single_day() {
        let query = ReportQuery {
            from: None,
            to: None,
            customer: None,
        };
        let (start, end) = report_window(&query, day(2)).unwrap();
        assert_eq!(start, day(2).and_hms_opt(0, 0, 0).unwrap());
        assert_eq!(end, day(3).and_hms_opt(0, 0, 0).unwrap());
    }

    #[test]
    fn report_window_rejects_backwards_ranges() {
        let query = ReportQuery {
            from: Some(day(5)),
            to: Some(day(2)),
            customer: None,
        };
        assert!(matches!(
            report_window(&query, day(9)),
            Err(ApiError::BadRequest(_))
        ));
    }

    #[test]
    fn report_window_is_capped_at_ninety_two_days() {
        let from = day(1);
        let query = |to: NaiveDate| ReportQuery {
            from: Some(from),
            to: Some(to),
            customer: None,
        };
        let last_allowed = from + Duration::days(92);
        let (_, end) = report_window(&query(last_allowed), from).unwrap();
        assert_eq!(end, (last_allowed + Duration::days(1)).and_hms_opt(0, 0, 0).unwrap());
        assert!(matches!(
            report_window(&query(last_allowed + Duration::days(1)), from),
            Err(ApiError::BadRequest(_))
        ));
    }

    #[test]
    fn report_window_at_the_last_date_is_rejected() {
        let query = ReportQuery {
            from: Some(NaiveDate::MAX),
            to: None,
            customer: None,
        };
        assert!(matches!(
            report_window(&query, day(1)),
            Err(ApiError::BadRequest(_))
        ));
    }
}
