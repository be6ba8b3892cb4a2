use crate::{
    auth::auth::AuthUser,
    config::Config,
    error::{ApiError, ApiResult},
    model::{cleaner::Cleaner, cleaner_log::LogAction, live_tracking::TrackingEvent, task::AreaTask},
    qr::{self, QrError, QrKind},
    service::{
        activity::{self, Activity},
        attendance::{self as shifts, ClockContext, ClockResult},
        checklist,
        qr_lookup::{self, ResolvedScan},
    },
    utils::area_classifier::{self, AreaCategory},
};
use actix_web::{HttpRequest, HttpResponse, web};
use serde::{Deserialize, Serialize};
use sqlx::MySqlPool;
use tracing::info;
use utoipa::ToSchema;

#[derive(Debug, Deserialize, ToSchema)]
pub struct ScanRequest {
    /// Whatever the scanner read.
    #[schema(example = r#"{"type":"area","id":"6f1c...","area":"Ground Floor Gents"}"#)]
    pub text: String,
    pub lat: Option<f64>,
    pub lng: Option<f64>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AreaVisit {
    pub qr_code_id: Option<u64>,
    #[schema(example = "Ground Floor Gents")]
    pub area_label: String,
    pub customer_name: Option<String>,
    pub building_name: Option<String>,
    pub area_category: AreaCategory,
    pub tasks: Vec<AreaTask>,
}

/// Exactly one of `attendance` and `area` is set, depending on `kind`.
#[derive(Debug, Serialize, ToSchema)]
pub struct ScanOutcome {
    pub kind: QrKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attendance: Option<ClockResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub area: Option<AreaVisit>,
}

/// What a scanned code of each kind does.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScanRoute {
    ClockIn,
    ClockOut,
    Toggle,
    AreaVisit,
}

impl ScanRoute {
    fn of(kind: QrKind) -> Self {
        match kind {
            QrKind::ClockIn => ScanRoute::ClockIn,
            QrKind::ClockOut => ScanRoute::ClockOut,
            QrKind::Attendance => ScanRoute::Toggle,
            QrKind::Area => ScanRoute::AreaVisit,
        }
    }

    /// Clock-out keeps the location captured at clock-in.
    fn locates(self) -> bool {
        matches!(self, ScanRoute::ClockIn | ScanRoute::Toggle)
    }
}

fn ensure_on_shift(has_open_shift: bool) -> ApiResult<()> {
    if has_open_shift {
        Ok(())
    } else {
        Err(ApiError::conflict("Clock in before scanning an area"))
    }
}

async fn visit_area(
    pool: &MySqlPool,
    cleaner: &Cleaner,
    scan: &ResolvedScan,
) -> ApiResult<AreaVisit> {
    let label = scan
        .payload
        .area
        .as_deref()
        .map(str::trim)
        .filter(|a| !a.is_empty())
        .ok_or(QrError::Unidentified)?;

    ensure_on_shift(shifts::open_shift(pool, cleaner).await?.is_some())?;

    let customer = scan
        .payload
        .customer
        .clone()
        .or_else(|| cleaner.customer_name.clone());
    let category = area_classifier::resolve(
        customer.as_deref(),
        label,
        scan.payload.category.as_deref(),
    );

    let mut event = Activity::new(cleaner.id, &cleaner.name, LogAction::AreaScan)
        .tracked(TrackingEvent::AreaScan);
    event.qr_code_id = scan.qr_code_id;
    event.area_label = Some(label);
    event.area_category = Some(category.as_ref());
    event.customer_name = customer.as_deref();
    activity::record(pool, &event).await;

    let tasks = checklist::load(pool, category, customer.as_deref()).await?;

    info!(cleaner_id = cleaner.id, area = label, %category, "Area scanned");

    Ok(AreaVisit {
        qr_code_id: scan.qr_code_id,
        area_label: label.to_string(),
        customer_name: customer,
        building_name: scan.payload.building.clone(),
        area_category: category,
        tasks,
    })
}

/// Unified scan endpoint: attendance codes clock in/out, area codes record a visit.
#[utoipa::path(
    post,
    path = "/api/v1/scan",
    request_body = ScanRequest,
    responses(
        (status = 200, description = "Scan handled", body = ScanOutcome),
        (status = 400, description = "Unreadable code or no open shift to close"),
        (status = 403, description = "No cleaner profile or cleaner inactive"),
        (status = 409, description = "Already clocked in, or area scanned while off shift")
    ),
    security(("bearer_auth" = [])),
    tag = "Scan"
)]
pub async fn scan(
    req: HttpRequest,
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
    body: web::Json<ScanRequest>,
) -> actix_web::Result<HttpResponse> {
    let cleaner_id = auth.require_cleaner()?;
    let payload = qr::parse(&body.text).map_err(ApiError::from)?;
    let cleaner = shifts::load_cleaner(pool.get_ref(), cleaner_id).await?;
    let scan = qr_lookup::resolve(pool.get_ref(), payload).await?;
    let kind = scan.payload.kind;

    tracing::debug!(cleaner_id, ?kind, qr_code_id = ?scan.qr_code_id, "Scan received");

    let route = ScanRoute::of(kind);
    let outcome = if route == ScanRoute::AreaVisit {
        ScanOutcome {
            kind,
            attendance: None,
            area: Some(visit_area(pool.get_ref(), &cleaner, &scan).await?),
        }
    } else {
        let mut ctx = ClockContext::from_scan(&scan, body.lat, body.lng);
        if route.locates() {
            let client_ip = req.connection_info().realip_remote_addr().map(str::to_string);
            ctx.locate(config.get_ref(), client_ip.as_deref()).await;
        }

        let result = match route {
            ScanRoute::ClockIn => shifts::clock_in(pool.get_ref(), &cleaner, &ctx).await?,
            ScanRoute::ClockOut => shifts::clock_out(pool.get_ref(), &cleaner, &ctx).await?,
            _ => shifts::toggle(pool.get_ref(), &cleaner, &ctx).await?,
        };

        ScanOutcome {
            kind,
            attendance: Some(result),
            area: None,
        }
    };

    Ok(HttpResponse::Ok().json(outcome))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn each_code_kind_has_one_route() {
        assert_eq!(ScanRoute::of(QrKind::ClockIn), ScanRoute::ClockIn);
        assert_eq!(ScanRoute::of(QrKind::ClockOut), ScanRoute::ClockOut);
        assert_eq!(ScanRoute::of(QrKind::Attendance), ScanRoute::Toggle);
        assert_eq!(ScanRoute::of(QrKind::Area), ScanRoute::AreaVisit);

        for kind in [QrKind::ClockIn, QrKind::ClockOut, QrKind::Attendance, QrKind::Area] {
            assert_eq!(kind.is_attendance(), ScanRoute::of(kind) != ScanRoute::AreaVisit);
        }
    }

    #[test]
    fn only_opening_scans_look_up_location() {
        assert!(ScanRoute::ClockIn.locates());
        assert!(ScanRoute::Toggle.locates());
        assert!(!ScanRoute::ClockOut.locates());
        assert!(!ScanRoute::AreaVisit.locates());
    }

    #[test]
    fn area_scans_need_an_open_shift() {
        assert!(ensure_on_shift(true).is_ok());
        assert!(matches!(ensure_on_shift(false), Err(ApiError::Conflict(_))));
    }

    #[test]
    fn attendance_code_parses_to_a_toggle() {
        let payload = qr::parse(r#"{"type":"attendance","id":"site-1"}"#).unwrap();
        assert_eq!(ScanRoute::of(payload.kind), ScanRoute::Toggle);

        let payload = qr::parse(r#"{"type":"area","id":"a-9","area":"Ground Floor Gents"}"#).unwrap();
        assert_eq!(ScanRoute::of(payload.kind), ScanRoute::AreaVisit);
    }
}
