use chrono::{Duration, NaiveDateTime};
use serde::Serialize;
use sqlx::MySqlPool;
use utoipa::ToSchema;

use crate::config::Config;
use crate::db::is_unique_violation;
use crate::error::{ApiError, ApiResult};
use crate::model::attendance::{AttendanceRecord, ClockAction, check_transition, toggle_action};
use crate::model::cleaner::Cleaner;
use crate::model::cleaner_log::LogAction;
use crate::model::live_tracking::TrackingEvent;
use crate::service::activity::{self, Activity};
use crate::service::qr_lookup::ResolvedScan;
use crate::service::{geo, now};
use crate::utils::name_match::{self, IdentityHint, Match};
use crate::utils::roster_cache;

const ATTENDANCE_COLUMNS: &str = r#"
    id, cleaner_id, cleaner_name, cleaner_mobile, clock_in, clock_out,
    clock_in_qr_id, clock_out_qr_id, customer_name, site_area,
    latitude, longitude, location_label
"#;

/// Rows written without a cleaner id are only searched this far back.
const LEGACY_LOOKBACK_HOURS: i64 = 24;

/// Where and how a clock event happened.
#[derive(Debug, Clone, Default)]
pub struct ClockContext {
    pub qr_code_id: Option<u64>,
    pub customer_name: Option<String>,
    pub site_area: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub location_label: Option<String>,
}

impl ClockContext {
    pub fn from_scan(scan: &ResolvedScan, latitude: Option<f64>, longitude: Option<f64>) -> Self {
        Self {
            qr_code_id: scan.qr_code_id,
            customer_name: scan.payload.customer.clone(),
            site_area: scan
                .payload
                .area
                .clone()
                .or_else(|| scan.payload.building.clone()),
            latitude,
            longitude,
            location_label: None,
        }
    }

    /// Falls back to an IP lookup when the device sent no coordinates.
    pub async fn locate(&mut self, config: &Config, client_ip: Option<&str>) {
        if self.latitude.is_some() && self.longitude.is_some() {
            return;
        }
        if let Some(ip) = client_ip {
            self.location_label = geo::lookup(config, ip).await;
        }
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ClockResult {
    #[schema(example = "clock_in")]
    pub action: String,
    pub attendance_id: u64,
    #[schema(value_type = String, format = "date-time")]
    pub clock_in: NaiveDateTime,
    #[schema(value_type = Option<String>, format = "date-time")]
    pub clock_out: Option<NaiveDateTime>,
    pub duration_minutes: Option<i64>,
}

pub async fn load_cleaner(pool: &MySqlPool, cleaner_id: u64) -> ApiResult<Cleaner> {
    let cleaner = sqlx::query_as::<_, Cleaner>(
        r#"
        SELECT id, name, mobile, status, customer_name, created_at
        FROM cleaners
        WHERE id = ?
        "#,
    )
    .bind(cleaner_id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| ApiError::not_found("Cleaner not found"))?;

    if !cleaner.is_active() {
        return Err(ApiError::forbidden(format!(
            "Cleaner account is {}",
            cleaner.status
        )));
    }

    Ok(cleaner)
}

pub async fn open_shift(pool: &MySqlPool, cleaner: &Cleaner) -> ApiResult<Option<AttendanceRecord>> {
    let by_id = sqlx::query_as::<_, AttendanceRecord>(&format!(
        r#"
        SELECT {ATTENDANCE_COLUMNS}
        FROM time_attendance
        WHERE cleaner_id = ? AND clock_out IS NULL
        ORDER BY clock_in DESC
        LIMIT 1
        "#
    ))
    .bind(cleaner.id)
    .fetch_optional(pool)
    .await?;

    if by_id.is_some() {
        return Ok(by_id);
    }

    // Older clients wrote rows keyed only by name/mobile.
    let legacy = sqlx::query_as::<_, AttendanceRecord>(&format!(
        r#"
        SELECT {ATTENDANCE_COLUMNS}
        FROM time_attendance
        WHERE cleaner_id IS NULL AND clock_out IS NULL AND clock_in >= ?
        ORDER BY clock_in DESC
        "#
    ))
    .bind(now() - Duration::hours(LEGACY_LOOKBACK_HOURS))
    .fetch_all(pool)
    .await?;

    if legacy.is_empty() {
        return Ok(None);
    }

    let roster = roster_cache::roster(pool).await;
    Ok(legacy.into_iter().find(|row| {
        let hint = IdentityHint {
            cleaner_id: None,
            name: Some(row.cleaner_name.as_str()),
            mobile: row.cleaner_mobile.as_deref(),
        };
        name_match::resolve(&hint, &roster).is_some_and(|m| m.cleaner_id == cleaner.id)
    }))
}

pub async fn clock_in(
    pool: &MySqlPool,
    cleaner: &Cleaner,
    ctx: &ClockContext,
) -> ApiResult<ClockResult> {
    let open = open_shift(pool, cleaner).await?;
    start_shift(pool, cleaner, ctx, open).await
}

pub async fn clock_out(
    pool: &MySqlPool,
    cleaner: &Cleaner,
    ctx: &ClockContext,
) -> ApiResult<ClockResult> {
    let open = open_shift(pool, cleaner).await?;
    end_shift(pool, cleaner, ctx, open).await
}

/// Entrance codes: whichever of clock-in/clock-out makes sense right now.
pub async fn toggle(
    pool: &MySqlPool,
    cleaner: &Cleaner,
    ctx: &ClockContext,
) -> ApiResult<ClockResult> {
    let open = open_shift(pool, cleaner).await?;
    match toggle_action(open.as_ref()) {
        ClockAction::In => start_shift(pool, cleaner, ctx, open).await,
        ClockAction::Out => end_shift(pool, cleaner, ctx, open).await,
    }
}

async fn start_shift(
    pool: &MySqlPool,
    cleaner: &Cleaner,
    ctx: &ClockContext,
    open: Option<AttendanceRecord>,
) -> ApiResult<ClockResult> {
    check_transition(open.as_ref(), ClockAction::In)
        .map_err(|e| ApiError::conflict(e.to_string()))?;

    let at = now();
    let customer = ctx
        .customer_name
        .clone()
        .or_else(|| cleaner.customer_name.clone());

    let result = sqlx::query(
        r#"
        INSERT INTO time_attendance
        (cleaner_id, cleaner_name, cleaner_mobile, clock_in, clock_in_qr_id,
         customer_name, site_area, latitude, longitude, location_label)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(cleaner.id)
    .bind(&cleaner.name)
    .bind(&cleaner.mobile)
    .bind(at)
    .bind(ctx.qr_code_id)
    .bind(&customer)
    .bind(&ctx.site_area)
    .bind(ctx.latitude)
    .bind(ctx.longitude)
    .bind(&ctx.location_label)
    .execute(pool)
    .await
    .map_err(clock_in_error)?;

    tracing::info!(cleaner_id = cleaner.id, attendance_id = result.last_insert_id(), "Clocked in");

    let mut event = Activity::new(cleaner.id, &cleaner.name, LogAction::ClockIn)
        .tracked(TrackingEvent::ClockIn);
    event.qr_code_id = ctx.qr_code_id;
    event.area_label = ctx.site_area.as_deref();
    event.customer_name = customer.as_deref();
    event.notes = ctx.location_label.as_deref();
    activity::record(pool, &event).await;

    Ok(ClockResult {
        action: "clock_in".to_string(),
        attendance_id: result.last_insert_id(),
        clock_in: at,
        clock_out: None,
        duration_minutes: None,
    })
}

/// A concurrent clock-in that lost the race trips the one-open-shift key.
fn clock_in_error(err: sqlx::Error) -> ApiError {
    if is_unique_violation(&err) {
        ApiError::conflict("Already clocked in, clock out first")
    } else {
        ApiError::from(err)
    }
}

async fn end_shift(
    pool: &MySqlPool,
    cleaner: &Cleaner,
    ctx: &ClockContext,
    open: Option<AttendanceRecord>,
) -> ApiResult<ClockResult> {
    check_transition(open.as_ref(), ClockAction::Out)
        .map_err(|e| ApiError::bad_request(e.to_string()))?;
    let Some(shift) = open else {
        return Err(ApiError::bad_request("No open shift found, clock in first"));
    };

    let at = now();

    // Legacy rows get their cleaner id filled in while we are here.
    let result = sqlx::query(
        r#"
        UPDATE time_attendance
        SET clock_out = ?, clock_out_qr_id = ?, cleaner_id = COALESCE(cleaner_id, ?)
        WHERE id = ? AND clock_out IS NULL
        "#,
    )
    .bind(at)
    .bind(ctx.qr_code_id)
    .bind(cleaner.id)
    .bind(shift.id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(ApiError::conflict("Shift was already closed"));
    }

    tracing::info!(cleaner_id = cleaner.id, attendance_id = shift.id, "Clocked out");

    let mut event = Activity::new(cleaner.id, &cleaner.name, LogAction::ClockOut)
        .tracked(TrackingEvent::ClockOut);
    event.qr_code_id = ctx.qr_code_id;
    event.area_label = ctx.site_area.as_deref().or(shift.site_area.as_deref());
    event.customer_name = shift.customer_name.as_deref();
    activity::record(pool, &event).await;

    let closed = AttendanceRecord {
        clock_out: Some(at),
        ..shift
    };

    Ok(ClockResult {
        action: "clock_out".to_string(),
        attendance_id: closed.id,
        clock_in: closed.clock_in,
        clock_out: closed.clock_out,
        duration_minutes: Some(closed.duration_minutes(at)),
    })
}

pub async fn shifts_between(
    pool: &MySqlPool,
    from: NaiveDateTime,
    to: NaiveDateTime,
    customer: Option<&str>,
) -> ApiResult<Vec<AttendanceRecord>> {
    let mut sql = format!(
        r#"
        SELECT {ATTENDANCE_COLUMNS}
        FROM time_attendance
        WHERE clock_in >= ? AND clock_in < ?
        "#
    );
    if customer.is_some() {
        sql.push_str(" AND customer_name = ?");
    }
    sql.push_str(" ORDER BY clock_in DESC");

    let mut query = sqlx::query_as::<_, AttendanceRecord>(&sql).bind(from).bind(to);
    if let Some(customer) = customer {
        query = query.bind(customer);
    }

    Ok(query.fetch_all(pool).await?)
}

/// A report row: the shift plus the roster cleaner it was attributed to.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ShiftReportRow {
    #[serde(flatten)]
    pub shift: AttendanceRecord,
    pub attributed_cleaner_id: Option<u64>,
    pub match_kind: Option<name_match::MatchKind>,
    pub duration_minutes: i64,
    pub stale: bool,
}

/// Attributes every shift to a roster cleaner, including legacy rows that
/// only carry a name or a mobile.
pub fn attribute_shifts(
    shifts: Vec<AttendanceRecord>,
    roster: &[name_match::CleanerIdentity],
    at: NaiveDateTime,
    stale_after_hours: i64,
) -> Vec<ShiftReportRow> {
    shifts
        .into_iter()
        .map(|shift| {
            let hint = IdentityHint {
                cleaner_id: shift.cleaner_id,
                name: Some(shift.cleaner_name.as_str()),
                mobile: shift.cleaner_mobile.as_deref(),
            };
            let matched: Option<Match> = name_match::resolve(&hint, roster);

            ShiftReportRow {
                attributed_cleaner_id: matched.as_ref().map(|m| m.cleaner_id).or(shift.cleaner_id),
                match_kind: matched.map(|m| m.kind),
                duration_minutes: shift.duration_minutes(at),
                stale: shift.is_stale(at, stale_after_hours),
                shift,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::name_match::{CleanerIdentity, MatchKind};
    use chrono::NaiveDate;

    fn at(h: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 3, 2)
            .unwrap()
            .and_hms_opt(h, 0, 0)
            .unwrap()
    }

    fn shift(id: u64, cleaner_id: Option<u64>, name: &str, clock_out: Option<NaiveDateTime>) -> AttendanceRecord {
        AttendanceRecord {
            id,
            cleaner_id,
            cleaner_name: name.to_string(),
            cleaner_mobile: None,
            clock_in: at(6),
            clock_out,
            clock_in_qr_id: None,
            clock_out_qr_id: None,
            customer_name: None,
            site_area: None,
            latitude: None,
            longitude: None,
            location_label: None,
        }
    }

    #[test]
    fn legacy_rows_are_attributed_by_name() {
        let roster = vec![
            CleanerIdentity {
                id: 7,
                name: "Maria Silva".to_string(),
                mobile: None,
            },
            CleanerIdentity {
                id: 8,
                name: "Ade Okafor".to_string(),
                mobile: None,
            },
        ];

        let rows = attribute_shifts(
            vec![
                shift(1, Some(8), "Ade Okafor", Some(at(9))),
                shift(2, None, "maria  silva", None),
                shift(3, None, "Somebody Else", None),
            ],
            &roster,
            at(22),
            14,
        );

        assert_eq!(rows[0].attributed_cleaner_id, Some(8));
        assert_eq!(rows[0].match_kind, Some(MatchKind::Id));
        assert_eq!(rows[0].duration_minutes, 180);
        assert!(!rows[0].stale);

        assert_eq!(rows[1].attributed_cleaner_id, Some(7));
        assert_eq!(rows[1].match_kind, Some(MatchKind::ExactName));
        assert!(rows[1].stale);

        assert_eq!(rows[2].attributed_cleaner_id, None);
        assert_eq!(rows[2].match_kind, None);
    }

    #[test]
    fn second_open_shift_is_a_conflict() {
        use crate::db::test_errors::{Kind, db_error};

        assert!(matches!(clock_in_error(db_error(Kind::Unique)), ApiError::Conflict(_)));
        assert!(matches!(clock_in_error(db_error(Kind::ForeignKey)), ApiError::Database(_)));
        assert!(matches!(clock_in_error(sqlx::Error::PoolTimedOut), ApiError::Database(_)));
    }

    #[test]
    fn coordinates_skip_the_ip_lookup() {
        let scan = ResolvedScan {
            payload: crate::qr::QrPayload::new(crate::qr::QrKind::ClockIn),
            qr_code_id: Some(4),
        };
        let ctx = ClockContext::from_scan(&scan, Some(53.8), Some(-1.55));
        assert_eq!(ctx.qr_code_id, Some(4));
        assert_eq!(ctx.latitude, Some(53.8));
    }
}
