use chrono::{Duration, NaiveDateTime};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct AttendanceRecord {
    pub id: u64,
    #[schema(nullable = true)]
    pub cleaner_id: Option<u64>,
    pub cleaner_name: String,
    #[schema(nullable = true)]
    pub cleaner_mobile: Option<String>,
    #[schema(value_type = String, format = "date-time")]
    pub clock_in: NaiveDateTime,
    #[schema(value_type = Option<String>, format = "date-time", nullable = true)]
    pub clock_out: Option<NaiveDateTime>,
    pub clock_in_qr_id: Option<u64>,
    pub clock_out_qr_id: Option<u64>,
    pub customer_name: Option<String>,
    pub site_area: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub location_label: Option<String>,
}

impl AttendanceRecord {
    pub fn is_open(&self) -> bool {
        self.clock_out.is_none()
    }

    /// Worked minutes; an open shift is measured up to `now`.
    pub fn duration_minutes(&self, now: NaiveDateTime) -> i64 {
        let end = self.clock_out.unwrap_or(now);
        (end - self.clock_in).num_minutes().max(0)
    }

    /// Open for longer than anyone works a shift; usually a forgotten clock-out.
    pub fn is_stale(&self, now: NaiveDateTime, stale_after_hours: i64) -> bool {
        self.is_open() && now - self.clock_in > Duration::hours(stale_after_hours)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClockAction {
    In,
    Out,
}

#[derive(Debug, PartialEq, Eq, Error)]
pub enum ShiftRuleError {
    #[error("Already clocked in since {}, clock out first", .since.format("%Y-%m-%d %H:%M"))]
    AlreadyClockedIn { since: NaiveDateTime },
    #[error("No open shift found, clock in first")]
    NotClockedIn,
}

/// A worker cannot clock in twice without clocking out, nor clock out without an open shift.
pub fn check_transition(
    open_shift: Option<&AttendanceRecord>,
    action: ClockAction,
) -> Result<(), ShiftRuleError> {
    match (action, open_shift) {
        (ClockAction::In, Some(shift)) => Err(ShiftRuleError::AlreadyClockedIn {
            since: shift.clock_in,
        }),
        (ClockAction::Out, None) => Err(ShiftRuleError::NotClockedIn),
        _ => Ok(()),
    }
}

/// Entrance codes toggle: clock out if a shift is open, otherwise clock in.
pub fn toggle_action(open_shift: Option<&AttendanceRecord>) -> ClockAction {
    if open_shift.is_some() {
        ClockAction::Out
    } else {
        ClockAction::In
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 3, 2)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    fn shift(clock_in: NaiveDateTime, clock_out: Option<NaiveDateTime>) -> AttendanceRecord {
        AttendanceRecord {
            id: 1,
            cleaner_id: Some(7),
            cleaner_name: "Maria Silva".to_string(),
            cleaner_mobile: None,
            clock_in,
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
    fn cannot_clock_in_twice_without_clocking_out() {
        let open = shift(at(6, 0), None);
        assert_eq!(
            check_transition(Some(&open), ClockAction::In),
            Err(ShiftRuleError::AlreadyClockedIn { since: at(6, 0) })
        );
        assert_eq!(check_transition(None, ClockAction::In), Ok(()));
    }

    #[test]
    fn cannot_clock_out_without_a_shift() {
        assert_eq!(
            check_transition(None, ClockAction::Out),
            Err(ShiftRuleError::NotClockedIn)
        );
        let open = shift(at(6, 0), None);
        assert_eq!(check_transition(Some(&open), ClockAction::Out), Ok(()));
    }

    #[test]
    fn rule_errors_read_as_client_messages() {
        let err = ShiftRuleError::AlreadyClockedIn { since: at(6, 5) };
        assert!(err.to_string().starts_with("Already clocked in since "));
        assert!(err.to_string().ends_with("06:05, clock out first"));
        assert_eq!(
            ShiftRuleError::NotClockedIn.to_string(),
            "No open shift found, clock in first"
        );
    }

    #[test]
    fn toggle_follows_the_open_shift() {
        let open = shift(at(6, 0), None);
        assert_eq!(toggle_action(Some(&open)), ClockAction::Out);
        assert_eq!(toggle_action(None), ClockAction::In);
    }

    #[test]
    fn durations_and_staleness() {
        let closed = shift(at(6, 0), Some(at(9, 30)));
        assert_eq!(closed.duration_minutes(at(23, 0)), 210);
        assert!(!closed.is_stale(at(23, 0), 14));

        let open = shift(at(6, 0), None);
        assert_eq!(open.duration_minutes(at(7, 15)), 75);
        assert!(open.is_stale(at(21, 0), 14));
        assert!(!open.is_stale(at(19, 0), 14));
    }
}
