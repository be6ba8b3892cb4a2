//! QR payload codec.
//!
//! Printed codes carry a small JSON object with a `type` tag. Older stickers
//! and hand-typed codes are plain text or a link, so parsing falls back to a
//! URL form, then keyword sniffing, then treats the text as an area label.

use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};
use thiserror::Error;
use url::Url;
use utoipa::ToSchema;

/// Longest text accepted from a scanner.
const MAX_SCAN_LEN: usize = 2048;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema, AsRefStr, Display, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum QrKind {
    ClockIn,
    ClockOut,
    /// Single code at the entrance, toggles between clock-in and clock-out.
    Attendance,
    Area,
}

impl QrKind {
    /// Lenient tag matching: `clock-in`, `Clock In` and `clockin` are the same thing.
    fn from_tag(tag: &str) -> Option<Self> {
        let squashed: String = tag
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect::<String>()
            .to_ascii_lowercase();

        match squashed.as_str() {
            "clockin" | "checkin" => Some(QrKind::ClockIn),
            "clockout" | "checkout" => Some(QrKind::ClockOut),
            "attendance" | "clock" => Some(QrKind::Attendance),
            "area" | "location" | "task" | "room" => Some(QrKind::Area),
            _ => None,
        }
    }

    pub fn is_attendance(&self) -> bool {
        matches!(self, QrKind::ClockIn | QrKind::ClockOut | QrKind::Attendance)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct QrPayload {
    #[serde(rename = "type")]
    pub kind: QrKind,
    #[serde(rename = "id", skip_serializing_if = "Option::is_none", default)]
    pub code_uid: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub customer: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub building: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub area: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub category: Option<String>,
}

impl QrPayload {
    pub fn new(kind: QrKind) -> Self {
        Self {
            kind,
            code_uid: None,
            customer: None,
            building: None,
            area: None,
            category: None,
        }
    }
}

/// JSON shape seen in the wild; every field is optional and several spellings exist.
#[derive(Deserialize)]
struct LoosePayload {
    #[serde(rename = "type", alias = "qr_type", alias = "kind", default)]
    kind: Option<String>,
    #[serde(alias = "code", alias = "code_uid", alias = "qr_id", default)]
    id: Option<serde_json::Value>,
    #[serde(alias = "customer_name", alias = "client", default)]
    customer: Option<String>,
    #[serde(alias = "building_name", alias = "site", default)]
    building: Option<String>,
    #[serde(alias = "area_name", alias = "area_label", alias = "location", default)]
    area: Option<String>,
    #[serde(alias = "area_type", alias = "area_category", default)]
    category: Option<String>,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum QrError {
    #[error("QR code is empty")]
    Empty,
    #[error("QR code is too long ({0} characters)")]
    TooLong(usize),
    #[error("QR code does not identify an area or attendance point")]
    Unidentified,
}

pub fn encode(payload: &QrPayload) -> String {
    // A struct of strings and a unit enum cannot fail to serialize.
    serde_json::to_string(payload).unwrap_or_default()
}

pub fn parse(text: &str) -> Result<QrPayload, QrError> {
    let text = text.trim();
    if text.is_empty() {
        return Err(QrError::Empty);
    }
    if text.len() > MAX_SCAN_LEN {
        return Err(QrError::TooLong(text.len()));
    }

    if text.starts_with('{') {
        if let Some(payload) = parse_json(text) {
            return Ok(payload);
        }
    }

    if let Some(code_uid) = parse_link(text) {
        let mut payload = QrPayload::new(QrKind::Area);
        payload.code_uid = Some(code_uid);
        return Ok(payload);
    }

    if let Some(kind) = sniff_keywords(text) {
        return Ok(QrPayload::new(kind));
    }

    let mut payload = QrPayload::new(QrKind::Area);
    payload.area = Some(text.to_string());
    Ok(payload)
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_json(text: &str) -> Option<QrPayload> {
    let loose: LoosePayload = serde_json::from_str(text).ok()?;

    let code_uid = match loose.id {
        Some(serde_json::Value::String(s)) => non_blank(Some(s)),
        Some(serde_json::Value::Number(n)) => Some(n.to_string()),
        _ => None,
    };
    let area = non_blank(loose.area);

    let kind = match loose.kind.as_deref().and_then(QrKind::from_tag) {
        Some(kind) => kind,
        // Untagged objects are only useful if they point at something.
        None if area.is_some() || code_uid.is_some() => QrKind::Area,
        None => return None,
    };

    Some(QrPayload {
        kind,
        code_uid,
        customer: non_blank(loose.customer),
        building: non_blank(loose.building),
        area,
        category: non_blank(loose.category),
    })
}

/// `https://host/scan?code=<uid>` or `?qr=<uid>`, percent-decoded.
fn parse_link(text: &str) -> Option<String> {
    let link = Url::parse(text).ok()?;
    if !matches!(link.scheme(), "http" | "https") {
        return None;
    }

    link.query_pairs().find_map(|(key, value)| {
        match key.to_ascii_lowercase().as_str() {
            "code" | "qr" => non_blank(Some(value.into_owned())),
            _ => None,
        }
    })
}

fn sniff_keywords(text: &str) -> Option<QrKind> {
    let lower = text.to_lowercase();

    if lower.contains("clock") {
        // "clocking out" contains "in", so "out" has to win.
        if lower.contains("out") {
            return Some(QrKind::ClockOut);
        }
        if lower.contains("in") {
            return Some(QrKind::ClockIn);
        }
    }

    if lower.contains("attendance") {
        return Some(QrKind::Attendance);
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_omits_missing_fields() {
        let mut payload = QrPayload::new(QrKind::ClockIn);
        payload.code_uid = Some("abc".to_string());

        assert_eq!(encode(&payload), r#"{"type":"clock_in","id":"abc"}"#);
    }

    #[test]
    fn encoded_area_code_parses_back() {
        let payload = QrPayload {
            kind: QrKind::Area,
            code_uid: Some("7f1c".to_string()),
            customer: Some("Harbour Offices".to_string()),
            building: Some("Block B".to_string()),
            area: Some("Ground Floor Gents".to_string()),
            category: Some("toilet".to_string()),
        };

        assert_eq!(parse(&encode(&payload)).unwrap(), payload);
    }

    #[test]
    fn json_accepts_legacy_spellings() {
        let parsed = parse(
            r#"{"type":"Clock-In","code":42,"customer_name":"Acme","area_name":"Reception"}"#,
        )
        .unwrap();

        assert_eq!(parsed.kind, QrKind::ClockIn);
        assert_eq!(parsed.code_uid.as_deref(), Some("42"));
        assert_eq!(parsed.customer.as_deref(), Some("Acme"));
        assert_eq!(parsed.area.as_deref(), Some("Reception"));
    }

    #[test]
    fn untagged_json_with_area_is_an_area_scan() {
        let parsed = parse(r#"{"area":"Kitchen 2"}"#).unwrap();
        assert_eq!(parsed.kind, QrKind::Area);
        assert_eq!(parsed.area.as_deref(), Some("Kitchen 2"));
    }

    #[test]
    fn broken_json_falls_back_to_text() {
        let parsed = parse(r#"{"type": "clock_out""#).unwrap();
        assert_eq!(parsed.kind, QrKind::ClockOut);
    }

    #[test]
    fn link_carries_the_code() {
        let parsed = parse("https://ops.example.com/scan?site=1&code=abc-123#top").unwrap();
        assert_eq!(parsed.kind, QrKind::Area);
        assert_eq!(parsed.code_uid.as_deref(), Some("abc-123"));
    }

    #[test]
    fn link_code_is_percent_decoded() {
        let parsed = parse("https://ops.example.com/scan?code=ABC%2D1").unwrap();
        assert_eq!(parsed.code_uid.as_deref(), Some("ABC-1"));

        let parsed = parse("HTTPS://ops.example.com/scan?QR=site%20one").unwrap();
        assert_eq!(parsed.code_uid.as_deref(), Some("site one"));
    }

    #[test]
    fn link_id_param_is_not_a_code() {
        let parsed = parse("https://ops.example.com/scan?id=abc-123").unwrap();
        assert_eq!(parsed.code_uid, None);
    }

    #[test]
    fn keyword_sniffing_prefers_out() {
        assert_eq!(parse("CLOCK IN - Main gate").unwrap().kind, QrKind::ClockIn);
        assert_eq!(parse("clocking out").unwrap().kind, QrKind::ClockOut);
        assert_eq!(parse("Staff attendance point").unwrap().kind, QrKind::Attendance);
    }

    #[test]
    fn plain_text_is_an_area_label() {
        let parsed = parse("  Level 3 Ladies Toilet ").unwrap();
        assert_eq!(parsed.kind, QrKind::Area);
        assert_eq!(parsed.area.as_deref(), Some("Level 3 Ladies Toilet"));
    }

    #[test]
    fn empty_and_oversized_input_is_rejected() {
        assert_eq!(parse("   "), Err(QrError::Empty));
        let long = "a".repeat(MAX_SCAN_LEN + 1);
        assert_eq!(parse(&long), Err(QrError::TooLong(MAX_SCAN_LEN + 1)));
    }
}
