use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use utoipa::ToSchema;

/// In-progress checklist, kept so a worker's photos survive a reload or a lost signal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct WorkDraft {
    pub qr_code_id: Option<u64>,
    pub area_label: String,
    #[serde(default)]
    pub selected_task_ids: Vec<u64>,
    /// task id → base64 photo
    #[serde(default)]
    pub photos: BTreeMap<u64, String>,
    #[serde(default)]
    pub notes: Option<String>,
    #[schema(value_type = String, format = "date-time")]
    pub updated_at: NaiveDateTime,
}

impl WorkDraft {
    pub fn photo_count(&self) -> usize {
        self.photos.values().filter(|p| !p.trim().is_empty()).count()
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct WorkDraftRow {
    pub cleaner_id: u64,
    pub draft_data: String,
    pub photo_count: u32,
    pub updated_at: NaiveDateTime,
}

impl WorkDraftRow {
    pub fn decode(&self) -> Option<WorkDraft> {
        match serde_json::from_str(&self.draft_data) {
            Ok(draft) => Some(draft),
            Err(e) => {
                tracing::warn!(error = %e, cleaner_id = self.cleaner_id, "Unreadable work draft");
                None
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum DraftSource {
    Local,
    Server,
    None,
}

/// Picks the copy to resume from: more photos wins; on a tie local wins if it has
/// photos; with no photos anywhere the newer copy wins, local on equal timestamps.
pub fn reconcile(
    local: Option<WorkDraft>,
    server: Option<WorkDraft>,
) -> (Option<WorkDraft>, DraftSource) {
    match (local, server) {
        (None, None) => (None, DraftSource::None),
        (Some(local), None) => (Some(local), DraftSource::Local),
        (None, Some(server)) => (Some(server), DraftSource::Server),
        (Some(local), Some(server)) => {
            let (l, s) = (local.photo_count(), server.photo_count());
            let local_wins = if l != s {
                l > s
            } else if l > 0 {
                true
            } else {
                local.updated_at >= server.updated_at
            };

            if local_wins {
                (Some(local), DraftSource::Local)
            } else {
                (Some(server), DraftSource::Server)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn draft(photos: usize, minute: u32) -> WorkDraft {
        WorkDraft {
            qr_code_id: Some(3),
            area_label: "Gents".to_string(),
            selected_task_ids: vec![1, 2, 3],
            photos: (1..=photos as u64).map(|id| (id, "aGk=".to_string())).collect(),
            notes: None,
            updated_at: NaiveDate::from_ymd_opt(2026, 3, 2)
                .unwrap()
                .and_hms_opt(10, minute, 0)
                .unwrap(),
        }
    }

    #[test]
    fn more_photos_wins() {
        let (picked, source) = reconcile(Some(draft(1, 50)), Some(draft(2, 10)));
        assert_eq!(source, DraftSource::Server);
        assert_eq!(picked.unwrap().photo_count(), 2);

        let (_, source) = reconcile(Some(draft(3, 0)), Some(draft(2, 59)));
        assert_eq!(source, DraftSource::Local);
    }

    #[test]
    fn tie_with_photos_keeps_local() {
        let (_, source) = reconcile(Some(draft(2, 0)), Some(draft(2, 30)));
        assert_eq!(source, DraftSource::Local);
    }

    #[test]
    fn without_photos_newer_wins() {
        let (_, source) = reconcile(Some(draft(0, 0)), Some(draft(0, 30)));
        assert_eq!(source, DraftSource::Server);
        let (_, source) = reconcile(Some(draft(0, 30)), Some(draft(0, 30)));
        assert_eq!(source, DraftSource::Local);
    }

    #[test]
    fn blank_photos_do_not_count() {
        let mut d = draft(2, 0);
        d.photos.insert(9, "  ".to_string());
        assert_eq!(d.photo_count(), 2);
    }

    #[test]
    fn missing_sides() {
        assert_eq!(reconcile(None, None), (None, DraftSource::None));
        assert_eq!(reconcile(None, Some(draft(0, 1))).1, DraftSource::Server);
        assert_eq!(reconcile(Some(draft(0, 1)), None).1, DraftSource::Local);
    }
}
