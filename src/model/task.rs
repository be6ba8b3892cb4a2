use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use thiserror::Error;
use utoipa::ToSchema;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct AreaTask {
    pub id: u64,
    #[schema(example = "toilet")]
    pub area_category: String,
    #[schema(nullable = true)]
    pub customer_name: Option<String>,
    #[schema(example = "Refill soap dispensers")]
    pub task_name: String,
    pub is_required: bool,
    pub sort_order: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct TaskSelection {
    pub id: u64,
    pub cleaner_id: u64,
    pub cleaner_name: String,
    pub qr_code_id: Option<u64>,
    pub area_label: String,
    pub area_category: String,
    pub customer_name: Option<String>,
    /// JSON array of task ids, e.g. `[3,4,9]`.
    #[schema(example = "[3,4,9]")]
    pub selected_task_ids: String,
    pub notes: Option<String>,
    #[schema(value_type = String, format = "date-time")]
    pub completed_at: NaiveDateTime,
}

impl TaskSelection {
    /// Rows written by older clients sometimes hold ids as strings.
    pub fn task_ids(&self) -> Vec<u64> {
        decode_task_ids(&self.selected_task_ids)
    }
}

pub fn encode_task_ids(ids: &BTreeSet<u64>) -> String {
    serde_json::to_string(ids).unwrap_or_else(|_| "[]".to_string())
}

pub fn decode_task_ids(raw: &str) -> Vec<u64> {
    let values: Vec<serde_json::Value> = serde_json::from_str(raw).unwrap_or_default();
    values
        .iter()
        .filter_map(|v| match v {
            serde_json::Value::Number(n) => n.as_u64(),
            serde_json::Value::String(s) => s.trim().parse().ok(),
            _ => None,
        })
        .collect()
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct TaskPhoto {
    pub id: u64,
    pub selection_id: u64,
    pub task_id: u64,
    /// `data:image/...;base64,` URI
    pub photo_data: String,
    #[schema(value_type = String, format = "date-time")]
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PhotoUpload {
    pub task_id: u64,
    /// Base64 or `data:image/...;base64,` URI.
    pub photo: String,
}

#[derive(Debug, PartialEq, Eq, Error)]
pub enum ChecklistError {
    #[error("Select at least one task")]
    NothingSelected,
    #[error("Task {0} does not belong to this area")]
    UnknownTask(u64),
    #[error("'{0}' is required")]
    RequiredTaskSkipped(String),
    #[error("'{0}' needs a photo")]
    MissingPhoto(String),
    #[error("Photo supplied for task {0} which was not selected")]
    PhotoForUnselectedTask(u64),
    #[error("More than one photo for task {0}")]
    DuplicatePhoto(u64),
}

/// Every required task must be selected and carry a photo; photos only for selected tasks.
pub fn validate_checklist(
    tasks: &[AreaTask],
    selected: &BTreeSet<u64>,
    photos: &[PhotoUpload],
) -> Result<(), ChecklistError> {
    if selected.is_empty() {
        return Err(ChecklistError::NothingSelected);
    }

    let by_id: HashMap<u64, &AreaTask> = tasks.iter().map(|t| (t.id, t)).collect();
    if let Some(unknown) = selected.iter().find(|id| !by_id.contains_key(id)) {
        return Err(ChecklistError::UnknownTask(*unknown));
    }

    let mut photographed = BTreeSet::new();
    for photo in photos {
        if !selected.contains(&photo.task_id) {
            return Err(ChecklistError::PhotoForUnselectedTask(photo.task_id));
        }
        if !photographed.insert(photo.task_id) {
            return Err(ChecklistError::DuplicatePhoto(photo.task_id));
        }
    }

    let mut required: Vec<&AreaTask> = tasks.iter().filter(|t| t.is_required).collect();
    required.sort_by_key(|t| t.sort_order);

    for task in required {
        if !selected.contains(&task.id) {
            return Err(ChecklistError::RequiredTaskSkipped(task.task_name.clone()));
        }
        if !photographed.contains(&task.id) {
            return Err(ChecklistError::MissingPhoto(task.task_name.clone()));
        }
    }

    Ok(())
}

/// Customer-specific rows replace the generic list for that category.
pub fn pick_checklist(mut rows: Vec<AreaTask>, customer: Option<&str>) -> Vec<AreaTask> {
    let has_custom = customer.is_some_and(|c| {
        rows.iter()
            .any(|t| t.customer_name.as_deref().is_some_and(|n| n.eq_ignore_ascii_case(c)))
    });

    rows.retain(|t| match (&t.customer_name, customer) {
        (None, _) => !has_custom,
        (Some(name), Some(c)) => name.eq_ignore_ascii_case(c),
        (Some(_), None) => false,
    });
    rows.sort_by_key(|t| (t.sort_order, t.id));
    rows
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task(id: u64, name: &str, required: bool, customer: Option<&str>) -> AreaTask {
        AreaTask {
            id,
            area_category: "toilet".to_string(),
            customer_name: customer.map(str::to_string),
            task_name: name.to_string(),
            is_required: required,
            sort_order: id as i32,
        }
    }

    fn photo(task_id: u64) -> PhotoUpload {
        PhotoUpload {
            task_id,
            photo: "iVBORw0KGgo=".to_string(),
        }
    }

    fn checklist() -> Vec<AreaTask> {
        vec![
            task(1, "Clean toilets", true, None),
            task(2, "Refill soap", false, None),
            task(3, "Mop floor", true, None),
        ]
    }

    #[test]
    fn complete_checklist_passes() {
        let selected = BTreeSet::from([1, 2, 3]);
        assert_eq!(
            validate_checklist(&checklist(), &selected, &[photo(1), photo(3)]),
            Ok(())
        );
    }

    #[test]
    fn every_required_task_needs_a_photo() {
        let selected = BTreeSet::from([1, 2, 3]);
        assert_eq!(
            validate_checklist(&checklist(), &selected, &[photo(1), photo(2)]),
            Err(ChecklistError::MissingPhoto("Mop floor".to_string()))
        );
    }

    #[test]
    fn required_tasks_cannot_be_skipped() {
        let selected = BTreeSet::from([1, 2]);
        assert_eq!(
            validate_checklist(&checklist(), &selected, &[photo(1)]),
            Err(ChecklistError::RequiredTaskSkipped("Mop floor".to_string()))
        );
    }

    #[test]
    fn checklist_errors_name_the_task() {
        assert_eq!(
            ChecklistError::RequiredTaskSkipped("Mop floor".to_string()).to_string(),
            "'Mop floor' is required"
        );
        assert_eq!(
            ChecklistError::DuplicatePhoto(4).to_string(),
            "More than one photo for task 4"
        );
    }

    #[test]
    fn photos_must_belong_to_selected_tasks() {
        let selected = BTreeSet::from([1, 3]);
        assert_eq!(
            validate_checklist(&checklist(), &selected, &[photo(1), photo(3), photo(2)]),
            Err(ChecklistError::PhotoForUnselectedTask(2))
        );
        assert_eq!(
            validate_checklist(&checklist(), &selected, &[photo(1), photo(1)]),
            Err(ChecklistError::DuplicatePhoto(1))
        );
        assert_eq!(
            validate_checklist(&checklist(), &BTreeSet::from([1, 3, 42]), &[]),
            Err(ChecklistError::UnknownTask(42))
        );
        assert_eq!(
            validate_checklist(&checklist(), &BTreeSet::new(), &[]),
            Err(ChecklistError::NothingSelected)
        );
    }

    #[test]
    fn customer_rows_replace_generic_rows() {
        let rows = vec![
            task(1, "Clean toilets", true, None),
            task(5, "Check sanitary bins", true, Some("Harbour Offices")),
            task(6, "Other site task", false, Some("Acme")),
        ];

        let picked = pick_checklist(rows.clone(), Some("harbour offices"));
        assert_eq!(picked.iter().map(|t| t.id).collect::<Vec<_>>(), vec![5]);

        let generic = pick_checklist(rows, None);
        assert_eq!(generic.iter().map(|t| t.id).collect::<Vec<_>>(), vec![1]);
    }

    #[test]
    fn task_ids_tolerate_strings() {
        assert_eq!(decode_task_ids(r#"[1,"2"," 3 ",null]"#), vec![1, 2, 3]);
        assert_eq!(decode_task_ids("not json"), Vec::<u64>::new());
        assert_eq!(encode_task_ids(&BTreeSet::from([3, 1])), "[1,3]");
    }
}
