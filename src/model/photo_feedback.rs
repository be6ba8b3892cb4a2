use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, EnumString};
use utoipa::ToSchema;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema, AsRefStr, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Feedback {
    Approved,
    Flagged,
}

/// What to do with the stored row after a manager clicks a feedback button.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedbackChange {
    Insert(Feedback),
    Update(Feedback),
    Delete,
}

/// Clicking the current value again clears it.
pub fn toggle(current: Option<Feedback>, clicked: Feedback) -> FeedbackChange {
    match current {
        None => FeedbackChange::Insert(clicked),
        Some(existing) if existing == clicked => FeedbackChange::Delete,
        Some(_) => FeedbackChange::Update(clicked),
    }
}

impl FeedbackChange {
    pub fn resulting(self) -> Option<Feedback> {
        match self {
            FeedbackChange::Insert(f) | FeedbackChange::Update(f) => Some(f),
            FeedbackChange::Delete => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn toggling_twice_returns_to_unset() {
        let first = toggle(None, Feedback::Approved);
        assert_eq!(first, FeedbackChange::Insert(Feedback::Approved));

        let second = toggle(first.resulting(), Feedback::Approved);
        assert_eq!(second, FeedbackChange::Delete);
        assert_eq!(second.resulting(), None);
    }

    #[test]
    fn switching_value_updates_in_place() {
        assert_eq!(
            toggle(Some(Feedback::Approved), Feedback::Flagged),
            FeedbackChange::Update(Feedback::Flagged)
        );
    }
}
