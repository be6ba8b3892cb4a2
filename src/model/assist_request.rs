use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};
use thiserror::Error;
use utoipa::ToSchema;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema, AsRefStr, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum AssistStatus {
    Pending,
    Accepted,
    Resolved,
    Escalated,
    Cancelled,
}

impl AssistStatus {
    pub fn can_become(self, next: AssistStatus) -> bool {
        use AssistStatus::*;
        if self.is_closed() {
            return false;
        }
        matches!(
            (self, next),
            (Pending, Accepted)
                | (Pending, Cancelled)
                | (Accepted, Resolved)
                | (Accepted, Escalated)
                | (Accepted, Cancelled)
        )
    }

    pub fn is_closed(self) -> bool {
        matches!(
            self,
            AssistStatus::Resolved | AssistStatus::Escalated | AssistStatus::Cancelled
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema, AsRefStr, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Urgency {
    Low,
    Normal,
    Urgent,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct AssistRequest {
    pub id: u64,
    pub requested_by: u64,
    pub requester_name: String,
    pub accepted_by: Option<u64>,
    pub accepted_by_name: Option<String>,
    pub qr_code_id: Option<u64>,
    pub area_label: String,
    pub customer_name: Option<String>,
    pub description: String,
    #[schema(example = "normal")]
    pub urgency: String,
    #[schema(example = "pending")]
    pub status: String,
    /// JSON array of photo data URIs
    pub before_media: Option<String>,
    pub after_media: Option<String>,
    pub escalation_reason: Option<String>,
    #[schema(value_type = String, format = "date-time")]
    pub created_at: NaiveDateTime,
    #[schema(value_type = Option<String>, format = "date-time")]
    pub accepted_at: Option<NaiveDateTime>,
    #[schema(value_type = Option<String>, format = "date-time")]
    pub closed_at: Option<NaiveDateTime>,
}

impl AssistRequest {
    pub fn status(&self) -> Option<AssistStatus> {
        self.status.parse().ok()
    }

    /// Cleaners see the open queue plus anything they raised or took on.
    pub fn visible_to(&self, cleaner_id: u64) -> bool {
        self.status() == Some(AssistStatus::Pending)
            || self.requested_by == cleaner_id
            || self.accepted_by == Some(cleaner_id)
    }
}

/// Who is asking for a transition, relative to the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Actor {
    Requester,
    Acceptor,
    Other,
}

impl Actor {
    pub fn of(request: &AssistRequest, cleaner_id: u64) -> Self {
        if request.requested_by == cleaner_id {
            Actor::Requester
        } else if request.accepted_by == Some(cleaner_id) {
            Actor::Acceptor
        } else {
            Actor::Other
        }
    }
}

#[derive(Debug, PartialEq, Eq, Error)]
pub enum TransitionError {
    #[error("Cannot move an assist request from {from} to {to}")]
    Invalid { from: AssistStatus, to: AssistStatus },
    #[error("{0}")]
    NotAllowed(&'static str),
    #[error("Assist request has unknown status '{0}'")]
    UnknownStatus(String),
}

/// State machine plus who may drive each edge.
pub fn authorize_transition(
    request: &AssistRequest,
    actor: Actor,
    to: AssistStatus,
) -> Result<AssistStatus, TransitionError> {
    let from = request
        .status()
        .ok_or_else(|| TransitionError::UnknownStatus(request.status.clone()))?;

    if !from.can_become(to) {
        return Err(TransitionError::Invalid { from, to });
    }

    let allowed = match to {
        AssistStatus::Accepted => actor != Actor::Requester,
        AssistStatus::Resolved => actor == Actor::Acceptor,
        AssistStatus::Escalated => actor != Actor::Other,
        AssistStatus::Cancelled => actor == Actor::Requester,
        AssistStatus::Pending => false,
    };

    if allowed {
        Ok(from)
    } else {
        Err(TransitionError::NotAllowed(match to {
            AssistStatus::Accepted => "You cannot accept your own request",
            AssistStatus::Resolved => "Only the cleaner who accepted the request can resolve it",
            AssistStatus::Escalated => "Only the requester or the acceptor can escalate",
            AssistStatus::Cancelled => "Only the requester can cancel",
            AssistStatus::Pending => "Requests cannot be reopened",
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn request(status: AssistStatus, accepted_by: Option<u64>) -> AssistRequest {
        AssistRequest {
            id: 1,
            requested_by: 10,
            requester_name: "Maria".to_string(),
            accepted_by,
            accepted_by_name: accepted_by.map(|_| "Ade".to_string()),
            qr_code_id: None,
            area_label: "Ladies WC".to_string(),
            customer_name: None,
            description: "Blocked sink".to_string(),
            urgency: "urgent".to_string(),
            status: status.to_string(),
            before_media: None,
            after_media: None,
            escalation_reason: None,
            created_at: NaiveDate::from_ymd_opt(2026, 3, 2)
                .unwrap()
                .and_hms_opt(9, 0, 0)
                .unwrap(),
            accepted_at: None,
            closed_at: None,
        }
    }

    #[test]
    fn happy_path() {
        let pending = request(AssistStatus::Pending, None);
        let helper = Actor::of(&pending, 20);
        assert_eq!(helper, Actor::Other);
        assert_eq!(
            authorize_transition(&pending, helper, AssistStatus::Accepted),
            Ok(AssistStatus::Pending)
        );

        let accepted = request(AssistStatus::Accepted, Some(20));
        assert_eq!(Actor::of(&accepted, 20), Actor::Acceptor);
        assert!(authorize_transition(&accepted, Actor::Acceptor, AssistStatus::Resolved).is_ok());
        assert!(authorize_transition(&accepted, Actor::Requester, AssistStatus::Escalated).is_ok());
    }

    #[test]
    fn closed_requests_stay_closed() {
        for closed in [AssistStatus::Resolved, AssistStatus::Escalated, AssistStatus::Cancelled] {
            assert!(closed.is_closed());
            let req = request(closed, Some(20));
            assert!(matches!(
                authorize_transition(&req, Actor::Requester, AssistStatus::Cancelled),
                Err(TransitionError::Invalid { .. })
            ));
        }
    }

    #[test]
    fn pending_cannot_be_resolved_directly() {
        let pending = request(AssistStatus::Pending, None);
        assert_eq!(
            authorize_transition(&pending, Actor::Other, AssistStatus::Resolved),
            Err(TransitionError::Invalid {
                from: AssistStatus::Pending,
                to: AssistStatus::Resolved
            })
        );
    }

    #[test]
    fn cleaners_only_see_their_own_closed_requests() {
        let pending = request(AssistStatus::Pending, None);
        assert!(pending.visible_to(99));

        let accepted = request(AssistStatus::Accepted, Some(20));
        assert!(accepted.visible_to(10));
        assert!(accepted.visible_to(20));
        assert!(!accepted.visible_to(99));

        let resolved = request(AssistStatus::Resolved, Some(20));
        assert!(!resolved.visible_to(99));
    }

    #[test]
    fn transition_errors_explain_themselves() {
        let err = TransitionError::Invalid {
            from: AssistStatus::Pending,
            to: AssistStatus::Resolved,
        };
        assert_eq!(err.to_string(), "Cannot move an assist request from pending to resolved");
        assert_eq!(
            TransitionError::UnknownStatus("open".into()).to_string(),
            "Assist request has unknown status 'open'"
        );
    }

    #[test]
    fn roles_are_enforced() {
        let pending = request(AssistStatus::Pending, None);
        assert!(matches!(
            authorize_transition(&pending, Actor::Requester, AssistStatus::Accepted),
            Err(TransitionError::NotAllowed(_))
        ));
        assert!(authorize_transition(&pending, Actor::Requester, AssistStatus::Cancelled).is_ok());

        let accepted = request(AssistStatus::Accepted, Some(20));
        assert!(matches!(
            authorize_transition(&accepted, Actor::Other, AssistStatus::Resolved),
            Err(TransitionError::NotAllowed(_))
        ));
        assert!(matches!(
            authorize_transition(&accepted, Actor::Acceptor, AssistStatus::Cancelled),
            Err(TransitionError::NotAllowed(_))
        ));
    }

    #[test]
    fn unknown_status_is_reported() {
        let mut req = request(AssistStatus::Pending, None);
        req.status = "lost".to_string();
        assert_eq!(
            authorize_transition(&req, Actor::Other, AssistStatus::Accepted),
            Err(TransitionError::UnknownStatus("lost".to_string()))
        );
    }
}
