use crate::api::assist::{CreateAssist, EscalateAssist, ResolveAssist};
use crate::api::attendance::ClockRequest;
use crate::api::cleaners::{CleanerListResponse, CleanerQuery, CreateCleaner};
use crate::api::drafts::{ReconcileRequest, ReconcileResponse};
use crate::api::manager::{FeedbackRequest, PhotoReview};
use crate::api::qr_codes::{CreateQrCode, CreatedQrCode};
use crate::api::scan::{AreaVisit, ScanOutcome, ScanRequest};
use crate::api::tasks::{SubmissionDetail, SubmitChecklist};
use crate::api::tracking::{LiveCleaner, LiveResponse};
use crate::model::{
    assist_request::{AssistRequest, AssistStatus, Urgency},
    attendance::AttendanceRecord,
    cleaner::{Cleaner, CleanerStatus},
    cleaner_log::{CleanerLog, LogAction},
    live_tracking::{LiveTracking, TrackingEvent},
    photo_feedback::Feedback,
    qr_code::QrCodeRecord,
    task::{AreaTask, PhotoUpload, TaskPhoto, TaskSelection},
    work_draft::{DraftSource, WorkDraft},
};
use crate::models::{LoginReqDto, UserReq};
use crate::qr::{QrKind, QrPayload};
use crate::service::attendance::{ClockResult, ShiftReportRow};
use crate::utils::{area_classifier::AreaCategory, name_match::MatchKind};
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi, openapi};

/// Registers the JWT scheme the `security(("bearer_auth" = []))` blocks refer to.
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

#[derive(OpenApi)]
#[openapi(
    info(
        title = "CleanOps Field API",
        version = "1.0.0",
        description = r#"
## Cleaning Field Operations

Backend for contract cleaning crews and the managers who supervise them.

### 🔹 Key Features
- **Attendance**
  - QR clock-in/clock-out, shift history and payroll-style reports
- **Area Scans**
  - Scan an area code to open its cleaning checklist
- **Task Checklists**
  - Submit completed tasks with photo evidence, resume drafts across devices
- **Assist Requests**
  - Raise, accept, resolve and escalate requests for help on site
- **Manager Review**
  - Live crew view, photo approval and the activity log

### 🔐 Security
All endpoints except `/auth/login` and `/auth/refresh` need a **JWT Bearer** token.
Management endpoints are limited to **Admin** and **Manager** roles.

### 📦 Response Format
- JSON-based RESTful responses
- Pagination on submission, photo and roster lists
"#,
    ),
    paths(
        crate::auth::handlers::register,
        crate::auth::handlers::login,
        crate::auth::handlers::refresh_token,
        crate::auth::handlers::logout,

        crate::api::cleaners::create_cleaner,
        crate::api::cleaners::list_cleaners,
        crate::api::cleaners::get_cleaner,
        crate::api::cleaners::update_cleaner,
        crate::api::cleaners::deactivate_cleaner,

        crate::api::attendance::clock_in,
        crate::api::attendance::clock_out,
        crate::api::attendance::my_shift,
        crate::api::attendance::report,

        crate::api::scan::scan,
        crate::api::tracking::live,

        crate::api::tasks::get_checklist,
        crate::api::tasks::list_categories,
        crate::api::tasks::submit_checklist,
        crate::api::tasks::list_submissions,
        crate::api::tasks::get_submission,

        crate::api::qr_codes::create_qr_code,
        crate::api::qr_codes::list_qr_codes,
        crate::api::qr_codes::get_qr_code,
        crate::api::qr_codes::delete_qr_code,

        crate::api::drafts::save_draft,
        crate::api::drafts::get_draft,
        crate::api::drafts::delete_draft,
        crate::api::drafts::reconcile_draft,

        crate::api::assist::create_assist,
        crate::api::assist::list_assist,
        crate::api::assist::get_assist,
        crate::api::assist::accept_assist,
        crate::api::assist::resolve_assist,
        crate::api::assist::escalate_assist,
        crate::api::assist::cancel_assist,

        crate::api::manager::list_photos,
        crate::api::manager::set_feedback,
        crate::api::manager::activity_log
    ),
    components(
        schemas(
            UserReq,
            LoginReqDto,
            Cleaner,
            CleanerStatus,
            CreateCleaner,
            CleanerQuery,
            CleanerListResponse,
            AttendanceRecord,
            ClockRequest,
            ClockResult,
            ShiftReportRow,
            MatchKind,
            ScanRequest,
            ScanOutcome,
            AreaVisit,
            QrKind,
            QrPayload,
            LiveTracking,
            TrackingEvent,
            LiveCleaner,
            LiveResponse,
            AreaCategory,
            AreaTask,
            TaskSelection,
            TaskPhoto,
            PhotoUpload,
            SubmitChecklist,
            SubmissionDetail,
            QrCodeRecord,
            CreateQrCode,
            CreatedQrCode,
            WorkDraft,
            DraftSource,
            ReconcileRequest,
            ReconcileResponse,
            AssistRequest,
            AssistStatus,
            Urgency,
            CreateAssist,
            ResolveAssist,
            EscalateAssist,
            Feedback,
            FeedbackRequest,
            PhotoReview,
            CleanerLog,
            LogAction
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Auth", description = "Login, token refresh and account registration"),
        (name = "Cleaner", description = "Cleaner roster APIs"),
        (name = "Attendance", description = "Clock-in/clock-out and shift reports"),
        (name = "Scan", description = "Single entry point for scanned QR text"),
        (name = "Tracking", description = "Live crew status"),
        (name = "Tasks", description = "Area checklists and completed work"),
        (name = "QR Codes", description = "Printable site codes"),
        (name = "Drafts", description = "In-progress checklist sync"),
        (name = "Assist", description = "On-site help requests"),
        (name = "Manager", description = "Photo review and activity log"),
    )
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_carries_bearer_scheme_and_field_routes() {
        let doc = ApiDoc::openapi();
        let components = doc.components.expect("components");
        assert!(components.security_schemes.contains_key("bearer_auth"));
        assert!(doc.paths.paths.contains_key("/api/v1/scan"));
        assert!(doc.paths.paths.contains_key("/api/v1/assist/{id}/escalate"));
    }
}
