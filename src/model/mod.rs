pub mod assist_request;
pub mod attendance;
pub mod cleaner;
pub mod cleaner_log;
pub mod live_tracking;
pub mod photo_feedback;
pub mod qr_code;
pub mod role;
pub mod task;
pub mod work_draft;
