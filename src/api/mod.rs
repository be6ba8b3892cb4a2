pub mod assist;
pub mod attendance;
pub mod cleaners;
pub mod drafts;
pub mod manager;
pub mod qr_codes;
pub mod scan;
pub mod tasks;
pub mod tracking;
