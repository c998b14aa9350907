pub mod approval;
pub mod auth;
pub mod export_service;
pub mod hierarchy_service;
pub mod messaging_service;
pub mod notification_service;
pub mod report_service;
pub mod scope;
pub mod user_service;
