pub mod auth;
pub mod hierarchy;
pub mod messaging;
pub mod notification;
pub mod report;
