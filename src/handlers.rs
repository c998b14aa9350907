pub mod auth;
pub mod export;
pub mod hierarchy;
pub mod messages;
pub mod notifications;
pub mod reports;
pub mod users;
