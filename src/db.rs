pub mod user_repo;
pub use user_repo::UserRepository;
pub mod hierarchy_repo;
pub use hierarchy_repo::HierarchyRepository;
pub mod report_repo;
pub use report_repo::ReportRepository;
pub mod message_repo;
pub use message_repo::MessageRepository;
pub mod notification_repo;
pub use notification_repo::NotificationRepository;
#[cfg(test)]
pub mod fixtures;
