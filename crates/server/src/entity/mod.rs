pub mod children;
pub mod notification_history;
pub mod notifications;
pub mod users;
