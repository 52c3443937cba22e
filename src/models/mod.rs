// Database models for the Rafah backend

pub mod audit_log;
pub mod click_log;
pub mod link;
pub mod role;
pub mod user;

pub use audit_log::{AuditEventType, AuditLog, AuditSeverity};
pub use click_log::{ClickLog, NewClickLog};
pub use link::{Link, LinkResponse};
pub use role::{Permission, Role};
pub use user::{User, UserResponse};
