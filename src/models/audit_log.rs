// Audit log model
// One row per security- or data-relevant event, with JSON before/after blobs

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::schema::audit_logs;

/// Audit event types. Stored as text; `as_str` values are the wire format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuditEventType {
    // Authentication
    LoginSuccess,
    LoginFailed,
    Logout,
    PasswordChanged,

    // Users
    UserCreated,
    UserUpdated,
    UserDeleted,
    UserRestored,
    UserRoleChanged,

    // Links
    UrlCreated,
    UrlUpdated,
    UrlDeleted,
    UrlRestored,
    UrlAccessed,

    // Roles and permissions
    RoleCreated,
    RoleUpdated,
    RoleDeleted,
    RoleRestored,
    PermissionGranted,
    PermissionRevoked,

    // Security
    SecurityViolation,
    SuspiciousActivity,
    IpBlocked,
    IpUnblocked,
    RateLimitExceeded,

    // System
    SystemConfigChanged,
    DataExport,
    AuditLogCleanup,
}

impl AuditEventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditEventType::LoginSuccess => "login_success",
            AuditEventType::LoginFailed => "login_failed",
            AuditEventType::Logout => "logout",
            AuditEventType::PasswordChanged => "password_changed",
            AuditEventType::UserCreated => "user_created",
            AuditEventType::UserUpdated => "user_updated",
            AuditEventType::UserDeleted => "user_deleted",
            AuditEventType::UserRestored => "user_restored",
            AuditEventType::UserRoleChanged => "user_role_changed",
            AuditEventType::UrlCreated => "url_created",
            AuditEventType::UrlUpdated => "url_updated",
            AuditEventType::UrlDeleted => "url_deleted",
            AuditEventType::UrlRestored => "url_restored",
            AuditEventType::UrlAccessed => "url_accessed",
            AuditEventType::RoleCreated => "role_created",
            AuditEventType::RoleUpdated => "role_updated",
            AuditEventType::RoleDeleted => "role_deleted",
            AuditEventType::RoleRestored => "role_restored",
            AuditEventType::PermissionGranted => "permission_granted",
            AuditEventType::PermissionRevoked => "permission_revoked",
            AuditEventType::SecurityViolation => "security_violation",
            AuditEventType::SuspiciousActivity => "suspicious_activity",
            AuditEventType::IpBlocked => "ip_blocked",
            AuditEventType::IpUnblocked => "ip_unblocked",
            AuditEventType::RateLimitExceeded => "rate_limit_exceeded",
            AuditEventType::SystemConfigChanged => "system_config_changed",
            AuditEventType::DataExport => "data_export",
            AuditEventType::AuditLogCleanup => "audit_log_cleanup",
        }
    }
}

/// Audit event severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuditSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl AuditSeverity {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditSeverity::Low => "low",
            AuditSeverity::Medium => "medium",
            AuditSeverity::High => "high",
            AuditSeverity::Critical => "critical",
        }
    }

    pub fn is_elevated(&self) -> bool {
        matches!(self, AuditSeverity::High | AuditSeverity::Critical)
    }
}

#[derive(Debug, Clone, Queryable, Selectable, Identifiable, Serialize, Deserialize)]
#[diesel(table_name = audit_logs)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct AuditLog {
    pub id: Uuid,
    pub event_type: String,
    pub severity: String,
    pub user_id: Option<Uuid>,
    pub username: Option<String>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub endpoint: Option<String>,
    pub method: Option<String>,
    pub resource_type: Option<String>,
    pub resource_id: Option<String>,
    pub old_values: Option<serde_json::Value>,
    pub new_values: Option<serde_json::Value>,
    pub additional_data: Option<serde_json::Value>,
    pub success: bool,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = audit_logs)]
pub struct NewAuditLog {
    pub event_type: String,
    pub severity: String,
    pub user_id: Option<Uuid>,
    pub username: Option<String>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub endpoint: Option<String>,
    pub method: Option<String>,
    pub resource_type: Option<String>,
    pub resource_id: Option<String>,
    pub old_values: Option<serde_json::Value>,
    pub new_values: Option<serde_json::Value>,
    pub additional_data: Option<serde_json::Value>,
    pub success: bool,
    pub error_message: Option<String>,
}

/// Filters for the audit log query API
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AuditLogFilters {
    pub event_type: Option<String>,
    pub user_id: Option<Uuid>,
    pub severity: Option<String>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub ip_address: Option<String>,
    pub resource_type: Option<String>,
    pub success: Option<bool>,
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

/// One page of audit logs
#[derive(Debug, Clone, Serialize)]
pub struct AuditLogPage {
    pub logs: Vec<AuditLog>,
    pub total: i64,
    pub pages: i64,
    pub current_page: i64,
    pub per_page: i64,
    pub has_next: bool,
    pub has_prev: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_type_wire_format() {
        assert_eq!(AuditEventType::LoginSuccess.as_str(), "login_success");
        assert_eq!(AuditEventType::UrlAccessed.as_str(), "url_accessed");
        assert_eq!(AuditEventType::IpBlocked.as_str(), "ip_blocked");
        assert_eq!(
            AuditEventType::SystemConfigChanged.as_str(),
            "system_config_changed"
        );
    }

    #[test]
    fn test_severity_levels() {
        assert_eq!(AuditSeverity::Low.as_str(), "low");
        assert_eq!(AuditSeverity::Critical.as_str(), "critical");
        assert!(!AuditSeverity::Low.is_elevated());
        assert!(!AuditSeverity::Medium.is_elevated());
        assert!(AuditSeverity::High.is_elevated());
        assert!(AuditSeverity::Critical.is_elevated());
    }
}
