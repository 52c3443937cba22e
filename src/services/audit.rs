// Audit logging service
// Synchronous row insert per event; a failed audit write never fails the
// request that triggered it. Elevated events are mirrored to tracing.

use chrono::{DateTime, Duration, Utc};
use diesel::prelude::*;
use diesel_async::RunQueryDsl;
use serde::Serialize;
use serde_json::Value;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::db::DieselPool;
use crate::models::audit_log::{
    AuditEventType, AuditLog, AuditLogFilters, AuditLogPage, AuditSeverity, NewAuditLog,
};
use crate::schema::audit_logs;
use crate::utils::service_error::ServiceError;

/// Request context attached to audit entries
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub endpoint: Option<String>,
    pub method: Option<String>,
}

/// A single audit entry under construction
#[derive(Debug, Clone)]
pub struct AuditEntry {
    pub event_type: AuditEventType,
    pub severity: AuditSeverity,
    pub user_id: Option<Uuid>,
    pub username: Option<String>,
    pub resource_type: Option<String>,
    pub resource_id: Option<String>,
    pub old_values: Option<Value>,
    pub new_values: Option<Value>,
    pub additional_data: Option<Value>,
    pub success: bool,
    pub error_message: Option<String>,
}

impl AuditEntry {
    pub fn new(event_type: AuditEventType) -> Self {
        Self {
            event_type,
            severity: AuditSeverity::Low,
            user_id: None,
            username: None,
            resource_type: None,
            resource_id: None,
            old_values: None,
            new_values: None,
            additional_data: None,
            success: true,
            error_message: None,
        }
    }

    pub fn severity(mut self, severity: AuditSeverity) -> Self {
        self.severity = severity;
        self
    }

    pub fn actor(mut self, user_id: Uuid, username: &str) -> Self {
        self.user_id = Some(user_id);
        self.username = Some(username.to_string());
        self
    }

    pub fn resource(mut self, resource_type: &str, resource_id: impl ToString) -> Self {
        self.resource_type = Some(resource_type.to_string());
        self.resource_id = Some(resource_id.to_string());
        self
    }

    pub fn old_values(mut self, values: Value) -> Self {
        self.old_values = Some(values);
        self
    }

    pub fn new_values(mut self, values: Value) -> Self {
        self.new_values = Some(values);
        self
    }

    pub fn additional_data(mut self, data: Value) -> Self {
        self.additional_data = Some(data);
        self
    }

    pub fn failure(mut self, message: &str) -> Self {
        self.success = false;
        self.error_message = Some(message.to_string());
        self
    }
}

/// Aggregate audit statistics for a period
#[derive(Debug, Clone, Serialize)]
pub struct AuditStatistics {
    pub total_events: i64,
    pub period_days: i64,
    pub event_types: Vec<LabelCount>,
    pub severity_levels: Vec<LabelCount>,
    pub top_users: Vec<LabelCount>,
    pub top_ips: Vec<LabelCount>,
}

#[derive(Debug, Clone, Serialize, QueryableByName)]
pub struct LabelCount {
    #[diesel(sql_type = diesel::sql_types::Nullable<diesel::sql_types::Text>)]
    pub label: Option<String>,
    #[diesel(sql_type = diesel::sql_types::BigInt)]
    pub count: i64,
}

pub struct AuditLogger {
    pool: DieselPool,
}

impl AuditLogger {
    pub fn new(pool: DieselPool) -> Self {
        Self { pool }
    }

    /// Persist an audit entry. Errors are logged and swallowed so the
    /// triggering request never fails because of audit bookkeeping.
    pub async fn log_event(&self, entry: AuditEntry, context: &RequestContext) {
        let severity = entry.severity;
        let row = NewAuditLog {
            event_type: entry.event_type.as_str().to_string(),
            severity: entry.severity.as_str().to_string(),
            user_id: entry.user_id,
            username: entry.username,
            ip_address: context.ip_address.clone(),
            user_agent: context.user_agent.clone(),
            endpoint: context.endpoint.clone(),
            method: context.method.clone(),
            resource_type: entry.resource_type,
            resource_id: entry.resource_id,
            old_values: entry.old_values,
            new_values: entry.new_values,
            additional_data: entry.additional_data,
            success: entry.success,
            error_message: entry.error_message,
        };

        let mut conn = match self.pool.get().await {
            Ok(conn) => conn,
            Err(e) => {
                error!("Failed to get connection for audit log: {}", e);
                return;
            },
        };

        match diesel::insert_into(audit_logs::table)
            .values(&row)
            .get_result::<AuditLog>(&mut conn)
            .await
        {
            Ok(log) => {
                let json_log = serde_json::to_string(&log)
                    .unwrap_or_else(|_| format!("{:?}", log.event_type));
                if severity.is_elevated() {
                    warn!(target: "audit", "{}", json_log);
                } else {
                    info!(target: "audit", "{}", json_log);
                }
            },
            Err(e) => {
                error!("Failed to write audit log: {}", e);
            },
        }
    }

    /// Filtered, paginated audit log query, newest first
    pub async fn query(&self, filters: &AuditLogFilters) -> Result<AuditLogPage, ServiceError> {
        let mut conn = self
            .pool
            .get()
            .await
            .map_err(|e| ServiceError::DatabaseError(e.to_string()))?;

        let page = filters.page.unwrap_or(1).max(1);
        let per_page = filters.per_page.unwrap_or(50).clamp(1, 100);

        // Select clauses are fixed before boxing; filters land on the boxed
        // queries
        let mut count_query = audit_logs::table.count().into_boxed();
        let mut rows_query = audit_logs::table.into_boxed();

        if let Some(ref event_type) = filters.event_type {
            count_query = count_query.filter(audit_logs::event_type.eq(event_type.clone()));
            rows_query = rows_query.filter(audit_logs::event_type.eq(event_type.clone()));
        }
        if let Some(user_id) = filters.user_id {
            count_query = count_query.filter(audit_logs::user_id.eq(user_id));
            rows_query = rows_query.filter(audit_logs::user_id.eq(user_id));
        }
        if let Some(ref severity) = filters.severity {
            count_query = count_query.filter(audit_logs::severity.eq(severity.clone()));
            rows_query = rows_query.filter(audit_logs::severity.eq(severity.clone()));
        }
        if let Some(start) = filters.start_date {
            count_query = count_query.filter(audit_logs::created_at.ge(start));
            rows_query = rows_query.filter(audit_logs::created_at.ge(start));
        }
        if let Some(end) = filters.end_date {
            count_query = count_query.filter(audit_logs::created_at.le(end));
            rows_query = rows_query.filter(audit_logs::created_at.le(end));
        }
        if let Some(ref ip) = filters.ip_address {
            count_query = count_query.filter(audit_logs::ip_address.eq(ip.clone()));
            rows_query = rows_query.filter(audit_logs::ip_address.eq(ip.clone()));
        }
        if let Some(ref resource_type) = filters.resource_type {
            count_query = count_query.filter(audit_logs::resource_type.eq(resource_type.clone()));
            rows_query = rows_query.filter(audit_logs::resource_type.eq(resource_type.clone()));
        }
        if let Some(success) = filters.success {
            count_query = count_query.filter(audit_logs::success.eq(success));
            rows_query = rows_query.filter(audit_logs::success.eq(success));
        }

        let total: i64 = count_query.get_result(&mut conn).await?;

        let logs = rows_query
            .order(audit_logs::created_at.desc())
            .offset((page - 1) * per_page)
            .limit(per_page)
            .load::<AuditLog>(&mut conn)
            .await?;

        let pages = if total == 0 {
            0
        } else {
            (total + per_page - 1) / per_page
        };

        Ok(AuditLogPage {
            logs,
            total,
            pages,
            current_page: page,
            per_page,
            has_next: page < pages,
            has_prev: page > 1 && total > 0,
        })
    }

    /// Count events of a type within a period (used by the security status
    /// endpoint)
    pub async fn count_events(
        &self,
        event_type: AuditEventType,
        since: DateTime<Utc>,
    ) -> Result<i64, ServiceError> {
        let mut conn = self
            .pool
            .get()
            .await
            .map_err(|e| ServiceError::DatabaseError(e.to_string()))?;

        let count = audit_logs::table
            .filter(audit_logs::event_type.eq(event_type.as_str()))
            .filter(audit_logs::created_at.ge(since))
            .count()
            .get_result(&mut conn)
            .await?;
        Ok(count)
    }

    /// Aggregate statistics over the last `days` days
    pub async fn statistics(&self, days: i64) -> Result<AuditStatistics, ServiceError> {
        let mut conn = self
            .pool
            .get()
            .await
            .map_err(|e| ServiceError::DatabaseError(e.to_string()))?;

        let days = days.clamp(1, 365);
        let start = Utc::now() - Duration::days(days);

        let total_events: i64 = audit_logs::table
            .filter(audit_logs::created_at.ge(start))
            .count()
            .get_result(&mut conn)
            .await?;

        let event_types = diesel::sql_query(
            "SELECT event_type AS label, COUNT(*) AS count FROM audit_logs \
             WHERE created_at >= $1 GROUP BY event_type ORDER BY count DESC",
        )
        .bind::<diesel::sql_types::Timestamptz, _>(start)
        .load::<LabelCount>(&mut conn)
        .await?;

        let severity_levels = diesel::sql_query(
            "SELECT severity AS label, COUNT(*) AS count FROM audit_logs \
             WHERE created_at >= $1 GROUP BY severity ORDER BY count DESC",
        )
        .bind::<diesel::sql_types::Timestamptz, _>(start)
        .load::<LabelCount>(&mut conn)
        .await?;

        let top_users = diesel::sql_query(
            "SELECT username AS label, COUNT(*) AS count FROM audit_logs \
             WHERE created_at >= $1 AND username IS NOT NULL \
             GROUP BY username ORDER BY count DESC LIMIT 10",
        )
        .bind::<diesel::sql_types::Timestamptz, _>(start)
        .load::<LabelCount>(&mut conn)
        .await?;

        let top_ips = diesel::sql_query(
            "SELECT ip_address AS label, COUNT(*) AS count FROM audit_logs \
             WHERE created_at >= $1 AND ip_address IS NOT NULL \
             GROUP BY ip_address ORDER BY count DESC LIMIT 10",
        )
        .bind::<diesel::sql_types::Timestamptz, _>(start)
        .load::<LabelCount>(&mut conn)
        .await?;

        Ok(AuditStatistics {
            total_events,
            period_days: days,
            event_types,
            severity_levels,
            top_users,
            top_ips,
        })
    }

    /// Delete audit logs older than the threshold. Returns the row count.
    pub async fn cleanup_old_logs(&self, days_to_keep: i64) -> Result<usize, ServiceError> {
        let mut conn = self
            .pool
            .get()
            .await
            .map_err(|e| ServiceError::DatabaseError(e.to_string()))?;

        let cutoff = Utc::now() - Duration::days(days_to_keep);

        let deleted = diesel::delete(audit_logs::table.filter(audit_logs::created_at.lt(cutoff)))
            .execute(&mut conn)
            .await?;

        info!("Cleaned up {} old audit logs", deleted);
        Ok(deleted)
    }
}
