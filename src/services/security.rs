// SecurityManager: process-local security state
// Failed-login lockout, manual IP blocklist, sliding-window rate limiting
// and CSRF sessions. Everything here lives in memory and is lost on
// restart; there is no cross-instance coordination.

use chrono::{DateTime, TimeZone, Utc};
use rand::RngCore;
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::sync::RwLock;
use subtle::ConstantTimeEq;
use tracing::{info, warn};

use crate::app_config::SecuritySettings;

/// Result of a rate-limit check
#[derive(Debug, Clone, Serialize)]
pub struct RateLimitResult {
    pub allowed: bool,
    pub remaining: u32,
    pub retry_after: Option<u64>,
}

/// Details for a blocked IP, surfaced by the admin API
#[derive(Debug, Clone, Serialize)]
pub struct BlockedIpDetails {
    pub ip_address: String,
    pub failed_attempts_24h: usize,
    pub total_failed_attempts: usize,
    pub last_attempt: Option<DateTime<Utc>>,
}

pub struct SecurityManager {
    settings: RwLock<SecuritySettings>,
    /// Failed login timestamps (unix seconds) per IP
    failed_logins: RwLock<HashMap<String, Vec<i64>>>,
    /// Manually blocked IPs
    blocked_ips: RwLock<HashSet<String>>,
    /// Request timestamps (unix seconds) per IP, pruned on each check
    rate_limits: RwLock<HashMap<String, Vec<i64>>>,
    /// CSRF tokens keyed by session id
    csrf_sessions: RwLock<HashMap<String, String>>,
}

impl SecurityManager {
    pub fn new(settings: SecuritySettings) -> Self {
        Self {
            settings: RwLock::new(settings),
            failed_logins: RwLock::new(HashMap::new()),
            blocked_ips: RwLock::new(HashSet::new()),
            rate_limits: RwLock::new(HashMap::new()),
            csrf_sessions: RwLock::new(HashMap::new()),
        }
    }

    fn now() -> i64 {
        Utc::now().timestamp()
    }

    /// Snapshot of the live settings
    pub fn settings(&self) -> SecuritySettings {
        self.settings.read().expect("settings lock poisoned").clone()
    }

    /// Replace the live settings (validated by the caller)
    pub fn update_settings(&self, settings: SecuritySettings) {
        *self.settings.write().expect("settings lock poisoned") = settings;
    }

    // =========================================================================
    // IP BLOCKING
    // =========================================================================

    /// An IP is blocked when manually blocklisted or when its recent failed
    /// login count reaches the lockout threshold.
    pub fn is_ip_blocked(&self, ip: &str) -> bool {
        if self
            .blocked_ips
            .read()
            .expect("blocked_ips lock poisoned")
            .contains(ip)
        {
            return true;
        }

        let settings = self.settings();
        let cutoff = Self::now() - settings.lockout_duration as i64;

        let failed = self
            .failed_logins
            .read()
            .expect("failed_logins lock poisoned");
        match failed.get(ip) {
            Some(attempts) => {
                let recent = attempts.iter().filter(|t| **t > cutoff).count();
                recent >= settings.max_login_attempts as usize
            },
            None => false,
        }
    }

    /// When a lockout is in effect, the instant it ends
    pub fn block_expiry(&self, ip: &str) -> Option<DateTime<Utc>> {
        let settings = self.settings();
        let failed = self
            .failed_logins
            .read()
            .expect("failed_logins lock poisoned");
        failed
            .get(ip)
            .and_then(|attempts| attempts.iter().max().copied())
            .and_then(|last| Utc.timestamp_opt(last + settings.lockout_duration as i64, 0).single())
    }

    /// Record a failed login attempt and prune entries past the lockout window
    pub fn record_failed_login(&self, ip: &str) {
        let cutoff = Self::now() - self.settings().lockout_duration as i64;
        let mut failed = self
            .failed_logins
            .write()
            .expect("failed_logins lock poisoned");
        let attempts = failed.entry(ip.to_string()).or_default();
        attempts.push(Self::now());
        attempts.retain(|t| *t > cutoff);
    }

    /// Clear failed attempts after a successful login
    pub fn clear_failed_attempts(&self, ip: &str) {
        self.failed_logins
            .write()
            .expect("failed_logins lock poisoned")
            .remove(ip);
    }

    /// Manually block an IP
    pub fn block_ip(&self, ip: &str) {
        self.blocked_ips
            .write()
            .expect("blocked_ips lock poisoned")
            .insert(ip.to_string());
        warn!("IP address blocked: {}", ip);
    }

    /// Remove a manual block and clear its failed-login history
    pub fn unblock_ip(&self, ip: &str) -> bool {
        let removed = self
            .blocked_ips
            .write()
            .expect("blocked_ips lock poisoned")
            .remove(ip);
        self.clear_failed_attempts(ip);
        if removed {
            info!("IP address unblocked: {}", ip);
        }
        removed
    }

    /// Blocked IPs with their failed-attempt history
    pub fn blocked_ip_details(&self) -> Vec<BlockedIpDetails> {
        let day_ago = Self::now() - 86400;
        let blocked = self.blocked_ips.read().expect("blocked_ips lock poisoned");
        let failed = self
            .failed_logins
            .read()
            .expect("failed_logins lock poisoned");

        blocked
            .iter()
            .map(|ip| {
                let attempts = failed.get(ip).cloned().unwrap_or_default();
                BlockedIpDetails {
                    ip_address: ip.clone(),
                    failed_attempts_24h: attempts.iter().filter(|t| **t > day_ago).count(),
                    total_failed_attempts: attempts.len(),
                    last_attempt: attempts
                        .iter()
                        .max()
                        .and_then(|t| Utc.timestamp_opt(*t, 0).single()),
                }
            })
            .collect()
    }

    /// Failed-attempt counts per IP within the last week, most active first
    pub fn top_failing_ips(&self, limit: usize) -> Vec<(String, usize)> {
        let week_ago = Self::now() - 604800;
        let failed = self
            .failed_logins
            .read()
            .expect("failed_logins lock poisoned");

        let mut counts: Vec<(String, usize)> = failed
            .iter()
            .map(|(ip, attempts)| {
                (
                    ip.clone(),
                    attempts.iter().filter(|t| **t > week_ago).count(),
                )
            })
            .filter(|(_, count)| *count > 0)
            .collect();

        counts.sort_by(|a, b| b.1.cmp(&a.1));
        counts.truncate(limit);
        counts
    }

    pub fn blocked_ip_count(&self) -> usize {
        self.blocked_ips
            .read()
            .expect("blocked_ips lock poisoned")
            .len()
    }

    // =========================================================================
    // RATE LIMITING
    // =========================================================================

    /// Sliding-window rate limit check. Prunes timestamps outside the window,
    /// then either records the request or rejects it.
    pub fn check_rate_limit(&self, ip: &str) -> RateLimitResult {
        let settings = self.settings();
        let now = Self::now();
        let cutoff = now - settings.rate_limit_window as i64;

        let mut limits = self.rate_limits.write().expect("rate_limits lock poisoned");
        let timestamps = limits.entry(ip.to_string()).or_default();
        timestamps.retain(|t| *t > cutoff);

        if timestamps.len() >= settings.rate_limit_requests as usize {
            let oldest = timestamps.iter().min().copied().unwrap_or(now);
            let retry_after = (oldest + settings.rate_limit_window as i64 - now).max(1) as u64;
            return RateLimitResult {
                allowed: false,
                remaining: 0,
                retry_after: Some(retry_after),
            };
        }

        timestamps.push(now);
        RateLimitResult {
            allowed: true,
            remaining: settings.rate_limit_requests - timestamps.len() as u32,
            retry_after: None,
        }
    }

    // =========================================================================
    // CSRF SESSIONS
    // =========================================================================

    /// Create a CSRF session, returning (session_id, token)
    pub fn create_csrf_session(&self) -> (String, String) {
        let session_id = uuid::Uuid::new_v4().to_string();
        let token = random_hex_token();
        self.csrf_sessions
            .write()
            .expect("csrf_sessions lock poisoned")
            .insert(session_id.clone(), token.clone());
        (session_id, token)
    }

    /// Constant-time comparison of a presented token against the session's
    pub fn validate_csrf(&self, session_id: &str, token: &str) -> bool {
        let sessions = self
            .csrf_sessions
            .read()
            .expect("csrf_sessions lock poisoned");
        match sessions.get(session_id) {
            Some(stored) => stored.as_bytes().ct_eq(token.as_bytes()).into(),
            None => false,
        }
    }

    /// Drop a CSRF session at logout
    pub fn drop_csrf_session(&self, session_id: &str) {
        self.csrf_sessions
            .write()
            .expect("csrf_sessions lock poisoned")
            .remove(session_id);
    }
}

/// 32 random bytes as lowercase hex
fn random_hex_token() -> String {
    let mut bytes = [0u8; 32];
    rand::rngs::OsRng.fill_bytes(&mut bytes);
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manager_with(settings: SecuritySettings) -> SecurityManager {
        SecurityManager::new(settings)
    }

    #[test]
    fn test_rate_limit_allows_under_limit() {
        let manager = manager_with(SecuritySettings {
            rate_limit_requests: 3,
            ..Default::default()
        });

        for expected_remaining in [2, 1, 0] {
            let result = manager.check_rate_limit("203.0.113.1");
            assert!(result.allowed);
            assert_eq!(result.remaining, expected_remaining);
        }

        let result = manager.check_rate_limit("203.0.113.1");
        assert!(!result.allowed);
        assert!(result.retry_after.is_some());
    }

    #[test]
    fn test_rate_limit_is_per_ip() {
        let manager = manager_with(SecuritySettings {
            rate_limit_requests: 1,
            ..Default::default()
        });

        assert!(manager.check_rate_limit("203.0.113.1").allowed);
        assert!(!manager.check_rate_limit("203.0.113.1").allowed);
        assert!(manager.check_rate_limit("203.0.113.2").allowed);
    }

    #[test]
    fn test_failed_login_lockout() {
        let manager = manager_with(SecuritySettings {
            max_login_attempts: 3,
            ..Default::default()
        });

        let ip = "198.51.100.7";
        assert!(!manager.is_ip_blocked(ip));

        for _ in 0..3 {
            manager.record_failed_login(ip);
        }
        assert!(manager.is_ip_blocked(ip));
        assert!(manager.block_expiry(ip).is_some());

        manager.clear_failed_attempts(ip);
        assert!(!manager.is_ip_blocked(ip));
    }

    #[test]
    fn test_manual_block_and_unblock() {
        let manager = manager_with(SecuritySettings::default());
        let ip = "198.51.100.9";

        manager.block_ip(ip);
        assert!(manager.is_ip_blocked(ip));
        assert_eq!(manager.blocked_ip_count(), 1);

        let details = manager.blocked_ip_details();
        assert_eq!(details.len(), 1);
        assert_eq!(details[0].ip_address, ip);

        assert!(manager.unblock_ip(ip));
        assert!(!manager.is_ip_blocked(ip));
        assert!(!manager.unblock_ip(ip));
    }

    #[test]
    fn test_csrf_session_lifecycle() {
        let manager = manager_with(SecuritySettings::default());

        let (session_id, token) = manager.create_csrf_session();
        assert_eq!(token.len(), 64);

        assert!(manager.validate_csrf(&session_id, &token));
        assert!(!manager.validate_csrf(&session_id, "wrong-token"));
        assert!(!manager.validate_csrf("unknown-session", &token));

        manager.drop_csrf_session(&session_id);
        assert!(!manager.validate_csrf(&session_id, &token));
    }

    #[test]
    fn test_settings_update() {
        let manager = manager_with(SecuritySettings::default());
        let mut settings = manager.settings();
        settings.rate_limit_requests = 2;
        manager.update_settings(settings);
        assert_eq!(manager.settings().rate_limit_requests, 2);
    }

    #[test]
    fn test_top_failing_ips_sorted() {
        let manager = manager_with(SecuritySettings {
            max_login_attempts: 100,
            ..Default::default()
        });

        manager.record_failed_login("10.0.0.1");
        for _ in 0..3 {
            manager.record_failed_login("10.0.0.2");
        }

        let top = manager.top_failing_ips(10);
        assert_eq!(top[0].0, "10.0.0.2");
        assert_eq!(top[0].1, 3);
        assert_eq!(top[1].0, "10.0.0.1");
    }
}
