// SecurityManager behavior: rate limiting, lockout, blocklist and CSRF

use rafah_backend::app_config::SecuritySettings;
use rafah_backend::services::security::SecurityManager;

fn manager(settings: SecuritySettings) -> SecurityManager {
    SecurityManager::new(settings)
}

#[test]
fn test_sliding_window_rate_limit() {
    let manager = manager(SecuritySettings {
        rate_limit_requests: 5,
        ..Default::default()
    });

    for _ in 0..5 {
        assert!(manager.check_rate_limit("203.0.113.10").allowed);
    }

    let rejected = manager.check_rate_limit("203.0.113.10");
    assert!(!rejected.allowed);
    assert!(rejected.retry_after.unwrap_or(0) >= 1);

    // Another IP is unaffected
    assert!(manager.check_rate_limit("203.0.113.11").allowed);
}

#[test]
fn test_lockout_after_failed_logins() {
    let manager = manager(SecuritySettings {
        max_login_attempts: 2,
        ..Default::default()
    });

    let ip = "198.51.100.20";
    manager.record_failed_login(ip);
    assert!(!manager.is_ip_blocked(ip));

    manager.record_failed_login(ip);
    assert!(manager.is_ip_blocked(ip));

    // Lockout carries an expiry timestamp
    assert!(manager.block_expiry(ip).is_some());

    // A successful login clears the slate
    manager.clear_failed_attempts(ip);
    assert!(!manager.is_ip_blocked(ip));
    assert!(manager.block_expiry(ip).is_none());
}

#[test]
fn test_manual_blocklist() {
    let manager = manager(SecuritySettings::default());

    manager.block_ip("192.0.2.1");
    manager.block_ip("192.0.2.2");
    assert_eq!(manager.blocked_ip_count(), 2);
    assert!(manager.is_ip_blocked("192.0.2.1"));

    let details = manager.blocked_ip_details();
    assert_eq!(details.len(), 2);

    assert!(manager.unblock_ip("192.0.2.1"));
    assert!(!manager.is_ip_blocked("192.0.2.1"));
    assert_eq!(manager.blocked_ip_count(), 1);
}

#[test]
fn test_csrf_tokens_are_per_session() {
    let manager = manager(SecuritySettings::default());

    let (session_a, token_a) = manager.create_csrf_session();
    let (session_b, token_b) = manager.create_csrf_session();

    assert_ne!(token_a, token_b);
    assert!(manager.validate_csrf(&session_a, &token_a));
    assert!(manager.validate_csrf(&session_b, &token_b));

    // Tokens are not interchangeable across sessions
    assert!(!manager.validate_csrf(&session_a, &token_b));
    assert!(!manager.validate_csrf(&session_b, &token_a));
}

#[test]
fn test_runtime_settings_take_effect() {
    let manager = manager(SecuritySettings {
        rate_limit_requests: 100,
        ..Default::default()
    });

    let ip = "198.51.100.99";
    assert!(manager.check_rate_limit(ip).allowed);

    // Tighten the limit below what the IP already used
    let mut settings = manager.settings();
    settings.rate_limit_requests = 1;
    manager.update_settings(settings);

    assert!(!manager.check_rate_limit(ip).allowed);
}
