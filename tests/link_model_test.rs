// Link DTO validation and response shaping

use chrono::{Duration, Utc};
use uuid::Uuid;
use validator::Validate;

use rafah_backend::models::link::{CreateLinkRequest, Link, CUSTOM_ALIAS_REGEX};

fn sample_link() -> Link {
    let now = Utc::now();
    Link {
        id: Uuid::new_v4(),
        original_url: "https://example.com/landing".to_string(),
        short_code: "q3Xy9a".to_string(),
        custom_alias: None,
        title: Some("Landing".to_string()),
        description: None,
        click_count: 3,
        is_active: true,
        expires_at: None,
        user_id: Some(Uuid::new_v4()),
        last_accessed_at: None,
        deleted_at: None,
        created_at: now,
        updated_at: now,
    }
}

#[test]
fn test_create_request_validation() {
    let valid = CreateLinkRequest {
        url: "https://example.com".to_string(),
        custom_alias: Some("my-alias".to_string()),
        title: None,
        description: None,
        expires_at: None,
    };
    assert!(valid.validate().is_ok());

    let bad_alias = CreateLinkRequest {
        custom_alias: Some("-bad".to_string()),
        ..valid.clone()
    };
    assert!(bad_alias.validate().is_err());

    let alias_too_short = CreateLinkRequest {
        custom_alias: Some("ab".to_string()),
        ..valid
    };
    assert!(alias_too_short.validate().is_err());
}

#[test]
fn test_alias_charset() {
    for alias in ["abc", "a-b_c9", "Z123"] {
        assert!(CUSTOM_ALIAS_REGEX.is_match(alias), "expected match: {}", alias);
    }
    for alias in ["-abc", "_abc", "a b", "a/b", ""] {
        assert!(!CUSTOM_ALIAS_REGEX.is_match(alias), "expected reject: {}", alias);
    }
}

#[test]
fn test_expiry_logic() {
    let mut link = sample_link();
    assert!(!link.is_expired());

    link.expires_at = Some(Utc::now() - Duration::minutes(1));
    assert!(link.is_expired());

    link.expires_at = Some(Utc::now() + Duration::minutes(1));
    assert!(!link.is_expired());
}

#[test]
fn test_short_url_construction() {
    let link = sample_link();
    let response = link.to_response("https://rfah.me");
    assert_eq!(response.short_url, "https://rfah.me/q3Xy9a");

    // Trailing slash on the base URL does not double up
    let response = link.to_response("https://rfah.me/");
    assert_eq!(response.short_url, "https://rfah.me/q3Xy9a");
}
