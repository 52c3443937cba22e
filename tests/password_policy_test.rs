// Password hashing and strength policy tests

use rafah_backend::app_config::SecuritySettings;
use rafah_backend::utils::password::{
    hash_password_with_config, validate_password_strength, verify_password, PasswordConfig,
};

fn fast_config() -> PasswordConfig {
    PasswordConfig {
        memory_cost: 4096,
        time_cost: 1,
        parallelism: 1,
        output_length: 32,
    }
}

#[test]
fn test_hash_roundtrip() {
    let hash = hash_password_with_config("S3cure!Password", &fast_config()).expect("hash failed");

    assert!(hash.starts_with("$argon2id$"));
    assert!(verify_password("S3cure!Password", &hash).expect("verify failed"));
    assert!(!verify_password("different", &hash).expect("verify failed"));
}

#[test]
fn test_policy_accepts_strong_password() {
    let settings = SecuritySettings::default();
    assert!(validate_password_strength("Tr1cky!Pass", &settings).is_ok());
}

#[test]
fn test_policy_rejects_short_password() {
    let settings = SecuritySettings::default();
    let err = validate_password_strength("Ab1!", &settings).unwrap_err();
    assert!(err.contains("at least 8"));
}

#[test]
fn test_policy_lists_missing_classes() {
    let settings = SecuritySettings::default();

    let err = validate_password_strength("lowercase1!", &settings).unwrap_err();
    assert!(err.contains("uppercase"));

    let err = validate_password_strength("UPPERCASE1!", &settings).unwrap_err();
    assert!(err.contains("lowercase"));

    let err = validate_password_strength("NoDigits!!", &settings).unwrap_err();
    assert!(err.contains("digits"));

    let err = validate_password_strength("NoSpecial1", &settings).unwrap_err();
    assert!(err.contains("special"));
}

#[test]
fn test_policy_relaxed_mode_only_checks_length() {
    let settings = SecuritySettings {
        require_strong_password: false,
        ..Default::default()
    };
    assert!(validate_password_strength("justlowercase", &settings).is_ok());
    assert!(validate_password_strength("short", &settings).is_err());
}

#[test]
fn test_policy_respects_configured_min_length() {
    let settings = SecuritySettings {
        password_min_length: 12,
        ..Default::default()
    };
    let err = validate_password_strength("Sh0rt!Pass", &settings).unwrap_err();
    assert!(err.contains("at least 12"));
}
