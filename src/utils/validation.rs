// Small input validation helpers shared by handlers

/// Trim a required field and reject when empty after trimming
pub fn trim_and_validate_field(value: &str, field: &str) -> Result<String, String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(format!("Field '{}' is required", field));
    }
    Ok(trimmed.to_string())
}

/// Trim an optional field, mapping empty strings to None
pub fn trim_optional_field(value: Option<&str>) -> Option<String> {
    value
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
        .map(|v| v.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trim_and_validate_field() {
        assert_eq!(
            trim_and_validate_field("  hello ", "name").unwrap(),
            "hello"
        );
        assert!(trim_and_validate_field("   ", "name").is_err());
    }

    #[test]
    fn test_trim_optional_field() {
        assert_eq!(trim_optional_field(Some(" x ")), Some("x".to_string()));
        assert_eq!(trim_optional_field(Some("  ")), None);
        assert_eq!(trim_optional_field(None), None);
    }
}
