// Shortened link model and request/response DTOs

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel_async::{AsyncPgConnection, RunQueryDsl};
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::schema::links;

lazy_static! {
    pub static ref CUSTOM_ALIAS_REGEX: Regex = Regex::new(r"^[a-zA-Z0-9][a-zA-Z0-9_-]*$").unwrap();
}

// =============================================================================
// DATABASE MODELS
// =============================================================================

/// Link model representing a database record
#[derive(Debug, Clone, Queryable, Selectable, Identifiable, Serialize, Deserialize)]
#[diesel(table_name = links)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Link {
    pub id: Uuid,
    pub original_url: String,
    pub short_code: String,
    pub custom_alias: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub click_count: i32,
    pub is_active: bool,
    pub expires_at: Option<DateTime<Utc>>,
    pub user_id: Option<Uuid>,
    pub last_accessed_at: Option<DateTime<Utc>>,
    pub deleted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// New link for insertion
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = links)]
pub struct NewLink {
    pub original_url: String,
    pub short_code: String,
    pub custom_alias: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
    pub user_id: Option<Uuid>,
}

/// Update link fields
#[derive(Debug, Clone, Default, AsChangeset)]
#[diesel(table_name = links)]
pub struct UpdateLink {
    pub original_url: Option<String>,
    pub title: Option<Option<String>>,
    pub description: Option<Option<String>>,
    pub expires_at: Option<Option<DateTime<Utc>>>,
    pub is_active: Option<bool>,
    pub deleted_at: Option<Option<DateTime<Utc>>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Link {
    /// Whether the link has passed its expiry timestamp
    pub fn is_expired(&self) -> bool {
        match self.expires_at {
            Some(expires_at) => Utc::now() > expires_at,
            None => false,
        }
    }

    pub async fn find_by_id(
        conn: &mut AsyncPgConnection,
        link_id: Uuid,
    ) -> Result<Option<Self>, diesel::result::Error> {
        links::table
            .filter(links::id.eq(link_id))
            .first::<Link>(conn)
            .await
            .optional()
    }

    /// Resolve a short code to an active, non-deleted link
    pub async fn find_active_by_code(
        conn: &mut AsyncPgConnection,
        code: &str,
    ) -> Result<Option<Self>, diesel::result::Error> {
        links::table
            .filter(links::short_code.eq(code))
            .filter(links::is_active.eq(true))
            .filter(links::deleted_at.is_null())
            .first::<Link>(conn)
            .await
            .optional()
    }

    pub async fn code_exists(
        conn: &mut AsyncPgConnection,
        code: &str,
    ) -> Result<bool, diesel::result::Error> {
        let count: i64 = links::table
            .filter(links::short_code.eq(code))
            .count()
            .get_result(conn)
            .await?;
        Ok(count > 0)
    }
}

// =============================================================================
// REQUEST/RESPONSE DTOs
// =============================================================================

/// Request to create a new short link
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateLinkRequest {
    #[validate(length(min = 1, max = 8192, message = "URL must be 1-8192 characters"))]
    pub url: String,

    #[validate(length(min = 3, max = 50, message = "Custom alias must be 3-50 characters"))]
    #[validate(regex(
        path = "CUSTOM_ALIAS_REGEX",
        message = "Custom alias can only contain letters, numbers, hyphens, and underscores"
    ))]
    pub custom_alias: Option<String>,

    #[validate(length(max = 200, message = "Title must be less than 200 characters"))]
    pub title: Option<String>,

    #[validate(length(max = 2000, message = "Description must be less than 2000 characters"))]
    pub description: Option<String>,

    pub expires_at: Option<DateTime<Utc>>,
}

impl CreateLinkRequest {
    /// Trim and sanitize input fields
    pub fn sanitize(&mut self) {
        self.url = self.url.trim().to_string();
        self.custom_alias = self.custom_alias.as_ref().map(|s| s.trim().to_string());
        self.title = self.title.as_ref().map(|s| s.trim().to_string());
        self.description = self.description.as_ref().map(|s| s.trim().to_string());
    }
}

/// Request to update an existing link
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct UpdateLinkRequest {
    #[validate(length(min = 1, max = 8192, message = "URL must be 1-8192 characters"))]
    pub url: Option<String>,

    #[validate(length(max = 200, message = "Title must be less than 200 characters"))]
    pub title: Option<String>,

    #[validate(length(max = 2000, message = "Description must be less than 2000 characters"))]
    pub description: Option<String>,

    /// Outer None leaves expiry untouched; inner None clears it
    #[serde(default, deserialize_with = "double_option::deserialize")]
    pub expires_at: Option<Option<DateTime<Utc>>>,

    pub is_active: Option<bool>,
}

/// Distinguishes an absent JSON field (leave unchanged) from an explicit
/// null (clear the value)
mod double_option {
    use serde::{Deserialize, Deserializer};

    pub fn deserialize<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
    where
        T: Deserialize<'de>,
        D: Deserializer<'de>,
    {
        Deserialize::deserialize(deserializer).map(Some)
    }
}

/// Link response for the API
#[derive(Debug, Clone, Serialize)]
pub struct LinkResponse {
    pub id: Uuid,
    pub original_url: String,
    pub short_code: String,
    pub short_url: String,
    pub custom_alias: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub click_count: i32,
    pub is_active: bool,
    pub is_expired: bool,
    pub expires_at: Option<DateTime<Utc>>,
    pub user_id: Option<Uuid>,
    pub last_accessed_at: Option<DateTime<Utc>>,
    pub deleted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Link {
    pub fn to_response(&self, base_url: &str) -> LinkResponse {
        LinkResponse {
            id: self.id,
            original_url: self.original_url.clone(),
            short_code: self.short_code.clone(),
            short_url: format!("{}/{}", base_url.trim_end_matches('/'), self.short_code),
            custom_alias: self.custom_alias.clone(),
            title: self.title.clone(),
            description: self.description.clone(),
            click_count: self.click_count,
            is_active: self.is_active,
            is_expired: self.is_expired(),
            expires_at: self.expires_at,
            user_id: self.user_id,
            last_accessed_at: self.last_accessed_at,
            deleted_at: self.deleted_at,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_custom_alias_validation() {
        let valid_aliases = vec!["abc123", "test-link", "my_link", "Link2024"];

        for alias in valid_aliases {
            assert!(CUSTOM_ALIAS_REGEX.is_match(alias), "Failed for: {}", alias);
        }

        let invalid_aliases = vec![
            "-start-with-dash",
            "_start_with_underscore",
            "has space",
            "has@special",
            "",
        ];

        for alias in invalid_aliases {
            assert!(
                !CUSTOM_ALIAS_REGEX.is_match(alias),
                "Should fail for: {}",
                alias
            );
        }
    }

    #[test]
    fn test_create_request_sanitize() {
        let mut request = CreateLinkRequest {
            url: "  https://example.com  ".to_string(),
            custom_alias: Some(" my-alias ".to_string()),
            title: None,
            description: None,
            expires_at: None,
        };
        request.sanitize();
        assert_eq!(request.url, "https://example.com");
        assert_eq!(request.custom_alias.as_deref(), Some("my-alias"));
    }

    #[test]
    fn test_link_expiry() {
        let now = Utc::now();
        let link = Link {
            id: Uuid::new_v4(),
            original_url: "https://example.com".to_string(),
            short_code: "abc123".to_string(),
            custom_alias: None,
            title: None,
            description: None,
            click_count: 0,
            is_active: true,
            expires_at: Some(now - chrono::Duration::hours(1)),
            user_id: None,
            last_accessed_at: None,
            deleted_at: None,
            created_at: now,
            updated_at: now,
        };
        assert!(link.is_expired());

        let live = Link {
            expires_at: Some(now + chrono::Duration::hours(1)),
            ..link.clone()
        };
        assert!(!live.is_expired());

        let unbounded = Link {
            expires_at: None,
            ..link
        };
        assert!(!unbounded.is_expired());
    }

    #[test]
    fn test_to_response_builds_short_url() {
        let now = Utc::now();
        let link = Link {
            id: Uuid::new_v4(),
            original_url: "https://example.com".to_string(),
            short_code: "abc123".to_string(),
            custom_alias: None,
            title: None,
            description: None,
            click_count: 7,
            is_active: true,
            expires_at: None,
            user_id: None,
            last_accessed_at: None,
            deleted_at: None,
            created_at: now,
            updated_at: now,
        };

        let response = link.to_response("https://rfah.me/");
        assert_eq!(response.short_url, "https://rfah.me/abc123");
        assert_eq!(response.click_count, 7);
        assert!(!response.is_expired);
    }
}
