// Click log model
// Browser, OS and device type are parsed from the User-Agent at insert time

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel_async::{AsyncPgConnection, RunQueryDsl};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use woothee::parser::Parser;

use crate::schema::click_logs;

#[derive(Debug, Clone, Queryable, Selectable, Identifiable, Serialize, Deserialize)]
#[diesel(table_name = click_logs)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct ClickLog {
    pub id: Uuid,
    pub link_id: Uuid,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub referrer: Option<String>,
    pub country: Option<String>,
    pub city: Option<String>,
    pub device_type: Option<String>,
    pub browser: Option<String>,
    pub os: Option<String>,
    pub clicked_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = click_logs)]
pub struct NewClickLog {
    pub link_id: Uuid,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub referrer: Option<String>,
    pub device_type: Option<String>,
    pub browser: Option<String>,
    pub os: Option<String>,
}

impl NewClickLog {
    /// Build a click log row, parsing device/browser/OS out of the User-Agent
    pub fn new(
        link_id: Uuid,
        ip_address: Option<String>,
        user_agent: Option<&str>,
        referrer: Option<String>,
    ) -> Self {
        let (device_type, browser, os) = match user_agent {
            Some(ua) => parse_user_agent(ua),
            None => (None, None, None),
        };

        Self {
            link_id,
            ip_address,
            user_agent: user_agent.map(|s| s.to_string()),
            referrer,
            device_type,
            browser,
            os,
        }
    }

    pub async fn insert(
        &self,
        conn: &mut AsyncPgConnection,
    ) -> Result<ClickLog, diesel::result::Error> {
        diesel::insert_into(click_logs::table)
            .values(self)
            .get_result::<ClickLog>(conn)
            .await
    }
}

/// Map a User-Agent string to (device_type, browser, os)
fn parse_user_agent(user_agent: &str) -> (Option<String>, Option<String>, Option<String>) {
    let parser = Parser::new();
    match parser.parse(user_agent) {
        Some(result) => {
            let device_type = match &*result.category {
                "pc" => "desktop",
                "smartphone" | "mobilephone" => "mobile",
                "tablet" => "tablet",
                "crawler" => "bot",
                _ => "other",
            };

            let browser = if result.version.is_empty() || result.version == "UNKNOWN" {
                result.name.to_string()
            } else {
                format!("{} {}", result.name, result.version)
            };

            (
                Some(device_type.to_string()),
                Some(browser),
                Some(result.os.to_string()),
            )
        },
        None => (
            Some("unknown".to_string()),
            Some("Unknown".to_string()),
            Some("Unknown".to_string()),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CHROME_DESKTOP: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
        AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";
    const IPHONE_SAFARI: &str = "Mozilla/5.0 (iPhone; CPU iPhone OS 17_0 like Mac OS X) \
        AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.0 Mobile/15E148 Safari/604.1";
    const GOOGLEBOT: &str =
        "Mozilla/5.0 (compatible; Googlebot/2.1; +http://www.google.com/bot.html)";

    #[test]
    fn test_parse_desktop_user_agent() {
        let (device, browser, os) = parse_user_agent(CHROME_DESKTOP);
        assert_eq!(device.as_deref(), Some("desktop"));
        assert!(browser.unwrap().starts_with("Chrome"));
        assert!(os.is_some());
    }

    #[test]
    fn test_parse_mobile_user_agent() {
        let (device, _, _) = parse_user_agent(IPHONE_SAFARI);
        assert_eq!(device.as_deref(), Some("mobile"));
    }

    #[test]
    fn test_parse_bot_user_agent() {
        let (device, _, _) = parse_user_agent(GOOGLEBOT);
        assert_eq!(device.as_deref(), Some("bot"));
    }

    #[test]
    fn test_garbage_user_agent_defaults() {
        let (device, browser, os) = parse_user_agent("\u{1}\u{2}garbage");
        assert!(device.is_some());
        assert!(browser.is_some());
        assert!(os.is_some());
    }

    #[test]
    fn test_new_click_log_without_user_agent() {
        let log = NewClickLog::new(Uuid::new_v4(), Some("203.0.113.1".to_string()), None, None);
        assert!(log.device_type.is_none());
        assert!(log.browser.is_none());
        assert!(log.os.is_none());
    }
}
