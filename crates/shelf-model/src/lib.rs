//! Wire types shared by the shelf proxy and the wall client.

use serde::{Deserialize, Serialize};

pub use dates::{normalize_timestamp, parse_calendar_date, parse_timestamp};
pub use request::{DEFAULT_SHELF, is_valid_slug, is_valid_user_id};

/// One book on a shelf, as served by `GET /api/goodreads`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookRecord {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub author: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub read_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_added: Option<String>,
}

/// Successful proxy response body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShelfPage {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total: Option<usize>,
    pub shelf: String,
    pub user_id: String,
    pub items: Vec<BookRecord>,
    #[serde(default)]
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub has_more: Option<bool>,
}

/// Body of every non-2xx proxy response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

mod request {
    pub const DEFAULT_SHELF: &str = "read";

    /// `^\d+$`
    pub fn is_valid_user_id(value: &str) -> bool {
        !value.is_empty() && value.bytes().all(|b| b.is_ascii_digit())
    }

    /// `^[a-zA-Z0-9_-]+$`, used for shelf names and feed keys.
    pub fn is_valid_slug(value: &str) -> bool {
        !value.is_empty()
            && value
                .bytes()
                .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
    }
}

mod dates {
    use chrono::{DateTime, NaiveDate, NaiveDateTime};

    const DATE_TIME_FORMATS: &[&str] = &[
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%dT%H:%M:%S",
        "%Y/%m/%d %H:%M:%S",
    ];
    const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d"];

    /// Parses the timestamp shapes the feed produces: RFC 3339, RFC 2822 (raw
    /// Goodreads), or a naive date with an optional time. Offsets are dropped
    /// after conversion so the reader's local calendar date is kept.
    pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return None;
        }
        if let Ok(parsed) = DateTime::parse_from_rfc3339(trimmed) {
            return Some(parsed.naive_local());
        }
        if let Ok(parsed) = DateTime::parse_from_rfc2822(trimmed) {
            return Some(parsed.naive_local());
        }
        for format in DATE_TIME_FORMATS {
            if let Ok(parsed) = NaiveDateTime::parse_from_str(trimmed, format) {
                return Some(parsed);
            }
        }
        parse_date_prefix(trimmed).and_then(|date| date.and_hms_opt(0, 0, 0))
    }

    pub fn parse_calendar_date(raw: &str) -> Option<NaiveDate> {
        parse_timestamp(raw).map(|timestamp| timestamp.date())
    }

    /// Rewrites an upstream timestamp as RFC 3339. Blank input becomes `None`;
    /// input chrono cannot read is passed through trimmed.
    pub fn normalize_timestamp(raw: &str) -> Option<String> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return None;
        }
        if let Ok(parsed) = DateTime::parse_from_rfc2822(trimmed) {
            return Some(parsed.to_rfc3339());
        }
        Some(trimmed.to_string())
    }

    fn parse_date_prefix(value: &str) -> Option<NaiveDate> {
        for format in DATE_FORMATS {
            if let Ok(date) = NaiveDate::parse_from_str(value, format) {
                return Some(date);
            }
        }
        let prefix = value.get(..10)?;
        DATE_FORMATS
            .iter()
            .find_map(|format| NaiveDate::parse_from_str(prefix, format).ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Datelike;

    #[test]
    fn parses_goodreads_rfc2822_dates_in_local_calendar() {
        let date = parse_calendar_date("Tue, 31 Dec 2019 23:30:00 -0800").unwrap();
        assert_eq!((date.year(), date.month(), date.day()), (2019, 12, 31));
    }

    #[test]
    fn parses_iso_and_plain_dates() {
        assert_eq!(
            parse_calendar_date("2021-03-04T10:00:00+00:00").map(|d| d.year()),
            Some(2021)
        );
        assert_eq!(parse_calendar_date("2022-01-09").map(|d| d.year()), Some(2022));
        assert_eq!(parse_calendar_date("2018/07/01").map(|d| d.year()), Some(2018));
        assert_eq!(
            parse_calendar_date("2020-05-05 garbage").map(|d| d.year()),
            Some(2020)
        );
    }

    #[test]
    fn rejects_blank_and_garbage_dates() {
        assert!(parse_calendar_date("").is_none());
        assert!(parse_calendar_date("   ").is_none());
        assert!(parse_calendar_date("someday").is_none());
    }

    #[test]
    fn normalizes_rfc2822_to_rfc3339() {
        assert_eq!(
            normalize_timestamp(" Sat, 15 Jun 2024 08:00:00 -0700 ").as_deref(),
            Some("2024-06-15T08:00:00-07:00")
        );
        assert_eq!(normalize_timestamp("  "), None);
        assert_eq!(
            normalize_timestamp("2024-06-15").as_deref(),
            Some("2024-06-15")
        );
    }

    #[test]
    fn validates_request_fields() {
        assert!(is_valid_user_id("12345"));
        assert!(!is_valid_user_id(""));
        assert!(!is_valid_user_id("12a"));
        assert!(!is_valid_user_id("-1"));
        assert!(is_valid_slug("to-read"));
        assert!(is_valid_slug("currently_reading2"));
        assert!(!is_valid_slug("to read"));
        assert!(!is_valid_slug("../etc"));
        assert!(!is_valid_slug(""));
    }

    #[test]
    fn shelf_page_uses_camel_case_on_the_wire() {
        let page = ShelfPage {
            total: None,
            shelf: "read".into(),
            user_id: "42".into(),
            items: vec![BookRecord {
                id: "1".into(),
                title: "Dune".into(),
                author: "Frank Herbert".into(),
                image_url: None,
                read_at: Some("2021-01-01T00:00:00+00:00".into()),
                date_added: None,
            }],
            title: "shelf".into(),
            page: Some(2),
            has_more: Some(true),
        };
        let json = serde_json::to_value(&page).unwrap();
        assert_eq!(json["userId"], "42");
        assert_eq!(json["hasMore"], true);
        assert!(json.get("total").is_none());
        assert!(json["items"][0].get("image_url").is_none());
        let back: ShelfPage = serde_json::from_value(json).unwrap();
        assert_eq!(back, page);
    }
}
