//! Walking paginated list endpoints.
//!
//! List endpoints answer with a page of items plus `hasMore`, and either a
//! `cursor` or an `offset` for the next request. [`PageOptions`] caps how
//! much is collected; [`PageProgress`] is reported after every page.

use chrono::{TimeZone, Utc};
use gauge_core::{parse_date, ErrorKind, GaugeError, GaugeResult, Timestamp};
use serde_json::Value;
use std::cmp::Reverse;

/// Most records collected by one walk unless configured otherwise.
pub const DEFAULT_MAX_RECORDS: usize = 10_000;

/// Items requested per page unless configured otherwise.
pub const DEFAULT_PAGE_SIZE: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageOptions {
    /// Stop once this many items are collected; extras are dropped.
    pub max_records: usize,
    pub page_size: usize,
}

impl Default for PageOptions {
    fn default() -> Self {
        Self {
            max_records: DEFAULT_MAX_RECORDS,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

impl PageOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_records(mut self, max_records: usize) -> Self {
        self.max_records = max_records;
        self
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// `limit` to send with the next request, given how many items are
    /// already collected.
    pub(crate) fn limit_for(&self, fetched: usize) -> usize {
        self.page_size
            .max(1)
            .min(self.max_records.saturating_sub(fetched))
    }
}

/// Progress after a page has been collected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageProgress {
    /// 1-based number of the page just fetched.
    pub page: usize,
    /// Items collected so far, across all pages.
    pub fetched: usize,
    /// Total reported by the server, if any.
    pub total: Option<u64>,
}

impl PageProgress {
    pub fn message(&self) -> String {
        format!("Fetching page {}...", self.page)
    }
}

/// Where the next page starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum PageCursor {
    Start,
    Cursor(String),
    Offset(usize),
}

/// One decoded page of a list response.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Page {
    pub items: Vec<Value>,
    pub has_more: bool,
    pub cursor: Option<String>,
    pub offset: Option<usize>,
    pub total: Option<u64>,
}

impl Page {
    /// Decode a page whose items live under `items_field`. A missing or
    /// null field is an empty page.
    pub fn from_wire(value: &Value, items_field: &str) -> GaugeResult<Self> {
        let items = match value.get(items_field) {
            Some(Value::Array(items)) => items.clone(),
            Some(Value::Null) | None => Vec::new(),
            Some(other) => {
                return Err(GaugeError::operation(
                    ErrorKind::Serialization,
                    format!("expected {} array, got {}", items_field, other),
                ))
            }
        };

        Ok(Self {
            items,
            has_more: value.get("hasMore").and_then(Value::as_bool).unwrap_or(false),
            cursor: value
                .get("cursor")
                .and_then(Value::as_str)
                .filter(|c| !c.is_empty())
                .map(str::to_string),
            offset: value
                .get("offset")
                .and_then(Value::as_u64)
                .map(|o| o as usize),
            total: value.get("total").and_then(Value::as_u64),
        })
    }

    /// Position of the page after this one. A cursor wins over an offset;
    /// with neither, `fallback` (the number of items collected) is used.
    pub fn next_cursor(&self, fallback: usize) -> PageCursor {
        match (&self.cursor, self.offset) {
            (Some(cursor), _) => PageCursor::Cursor(cursor.clone()),
            (None, Some(offset)) => PageCursor::Offset(offset + self.items.len()),
            (None, None) => PageCursor::Offset(fallback),
        }
    }
}

fn item_timestamp(item: &Value) -> Option<Timestamp> {
    match item.get("timestamp")? {
        Value::String(s) => parse_date(s).ok(),
        Value::Number(n) => n
            .as_i64()
            .and_then(|ms| Utc.timestamp_millis_opt(ms).single()),
        _ => None,
    }
}

/// Sort newest first by each item's `timestamp`, when the first item has
/// one. Items without a usable timestamp sink to the end.
pub fn sort_newest_first(items: &mut [Value]) {
    if items.first().and_then(|i| i.get("timestamp")).is_none() {
        return;
    }
    items.sort_by_key(|item| Reverse(item_timestamp(item)));
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_page_from_wire() {
        let page = Page::from_wire(
            &json!({"logs": [{"id": 1}], "hasMore": true, "cursor": "c2", "total": 40}),
            "logs",
        )
        .unwrap();
        assert_eq!(page.items.len(), 1);
        assert!(page.has_more);
        assert_eq!(page.next_cursor(0), PageCursor::Cursor("c2".to_string()));
        assert_eq!(page.total, Some(40));

        let empty = Page::from_wire(&json!({}), "logs").unwrap();
        assert!(empty.items.is_empty());
        assert!(!empty.has_more);

        assert!(Page::from_wire(&json!({"logs": "nope"}), "logs").is_err());
    }

    #[test]
    fn test_next_cursor_prefers_cursor_then_offset() {
        let page = Page::from_wire(
            &json!({"brokers": [1, 2, 3], "hasMore": true, "offset": 10}),
            "brokers",
        )
        .unwrap();
        assert_eq!(page.next_cursor(99), PageCursor::Offset(13));

        let bare = Page::from_wire(&json!({"brokers": [1], "hasMore": true}), "brokers").unwrap();
        assert_eq!(bare.next_cursor(99), PageCursor::Offset(99));
    }

    #[test]
    fn test_limit_shrinks_near_cap() {
        let options = PageOptions::new().with_max_records(250).with_page_size(100);
        assert_eq!(options.limit_for(0), 100);
        assert_eq!(options.limit_for(200), 50);
        assert_eq!(options.limit_for(250), 0);
        assert_eq!(options.limit_for(300), 0);
    }

    #[test]
    fn test_sort_newest_first() {
        let mut items = vec![
            json!({"id": "old", "timestamp": "2024-01-01T00:00:00Z"}),
            json!({"id": "none"}),
            json!({"id": "new", "timestamp": "2024-03-01T00:00:00Z"}),
            json!({"id": "mid", "timestamp": 1_706_745_600_000_i64}),
        ];
        sort_newest_first(&mut items);
        let ids: Vec<_> = items.iter().map(|i| i["id"].as_str().unwrap()).collect();
        assert_eq!(ids, vec!["new", "mid", "old", "none"]);

        let mut untimed = vec![json!({"id": "b"}), json!({"id": "a"})];
        sort_newest_first(&mut untimed);
        assert_eq!(untimed[0]["id"], "b");
    }
}
