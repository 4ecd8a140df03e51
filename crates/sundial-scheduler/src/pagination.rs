//! Cursor pagination for the history query.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

/// Default number of records per page.
pub const DEFAULT_LIMIT: usize = 10;

/// Maximum number of records per page.
pub const MAX_LIMIT: usize = 100;

const DEFAULT_SORT: &str = "id";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PageError {
    #[error("url cannot be empty")]
    MissingUrl,
}

/// Request for one page of history.
///
/// The cursor fields hold record ids. `starting_after` pages forward from a
/// record; `ending_before` pages backward.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PageRequest {
    /// URL the request arrived on; page links are built from its path.
    #[serde(skip)]
    pub url: Option<Url>,
    pub sort: String,
    pub limit: usize,
    pub starting_after: Option<i64>,
    pub ending_before: Option<i64>,
}

impl PageRequest {
    pub fn new(url: Url) -> Self {
        Self {
            url: Some(url),
            ..Self::default()
        }
    }

    pub fn with_url(mut self, url: Url) -> Self {
        self.url = Some(url);
        self
    }

    /// Check the request and fill in defaults.
    pub fn validate(&mut self) -> Result<(), PageError> {
        if self.url.is_none() {
            return Err(PageError::MissingUrl);
        }
        if self.sort.trim().is_empty() {
            self.sort = DEFAULT_SORT.to_string();
        }
        if self.limit == 0 {
            self.limit = DEFAULT_LIMIT;
        }
        self.limit = self.limit.min(MAX_LIMIT);
        Ok(())
    }

    /// Query parameters in key order. Unset values are omitted.
    pub fn query_params(&self) -> Vec<(&'static str, String)> {
        let mut params = Vec::new();
        if let Some(cursor) = self.ending_before {
            params.push(("ending_before", cursor.to_string()));
        }
        if self.limit > 0 {
            params.push(("limit", self.limit.to_string()));
        }
        if !self.sort.is_empty() {
            params.push(("sort", self.sort.clone()));
        }
        if let Some(cursor) = self.starting_after {
            params.push(("starting_after", cursor.to_string()));
        }
        params
    }

    /// Relative link (`path?query`) to this page on `base`.
    pub fn uri(&self, base: &Url) -> String {
        let mut url = base.clone();
        url.set_query(None);

        let params = self.query_params();
        if params.is_empty() {
            return url.path().to_string();
        }

        url.query_pairs_mut()
            .extend_pairs(params.iter().map(|(k, v)| (*k, v.as_str())));
        match url.query() {
            Some(query) => format!("{}?{}", url.path(), query),
            None => url.path().to_string(),
        }
    }
}

/// Pagination details of a returned page.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageResponse {
    pub sort: String,
    pub starting_after: Option<i64>,
    pub ending_before: Option<i64>,
    pub total: usize,
    pub yielded: usize,
    pub limit: usize,
    pub previous_uri: Option<String>,
    pub next_uri: Option<String>,
    /// Ids of the first and last record of the page.
    pub cursor_range: Vec<i64>,
}

impl PageResponse {
    pub fn has_prev_page(&self) -> bool {
        self.previous_uri.is_some()
    }

    pub fn has_next_page(&self) -> bool {
        self.next_uri.is_some()
    }

    /// Cursor to use as `ending_before` for the previous page.
    pub fn prev_page_cursor(&self) -> Option<i64> {
        self.cursor_range.first().copied()
    }

    /// Cursor to use as `starting_after` for the next page.
    pub fn next_page_cursor(&self) -> Option<i64> {
        if self.cursor_range.len() < 2 {
            return None;
        }
        self.cursor_range.last().copied()
    }

    pub fn prev_page_request(&self) -> PageRequest {
        PageRequest {
            url: None,
            sort: self.sort.clone(),
            limit: self.limit,
            starting_after: None,
            ending_before: self.prev_page_cursor(),
        }
    }

    pub fn next_page_request(&self) -> PageRequest {
        PageRequest {
            url: None,
            sort: self.sort.clone(),
            limit: self.limit,
            starting_after: self.next_page_cursor(),
            ending_before: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Url {
        Url::parse("http://localhost:9001/histories?sort=name&limit=5").unwrap()
    }

    #[test]
    fn test_validate_requires_url() {
        let mut req = PageRequest::default();
        assert_eq!(req.validate(), Err(PageError::MissingUrl));
    }

    #[test]
    fn test_validate_fills_defaults_and_caps_limit() {
        let mut req = PageRequest::new(base());
        req.validate().unwrap();
        assert_eq!(req.sort, "id");
        assert_eq!(req.limit, DEFAULT_LIMIT);

        let mut req = PageRequest {
            limit: 5000,
            ..PageRequest::new(base())
        };
        req.validate().unwrap();
        assert_eq!(req.limit, MAX_LIMIT);
    }

    #[test]
    fn test_uri_replaces_query() {
        let req = PageRequest {
            sort: "id:desc".to_string(),
            limit: 10,
            starting_after: Some(42),
            ..PageRequest::default()
        };
        assert_eq!(
            req.uri(&base()),
            "/histories?limit=10&sort=id%3Adesc&starting_after=42"
        );
    }

    #[test]
    fn test_cursors_come_from_range() {
        let resp = PageResponse {
            sort: "id".to_string(),
            limit: 2,
            cursor_range: vec![11, 12],
            ..PageResponse::default()
        };

        assert_eq!(resp.prev_page_request().ending_before, Some(11));
        assert_eq!(resp.next_page_request().starting_after, Some(12));
        assert!(!resp.has_next_page());

        let empty = PageResponse::default();
        assert_eq!(empty.prev_page_cursor(), None);
        assert_eq!(empty.next_page_cursor(), None);
    }

    #[test]
    fn test_deserializes_from_query_shape() {
        let req: PageRequest =
            serde_json::from_value(serde_json::json!({"limit": 3, "ending_before": 9})).unwrap();
        assert_eq!(req.limit, 3);
        assert_eq!(req.ending_before, Some(9));
        assert!(req.sort.is_empty());
        assert!(req.url.is_none());
    }
}
