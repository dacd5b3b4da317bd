use serde::{Deserialize, Serialize};
use url::Url;

/// Pagination links embedded in list response bodies.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Links {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pages: Option<Pages>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pages {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prev: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last: Option<String>,
}

impl Links {
    /// Page number of the next page, if the server advertised one.
    pub fn next_page(&self) -> Option<u64> {
        self.pages.as_ref()?.next.as_deref().and_then(page_number)
    }

    /// Page number of the previous page, if any.
    pub fn prev_page(&self) -> Option<u64> {
        self.pages.as_ref()?.prev.as_deref().and_then(page_number)
    }

    /// True when the response was the last page of the result set.
    pub fn is_last_page(&self) -> bool {
        self.next_page().is_none()
    }
}

/// Collection totals reported alongside list responses.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Meta {
    #[serde(default)]
    pub total: u64,
}

fn page_number(raw: &str) -> Option<u64> {
    let url = Url::parse(raw).ok()?;
    url.query_pairs()
        .find(|(name, _)| name == "page")
        .and_then(|(_, value)| value.parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_page_numbers_from_urls() {
        let links: Links = serde_json::from_value(serde_json::json!({
            "pages": {
                "prev": "https://api.digitalocean.com/v2/tags?page=1&per_page=20",
                "next": "https://api.digitalocean.com/v2/tags?page=3&per_page=20"
            }
        }))
        .unwrap();
        assert_eq!(links.prev_page(), Some(1));
        assert_eq!(links.next_page(), Some(3));
        assert!(!links.is_last_page());
    }

    #[test]
    fn missing_next_means_last_page() {
        assert!(Links::default().is_last_page());
        let links: Links = serde_json::from_value(serde_json::json!({
            "pages": {"first": "https://api.digitalocean.com/v2/tags?page=1"}
        }))
        .unwrap();
        assert!(links.is_last_page());
    }

    #[test]
    fn meta_total_defaults_to_zero() {
        let meta: Meta = serde_json::from_str("{}").unwrap();
        assert_eq!(meta.total, 0);
    }
}
