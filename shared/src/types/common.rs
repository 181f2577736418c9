use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

pub type UserId = Uuid;
pub type ArtistId = Uuid;
pub type OrganizerId = Uuid;

/// Marketplace role of an account.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum UserType {
    Artist,
    Organizer,
}

impl UserType {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserType::Artist => "artist",
            UserType::Organizer => "organizer",
        }
    }
}

impl FromStr for UserType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "artist" => Ok(UserType::Artist),
            "organizer" => Ok(UserType::Organizer),
            other => Err(format!("Unknown user type: {}", other)),
        }
    }
}

impl std::fmt::Display for UserType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// A resolved page window.
///
/// Mirrors the classic paginator contract used by the listing pages: a page
/// that is not a number falls back to the first page, a page outside the
/// range falls back to the last one. An empty result set still has one page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub number: i64,
    pub size: i64,
    pub total_items: i64,
    pub total_pages: i64,
}

impl Page {
    pub fn resolve(requested: Option<&str>, total_items: i64, size: i64) -> Self {
        let size = size.max(1);
        let total_items = total_items.max(0);
        let total_pages = ((total_items + size - 1) / size).max(1);

        let number = match requested.map(str::trim).filter(|s| !s.is_empty()) {
            None => 1,
            Some(raw) => match raw.parse::<i64>() {
                Err(_) => 1,
                Ok(n) if n < 1 || n > total_pages => total_pages,
                Ok(n) => n,
            },
        };

        Self {
            number,
            size,
            total_items,
            total_pages,
        }
    }

    pub fn offset(&self) -> i64 {
        (self.number - 1) * self.size
    }

    pub fn limit(&self) -> i64 {
        self.size
    }

    pub fn has_next(&self) -> bool {
        self.number < self.total_pages
    }

    pub fn has_previous(&self) -> bool {
        self.number > 1
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PaginatedResponse<T> {
    pub items: Vec<T>,
    pub total: i64,
    pub page: i64,
    pub page_size: i64,
    pub total_pages: i64,
    pub has_more: bool,
}

impl<T> PaginatedResponse<T> {
    pub fn new(items: Vec<T>, page: Page) -> Self {
        Self {
            items,
            total: page.total_items,
            page: page.number,
            page_size: page.size,
            total_pages: page.total_pages,
            has_more: page.has_next(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_defaults_to_first() {
        let page = Page::resolve(None, 30, 12);
        assert_eq!(page.number, 1);
        assert_eq!(page.total_pages, 3);
        assert_eq!(page.offset(), 0);
    }

    #[test]
    fn test_non_numeric_page_falls_back_to_first() {
        assert_eq!(Page::resolve(Some("abc"), 30, 12).number, 1);
    }

    #[test]
    fn test_out_of_range_page_falls_back_to_last() {
        let page = Page::resolve(Some("99"), 30, 12);
        assert_eq!(page.number, 3);
        assert_eq!(page.offset(), 24);
        assert!(!page.has_next());
        assert_eq!(Page::resolve(Some("0"), 30, 12).number, 3);
    }

    #[test]
    fn test_empty_result_has_one_page() {
        let page = Page::resolve(Some("2"), 0, 12);
        assert_eq!(page.total_pages, 1);
        assert_eq!(page.number, 1);
        assert!(!page.has_previous());
    }

    #[test]
    fn test_user_type_round_trip() {
        assert_eq!("artist".parse::<UserType>().unwrap(), UserType::Artist);
        assert_eq!(UserType::Organizer.as_str(), "organizer");
        assert!("admin".parse::<UserType>().is_err());
    }
}
