use serde::{Deserialize, Serialize};

/// Category id that disables category filtering.
pub const ALL_CATEGORIES: &str = "all";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Category {
    pub id: &'static str,
    pub label: &'static str,
}

pub const CATEGORIES: &[Category] = &[
    Category { id: ALL_CATEGORIES, label: "Sve slike" },
    Category { id: "petar", label: "Petar spremanje" },
    Category { id: "marija", label: "Marija spremanje" },
    Category { id: "crkva", label: "Crkva" },
    Category { id: "photosession", label: "Photosession" },
    Category { id: "grupna", label: "Grupne slike" },
    Category { id: "party", label: "Party" },
];

/// The `category` / `search` pair carried in the gallery URL.
///
/// Absent, empty and `"all"` categories all mean "no category filter";
/// absent and empty searches mean "no search filter".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryParams {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search: Option<String>,
}

impl QueryParams {
    /// Parses `category=marija&search=veo` (a leading `?` is allowed).
    /// Unknown keys are ignored and the last occurrence of a key wins.
    pub fn parse(query: &str) -> Self {
        let mut params = Self::default();
        for pair in query.trim_start_matches('?').split('&') {
            if pair.is_empty() {
                continue;
            }
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            let value = decode_component(value);
            match key {
                "category" => params.category = Some(value),
                "search" => params.search = Some(value),
                _ => {}
            }
        }
        params
    }

    pub fn to_query_string(&self) -> String {
        let mut parts = Vec::new();
        if let Some(category) = self.active_category() {
            parts.push(format!("category={}", urlencoding::encode(category)));
        }
        if let Some(search) = self.active_search() {
            parts.push(format!("search={}", urlencoding::encode(search)));
        }
        parts.join("&")
    }

    pub fn active_category(&self) -> Option<&str> {
        self.category
            .as_deref()
            .filter(|c| !c.is_empty() && *c != ALL_CATEGORIES)
    }

    pub fn active_search(&self) -> Option<&str> {
        self.search.as_deref().filter(|s| !s.is_empty())
    }

    /// Switching category drops the search term.
    pub fn with_category(&self, category: &str) -> Self {
        Self {
            category: (category != ALL_CATEGORIES).then(|| category.to_string()),
            search: None,
        }
    }

    pub fn with_search(&self, term: &str) -> Self {
        let term = term.trim();
        Self {
            category: self.category.clone(),
            search: (!term.is_empty()).then(|| term.to_string()),
        }
    }

    /// Index into [`CATEGORIES`]; unknown categories map to `None`.
    pub fn category_index(&self) -> Option<usize> {
        let id = self.active_category().unwrap_or(ALL_CATEGORIES);
        CATEGORIES.iter().position(|c| c.id == id)
    }
}

fn decode_component(raw: &str) -> String {
    let spaced = raw.replace('+', " ");
    urlencoding::decode(&spaced)
        .map(|s| s.into_owned())
        .unwrap_or(spaced)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_and_serialize() {
        let q = QueryParams::parse("?category=marija&search=bijela%20haljina");
        assert_eq!(q.active_category(), Some("marija"));
        assert_eq!(q.active_search(), Some("bijela haljina"));
        assert_eq!(q.to_query_string(), "category=marija&search=bijela%20haljina");
    }

    #[test]
    fn test_plus_decodes_to_space() {
        assert_eq!(QueryParams::parse("search=a+b").active_search(), Some("a b"));
    }

    #[test]
    fn test_inactive_values() {
        let q = QueryParams::parse("category=all&search=&other=1");
        assert_eq!(q.active_category(), None);
        assert_eq!(q.active_search(), None);
        assert_eq!(q.to_query_string(), "");
        assert_eq!(q.category_index(), Some(0));
    }

    #[test]
    fn test_category_change_clears_search() {
        let q = QueryParams::parse("category=crkva&search=veo");
        let next = q.with_category("party");
        assert_eq!(next.active_category(), Some("party"));
        assert_eq!(next.search, None);
        assert_eq!(q.with_category(ALL_CATEGORIES).category, None);
    }

    #[test]
    fn test_search_is_trimmed() {
        let q = QueryParams::parse("category=crkva").with_search("  veo ");
        assert_eq!(q.active_search(), Some("veo"));
        assert_eq!(q.active_category(), Some("crkva"));
        assert_eq!(q.with_search("   ").search, None);
    }

    #[test]
    fn test_unknown_category_has_no_index() {
        assert_eq!(QueryParams::parse("category=nope").category_index(), None);
        assert_eq!(QueryParams::parse("category=party").category_index(), Some(6));
    }
}
