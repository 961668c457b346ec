use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::future::Future;
use thiserror::Error;

use crate::config::ConfigError;

/// Largest page the listing endpoint will return.
pub const MAX_PAGE_SIZE: u32 = 500;

/// Sort key for ids without a numeric prefix; sorts after every numbered id.
pub const UNNUMBERED: u64 = u64::MAX;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageRecord {
    pub id: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alt: Option<String>,
    #[serde(default)]
    pub width: u32,
    #[serde(default)]
    pub height: u32,
}

impl ImageRecord {
    #[cfg(test)]
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            tags: Vec::new(),
            category: None,
            alt: None,
            width: 0,
            height: 0,
        }
    }

    /// "001_foo" -> 1, "foo" -> [`UNNUMBERED`].
    pub fn display_order_key(&self) -> u64 {
        let digits: &str = {
            let end = self
                .id
                .find(|c: char| !c.is_ascii_digit())
                .unwrap_or(self.id.len());
            &self.id[..end]
        };

        if digits.is_empty() {
            return UNNUMBERED;
        }

        digits
            .parse::<u64>()
            .map(|n| n.min(UNNUMBERED - 1))
            .unwrap_or(UNNUMBERED - 1)
    }
}

#[derive(Debug, Clone, Default)]
pub struct Page {
    pub resources: Vec<ImageRecord>,
    pub next_cursor: Option<String>,
}

#[derive(Debug, Error)]
pub enum FetchError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("upstream returned status {status}")]
    Status { status: u16 },
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("malformed payload: {0}")]
    Malformed(String),
}

/// One page of a cursor-paginated image listing.
pub trait CatalogSource {
    fn fetch_page(
        &self,
        cursor: Option<&str>,
    ) -> impl Future<Output = Result<Page, FetchError>> + Send;
}

/// Walks every page of `source` and returns the records in arrival order.
///
/// Pages are requested one after another since each cursor comes from the
/// previous response. Any failing page fails the whole sweep.
pub async fn fetch_all<S: CatalogSource>(source: &S) -> Result<Vec<ImageRecord>, FetchError> {
    let mut records = Vec::new();
    let mut seen = HashSet::new();
    let mut cursor: Option<String> = None;
    let mut pages = 0usize;

    loop {
        let page = source.fetch_page(cursor.as_deref()).await?;
        pages += 1;
        log::debug!(
            "catalog page {} returned {} records (more: {})",
            pages,
            page.resources.len(),
            page.next_cursor.is_some()
        );

        for record in page.resources {
            if seen.insert(record.id.clone()) {
                records.push(record);
            } else {
                log::warn!("dropping duplicate catalog id {}", record.id);
            }
        }

        match page.next_cursor {
            Some(next) if !next.is_empty() => cursor = Some(next),
            _ => break,
        }
    }

    log::info!("catalog loaded: {} records in {} pages", records.len(), pages);
    Ok(records)
}
