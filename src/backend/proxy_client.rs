use super::catalog::{CatalogSource, FetchError, Page};
use crate::server::{ErrorBody, ListingResponse};

/// Reads the catalog from a running `gallery-tui serve` instance instead of
/// talking to Cloudinary directly, so the terminal needs no API secret.
#[derive(Clone)]
pub struct ProxyClient {
    http: reqwest::Client,
    base_url: String,
}

impl ProxyClient {
    pub fn new(http: reqwest::Client, base_url: &str) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

impl CatalogSource for ProxyClient {
    /// The proxy already walks every upstream page, so one unfiltered
    /// request returns the whole catalog and never carries a cursor.
    async fn fetch_page(&self, _cursor: Option<&str>) -> Result<Page, FetchError> {
        let url = format!("{}/images", self.base_url);
        let response = self.http.get(&url).send().await?;

        let status = response.status();
        let body = response.bytes().await?;
        if !status.is_success() {
            let message = serde_json::from_slice::<ErrorBody>(&body)
                .map(|b| b.error)
                .unwrap_or_default();
            log::warn!("proxy {} -> {}: {}", url, status, message);
            return Err(FetchError::Status {
                status: status.as_u16(),
            });
        }

        let listing: ListingResponse =
            serde_json::from_slice(&body).map_err(|e| FetchError::Malformed(e.to_string()))?;
        if listing.resources.iter().any(|r| r.id.is_empty()) {
            return Err(FetchError::Malformed("resource with empty id".into()));
        }

        Ok(Page {
            resources: listing.resources,
            next_cursor: None,
        })
    }
}
