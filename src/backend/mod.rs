pub mod catalog;
pub mod cloudinary;
pub mod images;
pub mod proxy_client;
pub mod urls;

use catalog::{CatalogSource, FetchError, Page};
use cloudinary::CloudinaryClient;
use proxy_client::ProxyClient;

/// Where the terminal gallery reads its catalog from.
#[derive(Clone)]
pub enum CatalogBackend {
    Cloudinary(CloudinaryClient),
    Proxy(ProxyClient),
}

impl CatalogSource for CatalogBackend {
    async fn fetch_page(&self, cursor: Option<&str>) -> Result<Page, FetchError> {
        match self {
            CatalogBackend::Cloudinary(client) => client.fetch_page(cursor).await,
            CatalogBackend::Proxy(client) => client.fetch_page(cursor).await,
        }
    }
}
