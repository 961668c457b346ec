use serde::Deserialize;

use super::catalog::{CatalogSource, FetchError, ImageRecord, MAX_PAGE_SIZE, Page};
use crate::config::{Config, Credentials};

#[derive(Debug, Deserialize)]
struct ResourcesResponse {
    #[serde(default)]
    resources: Vec<ResourceData>,
    next_cursor: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ResourceData {
    public_id: String,
    #[serde(default)]
    tags: Vec<String>,
    context: Option<ResourceContext>,
    #[serde(default)]
    width: u32,
    #[serde(default)]
    height: u32,
}

#[derive(Debug, Deserialize)]
struct ResourceContext {
    alt: Option<String>,
    custom: Option<CustomContext>,
}

#[derive(Debug, Deserialize)]
struct CustomContext {
    category: Option<String>,
    alt: Option<String>,
}

fn parse_resource(resource: ResourceData) -> Result<ImageRecord, FetchError> {
    if resource.public_id.is_empty() {
        return Err(FetchError::Malformed("resource with empty public_id".into()));
    }

    let (category, alt) = match resource.context {
        Some(ctx) => {
            let custom = ctx.custom;
            let category = custom
                .as_ref()
                .and_then(|c| c.category.clone())
                .filter(|c| !c.is_empty());
            let alt = custom
                .and_then(|c| c.alt)
                .or(ctx.alt)
                .filter(|a| !a.is_empty());
            (category, alt)
        }
        None => (None, None),
    };

    Ok(ImageRecord {
        id: resource.public_id,
        tags: resource.tags,
        category,
        alt,
        width: resource.width,
        height: resource.height,
    })
}

fn parse_page(body: &[u8]) -> Result<Page, FetchError> {
    let response: ResourcesResponse =
        serde_json::from_slice(body).map_err(|e| FetchError::Malformed(e.to_string()))?;

    let resources = response
        .resources
        .into_iter()
        .map(parse_resource)
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Page {
        resources,
        next_cursor: response.next_cursor,
    })
}

/// Percent-encodes each folder segment of a public id, keeping the `/`s.
fn encode_public_id(id: &str) -> String {
    id.split('/')
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

pub fn build_client(config: &Config) -> Result<reqwest::Client, reqwest::Error> {
    let mut builder = reqwest::Client::builder().user_agent(concat!(
        env!("CARGO_PKG_NAME"),
        "/",
        env!("CARGO_PKG_VERSION")
    ));
    if let Some(timeout) = config.fetch_timeout {
        builder = builder.timeout(timeout);
    }
    builder.build()
}

/// Admin API client for one cloud's image resources.
#[derive(Clone)]
pub struct CloudinaryClient {
    http: reqwest::Client,
    api_origin: String,
    credentials: Credentials,
}

impl CloudinaryClient {
    pub fn new(http: reqwest::Client, config: &Config) -> Result<Self, FetchError> {
        Ok(Self {
            http,
            api_origin: config.api_origin.trim_end_matches('/').to_string(),
            credentials: config.credentials()?,
        })
    }

    fn resources_url(&self) -> String {
        format!(
            "{}/v1_1/{}/resources/image",
            self.api_origin, self.credentials.cloud_name
        )
    }

    async fn get(&self, url: &str, query: &[(&str, String)]) -> Result<Vec<u8>, FetchError> {
        let response = self
            .http
            .get(url)
            .basic_auth(&self.credentials.api_key, Some(&self.credentials.api_secret))
            .query(query)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            log::warn!("cloudinary {} -> {}: {}", url, status, body);
            return Err(FetchError::Status {
                status: status.as_u16(),
            });
        }

        Ok(response.bytes().await?.to_vec())
    }

    /// Metadata for a single resource, tags and context included.
    pub async fn fetch_resource(&self, id: &str) -> Result<ImageRecord, FetchError> {
        let url = format!("{}/upload/{}", self.resources_url(), encode_public_id(id));
        let query = [
            ("tags", "true".to_string()),
            ("context", "true".to_string()),
            ("metadata", "true".to_string()),
        ];
        let body = self.get(&url, &query).await?;
        let resource: ResourceData =
            serde_json::from_slice(&body).map_err(|e| FetchError::Malformed(e.to_string()))?;
        parse_resource(resource)
    }
}

impl CatalogSource for CloudinaryClient {
    async fn fetch_page(&self, cursor: Option<&str>) -> Result<Page, FetchError> {
        let mut query = vec![
            ("max_results", MAX_PAGE_SIZE.to_string()),
            ("tags", "true".to_string()),
            ("context", "true".to_string()),
            ("metadata", "true".to_string()),
        ];
        if let Some(cursor) = cursor {
            query.push(("next_cursor", cursor.to_string()));
        }

        let body = self.get(&self.resources_url(), &query).await?;
        parse_page(&body)
    }
}
