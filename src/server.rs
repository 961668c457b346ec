use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
};
use serde::{Deserialize, Serialize};
use std::{error::Error, net::SocketAddr, sync::Arc};
use thiserror::Error;

use crate::backend::catalog::{FetchError, ImageRecord, fetch_all};
use crate::backend::cloudinary::{CloudinaryClient, build_client};
use crate::config::{Config, ConfigError};
use crate::gallery::filter;
use crate::gallery::query::QueryParams;

#[derive(Debug, Serialize, Deserialize)]
pub struct ListingResponse {
    pub resources: Vec<ImageRecord>,
    pub total: usize,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Cloudinary not configured properly")]
    Config(#[from] ConfigError),
    #[error("Internal server error")]
    Upstream(FetchError),
    #[error("Image not found")]
    NotFound,
}

impl From<FetchError> for ApiError {
    fn from(err: FetchError) -> Self {
        match err {
            FetchError::Config(e) => ApiError::Config(e),
            other => ApiError::Upstream(other),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::Config(e) => {
                log::error!("listing proxy misconfigured: {}", e);
                StatusCode::INTERNAL_SERVER_ERROR
            }
            ApiError::Upstream(e) => {
                log::error!("upstream catalog request failed: {}", e);
                StatusCode::INTERNAL_SERVER_ERROR
            }
            ApiError::NotFound => StatusCode::NOT_FOUND,
        };
        (
            status,
            Json(ErrorBody {
                error: self.to_string(),
            }),
        )
            .into_response()
    }
}

#[derive(Clone)]
pub struct ProxyState {
    config: Arc<Config>,
    http: reqwest::Client,
}

impl ProxyState {
    pub fn new(config: Config, http: reqwest::Client) -> Self {
        Self {
            config: Arc::new(config),
            http,
        }
    }
}

/// Orders and filters a freshly fetched catalog the same way the terminal
/// gallery does.
pub fn listing(catalog: Vec<ImageRecord>, query: &QueryParams) -> ListingResponse {
    let ordered = filter::order(catalog);
    let resources = filter::filter(&ordered, query);
    ListingResponse {
        total: resources.len(),
        resources,
    }
}

async fn list_images(
    State(state): State<ProxyState>,
    Query(query): Query<QueryParams>,
) -> Result<Json<ListingResponse>, ApiError> {
    let client = CloudinaryClient::new(state.http.clone(), &state.config)?;
    let catalog = fetch_all(&client).await?;
    let response = listing(catalog, &query);
    log::info!(
        "GET /images?{} -> {} resources",
        query.to_query_string(),
        response.total
    );
    Ok(Json(response))
}

async fn get_image(
    State(state): State<ProxyState>,
    Path(id): Path<String>,
) -> Result<Json<ImageRecord>, ApiError> {
    let client = CloudinaryClient::new(state.http.clone(), &state.config)?;
    // Only a lookup by id turns an upstream 404 into ours.
    let record = client.fetch_resource(&id).await.map_err(|e| match e {
        FetchError::Status { status: 404 } => ApiError::NotFound,
        e => e.into(),
    })?;
    log::info!("GET /images/{}", id);
    Ok(Json(record))
}

pub fn router(state: ProxyState) -> Router {
    Router::new()
        .route("/images", get(list_images))
        .route("/images/{*id}", get(get_image))
        .with_state(state)
}

pub async fn serve(config: Config, addr: SocketAddr) -> Result<(), Box<dyn Error>> {
    if let Err(e) = config.credentials() {
        log::warn!("{}; every request will fail until it is set", e);
    }

    let http = build_client(&config)?;
    let app = router(ProxyState::new(config, http));

    let listener = tokio::net::TcpListener::bind(addr).await?;
    log::info!("listing proxy listening on http://{}", addr);
    axum::serve(listener, app).await?;
    Ok(())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use axum::body::to_bytes;

    /// Serves `app` on an ephemeral local port and returns its base URL.
    pub(crate) async fn spawn_stub(app: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}", addr)
    }

    fn state_for(api_origin: &str) -> ProxyState {
        let api_origin = api_origin.to_string();
        let config = Config::from_vars(|name| match name {
            "CLOUDINARY_CLOUD_NAME" => Some("demo".into()),
            "CLOUDINARY_API_KEY" => Some("key".into()),
            "CLOUDINARY_API_SECRET" => Some("secret".into()),
            "GALLERY_API_ORIGIN" => Some(api_origin.clone()),
            _ => None,
        })
        .unwrap();
        let http = build_client(&config).unwrap();
        ProxyState::new(config, http)
    }

    async fn error_of(err: ApiError) -> (StatusCode, String) {
        let response = err.into_response();
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: ErrorBody = serde_json::from_slice(&body).unwrap();
        (status, body.error)
    }

    fn record(id: &str, category: Option<&str>, tags: &[&str]) -> ImageRecord {
        ImageRecord {
            category: category.map(str::to_string),
            tags: tags.iter().map(|t| t.to_string()).collect(),
            ..ImageRecord::new(id)
        }
    }

    #[test]
    fn test_listing_matches_client_filter() {
        let catalog = vec![
            record("010_c", Some("party"), &["Torta"]),
            record("002_b", Some("marija"), &["haljina"]),
            record("001_a", Some("party"), &["ples"]),
        ];
        let query = QueryParams::parse("category=party&search=TOR");

        let response = listing(catalog.clone(), &query);
        let client_side = filter::filter(&filter::order(catalog), &query);
        assert_eq!(response.resources, client_side);
        assert_eq!(response.total, 1);
        assert_eq!(response.resources[0].id, "010_c");
    }

    #[test]
    fn test_listing_unfiltered_is_ordered() {
        let catalog = vec![record("2", None, &[]), record("1", None, &[])];
        let response = listing(catalog, &QueryParams::default());
        let ids: Vec<_> = response.resources.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["1", "2"]);
        assert_eq!(response.total, 2);
    }

    #[test]
    fn test_error_statuses() {
        let config = ApiError::Config(ConfigError::Missing("CLOUDINARY_API_KEY"));
        assert_eq!(config.into_response().status(), StatusCode::INTERNAL_SERVER_ERROR);

        let upstream = ApiError::from(FetchError::Status { status: 503 });
        assert!(matches!(upstream, ApiError::Upstream(_)));
        assert_eq!(upstream.into_response().status(), StatusCode::INTERNAL_SERVER_ERROR);

        let upstream_404 = ApiError::from(FetchError::Status { status: 404 });
        assert!(matches!(upstream_404, ApiError::Upstream(_)));
        assert_eq!(ApiError::NotFound.into_response().status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_error_messages() {
        assert_eq!(
            ApiError::Config(ConfigError::Missing("CLOUDINARY_CLOUD_NAME")).to_string(),
            "Cloudinary not configured properly"
        );
        assert_eq!(
            ApiError::Upstream(FetchError::Malformed("x".into())).to_string(),
            "Internal server error"
        );
    }

    #[tokio::test]
    async fn test_missing_credentials_fail_before_any_request() {
        let config = Config::from_vars(|_| None).unwrap();
        let http = build_client(&config).unwrap();
        let state = ProxyState::new(config, http);

        let result = list_images(State(state), Query(QueryParams::default())).await;
        assert!(matches!(result, Err(ApiError::Config(_))));
    }

    #[tokio::test]
    async fn test_listing_upstream_404_is_internal_error() {
        let upstream = spawn_stub(Router::new().fallback(|| async { StatusCode::NOT_FOUND })).await;

        let result = list_images(State(state_for(&upstream)), Query(QueryParams::default())).await;
        let Err(err) = result else {
            panic!("listing should fail when upstream returns 404");
        };
        assert!(matches!(err, ApiError::Upstream(FetchError::Status { status: 404 })));
        let (status, message) = error_of(err).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(message, "Internal server error");
    }

    #[tokio::test]
    async fn test_single_image_upstream_404_is_not_found() {
        let upstream = spawn_stub(Router::new().fallback(|| async { StatusCode::NOT_FOUND })).await;

        let result = get_image(State(state_for(&upstream)), Path("missing".to_string())).await;
        let Err(err) = result else {
            panic!("lookup should fail when upstream returns 404");
        };
        let (status, message) = error_of(err).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(message, "Image not found");
    }

    #[tokio::test]
    async fn test_single_image_id_with_folders_and_spaces() {
        let upstream = spawn_stub(Router::new().route(
            "/v1_1/demo/resources/image/upload/{*id}",
            get(|Path(id): Path<String>| async move {
                Json(serde_json::json!({ "public_id": id, "tags": ["veo"] }))
            }),
        ))
        .await;

        let Json(record) = get_image(
            State(state_for(&upstream)),
            Path("album/010 prvi ples?".to_string()),
        )
        .await
        .unwrap();
        assert_eq!(record.id, "album/010 prvi ples?");
        assert_eq!(record.tags, vec!["veo".to_string()]);
    }
}
