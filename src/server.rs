//! HTTP surface of the backend: the `/api` routes and the optional static
//! frontend.
//!
//! Every TMDB-backed handler follows the same path: validate path parameters,
//! build the cache key, answer from the cache when possible, otherwise fetch
//! upstream on the blocking pool, normalize and store the result.

use std::{
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};

use axum::{
    Json, Router,
    body::Body,
    extract::{Path as AxumPath, Query, State},
    http::{Uri, header},
    response::{IntoResponse, Response},
    routing::get,
};
use mime_guess::MimeGuess;
use serde_json::{Value, json};
use tokio::{fs::File, task};
use tokio_util::io::ReaderStream;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{
    cache::{ResponseCache, cache_key},
    error::{ApiError, ApiResult},
    normalize::{
        NormalizedPayload, PagedResult, normalize_movie, normalize_page, normalize_search_hit,
        normalize_season, normalize_tv,
    },
    tmdb::Upstream,
};

const DEFAULT_LANGUAGE: &str = "en-US";
const INDEX_FILE: &str = "index.html";

pub const ROUTES: [&str; 8] = [
    "/api/health",
    "/api/search?query=batman",
    "/api/discover/movie?page=1",
    "/api/discover/tv?page=1",
    "/api/trending?page=1",
    "/api/movie/{id}",
    "/api/tv/{id}",
    "/api/tv/{id}/season/{season}",
];

type UpstreamQuery = Vec<(&'static str, String)>;

#[derive(Clone)]
pub struct AppState {
    upstream: Arc<dyn Upstream>,
    cache: Arc<ResponseCache<NormalizedPayload>>,
    frontend_root: Option<Arc<PathBuf>>,
}

impl AppState {
    pub fn new(upstream: Arc<dyn Upstream>, cache_ttl: Duration) -> Self {
        Self {
            upstream,
            cache: Arc::new(ResponseCache::new(cache_ttl)),
            frontend_root: None,
        }
    }

    /// Serves the prebuilt frontend bundle found under `root` for every
    /// non-API path.
    pub fn with_frontend(mut self, root: impl Into<PathBuf>) -> Self {
        self.frontend_root = Some(Arc::new(root.into()));
        self
    }

    pub fn cache(&self) -> &ResponseCache<NormalizedPayload> {
        &self.cache
    }

    /// Answers from the cache or fetches `path` upstream. The fetch, the
    /// normalization and the cache write all happen on the blocking pool, so
    /// a client hanging up does not stop the result from being cached.
    async fn cached<F>(
        &self,
        key: String,
        path: String,
        query: UpstreamQuery,
        normalize: F,
    ) -> ApiResult<NormalizedPayload>
    where
        F: FnOnce(&Value) -> NormalizedPayload + Send + 'static,
    {
        if let Some(hit) = self.cache.get(&key) {
            tracing::debug!(%key, "cache hit");
            return Ok(hit);
        }

        let upstream = self.upstream.clone();
        let cache = self.cache.clone();
        task::spawn_blocking(move || -> ApiResult<NormalizedPayload> {
            let raw = upstream.get_json(&path, &query)?;
            let payload = normalize(&raw);
            cache.set(key, payload.clone());
            Ok(payload)
        })
        .await
        .map_err(|err| ApiError::internal(format!("task join error: {err}")))?
    }
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/api/health", get(health))
        .route("/api/search", get(search))
        .route("/api/discover/movie", get(discover_movies))
        .route("/api/discover/tv", get(discover_tv))
        .route("/api/trending", get(trending))
        .route("/api/movie/{id}", get(movie_details))
        .route("/api/tv/{id}", get(tv_details))
        .route("/api/tv/{id}/season/{season}", get(season_details))
        .fallback(frontend)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Raw query pairs in request order.
struct RequestQuery(Vec<(String, String)>);

impl RequestQuery {
    fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    fn key_for(&self, uri: &Uri) -> String {
        cache_key("GET", uri.path(), &self.0)
    }

    fn page(&self) -> String {
        parse_page(self.get("page")).to_string()
    }

    fn language(&self) -> String {
        self.get("language")
            .filter(|value| !value.is_empty())
            .unwrap_or(DEFAULT_LANGUAGE)
            .to_string()
    }
}

/// Reads the leading digits of the value, so `2abc` is page 2. Anything
/// without leading digits, zero, or out of range falls back to the first page.
fn parse_page(raw: Option<&str>) -> u32 {
    raw.map(str::trim)
        .and_then(|value| {
            let value = value.strip_prefix('+').unwrap_or(value);
            let digits = value
                .find(|c: char| !c.is_ascii_digit())
                .map_or(value, |end| &value[..end]);
            digits.parse::<u32>().ok()
        })
        .filter(|page| *page > 0)
        .unwrap_or(1)
}

fn parse_id(raw: &str) -> ApiResult<u64> {
    raw.trim()
        .parse::<u64>()
        .ok()
        .filter(|id| *id > 0)
        .ok_or(ApiError::InvalidInput("Invalid id"))
}

fn parse_season(raw: &str) -> ApiResult<u32> {
    raw.trim()
        .parse::<u32>()
        .ok()
        .filter(|season| *season > 0)
        .ok_or(ApiError::InvalidInput("Invalid season"))
}

async fn health() -> Json<Value> {
    Json(json!({
        "ok": true,
        "now": chrono::Utc::now().timestamp_millis(),
    }))
}

async fn search(
    State(state): State<AppState>,
    uri: Uri,
    Query(pairs): Query<Vec<(String, String)>>,
) -> ApiResult<Json<NormalizedPayload>> {
    let params = RequestQuery(pairs);
    let query = params
        .get("query")
        .or_else(|| params.get("q"))
        .unwrap_or_default()
        .trim()
        .to_string();
    if query.is_empty() {
        return Ok(Json(NormalizedPayload::SearchPage(PagedResult::empty())));
    }
    let include_adult = params.get("include_adult") == Some("true");

    let upstream_query = vec![
        ("query", query),
        ("page", params.page()),
        ("include_adult", include_adult.to_string()),
    ];
    let payload = state
        .cached(
            params.key_for(&uri),
            "/search/multi".to_string(),
            upstream_query,
            |raw| NormalizedPayload::SearchPage(normalize_page(raw, normalize_search_hit)),
        )
        .await?;
    Ok(Json(payload))
}

fn discover_query(params: &RequestQuery) -> UpstreamQuery {
    vec![
        ("page", params.page()),
        ("sort_by", "popularity.desc".to_string()),
        ("include_adult", "false".to_string()),
    ]
}

async fn discover_movies(
    State(state): State<AppState>,
    uri: Uri,
    Query(pairs): Query<Vec<(String, String)>>,
) -> ApiResult<Json<NormalizedPayload>> {
    let params = RequestQuery(pairs);
    let payload = state
        .cached(
            params.key_for(&uri),
            "/discover/movie".to_string(),
            discover_query(&params),
            |raw| NormalizedPayload::MoviePage(normalize_page(raw, normalize_movie)),
        )
        .await?;
    Ok(Json(payload))
}

async fn discover_tv(
    State(state): State<AppState>,
    uri: Uri,
    Query(pairs): Query<Vec<(String, String)>>,
) -> ApiResult<Json<NormalizedPayload>> {
    let params = RequestQuery(pairs);
    let payload = state
        .cached(
            params.key_for(&uri),
            "/discover/tv".to_string(),
            discover_query(&params),
            |raw| NormalizedPayload::TvPage(normalize_page(raw, normalize_tv)),
        )
        .await?;
    Ok(Json(payload))
}

async fn trending(
    State(state): State<AppState>,
    uri: Uri,
    Query(pairs): Query<Vec<(String, String)>>,
) -> ApiResult<Json<NormalizedPayload>> {
    let params = RequestQuery(pairs);
    let payload = state
        .cached(
            params.key_for(&uri),
            "/trending/all/week".to_string(),
            vec![("page", params.page())],
            |raw| NormalizedPayload::SearchPage(normalize_page(raw, normalize_search_hit)),
        )
        .await?;
    Ok(Json(payload))
}

async fn movie_details(
    State(state): State<AppState>,
    AxumPath(id): AxumPath<String>,
    uri: Uri,
    Query(pairs): Query<Vec<(String, String)>>,
) -> ApiResult<Json<NormalizedPayload>> {
    let id = parse_id(&id)?;
    let params = RequestQuery(pairs);
    let payload = state
        .cached(
            params.key_for(&uri),
            format!("/movie/{id}"),
            vec![("language", params.language())],
            |raw| normalize_movie(raw).map_or(NormalizedPayload::Empty, NormalizedPayload::Movie),
        )
        .await?;
    Ok(Json(payload))
}

async fn tv_details(
    State(state): State<AppState>,
    AxumPath(id): AxumPath<String>,
    uri: Uri,
    Query(pairs): Query<Vec<(String, String)>>,
) -> ApiResult<Json<NormalizedPayload>> {
    let id = parse_id(&id)?;
    let params = RequestQuery(pairs);
    let payload = state
        .cached(
            params.key_for(&uri),
            format!("/tv/{id}"),
            vec![("language", params.language())],
            |raw| normalize_tv(raw).map_or(NormalizedPayload::Empty, NormalizedPayload::Tv),
        )
        .await?;
    Ok(Json(payload))
}

async fn season_details(
    State(state): State<AppState>,
    AxumPath((id, season)): AxumPath<(String, String)>,
    uri: Uri,
    Query(pairs): Query<Vec<(String, String)>>,
) -> ApiResult<Json<NormalizedPayload>> {
    let id = parse_id(&id)?;
    let season = parse_season(&season)?;
    let params = RequestQuery(pairs);
    let payload = state
        .cached(
            params.key_for(&uri),
            format!("/tv/{id}/season/{season}"),
            vec![("language", params.language())],
            move |raw| NormalizedPayload::Season(normalize_season(raw, id, season)),
        )
        .await?;
    Ok(Json(payload))
}

async fn frontend(State(state): State<AppState>, uri: Uri) -> ApiResult<Response> {
    let path = uri.path();
    if path == "/api" || path.starts_with("/api/") {
        return Err(ApiError::NotFound("Not found"));
    }
    let root = state
        .frontend_root
        .as_deref()
        .ok_or(ApiError::NotFound("Not found"))?;
    let target = resolve_static_path(root, path).ok_or(ApiError::NotFound("Not found"))?;

    if is_file(&target).await {
        return stream_file(target).await;
    }
    // Client-side routes such as /watch/movie/550 have no extension.
    if Path::new(path).extension().is_none() {
        return stream_file(root.join(INDEX_FILE)).await;
    }
    Err(ApiError::NotFound("file not found"))
}

/// Maps a request path onto `root`, refusing anything that tries to climb out
/// of it.
fn resolve_static_path(root: &Path, request_path: &str) -> Option<PathBuf> {
    let mut target = root.to_path_buf();
    for segment in request_path.split('/') {
        match segment {
            "" | "." => continue,
            ".." => return None,
            other if other.contains('\\') => return None,
            other => target.push(other),
        }
    }
    Some(target)
}

async fn is_file(path: &Path) -> bool {
    tokio::fs::metadata(path)
        .await
        .map(|meta| meta.is_file())
        .unwrap_or(false)
}

async fn stream_file(path: PathBuf) -> ApiResult<Response> {
    let file = File::open(&path)
        .await
        .map_err(|_| ApiError::NotFound("file not found"))?;

    let stream = ReaderStream::new(file);
    let mut response = Body::from_stream(stream).into_response();
    if let Some(mime) = MimeGuess::from_path(&path).first() {
        if let Ok(value) = mime.to_string().parse() {
            response.headers_mut().insert(header::CONTENT_TYPE, value);
        }
    }

    Ok(response)
}
