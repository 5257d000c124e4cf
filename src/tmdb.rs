//! Blocking client for the TMDB v3 REST API.
//!
//! The client only knows how to issue an authenticated GET and hand back the
//! decoded JSON. Shaping the payload is left to [`crate::normalize`].

use serde_json::{Value, json};
use thiserror::Error;

/// Failures raised while talking to the metadata provider.
#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("TMDB_API_KEY is missing. Add it to the backend .env file")]
    MissingCredential,
    #[error("TMDB request failed: {status}")]
    Status { status: u16, detail: Value },
    #[error("TMDB request failed: {0}")]
    Transport(String),
}

/// Source of raw upstream JSON. Handlers only depend on this trait so tests
/// can substitute a canned implementation.
///
/// Implementations are allowed to block; callers run them on the blocking
/// thread pool.
pub trait Upstream: Send + Sync {
    fn get_json(&self, path: &str, query: &[(&str, String)]) -> Result<Value, UpstreamError>;
}

pub struct TmdbClient {
    agent: ureq::Agent,
    api_key: Option<String>,
    base_url: String,
}

impl TmdbClient {
    pub fn new(api_key: Option<String>, base_url: impl Into<String>) -> Self {
        Self {
            agent: ureq::AgentBuilder::new().build(),
            api_key: api_key.filter(|key| !key.is_empty()),
            base_url: base_url.into(),
        }
    }

    pub fn has_credential(&self) -> bool {
        self.api_key.is_some()
    }

    fn require_key(&self) -> Result<&str, UpstreamError> {
        self.api_key
            .as_deref()
            .ok_or(UpstreamError::MissingCredential)
    }
}

/// Query string sent upstream: the credential first, then every parameter
/// whose value is not empty.
pub fn upstream_query(api_key: &str, query: &[(&str, String)]) -> Vec<(String, String)> {
    let mut params = vec![("api_key".to_string(), api_key.to_string())];
    params.extend(
        query
            .iter()
            .filter(|(_, value)| !value.is_empty())
            .map(|(name, value)| (name.to_string(), value.clone())),
    );
    params
}

/// Decodes a response body. An empty body becomes `null` and anything that is
/// not JSON is wrapped as `{ "raw": <text> }`.
pub fn parse_body(text: &str) -> Value {
    if text.is_empty() {
        return Value::Null;
    }
    serde_json::from_str(text).unwrap_or_else(|_| json!({ "raw": text }))
}

fn read_body(response: ureq::Response) -> Result<Value, UpstreamError> {
    let text = response
        .into_string()
        .map_err(|err| UpstreamError::Transport(format!("reading response body: {err}")))?;
    Ok(parse_body(&text))
}

impl Upstream for TmdbClient {
    fn get_json(&self, path: &str, query: &[(&str, String)]) -> Result<Value, UpstreamError> {
        let api_key = self.require_key()?;
        let url = format!("{}{}", self.base_url, path);

        let mut request = self.agent.get(&url).set("Accept", "application/json");
        for (name, value) in upstream_query(api_key, query) {
            request = request.query(&name, &value);
        }

        tracing::debug!(path, "requesting TMDB");
        match request.call() {
            Ok(response) => read_body(response),
            Err(ureq::Error::Status(status, response)) => {
                let detail = read_body(response).unwrap_or(Value::Null);
                tracing::warn!(path, status, "TMDB returned an error status");
                Err(UpstreamError::Status { status, detail })
            }
            Err(ureq::Error::Transport(err)) => {
                tracing::debug!(path, "TMDB request did not complete");
                Err(UpstreamError::Transport(err.to_string()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::{
        Mock, MockServer, ResponseTemplate,
        matchers::{header, method, path, query_param, query_param_is_missing},
    };

    #[test]
    fn missing_key_fails_before_any_request() {
        // Unroutable base URL: reaching the network would surface a transport error.
        let client = TmdbClient::new(None, "http://0.0.0.0:1");
        let err = client.get_json("/movie/550", &[]).unwrap_err();
        assert!(matches!(err, UpstreamError::MissingCredential));
    }

    #[test]
    fn empty_key_is_treated_as_missing() {
        let client = TmdbClient::new(Some(String::new()), "http://0.0.0.0:1");
        assert!(!client.has_credential());
    }

    #[test]
    fn upstream_query_drops_empty_values() {
        let params = upstream_query(
            "secret",
            &[
                ("query", "alien".to_string()),
                ("language", String::new()),
                ("page", "2".to_string()),
            ],
        );
        assert_eq!(
            params,
            vec![
                ("api_key".to_string(), "secret".to_string()),
                ("query".to_string(), "alien".to_string()),
                ("page".to_string(), "2".to_string()),
            ]
        );
    }

    #[test]
    fn parse_body_wraps_invalid_json() {
        assert_eq!(parse_body("<html>oops</html>"), json!({ "raw": "<html>oops</html>" }));
        assert_eq!(parse_body(""), Value::Null);
        assert_eq!(parse_body(r#"{"id":1}"#), json!({ "id": 1 }));
    }

    async fn fetch(
        server: &MockServer,
        target: &'static str,
        query: Vec<(&'static str, String)>,
    ) -> Result<Value, UpstreamError> {
        let client = TmdbClient::new(Some("secret".to_string()), server.uri());
        tokio::task::spawn_blocking(move || client.get_json(target, &query))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn sends_key_accept_header_and_non_empty_params() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/movie/550"))
            .and(header("accept", "application/json"))
            .and(query_param("api_key", "secret"))
            .and(query_param("page", "2"))
            .and(query_param_is_missing("language"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": 550 })))
            .expect(1)
            .mount(&server)
            .await;

        let body = fetch(
            &server,
            "/movie/550",
            vec![("page", "2".to_string()), ("language", String::new())],
        )
        .await
        .unwrap();
        assert_eq!(body, json!({ "id": 550 }));
    }

    #[tokio::test]
    async fn non_json_success_body_is_wrapped() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/movie/550"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&server)
            .await;

        let body = fetch(&server, "/movie/550", Vec::new()).await.unwrap();
        assert_eq!(body, json!({ "raw": "not json" }));
    }

    #[tokio::test]
    async fn error_status_keeps_code_and_json_detail() {
        let server = MockServer::start().await;
        let detail = json!({ "status_code": 34, "status_message": "Not found" });
        Mock::given(method("GET"))
            .and(path("/movie/0"))
            .respond_with(ResponseTemplate::new(404).set_body_json(detail.clone()))
            .mount(&server)
            .await;

        match fetch(&server, "/movie/0", Vec::new()).await {
            Err(UpstreamError::Status { status, detail: got }) => {
                assert_eq!(status, 404);
                assert_eq!(got, detail);
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[tokio::test]
    async fn error_status_with_html_body_wraps_detail() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/trending/all/week"))
            .respond_with(ResponseTemplate::new(502).set_body_string("<h1>Bad Gateway</h1>"))
            .mount(&server)
            .await;

        match fetch(&server, "/trending/all/week", Vec::new()).await {
            Err(UpstreamError::Status { status, detail }) => {
                assert_eq!(status, 502);
                assert_eq!(detail, json!({ "raw": "<h1>Bad Gateway</h1>" }));
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn refused_connection_is_a_transport_error() {
        let port = std::net::TcpListener::bind("127.0.0.1:0")
            .unwrap()
            .local_addr()
            .unwrap()
            .port();
        let client = TmdbClient::new(Some("secret".to_string()), format!("http://127.0.0.1:{port}"));
        let err = client.get_json("/movie/550", &[]).unwrap_err();
        assert!(matches!(err, UpstreamError::Transport(_)));
    }
}
