//! In-process fake Docker registry for integration tests
//!
//! Implements the token endpoint and the v2 catalog, tag list, manifest and
//! delete endpoints. Every bearer token is bound to the scope it was issued
//! for and rejected (401) on requests needing a different scope.

#![allow(dead_code)]

use axum::{
    Form, Json, Router,
    extract::{Query, State},
    http::{HeaderMap, Method, StatusCode, Uri, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use registry_sync::{Credentials, Logger, RegistryClient, RegistryConfig};
use serde_json::json;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::TcpListener;

pub const USERNAME: &str = "ci";
pub const PASSWORD: &str = "secret";
pub const MANIFEST_V2: &str = "application/vnd.docker.distribution.manifest.v2+json";

#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: String,
    pub path: String,
    pub query: Option<String>,
    pub accept: Option<String>,
    pub form: HashMap<String, String>,
}

#[derive(Default)]
struct RegistryState {
    repositories: Vec<(String, Vec<(String, String)>)>,
    tokens: HashMap<String, String>,
    requests: Vec<RecordedRequest>,
    auth_status: Option<StatusCode>,
    deletion_disabled: bool,
    page_size: Option<usize>,
    reject_bearer: usize,
    stall_auth: Option<Duration>,
    stall_delete: Option<Duration>,
    cyclic_links: bool,
}

type Shared = Arc<Mutex<RegistryState>>;

pub struct FakeRegistry {
    addr: SocketAddr,
    state: Shared,
    handle: tokio::task::JoinHandle<()>,
}

impl Drop for FakeRegistry {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

pub fn digest_of(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    format!("sha256:{}", hex::encode(hasher.finalize()))
}

impl FakeRegistry {
    pub async fn start() -> Self {
        let state: Shared = Arc::new(Mutex::new(RegistryState::default()));

        let app = Router::new()
            .route("/auth", post(issue_token))
            .route("/v2/_catalog", get(catalog))
            .fallback(repository_endpoint)
            .with_state(state.clone());

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.ok();
        });

        Self {
            addr,
            state,
            handle,
        }
    }

    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn credentials(&self) -> Credentials {
        Credentials::new(self.url(), USERNAME.to_string(), PASSWORD.to_string())
    }

    pub fn client(&self) -> RegistryClient {
        self.client_with(RegistryConfig::new().with_timeout(5))
    }

    pub fn client_with(&self, config: RegistryConfig) -> RegistryClient {
        RegistryClient::builder(self.credentials())
            .with_config(config)
            .with_output(Logger::new_quiet())
            .build()
            .unwrap()
    }

    /// Tag `tag` in `repository` with a manifest whose content is `content`
    pub fn push(&self, repository: &str, tag: &str, content: &str) -> String {
        let digest = digest_of(content);
        let mut state = self.state.lock().unwrap();
        let position = state.repositories.iter().position(|(r, _)| r == repository);
        let tags = match position {
            Some(i) => &mut state.repositories[i].1,
            None => {
                state.repositories.push((repository.to_string(), Vec::new()));
                &mut state.repositories.last_mut().unwrap().1
            }
        };
        tags.retain(|(t, _)| t != tag);
        tags.push((tag.to_string(), digest.clone()));
        digest
    }

    /// Repository with an empty tag list
    pub fn create_repository(&self, repository: &str) {
        self.state
            .lock()
            .unwrap()
            .repositories
            .push((repository.to_string(), Vec::new()));
    }

    pub fn tags(&self, repository: &str) -> Vec<String> {
        self.state
            .lock()
            .unwrap()
            .repositories
            .iter()
            .find(|(r, _)| r == repository)
            .map(|(_, tags)| tags.iter().map(|(t, _)| t.clone()).collect())
            .unwrap_or_default()
    }

    pub fn set_auth_status(&self, status: StatusCode) {
        self.state.lock().unwrap().auth_status = Some(status);
    }

    pub fn disable_deletion(&self) {
        self.state.lock().unwrap().deletion_disabled = true;
    }

    /// Paginate every listing at `page_size` entries even without `n`
    pub fn set_page_size(&self, page_size: usize) {
        self.state.lock().unwrap().page_size = Some(page_size);
    }

    /// Answer the next `count` bearer-authenticated requests with 401
    pub fn reject_bearer(&self, count: usize) {
        self.state.lock().unwrap().reject_bearer = count;
    }

    /// Hold every token response for `delay` before answering
    pub fn stall_auth(&self, delay: Duration) {
        self.state.lock().unwrap().stall_auth = Some(delay);
    }

    /// Hold every manifest DELETE for `delay` before answering
    pub fn stall_delete(&self, delay: Duration) {
        self.state.lock().unwrap().stall_delete = Some(delay);
    }

    /// Answer the catalog with a `rel="next"` link to itself
    pub fn cyclic_links(&self) {
        self.state.lock().unwrap().cyclic_links = true;
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.state.lock().unwrap().requests.clone()
    }

    pub fn count(&self, method: &str, path_prefix: &str) -> usize {
        self.requests()
            .iter()
            .filter(|r| r.method == method && r.path.starts_with(path_prefix))
            .count()
    }

    pub fn clear_requests(&self) {
        self.state.lock().unwrap().requests.clear();
    }
}

fn record(state: &mut RegistryState, method: &Method, uri: &Uri, headers: &HeaderMap) {
    state.requests.push(RecordedRequest {
        method: method.to_string(),
        path: uri.path().to_string(),
        query: uri.query().map(|q| q.to_string()),
        accept: headers
            .get(header::ACCEPT)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.to_string()),
        form: HashMap::new(),
    });
}

/// 401 unless the request carries a token issued for `scope`
fn authorize(state: &mut RegistryState, headers: &HeaderMap, scope: &str) -> Result<(), Response> {
    if state.reject_bearer > 0 {
        state.reject_bearer -= 1;
        return Err(StatusCode::UNAUTHORIZED.into_response());
    }

    let token = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "));

    match token.and_then(|t| state.tokens.get(t)) {
        Some(granted) if granted == scope => Ok(()),
        _ => Err(StatusCode::UNAUTHORIZED.into_response()),
    }
}

fn paginate(
    items: &[String],
    query: &HashMap<String, String>,
    forced: Option<usize>,
    path: &str,
) -> (Vec<String>, Option<String>) {
    let start = match query.get("last") {
        Some(last) => items
            .iter()
            .position(|i| i == last)
            .map(|p| p + 1)
            .unwrap_or(items.len()),
        None => 0,
    };
    let n = query
        .get("n")
        .and_then(|n| n.parse::<usize>().ok())
        .or(forced);

    let Some(n) = n else {
        return (items[start..].to_vec(), None);
    };

    let end = (start + n).min(items.len());
    let page = items[start..end].to_vec();
    let link = (end < items.len() && end > start)
        .then(|| format!("<{}?last={}&n={}>; rel=\"next\"", path, items[end - 1], n));
    (page, link)
}

fn with_link(link: Option<String>, body: serde_json::Value) -> Response {
    match link {
        Some(link) => (StatusCode::OK, [(header::LINK, link)], Json(body)).into_response(),
        None => Json(body).into_response(),
    }
}

async fn issue_token(
    State(state): State<Shared>,
    headers: HeaderMap,
    Form(form): Form<HashMap<String, String>>,
) -> Response {
    let stall = state.lock().unwrap().stall_auth;
    if let Some(delay) = stall {
        tokio::time::sleep(delay).await;
    }

    let mut state = state.lock().unwrap();
    state.requests.push(RecordedRequest {
        method: "POST".to_string(),
        path: "/auth".to_string(),
        query: None,
        accept: None,
        form: form.clone(),
    });

    if let Some(status) = state.auth_status {
        return (status, "token service unavailable").into_response();
    }

    let expected = format!("Basic {}", STANDARD.encode(format!("{}:{}", USERNAME, PASSWORD)));
    let authorized = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v == expected);
    if !authorized {
        return StatusCode::UNAUTHORIZED.into_response();
    }

    let Some(scope) = form.get("scope").cloned() else {
        return StatusCode::BAD_REQUEST.into_response();
    };
    let token = format!("token-{}", state.tokens.len() + 1);
    state.tokens.insert(token.clone(), scope);

    Json(json!({ "token": token, "expires_in": 300 })).into_response()
}

async fn catalog(
    State(state): State<Shared>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    let mut state = state.lock().unwrap();
    record(&mut state, &method, &uri, &headers);
    if let Err(rejected) = authorize(&mut state, &headers, "registry:catalog:*") {
        return rejected;
    }

    let names: Vec<String> = state.repositories.iter().map(|(r, _)| r.clone()).collect();
    if state.cyclic_links {
        let link = format!("<{}>; rel=\"next\"", uri);
        return with_link(Some(link), json!({ "repositories": names }));
    }
    let (page, link) = paginate(&names, &query, state.page_size, "/v2/_catalog");
    with_link(link, json!({ "repositories": page }))
}

/// `/v2/<name>/tags/list` and `/v2/<name>/manifests/<reference>`
async fn repository_endpoint(
    State(state): State<Shared>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
) -> Response {
    if method == Method::DELETE {
        let stall = state.lock().unwrap().stall_delete;
        if let Some(delay) = stall {
            tokio::time::sleep(delay).await;
        }
    }

    let mut state = state.lock().unwrap();
    record(&mut state, &method, &uri, &headers);

    let Some(rest) = uri.path().strip_prefix("/v2/") else {
        return StatusCode::NOT_FOUND.into_response();
    };

    if let Some(repository) = rest.strip_suffix("/tags/list") {
        if let Err(rejected) =
            authorize(&mut state, &headers, &format!("repository:{}:*", repository))
        {
            return rejected;
        }
        let query: HashMap<String, String> = url::form_urlencoded::parse(
            uri.query().unwrap_or("").as_bytes(),
        )
        .into_owned()
        .collect();

        let Some((_, tags)) = state.repositories.iter().find(|(r, _)| r == repository) else {
            return (StatusCode::NOT_FOUND, Json(json!({"errors": [{"code": "NAME_UNKNOWN"}]})))
                .into_response();
        };
        if tags.is_empty() {
            return Json(json!({ "name": repository })).into_response();
        }
        let names: Vec<String> = tags.iter().map(|(t, _)| t.clone()).collect();
        let path = format!("/v2/{}/tags/list", repository);
        let (page, link) = paginate(&names, &query, state.page_size, &path);
        return with_link(link, json!({ "name": repository, "tags": page }));
    }

    let Some((repository, reference)) = rest.rsplit_once("/manifests/") else {
        return StatusCode::NOT_FOUND.into_response();
    };
    let (repository, reference) = (repository.to_string(), reference.to_string());
    if let Err(rejected) = authorize(&mut state, &headers, &format!("repository:{}:*", repository))
    {
        return rejected;
    }

    let deletion_disabled = state.deletion_disabled;
    let Some((_, tags)) = state
        .repositories
        .iter_mut()
        .find(|(r, _)| *r == repository)
    else {
        return StatusCode::NOT_FOUND.into_response();
    };

    match method {
        Method::GET | Method::HEAD => {
            let found = tags
                .iter()
                .find(|(t, d)| *t == reference || *d == reference)
                .map(|(_, d)| d.clone());
            match found {
                Some(digest) => (
                    StatusCode::OK,
                    [
                        (header::CONTENT_TYPE, MANIFEST_V2.to_string()),
                        (header::HeaderName::from_static("docker-content-digest"), digest),
                    ],
                    "{}",
                )
                    .into_response(),
                None => (
                    StatusCode::NOT_FOUND,
                    Json(json!({"errors": [{"code": "MANIFEST_UNKNOWN"}]})),
                )
                    .into_response(),
            }
        }
        Method::DELETE => {
            if !reference.starts_with("sha256:") {
                return (
                    StatusCode::BAD_REQUEST,
                    Json(json!({"errors": [{"code": "DIGEST_INVALID"}]})),
                )
                    .into_response();
            }
            if deletion_disabled {
                return (
                    StatusCode::METHOD_NOT_ALLOWED,
                    Json(json!({"errors": [{"code": "UNSUPPORTED"}]})),
                )
                    .into_response();
            }
            let before = tags.len();
            tags.retain(|(_, d)| *d != reference);
            if tags.len() == before {
                return StatusCode::NOT_FOUND.into_response();
            }
            StatusCode::ACCEPTED.into_response()
        }
        _ => StatusCode::METHOD_NOT_ALLOWED.into_response(),
    }
}
