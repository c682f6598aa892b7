/*!
Serveur de notifications mock pour tester sans backend réel

Sert tous les chemins sur 127.0.0.1 avec un port éphémère, enregistre chaque
requête (chemin, content type, body brut) et répond avec une réponse scriptée
par chemin. Sans script, la réponse est 200 avec un body vide. Une réponse
scriptée peut être retardée pour garder une requête en vol.
*/

use anyhow::Result;
use axum::{
    body::Bytes,
    extract::State,
    http::{header, HeaderMap, StatusCode, Uri},
    response::{IntoResponse, Response},
    Router,
};
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub path: String,
    pub content_type: Option<String>,
    pub body: Bytes,
}

impl RecordedRequest {
    /// Body parsed as JSON.
    pub fn json(&self) -> Result<Value> {
        Ok(serde_json::from_slice(&self.body)?)
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    pub fn is_multipart(&self) -> bool {
        self.content_type
            .as_deref()
            .is_some_and(|ct| ct.starts_with("multipart/form-data"))
    }
}

#[derive(Debug, Clone)]
pub struct MockResponse {
    pub status: u16,
    pub body: String,
    pub delay: Option<Duration>,
}

impl MockResponse {
    pub fn ok() -> Self {
        Self::text(200, "")
    }

    pub fn text(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
            delay: None,
        }
    }

    pub fn json(status: u16, body: &Value) -> Self {
        Self::text(status, body.to_string())
    }

    /// Hold the answer back for `delay` after recording the request.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

#[derive(Default)]
struct ServerState {
    requests: Mutex<Vec<RecordedRequest>>,
    responses: Mutex<HashMap<String, MockResponse>>,
}

pub struct MockNotifyServer {
    addr: SocketAddr,
    state: Arc<ServerState>,
    shutdown: Option<oneshot::Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl MockNotifyServer {
    /// Bind an ephemeral port and start serving.
    pub async fn start() -> Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let state = Arc::new(ServerState::default());

        let app = Router::new().fallback(record).with_state(Arc::clone(&state));
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let handle = tokio::spawn(async move {
            let shutdown = async {
                let _ = shutdown_rx.await;
            };
            if let Err(e) = axum::serve(listener, app).with_graceful_shutdown(shutdown).await {
                tracing::error!("Mock notify server failed: {}", e);
            }
        });

        tracing::debug!("Mock notify server listening on {}", addr);
        Ok(Self {
            addr,
            state,
            shutdown: Some(shutdown_tx),
            handle: Some(handle),
        })
    }

    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Absolute URL of `path` on this server, for upload targets.
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url(), path)
    }

    /// Answer every later request to `path` with `response`.
    pub fn respond(&self, path: &str, response: MockResponse) {
        self.state.responses.lock().insert(path.to_string(), response);
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.state.requests.lock().clone()
    }

    pub fn find_requests_by_path(&self, path: &str) -> Vec<RecordedRequest> {
        self.state
            .requests
            .lock()
            .iter()
            .filter(|r| r.path == path)
            .cloned()
            .collect()
    }

    pub fn count(&self, path: &str) -> usize {
        self.state.requests.lock().iter().filter(|r| r.path == path).count()
    }

    /// Last JSON body received on `path`.
    pub fn last_json(&self, path: &str) -> Result<Option<Value>> {
        match self.find_requests_by_path(path).last() {
            Some(request) => Ok(Some(request.json()?)),
            None => Ok(None),
        }
    }

    /// Forget recorded requests; scripted responses stay.
    pub fn clear(&self) {
        self.state.requests.lock().clear();
    }

    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            let _ = tokio::time::timeout(Duration::from_secs(2), handle).await;
        }
    }
}

impl Drop for MockNotifyServer {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

async fn record(State(state): State<Arc<ServerState>>, uri: Uri, headers: HeaderMap, body: Bytes) -> Response {
    let path = uri.path().to_string();
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    // A request is only visible once its answer is fixed.
    let response = state
        .responses
        .lock()
        .get(&path)
        .cloned()
        .unwrap_or_else(MockResponse::ok);

    tracing::debug!("[MOCK] {} ({} bytes)", path, body.len());
    state.requests.lock().push(RecordedRequest {
        path,
        content_type,
        body,
    });

    if let Some(delay) = response.delay {
        tokio::time::sleep(delay).await;
    }
    let status = StatusCode::from_u16(response.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, response.body).into_response()
}

/// URL of a local port nothing listens on.
pub fn unreachable_url() -> Result<String> {
    let listener = std::net::TcpListener::bind("127.0.0.1:0")?;
    let port = listener.local_addr()?.port();
    drop(listener);
    Ok(format!("http://127.0.0.1:{}", port))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_records_and_scripts() {
        let server = MockNotifyServer::start().await.unwrap();
        server.respond("/notify/remainingSMS", MockResponse::text(200, "12"));

        let client = reqwest::Client::new();
        let reply = client
            .post(server.url("/notify/remainingSMS"))
            .json(&serde_json::json!({"system": 42}))
            .send()
            .await
            .unwrap();
        assert_eq!(reply.status(), 200);
        assert_eq!(reply.text().await.unwrap(), "12");

        let reply = client.post(server.url("/notify/heartbeat")).send().await.unwrap();
        assert_eq!(reply.status(), 200);

        assert_eq!(server.count("/notify/remainingSMS"), 1);
        assert_eq!(server.last_json("/notify/remainingSMS").unwrap().unwrap()["system"], 42);
        assert_eq!(server.requests().len(), 2);

        server.clear();
        assert!(server.requests().is_empty());
        server.shutdown().await;
    }

    #[tokio::test]
    async fn test_delayed_response() {
        let server = MockNotifyServer::start().await.unwrap();
        server.respond("/slow", MockResponse::text(200, "late").with_delay(Duration::from_millis(300)));

        let started = std::time::Instant::now();
        let reply = reqwest::Client::new().post(server.url("/slow")).send().await.unwrap();
        assert_eq!(reply.text().await.unwrap(), "late");
        assert!(started.elapsed() >= Duration::from_millis(300));
        assert_eq!(server.count("/slow"), 1);
    }

    #[tokio::test]
    async fn test_unreachable_url_refuses() {
        let url = unreachable_url().unwrap();
        let err = reqwest::Client::new().post(&url).send().await.unwrap_err();
        assert!(err.is_connect());
    }
}
