/**
 * TRANSPORT - Client HTTP du serveur de notifications
 *
 * RÔLE :
 * Tous les appels au serveur passent par ici : requêtes JSON structurées et
 * uploads de fichiers multipart, chacun portant les identifiants du système.
 *
 * CONTRAT D'ERREUR :
 * - send_request / query remontent des erreurs typées (Connection, Server,
 *   CapExceeded, Protocol) à l'appelant direct
 * - upload_file signale un refus par valeur : None = accepté,
 *   Some(raison) = tout autre cas
 */

use crate::branding::{BrandingProvider, ConfigBranding};
use crate::config::NotifyConfig;
use crate::credentials::{CredentialCell, Credentials};
use crate::error::{NotifyError, Result};
use crate::protocol;
use reqwest::multipart::{Form, Part};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, error};

const UPLOAD_COMM_ERROR: &str = "Error communicating with server";
const NO_UPLOAD_URL: &str = "No valid upload URL";

/// Call fields plus authentication fields, serialized as one flat object.
#[derive(Serialize)]
struct Envelope<'a, B: Serialize> {
    #[serde(flatten)]
    fields: &'a B,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    auth_key: Option<&'a str>,
    mac_address: &'a str,
}

impl<'a, B: Serialize> Envelope<'a, B> {
    fn new(fields: &'a B, creds: &'a Credentials) -> Self {
        Self {
            fields,
            system: creds.has_system_id().then_some(creds.system_id),
            auth_key: creds.has_auth_key().then_some(creds.auth_key.as_str()),
            mac_address: &creds.mac_address,
        }
    }
}

#[derive(Clone)]
pub struct TransportClient {
    http: reqwest::Client,
    base_url: String,
    credentials: CredentialCell,
    branding: Arc<dyn BrandingProvider>,
}

impl TransportClient {
    pub fn new(config: &NotifyConfig, credentials: CredentialCell) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.server.request_timeout())
            .connect_timeout(config.server.connect_timeout())
            .user_agent(concat!("scopewatch-notify/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| NotifyError::configuration(format!("HTTP client: {}", e)))?;

        Ok(Self {
            http,
            base_url: config.server.base_url.trim_end_matches('/').to_string(),
            credentials,
            branding: Arc::new(ConfigBranding::new(config.uploads.clone())),
        })
    }

    pub fn with_branding(mut self, branding: Arc<dyn BrandingProvider>) -> Self {
        self.branding = branding;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// POST `fields` plus the stored credentials to `path`. Ok means 2xx.
    pub async fn send_request<B: Serialize>(&self, path: &str, fields: &B) -> Result<()> {
        let creds = self.credentials.snapshot();
        self.send_with_credentials(path, fields, &creds).await
    }

    /// Same as `send_request` but presenting explicit credentials, used to
    /// test a candidate id/key before storing it.
    pub async fn send_with_credentials<B: Serialize>(&self, path: &str, fields: &B, creds: &Credentials) -> Result<()> {
        self.post(path, fields, creds).await.map(|_| ())
    }

    /// POST and decode the JSON answer.
    pub async fn query<T: DeserializeOwned, B: Serialize>(&self, path: &str, fields: &B) -> Result<T> {
        let creds = self.credentials.snapshot();
        let response = self.post(path, fields, &creds).await?;
        let text = response.text().await?;
        serde_json::from_str(&text).map_err(|e| NotifyError::Protocol(format!("{}: {} ({})", path, e, text.trim())))
    }

    async fn post<B: Serialize>(&self, path: &str, fields: &B, creds: &Credentials) -> Result<reqwest::Response> {
        let url = format!("{}{}", self.base_url, path);
        let response = self
            .http
            .post(&url)
            .json(&Envelope::new(fields, creds))
            .send()
            .await?;

        let status = response.status();
        debug!("POST {} -> {}", path, status);
        if status.is_success() {
            return Ok(response);
        }

        let raw = response.text().await.unwrap_or_default();
        Err(classify_failure(status.as_u16(), &raw))
    }

    /// Multipart upload of `file` under `field_name`. Returns `None` when the
    /// server answers exactly `success_token`, otherwise the reason.
    pub async fn upload_file(&self, url: &str, file: &Path, field_name: &str, success_token: &str) -> Option<String> {
        let contents = match tokio::fs::read(file).await {
            Ok(contents) => contents,
            Err(e) => {
                error!("Unable to read {} for upload: {}", file.display(), e);
                return Some(format!("Unable to read {}: {}", file.display(), e));
            }
        };
        let file_name = file
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| field_name.to_string());

        let creds = self.credentials.snapshot();
        let mut form = Form::new();
        if creds.has_system_id() {
            form = form.text("system", creds.system_id.to_string());
        }
        if creds.has_auth_key() {
            form = form.text("auth_key", creds.auth_key.clone());
        }
        form = form.text("mac_address", creds.mac_address.clone());

        let part = match Part::bytes(contents).file_name(file_name).mime_str("text/plain; charset=UTF-8") {
            Ok(part) => part,
            Err(e) => return Some(e.to_string()),
        };
        form = form.part(field_name.to_string(), part);

        let response = match self.http.post(url).multipart(form).send().await {
            Ok(response) => response,
            Err(e) => {
                error!("Error uploading file to server: {}", e);
                return Some(UPLOAD_COMM_ERROR.to_string());
            }
        };
        debug!("upload {} -> {}", url, response.status());

        match response.text().await {
            // Line terminators are not part of the token.
            Ok(body) if body.trim_end_matches(|c: char| c == '\r' || c == '\n') == success_token => None,
            Ok(body) => Some(body),
            Err(e) => {
                error!("Error reading upload response: {}", e);
                Some(UPLOAD_COMM_ERROR.to_string())
            }
        }
    }

    pub async fn upload_config_file(&self, file: &Path) -> Option<String> {
        match self.branding.config_file_url() {
            Some(url) => self.upload_file(&url, file, protocol::CONFIG_FIELD, protocol::CONFIG_ACCEPTED).await,
            None => Some(NO_UPLOAD_URL.to_string()),
        }
    }

    pub async fn upload_problem_report(&self, file: &Path) -> Option<String> {
        match self.branding.problem_report_url() {
            Some(url) => self.upload_file(&url, file, protocol::REPORT_FIELD, protocol::REPORT_ACCEPTED).await,
            None => Some(NO_UPLOAD_URL.to_string()),
        }
    }
}

/// Turn a non-2xx answer into an error. JSON bodies are pretty-printed and
/// checked for a structured error code; anything else is kept verbatim.
fn classify_failure(status: u16, raw: &str) -> NotifyError {
    let Ok(value) = serde_json::from_str::<Value>(raw) else {
        return NotifyError::Server {
            status,
            message: raw.to_string(),
        };
    };

    let message = serde_json::to_string_pretty(&value).unwrap_or_else(|_| raw.to_string());
    if value.get("code").and_then(Value::as_str) == Some(protocol::CAP_EXCEEDED_CODE) {
        return NotifyError::CapExceeded(message);
    }
    NotifyError::Server { status, message }
}
