//! Application-wide notification context
//!
//! Built once at startup and shared by reference with whoever needs to talk
//! to the notification server. Owns every component; nothing here lives in
//! a process-wide static.

use crate::auth::AuthManager;
use crate::branding::BrandingProvider;
use crate::config::NotifyConfig;
use crate::credentials::CredentialCell;
use crate::error::{NotifyError, Result};
use crate::gateway::NotificationGateway;
use crate::heartbeat::{HeartbeatRegistry, UnitHandle};
use crate::profile::{ProfileStore, TomlProfileStore};
use crate::transport::TransportClient;
use crate::warnings::{LogWarningSink, WarningGate, WarningSink};
use anyhow::Context;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::info;

pub struct NotifyContextBuilder {
    config: NotifyConfig,
    profile: Option<Arc<dyn ProfileStore>>,
    warning_sink: Option<Arc<dyn WarningSink>>,
    branding: Option<Arc<dyn BrandingProvider>>,
}

impl NotifyContextBuilder {
    pub fn profile(mut self, profile: Arc<dyn ProfileStore>) -> Self {
        self.profile = Some(profile);
        self
    }

    pub fn warning_sink(mut self, sink: Arc<dyn WarningSink>) -> Self {
        self.warning_sink = Some(sink);
        self
    }

    pub fn branding(mut self, branding: Arc<dyn BrandingProvider>) -> Self {
        self.branding = Some(branding);
        self
    }

    pub fn build(self) -> Result<NotifyContext> {
        let profile: Arc<dyn ProfileStore> = match self.profile {
            Some(profile) => profile,
            None => {
                let path = self
                    .config
                    .profile_path()
                    .map_err(|e| NotifyError::Storage(e.to_string()))?;
                Arc::new(TomlProfileStore::open(path)?)
            }
        };
        let sink = self
            .warning_sink
            .unwrap_or_else(|| Arc::new(LogWarningSink) as Arc<dyn WarningSink>);

        let credentials = CredentialCell::default();
        let mut transport = TransportClient::new(&self.config, credentials.clone())?;
        if let Some(branding) = self.branding {
            transport = transport.with_branding(branding);
        }

        let warnings = Arc::new(WarningGate::new(Arc::clone(&profile), sink));
        let auth = Arc::new(AuthManager::new(
            credentials,
            transport.clone(),
            Arc::clone(&profile),
            Arc::clone(&warnings),
        ));
        let registry = Arc::new(HeartbeatRegistry::new(transport.clone(), self.config.monitor.clone()));
        let gateway = NotificationGateway::new(
            Arc::clone(&auth),
            transport.clone(),
            Arc::clone(&registry),
            Arc::clone(&profile),
        );

        info!("Notification context ready (server {})", transport.base_url());
        Ok(NotifyContext {
            config: self.config,
            transport,
            auth,
            gateway,
            warnings,
        })
    }
}

pub struct NotifyContext {
    config: NotifyConfig,
    transport: TransportClient,
    auth: Arc<AuthManager>,
    gateway: NotificationGateway,
    warnings: Arc<WarningGate>,
}

impl NotifyContext {
    pub fn builder(config: NotifyConfig) -> NotifyContextBuilder {
        NotifyContextBuilder {
            config,
            profile: None,
            warning_sink: None,
            branding: None,
        }
    }

    /// Load the config file and the file-backed profile, then build.
    pub async fn from_default_config() -> anyhow::Result<Self> {
        let config = NotifyConfig::load().await.context("Failed to load notification config")?;
        Self::builder(config).build().context("Failed to build notification context")
    }

    /// Load stored credentials and start validating them in the background.
    pub fn initialize(&self) -> Option<JoinHandle<()>> {
        self.auth.initialize()
    }

    pub async fn configure(&self, system_id: i64, auth_key: &str) -> Result<bool> {
        self.auth.configure(system_id, auth_key).await
    }

    pub fn clear(&self) {
        self.auth.clear()
    }

    pub fn is_authenticated(&self) -> bool {
        self.auth.is_authenticated()
    }

    pub async fn notify(&self, text: &str) -> Result<()> {
        self.gateway.send_notification(text).await
    }

    pub fn new_unit(&self) -> UnitHandle {
        self.gateway.new_unit()
    }

    pub async fn start_heartbeat(&self, unit: &UnitHandle, text: &str, timeout_minutes: u32) -> Result<()> {
        self.gateway.start_thread_heartbeats(unit, text, timeout_minutes).await
    }

    pub async fn stop_heartbeat(&self, unit: &UnitHandle) -> Result<()> {
        self.gateway.stop_thread_heartbeats(unit).await
    }

    pub fn heartbeat(&self, unit: &UnitHandle) {
        self.gateway.send_thread_heartbeat(unit)
    }

    pub async fn remaining_sms(&self) -> Result<i64> {
        self.gateway.remaining_sms_messages().await
    }

    pub fn config(&self) -> &NotifyConfig {
        &self.config
    }

    pub fn auth(&self) -> &Arc<AuthManager> {
        &self.auth
    }

    pub fn gateway(&self) -> &NotificationGateway {
        &self.gateway
    }

    pub fn registry(&self) -> &Arc<HeartbeatRegistry> {
        self.gateway.registry()
    }

    pub fn transport(&self) -> &TransportClient {
        &self.transport
    }

    pub fn warnings(&self) -> &WarningGate {
        &self.warnings
    }
}
