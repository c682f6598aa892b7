//! System authentication with the notification server
//!
//! Handles:
//! - Loading the persisted system ID / auth key and detecting the MAC address
//! - Background validation of stored credentials at startup
//! - Testing, storing and clearing credentials
//! - The `id:key` text form used to paste credentials

use crate::credentials::{CredentialCell, Credentials, DEFAULT_AUTH_KEY, DEFAULT_SYSTEM_ID};
use crate::discovery;
use crate::error::{NotifyError, Result};
use crate::profile::{ProfileStore, ProfileValue};
use crate::protocol::{self, NoFields};
use crate::transport::TransportClient;
use crate::warnings::{WarningGate, WarningKind};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

const SCOPE: &str = "auth";
const SYSTEM_ID_KEY: &str = "system_id";
const AUTH_KEY_KEY: &str = "auth_key";

const CONNECT_WARNING: &str =
    "Communication with the server failed. Services that depend on the server will not be available.";
const AUTH_WARNING: &str = "This system was unable to authenticate with the server. Some services will not be available.";

pub struct AuthManager {
    credentials: CredentialCell,
    transport: TransportClient,
    profile: Arc<dyn ProfileStore>,
    warnings: Arc<WarningGate>,
    authenticated: AtomicBool,
    /// Bumped by every credential change. The flag is only written while
    /// holding it.
    epoch: Mutex<u64>,
}

impl AuthManager {
    pub fn new(
        credentials: CredentialCell,
        transport: TransportClient,
        profile: Arc<dyn ProfileStore>,
        warnings: Arc<WarningGate>,
    ) -> Self {
        Self {
            credentials,
            transport,
            profile,
            warnings,
            authenticated: AtomicBool::new(false),
            epoch: Mutex::new(0),
        }
    }

    /// Load stored credentials and detect the MAC address. When credentials
    /// were stored, they are checked against the server on a background task
    /// whose handle is returned; the caller does not have to wait for it.
    pub fn initialize(self: &Arc<Self>) -> Option<JoinHandle<()>> {
        self.initialize_with_mac(discovery::primary_mac_address())
    }

    /// `initialize` with an already known MAC address.
    pub fn initialize_with_mac(self: &Arc<Self>, mac_address: Option<String>) -> Option<JoinHandle<()>> {
        let system_id = self.profile.get_int(SCOPE, SYSTEM_ID_KEY, DEFAULT_SYSTEM_ID);
        let auth_key = self.profile.get_string(SCOPE, AUTH_KEY_KEY, DEFAULT_AUTH_KEY);
        let epoch = {
            let mut epoch = self.epoch.lock();
            *epoch += 1;
            self.credentials.set_ids(system_id, &auth_key);
            *epoch
        };

        match mac_address.filter(|mac| !mac.is_empty()) {
            Some(mac) => self.credentials.set_mac_address(mac),
            None => error!("Unable to determine MAC address."),
        }

        let stored = self.credentials.snapshot();
        if stored.is_default() {
            info!("No stored server credentials");
            return None;
        }

        let auth = Arc::clone(self);
        Some(tokio::spawn(async move {
            auth.validate_stored(stored, epoch).await;
        }))
    }

    async fn validate_stored(&self, stored: Credentials, started_at: u64) {
        let outcome = self.test_key(&stored).await;

        let current = self.epoch.lock();
        if *current != started_at {
            debug!("Credentials changed during startup validation, result dropped");
            return;
        }
        match outcome {
            Ok(()) => {
                self.authenticated.store(true, Ordering::SeqCst);
                info!("System {} authenticated with the server", stored.system_id);
            }
            Err(e) if e.is_connection() => {
                drop(current);
                warn!("Startup validation could not reach the server: {}", e);
                self.warnings.warn(WarningKind::Connection, CONNECT_WARNING);
            }
            Err(e) => {
                self.authenticated.store(false, Ordering::SeqCst);
                drop(current);
                warn!("Stored credentials rejected by the server: {}", e);
                self.warnings.warn(WarningKind::Authentication, AUTH_WARNING);
            }
        }
    }

    async fn test_key(&self, candidate: &Credentials) -> Result<()> {
        self.transport
            .send_with_credentials(protocol::TEST_KEY, &NoFields {}, candidate)
            .await
    }

    /// Test `system_id`/`auth_key` with the server and store them when
    /// accepted. `Ok(false)` means the server rejected them; an unreachable
    /// server is reported as `Err(Connection)` so the caller can retry.
    pub async fn configure(&self, system_id: i64, auth_key: &str) -> Result<bool> {
        let current = self.credentials.snapshot();
        if system_id != current.system_id && auth_key != current.auth_key {
            // New identity: problems with it deserve fresh warnings.
            self.warnings.reset();
        }

        let candidate = Credentials {
            system_id,
            auth_key: auth_key.to_string(),
            mac_address: current.mac_address,
        };

        match self.test_key(&candidate).await {
            Ok(()) => {
                self.apply(system_id, auth_key, true);
                info!("Credentials for system {} accepted", system_id);
                Ok(true)
            }
            Err(e) if e.is_connection() => Err(e),
            Err(e) => {
                error!("Error testing authentication keys: {}", e);
                Ok(false)
            }
        }
    }

    /// Forget the credentials, locally and in the profile.
    pub fn clear(&self) {
        self.apply(DEFAULT_SYSTEM_ID, DEFAULT_AUTH_KEY, false);
        info!("Server credentials cleared");
    }

    /// Replace the credentials and the flag together, superseding any
    /// validation still in flight.
    fn apply(&self, system_id: i64, auth_key: &str, authenticated: bool) {
        let mut epoch = self.epoch.lock();
        *epoch += 1;
        self.credentials.set_ids(system_id, auth_key);
        self.persist(system_id, auth_key);
        self.authenticated.store(authenticated, Ordering::SeqCst);
    }

    fn persist(&self, system_id: i64, auth_key: &str) {
        let stored = self
            .profile
            .set(SCOPE, SYSTEM_ID_KEY, ProfileValue::Int(system_id))
            .and_then(|_| self.profile.set(SCOPE, AUTH_KEY_KEY, ProfileValue::Str(auth_key.to_string())));
        if let Err(e) = stored {
            error!("Error saving credentials to profile: {}", e);
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.authenticated.load(Ordering::SeqCst)
    }

    pub fn credentials(&self) -> Credentials {
        self.credentials.snapshot()
    }

    pub fn mac_address(&self) -> String {
        self.credentials.snapshot().mac_address
    }

    /// `"<system id>:<auth key>"`, or an empty string when not configured.
    pub fn id_string(&self) -> String {
        format_id_string(&self.credentials.snapshot())
    }

    /// Parse `"<system id>:<auth key>"` and `configure` with it.
    pub async fn set_id_string(&self, text: &str) -> Result<bool> {
        let (system_id, auth_key) = parse_id_string(text)?;
        self.configure(system_id, &auth_key).await
    }
}

pub fn format_id_string(creds: &Credentials) -> String {
    if creds.is_configured() {
        format!("{}:{}", creds.system_id, creds.auth_key)
    } else {
        String::new()
    }
}

/// Split on the first `:`; the key may itself contain colons.
pub fn parse_id_string(text: &str) -> Result<(i64, String)> {
    let (id, key) = text
        .split_once(':')
        .ok_or_else(|| NotifyError::configuration(format!("expected <system id>:<auth key>, got {:?}", text)))?;
    let system_id = id
        .trim()
        .parse::<i64>()
        .map_err(|e| NotifyError::configuration(format!("system id {:?} is not a number: {}", id, e)))?;
    if key.is_empty() {
        return Err(NotifyError::configuration("auth key is empty"));
    }
    Ok((system_id, key.to_string()))
}
