//! User-facing notification API
//!
//! Combines authentication status, the user's contact preferences and the
//! heartbeat registry. Every operation that could reach the user first
//! checks that notifications are usable, so callers can branch on
//! `NotifyError::Disabled` without a network round trip.

use crate::auth::AuthManager;
use crate::error::{NotifyError, Result};
use crate::heartbeat::{HeartbeatRegistry, UnitHandle};
use crate::profile::{ProfileStore, ProfileValue};
use crate::protocol::{self, NoFields, NotificationRequest, RemainingSmsResponse};
use crate::transport::TransportClient;
use parking_lot::RwLock;
use std::sync::Arc;
use tracing::{error, info};

const SCOPE: &str = "notifications";
const ENABLED_KEY: &str = "enabled";
const EMAIL_KEY: &str = "contact_email";
const CELLPHONE_KEY: &str = "contact_cellphone";

/// Where the server should send alerts.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContactInfo {
    pub email: String,
    pub cellphone: String,
}

impl ContactInfo {
    pub fn has_channel(&self) -> bool {
        !self.email.is_empty() || !self.cellphone.is_empty()
    }
}

#[derive(Debug, Default)]
struct Preferences {
    enabled: bool,
    contact: ContactInfo,
}

pub struct NotificationGateway {
    auth: Arc<AuthManager>,
    transport: TransportClient,
    registry: Arc<HeartbeatRegistry>,
    profile: Arc<dyn ProfileStore>,
    prefs: RwLock<Preferences>,
}

impl NotificationGateway {
    pub fn new(
        auth: Arc<AuthManager>,
        transport: TransportClient,
        registry: Arc<HeartbeatRegistry>,
        profile: Arc<dyn ProfileStore>,
    ) -> Self {
        let prefs = Preferences {
            enabled: profile.get_bool(SCOPE, ENABLED_KEY, false),
            contact: ContactInfo {
                email: profile.get_string(SCOPE, EMAIL_KEY, ""),
                cellphone: profile.get_string(SCOPE, CELLPHONE_KEY, ""),
            },
        };

        Self {
            auth,
            transport,
            registry,
            profile,
            prefs: RwLock::new(prefs),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.prefs.read().enabled
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.prefs.write().enabled = enabled;
        self.store(ENABLED_KEY, ProfileValue::Bool(enabled));
    }

    pub fn contact(&self) -> ContactInfo {
        self.prefs.read().contact.clone()
    }

    pub fn set_contact_email(&self, email: &str) {
        self.prefs.write().contact.email = email.to_string();
        self.store(EMAIL_KEY, ProfileValue::Str(email.to_string()));
    }

    pub fn set_contact_cellphone(&self, cellphone: &str) {
        self.prefs.write().contact.cellphone = cellphone.to_string();
        self.store(CELLPHONE_KEY, ProfileValue::Str(cellphone.to_string()));
    }

    fn store(&self, key: &str, value: ProfileValue) {
        if let Err(e) = self.profile.set(SCOPE, key, value) {
            error!("Failed to store notification preference {}: {}", key, e);
        }
    }

    /// Authenticated with the server, enabled by the user, and at least one
    /// contact channel. Evaluated on every call.
    pub fn can_use_notifications(&self) -> bool {
        let prefs = self.prefs.read();
        self.auth.is_authenticated() && prefs.enabled && prefs.contact.has_channel()
    }

    fn require_usable(&self) -> Result<ContactInfo> {
        if !self.can_use_notifications() {
            return Err(NotifyError::Disabled);
        }
        Ok(self.contact())
    }

    /// Send a one-shot alert. `{system}` in `text` is left for the server to
    /// replace with this system's name.
    pub async fn send_notification(&self, text: &str) -> Result<()> {
        let contact = self.require_usable()?;
        let request = NotificationRequest {
            email: &contact.email,
            cellphone: &contact.cellphone,
            message: text,
        };
        self.transport.send_request(protocol::SEND_NOTIFICATION, &request).await?;
        info!("Notification sent");
        Ok(())
    }

    /// SMS messages left in the account's rolling window.
    pub async fn remaining_sms_messages(&self) -> Result<i64> {
        let response: RemainingSmsResponse = self.transport.query(protocol::REMAINING_SMS, &NoFields {}).await?;
        Ok(response.remaining())
    }

    /// Issue a handle for a unit that will later start heartbeats.
    pub fn new_unit(&self) -> UnitHandle {
        self.registry.issue_unit()
    }

    /// Ask the server to alert `text` if `unit` stops sending heartbeats for
    /// `timeout_minutes` or terminates without calling
    /// `stop_thread_heartbeats`.
    pub async fn start_thread_heartbeats(&self, unit: &UnitHandle, text: &str, timeout_minutes: u32) -> Result<()> {
        crate::heartbeat::validate_timeout(timeout_minutes)?;
        let contact = self.require_usable()?;
        self.registry.start(unit, text, timeout_minutes, &contact).await
    }

    pub async fn stop_thread_heartbeats(&self, unit: &UnitHandle) -> Result<()> {
        self.registry.stop(unit).await
    }

    pub fn send_thread_heartbeat(&self, unit: &UnitHandle) {
        self.registry.signal(unit);
    }

    pub fn registry(&self) -> &Arc<HeartbeatRegistry> {
        &self.registry
    }
}
