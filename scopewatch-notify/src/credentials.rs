//! System credentials shared between the auth manager and the transport.

use parking_lot::RwLock;
use std::sync::Arc;

pub const DEFAULT_SYSTEM_ID: i64 = -1;
pub const DEFAULT_AUTH_KEY: &str = "invalid auth key";

/// Identity presented to the notification server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub system_id: i64,
    pub auth_key: String,
    /// Empty when no interface exposed a MAC address.
    pub mac_address: String,
}

impl Default for Credentials {
    fn default() -> Self {
        Self {
            system_id: DEFAULT_SYSTEM_ID,
            auth_key: DEFAULT_AUTH_KEY.to_string(),
            mac_address: String::new(),
        }
    }
}

impl Credentials {
    pub fn has_system_id(&self) -> bool {
        self.system_id != DEFAULT_SYSTEM_ID
    }

    pub fn has_auth_key(&self) -> bool {
        self.auth_key != DEFAULT_AUTH_KEY
    }

    /// Both halves set: a usable `id:key` pair.
    pub fn is_configured(&self) -> bool {
        self.has_system_id() && self.has_auth_key()
    }

    /// Neither half set; nothing worth asking the server about.
    pub fn is_default(&self) -> bool {
        !self.has_system_id() && !self.has_auth_key()
    }
}

/// Read-mostly handle on the current credentials. Cloning shares the cell;
/// only `AuthManager` replaces its contents.
#[derive(Debug, Clone, Default)]
pub struct CredentialCell {
    inner: Arc<RwLock<Credentials>>,
}

impl CredentialCell {
    pub fn new(credentials: Credentials) -> Self {
        Self {
            inner: Arc::new(RwLock::new(credentials)),
        }
    }

    pub fn snapshot(&self) -> Credentials {
        self.inner.read().clone()
    }

    pub(crate) fn set_ids(&self, system_id: i64, auth_key: &str) {
        let mut creds = self.inner.write();
        creds.system_id = system_id;
        creds.auth_key = auth_key.to_string();
    }

    pub(crate) fn set_mac_address(&self, mac_address: String) {
        self.inner.write().mac_address = mac_address;
    }
}
