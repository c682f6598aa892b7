//! User-facing warnings about server problems, shown at most once per kind.
//!
//! The application decides how to display them (dialog, status bar, log);
//! the gate decides whether to display them at all.

use crate::profile::{ProfileStore, ProfileValue};
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::warn;

const SCOPE: &str = "auth";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WarningKind {
    /// The server could not be reached.
    Connection,
    /// The server rejected the stored credentials.
    Authentication,
}

impl WarningKind {
    fn suppress_key(self) -> &'static str {
        match self {
            WarningKind::Connection => "suppress_connect_warnings",
            WarningKind::Authentication => "suppress_auth_warnings",
        }
    }
}

pub trait WarningSink: Send + Sync {
    /// Display `message`. Returns true when the user asked never to see
    /// this kind again.
    fn show(&self, kind: WarningKind, message: &str) -> bool;
}

/// Headless sink: logs and never suppresses.
#[derive(Debug, Default)]
pub struct LogWarningSink;

impl WarningSink for LogWarningSink {
    fn show(&self, kind: WarningKind, message: &str) -> bool {
        warn!("[{:?}] {}", kind, message);
        false
    }
}

pub struct WarningGate {
    profile: Arc<dyn ProfileStore>,
    sink: Arc<dyn WarningSink>,
    shown: Mutex<HashSet<WarningKind>>,
}

impl WarningGate {
    pub fn new(profile: Arc<dyn ProfileStore>, sink: Arc<dyn WarningSink>) -> Self {
        Self {
            profile,
            sink,
            shown: Mutex::new(HashSet::new()),
        }
    }

    pub fn is_suppressed(&self, kind: WarningKind) -> bool {
        self.profile.get_bool(SCOPE, kind.suppress_key(), false)
    }

    /// Show `message` unless this kind was already shown in this process or
    /// the user suppressed it. Returns whether it was shown.
    pub fn warn(&self, kind: WarningKind, message: &str) -> bool {
        if self.is_suppressed(kind) || !self.shown.lock().insert(kind) {
            return false;
        }
        let suppress = self.sink.show(kind, message);
        if let Err(e) = self.profile.set(SCOPE, kind.suppress_key(), ProfileValue::Bool(suppress)) {
            warn!("Failed to store warning preference: {}", e);
        }
        true
    }

    /// Allow every kind to be shown again, e.g. after new credentials.
    pub fn reset(&self) {
        for kind in [WarningKind::Connection, WarningKind::Authentication] {
            if let Err(e) = self.profile.set(SCOPE, kind.suppress_key(), ProfileValue::Bool(false)) {
                warn!("Failed to reset warning preference: {}", e);
            }
        }
        self.shown.lock().clear();
    }
}
