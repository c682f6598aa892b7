//! Wire contract with the notification server.
//!
//! Every request is a JSON object made of the call-specific fields below,
//! flattened next to the authentication fields added by the transport.

use serde::{Deserialize, Serialize};

pub const TEST_KEY: &str = "/notify/testKey";
pub const SEND_NOTIFICATION: &str = "/notify/sendNotification";
pub const START_MONITOR: &str = "/notify/startMonitor";
pub const STOP_MONITOR: &str = "/notify/stopMonitor";
pub const HEARTBEAT: &str = "/notify/heartbeat";
pub const MONITOR_FAILURE: &str = "/notify/monitorFailure";
pub const REMAINING_SMS: &str = "/notify/remainingSMS";

/// Error code the server puts in a JSON error body when the account's
/// rolling SMS window is exhausted.
pub const CAP_EXCEEDED_CODE: &str = "sms_cap_exceeded";

pub const CONFIG_FIELD: &str = "config";
pub const CONFIG_ACCEPTED: &str = "Config file accepted";
pub const REPORT_FIELD: &str = "report";
pub const REPORT_ACCEPTED: &str = "Problem report accepted";

/// Request with no call-specific fields (test-key, remaining SMS).
#[derive(Debug, Default, Serialize)]
pub struct NoFields {}

#[derive(Debug, Serialize)]
pub struct NotificationRequest<'a> {
    pub email: &'a str,
    pub cellphone: &'a str,
    /// Sent verbatim; the server expands `{system}` itself.
    pub message: &'a str,
}

#[derive(Debug, Serialize)]
pub struct StartMonitorRequest<'a> {
    pub monitor_id: &'a str,
    pub failure_text: &'a str,
    pub email: &'a str,
    pub cellphone: &'a str,
    /// Decimal string, as the server expects.
    pub timeout_minutes: String,
}

/// Body shared by stop-monitor, heartbeat and monitor-failure.
#[derive(Debug, Serialize)]
pub struct MonitorRequest<'a> {
    pub monitor_id: &'a str,
}

/// Answer of the remaining-SMS endpoint: either `{"remaining": n}` or a bare
/// integer.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum RemainingSmsResponse {
    Object { remaining: i64 },
    Bare(i64),
}

impl RemainingSmsResponse {
    pub fn remaining(&self) -> i64 {
        match self {
            RemainingSmsResponse::Object { remaining } | RemainingSmsResponse::Bare(remaining) => *remaining,
        }
    }
}
