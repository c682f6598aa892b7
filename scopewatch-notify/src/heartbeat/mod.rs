//! Heartbeat supervision of execution units
//!
//! - `registry`: which units are supervised, and the start/stop calls
//! - `monitor`: the single background worker batching heartbeats and
//!   reporting units that died without deregistering
//! - `unit`: the handle a unit holds while supervised

mod monitor;
mod registry;
mod unit;

pub use monitor::MonitorState;
pub use registry::HeartbeatRegistry;
pub(crate) use registry::validate_timeout;
pub use unit::{UnitHandle, UnitId};

/// Shortest server-side timeout accepted for a monitored unit.
pub const MIN_TIMEOUT_MINUTES: u32 = 2;
