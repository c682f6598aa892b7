//! Scopewatch Notify - client of the notification server for acquisition
//! workstations
//!
//! This crate gives the rest of the application:
//! - System authentication with the server (system ID + auth key), persisted
//!   across restarts and tolerant of an unreachable server
//! - Heartbeat supervision of long-running threads/tasks, with the server
//!   alerting the user when one stalls or dies
//! - One-shot alerts and the remaining SMS quota
//! - Config file and problem report uploads
//!
//! Build a [`NotifyContext`] once and share it.

pub mod auth;
pub mod branding;
pub mod config;
pub mod context;
pub mod credentials;
pub mod discovery;
pub mod error;
pub mod gateway;
pub mod heartbeat;
pub mod profile;
pub mod protocol;
pub mod transport;
pub mod warnings;

pub use auth::AuthManager;
pub use config::NotifyConfig;
pub use context::{NotifyContext, NotifyContextBuilder};
pub use credentials::Credentials;
pub use error::{NotifyError, Result};
pub use gateway::{ContactInfo, NotificationGateway};
pub use heartbeat::{HeartbeatRegistry, MonitorState, UnitHandle, UnitId};
pub use profile::{MemoryProfileStore, ProfileStore, ProfileValue, TomlProfileStore};
pub use transport::TransportClient;
pub use warnings::{WarningKind, WarningSink};
