#![allow(dead_code)]

use parking_lot::Mutex;
use scopewatch_devkit::{init_test_logging, wait_until, MockNotifyServer};
use scopewatch_notify::{MemoryProfileStore, NotifyConfig, NotifyContext, WarningKind, WarningSink};
use std::sync::Arc;
use std::time::Duration;

pub const TICK_MS: u64 = 100;
pub const WAIT: Duration = Duration::from_secs(3);

pub const SYSTEM_ID: i64 = 42;
pub const AUTH_KEY: &str = "k3y";
pub const EMAIL: &str = "op@lab.org";

/// Warning sink remembering what it was asked to show.
#[derive(Default)]
pub struct RecordingSink {
    pub shown: Mutex<Vec<WarningKind>>,
    pub suppress: bool,
}

impl RecordingSink {
    pub fn count(&self, kind: WarningKind) -> usize {
        self.shown.lock().iter().filter(|k| **k == kind).count()
    }
}

impl WarningSink for RecordingSink {
    fn show(&self, kind: WarningKind, _message: &str) -> bool {
        self.shown.lock().push(kind);
        self.suppress
    }
}

pub struct TestEnv {
    pub server: MockNotifyServer,
    pub profile: Arc<MemoryProfileStore>,
    pub sink: Arc<RecordingSink>,
    pub ctx: NotifyContext,
}

pub fn test_config(base_url: &str) -> NotifyConfig {
    let mut config = NotifyConfig::for_server(base_url);
    config.server.request_timeout_secs = 5;
    config.server.connect_timeout_secs = 2;
    config.monitor.tick_interval_ms = TICK_MS;
    config.monitor.shutdown_timeout_ms = 2000;
    config
}

pub fn build_context(config: NotifyConfig, profile: Arc<MemoryProfileStore>, sink: Arc<RecordingSink>) -> NotifyContext {
    NotifyContext::builder(config)
        .profile(profile)
        .warning_sink(sink)
        .build()
        .unwrap()
}

/// Fresh context against a fresh mock server, nothing configured.
pub async fn setup() -> TestEnv {
    setup_with(|_, _| {}).await
}

pub async fn setup_with(adjust: impl FnOnce(&mut NotifyConfig, &MockNotifyServer)) -> TestEnv {
    init_test_logging();
    let server = MockNotifyServer::start().await.unwrap();
    let mut config = test_config(&server.base_url());
    adjust(&mut config, &server);

    let profile = Arc::new(MemoryProfileStore::new());
    let sink = Arc::new(RecordingSink::default());
    let ctx = build_context(config, profile.clone(), sink.clone());
    TestEnv {
        server,
        profile,
        sink,
        ctx,
    }
}

/// Authenticated, enabled, with an email contact. Recorded requests are
/// cleared afterwards.
pub async fn setup_usable() -> TestEnv {
    setup_usable_with(|_, _| {}).await
}

pub async fn setup_usable_with(adjust: impl FnOnce(&mut NotifyConfig, &MockNotifyServer)) -> TestEnv {
    let env = setup_with(adjust).await;
    assert!(env.ctx.configure(SYSTEM_ID, AUTH_KEY).await.unwrap());
    env.ctx.gateway().set_enabled(true);
    env.ctx.gateway().set_contact_email(EMAIL);
    assert!(env.ctx.gateway().can_use_notifications());
    env.server.clear();
    env
}

/// Let the monitor run a few ticks.
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(TICK_MS * 4)).await;
}

/// Wait until the monitor has evicted every registration.
pub async fn wait_for_empty_registry(ctx: &NotifyContext) -> bool {
    let registry = Arc::clone(ctx.registry());
    wait_until(WAIT, move || {
        let registry = Arc::clone(&registry);
        async move { registry.is_empty().await }
    })
    .await
}
