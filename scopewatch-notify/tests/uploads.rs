mod common;

use common::*;
use scopewatch_devkit::{unreachable_url, MockResponse};
use scopewatch_notify::branding::BrandingProvider;
use std::path::PathBuf;
use std::sync::Arc;
use tempfile::TempDir;

const CONFIG_PATH: &str = "/upload/config";
const REPORT_PATH: &str = "/upload/report";

fn write_file(dir: &TempDir, name: &str, contents: &str) -> PathBuf {
    let path = dir.path().join(name);
    std::fs::write(&path, contents).unwrap();
    path
}

#[tokio::test]
async fn test_config_upload_accepted() {
    let env = setup_with(|config, server| {
        config.uploads.config_file_url = Some(server.url(CONFIG_PATH));
    })
    .await;
    let ctx = &env.ctx;
    assert!(ctx.configure(SYSTEM_ID, AUTH_KEY).await.unwrap());
    env.server
        .respond(CONFIG_PATH, MockResponse::text(200, "Config file accepted\r\n"));

    let dir = TempDir::new().unwrap();
    let file = write_file(&dir, "scope.cfg", "gain = 4\n");
    assert_eq!(ctx.transport().upload_config_file(&file).await, None);

    let request = env.server.find_requests_by_path(CONFIG_PATH).pop().unwrap();
    assert!(request.is_multipart());
    let body = request.text();
    assert!(body.contains("name=\"config\""));
    assert!(body.contains("filename=\"scope.cfg\""));
    assert!(body.contains("gain = 4"));
    assert!(body.contains("name=\"system\""));
    assert!(body.contains(AUTH_KEY));
}

#[tokio::test]
async fn test_upload_rejection_returns_body() {
    let env = setup().await;
    env.server.respond(CONFIG_PATH, MockResponse::text(200, "Invalid file"));
    let dir = TempDir::new().unwrap();
    let file = write_file(&dir, "scope.cfg", "gain = 4\n");

    let reason = env
        .ctx
        .transport()
        .upload_file(&env.server.url(CONFIG_PATH), &file, "config", "Config file accepted")
        .await;
    assert_eq!(reason.as_deref(), Some("Invalid file"));

    // The wrong token for the endpoint is a rejection too.
    env.server
        .respond(CONFIG_PATH, MockResponse::text(200, "Problem report accepted"));
    let reason = env
        .ctx
        .transport()
        .upload_file(&env.server.url(CONFIG_PATH), &file, "config", "Config file accepted")
        .await;
    assert_eq!(reason.as_deref(), Some("Problem report accepted"));
}

#[tokio::test]
async fn test_upload_without_url() {
    let env = setup().await;
    let dir = TempDir::new().unwrap();
    let file = write_file(&dir, "report.txt", "crash");

    assert_eq!(
        env.ctx.transport().upload_problem_report(&file).await.as_deref(),
        Some("No valid upload URL")
    );
    assert!(env.server.requests().is_empty());
}

#[tokio::test]
async fn test_upload_unreachable() {
    let env = setup().await;
    let dir = TempDir::new().unwrap();
    let file = write_file(&dir, "report.txt", "crash");
    let url = format!("{}{}", unreachable_url().unwrap(), REPORT_PATH);

    let reason = env
        .ctx
        .transport()
        .upload_file(&url, &file, "report", "Problem report accepted")
        .await;
    assert_eq!(reason.as_deref(), Some("Error communicating with server"));
}

struct FixedBranding {
    report_url: String,
}

impl BrandingProvider for FixedBranding {
    fn config_file_url(&self) -> Option<String> {
        None
    }

    fn problem_report_url(&self) -> Option<String> {
        Some(self.report_url.clone())
    }
}

#[tokio::test]
async fn test_problem_report_through_branding() {
    let env = setup().await;
    env.server
        .respond(REPORT_PATH, MockResponse::text(200, "Problem report accepted"));
    let branding = Arc::new(FixedBranding {
        report_url: env.server.url(REPORT_PATH),
    });
    let ctx = scopewatch_notify::NotifyContext::builder(test_config(&env.server.base_url()))
        .profile(env.profile.clone())
        .branding(branding)
        .build()
        .unwrap();

    let dir = TempDir::new().unwrap();
    let file = write_file(&dir, "report.txt", "stack trace");
    assert_eq!(ctx.transport().upload_problem_report(&file).await, None);
    assert_eq!(
        ctx.transport().upload_config_file(&file).await.as_deref(),
        Some("No valid upload URL")
    );

    let request = env.server.find_requests_by_path(REPORT_PATH).pop().unwrap();
    assert!(request.text().contains("name=\"report\""));
}
