//! Upload targets supplied by the application's branding provider.

use crate::config::UploadConfig;

pub trait BrandingProvider: Send + Sync {
    fn config_file_url(&self) -> Option<String>;
    fn problem_report_url(&self) -> Option<String>;
}

/// Branding read from the `[uploads]` config section.
#[derive(Debug, Clone, Default)]
pub struct ConfigBranding {
    uploads: UploadConfig,
}

impl ConfigBranding {
    pub fn new(uploads: UploadConfig) -> Self {
        Self { uploads }
    }
}

impl BrandingProvider for ConfigBranding {
    fn config_file_url(&self) -> Option<String> {
        self.uploads.config_file_url.clone().filter(|u| !u.trim().is_empty())
    }

    fn problem_report_url(&self) -> Option<String> {
        self.uploads.problem_report_url.clone().filter(|u| !u.trim().is_empty())
    }
}
