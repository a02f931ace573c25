//! Validation engine
//!
//! Entry point for validating one source:
//! - **Async I/O**: the source is opened as a byte-range getter (file or HTTP)
//! - **Cascade**: the file is decoded as COPC, then LAS, then by hand, and the
//!   rules that still apply are run
//! - **Bounded scan**: node scans run on a worker pool sized by [`ScanOptions`]
//!
//! Only a source that cannot be opened, or a run that exceeds the configured
//! timeout, is an error. Everything else ends in a [`Report`].

use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use crate::cascade::Cascade;
use crate::error::{Result, ValidationError};
use crate::getter::{SharedGetter, create_getter};
use crate::http_client::HttpGetterConfig;
use crate::report::Report;
use crate::scanner::{ProgressCallback, ScanOptions};

/// Validation configuration
#[derive(Debug, Clone, Default)]
pub struct ValidationConfig {
    /// Scan mode, worker pool size and sampling
    pub scan: ScanOptions,
    /// Omit decoded metadata from reports
    pub mini: bool,
    /// Range-request settings for remote sources
    pub http: HttpGetterConfig,
    /// Abandon a validation that runs longer than this
    pub validation_timeout: Option<Duration>,
}

/// Validates point-cloud sources and produces reports
pub struct ValidationEngine {
    config: ValidationConfig,
}

impl ValidationEngine {
    pub fn new(config: ValidationConfig) -> Self {
        Self { config }
    }

    /// Validate a local path or http(s) URL. The report is named after the source.
    pub async fn validate(&self, source: &str) -> Result<Report> {
        self.validate_with_progress(source, None).await
    }

    /// Validate with an optional progress callback for the node scan
    pub async fn validate_with_progress(
        &self,
        source: &str,
        progress: Option<ProgressCallback>,
    ) -> Result<Report> {
        self.validate_named(source, source, progress).await
    }

    /// Validate `source`, recording `name` in the report
    pub async fn validate_named(
        &self,
        name: &str,
        source: &str,
        progress: Option<ProgressCallback>,
    ) -> Result<Report> {
        debug!("Opening {}", source);
        let getter = create_getter(source, &self.config.http).await?;
        self.run(name, getter, progress).await
    }

    /// Validate bytes served by an existing getter
    pub async fn validate_getter(&self, name: &str, getter: SharedGetter) -> Result<Report> {
        self.run(name, getter, None).await
    }

    async fn run(
        &self,
        name: &str,
        getter: SharedGetter,
        progress: Option<ProgressCallback>,
    ) -> Result<Report> {
        let mut options = self.config.scan.clone();
        if progress.is_some() {
            options.progress = progress;
        }

        let cascade = Cascade::new(Arc::clone(&getter), options, self.config.mini);
        match self.config.validation_timeout {
            Some(limit) => tokio::time::timeout(limit, cascade.run(name))
                .await
                .map_err(|_| ValidationError::Timeout {
                    url: name.to_string(),
                    timeout_seconds: limit.as_secs(),
                }),
            None => Ok(cascade.run(name).await),
        }
    }

    pub fn config(&self) -> &ValidationConfig {
        &self.config
    }
}
