//! Application state for the demo server

use parking_lot::RwLock;
use std::sync::Arc;

use crate::config::RagConfig;
use crate::demos::{DemoRunner, DemoServices};
use crate::error::Result;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    /// Configuration
    config: RagConfig,
    /// The selected demo and its providers
    runner: DemoRunner,
    /// Ready state
    ready: RwLock<bool>,
}

impl AppState {
    /// Validate the configuration and build every provider
    pub fn new(config: RagConfig) -> Result<Self> {
        tracing::info!(
            "Initializing demo server state (profile: {})...",
            config.demo.profile.as_str()
        );
        config.validate()?;

        let services = DemoServices::from_config(&config)?;
        let runner = DemoRunner::new(&config, services)?;
        Ok(Self::from_parts(config, runner))
    }

    /// Assemble from an already built runner
    pub fn from_parts(config: RagConfig, runner: DemoRunner) -> Self {
        Self {
            inner: Arc::new(AppStateInner {
                config,
                runner,
                ready: RwLock::new(true),
            }),
        }
    }

    pub fn config(&self) -> &RagConfig {
        &self.inner.config
    }

    pub fn runner(&self) -> &DemoRunner {
        &self.inner.runner
    }

    pub fn is_ready(&self) -> bool {
        *self.inner.ready.read()
    }

    pub fn set_ready(&self, ready: bool) {
        *self.inner.ready.write() = ready;
    }
}
