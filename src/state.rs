//! Application state management

use std::sync::Arc;

use crate::config::Config;
use crate::extraction::ExtractionFacade;
use crate::ocr::EngineRegistry;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: Config,
    registry: EngineRegistry,
    facade: Arc<ExtractionFacade>,
}

impl AppState {
    /// Create state around an engine registry
    ///
    /// Engines initialize lazily on first use, not here.
    pub fn new(config: Config, registry: EngineRegistry) -> Self {
        let facade = ExtractionFacade::from_config(&config, registry.clone());
        Self {
            inner: Arc::new(AppStateInner {
                config,
                registry,
                facade: Arc::new(facade),
            }),
        }
    }

    /// Get the configuration
    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    /// Get the engine registry
    pub fn registry(&self) -> &EngineRegistry {
        &self.inner.registry
    }

    /// Get a handle to the extraction facade
    pub fn facade(&self) -> Arc<ExtractionFacade> {
        Arc::clone(&self.inner.facade)
    }
}
