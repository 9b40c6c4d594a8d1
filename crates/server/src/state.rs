//! Server state shared across command executors.

use crate::manifest_generator::InMemoryManifestGenerator;
use crate::materialize::MaterializationCoordinator;
use crate::resolver::ManifestHashResolver;
use crate::statistics::StatisticsAggregator;
use conduit_core::config::AppConfig;
use conduit_storage::{BuildManifestGenerator, FileAccess, PersistentHashCache};
use std::sync::Arc;

/// Shared server state.
#[derive(Clone)]
pub struct ServerState {
    /// Server configuration.
    pub config: Arc<AppConfig>,
    /// Orchestrator file access.
    pub file_access: Arc<dyn FileAccess>,
    /// Materialization with identity checks.
    pub materializer: Arc<MaterializationCoordinator>,
    /// Manifest hash resolver, owning the in-memory hash cache.
    pub resolver: Arc<ManifestHashResolver>,
    /// Statistics reported by external tools.
    pub statistics: Arc<StatisticsAggregator>,
    /// Producer of per-drop manifest file lists.
    pub manifest_generator: Arc<dyn BuildManifestGenerator>,
}

impl ServerState {
    /// Create a new server state with an in-memory manifest generator.
    ///
    /// # Panics
    ///
    /// Panics if configuration validation fails.
    pub fn new(
        config: AppConfig,
        file_access: Arc<dyn FileAccess>,
        persistent_cache: Option<Arc<dyn PersistentHashCache>>,
    ) -> Self {
        Self::with_manifest_generator(
            config,
            file_access,
            persistent_cache,
            Arc::new(InMemoryManifestGenerator::new()),
        )
    }

    /// Create a new server state with a caller-provided manifest generator.
    ///
    /// # Panics
    ///
    /// Panics if configuration validation fails.
    pub fn with_manifest_generator(
        config: AppConfig,
        file_access: Arc<dyn FileAccess>,
        persistent_cache: Option<Arc<dyn PersistentHashCache>>,
        manifest_generator: Arc<dyn BuildManifestGenerator>,
    ) -> Self {
        if let Err(error) = config.validate() {
            panic!("Invalid configuration: {}", error);
        }

        let materializer = Arc::new(MaterializationCoordinator::new(file_access.clone()));
        let resolver = Arc::new(ManifestHashResolver::new(
            config.resolver.clone(),
            materializer.clone(),
            persistent_cache,
        ));

        Self {
            config: Arc::new(config),
            file_access,
            materializer,
            resolver,
            statistics: Arc::new(StatisticsAggregator::new()),
            manifest_generator,
        }
    }
}
