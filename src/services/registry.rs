//! Registry of the tool services a process hosts.

use std::collections::HashMap;
use std::sync::Arc;

use super::{
    GeocodingService, PoiService, ServiceError, ServiceKind, ToolService, TriviaService,
    WikipediaService,
};
use crate::config::Config;

/// All tool services available to this process, keyed by [`ServiceKind`]
#[derive(Debug, Clone, Default)]
pub struct ServiceRegistry {
    services: HashMap<ServiceKind, Arc<dyn ToolService>>,
}

impl ServiceRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry with all four services built from the configuration
    pub fn from_config(config: &Config) -> Result<Self, ServiceError> {
        let mut registry = Self::new();

        for kind in ServiceKind::ALL {
            registry.register(build_service(kind, config)?);
        }

        Ok(registry)
    }

    /// Register a service, replacing any previous one of the same kind
    pub fn register(&mut self, service: Arc<dyn ToolService>) {
        self.services.insert(service.kind(), service);
    }

    /// Get a service by kind
    pub fn get(&self, kind: ServiceKind) -> Option<&Arc<dyn ToolService>> {
        self.services.get(&kind)
    }

    /// Get a service by kind, returning an error if not registered
    pub fn get_required(&self, kind: ServiceKind) -> Result<&Arc<dyn ToolService>, ServiceError> {
        self.get(kind)
            .ok_or_else(|| ServiceError::NotFound(format!("Service '{}' not registered", kind)))
    }

    /// Registered services in [`ServiceKind::ALL`] order
    pub fn all(&self) -> impl Iterator<Item = &Arc<dyn ToolService>> {
        ServiceKind::ALL
            .into_iter()
            .filter_map(move |kind| self.services.get(&kind))
    }

    pub fn has(&self, kind: ServiceKind) -> bool {
        self.services.contains_key(&kind)
    }

    pub fn len(&self) -> usize {
        self.services.len()
    }

    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }
}

/// Build one service with its configured upstream and rate limit
pub fn build_service(kind: ServiceKind, config: &Config) -> Result<Arc<dyn ToolService>, ServiceError> {
    let upstream = &config.upstream;
    let rate = config.rate_limits.rate_for(kind);

    let service: Arc<dyn ToolService> = match kind {
        ServiceKind::Geocoding => Arc::new(GeocodingService::new(upstream, rate)?),
        ServiceKind::Poi => Arc::new(PoiService::new(upstream, rate)?),
        ServiceKind::Wikipedia => Arc::new(WikipediaService::new(upstream, rate)?),
        ServiceKind::Trivia => Arc::new(TriviaService::new(upstream, rate)?),
    };

    Ok(service)
}
