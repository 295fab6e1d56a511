//! Static source-to-backend routing
//!
//! The routing table is fixed at construction from config. A seed whose
//! source has no routed backend is a configuration defect, so routing
//! failure is fatal to the run rather than a per-target error.

use crate::config::Config;
use crate::crawler::backend::{BackendKind, FetchBackend};
use crate::crawler::direct::DirectBackend;
use crate::crawler::managed::ManagedBackend;
use crate::source::SourceId;
use crate::{ConfigError, FlathuntError, Result};
use reqwest::Client;
use std::collections::HashMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

pub struct BackendRouter {
    routes: HashMap<SourceId, Arc<dyn FetchBackend>>,
}

impl BackendRouter {
    /// Builds the routing table from config, constructing each configured
    /// backend exactly once and sharing it across the sources it serves
    pub fn from_config(config: &Config, client: Client, cancel: &CancellationToken) -> Result<Self> {
        let managed: Option<Arc<dyn FetchBackend>> = match &config.backends.managed {
            Some(managed_config) => Some(Arc::new(ManagedBackend::new(
                client.clone(),
                managed_config,
                cancel.clone(),
            )?)),
            None => None,
        };

        let direct: Option<Arc<dyn FetchBackend>> = match &config.backends.direct {
            Some(direct_config) => Some(Arc::new(DirectBackend::new(
                client.clone(),
                direct_config,
                cancel.clone(),
            )?)),
            None => None,
        };

        let mut routes = HashMap::new();
        for (&source, &kind) in &config.routing {
            let backend = match kind {
                BackendKind::Managed => managed.clone(),
                BackendKind::Direct => direct.clone(),
            }
            .ok_or_else(|| {
                ConfigError::Validation(format!(
                    "Source '{}' routed to unconfigured {} backend",
                    source, kind
                ))
            })?;
            routes.insert(source, backend);
        }

        Ok(Self { routes })
    }

    #[cfg(test)]
    pub fn from_routes(routes: HashMap<SourceId, Arc<dyn FetchBackend>>) -> Self {
        Self { routes }
    }

    pub fn route(&self, source: SourceId) -> Result<Arc<dyn FetchBackend>> {
        self.routes
            .get(&source)
            .cloned()
            .ok_or(FlathuntError::UnroutableSource { source_id: source })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crawler::backend::FetchOutcome;
    use crate::source::CrawlTarget;
    use async_trait::async_trait;
    use std::time::Duration;

    struct StubBackend;

    #[async_trait]
    impl FetchBackend for StubBackend {
        fn kind(&self) -> BackendKind {
            BackendKind::Direct
        }

        async fn fetch(&self, target: &CrawlTarget) -> FetchOutcome {
            FetchOutcome::success(
                target.clone(),
                self.kind(),
                String::new(),
                Duration::ZERO,
            )
        }
    }

    #[test]
    fn test_route_known_source() {
        let router = BackendRouter::from_routes(HashMap::from([(
            SourceId::Rightmove,
            Arc::new(StubBackend) as Arc<dyn FetchBackend>,
        )]));

        assert!(router.route(SourceId::Rightmove).is_ok());
    }

    #[test]
    fn test_route_unknown_source_is_fatal() {
        let router = BackendRouter::from_routes(HashMap::new());

        let result = router.route(SourceId::Zoopla);
        assert!(matches!(
            result,
            Err(FlathuntError::UnroutableSource {
                source_id: SourceId::Zoopla
            })
        ));
    }
}
