//! Create-once cache of service client handles
//!
//! Handles are expensive to construct, so the registry builds each one at
//! most once and hands out shared references afterwards. Regional and
//! endpoint settings are read when a handle is created; later changes are
//! not observed by handles already in the cache.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tracing::info;

use super::{ClientHandle, ProviderClient, ServiceId};
use crate::config::Settings;
use crate::error::Result;

/// Which flavour of handle is cached
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HandleKind {
    /// Low-level client
    Client,
    /// Higher-level resource interface over the same service
    Resource,
}

/// Everything a factory needs to build one handle
#[derive(Debug, Clone)]
pub struct HandleRequest<'a> {
    pub service: &'a ServiceId,
    pub kind: HandleKind,
    pub region: &'a str,
    pub endpoint: Option<&'a str>,
    /// Per-attempt timeout the built client must enforce
    pub timeout: Duration,
}

/// Builds provider clients for the registry
///
/// `create` runs while the registry holds the cache-entry lock for the
/// requested key, so implementations must not call back into the registry.
pub trait ClientFactory: Send + Sync {
    fn create(&self, request: &HandleRequest<'_>) -> Result<ProviderClient>;
}

/// Process-scoped cache of client handles
pub struct ClientRegistry {
    settings: Arc<Settings>,
    factory: Arc<dyn ClientFactory>,
    handles: DashMap<String, Arc<ClientHandle>>,
}

impl fmt::Debug for ClientRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientRegistry")
            .field("region", &self.settings.region)
            .field("handles", &self.handles.len())
            .finish()
    }
}

impl ClientRegistry {
    pub fn new(settings: Arc<Settings>, factory: Arc<dyn ClientFactory>) -> Self {
        Self {
            settings,
            factory,
            handles: DashMap::new(),
        }
    }

    /// Get or create the plain client handle for a service
    pub fn get_handle(&self, service: &ServiceId) -> Result<Arc<ClientHandle>> {
        self.get_or_create(service, HandleKind::Client)
    }

    /// Get or create the resource handle for a service
    pub fn get_resource_handle(&self, service: &ServiceId) -> Result<Arc<ClientHandle>> {
        self.get_or_create(service, HandleKind::Resource)
    }

    /// Cache key of a handle; resource handles never collide with plain ones
    pub fn cache_key(service: &ServiceId, kind: HandleKind) -> String {
        match kind {
            HandleKind::Client => service.as_str().to_string(),
            HandleKind::Resource => format!("{}_resource", service),
        }
    }

    /// Whether a handle has already been created
    pub fn contains(&self, service: &ServiceId, kind: HandleKind) -> bool {
        self.handles.contains_key(&Self::cache_key(service, kind))
    }

    /// Number of cached handles
    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    fn get_or_create(&self, service: &ServiceId, kind: HandleKind) -> Result<Arc<ClientHandle>> {
        let key = Self::cache_key(service, kind);

        if let Some(handle) = self.handles.get(&key) {
            return Ok(Arc::clone(handle.value()));
        }

        // Losers of a first-access race block on the entry lock and then see
        // the winner's handle.
        match self.handles.entry(key) {
            Entry::Occupied(entry) => Ok(Arc::clone(entry.get())),
            Entry::Vacant(slot) => {
                let request = HandleRequest {
                    service,
                    kind,
                    region: &self.settings.region,
                    endpoint: self.settings.endpoint_for(service),
                    timeout: self.settings.request_timeout(),
                };

                let client = self.factory.create(&request)?;
                let handle = Arc::new(ClientHandle::new(&request, client));

                info!(
                    service = %service,
                    kind = ?kind,
                    region = %handle.region(),
                    endpoint = ?handle.endpoint(),
                    handle_id = %handle.id(),
                    "Created service client"
                );

                slot.insert(Arc::clone(&handle));
                Ok(handle)
            }
        }
    }
}
