//! Bastion Appliance Provider
//!
//! Provisioning and identity resolution for network-based security appliances
//! (single FW/UTM/WAF devices and HA pairs).
//!
//! ## Module Structure
//!
//! - `client` - Order and portal API contract
//! - `poller` - Bounded polling of remote operation state
//! - `inventory` - Typed decoding of inventory rows
//! - `snapshot` - Identity resolution by snapshot diff
//! - `ha_pair` - HA pair binding
//! - `interface` - Interface slot reconciliation
//! - `orchestrator` - Create/read/update/delete lifecycles
//! - `resources` - Resource type definitions and attribute mapping
//! - `provider` - ApplianceProvider implementation

pub mod client;
pub mod config;
pub mod error;
pub mod ha_pair;
pub mod interface;
pub mod inventory;
pub mod orchestrator;
pub mod poller;
pub mod provider;
pub mod resources;
pub mod snapshot;
pub mod types;

#[cfg(test)]
mod testing;

// Re-export main types
pub use client::OrderClient;
pub use config::ProviderConfig;
pub use error::{ApplianceError, ApplianceResult};
pub use orchestrator::ProvisioningOrchestrator;
pub use provider::ApplianceProvider;

use bastion_core::provider::{BoxFuture, Provider, ProviderResult, ResourceType};
use bastion_core::resource::{Resource, ResourceId, State};

use resources::resource_types;

// =============================================================================
// Provider Trait Implementation
// =============================================================================

impl<C: OrderClient> Provider for ApplianceProvider<C> {
    fn name(&self) -> &'static str {
        "appliance"
    }

    fn resource_types(&self) -> Vec<Box<dyn ResourceType>> {
        resource_types()
    }

    fn read(
        &self,
        id: &ResourceId,
        identifier: Option<&str>,
        prior: Option<&State>,
    ) -> BoxFuture<'_, ProviderResult<State>> {
        let id = id.clone();
        let identifier = identifier.map(|s| s.to_string());
        let prior = prior.cloned();
        Box::pin(async move {
            self.read_resource(&id, identifier.as_deref(), prior.as_ref())
                .await
        })
    }

    fn create(&self, resource: &Resource) -> BoxFuture<'_, ProviderResult<State>> {
        let resource = resource.clone();
        Box::pin(async move { self.create_resource(resource).await })
    }

    fn update(
        &self,
        id: &ResourceId,
        identifier: &str,
        from: &State,
        to: &Resource,
    ) -> BoxFuture<'_, ProviderResult<State>> {
        let id = id.clone();
        let identifier = identifier.to_string();
        let from = from.clone();
        let to = to.clone();
        Box::pin(async move { self.update_resource(&id, &identifier, &from, to).await })
    }

    fn delete(
        &self,
        id: &ResourceId,
        identifier: &str,
        from: &State,
    ) -> BoxFuture<'_, ProviderResult<()>> {
        let id = id.clone();
        let identifier = identifier.to_string();
        let from = from.clone();
        Box::pin(async move { self.delete_resource(&id, &identifier, &from).await })
    }
}
