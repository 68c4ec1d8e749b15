//! Appliance Provider implementation
//!
//! This module adapts the orchestrator to the attribute-map world of
//! `bastion_core::Provider`: resources come in as maps, identities go out as
//! `State.identifier` (a hostname, or `host_1/host_2` for HA pairs).

use std::collections::HashMap;

use bastion_core::differ::diff;
use bastion_core::provider::{ProviderError, ProviderResult};
use bastion_core::resource::{Resource, ResourceId, State, Value};
use log::{debug, info, warn};
use tokio_util::sync::CancellationToken;

use crate::client::OrderClient;
use crate::config::ProviderConfig;
use crate::error::ApplianceError;
use crate::ha_pair::HaPair;
use crate::inventory::HostIdentity;
use crate::orchestrator::ProvisioningOrchestrator;
use crate::resources::{
    CATEGORY_HINT, LICENSE_KIND, category_hint, device_attributes, device_spec, ha_attributes,
    ha_spec, locale_from_attributes, normalize_ports, ports_from_attributes, variant_for,
};
use crate::types::ApplianceVariant;

/// Attach the resource id to an engine error
fn resource_error(id: &ResourceId) -> impl Fn(ApplianceError) -> ProviderError + '_ {
    move |e| ProviderError::from(e).for_resource(id.clone())
}

/// Network-based appliance Provider
pub struct ApplianceProvider<C> {
    orchestrator: ProvisioningOrchestrator<C>,
}

impl<C: OrderClient> ApplianceProvider<C> {
    pub fn new(client: C, config: ProviderConfig) -> Self {
        Self {
            orchestrator: ProvisioningOrchestrator::new(client, config),
        }
    }

    /// Build a provider from provider block attributes
    pub fn from_attributes(client: C, attributes: &HashMap<String, Value>) -> ProviderResult<Self> {
        let config = ProviderConfig::from_attributes(attributes)?;
        Ok(Self::new(client, config))
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.orchestrator = self.orchestrator.with_cancellation(cancel);
        self
    }

    pub fn orchestrator(&self) -> &ProvisioningOrchestrator<C> {
        &self.orchestrator
    }

    fn variant(id: &ResourceId) -> ProviderResult<ApplianceVariant> {
        variant_for(&id.resource_type).ok_or_else(|| {
            ProviderError::new(format!("Unknown resource type: {}", id.resource_type))
                .for_resource(id.clone())
        })
    }

    // =========================================================================
    // Resource Operations
    // =========================================================================

    /// Read a resource by its recorded identifier
    pub async fn read_resource(
        &self,
        id: &ResourceId,
        identifier: Option<&str>,
        prior: Option<&State>,
    ) -> ProviderResult<State> {
        let variant = Self::variant(id)?;
        let fail = resource_error(id);

        let identifier = match identifier {
            Some(identifier) => identifier,
            None => return Ok(State::not_found(id.clone())),
        };

        let empty = HashMap::new();
        let prior_attrs = prior.map_or(&empty, |p| &p.attributes);
        let locale = locale_from_attributes(prior_attrs, self.orchestrator.config().locale)
            .map_err(&fail)?;
        let applied_ports = ports_from_attributes(prior_attrs).map_err(&fail)?;
        let prior_license = prior_attrs
            .get(LICENSE_KIND)
            .and_then(Value::as_str)
            .map(str::to_string);

        let attributes = match variant {
            ApplianceVariant::Ha => {
                let pair = HaPair::parse(identifier).map_err(&fail)?;
                self.orchestrator
                    .read_ha(&pair, locale, applied_ports.as_deref())
                    .await
                    .map_err(&fail)?
                    .map(|observed| ha_attributes(&observed, prior_license, locale))
            }
            ApplianceVariant::Single | ApplianceVariant::FirewallUtmSingle => {
                let hostname = HostIdentity::new(identifier);
                self.orchestrator
                    .read_single(
                        variant,
                        &hostname,
                        category_hint(prior_attrs),
                        locale,
                        applied_ports.as_deref(),
                    )
                    .await
                    .map_err(&fail)?
                    .map(|observed| device_attributes(&observed, prior_license, locale))
            }
        };

        Ok(match attributes {
            Some(attributes) => State::existing(id.clone(), attributes).with_identifier(identifier),
            None => State::not_found(id.clone()),
        })
    }

    /// Create a resource and read it back under its resolved identity
    pub async fn create_resource(&self, resource: Resource) -> ProviderResult<State> {
        let id = &resource.id;
        let variant = Self::variant(id)?;
        let fail = resource_error(id);
        let default_locale = self.orchestrator.config().locale;

        let identifier = match variant {
            ApplianceVariant::Ha => {
                let spec = ha_spec(&resource.attributes, default_locale).map_err(&fail)?;
                self.orchestrator
                    .create_ha(&spec)
                    .await
                    .map_err(&fail)?
                    .to_string()
            }
            ApplianceVariant::Single | ApplianceVariant::FirewallUtmSingle => {
                let spec = device_spec(&resource.attributes, default_locale).map_err(&fail)?;
                self.orchestrator
                    .create_single(variant, &spec)
                    .await
                    .map_err(&fail)?
                    .to_string()
            }
        };
        info!(
            "Created {}.{} as {}",
            id.resource_type, id.name, identifier
        );

        // The identity must survive a failed read-back
        let prior = State::existing(id.clone(), resource.attributes.clone());
        match self.read_resource(id, Some(&identifier), Some(&prior)).await {
            Ok(state) if state.exists => Ok(state),
            Ok(_) => {
                warn!(
                    "{} is not listed yet, recording desired attributes",
                    identifier
                );
                Ok(prior.with_identifier(identifier))
            }
            Err(e) => {
                warn!(
                    "Failed to read back {}, recording desired attributes: {}",
                    identifier, e
                );
                Ok(prior.with_identifier(identifier))
            }
        }
    }

    /// Update a resource in place
    pub async fn update_resource(
        &self,
        id: &ResourceId,
        identifier: &str,
        from: &State,
        to: Resource,
    ) -> ProviderResult<State> {
        let variant = Self::variant(id)?;
        let fail = resource_error(id);
        let default_locale = self.orchestrator.config().locale;

        let mut desired = to.clone();
        normalize_ports(&mut desired.attributes).map_err(&fail)?;
        if !diff(&desired, from).is_change() {
            debug!("{}.{} is up to date", id.resource_type, id.name);
            return self.read_resource(id, Some(identifier), Some(from)).await;
        }

        match variant {
            ApplianceVariant::Ha => {
                let pair = HaPair::parse(identifier).map_err(&fail)?;
                let from_spec = ha_spec(&from.attributes, default_locale).map_err(&fail)?;
                let to_spec = ha_spec(&to.attributes, default_locale).map_err(&fail)?;
                self.orchestrator
                    .update_ha(&pair, &from_spec, &to_spec)
                    .await
                    .map_err(&fail)?;
            }
            ApplianceVariant::Single | ApplianceVariant::FirewallUtmSingle => {
                let hostname = HostIdentity::new(identifier);
                let from_spec = device_spec(&from.attributes, default_locale).map_err(&fail)?;
                let to_spec = device_spec(&to.attributes, default_locale).map_err(&fail)?;
                self.orchestrator
                    .update_single(variant, &hostname, &from_spec, &to_spec)
                    .await
                    .map_err(&fail)?;
            }
        }

        let mut prior = State::existing(id.clone(), to.attributes);
        if let Some(hint) = from.attributes.get(CATEGORY_HINT) {
            prior
                .attributes
                .insert(CATEGORY_HINT.to_string(), hint.clone());
        }
        self.read_resource(id, Some(identifier), Some(&prior)).await
    }

    /// Delete a resource
    pub async fn delete_resource(
        &self,
        id: &ResourceId,
        identifier: &str,
        from: &State,
    ) -> ProviderResult<()> {
        let variant = Self::variant(id)?;
        let fail = resource_error(id);
        let default_locale = self.orchestrator.config().locale;

        match variant {
            ApplianceVariant::Ha => {
                let pair = HaPair::parse(identifier).map_err(&fail)?;
                let spec = ha_spec(&from.attributes, default_locale).map_err(&fail)?;
                self.orchestrator.delete_ha(&pair, &spec).await.map_err(&fail)
            }
            ApplianceVariant::Single | ApplianceVariant::FirewallUtmSingle => {
                let hostname = HostIdentity::new(identifier);
                let spec = device_spec(&from.attributes, default_locale).map_err(&fail)?;
                self.orchestrator
                    .delete_single(&hostname, &spec)
                    .await
                    .map_err(&fail)
            }
        }
    }
}
