//! Lifecycle orchestration for appliance resources
//!
//! Every operation is sequential: list, submit, poll, list again, resolve.
//! The only suspension points are the sleeps inside `StateWaiter`.

use log::{debug, info, warn};
use tokio_util::sync::CancellationToken;

use crate::client::{
    DeviceInterface, DeviceRef, HostOrder, InterfaceSlotRequest, OrderClient, OrderId,
    OrderPayload,
};
use crate::config::ProviderConfig;
use crate::error::{ApplianceError, ApplianceResult};
use crate::ha_pair::{HaPair, resolve_pair};
use crate::interface::{
    InterfaceSlot, PortLayout, ha_slot_requests, observed_ha_slots, observed_slots, pad_slots,
    slot_requests,
};
use crate::inventory::{HaLink, HostIdentity, InventoryRecord, decode_rows, find_by_hostname};
use crate::poller::StateWaiter;
use crate::snapshot::{hostname_key, resolve_new};
use crate::types::{ApplianceVariant, DeviceCategory, Locale, OrderKind};

const ORDER_PENDING: &[&str] = &["PROCESSING"];
const ORDER_TARGET: &[&str] = &["COMPLETE"];
const PROCESS_PENDING: &[&str] = &["RUNNING"];
const PROCESS_TARGET: &[&str] = &["ENDED"];
const PROCESS_ERROR: &str = "ERROR";

/// Desired state of a single device
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceSpec {
    pub operating_mode: String,
    pub license_kind: String,
    pub az_group: Option<String>,
    pub locale: Locale,
    /// `None` means interfaces are not managed
    pub ports: Option<Vec<InterfaceSlot>>,
}

impl DeviceSpec {
    pub fn category(&self) -> ApplianceResult<DeviceCategory> {
        DeviceCategory::from_operating_mode(&self.operating_mode)
    }

    fn order_fields_differ(&self, other: &DeviceSpec) -> bool {
        self.operating_mode != other.operating_mode
            || self.license_kind != other.license_kind
            || self.az_group != other.az_group
            || self.locale != other.locale
    }

    fn host_order(&self, hostname: Option<&HostIdentity>) -> HostOrder {
        HostOrder {
            operating_mode: self.operating_mode.clone(),
            license_kind: self.license_kind.clone(),
            az_group: self.az_group.clone(),
            hostname: hostname.map(|h| h.to_string()),
            ..Default::default()
        }
    }
}

/// Per-host settings of an HA pair
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HaHostSpec {
    pub az_group: Option<String>,
    pub ha_link_1: HaLink,
    pub ha_link_2: HaLink,
}

impl HaHostSpec {
    fn from_record(record: &InventoryRecord) -> Self {
        Self {
            az_group: record.az_group.clone(),
            ha_link_1: record.ha_link_1.clone(),
            ha_link_2: record.ha_link_2.clone(),
        }
    }
}

/// Desired state of an HA pair
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HaSpec {
    pub operating_mode: String,
    pub license_kind: String,
    pub locale: Locale,
    pub host_1: HaHostSpec,
    pub host_2: HaHostSpec,
    /// `None` means interfaces are not managed
    pub ports: Option<Vec<InterfaceSlot>>,
}

impl HaSpec {
    fn order_fields_differ(&self, other: &HaSpec) -> bool {
        self.operating_mode != other.operating_mode
            || self.license_kind != other.license_kind
            || self.locale != other.locale
            || self.host_1 != other.host_1
            || self.host_2 != other.host_2
    }

    fn host_orders(&self, pair: Option<&HaPair>) -> Vec<HostOrder> {
        [(&self.host_1, pair.map(|p| &p.host_1)), (&self.host_2, pair.map(|p| &p.host_2))]
            .into_iter()
            .map(|(host, hostname)| HostOrder {
                operating_mode: self.operating_mode.clone(),
                license_kind: self.license_kind.clone(),
                az_group: host.az_group.clone(),
                hostname: hostname.map(|h| h.to_string()),
                ha_link_1_network_id: host.ha_link_1.network_id.clone(),
                ha_link_1_subnet_id: host.ha_link_1.subnet_id.clone(),
                ha_link_1_ip_address: host.ha_link_1.ip_address.clone(),
                ha_link_2_network_id: host.ha_link_2.network_id.clone(),
                ha_link_2_subnet_id: host.ha_link_2.subnet_id.clone(),
                ha_link_2_ip_address: host.ha_link_2.ip_address.clone(),
            })
            .collect()
    }
}

/// A single device as currently observed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObservedDevice {
    pub hostname: HostIdentity,
    pub category: DeviceCategory,
    pub operating_mode: String,
    pub license_kind: Option<String>,
    pub az_group: Option<String>,
    /// Observed only when interfaces are managed
    pub ports: Option<Vec<InterfaceSlot>>,
}

/// An HA pair as currently observed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObservedHaPair {
    pub pair: HaPair,
    pub operating_mode: String,
    pub license_kind: Option<String>,
    pub host_1: HaHostSpec,
    pub host_2: HaHostSpec,
    pub ports: Option<Vec<InterfaceSlot>>,
}

/// Whether the interface phase has to run to get from `from` to `to`
///
/// Slots are compared after padding. Moving from unmanaged to managed
/// interfaces always sends the full slot list.
fn ports_differ(
    from: Option<&[InterfaceSlot]>,
    to: Option<&[InterfaceSlot]>,
    layout: &PortLayout,
) -> ApplianceResult<bool> {
    let Some(to) = to else {
        return Ok(false);
    };
    match from {
        Some(from) => Ok(pad_slots(from, layout)? != pad_slots(to, layout)?),
        None => Ok(true),
    }
}

/// Drives create, read, update and delete of appliances
pub struct ProvisioningOrchestrator<C> {
    client: C,
    config: ProviderConfig,
    cancel: CancellationToken,
}

impl<C: OrderClient> ProvisioningOrchestrator<C> {
    pub fn new(client: C, config: ProviderConfig) -> Self {
        Self {
            client,
            config,
            cancel: CancellationToken::new(),
        }
    }

    /// Stop local waits when `cancel` fires
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn config(&self) -> &ProviderConfig {
        &self.config
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    fn layout(&self, category: DeviceCategory) -> PortLayout {
        self.config.port_layouts.layout(category)
    }

    /// Decoded inventory of one category
    pub async fn snapshot(
        &self,
        category: DeviceCategory,
        locale: Locale,
    ) -> ApplianceResult<Vec<InventoryRecord>> {
        let rows = self
            .client
            .list_inventory(&self.config.tenant_id, locale, category)
            .await?;
        decode_rows(&rows, &self.config.row_layout)
    }

    /// Submit an order and wait until it completes
    async fn run_order(
        &self,
        kind: OrderKind,
        category: DeviceCategory,
        locale: Locale,
        payload: &OrderPayload,
    ) -> ApplianceResult<OrderId> {
        let tenant_id = self.config.tenant_id.as_str();
        let order_id = self
            .client
            .submit_order(kind, tenant_id, locale, category, payload)
            .await?;
        info!("Submitted {} order {} for {}", kind, order_id, category);

        let waiter = StateWaiter::new(
            format!("{} order {}", kind, order_id),
            ORDER_PENDING,
            ORDER_TARGET,
            self.config.order_wait(kind),
        );
        let client = &self.client;
        let id = &order_id;
        waiter
            .wait(
                move || async move {
                    let status = client
                        .get_order_status(id, tenant_id, locale, category)
                        .await?;
                    if let Some(message) = &status.error {
                        return Err(ApplianceError::OrderFailed {
                            order_id: id.to_string(),
                            message: message.clone(),
                        });
                    }
                    debug!("Order {} at {}%", id, status.progress_rate);
                    let state = if status.is_complete() {
                        ORDER_TARGET[0]
                    } else {
                        ORDER_PENDING[0]
                    };
                    Ok(state.to_string())
                },
                &self.cancel,
            )
            .await?;

        info!("{} order {} completed", kind, order_id);
        Ok(order_id)
    }

    /// Submit one batched interface update and wait for its process to end
    async fn run_interface_update(
        &self,
        device: DeviceRef,
        requests: &[InterfaceSlotRequest],
    ) -> ApplianceResult<()> {
        let tenant_id = self.config.tenant_id.as_str();
        let process_id = self
            .client
            .update_interfaces(&device, tenant_id, requests)
            .await?;
        info!("Updating interfaces of {} (process {})", device, process_id);

        let waiter = StateWaiter::new(
            format!("interface update {}", process_id),
            PROCESS_PENDING,
            PROCESS_TARGET,
            self.config.process_wait(),
        );
        let client = &self.client;
        let id = &process_id;
        waiter
            .wait(
                move || async move {
                    let status = client.get_process_status(id, tenant_id).await?;
                    if status == PROCESS_ERROR {
                        return Err(ApplianceError::ProcessFailed {
                            process_id: id.to_string(),
                            status,
                        });
                    }
                    Ok(status)
                },
                &self.cancel,
            )
            .await?;
        Ok(())
    }

    async fn server_uuid(&self, hostname: &HostIdentity) -> ApplianceResult<String> {
        self.client
            .list_device_uuids(&self.config.tenant_id)
            .await?
            .into_iter()
            .find(|d| d.hostname == hostname.as_str())
            .map(|d| d.server_uuid)
            .ok_or_else(|| {
                ApplianceError::NotFound(format!("{} in the portal device listing", hostname))
            })
    }

    async fn interfaces_of(&self, hostname: &HostIdentity) -> ApplianceResult<Vec<DeviceInterface>> {
        let server_uuid = self.server_uuid(hostname).await?;
        self.client
            .list_device_interfaces(&server_uuid, &self.config.tenant_id)
            .await
    }

    async fn apply_single_ports(
        &self,
        hostname: &HostIdentity,
        category: DeviceCategory,
        ports: &[InterfaceSlot],
    ) -> ApplianceResult<()> {
        let requests = slot_requests(ports, &self.layout(category))?;
        let server_uuid = self.server_uuid(hostname).await?;
        self.run_interface_update(DeviceRef::Uuid(server_uuid), &requests)
            .await
    }

    async fn apply_ha_ports(&self, pair: &HaPair, ports: &[InterfaceSlot]) -> ApplianceResult<()> {
        let requests = ha_slot_requests(ports, &self.layout(DeviceCategory::Ha))?;
        self.run_interface_update(DeviceRef::Hostname(pair.host_1.to_string()), &requests)
            .await
    }

    /// Provision a single device and resolve its hostname
    pub async fn create_single(
        &self,
        variant: ApplianceVariant,
        spec: &DeviceSpec,
    ) -> ApplianceResult<HostIdentity> {
        let category = spec.category()?;
        variant.check_category(category)?;
        if let Some(ports) = &spec.ports {
            pad_slots(ports, &self.layout(category))?;
        }

        let before = self.snapshot(category, spec.locale).await?;
        let payload = OrderPayload {
            hosts: vec![spec.host_order(None)],
        };
        self.run_order(OrderKind::Create, category, spec.locale, &payload)
            .await?;
        let after = self.snapshot(category, spec.locale).await?;

        let is_category = |r: &InventoryRecord| category.matches_device_type(&r.device_type);
        let mut identities =
            resolve_new(&before, &after, hostname_key, Some(is_category)).expect_exactly(1)?;
        let Some(hostname) = identities.pop() else {
            return Err(ApplianceError::NoNewIdentity {
                before: before.len(),
                after: after.len(),
            });
        };
        info!("Resolved new {} device {}", category, hostname);

        if let Some(ports) = &spec.ports {
            self.apply_single_ports(&hostname, category, ports)
                .await
                .map_err(|e| ApplianceError::Partial {
                    identity: hostname.to_string(),
                    source: Box::new(e),
                })?;
        }
        Ok(hostname)
    }

    /// Provision an HA pair and bind its two hostnames
    pub async fn create_ha(&self, spec: &HaSpec) -> ApplianceResult<HaPair> {
        let category = DeviceCategory::from_operating_mode(&spec.operating_mode)?;
        ApplianceVariant::Ha.check_category(category)?;
        if let Some(ports) = &spec.ports {
            pad_slots(ports, &self.layout(category))?;
        }

        let before = self.snapshot(category, spec.locale).await?;
        let payload = OrderPayload {
            hosts: spec.host_orders(None),
        };
        self.run_order(OrderKind::Create, category, spec.locale, &payload)
            .await?;
        let after = self.snapshot(category, spec.locale).await?;

        let pair = resolve_pair(&before, &after)?;
        info!("Resolved new HA pair {}", pair);

        if let Some(ports) = &spec.ports {
            self.apply_ha_ports(&pair, ports)
                .await
                .map_err(|e| ApplianceError::Partial {
                    identity: pair.to_string(),
                    source: Box::new(e),
                })?;
        }
        Ok(pair)
    }

    /// Observe a single device by its exact hostname
    ///
    /// `hint` is the category the device was last seen under; the remaining
    /// categories of the variant are searched after it. `applied_ports` is the
    /// last applied interface configuration; `None` skips the portal lookup.
    pub async fn read_single(
        &self,
        variant: ApplianceVariant,
        hostname: &HostIdentity,
        hint: Option<DeviceCategory>,
        locale: Locale,
        applied_ports: Option<&[InterfaceSlot]>,
    ) -> ApplianceResult<Option<ObservedDevice>> {
        let mut candidates: Vec<DeviceCategory> = hint.into_iter().collect();
        candidates.extend(variant.categories().iter().filter(|c| Some(**c) != hint));

        for category in candidates {
            let records = self.snapshot(category, locale).await?;
            let Some(record) = find_by_hostname(&records, hostname) else {
                continue;
            };

            let ports = match applied_ports {
                Some(applied) => {
                    let interfaces = self.interfaces_of(hostname).await?;
                    Some(observed_slots(&interfaces, applied, &self.layout(category))?)
                }
                None => None,
            };
            return Ok(Some(ObservedDevice {
                hostname: hostname.clone(),
                category,
                operating_mode: record.device_type.clone(),
                license_kind: record.license_kind.clone(),
                az_group: record.az_group.clone(),
                ports,
            }));
        }

        debug!("{} not found in inventory", hostname);
        Ok(None)
    }

    /// Observe an HA pair; `None` unless both hosts are listed
    pub async fn read_ha(
        &self,
        pair: &HaPair,
        locale: Locale,
        applied_ports: Option<&[InterfaceSlot]>,
    ) -> ApplianceResult<Option<ObservedHaPair>> {
        let records = self.snapshot(DeviceCategory::Ha, locale).await?;
        let (Some(record_1), Some(record_2)) = (
            find_by_hostname(&records, &pair.host_1),
            find_by_hostname(&records, &pair.host_2),
        ) else {
            debug!("HA pair {} not found in inventory", pair);
            return Ok(None);
        };

        let ports = match applied_ports {
            Some(applied) => {
                let interfaces_1 = self.interfaces_of(&pair.host_1).await?;
                let interfaces_2 = self.interfaces_of(&pair.host_2).await?;
                Some(observed_ha_slots(
                    &interfaces_1,
                    &interfaces_2,
                    applied,
                    &self.layout(DeviceCategory::Ha),
                )?)
            }
            None => None,
        };

        Ok(Some(ObservedHaPair {
            pair: pair.clone(),
            operating_mode: record_1.device_type.clone(),
            license_kind: record_1.license_kind.clone(),
            host_1: HaHostSpec::from_record(record_1),
            host_2: HaHostSpec::from_record(record_2),
            ports,
        }))
    }

    /// Bring a single device from `from` to `to`
    ///
    /// The order phase and the interface phase run independently; a failure
    /// in the interface phase leaves a completed order phase in place.
    pub async fn update_single(
        &self,
        variant: ApplianceVariant,
        hostname: &HostIdentity,
        from: &DeviceSpec,
        to: &DeviceSpec,
    ) -> ApplianceResult<()> {
        let current = from.category()?;
        let desired = to.category()?;
        variant.check_category(desired)?;
        if self.layout(current).slots != self.layout(desired).slots {
            return Err(ApplianceError::invalid_config(format!(
                "changing {} from {} to {} requires replacement",
                hostname, current, desired
            )));
        }
        let layout = self.layout(desired);

        let ports_changed = ports_differ(from.ports.as_deref(), to.ports.as_deref(), &layout)?;

        let order_applied = if to.order_fields_differ(from) {
            let payload = OrderPayload {
                hosts: vec![to.host_order(Some(hostname))],
            };
            self.run_order(OrderKind::Update, current, to.locale, &payload)
                .await?;
            true
        } else {
            false
        };

        if ports_changed && let Some(ports) = &to.ports {
            if let Err(e) = self.apply_single_ports(hostname, desired, ports).await {
                if order_applied {
                    warn!("{}: order update applied but interface update failed", hostname);
                }
                return Err(e);
            }
        }
        Ok(())
    }

    /// Bring an HA pair from `from` to `to`
    pub async fn update_ha(&self, pair: &HaPair, from: &HaSpec, to: &HaSpec) -> ApplianceResult<()> {
        let desired = DeviceCategory::from_operating_mode(&to.operating_mode)?;
        ApplianceVariant::Ha.check_category(desired)?;
        let layout = self.layout(desired);

        let ports_changed = ports_differ(from.ports.as_deref(), to.ports.as_deref(), &layout)?;

        let order_applied = if to.order_fields_differ(from) {
            let payload = OrderPayload {
                hosts: to.host_orders(Some(pair)),
            };
            self.run_order(OrderKind::Update, desired, to.locale, &payload)
                .await?;
            true
        } else {
            false
        };

        if ports_changed && let Some(ports) = &to.ports {
            if let Err(e) = self.apply_ha_ports(pair, ports).await {
                if order_applied {
                    warn!("{}: order update applied but interface update failed", pair);
                }
                return Err(e);
            }
        }
        Ok(())
    }

    /// Remove a single device
    pub async fn delete_single(&self, hostname: &HostIdentity, spec: &DeviceSpec) -> ApplianceResult<()> {
        let category = spec.category()?;
        let payload = OrderPayload {
            hosts: vec![spec.host_order(Some(hostname))],
        };
        self.run_order(OrderKind::Delete, category, spec.locale, &payload)
            .await?;
        info!("Deleted {} device {}", category, hostname);
        Ok(())
    }

    /// Remove both devices of an HA pair
    pub async fn delete_ha(&self, pair: &HaPair, spec: &HaSpec) -> ApplianceResult<()> {
        let payload = OrderPayload {
            hosts: spec.host_orders(Some(pair)),
        };
        self.run_order(OrderKind::Delete, DeviceCategory::Ha, spec.locale, &payload)
            .await?;
        info!("Deleted HA pair {}", pair);
        Ok(())
    }
}
