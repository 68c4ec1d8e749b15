//! Order and portal API contract
//!
//! The engine talks to two remote surfaces: the order API, which provisions
//! devices asynchronously and lists the tenant's inventory, and the portal
//! API, which manages device interfaces. HTTP plumbing and authentication live
//! behind this trait; implementations report transport failures as
//! `ApplianceError::Api`.

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ApplianceResult;
use crate::inventory::RawInventoryRow;
use crate::types::{DeviceCategory, Locale, OrderKind};

/// Opaque order identifier returned by the order API
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderId(pub String);

impl fmt::Display for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Opaque process identifier returned by the portal API
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProcessId(pub String);

impl fmt::Display for ProcessId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Point-in-time progress of an order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderStatus {
    /// 0 to 100; the order is complete at 100
    pub progress_rate: u8,
    /// Set when the order API reports a terminal failure
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl OrderStatus {
    pub fn in_progress(progress_rate: u8) -> Self {
        Self {
            progress_rate,
            error: None,
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            progress_rate: 0,
            error: Some(message.into()),
        }
    }

    pub fn is_complete(&self) -> bool {
        self.error.is_none() && self.progress_rate >= 100
    }
}

/// Per-host entry of an order body
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostOrder {
    #[serde(rename = "operatingmode")]
    pub operating_mode: String,
    #[serde(rename = "licensekind")]
    pub license_kind: String,
    #[serde(rename = "azgroup", skip_serializing_if = "Option::is_none")]
    pub az_group: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hostname: Option<String>,
    #[serde(rename = "halink1networkid", skip_serializing_if = "Option::is_none")]
    pub ha_link_1_network_id: Option<String>,
    #[serde(rename = "halink1subnetid", skip_serializing_if = "Option::is_none")]
    pub ha_link_1_subnet_id: Option<String>,
    #[serde(rename = "halink1ipaddress", skip_serializing_if = "Option::is_none")]
    pub ha_link_1_ip_address: Option<String>,
    #[serde(rename = "halink2networkid", skip_serializing_if = "Option::is_none")]
    pub ha_link_2_network_id: Option<String>,
    #[serde(rename = "halink2subnetid", skip_serializing_if = "Option::is_none")]
    pub ha_link_2_subnet_id: Option<String>,
    #[serde(rename = "halink2ipaddress", skip_serializing_if = "Option::is_none")]
    pub ha_link_2_ip_address: Option<String>,
}

/// Body of a create, update or delete order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderPayload {
    #[serde(rename = "gt_host")]
    pub hosts: Vec<HostOrder>,
}

/// Hostname to server UUID mapping from the portal device listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceUuid {
    pub hostname: String,
    pub server_uuid: String,
}

/// Physical interface of a device as reported by the portal API
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceInterface {
    #[serde(rename = "msaPortID")]
    pub msa_port_id: String,
    #[serde(rename = "osIPAddress", default)]
    pub os_ip_address: String,
    #[serde(rename = "osNetworkID", default)]
    pub os_network_id: String,
    #[serde(rename = "osSubnetID", default)]
    pub os_subnet_id: String,
    #[serde(rename = "osPortID", default)]
    pub os_port_id: String,
    #[serde(rename = "osMACAddress", default)]
    pub os_mac_address: String,
}

/// One slot of a batched interface update
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterfaceSlotRequest {
    pub enable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ip_address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub network_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subnet_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mtu: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub host_1_ip_address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub host_2_ip_address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vrrp_ip_address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vrrp_id: Option<u32>,
}

/// How the portal API addresses a device
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceRef {
    /// Internal server UUID (single devices)
    Uuid(String),
    /// Hostname of host 1 (HA pairs)
    Hostname(String),
}

impl fmt::Display for DeviceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceRef::Uuid(uuid) => write!(f, "server {}", uuid),
            DeviceRef::Hostname(hostname) => write!(f, "host {}", hostname),
        }
    }
}

/// Client for the order and portal APIs
#[async_trait]
pub trait OrderClient: Send + Sync {
    /// List the tenant's devices of one category (all pages, flattened)
    async fn list_inventory(
        &self,
        tenant_id: &str,
        locale: Locale,
        category: DeviceCategory,
    ) -> ApplianceResult<Vec<RawInventoryRow>>;

    /// Submit an order; only an order identifier comes back
    async fn submit_order(
        &self,
        kind: OrderKind,
        tenant_id: &str,
        locale: Locale,
        category: DeviceCategory,
        payload: &OrderPayload,
    ) -> ApplianceResult<OrderId>;

    /// Current progress of an order
    async fn get_order_status(
        &self,
        order_id: &OrderId,
        tenant_id: &str,
        locale: Locale,
        category: DeviceCategory,
    ) -> ApplianceResult<OrderStatus>;

    /// Hostname to server UUID mappings from the portal API
    async fn list_device_uuids(&self, tenant_id: &str) -> ApplianceResult<Vec<DeviceUuid>>;

    /// Interfaces attached to a device
    async fn list_device_interfaces(
        &self,
        server_uuid: &str,
        tenant_id: &str,
    ) -> ApplianceResult<Vec<DeviceInterface>>;

    /// Replace the interface configuration of a device in one batch
    async fn update_interfaces(
        &self,
        device: &DeviceRef,
        tenant_id: &str,
        slots: &[InterfaceSlotRequest],
    ) -> ApplianceResult<ProcessId>;

    /// Current status of an interface update process (`RUNNING`, `ENDED`, ...)
    async fn get_process_status(
        &self,
        process_id: &ProcessId,
        tenant_id: &str,
    ) -> ApplianceResult<String>;
}
