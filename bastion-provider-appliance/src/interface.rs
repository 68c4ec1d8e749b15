//! Interface slot reconciliation
//!
//! Users describe interfaces as an ordered list of logical slots. The portal
//! API addresses physical ports as `portN`, where the first configurable port
//! number depends on the device type. This module maps between the two.

use std::sync::LazyLock;

use regex::Regex;

use crate::client::{DeviceInterface, InterfaceSlotRequest};
use crate::error::{ApplianceError, ApplianceResult};
use crate::types::DeviceCategory;

static PORT_ID: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(r"^port(\d+)$").ok());

/// Physical addressing of the configurable ports of one device type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PortLayout {
    /// Port number of logical slot 0
    pub offset: u32,
    /// Number of configurable slots
    pub slots: usize,
}

impl PortLayout {
    pub const fn new(offset: u32, slots: usize) -> Self {
        Self { offset, slots }
    }
}

/// Port layouts keyed by device category
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PortLayoutTable {
    pub fw: PortLayout,
    pub utm: PortLayout,
    pub waf: PortLayout,
    pub ha: PortLayout,
}

impl Default for PortLayoutTable {
    fn default() -> Self {
        Self {
            fw: PortLayout::new(4, 7),
            utm: PortLayout::new(4, 7),
            waf: PortLayout::new(2, 1),
            ha: PortLayout::new(4, 7),
        }
    }
}

impl PortLayoutTable {
    pub fn layout(&self, category: DeviceCategory) -> PortLayout {
        match category {
            DeviceCategory::Fw => self.fw,
            DeviceCategory::Utm => self.utm,
            DeviceCategory::Waf => self.waf,
            DeviceCategory::Ha => self.ha,
        }
    }
}

/// Desired (or observed) configuration of one logical interface slot
///
/// Single devices use `ip_address`; HA pairs use `host_1_ip_address`,
/// `host_2_ip_address` and the VRRP fields.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InterfaceSlot {
    pub enabled: bool,
    pub ip_address: Option<String>,
    pub prefix_length: Option<u8>,
    pub network_id: Option<String>,
    pub subnet_id: Option<String>,
    pub mtu: Option<u32>,
    pub comment: Option<String>,
    pub host_1_ip_address: Option<String>,
    pub host_2_ip_address: Option<String>,
    pub vrrp_ip_address: Option<String>,
    pub vrrp_id: Option<u32>,
}

impl InterfaceSlot {
    pub fn disabled() -> Self {
        Self::default()
    }
}

/// Numeric suffix of a `portN` identifier
pub fn port_number(msa_port_id: &str) -> ApplianceResult<u32> {
    let captures = PORT_ID
        .as_ref()
        .and_then(|re| re.captures(msa_port_id))
        .ok_or_else(|| ApplianceError::PortParse {
            port_id: msa_port_id.to_string(),
            reason: "expected \"port\" followed by a number".to_string(),
        })?;
    captures[1]
        .parse::<u32>()
        .map_err(|e| ApplianceError::PortParse {
            port_id: msa_port_id.to_string(),
            reason: e.to_string(),
        })
}

/// Logical slot index of a physical port
///
/// `index = port number - offset`; anything outside `0..slots` is rejected.
pub fn port_index(msa_port_id: &str, layout: &PortLayout) -> ApplianceResult<usize> {
    let index = i64::from(port_number(msa_port_id)?) - i64::from(layout.offset);
    if index < 0 || index >= layout.slots as i64 {
        return Err(ApplianceError::PortIndexOutOfRange {
            port_id: msa_port_id.to_string(),
            index,
            slots: layout.slots,
        });
    }
    Ok(index as usize)
}

/// Physical port identifier of a logical slot
pub fn port_id(index: usize, layout: &PortLayout) -> String {
    format!("port{}", index as u64 + u64::from(layout.offset))
}

/// Place observed interfaces into their slots, rejecting collisions
fn index_interfaces<'a>(
    observed: &'a [DeviceInterface],
    layout: &PortLayout,
) -> ApplianceResult<Vec<Option<&'a DeviceInterface>>> {
    let mut slots: Vec<Option<&DeviceInterface>> = vec![None; layout.slots];
    for iface in observed {
        let index = port_index(&iface.msa_port_id, layout)?;
        if let Some(previous) = slots[index].replace(iface) {
            return Err(ApplianceError::PortIndexCollision {
                index,
                first: previous.msa_port_id.clone(),
                second: iface.msa_port_id.clone(),
            });
        }
    }
    Ok(slots)
}

fn non_empty(s: &str) -> Option<String> {
    if s.is_empty() {
        None
    } else {
        Some(s.to_string())
    }
}

/// Build an observed slot, carrying over settings the portal does not report
fn observed_slot(iface: &DeviceInterface, applied: Option<&InterfaceSlot>) -> InterfaceSlot {
    InterfaceSlot {
        enabled: true,
        network_id: non_empty(&iface.os_network_id),
        subnet_id: non_empty(&iface.os_subnet_id),
        prefix_length: applied.and_then(|s| s.prefix_length),
        mtu: applied.and_then(|s| s.mtu),
        comment: applied.and_then(|s| s.comment.clone()),
        ..Default::default()
    }
}

/// Reconstruct the slot list of a single device from its interfaces
///
/// `applied` is the previously applied desired configuration; prefix length,
/// MTU and comment are taken from it since the portal API does not return
/// them. Slots without an observed interface are disabled.
pub fn observed_slots(
    observed: &[DeviceInterface],
    applied: &[InterfaceSlot],
    layout: &PortLayout,
) -> ApplianceResult<Vec<InterfaceSlot>> {
    let indexed = index_interfaces(observed, layout)?;

    Ok(indexed
        .iter()
        .enumerate()
        .map(|(index, iface)| match iface {
            Some(iface) => InterfaceSlot {
                ip_address: non_empty(&iface.os_ip_address),
                ..observed_slot(iface, applied.get(index))
            },
            None => InterfaceSlot::disabled(),
        })
        .collect())
}

/// Reconstruct the slot list of an HA pair from both hosts' interfaces
///
/// Host 1 decides whether a slot is enabled. Host 2's interface is matched by
/// slot index and must carry the same port id.
pub fn observed_ha_slots(
    host_1: &[DeviceInterface],
    host_2: &[DeviceInterface],
    applied: &[InterfaceSlot],
    layout: &PortLayout,
) -> ApplianceResult<Vec<InterfaceSlot>> {
    let indexed_1 = index_interfaces(host_1, layout)?;
    let indexed_2 = index_interfaces(host_2, layout)?;

    Ok(indexed_1
        .iter()
        .zip(indexed_2.iter())
        .enumerate()
        .map(|(index, (iface_1, iface_2))| match iface_1 {
            Some(iface_1) => {
                let applied = applied.get(index);
                let host_2_ip = iface_2
                    .filter(|iface_2| iface_2.msa_port_id == iface_1.msa_port_id)
                    .and_then(|iface_2| non_empty(&iface_2.os_ip_address));
                InterfaceSlot {
                    host_1_ip_address: non_empty(&iface_1.os_ip_address),
                    host_2_ip_address: host_2_ip,
                    vrrp_ip_address: applied.and_then(|s| s.vrrp_ip_address.clone()),
                    vrrp_id: applied.and_then(|s| s.vrrp_id),
                    ..observed_slot(iface_1, applied)
                }
            }
            None => InterfaceSlot::disabled(),
        })
        .collect())
}

/// Pad a desired slot list to the layout's slot count
pub fn pad_slots(
    desired: &[InterfaceSlot],
    layout: &PortLayout,
) -> ApplianceResult<Vec<InterfaceSlot>> {
    if desired.len() > layout.slots {
        return Err(ApplianceError::invalid_config(format!(
            "{} interface slots given but the device has {}",
            desired.len(),
            layout.slots
        )));
    }
    let mut slots = desired.to_vec();
    slots.resize_with(layout.slots, InterfaceSlot::disabled);
    Ok(slots)
}

fn with_prefix(
    index: usize,
    field: &str,
    ip: Option<&String>,
    prefix: Option<u8>,
) -> ApplianceResult<String> {
    let ip = ip.ok_or_else(|| {
        ApplianceError::invalid_config(format!("slot {} is enabled but has no {}", index, field))
    })?;
    let prefix = prefix.ok_or_else(|| {
        ApplianceError::invalid_config(format!("slot {} is enabled but has no prefix length", index))
    })?;
    if prefix > 32 {
        return Err(ApplianceError::invalid_config(format!(
            "slot {} has prefix length {}, must be at most 32",
            index, prefix
        )));
    }
    Ok(format!("{}/{}", ip, prefix))
}

fn base_request(slot: &InterfaceSlot) -> InterfaceSlotRequest {
    InterfaceSlotRequest {
        enable: true,
        network_id: slot.network_id.clone(),
        subnet_id: slot.subnet_id.clone(),
        mtu: slot.mtu,
        comment: slot.comment.clone(),
        ..Default::default()
    }
}

/// Build the batched interface update of a single device
///
/// One request per slot, in slot order: disabled slots are sent as disabled,
/// enabled slots carry `ip/prefix` plus network, subnet, MTU and comment.
pub fn slot_requests(
    desired: &[InterfaceSlot],
    layout: &PortLayout,
) -> ApplianceResult<Vec<InterfaceSlotRequest>> {
    pad_slots(desired, layout)?
        .iter()
        .enumerate()
        .map(|(index, slot)| {
            if !slot.enabled {
                return Ok(InterfaceSlotRequest::default());
            }
            Ok(InterfaceSlotRequest {
                ip_address: Some(with_prefix(
                    index,
                    "ip address",
                    slot.ip_address.as_ref(),
                    slot.prefix_length,
                )?),
                ..base_request(slot)
            })
        })
        .collect()
}

/// Build the batched interface update of an HA pair
pub fn ha_slot_requests(
    desired: &[InterfaceSlot],
    layout: &PortLayout,
) -> ApplianceResult<Vec<InterfaceSlotRequest>> {
    pad_slots(desired, layout)?
        .iter()
        .enumerate()
        .map(|(index, slot)| {
            if !slot.enabled {
                return Ok(InterfaceSlotRequest::default());
            }
            Ok(InterfaceSlotRequest {
                host_1_ip_address: Some(with_prefix(
                    index,
                    "host 1 ip address",
                    slot.host_1_ip_address.as_ref(),
                    slot.prefix_length,
                )?),
                host_2_ip_address: Some(with_prefix(
                    index,
                    "host 2 ip address",
                    slot.host_2_ip_address.as_ref(),
                    slot.prefix_length,
                )?),
                vrrp_ip_address: slot.vrrp_ip_address.clone(),
                vrrp_id: slot.vrrp_id,
                ..base_request(slot)
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const FW: PortLayout = PortLayout::new(4, 7);
    const WAF: PortLayout = PortLayout::new(2, 1);

    fn iface(port: &str, ip: &str) -> DeviceInterface {
        DeviceInterface {
            msa_port_id: port.to_string(),
            os_ip_address: ip.to_string(),
            os_network_id: format!("net-{}", port),
            os_subnet_id: format!("sub-{}", port),
            ..Default::default()
        }
    }

    #[test]
    fn test_port_pattern_compiles() {
        assert!(PORT_ID.is_some());
    }

    fn enabled(ip: &str, prefix: u8) -> InterfaceSlot {
        InterfaceSlot {
            enabled: true,
            ip_address: Some(ip.to_string()),
            prefix_length: Some(prefix),
            network_id: Some("net-1".to_string()),
            subnet_id: Some("sub-1".to_string()),
            mtu: Some(1500),
            comment: Some("uplink".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_default_layout_table() {
        let table = PortLayoutTable::default();
        assert_eq!(table.layout(DeviceCategory::Fw), PortLayout::new(4, 7));
        assert_eq!(table.layout(DeviceCategory::Utm), PortLayout::new(4, 7));
        assert_eq!(table.layout(DeviceCategory::Ha), PortLayout::new(4, 7));
        assert_eq!(table.layout(DeviceCategory::Waf), PortLayout::new(2, 1));
    }

    #[test]
    fn test_port_index_mapping() {
        assert_eq!(port_index("port4", &FW).unwrap(), 0);
        assert_eq!(port_index("port10", &FW).unwrap(), 6);
        assert_eq!(port_index("port2", &WAF).unwrap(), 0);
    }

    #[test]
    fn test_port_index_rejects_negative() {
        let err = port_index("port3", &FW).unwrap_err();
        assert!(matches!(
            err,
            ApplianceError::PortIndexOutOfRange { index: -1, .. }
        ));
    }

    #[test]
    fn test_port_index_rejects_past_last_slot() {
        assert!(matches!(
            port_index("port11", &FW),
            Err(ApplianceError::PortIndexOutOfRange { index: 7, .. })
        ));
        assert!(port_index("port3", &WAF).is_err());
    }

    #[test]
    fn test_port_index_rejects_malformed_ids() {
        for bad in ["port", "eth4", "port-1", "port4a", "", "PORT4"] {
            assert!(
                matches!(port_index(bad, &FW), Err(ApplianceError::PortParse { .. })),
                "{} should not parse",
                bad
            );
        }
    }

    #[test]
    fn test_port_id_is_inverse_of_port_index() {
        for index in 0..FW.slots {
            assert_eq!(port_index(&port_id(index, &FW), &FW).unwrap(), index);
        }
        assert_eq!(port_id(0, &WAF), "port2");
    }

    #[test]
    fn test_observed_slots_fill_matching_index() {
        let observed = vec![iface("port6", "10.0.2.1"), iface("port4", "10.0.0.1")];
        let slots = observed_slots(&observed, &[], &FW).unwrap();

        assert_eq!(slots.len(), 7);
        assert!(slots[0].enabled);
        assert_eq!(slots[0].ip_address.as_deref(), Some("10.0.0.1"));
        assert_eq!(slots[0].network_id.as_deref(), Some("net-port4"));
        assert!(!slots[1].enabled);
        assert_eq!(slots[1], InterfaceSlot::disabled());
        assert_eq!(slots[2].ip_address.as_deref(), Some("10.0.2.1"));
    }

    #[test]
    fn test_observed_slots_keep_applied_settings() {
        let applied = vec![enabled("10.0.0.51", 24)];
        let observed = vec![iface("port4", "10.0.0.51")];

        let slots = observed_slots(&observed, &applied, &FW).unwrap();
        assert_eq!(slots[0].prefix_length, Some(24));
        assert_eq!(slots[0].mtu, Some(1500));
        assert_eq!(slots[0].comment.as_deref(), Some("uplink"));
    }

    #[test]
    fn test_observed_slots_reject_collisions() {
        let observed = vec![iface("port4", "10.0.0.1"), iface("port4", "10.0.0.2")];
        let err = observed_slots(&observed, &[], &FW).unwrap_err();
        assert!(matches!(
            err,
            ApplianceError::PortIndexCollision { index: 0, .. }
        ));
    }

    #[test]
    fn test_observed_slots_reject_out_of_range() {
        let observed = vec![iface("port3", "10.0.0.1")];
        assert!(observed_slots(&observed, &[], &WAF).is_err());
    }

    #[test]
    fn test_observed_ha_slots_correlate_hosts() {
        let applied = vec![InterfaceSlot {
            enabled: true,
            host_1_ip_address: Some("192.168.1.50".to_string()),
            host_2_ip_address: Some("192.168.1.51".to_string()),
            prefix_length: Some(24),
            vrrp_ip_address: Some("10.0.0.50".to_string()),
            vrrp_id: Some(10),
            ..Default::default()
        }];
        let host_1 = vec![iface("port4", "192.168.1.50"), iface("port5", "192.168.2.50")];
        let host_2 = vec![iface("port5", "192.168.2.51"), iface("port4", "192.168.1.51")];

        let slots = observed_ha_slots(&host_1, &host_2, &applied, &FW).unwrap();
        assert_eq!(slots[0].host_1_ip_address.as_deref(), Some("192.168.1.50"));
        assert_eq!(slots[0].host_2_ip_address.as_deref(), Some("192.168.1.51"));
        assert_eq!(slots[0].vrrp_ip_address.as_deref(), Some("10.0.0.50"));
        assert_eq!(slots[0].vrrp_id, Some(10));
        assert_eq!(slots[1].host_2_ip_address.as_deref(), Some("192.168.2.51"));
        assert_eq!(slots[1].vrrp_id, None);
        assert!(!slots[2].enabled);
    }

    #[test]
    fn test_observed_ha_slots_missing_host_2_interface() {
        let host_1 = vec![iface("port4", "192.168.1.50")];
        let slots = observed_ha_slots(&host_1, &[], &[], &FW).unwrap();
        assert!(slots[0].enabled);
        assert_eq!(slots[0].host_2_ip_address, None);
    }

    #[test]
    fn test_slot_requests_cover_every_slot() {
        let requests = slot_requests(&[enabled("10.0.0.51", 24)], &FW).unwrap();

        assert_eq!(requests.len(), 7);
        assert!(requests[0].enable);
        assert_eq!(requests[0].ip_address.as_deref(), Some("10.0.0.51/24"));
        assert_eq!(requests[0].network_id.as_deref(), Some("net-1"));
        assert_eq!(requests[0].mtu, Some(1500));
        assert_eq!(requests[0].comment.as_deref(), Some("uplink"));
        assert!(requests[1..].iter().all(|r| !r.enable && r.ip_address.is_none()));
    }

    #[test]
    fn test_slot_requests_reject_too_many_slots() {
        let desired = vec![enabled("10.0.0.1", 24), enabled("10.0.1.1", 24)];
        assert!(matches!(
            slot_requests(&desired, &WAF),
            Err(ApplianceError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_slot_requests_require_prefix() {
        let mut slot = enabled("10.0.0.1", 24);
        slot.prefix_length = None;
        assert!(slot_requests(&[slot], &FW).is_err());

        assert!(slot_requests(&[enabled("10.0.0.1", 33)], &FW).is_err());
    }

    #[test]
    fn test_ha_slot_requests() {
        let desired = vec![InterfaceSlot {
            enabled: true,
            host_1_ip_address: Some("192.168.1.50".to_string()),
            host_2_ip_address: Some("192.168.1.51".to_string()),
            prefix_length: Some(24),
            network_id: Some("net-1".to_string()),
            subnet_id: Some("sub-1".to_string()),
            vrrp_ip_address: Some("10.0.0.50".to_string()),
            vrrp_id: Some(10),
            ..Default::default()
        }];

        let requests = ha_slot_requests(&desired, &FW).unwrap();
        assert_eq!(requests.len(), 7);
        assert_eq!(
            requests[0].host_1_ip_address.as_deref(),
            Some("192.168.1.50/24")
        );
        assert_eq!(
            requests[0].host_2_ip_address.as_deref(),
            Some("192.168.1.51/24")
        );
        assert_eq!(requests[0].vrrp_ip_address.as_deref(), Some("10.0.0.50"));
        assert_eq!(requests[0].ip_address, None);
    }

    #[test]
    fn test_ip_survives_request_and_observation() {
        let desired = vec![enabled("10.0.0.51", 24)];
        let requests = slot_requests(&desired, &FW).unwrap();
        assert_eq!(requests[0].ip_address.as_deref(), Some("10.0.0.51/24"));

        // the device reports the bare address back on the first port
        let observed = vec![DeviceInterface {
            msa_port_id: port_id(0, &FW),
            os_ip_address: "10.0.0.51".to_string(),
            ..Default::default()
        }];
        let slots = observed_slots(&observed, &desired, &FW).unwrap();
        assert_eq!(slots[0].ip_address.as_deref(), Some("10.0.0.51"));
        assert_eq!(slots[0].prefix_length, Some(24));
    }
}
