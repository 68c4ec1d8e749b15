//! Resource types and attribute mapping for appliances
//!
//! This module defines:
//! - Resource type definitions (implementing ResourceType trait)
//! - Conversion between attribute maps and orchestrator specs

use std::collections::HashMap;

use bastion_core::provider::ResourceType;
use bastion_core::resource::Value;

use crate::error::{ApplianceError, ApplianceResult};
use crate::interface::InterfaceSlot;
use crate::inventory::HaLink;
use crate::orchestrator::{DeviceSpec, HaHostSpec, HaSpec, ObservedDevice, ObservedHaPair};
use crate::types::{ApplianceVariant, DeviceCategory, Locale};

// =============================================================================
// Resource Type Definitions
// =============================================================================

macro_rules! define_resource_type {
    ($name:ident, $type_name:expr) => {
        pub struct $name;
        impl ResourceType for $name {
            fn name(&self) -> &'static str {
                $type_name
            }
        }
    };
}

define_resource_type!(DeviceSingleType, "network_based_device_single");
define_resource_type!(DeviceHaType, "network_based_device_ha");
define_resource_type!(FirewallUtmSingleType, "network_based_firewall_utm_single");

/// Returns all resource types supported by this provider
pub fn resource_types() -> Vec<Box<dyn ResourceType>> {
    vec![
        Box::new(DeviceSingleType),
        Box::new(DeviceHaType),
        Box::new(FirewallUtmSingleType),
    ]
}

/// Appliance variant behind a resource type name
pub fn variant_for(resource_type: &str) -> Option<ApplianceVariant> {
    match resource_type {
        "network_based_device_single" => Some(ApplianceVariant::Single),
        "network_based_device_ha" => Some(ApplianceVariant::Ha),
        "network_based_firewall_utm_single" => Some(ApplianceVariant::FirewallUtmSingle),
        _ => None,
    }
}

// =============================================================================
// Attribute Names
// =============================================================================

pub const OPERATING_MODE: &str = "operating_mode";
pub const LICENSE_KIND: &str = "license_kind";
pub const AZ_GROUP: &str = "az_group";
pub const LOCALE: &str = "locale";
pub const PORTS: &str = "ports";
pub const HOST_1_AZ_GROUP: &str = "host_1_az_group";
pub const HOST_2_AZ_GROUP: &str = "host_2_az_group";
pub const HA_LINK_1: &str = "ha_link_1";
pub const HA_LINK_2: &str = "ha_link_2";
/// Category the device was last seen under; internal, never diffed
pub const CATEGORY_HINT: &str = "_category";

// =============================================================================
// Attribute Map -> Spec
// =============================================================================

fn get_string(attrs: &HashMap<String, Value>, key: &str) -> ApplianceResult<Option<String>> {
    match attrs.get(key) {
        None => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(other) => Err(ApplianceError::invalid_config(format!(
            "{} must be a string, got {:?}",
            key, other
        ))),
    }
}

fn require_string(attrs: &HashMap<String, Value>, key: &str) -> ApplianceResult<String> {
    get_string(attrs, key)?
        .ok_or_else(|| ApplianceError::invalid_config(format!("{} is required", key)))
}

fn get_int<T: TryFrom<i64>>(attrs: &HashMap<String, Value>, key: &str) -> ApplianceResult<Option<T>> {
    match attrs.get(key) {
        None => Ok(None),
        Some(Value::Int(i)) => T::try_from(*i).map(Some).map_err(|_| {
            ApplianceError::invalid_config(format!("{} is out of range: {}", key, i))
        }),
        Some(other) => Err(ApplianceError::invalid_config(format!(
            "{} must be an integer, got {:?}",
            key, other
        ))),
    }
}

fn get_map<'a>(
    attrs: &'a HashMap<String, Value>,
    key: &str,
) -> ApplianceResult<Option<&'a HashMap<String, Value>>> {
    match attrs.get(key) {
        None => Ok(None),
        Some(Value::Map(map)) => Ok(Some(map)),
        Some(other) => Err(ApplianceError::invalid_config(format!(
            "{} must be a map, got {:?}",
            key, other
        ))),
    }
}

/// Locale attribute, falling back to the provider default
pub fn locale_from_attributes(attrs: &HashMap<String, Value>, default: Locale) -> ApplianceResult<Locale> {
    match get_string(attrs, LOCALE)? {
        Some(s) => Locale::parse(&s),
        None => Ok(default),
    }
}

fn slot_from_value(index: usize, value: &Value) -> ApplianceResult<InterfaceSlot> {
    let map = value.as_map().ok_or_else(|| {
        ApplianceError::invalid_config(format!("ports[{}] must be a map, got {:?}", index, value))
    })?;
    let enabled = match map.get("enabled") {
        None => true,
        Some(Value::Bool(b)) => *b,
        Some(other) => {
            return Err(ApplianceError::invalid_config(format!(
                "ports[{}].enabled must be a bool, got {:?}",
                index, other
            )));
        }
    };
    if !enabled {
        return Ok(InterfaceSlot::disabled());
    }

    Ok(InterfaceSlot {
        enabled,
        ip_address: get_string(map, "ip_address")?,
        prefix_length: get_int(map, "prefix_length")?,
        network_id: get_string(map, "network_id")?,
        subnet_id: get_string(map, "subnet_id")?,
        mtu: get_int(map, "mtu")?,
        comment: get_string(map, "comment")?,
        host_1_ip_address: get_string(map, "host_1_ip_address")?,
        host_2_ip_address: get_string(map, "host_2_ip_address")?,
        vrrp_ip_address: get_string(map, "vrrp_ip_address")?,
        vrrp_id: get_int(map, "vrrp_id")?,
    })
}

/// Interface slots from the `ports` attribute; missing means unmanaged
pub fn ports_from_attributes(
    attrs: &HashMap<String, Value>,
) -> ApplianceResult<Option<Vec<InterfaceSlot>>> {
    match attrs.get(PORTS) {
        None => Ok(None),
        Some(Value::List(items)) => items
            .iter()
            .enumerate()
            .map(|(index, item)| slot_from_value(index, item))
            .collect::<ApplianceResult<Vec<_>>>()
            .map(Some),
        Some(other) => Err(ApplianceError::invalid_config(format!(
            "ports must be a list, got {:?}",
            other
        ))),
    }
}

/// Desired single device from resource attributes
pub fn device_spec(attrs: &HashMap<String, Value>, default_locale: Locale) -> ApplianceResult<DeviceSpec> {
    Ok(DeviceSpec {
        operating_mode: require_string(attrs, OPERATING_MODE)?,
        license_kind: require_string(attrs, LICENSE_KIND)?,
        az_group: get_string(attrs, AZ_GROUP)?,
        locale: locale_from_attributes(attrs, default_locale)?,
        ports: ports_from_attributes(attrs)?,
    })
}

fn ha_link(attrs: &HashMap<String, Value>, key: &str) -> ApplianceResult<(HaLink, HaLink)> {
    let Some(map) = get_map(attrs, key)? else {
        return Ok((HaLink::default(), HaLink::default()));
    };
    let network_id = get_string(map, "network_id")?;
    let subnet_id = get_string(map, "subnet_id")?;
    Ok((
        HaLink {
            network_id: network_id.clone(),
            subnet_id: subnet_id.clone(),
            ip_address: get_string(map, "host_1_ip_address")?,
        },
        HaLink {
            network_id,
            subnet_id,
            ip_address: get_string(map, "host_2_ip_address")?,
        },
    ))
}

/// Desired HA pair from resource attributes
pub fn ha_spec(attrs: &HashMap<String, Value>, default_locale: Locale) -> ApplianceResult<HaSpec> {
    let (link_1_host_1, link_1_host_2) = ha_link(attrs, HA_LINK_1)?;
    let (link_2_host_1, link_2_host_2) = ha_link(attrs, HA_LINK_2)?;
    Ok(HaSpec {
        operating_mode: require_string(attrs, OPERATING_MODE)?,
        license_kind: require_string(attrs, LICENSE_KIND)?,
        locale: locale_from_attributes(attrs, default_locale)?,
        host_1: HaHostSpec {
            az_group: get_string(attrs, HOST_1_AZ_GROUP)?,
            ha_link_1: link_1_host_1,
            ha_link_2: link_2_host_1,
        },
        host_2: HaHostSpec {
            az_group: get_string(attrs, HOST_2_AZ_GROUP)?,
            ha_link_1: link_1_host_2,
            ha_link_2: link_2_host_2,
        },
        ports: ports_from_attributes(attrs)?,
    })
}

/// Category the device was last seen under, if recorded
pub fn category_hint(attrs: &HashMap<String, Value>) -> Option<DeviceCategory> {
    match attrs.get(CATEGORY_HINT).and_then(Value::as_str)? {
        "FW" => Some(DeviceCategory::Fw),
        "UTM" => Some(DeviceCategory::Utm),
        "WAF" => Some(DeviceCategory::Waf),
        "HA" => Some(DeviceCategory::Ha),
        _ => None,
    }
}

// =============================================================================
// Observation -> Attribute Map
// =============================================================================

fn insert_opt(map: &mut HashMap<String, Value>, key: &str, value: Option<String>) {
    if let Some(v) = value {
        map.insert(key.to_string(), Value::String(v));
    }
}

fn insert_int(map: &mut HashMap<String, Value>, key: &str, value: Option<impl Into<i64>>) {
    if let Some(v) = value {
        map.insert(key.to_string(), Value::Int(v.into()));
    }
}

fn slot_to_value(slot: &InterfaceSlot) -> Value {
    let mut map = HashMap::new();
    map.insert("enabled".to_string(), Value::Bool(slot.enabled));
    if slot.enabled {
        insert_opt(&mut map, "ip_address", slot.ip_address.clone());
        insert_int(&mut map, "prefix_length", slot.prefix_length);
        insert_opt(&mut map, "network_id", slot.network_id.clone());
        insert_opt(&mut map, "subnet_id", slot.subnet_id.clone());
        insert_int(&mut map, "mtu", slot.mtu);
        insert_opt(&mut map, "comment", slot.comment.clone());
        insert_opt(&mut map, "host_1_ip_address", slot.host_1_ip_address.clone());
        insert_opt(&mut map, "host_2_ip_address", slot.host_2_ip_address.clone());
        insert_opt(&mut map, "vrrp_ip_address", slot.vrrp_ip_address.clone());
        insert_int(&mut map, "vrrp_id", slot.vrrp_id);
    }
    Value::Map(map)
}

/// Encode slots as the `ports` attribute, dropping trailing disabled slots
pub fn ports_to_value(slots: &[InterfaceSlot]) -> Value {
    let used = slots
        .iter()
        .rposition(|s| s.enabled)
        .map_or(0, |last| last + 1);
    Value::List(slots[..used].iter().map(slot_to_value).collect())
}

/// Rewrite the `ports` attribute into the form `read` reports it in
pub fn normalize_ports(attrs: &mut HashMap<String, Value>) -> ApplianceResult<()> {
    if let Some(slots) = ports_from_attributes(attrs)? {
        attrs.insert(PORTS.to_string(), ports_to_value(&slots));
    }
    Ok(())
}

/// State attributes of an observed single device
///
/// `ports` is reported only when interfaces were observed.
pub fn device_attributes(
    observed: &ObservedDevice,
    license_kind: Option<String>,
    locale: Locale,
) -> HashMap<String, Value> {
    let mut attrs = HashMap::new();
    attrs.insert(
        OPERATING_MODE.to_string(),
        Value::String(observed.operating_mode.clone()),
    );
    insert_opt(&mut attrs, LICENSE_KIND, observed.license_kind.clone().or(license_kind));
    insert_opt(&mut attrs, AZ_GROUP, observed.az_group.clone());
    attrs.insert(LOCALE.to_string(), Value::String(locale.to_string()));
    attrs.insert(
        CATEGORY_HINT.to_string(),
        Value::String(observed.category.to_string()),
    );
    if let Some(ports) = &observed.ports {
        attrs.insert(PORTS.to_string(), ports_to_value(ports));
    }
    attrs
}

fn ha_link_value(host_1: &HaLink, host_2: &HaLink) -> Option<Value> {
    let mut map = HashMap::new();
    insert_opt(&mut map, "network_id", host_1.network_id.clone());
    insert_opt(&mut map, "subnet_id", host_1.subnet_id.clone());
    insert_opt(&mut map, "host_1_ip_address", host_1.ip_address.clone());
    insert_opt(&mut map, "host_2_ip_address", host_2.ip_address.clone());
    if map.is_empty() { None } else { Some(Value::Map(map)) }
}

/// State attributes of an observed HA pair
pub fn ha_attributes(
    observed: &ObservedHaPair,
    license_kind: Option<String>,
    locale: Locale,
) -> HashMap<String, Value> {
    let mut attrs = HashMap::new();
    attrs.insert(
        OPERATING_MODE.to_string(),
        Value::String(observed.operating_mode.clone()),
    );
    insert_opt(&mut attrs, LICENSE_KIND, observed.license_kind.clone().or(license_kind));
    attrs.insert(LOCALE.to_string(), Value::String(locale.to_string()));
    insert_opt(&mut attrs, HOST_1_AZ_GROUP, observed.host_1.az_group.clone());
    insert_opt(&mut attrs, HOST_2_AZ_GROUP, observed.host_2.az_group.clone());
    if let Some(link) = ha_link_value(&observed.host_1.ha_link_1, &observed.host_2.ha_link_1) {
        attrs.insert(HA_LINK_1.to_string(), link);
    }
    if let Some(link) = ha_link_value(&observed.host_1.ha_link_2, &observed.host_2.ha_link_2) {
        attrs.insert(HA_LINK_2.to_string(), link);
    }
    if let Some(ports) = &observed.ports {
        attrs.insert(PORTS.to_string(), ports_to_value(ports));
    }
    attrs
}
