//! Domain types shared by the order and portal sides of the engine

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{ApplianceError, ApplianceResult};

/// Device category as understood by the order API
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DeviceCategory {
    #[serde(rename = "FW")]
    Fw,
    #[serde(rename = "UTM")]
    Utm,
    #[serde(rename = "WAF")]
    Waf,
    #[serde(rename = "HA")]
    Ha,
}

impl DeviceCategory {
    /// Wire code used in order API paths
    pub fn code(&self) -> &'static str {
        match self {
            DeviceCategory::Fw => "FW",
            DeviceCategory::Utm => "UTM",
            DeviceCategory::Waf => "WAF",
            DeviceCategory::Ha => "HA",
        }
    }

    /// Category implied by an operating mode such as `FW`, `WAF` or `UTM_HA`
    pub fn from_operating_mode(mode: &str) -> ApplianceResult<Self> {
        match mode {
            "FW" => Ok(DeviceCategory::Fw),
            "UTM" => Ok(DeviceCategory::Utm),
            "WAF" => Ok(DeviceCategory::Waf),
            "FW_HA" | "UTM_HA" => Ok(DeviceCategory::Ha),
            other => Err(ApplianceError::invalid_config(format!(
                "unknown operating mode {:?}",
                other
            ))),
        }
    }

    /// Whether an inventory row's device type column belongs to this category
    pub fn matches_device_type(&self, device_type: &str) -> bool {
        match self {
            DeviceCategory::Ha => device_type.ends_with("_HA"),
            single => device_type == single.code(),
        }
    }
}

impl fmt::Display for DeviceCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Response language requested from the order API
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Locale {
    Ja,
    #[default]
    En,
}

impl Locale {
    pub fn as_str(&self) -> &'static str {
        match self {
            Locale::Ja => "ja",
            Locale::En => "en",
        }
    }

    pub fn parse(s: &str) -> ApplianceResult<Self> {
        match s {
            "ja" => Ok(Locale::Ja),
            "en" => Ok(Locale::En),
            other => Err(ApplianceError::invalid_config(format!(
                "locale must be \"ja\" or \"en\", got {:?}",
                other
            ))),
        }
    }
}

impl fmt::Display for Locale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind of order submitted to the order API
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderKind {
    Create,
    Update,
    Delete,
}

impl OrderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderKind::Create => "create",
            OrderKind::Update => "update",
            OrderKind::Delete => "delete",
        }
    }
}

impl fmt::Display for OrderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Appliance flavours exposed as resources
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplianceVariant {
    /// Single FW, UTM or WAF device
    Single,
    /// Single device restricted to FW or UTM
    FirewallUtmSingle,
    /// Two devices provisioned together
    Ha,
}

impl ApplianceVariant {
    pub fn name(&self) -> &'static str {
        match self {
            ApplianceVariant::Single => "single device",
            ApplianceVariant::FirewallUtmSingle => "firewall/UTM single device",
            ApplianceVariant::Ha => "HA device pair",
        }
    }

    /// Categories an existing device of this variant may be listed under
    pub fn categories(&self) -> &'static [DeviceCategory] {
        match self {
            ApplianceVariant::Single => &[
                DeviceCategory::Fw,
                DeviceCategory::Utm,
                DeviceCategory::Waf,
            ],
            ApplianceVariant::FirewallUtmSingle => &[DeviceCategory::Fw, DeviceCategory::Utm],
            ApplianceVariant::Ha => &[DeviceCategory::Ha],
        }
    }

    /// Check that a category can be provisioned through this variant
    pub fn check_category(&self, category: DeviceCategory) -> ApplianceResult<()> {
        let allowed = match self {
            ApplianceVariant::Single => category != DeviceCategory::Ha,
            ApplianceVariant::FirewallUtmSingle => {
                matches!(category, DeviceCategory::Fw | DeviceCategory::Utm)
            }
            ApplianceVariant::Ha => category == DeviceCategory::Ha,
        };
        if allowed {
            Ok(())
        } else {
            Err(ApplianceError::UnsupportedCategory {
                variant: self.name().to_string(),
                category: category.code().to_string(),
            })
        }
    }
}
