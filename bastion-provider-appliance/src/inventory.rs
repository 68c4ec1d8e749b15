//! Inventory rows from the order API
//!
//! The order API lists devices as positional string cells. Rows are decoded
//! into typed `InventoryRecord`s as soon as they leave the client so the rest
//! of the engine never indexes into raw cells.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{ApplianceError, ApplianceResult};

/// Version of the positional row layout understood by this crate
pub const ROW_SCHEMA_VERSION: u32 = 1;

/// A raw row as returned by the order API list endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawInventoryRow {
    pub cells: Vec<String>,
}

impl RawInventoryRow {
    pub fn new<I, S>(cells: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            cells: cells.into_iter().map(Into::into).collect(),
        }
    }
}

/// Column positions of a row layout
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RowLayout {
    pub version: u32,
    pub ordinal: usize,
    pub hostname: usize,
    pub device_type: usize,
    pub az_group: usize,
    pub license_kind: usize,
    pub ha_link_1_network_id: usize,
    pub ha_link_1_subnet_id: usize,
    pub ha_link_1_ip_address: usize,
    pub ha_link_2_network_id: usize,
    pub ha_link_2_subnet_id: usize,
    pub ha_link_2_ip_address: usize,
}

impl RowLayout {
    pub const V1: RowLayout = RowLayout {
        version: ROW_SCHEMA_VERSION,
        ordinal: 0,
        hostname: 1,
        device_type: 2,
        az_group: 3,
        license_kind: 4,
        ha_link_1_network_id: 5,
        ha_link_1_subnet_id: 6,
        ha_link_1_ip_address: 7,
        ha_link_2_network_id: 8,
        ha_link_2_subnet_id: 9,
        ha_link_2_ip_address: 10,
    };
}

impl Default for RowLayout {
    fn default() -> Self {
        Self::V1
    }
}

/// Durable identity of an appliance: its hostname
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HostIdentity(String);

impl HostIdentity {
    pub fn new(hostname: impl Into<String>) -> Self {
        Self(hostname.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for HostIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for HostIdentity {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for HostIdentity {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Link addressing of one HA link as seen from one host
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HaLink {
    pub network_id: Option<String>,
    pub subnet_id: Option<String>,
    pub ip_address: Option<String>,
}

/// Typed inventory row
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InventoryRecord {
    /// Host ordinal within an HA pair ("1" or "2"), row number for singles
    pub ordinal: Option<String>,
    pub hostname: HostIdentity,
    pub device_type: String,
    pub az_group: Option<String>,
    pub license_kind: Option<String>,
    pub ha_link_1: HaLink,
    pub ha_link_2: HaLink,
}

impl InventoryRecord {
    /// Decode a raw row using the given layout
    pub fn decode(row: &RawInventoryRow, layout: &RowLayout) -> ApplianceResult<Self> {
        let cell = |index: usize| -> Option<String> {
            row.cells
                .get(index)
                .map(|c| c.trim())
                .filter(|c| !c.is_empty())
                .map(str::to_string)
        };
        let required = |index: usize, column: &str| -> ApplianceResult<String> {
            cell(index).ok_or_else(|| ApplianceError::RowDecode {
                version: layout.version,
                reason: format!(
                    "missing {} in column {} of {:?}",
                    column, index, row.cells
                ),
            })
        };

        Ok(Self {
            ordinal: cell(layout.ordinal),
            hostname: HostIdentity::new(required(layout.hostname, "hostname")?),
            device_type: required(layout.device_type, "device type")?,
            az_group: cell(layout.az_group),
            license_kind: cell(layout.license_kind),
            ha_link_1: HaLink {
                network_id: cell(layout.ha_link_1_network_id),
                subnet_id: cell(layout.ha_link_1_subnet_id),
                ip_address: cell(layout.ha_link_1_ip_address),
            },
            ha_link_2: HaLink {
                network_id: cell(layout.ha_link_2_network_id),
                subnet_id: cell(layout.ha_link_2_subnet_id),
                ip_address: cell(layout.ha_link_2_ip_address),
            },
        })
    }
}

/// Decode a whole listing; any malformed row fails the snapshot
pub fn decode_rows(
    rows: &[RawInventoryRow],
    layout: &RowLayout,
) -> ApplianceResult<Vec<InventoryRecord>> {
    rows.iter()
        .map(|row| InventoryRecord::decode(row, layout))
        .collect()
}

/// Find a record by exact hostname
pub fn find_by_hostname<'a>(
    records: &'a [InventoryRecord],
    hostname: &HostIdentity,
) -> Option<&'a InventoryRecord> {
    records.iter().find(|r| &r.hostname == hostname)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_single_row() {
        let row = RawInventoryRow::new(["1", "CES777", "FW", "zone1-groupa", "02"]);
        let record = InventoryRecord::decode(&row, &RowLayout::V1).unwrap();

        assert_eq!(record.hostname.as_str(), "CES777");
        assert_eq!(record.device_type, "FW");
        assert_eq!(record.az_group.as_deref(), Some("zone1-groupa"));
        assert_eq!(record.license_kind.as_deref(), Some("02"));
        assert_eq!(record.ha_link_1, HaLink::default());
    }

    #[test]
    fn test_decode_ha_row() {
        let row = RawInventoryRow::new([
            "2", "CES12086", "FW_HA", "zone1-groupb", "02", "net-1", "sub-1", "192.168.1.2",
            "net-2", "sub-2", "192.168.2.2",
        ]);
        let record = InventoryRecord::decode(&row, &RowLayout::V1).unwrap();

        assert_eq!(record.ordinal.as_deref(), Some("2"));
        assert_eq!(record.ha_link_1.ip_address.as_deref(), Some("192.168.1.2"));
        assert_eq!(record.ha_link_2.network_id.as_deref(), Some("net-2"));
    }

    #[test]
    fn test_empty_cells_decode_to_none() {
        let row = RawInventoryRow::new(["", "CES1", "UTM", " "]);
        let record = InventoryRecord::decode(&row, &RowLayout::V1).unwrap();
        assert_eq!(record.ordinal, None);
        assert_eq!(record.az_group, None);
    }

    #[test]
    fn test_missing_hostname_is_decode_error() {
        let row = RawInventoryRow::new(["1", ""]);
        let err = InventoryRecord::decode(&row, &RowLayout::V1).unwrap_err();
        assert!(matches!(err, ApplianceError::RowDecode { version: 1, .. }));
    }

    #[test]
    fn test_find_by_hostname_is_exact() {
        let rows = vec![
            RawInventoryRow::new(["1", "CES1208", "FW"]),
            RawInventoryRow::new(["2", "CES12085", "FW"]),
        ];
        let records = decode_rows(&rows, &RowLayout::V1).unwrap();

        let found = find_by_hostname(&records, &HostIdentity::new("CES12085")).unwrap();
        assert_eq!(found.ordinal.as_deref(), Some("2"));
        assert!(find_by_hostname(&records, &HostIdentity::new("CES120")).is_none());
    }
}
