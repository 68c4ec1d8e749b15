//! HA pair resolution
//!
//! An HA create order provisions two devices at once. Both show up as new
//! inventory rows; the row ordinal ("1" or "2") says which one is host 1.

use std::fmt;

use crate::error::{ApplianceError, ApplianceResult};
use crate::inventory::{HostIdentity, InventoryRecord, find_by_hostname};
use crate::snapshot::{hostname_key, resolve_new};
use crate::types::DeviceCategory;

/// Separator used when an HA pair is persisted as a single identifier
pub const PAIR_SEPARATOR: char = '/';

/// The two devices of an HA pair, bound to their host ordinals
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct HaPair {
    pub host_1: HostIdentity,
    pub host_2: HostIdentity,
}

impl HaPair {
    pub fn new(host_1: impl Into<HostIdentity>, host_2: impl Into<HostIdentity>) -> Self {
        Self {
            host_1: host_1.into(),
            host_2: host_2.into(),
        }
    }

    /// Parse the persisted `host_1/host_2` form
    pub fn parse(identifier: &str) -> ApplianceResult<Self> {
        match identifier.split_once(PAIR_SEPARATOR) {
            Some((host_1, host_2))
                if !host_1.is_empty() && !host_2.is_empty() && !host_2.contains(PAIR_SEPARATOR) =>
            {
                Ok(Self::new(HostIdentity::new(host_1), HostIdentity::new(host_2)))
            }
            _ => Err(ApplianceError::invalid_config(format!(
                "HA identifier must look like \"host1/host2\", got {:?}",
                identifier
            ))),
        }
    }

    /// Unordered membership test
    pub fn contains(&self, hostname: &HostIdentity) -> bool {
        &self.host_1 == hostname || &self.host_2 == hostname
    }
}

impl fmt::Display for HaPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.host_1, PAIR_SEPARATOR, self.host_2)
    }
}

/// Resolve the two devices created by an HA order
///
/// Anything other than exactly two new HA records is fatal: it means the
/// order left a partial or ambiguous result that an operator has to look at.
pub fn resolve_pair(
    before: &[InventoryRecord],
    after: &[InventoryRecord],
) -> ApplianceResult<HaPair> {
    let is_ha = |r: &InventoryRecord| DeviceCategory::Ha.matches_device_type(&r.device_type);
    let identities = resolve_new(before, after, hostname_key, Some(is_ha)).expect_exactly(2)?;

    let mut host_1 = None;
    let mut host_2 = None;
    for identity in identities {
        let record = find_by_hostname(after, &identity).ok_or_else(|| {
            ApplianceError::AmbiguousPair(format!("{} vanished from the listing", identity))
        })?;
        let slot = match record.ordinal.as_deref() {
            Some("1") => &mut host_1,
            Some("2") => &mut host_2,
            other => {
                return Err(ApplianceError::AmbiguousPair(format!(
                    "{} has host ordinal {:?}, expected \"1\" or \"2\"",
                    identity, other
                )));
            }
        };
        if let Some(previous) = slot.replace(identity.clone()) {
            return Err(ApplianceError::AmbiguousPair(format!(
                "{} and {} both claim host ordinal {}",
                previous,
                identity,
                record.ordinal.as_deref().unwrap_or_default()
            )));
        }
    }

    match (host_1, host_2) {
        (Some(host_1), Some(host_2)) => Ok(HaPair { host_1, host_2 }),
        _ => Err(ApplianceError::AmbiguousPair(
            "new devices do not cover both host ordinals".to_string(),
        )),
    }
}
