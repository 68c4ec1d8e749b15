//! Identity resolution by inventory snapshot diff
//!
//! Create orders never return the hostname of the device they provision. The
//! only way to learn it is to list the inventory right before submitting the
//! order, list it again once the order completes, and diff the two listings.

use std::collections::HashSet;

use crate::error::{ApplianceError, ApplianceResult};
use crate::inventory::{HostIdentity, InventoryRecord};

/// Outcome of comparing two inventory snapshots
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiffOutcome {
    /// Both (filtered) snapshots hold the same number of records
    NoNewIdentity { before: usize, after: usize },
    /// Keys present after but not before, in `after` order
    New {
        identities: Vec<HostIdentity>,
        before: usize,
        after: usize,
    },
}

impl DiffOutcome {
    /// Newly seen identities; empty when nothing new was found
    pub fn identities(&self) -> &[HostIdentity] {
        match self {
            DiffOutcome::NoNewIdentity { .. } => &[],
            DiffOutcome::New { identities, .. } => identities,
        }
    }

    /// Require exactly `expected` new identities
    pub fn expect_exactly(self, expected: usize) -> ApplianceResult<Vec<HostIdentity>> {
        match self {
            DiffOutcome::NoNewIdentity { before, after } => {
                Err(ApplianceError::NoNewIdentity { before, after })
            }
            DiffOutcome::New {
                identities,
                before,
                after,
            } => {
                if identities.len() == expected {
                    Ok(identities)
                } else {
                    Err(ApplianceError::Resolution {
                        expected,
                        found: identities.len(),
                        before,
                        after,
                    })
                }
            }
        }
    }
}

/// Compute `after - before`, keyed by `key_fn`
///
/// When `filter` is given, both snapshots are restricted to matching records
/// before anything else happens. Equal record counts are reported as
/// `NoNewIdentity` without looking at keys.
pub fn resolve_new<K, F>(
    before: &[InventoryRecord],
    after: &[InventoryRecord],
    key_fn: K,
    filter: Option<F>,
) -> DiffOutcome
where
    K: Fn(&InventoryRecord) -> HostIdentity,
    F: Fn(&InventoryRecord) -> bool,
{
    let keep = |record: &&InventoryRecord| filter.as_ref().is_none_or(|f| f(*record));
    let before: Vec<&InventoryRecord> = before.iter().filter(keep).collect();
    let after: Vec<&InventoryRecord> = after.iter().filter(keep).collect();

    if before.len() == after.len() {
        return DiffOutcome::NoNewIdentity {
            before: before.len(),
            after: after.len(),
        };
    }

    let known: HashSet<HostIdentity> = before.iter().map(|r| key_fn(*r)).collect();
    let mut seen = HashSet::new();
    let identities = after
        .iter()
        .map(|r| key_fn(*r))
        .filter(|key| !known.contains(key) && seen.insert(key.clone()))
        .collect();

    DiffOutcome::New {
        identities,
        before: before.len(),
        after: after.len(),
    }
}

/// Hostname key used for every appliance listing
pub fn hostname_key(record: &InventoryRecord) -> HostIdentity {
    record.hostname.clone()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inventory::{RawInventoryRow, RowLayout};
    use crate::types::DeviceCategory;

    fn record(ordinal: &str, hostname: &str, device_type: &str) -> InventoryRecord {
        InventoryRecord::decode(
            &RawInventoryRow::new([ordinal, hostname, device_type]),
            &RowLayout::V1,
        )
        .unwrap()
    }

    fn no_filter() -> Option<fn(&InventoryRecord) -> bool> {
        None
    }

    #[test]
    fn single_new_record_is_resolved() {
        let before = vec![record("1", "CES100", "FW"), record("2", "CES101", "FW")];
        let mut after = before.clone();
        after.push(record("3", "CES777", "FW"));

        let outcome = resolve_new(&before, &after, hostname_key, no_filter());
        assert_eq!(outcome.identities(), &[HostIdentity::new("CES777")]);
        assert_eq!(outcome.expect_exactly(1).unwrap(), vec![HostIdentity::new("CES777")]);
    }

    #[test]
    fn empty_before_snapshot() {
        let after = vec![record("1", "CES777", "FW")];
        let outcome = resolve_new(&[], &after, hostname_key, no_filter());
        assert_eq!(outcome.expect_exactly(1).unwrap(), vec![HostIdentity::new("CES777")]);
    }

    #[test]
    fn unchanged_snapshot_never_fabricates_identity() {
        let before = vec![record("1", "CES100", "FW")];
        let outcome = resolve_new(&before, &before, hostname_key, no_filter());

        assert!(outcome.identities().is_empty());
        assert!(matches!(
            outcome.expect_exactly(1),
            Err(ApplianceError::NoNewIdentity {
                before: 1,
                after: 1
            })
        ));
    }

    #[test]
    fn equal_counts_report_no_new_identity_even_if_keys_differ() {
        let before = vec![record("1", "CES100", "FW")];
        let after = vec![record("1", "CES200", "FW")];

        let outcome = resolve_new(&before, &after, hostname_key, no_filter());
        assert!(matches!(outcome, DiffOutcome::NoNewIdentity { .. }));
    }

    #[test]
    fn result_follows_after_order() {
        let before = vec![record("1", "CES100", "FW")];
        let after = vec![
            record("1", "CES300", "FW"),
            record("2", "CES100", "FW"),
            record("3", "CES200", "FW"),
        ];

        let outcome = resolve_new(&before, &after, hostname_key, no_filter());
        assert_eq!(
            outcome.identities(),
            &[HostIdentity::new("CES300"), HostIdentity::new("CES200")]
        );
    }

    #[test]
    fn filter_restricts_both_snapshots() {
        let before = vec![record("1", "CES100", "FW"), record("2", "CES101", "WAF")];
        let after = vec![
            record("1", "CES100", "FW"),
            record("2", "CES101", "WAF"),
            record("3", "CES102", "WAF"),
            record("4", "CES103", "FW"),
        ];

        let outcome = resolve_new(
            &before,
            &after,
            hostname_key,
            Some(|r: &InventoryRecord| DeviceCategory::Fw.matches_device_type(&r.device_type)),
        );
        assert_eq!(outcome.expect_exactly(1).unwrap(), vec![HostIdentity::new("CES103")]);
    }

    #[test]
    fn wrong_cardinality_reports_raw_counts() {
        let after = vec![record("1", "CES1", "FW"), record("2", "CES2", "FW")];
        let err = resolve_new(&[], &after, hostname_key, no_filter())
            .expect_exactly(1)
            .unwrap_err();

        match err {
            ApplianceError::Resolution {
                expected,
                found,
                before,
                after,
            } => {
                assert_eq!((expected, found, before, after), (1, 2, 0, 2));
            }
            other => panic!("Expected Resolution, got {:?}", other),
        }
    }
}
