//! Differ - Compare desired state with current state
//!
//! Providers use this to decide which parts of an update actually need to be
//! sent to the remote side.

use std::collections::HashMap;

use crate::resource::{Resource, ResourceId, State, Value};

/// Result of a diff operation
#[derive(Debug, Clone, PartialEq)]
pub enum Diff {
    /// Resource does not exist -> needs creation
    Create(Resource),
    /// Resource exists with differences -> needs update
    Update {
        id: ResourceId,
        changed_attributes: Vec<String>,
    },
    /// Resource exists with no differences -> no action needed
    NoChange(ResourceId),
}

impl Diff {
    /// Returns whether this Diff involves a change
    pub fn is_change(&self) -> bool {
        !matches!(self, Diff::NoChange(_))
    }
}

/// Compare desired state with current state to compute a Diff
pub fn diff(desired: &Resource, current: &State) -> Diff {
    if !current.exists {
        return Diff::Create(desired.clone());
    }

    let changed = find_changed_attributes(&desired.attributes, &current.attributes);

    if changed.is_empty() {
        Diff::NoChange(desired.id.clone())
    } else {
        Diff::Update {
            id: desired.id.clone(),
            changed_attributes: changed,
        }
    }
}

/// Find changed attributes between desired and current state
pub fn find_changed_attributes(
    desired: &HashMap<String, Value>,
    current: &HashMap<String, Value>,
) -> Vec<String> {
    let mut changed = Vec::new();

    for (key, desired_value) in desired {
        // Skip internal attributes (starting with _)
        if key.starts_with('_') {
            continue;
        }

        match current.get(key) {
            Some(current_value) if current_value == desired_value => {}
            _ => changed.push(key.clone()),
        }
    }

    changed.sort();
    changed
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn diff_create_when_not_exists() {
        let desired = Resource::new("device", "fw");
        let current = State::not_found(ResourceId::new("device", "fw"));

        let result = diff(&desired, &current);
        assert!(matches!(result, Diff::Create(_)));
    }

    #[test]
    fn diff_no_change_when_same() {
        let desired = Resource::new("device", "fw")
            .with_attribute("license_kind", Value::String("02".to_string()));

        let mut attrs = HashMap::new();
        attrs.insert("license_kind".to_string(), Value::String("02".to_string()));
        let current = State::existing(ResourceId::new("device", "fw"), attrs);

        let result = diff(&desired, &current);
        assert!(matches!(result, Diff::NoChange(_)));
        assert!(!result.is_change());
    }

    #[test]
    fn diff_update_when_different() {
        let desired = Resource::new("device", "fw")
            .with_attribute("license_kind", Value::String("08".to_string()))
            .with_attribute("locale", Value::String("en".to_string()));

        let mut attrs = HashMap::new();
        attrs.insert("license_kind".to_string(), Value::String("02".to_string()));
        attrs.insert("locale".to_string(), Value::String("en".to_string()));
        let current = State::existing(ResourceId::new("device", "fw"), attrs);

        let result = diff(&desired, &current);
        match &result {
            Diff::Update {
                changed_attributes, ..
            } => {
                assert_eq!(changed_attributes, &vec!["license_kind".to_string()]);
            }
            _ => panic!("Expected Update"),
        }
    }

    #[test]
    fn internal_attributes_are_ignored() {
        let desired = Resource::new("device", "fw")
            .with_attribute("_order_id", Value::String("o-1".to_string()));
        let current = State::existing(ResourceId::new("device", "fw"), HashMap::new());

        assert!(matches!(diff(&desired, &current), Diff::NoChange(_)));
    }
}
