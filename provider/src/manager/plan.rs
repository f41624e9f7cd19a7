use super::error::{self, Result};
use super::manifest::Manifest;
use super::order::{creation_order, destruction_order, manifest_dependencies};
use super::state::{ResourceRecord, StateFile};
use super::templates::{Resolved, Resolver};
use super::Manager;
use crate::resource::DynamicResource;
use log::debug;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use snafu::{OptionExt, ResultExt};
use std::collections::{BTreeMap, BTreeSet};

/// What applying a manifest does to one resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Action {
    Create,
    Update,
    /// Delete the object and create it again.
    Replace,
    Delete,
    NoOp,
}

serde_plain::derive_display_from_serialize!(Action);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlannedChange {
    pub address: String,
    pub resource_type: String,
    pub action: Action,
    /// Some attributes refer to resources that do not exist yet, the action may turn out to be
    /// `Replace` or `NoOp` once they do.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub deferred: bool,
}

/// The changes needed to make the objects match a manifest, in the order they are carried out.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Plan {
    pub changes: Vec<PlannedChange>,
}

impl Plan {
    pub fn has_changes(&self) -> bool {
        self.changes
            .iter()
            .any(|change| change.action != Action::NoOp)
    }

    pub fn count(&self, action: Action) -> usize {
        self.changes
            .iter()
            .filter(|change| change.action == action)
            .count()
    }
}

impl Manager {
    /// Compare `manifest` with the state. Data sources are read, nothing is changed.
    pub async fn plan(&self, manifest: &Manifest) -> Result<Plan> {
        let state = self.load_state()?;
        let mut changes = Vec::new();

        for address in removed_in_destruction_order(manifest, &state)? {
            if let Some(record) = state.get(&address) {
                changes.push(PlannedChange {
                    address: address.clone(),
                    resource_type: record.resource_type.clone(),
                    action: Action::Delete,
                    deferred: false,
                });
            }
        }

        let mut resolver = Resolver::new(self.meta(), self.registry(), manifest);
        for address in creation_order(&manifest_dependencies(manifest)?)? {
            let block = manifest
                .resource(&address)
                .context(error::NotFoundSnafu {
                    what: format!("resource '{}'", address),
                })?;
            let resource = self.resource(&block.resource_type)?;
            let resolved = resolver
                .resolve(&address, &state, block.config.clone())
                .await?;
            let action = decide(&address, resource.as_ref(), state.get(&address), &resolved)?;
            debug!("Planned '{}' for '{}'", action, address);
            changes.push(PlannedChange {
                address,
                resource_type: block.resource_type.clone(),
                action,
                deferred: resolved.unknown,
            });
        }

        Ok(Plan { changes })
    }
}

/// Addresses in the state that are no longer declared, dependents first.
pub(crate) fn removed_in_destruction_order(
    manifest: &Manifest,
    state: &StateFile,
) -> Result<Vec<String>> {
    let removed: BTreeMap<String, BTreeSet<String>> = state
        .resources
        .iter()
        .filter(|(address, _)| manifest.resource(address).is_none())
        .map(|(address, record)| {
            (
                address.clone(),
                record.depends_on.iter().cloned().collect(),
            )
        })
        .collect();
    destruction_order(&removed)
}

/// Choose the action that takes `record` to the resolved config.
pub(crate) fn decide(
    address: &str,
    resource: &dyn DynamicResource,
    record: Option<&ResourceRecord>,
    resolved: &Resolved,
) -> Result<Action> {
    let record = match record {
        Some(record) => record,
        None => {
            if !resolved.unknown {
                resource
                    .validate(&resolved.value)
                    .context(error::ProviderSnafu {
                        action: "validate",
                        address,
                    })?;
            }
            return Ok(Action::Create);
        }
    };
    if resolved.unknown {
        return Ok(Action::Update);
    }

    let planned = merge(record.attributes.clone(), resolved.value.clone());
    resource
        .validate(&planned)
        .context(error::ProviderSnafu {
            action: "validate",
            address,
        })?;
    if !differs(&resolved.value, &record.attributes) {
        return Ok(Action::NoOp);
    }
    let replace = resource
        .requires_replace(&record.attributes, &planned)
        .context(error::ProviderSnafu {
            action: "plan",
            address,
        })?;
    Ok(if replace {
        Action::Replace
    } else {
        Action::Update
    })
}

/// `overlay` written over `base`. Mappings are merged key by key, anything else is replaced.
pub(crate) fn merge(base: Value, overlay: Value) -> Value {
    match (base, overlay) {
        (Value::Object(mut base), Value::Object(overlay)) => {
            for (key, value) in overlay {
                let merged = match base.remove(&key) {
                    Some(existing) => merge(existing, value),
                    None => value,
                };
                base.insert(key, merged);
            }
            Value::Object(base)
        }
        (_, overlay) => overlay,
    }
}

/// Whether `config` sets anything to a value other than what `attributes` has. Attributes that
/// the config leaves out, or sets to null, are never a difference.
pub(crate) fn differs(config: &Value, attributes: &Value) -> bool {
    match (config, attributes) {
        (Value::Null, _) => false,
        (Value::Object(config), Value::Object(attributes)) => {
            config.iter().any(|(key, value)| match attributes.get(key) {
                Some(attribute) => differs(value, attribute),
                None => !value.is_null(),
            })
        }
        (Value::Array(config), Value::Array(attributes)) => {
            config.len() != attributes.len()
                || config
                    .iter()
                    .zip(attributes)
                    .any(|(value, attribute)| differs(value, attribute))
        }
        (Value::Number(config), Value::Number(attributes)) => {
            config.as_f64() != attributes.as_f64()
        }
        (config, attributes) => config != attributes,
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::resources::Registry;
    use serde_json::json;

    #[test]
    fn action_names() {
        assert_eq!(Action::NoOp.to_string(), "no-op");
        assert_eq!(Action::Replace.to_string(), "replace");
    }

    #[test]
    fn merge_keeps_computed_attributes() {
        let merged = merge(
            json!({
                "id": "c-abc12:p-web",
                "name": "web",
                "labels": {"team": "a", "tier": "1"},
                "containerResourceLimit": null,
            }),
            json!({"name": "frontend", "labels": {"team": "b"}}),
        );
        assert_eq!(
            merged,
            json!({
                "id": "c-abc12:p-web",
                "name": "frontend",
                "labels": {"team": "b", "tier": "1"},
                "containerResourceLimit": null,
            })
        );
    }

    #[test]
    fn config_subset() {
        let attributes = json!({
            "id": "c-abc12:p-web",
            "name": "web",
            "wait_for_cluster": false,
            "labels": {"team": "a"},
            "quota": {"limit": {"pods": "10"}},
            "ratio": 1,
        });
        assert!(!differs(&json!({"name": "web"}), &attributes));
        assert!(!differs(&json!({"name": "web", "description": null}), &attributes));
        assert!(!differs(&json!({"ratio": 1.0}), &attributes));
        assert!(!differs(&json!({"quota": {"limit": {}}}), &attributes));
        assert!(differs(&json!({"name": "api"}), &attributes));
        assert!(differs(&json!({"description": "web apps"}), &attributes));
        assert!(differs(&json!({"labels": {"team": "b"}}), &attributes));
        assert!(differs(&json!({"wait_for_cluster": true}), &attributes));
        assert!(differs(&json!({"labels": ["team"]}), &attributes));
    }

    fn record(attributes: Value) -> ResourceRecord {
        ResourceRecord {
            resource_type: "rancher2_project".to_string(),
            name: "web".to_string(),
            id: "c-abc12:p-web".to_string(),
            attributes,
            depends_on: vec![],
        }
    }

    #[test]
    fn decide_actions() {
        let registry = Registry::new();
        let project = registry.resource("rancher2_project").unwrap();
        let existing = record(json!({
            "id": "c-abc12:p-web",
            "cluster_id": "c-abc12",
            "name": "web",
        }));
        let resolved = |value: Value, unknown: bool| Resolved { value, unknown };

        let config = json!({"cluster_id": "c-abc12", "name": "web"});
        assert_eq!(
            decide("p", project.as_ref(), None, &resolved(config.clone(), false)).unwrap(),
            Action::Create
        );
        assert_eq!(
            decide("p", project.as_ref(), Some(&existing), &resolved(config, false)).unwrap(),
            Action::NoOp
        );

        let renamed = json!({"cluster_id": "c-abc12", "name": "frontend"});
        assert_eq!(
            decide("p", project.as_ref(), Some(&existing), &resolved(renamed, false)).unwrap(),
            Action::Update
        );

        let moved = json!({"cluster_id": "c-def34", "name": "web"});
        assert_eq!(
            decide("p", project.as_ref(), Some(&existing), &resolved(moved, false)).unwrap(),
            Action::Replace
        );

        let pending = json!({"cluster_id": "${rancher2_cluster.main.id}", "name": "web"});
        assert_eq!(
            decide("p", project.as_ref(), Some(&existing), &resolved(pending, true)).unwrap(),
            Action::Update
        );
    }

    #[test]
    fn invalid_config_fails_the_plan() {
        let registry = Registry::new();
        let project = registry.resource("rancher2_project").unwrap();
        let result = decide(
            "rancher2_project.web",
            project.as_ref(),
            None,
            &Resolved {
                value: json!({"name": "web"}),
                unknown: false,
            },
        );
        assert!(result
            .unwrap_err()
            .to_string()
            .starts_with("Unable to validate 'rancher2_project.web'"));
    }

    #[test]
    fn removed_resources_dependents_first() {
        let manifest = Manifest::default();
        let mut state = StateFile::default();
        let mut namespace = record(json!({}));
        namespace.resource_type = "rancher2_namespace".to_string();
        namespace.depends_on = vec!["rancher2_project.web".to_string()];
        state.insert("rancher2_project.web".to_string(), record(json!({})));
        state.insert("rancher2_namespace.frontend".to_string(), namespace);
        assert_eq!(
            removed_in_destruction_order(&manifest, &state).unwrap(),
            vec!["rancher2_namespace.frontend", "rancher2_project.web"]
        );
    }
}
