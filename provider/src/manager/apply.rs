use super::error::{self, Result};
use super::manifest::{address, Manifest};
use super::order::{destruction_order, manifest_dependencies};
use super::plan::{decide, merge, Action, Plan, PlannedChange};
use super::state::{ResourceRecord, StateFile};
use super::templates::Resolver;
use super::Manager;
use crate::resource::{DynamicResource, Timeouts};
use futures::future::try_join_all;
use log::{info, warn};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use snafu::{ensure, OptionExt, ResultExt};
use std::collections::{BTreeMap, BTreeSet};

/// What a refresh found for one resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RefreshOutcome {
    Unchanged,
    Updated,
    /// The object no longer exists and was dropped from the state.
    Gone,
}

serde_plain::derive_display_from_serialize!(RefreshOutcome);

impl Manager {
    /// Carry out the plan for `manifest`. The state is saved after every change, so a failure
    /// leaves it describing everything that was done up to that point.
    pub async fn apply(&self, manifest: &Manifest) -> Result<Plan> {
        let plan = self.plan(manifest).await?;
        let dependencies = manifest_dependencies(manifest)?;
        let mut state = self.load_state()?;
        let mut resolver = Resolver::new(self.meta(), self.registry(), manifest);
        let mut applied = Vec::with_capacity(plan.changes.len());

        for change in plan.changes {
            let resource = self.resource(&change.resource_type)?;
            if change.action == Action::Delete {
                let timeouts = resource.default_timeouts();
                self.delete_recorded(&mut state, &change.address, resource.as_ref(), &timeouts)
                    .await?;
                applied.push(change);
                continue;
            }

            let block = manifest
                .resource(&change.address)
                .context(error::NotFoundSnafu {
                    what: format!("resource '{}'", change.address),
                })?;
            let resolved = resolver
                .resolve(&change.address, &state, block.config.clone())
                .await?;
            ensure!(
                !resolved.unknown,
                error::TemplateSnafu {
                    address: &change.address,
                    what: "refers to a resource that was not created",
                }
            );
            let action = decide(
                &change.address,
                resource.as_ref(),
                state.get(&change.address),
                &resolved,
            )?;
            let timeouts = resource
                .default_timeouts()
                .with_overrides(&block.timeouts);
            let depends_on = dependencies
                .get(&change.address)
                .map(|needs| needs.iter().cloned().collect())
                .unwrap_or_default();
            let record = ResourceRecord {
                resource_type: block.resource_type.clone(),
                name: block.name.clone(),
                id: String::new(),
                attributes: Value::Null,
                depends_on,
            };

            match action {
                Action::Create => {
                    let attributes = self
                        .create(&change.address, resource.as_ref(), resolved.value, &timeouts)
                        .await?;
                    self.record(&mut state, record, attributes)?;
                }
                Action::Update => {
                    let prior = state
                        .get(&change.address)
                        .map(|record| record.attributes.clone())
                        .unwrap_or(Value::Null);
                    let planned = merge(prior.clone(), resolved.value);
                    info!("Updating '{}'", change.address);
                    let attributes = resource
                        .update(self.meta(), prior, planned, &timeouts)
                        .await
                        .context(error::ProviderSnafu {
                            action: "update",
                            address: &change.address,
                        })?;
                    self.record(&mut state, record, attributes)?;
                }
                Action::Replace => {
                    self.delete_recorded(&mut state, &change.address, resource.as_ref(), &timeouts)
                        .await?;
                    let attributes = self
                        .create(&change.address, resource.as_ref(), resolved.value, &timeouts)
                        .await?;
                    self.record(&mut state, record, attributes)?;
                }
                Action::Delete | Action::NoOp => {}
            }
            applied.push(PlannedChange {
                action,
                deferred: false,
                ..change
            });
        }

        Ok(Plan { changes: applied })
    }

    /// Delete every resource in the state, dependents first. Timeout overrides are taken from
    /// `manifest` where it declares the resource. Returns the deleted addresses.
    pub async fn destroy(&self, manifest: Option<&Manifest>) -> Result<Vec<String>> {
        let mut state = self.load_state()?;
        let dependencies: BTreeMap<String, BTreeSet<String>> = state
            .resources
            .iter()
            .map(|(address, record)| {
                (
                    address.clone(),
                    record.depends_on.iter().cloned().collect(),
                )
            })
            .collect();

        let order = destruction_order(&dependencies)?;
        for address in &order {
            let resource_type = match state.get(address) {
                Some(record) => record.resource_type.clone(),
                None => continue,
            };
            let resource = self.resource(&resource_type)?;
            let overrides = manifest
                .and_then(|manifest| manifest.resource(address))
                .map(|block| block.timeouts)
                .unwrap_or_default();
            let timeouts = resource.default_timeouts().with_overrides(&overrides);
            self.delete_recorded(&mut state, address, resource.as_ref(), &timeouts)
                .await?;
        }
        Ok(order)
    }

    /// Read every resource in the state from the server. Objects that are gone are dropped.
    pub async fn refresh(&self) -> Result<BTreeMap<String, RefreshOutcome>> {
        let mut state = self.load_state()?;
        let records: Vec<(String, ResourceRecord)> = state.resources.clone().into_iter().collect();
        let refreshed = try_join_all(
            records
                .iter()
                .map(|(address, record)| self.read_record(address, record)),
        )
        .await?;

        let mut outcomes = BTreeMap::new();
        for ((address, record), refreshed) in records.into_iter().zip(refreshed) {
            let outcome = match refreshed {
                None => {
                    warn!("'{}' no longer exists, removing it from the state", address);
                    state.remove(&address);
                    RefreshOutcome::Gone
                }
                Some(attributes) if attributes == record.attributes => RefreshOutcome::Unchanged,
                Some(attributes) => {
                    state.insert(
                        address.clone(),
                        ResourceRecord {
                            id: id_of(&attributes),
                            attributes,
                            ..record
                        },
                    );
                    RefreshOutcome::Updated
                }
            };
            outcomes.insert(address, outcome);
        }

        state.save(self.state_path())?;
        Ok(outcomes)
    }

    /// Bring the existing object `id` under management as `address`. When `manifest` declares
    /// the address, its dependencies are recorded too.
    pub async fn import(
        &self,
        manifest: Option<&Manifest>,
        address: &str,
        id: &str,
    ) -> Result<ResourceRecord> {
        let (resource_type, name) = address
            .split_once('.')
            .filter(|(resource_type, name)| !resource_type.is_empty() && !name.is_empty())
            .context(error::InvalidAddressSnafu { address })?;
        let mut state = self.load_state()?;
        ensure!(
            state.get(address).is_none(),
            error::AlreadyManagedSnafu { address }
        );

        let resource = self.resource(resource_type)?;
        info!("Importing '{}' as '{}'", id, address);
        let attributes = resource
            .import(self.meta(), id)
            .await
            .context(error::ProviderSnafu {
                action: "import",
                address,
            })?
            .into_iter()
            .next()
            .context(error::ImportNotFoundSnafu { address, id })?;

        let depends_on = match manifest {
            Some(manifest) if manifest.resource(address).is_some() => {
                manifest_dependencies(manifest)?
                    .remove(address)
                    .map(|needs| needs.into_iter().collect())
                    .unwrap_or_default()
            }
            _ => Vec::new(),
        };
        let record = ResourceRecord {
            resource_type: resource_type.to_string(),
            name: name.to_string(),
            id: id_of(&attributes),
            attributes,
            depends_on,
        };
        state.insert(address.to_string(), record.clone());
        state.save(self.state_path())?;
        Ok(record)
    }

    async fn create(
        &self,
        address: &str,
        resource: &dyn DynamicResource,
        planned: Value,
        timeouts: &Timeouts,
    ) -> Result<Value> {
        info!("Creating '{}'", address);
        resource
            .create(self.meta(), planned, timeouts)
            .await
            .context(error::ProviderSnafu {
                action: "create",
                address,
            })
    }

    async fn read_record(&self, address: &str, record: &ResourceRecord) -> Result<Option<Value>> {
        let resource = self.resource(&record.resource_type)?;
        resource
            .read(self.meta(), record.attributes.clone())
            .await
            .context(error::ProviderSnafu {
                action: "refresh",
                address,
            })
    }

    async fn delete_recorded(
        &self,
        state: &mut StateFile,
        address: &str,
        resource: &dyn DynamicResource,
        timeouts: &Timeouts,
    ) -> Result<()> {
        let attributes = match state.get(address) {
            Some(record) => record.attributes.clone(),
            None => return Ok(()),
        };
        info!("Deleting '{}'", address);
        resource
            .delete(self.meta(), attributes, timeouts)
            .await
            .context(error::ProviderSnafu {
                action: "delete",
                address,
            })?;
        state.remove(address);
        state.save(self.state_path())
    }

    fn record(
        &self,
        state: &mut StateFile,
        record: ResourceRecord,
        attributes: Value,
    ) -> Result<()> {
        let address = address(&record.resource_type, &record.name);
        state.insert(
            address,
            ResourceRecord {
                id: id_of(&attributes),
                attributes,
                ..record
            },
        );
        state.save(self.state_path())
    }
}

fn id_of(attributes: &Value) -> String {
    attributes
        .get("id")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}
