use super::{cluster_id_from_project_id, is_set, read_back, require};
use crate::error::{IntoProviderError, ProviderError, ProviderResult};
use crate::meta::Meta;
use crate::resource::{Resource, ResourceState, Timeouts};
use log::info;
use model::clients::{AllowNotFound, Collection, CrudClient};
use model::types::Catalog;
use model::{ApiObject, Configuration, ObjectMeta};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Which collection a catalog lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum CatalogScope {
    Global,
    Cluster,
    Project,
}

serde_plain::derive_display_from_serialize!(CatalogScope);
serde_plain::derive_fromstr_from_deserialize!(CatalogScope);

impl Default for CatalogScope {
    fn default() -> Self {
        Self::Global
    }
}

impl CatalogScope {
    fn collection(&self) -> &'static str {
        match self {
            CatalogScope::Global => "catalogs",
            CatalogScope::Cluster => "clustercatalogs",
            CatalogScope::Project => "projectcatalogs",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct CatalogState {
    #[serde(default)]
    pub id: String,
    pub name: String,
    pub url: String,
    /// Changing the scope replaces the catalog.
    #[serde(default)]
    pub scope: CatalogScope,
    #[serde(default)]
    pub branch: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    /// `helm` or `native`.
    #[serde(default = "default_kind")]
    pub kind: String,
    #[serde(default)]
    pub username: Option<String>,
    /// Never returned by the server.
    #[serde(default)]
    pub password: Option<String>,
    /// Required on cluster scope.
    #[serde(default)]
    pub cluster_id: Option<String>,
    /// Required on project scope.
    #[serde(default)]
    pub project_id: Option<String>,
    #[serde(default)]
    pub annotations: BTreeMap<String, String>,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
}

fn default_kind() -> String {
    "helm".to_string()
}

impl Default for CatalogState {
    fn default() -> Self {
        Self {
            id: String::new(),
            name: String::new(),
            url: String::new(),
            scope: CatalogScope::default(),
            branch: None,
            description: None,
            kind: default_kind(),
            username: None,
            password: None,
            cluster_id: None,
            project_id: None,
            annotations: BTreeMap::new(),
            labels: BTreeMap::new(),
        }
    }
}

impl Configuration for CatalogState {}

impl ResourceState for CatalogState {
    fn id(&self) -> &str {
        &self.id
    }

    fn validate(&self) -> ProviderResult<()> {
        require("name", &self.name)?;
        require("url", &self.url)?;
        match self.kind.as_str() {
            "helm" | "native" => {}
            other => {
                return Err(ProviderError::new_with_context(format!(
                    "Catalog kind '{}' is not one of helm, native",
                    other
                )))
            }
        }
        match self.scope {
            CatalogScope::Cluster if !is_set(&self.cluster_id) => {
                Err(ProviderError::new_with_context(
                    "Attribute 'cluster_id' is required on scope cluster",
                ))
            }
            CatalogScope::Project => {
                let project_id = self.project_id.as_deref().unwrap_or_default();
                cluster_id_from_project_id(project_id)
                    .context("Attribute 'project_id' is required on scope project")?;
                Ok(())
            }
            _ => Ok(()),
        }
    }
}

pub(crate) fn flatten_catalog(catalog: &Catalog, prior: &CatalogState) -> CatalogState {
    CatalogState {
        id: catalog.id().to_string(),
        name: catalog.name().to_string(),
        url: catalog.url.clone().unwrap_or_default(),
        scope: prior.scope,
        branch: catalog.branch.clone(),
        description: catalog.description.clone(),
        kind: catalog.kind.clone().unwrap_or_else(default_kind),
        username: catalog.username.clone(),
        password: catalog.password.clone().or_else(|| prior.password.clone()),
        cluster_id: catalog.cluster_id.clone(),
        project_id: catalog.project_id.clone(),
        annotations: catalog.annotations(),
        labels: catalog.labels(),
    }
}

pub(crate) fn expand_catalog(state: &CatalogState) -> Catalog {
    let (cluster_id, project_id) = match state.scope {
        CatalogScope::Global => (None, None),
        CatalogScope::Cluster => (state.cluster_id.clone(), None),
        CatalogScope::Project => (None, state.project_id.clone()),
    };
    Catalog {
        meta: ObjectMeta::new(&state.name, state.annotations.clone(), state.labels.clone()),
        url: Some(state.url.clone()),
        branch: state.branch.clone(),
        description: state.description.clone(),
        kind: Some(state.kind.clone()),
        username: state.username.clone(),
        password: state.password.clone(),
        cluster_id,
        project_id,
    }
}

fn catalogs(meta: &Meta, scope: CatalogScope) -> Collection<Catalog> {
    Collection::named(meta.client().clone(), scope.collection())
}

pub struct CatalogResource;

#[async_trait::async_trait]
impl Resource for CatalogResource {
    type State = CatalogState;

    const TYPE_NAME: &'static str = "rancher2_catalog";

    fn requires_replace(&self, prior: &CatalogState, planned: &CatalogState) -> bool {
        prior.scope != planned.scope
    }

    async fn create(
        &self,
        meta: &Meta,
        planned: CatalogState,
        timeouts: &Timeouts,
    ) -> ProviderResult<CatalogState> {
        info!("Creating {} catalog '{}'", planned.scope, planned.name);
        let catalogs = catalogs(meta, planned.scope);
        let created = catalogs
            .create(&expand_catalog(&planned))
            .await
            .context(format!("Unable to create catalog '{}'", planned.name))?;

        meta.state_change(
            format!("catalog '{}'", created.id()),
            &[],
            &["active"],
            timeouts.create,
        )
        .wait_for_state(|| catalogs.state_refresh(created.id()))
        .await
        .context(format!(
            "Error waiting for catalog '{}' to be created",
            created.id()
        ))?;

        let state = CatalogState {
            id: created.id().to_string(),
            ..planned
        };
        read_back(self, meta, state).await
    }

    async fn read(&self, meta: &Meta, state: CatalogState) -> ProviderResult<Option<CatalogState>> {
        let catalog = catalogs(meta, state.scope)
            .by_id(&state.id)
            .await
            .allow_not_found(|_| ())
            .context(format!("Unable to get catalog '{}'", state.id))?;
        match catalog {
            Some(catalog) if !catalog.is_removed() => Ok(Some(flatten_catalog(&catalog, &state))),
            _ => {
                info!("Catalog '{}' not found", state.id);
                Ok(None)
            }
        }
    }

    async fn update(
        &self,
        meta: &Meta,
        prior: CatalogState,
        planned: CatalogState,
        _timeouts: &Timeouts,
    ) -> ProviderResult<CatalogState> {
        let catalogs = catalogs(meta, prior.scope);
        let existing = catalogs
            .by_id(&prior.id)
            .await
            .context(format!("Unable to get catalog '{}'", prior.id))?;
        info!("Updating catalog '{}'", prior.id);
        catalogs
            .update(&existing, &expand_catalog(&planned))
            .await
            .context(format!("Unable to update catalog '{}'", prior.id))?;
        let state = CatalogState {
            id: prior.id,
            ..planned
        };
        read_back(self, meta, state).await
    }

    async fn delete(
        &self,
        meta: &Meta,
        state: CatalogState,
        timeouts: &Timeouts,
    ) -> ProviderResult<()> {
        let catalogs = catalogs(meta, state.scope);
        let existing = match catalogs
            .by_id(&state.id)
            .await
            .allow_not_found(|_| ())
            .context(format!("Unable to get catalog '{}'", state.id))?
        {
            Some(catalog) => catalog,
            None => return Ok(()),
        };
        info!("Deleting catalog '{}'", state.id);
        catalogs
            .delete(&existing)
            .await
            .allow_not_found(|_| ())
            .context(format!("Unable to delete catalog '{}'", state.id))?;

        meta.state_change(
            format!("catalog '{}'", state.id),
            &["removing"],
            &["removed"],
            timeouts.delete,
        )
        .wait_for_state(|| catalogs.state_refresh(&state.id))
        .await
        .context(format!(
            "Error waiting for catalog '{}' to be removed",
            state.id
        ))?;
        Ok(())
    }

    /// `{scope}.{id}`, or a plain id for a global catalog.
    async fn import(&self, meta: &Meta, id: &str) -> ProviderResult<Vec<CatalogState>> {
        let scoped = id
            .split_once('.')
            .and_then(|(scope, rest)| Some((scope.parse::<CatalogScope>().ok()?, rest)));
        let (scope, id) = scoped.unwrap_or((CatalogScope::Global, id));
        let state = CatalogState {
            id: id.to_string(),
            scope,
            ..Default::default()
        };
        let state = self
            .read(meta, state)
            .await?
            .context(format!("Catalog '{}' not found", id))?;
        Ok(vec![state])
    }
}
