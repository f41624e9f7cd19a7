/*!

One module per managed resource type. Every module holds the attribute state of the type, the
`expand_*`/`flatten_*` mappings between that state and the API's wire object, and the
[`Resource`] implementation that drives the CRUD calls.

[`Registry`] maps the type names used in manifests to the implementations.

!*/

#[macro_use]
mod mirror;

mod auth_config;
mod bootstrap;
mod catalog;
mod cloud_credential;
mod cluster;
mod etcd_backup;
mod logging;
mod namespace;
mod namespace_move;
mod node_pool;
mod node_template;
mod project;
mod quota;
mod role_template_binding;
mod setting;

pub use auth_config::{
    AccessMode, ActiveDirectoryResource, ActiveDirectoryState, AdfsResource, AuthConfigBase,
    AzureAdResource, AzureAdState, FreeIpaResource, GithubResource, GithubState, LdapState,
    OpenLdapResource, PingResource, SamlState,
};
pub use bootstrap::{BootstrapResource, BootstrapState};
pub use catalog::{CatalogResource, CatalogState};
pub use cloud_credential::{CloudCredentialResource, CloudCredentialState};
pub use cluster::{ClusterResource, ClusterState};
pub use etcd_backup::{EtcdBackupConfigState, EtcdBackupResource, EtcdBackupState};
pub use logging::{
    ClusterLoggingResource, ClusterLoggingState, LoggingKind, LoggingTargetsState,
    ProjectLoggingResource, ProjectLoggingState,
};
pub use namespace::{NamespaceResource, NamespaceState};
pub use namespace_move::{NamespaceMoveResource, NamespaceMoveState};
pub use node_pool::{NodePoolResource, NodePoolState};
pub use node_template::{NodeTemplateResource, NodeTemplateState};
pub use project::{ProjectResource, ProjectState};
pub use quota::{NamespaceQuota, ProjectQuota, QuotaLimit};
pub use role_template_binding::{
    ClusterRoleTemplateBindingResource, ProjectRoleTemplateBindingResource,
};
pub use setting::{SettingDataSource, SettingState};

use crate::error::{IntoProviderError, ProviderError, ProviderResult};
use crate::meta::Meta;
use crate::resource::{DataSource, DynamicDataSource, DynamicResource, Resource, ResourceState};
use std::collections::BTreeMap;
use std::sync::Arc;

/// The resource types and data sources known to the provider.
pub struct Registry {
    resources: BTreeMap<&'static str, Arc<dyn DynamicResource>>,
    data_sources: BTreeMap<&'static str, Arc<dyn DynamicDataSource>>,
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl Registry {
    pub fn new() -> Self {
        let mut registry = Self {
            resources: BTreeMap::new(),
            data_sources: BTreeMap::new(),
        };
        registry.add_resource(ActiveDirectoryResource::default());
        registry.add_resource(AdfsResource::default());
        registry.add_resource(AzureAdResource::default());
        registry.add_resource(FreeIpaResource::default());
        registry.add_resource(GithubResource::default());
        registry.add_resource(OpenLdapResource::default());
        registry.add_resource(PingResource::default());
        registry.add_resource(BootstrapResource);
        registry.add_resource(CatalogResource);
        registry.add_resource(CloudCredentialResource);
        registry.add_resource(ClusterResource);
        registry.add_resource(ClusterLoggingResource);
        registry.add_resource(ClusterRoleTemplateBindingResource);
        registry.add_resource(EtcdBackupResource);
        registry.add_resource(NamespaceResource);
        registry.add_resource(NamespaceMoveResource);
        registry.add_resource(NodePoolResource);
        registry.add_resource(NodeTemplateResource);
        registry.add_resource(ProjectResource);
        registry.add_resource(ProjectLoggingResource);
        registry.add_resource(ProjectRoleTemplateBindingResource);
        registry.add_data_source(SettingDataSource);
        registry
    }

    fn add_resource<R: Resource>(&mut self, resource: R) {
        self.resources.insert(R::TYPE_NAME, Arc::new(resource));
    }

    fn add_data_source<D: DataSource>(&mut self, data_source: D) {
        self.data_sources.insert(D::TYPE_NAME, Arc::new(data_source));
    }

    pub fn resource(&self, type_name: &str) -> ProviderResult<Arc<dyn DynamicResource>> {
        self.resources
            .get(type_name)
            .cloned()
            .context(format!("Unknown resource type '{}'", type_name))
    }

    pub fn data_source(&self, type_name: &str) -> ProviderResult<Arc<dyn DynamicDataSource>> {
        self.data_sources
            .get(type_name)
            .cloned()
            .context(format!("Unknown data source type '{}'", type_name))
    }

    pub fn resource_types(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.resources.keys().copied()
    }

    pub fn data_source_types(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.data_sources.keys().copied()
    }
}

/// The cluster part of a `{cluster_id}:{project_id}` project id.
pub(crate) fn cluster_id_from_project_id(project_id: &str) -> ProviderResult<String> {
    match project_id.split_once(':') {
        Some((cluster_id, project)) if !cluster_id.is_empty() && !project.is_empty() => {
            Ok(cluster_id.to_string())
        }
        _ => Err(ProviderError::new_with_context(format!(
            "Project ID '{}' is not in the format '<cluster_id>:<project_id>'",
            project_id
        ))),
    }
}

/// Split an import id of the form `{first}.{second}`.
pub(crate) fn split_import_id(id: &str, format: &str) -> ProviderResult<(String, String)> {
    match id.split_once('.') {
        Some((first, second)) if !first.is_empty() && !second.is_empty() => {
            Ok((first.to_string(), second.to_string()))
        }
        _ => Err(ProviderError::new_with_context(format!(
            "Import ID '{}' is not in the format '{}'",
            id, format
        ))),
    }
}

pub(crate) fn require(attribute: &str, value: &str) -> ProviderResult<()> {
    if value.is_empty() {
        return Err(ProviderError::new_with_context(format!(
            "Attribute '{}' is required",
            attribute
        )));
    }
    Ok(())
}

/// An `Option<String>` that is present and not empty.
pub(crate) fn is_set(value: &Option<String>) -> bool {
    value.as_deref().map(|s| !s.is_empty()).unwrap_or_default()
}

/// Read the state of an object that was just written. The object vanishing in between is an error.
pub(crate) async fn read_back<R: Resource>(
    resource: &R,
    meta: &Meta,
    state: R::State,
) -> ProviderResult<R::State> {
    let id = state.id().to_string();
    resource.read(meta, state).await?.context(format!(
        "{} '{}' disappeared after it was written",
        R::TYPE_NAME,
        id
    ))
}

/// Import by plain id: read the object and fail if it does not exist.
pub(crate) async fn import_by_id<R: Resource>(
    resource: &R,
    meta: &Meta,
    state: R::State,
) -> ProviderResult<Vec<R::State>> {
    let id = state.id().to_string();
    let state = resource
        .read(meta, state)
        .await?
        .context(format!("{} '{}' not found", R::TYPE_NAME, id))?;
    Ok(vec![state])
}

#[cfg(test)]
pub(crate) mod test {
    use super::*;
    use crate::config::ProviderConfig;
    use httpmock::MockServer;

    /// A provider pointed at `server` with near-instant state polling.
    pub(crate) fn test_meta(server: &MockServer) -> Meta {
        Meta::new(ProviderConfig {
            api_url: Some(server.base_url()),
            token_key: Some("token-abc:xyz".to_string()),
            refresh_delay_millis: Some(1),
            refresh_interval_millis: Some(5),
            ..Default::default()
        })
        .unwrap()
    }

    #[test]
    fn project_id_format() {
        assert_eq!(cluster_id_from_project_id("c-abc:p-123").unwrap(), "c-abc");
        assert!(cluster_id_from_project_id("c-abc").is_err());
        assert!(cluster_id_from_project_id(":p-123").is_err());
        assert!(cluster_id_from_project_id("c-abc:").is_err());
    }

    #[test]
    fn import_id_format() {
        let (project, namespace) =
            split_import_id("c-abc:p-123.foo", "<project_id>.<namespace_id>").unwrap();
        assert_eq!(project, "c-abc:p-123");
        assert_eq!(namespace, "foo");
        let err = split_import_id("foo", "<project_id>.<namespace_id>").unwrap_err();
        assert_eq!(
            err.to_string(),
            "Import ID 'foo' is not in the format '<project_id>.<namespace_id>'"
        );
    }

    #[test]
    fn registry_lists_every_type() {
        let registry = Registry::new();
        let types: Vec<_> = registry.resource_types().collect();
        assert_eq!(types.len(), 21);
        assert!(types.contains(&"rancher2_namespace"));
        assert!(types.contains(&"rancher2_auth_config_github"));
        assert!(registry.resource("rancher2_nope").is_err());
        assert!(registry.data_source("rancher2_setting").is_ok());
    }
}
