use super::quota::{expand_namespace_quota, flatten_namespace_quota, NamespaceQuota};
use super::{cluster_id_from_project_id, read_back, require, split_import_id};
use crate::error::{IntoProviderError, ProviderError, ProviderResult};
use crate::meta::Meta;
use crate::resource::{Resource, ResourceState, Timeouts};
use log::info;
use model::clients::{AllowNotFound, CrudClient};
use model::types::{Namespace, NamespaceMoveInput};
use model::{ApiObject, Configuration, ObjectMeta};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A namespace inside a project.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct NamespaceState {
    #[serde(default)]
    pub id: String,
    /// The namespace name. Changing it replaces the namespace.
    pub name: String,
    /// `{cluster_id}:{project_id}` of the project the namespace belongs to.
    pub project_id: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub resource_quota: Option<NamespaceQuota>,
    #[serde(default)]
    pub annotations: BTreeMap<String, String>,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
}

impl Configuration for NamespaceState {}

impl ResourceState for NamespaceState {
    fn id(&self) -> &str {
        &self.id
    }

    fn validate(&self) -> ProviderResult<()> {
        require("name", &self.name)?;
        cluster_id_from_project_id(&self.project_id)?;
        Ok(())
    }
}

pub(crate) fn flatten_namespace(namespace: &Namespace) -> NamespaceState {
    NamespaceState {
        id: namespace.id().to_string(),
        name: namespace.name().to_string(),
        project_id: namespace.project_id.clone().unwrap_or_default(),
        description: namespace.description.clone(),
        resource_quota: namespace
            .resource_quota
            .as_ref()
            .and_then(flatten_namespace_quota),
        annotations: namespace.annotations(),
        labels: namespace.labels(),
    }
}

pub(crate) fn expand_namespace(state: &NamespaceState) -> Namespace {
    Namespace {
        meta: ObjectMeta::new(&state.name, state.annotations.clone(), state.labels.clone()),
        project_id: Some(state.project_id.clone()),
        description: state.description.clone(),
        resource_quota: state.resource_quota.as_ref().map(expand_namespace_quota),
    }
}

pub struct NamespaceResource;

#[async_trait::async_trait]
impl Resource for NamespaceResource {
    type State = NamespaceState;

    const TYPE_NAME: &'static str = "rancher2_namespace";

    fn requires_replace(&self, prior: &NamespaceState, planned: &NamespaceState) -> bool {
        prior.name != planned.name
            || cluster_id_from_project_id(&prior.project_id).ok()
                != cluster_id_from_project_id(&planned.project_id).ok()
    }

    async fn create(
        &self,
        meta: &Meta,
        planned: NamespaceState,
        timeouts: &Timeouts,
    ) -> ProviderResult<NamespaceState> {
        let cluster_id = cluster_id_from_project_id(&planned.project_id)?;
        if !meta.is_cluster_active(&cluster_id).await? {
            return Err(ProviderError::new_with_context(format!(
                "Cluster ID {} is not active",
                cluster_id
            )));
        }

        info!(
            "Creating namespace '{}' in project '{}'",
            planned.name, planned.project_id
        );
        let namespaces = meta.cluster_scoped::<Namespace>(&cluster_id);
        let created = namespaces
            .create(&expand_namespace(&planned))
            .await
            .context(format!("Unable to create namespace '{}'", planned.name))?;

        meta.state_change(
            format!("namespace '{}'", created.id()),
            &["activating"],
            &["active"],
            timeouts.create,
        )
        .wait_for_state(|| namespaces.state_refresh(created.id()))
        .await
        .context(format!(
            "Error waiting for namespace '{}' to be created",
            created.id()
        ))?;

        let state = NamespaceState {
            id: created.id().to_string(),
            ..planned
        };
        read_back(self, meta, state).await
    }

    async fn read(
        &self,
        meta: &Meta,
        state: NamespaceState,
    ) -> ProviderResult<Option<NamespaceState>> {
        let cluster_id = cluster_id_from_project_id(&state.project_id)?;
        let namespace = meta
            .cluster_scoped::<Namespace>(&cluster_id)
            .by_id(&state.id)
            .await
            .allow_not_found(|_| ())
            .context(format!("Unable to get namespace '{}'", state.id))?;
        match namespace {
            Some(namespace) if !namespace.is_removed() => Ok(Some(flatten_namespace(&namespace))),
            _ => {
                info!("Namespace '{}' not found", state.id);
                Ok(None)
            }
        }
    }

    async fn update(
        &self,
        meta: &Meta,
        prior: NamespaceState,
        planned: NamespaceState,
        timeouts: &Timeouts,
    ) -> ProviderResult<NamespaceState> {
        let cluster_id = cluster_id_from_project_id(&planned.project_id)?;
        let namespaces = meta.cluster_scoped::<Namespace>(&cluster_id);
        let existing = namespaces
            .by_id(&prior.id)
            .await
            .context(format!("Unable to get namespace '{}'", prior.id))?;

        if existing.project_id.as_deref().unwrap_or_default() != planned.project_id {
            info!(
                "Moving namespace '{}' to project '{}'",
                prior.id, planned.project_id
            );
            let _: serde_json::Value = namespaces
                .action(
                    &existing,
                    "move",
                    &NamespaceMoveInput {
                        project_id: planned.project_id.clone(),
                    },
                )
                .await
                .context(format!(
                    "Unable to move namespace '{}' to project '{}'",
                    prior.id, planned.project_id
                ))?;
        }

        info!("Updating namespace '{}'", prior.id);
        let update = Namespace {
            meta: ObjectMeta {
                annotations: Some(planned.annotations.clone()),
                labels: Some(planned.labels.clone()),
                ..Default::default()
            },
            project_id: None,
            description: planned.description.clone(),
            resource_quota: planned.resource_quota.as_ref().map(expand_namespace_quota),
        };
        namespaces
            .update(&existing, &update)
            .await
            .context(format!("Unable to update namespace '{}'", prior.id))?;

        meta.state_change(
            format!("namespace '{}'", prior.id),
            &["active"],
            &["active"],
            timeouts.update,
        )
        .wait_for_state(|| namespaces.state_refresh(&prior.id))
        .await
        .context(format!(
            "Error waiting for namespace '{}' to be updated",
            prior.id
        ))?;

        let state = NamespaceState {
            id: prior.id.clone(),
            ..planned
        };
        read_back(self, meta, state).await
    }

    async fn delete(
        &self,
        meta: &Meta,
        state: NamespaceState,
        timeouts: &Timeouts,
    ) -> ProviderResult<()> {
        let cluster_id = cluster_id_from_project_id(&state.project_id)?;
        let namespaces = meta.cluster_scoped::<Namespace>(&cluster_id);
        let existing = match namespaces
            .by_id(&state.id)
            .await
            .allow_not_found(|_| ())
            .context(format!("Unable to get namespace '{}'", state.id))?
        {
            Some(namespace) => namespace,
            None => return Ok(()),
        };

        info!("Deleting namespace '{}'", state.id);
        namespaces
            .delete(&existing)
            .await
            .allow_not_found(|_| ())
            .context(format!("Unable to delete namespace '{}'", state.id))?;

        meta.state_change(
            format!("namespace '{}'", state.id),
            &["removing"],
            &["removed"],
            timeouts.delete,
        )
        .wait_for_state(|| namespaces.state_refresh(&state.id))
        .await
        .context(format!(
            "Error waiting for namespace '{}' to be removed",
            state.id
        ))?;
        Ok(())
    }

    /// Import ids are `{project_id}.{namespace_id}`.
    async fn import(&self, meta: &Meta, id: &str) -> ProviderResult<Vec<NamespaceState>> {
        let (project_id, namespace_id) = split_import_id(id, "<project_id>.<namespace_id>")?;
        let state = NamespaceState {
            id: namespace_id,
            project_id,
            ..Default::default()
        };
        let state = self
            .read(meta, state)
            .await?
            .context(format!("Namespace '{}' not found", id))?;
        Ok(vec![state])
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::resources::quota::test::limit_conf;
    use crate::resources::test::test_meta;
    use httpmock::prelude::*;
    use maplit::btreemap;
    use model::types::NamespaceResourceQuota;
    use serde_json::json;

    fn namespace_conf() -> Namespace {
        Namespace {
            meta: ObjectMeta {
                id: Some("test".to_string()),
                name: Some("test".to_string()),
                annotations: Some(btreemap! {"node_one".to_string() => "one".to_string()}),
                labels: Some(btreemap! {"option1".to_string() => "value1".to_string()}),
                ..Default::default()
            },
            project_id: Some("project:test".to_string()),
            description: Some("description".to_string()),
            resource_quota: Some(NamespaceResourceQuota {
                limit: Some(limit_conf()),
            }),
        }
    }

    #[test]
    fn flatten() {
        let state = flatten_namespace(&namespace_conf());
        assert_eq!(state.id, "test");
        assert_eq!(state.name, "test");
        assert_eq!(state.project_id, "project:test");
        assert_eq!(state.description.as_deref(), Some("description"));
        assert_eq!(
            state.resource_quota.as_ref().unwrap().limit.pods.as_deref(),
            Some("pods")
        );
        assert_eq!(state.labels.get("option1").unwrap(), "value1");
    }

    #[test]
    fn expand() {
        let expected = Namespace {
            meta: ObjectMeta {
                id: None,
                ..namespace_conf().meta
            },
            ..namespace_conf()
        };
        assert_eq!(expand_namespace(&flatten_namespace(&namespace_conf())), expected);
    }

    #[test]
    fn replace_on_cluster_change() {
        let prior = flatten_namespace(&namespace_conf());
        let same_cluster = NamespaceState {
            project_id: "project:other".to_string(),
            ..prior.clone()
        };
        let other_cluster = NamespaceState {
            project_id: "cluster:test".to_string(),
            ..prior.clone()
        };
        let renamed = NamespaceState {
            name: "renamed".to_string(),
            ..prior.clone()
        };
        let resource = NamespaceResource;
        assert!(!resource.requires_replace(&prior, &same_cluster));
        assert!(resource.requires_replace(&prior, &other_cluster));
        assert!(resource.requires_replace(&prior, &renamed));
    }

    #[test]
    fn validate_project_id() {
        let state = NamespaceState {
            name: "foo".to_string(),
            project_id: "p-123".to_string(),
            ..Default::default()
        };
        assert!(state.validate().is_err());
    }

    fn active_namespace(server: &MockServer, project_id: &str) -> serde_json::Value {
        json!({
            "id": "foo",
            "name": "foo",
            "state": "active",
            "projectId": project_id,
            "description": "bar",
            "labels": {"team": "a"},
            "links": {
                "self": server.url("/v3/clusters/c-abc/namespaces/foo"),
                "update": server.url("/v3/clusters/c-abc/namespaces/foo"),
                "remove": server.url("/v3/clusters/c-abc/namespaces/foo"),
            },
            "actions": {
                "move": server.url("/v3/clusters/c-abc/namespaces/foo?action=move"),
            }
        })
    }

    #[tokio::test]
    async fn create_waits_for_active() {
        let server = MockServer::start_async().await;
        let meta = test_meta(&server);
        server
            .mock_async(|when, then| {
                when.method(GET).path("/v3/clusters/c-abc");
                then.status(200)
                    .json_body(json!({"id": "c-abc", "state": "active"}));
            })
            .await;
        let create = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/v3/clusters/c-abc/namespaces")
                    .json_body_partial(r#"{"name": "foo", "projectId": "c-abc:p-123"}"#);
                then.status(201).json_body(json!({
                    "id": "foo",
                    "name": "foo",
                    "state": "activating",
                    "projectId": "c-abc:p-123"
                }));
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/v3/clusters/c-abc/namespaces/foo");
                then.status(200)
                    .json_body(active_namespace(&server, "c-abc:p-123"));
            })
            .await;

        let planned = NamespaceState {
            name: "foo".to_string(),
            project_id: "c-abc:p-123".to_string(),
            description: Some("bar".to_string()),
            ..Default::default()
        };
        let state = NamespaceResource
            .create(&meta, planned, &Timeouts::default())
            .await
            .unwrap();
        create.assert_async().await;
        assert_eq!(state.id, "foo");
        assert_eq!(state.labels.get("team").unwrap(), "a");
    }

    #[tokio::test]
    async fn create_requires_active_cluster() {
        let server = MockServer::start_async().await;
        let meta = test_meta(&server);
        server
            .mock_async(|when, then| {
                when.method(GET).path("/v3/clusters/c-abc");
                then.status(200)
                    .json_body(json!({"id": "c-abc", "state": "provisioning"}));
            })
            .await;
        let planned = NamespaceState {
            name: "foo".to_string(),
            project_id: "c-abc:p-123".to_string(),
            ..Default::default()
        };
        let err = NamespaceResource
            .create(&meta, planned, &Timeouts::default())
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Cluster ID c-abc is not active");
    }

    #[tokio::test]
    async fn update_moves_between_projects() {
        let server = MockServer::start_async().await;
        let meta = test_meta(&server);
        server
            .mock_async(|when, then| {
                when.method(GET).path("/v3/clusters/c-abc/namespaces/foo");
                then.status(200)
                    .json_body(active_namespace(&server, "c-abc:p-123"));
            })
            .await;
        let move_action = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/v3/clusters/c-abc/namespaces/foo")
                    .query_param("action", "move")
                    .json_body(json!({"projectId": "c-abc:p-456"}));
                then.status(200).body("");
            })
            .await;
        let update = server
            .mock_async(|when, then| {
                when.method(PUT)
                    .path("/v3/clusters/c-abc/namespaces/foo")
                    .json_body_partial(r#"{"description": "baz"}"#);
                then.status(200)
                    .json_body(active_namespace(&server, "c-abc:p-456"));
            })
            .await;

        let prior = NamespaceState {
            id: "foo".to_string(),
            name: "foo".to_string(),
            project_id: "c-abc:p-123".to_string(),
            ..Default::default()
        };
        let planned = NamespaceState {
            project_id: "c-abc:p-456".to_string(),
            description: Some("baz".to_string()),
            ..prior.clone()
        };
        NamespaceResource
            .update(&meta, prior, planned, &Timeouts::default())
            .await
            .unwrap();
        move_action.assert_async().await;
        update.assert_async().await;
    }

    #[tokio::test]
    async fn delete_waits_for_removal() {
        let server = MockServer::start_async().await;
        let meta = test_meta(&server);
        server
            .mock_async(|when, then| {
                when.method(GET).path("/v3/clusters/c-abc/namespaces/foo");
                then.status(200).json_body(json!({
                    "id": "foo",
                    "state": "removing",
                    "removed": "2020-01-01T00:00:00Z",
                    "links": {"remove": server.url("/v3/clusters/c-abc/namespaces/foo")}
                }));
            })
            .await;
        let delete = server
            .mock_async(|when, then| {
                when.method(DELETE).path("/v3/clusters/c-abc/namespaces/foo");
                then.status(204);
            })
            .await;
        let state = NamespaceState {
            id: "foo".to_string(),
            name: "foo".to_string(),
            project_id: "c-abc:p-123".to_string(),
            ..Default::default()
        };
        NamespaceResource
            .delete(&meta, state, &Timeouts::default())
            .await
            .unwrap();
        delete.assert_async().await;
    }

    #[tokio::test]
    async fn delete_missing_namespace() {
        let server = MockServer::start_async().await;
        let meta = test_meta(&server);
        server
            .mock_async(|when, then| {
                when.method(GET).path("/v3/clusters/c-abc/namespaces/foo");
                then.status(404).json_body(json!({"code": "NotFound"}));
            })
            .await;
        let state = NamespaceState {
            id: "foo".to_string(),
            name: "foo".to_string(),
            project_id: "c-abc:p-123".to_string(),
            ..Default::default()
        };
        assert!(NamespaceResource
            .delete(&meta, state, &Timeouts::default())
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn import_by_project_and_name() {
        let server = MockServer::start_async().await;
        let meta = test_meta(&server);
        server
            .mock_async(|when, then| {
                when.method(GET).path("/v3/clusters/c-abc/namespaces/foo");
                then.status(200)
                    .json_body(active_namespace(&server, "c-abc:p-123"));
            })
            .await;
        let states = NamespaceResource
            .import(&meta, "c-abc:p-123.foo")
            .await
            .unwrap();
        assert_eq!(states.len(), 1);
        assert_eq!(states[0].project_id, "c-abc:p-123");
        assert_eq!(states[0].description.as_deref(), Some("bar"));
    }
}
