use super::{cluster_id_from_project_id, read_back, require};
use crate::error::{IntoProviderError, ProviderError, ProviderResult};
use crate::meta::Meta;
use crate::resource::{Resource, ResourceState, Timeouts};
use log::{info, warn};
use model::clients::{AllowNotFound, CrudClient};
use model::types::Namespace;
use model::{ApiObject, Configuration};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::BTreeMap;
use std::time::Duration;

/// Moves an existing namespace, one that was not created through this provider, into a project.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct NamespaceMoveState {
    #[serde(default)]
    pub id: String,
    pub cluster_id: String,
    /// The target project. Empty moves the namespace out of every project.
    #[serde(default)]
    pub project_id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub annotations: BTreeMap<String, String>,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
}

impl Configuration for NamespaceMoveState {}

impl ResourceState for NamespaceMoveState {
    fn id(&self) -> &str {
        &self.id
    }

    fn validate(&self) -> ProviderResult<()> {
        require("cluster_id", &self.cluster_id)?;
        require("name", &self.name)?;
        if self.project_id.is_empty() {
            return Ok(());
        }
        let project_cluster = cluster_id_from_project_id(&self.project_id)?;
        if project_cluster != self.cluster_id {
            return Err(ProviderError::new_with_context(format!(
                "Project '{}' is not in cluster '{}'",
                self.project_id, self.cluster_id
            )));
        }
        Ok(())
    }
}

fn flatten_namespace_move(cluster_id: &str, namespace: &Namespace) -> NamespaceMoveState {
    NamespaceMoveState {
        id: namespace.id().to_string(),
        cluster_id: cluster_id.to_string(),
        project_id: namespace.project_id.clone().unwrap_or_default(),
        name: namespace.name().to_string(),
        description: namespace.description.clone(),
        annotations: namespace.annotations(),
        labels: namespace.labels(),
    }
}

pub struct NamespaceMoveResource;

impl NamespaceMoveResource {
    /// Point the namespace `name` at `project_id`, keeping everything else the namespace has.
    async fn move_to_project(
        &self,
        meta: &Meta,
        cluster_id: &str,
        name: &str,
        project_id: &str,
        timeout: Duration,
    ) -> ProviderResult<Namespace> {
        if !meta.is_cluster_active(cluster_id).await? {
            return Err(ProviderError::new_with_context(format!(
                "Cluster ID {} is not active",
                cluster_id
            )));
        }

        let namespaces = meta.cluster_scoped::<Namespace>(cluster_id);
        let existing = namespaces
            .by_id(name)
            .await
            .context(format!("Unable to get namespace '{}'", name))?;
        info!(
            "Moving namespace '{}' from project '{}' to '{}'",
            name,
            existing.project_id.as_deref().unwrap_or_default(),
            project_id
        );

        let update = json!({
            "projectId": project_id,
            "description": existing.description,
            "annotations": existing.meta.annotations,
            "labels": existing.meta.labels,
        });
        let moved = namespaces
            .update(&existing, &update)
            .await
            .context(format!("Unable to move namespace '{}'", name))?;

        meta.state_change(
            format!("namespace '{}'", moved.id()),
            &["active"],
            &["active"],
            timeout,
        )
        .wait_for_state(|| namespaces.state_refresh(moved.id()))
        .await
        .context(format!(
            "Error waiting for namespace '{}' to be updated",
            moved.id()
        ))?;
        Ok(moved)
    }
}

#[async_trait::async_trait]
impl Resource for NamespaceMoveResource {
    type State = NamespaceMoveState;

    const TYPE_NAME: &'static str = "rancher2_namespace_move";

    fn requires_replace(&self, prior: &NamespaceMoveState, planned: &NamespaceMoveState) -> bool {
        prior.name != planned.name
    }

    async fn create(
        &self,
        meta: &Meta,
        planned: NamespaceMoveState,
        timeouts: &Timeouts,
    ) -> ProviderResult<NamespaceMoveState> {
        let moved = self
            .move_to_project(
                meta,
                &planned.cluster_id,
                &planned.name,
                &planned.project_id,
                timeouts.create,
            )
            .await?;
        read_back(self, meta, flatten_namespace_move(&planned.cluster_id, &moved)).await
    }

    async fn read(
        &self,
        meta: &Meta,
        state: NamespaceMoveState,
    ) -> ProviderResult<Option<NamespaceMoveState>> {
        let namespace = meta
            .cluster_scoped::<Namespace>(&state.cluster_id)
            .by_id(&state.id)
            .await
            .allow_not_found(|_| ())
            .context(format!("Unable to get namespace '{}'", state.id))?;
        match namespace {
            Some(namespace) => Ok(Some(flatten_namespace_move(&state.cluster_id, &namespace))),
            None => {
                info!("Namespace '{}' not found", state.id);
                Ok(None)
            }
        }
    }

    async fn update(
        &self,
        meta: &Meta,
        _prior: NamespaceMoveState,
        planned: NamespaceMoveState,
        timeouts: &Timeouts,
    ) -> ProviderResult<NamespaceMoveState> {
        let moved = self
            .move_to_project(
                meta,
                &planned.cluster_id,
                &planned.name,
                &planned.project_id,
                timeouts.update,
            )
            .await?;
        read_back(self, meta, flatten_namespace_move(&planned.cluster_id, &moved)).await
    }

    /// Moves the namespace out of its project. The namespace itself is left in place and failures
    /// are only logged.
    async fn delete(
        &self,
        meta: &Meta,
        state: NamespaceMoveState,
        timeouts: &Timeouts,
    ) -> ProviderResult<()> {
        info!("Moving namespace '{}' out of its project", state.name);
        if let Err(e) = self
            .move_to_project(meta, &state.cluster_id, &state.name, "", timeouts.delete)
            .await
        {
            warn!(
                "Unable to move namespace '{}' out of its project: {}",
                state.name, e
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::resources::test::test_meta;
    use httpmock::prelude::*;

    fn namespace(server: &MockServer, project_id: &str) -> serde_json::Value {
        json!({
            "id": "legacy",
            "name": "legacy",
            "state": "active",
            "projectId": project_id,
            "description": "created by hand",
            "labels": {"owner": "ops"},
            "links": {"update": server.url("/v3/clusters/c-abc/namespaces/legacy")}
        })
    }

    #[test]
    fn target_project_must_be_in_cluster() {
        let state = |project_id: &str| NamespaceMoveState {
            cluster_id: "c-abc".to_string(),
            project_id: project_id.to_string(),
            name: "legacy".to_string(),
            ..Default::default()
        };
        assert!(state("c-abc:p-123").validate().is_ok());
        assert!(state("").validate().is_ok());
        assert!(state("p-123")
            .validate()
            .unwrap_err()
            .to_string()
            .contains("<cluster_id>:<project_id>"));
        assert_eq!(
            state("c-other:p-123").validate().unwrap_err().to_string(),
            "Project 'c-other:p-123' is not in cluster 'c-abc'"
        );
    }

    #[tokio::test]
    async fn create_keeps_namespace_fields() {
        let server = MockServer::start_async().await;
        let meta = test_meta(&server);
        server
            .mock_async(|when, then| {
                when.method(GET).path("/v3/clusters/c-abc");
                then.status(200)
                    .json_body(json!({"id": "c-abc", "state": "active"}));
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/v3/clusters/c-abc/namespaces/legacy");
                then.status(200).json_body(namespace(&server, ""));
            })
            .await;
        let update = server
            .mock_async(|when, then| {
                when.method(PUT)
                    .path("/v3/clusters/c-abc/namespaces/legacy")
                    .json_body(json!({
                        "projectId": "c-abc:p-123",
                        "description": "created by hand",
                        "annotations": null,
                        "labels": {"owner": "ops"}
                    }));
                then.status(200)
                    .json_body(namespace(&server, "c-abc:p-123"));
            })
            .await;

        let planned = NamespaceMoveState {
            cluster_id: "c-abc".to_string(),
            project_id: "c-abc:p-123".to_string(),
            name: "legacy".to_string(),
            ..Default::default()
        };
        let state = NamespaceMoveResource
            .create(&meta, planned, &Timeouts::default())
            .await
            .unwrap();
        update.assert_async().await;
        assert_eq!(state.id, "legacy");
        assert_eq!(state.cluster_id, "c-abc");
        assert_eq!(state.description.as_deref(), Some("created by hand"));
    }

    #[tokio::test]
    async fn delete_ignores_errors() {
        let server = MockServer::start_async().await;
        let meta = test_meta(&server);
        server
            .mock_async(|when, then| {
                when.method(GET).path("/v3/clusters/c-abc");
                then.status(500).json_body(json!({"code": "ServerError"}));
            })
            .await;
        let state = NamespaceMoveState {
            id: "legacy".to_string(),
            cluster_id: "c-abc".to_string(),
            project_id: "c-abc:p-123".to_string(),
            name: "legacy".to_string(),
            ..Default::default()
        };
        assert!(NamespaceMoveResource
            .delete(&meta, state, &Timeouts::default())
            .await
            .is_ok());
    }
}
