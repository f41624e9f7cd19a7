use super::quota::{expand_project_quota, flatten_project_quota, ProjectQuota};
use super::{import_by_id, read_back, require};
use crate::error::{IntoProviderError, ProviderError, ProviderResult};
use crate::meta::Meta;
use crate::resource::{Resource, ResourceState, Timeouts};
use log::info;
use model::clients::{AllowNotFound, CrudClient};
use model::types::Project;
use model::{ApiObject, Configuration, ObjectMeta};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ProjectState {
    /// `{cluster_id}:{project_id}`.
    #[serde(default)]
    pub id: String,
    /// The owning cluster. Changing it replaces the project.
    pub cluster_id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub enable_project_monitoring: bool,
    #[serde(default)]
    pub resource_quota: Option<ProjectQuota>,
    #[serde(default)]
    pub annotations: BTreeMap<String, String>,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
}

impl Configuration for ProjectState {}

impl ResourceState for ProjectState {
    fn id(&self) -> &str {
        &self.id
    }

    fn validate(&self) -> ProviderResult<()> {
        require("cluster_id", &self.cluster_id)?;
        require("name", &self.name)
    }
}

pub(crate) fn flatten_project(project: &Project) -> ProjectState {
    ProjectState {
        id: project.id().to_string(),
        cluster_id: project.cluster_id.clone().unwrap_or_default(),
        name: project.name().to_string(),
        description: project.description.clone(),
        enable_project_monitoring: project.enable_project_monitoring.unwrap_or_default(),
        resource_quota: flatten_project_quota(
            project.resource_quota.as_ref(),
            project.namespace_default_resource_quota.as_ref(),
        ),
        annotations: project.annotations(),
        labels: project.labels(),
    }
}

pub(crate) fn expand_project(state: &ProjectState) -> Project {
    let (resource_quota, namespace_default_resource_quota) =
        match state.resource_quota.as_ref().map(expand_project_quota) {
            Some((project, namespace_default)) => (Some(project), Some(namespace_default)),
            None => (None, None),
        };
    Project {
        meta: ObjectMeta::new(&state.name, state.annotations.clone(), state.labels.clone()),
        cluster_id: Some(state.cluster_id.clone()),
        description: state.description.clone(),
        enable_project_monitoring: Some(state.enable_project_monitoring),
        resource_quota,
        namespace_default_resource_quota,
    }
}

pub struct ProjectResource;

#[async_trait::async_trait]
impl Resource for ProjectResource {
    type State = ProjectState;

    const TYPE_NAME: &'static str = "rancher2_project";

    fn requires_replace(&self, prior: &ProjectState, planned: &ProjectState) -> bool {
        prior.cluster_id != planned.cluster_id
    }

    async fn create(
        &self,
        meta: &Meta,
        planned: ProjectState,
        timeouts: &Timeouts,
    ) -> ProviderResult<ProjectState> {
        if !meta.is_cluster_active(&planned.cluster_id).await? {
            return Err(ProviderError::new_with_context(format!(
                "Cluster ID {} is not active",
                planned.cluster_id
            )));
        }

        info!(
            "Creating project '{}' in cluster '{}'",
            planned.name, planned.cluster_id
        );
        let projects = meta.management::<Project>();
        let created = projects
            .create(&expand_project(&planned))
            .await
            .context(format!("Unable to create project '{}'", planned.name))?;

        meta.state_change(
            format!("project '{}'", created.id()),
            &["initializing", "activating"],
            &["active"],
            timeouts.create,
        )
        .wait_for_state(|| projects.state_refresh(created.id()))
        .await
        .context(format!(
            "Error waiting for project '{}' to be created",
            created.id()
        ))?;

        let state = ProjectState {
            id: created.id().to_string(),
            ..planned
        };
        read_back(self, meta, state).await
    }

    async fn read(
        &self,
        meta: &Meta,
        state: ProjectState,
    ) -> ProviderResult<Option<ProjectState>> {
        let project = meta
            .management::<Project>()
            .by_id(&state.id)
            .await
            .allow_not_found(|_| ())
            .context(format!("Unable to get project '{}'", state.id))?;
        match project {
            Some(project) if !project.is_removed() => Ok(Some(flatten_project(&project))),
            _ => {
                info!("Project '{}' not found", state.id);
                Ok(None)
            }
        }
    }

    async fn update(
        &self,
        meta: &Meta,
        prior: ProjectState,
        planned: ProjectState,
        timeouts: &Timeouts,
    ) -> ProviderResult<ProjectState> {
        let projects = meta.management::<Project>();
        let existing = projects
            .by_id(&prior.id)
            .await
            .context(format!("Unable to get project '{}'", prior.id))?;

        info!("Updating project '{}'", prior.id);
        projects
            .update(&existing, &expand_project(&planned))
            .await
            .context(format!("Unable to update project '{}'", prior.id))?;

        meta.state_change(
            format!("project '{}'", prior.id),
            &["active"],
            &["active"],
            timeouts.update,
        )
        .wait_for_state(|| projects.state_refresh(&prior.id))
        .await
        .context(format!(
            "Error waiting for project '{}' to be updated",
            prior.id
        ))?;

        let state = ProjectState {
            id: prior.id.clone(),
            ..planned
        };
        read_back(self, meta, state).await
    }

    async fn delete(
        &self,
        meta: &Meta,
        state: ProjectState,
        timeouts: &Timeouts,
    ) -> ProviderResult<()> {
        let projects = meta.management::<Project>();
        let existing = match projects
            .by_id(&state.id)
            .await
            .allow_not_found(|_| ())
            .context(format!("Unable to get project '{}'", state.id))?
        {
            Some(project) => project,
            None => return Ok(()),
        };

        info!("Deleting project '{}'", state.id);
        projects
            .delete(&existing)
            .await
            .allow_not_found(|_| ())
            .context(format!("Unable to delete project '{}'", state.id))?;

        meta.state_change(
            format!("project '{}'", state.id),
            &["removing"],
            &["removed"],
            timeouts.delete,
        )
        .wait_for_state(|| projects.state_refresh(&state.id))
        .await
        .context(format!(
            "Error waiting for project '{}' to be removed",
            state.id
        ))?;
        Ok(())
    }

    async fn import(&self, meta: &Meta, id: &str) -> ProviderResult<Vec<ProjectState>> {
        let state = ProjectState {
            id: id.to_string(),
            ..Default::default()
        };
        import_by_id(self, meta, state).await
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::resources::quota::test::limit_conf;
    use crate::resources::test::test_meta;
    use httpmock::prelude::*;
    use model::types::{NamespaceResourceQuota, ProjectResourceQuota};
    use serde_json::json;

    fn project_conf() -> Project {
        Project {
            meta: ObjectMeta {
                name: Some("test".to_string()),
                ..Default::default()
            },
            cluster_id: Some("cluster-test".to_string()),
            description: Some("description".to_string()),
            enable_project_monitoring: Some(false),
            resource_quota: Some(ProjectResourceQuota {
                limit: Some(limit_conf()),
                used_limit: None,
            }),
            namespace_default_resource_quota: Some(NamespaceResourceQuota {
                limit: Some(limit_conf()),
            }),
        }
    }

    #[test]
    fn flatten() {
        let state = flatten_project(&project_conf());
        assert_eq!(state.cluster_id, "cluster-test");
        assert_eq!(state.name, "test");
        assert_eq!(state.description.as_deref(), Some("description"));
        let quota = state.resource_quota.unwrap();
        assert_eq!(quota.project_limit.limits_cpu.as_deref(), Some("cpu"));
        assert_eq!(
            quota.namespace_default_limit.requests_storage.as_deref(),
            Some("r_storage")
        );
    }

    #[test]
    fn expand() {
        let expected = Project {
            meta: ObjectMeta {
                annotations: Some(BTreeMap::new()),
                labels: Some(BTreeMap::new()),
                ..project_conf().meta
            },
            ..project_conf()
        };
        assert_eq!(expand_project(&flatten_project(&project_conf())), expected);
    }

    #[tokio::test]
    async fn create_waits_through_initializing() {
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
                    .path("/v3/projects")
                    .json_body_partial(r#"{"name": "web", "clusterId": "c-abc"}"#);
                then.status(201).json_body(json!({
                    "id": "c-abc:p-123",
                    "name": "web",
                    "state": "initializing",
                    "clusterId": "c-abc"
                }));
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/v3/projects/c-abc:p-123");
                then.status(200).json_body(json!({
                    "id": "c-abc:p-123",
                    "name": "web",
                    "state": "active",
                    "clusterId": "c-abc"
                }));
            })
            .await;

        let planned = ProjectState {
            cluster_id: "c-abc".to_string(),
            name: "web".to_string(),
            ..Default::default()
        };
        let state = ProjectResource
            .create(&meta, planned, &Timeouts::default())
            .await
            .unwrap();
        create.assert_async().await;
        assert_eq!(state.id, "c-abc:p-123");
        assert!(state.resource_quota.is_none());
    }

    #[tokio::test]
    async fn read_missing_project() {
        let server = MockServer::start_async().await;
        let meta = test_meta(&server);
        server
            .mock_async(|when, then| {
                when.method(GET).path("/v3/projects/c-abc:p-123");
                then.status(404).json_body(json!({"code": "NotFound"}));
            })
            .await;
        let state = ProjectState {
            id: "c-abc:p-123".to_string(),
            ..Default::default()
        };
        assert!(ProjectResource.read(&meta, state).await.unwrap().is_none());
    }
}
