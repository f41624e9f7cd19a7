use super::{import_by_id, read_back, require};
use crate::error::{IntoProviderError, ProviderError, ProviderResult};
use crate::meta::Meta;
use crate::resource::{Resource, ResourceState, Timeouts};
use log::{debug, info};
use model::clients::{AllowNotFound, Collection, CrudClient, REMOVED_STATE};
use model::types::{ClusterRoleTemplateBinding, ProjectRoleTemplateBinding};
use model::{ApiObject, Configuration, ObjectMeta};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::BTreeMap;
use std::time::Duration;

/// The role and the user or group a binding grants it to.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct BindingSubject {
    pub name: String,
    /// Changing the role template replaces the binding.
    pub role_template_id: String,
    #[serde(default)]
    pub group_id: Option<String>,
    #[serde(default)]
    pub group_principal_id: Option<String>,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub user_principal_id: Option<String>,
    #[serde(default)]
    pub annotations: BTreeMap<String, String>,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
}

impl BindingSubject {
    fn validate(&self) -> ProviderResult<()> {
        require("name", &self.name)?;
        require("role_template_id", &self.role_template_id)
    }

    fn update_body(&self) -> serde_json::Value {
        json!({
            "groupId": self.group_id.clone().unwrap_or_default(),
            "groupPrincipalId": self.group_principal_id.clone().unwrap_or_default(),
            "roleTemplateId": self.role_template_id,
            "userId": self.user_id.clone().unwrap_or_default(),
            "userPrincipalId": self.user_principal_id.clone().unwrap_or_default(),
            "annotations": self.annotations,
            "labels": self.labels,
        })
    }

    fn meta(&self) -> ObjectMeta {
        ObjectMeta::new(&self.name, self.annotations.clone(), self.labels.clone())
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ClusterRoleTemplateBindingState {
    #[serde(default)]
    pub id: String,
    pub cluster_id: String,
    #[serde(flatten)]
    pub subject: BindingSubject,
}

impl Configuration for ClusterRoleTemplateBindingState {}

impl ResourceState for ClusterRoleTemplateBindingState {
    fn id(&self) -> &str {
        &self.id
    }

    fn validate(&self) -> ProviderResult<()> {
        require("cluster_id", &self.cluster_id)?;
        self.subject.validate()
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ProjectRoleTemplateBindingState {
    #[serde(default)]
    pub id: String,
    pub project_id: String,
    #[serde(flatten)]
    pub subject: BindingSubject,
}

impl Configuration for ProjectRoleTemplateBindingState {}

impl ResourceState for ProjectRoleTemplateBindingState {
    fn id(&self) -> &str {
        &self.id
    }

    fn validate(&self) -> ProviderResult<()> {
        require("project_id", &self.project_id)?;
        self.subject.validate()
    }
}

pub(crate) fn flatten_cluster_binding(
    binding: &ClusterRoleTemplateBinding,
) -> ClusterRoleTemplateBindingState {
    ClusterRoleTemplateBindingState {
        id: binding.id().to_string(),
        cluster_id: binding.cluster_id.clone().unwrap_or_default(),
        subject: BindingSubject {
            name: binding.name().to_string(),
            role_template_id: binding.role_template_id.clone().unwrap_or_default(),
            group_id: binding.group_id.clone(),
            group_principal_id: binding.group_principal_id.clone(),
            user_id: binding.user_id.clone(),
            user_principal_id: binding.user_principal_id.clone(),
            annotations: binding.annotations(),
            labels: binding.labels(),
        },
    }
}

pub(crate) fn expand_cluster_binding(
    state: &ClusterRoleTemplateBindingState,
) -> ClusterRoleTemplateBinding {
    ClusterRoleTemplateBinding {
        meta: state.subject.meta(),
        cluster_id: Some(state.cluster_id.clone()),
        role_template_id: Some(state.subject.role_template_id.clone()),
        group_id: state.subject.group_id.clone(),
        group_principal_id: state.subject.group_principal_id.clone(),
        user_id: state.subject.user_id.clone(),
        user_principal_id: state.subject.user_principal_id.clone(),
    }
}

pub(crate) fn flatten_project_binding(
    binding: &ProjectRoleTemplateBinding,
) -> ProjectRoleTemplateBindingState {
    ProjectRoleTemplateBindingState {
        id: binding.id().to_string(),
        project_id: binding.project_id.clone().unwrap_or_default(),
        subject: BindingSubject {
            name: binding.name().to_string(),
            role_template_id: binding.role_template_id.clone().unwrap_or_default(),
            group_id: binding.group_id.clone(),
            group_principal_id: binding.group_principal_id.clone(),
            user_id: binding.user_id.clone(),
            user_principal_id: binding.user_principal_id.clone(),
            annotations: binding.annotations(),
            labels: binding.labels(),
        },
    }
}

pub(crate) fn expand_project_binding(
    state: &ProjectRoleTemplateBindingState,
) -> ProjectRoleTemplateBinding {
    ProjectRoleTemplateBinding {
        meta: state.subject.meta(),
        project_id: Some(state.project_id.clone()),
        role_template_id: Some(state.subject.role_template_id.clone()),
        group_id: state.subject.group_id.clone(),
        group_principal_id: state.subject.group_principal_id.clone(),
        user_id: state.subject.user_id.clone(),
        user_principal_id: state.subject.user_principal_id.clone(),
    }
}

/// Bindings have no lifecycle of their own: they are `active` until they are gone.
async fn binding_refresh<T: ApiObject>(
    bindings: &Collection<T>,
    id: &str,
) -> model::clients::Result<(Option<T>, String)> {
    let (binding, state) = bindings.state_refresh(id).await?;
    if state == REMOVED_STATE {
        Ok((binding, state))
    } else {
        Ok((binding, "active".to_string()))
    }
}

async fn ensure_role_template(meta: &Meta, role_template_id: &str) -> ProviderResult<()> {
    if !meta.role_template_exists(role_template_id).await? {
        return Err(ProviderError::new_with_context(format!(
            "Role template '{}' does not exist",
            role_template_id
        )));
    }
    Ok(())
}

async fn create_binding<T: ApiObject>(
    meta: &Meta,
    bindings: &Collection<T>,
    binding: &T,
    timeout: Duration,
) -> ProviderResult<String> {
    info!("Creating {} '{}'", T::COLLECTION, binding.name());
    let created = bindings
        .create(binding)
        .await
        .context(format!("Unable to create {} '{}'", T::COLLECTION, binding.name()))?;
    wait_for_binding(meta, bindings, created.id(), "active", timeout).await?;
    Ok(created.id().to_string())
}

async fn read_binding<T: ApiObject>(
    bindings: &Collection<T>,
    id: &str,
) -> ProviderResult<Option<T>> {
    let binding = bindings
        .by_id(id)
        .await
        .allow_not_found(|_| ())
        .context(format!("Unable to get {} '{}'", T::COLLECTION, id))?;
    match binding {
        Some(binding) if !binding.is_removed() => Ok(Some(binding)),
        _ => {
            info!("{} '{}' not found", T::COLLECTION, id);
            Ok(None)
        }
    }
}

async fn update_binding<T: ApiObject>(
    meta: &Meta,
    bindings: &Collection<T>,
    id: &str,
    subject: &BindingSubject,
    timeout: Duration,
) -> ProviderResult<()> {
    let existing = bindings
        .by_id(id)
        .await
        .context(format!("Unable to get {} '{}'", T::COLLECTION, id))?;
    info!("Updating {} '{}'", T::COLLECTION, id);
    bindings
        .update(&existing, &subject.update_body())
        .await
        .context(format!("Unable to update {} '{}'", T::COLLECTION, id))?;
    wait_for_binding(meta, bindings, id, "active", timeout).await
}

async fn delete_binding<T: ApiObject>(
    meta: &Meta,
    bindings: &Collection<T>,
    id: &str,
    timeout: Duration,
) -> ProviderResult<()> {
    let existing = match read_binding(bindings, id).await? {
        Some(binding) => binding,
        None => return Ok(()),
    };
    info!("Deleting {} '{}'", T::COLLECTION, id);
    bindings
        .delete(&existing)
        .await
        .allow_not_found(|_| ())
        .context(format!("Unable to delete {} '{}'", T::COLLECTION, id))?;
    debug!("Waiting for {} '{}' to be removed", T::COLLECTION, id);
    wait_for_binding(meta, bindings, id, REMOVED_STATE, timeout).await
}

async fn wait_for_binding<T: ApiObject>(
    meta: &Meta,
    bindings: &Collection<T>,
    id: &str,
    target: &str,
    timeout: Duration,
) -> ProviderResult<()> {
    meta.state_change(
        format!("{} '{}'", T::COLLECTION, id),
        &["active"],
        &[target],
        timeout,
    )
    .wait_for_state(|| binding_refresh(bindings, id))
    .await
    .context(format!(
        "Error waiting for {} '{}' to be {}",
        T::COLLECTION,
        id,
        target
    ))?;
    Ok(())
}

pub struct ClusterRoleTemplateBindingResource;

#[async_trait::async_trait]
impl Resource for ClusterRoleTemplateBindingResource {
    type State = ClusterRoleTemplateBindingState;

    const TYPE_NAME: &'static str = "rancher2_cluster_role_template_binding";

    fn requires_replace(
        &self,
        prior: &ClusterRoleTemplateBindingState,
        planned: &ClusterRoleTemplateBindingState,
    ) -> bool {
        prior.cluster_id != planned.cluster_id
            || prior.subject.role_template_id != planned.subject.role_template_id
    }

    async fn create(
        &self,
        meta: &Meta,
        planned: ClusterRoleTemplateBindingState,
        timeouts: &Timeouts,
    ) -> ProviderResult<ClusterRoleTemplateBindingState> {
        if !meta.cluster_exists(&planned.cluster_id).await? {
            return Err(ProviderError::new_with_context(format!(
                "Cluster '{}' does not exist",
                planned.cluster_id
            )));
        }
        ensure_role_template(meta, &planned.subject.role_template_id).await?;
        let id = create_binding(
            meta,
            &meta.management(),
            &expand_cluster_binding(&planned),
            timeouts.create,
        )
        .await?;
        read_back(self, meta, ClusterRoleTemplateBindingState { id, ..planned }).await
    }

    async fn read(
        &self,
        meta: &Meta,
        state: ClusterRoleTemplateBindingState,
    ) -> ProviderResult<Option<ClusterRoleTemplateBindingState>> {
        Ok(
            read_binding::<ClusterRoleTemplateBinding>(&meta.management(), &state.id)
                .await?
                .map(|binding| flatten_cluster_binding(&binding)),
        )
    }

    async fn update(
        &self,
        meta: &Meta,
        prior: ClusterRoleTemplateBindingState,
        planned: ClusterRoleTemplateBindingState,
        timeouts: &Timeouts,
    ) -> ProviderResult<ClusterRoleTemplateBindingState> {
        update_binding::<ClusterRoleTemplateBinding>(
            meta,
            &meta.management(),
            &prior.id,
            &planned.subject,
            timeouts.update,
        )
        .await?;
        let state = ClusterRoleTemplateBindingState {
            id: prior.id,
            ..planned
        };
        read_back(self, meta, state).await
    }

    async fn delete(
        &self,
        meta: &Meta,
        state: ClusterRoleTemplateBindingState,
        timeouts: &Timeouts,
    ) -> ProviderResult<()> {
        delete_binding::<ClusterRoleTemplateBinding>(
            meta,
            &meta.management(),
            &state.id,
            timeouts.delete,
        )
        .await
    }

    async fn import(
        &self,
        meta: &Meta,
        id: &str,
    ) -> ProviderResult<Vec<ClusterRoleTemplateBindingState>> {
        let state = ClusterRoleTemplateBindingState {
            id: id.to_string(),
            ..Default::default()
        };
        import_by_id(self, meta, state).await
    }
}

pub struct ProjectRoleTemplateBindingResource;

#[async_trait::async_trait]
impl Resource for ProjectRoleTemplateBindingResource {
    type State = ProjectRoleTemplateBindingState;

    const TYPE_NAME: &'static str = "rancher2_project_role_template_binding";

    fn requires_replace(
        &self,
        prior: &ProjectRoleTemplateBindingState,
        planned: &ProjectRoleTemplateBindingState,
    ) -> bool {
        prior.project_id != planned.project_id
            || prior.subject.role_template_id != planned.subject.role_template_id
    }

    async fn create(
        &self,
        meta: &Meta,
        planned: ProjectRoleTemplateBindingState,
        timeouts: &Timeouts,
    ) -> ProviderResult<ProjectRoleTemplateBindingState> {
        if !meta.project_exists(&planned.project_id).await? {
            return Err(ProviderError::new_with_context(format!(
                "Project '{}' does not exist",
                planned.project_id
            )));
        }
        ensure_role_template(meta, &planned.subject.role_template_id).await?;
        let id = create_binding(
            meta,
            &meta.management(),
            &expand_project_binding(&planned),
            timeouts.create,
        )
        .await?;
        read_back(self, meta, ProjectRoleTemplateBindingState { id, ..planned }).await
    }

    async fn read(
        &self,
        meta: &Meta,
        state: ProjectRoleTemplateBindingState,
    ) -> ProviderResult<Option<ProjectRoleTemplateBindingState>> {
        Ok(
            read_binding::<ProjectRoleTemplateBinding>(&meta.management(), &state.id)
                .await?
                .map(|binding| flatten_project_binding(&binding)),
        )
    }

    async fn update(
        &self,
        meta: &Meta,
        prior: ProjectRoleTemplateBindingState,
        planned: ProjectRoleTemplateBindingState,
        timeouts: &Timeouts,
    ) -> ProviderResult<ProjectRoleTemplateBindingState> {
        update_binding::<ProjectRoleTemplateBinding>(
            meta,
            &meta.management(),
            &prior.id,
            &planned.subject,
            timeouts.update,
        )
        .await?;
        let state = ProjectRoleTemplateBindingState {
            id: prior.id,
            ..planned
        };
        read_back(self, meta, state).await
    }

    async fn delete(
        &self,
        meta: &Meta,
        state: ProjectRoleTemplateBindingState,
        timeouts: &Timeouts,
    ) -> ProviderResult<()> {
        delete_binding::<ProjectRoleTemplateBinding>(
            meta,
            &meta.management(),
            &state.id,
            timeouts.delete,
        )
        .await
    }

    async fn import(
        &self,
        meta: &Meta,
        id: &str,
    ) -> ProviderResult<Vec<ProjectRoleTemplateBindingState>> {
        let state = ProjectRoleTemplateBindingState {
            id: id.to_string(),
            ..Default::default()
        };
        import_by_id(self, meta, state).await
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::resources::test::test_meta;
    use httpmock::prelude::*;
    use maplit::btreemap;

    fn cluster_binding_conf() -> ClusterRoleTemplateBinding {
        ClusterRoleTemplateBinding {
            meta: ObjectMeta {
                id: Some("crtb-abc".to_string()),
                name: Some("foo".to_string()),
                annotations: Some(btreemap! {"node_one".to_string() => "one".to_string()}),
                labels: Some(btreemap! {"option1".to_string() => "value1".to_string()}),
                ..Default::default()
            },
            cluster_id: Some("cluster-test".to_string()),
            role_template_id: Some("role-test".to_string()),
            group_id: Some("group-test".to_string()),
            group_principal_id: Some("group-principal-test".to_string()),
            user_id: Some("user-test".to_string()),
            user_principal_id: Some("user-principal-test".to_string()),
        }
    }

    #[test]
    fn flatten_and_expand_cluster_binding() {
        let state = flatten_cluster_binding(&cluster_binding_conf());
        assert_eq!(state.id, "crtb-abc");
        assert_eq!(state.cluster_id, "cluster-test");
        assert_eq!(state.subject.user_principal_id.as_deref(), Some("user-principal-test"));

        let expected = ClusterRoleTemplateBinding {
            meta: ObjectMeta {
                id: None,
                ..cluster_binding_conf().meta
            },
            ..cluster_binding_conf()
        };
        assert_eq!(expand_cluster_binding(&state), expected);
    }

    #[test]
    fn subject_attributes_are_flattened() {
        let state = flatten_cluster_binding(&cluster_binding_conf());
        let value = state.into_value().unwrap();
        assert_eq!(value["role_template_id"], "role-test");
        assert_eq!(value["cluster_id"], "cluster-test");
        assert!(value.get("subject").is_none());
    }

    #[test]
    fn replace_on_role_change() {
        let prior = flatten_cluster_binding(&cluster_binding_conf());
        let mut planned = prior.clone();
        planned.subject.user_id = Some("other".to_string());
        assert!(!ClusterRoleTemplateBindingResource.requires_replace(&prior, &planned));
        planned.subject.role_template_id = "cluster-owner".to_string();
        assert!(ClusterRoleTemplateBindingResource.requires_replace(&prior, &planned));
    }

    #[tokio::test]
    async fn project_binding_needs_role_template() {
        let server = MockServer::start_async().await;
        let meta = test_meta(&server);
        server
            .mock_async(|when, then| {
                when.method(GET).path("/v3/projects/c-abc:p-123");
                then.status(200).json_body(json!({"id": "c-abc:p-123"}));
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/v3/roletemplates/project-member");
                then.status(404).json_body(json!({"code": "NotFound"}));
            })
            .await;
        let planned = ProjectRoleTemplateBindingState {
            project_id: "c-abc:p-123".to_string(),
            subject: BindingSubject {
                name: "dev".to_string(),
                role_template_id: "project-member".to_string(),
                user_id: Some("u-123".to_string()),
                ..Default::default()
            },
            ..Default::default()
        };
        let err = ProjectRoleTemplateBindingResource
            .create(&meta, planned, &Timeouts::default())
            .await
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Role template 'project-member' does not exist"
        );
    }

    #[tokio::test]
    async fn project_binding_lifecycle() {
        let server = MockServer::start_async().await;
        let meta = test_meta(&server);
        server
            .mock_async(|when, then| {
                when.method(GET).path("/v3/projects/c-abc:p-123");
                then.status(200).json_body(json!({"id": "c-abc:p-123"}));
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/v3/roletemplates/project-member");
                then.status(200).json_body(json!({"id": "project-member"}));
            })
            .await;
        let create = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/v3/projectroletemplatebindings")
                    .json_body_partial(
                        r#"{"projectId": "c-abc:p-123", "roleTemplateId": "project-member"}"#,
                    );
                then.status(201)
                    .json_body(json!({"id": "c-abc:prtb-1", "name": "dev"}));
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/v3/projectroletemplatebindings/c-abc:prtb-1");
                then.status(200).json_body(json!({
                    "id": "c-abc:prtb-1",
                    "name": "dev",
                    "projectId": "c-abc:p-123",
                    "roleTemplateId": "project-member",
                    "userId": "u-123",
                    "userPrincipalId": "local://u-123"
                }));
            })
            .await;

        let planned = ProjectRoleTemplateBindingState {
            project_id: "c-abc:p-123".to_string(),
            subject: BindingSubject {
                name: "dev".to_string(),
                role_template_id: "project-member".to_string(),
                user_id: Some("u-123".to_string()),
                ..Default::default()
            },
            ..Default::default()
        };
        let state = ProjectRoleTemplateBindingResource
            .create(&meta, planned, &Timeouts::default())
            .await
            .unwrap();
        create.assert_async().await;
        assert_eq!(state.id, "c-abc:prtb-1");
        assert_eq!(
            state.subject.user_principal_id.as_deref(),
            Some("local://u-123")
        );
    }
}
