use super::{
    create_logging, delete_logging, expand_targets, flatten_targets, read_logging,
    update_logging, LoggingTargetsState,
};
use crate::error::ProviderResult;
use crate::meta::Meta;
use crate::resource::{Resource, ResourceState, Timeouts};
use crate::resources::{cluster_id_from_project_id, import_by_id, read_back, require};
use model::types::ProjectLogging;
use model::{ApiObject, Configuration, ObjectMeta};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ProjectLoggingState {
    #[serde(default)]
    pub id: String,
    /// `{cluster_id}:{project}`.
    pub project_id: String,
    pub name: String,
    #[serde(default)]
    pub namespace_id: Option<String>,
    #[serde(flatten)]
    pub targets: LoggingTargetsState,
    #[serde(default)]
    pub annotations: BTreeMap<String, String>,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
}

impl Configuration for ProjectLoggingState {}

impl ResourceState for ProjectLoggingState {
    fn id(&self) -> &str {
        &self.id
    }

    fn validate(&self) -> ProviderResult<()> {
        cluster_id_from_project_id(&self.project_id)?;
        require("name", &self.name)?;
        self.targets.validate()
    }
}

pub(crate) fn flatten_project_logging(
    logging: &ProjectLogging,
    prior: &ProjectLoggingState,
) -> ProviderResult<ProjectLoggingState> {
    Ok(ProjectLoggingState {
        id: logging.id().to_string(),
        project_id: logging.project_id.clone().unwrap_or_default(),
        name: logging.name().to_string(),
        namespace_id: logging.namespace_id.clone(),
        targets: flatten_targets(&logging.targets, &prior.targets)?,
        annotations: logging.annotations(),
        labels: logging.labels(),
    })
}

pub(crate) fn expand_project_logging(
    state: &ProjectLoggingState,
) -> ProviderResult<ProjectLogging> {
    Ok(ProjectLogging {
        meta: ObjectMeta::new(&state.name, state.annotations.clone(), state.labels.clone()),
        project_id: Some(state.project_id.clone()),
        namespace_id: state.namespace_id.clone(),
        targets: expand_targets(&state.targets)?,
    })
}

pub struct ProjectLoggingResource;

#[async_trait::async_trait]
impl Resource for ProjectLoggingResource {
    type State = ProjectLoggingState;

    const TYPE_NAME: &'static str = "rancher2_project_logging";

    fn requires_replace(&self, prior: &ProjectLoggingState, planned: &ProjectLoggingState) -> bool {
        prior.project_id != planned.project_id
    }

    async fn create(
        &self,
        meta: &Meta,
        planned: ProjectLoggingState,
        timeouts: &Timeouts,
    ) -> ProviderResult<ProjectLoggingState> {
        let logging = expand_project_logging(&planned)?;
        let id = create_logging(meta, &meta.management(), &logging, timeouts.create).await?;
        read_back(self, meta, ProjectLoggingState { id, ..planned }).await
    }

    async fn read(
        &self,
        meta: &Meta,
        state: ProjectLoggingState,
    ) -> ProviderResult<Option<ProjectLoggingState>> {
        match read_logging::<ProjectLogging>(&meta.management(), &state.id).await? {
            Some(logging) => Ok(Some(flatten_project_logging(&logging, &state)?)),
            None => Ok(None),
        }
    }

    async fn update(
        &self,
        meta: &Meta,
        prior: ProjectLoggingState,
        planned: ProjectLoggingState,
        _timeouts: &Timeouts,
    ) -> ProviderResult<ProjectLoggingState> {
        let logging = expand_project_logging(&planned)?;
        update_logging(&meta.management(), &prior.id, &logging).await?;
        read_back(
            self,
            meta,
            ProjectLoggingState {
                id: prior.id,
                ..planned
            },
        )
        .await
    }

    async fn delete(
        &self,
        meta: &Meta,
        state: ProjectLoggingState,
        timeouts: &Timeouts,
    ) -> ProviderResult<()> {
        delete_logging::<ProjectLogging>(meta, &meta.management(), &state.id, timeouts.delete)
            .await
    }

    async fn import(&self, meta: &Meta, id: &str) -> ProviderResult<Vec<ProjectLoggingState>> {
        let state = ProjectLoggingState {
            id: id.to_string(),
            ..Default::default()
        };
        import_by_id(self, meta, state).await
    }
}
