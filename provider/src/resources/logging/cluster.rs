use super::{
    create_logging, delete_logging, expand_targets, flatten_targets, read_logging,
    update_logging, LoggingTargetsState,
};
use crate::error::ProviderResult;
use crate::meta::Meta;
use crate::resource::{Resource, ResourceState, Timeouts};
use crate::resources::{import_by_id, read_back, require};
use model::types::ClusterLogging;
use model::{ApiObject, Configuration, ObjectMeta};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ClusterLoggingState {
    #[serde(default)]
    pub id: String,
    pub cluster_id: String,
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

impl Configuration for ClusterLoggingState {}

impl ResourceState for ClusterLoggingState {
    fn id(&self) -> &str {
        &self.id
    }

    fn validate(&self) -> ProviderResult<()> {
        require("cluster_id", &self.cluster_id)?;
        require("name", &self.name)?;
        self.targets.validate()
    }
}

pub(crate) fn flatten_cluster_logging(
    logging: &ClusterLogging,
    prior: &ClusterLoggingState,
) -> ProviderResult<ClusterLoggingState> {
    Ok(ClusterLoggingState {
        id: logging.id().to_string(),
        cluster_id: logging.cluster_id.clone().unwrap_or_default(),
        name: logging.name().to_string(),
        namespace_id: logging.namespace_id.clone(),
        targets: flatten_targets(&logging.targets, &prior.targets)?,
        annotations: logging.annotations(),
        labels: logging.labels(),
    })
}

pub(crate) fn expand_cluster_logging(
    state: &ClusterLoggingState,
) -> ProviderResult<ClusterLogging> {
    Ok(ClusterLogging {
        meta: ObjectMeta::new(&state.name, state.annotations.clone(), state.labels.clone()),
        cluster_id: Some(state.cluster_id.clone()),
        namespace_id: state.namespace_id.clone(),
        targets: expand_targets(&state.targets)?,
    })
}

pub struct ClusterLoggingResource;

#[async_trait::async_trait]
impl Resource for ClusterLoggingResource {
    type State = ClusterLoggingState;

    const TYPE_NAME: &'static str = "rancher2_cluster_logging";

    fn requires_replace(&self, prior: &ClusterLoggingState, planned: &ClusterLoggingState) -> bool {
        prior.cluster_id != planned.cluster_id
    }

    async fn create(
        &self,
        meta: &Meta,
        planned: ClusterLoggingState,
        timeouts: &Timeouts,
    ) -> ProviderResult<ClusterLoggingState> {
        let logging = expand_cluster_logging(&planned)?;
        let id = create_logging(meta, &meta.management(), &logging, timeouts.create).await?;
        read_back(self, meta, ClusterLoggingState { id, ..planned }).await
    }

    async fn read(
        &self,
        meta: &Meta,
        state: ClusterLoggingState,
    ) -> ProviderResult<Option<ClusterLoggingState>> {
        match read_logging::<ClusterLogging>(&meta.management(), &state.id).await? {
            Some(logging) => Ok(Some(flatten_cluster_logging(&logging, &state)?)),
            None => Ok(None),
        }
    }

    async fn update(
        &self,
        meta: &Meta,
        prior: ClusterLoggingState,
        planned: ClusterLoggingState,
        _timeouts: &Timeouts,
    ) -> ProviderResult<ClusterLoggingState> {
        let logging = expand_cluster_logging(&planned)?;
        update_logging(&meta.management(), &prior.id, &logging).await?;
        read_back(
            self,
            meta,
            ClusterLoggingState {
                id: prior.id,
                ..planned
            },
        )
        .await
    }

    async fn delete(
        &self,
        meta: &Meta,
        state: ClusterLoggingState,
        timeouts: &Timeouts,
    ) -> ProviderResult<()> {
        delete_logging::<ClusterLogging>(meta, &meta.management(), &state.id, timeouts.delete)
            .await
    }

    async fn import(&self, meta: &Meta, id: &str) -> ProviderResult<Vec<ClusterLoggingState>> {
        let state = ClusterLoggingState {
            id: id.to_string(),
            ..Default::default()
        };
        import_by_id(self, meta, state).await
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::resources::logging::{LoggingKind, SplunkConfigState};
    use crate::resources::test::test_meta;
    use httpmock::prelude::*;
    use serde_json::json;

    fn planned() -> ClusterLoggingState {
        ClusterLoggingState {
            cluster_id: "c-abc12".to_string(),
            name: "splunk".to_string(),
            targets: LoggingTargetsState {
                splunk_config: Some(SplunkConfigState {
                    endpoint: Some("https://splunk.example.com:8088".to_string()),
                    token: Some("hec-token".to_string()),
                    ..Default::default()
                }),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    fn from_server() -> serde_json::Value {
        json!({
            "id": "c-abc12:cl-xyz",
            "name": "splunk",
            "state": "active",
            "clusterId": "c-abc12",
            "splunkConfig": {"endpoint": "https://splunk.example.com:8088"},
            "outputFlushInterval": 3,
        })
    }

    #[test]
    fn expand_sends_cluster_and_target() {
        let logging = expand_cluster_logging(&planned()).unwrap();
        assert_eq!(logging.cluster_id.as_deref(), Some("c-abc12"));
        assert_eq!(
            logging.targets.splunk_config.unwrap().token.as_deref(),
            Some("hec-token")
        );
    }

    #[test]
    fn replace_on_cluster_change() {
        let moved = ClusterLoggingState {
            cluster_id: "c-other".to_string(),
            ..planned()
        };
        assert!(ClusterLoggingResource.requires_replace(&planned(), &moved));
        assert!(!ClusterLoggingResource.requires_replace(&planned(), &planned()));
    }

    #[tokio::test]
    async fn create_and_read() {
        let server = MockServer::start_async().await;
        let create = server
            .mock_async(|when, then| {
                when.method(POST).path("/v3/clusterloggings").json_body_partial(
                    json!({"clusterId": "c-abc12", "name": "splunk"}).to_string(),
                );
                then.status(201).json_body(from_server());
            })
            .await;
        let get = server
            .mock_async(|when, then| {
                when.method(GET).path("/v3/clusterloggings/c-abc12:cl-xyz");
                then.status(200).json_body(from_server());
            })
            .await;

        let meta = test_meta(&server);
        let state = ClusterLoggingResource
            .create(&meta, planned(), &Timeouts::default())
            .await
            .unwrap();
        create.assert_async().await;
        assert!(get.hits_async().await >= 2);
        assert_eq!(state.id, "c-abc12:cl-xyz");
        assert_eq!(state.targets.kind, Some(LoggingKind::Splunk));
        let splunk = state.targets.splunk_config.unwrap();
        assert_eq!(splunk.token.as_deref(), Some("hec-token"));
    }

    #[tokio::test]
    async fn read_gone() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/v3/clusterloggings/c-abc12:cl-xyz");
                then.status(404);
            })
            .await;
        let state = ClusterLoggingState {
            id: "c-abc12:cl-xyz".to_string(),
            ..planned()
        };
        let read = ClusterLoggingResource
            .read(&test_meta(&server), state)
            .await
            .unwrap();
        assert!(read.is_none());
    }
}
