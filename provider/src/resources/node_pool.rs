use super::{import_by_id, read_back, require};
use crate::error::{IntoProviderError, ProviderResult};
use crate::meta::Meta;
use crate::resource::{Resource, ResourceState, Timeouts};
use log::info;
use model::clients::{AllowNotFound, CrudClient};
use model::types::NodePool;
use model::{ApiObject, Configuration, ObjectMeta};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct NodePoolState {
    #[serde(default)]
    pub id: String,
    pub cluster_id: String,
    pub name: String,
    pub hostname_prefix: String,
    pub node_template_id: String,
    #[serde(default = "default_quantity")]
    pub quantity: i64,
    #[serde(default)]
    pub control_plane: bool,
    #[serde(default)]
    pub etcd: bool,
    #[serde(default)]
    pub worker: bool,
    /// Zero keeps nodes that are not ready.
    #[serde(default)]
    pub delete_not_ready_after_secs: i64,
    #[serde(default)]
    pub annotations: BTreeMap<String, String>,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
}

fn default_quantity() -> i64 {
    1
}

impl Default for NodePoolState {
    fn default() -> Self {
        Self {
            id: String::new(),
            cluster_id: String::new(),
            name: String::new(),
            hostname_prefix: String::new(),
            node_template_id: String::new(),
            quantity: default_quantity(),
            control_plane: false,
            etcd: false,
            worker: false,
            delete_not_ready_after_secs: 0,
            annotations: BTreeMap::new(),
            labels: BTreeMap::new(),
        }
    }
}

impl Configuration for NodePoolState {}

impl ResourceState for NodePoolState {
    fn id(&self) -> &str {
        &self.id
    }

    fn validate(&self) -> ProviderResult<()> {
        require("cluster_id", &self.cluster_id)?;
        require("name", &self.name)?;
        require("hostname_prefix", &self.hostname_prefix)?;
        require("node_template_id", &self.node_template_id)
    }
}

pub(crate) fn flatten_node_pool(pool: &NodePool) -> NodePoolState {
    NodePoolState {
        id: pool.id().to_string(),
        cluster_id: pool.cluster_id.clone().unwrap_or_default(),
        name: pool.name().to_string(),
        hostname_prefix: pool.hostname_prefix.clone().unwrap_or_default(),
        node_template_id: pool.node_template_id.clone().unwrap_or_default(),
        quantity: pool.quantity.unwrap_or_else(default_quantity),
        control_plane: pool.control_plane.unwrap_or_default(),
        etcd: pool.etcd.unwrap_or_default(),
        worker: pool.worker.unwrap_or_default(),
        delete_not_ready_after_secs: pool.delete_not_ready_after_secs.unwrap_or_default(),
        annotations: pool.annotations(),
        labels: pool.labels(),
    }
}

pub(crate) fn expand_node_pool(state: &NodePoolState) -> NodePool {
    NodePool {
        meta: ObjectMeta::new(&state.name, state.annotations.clone(), state.labels.clone()),
        cluster_id: Some(state.cluster_id.clone()),
        hostname_prefix: Some(state.hostname_prefix.clone()),
        node_template_id: Some(state.node_template_id.clone()),
        quantity: Some(state.quantity),
        control_plane: Some(state.control_plane),
        etcd: Some(state.etcd),
        worker: Some(state.worker),
        delete_not_ready_after_secs: Some(state.delete_not_ready_after_secs),
    }
}

pub struct NodePoolResource;

#[async_trait::async_trait]
impl Resource for NodePoolResource {
    type State = NodePoolState;

    const TYPE_NAME: &'static str = "rancher2_node_pool";

    fn requires_replace(&self, prior: &NodePoolState, planned: &NodePoolState) -> bool {
        prior.cluster_id != planned.cluster_id
    }

    async fn create(
        &self,
        meta: &Meta,
        planned: NodePoolState,
        timeouts: &Timeouts,
    ) -> ProviderResult<NodePoolState> {
        info!(
            "Creating node pool '{}' in cluster '{}'",
            planned.name, planned.cluster_id
        );
        let pools = meta.management::<NodePool>();
        let created = pools
            .create(&expand_node_pool(&planned))
            .await
            .context(format!("Unable to create node pool '{}'", planned.name))?;

        meta.state_change(
            format!("node pool '{}'", created.id()),
            &[],
            &["active"],
            timeouts.create,
        )
        .wait_for_state(|| pools.state_refresh(created.id()))
        .await
        .context(format!(
            "Error waiting for node pool '{}' to be created",
            created.id()
        ))?;

        let state = NodePoolState {
            id: created.id().to_string(),
            ..planned
        };
        read_back(self, meta, state).await
    }

    async fn read(
        &self,
        meta: &Meta,
        state: NodePoolState,
    ) -> ProviderResult<Option<NodePoolState>> {
        let pool = meta
            .management::<NodePool>()
            .by_id(&state.id)
            .await
            .allow_not_found(|_| ())
            .context(format!("Unable to get node pool '{}'", state.id))?;
        match pool {
            Some(pool) if !pool.is_removed() => Ok(Some(flatten_node_pool(&pool))),
            _ => {
                info!("Node pool '{}' not found", state.id);
                Ok(None)
            }
        }
    }

    async fn update(
        &self,
        meta: &Meta,
        prior: NodePoolState,
        planned: NodePoolState,
        _timeouts: &Timeouts,
    ) -> ProviderResult<NodePoolState> {
        let pools = meta.management::<NodePool>();
        let existing = pools
            .by_id(&prior.id)
            .await
            .context(format!("Unable to get node pool '{}'", prior.id))?;

        info!("Updating node pool '{}'", prior.id);
        pools
            .update(&existing, &expand_node_pool(&planned))
            .await
            .context(format!("Unable to update node pool '{}'", prior.id))?;
        let state = NodePoolState {
            id: prior.id.clone(),
            ..planned
        };
        read_back(self, meta, state).await
    }

    async fn delete(
        &self,
        meta: &Meta,
        state: NodePoolState,
        timeouts: &Timeouts,
    ) -> ProviderResult<()> {
        let pools = meta.management::<NodePool>();
        let existing = match pools
            .by_id(&state.id)
            .await
            .allow_not_found(|_| ())
            .context(format!("Unable to get node pool '{}'", state.id))?
        {
            Some(pool) => pool,
            None => return Ok(()),
        };

        info!("Deleting node pool '{}'", state.id);
        pools
            .delete(&existing)
            .await
            .allow_not_found(|_| ())
            .context(format!("Unable to delete node pool '{}'", state.id))?;

        meta.state_change(
            format!("node pool '{}'", state.id),
            &[],
            &["removed"],
            timeouts.delete,
        )
        .wait_for_state(|| pools.state_refresh(&state.id))
        .await
        .context(format!(
            "Error waiting for node pool '{}' to be removed",
            state.id
        ))?;
        Ok(())
    }

    async fn import(&self, meta: &Meta, id: &str) -> ProviderResult<Vec<NodePoolState>> {
        let state = NodePoolState {
            id: id.to_string(),
            ..Default::default()
        };
        import_by_id(self, meta, state).await
    }
}
