use super::{import_by_id, read_back, require};
use crate::error::{IntoProviderError, ProviderError, ProviderResult};
use crate::meta::Meta;
use crate::resource::{Resource, ResourceState, Timeouts};
use log::{debug, info};
use model::clients::{AllowNotFound, CrudClient};
use model::types::{BackupConfig, EtcdBackup, S3BackupConfig};
use model::{ApiObject, Configuration, ObjectMeta};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::BTreeMap;

/// Etcd backup settings, shared by etcd backups and the etcd service of RKE clusters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct EtcdBackupConfigState {
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default = "default_interval_hours")]
    pub interval_hours: i64,
    #[serde(default = "default_retention")]
    pub retention: i64,
    #[serde(default)]
    pub s3_backup_config: Option<S3BackupConfigState>,
}

fn default_enabled() -> bool {
    true
}

fn default_interval_hours() -> i64 {
    12
}

fn default_retention() -> i64 {
    6
}

impl Default for EtcdBackupConfigState {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            interval_hours: default_interval_hours(),
            retention: default_retention(),
            s3_backup_config: None,
        }
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct S3BackupConfigState {
    #[serde(default)]
    pub access_key: Option<String>,
    pub bucket_name: String,
    #[serde(default)]
    pub custom_ca: Option<String>,
    pub endpoint: String,
    #[serde(default)]
    pub folder: Option<String>,
    #[serde(default)]
    pub region: Option<String>,
    /// Write only. The server never returns it, so the configured value is kept.
    #[serde(default)]
    pub secret_key: Option<String>,
}

impl EtcdBackupConfigState {
    pub(crate) fn validate(&self) -> ProviderResult<()> {
        if let Some(s3) = &self.s3_backup_config {
            require("s3_backup_config.bucket_name", &s3.bucket_name)?;
            require("s3_backup_config.endpoint", &s3.endpoint)?;
        }
        Ok(())
    }

    fn secret_key(&self) -> Option<&str> {
        self.s3_backup_config
            .as_ref()
            .and_then(|s3| s3.secret_key.as_deref())
    }
}

/// `prior_secret` is the secret key of the state being refreshed, if any.
pub(crate) fn flatten_backup_config(
    config: &BackupConfig,
    prior_secret: Option<&str>,
) -> EtcdBackupConfigState {
    let defaults = EtcdBackupConfigState::default();
    EtcdBackupConfigState {
        enabled: config.enabled.unwrap_or(defaults.enabled),
        interval_hours: config.interval_hours.unwrap_or(defaults.interval_hours),
        retention: config.retention.unwrap_or(defaults.retention),
        s3_backup_config: config.s3_backup_config.as_ref().map(|s3| S3BackupConfigState {
            access_key: s3.access_key.clone(),
            bucket_name: s3.bucket_name.clone().unwrap_or_default(),
            custom_ca: s3.custom_ca.clone(),
            endpoint: s3.endpoint.clone().unwrap_or_default(),
            folder: s3.folder.clone(),
            region: s3.region.clone(),
            secret_key: match prior_secret {
                Some(secret) if !secret.is_empty() => Some(secret.to_string()),
                _ => s3.secret_key.clone(),
            },
        }),
    }
}

pub(crate) fn expand_backup_config(state: &EtcdBackupConfigState) -> BackupConfig {
    BackupConfig {
        enabled: Some(state.enabled),
        interval_hours: Some(state.interval_hours),
        retention: Some(state.retention),
        s3_backup_config: state.s3_backup_config.as_ref().map(|s3| S3BackupConfig {
            access_key: s3.access_key.clone(),
            bucket_name: Some(s3.bucket_name.clone()),
            custom_ca: s3.custom_ca.clone(),
            endpoint: Some(s3.endpoint.clone()),
            folder: s3.folder.clone(),
            region: s3.region.clone(),
            secret_key: s3.secret_key.clone(),
        }),
    }
}

/// A one-off etcd snapshot of a cluster.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct EtcdBackupState {
    #[serde(default)]
    pub id: String,
    pub cluster_id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub backup_config: Option<EtcdBackupConfigState>,
    #[serde(default)]
    pub filename: Option<String>,
    #[serde(default)]
    pub manual: bool,
    #[serde(default)]
    pub namespace_id: Option<String>,
    #[serde(default)]
    pub annotations: BTreeMap<String, String>,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
}

impl Configuration for EtcdBackupState {}

impl ResourceState for EtcdBackupState {
    fn id(&self) -> &str {
        &self.id
    }

    fn validate(&self) -> ProviderResult<()> {
        require("cluster_id", &self.cluster_id)?;
        match &self.backup_config {
            Some(config) => config.validate(),
            None => Ok(()),
        }
    }
}

pub(crate) fn flatten_etcd_backup(
    backup: &EtcdBackup,
    prior: Option<&EtcdBackupState>,
) -> EtcdBackupState {
    let prior_secret = prior
        .and_then(|prior| prior.backup_config.as_ref())
        .and_then(EtcdBackupConfigState::secret_key);
    EtcdBackupState {
        id: backup.id().to_string(),
        cluster_id: backup.cluster_id.clone().unwrap_or_default(),
        name: backup.meta.name.clone(),
        backup_config: backup
            .backup_config
            .as_ref()
            .map(|config| flatten_backup_config(config, prior_secret)),
        filename: backup.filename.clone(),
        manual: backup.manual.unwrap_or_default(),
        namespace_id: backup.namespace_id.clone(),
        annotations: backup.annotations(),
        labels: backup.labels(),
    }
}

pub(crate) fn expand_etcd_backup(state: &EtcdBackupState) -> EtcdBackup {
    EtcdBackup {
        meta: ObjectMeta {
            name: state.name.clone().filter(|name| !name.is_empty()),
            annotations: Some(state.annotations.clone()),
            labels: Some(state.labels.clone()),
            ..Default::default()
        },
        backup_config: state.backup_config.as_ref().map(expand_backup_config),
        cluster_id: Some(state.cluster_id.clone()),
        filename: state.filename.clone().filter(|filename| !filename.is_empty()),
        manual: Some(state.manual),
        namespace_id: state.namespace_id.clone().filter(|ns| !ns.is_empty()),
    }
}

pub struct EtcdBackupResource;

#[async_trait::async_trait]
impl Resource for EtcdBackupResource {
    type State = EtcdBackupState;

    const TYPE_NAME: &'static str = "rancher2_etcd_backup";

    fn requires_replace(&self, prior: &EtcdBackupState, planned: &EtcdBackupState) -> bool {
        prior.cluster_id != planned.cluster_id
    }

    async fn create(
        &self,
        meta: &Meta,
        planned: EtcdBackupState,
        timeouts: &Timeouts,
    ) -> ProviderResult<EtcdBackupState> {
        info!("Creating etcd backup of cluster '{}'", planned.cluster_id);
        if !meta.is_cluster_active(&planned.cluster_id).await? {
            return Err(ProviderError::new_with_context(format!(
                "Cluster ID {} is not active",
                planned.cluster_id
            )));
        }

        let backups = meta.management::<EtcdBackup>();
        let created = backups
            .create(&expand_etcd_backup(&planned))
            .await
            .context(format!(
                "Unable to create etcd backup of cluster '{}'",
                planned.cluster_id
            ))?;

        meta.state_change(
            format!("etcd backup '{}'", created.id()),
            &[],
            &["active"],
            timeouts.create,
        )
        .wait_for_state(|| backups.state_refresh(created.id()))
        .await
        .context(format!(
            "Error waiting for etcd backup '{}' to be created",
            created.id()
        ))?;

        let state = EtcdBackupState {
            id: created.id().to_string(),
            ..planned
        };
        read_back(self, meta, state).await
    }

    async fn read(
        &self,
        meta: &Meta,
        state: EtcdBackupState,
    ) -> ProviderResult<Option<EtcdBackupState>> {
        let backup = meta
            .management::<EtcdBackup>()
            .by_id(&state.id)
            .await
            .allow_not_found(|_| ())
            .context(format!("Unable to get etcd backup '{}'", state.id))?;
        match backup {
            Some(backup) => Ok(Some(flatten_etcd_backup(&backup, Some(&state)))),
            None => {
                info!("Etcd backup '{}' not found", state.id);
                Ok(None)
            }
        }
    }

    async fn update(
        &self,
        meta: &Meta,
        prior: EtcdBackupState,
        planned: EtcdBackupState,
        timeouts: &Timeouts,
    ) -> ProviderResult<EtcdBackupState> {
        let backups = meta.management::<EtcdBackup>();
        let existing = backups
            .by_id(&prior.id)
            .await
            .context(format!("Unable to get etcd backup '{}'", prior.id))?;

        info!("Updating etcd backup '{}'", prior.id);
        let update = json!({
            "backupConfig": planned.backup_config.as_ref().map(expand_backup_config),
            "filename": planned.filename.clone().unwrap_or_default(),
            "manual": planned.manual,
            "annotations": planned.annotations,
            "labels": planned.labels,
        });
        backups
            .update(&existing, &update)
            .await
            .context(format!("Unable to update etcd backup '{}'", prior.id))?;

        meta.state_change(
            format!("etcd backup '{}'", prior.id),
            &["active"],
            &["active"],
            timeouts.update,
        )
        .wait_for_state(|| backups.state_refresh(&prior.id))
        .await
        .context(format!(
            "Error waiting for etcd backup '{}' to be updated",
            prior.id
        ))?;

        let state = EtcdBackupState {
            id: prior.id.clone(),
            ..planned
        };
        read_back(self, meta, state).await
    }

    async fn delete(
        &self,
        meta: &Meta,
        state: EtcdBackupState,
        timeouts: &Timeouts,
    ) -> ProviderResult<()> {
        let backups = meta.management::<EtcdBackup>();
        let existing = match backups
            .by_id(&state.id)
            .await
            .allow_not_found(|_| ())
            .context(format!("Unable to get etcd backup '{}'", state.id))?
        {
            Some(backup) => backup,
            None => return Ok(()),
        };

        info!("Deleting etcd backup '{}'", state.id);
        backups
            .delete(&existing)
            .await
            .allow_not_found(|_| ())
            .context(format!("Unable to delete etcd backup '{}'", state.id))?;

        debug!("Waiting for etcd backup '{}' to be removed", state.id);
        meta.state_change(
            format!("etcd backup '{}'", state.id),
            &[],
            &["removed"],
            timeouts.delete,
        )
        .wait_for_state(|| backups.state_refresh(&state.id))
        .await
        .context(format!(
            "Error waiting for etcd backup '{}' to be removed",
            state.id
        ))?;
        Ok(())
    }

    async fn import(&self, meta: &Meta, id: &str) -> ProviderResult<Vec<EtcdBackupState>> {
        let state = EtcdBackupState {
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

    fn s3_conf() -> S3BackupConfig {
        S3BackupConfig {
            access_key: Some("access_key".to_string()),
            bucket_name: Some("bucket_name".to_string()),
            endpoint: Some("endpoint".to_string()),
            region: Some("region".to_string()),
            secret_key: Some("secret".to_string()),
            ..Default::default()
        }
    }

    fn etcd_backup_conf() -> EtcdBackup {
        EtcdBackup {
            meta: ObjectMeta {
                name: Some("test".to_string()),
                annotations: Some(BTreeMap::new()),
                labels: Some(BTreeMap::new()),
                ..Default::default()
            },
            backup_config: Some(BackupConfig {
                enabled: Some(true),
                interval_hours: Some(20),
                retention: Some(10),
                s3_backup_config: Some(s3_conf()),
            }),
            cluster_id: Some("cluster-test".to_string()),
            filename: Some("filename".to_string()),
            manual: Some(true),
            namespace_id: Some("namespace_id".to_string()),
        }
    }

    #[test]
    fn flatten() {
        let state = flatten_etcd_backup(&etcd_backup_conf(), None);
        assert_eq!(state.cluster_id, "cluster-test");
        assert_eq!(state.name.as_deref(), Some("test"));
        assert!(state.manual);
        let config = state.backup_config.unwrap();
        assert_eq!(config.interval_hours, 20);
        assert_eq!(config.retention, 10);
        let s3 = config.s3_backup_config.unwrap();
        assert_eq!(s3.bucket_name, "bucket_name");
        assert_eq!(s3.secret_key.as_deref(), Some("secret"));
    }

    #[test]
    fn expand() {
        let state = flatten_etcd_backup(&etcd_backup_conf(), None);
        assert_eq!(expand_etcd_backup(&state), etcd_backup_conf());
    }

    #[test]
    fn flatten_keeps_prior_secret() {
        let prior = flatten_etcd_backup(&etcd_backup_conf(), None);
        let mut from_server = etcd_backup_conf();
        if let Some(s3) = from_server
            .backup_config
            .as_mut()
            .and_then(|config| config.s3_backup_config.as_mut())
        {
            s3.secret_key = None;
        }
        let state = flatten_etcd_backup(&from_server, Some(&prior));
        let s3 = state.backup_config.unwrap().s3_backup_config.unwrap();
        assert_eq!(s3.secret_key.as_deref(), Some("secret"));
    }

    #[test]
    fn backup_config_defaults() {
        let config: EtcdBackupConfigState = serde_json::from_value(json!({})).unwrap();
        assert!(config.enabled);
        assert_eq!(config.interval_hours, 12);
        assert_eq!(config.retention, 6);
    }

    #[tokio::test]
    async fn create_accepts_any_pending_state() {
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
                when.method(POST).path("/v3/etcdbackups");
                then.status(201)
                    .json_body(json!({"id": "c-abc:eb-1", "state": "activating"}));
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/v3/etcdbackups/c-abc:eb-1");
                then.status(200).json_body(json!({
                    "id": "c-abc:eb-1",
                    "name": "c-abc-eb-1",
                    "state": "active",
                    "clusterId": "c-abc",
                    "filename": "snapshot.zip",
                    "manual": true
                }));
            })
            .await;
        let planned = EtcdBackupState {
            cluster_id: "c-abc".to_string(),
            manual: true,
            ..Default::default()
        };
        let state = EtcdBackupResource
            .create(&meta, planned, &Timeouts::default())
            .await
            .unwrap();
        assert_eq!(state.id, "c-abc:eb-1");
        assert_eq!(state.filename.as_deref(), Some("snapshot.zip"));
    }
}
