/*!

Cluster and project logging. Both send logs to one target; the target blocks and the lifecycle are
shared, only the owning scope differs.

!*/

mod cluster;
mod project;

pub use cluster::{ClusterLoggingResource, ClusterLoggingState};
pub use project::{ProjectLoggingResource, ProjectLoggingState};

use crate::error::{IntoProviderError, ProviderError, ProviderResult};
use crate::meta::Meta;
use log::info;
use model::clients::{AllowNotFound, Collection, CrudClient};
use model::types::{
    ElasticsearchConfig, FluentForwarderConfig, FluentServer, KafkaConfig, LoggingTargets,
    SplunkConfig, SyslogConfig,
};
use model::ApiObject;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

/// Where logs are sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum LoggingKind {
    Elasticsearch,
    Fluentd,
    Kafka,
    Splunk,
    Syslog,
}

serde_plain::derive_display_from_serialize!(LoggingKind);

mirrored_block! {
    pub struct ElasticsearchConfigState => ElasticsearchConfig {
        auth_password: String,
        auth_username: String,
        certificate: String,
        client_cert: String,
        client_key: String,
        client_key_pass: String,
        date_format: String,
        endpoint: String,
        index_prefix: String,
        ssl_verify: bool,
        ssl_version: String,
    }
    secrets [auth_password, client_key_pass]
}

mirrored_block! {
    pub struct FluentServerState => FluentServer {
        endpoint: String,
        hostname: String,
        password: String,
        shared_key: String,
        standby: bool,
        username: String,
        weight: i64,
    }
    secrets [password, shared_key]
}

mirrored_block! {
    pub struct KafkaConfigState => KafkaConfig {
        broker_endpoints: Vec<String>,
        certificate: String,
        client_cert: String,
        client_key: String,
        topic: String,
        zookeeper_endpoint: String,
    }
    secrets []
}

mirrored_block! {
    pub struct SplunkConfigState => SplunkConfig {
        certificate: String,
        client_cert: String,
        client_key: String,
        client_key_pass: String,
        endpoint: String,
        index: String,
        source: String,
        ssl_verify: bool,
        token: String,
    }
    secrets [client_key_pass, token]
}

mirrored_block! {
    pub struct SyslogConfigState => SyslogConfig {
        certificate: String,
        client_cert: String,
        client_key: String,
        enable_tls: bool,
        endpoint: String,
        program: String,
        protocol: String,
        severity: String,
        ssl_verify: bool,
        token: String,
    }
    secrets [token]
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct FluentdConfigState {
    pub fluent_servers: Vec<FluentServerState>,
    #[serde(default)]
    pub certificate: Option<String>,
    #[serde(default = "default_compress")]
    pub compress: bool,
    #[serde(default)]
    pub enable_tls: bool,
}

fn default_compress() -> bool {
    true
}

impl Default for FluentdConfigState {
    fn default() -> Self {
        Self {
            fluent_servers: Vec::new(),
            certificate: None,
            compress: default_compress(),
            enable_tls: false,
        }
    }
}

/// The target attributes shared by cluster and project logging.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct LoggingTargetsState {
    /// Inferred from the configured block when unset.
    #[serde(default)]
    pub kind: Option<LoggingKind>,
    #[serde(default)]
    pub elasticsearch_config: Option<ElasticsearchConfigState>,
    #[serde(default)]
    pub fluentd_config: Option<FluentdConfigState>,
    #[serde(default)]
    pub kafka_config: Option<KafkaConfigState>,
    #[serde(default)]
    pub splunk_config: Option<SplunkConfigState>,
    #[serde(default)]
    pub syslog_config: Option<SyslogConfigState>,
    /// Seconds.
    #[serde(default = "default_output_flush_interval")]
    pub output_flush_interval: i64,
    #[serde(default)]
    pub output_tags: BTreeMap<String, String>,
}

fn default_output_flush_interval() -> i64 {
    3
}

impl Default for LoggingTargetsState {
    fn default() -> Self {
        Self {
            kind: None,
            elasticsearch_config: None,
            fluentd_config: None,
            kafka_config: None,
            splunk_config: None,
            syslog_config: None,
            output_flush_interval: default_output_flush_interval(),
            output_tags: BTreeMap::new(),
        }
    }
}

impl LoggingTargetsState {
    fn configured_kinds(&self) -> Vec<LoggingKind> {
        [
            (self.elasticsearch_config.is_some(), LoggingKind::Elasticsearch),
            (self.fluentd_config.is_some(), LoggingKind::Fluentd),
            (self.kafka_config.is_some(), LoggingKind::Kafka),
            (self.splunk_config.is_some(), LoggingKind::Splunk),
            (self.syslog_config.is_some(), LoggingKind::Syslog),
        ]
        .iter()
        .filter(|(set, _)| *set)
        .map(|(_, kind)| *kind)
        .collect()
    }

    /// The configured kind, or the kind of the only configured block.
    pub(crate) fn effective_kind(&self) -> ProviderResult<LoggingKind> {
        if let Some(kind) = self.kind {
            return Ok(kind);
        }
        match self.configured_kinds().as_slice() {
            [kind] => Ok(*kind),
            _ => Err(ProviderError::new_with_context(
                "Logging kind is not set and can not be inferred from the configured blocks",
            )),
        }
    }

    pub(crate) fn validate(&self) -> ProviderResult<()> {
        let kind = self.effective_kind()?;
        let present = match kind {
            LoggingKind::Elasticsearch => self.elasticsearch_config.is_some(),
            LoggingKind::Fluentd => self.fluentd_config.is_some(),
            LoggingKind::Kafka => self.kafka_config.is_some(),
            LoggingKind::Splunk => self.splunk_config.is_some(),
            LoggingKind::Syslog => self.syslog_config.is_some(),
        };
        if !present {
            return Err(ProviderError::new_with_context(format!(
                "Logging kind {} requires {}_config",
                kind, kind
            )));
        }
        if let Some(kafka) = &self.kafka_config {
            let brokers = kafka
                .broker_endpoints
                .as_ref()
                .map(|endpoints| !endpoints.is_empty())
                .unwrap_or_default();
            if brokers == kafka.zookeeper_endpoint.is_some() {
                return Err(ProviderError::new_with_context(
                    "Exactly one of kafka_config.broker_endpoints or \
                     kafka_config.zookeeper_endpoint is required",
                ));
            }
        }
        Ok(())
    }
}

fn flatten_fluentd(
    config: &FluentForwarderConfig,
    prior: Option<&FluentdConfigState>,
) -> FluentdConfigState {
    let prior_servers = prior.map(|prior| prior.fluent_servers.as_slice()).unwrap_or_default();
    FluentdConfigState {
        fluent_servers: config
            .fluent_servers
            .iter()
            .flatten()
            .enumerate()
            .map(|(index, server)| {
                FluentServerState::from(server).keep_secrets(prior_servers.get(index))
            })
            .collect(),
        certificate: config.certificate.clone(),
        compress: config.compress.unwrap_or_else(default_compress),
        enable_tls: config.enable_tls.unwrap_or_default(),
    }
}

fn expand_fluentd(state: &FluentdConfigState) -> FluentForwarderConfig {
    FluentForwarderConfig {
        certificate: state.certificate.clone(),
        compress: Some(state.compress),
        enable_tls: Some(state.enable_tls),
        fluent_servers: Some(state.fluent_servers.iter().map(FluentServer::from).collect()),
    }
}

/// Fails if no target is set on the server and `prior` has no kind to fall back on.
pub(crate) fn flatten_targets(
    targets: &LoggingTargets,
    prior: &LoggingTargetsState,
) -> ProviderResult<LoggingTargetsState> {
    let mut state = LoggingTargetsState {
        kind: prior.kind,
        elasticsearch_config: targets.elasticsearch_config.as_ref().map(|config| {
            ElasticsearchConfigState::from(config)
                .keep_secrets(prior.elasticsearch_config.as_ref())
        }),
        fluentd_config: targets
            .fluent_forwarder_config
            .as_ref()
            .map(|config| flatten_fluentd(config, prior.fluentd_config.as_ref())),
        kafka_config: targets
            .kafka_config
            .as_ref()
            .map(|config| KafkaConfigState::from(config).keep_secrets(prior.kafka_config.as_ref())),
        splunk_config: targets.splunk_config.as_ref().map(|config| {
            SplunkConfigState::from(config).keep_secrets(prior.splunk_config.as_ref())
        }),
        syslog_config: targets.syslog_config.as_ref().map(|config| {
            SyslogConfigState::from(config).keep_secrets(prior.syslog_config.as_ref())
        }),
        output_flush_interval: targets
            .output_flush_interval
            .unwrap_or_else(default_output_flush_interval),
        output_tags: targets.output_tags.clone().unwrap_or_default(),
    };
    state.kind = Some(state.effective_kind()?);
    Ok(state)
}

/// Only the block matching the kind is sent.
pub(crate) fn expand_targets(state: &LoggingTargetsState) -> ProviderResult<LoggingTargets> {
    let mut targets = LoggingTargets {
        output_flush_interval: Some(state.output_flush_interval),
        output_tags: Some(state.output_tags.clone()),
        ..Default::default()
    };
    let missing = |kind: LoggingKind| {
        ProviderError::new_with_context(format!("Logging kind {} requires {}_config", kind, kind))
    };
    match state.effective_kind()? {
        LoggingKind::Elasticsearch => {
            let config = state.elasticsearch_config.as_ref();
            targets.elasticsearch_config =
                Some(config.ok_or_else(|| missing(LoggingKind::Elasticsearch))?.into());
        }
        LoggingKind::Fluentd => {
            let config = state.fluentd_config.as_ref();
            targets.fluent_forwarder_config = Some(expand_fluentd(
                config.ok_or_else(|| missing(LoggingKind::Fluentd))?,
            ));
        }
        LoggingKind::Kafka => {
            let config = state.kafka_config.as_ref();
            targets.kafka_config = Some(config.ok_or_else(|| missing(LoggingKind::Kafka))?.into());
        }
        LoggingKind::Splunk => {
            let config = state.splunk_config.as_ref();
            targets.splunk_config =
                Some(config.ok_or_else(|| missing(LoggingKind::Splunk))?.into());
        }
        LoggingKind::Syslog => {
            let config = state.syslog_config.as_ref();
            targets.syslog_config =
                Some(config.ok_or_else(|| missing(LoggingKind::Syslog))?.into());
        }
    }
    Ok(targets)
}

async fn create_logging<T: ApiObject>(
    meta: &Meta,
    loggings: &Collection<T>,
    logging: &T,
    timeout: Duration,
) -> ProviderResult<String> {
    info!("Creating {} '{}'", T::COLLECTION, logging.name());
    let created = loggings
        .create(logging)
        .await
        .context(format!("Unable to create {} '{}'", T::COLLECTION, logging.name()))?;

    meta.state_change(
        format!("{} '{}'", T::COLLECTION, created.id()),
        &[],
        &["active"],
        timeout,
    )
    .wait_for_state(|| loggings.state_refresh(created.id()))
    .await
    .context(format!(
        "Error waiting for {} '{}' to be created",
        T::COLLECTION,
        created.id()
    ))?;
    Ok(created.id().to_string())
}

async fn read_logging<T: ApiObject>(
    loggings: &Collection<T>,
    id: &str,
) -> ProviderResult<Option<T>> {
    let logging = loggings
        .by_id(id)
        .await
        .allow_not_found(|_| ())
        .context(format!("Unable to get {} '{}'", T::COLLECTION, id))?;
    match logging {
        Some(logging) if !logging.is_removed() => Ok(Some(logging)),
        _ => {
            info!("{} '{}' not found", T::COLLECTION, id);
            Ok(None)
        }
    }
}

async fn update_logging<T: ApiObject>(
    loggings: &Collection<T>,
    id: &str,
    logging: &T,
) -> ProviderResult<()> {
    let existing = loggings
        .by_id(id)
        .await
        .context(format!("Unable to get {} '{}'", T::COLLECTION, id))?;
    info!("Updating {} '{}'", T::COLLECTION, id);
    loggings
        .update(&existing, logging)
        .await
        .context(format!("Unable to update {} '{}'", T::COLLECTION, id))?;
    Ok(())
}

async fn delete_logging<T: ApiObject>(
    meta: &Meta,
    loggings: &Collection<T>,
    id: &str,
    timeout: Duration,
) -> ProviderResult<()> {
    let existing = match read_logging(loggings, id).await? {
        Some(logging) => logging,
        None => return Ok(()),
    };
    info!("Deleting {} '{}'", T::COLLECTION, id);
    loggings
        .delete(&existing)
        .await
        .allow_not_found(|_| ())
        .context(format!("Unable to delete {} '{}'", T::COLLECTION, id))?;

    meta.state_change(
        format!("{} '{}'", T::COLLECTION, id),
        &[],
        &["removed"],
        timeout,
    )
    .wait_for_state(|| loggings.state_refresh(id))
    .await
    .context(format!(
        "Error waiting for {} '{}' to be removed",
        T::COLLECTION,
        id
    ))?;
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;

    fn syslog() -> LoggingTargetsState {
        LoggingTargetsState {
            syslog_config: Some(SyslogConfigState {
                endpoint: Some("syslog.example.com:514".to_string()),
                protocol: Some("udp".to_string()),
                severity: Some("notice".to_string()),
                token: Some("s3cr3t".to_string()),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    #[test]
    fn kind_is_inferred() {
        let targets = expand_targets(&syslog()).unwrap();
        assert!(targets.syslog_config.is_some());
        assert_eq!(targets.output_flush_interval, Some(3));

        let state = flatten_targets(&targets, &LoggingTargetsState::default()).unwrap();
        assert_eq!(state.kind, Some(LoggingKind::Syslog));
        assert_eq!(
            state.syslog_config.unwrap().endpoint.as_deref(),
            Some("syslog.example.com:514")
        );
    }

    #[test]
    fn flatten_without_target() {
        let err = flatten_targets(&LoggingTargets::default(), &LoggingTargetsState::default())
            .unwrap_err();
        assert!(err.to_string().contains("can not be inferred"));
    }

    #[test]
    fn kind_needs_its_block() {
        let state = LoggingTargetsState {
            kind: Some(LoggingKind::Kafka),
            ..syslog()
        };
        assert_eq!(
            state.validate().unwrap_err().to_string(),
            "Logging kind kafka requires kafka_config"
        );
        assert!(expand_targets(&state).is_err());
    }

    #[test]
    fn only_matching_block_is_sent() {
        let state = LoggingTargetsState {
            kind: Some(LoggingKind::Syslog),
            splunk_config: Some(SplunkConfigState::default()),
            ..syslog()
        };
        let targets = expand_targets(&state).unwrap();
        assert!(targets.splunk_config.is_none());
        assert!(targets.syslog_config.is_some());
    }

    #[test]
    fn kafka_endpoints() {
        let state = LoggingTargetsState {
            kafka_config: Some(KafkaConfigState {
                topic: Some("logs".to_string()),
                ..Default::default()
            }),
            ..Default::default()
        };
        assert!(state.validate().is_err());

        let state = LoggingTargetsState {
            kafka_config: Some(KafkaConfigState {
                broker_endpoints: Some(vec!["kafka:9092".to_string()]),
                topic: Some("logs".to_string()),
                ..Default::default()
            }),
            ..Default::default()
        };
        assert!(state.validate().is_ok());
    }

    #[test]
    fn fluentd_servers_keep_secrets() {
        let state = LoggingTargetsState {
            fluentd_config: Some(FluentdConfigState {
                fluent_servers: vec![FluentServerState {
                    endpoint: Some("fluentd:24224".to_string()),
                    shared_key: Some("key".to_string()),
                    weight: Some(100),
                    ..Default::default()
                }],
                ..Default::default()
            }),
            ..Default::default()
        };
        let mut targets = expand_targets(&state).unwrap();
        let config = targets.fluent_forwarder_config.as_mut().unwrap();
        assert_eq!(config.compress, Some(true));
        config.fluent_servers.as_mut().unwrap()[0].shared_key = None;

        let flattened = flatten_targets(&targets, &state).unwrap();
        let server = &flattened.fluentd_config.unwrap().fluent_servers[0];
        assert_eq!(server.shared_key.as_deref(), Some("key"));
        assert_eq!(server.weight, Some(100));
    }

    #[test]
    fn kind_names() {
        let kind: LoggingKind = serde_json::from_str(r#""fluentd""#).unwrap();
        assert_eq!(kind, LoggingKind::Fluentd);
        assert_eq!(LoggingKind::Elasticsearch.to_string(), "elasticsearch");
        assert!(serde_json::from_str::<LoggingKind>(r#""graylog""#).is_err());
    }
}
