use crate::{impl_api_object, ObjectMeta};
use serde::{Deserialize, Serialize};

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    #[serde(flatten)]
    pub meta: ObjectMeta,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cluster_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enable_project_monitoring: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource_quota: Option<ProjectResourceQuota>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub namespace_default_resource_quota: Option<NamespaceResourceQuota>,
}

impl_api_object!(Project, "projects");

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectResourceQuota {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<ResourceQuotaLimit>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub used_limit: Option<ResourceQuotaLimit>,
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NamespaceResourceQuota {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<ResourceQuotaLimit>,
}

/// Kubernetes quantities, e.g. `2000m` or `10Gi`.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceQuotaLimit {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config_maps: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limits_cpu: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limits_memory: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub persistent_volume_claims: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pods: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub replication_controllers: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub requests_cpu: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub requests_memory: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub requests_storage: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secrets: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub services: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub services_load_balancers: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub services_node_ports: Option<String>,
}
