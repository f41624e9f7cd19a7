use model::types::{NamespaceResourceQuota, ProjectResourceQuota, ResourceQuotaLimit};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Resource quota limits. Every value is a Kubernetes quantity string.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct QuotaLimit {
    pub config_maps: Option<String>,
    pub limits_cpu: Option<String>,
    pub limits_memory: Option<String>,
    pub persistent_volume_claims: Option<String>,
    pub pods: Option<String>,
    pub replication_controllers: Option<String>,
    pub requests_cpu: Option<String>,
    pub requests_memory: Option<String>,
    pub requests_storage: Option<String>,
    pub secrets: Option<String>,
    pub services: Option<String>,
    pub services_load_balancers: Option<String>,
    pub services_node_ports: Option<String>,
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct NamespaceQuota {
    pub limit: QuotaLimit,
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ProjectQuota {
    pub project_limit: QuotaLimit,
    pub namespace_default_limit: QuotaLimit,
}

pub(crate) fn flatten_limit(limit: &ResourceQuotaLimit) -> QuotaLimit {
    QuotaLimit {
        config_maps: limit.config_maps.clone(),
        limits_cpu: limit.limits_cpu.clone(),
        limits_memory: limit.limits_memory.clone(),
        persistent_volume_claims: limit.persistent_volume_claims.clone(),
        pods: limit.pods.clone(),
        replication_controllers: limit.replication_controllers.clone(),
        requests_cpu: limit.requests_cpu.clone(),
        requests_memory: limit.requests_memory.clone(),
        requests_storage: limit.requests_storage.clone(),
        secrets: limit.secrets.clone(),
        services: limit.services.clone(),
        services_load_balancers: limit.services_load_balancers.clone(),
        services_node_ports: limit.services_node_ports.clone(),
    }
}

pub(crate) fn expand_limit(limit: &QuotaLimit) -> ResourceQuotaLimit {
    ResourceQuotaLimit {
        config_maps: limit.config_maps.clone(),
        limits_cpu: limit.limits_cpu.clone(),
        limits_memory: limit.limits_memory.clone(),
        persistent_volume_claims: limit.persistent_volume_claims.clone(),
        pods: limit.pods.clone(),
        replication_controllers: limit.replication_controllers.clone(),
        requests_cpu: limit.requests_cpu.clone(),
        requests_memory: limit.requests_memory.clone(),
        requests_storage: limit.requests_storage.clone(),
        secrets: limit.secrets.clone(),
        services: limit.services.clone(),
        services_load_balancers: limit.services_load_balancers.clone(),
        services_node_ports: limit.services_node_ports.clone(),
    }
}

pub(crate) fn flatten_namespace_quota(quota: &NamespaceResourceQuota) -> Option<NamespaceQuota> {
    quota.limit.as_ref().map(|limit| NamespaceQuota {
        limit: flatten_limit(limit),
    })
}

pub(crate) fn expand_namespace_quota(quota: &NamespaceQuota) -> NamespaceResourceQuota {
    NamespaceResourceQuota {
        limit: Some(expand_limit(&quota.limit)),
    }
}

/// Flatten the two halves a project carries its quota in.
pub(crate) fn flatten_project_quota(
    project: Option<&ProjectResourceQuota>,
    namespace_default: Option<&NamespaceResourceQuota>,
) -> Option<ProjectQuota> {
    let project_limit = project.and_then(|quota| quota.limit.as_ref())?;
    let namespace_default_limit = namespace_default.and_then(|quota| quota.limit.as_ref())?;
    Some(ProjectQuota {
        project_limit: flatten_limit(project_limit),
        namespace_default_limit: flatten_limit(namespace_default_limit),
    })
}

pub(crate) fn expand_project_quota(
    quota: &ProjectQuota,
) -> (ProjectResourceQuota, NamespaceResourceQuota) {
    (
        ProjectResourceQuota {
            limit: Some(expand_limit(&quota.project_limit)),
            used_limit: None,
        },
        NamespaceResourceQuota {
            limit: Some(expand_limit(&quota.namespace_default_limit)),
        },
    )
}
