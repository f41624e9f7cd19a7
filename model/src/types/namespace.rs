use super::NamespaceResourceQuota;
use crate::{impl_api_object, ObjectMeta};
use serde::{Deserialize, Serialize};

/// A namespace, served by the cluster scoped API (`/v3/clusters/{cluster_id}/namespaces`). The id
/// is the namespace name.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Namespace {
    #[serde(flatten)]
    pub meta: ObjectMeta,
    /// `{cluster_id}:{project_id}`, unset when the namespace is in no project.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource_quota: Option<NamespaceResourceQuota>,
}

impl_api_object!(Namespace, "namespaces");

/// The body of the namespace `move` action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NamespaceMoveInput {
    pub project_id: String,
}
