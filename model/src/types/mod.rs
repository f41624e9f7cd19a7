/*!

Wire representations of the v3 management API objects. Field names follow the API's JSON, which is
camelCase with a few irregular acronyms that are renamed explicitly.

Fields are `Option`s because the API omits or nulls whatever is unset; `None` is never sent back.

!*/

mod auth_config;
mod catalog;
mod cloud_credential;
mod cluster;
mod etcd_backup;
mod logging;
mod management;
mod namespace;
mod node;
mod project;
mod rbac;

pub use auth_config::{
    ActiveDirectoryConfig, AnyAuthConfig, AuthConfig, AzureAdConfig, GithubConfig,
    GithubConfigApplyInput, LdapConfig, SamlConfig,
};
pub use catalog::Catalog;
pub use cloud_credential::{
    Amazonec2CredentialConfig, AzureCredentialConfig, CloudCredential,
    DigitaloceanCredentialConfig, OpenstackCredentialConfig, VsphereCredentialConfig,
};
pub use cluster::{
    BastionHost, Cluster, ClusterRegistrationToken, DnsConfig, EtcdService, NetworkConfig,
    RancherKubernetesEngineConfig, RkeServices,
};
pub use etcd_backup::{BackupConfig, EtcdBackup, S3BackupConfig};
pub use logging::{
    ClusterLogging, ElasticsearchConfig, FluentForwarderConfig, FluentServer, KafkaConfig,
    LoggingTargets, ProjectLogging, SplunkConfig, SyslogConfig,
};
pub use management::{LoginInput, RoleTemplate, SetPasswordInput, Setting, Token, User};
pub use namespace::{Namespace, NamespaceMoveInput};
pub use node::{
    Amazonec2Config, AzureConfig, DigitaloceanConfig, NodePool, NodeTemplate, OpenstackConfig,
    VsphereConfig,
};
pub use project::{NamespaceResourceQuota, Project, ProjectResourceQuota, ResourceQuotaLimit};
pub use rbac::{ClusterRoleTemplateBinding, ProjectRoleTemplateBinding};
