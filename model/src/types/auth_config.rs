use crate::{ApiObject, ObjectMeta};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt::Debug;

/// An authentication provider configuration. Every provider shares the access control fields; the
/// provider specific fields are flattened in from `T`.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthConfig<T> {
    #[serde(flatten)]
    pub meta: ObjectMeta,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    /// `required`, `restricted` or `unrestricted`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub access_mode: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allowed_principal_ids: Option<Vec<String>>,
    #[serde(flatten)]
    pub spec: T,
}

/// An auth config of any provider, used where only the shared fields matter.
pub type AnyAuthConfig = AuthConfig<Map<String, Value>>;

impl<T> ApiObject for AuthConfig<T>
where
    T: Serialize + DeserializeOwned + Clone + Debug + Send + Sync + 'static,
{
    const COLLECTION: &'static str = "authconfigs";

    fn meta(&self) -> &ObjectMeta {
        &self.meta
    }
}

impl<T> AuthConfig<T> {
    pub fn is_enabled(&self) -> bool {
        self.enabled.unwrap_or_default()
    }
}

/// OpenLDAP and FreeIPA.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LdapConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub servers: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tls: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub certificate: Option<String>,
    /// Milliseconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub connection_timeout: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service_account_distinguished_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service_account_password: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_search_base: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_disabled_bit_mask: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_enabled_attribute: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_login_attribute: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_member_attribute: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_name_attribute: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_object_class: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_search_attribute: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group_search_base: Option<String>,
    #[serde(rename = "groupDNAttribute", skip_serializing_if = "Option::is_none")]
    pub group_dn_attribute: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group_member_mapping_attribute: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group_member_user_attribute: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group_name_attribute: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group_object_class: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group_search_attribute: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nested_group_membership_enabled: Option<bool>,
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActiveDirectoryConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub servers: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tls: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub certificate: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub connection_timeout: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_login_domain: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service_account_username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service_account_password: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_search_base: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_disabled_bit_mask: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_enabled_attribute: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_login_attribute: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_name_attribute: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_object_class: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_search_attribute: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group_search_base: Option<String>,
    #[serde(rename = "groupDNAttribute", skip_serializing_if = "Option::is_none")]
    pub group_dn_attribute: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group_member_mapping_attribute: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group_member_user_attribute: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group_name_attribute: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group_object_class: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group_search_attribute: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nested_group_membership_enabled: Option<bool>,
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GithubConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hostname: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tls: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_secret: Option<String>,
}

/// The body of the github `testAndApply` action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GithubConfigApplyInput {
    pub github_config: AuthConfig<GithubConfig>,
    pub enabled: bool,
    pub code: String,
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AzureAdConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub application_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub application_secret: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auth_endpoint: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub graph_endpoint: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rancher_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tenant_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_endpoint: Option<String>,
}

/// Ping and ADFS.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SamlConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name_field: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub groups_field: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub idp_metadata_content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rancher_api_host: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sp_cert: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sp_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uid_field: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_name_field: Option<String>,
}

#[cfg(test)]
mod test {
    use super::*;
    use serde_json::json;

    #[test]
    fn ldap_acronym_fields() {
        let config: AuthConfig<LdapConfig> = serde_json::from_value(json!({
            "id": "openldap",
            "type": "openLdapConfig",
            "enabled": true,
            "accessMode": "restricted",
            "groupDNAttribute": "entryDN",
            "servers": ["ldap.example.com"],
            "port": 389,
            "annotations": null
        }))
        .unwrap();
        assert!(config.is_enabled());
        assert_eq!(config.spec.group_dn_attribute.as_deref(), Some("entryDN"));
        assert_eq!(config.meta.object_type.as_deref(), Some("openLdapConfig"));

        let value = serde_json::to_value(&config).unwrap();
        assert_eq!(value["groupDNAttribute"], "entryDN");
        assert_eq!(value["port"], 389);
        assert!(value.get("tls").is_none());
    }

    #[test]
    fn any_auth_config_keeps_provider_fields() {
        let config: AnyAuthConfig = serde_json::from_value(json!({
            "id": "github",
            "enabled": false,
            "hostname": "github.com",
        }))
        .unwrap();
        assert!(!config.is_enabled());
        assert_eq!(config.id(), "github");
        assert_eq!(config.spec.get("hostname").unwrap(), "github.com");
    }
}
