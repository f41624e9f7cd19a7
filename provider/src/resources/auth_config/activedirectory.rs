use super::{keep_secret, AuthConfigBase, AuthProvider};
use crate::error::ProviderResult;
use crate::resource::ResourceState;
use crate::resources::require;
use model::types::ActiveDirectoryConfig;
use model::Configuration;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ActiveDirectoryState {
    #[serde(flatten)]
    pub base: AuthConfigBase,
    pub servers: Vec<String>,
    pub service_account_username: String,
    pub service_account_password: String,
    pub user_search_base: String,
    #[serde(default)]
    pub certificate: Option<String>,
    /// Milliseconds.
    #[serde(default = "default_connection_timeout")]
    pub connection_timeout: i64,
    #[serde(default)]
    pub default_login_domain: Option<String>,
    #[serde(default = "default_port")]
    pub port: i64,
    #[serde(default)]
    pub tls: bool,
    #[serde(default)]
    pub group_dn_attribute: Option<String>,
    #[serde(default)]
    pub group_member_mapping_attribute: Option<String>,
    #[serde(default)]
    pub group_member_user_attribute: Option<String>,
    #[serde(default)]
    pub group_name_attribute: Option<String>,
    #[serde(default)]
    pub group_object_class: Option<String>,
    #[serde(default)]
    pub group_search_attribute: Option<String>,
    #[serde(default)]
    pub group_search_base: Option<String>,
    #[serde(default)]
    pub nested_group_membership_enabled: Option<bool>,
    #[serde(default)]
    pub user_disabled_bit_mask: Option<i64>,
    #[serde(default)]
    pub user_enabled_attribute: Option<String>,
    #[serde(default)]
    pub user_login_attribute: Option<String>,
    #[serde(default)]
    pub user_name_attribute: Option<String>,
    #[serde(default)]
    pub user_object_class: Option<String>,
    #[serde(default)]
    pub user_search_attribute: Option<String>,
}

fn default_connection_timeout() -> i64 {
    5000
}

fn default_port() -> i64 {
    389
}

impl Default for ActiveDirectoryState {
    fn default() -> Self {
        Self {
            base: AuthConfigBase::default(),
            servers: Vec::new(),
            service_account_username: String::new(),
            service_account_password: String::new(),
            user_search_base: String::new(),
            certificate: None,
            connection_timeout: default_connection_timeout(),
            default_login_domain: None,
            port: default_port(),
            tls: false,
            group_dn_attribute: None,
            group_member_mapping_attribute: None,
            group_member_user_attribute: None,
            group_name_attribute: None,
            group_object_class: None,
            group_search_attribute: None,
            group_search_base: None,
            nested_group_membership_enabled: None,
            user_disabled_bit_mask: None,
            user_enabled_attribute: None,
            user_login_attribute: None,
            user_name_attribute: None,
            user_object_class: None,
            user_search_attribute: None,
        }
    }
}

impl Configuration for ActiveDirectoryState {}

impl ResourceState for ActiveDirectoryState {
    fn id(&self) -> &str {
        &self.base.id
    }

    fn validate(&self) -> ProviderResult<()> {
        if self.servers.is_empty() {
            require("servers", "")?;
        }
        require("service_account_username", &self.service_account_username)?;
        require("service_account_password", &self.service_account_password)?;
        require("user_search_base", &self.user_search_base)?;
        self.base.validate()
    }
}

pub struct ActiveDirectory;

impl AuthProvider for ActiveDirectory {
    type Spec = ActiveDirectoryConfig;
    type State = ActiveDirectoryState;

    const TYPE_NAME: &'static str = "rancher2_auth_config_activedirectory";
    const NAME: &'static str = "activedirectory";
    const CONFIG_TYPE: &'static str = "activeDirectoryConfig";

    fn base(state: &ActiveDirectoryState) -> &AuthConfigBase {
        &state.base
    }

    fn expand_spec(state: &ActiveDirectoryState) -> ActiveDirectoryConfig {
        ActiveDirectoryConfig {
            servers: Some(state.servers.clone()),
            port: Some(state.port),
            tls: Some(state.tls),
            certificate: state.certificate.clone(),
            connection_timeout: Some(state.connection_timeout),
            default_login_domain: state.default_login_domain.clone(),
            service_account_username: Some(state.service_account_username.clone()),
            service_account_password: Some(state.service_account_password.clone()),
            user_search_base: Some(state.user_search_base.clone()),
            user_disabled_bit_mask: state.user_disabled_bit_mask,
            user_enabled_attribute: state.user_enabled_attribute.clone(),
            user_login_attribute: state.user_login_attribute.clone(),
            user_name_attribute: state.user_name_attribute.clone(),
            user_object_class: state.user_object_class.clone(),
            user_search_attribute: state.user_search_attribute.clone(),
            group_search_base: state.group_search_base.clone(),
            group_dn_attribute: state.group_dn_attribute.clone(),
            group_member_mapping_attribute: state.group_member_mapping_attribute.clone(),
            group_member_user_attribute: state.group_member_user_attribute.clone(),
            group_name_attribute: state.group_name_attribute.clone(),
            group_object_class: state.group_object_class.clone(),
            group_search_attribute: state.group_search_attribute.clone(),
            nested_group_membership_enabled: state.nested_group_membership_enabled,
        }
    }

    fn flatten(
        base: AuthConfigBase,
        config: &ActiveDirectoryConfig,
        prior: &ActiveDirectoryState,
    ) -> ActiveDirectoryState {
        ActiveDirectoryState {
            base,
            servers: config.servers.clone().unwrap_or_default(),
            service_account_username: config.service_account_username.clone().unwrap_or_default(),
            service_account_password: keep_secret(
                &prior.service_account_password,
                config.service_account_password.as_ref(),
            ),
            user_search_base: config.user_search_base.clone().unwrap_or_default(),
            certificate: config.certificate.clone(),
            connection_timeout: config
                .connection_timeout
                .unwrap_or_else(default_connection_timeout),
            default_login_domain: config.default_login_domain.clone(),
            port: config.port.unwrap_or_else(default_port),
            tls: config.tls.unwrap_or_default(),
            group_dn_attribute: config.group_dn_attribute.clone(),
            group_member_mapping_attribute: config.group_member_mapping_attribute.clone(),
            group_member_user_attribute: config.group_member_user_attribute.clone(),
            group_name_attribute: config.group_name_attribute.clone(),
            group_object_class: config.group_object_class.clone(),
            group_search_attribute: config.group_search_attribute.clone(),
            group_search_base: config.group_search_base.clone(),
            nested_group_membership_enabled: config.nested_group_membership_enabled,
            user_disabled_bit_mask: config.user_disabled_bit_mask,
            user_enabled_attribute: config.user_enabled_attribute.clone(),
            user_login_attribute: config.user_login_attribute.clone(),
            user_name_attribute: config.user_name_attribute.clone(),
            user_object_class: config.user_object_class.clone(),
            user_search_attribute: config.user_search_attribute.clone(),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::resources::auth_config::{expand_auth_config, flatten_auth_config};

    #[test]
    fn expand_and_flatten() {
        let state = ActiveDirectoryState {
            servers: vec!["ad1.example.com".to_string(), "ad2.example.com".to_string()],
            service_account_username: "svc".to_string(),
            service_account_password: "secret".to_string(),
            user_search_base: "dc=example,dc=com".to_string(),
            default_login_domain: Some("EXAMPLE".to_string()),
            tls: true,
            port: 636,
            ..Default::default()
        };
        let mut config = expand_auth_config::<ActiveDirectory>(&state).unwrap();
        assert_eq!(config.meta.id.as_deref(), Some("activedirectory"));
        assert_eq!(
            config.meta.object_type.as_deref(),
            Some("activeDirectoryConfig")
        );
        assert_eq!(config.spec.port, Some(636));
        assert_eq!(config.spec.tls, Some(true));

        config.spec.service_account_password = None;
        let flattened = flatten_auth_config::<ActiveDirectory>(&config, &state).unwrap();
        assert_eq!(flattened.servers, state.servers);
        assert_eq!(flattened.service_account_password, "secret");
        assert_eq!(flattened.default_login_domain.as_deref(), Some("EXAMPLE"));
        assert_eq!(flattened.base.config_type, "activeDirectoryConfig");
    }

    #[test]
    fn servers_are_required() {
        let state = ActiveDirectoryState {
            service_account_username: "svc".to_string(),
            service_account_password: "secret".to_string(),
            user_search_base: "dc=example,dc=com".to_string(),
            ..Default::default()
        };
        assert_eq!(
            state.validate().unwrap_err().to_string(),
            "Attribute 'servers' is required"
        );
    }
}
