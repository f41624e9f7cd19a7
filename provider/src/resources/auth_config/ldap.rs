use super::{keep_secret, AuthConfigBase, AuthProvider};
use crate::error::ProviderResult;
use crate::resource::ResourceState;
use crate::resources::require;
use model::types::LdapConfig;
use model::Configuration;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// OpenLDAP and FreeIPA settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct LdapState {
    #[serde(flatten)]
    pub base: AuthConfigBase,
    pub servers: Vec<String>,
    pub service_account_distinguished_name: String,
    pub service_account_password: String,
    pub user_search_base: String,
    #[serde(default)]
    pub certificate: Option<String>,
    /// Milliseconds.
    #[serde(default = "default_connection_timeout")]
    pub connection_timeout: i64,
    #[serde(default = "default_port")]
    pub port: i64,
    #[serde(default)]
    pub tls: Option<bool>,
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
    pub user_member_attribute: Option<String>,
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

impl Default for LdapState {
    fn default() -> Self {
        Self {
            base: AuthConfigBase::default(),
            servers: Vec::new(),
            service_account_distinguished_name: String::new(),
            service_account_password: String::new(),
            user_search_base: String::new(),
            certificate: None,
            connection_timeout: default_connection_timeout(),
            port: default_port(),
            tls: None,
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
            user_member_attribute: None,
            user_name_attribute: None,
            user_object_class: None,
            user_search_attribute: None,
        }
    }
}

impl Configuration for LdapState {}

impl ResourceState for LdapState {
    fn id(&self) -> &str {
        &self.base.id
    }

    fn validate(&self) -> ProviderResult<()> {
        if self.servers.is_empty() {
            require("servers", "")?;
        }
        require(
            "service_account_distinguished_name",
            &self.service_account_distinguished_name,
        )?;
        require("service_account_password", &self.service_account_password)?;
        require("user_search_base", &self.user_search_base)?;
        self.base.validate()
    }
}

fn expand_ldap(state: &LdapState) -> LdapConfig {
    LdapConfig {
        servers: Some(state.servers.clone()),
        port: Some(state.port),
        tls: state.tls,
        certificate: state.certificate.clone(),
        connection_timeout: Some(state.connection_timeout),
        service_account_distinguished_name: Some(state.service_account_distinguished_name.clone()),
        service_account_password: Some(state.service_account_password.clone()),
        user_search_base: Some(state.user_search_base.clone()),
        user_disabled_bit_mask: state.user_disabled_bit_mask,
        user_enabled_attribute: state.user_enabled_attribute.clone(),
        user_login_attribute: state.user_login_attribute.clone(),
        user_member_attribute: state.user_member_attribute.clone(),
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

fn flatten_ldap(base: AuthConfigBase, config: &LdapConfig, prior: &LdapState) -> LdapState {
    let defaults = LdapState::default();
    LdapState {
        base,
        servers: config.servers.clone().unwrap_or_default(),
        service_account_distinguished_name: config
            .service_account_distinguished_name
            .clone()
            .unwrap_or_default(),
        service_account_password: keep_secret(
            &prior.service_account_password,
            config.service_account_password.as_ref(),
        ),
        user_search_base: config.user_search_base.clone().unwrap_or_default(),
        certificate: config.certificate.clone(),
        connection_timeout: config
            .connection_timeout
            .unwrap_or(defaults.connection_timeout),
        port: config.port.unwrap_or(defaults.port),
        tls: config.tls,
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
        user_member_attribute: config.user_member_attribute.clone(),
        user_name_attribute: config.user_name_attribute.clone(),
        user_object_class: config.user_object_class.clone(),
        user_search_attribute: config.user_search_attribute.clone(),
    }
}

pub struct OpenLdap;

impl AuthProvider for OpenLdap {
    type Spec = LdapConfig;
    type State = LdapState;

    const TYPE_NAME: &'static str = "rancher2_auth_config_openldap";
    const NAME: &'static str = "openldap";
    const CONFIG_TYPE: &'static str = "openLdapConfig";

    fn base(state: &LdapState) -> &AuthConfigBase {
        &state.base
    }

    fn expand_spec(state: &LdapState) -> LdapConfig {
        expand_ldap(state)
    }

    fn flatten(base: AuthConfigBase, spec: &LdapConfig, prior: &LdapState) -> LdapState {
        flatten_ldap(base, spec, prior)
    }
}

pub struct FreeIpa;

impl AuthProvider for FreeIpa {
    type Spec = LdapConfig;
    type State = LdapState;

    const TYPE_NAME: &'static str = "rancher2_auth_config_freeipa";
    const NAME: &'static str = "freeipa";
    const CONFIG_TYPE: &'static str = "freeIpaConfig";

    fn base(state: &LdapState) -> &AuthConfigBase {
        &state.base
    }

    fn expand_spec(state: &LdapState) -> LdapConfig {
        expand_ldap(state)
    }

    fn flatten(base: AuthConfigBase, spec: &LdapConfig, prior: &LdapState) -> LdapState {
        flatten_ldap(base, spec, prior)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::resource::{Resource, Timeouts};
    use crate::resources::auth_config::{
        expand_auth_config, flatten_auth_config, AccessMode, FreeIpaResource,
    };
    use crate::resources::test::test_meta;
    use httpmock::prelude::*;
    use model::types::AuthConfig;
    use serde_json::json;

    fn freeipa_state() -> LdapState {
        LdapState {
            base: AuthConfigBase {
                access_mode: AccessMode::Restricted,
                allowed_principal_ids: vec!["freeipa_user://uid=admin".to_string()],
                ..Default::default()
            },
            servers: vec!["ipa.example.com".to_string()],
            service_account_distinguished_name: "uid=admin,dc=example,dc=com".to_string(),
            service_account_password: "secret".to_string(),
            user_search_base: "dc=example,dc=com".to_string(),
            group_dn_attribute: Some("entryDN".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn expand_sets_name_and_type() {
        let config = expand_auth_config::<FreeIpa>(&freeipa_state()).unwrap();
        assert_eq!(config.meta.id.as_deref(), Some("freeipa"));
        assert_eq!(config.meta.object_type.as_deref(), Some("freeIpaConfig"));
        assert_eq!(config.access_mode.as_deref(), Some("restricted"));
        assert_eq!(config.spec.port, Some(389));
        assert_eq!(config.spec.connection_timeout, Some(5000));
    }

    #[test]
    fn flatten_keeps_password() {
        let mut config = expand_auth_config::<FreeIpa>(&freeipa_state()).unwrap();
        config.spec.service_account_password = None;
        let state = flatten_auth_config::<FreeIpa>(&config, &freeipa_state()).unwrap();
        assert_eq!(state.service_account_password, "secret");
        assert_eq!(state.base.id, "freeipa");
        assert_eq!(state.base.config_type, "freeIpaConfig");
        assert_eq!(state.group_dn_attribute.as_deref(), Some("entryDN"));
    }

    #[test]
    fn restricted_without_principals() {
        let mut state = freeipa_state();
        state.base.allowed_principal_ids.clear();
        let err = expand_auth_config::<OpenLdap>(&state).unwrap_err();
        assert!(err.to_string().contains("allowed_principal_ids is required"));
    }

    #[tokio::test]
    async fn another_provider_enabled() {
        let server = MockServer::start_async().await;
        let meta = test_meta(&server);
        server
            .mock_async(|when, then| {
                when.method(GET).path("/v3/authconfigs/freeipa");
                then.status(200)
                    .json_body(json!({"id": "freeipa", "enabled": false}));
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/v3/authconfigs");
                then.status(200).json_body(json!({"data": [
                    {"id": "local", "enabled": true},
                    {"id": "github", "enabled": true},
                    {"id": "freeipa", "enabled": false}
                ]}));
            })
            .await;
        let err = FreeIpaResource::default()
            .create(&meta, freeipa_state(), &Timeouts::default())
            .await
            .unwrap_err();
        assert!(err
            .to_string()
            .contains("Auth config 'github' is already enabled"));
    }

    #[tokio::test]
    async fn create_updates_and_delete_disables() {
        let server = MockServer::start_async().await;
        let meta = test_meta(&server);
        let stored = json!({
            "id": "freeipa",
            "type": "freeIpaConfig",
            "enabled": true,
            "accessMode": "restricted",
            "allowedPrincipalIds": ["freeipa_user://uid=admin"],
            "servers": ["ipa.example.com"],
            "serviceAccountDistinguishedName": "uid=admin,dc=example,dc=com",
            "userSearchBase": "dc=example,dc=com",
            "port": 636,
            "links": {"self": server.url("/v3/authconfigs/freeipa")},
            "actions": {"disable": server.url("/v3/authconfigs/freeipa?action=disable")}
        });
        server
            .mock_async(|when, then| {
                when.method(GET).path("/v3/authconfigs/freeipa");
                then.status(200).json_body(stored.clone());
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/v3/authconfigs");
                then.status(200)
                    .json_body(json!({"data": [{"id": "local", "enabled": true}]}));
            })
            .await;
        let update = server
            .mock_async(|when, then| {
                when.method(PUT)
                    .path("/v3/authconfigs/freeipa")
                    .json_body_partial(
                        json!({
                            "type": "freeIpaConfig",
                            "enabled": true,
                            "servers": ["ipa.example.com"]
                        })
                        .to_string(),
                    );
                then.status(200).json_body(stored.clone());
            })
            .await;
        let disable = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/v3/authconfigs/freeipa")
                    .query_param("action", "disable");
                then.status(200).body("");
            })
            .await;

        let resource = FreeIpaResource::default();
        let state = resource
            .create(&meta, freeipa_state(), &Timeouts::default())
            .await
            .unwrap();
        update.assert_async().await;
        assert_eq!(state.port, 636);
        assert_eq!(state.service_account_password, "secret");

        resource
            .delete(&meta, state, &Timeouts::default())
            .await
            .unwrap();
        disable.assert_async().await;
    }

    #[test]
    fn wire_type_is_reused() {
        let _: AuthConfig<LdapConfig> = expand_auth_config::<OpenLdap>(&freeipa_state()).unwrap();
    }
}
