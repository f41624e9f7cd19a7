use super::{keep_secret, AuthConfigBase, AuthProvider};
use crate::error::ProviderResult;
use crate::resource::ResourceState;
use crate::resources::require;
use model::types::SamlConfig;
use model::Configuration;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Ping and ADFS settings.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct SamlState {
    #[serde(flatten)]
    pub base: AuthConfigBase,
    pub display_name_field: String,
    pub groups_field: String,
    pub idp_metadata_content: String,
    pub rancher_api_host: String,
    pub sp_cert: String,
    pub sp_key: String,
    pub uid_field: String,
    pub user_name_field: String,
}

impl Configuration for SamlState {}

impl ResourceState for SamlState {
    fn id(&self) -> &str {
        &self.base.id
    }

    fn validate(&self) -> ProviderResult<()> {
        require("display_name_field", &self.display_name_field)?;
        require("groups_field", &self.groups_field)?;
        require("idp_metadata_content", &self.idp_metadata_content)?;
        require("rancher_api_host", &self.rancher_api_host)?;
        require("sp_cert", &self.sp_cert)?;
        require("sp_key", &self.sp_key)?;
        require("uid_field", &self.uid_field)?;
        require("user_name_field", &self.user_name_field)?;
        self.base.validate()
    }
}

fn expand_saml(state: &SamlState) -> SamlConfig {
    SamlConfig {
        display_name_field: Some(state.display_name_field.clone()),
        groups_field: Some(state.groups_field.clone()),
        idp_metadata_content: Some(state.idp_metadata_content.clone()),
        rancher_api_host: Some(state.rancher_api_host.clone()),
        sp_cert: Some(state.sp_cert.clone()),
        sp_key: Some(state.sp_key.clone()),
        uid_field: Some(state.uid_field.clone()),
        user_name_field: Some(state.user_name_field.clone()),
    }
}

fn flatten_saml(base: AuthConfigBase, config: &SamlConfig, prior: &SamlState) -> SamlState {
    SamlState {
        base,
        display_name_field: config.display_name_field.clone().unwrap_or_default(),
        groups_field: config.groups_field.clone().unwrap_or_default(),
        idp_metadata_content: config.idp_metadata_content.clone().unwrap_or_default(),
        rancher_api_host: config.rancher_api_host.clone().unwrap_or_default(),
        sp_cert: config.sp_cert.clone().unwrap_or_default(),
        sp_key: keep_secret(&prior.sp_key, config.sp_key.as_ref()),
        uid_field: config.uid_field.clone().unwrap_or_default(),
        user_name_field: config.user_name_field.clone().unwrap_or_default(),
    }
}

pub struct Ping;

impl AuthProvider for Ping {
    type Spec = SamlConfig;
    type State = SamlState;

    const TYPE_NAME: &'static str = "rancher2_auth_config_ping";
    const NAME: &'static str = "ping";
    const CONFIG_TYPE: &'static str = "pingConfig";

    fn base(state: &SamlState) -> &AuthConfigBase {
        &state.base
    }

    fn expand_spec(state: &SamlState) -> SamlConfig {
        expand_saml(state)
    }

    fn flatten(base: AuthConfigBase, spec: &SamlConfig, prior: &SamlState) -> SamlState {
        flatten_saml(base, spec, prior)
    }
}

pub struct Adfs;

impl AuthProvider for Adfs {
    type Spec = SamlConfig;
    type State = SamlState;

    const TYPE_NAME: &'static str = "rancher2_auth_config_adfs";
    const NAME: &'static str = "adfs";
    const CONFIG_TYPE: &'static str = "adfsConfig";

    fn base(state: &SamlState) -> &AuthConfigBase {
        &state.base
    }

    fn expand_spec(state: &SamlState) -> SamlConfig {
        expand_saml(state)
    }

    fn flatten(base: AuthConfigBase, spec: &SamlConfig, prior: &SamlState) -> SamlState {
        flatten_saml(base, spec, prior)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::resource::{Resource, Timeouts};
    use crate::resources::auth_config::{
        expand_auth_config, flatten_auth_config, AdfsResource, PingResource,
    };
    use crate::resources::test::test_meta;
    use httpmock::prelude::*;
    use serde_json::json;

    fn state() -> SamlState {
        SamlState {
            display_name_field: "displayName".to_string(),
            groups_field: "groups".to_string(),
            idp_metadata_content: "<EntityDescriptor/>".to_string(),
            rancher_api_host: "https://rancher.example.com".to_string(),
            sp_cert: "cert".to_string(),
            sp_key: "key".to_string(),
            uid_field: "uid".to_string(),
            user_name_field: "userName".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn ping_and_adfs_share_fields() {
        let ping = expand_auth_config::<Ping>(&state()).unwrap();
        let adfs = expand_auth_config::<Adfs>(&state()).unwrap();
        assert_eq!(ping.spec, adfs.spec);
        assert_eq!(ping.meta.object_type.as_deref(), Some("pingConfig"));
        assert_eq!(adfs.meta.object_type.as_deref(), Some("adfsConfig"));
    }

    #[test]
    fn sp_key_is_kept() {
        let mut config = expand_auth_config::<Ping>(&state()).unwrap();
        config.spec.sp_key = None;
        let flattened = flatten_auth_config::<Ping>(&config, &state()).unwrap();
        assert_eq!(flattened.sp_key, "key");
        assert_eq!(flattened.idp_metadata_content, "<EntityDescriptor/>");
    }

    #[tokio::test]
    async fn delete_disables_disabled_config() {
        let server = MockServer::start_async().await;
        let meta = test_meta(&server);
        server
            .mock_async(|when, then| {
                when.method(GET).path("/v3/authconfigs/adfs");
                then.status(200).json_body(json!({
                    "id": "adfs",
                    "type": "adfsConfig",
                    "enabled": false,
                    "actions": {"disable": server.url("/v3/authconfigs/adfs?action=disable")}
                }));
            })
            .await;
        let disable = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/v3/authconfigs/adfs")
                    .query_param("action", "disable");
                then.status(200).body("");
            })
            .await;
        AdfsResource::default()
            .delete(&meta, state(), &Timeouts::default())
            .await
            .unwrap();
        disable.assert_async().await;
    }

    #[tokio::test]
    async fn read_missing_config() {
        let server = MockServer::start_async().await;
        let meta = test_meta(&server);
        server
            .mock_async(|when, then| {
                when.method(GET).path("/v3/authconfigs/ping");
                then.status(404)
                    .json_body(json!({"code": "NotFound", "message": "not found"}));
            })
            .await;
        let state = PingResource::default().read(&meta, state()).await.unwrap();
        assert!(state.is_none());
    }
}
