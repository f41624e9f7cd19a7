use super::{keep_secret, AuthConfigBase, AuthProvider};
use crate::error::ProviderResult;
use crate::resource::ResourceState;
use crate::resources::require;
use model::types::AzureAdConfig;
use model::Configuration;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct AzureAdState {
    #[serde(flatten)]
    pub base: AuthConfigBase,
    pub application_id: String,
    pub application_secret: String,
    pub auth_endpoint: String,
    pub graph_endpoint: String,
    pub rancher_url: String,
    pub tenant_id: String,
    pub token_endpoint: String,
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
}

fn default_endpoint() -> String {
    "https://login.microsoftonline.com/".to_string()
}

impl Default for AzureAdState {
    fn default() -> Self {
        Self {
            base: AuthConfigBase::default(),
            application_id: String::new(),
            application_secret: String::new(),
            auth_endpoint: String::new(),
            graph_endpoint: String::new(),
            rancher_url: String::new(),
            tenant_id: String::new(),
            token_endpoint: String::new(),
            endpoint: default_endpoint(),
        }
    }
}

impl Configuration for AzureAdState {}

impl ResourceState for AzureAdState {
    fn id(&self) -> &str {
        &self.base.id
    }

    fn validate(&self) -> ProviderResult<()> {
        require("application_id", &self.application_id)?;
        require("application_secret", &self.application_secret)?;
        require("auth_endpoint", &self.auth_endpoint)?;
        require("graph_endpoint", &self.graph_endpoint)?;
        require("rancher_url", &self.rancher_url)?;
        require("tenant_id", &self.tenant_id)?;
        require("token_endpoint", &self.token_endpoint)?;
        self.base.validate()
    }
}

pub struct AzureAd;

impl AuthProvider for AzureAd {
    type Spec = AzureAdConfig;
    type State = AzureAdState;

    const TYPE_NAME: &'static str = "rancher2_auth_config_azuread";
    const NAME: &'static str = "azuread";
    const CONFIG_TYPE: &'static str = "azureADConfig";

    fn base(state: &AzureAdState) -> &AuthConfigBase {
        &state.base
    }

    fn expand_spec(state: &AzureAdState) -> AzureAdConfig {
        AzureAdConfig {
            application_id: Some(state.application_id.clone()),
            application_secret: Some(state.application_secret.clone()),
            auth_endpoint: Some(state.auth_endpoint.clone()),
            endpoint: Some(state.endpoint.clone()),
            graph_endpoint: Some(state.graph_endpoint.clone()),
            rancher_url: Some(state.rancher_url.clone()),
            tenant_id: Some(state.tenant_id.clone()),
            token_endpoint: Some(state.token_endpoint.clone()),
        }
    }

    fn flatten(base: AuthConfigBase, config: &AzureAdConfig, prior: &AzureAdState) -> AzureAdState {
        AzureAdState {
            base,
            application_id: config.application_id.clone().unwrap_or_default(),
            application_secret: keep_secret(
                &prior.application_secret,
                config.application_secret.as_ref(),
            ),
            auth_endpoint: config.auth_endpoint.clone().unwrap_or_default(),
            graph_endpoint: config.graph_endpoint.clone().unwrap_or_default(),
            rancher_url: config.rancher_url.clone().unwrap_or_default(),
            tenant_id: config.tenant_id.clone().unwrap_or_default(),
            token_endpoint: config.token_endpoint.clone().unwrap_or_default(),
            endpoint: config.endpoint.clone().unwrap_or_else(default_endpoint),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::resources::auth_config::{expand_auth_config, flatten_auth_config};

    fn state() -> AzureAdState {
        AzureAdState {
            application_id: "app".to_string(),
            application_secret: "secret".to_string(),
            auth_endpoint: "https://login.microsoftonline.com/tenant/oauth2/authorize".to_string(),
            graph_endpoint: "https://graph.windows.net/".to_string(),
            rancher_url: "https://rancher.example.com/verify-auth-azure".to_string(),
            tenant_id: "tenant".to_string(),
            token_endpoint: "https://login.microsoftonline.com/tenant/oauth2/token".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn wire_type_has_acronym() {
        let config = expand_auth_config::<AzureAd>(&state()).unwrap();
        let value = serde_json::to_value(&config).unwrap();
        assert_eq!(value["type"], "azureADConfig");
        assert_eq!(value["endpoint"], "https://login.microsoftonline.com/");
        assert_eq!(value["tenantId"], "tenant");
    }

    #[test]
    fn flatten_keeps_application_secret() {
        let mut config = expand_auth_config::<AzureAd>(&state()).unwrap();
        config.spec.application_secret = None;
        let flattened = flatten_auth_config::<AzureAd>(&config, &state()).unwrap();
        assert_eq!(flattened.application_secret, "secret");
        assert_eq!(flattened.base.id, "azuread");
    }

    #[test]
    fn tenant_is_required() {
        let state = AzureAdState {
            tenant_id: String::new(),
            ..state()
        };
        assert_eq!(
            state.validate().unwrap_err().to_string(),
            "Attribute 'tenant_id' is required"
        );
    }
}
