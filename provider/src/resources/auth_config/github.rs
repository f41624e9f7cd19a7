use super::{keep_secret, AuthConfigBase, AuthProvider};
use crate::error::{IntoProviderError, ProviderResult};
use crate::meta::Meta;
use crate::resource::ResourceState;
use crate::resources::require;
use model::clients::CrudClient;
use model::types::{AuthConfig, GithubConfig, GithubConfigApplyInput};
use model::Configuration;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct GithubState {
    #[serde(flatten)]
    pub base: AuthConfigBase,
    pub client_id: String,
    pub client_secret: String,
    /// The OAuth code the `testAndApply` action checks the client credentials with.
    pub code: String,
    #[serde(default = "default_hostname")]
    pub hostname: String,
    #[serde(default = "default_tls")]
    pub tls: bool,
}

fn default_hostname() -> String {
    "github.com".to_string()
}

fn default_tls() -> bool {
    true
}

impl Default for GithubState {
    fn default() -> Self {
        Self {
            base: AuthConfigBase::default(),
            client_id: String::new(),
            client_secret: String::new(),
            code: String::new(),
            hostname: default_hostname(),
            tls: default_tls(),
        }
    }
}

impl Configuration for GithubState {}

impl ResourceState for GithubState {
    fn id(&self) -> &str {
        &self.base.id
    }

    fn validate(&self) -> ProviderResult<()> {
        require("client_id", &self.client_id)?;
        require("client_secret", &self.client_secret)?;
        require("code", &self.code)?;
        self.base.validate()
    }
}

pub struct Github;

#[async_trait::async_trait]
impl AuthProvider for Github {
    type Spec = GithubConfig;
    type State = GithubState;

    const TYPE_NAME: &'static str = "rancher2_auth_config_github";
    const NAME: &'static str = "github";
    const CONFIG_TYPE: &'static str = "githubConfig";

    fn base(state: &GithubState) -> &AuthConfigBase {
        &state.base
    }

    fn expand_spec(state: &GithubState) -> GithubConfig {
        GithubConfig {
            hostname: Some(state.hostname.clone()),
            tls: Some(state.tls),
            client_id: Some(state.client_id.clone()),
            client_secret: Some(state.client_secret.clone()),
        }
    }

    fn flatten(base: AuthConfigBase, config: &GithubConfig, prior: &GithubState) -> GithubState {
        GithubState {
            base,
            client_id: config.client_id.clone().unwrap_or_default(),
            client_secret: keep_secret(&prior.client_secret, config.client_secret.as_ref()),
            code: prior.code.clone(),
            hostname: config.hostname.clone().unwrap_or_else(default_hostname),
            tls: config.tls.unwrap_or_else(default_tls),
        }
    }

    /// Github settings are validated by the server through the `testAndApply` action.
    async fn apply(
        meta: &Meta,
        existing: &AuthConfig<GithubConfig>,
        config: &AuthConfig<GithubConfig>,
        state: &GithubState,
    ) -> ProviderResult<()> {
        let input = GithubConfigApplyInput {
            github_config: config.clone(),
            enabled: state.base.enabled,
            code: state.code.clone(),
        };
        let _: serde_json::Value = meta
            .management::<AuthConfig<GithubConfig>>()
            .action(existing, "testAndApply", &input)
            .await
            .context(format!("Applying auth config '{}'", Self::NAME))?;
        Ok(())
    }
}
