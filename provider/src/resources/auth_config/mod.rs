/*!

External authentication providers. The server has exactly one auth config object per provider
(`/v3/authConfigs/{name}`), so "creating" a provider means writing its settings into that object and
"deleting" it means disabling it.

Each provider implements [`AuthProvider`] for its attribute state and wire type, and
[`AuthConfigResource`] drives the shared lifecycle.

!*/

mod activedirectory;
mod azuread;
mod github;
mod ldap;
mod saml;

pub use activedirectory::{ActiveDirectory, ActiveDirectoryState};
pub use azuread::{AzureAd, AzureAdState};
pub use github::{Github, GithubState};
pub use ldap::{FreeIpa, LdapState, OpenLdap};
pub use saml::{Adfs, Ping, SamlState};

use super::read_back;
use crate::error::{IntoProviderError, ProviderError, ProviderResult};
use crate::meta::Meta;
use crate::resource::{Resource, ResourceState, Timeouts};
use log::info;
use model::clients::{AllowNotFound, CrudClient};
use model::types::AuthConfig;
use model::{ApiObject, ObjectMeta};
use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::Debug;
use std::marker::PhantomData;

pub type ActiveDirectoryResource = AuthConfigResource<ActiveDirectory>;
pub type AdfsResource = AuthConfigResource<Adfs>;
pub type AzureAdResource = AuthConfigResource<AzureAd>;
pub type FreeIpaResource = AuthConfigResource<FreeIpa>;
pub type GithubResource = AuthConfigResource<Github>;
pub type OpenLdapResource = AuthConfigResource<OpenLdap>;
pub type PingResource = AuthConfigResource<Ping>;

/// Who may log in through a provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum AccessMode {
    /// Only the allowed principals.
    Required,
    /// The allowed principals and members of clusters and projects.
    Restricted,
    /// Any user of the provider.
    Unrestricted,
}

serde_plain::derive_display_from_serialize!(AccessMode);
serde_plain::derive_fromstr_from_deserialize!(AccessMode);

impl Default for AccessMode {
    fn default() -> Self {
        Self::Unrestricted
    }
}

/// The attributes every auth config resource has.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct AuthConfigBase {
    /// Always the provider name.
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    /// The API type of the config, e.g. `openLdapConfig`.
    #[serde(default, rename = "type")]
    pub config_type: String,
    #[serde(default)]
    pub access_mode: AccessMode,
    #[serde(default)]
    pub allowed_principal_ids: Vec<String>,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub annotations: BTreeMap<String, String>,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
}

fn default_enabled() -> bool {
    true
}

impl Default for AuthConfigBase {
    fn default() -> Self {
        Self {
            id: String::new(),
            name: String::new(),
            config_type: String::new(),
            access_mode: AccessMode::default(),
            allowed_principal_ids: Vec::new(),
            enabled: default_enabled(),
            annotations: BTreeMap::new(),
            labels: BTreeMap::new(),
        }
    }
}

impl AuthConfigBase {
    pub(crate) fn validate(&self) -> ProviderResult<()> {
        match self.access_mode {
            AccessMode::Required | AccessMode::Restricted
                if self.allowed_principal_ids.is_empty() =>
            {
                Err(ProviderError::new_with_context(format!(
                    "allowed_principal_ids is required on access_mode {}",
                    self.access_mode
                )))
            }
            _ => Ok(()),
        }
    }
}

/// A secret the server never returns. The configured value is kept when refreshing.
pub(crate) fn keep_secret(prior: &str, from_server: Option<&String>) -> String {
    if prior.is_empty() {
        from_server.cloned().unwrap_or_default()
    } else {
        prior.to_string()
    }
}

/// One external authentication provider.
#[async_trait::async_trait]
pub trait AuthProvider: Send + Sync + 'static {
    /// The provider specific fields of the wire object.
    type Spec: Serialize + DeserializeOwned + Clone + Debug + Default + Send + Sync + 'static;
    type State: ResourceState;

    const TYPE_NAME: &'static str;
    /// The auth config id, e.g. `openldap`.
    const NAME: &'static str;
    /// The auth config type, e.g. `openLdapConfig`.
    const CONFIG_TYPE: &'static str;

    fn base(state: &Self::State) -> &AuthConfigBase;

    fn expand_spec(state: &Self::State) -> Self::Spec;

    /// Build a state from the shared attributes and the provider fields. Secrets come from `prior`.
    fn flatten(base: AuthConfigBase, spec: &Self::Spec, prior: &Self::State) -> Self::State;

    /// Write `config` to the server.
    async fn apply(
        meta: &Meta,
        existing: &AuthConfig<Self::Spec>,
        config: &AuthConfig<Self::Spec>,
        _state: &Self::State,
    ) -> ProviderResult<()> {
        meta.update_auth_config(existing, config).await?;
        Ok(())
    }
}

pub(crate) fn expand_auth_config<P: AuthProvider>(
    state: &P::State,
) -> ProviderResult<AuthConfig<P::Spec>> {
    let base = P::base(state);
    base.validate()
        .context(format!("Expanding auth config '{}'", P::NAME))?;
    Ok(AuthConfig {
        meta: ObjectMeta {
            id: Some(P::NAME.to_string()),
            name: Some(P::NAME.to_string()),
            object_type: Some(P::CONFIG_TYPE.to_string()),
            annotations: Some(base.annotations.clone()),
            labels: Some(base.labels.clone()),
            ..Default::default()
        },
        enabled: Some(base.enabled),
        access_mode: Some(base.access_mode.to_string()),
        allowed_principal_ids: Some(base.allowed_principal_ids.clone()),
        spec: P::expand_spec(state),
    })
}

pub(crate) fn flatten_auth_config<P: AuthProvider>(
    config: &AuthConfig<P::Spec>,
    prior: &P::State,
) -> ProviderResult<P::State> {
    let access_mode = match config.access_mode.as_deref() {
        None | Some("") => AccessMode::default(),
        Some(mode) => mode
            .parse()
            .context(format!("Auth config '{}' has an unknown access mode", P::NAME))?,
    };
    let base = AuthConfigBase {
        id: P::NAME.to_string(),
        name: P::NAME.to_string(),
        config_type: P::CONFIG_TYPE.to_string(),
        access_mode,
        allowed_principal_ids: config.allowed_principal_ids.clone().unwrap_or_default(),
        enabled: config.is_enabled(),
        annotations: config.annotations(),
        labels: config.labels(),
    };
    Ok(P::flatten(base, &config.spec, prior))
}

/// The resource for the auth provider `P`.
pub struct AuthConfigResource<P> {
    provider: PhantomData<fn() -> P>,
}

impl<P> Default for AuthConfigResource<P> {
    fn default() -> Self {
        Self {
            provider: PhantomData,
        }
    }
}

impl<P: AuthProvider> AuthConfigResource<P> {
    async fn configure(&self, meta: &Meta, planned: P::State) -> ProviderResult<P::State> {
        let existing = meta.get_auth_config::<P::Spec>(P::NAME).await?;
        let config = expand_auth_config::<P>(&planned)?;
        if config.is_enabled() {
            meta.check_auth_config_enabled(P::NAME)
                .await
                .context(format!("Checking to enable auth config '{}'", P::NAME))?;
        }

        info!("Configuring auth config '{}'", P::NAME);
        P::apply(meta, &existing, &config, &planned).await?;
        read_back(self, meta, planned).await
    }
}

#[async_trait::async_trait]
impl<P: AuthProvider> Resource for AuthConfigResource<P> {
    type State = P::State;

    const TYPE_NAME: &'static str = P::TYPE_NAME;

    async fn create(
        &self,
        meta: &Meta,
        planned: P::State,
        _timeouts: &Timeouts,
    ) -> ProviderResult<P::State> {
        self.configure(meta, planned).await
    }

    async fn read(&self, meta: &Meta, state: P::State) -> ProviderResult<Option<P::State>> {
        let config = meta
            .management::<AuthConfig<P::Spec>>()
            .by_id(P::NAME)
            .await
            .allow_not_found(|_| ())
            .context(format!("Unable to get auth config '{}'", P::NAME))?;
        match config {
            Some(config) => Ok(Some(flatten_auth_config::<P>(&config, &state)?)),
            None => {
                info!("Auth config '{}' not found", P::NAME);
                Ok(None)
            }
        }
    }

    async fn update(
        &self,
        meta: &Meta,
        _prior: P::State,
        planned: P::State,
        _timeouts: &Timeouts,
    ) -> ProviderResult<P::State> {
        self.configure(meta, planned).await
    }

    async fn delete(
        &self,
        meta: &Meta,
        _state: P::State,
        _timeouts: &Timeouts,
    ) -> ProviderResult<()> {
        let config = meta
            .management::<AuthConfig<P::Spec>>()
            .by_id(P::NAME)
            .await
            .allow_not_found(|_| ())
            .context(format!("Unable to get auth config '{}'", P::NAME))?;
        match config {
            Some(config) => {
                info!("Disabling auth config '{}'", P::NAME);
                meta.disable_auth_config(&config).await
            }
            None => Ok(()),
        }
    }
}
