/*!

The admin bootstrap of a fresh server. The resource logs in as the local `admin` user, points the
server at its own URL, sets the telemetry choice, creates a long lived admin token that the
provider switches to, and sets the admin password. Only available when the provider runs in
bootstrap mode.

!*/

use crate::error::{IntoProviderError, ProviderError, ProviderResult};
use crate::meta::Meta;
use crate::resource::{Resource, ResourceState, Timeouts};
use log::{debug, info};
use model::clients::{AllowNotFound, CrudClient};
use model::types::Token;
use model::{ApiObject, Configuration};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

const DEFAULT_USER: &str = "admin";
const DEFAULT_PASSWORD: &str = "admin";
const SESSION_DESCRIPTION: &str = "rancher2 bootstrap admin session";
const TOKEN_DESCRIPTION: &str = "rancher2 bootstrap admin token";
/// Milliseconds.
const SESSION_TTL: u64 = 60_000;
const SETTING_URL: &str = "server-url";
const SETTING_TELEMETRY: &str = "telemetry-opt";

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct BootstrapState {
    /// The admin user id.
    #[serde(default)]
    pub id: String,
    /// The admin password to set. A random one is generated when empty.
    #[serde(default)]
    pub password: Option<String>,
    /// The password the last login used. Computed.
    #[serde(default)]
    pub current_password: Option<String>,
    #[serde(default)]
    pub telemetry: bool,
    /// Lifetime of the admin token in seconds, `0` never expires.
    #[serde(default)]
    pub token_ttl: u64,
    /// Set to rotate the admin token. Refreshed to whether the token is expired.
    #[serde(default)]
    pub token_update: bool,
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub token_id: Option<String>,
    #[serde(default)]
    pub temp_token: Option<String>,
    #[serde(default)]
    pub temp_token_id: Option<String>,
    /// The server url. Computed.
    #[serde(default)]
    pub url: Option<String>,
    /// Always `admin`. Computed.
    #[serde(default)]
    pub user: Option<String>,
}

impl Configuration for BootstrapState {}

impl ResourceState for BootstrapState {
    fn id(&self) -> &str {
        &self.id
    }
}

fn opt(value: &Option<String>) -> &str {
    value.as_deref().unwrap_or_default()
}

fn ensure_bootstrap_mode(meta: &Meta) -> ProviderResult<()> {
    if !meta.is_bootstrap() {
        return Err(ProviderError::new_with_context(
            "Resource rancher2_bootstrap just available on bootstrap mode",
        ));
    }
    Ok(())
}

/// Authenticate the client with the admin token, the temporary token or finally a password login.
/// A password login replaces the temporary token in `state`.
async fn login(meta: &Meta, state: &mut BootstrapState) -> ProviderResult<()> {
    if meta.update_token(opt(&state.token)).await.is_ok() {
        info!("Connecting with token");
        return Ok(());
    }
    if meta.update_token(opt(&state.temp_token)).await.is_ok() {
        info!("Connecting with temp token");
        return Ok(());
    }

    let password = match opt(&state.current_password) {
        "" => DEFAULT_PASSWORD,
        password => password,
    };
    let session = meta
        .do_user_login(DEFAULT_USER, password, SESSION_TTL, SESSION_DESCRIPTION)
        .await?;
    let key = session.token.clone().unwrap_or_default();
    meta.update_token(&key)
        .await
        .context("Connecting with user/pass")?;
    info!("Connecting with user/pass");

    meta.delete_token(opt(&state.temp_token_id))
        .await
        .context("Deleting temp token")?;
    state.temp_token_id = Some(session.id().to_string());
    state.temp_token = Some(key);
    Ok(())
}

async fn apply_settings(meta: &Meta, state: &BootstrapState) -> ProviderResult<()> {
    let api_url = meta.api_url();
    let url = api_url.trim_end_matches("/v3");
    meta.set_setting(SETTING_URL, url).await?;
    let telemetry = if state.telemetry { "in" } else { "out" };
    meta.set_setting(SETTING_TELEMETRY, telemetry).await
}

/// Create an admin token, switch the client to it and store it in `state`.
async fn new_admin_token(meta: &Meta, state: &mut BootstrapState) -> ProviderResult<()> {
    let token = meta
        .generate_user_token(TOKEN_DESCRIPTION, state.token_ttl)
        .await
        .context("Creating Admin token")?;
    let key = token.token.clone().unwrap_or_default();
    meta.update_token(&key)
        .await
        .context("Updating Admin token")?;
    state.token_id = Some(token.id().to_string());
    state.token = Some(key);
    Ok(())
}

/// Forget the temporary token, deleting it unless the client is using it.
async fn clean_up_temp_token(meta: &Meta, state: &mut BootstrapState) -> ProviderResult<()> {
    let token_id = opt(&state.temp_token_id).to_string();
    if !token_id.is_empty() {
        let tokens = meta.management::<Token>();
        let token = tokens
            .by_id(&token_id)
            .await
            .allow_not_found(|_| ())
            .context(format!("Unable to get temp token '{}'", token_id))?;
        if let Some(token) = token {
            if token.current.unwrap_or_default() {
                return Ok(());
            }
            debug!("Deleting temp token '{}'", token_id);
            tokens
                .delete(&token)
                .await
                .allow_not_found(|_| ())
                .context(format!("Deleting temp token ID {}", token_id))?;
        }
    }
    state.temp_token_id = None;
    state.temp_token = None;
    Ok(())
}

pub struct BootstrapResource;

#[async_trait::async_trait]
impl Resource for BootstrapResource {
    type State = BootstrapState;

    const TYPE_NAME: &'static str = "rancher2_bootstrap";

    async fn create(
        &self,
        meta: &Meta,
        planned: BootstrapState,
        _timeouts: &Timeouts,
    ) -> ProviderResult<BootstrapState> {
        ensure_bootstrap_mode(meta)?;
        let mut state = planned;
        login(meta, &mut state).await?;
        state.user = Some(DEFAULT_USER.to_string());
        apply_settings(meta, &state).await?;
        new_admin_token(meta, &mut state).await?;

        let (_, password, admin) = meta
            .set_user_password_by_name(DEFAULT_USER, opt(&state.password))
            .await
            .context("Updating Admin password")?;
        state.password = Some(password.clone());
        state.current_password = Some(password);
        state.id = admin.id().to_string();

        self.read(meta, state)
            .await?
            .context("Bootstrap disappeared after it was written")
    }

    async fn read(
        &self,
        meta: &Meta,
        state: BootstrapState,
    ) -> ProviderResult<Option<BootstrapState>> {
        info!("Refreshing bootstrap");
        ensure_bootstrap_mode(meta)?;
        let mut state = state;
        login(meta, &mut state).await?;

        state.token_update = meta.is_token_expired(opt(&state.token_id)).await?;
        state.url = Some(meta.get_setting_value(SETTING_URL).await?);
        state.telemetry = meta.get_setting_value(SETTING_TELEMETRY).await? == "in";
        clean_up_temp_token(meta, &mut state).await?;
        Ok(Some(state))
    }

    async fn update(
        &self,
        meta: &Meta,
        prior: BootstrapState,
        planned: BootstrapState,
        _timeouts: &Timeouts,
    ) -> ProviderResult<BootstrapState> {
        ensure_bootstrap_mode(meta)?;
        // Tokens and the current password only live in the stored state.
        let mut state = BootstrapState {
            id: prior.id,
            current_password: prior.current_password,
            token: prior.token,
            token_id: prior.token_id,
            temp_token: prior.temp_token,
            temp_token_id: prior.temp_token_id,
            ..planned
        };
        login(meta, &mut state).await?;
        state.user = Some(DEFAULT_USER.to_string());
        apply_settings(meta, &state).await?;

        let (changed, password, admin) = meta
            .set_user_password_by_name(DEFAULT_USER, opt(&state.password))
            .await
            .context("Updating Admin password")?;
        if changed {
            state.password = Some(password.clone());
            state.current_password = Some(password);
        }

        let expired = meta.is_token_expired(opt(&state.token_id)).await?;
        if state.token_update || expired {
            let previous = state.token_id.clone();
            new_admin_token(meta, &mut state).await?;
            meta.delete_token(opt(&previous))
                .await
                .context("Deleting previous Admin token")?;
        }
        state.id = admin.id().to_string();

        self.read(meta, state)
            .await?
            .context("Bootstrap disappeared after it was written")
    }

    async fn delete(
        &self,
        _meta: &Meta,
        _state: BootstrapState,
        _timeouts: &Timeouts,
    ) -> ProviderResult<()> {
        Ok(())
    }
}
