use crate::config::{ProviderConfig, ResolvedConfig};
use crate::error::{IntoProviderError, ProviderError, ProviderResult};
use log::{debug, info};
use model::clients::{
    AllowNotFound, ApiClient, Collection, Credentials, CrudClient, HttpStatusCode,
};
use model::types::{
    AnyAuthConfig, AuthConfig, Cluster, Project, RoleTemplate, SetPasswordInput, Setting, Token,
    User,
};
use model::wait::StateChangeConf;
use model::ApiObject;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt::Debug;
use std::time::Duration;

const LOCAL_AUTH_CONFIG: &str = "local";

/// The configured provider handed to every resource operation.
#[derive(Debug, Clone)]
pub struct Meta {
    client: ApiClient,
    config: ResolvedConfig,
}

impl Meta {
    /// Build the API client without contacting the server.
    pub fn new(config: ProviderConfig) -> ProviderResult<Self> {
        let config = config.resolve()?;
        let client =
            ApiClient::new(config.client_options()).context("Unable to create the API client")?;
        Ok(Self { client, config })
    }

    /// Build the API client and, unless in bootstrap mode, check that the server accepts the
    /// configured credentials.
    pub async fn configure(config: ProviderConfig) -> ProviderResult<Self> {
        let meta = Self::new(config)?;
        if !meta.is_bootstrap() {
            let _: serde_json::Value = meta
                .client
                .get("/v3")
                .await
                .context(format!("Unable to connect to '{}'", meta.client.api_url()))?;
        }
        Ok(meta)
    }

    pub fn client(&self) -> &ApiClient {
        &self.client
    }

    pub fn is_bootstrap(&self) -> bool {
        self.config.bootstrap
    }

    /// The management API root, e.g. `https://rancher.example.com/v3`.
    pub fn api_url(&self) -> String {
        self.client.api_url()
    }

    pub fn management<T: ApiObject>(&self) -> Collection<T> {
        self.client.collection()
    }

    pub fn cluster_scoped<T: ApiObject>(&self, cluster_id: &str) -> Collection<T> {
        self.client.cluster_collection(cluster_id)
    }

    /// A poller configured with this provider's refresh timing.
    pub fn state_change<S>(
        &self,
        what: S,
        pending: &[&str],
        target: &[&str],
        timeout: Duration,
    ) -> StateChangeConf
    where
        S: Into<String>,
    {
        StateChangeConf::new(what, pending, target, timeout)
            .with_delay(self.config.refresh_delay)
            .with_interval(self.config.refresh_interval)
    }

    pub async fn is_cluster_active(&self, cluster_id: &str) -> ProviderResult<bool> {
        let cluster = self
            .management::<Cluster>()
            .by_id(cluster_id)
            .await
            .context(format!("Unable to get cluster '{}'", cluster_id))?;
        Ok(cluster.state() == "active")
    }

    pub async fn cluster_exists(&self, cluster_id: &str) -> ProviderResult<bool> {
        exists(self.management::<Cluster>().by_id(cluster_id).await)
            .context(format!("Unable to get cluster '{}'", cluster_id))
    }

    pub async fn project_exists(&self, project_id: &str) -> ProviderResult<bool> {
        exists(self.management::<Project>().by_id(project_id).await)
            .context(format!("Unable to get project '{}'", project_id))
    }

    pub async fn role_template_exists(&self, role_template_id: &str) -> ProviderResult<bool> {
        exists(
            self.management::<RoleTemplate>()
                .by_id(role_template_id)
                .await,
        )
        .context(format!("Unable to get role template '{}'", role_template_id))
    }

    pub async fn get_auth_config<T>(&self, name: &str) -> ProviderResult<AuthConfig<T>>
    where
        T: Serialize + DeserializeOwned + Clone + Debug + Send + Sync + 'static,
    {
        self.management::<AuthConfig<T>>()
            .by_id(name)
            .await
            .context(format!("Failed to get auth config '{}'", name))
    }

    /// Replace the auth config `existing` with `update`.
    pub async fn update_auth_config<T>(
        &self,
        existing: &AuthConfig<T>,
        update: &AuthConfig<T>,
    ) -> ProviderResult<AuthConfig<T>>
    where
        T: Serialize + DeserializeOwned + Clone + Debug + Send + Sync + 'static,
    {
        self.management::<AuthConfig<T>>()
            .update(existing, update)
            .await
            .context(format!("Updating auth config '{}'", existing.id()))
    }

    /// Post the `disable` action of an auth config.
    pub async fn disable_auth_config<T>(&self, existing: &AuthConfig<T>) -> ProviderResult<()>
    where
        T: Serialize + DeserializeOwned + Clone + Debug + Send + Sync + 'static,
    {
        let _: serde_json::Value = self
            .management::<AuthConfig<T>>()
            .action(existing, "disable", &serde_json::Value::Null)
            .await
            .context(format!("Disabling auth config '{}'", existing.id()))?;
        Ok(())
    }

    /// Fails if an auth provider other than `name` and the local one is already enabled. Only one
    /// external auth provider can be active at a time.
    pub async fn check_auth_config_enabled(&self, name: &str) -> ProviderResult<()> {
        let configs = self
            .management::<AnyAuthConfig>()
            .list()
            .await
            .context("Unable to list auth configs")?;
        match configs.iter().find(|config| {
            config.is_enabled() && config.id() != name && config.id() != LOCAL_AUTH_CONFIG
        }) {
            Some(enabled) => Err(ProviderError::new_with_context(format!(
                "Auth config '{}' is already enabled, disable it before enabling '{}'",
                enabled.id(),
                name
            ))),
            None => Ok(()),
        }
    }

    pub async fn get_setting_value(&self, name: &str) -> ProviderResult<String> {
        let setting = self
            .management::<Setting>()
            .by_id(name)
            .await
            .context(format!("Unable to get setting '{}'", name))?;
        Ok(setting.value.unwrap_or_default())
    }

    pub async fn set_setting(&self, name: &str, value: &str) -> ProviderResult<()> {
        let settings = self.management::<Setting>();
        let setting = settings
            .by_id(name)
            .await
            .context(format!("Unable to get setting '{}'", name))?;
        let update = Setting {
            value: Some(value.to_string()),
            ..setting.clone()
        };
        settings
            .update(&setting, &update)
            .await
            .context(format!("Unable to set setting '{}'", name))?;
        Ok(())
    }

    /// Create an API token for the current user. `ttl_secs` of zero never expires.
    pub async fn generate_user_token(
        &self,
        description: &str,
        ttl_secs: u64,
    ) -> ProviderResult<Token> {
        let request = Token {
            description: Some(description.to_string()),
            ttl: Some(ttl_secs.saturating_mul(1000)),
            ..Default::default()
        };
        let token = self
            .management::<Token>()
            .create(&request)
            .await
            .context("Unable to create token")?;
        if token.token.as_deref().unwrap_or_default().is_empty() {
            return Err(ProviderError::new_with_context(format!(
                "Token '{}' was created without a key",
                token.id()
            )));
        }
        Ok(token)
    }

    /// Delete a token. An empty id or a token that is already gone is not an error.
    pub async fn delete_token(&self, token_id: &str) -> ProviderResult<()> {
        if token_id.is_empty() {
            return Ok(());
        }
        let tokens = self.management::<Token>();
        let token = match tokens
            .by_id(token_id)
            .await
            .allow_not_found(|_| ())
            .context(format!("Unable to get token '{}'", token_id))?
        {
            Some(token) => token,
            None => return Ok(()),
        };
        tokens
            .delete(&token)
            .await
            .allow_not_found(|_| ())
            .context(format!("Unable to delete token '{}'", token_id))?;
        Ok(())
    }

    /// Whether a token is expired. A missing token counts as expired.
    pub async fn is_token_expired(&self, token_id: &str) -> ProviderResult<bool> {
        if token_id.is_empty() {
            return Ok(true);
        }
        let token = self
            .management::<Token>()
            .by_id(token_id)
            .await
            .allow_not_found(|_| ())
            .context(format!("Unable to get token '{}'", token_id))?;
        Ok(token.map(|token| token.expired.unwrap_or_default()).unwrap_or(true))
    }

    /// Switch the client to `token` if the server accepts it, otherwise keep the current
    /// credentials and fail.
    pub async fn update_token(&self, token: &str) -> ProviderResult<()> {
        if token.is_empty() {
            return Err(ProviderError::new_with_context("Token is empty"));
        }
        let previous = self.client.credentials().await;
        self.client
            .set_credentials(Credentials::Token(token.to_string()))
            .await;
        match self.current_user().await {
            Ok(_) => Ok(()),
            Err(e) => {
                self.client.set_credentials(previous).await;
                Err(e)
            }
        }
    }

    /// The user the client is authenticated as.
    pub async fn current_user(&self) -> ProviderResult<User> {
        let users = self
            .management::<User>()
            .list_filtered(&[("me", "true")])
            .await
            .context("Unable to get the current user")?;
        users
            .into_iter()
            .next()
            .context("The server returned no current user")
    }

    pub async fn find_user_by_name(&self, username: &str) -> ProviderResult<User> {
        let users = self
            .management::<User>()
            .list_filtered(&[("username", username)])
            .await
            .context(format!("Unable to list users named '{}'", username))?;
        users
            .into_iter()
            .find(|user| user.username.as_deref() == Some(username))
            .context(format!("User '{}' not found", username))
    }

    /// Log in as a local user and return the session token.
    pub async fn do_user_login(
        &self,
        username: &str,
        password: &str,
        ttl_millis: u64,
        description: &str,
    ) -> ProviderResult<Token> {
        let token = self
            .client
            .login(username, password, ttl_millis, description)
            .await
            .context(format!("Login with user '{}'", username))?;
        if token.token.as_deref().unwrap_or_default().is_empty() {
            return Err(ProviderError::new_with_context(format!(
                "Login with user '{}' returned no token",
                username
            )));
        }
        Ok(token)
    }

    /// Make sure `username` has `password`, generating a random one when `password` is empty.
    /// Returns whether the password was changed, the password, and the user.
    pub async fn set_user_password_by_name(
        &self,
        username: &str,
        password: &str,
    ) -> ProviderResult<(bool, String, User)> {
        let user = self.find_user_by_name(username).await?;
        let password = if password.is_empty() {
            uuid::Uuid::new_v4().simple().to_string()
        } else {
            password.to_string()
        };

        // The login session is only a probe, remove it straight away.
        if let Ok(session) = self
            .do_user_login(username, &password, 60_000, "password probe")
            .await
        {
            debug!("Password of user '{}' is already up to date", username);
            self.delete_token(session.id()).await?;
            return Ok((false, password, user));
        }

        info!("Setting password of user '{}'", username);
        let _: serde_json::Value = self
            .management::<User>()
            .action(
                &user,
                "setpassword",
                &SetPasswordInput {
                    new_password: password.clone(),
                },
            )
            .await
            .context(format!("Unable to set password of user '{}'", username))?;
        Ok((true, password, user))
    }
}

/// Map a lookup result to whether the object exists.
fn exists<T>(result: model::clients::Result<T>) -> model::clients::Result<bool> {
    match result {
        Ok(_) => Ok(true),
        Err(e) if e.is_not_found() => Ok(false),
        Err(e) => Err(e),
    }
}
