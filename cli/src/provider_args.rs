use clap::Parser;
use provider::config::ProviderConfig;
use std::path::PathBuf;

/// Provider settings. Anything left unset falls back to the manifest's `provider` block, then to
/// the Rancher CLI config file.
#[derive(Debug, Default, Parser)]
pub(crate) struct ProviderArgs {
    /// The URL to the rancher API.
    #[clap(long = "api-url", env = "RANCHER_URL", global = true)]
    api_url: Option<String>,
    /// API key used to authenticate with the rancher server.
    #[clap(long = "access-key", env = "RANCHER_ACCESS_KEY", global = true)]
    access_key: Option<String>,
    /// API secret used to authenticate with the rancher server.
    #[clap(
        long = "secret-key",
        env = "RANCHER_SECRET_KEY",
        global = true,
        hide_env_values = true
    )]
    secret_key: Option<String>,
    /// API token used to authenticate with the rancher server.
    #[clap(
        long = "token-key",
        env = "RANCHER_TOKEN_KEY",
        global = true,
        hide_env_values = true
    )]
    token_key: Option<String>,
    /// CA certificates used to sign rancher server tls certificates.
    #[clap(long = "ca-certs", env = "RANCHER_CA_CERTS", global = true)]
    ca_certs: Option<String>,
    /// Path to the Rancher client cli.json config file.
    #[clap(long = "client-config", env = "RANCHER_CLIENT_CONFIG", global = true)]
    config: Option<PathBuf>,
    /// Allow insecure server connections when using SSL.
    #[clap(long = "insecure", env = "RANCHER_INSECURE", global = true)]
    insecure: bool,
    /// Run against a fresh server to bootstrap the admin user.
    #[clap(long = "bootstrap", env = "RANCHER_BOOTSTRAP", global = true)]
    bootstrap: bool,
}

impl ProviderArgs {
    pub(crate) fn to_config(&self) -> ProviderConfig {
        ProviderConfig {
            api_url: self.api_url.clone(),
            access_key: self.access_key.clone(),
            secret_key: self.secret_key.clone(),
            token_key: self.token_key.clone(),
            ca_certs: self.ca_certs.clone(),
            config: self.config.clone(),
            // An unset flag must not hide a `true` in the manifest.
            insecure: self.insecure.then(|| true),
            bootstrap: self.bootstrap.then(|| true),
            ..Default::default()
        }
    }
}
