use crate::error::{IntoProviderError, ProviderError, ProviderResult};
use model::clients::ClientOptions;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

/// The provider settings. Every field is optional so that settings can be layered: command line and
/// environment first, then the manifest's `provider` block, then the Rancher CLI config file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(default, deny_unknown_fields)]
pub struct ProviderConfig {
    /// The URL to the rancher API (`RANCHER_URL`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,
    /// API key used to authenticate with the rancher server (`RANCHER_ACCESS_KEY`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub access_key: Option<String>,
    /// API secret used to authenticate with the rancher server (`RANCHER_SECRET_KEY`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secret_key: Option<String>,
    /// API token used to authenticate with the rancher server (`RANCHER_TOKEN_KEY`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_key: Option<String>,
    /// CA certificates used to sign rancher server tls certificates (`RANCHER_CA_CERTS`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ca_certs: Option<String>,
    /// Path to the Rancher client cli.json config file (`RANCHER_CLIENT_CONFIG`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config: Option<PathBuf>,
    /// Allow insecure server connections when using SSL (`RANCHER_INSECURE`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub insecure: Option<bool>,
    /// Run against a fresh server with the admin bootstrap resource (`RANCHER_BOOTSTRAP`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bootstrap: Option<bool>,
    /// Delay before the first state refresh of a wait.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_delay_millis: Option<u64>,
    /// Interval between state refreshes of a wait.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_interval_millis: Option<u64>,
}

/// The subset of the Rancher CLI `cli.json` the provider reads.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CliConfig {
    pub access_key: String,
    pub secret_key: String,
    pub token_key: String,
    pub ca_certs: String,
    pub url: String,
    pub project: String,
    pub insecure: bool,
}

impl CliConfig {
    /// Read a `cli.json`. A missing file is not an error and yields an empty config.
    pub fn load<P: AsRef<Path>>(path: P) -> ProviderResult<Self> {
        let path = path.as_ref();
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(e) => {
                return Err(ProviderError::new_with_source_and_context(
                    format!("Unable to read config file '{}'", path.display()),
                    e,
                ))
            }
        };
        serde_json::from_str(&content)
            .context(format!("Unable to parse config file '{}'", path.display()))
    }

    /// The server url reduced to `scheme://host[:port]`.
    fn server_url(&self) -> ProviderResult<Option<String>> {
        if self.url.is_empty() {
            return Ok(None);
        }
        let url = Url::parse(&self.url)
            .context(format!("Invalid url '{}' in config file", self.url))?;
        let host = url
            .host_str()
            .context(format!("No host in url '{}' in config file", self.url))?;
        Ok(Some(match url.port() {
            Some(port) => format!("{}://{}:{}", url.scheme(), host, port),
            None => format!("{}://{}", url.scheme(), host),
        }))
    }
}

/// Provider settings after layering, with `api_url` guaranteed to be present.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedConfig {
    pub api_url: String,
    pub access_key: Option<String>,
    pub secret_key: Option<String>,
    pub token_key: Option<String>,
    pub ca_certs: Option<String>,
    pub insecure: bool,
    pub bootstrap: bool,
    pub refresh_delay: Duration,
    pub refresh_interval: Duration,
}

impl ProviderConfig {
    /// Fill every unset field of `self` from `fallback`.
    pub fn or(self, fallback: ProviderConfig) -> ProviderConfig {
        ProviderConfig {
            api_url: non_empty(self.api_url).or(fallback.api_url),
            access_key: non_empty(self.access_key).or(fallback.access_key),
            secret_key: non_empty(self.secret_key).or(fallback.secret_key),
            token_key: non_empty(self.token_key).or(fallback.token_key),
            ca_certs: non_empty(self.ca_certs).or(fallback.ca_certs),
            config: self.config.or(fallback.config),
            insecure: self.insecure.or(fallback.insecure),
            bootstrap: self.bootstrap.or(fallback.bootstrap),
            refresh_delay_millis: self.refresh_delay_millis.or(fallback.refresh_delay_millis),
            refresh_interval_millis: self
                .refresh_interval_millis
                .or(fallback.refresh_interval_millis),
        }
    }

    /// Apply the `cli.json` named by `config` (if any) and check that an API url is known.
    pub fn resolve(self) -> ProviderResult<ResolvedConfig> {
        let config = match &self.config {
            Some(path) => {
                let cli_config = CliConfig::load(path)?;
                let from_file = ProviderConfig {
                    api_url: cli_config.server_url()?,
                    access_key: Some(cli_config.access_key),
                    secret_key: Some(cli_config.secret_key),
                    token_key: Some(cli_config.token_key),
                    ca_certs: Some(cli_config.ca_certs),
                    insecure: Some(cli_config.insecure),
                    ..Default::default()
                };
                // `insecure: false` is indistinguishable from unset, so the file may still turn
                // it on.
                let insecure = self.insecure.unwrap_or_default() || cli_config.insecure;
                ProviderConfig {
                    insecure: Some(insecure),
                    ..self.or(from_file)
                }
            }
            None => self,
        };

        let api_url = non_empty(config.api_url)
            .context("No api_url provided")?;
        Ok(ResolvedConfig {
            api_url,
            access_key: non_empty(config.access_key),
            secret_key: non_empty(config.secret_key),
            token_key: non_empty(config.token_key),
            ca_certs: non_empty(config.ca_certs),
            insecure: config.insecure.unwrap_or_default(),
            bootstrap: config.bootstrap.unwrap_or_default(),
            refresh_delay: config
                .refresh_delay_millis
                .map(Duration::from_millis)
                .unwrap_or(model::wait::DEFAULT_DELAY),
            refresh_interval: config
                .refresh_interval_millis
                .map(Duration::from_millis)
                .unwrap_or(model::wait::DEFAULT_INTERVAL),
        })
    }
}

impl ResolvedConfig {
    pub fn client_options(&self) -> ClientOptions {
        ClientOptions {
            url: self.api_url.clone(),
            access_key: self.access_key.clone(),
            secret_key: self.secret_key.clone(),
            token_key: self.token_key.clone(),
            ca_certs: self.ca_certs.clone(),
            insecure: self.insecure,
            timeout: None,
        }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.is_empty())
}

#[cfg(test)]
mod test {
    use super::*;
    use std::io::Write;

    #[test]
    fn missing_api_url() {
        let err = ProviderConfig::default().resolve().unwrap_err();
        assert_eq!(err.to_string(), "No api_url provided");
    }

    #[test]
    fn explicit_values_win_over_fallback() {
        let explicit = ProviderConfig {
            api_url: Some("https://explicit".to_string()),
            token_key: Some(String::new()),
            ..Default::default()
        };
        let fallback = ProviderConfig {
            api_url: Some("https://fallback".to_string()),
            token_key: Some("token-abc:xyz".to_string()),
            insecure: Some(true),
            ..Default::default()
        };
        let merged = explicit.or(fallback);
        assert_eq!(merged.api_url.as_deref(), Some("https://explicit"));
        assert_eq!(merged.token_key.as_deref(), Some("token-abc:xyz"));
        assert_eq!(merged.insecure, Some(true));
    }

    #[test]
    fn cli_config_fills_gaps() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{
                "accessKey": "token-abc",
                "secretKey": "s3cr3t",
                "url": "https://rancher.example.com:8443/v3",
                "project": "c-abc:p-123",
                "insecure": true
            }}"#
        )
        .unwrap();

        let resolved = ProviderConfig {
            secret_key: Some("explicit".to_string()),
            config: Some(file.path().to_path_buf()),
            ..Default::default()
        }
        .resolve()
        .unwrap();

        assert_eq!(resolved.api_url, "https://rancher.example.com:8443");
        assert_eq!(resolved.access_key.as_deref(), Some("token-abc"));
        assert_eq!(resolved.secret_key.as_deref(), Some("explicit"));
        assert_eq!(resolved.token_key, None);
        assert!(resolved.insecure);
        assert_eq!(resolved.refresh_interval, model::wait::DEFAULT_INTERVAL);
    }

    #[test]
    fn missing_cli_config_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let resolved = ProviderConfig {
            api_url: Some("https://rancher".to_string()),
            config: Some(dir.path().join("cli.json")),
            ..Default::default()
        }
        .resolve()
        .unwrap();
        assert_eq!(resolved.api_url, "https://rancher");
        assert!(!resolved.insecure);
    }

    #[test]
    fn unknown_provider_field() {
        let result: Result<ProviderConfig, _> =
            serde_yaml::from_str("api_url: https://rancher\ntoken: abc\n");
        assert!(result.is_err());
    }
}
