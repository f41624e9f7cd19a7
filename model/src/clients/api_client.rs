use super::error::{self, Result};
use crate::types::{LoginInput, Token};
use crate::ApiObject;
use log::trace;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::{Certificate, Method};
use serde::de::DeserializeOwned;
use serde::Serialize;
use snafu::ResultExt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use url::Url;

const LOCAL_LOGIN_PATH: &str = "/v3-public/localProviders/local";

/// Everything needed to build an [`ApiClient`].
#[derive(Debug, Clone, Default)]
pub struct ClientOptions {
    /// The server url, with or without the `/v3` suffix.
    pub url: String,
    pub access_key: Option<String>,
    pub secret_key: Option<String>,
    /// An API token in `token-xxxxx:secret` form. Takes precedence over the key pair.
    pub token_key: Option<String>,
    /// PEM encoded CA certificates to trust in addition to the system roots.
    pub ca_certs: Option<String>,
    /// Skip TLS certificate verification.
    pub insecure: bool,
    pub timeout: Option<Duration>,
}

/// How requests are authenticated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Credentials {
    Anonymous,
    Token(String),
    Keys {
        access_key: String,
        secret_key: String,
    },
}

impl Credentials {
    fn from_options(options: &ClientOptions) -> Self {
        match (&options.token_key, &options.access_key, &options.secret_key) {
            (Some(token), _, _) if !token.is_empty() => Self::Token(token.to_owned()),
            (_, Some(access_key), Some(secret_key))
                if !access_key.is_empty() && !secret_key.is_empty() =>
            {
                Self::Keys {
                    access_key: access_key.to_owned(),
                    secret_key: secret_key.to_owned(),
                }
            }
            _ => Self::Anonymous,
        }
    }
}

/// An HTTP client for the v3 management API.
///
/// The client is cheap to clone; clones share the connection pool and the credentials, so a token
/// swapped in with [`ApiClient::set_token`] is seen by every clone.
#[derive(Clone)]
pub struct ApiClient {
    inner: Arc<Inner>,
}

struct Inner {
    http: reqwest::Client,
    server_url: String,
    credentials: RwLock<Credentials>,
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("server_url", &self.inner.server_url)
            .finish()
    }
}

impl ApiClient {
    pub fn new(options: ClientOptions) -> Result<Self> {
        let server_url = normalize_url(&options.url);
        Url::parse(&server_url).context(error::UrlSnafu { url: &server_url })?;

        let mut builder = reqwest::Client::builder().danger_accept_invalid_certs(options.insecure);
        if let Some(ca_certs) = options.ca_certs.as_ref().filter(|certs| !certs.is_empty()) {
            let certificate =
                Certificate::from_pem(ca_certs.as_bytes()).context(error::CertificateSnafu)?;
            builder = builder.add_root_certificate(certificate);
        }
        if let Some(timeout) = options.timeout {
            builder = builder.timeout(timeout);
        }
        let http = builder.build().context(error::InitializationSnafu)?;

        Ok(Self {
            inner: Arc::new(Inner {
                http,
                credentials: RwLock::new(Credentials::from_options(&options)),
                server_url,
            }),
        })
    }

    /// The server url without the `/v3` suffix, e.g. `https://rancher.example.com`.
    pub fn server_url(&self) -> &str {
        &self.inner.server_url
    }

    /// The management API root, e.g. `https://rancher.example.com/v3`.
    pub fn api_url(&self) -> String {
        format!("{}/v3", self.inner.server_url)
    }

    pub async fn credentials(&self) -> Credentials {
        self.inner.credentials.read().await.clone()
    }

    pub async fn set_credentials(&self, credentials: Credentials) {
        *self.inner.credentials.write().await = credentials;
    }

    pub async fn set_token<S: Into<String>>(&self, token: S) {
        self.set_credentials(Credentials::Token(token.into())).await
    }

    /// A typed client for the management collection of `T`.
    pub fn collection<T: ApiObject>(&self) -> super::Collection<T> {
        super::Collection::management(self.clone())
    }

    /// A typed client for the collection of `T` inside the cluster `cluster_id`.
    pub fn cluster_collection<T: ApiObject>(&self, cluster_id: &str) -> super::Collection<T> {
        super::Collection::cluster_scoped(self.clone(), cluster_id)
    }

    /// Resolve `path` against the server url. Absolute urls, such as the `links` returned by the
    /// API, are used as they are.
    pub fn url(&self, path: &str) -> Result<Url> {
        let url = if path.starts_with("http://") || path.starts_with("https://") {
            path.to_string()
        } else {
            format!("{}/{}", self.inner.server_url, path.trim_start_matches('/'))
        };
        Ok(Url::parse(&url).context(error::UrlSnafu { url })?)
    }

    pub async fn get<T>(&self, path: &str) -> Result<T>
    where
        T: DeserializeOwned,
    {
        self.send(Method::GET, path, &[], None, true).await
    }

    pub async fn get_with_query<T>(&self, path: &str, query: &[(&str, &str)]) -> Result<T>
    where
        T: DeserializeOwned,
    {
        self.send(Method::GET, path, query, None, true).await
    }

    pub async fn post<B, T>(&self, path: &str, body: &B) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let body = to_body(path, body)?;
        self.send(Method::POST, path, &[], Some(body), true).await
    }

    pub async fn put<B, T>(&self, path: &str, body: &B) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let body = to_body(path, body)?;
        self.send(Method::PUT, path, &[], Some(body), true).await
    }

    pub async fn delete(&self, path: &str) -> Result<()> {
        let _: serde_json::Value = self.send(Method::DELETE, path, &[], None, true).await?;
        Ok(())
    }

    /// Log in as a local user and return the session token created for it. The request is sent
    /// without credentials and does not change the credentials of this client.
    pub async fn login(
        &self,
        username: &str,
        password: &str,
        ttl_millis: u64,
        description: &str,
    ) -> Result<Token> {
        let input = LoginInput {
            username: username.to_string(),
            password: password.to_string(),
            ttl: ttl_millis,
            description: description.to_string(),
            response_type: "json".to_string(),
        };
        let body = to_body("login", &input)?;
        self.send(
            Method::POST,
            LOCAL_LOGIN_PATH,
            &[("action", "login")],
            Some(body),
            false,
        )
        .await
    }

    async fn send<T>(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, &str)],
        body: Option<Vec<u8>>,
        authenticated: bool,
    ) -> Result<T>
    where
        T: DeserializeOwned,
    {
        let url = self.url(path)?;
        trace!("{} {}", method, url);
        let mut request = self
            .inner
            .http
            .request(method.clone(), url.clone())
            .header(ACCEPT, "application/json");
        if !query.is_empty() {
            request = request.query(query);
        }
        if let Some(body) = body {
            request = request.header(CONTENT_TYPE, "application/json").body(body);
        }
        if authenticated {
            request = match self.credentials().await {
                Credentials::Anonymous => request,
                Credentials::Token(token) => request.bearer_auth(token),
                Credentials::Keys {
                    access_key,
                    secret_key,
                } => request.basic_auth(access_key, Some(secret_key)),
            };
        }

        let response = request.send().await.context(error::RequestSnafu {
            method: method.as_str(),
            url: url.as_str(),
        })?;
        let status = response.status();
        let text = response.text().await.context(error::ResponseBodySnafu {
            method: method.as_str(),
            url: url.as_str(),
        })?;
        trace!("{} {} returned {}", method, url, status);

        if !status.is_success() {
            let api_error: ApiErrorBody = serde_json::from_str(&text).unwrap_or_default();
            return Err(error::ResponseSnafu {
                method: method.as_str(),
                url: url.as_str(),
                status,
                code: api_error.code.unwrap_or_else(|| status.to_string()),
                message: api_error.message.unwrap_or(text),
            }
            .build()
            .into());
        }

        let text = if text.trim().is_empty() {
            "null"
        } else {
            text.as_str()
        };
        Ok(serde_json::from_str(text).context(error::DeserializeSnafu { url: url.as_str() })?)
    }
}

/// The body the API returns alongside a non-2xx status.
#[derive(Debug, Default, serde::Deserialize)]
struct ApiErrorBody {
    code: Option<String>,
    message: Option<String>,
}

fn to_body<B>(what: &str, body: &B) -> Result<Vec<u8>>
where
    B: Serialize + ?Sized,
{
    Ok(serde_json::to_vec(body).context(error::SerializeSnafu { what })?)
}

/// Strip whitespace, trailing slashes and the `/v3` suffix from a server url.
pub fn normalize_url(url: &str) -> String {
    let url = url.trim().trim_end_matches('/');
    url.strip_suffix("/v3")
        .unwrap_or(url)
        .trim_end_matches('/')
        .to_string()
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::clients::HttpStatusCode;
    use httpmock::prelude::*;
    use serde_json::json;

    #[test]
    fn normalize() {
        assert_eq!(
            normalize_url("https://rancher.example.com/v3/"),
            "https://rancher.example.com"
        );
        assert_eq!(
            normalize_url(" https://rancher.example.com/ "),
            "https://rancher.example.com"
        );
        assert_eq!(
            normalize_url("https://example.com/rancher/v3"),
            "https://example.com/rancher"
        );
    }

    #[test]
    fn credentials_precedence() {
        let options = ClientOptions {
            url: "https://rancher".to_string(),
            access_key: Some("access".to_string()),
            secret_key: Some("secret".to_string()),
            token_key: Some("token-abc:xyz".to_string()),
            ..Default::default()
        };
        assert_eq!(
            Credentials::from_options(&options),
            Credentials::Token("token-abc:xyz".to_string())
        );
        let options = ClientOptions {
            token_key: None,
            ..options
        };
        assert!(matches!(
            Credentials::from_options(&options),
            Credentials::Keys { .. }
        ));
        assert_eq!(
            Credentials::from_options(&ClientOptions::default()),
            Credentials::Anonymous
        );
    }

    #[test]
    fn bad_url() {
        let result = ApiClient::new(ClientOptions {
            url: "not a url".to_string(),
            ..Default::default()
        });
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn bearer_token_and_error_body() {
        let server = MockServer::start_async().await;
        let ok = server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/v3/settings/server-url")
                    .header("Authorization", "Bearer token-abc:xyz");
                then.status(200)
                    .json_body(json!({"id": "server-url", "value": "https://rancher"}));
            })
            .await;
        let missing = server
            .mock_async(|when, then| {
                when.method(GET).path("/v3/settings/nope");
                then.status(404).json_body(json!({
                    "type": "error",
                    "status": 404,
                    "code": "NotFound",
                    "message": "settings nope not found"
                }));
            })
            .await;

        let client = ApiClient::new(ClientOptions {
            url: server.url("/v3"),
            token_key: Some("token-abc:xyz".to_string()),
            ..Default::default()
        })
        .unwrap();

        let setting: serde_json::Value = client.get("/v3/settings/server-url").await.unwrap();
        assert_eq!(setting["value"], "https://rancher");
        ok.assert_async().await;

        let err = client
            .get::<serde_json::Value>("/v3/settings/nope")
            .await
            .unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(err.api_code(), Some("NotFound"));
        missing.assert_async().await;
    }

    #[tokio::test]
    async fn login_is_anonymous() {
        let server = MockServer::start_async().await;
        let login = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/v3-public/localProviders/local")
                    .query_param("action", "login")
                    .json_body_partial(r#"{"username": "admin", "password": "admin"}"#);
                then.status(201)
                    .json_body(json!({"id": "token-1", "token": "token-1:secret"}));
            })
            .await;

        let client = ApiClient::new(ClientOptions {
            url: server.base_url(),
            ..Default::default()
        })
        .unwrap();
        let token = client.login("admin", "admin", 60000, "session").await.unwrap();
        assert_eq!(token.token.as_deref(), Some("token-1:secret"));
        assert_eq!(token.id(), "token-1");
        login.assert_async().await;
        assert_eq!(client.credentials().await, Credentials::Anonymous);
    }

    #[tokio::test]
    async fn token_swap_is_shared_by_clones() {
        let client = ApiClient::new(ClientOptions {
            url: "https://rancher.example.com".to_string(),
            ..Default::default()
        })
        .unwrap();
        let clone = client.clone();
        client.set_token("token-2:abc").await;
        assert_eq!(
            clone.credentials().await,
            Credentials::Token("token-2:abc".to_string())
        );
        assert_eq!(clone.api_url(), "https://rancher.example.com/v3");
    }
}
