use super::{import_by_id, read_back, require};
use crate::error::{IntoProviderError, ProviderError, ProviderResult};
use crate::meta::Meta;
use crate::resource::{Resource, ResourceState, Timeouts};
use log::info;
use model::clients::{AllowNotFound, CrudClient};
use model::types::{
    Amazonec2CredentialConfig, AzureCredentialConfig, CloudCredential,
    DigitaloceanCredentialConfig, OpenstackCredentialConfig, VsphereCredentialConfig,
};
use model::{ApiObject, Configuration, ObjectMeta};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

mirrored_block! {
    pub struct Amazonec2CredentialState => Amazonec2CredentialConfig {
        access_key: String,
        secret_key: String,
        default_region: String,
    }
    secrets [secret_key]
}

mirrored_block! {
    pub struct AzureCredentialState => AzureCredentialConfig {
        client_id: String,
        client_secret: String,
        subscription_id: String,
    }
    secrets [client_secret]
}

mirrored_block! {
    pub struct DigitaloceanCredentialState => DigitaloceanCredentialConfig {
        access_token: String,
    }
    secrets [access_token]
}

mirrored_block! {
    pub struct OpenstackCredentialState => OpenstackCredentialConfig {
        password: String,
    }
    secrets [password]
}

mirrored_block! {
    pub struct VsphereCredentialState => VsphereCredentialConfig {
        password: String,
        username: String,
        vcenter: String,
        vcenter_port: String,
    }
    secrets [password]
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct CloudCredentialState {
    #[serde(default)]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    /// The node driver the credential is for. Computed from the configured block.
    #[serde(default)]
    pub driver: String,
    #[serde(default)]
    pub amazonec2_credential_config: Option<Amazonec2CredentialState>,
    #[serde(default)]
    pub azure_credential_config: Option<AzureCredentialState>,
    #[serde(default)]
    pub digitalocean_credential_config: Option<DigitaloceanCredentialState>,
    #[serde(default)]
    pub openstack_credential_config: Option<OpenstackCredentialState>,
    #[serde(default)]
    pub vsphere_credential_config: Option<VsphereCredentialState>,
    #[serde(default)]
    pub annotations: BTreeMap<String, String>,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
}

impl CloudCredentialState {
    /// The drivers of the configured credential blocks.
    fn drivers(&self) -> Vec<&'static str> {
        [
            (self.amazonec2_credential_config.is_some(), "amazonec2"),
            (self.azure_credential_config.is_some(), "azure"),
            (self.digitalocean_credential_config.is_some(), "digitalocean"),
            (self.openstack_credential_config.is_some(), "openstack"),
            (self.vsphere_credential_config.is_some(), "vmwarevsphere"),
        ]
        .iter()
        .filter(|(set, _)| *set)
        .map(|(_, driver)| *driver)
        .collect()
    }

    fn configured_driver(&self) -> String {
        self.drivers().first().copied().unwrap_or_default().to_string()
    }
}

impl Configuration for CloudCredentialState {}

impl ResourceState for CloudCredentialState {
    fn id(&self) -> &str {
        &self.id
    }

    fn validate(&self) -> ProviderResult<()> {
        require("name", &self.name)?;
        if self.drivers().len() != 1 {
            return Err(ProviderError::new_with_context(
                "Exactly one of amazonec2_credential_config, azure_credential_config, \
                 digitalocean_credential_config, openstack_credential_config or \
                 vsphere_credential_config is required",
            ));
        }
        Ok(())
    }
}

/// The server never returns secrets, so they are taken from `prior`. A block the server left out
/// entirely is kept as configured.
pub(crate) fn flatten_cloud_credential(
    credential: &CloudCredential,
    prior: &CloudCredentialState,
) -> CloudCredentialState {
    let mut state = CloudCredentialState {
        id: credential.id().to_string(),
        name: credential.name().to_string(),
        description: credential.description.clone(),
        driver: String::new(),
        amazonec2_credential_config: match &credential.amazonec2_credential_config {
            Some(config) => Some(
                Amazonec2CredentialState::from(config)
                    .keep_secrets(prior.amazonec2_credential_config.as_ref()),
            ),
            None => prior.amazonec2_credential_config.clone(),
        },
        azure_credential_config: match &credential.azure_credential_config {
            Some(config) => Some(
                AzureCredentialState::from(config)
                    .keep_secrets(prior.azure_credential_config.as_ref()),
            ),
            None => prior.azure_credential_config.clone(),
        },
        digitalocean_credential_config: match &credential.digitalocean_credential_config {
            Some(config) => Some(
                DigitaloceanCredentialState::from(config)
                    .keep_secrets(prior.digitalocean_credential_config.as_ref()),
            ),
            None => prior.digitalocean_credential_config.clone(),
        },
        openstack_credential_config: match &credential.openstack_credential_config {
            Some(config) => Some(
                OpenstackCredentialState::from(config)
                    .keep_secrets(prior.openstack_credential_config.as_ref()),
            ),
            None => prior.openstack_credential_config.clone(),
        },
        vsphere_credential_config: match &credential.vsphere_credential_config {
            Some(config) => Some(
                VsphereCredentialState::from(config)
                    .keep_secrets(prior.vsphere_credential_config.as_ref()),
            ),
            None => prior.vsphere_credential_config.clone(),
        },
        annotations: credential.annotations(),
        labels: credential.labels(),
    };
    state.driver = state.configured_driver();
    state
}

pub(crate) fn expand_cloud_credential(state: &CloudCredentialState) -> CloudCredential {
    CloudCredential {
        meta: ObjectMeta::new(&state.name, state.annotations.clone(), state.labels.clone()),
        description: state.description.clone(),
        amazonec2_credential_config: state.amazonec2_credential_config.as_ref().map(From::from),
        azure_credential_config: state.azure_credential_config.as_ref().map(From::from),
        digitalocean_credential_config: state
            .digitalocean_credential_config
            .as_ref()
            .map(From::from),
        openstack_credential_config: state.openstack_credential_config.as_ref().map(From::from),
        vsphere_credential_config: state.vsphere_credential_config.as_ref().map(From::from),
    }
}

pub struct CloudCredentialResource;

#[async_trait::async_trait]
impl Resource for CloudCredentialResource {
    type State = CloudCredentialState;

    const TYPE_NAME: &'static str = "rancher2_cloud_credential";

    fn requires_replace(
        &self,
        prior: &CloudCredentialState,
        planned: &CloudCredentialState,
    ) -> bool {
        prior.configured_driver() != planned.configured_driver()
    }

    async fn create(
        &self,
        meta: &Meta,
        planned: CloudCredentialState,
        _timeouts: &Timeouts,
    ) -> ProviderResult<CloudCredentialState> {
        info!("Creating cloud credential '{}'", planned.name);
        let created = meta
            .management::<CloudCredential>()
            .create(&expand_cloud_credential(&planned))
            .await
            .context(format!("Unable to create cloud credential '{}'", planned.name))?;
        let state = CloudCredentialState {
            id: created.id().to_string(),
            ..planned
        };
        read_back(self, meta, state).await
    }

    async fn read(
        &self,
        meta: &Meta,
        state: CloudCredentialState,
    ) -> ProviderResult<Option<CloudCredentialState>> {
        let credential = meta
            .management::<CloudCredential>()
            .by_id(&state.id)
            .await
            .allow_not_found(|_| ())
            .context(format!("Unable to get cloud credential '{}'", state.id))?;
        match credential {
            Some(credential) if !credential.is_removed() => {
                Ok(Some(flatten_cloud_credential(&credential, &state)))
            }
            _ => {
                info!("Cloud credential '{}' not found", state.id);
                Ok(None)
            }
        }
    }

    async fn update(
        &self,
        meta: &Meta,
        prior: CloudCredentialState,
        planned: CloudCredentialState,
        _timeouts: &Timeouts,
    ) -> ProviderResult<CloudCredentialState> {
        let credentials = meta.management::<CloudCredential>();
        let existing = credentials
            .by_id(&prior.id)
            .await
            .context(format!("Unable to get cloud credential '{}'", prior.id))?;

        info!("Updating cloud credential '{}'", prior.id);
        credentials
            .update(&existing, &expand_cloud_credential(&planned))
            .await
            .context(format!("Unable to update cloud credential '{}'", prior.id))?;
        let state = CloudCredentialState {
            id: prior.id.clone(),
            ..planned
        };
        read_back(self, meta, state).await
    }

    async fn delete(
        &self,
        meta: &Meta,
        state: CloudCredentialState,
        _timeouts: &Timeouts,
    ) -> ProviderResult<()> {
        let credentials = meta.management::<CloudCredential>();
        let existing = match credentials
            .by_id(&state.id)
            .await
            .allow_not_found(|_| ())
            .context(format!("Unable to get cloud credential '{}'", state.id))?
        {
            Some(credential) => credential,
            None => return Ok(()),
        };

        info!("Deleting cloud credential '{}'", state.id);
        credentials
            .delete(&existing)
            .await
            .allow_not_found(|_| ())
            .context(format!("Unable to delete cloud credential '{}'", state.id))?;
        Ok(())
    }

    async fn import(&self, meta: &Meta, id: &str) -> ProviderResult<Vec<CloudCredentialState>> {
        let state = CloudCredentialState {
            id: id.to_string(),
            ..Default::default()
        };
        import_by_id(self, meta, state).await
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::resources::test::test_meta;
    use httpmock::prelude::*;
    use serde_json::json;

    fn amazonec2_state() -> CloudCredentialState {
        CloudCredentialState {
            name: "cloudCredential-test".to_string(),
            description: Some("description".to_string()),
            amazonec2_credential_config: Some(Amazonec2CredentialState {
                access_key: Some("access_key".to_string()),
                secret_key: Some("secret_key".to_string()),
                default_region: Some("us-west-2".to_string()),
            }),
            ..Default::default()
        }
    }

    #[test]
    fn driver_is_computed() {
        let credential = expand_cloud_credential(&amazonec2_state());
        let state = flatten_cloud_credential(&credential, &CloudCredentialState::default());
        assert_eq!(state.driver, "amazonec2");
        assert_eq!(state.name, "cloudCredential-test");

        let vsphere = CloudCredentialState {
            vsphere_credential_config: Some(VsphereCredentialState {
                username: Some("admin".to_string()),
                vcenter: Some("vcenter.example.com".to_string()),
                ..Default::default()
            }),
            ..Default::default()
        };
        let state = flatten_cloud_credential(&expand_cloud_credential(&vsphere), &vsphere);
        assert_eq!(state.driver, "vmwarevsphere");
    }

    #[test]
    fn wire_names() {
        let value = serde_json::to_value(expand_cloud_credential(&amazonec2_state())).unwrap();
        assert_eq!(value["amazonec2credentialConfig"]["accessKey"], "access_key");
        assert_eq!(value["amazonec2credentialConfig"]["defaultRegion"], "us-west-2");
    }

    #[test]
    fn secrets_are_kept() {
        let mut credential = expand_cloud_credential(&amazonec2_state());
        if let Some(config) = credential.amazonec2_credential_config.as_mut() {
            config.secret_key = None;
        }
        let state = flatten_cloud_credential(&credential, &amazonec2_state());
        assert_eq!(
            state.amazonec2_credential_config.unwrap().secret_key.as_deref(),
            Some("secret_key")
        );
    }

    #[test]
    fn exactly_one_config() {
        let mut state = amazonec2_state();
        assert!(state.validate().is_ok());
        state.digitalocean_credential_config = Some(DigitaloceanCredentialState {
            access_token: Some("token".to_string()),
        });
        assert!(state.validate().is_err());
        state.amazonec2_credential_config = None;
        state.digitalocean_credential_config = None;
        assert!(state.validate().is_err());
    }

    #[test]
    fn replace_on_driver_change() {
        let prior = amazonec2_state();
        let mut planned = amazonec2_state();
        planned.description = None;
        assert!(!CloudCredentialResource.requires_replace(&prior, &planned));
        planned.amazonec2_credential_config = None;
        planned.azure_credential_config = Some(AzureCredentialState::default());
        assert!(CloudCredentialResource.requires_replace(&prior, &planned));
    }

    #[tokio::test]
    async fn create_and_read() {
        let server = MockServer::start_async().await;
        let meta = test_meta(&server);
        let create = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/v3/cloudcredentials")
                    .json_body_partial(
                        json!({
                            "name": "cloudCredential-test",
                            "amazonec2credentialConfig": {"secretKey": "secret_key"}
                        })
                        .to_string(),
                    );
                then.status(201).json_body(json!({
                    "id": "cattle-global-data:cc-abc",
                    "name": "cloudCredential-test"
                }));
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/v3/cloudcredentials/cattle-global-data:cc-abc");
                then.status(200).json_body(json!({
                    "id": "cattle-global-data:cc-abc",
                    "name": "cloudCredential-test",
                    "description": "description",
                    "amazonec2credentialConfig": {
                        "accessKey": "access_key",
                        "defaultRegion": "us-west-2"
                    }
                }));
            })
            .await;

        let state = CloudCredentialResource
            .create(&meta, amazonec2_state(), &Timeouts::default())
            .await
            .unwrap();
        create.assert_async().await;
        assert_eq!(state.id, "cattle-global-data:cc-abc");
        assert_eq!(state.driver, "amazonec2");
        assert_eq!(
            state.amazonec2_credential_config.unwrap().secret_key.as_deref(),
            Some("secret_key")
        );
    }
}
