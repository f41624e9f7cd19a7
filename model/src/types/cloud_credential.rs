use crate::{impl_api_object, ObjectMeta};
use serde::{Deserialize, Serialize};

/// Driver credentials referenced by node templates. Secret fields are write only.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CloudCredential {
    #[serde(flatten)]
    pub meta: ObjectMeta,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(
        rename = "amazonec2credentialConfig",
        skip_serializing_if = "Option::is_none"
    )]
    pub amazonec2_credential_config: Option<Amazonec2CredentialConfig>,
    #[serde(rename = "azurecredentialConfig", skip_serializing_if = "Option::is_none")]
    pub azure_credential_config: Option<AzureCredentialConfig>,
    #[serde(
        rename = "digitaloceancredentialConfig",
        skip_serializing_if = "Option::is_none"
    )]
    pub digitalocean_credential_config: Option<DigitaloceanCredentialConfig>,
    #[serde(
        rename = "openstackcredentialConfig",
        skip_serializing_if = "Option::is_none"
    )]
    pub openstack_credential_config: Option<OpenstackCredentialConfig>,
    #[serde(
        rename = "vmwarevspherecredentialConfig",
        skip_serializing_if = "Option::is_none"
    )]
    pub vsphere_credential_config: Option<VsphereCredentialConfig>,
}

impl_api_object!(CloudCredential, "cloudcredentials");

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Amazonec2CredentialConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub access_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secret_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_region: Option<String>,
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AzureCredentialConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_secret: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subscription_id: Option<String>,
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DigitaloceanCredentialConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenstackCredentialConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VsphereCredentialConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vcenter: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vcenter_port: Option<String>,
}
