use super::{import_by_id, read_back};
use crate::error::{IntoProviderError, ProviderError, ProviderResult};
use crate::meta::Meta;
use crate::resource::{Resource, ResourceState, Timeouts};
use log::info;
use model::clients::{AllowNotFound, CrudClient};
use model::types::{
    Amazonec2Config, AzureConfig, DigitaloceanConfig, NodeTemplate, OpenstackConfig,
    VsphereConfig,
};
use model::{ApiObject, Configuration, ObjectMeta};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

const AMAZONEC2_DRIVER: &str = "amazonec2";
const AZURE_DRIVER: &str = "azure";
const DIGITALOCEAN_DRIVER: &str = "digitalocean";
const OPENSTACK_DRIVER: &str = "openstack";
const VSPHERE_DRIVER: &str = "vmwarevsphere";

mirrored_block! {
    pub struct Amazonec2ConfigState => Amazonec2Config {
        access_key: String,
        secret_key: String,
        ami: String,
        block_duration_minutes: String,
        device_name: String,
        endpoint: String,
        iam_instance_profile: String,
        insecure_transport: bool,
        instance_type: String,
        keypair_name: String,
        monitoring: bool,
        open_port: Vec<String>,
        private_address_only: bool,
        region: String,
        request_spot_instance: bool,
        retries: String,
        root_size: String,
        security_group: Vec<String>,
        security_group_readonly: bool,
        session_token: String,
        spot_price: String,
        ssh_keypath: String,
        ssh_user: String,
        subnet_id: String,
        tags: String,
        use_ebs_optimized_instance: bool,
        use_private_address: bool,
        userdata: String,
        volume_type: String,
        vpc_id: String,
        zone: String,
    }
    secrets [access_key, secret_key, session_token]
}

mirrored_block! {
    pub struct AzureConfigState => AzureConfig {
        availability_set: String,
        client_id: String,
        client_secret: String,
        custom_data: String,
        disk_size: String,
        dns: String,
        docker_port: String,
        environment: String,
        fault_domain_count: String,
        image: String,
        location: String,
        managed_disks: bool,
        no_public_ip: bool,
        open_port: Vec<String>,
        private_ip_address: String,
        resource_group: String,
        size: String,
        ssh_user: String,
        static_public_ip: bool,
        storage_type: String,
        subnet: String,
        subnet_prefix: String,
        subscription_id: String,
        update_domain_count: String,
        use_private_ip: bool,
        vnet: String,
    }
    secrets [client_id, client_secret, subscription_id]
}

mirrored_block! {
    pub struct DigitaloceanConfigState => DigitaloceanConfig {
        access_token: String,
        backups: bool,
        image: String,
        ipv6: bool,
        monitoring: bool,
        private_networking: bool,
        region: String,
        size: String,
        ssh_key_fingerprint: String,
        ssh_key_path: String,
        ssh_port: String,
        ssh_user: String,
        tags: String,
        userdata: String,
    }
    secrets [access_token]
}

mirrored_block! {
    pub struct OpenstackConfigState => OpenstackConfig {
        active_timeout: String,
        auth_url: String,
        availability_zone: String,
        cacert: String,
        config_drive: bool,
        domain_id: String,
        domain_name: String,
        endpoint_type: String,
        flavor_id: String,
        flavor_name: String,
        floating_ip_pool: String,
        image_id: String,
        image_name: String,
        insecure: bool,
        ip_version: String,
        keypair_name: String,
        net_id: String,
        net_name: String,
        nova_network: bool,
        password: String,
        private_key_file: String,
        region: String,
        sec_groups: String,
        ssh_port: String,
        ssh_user: String,
        tenant_id: String,
        tenant_name: String,
        user_data_file: String,
        username: String,
    }
    secrets [password]
}

mirrored_block! {
    pub struct VsphereConfigState => VsphereConfig {
        boot2docker_url: String,
        cfgparam: Vec<String>,
        clone_from: String,
        cloud_config: String,
        cloudinit: String,
        content_library: String,
        cpu_count: String,
        creation_type: String,
        custom_attributes: Vec<String>,
        datacenter: String,
        datastore: String,
        datastore_cluster: String,
        disk_size: String,
        folder: String,
        hostsystem: String,
        memory_size: String,
        network: Vec<String>,
        password: String,
        pool: String,
        ssh_password: String,
        ssh_port: String,
        ssh_user: String,
        ssh_user_group: String,
        tags: Vec<String>,
        username: String,
        vapp_ip_allocation_policy: String,
        vapp_ip_protocol: String,
        vapp_property: Vec<String>,
        vapp_transport: String,
        vcenter: String,
        vcenter_port: String,
    }
    secrets [password, ssh_password]
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct NodeTemplateState {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    /// Computed from the configured driver block.
    #[serde(default)]
    pub driver: String,
    #[serde(default)]
    pub cloud_credential_id: Option<String>,
    #[serde(default)]
    pub auth_certificate_authority: Option<String>,
    #[serde(default)]
    pub auth_key: Option<String>,
    #[serde(default)]
    pub docker_version: Option<String>,
    #[serde(default)]
    pub engine_env: BTreeMap<String, String>,
    #[serde(default)]
    pub engine_insecure_registry: Vec<String>,
    #[serde(default)]
    pub engine_install_url: Option<String>,
    #[serde(default)]
    pub engine_label: BTreeMap<String, String>,
    #[serde(default)]
    pub engine_opt: BTreeMap<String, String>,
    #[serde(default)]
    pub engine_registry_mirror: Vec<String>,
    #[serde(default)]
    pub engine_storage_driver: Option<String>,
    #[serde(default = "default_use_internal_ip_address")]
    pub use_internal_ip_address: bool,
    #[serde(default)]
    pub amazonec2_config: Option<Amazonec2ConfigState>,
    #[serde(default)]
    pub azure_config: Option<AzureConfigState>,
    #[serde(default)]
    pub digitalocean_config: Option<DigitaloceanConfigState>,
    #[serde(default)]
    pub openstack_config: Option<OpenstackConfigState>,
    #[serde(default)]
    pub vsphere_config: Option<VsphereConfigState>,
    #[serde(default)]
    pub annotations: BTreeMap<String, String>,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
}

fn default_use_internal_ip_address() -> bool {
    true
}

impl Default for NodeTemplateState {
    fn default() -> Self {
        Self {
            id: String::new(),
            name: String::new(),
            description: None,
            driver: String::new(),
            cloud_credential_id: None,
            auth_certificate_authority: None,
            auth_key: None,
            docker_version: None,
            engine_env: BTreeMap::new(),
            engine_insecure_registry: Vec::new(),
            engine_install_url: None,
            engine_label: BTreeMap::new(),
            engine_opt: BTreeMap::new(),
            engine_registry_mirror: Vec::new(),
            engine_storage_driver: None,
            use_internal_ip_address: default_use_internal_ip_address(),
            amazonec2_config: None,
            azure_config: None,
            digitalocean_config: None,
            openstack_config: None,
            vsphere_config: None,
            annotations: BTreeMap::new(),
            labels: BTreeMap::new(),
        }
    }
}

impl NodeTemplateState {
    fn drivers(&self) -> Vec<&'static str> {
        [
            (self.amazonec2_config.is_some(), AMAZONEC2_DRIVER),
            (self.azure_config.is_some(), AZURE_DRIVER),
            (self.digitalocean_config.is_some(), DIGITALOCEAN_DRIVER),
            (self.openstack_config.is_some(), OPENSTACK_DRIVER),
            (self.vsphere_config.is_some(), VSPHERE_DRIVER),
        ]
        .iter()
        .filter(|(set, _)| *set)
        .map(|(_, driver)| *driver)
        .collect()
    }
}

impl Configuration for NodeTemplateState {}

impl ResourceState for NodeTemplateState {
    fn id(&self) -> &str {
        &self.id
    }

    fn validate(&self) -> ProviderResult<()> {
        if self.drivers().len() != 1 {
            return Err(ProviderError::new_with_context(
                "Exactly one of amazonec2_config, azure_config, digitalocean_config, \
                 openstack_config or vsphere_config is required",
            ));
        }
        Ok(())
    }
}

/// Fails when the server reports a driver without its config block, or a driver this provider
/// has no config block for.
pub(crate) fn flatten_node_template(
    template: &NodeTemplate,
    prior: &NodeTemplateState,
) -> ProviderResult<NodeTemplateState> {
    let driver = template.driver.clone().unwrap_or_default();
    let present = match driver.as_str() {
        AMAZONEC2_DRIVER => template.amazonec2_config.is_some(),
        AZURE_DRIVER => template.azure_config.is_some(),
        DIGITALOCEAN_DRIVER => template.digitalocean_config.is_some(),
        OPENSTACK_DRIVER => template.openstack_config.is_some(),
        VSPHERE_DRIVER => template.vmwarevsphere_config.is_some(),
        _ => {
            return Err(ProviderError::new_with_context(format!(
                "Node template driver '{}' is not supported",
                driver
            )))
        }
    };
    if !present {
        return Err(ProviderError::new_with_context(format!(
            "Node template driver '{}' requires its config block",
            driver
        )));
    }

    Ok(NodeTemplateState {
        id: template.id().to_string(),
        name: template.name().to_string(),
        description: template.description.clone(),
        driver,
        cloud_credential_id: template.cloud_credential_id.clone(),
        auth_certificate_authority: template.auth_certificate_authority.clone(),
        auth_key: template.auth_key.clone(),
        docker_version: template.docker_version.clone(),
        engine_env: template.engine_env.clone().unwrap_or_default(),
        engine_insecure_registry: template.engine_insecure_registry.clone().unwrap_or_default(),
        engine_install_url: template.engine_install_url.clone(),
        engine_label: template.engine_label.clone().unwrap_or_default(),
        engine_opt: template.engine_opt.clone().unwrap_or_default(),
        engine_registry_mirror: template.engine_registry_mirror.clone().unwrap_or_default(),
        engine_storage_driver: template.engine_storage_driver.clone(),
        use_internal_ip_address: template
            .use_internal_ip_address
            .unwrap_or_else(default_use_internal_ip_address),
        amazonec2_config: template.amazonec2_config.as_ref().map(|config| {
            Amazonec2ConfigState::from(config).keep_secrets(prior.amazonec2_config.as_ref())
        }),
        azure_config: template
            .azure_config
            .as_ref()
            .map(|config| AzureConfigState::from(config).keep_secrets(prior.azure_config.as_ref())),
        digitalocean_config: template.digitalocean_config.as_ref().map(|config| {
            DigitaloceanConfigState::from(config).keep_secrets(prior.digitalocean_config.as_ref())
        }),
        openstack_config: template.openstack_config.as_ref().map(|config| {
            OpenstackConfigState::from(config).keep_secrets(prior.openstack_config.as_ref())
        }),
        vsphere_config: template.vmwarevsphere_config.as_ref().map(|config| {
            VsphereConfigState::from(config).keep_secrets(prior.vsphere_config.as_ref())
        }),
        annotations: template.annotations(),
        labels: template.labels(),
    })
}

fn some_if_not_empty<T>(value: &[T]) -> Option<Vec<T>>
where
    T: Clone,
{
    if value.is_empty() {
        None
    } else {
        Some(value.to_vec())
    }
}

fn some_map_if_not_empty(value: &BTreeMap<String, String>) -> Option<BTreeMap<String, String>> {
    if value.is_empty() {
        None
    } else {
        Some(value.clone())
    }
}

pub(crate) fn expand_node_template(state: &NodeTemplateState) -> NodeTemplate {
    NodeTemplate {
        meta: ObjectMeta::new(&state.name, state.annotations.clone(), state.labels.clone()),
        description: state.description.clone(),
        driver: state.drivers().first().map(|driver| driver.to_string()),
        cloud_credential_id: state.cloud_credential_id.clone(),
        auth_certificate_authority: state.auth_certificate_authority.clone(),
        auth_key: state.auth_key.clone(),
        docker_version: state.docker_version.clone(),
        engine_env: some_map_if_not_empty(&state.engine_env),
        engine_insecure_registry: some_if_not_empty(&state.engine_insecure_registry),
        engine_install_url: state.engine_install_url.clone(),
        engine_label: some_map_if_not_empty(&state.engine_label),
        engine_opt: some_map_if_not_empty(&state.engine_opt),
        engine_registry_mirror: some_if_not_empty(&state.engine_registry_mirror),
        engine_storage_driver: state.engine_storage_driver.clone(),
        use_internal_ip_address: Some(state.use_internal_ip_address),
        amazonec2_config: state.amazonec2_config.as_ref().map(From::from),
        azure_config: state.azure_config.as_ref().map(From::from),
        digitalocean_config: state.digitalocean_config.as_ref().map(From::from),
        openstack_config: state.openstack_config.as_ref().map(From::from),
        vmwarevsphere_config: state.vsphere_config.as_ref().map(From::from),
    }
}

pub struct NodeTemplateResource;

#[async_trait::async_trait]
impl Resource for NodeTemplateResource {
    type State = NodeTemplateState;

    const TYPE_NAME: &'static str = "rancher2_node_template";

    async fn create(
        &self,
        meta: &Meta,
        planned: NodeTemplateState,
        timeouts: &Timeouts,
    ) -> ProviderResult<NodeTemplateState> {
        info!("Creating node template '{}'", planned.name);
        let templates = meta.management::<NodeTemplate>();
        let created = templates
            .create(&expand_node_template(&planned))
            .await
            .context(format!("Unable to create node template '{}'", planned.name))?;

        meta.state_change(
            format!("node template '{}'", created.id()),
            &[],
            &["active"],
            timeouts.create,
        )
        .wait_for_state(|| templates.state_refresh(created.id()))
        .await
        .context(format!(
            "Error waiting for node template '{}' to be created",
            created.id()
        ))?;

        let state = NodeTemplateState {
            id: created.id().to_string(),
            ..planned
        };
        read_back(self, meta, state).await
    }

    async fn read(
        &self,
        meta: &Meta,
        state: NodeTemplateState,
    ) -> ProviderResult<Option<NodeTemplateState>> {
        let template = meta
            .management::<NodeTemplate>()
            .by_id(&state.id)
            .await
            .allow_not_found(|_| ())
            .context(format!("Unable to get node template '{}'", state.id))?;
        match template {
            Some(template) if !template.is_removed() => {
                Ok(Some(flatten_node_template(&template, &state)?))
            }
            _ => {
                info!("Node template '{}' not found", state.id);
                Ok(None)
            }
        }
    }

    async fn update(
        &self,
        meta: &Meta,
        prior: NodeTemplateState,
        planned: NodeTemplateState,
        _timeouts: &Timeouts,
    ) -> ProviderResult<NodeTemplateState> {
        let templates = meta.management::<NodeTemplate>();
        let existing = templates
            .by_id(&prior.id)
            .await
            .context(format!("Unable to get node template '{}'", prior.id))?;

        info!("Updating node template '{}'", prior.id);
        templates
            .update(&existing, &expand_node_template(&planned))
            .await
            .context(format!("Unable to update node template '{}'", prior.id))?;
        let state = NodeTemplateState {
            id: prior.id.clone(),
            ..planned
        };
        read_back(self, meta, state).await
    }

    async fn delete(
        &self,
        meta: &Meta,
        state: NodeTemplateState,
        timeouts: &Timeouts,
    ) -> ProviderResult<()> {
        let templates = meta.management::<NodeTemplate>();
        let existing = match templates
            .by_id(&state.id)
            .await
            .allow_not_found(|_| ())
            .context(format!("Unable to get node template '{}'", state.id))?
        {
            Some(template) => template,
            None => return Ok(()),
        };

        info!("Deleting node template '{}'", state.id);
        templates
            .delete(&existing)
            .await
            .allow_not_found(|_| ())
            .context(format!("Unable to delete node template '{}'", state.id))?;

        meta.state_change(
            format!("node template '{}'", state.id),
            &[],
            &["removed"],
            timeouts.delete,
        )
        .wait_for_state(|| templates.state_refresh(&state.id))
        .await
        .context(format!(
            "Error waiting for node template '{}' to be removed",
            state.id
        ))?;
        Ok(())
    }

    async fn import(&self, meta: &Meta, id: &str) -> ProviderResult<Vec<NodeTemplateState>> {
        let state = NodeTemplateState {
            id: id.to_string(),
            ..Default::default()
        };
        import_by_id(self, meta, state).await
    }
}
