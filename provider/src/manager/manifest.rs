use super::error::{self, Result};
use crate::config::ProviderConfig;
use crate::resource::TimeoutOverrides;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use snafu::{ensure, ResultExt};
use std::collections::BTreeSet;
use std::path::Path;

/// The desired resources and the data sources they read, as written by the user.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Manifest {
    /// Provider settings, used where the command line and environment leave them unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<ProviderConfig>,
    #[serde(default)]
    pub resources: Vec<ResourceBlock>,
    #[serde(default)]
    pub data: Vec<DataBlock>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ResourceBlock {
    #[serde(rename = "type")]
    pub resource_type: String,
    pub name: String,
    #[serde(default = "empty_config")]
    pub config: Value,
    /// Addresses that must be created before and destroyed after this resource.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub depends_on: Vec<String>,
    #[serde(default)]
    pub timeouts: TimeoutOverrides,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DataBlock {
    #[serde(rename = "type")]
    pub data_type: String,
    pub name: String,
    #[serde(default = "empty_config")]
    pub config: Value,
}

fn empty_config() -> Value {
    Value::Object(Map::new())
}

/// The `type.name` address of a resource or data source.
pub fn address(type_name: &str, name: &str) -> String {
    format!("{}.{}", type_name, name)
}

impl ResourceBlock {
    pub fn address(&self) -> String {
        address(&self.resource_type, &self.name)
    }
}

impl DataBlock {
    pub fn address(&self) -> String {
        address(&self.data_type, &self.name)
    }
}

/// Read and check the YAML manifest at `path`.
pub fn read_manifest(path: &Path) -> Result<Manifest> {
    let manifest_string = std::fs::read_to_string(path).context(error::FileSnafu { path })?;
    convert_manifest(&manifest_string)
}

/// Parse and check a YAML manifest.
pub fn convert_manifest(manifest_string: &str) -> Result<Manifest> {
    let manifest: Manifest =
        serde_yaml::from_str(manifest_string).context(error::SerdeYamlSnafu {
            action: "deserialize manifest",
        })?;
    manifest.validate()?;
    Ok(manifest)
}

impl Manifest {
    /// Every address is unique and every `config` is a mapping.
    pub fn validate(&self) -> Result<()> {
        let mut seen = BTreeSet::new();
        let addresses = self
            .resources
            .iter()
            .map(|block| (block.address(), &block.config))
            .chain(self.data.iter().map(|block| (block.address(), &block.config)));
        for (address, config) in addresses {
            ensure!(
                config.is_object(),
                error::TemplateSnafu {
                    address: &address,
                    what: "config must be a mapping",
                }
            );
            ensure!(
                seen.insert(address.clone()),
                error::DuplicateAddressSnafu { address }
            );
        }
        Ok(())
    }

    pub fn resource(&self, address: &str) -> Option<&ResourceBlock> {
        self.resources
            .iter()
            .find(|block| block.address() == address)
    }

    pub fn data_source(&self, address: &str) -> Option<&DataBlock> {
        self.data.iter().find(|block| block.address() == address)
    }
}
