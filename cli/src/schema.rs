use anyhow::{Context, Result};
use clap::Parser;
use provider::resources::Registry;

/// Print the JSON schema of the attributes of a resource or data source type.
#[derive(Debug, Parser)]
pub(crate) struct Schema {
    /// The type name, e.g. `rancher2_namespace`.
    type_name: String,

    /// Look the name up among the data sources.
    #[clap(long = "data")]
    data: bool,
}

impl Schema {
    pub(crate) fn run(self) -> Result<()> {
        let registry = Registry::new();
        let schema = if self.data {
            registry.data_source(&self.type_name)?.schema()
        } else {
            registry.resource(&self.type_name)?.schema()
        };
        println!(
            "{}",
            serde_json::to_string_pretty(&schema).context("Could not create string from schema.")?
        );
        Ok(())
    }
}

/// List the resource and data source types.
#[derive(Debug, Parser)]
pub(crate) struct Types {}

impl Types {
    pub(crate) fn run(self) -> Result<()> {
        let registry = Registry::new();
        for type_name in registry.resource_types() {
            println!("resource {}", type_name);
        }
        for type_name in registry.data_source_types() {
            println!("data     {}", type_name);
        }
        Ok(())
    }
}
