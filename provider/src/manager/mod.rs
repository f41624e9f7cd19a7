/*!

The `Manager` reconciles a manifest of desired resources with the objects on a Rancher server.
It keeps a JSON state file of everything it created or imported and uses the resource
implementations from [`crate::resources`] for every change.

!*/

pub use apply::RefreshOutcome;
pub use error::{Error, Result};
pub use manifest::{address, convert_manifest, read_manifest, DataBlock, Manifest, ResourceBlock};
pub use plan::{Action, Plan, PlannedChange};
pub use state::{ResourceRecord, StateFile, STATE_VERSION};

use crate::meta::Meta;
use crate::resource::DynamicResource;
use crate::resources::Registry;
use snafu::ResultExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

mod apply;
mod error;
mod manifest;
mod order;
mod plan;
mod state;
mod templates;

pub struct Manager {
    meta: Meta,
    registry: Registry,
    state_path: PathBuf,
}

impl Manager {
    pub fn new<P: Into<PathBuf>>(meta: Meta, state_path: P) -> Self {
        Self {
            meta,
            registry: Registry::new(),
            state_path: state_path.into(),
        }
    }

    pub fn meta(&self) -> &Meta {
        &self.meta
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn state_path(&self) -> &Path {
        &self.state_path
    }

    pub fn load_state(&self) -> Result<StateFile> {
        StateFile::load(&self.state_path)
    }

    fn resource(&self, type_name: &str) -> Result<Arc<dyn DynamicResource>> {
        self.registry
            .resource(type_name)
            .context(error::ProviderSnafu {
                action: "find resource type",
                address: type_name,
            })
    }
}
