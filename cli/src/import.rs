use crate::Workspace;
use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;

/// Bring an existing object under management.
#[derive(Debug, Parser)]
pub(crate) struct Import {
    /// Path to the manifest, used for provider settings and dependencies.
    #[clap(long = "file", short = 'f', parse(from_os_str))]
    path: Option<PathBuf>,

    /// The address to store the object under, e.g. `rancher2_project.web`.
    address: String,

    /// The import id of the object. Its format depends on the resource type.
    id: String,
}

impl Import {
    pub(crate) async fn run(self, workspace: &Workspace) -> Result<()> {
        let manifest = self.path.as_deref().map(crate::manifest).transpose()?;
        let manager = workspace.manager(manifest.as_ref()).await?;
        let record = manager
            .import(manifest.as_ref(), &self.address, &self.id)
            .await
            .context(format!("Unable to import '{}'", self.address))?;
        println!("Imported '{}' with id '{}'", self.address, record.id);
        Ok(())
    }
}
