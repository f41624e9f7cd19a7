use crate::Workspace;
use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;

/// Delete every object in the state.
#[derive(Debug, Parser)]
pub(crate) struct Destroy {
    /// Path to the manifest, used for provider settings and timeouts.
    #[clap(long = "file", short = 'f', parse(from_os_str))]
    path: Option<PathBuf>,
}

impl Destroy {
    pub(crate) async fn run(self, workspace: &Workspace) -> Result<()> {
        let manifest = self.path.as_deref().map(crate::manifest).transpose()?;
        let manager = workspace.manager(manifest.as_ref()).await?;
        let destroyed = manager
            .destroy(manifest.as_ref())
            .await
            .context("Unable to destroy resources")?;
        for address in &destroyed {
            println!("Destroyed '{}'", address);
        }
        println!("Destroy complete: {} deleted.", destroyed.len());
        Ok(())
    }
}
