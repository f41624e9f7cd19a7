use crate::plan::print_changes;
use crate::Workspace;
use anyhow::{Context, Result};
use clap::Parser;
use provider::manager::Action;
use std::path::PathBuf;

/// Create, update and delete objects until the server matches a manifest.
#[derive(Debug, Parser)]
pub(crate) struct Apply {
    /// Path to the manifest.
    #[clap(long = "file", short = 'f', parse(from_os_str))]
    path: PathBuf,
}

impl Apply {
    pub(crate) async fn run(self, workspace: &Workspace) -> Result<()> {
        let manifest = crate::manifest(&self.path)?;
        let manager = workspace.manager(Some(&manifest)).await?;
        let applied = manager
            .apply(&manifest)
            .await
            .context("Unable to apply the manifest")?;

        print_changes(&applied);
        println!(
            "Apply complete: {} created, {} updated, {} replaced, {} deleted.",
            applied.count(Action::Create),
            applied.count(Action::Update),
            applied.count(Action::Replace),
            applied.count(Action::Delete)
        );
        Ok(())
    }
}
