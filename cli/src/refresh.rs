use crate::Workspace;
use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tabled::{Style, Table, Tabled};

/// Read every object in the state from the server and record what changed.
#[derive(Debug, Parser)]
pub(crate) struct Refresh {
    /// Path to the manifest, used for provider settings.
    #[clap(long = "file", short = 'f', parse(from_os_str))]
    path: Option<PathBuf>,
}

#[derive(Tabled)]
struct RefreshRow {
    #[tabled(rename = "ADDRESS")]
    address: String,
    #[tabled(rename = "RESULT")]
    outcome: String,
}

impl Refresh {
    pub(crate) async fn run(self, workspace: &Workspace) -> Result<()> {
        let manifest = self.path.as_deref().map(crate::manifest).transpose()?;
        let manager = workspace.manager(manifest.as_ref()).await?;
        let outcomes = manager
            .refresh()
            .await
            .context("Unable to refresh the state")?;
        let rows = outcomes.into_iter().map(|(address, outcome)| RefreshRow {
            address,
            outcome: outcome.to_string(),
        });
        println!("{}", Table::new(rows).with(Style::blank()));
        Ok(())
    }
}
