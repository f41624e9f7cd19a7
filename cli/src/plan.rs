use crate::Workspace;
use anyhow::{Context, Result};
use clap::Parser;
use provider::manager::{Action, Plan as ManagerPlan};
use std::path::PathBuf;
use tabled::{Style, Table, Tabled};

/// Show what applying a manifest would change. Nothing is changed on the server.
#[derive(Debug, Parser)]
pub(crate) struct Plan {
    /// Path to the manifest.
    #[clap(long = "file", short = 'f', parse(from_os_str))]
    path: PathBuf,

    /// Output the plan in JSON format.
    #[clap(long = "json")]
    json: bool,
}

impl Plan {
    pub(crate) async fn run(self, workspace: &Workspace) -> Result<()> {
        let manifest = crate::manifest(&self.path)?;
        let manager = workspace.manager(Some(&manifest)).await?;
        let plan = manager
            .plan(&manifest)
            .await
            .context("Unable to plan changes")?;

        if self.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&plan).context("Could not create string from plan.")?
            );
        } else {
            print_changes(&plan);
            println!(
                "Plan: {} to create, {} to update, {} to replace, {} to delete.",
                plan.count(Action::Create),
                plan.count(Action::Update),
                plan.count(Action::Replace),
                plan.count(Action::Delete)
            );
        }
        Ok(())
    }
}

#[derive(Tabled)]
struct ChangeRow {
    #[tabled(rename = "ADDRESS")]
    address: String,
    #[tabled(rename = "ACTION")]
    action: String,
}

/// Print a table of the changes in `plan`, leaving out resources that stay as they are.
pub(crate) fn print_changes(plan: &ManagerPlan) {
    if !plan.has_changes() {
        println!("No changes.");
        return;
    }
    let rows = plan
        .changes
        .iter()
        .filter(|change| change.action != Action::NoOp)
        .map(|change| ChangeRow {
            address: change.address.clone(),
            action: if change.deferred {
                format!("{} (pending references)", change.action)
            } else {
                change.action.to_string()
            },
        });
    println!("{}", Table::new(rows).with(Style::blank()));
}
