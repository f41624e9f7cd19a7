use crate::Workspace;
use anyhow::{Context, Result};
use clap::Parser;
use provider::manager::StateFile;
use tabled::{Style, Table, Tabled};

/// Inspect or edit the state file. None of these talk to the server.
#[derive(Debug, Parser)]
pub(crate) enum State {
    /// List the managed resources.
    List,
    /// Print the stored attributes of a resource.
    Show {
        /// The resource address, e.g. `rancher2_project.web`.
        address: String,
    },
    /// Forget a resource without deleting the object.
    Rm {
        /// The resource address, e.g. `rancher2_project.web`.
        address: String,
    },
}

#[derive(Tabled)]
struct StateRow {
    #[tabled(rename = "ADDRESS")]
    address: String,
    #[tabled(rename = "TYPE")]
    resource_type: String,
    #[tabled(rename = "ID")]
    id: String,
}

impl State {
    pub(crate) fn run(self, workspace: &Workspace) -> Result<()> {
        let path = workspace.state_path();
        let mut state = StateFile::load(path)
            .context(format!("Unable to load state '{}'", path.display()))?;
        match self {
            State::List => {
                let rows = state.resources.iter().map(|(address, record)| StateRow {
                    address: address.clone(),
                    resource_type: record.resource_type.clone(),
                    id: record.id.clone(),
                });
                println!("{}", Table::new(rows).with(Style::blank()));
            }
            State::Show { address } => {
                let record = state
                    .get(&address)
                    .context(format!("'{}' is not in the state", address))?;
                println!(
                    "{}",
                    serde_json::to_string_pretty(record)
                        .context("Could not create string from state.")?
                );
            }
            State::Rm { address } => {
                state
                    .remove(&address)
                    .context(format!("'{}' is not in the state", address))?;
                state
                    .save(path)
                    .context(format!("Unable to save state '{}'", path.display()))?;
                println!("Removed '{}' from the state", address);
            }
        }
        Ok(())
    }
}
