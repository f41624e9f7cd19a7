/*!

This is the command line interface for managing Rancher objects declared in a manifest.

!*/

mod apply;
mod destroy;
mod import;
mod plan;
mod provider_args;
mod refresh;
mod schema;
mod state;

use anyhow::{Context, Result};
use clap::Parser;
use env_logger::Builder;
use log::LevelFilter;
use provider::manager::{read_manifest, Manager, Manifest};
use provider::meta::Meta;
use provider_args::ProviderArgs;
use std::path::{Path, PathBuf};

/// Plan and apply Rancher clusters, projects, namespaces and the rest of the rancher2 resources.
#[derive(Debug, Parser)]
#[clap(author, version, about)]
struct Args {
    /// Set logging verbosity [trace|debug|info|warn|error]. If the environment variable `RUST_LOG`
    /// is present, it overrides the default logging behavior. See https://docs.rs/env_logger/latest
    #[clap(long = "log-level", default_value = "info")]
    log_level: LevelFilter,
    /// Path to the state file.
    #[clap(long = "state", default_value = "rancher2.state.json", global = true)]
    state: PathBuf,
    #[clap(flatten)]
    provider: ProviderArgs,
    #[clap(subcommand)]
    command: Command,
}

#[derive(Debug, Parser)]
enum Command {
    /// Show what applying a manifest would change.
    Plan(plan::Plan),
    /// Make the server match a manifest.
    Apply(apply::Apply),
    /// Delete everything in the state.
    Destroy(destroy::Destroy),
    /// Update the state from the server.
    Refresh(refresh::Refresh),
    /// Bring an existing object under management.
    Import(import::Import),
    /// Inspect or edit the state file.
    #[clap(subcommand)]
    State(state::State),
    /// Print the JSON schema of a resource or data source type.
    Schema(schema::Schema),
    /// List the resource and data source types.
    Types(schema::Types),
}

#[tokio::main]
async fn main() {
    let args = Args::parse();
    init_logger(args.log_level);
    if let Err(e) = run(args).await {
        eprintln!("{:#}", e);
        std::process::exit(1);
    }
}

async fn run(args: Args) -> Result<()> {
    let workspace = Workspace {
        provider: args.provider,
        state: args.state,
    };
    match args.command {
        Command::Plan(plan) => plan.run(&workspace).await,
        Command::Apply(apply) => apply.run(&workspace).await,
        Command::Destroy(destroy) => destroy.run(&workspace).await,
        Command::Refresh(refresh) => refresh.run(&workspace).await,
        Command::Import(import) => import.run(&workspace).await,
        Command::State(state) => state.run(&workspace),
        Command::Schema(schema) => schema.run(),
        Command::Types(types) => types.run(),
    }
}

/// The global options every subcommand may need.
pub(crate) struct Workspace {
    provider: ProviderArgs,
    state: PathBuf,
}

impl Workspace {
    pub(crate) fn state_path(&self) -> &Path {
        &self.state
    }

    /// Connect to the server described by the command line, falling back to the manifest's
    /// `provider` block.
    pub(crate) async fn manager(&self, manifest: Option<&Manifest>) -> Result<Manager> {
        let fallback = manifest
            .and_then(|manifest| manifest.provider.clone())
            .unwrap_or_default();
        let config = self.provider.to_config().or(fallback);
        let meta = Meta::configure(config)
            .await
            .context("Unable to configure the rancher2 provider")?;
        Ok(Manager::new(meta, &self.state))
    }
}

pub(crate) fn manifest(path: &Path) -> Result<Manifest> {
    read_manifest(path).context(format!("Unable to load manifest '{}'", path.display()))
}

/// Initialize the logger with the value passed by `--log-level` (or its default) when the
/// `RUST_LOG` environment variable is not present. If present, the `RUST_LOG` environment variable
/// overrides `--log-level`/`level`.
fn init_logger(level: LevelFilter) {
    match std::env::var(env_logger::DEFAULT_FILTER_ENV).ok() {
        Some(_) => {
            // RUST_LOG exists; env_logger will use it.
            Builder::from_default_env().init();
        }
        None => {
            // RUST_LOG does not exist; use default log level for this crate and the provider.
            Builder::new()
                .filter(Some(env!("CARGO_CRATE_NAME")), level)
                .filter(Some("rancher2_provider"), level)
                .filter(Some("rancher2_model"), level)
                .init();
        }
    }
}
