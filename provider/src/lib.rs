/*!

The rancher2 provider: typed resources and data sources for the Rancher v3 management API, and a
[`manager::Manager`] that plans and applies manifests of them against a server.

```no_run
# async fn run() -> Result<(), Box<dyn std::error::Error>> {
use rancher2_provider::config::ProviderConfig;
use rancher2_provider::manager::{read_manifest, Manager};
use rancher2_provider::meta::Meta;
use std::path::Path;

let manifest = read_manifest(Path::new("rancher2.yaml"))?;
let config = ProviderConfig::default().or(manifest.provider.clone().unwrap_or_default());
let manager = Manager::new(Meta::configure(config).await?, "rancher2.state.json");
let plan = manager.apply(&manifest).await?;
println!("{} changes", plan.changes.len());
# Ok(())
# }
```

!*/

#![deny(
    clippy::expect_used,
    clippy::get_unwrap,
    clippy::panic,
    clippy::panic_in_result_fn,
    clippy::panicking_unwrap,
    clippy::unwrap_in_result,
    clippy::unwrap_used
)]

pub mod config;
pub mod error;
pub mod manager;
pub mod meta;
pub mod resource;
pub mod resources;

pub use error::{ProviderError, ProviderResult};
