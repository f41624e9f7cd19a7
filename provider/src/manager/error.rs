use crate::error::ProviderError;
use snafu::Snafu;
use std::path::PathBuf;

pub type Result<T> = std::result::Result<T, Error>;

/// The error type for `Manager`
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(super)))]
pub enum Error {
    #[snafu(display("Resource '{}' is declared more than once", address))]
    DuplicateAddress { address: String },

    #[snafu(display("Dependency cycle between {}", addresses.join(", ")))]
    DependencyCycle { addresses: Vec<String> },

    #[snafu(display("Unable to read file '{}': {}", path.display(), source))]
    File {
        path: PathBuf,
        source: std::io::Error,
    },

    #[snafu(display("Unable to import '{}': no object with id '{}'", address, id))]
    ImportNotFound { address: String, id: String },

    #[snafu(display("Resource '{}' is already managed, remove it from the state first", address))]
    AlreadyManaged { address: String },

    #[snafu(display("Invalid address '{}', expected 'type.name'", address))]
    InvalidAddress { address: String },

    #[snafu(display("Unable to {} '{}': {}", action, address, source))]
    Provider {
        action: String,
        address: String,
        source: ProviderError,
    },

    #[snafu(display("Unable to {}: {}", action, source))]
    SerdeJson {
        action: String,
        source: serde_json::Error,
    },

    #[snafu(display("Unable to {}: {}", action, source))]
    SerdeYaml {
        action: String,
        source: serde_yaml::Error,
    },

    #[snafu(display(
        "State file '{}' has version {}, this version of rancher2 reads up to {}",
        path.display(),
        version,
        supported
    ))]
    StateVersion {
        path: PathBuf,
        version: u32,
        supported: u32,
    },

    #[snafu(display("In '{}': {}", address, what))]
    Template { address: String, what: String },

    #[snafu(display("Unable to find {}", what))]
    NotFound { what: String },

    #[snafu(display("Unable to write file '{}': {}", path.display(), source))]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
}
