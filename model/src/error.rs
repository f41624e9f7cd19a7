use snafu::Snafu;

#[derive(Debug, Snafu)]
pub struct Error(OpaqueError);
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub(crate) enum OpaqueError {
    #[snafu(display("Error deserializing attributes: {}", source))]
    ConfigDeserialization { source: serde_json::Error },

    #[snafu(display("Error serializing attributes: {}", source))]
    ConfigSerialization { source: serde_json::Error },
}
