use crate::clients::{HttpStatusCode, StatusCode};
use snafu::Snafu;
use std::time::Duration;

/// The `Result` type returned by `clients`.
pub type Result<T> = std::result::Result<T, Error>;

/// The public error type returned by `clients`.
#[derive(Debug, Snafu)]
pub struct Error(InnerError);

/// The private error type returned by `clients`.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub(crate) enum InnerError {
    #[snafu(display("Invalid url '{}': {}", url, source))]
    Url {
        url: String,
        source: url::ParseError,
    },

    #[snafu(display("Unable to parse CA certificates: {}", source))]
    Certificate { source: reqwest::Error },

    #[snafu(display("Error initializing the HTTP client: {}", source))]
    Initialization { source: reqwest::Error },

    #[snafu(display("Unable to {} '{}': {}", method, url, source))]
    Request {
        method: String,
        url: String,
        source: reqwest::Error,
    },

    #[snafu(display(
        "Unable to {} '{}': server returned {} ({}): {}",
        method,
        url,
        status,
        code,
        message
    ))]
    Response {
        method: String,
        url: String,
        status: StatusCode,
        /// The API error code, e.g. `NotFound` or `InvalidBodyContent`.
        code: String,
        message: String,
    },

    #[snafu(display("Unable to read the response of {} '{}': {}", method, url, source))]
    ResponseBody {
        method: String,
        url: String,
        source: reqwest::Error,
    },

    #[snafu(display("Error deserializing the response of '{}': {}", url, source))]
    Deserialize {
        url: String,
        source: serde_json::Error,
    },

    #[snafu(display("Error serializing {}: {}", what, source))]
    Serialize {
        what: String,
        source: serde_json::Error,
    },

    #[snafu(display("{} '{}' has no '{}' action", kind, id, action))]
    MissingAction {
        kind: String,
        id: String,
        action: String,
    },

    #[snafu(display(
        "Timeout after {:?} waiting for {} to become {:?}, last state was '{}'",
        timeout,
        what,
        target,
        last_state
    ))]
    WaitTimeout {
        what: String,
        timeout: Duration,
        target: Vec<String>,
        last_state: String,
    },

    #[snafu(display(
        "Unexpected state '{}' for {}, wanted target {:?}",
        state,
        what,
        target
    ))]
    UnexpectedState {
        what: String,
        state: String,
        target: Vec<String>,
    },
}

impl HttpStatusCode for InnerError {
    fn status_code(&self) -> Option<StatusCode> {
        match self {
            InnerError::Response { status, .. } => Some(*status),
            InnerError::Request { source, .. } | InnerError::ResponseBody { source, .. } => {
                source.status_code()
            }
            InnerError::Url { .. }
            | InnerError::Certificate { .. }
            | InnerError::Initialization { .. }
            | InnerError::Deserialize { .. }
            | InnerError::Serialize { .. }
            | InnerError::MissingAction { .. }
            | InnerError::WaitTimeout { .. }
            | InnerError::UnexpectedState { .. } => None,
        }
    }
}

impl HttpStatusCode for Error {
    fn status_code(&self) -> Option<StatusCode> {
        self.0.status_code()
    }
}

impl Error {
    /// The API error code returned by the server, if this error came from an API response.
    pub fn api_code(&self) -> Option<&str> {
        match &self.0 {
            InnerError::Response { code, .. } => Some(code),
            _ => None,
        }
    }

    /// Whether this error is a poll that ran out of time.
    pub fn is_timeout(&self) -> bool {
        matches!(self.0, InnerError::WaitTimeout { .. })
    }
}
