mod api_client;
mod crud_client;
pub(crate) mod error;
mod http_status_code;

pub use api_client::{normalize_url, ApiClient, ClientOptions, Credentials};
pub use crud_client::{Collection, CrudClient, REMOVED_STATE};
pub use error::{Error, Result};
pub use http_status_code::{AllowNotFound, HttpStatusCode, StatusCode};
