/*!

This library provides the wire types of the v3 management API, an HTTP client for them and the
fixed-interval state poller used to confirm lifecycle transitions.

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

pub use configuration::Configuration;
pub use error::{Error, Result};
pub use object::{ApiObject, ListResponse, ObjectMeta};

pub mod clients;
mod configuration;
mod error;
mod object;
pub mod types;
pub mod wait;
