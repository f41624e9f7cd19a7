/*!

A fixed-interval poller that waits for an API object to reach one of a set of lifecycle states.
Every resource that has to confirm an eventually consistent transition (`activating` to `active`,
`removing` to `removed`, ...) uses [`StateChangeConf`] with a refresh function, usually
[`CrudClient::state_refresh`](crate::clients::CrudClient::state_refresh).

!*/

use crate::clients::error;
use crate::clients::Result;
use log::debug;
use std::future::Future;
use std::time::Duration;

pub const DEFAULT_DELAY: Duration = Duration::from_secs(1);
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(3);

/// Describes a wait for an object to move from one of the `pending` states into one of the `target`
/// states.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateChangeConf {
    /// A human readable description of the object, used in logs and errors.
    pub what: String,
    /// States that are allowed while waiting. An empty list allows any state.
    pub pending: Vec<String>,
    pub target: Vec<String>,
    pub timeout: Duration,
    /// How long to wait before the first refresh.
    pub delay: Duration,
    /// How long to wait between refreshes.
    pub interval: Duration,
}

impl StateChangeConf {
    pub fn new<S>(what: S, pending: &[&str], target: &[&str], timeout: Duration) -> Self
    where
        S: Into<String>,
    {
        Self {
            what: what.into(),
            pending: pending.iter().map(|s| s.to_string()).collect(),
            target: target.iter().map(|s| s.to_string()).collect(),
            timeout,
            delay: DEFAULT_DELAY,
            interval: DEFAULT_INTERVAL,
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Call `refresh` until it reports a target state and return the object it reported then.
    ///
    /// Fails when `refresh` fails, when it reports a state that is neither pending nor target
    /// (only checked if `pending` is not empty), or when `timeout` elapses.
    pub async fn wait_for_state<T, F, Fut>(&self, mut refresh: F) -> Result<Option<T>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<(Option<T>, String)>>,
    {
        let mut last_state = String::new();
        match tokio::time::timeout(self.timeout, self.poll(&mut refresh, &mut last_state)).await {
            Ok(result) => result,
            Err(_) => Err(error::WaitTimeoutSnafu {
                what: &self.what,
                timeout: self.timeout,
                target: self.target.clone(),
                last_state,
            }
            .build()
            .into()),
        }
    }

    async fn poll<T, F, Fut>(&self, refresh: &mut F, last_state: &mut String) -> Result<Option<T>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<(Option<T>, String)>>,
    {
        tokio::time::sleep(self.delay).await;
        loop {
            let (object, state) = refresh().await?;
            debug!("{} is '{}'", self.what, state);
            if self.target.contains(&state) {
                return Ok(object);
            }
            if !self.pending.is_empty() && !self.pending.contains(&state) {
                return Err(error::UnexpectedStateSnafu {
                    what: &self.what,
                    state,
                    target: self.target.clone(),
                }
                .build()
                .into());
            }
            *last_state = state;
            tokio::time::sleep(self.interval).await;
        }
    }
}
