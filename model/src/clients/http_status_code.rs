pub use http::StatusCode;

pub trait HttpStatusCode {
    fn status_code(&self) -> Option<StatusCode>;

    fn is_status_code(&self, status_code: StatusCode) -> bool {
        self.status_code()
            .map(|some| some == status_code)
            .unwrap_or_default()
    }

    /// The single not-found predicate used by every resource.
    fn is_not_found(&self) -> bool {
        self.is_status_code(StatusCode::NOT_FOUND)
    }
}

impl HttpStatusCode for reqwest::Error {
    fn status_code(&self) -> Option<StatusCode> {
        self.status()
    }
}

impl<T, E> HttpStatusCode for std::result::Result<T, E>
where
    E: HttpStatusCode,
{
    fn status_code(&self) -> Option<StatusCode> {
        self.as_ref().err().and_then(|e| e.status_code())
    }
}

/// Turns a not-found error into `Ok(None)`.
pub trait AllowNotFound<T, E> {
    /// `f` is called with the not-found error before it is discarded, e.g. to log it.
    fn allow_not_found<F>(self, f: F) -> std::result::Result<Option<T>, E>
    where
        F: FnOnce(E);
}

impl<T, E> AllowNotFound<T, E> for std::result::Result<T, E>
where
    E: HttpStatusCode,
{
    fn allow_not_found<F>(self, f: F) -> std::result::Result<Option<T>, E>
    where
        F: FnOnce(E),
    {
        match self {
            Ok(t) => Ok(Some(t)),
            Err(e) if e.is_not_found() => {
                f(e);
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }
}
