//! Deadline-bounded HTTP fetch.
//!
//! Every outbound request races a timer; a response that does not arrive in
//! time cancels the in-flight request. Callers get a typed error so logs can
//! distinguish a slow server from a broken one, but the reconciler's
//! grace-period policy treats all variants alike.

use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use std::fmt;
use std::time::Duration;
use tokio::time::timeout;

/// Default request deadline.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(8000);

/// Fetch failures
#[derive(Debug)]
pub enum FetchError {
    /// The request exceeded its deadline and was cancelled.
    Timeout,
    /// Transport failure (DNS, connect, TLS, reset mid-body).
    Network(String),
    /// The server answered with a non-success status.
    Status(StatusCode),
    /// The response body did not match the expected schema.
    Parse(String),
}

impl fmt::Display for FetchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchError::Timeout => write!(f, "request exceeded deadline"),
            FetchError::Network(e) => write!(f, "network error: {}", e),
            FetchError::Status(code) => write!(f, "server returned {}", code),
            FetchError::Parse(e) => write!(f, "malformed response: {}", e),
        }
    }
}

impl std::error::Error for FetchError {}

/// Send a prepared request, failing with `Timeout` if no response arrives
/// within `deadline`.
///
/// The timer is dropped on every exit path; cancelling the race drops the
/// request future, which aborts the in-flight connection.
pub async fn send_with_timeout(
    request: reqwest::RequestBuilder,
    deadline: Duration,
) -> Result<reqwest::Response, FetchError> {
    let response = timeout(deadline, request.send())
        .await
        .map_err(|_| FetchError::Timeout)?
        .map_err(|e| FetchError::Network(e.to_string()))?;

    let status = response.status();
    if !status.is_success() {
        return Err(FetchError::Status(status));
    }
    Ok(response)
}

/// GET `url` with a deadline.
pub async fn get_with_timeout(
    client: &reqwest::Client,
    url: &str,
    deadline: Duration,
) -> Result<reqwest::Response, FetchError> {
    send_with_timeout(client.get(url), deadline).await
}

/// GET `url` and decode the JSON body into `T`.
///
/// A body that deserializes to something other than `T` is a `Parse`
/// failure; losing the connection mid-body is still `Network`.
pub async fn fetch_json<T: DeserializeOwned>(
    client: &reqwest::Client,
    url: &str,
    deadline: Duration,
) -> Result<T, FetchError> {
    let response = get_with_timeout(client, url, deadline).await?;
    response.json::<T>().await.map_err(|e| {
        if e.is_decode() {
            FetchError::Parse(e.to_string())
        } else {
            FetchError::Network(e.to_string())
        }
    })
}
