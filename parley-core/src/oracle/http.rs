//! Shared plumbing for HTTP-backed oracles

use std::time::Duration;

use crate::error::ParleyError;

pub(crate) fn build_client(timeout: Duration) -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .unwrap_or_else(|_| reqwest::Client::new())
}

/// Map a transport failure onto the oracle error taxonomy.
pub(crate) fn map_transport_error(
    backend: &str,
    err: reqwest::Error,
    timeout: Duration,
) -> ParleyError {
    if err.is_timeout() {
        ParleyError::OracleTimeout(timeout)
    } else if err.is_connect() || err.is_request() {
        ParleyError::OracleUnavailable(format!("{} unreachable: {}", backend, err))
    } else {
        ParleyError::OracleRejected(format!("{} request failed: {}", backend, err))
    }
}

/// Map a non-success HTTP status onto the oracle error taxonomy.
///
/// Rate limiting and server errors are transient; every other status is not.
pub(crate) fn map_status_error(backend: &str, status: u16, detail: String) -> ParleyError {
    let message = format!("{} API error ({}): {}", backend, status, detail);
    if status == 429 || (500..600).contains(&status) {
        ParleyError::OracleUnavailable(message)
    } else {
        ParleyError::OracleRejected(message)
    }
}
