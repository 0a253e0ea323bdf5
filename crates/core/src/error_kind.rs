// SPDX-License-Identifier: MIT

//! Error classification.
//!
//! Two pure entry points decide whether a failure should be retried,
//! dead-lettered, or treated as a Plex outage. Nothing here touches I/O —
//! callers translate whatever error type they hold (an HTTP status, an
//! exception message) into the inputs these functions take.

use serde::{Deserialize, Serialize};

/// The four-way error taxonomy every outcome in the worker loop reduces to.
///
/// `ServerDown` and `NotFound` are "distinguished" transient kinds: they
/// retry like [`ErrorKind::Transient`] but carry their own backoff policy
/// and breaker behavior (§4.9).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Transient,
    ServerDown,
    NotFound,
    Permanent,
}

impl ErrorKind {
    /// Name used in DLQ entries and log lines (`errorKindName`).
    pub fn name(self) -> &'static str {
        match self {
            ErrorKind::Transient => "Transient",
            ErrorKind::ServerDown => "ServerDown",
            ErrorKind::NotFound => "NotFound",
            ErrorKind::Permanent => "Permanent",
        }
    }

    /// True for the three kinds that retry rather than DLQ immediately.
    pub fn is_transient(self) -> bool {
        !matches!(self, ErrorKind::Permanent)
    }

    /// True only for [`ErrorKind::ServerDown`] — the kind that opens the
    /// breaker immediately and never counts against retry limits.
    pub fn is_server_down(self) -> bool {
        matches!(self, ErrorKind::ServerDown)
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Classify a raw HTTP status code.
pub fn classify_http_status(code: u16) -> ErrorKind {
    match code {
        429 | 500 | 502 | 503 | 504 => ErrorKind::Transient,
        400 | 401 | 403 | 405 | 410 | 422 => ErrorKind::Permanent,
        404 => ErrorKind::NotFound,
        c if (400..500).contains(&c) => ErrorKind::Permanent,
        c if (500..600).contains(&c) => ErrorKind::Transient,
        _ => ErrorKind::Transient,
    }
}

/// Minimal description of a caught exception/error, enough for
/// [`classify_exception`] to reach a verdict without depending on any
/// specific error type from `adapters` or `engine`.
#[derive(Debug, Clone, Default)]
pub struct ExceptionHint<'a> {
    /// Lower-cased error message (or `Display` output) of the failure.
    pub message: &'a str,
    /// HTTP response status, if the failure carries one.
    pub http_status: Option<u16>,
    /// True if the underlying cause is a connect/DNS/timeout-class OS error.
    pub is_network_error: bool,
    /// True if the underlying cause is a value/type/validation error
    /// (malformed payload, bad config value, ...).
    pub is_validation_error: bool,
}

const SERVER_DOWN_PATTERNS: &[&str] = &[
    "connection refused",
    "econnrefused",
    "could not connect",
    "no route to host",
    "name or service not known",
    "dns failure",
    "failed to lookup address",
    "network is unreachable",
];

/// Classify an arbitrary caught exception.
pub fn classify_exception(hint: &ExceptionHint<'_>) -> ErrorKind {
    let lowered = hint.message.to_ascii_lowercase();
    if SERVER_DOWN_PATTERNS
        .iter()
        .any(|pattern| lowered.contains(pattern))
    {
        return ErrorKind::ServerDown;
    }

    if let Some(status) = hint.http_status {
        return classify_http_status(status);
    }

    if hint.is_validation_error {
        return ErrorKind::Permanent;
    }

    if hint.is_network_error {
        return ErrorKind::Transient;
    }

    // Unknown — safer to allow retry.
    ErrorKind::Transient
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn http_status_table() {
        for code in [429, 500, 502, 503, 504] {
            assert_eq!(classify_http_status(code), ErrorKind::Transient, "{code}");
        }
        for code in [400, 401, 403, 405, 410, 422] {
            assert_eq!(classify_http_status(code), ErrorKind::Permanent, "{code}");
        }
        assert_eq!(classify_http_status(404), ErrorKind::NotFound);
        assert_eq!(classify_http_status(418), ErrorKind::Permanent);
        assert_eq!(classify_http_status(599), ErrorKind::Transient);
    }

    #[test]
    fn connection_refused_is_server_down() {
        let hint = ExceptionHint {
            message: "Connection refused (os error 111)",
            ..Default::default()
        };
        assert_eq!(classify_exception(&hint), ErrorKind::ServerDown);
    }

    #[test]
    fn dns_failure_is_server_down() {
        let hint = ExceptionHint {
            message: "DNS failure: name or service not known",
            ..Default::default()
        };
        assert_eq!(classify_exception(&hint), ErrorKind::ServerDown);
    }

    #[test]
    fn http_response_on_exception_delegates() {
        let hint = ExceptionHint {
            message: "http error",
            http_status: Some(404),
            ..Default::default()
        };
        assert_eq!(classify_exception(&hint), ErrorKind::NotFound);
    }

    #[test]
    fn validation_error_is_permanent() {
        let hint = ExceptionHint {
            message: "invalid literal for int()",
            is_validation_error: true,
            ..Default::default()
        };
        assert_eq!(classify_exception(&hint), ErrorKind::Permanent);
    }

    #[test]
    fn unknown_exception_defaults_to_transient() {
        let hint = ExceptionHint {
            message: "something weird happened",
            ..Default::default()
        };
        assert_eq!(classify_exception(&hint), ErrorKind::Transient);
    }

    #[test]
    fn error_kind_hierarchy() {
        assert!(ErrorKind::ServerDown.is_transient());
        assert!(ErrorKind::NotFound.is_transient());
        assert!(ErrorKind::Transient.is_transient());
        assert!(!ErrorKind::Permanent.is_transient());
        assert!(ErrorKind::ServerDown.is_server_down());
        assert!(!ErrorKind::NotFound.is_server_down());
    }
}
