//! Maps raw failures onto [`ErrorKind`].
//!
//! Every call site goes through [`classify`]; nothing else in the crate
//! inspects error text.

use crate::{
    response::body_message,
    transport::{TransportError, TransportErrorKind},
    ClassifiedError, ErrorKind, Messages,
};

/// Substring table, checked in order against lowercased text.
const MESSAGE_TABLE: &[(&str, ErrorKind)] = &[
    ("internal server error", ErrorKind::ServerError),
    ("unauthorized", ErrorKind::Unauthorized),
    ("not found", ErrorKind::NotFound),
    ("timeout", ErrorKind::Timeout),
    ("timed out", ErrorKind::Timeout),
    ("blocked_by_client", ErrorKind::Blocked),
    ("failed to fetch", ErrorKind::Network),
    ("network", ErrorKind::Network),
];

/// A raw failure at the end of one attempt.
#[derive(Clone, Copy, Debug)]
pub enum Failure<'a> {
    /// Non-2xx response.
    Status { status: u16, body: &'a str },
    /// 2xx response whose envelope reported `success: false`.
    Rejected {
        status: u16,
        message: Option<&'a str>,
    },
    /// No response at all.
    Transport(&'a TransportError),
}

/// Kind for an HTTP status, if the status alone decides it.
pub fn kind_for_status(status: u16) -> Option<ErrorKind> {
    match status {
        401 => Some(ErrorKind::Unauthorized),
        404 => Some(ErrorKind::NotFound),
        500..=599 => Some(ErrorKind::ServerError),
        _ => None,
    }
}

/// Kind for free-form error text, if any table entry matches.
pub fn kind_for_message(text: &str) -> Option<ErrorKind> {
    let lowered = text.to_ascii_lowercase();
    MESSAGE_TABLE
        .iter()
        .find(|(needle, _)| lowered.contains(needle))
        .map(|(_, kind)| *kind)
}

/// Classifies a failure. Never fails; unmatched input becomes [`ErrorKind::Unknown`].
pub fn classify(failure: &Failure<'_>, messages: &Messages) -> ClassifiedError {
    match *failure {
        Failure::Status { status, body } => {
            let detail = body_message(body);
            let kind = kind_for_status(status)
                .or_else(|| detail.as_deref().and_then(kind_for_message))
                .unwrap_or(ErrorKind::Unknown);
            let error = ClassifiedError::new(kind, messages.get(kind)).with_status(status);
            match detail {
                Some(detail) => error.with_detail(detail),
                None => error,
            }
        }
        Failure::Rejected { status, message } => {
            let message = message.map(str::trim).filter(|text| !text.is_empty());
            let kind = message
                .and_then(kind_for_message)
                .unwrap_or(ErrorKind::Unknown);
            match message {
                Some(text) => ClassifiedError::new(kind, text)
                    .with_status(status)
                    .with_detail(text),
                None => ClassifiedError::new(kind, messages.get(kind)).with_status(status),
            }
        }
        Failure::Transport(err) => {
            let kind = match err.kind {
                TransportErrorKind::Timeout => ErrorKind::Timeout,
                TransportErrorKind::Connect => ErrorKind::Network,
                TransportErrorKind::Other => {
                    kind_for_message(&err.message).unwrap_or(ErrorKind::Unknown)
                }
            };
            ClassifiedError::new(kind, messages.get(kind)).with_detail(err.message.clone())
        }
    }
}
