use crate::client::Response;
use crate::rate::{Rate, HEADER_RATE_REMAINING};
use reqwest::{Method, StatusCode};
use serde::Deserialize;
use std::fmt;
use thiserror::Error;
use url::Url;

/// Everything a call can fail (or, for 202, conclude) with.
///
/// Build-time and transport variants carry no envelope; every
/// response-derived variant does, so rate and pagination state stay
/// inspectable on failures (see [`Error::response`]).
#[derive(Debug, Error)]
pub enum Error {
    /// The path could not be resolved against the base URL.
    #[error("malformed URL: {0}")]
    Url(#[from] url::ParseError),

    /// The request body could not be serialized.
    #[error("encoding request body: {0}")]
    Encode(#[source] serde_json::Error),

    /// List options could not be serialized into a query string.
    #[error("encoding query options: {0}")]
    Options(#[source] serde_urlencoded::ser::Error),

    /// The transport failed before a full response arrived: connection
    /// errors, timeouts, and cancelled calls all land here. Never
    /// classified further.
    #[error("transport: {0}")]
    Transport(#[from] reqwest::Error),

    /// The call succeeded but its body did not match the target type.
    #[error("decoding response body: {source}")]
    Decode {
        #[source]
        source: serde_json::Error,
        response: Box<Response>,
    },

    /// 202: accepted but not yet processed. An outcome, not a failure.
    #[error(transparent)]
    Accepted(Box<AcceptedError>),

    /// Quota exhausted, either reported by the server or enforced
    /// locally before sending.
    #[error(transparent)]
    RateLimit(Box<RateLimitError>),

    /// Any other non-success response.
    #[error(transparent)]
    Api(Box<ErrorResponse>),
}

impl Error {
    /// Envelope of the exchange that produced this error, when one exists.
    pub fn response(&self) -> Option<&Response> {
        match self {
            Error::Decode { response, .. } => Some(response),
            Error::Accepted(e) => Some(&e.response),
            Error::RateLimit(e) => Some(&e.response),
            Error::Api(e) => Some(&e.response),
            _ => None,
        }
    }
}

/// Generic API failure with whatever context the server supplied.
#[derive(Debug, Clone)]
pub struct ErrorResponse {
    pub method: Method,
    pub url: Url,
    /// Best-effort server message: the error body's `message` field when
    /// it parses, otherwise the raw body text, otherwise empty.
    pub message: String,
    pub request_id: Option<String>,
    pub response: Response,
}

impl fmt::Display for ErrorResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {}: {}",
            self.method,
            self.url,
            self.response.status.as_u16()
        )?;
        if let Some(id) = &self.request_id {
            write!(f, " (request \"{}\")", id)?;
        }
        if !self.message.is_empty() {
            write!(f, " {}", self.message)?;
        }
        Ok(())
    }
}

impl std::error::Error for ErrorResponse {}

/// The request quota is exhausted. Callers can wait out
/// `rate.reset - now` before trying again; this crate never does so
/// on its own.
#[derive(Debug, Clone)]
pub struct RateLimitError {
    pub method: Method,
    pub url: Url,
    pub rate: Rate,
    pub message: String,
    pub response: Response,
}

impl fmt::Display for RateLimitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {}: {}",
            self.method,
            self.url,
            self.response.status.as_u16()
        )?;
        if !self.message.is_empty() {
            write!(f, " {}", self.message)?;
        }
        write!(f, " [rate limit resets at {}]", self.rate.reset)
    }
}

impl std::error::Error for RateLimitError {}

/// 202 Accepted: the server queued the request for later processing.
#[derive(Debug, Clone)]
pub struct AcceptedError {
    pub method: Method,
    pub url: Url,
    pub response: Response,
}

impl fmt::Display for AcceptedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {}: 202 accepted, processing has not been completed",
            self.method, self.url
        )
    }
}

impl std::error::Error for AcceptedError {}

// Error body shape used by the API: {"id": "...", "message": "...",
// "request_id": "..."}.
#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    request_id: Option<String>,
}

// Best-effort message extraction. Malformed or unexpected JSON degrades
// to the raw body text; an empty body yields an empty message. Never
// fails.
fn extract_message(body: &[u8]) -> (String, Option<String>) {
    if body.is_empty() {
        return (String::new(), None);
    }
    if let Ok(parsed) = serde_json::from_slice::<ApiErrorBody>(body) {
        if let Some(message) = parsed.message {
            return (message, parsed.request_id);
        }
    }
    (String::from_utf8_lossy(body).into_owned(), None)
}

/// Classify a completed exchange into at most one error outcome.
/// `None` means a plain success whose body may be decoded. Pure over
/// its inputs: classifying the same response twice yields the same
/// result.
pub(crate) fn check_response(
    method: &Method,
    url: &Url,
    response: &Response,
    body: &[u8],
) -> Option<Error> {
    let status = response.status;
    if status == StatusCode::ACCEPTED {
        return Some(Error::Accepted(Box::new(AcceptedError {
            method: method.clone(),
            url: url.clone(),
            response: response.clone(),
        })));
    }
    if status.is_success() {
        return None;
    }

    let (message, request_id) = extract_message(body);
    let quota_spent = response
        .headers
        .get(HEADER_RATE_REMAINING)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v == "0");
    if status == StatusCode::FORBIDDEN && quota_spent {
        return Some(Error::RateLimit(Box::new(RateLimitError {
            method: method.clone(),
            url: url.clone(),
            rate: response.rate,
            message,
            response: response.clone(),
        })));
    }

    Some(Error::Api(Box::new(ErrorResponse {
        method: method.clone(),
        url: url.clone(),
        message,
        request_id,
        response: response.clone(),
    })))
}
