//! Error handling for fintrack.
//!
//! Internally everything is an `anyhow::Error`. At the boundary between a command and the user, an
//! error is classified with an `ErrorType` by calling `pub_result`. The classification is attached
//! as context, so the original chain is still available for debug logging.

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

pub type Error = anyhow::Error;
pub type Result<T> = std::result::Result<T, Error>;

/// The kinds of failure that are surfaced to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorType {
    /// Signing in, refreshing or reading the session failed. The only remedy is to sign in again.
    Auth,
    /// The transaction collection could not be loaded.
    Fetch,
    /// A create, update or delete request failed. Local state was left as it was.
    Mutation,
    /// The configuration or home directory is missing or invalid.
    Config,
}

serde_plain::derive_display_from_serialize!(ErrorType);
serde_plain::derive_fromstr_from_deserialize!(ErrorType);

impl ErrorType {
    fn label(&self) -> &'static str {
        match self {
            ErrorType::Auth => "Authentication error",
            ErrorType::Fetch => "Fetch error",
            ErrorType::Mutation => "Save error",
            ErrorType::Config => "Configuration error",
        }
    }
}

/// A user-facing error. It is attached as context on top of the underlying error chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublicError {
    error_type: ErrorType,
    message: String,
}

impl PublicError {
    pub fn error_type(&self) -> ErrorType {
        self.error_type
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl Display for PublicError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.error_type.label(), self.message)
    }
}

/// Converts a result into one that carries an `ErrorType` classification.
pub trait IntoResult<T> {
    fn pub_result(self, error_type: ErrorType) -> Result<T>;
}

impl<T, E> IntoResult<T> for std::result::Result<T, E>
where
    E: Into<anyhow::Error>,
{
    fn pub_result(self, error_type: ErrorType) -> Result<T> {
        self.map_err(|e| {
            let e: anyhow::Error = e.into();
            // Already classified errors keep their original classification.
            if e.downcast_ref::<PublicError>().is_some() {
                return e;
            }
            let message = e.to_string();
            e.context(PublicError {
                error_type,
                message,
            })
        })
    }
}

/// The causes underneath the message of `e`, outermost first. The message itself is left out.
pub fn causes(e: &Error) -> Vec<String> {
    let message = e.downcast_ref::<PublicError>().map(PublicError::message);
    e.chain()
        .skip(1)
        .map(ToString::to_string)
        .filter(|cause| Some(cause.as_str()) != message)
        .collect()
}

/// Returns the classification of `e`, if it has one.
pub fn error_type(e: &Error) -> Option<ErrorType> {
    e.downcast_ref::<PublicError>().map(|p| p.error_type())
}
