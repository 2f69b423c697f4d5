//! Registration and runtime errors.

use std::fmt;

use sitekit_types::ApiError;
use thiserror::Error;

/// Which member table of a store definition collided.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemberKind {
    Action,
    Selector,
    Resolver,
    Control,
}

impl fmt::Display for MemberKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            MemberKind::Action => "action",
            MemberKind::Selector => "selector",
            MemberKind::Resolver => "resolver",
            MemberKind::Control => "control",
        })
    }
}

/// Errors raised while composing or registering stores.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistrationError {
    #[error("store `{name}` is already registered")]
    DuplicateStore { name: String },
    #[error("state key `{key}` is defined by more than one slice")]
    StateKeyCollision { key: String },
    #[error("{kind} `{name}` is defined by more than one slice")]
    MemberCollision { kind: MemberKind, name: String },
}

/// Errors raised by select, dispatch and control calls.
///
/// Everything except [`StoreError::Api`] is a programming error: a name that
/// was never registered, or arguments that cannot be used.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("unknown store `{store}`")]
    UnknownStore { store: String },
    #[error("unknown selector `{selector}` on store `{store}`")]
    UnknownSelector { store: String, selector: String },
    #[error("unknown action `{action}` on store `{store}`")]
    UnknownAction { store: String, action: String },
    #[error("unknown control `{control}` on store `{store}`")]
    UnknownControl { store: String, control: String },
    #[error("action `{action}` on store `{store}` is asynchronous; use `run`")]
    RequiresAwait { store: String, action: String },
    #[error("invalid arguments for `{name}`: {message}")]
    InvalidArguments { name: String, message: String },
    #[error("failed to decode value: {0}")]
    Decode(#[from] serde_json::Error),
    #[error(transparent)]
    Api(#[from] ApiError),
}

impl StoreError {
    pub fn invalid_arguments(name: impl Into<String>, message: impl Into<String>) -> Self {
        StoreError::InvalidArguments {
            name: name.into(),
            message: message.into(),
        }
    }

    /// The error as recorded by the error tracker.
    ///
    /// API errors are kept verbatim; any other failure is wrapped so a
    /// resolver that hit a programming error is still marked as failed.
    #[must_use]
    pub fn into_api_error(self) -> ApiError {
        match self {
            StoreError::Api(err) => err,
            other => ApiError::new("internal_error", other.to_string()),
        }
    }
}
