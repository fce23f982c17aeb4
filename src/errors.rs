//! Registry error hierarchy.
//!
//! Client-facing failures are grouped under [`AccessError`], whose variants
//! map one-to-one onto the categories a caller of an access handle has to
//! distinguish. Configuration loading problems surface as the `config`
//! crate's own error type.

use config::ConfigError;

#[doc(hidden)]
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Failures reported by access handles and the registry
    #[error(transparent)]
    Access(#[from] AccessError),

    /// Registry configuration loading and validation failures
    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl Error {
    /// Returns the access-level error, if this is one.
    pub fn as_access(&self) -> Option<&AccessError> {
        match self {
            Error::Access(e) => Some(e),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AccessError {
    /// Named element does not exist (or may not be removed)
    #[error("No such element: {0}")]
    NoSuchElement(String),

    /// Insertion under a name that is already taken
    #[error("Element already exists: {0}")]
    ElementExists(String),

    /// Property name unknown to the addressed group
    #[error("Unknown property: {0}")]
    UnknownProperty(String),

    /// Bad value, bad name, bad element, or a finalized target
    #[error("Illegal argument: {0}")]
    IllegalArgument(String),

    /// Operation not applicable to the kind of the addressed node
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Misuse of a handle (read-only root, non-root dispose, bad path)
    #[error("Runtime error: {0}")]
    Runtime(String),

    /// The handle belongs to a disposed root
    #[error("Access has been disposed")]
    Disposed,
}

impl AccessError {
    pub(crate) fn illegal(msg: impl Into<String>) -> Error {
        Error::Access(AccessError::IllegalArgument(msg.into()))
    }

    pub(crate) fn runtime(msg: impl Into<String>) -> Error {
        Error::Access(AccessError::Runtime(msg.into()))
    }

    pub(crate) fn no_such_element(name: impl Into<String>) -> Error {
        Error::Access(AccessError::NoSuchElement(name.into()))
    }

    pub(crate) fn invalid_state(msg: impl Into<String>) -> Error {
        Error::Access(AccessError::InvalidState(msg.into()))
    }

    pub(crate) fn unknown_property(name: impl Into<String>) -> Error {
        Error::Access(AccessError::UnknownProperty(name.into()))
    }
}
