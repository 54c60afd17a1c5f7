//! Error types shared by every datactx crate.
//!
//! Errors are faults: they describe a misconfigured or broken data layer. Expected
//! domain outcomes such as "no row matched" are reported through
//! [`StatusResult`](crate::StatusResult) instead.

use std::error::Error as StdError;
use std::fmt;

use crate::value::ValueKind;

/// Result alias used throughout the workspace.
pub type Result<T> = std::result::Result<T, Error>;

/// The top-level error type.
#[derive(Debug)]
pub enum Error {
    /// A required setting was absent (or unusable) at construction.
    ConfigurationMissing { key: String },
    /// A field or key could not be resolved on an entity type.
    Mapping(MappingError),
    /// The dialect selector does not name a supported dialect.
    UnsupportedDialect(String),
    /// A unit of work was used after its transaction finished.
    TransactionState(TransactionStateError),
    /// Driver or network level failure, propagated as reported.
    Backend(BackendFault),
    /// A command could not be built (empty parameter set, colliding names, ...).
    MalformedCommand(String),
}

impl Error {
    /// Shorthand for a configuration error.
    pub fn config_missing(key: impl Into<String>) -> Self {
        Error::ConfigurationMissing { key: key.into() }
    }

    /// Shorthand for a backend fault without an underlying source.
    pub fn backend(message: impl Into<String>) -> Self {
        Error::Backend(BackendFault {
            message: message.into(),
            source: None,
        })
    }

    /// Shorthand for a malformed command.
    pub fn malformed(message: impl Into<String>) -> Self {
        Error::MalformedCommand(message.into())
    }

    /// True when the error came from the backend rather than this layer.
    pub const fn is_backend(&self) -> bool {
        matches!(self, Error::Backend(_))
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::ConfigurationMissing { key } => {
                write!(f, "required setting missing: {}", key)
            }
            Error::Mapping(err) => write!(f, "mapping error: {}", err),
            Error::UnsupportedDialect(code) => write!(f, "unsupported dialect: {}", code),
            Error::TransactionState(err) => write!(f, "transaction state error: {}", err),
            Error::Backend(err) => write!(f, "backend fault: {}", err),
            Error::MalformedCommand(msg) => write!(f, "malformed command: {}", msg),
        }
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            Error::Backend(err) => err
                .source
                .as_deref()
                .map(|s| s as &(dyn StdError + 'static)),
            _ => None,
        }
    }
}

impl From<MappingError> for Error {
    fn from(err: MappingError) -> Self {
        Error::Mapping(err)
    }
}

impl From<TransactionStateError> for Error {
    fn from(err: TransactionStateError) -> Self {
        Error::TransactionState(err)
    }
}

impl From<BackendFault> for Error {
    fn from(err: BackendFault) -> Self {
        Error::Backend(err)
    }
}

/// What went wrong while mapping an entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MappingErrorKind {
    /// No field with this local name or storage alias exists.
    FieldNotFound,
    /// The supplied value does not have the declared field kind.
    TypeMismatch {
        expected: ValueKind,
        found: &'static str,
    },
    /// The type declares no primary-key field.
    MissingKey,
    /// More than one primary-key field after flattening contracts.
    MultipleKeys,
    /// Two distinct fields resolve to the same storage name.
    DuplicateColumn,
}

/// Error raised by the field mapper.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MappingError {
    pub kind: MappingErrorKind,
    pub type_name: &'static str,
    pub field: Option<String>,
}

impl MappingError {
    pub fn new(kind: MappingErrorKind, type_name: &'static str) -> Self {
        Self {
            kind,
            type_name,
            field: None,
        }
    }

    pub fn field(mut self, field: impl Into<String>) -> Self {
        self.field = Some(field.into());
        self
    }

    pub fn field_not_found(type_name: &'static str, field: impl Into<String>) -> Self {
        Self::new(MappingErrorKind::FieldNotFound, type_name).field(field)
    }
}

impl fmt::Display for MappingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let field = self.field.as_deref().unwrap_or("?");
        match &self.kind {
            MappingErrorKind::FieldNotFound => {
                write!(f, "field `{}` not found on `{}`", field, self.type_name)
            }
            MappingErrorKind::TypeMismatch { expected, found } => write!(
                f,
                "field `{}` on `{}` expects {}, got {}",
                field, self.type_name, expected, found
            ),
            MappingErrorKind::MissingKey => {
                write!(f, "`{}` declares no primary-key field", self.type_name)
            }
            MappingErrorKind::MultipleKeys => write!(
                f,
                "`{}` declares more than one primary-key field (second: `{}`)",
                self.type_name, field
            ),
            MappingErrorKind::DuplicateColumn => write!(
                f,
                "storage name of field `{}` on `{}` is already used by another field",
                field, self.type_name
            ),
        }
    }
}

impl StdError for MappingError {}

/// Lifecycle state of a unit-of-work transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionState {
    /// No transaction (immediate-commit unit).
    None,
    Active,
    Committed,
    RolledBack,
}

impl fmt::Display for TransactionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TransactionState::None => "none",
            TransactionState::Active => "active",
            TransactionState::Committed => "committed",
            TransactionState::RolledBack => "rolled back",
        };
        f.write_str(s)
    }
}

/// Attempt to commit or roll back a unit whose transaction is not active.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionStateError {
    pub unit: u64,
    pub state: TransactionState,
    pub attempted: &'static str,
}

impl fmt::Display for TransactionStateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "cannot {} unit of work #{}: transaction is {}",
            self.attempted, self.unit, self.state
        )
    }
}

impl StdError for TransactionStateError {}

/// A failure reported by a backend driver.
#[derive(Debug)]
pub struct BackendFault {
    pub message: String,
    pub source: Option<Box<dyn StdError + Send + Sync>>,
}

impl fmt::Display for BackendFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}
