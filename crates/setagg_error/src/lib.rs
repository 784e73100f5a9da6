use std::error::Error;
use std::fmt;

pub type Result<T, E = DbError> = std::result::Result<T, E>;

/// Broad classification of an error.
///
/// None of these are retryable from within the aggregate. Callers inspect the
/// kind to decide if the whole query should be aborted or if a bug should be
/// reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Input types disagree with the types the aggregate was bound with.
    TypeMismatch,
    /// Storage for aggregate state could not grow.
    OutOfMemory,
    /// Columns of an input batch have inconsistent lengths.
    MalformedBatch,
    /// Serialized state or configuration values that cannot be used.
    InvalidState,
    /// Everything else.
    Internal,
}

impl ErrorKind {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::TypeMismatch => "type mismatch",
            Self::OutOfMemory => "out of memory",
            Self::MalformedBatch => "malformed batch",
            Self::InvalidState => "invalid state",
            Self::Internal => "internal",
        }
    }
}

#[derive(Debug)]
pub struct DbError {
    inner: Box<DbErrorInner>,
}

#[derive(Debug)]
struct DbErrorInner {
    msg: String,
    kind: ErrorKind,
    source: Option<Box<dyn Error + Send + Sync>>,
    fields: Vec<(&'static str, String)>,
}

impl DbError {
    pub fn new(msg: impl Into<String>) -> Self {
        DbError {
            inner: Box::new(DbErrorInner {
                msg: msg.into(),
                kind: ErrorKind::Internal,
                source: None,
                fields: Vec::new(),
            }),
        }
    }

    pub fn with_source(msg: impl Into<String>, source: Box<dyn Error + Send + Sync>) -> Self {
        let mut err = Self::new(msg);
        err.inner.source = Some(source);
        err
    }

    pub fn type_mismatch(msg: impl Into<String>) -> Self {
        Self::new(msg).with_kind(ErrorKind::TypeMismatch)
    }

    pub fn out_of_memory(msg: impl Into<String>) -> Self {
        Self::new(msg).with_kind(ErrorKind::OutOfMemory)
    }

    pub fn malformed_batch(msg: impl Into<String>) -> Self {
        Self::new(msg).with_kind(ErrorKind::MalformedBatch)
    }

    pub fn invalid_state(msg: impl Into<String>) -> Self {
        Self::new(msg).with_kind(ErrorKind::InvalidState)
    }

    pub fn with_kind(mut self, kind: ErrorKind) -> Self {
        self.inner.kind = kind;
        self
    }

    /// Attach an additional field to the error for debugging.
    pub fn with_field(mut self, key: &'static str, value: impl fmt::Display) -> Self {
        self.inner.fields.push((key, value.to_string()));
        self
    }

    pub fn kind(&self) -> ErrorKind {
        self.inner.kind
    }

    pub fn get_msg(&self) -> &str {
        &self.inner.msg
    }

    pub fn get_field(&self, key: &str) -> Option<&str> {
        self.inner
            .fields
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| v.as_str())
    }
}

impl fmt::Display for DbError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.inner.msg)?;
        for (key, value) in &self.inner.fields {
            write!(f, "\n  {key}: {value}")?;
        }
        if let Some(source) = &self.inner.source {
            write!(f, "\nError source: {source}")?;
        }
        Ok(())
    }
}

impl Error for DbError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        self.inner
            .source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn Error + 'static))
    }
}

impl From<std::fmt::Error> for DbError {
    fn from(value: std::fmt::Error) -> Self {
        DbError::with_source("Format error", Box::new(value))
    }
}

/// Extension trait for adding context to errors from other crates.
pub trait ResultExt<T, E> {
    /// Wrap the error with a message, keeping the original as the source.
    fn context(self, msg: &'static str) -> Result<T, DbError>;

    /// Like `context`, but the message is only built on error.
    fn context_fn<F: Fn() -> String>(self, f: F) -> Result<T, DbError>;
}

impl<T, E: Error + Send + Sync + 'static> ResultExt<T, E> for std::result::Result<T, E> {
    fn context(self, msg: &'static str) -> Result<T, DbError> {
        self.map_err(|e| DbError::with_source(msg, Box::new(e)))
    }

    fn context_fn<F: Fn() -> String>(self, f: F) -> Result<T, DbError> {
        self.map_err(|e| DbError::with_source(f(), Box::new(e)))
    }
}

pub trait OptionExt<T> {
    /// Error with an internal error if the value is None.
    fn required(self, msg: &'static str) -> Result<T>;
}

impl<T> OptionExt<T> for Option<T> {
    fn required(self, msg: &'static str) -> Result<T> {
        self.ok_or_else(|| DbError::new(msg))
    }
}
