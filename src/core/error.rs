use std::error::Error as StdError;
use std::fmt;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ErrorKind {
    Internal,
    InvalidArgument,
    InvalidState,
    ContractViolation,
    TypeMismatch,
    OutOfRange,
    NotSupported,
    Cancelled,
    Source,
    Io,
}

#[derive(Debug)]
pub struct Error {
    kind: ErrorKind,
    message: Option<String>,
    ordinal: Option<usize>,
    source: Option<Box<dyn StdError + Send + Sync>>,
}

impl Error {
    pub fn new(kind: ErrorKind) -> Self {
        Self {
            kind,
            message: None,
            ordinal: None,
            source: None,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    pub fn ordinal(&self) -> Option<usize> {
        self.ordinal
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn with_ordinal(mut self, ordinal: usize) -> Self {
        self.ordinal = Some(ordinal);
        self
    }

    pub fn with_source(mut self, source: impl StdError + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    pub(crate) fn with_boxed_source(mut self, source: Box<dyn StdError + Send + Sync>) -> Self {
        self.source = Some(source);
        self
    }

    pub(crate) fn no_current_row() -> Self {
        Self::new(ErrorKind::ContractViolation)
            .with_message("no current row; read() must return true first")
    }

    pub(crate) fn out_of_range(ordinal: usize, field_count: usize) -> Self {
        Self::new(ErrorKind::OutOfRange)
            .with_message(format!("ordinal out of range for {field_count} columns"))
            .with_ordinal(ordinal)
    }

    pub(crate) fn not_supported(operation: &str) -> Self {
        Self::new(ErrorKind::NotSupported)
            .with_message(format!("{operation} is not supported by forward-only row sources"))
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.kind)?;
        if let Some(message) = &self.message {
            write!(f, ": {message}")?;
        }
        if let Some(ordinal) = self.ordinal {
            write!(f, " (ordinal: {ordinal})")?;
        }
        Ok(())
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.source
            .as_ref()
            .map(|source| source.as_ref() as &(dyn StdError + 'static))
    }
}
