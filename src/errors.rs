use std::fmt;

#[derive(Debug)]
pub enum Error {
    Io(std::io::Error),
    TableNotFound(String),
    TableAlreadyExists(String),
    InvalidSchema(String),
    Storage(String),
    Encoding(String),
    Syntax(String),
    LockTable(String),
    Other(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Io(e) => write!(f, "IO error: {}", e),
            Error::TableNotFound(msg) => write!(f, "Table not found: {}", msg),
            Error::TableAlreadyExists(msg) => write!(f, "Table already exists: {}", msg),
            Error::InvalidSchema(msg) => write!(f, "Invalid schema: {}", msg),
            Error::Storage(msg) => write!(f, "Storage error: {}", msg),
            Error::Encoding(msg) => write!(f, "Encoding error: {}", msg),
            Error::Syntax(msg) => write!(f, "Syntax error: {}", msg),
            Error::LockTable(msg) => write!(f, "Lock error: {}", msg),
            Error::Other(msg) => write!(f, "Error: {}", msg),
        }
    }
}

impl std::error::Error for Error {}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Error {
        Error::Io(err)
    }
}

/// Build an `Error` variant from a format string, the way every lower
/// layer of this crate reports a failure.
#[macro_export]
macro_rules! err {
    ($variant:ident, $($arg:tt)*) => {
        $crate::errors::Error::$variant(format!($($arg)*))
    };
}
