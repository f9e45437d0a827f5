use std::fmt;

#[derive(Debug)]
pub enum ErrorKind {
    Io,
    Parse,
    NotFound,
    InvalidArgument,
    Internal,
    InvalidInput,
    OutOfMemory,
    InvalidState,
    UnsupportedQuery,
    /// A predicate or query node named a property absent from the schema.
    MissingProperty,
    /// A KEYWORD/RANK_KEYWORD term id had no entry in the term dictionary.
    MissingTerm,
    /// A predicate's literal values don't match the property's declared type.
    TypeMismatch,
    /// The underlying index reader failed to produce a reader or posting list.
    IndexIo,
    /// Filter construction could not proceed past a given predicate.
    FilterBuild,
    /// A query tree had no resolvable leaves at all.
    EmptyQuery,
}

#[derive(Debug)]
pub struct Error {
    pub kind: ErrorKind,
    pub context: String,
}

impl Error {
    pub fn new(kind: ErrorKind, context: impl Into<String>) -> Self {
        Error {
            kind,
            context: context.into(),
        }
    }

    pub fn missing_property(name: &str) -> Self {
        Error::new(ErrorKind::MissingProperty, format!("no such property: {name}"))
    }

    pub fn missing_term(term_id: crate::core::types::TermId) -> Self {
        Error::new(ErrorKind::MissingTerm, format!("term {term_id} not in dictionary"))
    }

    pub fn type_mismatch(property: &str, expected: &str) -> Self {
        Error::new(
            ErrorKind::TypeMismatch,
            format!("property {property} expected a {expected} literal"),
        )
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:?}: {}", self.kind, self.context)
    }
}

impl std::error::Error for Error {}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error {
            kind: ErrorKind::Io,
            context: err.to_string(),
        }
    }
}

impl From<fst::Error> for Error {
    fn from(err: fst::Error) -> Self {
        Error {
            kind: ErrorKind::Internal,
            context: format!("FST error: {err}"),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
