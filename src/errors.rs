//! Definition of errors.

use core::fmt;

use std::error::Error;
use std::io;

/// The error type for rudep.
#[derive(Debug)]
pub enum RudepError {
    /// Malformed tree-bank text. Fatal to loading the offending file.
    Format {
        /// 1-based line number within the sentence block, 0 when the error
        /// concerns the block as a whole.
        line: usize,
        /// What was wrong with the line.
        msg: String,
    },

    /// The training oracle found no correct move: the gold tree is
    /// non-projective for this transition system. Recoverable per sentence.
    NonProjective {
        /// The offending sentence, space-joined.
        sentence: String,
    },

    /// Paired graphs differ in node count.
    LengthMismatch {
        /// Node count of the parsed graph.
        parsed: usize,
        /// Node count of the gold graph.
        gold: usize,
    },

    /// Paired graphs disagree on a token form; the sentences are not aligned.
    TokenMismatch {
        /// Node id where the forms diverge.
        id: usize,
    },

    /// A model file has the wrong magic number, version, kind, or shape.
    Model {
        /// Which check failed.
        msg: &'static str,
    },

    /// Training was requested on a model that has already been averaged.
    FrozenModel,

    /// A trainer was configured with an invalid argument.
    InvalidArgument {
        /// Which argument, and why it was rejected.
        msg: &'static str,
    },

    /// An underlying I/O failure while reading or writing files.
    Io(io::Error),
}

impl RudepError {
    /// Creates a new [`RudepError::Format`].
    pub fn format(line: usize, msg: impl Into<String>) -> Self {
        Self::Format {
            line,
            msg: msg.into(),
        }
    }

    /// Creates a new [`RudepError::NonProjective`].
    pub fn non_projective(sentence: impl Into<String>) -> Self {
        Self::NonProjective {
            sentence: sentence.into(),
        }
    }

    /// Creates a new [`RudepError::Model`].
    pub const fn model(msg: &'static str) -> Self {
        Self::Model { msg }
    }

    /// Creates a new [`RudepError::InvalidArgument`].
    pub const fn invalid_argument(msg: &'static str) -> Self {
        Self::InvalidArgument { msg }
    }
}

impl fmt::Display for RudepError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Format { line, msg } => {
                if *line == 0 {
                    write!(f, "FormatError: {msg}")
                } else {
                    write!(f, "FormatError: line {line}: {msg}")
                }
            }
            Self::NonProjective { sentence } => {
                write!(f, "NonProjectiveError: {sentence}")
            }
            Self::LengthMismatch { parsed, gold } => write!(
                f,
                "LengthMismatchError: parsed graph has {parsed} nodes, gold graph has {gold}"
            ),
            Self::TokenMismatch { id } => {
                write!(f, "TokenMismatchError: forms diverge at node {id}")
            }
            Self::Model { msg } => write!(f, "ModelError: {msg}"),
            Self::FrozenModel => {
                write!(
                    f,
                    "FrozenModelError: the model has been averaged and is read-only"
                )
            }
            Self::InvalidArgument { msg } => write!(f, "InvalidArgumentError: {msg}"),
            Self::Io(e) => write!(f, "IoError: {e}"),
        }
    }
}

impl Error for RudepError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for RudepError {
    fn from(e: io::Error) -> Self {
        Self::Io(e)
    }
}

/// A specialized Result type.
pub type Result<T, E = RudepError> = core::result::Result<T, E>;
