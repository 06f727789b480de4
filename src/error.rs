use std::error::Error;
use std::fmt;
use std::io;

use crate::proposal::ProposalId;

/// A wire message that could not be decoded. The message is discarded and the
/// receiving participant's state is left untouched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// Field 0 named a message type this protocol does not speak.
    UnknownTag(String),
    /// Right tag, wrong number of fields.
    BadArity { tag: String, got: usize },
    /// A numeric field (port, quorum size) did not parse.
    BadNumber(String),
    /// A proposal id field was not of the form `round:proposer`.
    BadProposalId(String),
    /// The registration named an unknown role.
    UnknownRole(String),
}

impl ParseError {
    pub(crate) fn bad_proposal_id(field: &str) -> Self {
        ParseError::BadProposalId(field.to_string())
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseError::UnknownTag(tag) => write!(f, "unknown message tag '{}'", tag),
            ParseError::BadArity { tag, got } => {
                write!(f, "wrong field count for '{}' message: {}", tag, got)
            }
            ParseError::BadNumber(field) => write!(f, "malformed numeric field '{}'", field),
            ParseError::BadProposalId(field) => {
                write!(f, "malformed proposal id '{}'", field)
            }
            ParseError::UnknownRole(role) => write!(f, "unknown role '{}'", role),
        }
    }
}

impl Error for ParseError {}

/// Two different values were reported accepted under the same proposal id.
///
/// Under correct operation this cannot happen: a proposal id is bound to a
/// single value by its proposer, so a mismatch means an acceptor or the
/// quorum arithmetic is broken. Learners return this instead of asserting so
/// the caller decides how loudly to die.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsensusFault {
    pub id: ProposalId,
    pub recorded: String,
    pub received: String,
}

impl fmt::Display for ConsensusFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "value mismatch for proposal {}: recorded '{}', received '{}'",
            self.id, self.recorded, self.received
        )
    }
}

impl Error for ConsensusFault {}

/// Launcher configuration could not be loaded.
#[derive(Debug)]
pub enum ConfigError {
    Io(io::Error),
    Json(serde_json::Error),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "failed to read config file: {}", e),
            ConfigError::Json(e) => write!(f, "failed to parse config file: {}", e),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            ConfigError::Io(e) => Some(e),
            ConfigError::Json(e) => Some(e),
        }
    }
}

impl From<io::Error> for ConfigError {
    fn from(e: io::Error) -> Self {
        ConfigError::Io(e)
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(e: serde_json::Error) -> Self {
        ConfigError::Json(e)
    }
}
