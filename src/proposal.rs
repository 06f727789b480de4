use std::fmt;
use std::str::FromStr;

use crate::error::ParseError;

/// A totally ordered identifier for one proposal attempt.
///
/// The round number is chosen by the proposer and increases monotonically per
/// proposer instance; the proposer's own listening port breaks ties between
/// proposers that pick the same round. Ordering is lexicographic on
/// `(round, proposer)`, so two distinct proposers can never produce equal ids
/// for different proposals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ProposalId {
    pub round: u64,
    pub proposer: u16,
}

impl ProposalId {
    pub fn new(round: u64, proposer: u16) -> Self {
        ProposalId { round, proposer }
    }
}

impl fmt::Display for ProposalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.round, self.proposer)
    }
}

impl FromStr for ProposalId {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (round, proposer) = s
            .split_once(':')
            .ok_or_else(|| ParseError::bad_proposal_id(s))?;
        let round = round
            .parse::<u64>()
            .map_err(|_| ParseError::bad_proposal_id(s))?;
        let proposer = proposer
            .parse::<u16>()
            .map_err(|_| ParseError::bad_proposal_id(s))?;
        Ok(ProposalId { round, proposer })
    }
}

/// Formats an optional id for the wire: absent ids become the empty field.
pub fn encode_opt(id: Option<ProposalId>) -> String {
    match id {
        Some(id) => id.to_string(),
        None => String::new(),
    }
}

/// Parses an optional id from the wire; the empty field means absent.
pub fn parse_opt(field: &str) -> Result<Option<ProposalId>, ParseError> {
    if field.is_empty() {
        Ok(None)
    } else {
        field.parse().map(Some)
    }
}
