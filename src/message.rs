use std::fmt;
use std::str::FromStr;

use crate::error::ParseError;
use crate::proposal::{self, ProposalId};

/// Sentinel byte terminating every frame on the wire.
pub const TERMINATOR: u8 = b'!';

/// The three Paxos roles a node can register under.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Proposer,
    Acceptor,
    Learner,
}

impl Role {
    fn wire_name(self) -> &'static str {
        match self {
            Role::Proposer => "PROPOSER",
            Role::Acceptor => "ACCEPTOR",
            Role::Learner => "LEARNER",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.wire_name())
    }
}

impl FromStr for Role {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PROPOSER" => Ok(Role::Proposer),
            "ACCEPTOR" => Ok(Role::Acceptor),
            "LEARNER" => Ok(Role::Learner),
            other => Err(ParseError::UnknownRole(other.to_string())),
        }
    }
}

/// Every message the protocol speaks, as a closed set.
///
/// Frames are `;`-separated text fields terminated by `!`; field 0 is the
/// tag. Every variant carries its routing information explicitly because
/// connections are opened per message, so a connection's source port says
/// nothing about the sender's listening address. Optional proposal-id and
/// value fields encode as the empty string when absent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    /// Tag `reg`: a node announces its role and listening port to the bridge.
    Register { role: Role, port: u16 },
    /// Tag `prp`: phase 1a prepare, fanned out to every acceptor.
    Prepare { proposer: u16, id: ProposalId },
    /// Tag `prm`: phase 1b promise from an acceptor, relayed to one proposer.
    Promise {
        acceptor: u16,
        proposer: u16,
        id: ProposalId,
        accepted_id: Option<ProposalId>,
        accepted_value: Option<String>,
    },
    /// Tag `act`: phase 2a accept request, fanned out to every acceptor.
    Accept { id: ProposalId, value: String },
    /// Tag `acd`: phase 2b accepted notification, fanned out to every learner.
    Accepted {
        acceptor: u16,
        id: ProposalId,
        value: String,
    },
    /// Tag `qrm`: a node asks the bridge for the current quorum size.
    QuorumQuery { requester: u16 },
    /// Tag `qsz`: the bridge's quorum-size reply.
    QuorumSize { size: usize },
}

impl Message {
    /// Encodes the message as a terminated wire frame.
    pub fn encode(&self) -> Vec<u8> {
        let body = match self {
            Message::Register { role, port } => format!("reg;{};{}", role, port),
            Message::Prepare { proposer, id } => format!("prp;{};{}", proposer, id),
            Message::Promise {
                acceptor,
                proposer,
                id,
                accepted_id,
                accepted_value,
            } => format!(
                "prm;{};{};{};{};{}",
                acceptor,
                proposer,
                id,
                proposal::encode_opt(*accepted_id),
                accepted_value.as_deref().unwrap_or("")
            ),
            Message::Accept { id, value } => format!("act;{};{}", id, value),
            Message::Accepted {
                acceptor,
                id,
                value,
            } => format!("acd;{};{};{}", acceptor, id, value),
            Message::QuorumQuery { requester } => format!("qrm;{}", requester),
            Message::QuorumSize { size } => format!("qsz;{}", size),
        };
        let mut frame = body.into_bytes();
        frame.push(TERMINATOR);
        frame
    }

    /// Decodes one frame body (terminator already stripped).
    pub fn parse(input: &str) -> Result<Message, ParseError> {
        let fields: Vec<&str> = input.split(';').collect();
        let tag = fields[0];
        let args = &fields[1..];
        match tag {
            "reg" => {
                let [role, port] = expect_arity(tag, args)?;
                Ok(Message::Register {
                    role: role.parse()?,
                    port: parse_port(port)?,
                })
            }
            "prp" => {
                let [proposer, id] = expect_arity(tag, args)?;
                Ok(Message::Prepare {
                    proposer: parse_port(proposer)?,
                    id: id.parse()?,
                })
            }
            "prm" => {
                let [acceptor, proposer, id, accepted_id, accepted_value] =
                    expect_arity(tag, args)?;
                Ok(Message::Promise {
                    acceptor: parse_port(acceptor)?,
                    proposer: parse_port(proposer)?,
                    id: id.parse()?,
                    accepted_id: proposal::parse_opt(accepted_id)?,
                    accepted_value: if accepted_value.is_empty() {
                        None
                    } else {
                        Some(accepted_value.to_string())
                    },
                })
            }
            "act" => {
                let [id, value] = expect_arity(tag, args)?;
                Ok(Message::Accept {
                    id: id.parse()?,
                    value: value.to_string(),
                })
            }
            "acd" => {
                let [acceptor, id, value] = expect_arity(tag, args)?;
                Ok(Message::Accepted {
                    acceptor: parse_port(acceptor)?,
                    id: id.parse()?,
                    value: value.to_string(),
                })
            }
            "qrm" => {
                let [requester] = expect_arity(tag, args)?;
                Ok(Message::QuorumQuery {
                    requester: parse_port(requester)?,
                })
            }
            "qsz" => {
                let [size] = expect_arity(tag, args)?;
                Ok(Message::QuorumSize {
                    size: size
                        .parse()
                        .map_err(|_| ParseError::BadNumber(size.to_string()))?,
                })
            }
            other => Err(ParseError::UnknownTag(other.to_string())),
        }
    }
}

fn expect_arity<'a, const N: usize>(
    tag: &str,
    args: &[&'a str],
) -> Result<[&'a str; N], ParseError> {
    <[&str; N]>::try_from(args).map_err(|_| ParseError::BadArity {
        tag: tag.to_string(),
        got: args.len(),
    })
}

fn parse_port(field: &str) -> Result<u16, ParseError> {
    field
        .parse()
        .map_err(|_| ParseError::BadNumber(field.to_string()))
}
