//! Per-role node loops: each owns a [`Listener`] and a role state machine,
//! and forwards every outbound message to the bridge's router.

use std::io;
use std::thread;
use std::time::Duration;

use log::{error, info, warn};

use crate::bridge::Bridge;
use crate::error::ConsensusFault;
use crate::message::{Message, Role};
use crate::network::transport::{self, Listener};
use crate::paxos::{Acceptor, Chosen, Learner, Proposer};

/// Why a node loop stopped.
#[derive(Debug)]
pub enum NodeError {
    Io(io::Error),
    /// A learner observed two values under one proposal id. Fatal: the
    /// acceptor quorum is broken.
    Fault(ConsensusFault),
}

impl std::fmt::Display for NodeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NodeError::Io(e) => write!(f, "i/o failure: {}", e),
            NodeError::Fault(e) => write!(f, "consensus fault: {}", e),
        }
    }
}

impl std::error::Error for NodeError {}

impl From<io::Error> for NodeError {
    fn from(e: io::Error) -> Self {
        NodeError::Io(e)
    }
}

/// A bound bridge endpoint, ready to serve.
///
/// Binding and serving are split so the launcher can read the port before
/// the serve loop takes over the thread.
pub struct BridgeNode {
    listener: Listener,
    bridge: Bridge,
}

impl BridgeNode {
    pub fn bind() -> io::Result<BridgeNode> {
        let listener = Listener::bind()?;
        info!("bridge listening on port {}", listener.port());
        Ok(BridgeNode {
            listener,
            bridge: Bridge::new(),
        })
    }

    pub fn port(&self) -> u16 {
        self.listener.port()
    }

    /// Serves the rendezvous forever: every routing decision from the bridge
    /// is handed to the transport for fire-and-forget delivery.
    pub fn run(mut self) -> io::Result<()> {
        self.listener.serve(|msg| {
            for (port, out) in self.bridge.handle(msg) {
                transport::send(port, &out);
            }
            true
        })
    }
}

/// Runs an acceptor until its process dies: register, then vote forever.
pub fn run_acceptor(bridge_port: u16) -> Result<(), NodeError> {
    let listener = Listener::bind()?;
    let mut acceptor = Acceptor::new(listener.port());
    info!("acceptor listening on port {}", acceptor.port());

    transport::send(
        bridge_port,
        &Message::Register {
            role: Role::Acceptor,
            port: acceptor.port(),
        },
    );

    listener.serve(|msg| {
        let reply = match msg {
            Message::Prepare { proposer, id } => Some(acceptor.receive_prepare(proposer, id)),
            Message::Accept { id, value } => acceptor.receive_accept(id, value),
            other => {
                warn!(
                    "acceptor {}: ignoring unexpected message {:?}",
                    acceptor.port(),
                    other
                );
                None
            }
        };
        if let Some(reply) = reply {
            transport::send(bridge_port, &reply);
        }
        true
    })?;
    Ok(())
}

/// Runs a proposer through one round: register, wait out the settle delay so
/// acceptors have had a chance to register too, then drive prepare/promise
/// until the accept broadcast goes out.
///
/// Returns once the round completes. A stalled round (no quorum of promises
/// ever arrives) blocks here forever; restarting the round on a timeout is
/// the caller's policy, not this loop's.
pub fn run_proposer(bridge_port: u16, value: String, settle: Duration) -> Result<(), NodeError> {
    let listener = Listener::bind()?;
    let mut proposer = Proposer::new(listener.port(), value);
    info!("proposer listening on port {}", proposer.port());

    transport::send(
        bridge_port,
        &Message::Register {
            role: Role::Proposer,
            port: proposer.port(),
        },
    );
    thread::sleep(settle);

    for out in proposer.start_round() {
        transport::send(bridge_port, &out);
    }

    listener.serve(|msg| {
        let out = match msg {
            Message::QuorumSize { size } => proposer.receive_quorum(size),
            Message::Promise {
                acceptor,
                id,
                accepted_id,
                accepted_value,
                ..
            } => proposer.receive_promise(acceptor, id, accepted_id, accepted_value),
            other => {
                warn!(
                    "proposer {}: ignoring unexpected message {:?}",
                    proposer.port(),
                    other
                );
                Vec::new()
            }
        };
        for msg in out {
            transport::send(bridge_port, &msg);
        }
        !proposer.accept_sent()
    })?;

    info!("proposer {}: round complete", proposer.port());
    Ok(())
}

/// Runs a learner until a value is chosen and returns it.
///
/// A [`ConsensusFault`] ends the node with an error: two values under one
/// proposal id means safety is already lost, and that must be surfaced, not
/// tallied over.
pub fn run_learner(bridge_port: u16) -> Result<Chosen, NodeError> {
    let listener = Listener::bind()?;
    let mut learner = Learner::new(listener.port());
    info!("learner listening on port {}", learner.port());

    for msg in learner.hello() {
        transport::send(bridge_port, &msg);
    }

    let mut fault: Option<ConsensusFault> = None;
    listener.serve(|msg| {
        match msg {
            Message::QuorumSize { size } => learner.set_quorum(size),
            Message::Accepted {
                acceptor,
                id,
                value,
            } => match learner.receive_accepted(acceptor, id, value) {
                Ok(_) => {}
                Err(e) => {
                    error!("learner {}: {}", learner.port(), e);
                    fault = Some(e);
                    return false;
                }
            },
            other => {
                warn!(
                    "learner {}: ignoring unexpected message {:?}",
                    learner.port(),
                    other
                );
            }
        }
        !learner.is_complete()
    })?;

    if let Some(fault) = fault {
        return Err(NodeError::Fault(fault));
    }
    match learner.chosen() {
        Some(chosen) => {
            info!(
                "learner {}: learned value '{}' under proposal {}",
                learner.port(),
                chosen.value,
                chosen.id
            );
            Ok(chosen.clone())
        }
        None => Err(NodeError::Io(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            "listener stopped before a value was learned",
        ))),
    }
}
