//! The three protocol roles.
//!
//! Each role is a plain state machine: handlers take one inbound message and
//! return the messages to send, without touching the network. The loops in
//! [`crate::network::node`] wire them to a listener and the bridge.

pub mod acceptor;
pub mod learner;
pub mod proposer;

pub use acceptor::Acceptor;
pub use learner::{Chosen, Learner};
pub use proposer::Proposer;
