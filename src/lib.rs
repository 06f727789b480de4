//! Single-value Paxos over a rendezvous bridge.
//!
//! Any number of proposers race to get one value chosen by a majority of
//! acceptors; learners watch the votes and report the outcome. Nodes find
//! each other through the bridge, a registry-plus-router that stands in for
//! real discovery and transport. Messages travel as `;`-separated text
//! frames over one-shot loopback TCP connections and may be lost, duplicated
//! or reordered; safety rests only on proposal-id ordering and quorum
//! counting, never on delivery order.
//!
//! Protocol state machines live in [`paxos`] and [`bridge`] free of any I/O;
//! [`network`] wires them to sockets.

pub mod bridge;
pub mod config;
pub mod error;
pub mod message;
pub mod network;
pub mod paxos;
pub mod proposal;
