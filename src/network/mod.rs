//! Point-to-point plumbing: the frame codec lives in [`crate::message`],
//! this module owns the sockets and the per-role serve loops.

pub mod node;
pub mod transport;
