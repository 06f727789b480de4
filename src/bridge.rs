use log::{debug, info, warn};

use crate::message::{Message, Role};

/// The membership lists, one per role. Append-only for the lifetime of the
/// run: there is no leave or failure detection, a dead node is simply one
/// that stops answering. Owned by the bridge and never handed out raw.
#[derive(Default)]
pub struct Registry {
    acceptors: Vec<u16>,
    proposers: Vec<u16>,
    learners: Vec<u16>,
}

impl Registry {
    pub fn new() -> Self {
        Registry::default()
    }

    /// Records a participant under its role. Re-registration (a restarted
    /// node announcing the same port again) is a no-op rather than a
    /// duplicate entry, so one node can never count twice in a broadcast.
    pub fn register(&mut self, role: Role, port: u16) {
        let list = match role {
            Role::Proposer => &mut self.proposers,
            Role::Acceptor => &mut self.acceptors,
            Role::Learner => &mut self.learners,
        };
        if list.contains(&port) {
            debug!("registry: {} {} already registered", role, port);
        } else {
            info!("registry: registered {} {}", role, port);
            list.push(port);
        }
    }

    pub fn acceptors(&self) -> &[u16] {
        &self.acceptors
    }

    pub fn learners(&self) -> &[u16] {
        &self.learners
    }

    /// The threshold handed to proposers and learners: `floor(n/2)` for `n`
    /// registered acceptors. Both roles compare with `count >= quorum`, so
    /// this is "majority minus one" on the wire; the pairing of this value
    /// with the `>=` checks is the protocol's quorum arithmetic and must stay
    /// exactly as is.
    pub fn quorum_size(&self) -> usize {
        self.acceptors.len() / 2
    }
}

/// The rendezvous router: records who exists and relays every protocol
/// message to its audience. Holds no protocol state of its own.
pub struct Bridge {
    registry: Registry,
}

impl Default for Bridge {
    fn default() -> Self {
        Bridge::new()
    }
}

impl Bridge {
    pub fn new() -> Self {
        Bridge {
            registry: Registry::new(),
        }
    }

    /// Routes one inbound message, returning `(destination port, message)`
    /// pairs for the caller to deliver. Pure bookkeeping: delivery, retries
    /// and drops are the transport's business.
    pub fn handle(&mut self, msg: Message) -> Vec<(u16, Message)> {
        match msg {
            Message::Register { role, port } => {
                self.registry.register(role, port);
                Vec::new()
            }
            Message::Prepare { .. } => self.broadcast(self.registry.acceptors(), msg),
            Message::Promise { proposer, .. } => vec![(proposer, msg)],
            Message::Accept { .. } => self.broadcast(self.registry.acceptors(), msg),
            Message::Accepted { .. } => self.broadcast(self.registry.learners(), msg),
            Message::QuorumQuery { requester } => vec![(
                requester,
                Message::QuorumSize {
                    size: self.registry.quorum_size(),
                },
            )],
            Message::QuorumSize { .. } => {
                warn!("bridge: discarding stray quorum reply");
                Vec::new()
            }
        }
    }

    fn broadcast(&self, ports: &[u16], msg: Message) -> Vec<(u16, Message)> {
        ports.iter().map(|&port| (port, msg.clone())).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proposal::ProposalId;

    #[test]
    fn quorum_is_floor_of_half() {
        let mut reg = Registry::new();
        assert_eq!(reg.quorum_size(), 0);
        for (n, expected) in [(1u16, 0usize), (2, 1), (3, 1), (4, 2), (5, 2)] {
            reg.register(Role::Acceptor, 9100 + n);
            assert_eq!(reg.quorum_size(), expected, "n = {}", n);
        }
    }

    #[test]
    fn re_registration_does_not_duplicate() {
        let mut reg = Registry::new();
        reg.register(Role::Acceptor, 9100);
        reg.register(Role::Acceptor, 9100);
        assert_eq!(reg.acceptors(), &[9100]);
        assert_eq!(reg.quorum_size(), 0);
    }

    #[test]
    fn prepare_fans_out_to_all_acceptors() {
        let mut bridge = Bridge::new();
        for port in [9100, 9101, 9102] {
            bridge.handle(Message::Register {
                role: Role::Acceptor,
                port,
            });
        }
        let msg = Message::Prepare {
            proposer: 9001,
            id: ProposalId::new(1, 9001),
        };
        let out = bridge.handle(msg.clone());
        assert_eq!(
            out,
            vec![(9100, msg.clone()), (9101, msg.clone()), (9102, msg)]
        );
    }

    #[test]
    fn promise_goes_only_to_its_proposer() {
        let mut bridge = Bridge::new();
        bridge.handle(Message::Register {
            role: Role::Proposer,
            port: 9001,
        });
        let msg = Message::Promise {
            acceptor: 9100,
            proposer: 9001,
            id: ProposalId::new(1, 9001),
            accepted_id: None,
            accepted_value: None,
        };
        assert_eq!(bridge.handle(msg.clone()), vec![(9001, msg)]);
    }

    #[test]
    fn accepted_fans_out_to_all_learners() {
        let mut bridge = Bridge::new();
        for port in [9200, 9201] {
            bridge.handle(Message::Register {
                role: Role::Learner,
                port,
            });
        }
        let msg = Message::Accepted {
            acceptor: 9100,
            id: ProposalId::new(1, 9001),
            value: "X".to_string(),
        };
        let out = bridge.handle(msg.clone());
        assert_eq!(out, vec![(9200, msg.clone()), (9201, msg)]);
    }

    #[test]
    fn quorum_query_is_answered_to_the_requester() {
        let mut bridge = Bridge::new();
        for port in [9100, 9101, 9102] {
            bridge.handle(Message::Register {
                role: Role::Acceptor,
                port,
            });
        }
        let out = bridge.handle(Message::QuorumQuery { requester: 9001 });
        assert_eq!(out, vec![(9001, Message::QuorumSize { size: 1 })]);
    }

    #[test]
    fn stray_quorum_reply_is_discarded() {
        let mut bridge = Bridge::new();
        assert_eq!(bridge.handle(Message::QuorumSize { size: 3 }), Vec::new());
    }
}
