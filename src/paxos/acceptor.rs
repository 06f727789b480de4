use log::{debug, info};

use crate::message::Message;
use crate::proposal::ProposalId;

/// The passive voter of the protocol.
///
/// Holds the promise/accept state for one consensus instance. State lives in
/// process memory only and is mutated exclusively by this acceptor's own
/// handlers, driven one message at a time by its serve loop.
pub struct Acceptor {
    port: u16,
    promised_id: Option<ProposalId>,
    accepted: Option<(ProposalId, String)>,
}

impl Acceptor {
    pub fn new(port: u16) -> Self {
        Acceptor {
            port,
            promised_id: None,
            accepted: None,
        }
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn promised_id(&self) -> Option<ProposalId> {
        self.promised_id
    }

    pub fn accepted(&self) -> Option<&(ProposalId, String)> {
        self.accepted.as_ref()
    }

    /// Phase 1a handler. Raises the promise when the incoming id beats it,
    /// and replies with the current state snapshot either way: a prepare that
    /// lost the race still gets a promise carrying the higher id, which tells
    /// the slow proposer what it is up against.
    pub fn receive_prepare(&mut self, proposer: u16, id: ProposalId) -> Message {
        if Some(id) > self.promised_id {
            info!("acceptor {}: promising proposal {}", self.port, id);
            self.promised_id = Some(id);
        } else {
            debug!(
                "acceptor {}: prepare {} does not beat promise {:?}",
                self.port, id, self.promised_id
            );
        }

        let (accepted_id, accepted_value) = match &self.accepted {
            Some((id, value)) => (Some(*id), Some(value.clone())),
            None => (None, None),
        };
        Message::Promise {
            acceptor: self.port,
            proposer,
            // The snapshot after the update; always Some here.
            id: self.promised_id.unwrap_or(id),
            accepted_id,
            accepted_value,
        }
    }

    /// Phase 2a handler. Accepts any id at or above the promise and announces
    /// it to the learners; anything lower is dropped without a reply, so a
    /// losing proposer only learns of its loss by timing out.
    pub fn receive_accept(&mut self, id: ProposalId, value: String) -> Option<Message> {
        if Some(id) >= self.promised_id {
            info!(
                "acceptor {}: accepting proposal {} with value '{}'",
                self.port, id, value
            );
            self.promised_id = Some(id);
            self.accepted = Some((id, value.clone()));
            Some(Message::Accepted {
                acceptor: self.port,
                id,
                value,
            })
        } else {
            debug!(
                "acceptor {}: ignoring accept {} below promise {:?}",
                self.port, id, self.promised_id
            );
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_prepare_is_promised() {
        let mut acc = Acceptor::new(9100);
        let id = ProposalId::new(1, 9001);
        let reply = acc.receive_prepare(9001, id);
        assert_eq!(acc.promised_id(), Some(id));
        assert_eq!(
            reply,
            Message::Promise {
                acceptor: 9100,
                proposer: 9001,
                id,
                accepted_id: None,
                accepted_value: None,
            }
        );
    }

    #[test]
    fn losing_prepare_still_gets_a_reply() {
        let mut acc = Acceptor::new(9100);
        let high = ProposalId::new(5, 9002);
        acc.receive_prepare(9002, high);

        let low = ProposalId::new(1, 9001);
        let reply = acc.receive_prepare(9001, low);
        // Promise unchanged, but the reply fires and carries the higher id.
        assert_eq!(acc.promised_id(), Some(high));
        assert!(matches!(reply, Message::Promise { id, .. } if id == high));
    }

    #[test]
    fn accept_at_or_above_promise_is_taken() {
        let mut acc = Acceptor::new(9100);
        let id = ProposalId::new(1, 9001);
        acc.receive_prepare(9001, id);

        let out = acc.receive_accept(id, "X".to_string());
        assert_eq!(acc.accepted(), Some(&(id, "X".to_string())));
        assert_eq!(
            out,
            Some(Message::Accepted {
                acceptor: 9100,
                id,
                value: "X".to_string(),
            })
        );
    }

    #[test]
    fn accept_below_promise_is_silently_ignored() {
        // Promised (2,6) to another proposer; accept for (1,5) must be dropped.
        let mut acc = Acceptor::new(9100);
        acc.receive_prepare(6, ProposalId::new(2, 6));

        let out = acc.receive_accept(ProposalId::new(1, 5), "X".to_string());
        assert_eq!(out, None);
        assert_eq!(acc.accepted(), None);
        assert_eq!(acc.promised_id(), Some(ProposalId::new(2, 6)));
    }

    #[test]
    fn accepted_id_never_decreases() {
        let mut acc = Acceptor::new(9100);
        let first = ProposalId::new(2, 9001);
        let second = ProposalId::new(3, 9002);

        assert!(acc.receive_accept(first, "X".to_string()).is_some());
        assert!(acc.receive_accept(second, "Y".to_string()).is_some());
        assert_eq!(acc.accepted(), Some(&(second, "Y".to_string())));

        // Stale accept after moving on: ignored, state keeps the higher id.
        assert!(acc.receive_accept(first, "X".to_string()).is_none());
        assert_eq!(acc.accepted(), Some(&(second, "Y".to_string())));
    }

    #[test]
    fn prepare_after_accept_discloses_the_accepted_value() {
        // The promise reply to a later proposer must disclose the previously
        // accepted (id, value) so that proposer can adopt it.
        let mut acc = Acceptor::new(9100);
        let old = ProposalId::new(1, 9001);
        acc.receive_accept(old, "X".to_string());

        let new = ProposalId::new(2, 9002);
        let reply = acc.receive_prepare(9002, new);
        assert_eq!(
            reply,
            Message::Promise {
                acceptor: 9100,
                proposer: 9002,
                id: new,
                accepted_id: Some(old),
                accepted_value: Some("X".to_string()),
            }
        );
    }
}
