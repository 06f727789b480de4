use std::collections::HashSet;

use log::{debug, info};

use crate::message::Message;
use crate::proposal::ProposalId;

/// Drives the two-phase protocol to get a value chosen.
///
/// A round either completes (the accept broadcast goes out) or stalls; there
/// is no internal timeout. Callers wanting retry semantics call
/// [`Proposer::start_round`] again, which abandons the stalled round.
pub struct Proposer {
    port: u16,
    proposed_value: String,
    proposal_id: Option<ProposalId>,
    next_round: u64,
    quorum: Option<usize>,
    promises: HashSet<u16>,
    last_accepted_id: Option<ProposalId>,
    prepare_sent: bool,
    accept_sent: bool,
}

impl Proposer {
    pub fn new(port: u16, value: String) -> Self {
        Proposer {
            port,
            proposed_value: value,
            proposal_id: None,
            next_round: 1,
            quorum: None,
            promises: HashSet::new(),
            last_accepted_id: None,
            prepare_sent: false,
            accept_sent: false,
        }
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn proposal_id(&self) -> Option<ProposalId> {
        self.proposal_id
    }

    pub fn promise_count(&self) -> usize {
        self.promises.len()
    }

    /// True once this round's accept broadcast has gone out.
    pub fn accept_sent(&self) -> bool {
        self.accept_sent
    }

    /// Opens a new round with a fresh proposal id, abandoning any round in
    /// flight. Always re-queries the quorum size; the prepare broadcast is
    /// deferred until the quorum is known so no later threshold check can run
    /// against an undefined quorum.
    pub fn start_round(&mut self) -> Vec<Message> {
        let id = ProposalId::new(self.next_round, self.port);
        self.next_round += 1;
        self.proposal_id = Some(id);
        self.promises.clear();
        self.prepare_sent = false;
        self.accept_sent = false;
        info!("proposer {}: starting round with proposal {}", self.port, id);

        let mut out = vec![Message::QuorumQuery {
            requester: self.port,
        }];
        if self.quorum.is_some() {
            out.push(self.prepare_message(id));
        } else {
            debug!(
                "proposer {}: quorum unknown, deferring prepare for {}",
                self.port, id
            );
        }
        out
    }

    /// Handles the bridge's quorum-size reply. Flushes a deferred prepare for
    /// the open round, if any.
    pub fn receive_quorum(&mut self, size: usize) -> Vec<Message> {
        debug!("proposer {}: quorum size is {}", self.port, size);
        self.quorum = Some(size);
        match self.proposal_id {
            Some(id) if !self.prepare_sent => vec![self.prepare_message(id)],
            _ => Vec::new(),
        }
    }

    /// Handles a promise from an acceptor.
    ///
    /// Stale or foreign rounds and duplicate senders are ignored. If the
    /// acceptor discloses a previously accepted value under the highest id
    /// seen so far, that value replaces ours: the round may only try to
    /// finish what an earlier quorum may already have chosen. The accept
    /// broadcast fires exactly once, the first time the promise count reaches
    /// the quorum.
    pub fn receive_promise(
        &mut self,
        from: u16,
        id: ProposalId,
        prev_accepted_id: Option<ProposalId>,
        prev_accepted_value: Option<String>,
    ) -> Vec<Message> {
        if self.proposal_id != Some(id) || self.promises.contains(&from) {
            debug!(
                "proposer {}: ignoring promise for {} from {}",
                self.port, id, from
            );
            return Vec::new();
        }
        self.promises.insert(from);

        if prev_accepted_id > self.last_accepted_id {
            self.last_accepted_id = prev_accepted_id;
            if let Some(value) = prev_accepted_value {
                info!(
                    "proposer {}: adopting previously accepted value '{}' from {:?}",
                    self.port, value, prev_accepted_id
                );
                self.proposed_value = value;
            }
        }

        let quorum = match self.quorum {
            Some(q) => q,
            None => return Vec::new(),
        };
        if self.promises.len() >= quorum && !self.accept_sent {
            self.accept_sent = true;
            info!(
                "proposer {}: quorum of promises reached, requesting accept of '{}' under {}",
                self.port, self.proposed_value, id
            );
            return vec![Message::Accept {
                id,
                value: self.proposed_value.clone(),
            }];
        }
        Vec::new()
    }

    fn prepare_message(&mut self, id: ProposalId) -> Message {
        self.prepare_sent = true;
        Message::Prepare {
            proposer: self.port,
            id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn promise(from: u16, id: ProposalId) -> (u16, ProposalId, Option<ProposalId>, Option<String>) {
        (from, id, None, None)
    }

    #[test]
    fn round_queries_quorum_and_prepares() {
        let mut prop = Proposer::new(9001, "X".to_string());
        prop.receive_quorum(1);
        let out = prop.start_round();
        assert_eq!(
            out,
            vec![
                Message::QuorumQuery { requester: 9001 },
                Message::Prepare {
                    proposer: 9001,
                    id: ProposalId::new(1, 9001),
                },
            ]
        );
    }

    #[test]
    fn prepare_is_deferred_until_quorum_is_known() {
        let mut prop = Proposer::new(9001, "X".to_string());
        let out = prop.start_round();
        assert_eq!(out, vec![Message::QuorumQuery { requester: 9001 }]);

        // The quorum reply flushes the deferred prepare, exactly once.
        let out = prop.receive_quorum(1);
        assert_eq!(
            out,
            vec![Message::Prepare {
                proposer: 9001,
                id: ProposalId::new(1, 9001),
            }]
        );
        assert_eq!(prop.receive_quorum(1), Vec::new());
    }

    #[test]
    fn rounds_never_reuse_a_number() {
        let mut prop = Proposer::new(9001, "X".to_string());
        prop.start_round();
        assert_eq!(prop.proposal_id(), Some(ProposalId::new(1, 9001)));
        prop.start_round();
        assert_eq!(prop.proposal_id(), Some(ProposalId::new(2, 9001)));
    }

    #[test]
    fn accept_fires_once_at_quorum() {
        let mut prop = Proposer::new(9001, "X".to_string());
        prop.receive_quorum(2);
        prop.start_round();
        let id = prop.proposal_id().unwrap();

        let (f, i, p, v) = promise(9100, id);
        assert_eq!(prop.receive_promise(f, i, p, v), Vec::new());
        let (f, i, p, v) = promise(9101, id);
        assert_eq!(
            prop.receive_promise(f, i, p, v),
            vec![Message::Accept {
                id,
                value: "X".to_string(),
            }]
        );
        // A third promise past the threshold must not re-broadcast.
        let (f, i, p, v) = promise(9102, id);
        assert_eq!(prop.receive_promise(f, i, p, v), Vec::new());
    }

    #[test]
    fn duplicate_promises_count_once() {
        let mut prop = Proposer::new(9001, "X".to_string());
        prop.receive_quorum(2);
        prop.start_round();
        let id = prop.proposal_id().unwrap();

        let (f, i, p, v) = promise(9100, id);
        prop.receive_promise(f, i, p, v);
        let (f, i, p, v) = promise(9100, id);
        assert_eq!(prop.receive_promise(f, i, p, v), Vec::new());
        assert_eq!(prop.promise_count(), 1);
    }

    #[test]
    fn stale_round_promises_are_ignored() {
        let mut prop = Proposer::new(9001, "X".to_string());
        prop.receive_quorum(1);
        prop.start_round();
        let stale = prop.proposal_id().unwrap();
        prop.start_round();

        let (f, i, p, v) = promise(9100, stale);
        assert_eq!(prop.receive_promise(f, i, p, v), Vec::new());
        assert_eq!(prop.promise_count(), 0);
    }

    #[test]
    fn adopts_the_highest_previously_accepted_value() {
        // An acceptor already voted "X" under (1,9000); our value must yield.
        let mut prop = Proposer::new(9002, "Y".to_string());
        prop.receive_quorum(2);
        prop.start_round();
        let id = prop.proposal_id().unwrap();

        prop.receive_promise(
            9100,
            id,
            Some(ProposalId::new(1, 9000)),
            Some("X".to_string()),
        );
        let out = prop.receive_promise(9101, id, None, None);
        assert_eq!(
            out,
            vec![Message::Accept {
                id,
                value: "X".to_string(),
            }]
        );
    }

    #[test]
    fn keeps_the_value_of_the_highest_id_among_several() {
        let mut prop = Proposer::new(9003, "mine".to_string());
        prop.receive_quorum(3);
        prop.start_round();
        let id = prop.proposal_id().unwrap();

        prop.receive_promise(
            9100,
            id,
            Some(ProposalId::new(2, 9002)),
            Some("newer".to_string()),
        );
        // Lower prior id arrives later; it must not displace "newer".
        prop.receive_promise(
            9101,
            id,
            Some(ProposalId::new(1, 9001)),
            Some("older".to_string()),
        );
        let out = prop.receive_promise(9102, id, None, None);
        assert_eq!(
            out,
            vec![Message::Accept {
                id,
                value: "newer".to_string(),
            }]
        );
    }

    #[test]
    fn promises_before_quorum_reply_do_not_trigger_accept() {
        let mut prop = Proposer::new(9001, "X".to_string());
        prop.start_round();
        // Promise arrives while the quorum is still unknown (the prepare was
        // deferred, but simulate an early/duplicate delivery anyway).
        let id = prop.proposal_id().unwrap();
        assert_eq!(prop.receive_promise(9100, id, None, None), Vec::new());

        // Once the quorum lands, the next promise completes the round.
        prop.receive_quorum(2);
        let out = prop.receive_promise(9101, id, None, None);
        assert_eq!(
            out,
            vec![Message::Accept {
                id,
                value: "X".to_string(),
            }]
        );
    }
}
