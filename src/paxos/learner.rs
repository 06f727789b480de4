use std::collections::HashMap;

use log::{debug, info};

use crate::error::ConsensusFault;
use crate::message::Message;
use crate::proposal::ProposalId;

/// The result of a consensus run: the winning proposal and its value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chosen {
    pub id: ProposalId,
    pub value: String,
}

/// Per-proposal bookkeeping while votes are still being counted.
///
/// `accepts` counts votes received for the proposal; `refs` counts acceptors
/// whose latest vote is this proposal, which is what keeps the entry alive.
struct Tally {
    accepts: usize,
    refs: usize,
    value: String,
}

/// Passively aggregates accepted notifications until one proposal gathers a
/// quorum of acceptor votes.
pub struct Learner {
    port: u16,
    quorum: Option<usize>,
    tallies: HashMap<ProposalId, Tally>,
    last_by_acceptor: HashMap<u16, ProposalId>,
    chosen: Option<Chosen>,
}

impl Learner {
    pub fn new(port: u16) -> Self {
        Learner {
            port,
            quorum: None,
            tallies: HashMap::new(),
            last_by_acceptor: HashMap::new(),
            chosen: None,
        }
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// The registration handshake: announce ourselves and ask for the quorum
    /// size in one go.
    pub fn hello(&self) -> Vec<Message> {
        vec![
            Message::Register {
                role: crate::message::Role::Learner,
                port: self.port,
            },
            Message::QuorumQuery {
                requester: self.port,
            },
        ]
    }

    /// Records the quorum size and re-runs the finalize check over the
    /// tallies already on hand: the quorum reply and the accepted votes race
    /// over independent connections, so the threshold may only become known
    /// after every vote has already been counted.
    pub fn set_quorum(&mut self, size: usize) {
        debug!("learner {}: quorum size is {}", self.port, size);
        self.quorum = Some(size);
        if self.chosen.is_some() {
            return;
        }
        let winner = self
            .tallies
            .iter()
            .find(|(_, tally)| tally.accepts >= size)
            .map(|(&id, tally)| (id, tally.value.clone(), tally.accepts));
        if let Some((id, value, accepts)) = winner {
            self.finalize(id, value, accepts);
        }
    }

    fn finalize(&mut self, id: ProposalId, value: String, accepts: usize) {
        info!(
            "learner {}: proposal {} chosen with value '{}' ({} votes)",
            self.port, id, value, accepts
        );
        self.chosen = Some(Chosen { id, value });
        self.tallies = HashMap::new();
        self.last_by_acceptor = HashMap::new();
    }

    pub fn is_complete(&self) -> bool {
        self.chosen.is_some()
    }

    pub fn chosen(&self) -> Option<&Chosen> {
        self.chosen.as_ref()
    }

    /// Tallies one accepted notification.
    ///
    /// Returns `Ok(Some(..))` the moment a value is chosen, `Ok(None)`
    /// otherwise. Duplicate and stale votes per acceptor are dropped via the
    /// strictly-greater id guard, so one acceptor can never be counted twice
    /// for the same proposal. A vote that contradicts the value already
    /// recorded for its proposal is a [`ConsensusFault`], rejected before any
    /// bookkeeping is touched.
    pub fn receive_accepted(
        &mut self,
        from: u16,
        id: ProposalId,
        value: String,
    ) -> Result<Option<&Chosen>, ConsensusFault> {
        if self.chosen.is_some() {
            return Ok(None);
        }

        let last = self.last_by_acceptor.get(&from).copied();
        if Some(id) <= last {
            debug!(
                "learner {}: stale accepted {} from {} (last {:?})",
                self.port, id, from, last
            );
            return Ok(None);
        }

        // Reject a contradicting vote before recording anything, so a caller
        // that survives the fault still has its bookkeeping intact.
        if let Some(tally) = self.tallies.get(&id) {
            if tally.value != value {
                return Err(ConsensusFault {
                    id,
                    recorded: tally.value.clone(),
                    received: value,
                });
            }
        }

        self.last_by_acceptor.insert(from, id);

        // The acceptor moved on from its previous vote; drop the old tally
        // once nobody references it any more.
        if let Some(prev) = last {
            if let Some(tally) = self.tallies.get_mut(&prev) {
                tally.refs -= 1;
                if tally.refs == 0 {
                    self.tallies.remove(&prev);
                }
            }
        }

        let tally = self.tallies.entry(id).or_insert_with(|| Tally {
            accepts: 0,
            refs: 0,
            value: value.clone(),
        });
        tally.accepts += 1;
        tally.refs += 1;
        let accepts = tally.accepts;

        match self.quorum {
            Some(quorum) if accepts >= quorum => {
                self.finalize(id, value, accepts);
                Ok(self.chosen.as_ref())
            }
            _ => Ok(None),
        }
    }
}
