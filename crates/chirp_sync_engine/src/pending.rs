//! Bookkeeping for local mutations that race with refreshes.
//!
//! A refresh response can be computed by the server before or after a
//! publish/delete made by this client. The ledger records every confirmed
//! mutation with a sequence number; a refresh remembers the sequence at
//! which it was issued and, when it lands, re-applies the mutations
//! confirmed since then. A confirmed post therefore never disappears
//! because of a stale refresh, and a confirmed delete never comes back.
//!
//! Confirmations are only worth keeping while a refresh is outstanding.
//! The synchronizer records them only in that window and clears the log
//! whenever the refresh lands, fails or is abandoned.

use chirp_protocol::{Post, PostId};
use std::collections::BTreeSet;

/// A mutation sent to the server and not yet answered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PendingMutation {
    /// A publish, identified by its ledger sequence.
    Publish {
        /// Sequence assigned when the publish started.
        seq: u64,
    },
    /// A delete of this post.
    Delete {
        /// Target post.
        id: PostId,
    },
}

#[derive(Debug, Clone)]
enum Confirmed {
    Published(Post),
    Deleted(PostId),
}

#[derive(Debug, Default)]
pub(crate) struct MutationLedger {
    next_seq: u64,
    in_flight: Vec<PendingMutation>,
    confirmed: Vec<(u64, Confirmed)>,
}

impl MutationLedger {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// The sequence a refresh issued now should remember.
    pub(crate) fn mark(&self) -> u64 {
        self.next_seq
    }

    pub(crate) fn begin_publish(&mut self) -> u64 {
        let seq = self.bump();
        self.in_flight.push(PendingMutation::Publish { seq });
        seq
    }

    pub(crate) fn finish_publish(&mut self, seq: u64) {
        self.in_flight
            .retain(|m| !matches!(m, PendingMutation::Publish { seq: s } if *s == seq));
    }

    /// Registers a delete. Returns false if one is already in flight for
    /// this post.
    pub(crate) fn begin_delete(&mut self, id: &PostId) -> bool {
        if self.is_deleting(id) {
            return false;
        }
        self.in_flight.push(PendingMutation::Delete { id: id.clone() });
        true
    }

    pub(crate) fn finish_delete(&mut self, id: &PostId) {
        self.in_flight
            .retain(|m| !matches!(m, PendingMutation::Delete { id: d } if d == id));
    }

    pub(crate) fn is_deleting(&self, id: &PostId) -> bool {
        self.in_flight
            .iter()
            .any(|m| matches!(m, PendingMutation::Delete { id: d } if d == id))
    }

    pub(crate) fn in_flight(&self) -> &[PendingMutation] {
        &self.in_flight
    }

    pub(crate) fn confirm_published(&mut self, post: Post) {
        let seq = self.bump();
        self.confirmed.push((seq, Confirmed::Published(post)));
    }

    pub(crate) fn confirm_deleted(&mut self, id: PostId) {
        let seq = self.bump();
        self.confirmed.push((seq, Confirmed::Deleted(id)));
    }

    /// Re-applies every mutation confirmed at or after `since` onto a
    /// freshly fetched list. Posts already present are left as served.
    pub(crate) fn reapply(&self, since: u64, posts: &mut Vec<Post>) {
        let mut present: BTreeSet<PostId> = posts.iter().map(|p| p.id.clone()).collect();
        for (_, mutation) in self.confirmed.iter().filter(|(seq, _)| *seq >= since) {
            match mutation {
                Confirmed::Published(post) => {
                    if present.insert(post.id.clone()) {
                        posts.push(post.clone());
                    }
                }
                Confirmed::Deleted(id) => {
                    if present.remove(id) {
                        posts.retain(|p| &p.id != id);
                    }
                }
            }
        }
    }

    /// Forgets every confirmation. Called when no refresh is outstanding
    /// any more.
    pub(crate) fn clear_confirmed(&mut self) {
        self.confirmed.clear();
    }

    #[cfg(test)]
    pub(crate) fn confirmed_len(&self) -> usize {
        self.confirmed.len()
    }

    fn bump(&mut self) -> u64 {
        let seq = self.next_seq;
        self.next_seq += 1;
        seq
    }
}
