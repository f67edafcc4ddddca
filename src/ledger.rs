use std::sync::atomic::{AtomicBool, Ordering};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::authorizer::{AuthError, AuthorizedVoter, IdentityAuthorizer};
use crate::config::ElectionConfig;
use crate::identity::{ElectionId, Identity};
use crate::lifecycle::{ElectionState, Lifecycle, LifecycleError};
use crate::records::{IntegrityError, LinkHash, VoteChain, VoteReceipt};
use crate::snapshot::LedgerSnapshot;
use crate::tally::Tally;
use crate::voters::VoterRegistry;

/// A registered candidate and their running count.
#[derive(Debug, Clone, Eq, PartialEq, Deserialize, Serialize)]
pub struct Candidate {
    pub name: String,
    pub vote_count: u64,
}

impl Candidate {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            vote_count: 0,
        }
    }
}

/// Why a vote was refused.
///
/// Apart from [`VoteError::CorruptedLedger`], these are checked in
/// declaration order, and the first failing check is the one reported.
#[derive(Debug, Clone, Eq, PartialEq, thiserror::Error)]
pub enum VoteError {
    #[error("the ledger failed an integrity check and accepts no further writes")]
    CorruptedLedger,
    #[error("the election is not accepting votes")]
    ElectionNotActive,
    #[error("this voter has already voted")]
    AlreadyVoted,
    #[error("no such candidate")]
    InvalidCandidate,
    #[error("the maximum number of voters has been reached")]
    CapacityReached,
}

/// Why a candidate could not be registered.
#[derive(Debug, Clone, Eq, PartialEq, thiserror::Error)]
pub enum RegistrationError {
    #[error("the ledger failed an integrity check and accepts no further writes")]
    CorruptedLedger,
    #[error("candidates can only be added before the election starts")]
    RegistrationClosed,
    #[error("a candidate named {0:?} already exists")]
    DuplicateCandidateName(String),
}

/// The vote state of one election.
///
/// This is the only place vote counts, voter records and the vote chain are
/// modified. It performs no locking itself; the owning [`crate::Election`]
/// serializes writers.
#[derive(Debug)]
pub struct ElectionLedger {
    candidates: Vec<Candidate>,
    voters: VoterRegistry,
    chain: VoteChain,
    lifecycle: Lifecycle,
    max_voters: u64,
    voter_count: u64,
    corrupted: AtomicBool,
}

impl ElectionLedger {
    /// Create an empty ledger. `config` must already be validated.
    pub fn new(config: &ElectionConfig, context: &ElectionId) -> Self {
        Self {
            candidates: config.candidates.iter().map(Candidate::new).collect(),
            voters: VoterRegistry::new(),
            chain: VoteChain::new(LinkHash::genesis(context)),
            lifecycle: Lifecycle::new(config.start_time, config.end_time, config.admin),
            max_voters: config.max_voters,
            voter_count: 0,
            corrupted: AtomicBool::new(false),
        }
    }

    /// Rebuild a ledger from a snapshot that has passed its audit.
    pub(crate) fn from_audited(snapshot: LedgerSnapshot, voters: VoterRegistry) -> Self {
        let chain = VoteChain::from_records(LinkHash::genesis(&snapshot.context), snapshot.records);
        Self {
            candidates: snapshot.candidates,
            voters,
            voter_count: chain.len(),
            chain,
            lifecycle: snapshot.lifecycle,
            max_voters: snapshot.max_voters,
            corrupted: AtomicBool::new(false),
        }
    }

    pub fn candidates(&self) -> &[Candidate] {
        &self.candidates
    }

    pub fn voters(&self) -> &VoterRegistry {
        &self.voters
    }

    pub fn chain(&self) -> &VoteChain {
        &self.chain
    }

    pub fn lifecycle(&self) -> &Lifecycle {
        &self.lifecycle
    }

    pub fn max_voters(&self) -> u64 {
        self.max_voters
    }

    pub fn voter_count(&self) -> u64 {
        self.voter_count
    }

    pub fn state(&self, now: u64) -> ElectionState {
        self.lifecycle.state(now)
    }

    pub fn is_corrupted(&self) -> bool {
        self.corrupted.load(Ordering::SeqCst)
    }

    /// Look up a candidate's index by exact, case-sensitive name.
    pub fn candidate_index(&self, name: &str) -> Option<usize> {
        self.candidates
            .iter()
            .position(|candidate| candidate.name == name)
    }

    /// Register another candidate before the election starts.
    pub fn add_candidate(
        &mut self,
        name: impl Into<String>,
        now: u64,
    ) -> Result<usize, RegistrationError> {
        if self.is_corrupted() {
            return Err(RegistrationError::CorruptedLedger);
        }
        if !self.lifecycle.accepts_registrations(now) {
            return Err(RegistrationError::RegistrationClosed);
        }
        let name = name.into();
        if self.candidate_index(&name).is_some() {
            return Err(RegistrationError::DuplicateCandidateName(name));
        }

        info!(candidate = %name, "candidate registered");
        self.candidates.push(Candidate::new(name));
        Ok(self.candidates.len() - 1)
    }

    /// Fail if the ledger has been found corrupted.
    pub fn ensure_writable(&self) -> Result<(), VoteError> {
        if self.is_corrupted() {
            Err(VoteError::CorruptedLedger)
        } else {
            Ok(())
        }
    }

    /// Record a vote from an authorized voter.
    ///
    /// All checks run before any state changes, so a refused vote leaves the
    /// ledger untouched.
    pub fn cast_vote(
        &mut self,
        candidate_index: u64,
        voter: AuthorizedVoter,
        now: u64,
    ) -> Result<VoteReceipt, VoteError> {
        self.ensure_writable()?;
        if !self.lifecycle.is_active(now) {
            return Err(VoteError::ElectionNotActive);
        }
        if self.voters.has_voted(voter.identity()) {
            return Err(VoteError::AlreadyVoted);
        }
        if candidate_index >= self.candidates.len() as u64 {
            return Err(VoteError::InvalidCandidate);
        }
        if self.voter_count >= self.max_voters {
            return Err(VoteError::CapacityReached);
        }

        self.voters.record_mut(*voter.identity()).has_voted = true;
        self.voter_count += 1;
        self.candidates[candidate_index as usize].vote_count += 1;
        let receipt = self.chain.append(candidate_index, now);

        debug!(sequence_index = receipt.sequence_index, "vote appended");
        Ok(receipt)
    }

    /// Record a vote for the candidate with the given name.
    ///
    /// Unknown names resolve to an out-of-range index and so fail exactly
    /// where an invalid index would.
    pub fn cast_vote_by_name(
        &mut self,
        name: &str,
        voter: AuthorizedVoter,
        now: u64,
    ) -> Result<VoteReceipt, VoteError> {
        let index = self.candidate_index(name).unwrap_or(self.candidates.len());
        self.cast_vote(index as u64, voter, now)
    }

    /// Authenticate a relayed vote, consuming the voter's nonce on success.
    ///
    /// Only the nonce is touched here. The vote itself still has to go
    /// through [`ElectionLedger::cast_vote`].
    pub fn authorize_signed(
        &mut self,
        authorizer: &IdentityAuthorizer,
        candidate_index: u64,
        identity: Identity,
        nonce: u64,
        signature: &[u8],
    ) -> Result<AuthorizedVoter, AuthError> {
        authorizer.verify_signed(&mut self.voters, candidate_index, identity, nonce, signature)
    }

    pub fn end_election(&mut self, caller: &Identity, now: u64) -> Result<(), LifecycleError> {
        if self.is_corrupted() {
            return Err(LifecycleError::CorruptedLedger);
        }
        self.lifecycle.end(caller, now)
    }

    /// Recompute the vote chain. A failure marks the ledger as corrupted, and
    /// it will refuse all further writes.
    pub fn verify_chain_integrity(&self) -> bool {
        match self.chain.verify() {
            Ok(()) => true,
            Err(err) => {
                self.mark_corrupted(&err);
                false
            }
        }
    }

    /// Latch the ledger into its corrupted state.
    pub(crate) fn mark_corrupted(&self, err: &IntegrityError) {
        warn!(%err, "vote chain failed verification, halting writes");
        self.corrupted.store(true, Ordering::SeqCst);
    }

    /// Copy what the tally needs.
    pub fn tally(&self) -> Tally {
        Tally {
            candidates: self.candidates.clone(),
            voter_count: self.voter_count,
            max_voters: self.max_voters,
            lifecycle: self.lifecycle.clone(),
        }
    }

    pub fn snapshot(&self, context: &ElectionId) -> LedgerSnapshot {
        LedgerSnapshot {
            context: *context,
            max_voters: self.max_voters,
            lifecycle: self.lifecycle.clone(),
            candidates: self.candidates.clone(),
            voters: self.voters.to_sorted_vec(),
            records: self.chain.records().to_vec(),
        }
    }

    #[cfg(test)]
    pub(crate) fn chain_mut(&mut self) -> &mut VoteChain {
        &mut self.chain
    }
}
