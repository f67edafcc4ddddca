use parking_lot::RwLock;
use rand::{CryptoRng, RngCore};
use tracing::info;

use crate::authorizer::{AuthError, IdentityAuthorizer};
use crate::clock::{Clock, SystemClock};
use crate::config::{ElectionConfig, SetupError};
use crate::identity::{ElectionId, Identity};
use crate::ledger::{Candidate, ElectionLedger, RegistrationError, VoteError};
use crate::lifecycle::{ElectionState, LifecycleError};
use crate::records::{IntegrityError, VoteReceipt, VoteRecord};
use crate::snapshot::LedgerSnapshot;
use crate::tally::{ElectionStats, Tally, TallyError, WinnerResult};

/// Any error an election operation can produce.
#[derive(Debug, Clone, Eq, PartialEq, thiserror::Error)]
pub enum ElectionError {
    #[error(transparent)]
    Setup(#[from] SetupError),
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error(transparent)]
    Vote(#[from] VoteError),
    #[error(transparent)]
    Registration(#[from] RegistrationError),
    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),
    #[error(transparent)]
    Tally(#[from] TallyError),
    #[error(transparent)]
    Integrity(#[from] IntegrityError),
}

/// A single election.
///
/// All writes take the election's exclusive lock for the whole
/// check-then-apply sequence. Reads take the shared lock only long enough to
/// copy what they need. Elections share no state with each other.
#[derive(Debug)]
pub struct Election<C = SystemClock> {
    authorizer: IdentityAuthorizer,
    ledger: RwLock<ElectionLedger>,
    clock: C,
}

impl<C: Clock> Election<C> {
    /// Create a new election with a fresh signing context.
    ///
    /// `unique_bytes` are mixed into the context alongside random salt.
    pub fn create(
        config: ElectionConfig,
        unique_bytes: &[&[u8]],
        rng: impl RngCore + CryptoRng,
        clock: C,
    ) -> Result<Self, SetupError> {
        config.validate()?;
        let context = ElectionId::new(unique_bytes, rng);
        info!(
            election = %context,
            candidates = config.candidates.len(),
            max_voters = config.max_voters,
            start_time = config.start_time,
            end_time = config.end_time,
            "election created"
        );

        Ok(Self {
            ledger: RwLock::new(ElectionLedger::new(&config, &context)),
            authorizer: IdentityAuthorizer::new(context),
            clock,
        })
    }

    /// Resume an election from a snapshot. The snapshot must audit clean.
    pub fn restore(snapshot: LedgerSnapshot, clock: C) -> Result<Self, IntegrityError> {
        let voters = snapshot.audit_voters()?;
        let context = snapshot.context;
        info!(election = %context, records = snapshot.records.len(), "election restored");

        Ok(Self {
            ledger: RwLock::new(ElectionLedger::from_audited(snapshot, voters)),
            authorizer: IdentityAuthorizer::new(context),
            clock,
        })
    }

    pub fn id(&self) -> &ElectionId {
        self.authorizer.context()
    }

    pub fn now(&self) -> u64 {
        self.clock.now()
    }

    /// Cast a vote on behalf of the caller, who is `identity`.
    pub fn cast_vote(&self, candidate_index: u64, identity: Identity) -> Result<VoteReceipt, VoteError> {
        let voter = self.authorizer.verify_direct(identity);
        let mut ledger = self.ledger.write();
        let now = self.clock.now();
        ledger.cast_vote(candidate_index, voter, now)
    }

    /// Cast a vote for a candidate by name.
    pub fn cast_vote_by_name(&self, name: &str, identity: Identity) -> Result<VoteReceipt, VoteError> {
        let voter = self.authorizer.verify_direct(identity);
        let mut ledger = self.ledger.write();
        let now = self.clock.now();
        ledger.cast_vote_by_name(name, voter, now)
    }

    /// Cast a vote relayed on behalf of `identity`, authenticated by its signature.
    ///
    /// A valid signature consumes the voter's nonce even if the vote is then
    /// refused, so the same signature can never be replayed.
    pub fn cast_signed_vote(
        &self,
        candidate_index: u64,
        identity: Identity,
        nonce: u64,
        signature: &[u8],
    ) -> Result<VoteReceipt, ElectionError> {
        let mut ledger = self.ledger.write();
        ledger.ensure_writable()?;
        let voter = ledger.authorize_signed(
            &self.authorizer,
            candidate_index,
            identity,
            nonce,
            signature,
        )?;
        let now = self.clock.now();
        Ok(ledger.cast_vote(candidate_index, voter, now)?)
    }

    /// Register another candidate. Only allowed before the start time.
    pub fn add_candidate(&self, name: impl Into<String>) -> Result<usize, RegistrationError> {
        let mut ledger = self.ledger.write();
        let now = self.clock.now();
        ledger.add_candidate(name, now)
    }

    /// End the election. Only the admin may do this, and only once the end
    /// time has been reached.
    pub fn end_election(&self, caller: &Identity) -> Result<(), LifecycleError> {
        let mut ledger = self.ledger.write();
        let now = self.clock.now();
        ledger.end_election(caller, now)
    }

    pub fn compute_winner(&self) -> Result<WinnerResult, TallyError> {
        let tally = self.tally();
        tally.winner(self.clock.now())
    }

    pub fn compute_stats(&self) -> ElectionStats {
        let tally = self.tally();
        tally.stats(self.clock.now())
    }

    /// Recompute the vote chain. On failure the election stops accepting writes.
    ///
    /// The records are hashed outside the lock, so voting carries on meanwhile.
    pub fn verify_chain_integrity(&self) -> bool {
        let chain = self.ledger.read().chain().clone();
        match chain.verify() {
            Ok(()) => true,
            Err(err) => {
                self.ledger.read().mark_corrupted(&err);
                false
            }
        }
    }

    pub fn state(&self) -> ElectionState {
        let now = self.clock.now();
        self.ledger.read().state(now)
    }

    pub fn candidates(&self) -> Vec<Candidate> {
        self.ledger.read().candidates().to_vec()
    }

    pub fn candidate_index(&self, name: &str) -> Option<usize> {
        self.ledger.read().candidate_index(name)
    }

    pub fn has_voted(&self, identity: &Identity) -> bool {
        self.ledger.read().voters().has_voted(identity)
    }

    /// The nonce `identity` must sign with next.
    pub fn nonce(&self, identity: &Identity) -> u64 {
        self.ledger.read().voters().nonce(identity)
    }

    pub fn admin(&self) -> Identity {
        *self.ledger.read().lifecycle().admin()
    }

    pub fn voter_count(&self) -> u64 {
        self.ledger.read().voter_count()
    }

    pub fn records(&self) -> Vec<VoteRecord> {
        self.ledger.read().chain().records().to_vec()
    }

    pub fn is_corrupted(&self) -> bool {
        self.ledger.read().is_corrupted()
    }

    pub fn snapshot(&self) -> LedgerSnapshot {
        self.ledger.read().snapshot(self.id())
    }

    fn tally(&self) -> Tally {
        self.ledger.read().tally()
    }

    #[cfg(test)]
    pub(crate) fn ledger_mut(&self) -> parking_lot::RwLockWriteGuard<'_, ElectionLedger> {
        self.ledger.write()
    }
}
