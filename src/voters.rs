use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::identity::Identity;
use crate::records::IntegrityError;

/// Per-identity eligibility state. Never linked to a vote record.
#[derive(Debug, Clone, Eq, PartialEq, Deserialize, Serialize)]
pub struct VoterRecord {
    pub identity: Identity,
    /// Flips from false to true exactly once.
    pub has_voted: bool,
    /// The next nonce a signed authorization must carry.
    pub nonce: u64,
}

impl VoterRecord {
    fn new(identity: Identity) -> Self {
        Self {
            identity,
            has_voted: false,
            nonce: 0,
        }
    }
}

/// The identity-keyed store of voter records.
///
/// Kept apart from the vote chain: this side knows who voted, the chain knows
/// what was voted, and nothing joins the two.
#[derive(Debug, Clone, Default)]
pub struct VoterRegistry {
    voters: HashMap<Identity, VoterRecord>,
}

impl VoterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a registry, rejecting repeated identities.
    pub fn from_records(records: impl IntoIterator<Item = VoterRecord>) -> Result<Self, IntegrityError> {
        let mut voters = HashMap::new();
        for record in records {
            let identity = record.identity;
            if voters.insert(identity, record).is_some() {
                return Err(IntegrityError::DuplicateVoter(identity));
            }
        }
        Ok(Self { voters })
    }

    pub fn get(&self, identity: &Identity) -> Option<&VoterRecord> {
        self.voters.get(identity)
    }

    pub fn has_voted(&self, identity: &Identity) -> bool {
        self.voters.get(identity).map_or(false, |record| record.has_voted)
    }

    /// The nonce expected from `identity`'s next signed authorization.
    pub fn nonce(&self, identity: &Identity) -> u64 {
        self.voters.get(identity).map_or(0, |record| record.nonce)
    }

    /// The record for `identity`, created on first use.
    pub fn record_mut(&mut self, identity: Identity) -> &mut VoterRecord {
        self.voters
            .entry(identity)
            .or_insert_with(|| VoterRecord::new(identity))
    }

    /// Number of identities that have voted.
    pub fn voted_count(&self) -> u64 {
        self.voters.values().filter(|record| record.has_voted).count() as u64
    }

    /// All records, sorted by identity so exports are deterministic.
    pub fn to_sorted_vec(&self) -> Vec<VoterRecord> {
        let mut records = self.voters.values().cloned().collect::<Vec<_>>();
        records.sort_by_key(|record| record.identity);
        records
    }
}
