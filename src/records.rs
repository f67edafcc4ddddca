use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::identity::{ElectionId, Identity};

/// Length of a [`LinkHash`] in bytes.
pub const LINK_HASH_LEN: usize = 32;

/// Domain tag for the chain's genesis anchor.
const GENESIS_TAG: &[u8] = b"ELECTION-LEDGER:GENESIS";

/// A digest binding a vote record to its predecessor.
#[derive(Clone, Copy, Eq, PartialEq, Hash, Deserialize, Serialize)]
pub struct LinkHash(#[serde(with = "crate::serde_bytestring")] [u8; LINK_HASH_LEN]);

impl LinkHash {
    /// The anchor that the first record of an election links to.
    pub fn genesis(context: &ElectionId) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(GENESIS_TAG);
        hasher.update(context.as_bytes());
        Self(hasher.finalize().into())
    }

    /// Compute the link for a record from its fields and its predecessor's link.
    pub fn link(
        sequence_index: u64,
        timestamp: u64,
        candidate_index: u64,
        previous: &LinkHash,
    ) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(sequence_index.to_be_bytes());
        hasher.update(timestamp.to_be_bytes());
        hasher.update(candidate_index.to_be_bytes());
        hasher.update(previous.0);
        Self(hasher.finalize().into())
    }

    pub const fn from_bytes(bytes: [u8; LINK_HASH_LEN]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; LINK_HASH_LEN] {
        &self.0
    }
}

impl fmt::Display for LinkHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for LinkHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "LinkHash({})", self)
    }
}

/// A single accepted vote. Carries no voter identity.
#[derive(Debug, Clone, Eq, PartialEq, Deserialize, Serialize)]
pub struct VoteRecord {
    /// Position of this record in the chain, starting at zero.
    pub sequence_index: u64,
    /// Index of the chosen candidate, in registration order.
    pub candidate_index: u64,
    /// Time the vote was accepted, in unix seconds.
    pub timestamp: u64,
    /// Digest over the fields above and the previous record's link.
    pub link_hash: LinkHash,
}

impl VoteRecord {
    /// The link this record should carry, given its predecessor's link.
    pub fn expected_link(&self, previous: &LinkHash) -> LinkHash {
        LinkHash::link(
            self.sequence_index,
            self.timestamp,
            self.candidate_index,
            previous,
        )
    }
}

/// Handed back to a voter whose vote was accepted.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Deserialize, Serialize)]
pub struct VoteReceipt {
    pub sequence_index: u64,
    pub link_hash: LinkHash,
}

/// A fault found while auditing a ledger.
#[derive(Debug, Clone, Eq, PartialEq, thiserror::Error)]
pub enum IntegrityError {
    /// A record is not at the position its index claims.
    #[error("record at position {position} claims sequence index {found}")]
    SequenceMismatch { position: u64, found: u64 },
    /// A record's stored link does not match its recomputed link.
    #[error("link hash mismatch at sequence index {sequence_index}")]
    LinkMismatch { sequence_index: u64 },
    /// A record names a candidate that does not exist.
    #[error("record {sequence_index} names unknown candidate {candidate_index}")]
    CandidateOutOfRange {
        sequence_index: u64,
        candidate_index: u64,
    },
    /// A candidate's stored count disagrees with the records.
    #[error("candidate {candidate} stores {stored} votes but the ledger holds {counted}")]
    TallyMismatch {
        candidate: String,
        stored: u64,
        counted: u64,
    },
    /// The number of voters marked as voted disagrees with the records.
    #[error("{voted} voters are marked as voted but the ledger holds {records} records")]
    VoterCountMismatch { voted: u64, records: u64 },
    /// More records than the election allows voters.
    #[error("ledger holds {records} records but at most {max_voters} voters are allowed")]
    CapacityExceeded { records: u64, max_voters: u64 },
    /// The same identity appears twice in the voter registry.
    #[error("voter {0} is registered more than once")]
    DuplicateVoter(Identity),
    /// Two candidates share a name.
    #[error("candidate name {0:?} appears more than once")]
    DuplicateCandidateName(String),
    /// The election allows no voters at all.
    #[error("the maximum number of voters must be positive")]
    InvalidMaxVoters,
    /// The election ends before it starts.
    #[error("election ends at {end_time}, before its start at {start_time}")]
    InvalidSchedule { start_time: u64, end_time: u64 },
}

/// The append-only, hash-linked sequence of vote records.
///
/// Records are stored by position and each one holds its predecessor's link by
/// value, so the chain is a plain vector with no references between entries.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct VoteChain {
    genesis: LinkHash,
    records: Vec<VoteRecord>,
}

impl VoteChain {
    pub fn new(genesis: LinkHash) -> Self {
        Self {
            genesis,
            records: Vec::new(),
        }
    }

    /// Rebuild a chain from stored records. Does not verify them.
    pub fn from_records(genesis: LinkHash, records: Vec<VoteRecord>) -> Self {
        Self { genesis, records }
    }

    pub fn genesis(&self) -> &LinkHash {
        &self.genesis
    }

    pub fn records(&self) -> &[VoteRecord] {
        &self.records
    }

    pub fn len(&self) -> u64 {
        self.records.len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// The link of the newest record, or the genesis anchor if there is none.
    pub fn head(&self) -> &LinkHash {
        self.records
            .last()
            .map(|record| &record.link_hash)
            .unwrap_or(&self.genesis)
    }

    /// Append a record for the given candidate.
    pub fn append(&mut self, candidate_index: u64, timestamp: u64) -> VoteReceipt {
        let sequence_index = self.len();
        let link_hash = LinkHash::link(sequence_index, timestamp, candidate_index, self.head());
        self.records.push(VoteRecord {
            sequence_index,
            candidate_index,
            timestamp,
            link_hash,
        });

        VoteReceipt {
            sequence_index,
            link_hash,
        }
    }

    /// Recompute every link and check indices are sequential.
    pub fn verify(&self) -> Result<(), IntegrityError> {
        verify_links(&self.genesis, &self.records)
    }

    #[cfg(test)]
    pub(crate) fn records_mut(&mut self) -> &mut Vec<VoteRecord> {
        &mut self.records
    }
}

/// Walk the records from the genesis anchor, returning the first fault.
pub fn verify_links(genesis: &LinkHash, records: &[VoteRecord]) -> Result<(), IntegrityError> {
    let mut previous = genesis;
    for (position, record) in records.iter().enumerate() {
        let position = position as u64;
        if record.sequence_index != position {
            return Err(IntegrityError::SequenceMismatch {
                position,
                found: record.sequence_index,
            });
        }
        if record.expected_link(previous) != record.link_hash {
            return Err(IntegrityError::LinkMismatch {
                sequence_index: position,
            });
        }
        previous = &record.link_hash;
    }

    Ok(())
}
