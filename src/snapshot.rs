use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::identity::ElectionId;
use crate::ledger::Candidate;
use crate::lifecycle::Lifecycle;
use crate::records::{verify_links, IntegrityError, LinkHash, VoteRecord};
use crate::tally::Tally;
use crate::voters::{VoterRecord, VoterRegistry};

/// A complete, serializable export of one election's ledger.
///
/// Voter records and vote records are exported side by side, with nothing
/// linking one to the other.
#[derive(Debug, Clone, Eq, PartialEq, Deserialize, Serialize)]
pub struct LedgerSnapshot {
    pub context: ElectionId,
    pub max_voters: u64,
    pub lifecycle: Lifecycle,
    pub candidates: Vec<Candidate>,
    pub voters: Vec<VoterRecord>,
    pub records: Vec<VoteRecord>,
}

impl LedgerSnapshot {
    /// Check the snapshot is internally consistent, returning the first fault.
    pub fn audit(&self) -> Result<(), IntegrityError> {
        self.audit_voters().map(|_| ())
    }

    /// Audit the snapshot and build its voter registry along the way.
    pub(crate) fn audit_voters(&self) -> Result<VoterRegistry, IntegrityError> {
        self.audit_settings()?;
        verify_links(&LinkHash::genesis(&self.context), &self.records)?;

        // Every record must name a real candidate, and the counts must match.
        let mut counted = vec![0u64; self.candidates.len()];
        for record in self.records.iter() {
            let index = usize::try_from(record.candidate_index).unwrap_or(usize::MAX);
            match counted.get_mut(index) {
                Some(count) => *count += 1,
                None => {
                    return Err(IntegrityError::CandidateOutOfRange {
                        sequence_index: record.sequence_index,
                        candidate_index: record.candidate_index,
                    })
                }
            }
        }
        for (candidate, counted) in self.candidates.iter().zip(counted) {
            if candidate.vote_count != counted {
                return Err(IntegrityError::TallyMismatch {
                    candidate: candidate.name.clone(),
                    stored: candidate.vote_count,
                    counted,
                });
            }
        }

        let records = self.records.len() as u64;
        if records > self.max_voters {
            return Err(IntegrityError::CapacityExceeded {
                records,
                max_voters: self.max_voters,
            });
        }

        let voters = VoterRegistry::from_records(self.voters.iter().cloned())?;
        let voted = voters.voted_count();
        if voted != records {
            return Err(IntegrityError::VoterCountMismatch { voted, records });
        }

        Ok(voters)
    }

    /// The snapshot must describe an election that setup would have accepted.
    fn audit_settings(&self) -> Result<(), IntegrityError> {
        if self.max_voters == 0 {
            return Err(IntegrityError::InvalidMaxVoters);
        }
        let (start_time, end_time) = (self.lifecycle.start_time(), self.lifecycle.end_time());
        if end_time < start_time {
            return Err(IntegrityError::InvalidSchedule { start_time, end_time });
        }

        let mut names = HashSet::new();
        for candidate in self.candidates.iter() {
            if !names.insert(candidate.name.as_str()) {
                return Err(IntegrityError::DuplicateCandidateName(candidate.name.clone()));
            }
        }
        Ok(())
    }

    /// The tally inputs recorded in this snapshot.
    pub fn tally(&self) -> Tally {
        Tally {
            candidates: self.candidates.clone(),
            voter_count: self.records.len() as u64,
            max_voters: self.max_voters,
            lifecycle: self.lifecycle.clone(),
        }
    }
}
