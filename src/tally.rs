use serde::{Deserialize, Serialize};

use crate::ledger::Candidate;
use crate::lifecycle::{ElectionState, Lifecycle};

/// Results were requested before the election ended.
#[derive(Debug, Clone, Eq, PartialEq, thiserror::Error)]
pub enum TallyError {
    #[error("the election is still active")]
    ElectionStillActive,
}

/// The outcome of an election.
#[derive(Debug, Clone, Eq, PartialEq, Deserialize, Serialize)]
pub struct WinnerResult {
    /// The first registered candidate holding the most votes. Empty when
    /// no votes were cast.
    pub name: String,
    pub votes: u64,
    /// Whether more than one candidate holds the (non-zero) maximum.
    pub tie: bool,
}

#[derive(Debug, Clone, Eq, PartialEq, Deserialize, Serialize)]
pub struct ElectionStats {
    pub total_voters: u64,
    pub max_allowed_voters: u64,
    pub remaining_voters: u64,
    pub is_active: bool,
    pub time_remaining: u64,
}

/// A point-in-time copy of everything the tally needs.
///
/// Taken under a short read lock, then evaluated without holding any lock.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Tally {
    pub candidates: Vec<Candidate>,
    pub voter_count: u64,
    pub max_voters: u64,
    pub lifecycle: Lifecycle,
}

impl Tally {
    pub fn winner(&self, now: u64) -> Result<WinnerResult, TallyError> {
        compute_winner(&self.candidates, self.lifecycle.state(now))
    }

    pub fn stats(&self, now: u64) -> ElectionStats {
        compute_stats(self.voter_count, self.max_voters, &self.lifecycle, now)
    }
}

/// Find the winner once the election has ended.
///
/// Ties are broken in favour of the earliest registered candidate. A maximum
/// of zero is never reported as a tie.
pub fn compute_winner(
    candidates: &[Candidate],
    state: ElectionState,
) -> Result<WinnerResult, TallyError> {
    if state != ElectionState::Ended {
        return Err(TallyError::ElectionStillActive);
    }

    let mut max_votes = 0;
    let mut winner = None;
    let mut holders = 0;
    for (i, candidate) in candidates.iter().enumerate() {
        if candidate.vote_count > max_votes {
            max_votes = candidate.vote_count;
            winner = Some(i);
            holders = 1;
        } else if candidate.vote_count == max_votes && max_votes > 0 {
            holders += 1;
        }
    }

    // Nobody voted, or there is nobody to vote for: no winner is named.
    let name = winner
        .map(|i| candidates[i].name.clone())
        .unwrap_or_default();

    Ok(WinnerResult {
        name,
        votes: max_votes,
        tie: holders > 1,
    })
}

pub fn compute_stats(
    voter_count: u64,
    max_voters: u64,
    lifecycle: &Lifecycle,
    now: u64,
) -> ElectionStats {
    ElectionStats {
        total_voters: voter_count,
        max_allowed_voters: max_voters,
        remaining_voters: max_voters.saturating_sub(voter_count),
        is_active: lifecycle.is_active(now),
        time_remaining: lifecycle.time_remaining(now),
    }
}
