use serde::{Deserialize, Serialize};

use crate::identity::Identity;

pub const SECONDS_PER_HOUR: u64 = 60 * 60;

/// The minimum number of candidates an election must start with.
pub const MIN_CANDIDATES: usize = 2;

/// An error in the parameters of a new election.
#[derive(Debug, Clone, Eq, PartialEq, thiserror::Error)]
pub enum SetupError {
    #[error("at least two candidates are required")]
    TooFewCandidates,
    #[error("the maximum number of voters must be greater than zero")]
    InvalidMaxVoters,
    #[error("candidate name {0:?} is listed more than once")]
    DuplicateName(String),
    #[error("the end time is before the start time")]
    InvalidSchedule,
}

/// Parameters of an election, fixed at creation.
#[derive(Debug, Clone, Eq, PartialEq, Deserialize, Serialize)]
pub struct ElectionConfig {
    /// Candidate names, in registration order.
    pub candidates: Vec<String>,
    pub max_voters: u64,
    /// Unix seconds.
    pub start_time: u64,
    /// Unix seconds, inclusive.
    pub end_time: u64,
    /// The only identity allowed to end the election.
    pub admin: Identity,
}

impl ElectionConfig {
    pub fn new<S: Into<String>>(
        candidates: impl IntoIterator<Item = S>,
        max_voters: u64,
        start_time: u64,
        end_time: u64,
        admin: Identity,
    ) -> Self {
        Self {
            candidates: candidates.into_iter().map(Into::into).collect(),
            max_voters,
            start_time,
            end_time,
            admin,
        }
    }

    /// An election running for `duration_hours` from `start_time`.
    pub fn with_duration<S: Into<String>>(
        candidates: impl IntoIterator<Item = S>,
        max_voters: u64,
        start_time: u64,
        duration_hours: u64,
        admin: Identity,
    ) -> Self {
        let end_time = start_time.saturating_add(duration_hours.saturating_mul(SECONDS_PER_HOUR));
        Self::new(candidates, max_voters, start_time, end_time, admin)
    }

    /// Check the parameters, reporting the first problem found.
    pub fn validate(&self) -> Result<(), SetupError> {
        if self.candidates.len() < MIN_CANDIDATES {
            return Err(SetupError::TooFewCandidates);
        }
        if self.max_voters == 0 {
            return Err(SetupError::InvalidMaxVoters);
        }
        for (i, name) in self.candidates.iter().enumerate() {
            if self.candidates[..i].contains(name) {
                return Err(SetupError::DuplicateName(name.clone()));
            }
        }
        if self.end_time < self.start_time {
            return Err(SetupError::InvalidSchedule);
        }

        Ok(())
    }
}
