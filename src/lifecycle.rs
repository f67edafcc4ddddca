use serde::{Deserialize, Serialize};
use tracing::info;

use crate::identity::Identity;

/// Where an election is in its life.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Deserialize, Serialize)]
pub enum ElectionState {
    /// Before the start time. Candidates may still be registered.
    Scheduled,
    /// Between the start and end times, inclusive. Votes are accepted.
    Active,
    /// Past the end time, or ended by the admin. Terminal.
    Ended,
}

/// An operator error while ending an election.
#[derive(Debug, Clone, Eq, PartialEq, thiserror::Error)]
pub enum LifecycleError {
    #[error("only the election admin may end the election")]
    NotAdmin,
    #[error("the election has already been ended")]
    AlreadyEnded,
    #[error("the election cannot be ended before its end time")]
    StillRunning,
    #[error("the ledger is corrupted and accepts no further writes")]
    CorruptedLedger,
}

/// The schedule and end flag of an election.
///
/// The state is never stored; it is derived from the current time on every
/// query. The admin may only end an election once its end time has been
/// reached, so there is no early termination.
#[derive(Debug, Clone, Eq, PartialEq, Deserialize, Serialize)]
pub struct Lifecycle {
    start_time: u64,
    end_time: u64,
    admin: Identity,
    ended: bool,
}

impl Lifecycle {
    pub fn new(start_time: u64, end_time: u64, admin: Identity) -> Self {
        Self {
            start_time,
            end_time,
            admin,
            ended: false,
        }
    }

    pub fn start_time(&self) -> u64 {
        self.start_time
    }

    pub fn end_time(&self) -> u64 {
        self.end_time
    }

    pub fn admin(&self) -> &Identity {
        &self.admin
    }

    /// Whether the admin has explicitly ended the election.
    pub fn explicitly_ended(&self) -> bool {
        self.ended
    }

    pub fn state(&self, now: u64) -> ElectionState {
        if self.ended || now > self.end_time {
            ElectionState::Ended
        } else if now < self.start_time {
            ElectionState::Scheduled
        } else {
            ElectionState::Active
        }
    }

    pub fn is_active(&self, now: u64) -> bool {
        self.state(now) == ElectionState::Active
    }

    /// Candidates may only be added strictly before the start time.
    pub fn accepts_registrations(&self, now: u64) -> bool {
        !self.ended && now < self.start_time
    }

    pub fn time_remaining(&self, now: u64) -> u64 {
        self.end_time.saturating_sub(now)
    }

    /// Mark the election as ended on behalf of `caller`.
    pub fn end(&mut self, caller: &Identity, now: u64) -> Result<(), LifecycleError> {
        if *caller != self.admin {
            return Err(LifecycleError::NotAdmin);
        }
        if self.ended {
            return Err(LifecycleError::AlreadyEnded);
        }
        if now < self.end_time {
            return Err(LifecycleError::StillRunning);
        }

        self.ended = true;
        info!(end_time = self.end_time, now, "election ended by admin");
        Ok(())
    }
}
