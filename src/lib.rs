pub mod authorizer;
pub mod clock;
pub mod config;
pub mod election;
pub mod identity;
pub mod ledger;
pub mod lifecycle;
pub mod records;
pub mod registry;
pub mod serde_bytestring;
pub mod snapshot;
pub mod tally;
pub mod voters;

pub use crate::authorizer::{AuthError, AuthorizedVoter, IdentityAuthorizer, VoterKey};
pub use crate::clock::{Clock, ManualClock, SystemClock};
pub use crate::config::{ElectionConfig, SetupError};
pub use crate::election::{Election, ElectionError};
pub use crate::identity::{ElectionId, Identity};
pub use crate::ledger::{Candidate, ElectionLedger, RegistrationError, VoteError};
pub use crate::lifecycle::{ElectionState, LifecycleError};
pub use crate::records::{IntegrityError, LinkHash, VoteReceipt, VoteRecord};
pub use crate::registry::ElectionRegistry;
pub use crate::snapshot::LedgerSnapshot;
pub use crate::tally::{ElectionStats, TallyError, WinnerResult};
pub use crate::voters::VoterRecord;

#[cfg(test)]
mod tests {
    use super::*;

    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};
    use std::collections::HashSet;
    use std::sync::Arc;
    use std::thread;

    const ADMIN: Identity = Identity::from_bytes([0xad; 20]);
    const START: u64 = 1_700_000_000;
    const DAY: u64 = 24 * 60 * 60;

    fn voter(n: u64) -> Identity {
        let mut bytes = [0xee; 20];
        bytes[12..].copy_from_slice(&n.to_be_bytes());
        Identity::from_bytes(bytes)
    }

    fn election(
        names: &[&str],
        max_voters: u64,
        clock: &ManualClock,
    ) -> Election<ManualClock> {
        let config = ElectionConfig::with_duration(names.iter().copied(), max_voters, START, 24, ADMIN);
        Election::create(config, &[b"scenario"], rand::thread_rng(), clock.clone()).unwrap()
    }

    /// Check the conservation and chain invariants against an election.
    fn assert_consistent(election: &Election<ManualClock>) {
        let total: u64 = election
            .candidates()
            .iter()
            .map(|candidate| candidate.vote_count)
            .sum();
        assert_eq!(total, election.voter_count());
        assert_eq!(election.records().len() as u64, election.voter_count());
        assert!(election.verify_chain_integrity());
        assert!(election.snapshot().audit().is_ok());
    }

    #[test]
    fn test_election() {
        let clock = ManualClock::new(START);
        let election = election(&["Alice", "Bob", "Charlie"], 100, &clock);

        election.cast_vote(0, voter(1)).unwrap();
        election.cast_vote_by_name("Alice", voter(2)).unwrap();
        clock.advance(DAY + 1);

        assert_eq!(
            election.compute_winner(),
            Ok(WinnerResult {
                name: "Alice".to_string(),
                votes: 2,
                tie: false
            })
        );
        assert_eq!(
            election.compute_stats(),
            ElectionStats {
                total_voters: 2,
                max_allowed_voters: 100,
                remaining_voters: 98,
                is_active: false,
                time_remaining: 0,
            }
        );
        assert_consistent(&election);
    }

    #[test]
    fn test_tie() {
        let clock = ManualClock::new(START);
        let election = election(&["A", "B", "C"], 10, &clock);
        for (n, candidate) in [0, 1, 0, 1, 2].iter().enumerate() {
            election.cast_vote(*candidate, voter(n as u64)).unwrap();
        }
        clock.advance(DAY);
        election.end_election(&ADMIN).unwrap();

        assert_eq!(
            election.compute_winner(),
            Ok(WinnerResult {
                name: "A".to_string(),
                votes: 2,
                tie: true
            })
        );
    }

    #[test]
    fn test_no_votes() {
        let clock = ManualClock::new(START);
        let election = election(&["A", "B", "C"], 10, &clock);
        clock.advance(DAY + 1);
        assert_eq!(
            election.compute_winner(),
            Ok(WinnerResult {
                name: String::new(),
                votes: 0,
                tie: false
            })
        );
    }

    #[test]
    fn test_signed_votes() {
        let mut rng = rand::thread_rng();
        let clock = ManualClock::new(START);
        let election = election(&["Alice", "Bob"], 10, &clock);
        let keys = (0..4).map(|_| VoterKey::random(&mut rng)).collect::<Vec<_>>();

        for (i, key) in keys.iter().enumerate() {
            let candidate = (i % 2) as u64;
            let nonce = election.nonce(&key.identity());
            let signature = key.sign_vote(election.id(), candidate, nonce).unwrap();
            election
                .cast_signed_vote(candidate, key.identity(), nonce, &signature)
                .unwrap();
        }

        assert_eq!(election.voter_count(), 4);
        assert_consistent(&election);

        // A signature for one election is useless in another.
        let other = self::election(&["Alice", "Bob"], 10, &clock);
        let signature = keys[0].sign_vote(election.id(), 0, 0).unwrap();
        assert_eq!(
            other.cast_signed_vote(0, keys[0].identity(), 0, &signature),
            Err(ElectionError::Auth(AuthError::InvalidRecoveredSigner))
        );
    }

    #[test]
    fn test_random_vote_sequences() {
        let mut rng = StdRng::seed_from_u64(0x5eed);
        for _ in 0..20 {
            let clock = ManualClock::new(START);
            let max_voters = rng.gen_range(1..30);
            let election = election(&["A", "B", "C", "D"], max_voters, &clock);
            let mut voted = HashSet::new();

            for _ in 0..100 {
                let identity = voter(rng.gen_range(0..40));
                // Occasionally aim past the last candidate.
                let candidate = rng.gen_range(0..5);
                let full = election.voter_count() == max_voters;
                let result = election.cast_vote(candidate, identity);

                if voted.contains(&identity) {
                    assert_eq!(result, Err(VoteError::AlreadyVoted));
                } else if candidate >= 4 {
                    assert_eq!(result, Err(VoteError::InvalidCandidate));
                } else if full {
                    assert_eq!(result, Err(VoteError::CapacityReached));
                } else {
                    let receipt = result.unwrap();
                    assert_eq!(receipt.sequence_index, voted.len() as u64);
                    voted.insert(identity);
                }

                assert!(election.voter_count() <= max_voters);
            }

            assert_eq!(election.voter_count(), voted.len() as u64);
            assert_consistent(&election);

            // Once full, every further vote is refused for capacity.
            if election.voter_count() == max_voters {
                assert_eq!(
                    election.cast_vote(0, voter(1_000)),
                    Err(VoteError::CapacityReached)
                );
            }
        }
    }

    #[test]
    fn test_random_tampering_detected() {
        let mut rng = StdRng::seed_from_u64(7);
        let clock = ManualClock::new(START);
        let election = election(&["A", "B", "C"], 50, &clock);
        for n in 0..20 {
            election.cast_vote(rng.gen_range(0..3), voter(n)).unwrap();
            clock.advance(rng.gen_range(0..60));
        }

        for _ in 0..20 {
            let mut snapshot = election.snapshot();
            let i = rng.gen_range(0..snapshot.records.len());
            if rng.gen() {
                let old = snapshot.records[i].candidate_index;
                snapshot.records[i].candidate_index = (old + rng.gen_range(1..3)) % 3;
            } else {
                let mut bytes = *snapshot.records[i].link_hash.as_bytes();
                bytes[rng.gen_range(0..32)] ^= 1u8 << rng.gen_range(0..8u32);
                snapshot.records[i].link_hash = LinkHash::from_bytes(bytes);
            }
            assert!(snapshot.audit().is_err());
            assert!(Election::restore(snapshot, clock.clone()).is_err());
        }
    }

    #[test]
    fn test_concurrent_voting() {
        const THREADS: u64 = 8;
        const PER_THREAD: u64 = 50;
        const MAX_VOTERS: u64 = 300;

        let clock = ManualClock::new(START);
        let election = Arc::new(election(&["A", "B", "C"], MAX_VOTERS, &clock));

        let handles = (0..THREADS)
            .map(|t| {
                let election = Arc::clone(&election);
                thread::spawn(move || {
                    let mut accepted = 0u64;
                    for i in 0..PER_THREAD {
                        // Every voter tries twice.
                        let identity = voter(t * PER_THREAD + i);
                        for _ in 0..2 {
                            match election.cast_vote(i % 3, identity) {
                                Ok(_) => accepted += 1,
                                Err(VoteError::AlreadyVoted) | Err(VoteError::CapacityReached) => {}
                                Err(err) => panic!("unexpected error: {}", err),
                            }
                        }
                    }
                    accepted
                })
            })
            .collect::<Vec<_>>();

        let accepted: u64 = handles.into_iter().map(|h| h.join().unwrap()).sum();
        assert_eq!(accepted, MAX_VOTERS);
        assert_eq!(election.voter_count(), MAX_VOTERS);

        let sequence = election
            .records()
            .iter()
            .map(|record| record.sequence_index)
            .collect::<Vec<_>>();
        assert_eq!(sequence, (0..MAX_VOTERS).collect::<Vec<_>>());
        assert_consistent(&election);
    }

    #[test]
    fn test_concurrent_signed_replays() {
        let clock = ManualClock::new(START);
        let election = Arc::new(election(&["A", "B"], 10, &clock));
        let key = VoterKey::random(rand::thread_rng());
        let signature = key.sign_vote(election.id(), 1, 0).unwrap();

        // Many relays submit the same signed request at once; exactly one lands.
        let handles = (0..8)
            .map(|_| {
                let election = Arc::clone(&election);
                let identity = key.identity();
                thread::spawn(move || election.cast_signed_vote(1, identity, 0, &signature).is_ok())
            })
            .collect::<Vec<_>>();
        let accepted = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|ok| *ok)
            .count();

        assert_eq!(accepted, 1);
        assert_eq!(election.nonce(&key.identity()), 1);
        assert_eq!(election.voter_count(), 1);
    }
}
