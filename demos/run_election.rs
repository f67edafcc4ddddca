use rand::Rng;

use election_ledger::{Clock, Election, ElectionConfig, ManualClock, VoterKey};

fn main() {
    let mut rng = rand::thread_rng();
    const CANDIDATES: &[&str] = &["Alice", "Bob", "Charlie"];
    const DIRECT_VOTERS: usize = 5;
    const SIGNED_VOTERS: usize = 5;
    const DURATION_HOURS: u64 = 24;

    // Create a new election, opening now and running for a day.
    let clock = ManualClock::new(1_700_000_000);
    let admin = VoterKey::random(&mut rng);
    let config = ElectionConfig::with_duration(
        CANDIDATES.iter().copied(),
        100,
        clock.now(),
        DURATION_HOURS,
        admin.identity(),
    );
    let election = Election::create(config, &[b"Hello, World!"], &mut rng, clock.clone())
        .expect("Valid configuration");

    // Voters who submit their own votes.
    for _ in 0..DIRECT_VOTERS {
        let voter = VoterKey::random(&mut rng);
        let candidate_index = rng.gen_range(0..CANDIDATES.len()) as u64;
        election.cast_vote(candidate_index, voter.identity()).unwrap();
    }

    // Voters whose signed votes are relayed on their behalf.
    for _ in 0..SIGNED_VOTERS {
        let voter = VoterKey::random(&mut rng);
        let candidate_index = rng.gen_range(0..CANDIDATES.len()) as u64;
        let nonce = election.nonce(&voter.identity());
        let signature = voter
            .sign_vote(election.id(), candidate_index, nonce)
            .unwrap();
        election
            .cast_signed_vote(candidate_index, voter.identity(), nonce, &signature)
            .unwrap();
    }

    // Close the election.
    clock.advance(DURATION_HOURS * 60 * 60);
    election.end_election(&admin.identity()).unwrap();
    assert!(election.verify_chain_integrity());
    println!("Ledger successfully verified.");

    // Announce the results.
    println!("Results:");
    for candidate in election.candidates() {
        println!("{}: {} votes", candidate.name, candidate.vote_count);
    }
    let winner = election.compute_winner().unwrap();
    if winner.tie {
        println!("Tie! {} wins on registration order with {} votes.", winner.name, winner.votes);
    } else {
        println!("Winner: {} with {} votes.", winner.name, winner.votes);
    }

    // Dump the ledger for `verify-ledger`.
    println!("{}", serde_json::to_string_pretty(&election.snapshot()).unwrap());
}
