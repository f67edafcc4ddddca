use std::fs::File;
use std::io::BufReader;

use clap::Parser;
use tracing::Level;

use election_ledger::{Clock, IntegrityError, LedgerSnapshot, SystemClock, TallyError};

/// Shown in the help message.
const ABOUT_TEXT: &str =
"Audit an exported election ledger and report its result.

Exit codes:
     0: Success
   255: Ran successfully, but the ledger failed its audit.
 Other: Error";

/// The CLI arguments to parse.
#[derive(Debug, Parser)]
#[clap(name = "verify-ledger", author, version,
       about = ABOUT_TEXT, long_about = None)]
struct Args {
    /// The JSON ledger snapshot to audit.
    file: String,

    /// Evaluate the election as of this unix time instead of now.
    #[clap(long)]
    at: Option<u64>,

    /// Log progress to stderr.
    #[clap(short, long)]
    verbose: bool,
}

/// Errors that this program may produce.
#[derive(Debug, Eq, PartialEq)]
enum Error {
    /// IO error described by the inner message.
    IO(String),
    /// Failed to decode the snapshot.
    Format,
    /// The audit failed for the described reason.
    Integrity(IntegrityError),
}

fn main() {
    fn run(args: &Args) -> Result<(), Error> {
        // Try to load the file.
        let file = File::open(&args.file)
            .map_err(|e| Error::IO(e.to_string()))?;
        // Try to read the snapshot.
        let snapshot: LedgerSnapshot = serde_json::from_reader(BufReader::new(file))
            .map_err(|_| Error::Format)?;
        tracing::info!(election = %snapshot.context, records = snapshot.records.len(), "snapshot loaded");
        // Audit the ledger.
        snapshot.audit().map_err(Error::Integrity)?;

        let now = args.at.unwrap_or_else(|| SystemClock.now());
        let tally = snapshot.tally();
        let stats = tally.stats(now);
        println!("Election {}", snapshot.context);
        println!("Voters: {} of {}", stats.total_voters, stats.max_allowed_voters);
        for candidate in snapshot.candidates.iter() {
            println!("  {}: {} votes", candidate.name, candidate.vote_count);
        }
        match tally.winner(now) {
            Ok(winner) if winner.votes == 0 => println!("No votes were cast."),
            Ok(winner) if winner.tie => {
                println!("Tie at {} votes, first registered: {}", winner.votes, winner.name)
            }
            Ok(winner) => println!("Winner: {} with {} votes", winner.name, winner.votes),
            Err(TallyError::ElectionStillActive) => {
                println!("Election still open, {} seconds remaining.", stats.time_remaining)
            }
        }

        Ok(())
    }

    let args: Args = Args::parse();
    if args.verbose {
        tracing_subscriber::fmt()
            .with_max_level(Level::DEBUG)
            .with_writer(std::io::stderr)
            .init();
    }

    let exit_code: u8 = match run(&args) {
        Ok(()) => {
            println!("Ledger successfully verified.");
            0
        }
        Err(Error::IO(msg)) => {
            println!("IO error: {}", msg);
            1
        }
        Err(Error::Format) => {
            println!("Invalid ledger snapshot.");
            1
        }
        Err(Error::Integrity(err)) => {
            println!("Ledger failed to verify: {}.", err);
            255
        }
    };

    std::process::exit(exit_code.into())
}
