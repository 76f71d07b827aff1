use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;

#[derive(Parser)]
#[command(name = "slotpool-cmd")]
#[command(about = "Runs batches of work on a bounded pool of worker threads")]
#[command(version)]
struct Cli {
    /// Increase log verbosity (-v for info, -vv for debug, -vvv for trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Args)]
struct PoolArgs {
    /// Number of worker threads (defaults to the available parallelism)
    #[arg(short, long, env = "SLOTPOOL_SLOTS")]
    slots: Option<usize>,

    /// Keep running when a task fails instead of aborting the process
    #[arg(long)]
    keep_going: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the xxh3 digest of each file, hashing files in parallel
    Digest {
        #[command(flatten)]
        pool: PoolArgs,

        /// Files to hash
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },

    /// Run a number of sleeping tasks and report the elapsed time
    Sleep {
        #[command(flatten)]
        pool: PoolArgs,

        /// Number of tasks to submit
        #[arg(short, long, default_value_t = 8)]
        count: usize,

        /// Duration of each task in milliseconds
        #[arg(short, long, default_value_t = 100)]
        millis: u64,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    commands::init_logging(cli.verbose);

    match cli.command {
        Commands::Digest { pool, files } => {
            commands::digest::run(pool.slots, pool.keep_going, files)
        }
        Commands::Sleep {
            pool,
            count,
            millis,
        } => commands::sleep::run(pool.slots, pool.keep_going, count, millis),
    }
}
