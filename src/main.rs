use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use resistor_chain::{RPool, RSearch, SearchConfig};

#[derive(Parser)]
#[command(name = "resistor-chain")]
#[command(about = "Approximate a resistance with a chain of series/parallel E6 resistors")]
struct Args {
    /// Target resistance in ohms
    target: f64,

    /// Maximum number of resistors in the chain
    #[arg(long, default_value_t = 3)]
    max_steps: usize,

    /// Residuals closer than this are treated as equal
    #[arg(long, default_value_t = 1e-6)]
    threshold: f64,

    /// Pin the shuffle seed for reproducible output
    #[arg(long)]
    seed: Option<u64>,
}

fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("resistor_chain=info")),
        )
        .with_target(false)
        .compact()
        .init();

    let pool = RPool::e6();
    let config = SearchConfig {
        max_chain_length: args.max_steps,
        error_threshold: args.threshold,
    };
    let mut search = match args.seed {
        Some(seed) => RSearch::seeded(&pool, config, seed),
        None => RSearch::new(&pool, config),
    };

    let solution = search.solve(args.target)?;

    if solution.exact {
        println!("Exact match found within {} components.", args.max_steps);
    } else {
        println!(
            "No exact match within {} components; best approximation shown.",
            args.max_steps
        );
    }
    println!("---- begin from 0 ohm ----");
    for step in solution.chain.iter() {
        println!("{step}");
    }
    println!("---- circuit complete ----");
    println!("Result: {} ohm", solution.resistance);

    Ok(())
}
