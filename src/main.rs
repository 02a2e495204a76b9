//! `qnetsim` command-line interface.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use qnetsim::config::{GhzLinkSetting, ProtocolKind};
use qnetsim::protocols::payment::Decision;
use qnetsim::{RoleOutput, RunReport, SimConfig};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Simulate teleportation, distributed CNOT, GHZ and quantum payment runs
#[derive(Parser)]
#[command(name = "qnetsim")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Number of shots
    #[arg(short, long, global = true)]
    shots: Option<usize>,

    /// Base seed for reproducible runs
    #[arg(long, global = true, env = "QNETSIM_SEED")]
    seed: Option<u64>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum FirstLink {
    Epr,
    RemoteCnot,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the simulation described by a TOML file
    Run {
        /// Configuration file
        #[arg(short, long)]
        config: PathBuf,
    },

    /// Teleport a prepared qubit from Alice to Bob
    Teleport {
        /// Prepare |0> instead of |1>
        #[arg(long)]
        zero: bool,

        /// ry angle applied after preparation
        #[arg(long)]
        theta: Option<f64>,

        /// Bob measures in the X basis
        #[arg(long)]
        x_basis: bool,
    },

    /// Prepare a GHZ state across a star of nodes
    Ghz {
        /// Node names, root first
        #[arg(long, value_delimiter = ',', default_value = "Alice,Bob,Charlie")]
        nodes: Vec<String>,

        /// How the root links its first follower
        #[arg(long, value_enum, default_value = "epr")]
        first_link: FirstLink,

        /// Nodes measuring in the X basis
        #[arg(long, value_delimiter = ',')]
        hadamard: Vec<String>,
    },

    /// Run the Bank / Client / Merchant payment protocol
    Payment {
        /// Number of qubits the Bank prepares
        #[arg(short, long, default_value = "16")]
        key_length: usize,

        /// Accept iff the error rate is below this
        #[arg(short, long, default_value = "0.1")]
        threshold: f64,

        /// Client uses this secret instead of its registered one
        #[arg(long)]
        forged_secret: Option<String>,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .with_target(false)
        .init();

    let mut config = match cli.command {
        Commands::Run { config } => SimConfig::load(&config)
            .with_context(|| format!("loading {}", config.display()))?,
        Commands::Teleport {
            zero,
            theta,
            x_basis,
        } => {
            let mut config = SimConfig::for_protocol(ProtocolKind::Teleport);
            config.teleport.flip = !zero;
            config.teleport.theta = theta;
            config.teleport.measure_hadamard = x_basis;
            config
        }
        Commands::Ghz {
            nodes,
            first_link,
            hadamard,
        } => {
            let mut config = SimConfig::for_protocol(ProtocolKind::Ghz);
            config.ghz.nodes = nodes;
            config.ghz.first_link = match first_link {
                FirstLink::Epr => GhzLinkSetting::Epr,
                FirstLink::RemoteCnot => GhzLinkSetting::RemoteCnot,
            };
            config.ghz.hadamard = hadamard;
            config
        }
        Commands::Payment {
            key_length,
            threshold,
            forged_secret,
        } => {
            let mut config = SimConfig::for_protocol(ProtocolKind::Payment);
            config.payment.key_length = key_length;
            config.payment.rejection_threshold = threshold;
            config.payment.client_secret = forged_secret;
            config
        }
    };
    if let Some(shots) = cli.shots {
        config.shots = shots;
    }
    if cli.seed.is_some() {
        config.seed = cli.seed;
    }

    let sim = config.simulation()?;
    let report = sim.run(config.shots).await?;
    print_report(&report);
    Ok(())
}

fn print_report(report: &RunReport) {
    let mut counts: Vec<(String, usize)> = report.counts().into_iter().collect();
    counts.sort();
    let total: usize = counts.iter().map(|(_, n)| n).sum();

    println!("nodes: {}", report.nodes.join(", "));
    for (outcome, n) in &counts {
        if outcome.is_empty() {
            continue;
        }
        println!("  {outcome:>8}  {n:>6}  ({:.3})", *n as f64 / total.max(1) as f64);
    }

    for node in &report.nodes {
        let decisions = report
            .outputs(node)
            .filter(|o| matches!(o, RoleOutput::Decision(_)))
            .count();
        if decisions == 0 {
            continue;
        }
        let accepted = report
            .outputs(node)
            .filter(|o| matches!(o, RoleOutput::Decision(Decision::Accept)))
            .count();
        println!("{node}: {accepted}/{decisions} accepted");
    }

    let failures = report.failures();
    if !failures.is_empty() {
        println!("{} node failures:", failures.len());
        for (shot, node, err) in failures.iter().take(10) {
            println!("  shot {shot} {node}: {err}");
        }
    }
}
