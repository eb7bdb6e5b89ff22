// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! pacebench CLI
//!
//! Driver programs that configure a benchmark from the configuration
//! directory, run it and write the result document.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod commands;

/// pacebench - latency and CPU cost of small operations
#[derive(Parser)]
#[command(name = "pacebench")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Directory with one file per configuration key
    #[arg(long, default_value = pacebench_core::config::DEFAULT_CONFIG_DIR)]
    pub config_dir: PathBuf,

    /// Flat YAML file with configuration keys, used instead of the directory
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Time the getppid() system call
    Getppid,

    /// Time a one-byte positioned read of an unlinked file
    Read,

    /// Time positioned writes of the configured buffer size
    Write,

    /// Time a 1ms poll() on a listening socket followed by a short spin
    Poll {
        /// Port of the listening socket
        #[arg(long, default_value_t = commands::DEFAULT_PORT)]
        port: u16,
    },

    /// One-byte writes with a pause between batch runs
    Peak,

    /// One-byte writes while other threads block in poll()
    BlockTest {
        /// Port of the listening socket
        #[arg(long, default_value_t = commands::DEFAULT_PORT)]
        port: u16,
    },

    /// Paced one-byte writes from the minimum to the maximum frequency
    Sweep,

    /// Paced one-byte writes repeated at the minimum frequency
    LowWorkload,

    /// Gaps between back-to-back monotonic clock reads
    ClockGaps,

    /// Hand-over gaps of a mutex contended by 64 threads
    MutexOverhead,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Diagnostics go to stderr, stdout may carry the result document
    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(log_level)
        .with_writer(std::io::stderr)
        .init();

    match &cli.command {
        Commands::Getppid => commands::fixed::getppid(&cli),
        Commands::Read => commands::fixed::read(&cli),
        Commands::Write => commands::fixed::write(&cli),
        Commands::Poll { port } => commands::fixed::poll(&cli, *port),
        Commands::Peak => commands::fixed::peak(&cli),
        Commands::BlockTest { port } => commands::fixed::block_test(&cli, *port),
        Commands::Sweep => commands::sweep::sweep(&cli),
        Commands::LowWorkload => commands::sweep::low_workload(&cli),
        Commands::ClockGaps => commands::probes::clock_gaps(&cli),
        Commands::MutexOverhead => commands::probes::mutex_overhead(&cli),
    }
}
