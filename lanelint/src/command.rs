// Copyright 2022-2023 VMware, Inc.
// SPDX-License-Identifier: BSD-2-Clause

//! The lanelint binary's command-line interface.

use clap::{Args, Parser, Subcommand};
use roadnet::model::RoadNetwork;
use std::collections::BTreeSet;
use std::{fs, process};
use verify::catalogue::{FormulaId, CATALOGUE};
use verify::config::VerificationConfig;
use verify::driver::Driver;

#[derive(Args, Clone, Debug)]
struct VerificationArgs {
    /// File name for a JSON road-network file
    file: String,

    #[arg(long)]
    /// Verify only these formulas, by stable string id
    /// (e.g. `existence_left_adj`); default is the whole catalogue
    only: Vec<String>,

    #[arg(long)]
    /// Exclude these formulas, by stable string id
    exclude: Vec<String>,

    #[arg(long, default_value_t = 1)]
    /// Maximum number of concurrently verified partition blocks
    threads: usize,

    #[arg(long)]
    /// Partition large maps for verification
    partitioned: bool,

    #[arg(long, default_value_t = 500)]
    /// Target lanelets per partition block
    chunk_size: usize,

    #[arg(long, default_value_t = 10)]
    /// Bound on repair/re-verify iterations per location
    max_iterations: usize,

    #[arg(long, default_value_t = 50.0)]
    /// Buffer distance in meters for partitioning and sub-map extraction
    buffer: f64,
}

impl VerificationArgs {
    fn formula_set(names: &[String]) -> BTreeSet<FormulaId> {
        names
            .iter()
            .map(|name| {
                FormulaId::from_str(name).unwrap_or_else(|| {
                    eprintln!("unknown formula id `{name}`; known ids are:");
                    for id in FormulaId::ALL {
                        eprintln!("  {id}");
                    }
                    process::exit(1);
                })
            })
            .collect()
    }

    fn to_config(&self, overwrite: bool) -> VerificationConfig {
        VerificationConfig {
            selected: if self.only.is_empty() {
                None
            } else {
                Some(Self::formula_set(&self.only))
            },
            excluded: Self::formula_set(&self.exclude),
            max_iterations: self.max_iterations,
            num_threads: self.threads,
            partitioned: self.partitioned,
            lanelet_chunk_size: self.chunk_size,
            buffer: self.buffer,
            overwrite,
            ..VerificationConfig::default()
        }
    }

    fn load_network(&self) -> RoadNetwork {
        let data = fs::read_to_string(&self.file).unwrap_or_else(|err| {
            eprintln!("could not read {}: {err}", self.file);
            process::exit(1);
        });
        serde_json::from_str(&data).unwrap_or_else(|err| {
            eprintln!("could not parse {}: {err}", self.file);
            process::exit(1);
        })
    }
}

#[derive(Args, Clone, Debug)]
struct VerifyArgs {
    #[command(flatten)]
    verification: VerificationArgs,

    #[arg(long)]
    /// Print timing statistics
    time: bool,
}

#[derive(Args, Clone, Debug)]
struct RepairArgs {
    #[command(flatten)]
    verification: VerificationArgs,

    #[arg(short, long)]
    /// Write the repaired map here instead of overwriting the input file
    output: Option<String>,
}

#[derive(Subcommand, Clone, Debug)]
enum Command {
    /// Verify a map and report its invalid states
    Verify(VerifyArgs),
    /// Verify a map, repair every invalid state, and write the repaired map
    Repair(RepairArgs),
}

/// The lanelint CLI.
#[derive(Parser, Clone, Debug)]
#[command(about = "Verify and repair road-network maps", long_about = None)]
pub struct App {
    #[command(subcommand)]
    command: Command,
}

impl App {
    /// Run the command this app was configured with.
    pub fn exec(self) {
        match self.command {
            Command::Verify(args) => {
                let net = args.verification.load_network();
                let config = args.verification.to_config(false);
                let driver = Driver::new(&CATALOGUE, &config);
                let result = driver.verify(&net).unwrap_or_else(|err| {
                    eprintln!("verification failed: {err}");
                    process::exit(1);
                });
                println!(
                    "{}",
                    serde_json::to_string_pretty(&result).expect("result must serialize")
                );
                if args.time {
                    eprintln!("verified {} in {:.3}s", net.benchmark_id, result.runtime_secs);
                }
                if !result.initial.is_empty() {
                    process::exit(2);
                }
            }
            Command::Repair(args) => {
                let output = args
                    .output
                    .clone()
                    .unwrap_or_else(|| args.verification.file.clone());
                let mut net = args.verification.load_network();
                let config = args.verification.to_config(args.output.is_none());
                let driver = Driver::new(&CATALOGUE, &config);
                let result = driver.verify_and_repair(&mut net).unwrap_or_else(|err| {
                    eprintln!("repair failed: {err}");
                    process::exit(1);
                });
                let data =
                    serde_json::to_string_pretty(&net).expect("network must serialize");
                fs::write(&output, data).unwrap_or_else(|err| {
                    eprintln!("could not write {output}: {err}");
                    process::exit(1);
                });
                log::info!(
                    "repaired {} invalid states in {:.3}s",
                    result.initial.len(),
                    result.runtime_secs
                );
                println!(
                    "{}",
                    serde_json::to_string_pretty(&result).expect("result must serialize")
                );
            }
        }
    }
}
