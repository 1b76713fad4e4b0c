//! CLI argument parsing for dostrace

use crate::decoder::DEFAULT_LOOKAHEAD;
use crate::filter::IncludeClass;
use crate::text_output::AddressMode;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "dostrace")]
#[command(version)]
#[command(about = "Filter, annotate and syscall-trace DOS virtual machine traces", long_about = None)]
pub struct Cli {
    /// Increase verbosity (can be given multiple times)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Enable debug tracing output to stderr
    #[arg(long = "debug", global = true)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Filter a JSON trace file into a smaller one
    Filter(FilterArgs),
    /// Print a JSON trace file, optionally folding known idioms
    Print(PrintArgs),
    /// List the DOS service calls of a JSON trace file
    Strace(StraceArgs),
}

#[derive(Args, Debug)]
pub struct FilterArgs {
    /// Portions of the trace to keep (can be given multiple times)
    #[arg(short = 'i', long = "include", value_enum, required = true)]
    pub include: Vec<IncludeClass>,

    /// First instruction index to keep
    #[arg(long, value_name = "INSN_NO")]
    pub start: Option<u64>,

    /// Last instruction index to keep
    #[arg(long, value_name = "INSN_NO")]
    pub stop: Option<u64>,

    /// Input trace file in JSON format
    pub infile: PathBuf,

    /// Output trace file, filtered, in JSON format
    pub outfile: PathBuf,
}

#[derive(Args, Debug)]
pub struct PrintArgs {
    /// Label definitions (tracepoint indices and addresses)
    #[arg(short = 'l', long = "labels", value_name = "FILE")]
    pub labels: Option<PathBuf>,

    /// Substitution options (JSON or TOML); later files override earlier ones
    #[arg(short = 'c', long = "config", value_name = "FILE")]
    pub config: Vec<PathBuf>,

    /// Substitution rule set to run (can be given multiple times)
    #[arg(short = 's', long = "substitute", value_name = "RULESET")]
    pub substitute: Vec<String>,

    /// Address display mode
    #[arg(short = 'a', long = "address", value_enum, default_value = "actual")]
    pub address: AddressMode,

    /// Show instructions replaced by pseudo-ops
    #[arg(long = "show-hidden")]
    pub show_hidden: bool,

    /// Show the full register set on every line instead of the delta
    #[arg(long = "full-regs")]
    pub full_regs: bool,

    /// Input trace file in JSON format
    pub infile: PathBuf,
}

#[derive(Args, Debug)]
pub struct StraceArgs {
    /// Interrupt vector of the service calls (hex)
    #[arg(long, value_parser = parse_vector, default_value = "21")]
    pub vector: u8,

    /// Records searched after a call for its `iret`
    #[arg(long, default_value_t = DEFAULT_LOOKAHEAD)]
    pub lookahead: usize,

    /// Print a per-function summary to stderr after the listing
    #[arg(short = 'c', long = "summary")]
    pub summary: bool,

    /// Input trace file in JSON format
    pub infile: PathBuf,
}

fn parse_vector(text: &str) -> Result<u8, String> {
    let digits = text.trim_start_matches("0x");
    u8::from_str_radix(digits, 16).map_err(|e| format!("invalid interrupt vector {}: {}", text, e))
}
