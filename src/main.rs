use anyhow::{Context, Result};
use clap::Parser;
use dostrace::cli::{Cli, Command, FilterArgs, PrintArgs, StraceArgs};
use dostrace::decoder::{DecoderConfig, SyscallDecoder};
use dostrace::filter::TraceFilter;
use dostrace::substitution::{RuleOptions, RuleRegistry, SubstitutionEngine};
use dostrace::text_output::{Labels, PrintOptions, TracePrinter};
use dostrace::TraceStore;
use std::io::{self, BufWriter, Write};
use std::path::Path;
use std::time::Instant;
use tracing_subscriber::EnvFilter;

/// Initialize tracing subscriber for debug output
fn init_tracing(debug: bool) {
    if debug {
        tracing_subscriber::fmt()
            .with_env_filter(
                EnvFilter::from_default_env().add_directive(tracing::Level::TRACE.into()),
            )
            .with_writer(std::io::stderr)
            .init();
    }
}

fn load_trace(path: &Path, verbose: u8) -> Result<TraceStore> {
    let start = Instant::now();
    let store = TraceStore::open(path)
        .with_context(|| format!("Failed to load trace {}", path.display()))?;
    if verbose >= 1 {
        let secs = start.elapsed().as_secs_f64();
        eprintln!(
            "Loaded {} traced instructions in {:.1} secs ({:.0} insn/sec)",
            store.len(),
            secs,
            store.len() as f64 / secs.max(f64::EPSILON)
        );
    }
    Ok(store)
}

fn run_filter(args: FilterArgs, verbose: u8) -> Result<()> {
    let mut store = load_trace(&args.infile, verbose)?;
    store.filter_range(args.start, args.stop)?;
    let removed = TraceFilter::new(args.include).apply(&mut store);
    if verbose >= 1 {
        eprintln!(
            "Kept {} instructions, removed {}",
            store.len(),
            removed
        );
    }
    store
        .save(&args.outfile)
        .with_context(|| format!("Failed to write trace {}", args.outfile.display()))?;
    Ok(())
}

fn run_print(args: PrintArgs, verbose: u8) -> Result<()> {
    let mut store = load_trace(&args.infile, verbose)?;

    if !args.substitute.is_empty() {
        let sources = args
            .config
            .iter()
            .map(|path| {
                RuleOptions::from_file(path)
                    .with_context(|| format!("Failed to load options {}", path.display()))
            })
            .collect::<Result<Vec<_>>>()?;
        let options = RuleOptions::merged(sources);
        if verbose >= 2 {
            eprintln!("Configuration: {:?}", options);
        }

        let engine = SubstitutionEngine::new(RuleRegistry::with_builtin(), options);
        let start = Instant::now();
        let report = engine.run(&mut store, &args.substitute)?;
        if verbose >= 1 {
            for outcome in &report.outcomes {
                eprintln!(
                    "{}/{}: {} substitutions",
                    outcome.rule_set, outcome.rule, outcome.substitutions
                );
            }
        }
        if verbose >= 2 {
            eprintln!(
                "Substitutions finished after {:.1} sec",
                start.elapsed().as_secs_f64()
            );
        }
    }

    let labels = match &args.labels {
        Some(path) => Labels::from_file(path)
            .with_context(|| format!("Failed to load labels {}", path.display()))?,
        None => Labels::new(),
    };
    let options = PrintOptions {
        address_mode: args.address,
        show_hidden: args.show_hidden,
        full_regs: args.full_regs,
    };

    let stdout = io::stdout();
    let mut printer = TracePrinter::new(BufWriter::new(stdout.lock()), options).with_labels(labels);
    printer.print_store(&store)?;
    Ok(())
}

fn run_strace(args: StraceArgs, verbose: u8) -> Result<()> {
    let store = load_trace(&args.infile, verbose)?;
    let mut decoder = SyscallDecoder::new(DecoderConfig {
        vector: args.vector,
        lookahead: args.lookahead,
    });

    let stdout = io::stdout();
    let mut out = BufWriter::new(stdout.lock());
    for event in decoder.decode(&store) {
        writeln!(out, "{}", event)?;
    }
    out.flush()?;

    if args.summary {
        decoder.summary().print_summary();
    }
    Ok(())
}

fn main() -> Result<()> {
    let args = Cli::parse();

    // Initialize tracing if --debug flag is set
    init_tracing(args.debug);

    match args.command {
        Command::Filter(filter_args) => run_filter(filter_args, args.verbose),
        Command::Print(print_args) => run_print(print_args, args.verbose),
        Command::Strace(strace_args) => run_strace(strace_args, args.verbose),
    }
}
