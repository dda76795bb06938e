//! Two-thread stress test for the one-way queue.
//!
//! Usage:
//!     cargo run --release --bin owq-stress [REPEAT_COUNT]
//!
//! Each repetition runs four tiers: short and long queues of `i32`, then
//! short and long queues of `f64`.
//!
//! Environment variables:
//!     OWQ_COUNT=1048576  Enqueues per run (default: 1048576)
//!     PRODUCER_CPU=0     Pin producer to CPU 0 (default: unpinned)
//!     CONSUMER_CPU=2     Pin consumer to CPU 2 (default: unpinned)
//!     RUST_LOG=owq=debug Log filter (with `--features tracing`)

use std::env;
use std::process::ExitCode;

use owq::placement::CpuConfig;
use owq::stress::{self, DEFAULT_COUNT, Exit, Sequence, StressConfig, StressError, StressReport, Tier};

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    env::var(name).ok().and_then(|s| s.parse().ok())
}

fn cpu_config() -> CpuConfig {
    let producer_core = env_parse("PRODUCER_CPU");
    let consumer_core = env_parse("CONSUMER_CPU");
    if producer_core.is_none() && consumer_core.is_none() {
        CpuConfig::Disabled
    } else {
        CpuConfig::Manual {
            producer_core,
            consumer_core,
        }
    }
}

fn print_exit(side: &str, label: &str, exit: Exit) {
    match exit {
        Exit::Completed => {}
        Exit::Premature { count } => println!("  {label} {side} exits after {count} operations"),
        Exit::Halted => println!("  {label} {side} halted"),
    }
}

fn print_report(report: &StressReport) {
    print_exit("producer", &report.label, report.producer);
    print_exit("consumer", &report.label, report.consumer);
    println!(
        "  {} took {} milliseconds ({} ops/ms)",
        report.label,
        report.elapsed.as_millis(),
        report.throughput_per_ms()
    );
}

fn run_tier<T: Sequence>(tier: Tier, kind: &str, count: u64, cpu: CpuConfig) -> Result<bool, StressError> {
    let config = StressConfig::tier(tier, format!("{tier} {kind}"))
        .with_count(count)
        .with_placement(cpu);
    let report = stress::run::<T>(&config)?;
    print_report(&report);
    Ok(report.is_clean())
}

fn run_all(count: u64, cpu: CpuConfig) -> Result<bool, StressError> {
    let mut clean = true;
    clean &= run_tier::<i32>(Tier::Short, "int", count, cpu)?;
    clean &= run_tier::<i32>(Tier::Long, "int", count, cpu)?;
    clean &= run_tier::<f64>(Tier::Short, "double", count, cpu)?;
    clean &= run_tier::<f64>(Tier::Long, "double", count, cpu)?;
    Ok(clean)
}

fn main() -> ExitCode {
    owq::init_tracing();

    let repeat_count = match env::args().nth(1) {
        None => 1,
        Some(arg) => match arg.parse::<u32>() {
            Ok(n) if n > 0 => n,
            _ => {
                eprintln!("Bad repetition count");
                return ExitCode::FAILURE;
            }
        },
    };

    let count = env_parse("OWQ_COUNT").unwrap_or(DEFAULT_COUNT);
    let cpu = cpu_config();

    println!(
        "Owq test with {} enqs. Short queue = {} elements. Long queue = {} elements",
        count,
        Tier::Short.capacity(),
        Tier::Long.capacity()
    );

    let mut clean = true;
    for run in 1..=repeat_count {
        println!("Run {run}");
        match run_all(count, cpu) {
            Ok(run_clean) => clean &= run_clean,
            Err(e) => {
                eprintln!("  {e}");
                return ExitCode::FAILURE;
            }
        }
    }

    if clean { ExitCode::SUCCESS } else { ExitCode::FAILURE }
}
