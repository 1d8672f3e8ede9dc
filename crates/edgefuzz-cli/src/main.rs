use std::{env, process::ExitCode, time::Instant};

use edgefuzz_core::config::FuzzerConfig;
use edgefuzz_core::engine::NoopTracer;
use edgefuzz_core::events::{stderr_log_sink, Event};
use edgefuzz_core::lifter::NullLifter;
use edgefuzz_core::runner::transport::ArgvSpec;
use edgefuzz_core::Scheduler;

const DEFAULT_ITERATIONS: u64 = 10_000;
const DEFAULT_EDGE_COUNT: usize = 1 << 16;

fn main() -> ExitCode {
    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        eprintln!("usage: edgefuzz <target-binary> [target-args...] [--iterations N]");
        return ExitCode::FAILURE;
    }

    let (target_argv, iterations) = match split_iterations_flag(&args[1..]) {
        Ok(parts) => parts,
        Err(err) => {
            eprintln!("error: {err}");
            return ExitCode::FAILURE;
        }
    };
    if target_argv.is_empty() {
        eprintln!("error: no target binary given");
        return ExitCode::FAILURE;
    }

    let spec = Box::new(ArgvSpec::new(target_argv, Vec::new()));
    let config = FuzzerConfig::default();
    let mut scheduler = Scheduler::new(config, spec, Box::new(NullLifter), DEFAULT_EDGE_COUNT, seed());
    scheduler.subscribe(log_summary);
    scheduler.subscribe(stderr_log_sink);

    let start = Instant::now();
    let mut tracer = NoopTracer;
    for i in 0..iterations {
        if let Err(err) = scheduler.run_iteration(&mut tracer) {
            let elapsed = start.elapsed();
            eprintln!("error after {i} iterations, {elapsed:?}: {err}");
            return ExitCode::FAILURE;
        }
    }
    scheduler.shutdown("iteration budget exhausted");

    let elapsed = start.elapsed();
    eprintln!(
        "finished {iterations} iterations in {elapsed:?}; corpus size {}, edges found {}",
        scheduler.corpus().size(),
        scheduler.evaluator().found_edges(),
    );
    ExitCode::SUCCESS
}

/// Splits a trailing `--iterations N` pair off the target's own argv,
/// since everything after the binary name belongs to the target unless it
/// matches this one reserved flag.
fn split_iterations_flag(rest: &[String]) -> Result<(Vec<String>, u64), String> {
    if let Some(pos) = rest.iter().position(|a| a == "--iterations") {
        let value = rest.get(pos + 1).ok_or("--iterations requires a value")?;
        let iterations: u64 = value.parse().map_err(|_| format!("invalid --iterations value: {value}"))?;
        let mut target_argv = rest[..pos].to_vec();
        target_argv.extend_from_slice(&rest[pos + 2..]);
        Ok((target_argv, iterations))
    } else {
        Ok((rest.to_vec(), DEFAULT_ITERATIONS))
    }
}

fn seed() -> u64 {
    std::process::id() as u64
}

fn log_summary(event: &Event) {
    match event {
        Event::CrashFound { is_unique, behaviour, .. } => {
            eprintln!("crash found (unique={is_unique}, behaviour={behaviour:?})");
        }
        Event::InterestingProgramFound { aspects, .. } => {
            eprintln!("new corpus entry, {} edges", aspects.count());
        }
        _ => {}
    }
}
