//! Output Formatting
//!
//! Plain-text lines for the report stream:
//! - verification progress with per-probe detail on mismatch or when verbose
//! - the measurement context summary printed before benchmarking
//! - one throughput line per variant and key size

use super::execution::{BenchExecutionResult, BenchStatus};
use hashbench_core::MeasurementContext;
use hashbench_logic::{VariantVerification, VerificationStatus};

/// Width of the variant name column
const NAME_WIDTH: usize = 24;

/// Format the outcome of verifying one variant.
///
/// Passed probes are listed only when `verbose`; failed probes always are.
pub fn format_verification(result: &VariantVerification, verbose: bool) -> String {
    let mut output = String::new();
    let frozen = if result.experimental {
        " (not frozen)"
    } else {
        ""
    };
    output.push_str(&format!("Testing {}{}...", result.name, frozen));

    match &result.status {
        VerificationStatus::Skipped { reason } => {
            output.push_str(&format!(" Skipped ({})\n", reason));
        }
        VerificationStatus::Passed if !verbose => output.push_str(" Ok\n"),
        status => {
            output.push('\n');
            for probe in &result.probes {
                if probe.passed() && !verbose {
                    continue;
                }
                output.push_str(&format!(
                    "Pattern '{}', reference value {:016X}: ",
                    probe.caption, probe.expected
                ));
                if probe.passed() {
                    output.push_str("Passed\n");
                } else {
                    output.push_str(&format!("Failed! Got {:016X}\n", probe.actual));
                }
            }
            output.push_str(if status.is_success() { " Ok\n" } else { " Failed\n" });
        }
    }

    output
}

/// Format the clock source summary shown before benchmarking
pub fn format_measurement_context(ctx: &MeasurementContext, verbose: bool) -> String {
    let mut output = String::new();

    if let Some(cpu) = ctx.cpu {
        output.push_str(&format!(" - running on CPU#{}\n", cpu));
    }
    output.push_str(&format!(
        " - use {} as clock source for benchmarking\n",
        ctx.source
    ));
    output.push_str(&format!(
        " - assume it {} and {}\n",
        if ctx.cheap { "cheap" } else { "costly" },
        if ctx.stable {
            "stable"
        } else {
            "floating (RESULTS MAY VARY AND BE USELESS)"
        }
    ));

    let mats = ctx.mats();
    output.push_str(&format!(
        " - measure granularity and overhead: {} {}, {} iteration/{}\n",
        mats,
        ctx.units,
        1.0 / mats,
        ctx.units
    ));

    if verbose {
        let stats = &ctx.calibration;
        output.push_str(" - convergence: ");
        if stats.retry_count > 0 {
            output.push_str(&format!("retries {}, ", stats.retry_count));
        }
        output.push_str(&format!(
            "restarts {}, accounted-loops {}, worthless-loops {}, spent <{}s\n",
            stats.restart_count,
            stats.overhead_accounted_loops,
            stats.overhead_worthless_loops,
            stats.spent_seconds
        ));
        output.push_str(&format!(
            " - mats/overhead: best {}, gate {}, inner-loops-max {}, best-count {}\n",
            stats.overhead_best,
            stats.overhead_gate,
            stats.overhead_loops_max,
            stats.overhead_best_count
        ));
    }

    output
}

/// Header opening one size class
pub fn format_size_header(caption: &str, bytes: usize) -> String {
    format!("\nBench for {} keys ({} bytes):", caption, bytes)
}

/// One result line; experimental variants carry a `*` suffix
pub fn format_bench_line(result: &BenchExecutionResult, verbose: bool) -> String {
    let name = if result.experimental {
        format!("{}*", result.name)
    } else {
        result.name.clone()
    };

    let sample = match &result.status {
        BenchStatus::Measured(sample) => sample,
        BenchStatus::Crashed { message } => {
            return format!("{:<width$}: crashed: {}", name, message, width = NAME_WIDTH);
        }
    };

    let throughput = match result.bytes_per_ns() {
        Some(rate) => format!("{:>8.3} byte/ns", rate),
        None => format!("{:>8} byte/ns", "n/a"),
    };
    let mut line = format!(
        "{:<width$}: {:>10.3} ns/hash, {:>8.3} ns/byte, {}",
        name,
        sample.nanos,
        result.ns_per_byte().unwrap_or_default(),
        throughput,
        width = NAME_WIDTH
    );
    if sample.cycles > 0.0 {
        line.push_str(&format!(", {:>10.3} cycle/hash", sample.cycles));
    }
    if verbose {
        line.push_str(&format!(
            " ({} batches x {})",
            sample.batches, sample.batch_size
        ));
    }
    line
}
