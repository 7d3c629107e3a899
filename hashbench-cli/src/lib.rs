#![warn(missing_docs)]
//! hashbench CLI Library
//!
//! This module provides the harness behind benchmark binaries: option
//! resolution, the capability gate, reference verification and the timed
//! sweep, sequenced by [`Harness`]. Use `hashbench::run()` (or
//! `hashbench_cli::run()`) in your main function to get the full command-line
//! experience with your registered variants.
//!
//! # Example
//!
//! ```ignore
//! hashbench::register_variant! {
//!     VariantDef::new("my_hash64", my_hash64, FlagSet::of(Flag::Gen1), &MY_REFERENCE)
//! }
//!
//! fn main() -> std::process::ExitCode {
//!     hashbench::run()
//! }
//! ```

mod config;
mod executor;
mod options;
mod usage;

pub use config::{
    CONFIG_ENV, CONFIG_FILE, CalibrationConfig, ConfigError, HashbenchConfig, RunnerConfig,
};
pub use executor::{
    BenchExecutionResult, BenchStatus, BuildProfile, ExecutionConfig, Executor, format_bench_line,
    format_measurement_context, format_size_header, format_verification,
};
pub use options::{Resolution, Resolved, Token, resolve, wants_verbose};
pub use usage::usage;

use hashbench_core::{
    Capabilities, ClockMeasurement, Flag, Measurement, NativeProbe, Platform, VariantDef,
    registered_variants,
};
use hashbench_logic::{aggregate_verifications, run_verification};
use std::io::{self, Write};
use thiserror::Error;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

/// Environment variable holding a `tracing` filter directive
pub const LOG_ENV: &str = "HASHBENCH_LOG";

/// Program name used in diagnostics when `argv[0]` is missing
const DEFAULT_PROGRAM: &str = "hashbench";

/// Failures that are not part of the normal outcome space
#[derive(Debug, Error)]
pub enum HarnessError {
    /// Writing the report or diagnostics failed
    #[error("failed to write output: {0}")]
    Io(#[from] io::Error),
}

/// How a run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Verification passed and every requested stage ran
    Completed,
    /// Usage text was requested
    Help,
    /// An unrecognised token was given
    UsageError,
    /// `--aes` was given without usable acceleration
    AccelUnavailable,
    /// At least one variant mismatched its reference table
    VerificationFailed,
    /// No usable clock source; benchmarking was skipped
    MeasurementUnavailable,
}

impl Outcome {
    /// Process exit status for this outcome
    pub const fn exit_code(self) -> u8 {
        match self {
            Outcome::Completed | Outcome::Help | Outcome::MeasurementUnavailable => 0,
            Outcome::UsageError | Outcome::AccelUnavailable | Outcome::VerificationFailed => 1,
        }
    }

    /// Whether the process exits successfully
    pub const fn is_success(self) -> bool {
        self.exit_code() == 0
    }
}

/// The verify-then-benchmark state machine.
///
/// Every collaborator is injected so a run can be driven entirely from tests:
/// capabilities, platform defaults, the variant list and the measurement.
pub struct Harness<'v, M: Measurement> {
    program: String,
    caps: Capabilities,
    platform: Platform,
    variants: Vec<&'v VariantDef>,
    measurement: M,
    execution: ExecutionConfig,
}

impl<'v, M: Measurement> Harness<'v, M> {
    /// New harness with no variants, no acceleration and the host platform
    pub fn new(program: impl Into<String>, measurement: M) -> Self {
        Self {
            program: program.into(),
            caps: Capabilities::none(),
            platform: Platform::current(),
            variants: Vec::new(),
            measurement,
            execution: ExecutionConfig::default(),
        }
    }

    /// Use resolved hardware capabilities
    pub fn with_capabilities(mut self, caps: Capabilities) -> Self {
        self.caps = caps;
        self
    }

    /// Override the platform that picks the default exclusions
    pub fn with_platform(mut self, platform: Platform) -> Self {
        self.platform = platform;
        self
    }

    /// Variants to verify and benchmark, in report order
    pub fn with_variants(mut self, variants: Vec<&'v VariantDef>) -> Self {
        self.variants = variants;
        self
    }

    /// Benchmark execution settings
    pub fn with_execution(mut self, execution: ExecutionConfig) -> Self {
        self.execution = execution;
        self
    }

    /// The measurement collaborator
    pub fn measurement(&self) -> &M {
        &self.measurement
    }

    /// Run once over `args` (without the program name), writing the report to
    /// `out` and diagnostics to `err`.
    pub fn run<S: AsRef<str>>(
        &mut self,
        args: &[S],
        out: &mut dyn Write,
        err: &mut dyn Write,
    ) -> Result<Outcome, HarnessError> {
        let resolution = match resolve(args, &self.caps, self.platform) {
            Resolved::Run(resolution) => resolution,
            Resolved::Help => {
                out.write_all(usage(&self.caps).as_bytes())?;
                return Ok(Outcome::Help);
            }
            Resolved::Unknown { token } => {
                write!(err, "{}: unknown option '{}'\n\n", self.program, token)?;
                err.write_all(usage(&self.caps).as_bytes())?;
                return Ok(Outcome::UsageError);
            }
            Resolved::AccelUnavailable { token } => {
                writeln!(
                    err,
                    "{}: AES-NI not available for '{}', bailout",
                    self.program, token
                )?;
                return Ok(Outcome::AccelUnavailable);
            }
        };
        for token in &resolution.ignored {
            writeln!(
                err,
                "{}: AES-NI not available for '{}', ignore",
                self.program, token
            )?;
        }

        let reconciled = self.caps.reconcile(resolution.enabled);
        for notice in &reconciled.notices {
            writeln!(out, "{}", notice)?;
        }
        let enabled = reconciled.enabled;
        let disabled = resolution.disabled;

        info!(variants = self.variants.len(), "verifying reference tables");
        let verbose = enabled.contains(Flag::TestVerbose);
        let results = run_verification(&self.variants, &self.caps);
        for result in &results {
            out.write_all(format_verification(result, verbose).as_bytes())?;
        }
        let summary = aggregate_verifications(&results);
        debug!(?summary, "verification finished");
        if summary.failed() {
            warn!(
                failed = summary.failed,
                mismatches = summary.mismatched_probes,
                "verification failed, benchmarking refused"
            );
            return Ok(Outcome::VerificationFailed);
        }

        if resolution.tests_only {
            info!("tests only, skipping benchmark");
            return Ok(Outcome::Completed);
        }

        writeln!(out, "\nPreparing to benchmarking...")?;
        out.flush()?;
        let ctx = match self.measurement.initialize() {
            Ok(ctx) => ctx,
            Err(e) => {
                info!(error = %e, "measurement unavailable");
                writeln!(out, " - sorry, usable clock-source unavailable")?;
                return Ok(Outcome::MeasurementUnavailable);
            }
        };
        let bench_verbose = enabled.contains(Flag::BenchVerbose);
        out.write_all(format_measurement_context(&ctx, bench_verbose).as_bytes())?;
        out.flush()?;

        let selected: Vec<&VariantDef> = self
            .variants
            .iter()
            .copied()
            .filter(|v| v.is_selected(enabled, disabled, &self.caps))
            .collect();
        debug!(
            selected = selected.len(),
            enabled = %enabled,
            disabled = %disabled,
            "benchmark selection"
        );

        let config = ExecutionConfig {
            verbose: bench_verbose,
            ..self.execution.clone()
        };
        Executor::new(config, &mut self.measurement, &ctx).execute(enabled, &selected, out)?;
        out.flush()?;

        Ok(Outcome::Completed)
    }
}

/// Install the global `tracing` subscriber writing to stderr.
///
/// `HASHBENCH_LOG` wins; otherwise `verbose` picks debug over warn. A
/// subscriber that is already installed is left in place.
pub fn init_logging(verbose: bool) {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| {
        EnvFilter::new(if verbose {
            "hashbench=debug"
        } else {
            "hashbench=warn"
        })
    });
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();
}

/// Run the hashbench CLI with the process arguments.
/// This is the main entry point for harness binaries.
pub fn run() -> anyhow::Result<Outcome> {
    run_with_args(std::env::args())
}

/// Run the hashbench CLI with an explicit argument list (`argv[0]` first),
/// the registered variants and the native CPU probe.
pub fn run_with_args<I, S>(args: I) -> anyhow::Result<Outcome>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let mut args = args.into_iter().map(Into::into);
    let program = args.next().unwrap_or_else(|| DEFAULT_PROGRAM.to_string());
    let args: Vec<String> = args.collect();

    init_logging(wants_verbose(&args));

    let config = HashbenchConfig::discover();
    let caps = Capabilities::resolve_with_env(&NativeProbe);
    let execution = ExecutionConfig {
        buffer_seed: config.runner.seed,
        ..ExecutionConfig::default()
    };

    let mut harness = Harness::new(program, ClockMeasurement::new(config.clock_settings()))
        .with_capabilities(caps)
        .with_variants(registered_variants())
        .with_execution(execution);

    let stdout = io::stdout();
    let stderr = io::stderr();
    let outcome = harness.run(&args, &mut stdout.lock(), &mut stderr.lock())?;
    debug!(?outcome, "run finished");
    Ok(outcome)
}
