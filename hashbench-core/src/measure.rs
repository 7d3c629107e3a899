//! High-Precision Timing
//!
//! Uses RDTSCP on x86_64 and CNTVCT_EL0 on AArch64 for minimal overhead
//! cycle counting, next to `std::time::Instant` for wall-clock nanoseconds.
//! [`ClockMeasurement`] acquires the clock, pins the thread and calibrates
//! the empty-probe overhead before any benchmark runs.

use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};

// ─── Inline cycle counter helpers ────────────────────────────────────────────

/// Read the CPU cycle/tick counter (platform-specific).
#[cfg(target_arch = "x86_64")]
#[inline(always)]
fn read_cycles() -> u64 {
    // SAFETY: RDTSCP is available on all x86_64 CPUs since ~2006.
    // It waits for all prior instructions to complete before reading.
    unsafe {
        let mut _aux: u32 = 0;
        std::arch::x86_64::__rdtscp(&mut _aux)
    }
}

/// Read the virtual counter timer on AArch64 (comparable to x86 TSC).
#[cfg(target_arch = "aarch64")]
#[inline(always)]
fn read_cycles() -> u64 {
    let cnt: u64;
    // SAFETY: CNTVCT_EL0 is accessible from EL0 (userspace) on all
    // AArch64 implementations.
    unsafe {
        std::arch::asm!("mrs {}, cntvct_el0", out(reg) cnt, options(nostack, nomem));
    }
    cnt
}

#[cfg(not(any(target_arch = "x86_64", target_arch = "aarch64")))]
#[inline(always)]
fn read_cycles() -> u64 {
    0
}

/// Whether this platform provides real cycle counters.
pub const HAS_CYCLE_COUNTER: bool = cfg!(target_arch = "x86_64") || cfg!(target_arch = "aarch64");

// ─── Timer ───────────────────────────────────────────────────────────────────

/// Timer for measuring one batch of probe invocations
pub struct Timer {
    start: std::time::Instant,
    cycles_start: u64,
}

impl Timer {
    /// Start a new timer
    #[inline(always)]
    pub fn start() -> Self {
        let cycles_start = read_cycles();
        Self {
            start: std::time::Instant::now(),
            cycles_start,
        }
    }

    /// Stop the timer and return elapsed nanoseconds and cycles
    #[inline(always)]
    pub fn stop(&self) -> (u64, u64) {
        let nanos = self.start.elapsed().as_nanos() as u64;
        let cycles = read_cycles().saturating_sub(self.cycles_start);
        (nanos, cycles)
    }
}

// ─── CPU pinning ─────────────────────────────────────────────────────────────

/// CPU the calling thread is running on, if the OS can tell.
#[cfg(target_os = "linux")]
pub fn current_cpu() -> Option<usize> {
    // SAFETY: sched_getcpu has no preconditions.
    let cpu = unsafe { libc::sched_getcpu() };
    usize::try_from(cpu).ok()
}

/// CPU the calling thread is running on, if the OS can tell.
#[cfg(not(target_os = "linux"))]
pub fn current_cpu() -> Option<usize> {
    None
}

/// Set CPU affinity to pin the current thread to a specific core
///
/// This improves TSC stability by avoiding core migrations.
#[cfg(target_os = "linux")]
pub fn pin_to_cpu(cpu: usize) -> Result<(), std::io::Error> {
    use std::mem::MaybeUninit;

    unsafe {
        let mut set = MaybeUninit::<libc::cpu_set_t>::zeroed();
        let set_ref = set.assume_init_mut();

        libc::CPU_ZERO(set_ref);
        libc::CPU_SET(cpu, set_ref);

        let result = libc::sched_setaffinity(0, std::mem::size_of::<libc::cpu_set_t>(), set_ref);

        if result == 0 {
            Ok(())
        } else {
            Err(std::io::Error::last_os_error())
        }
    }
}

/// Set CPU affinity to pin the current thread to a specific core
#[cfg(not(target_os = "linux"))]
pub fn pin_to_cpu(_cpu: usize) -> Result<(), std::io::Error> {
    // CPU pinning not supported on this platform
    Ok(())
}

// ─── Measurement collaborator ────────────────────────────────────────────────

/// Why a usable clock source could not be acquired
#[derive(Debug, Error)]
pub enum MeasureError {
    /// The clock never advanced during calibration
    #[error("clock source '{source_name}' does not advance")]
    ClockUnavailable {
        /// Description of the clock that was tried
        source_name: String,
    },
    /// Calibration ran out of budget before any loop was accounted
    #[error("overhead calibration did not converge within {budget:?}")]
    CalibrationFailed {
        /// Time budget that was exhausted
        budget: Duration,
    },
}

/// Convergence statistics of the overhead calibration
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CalibrationStats {
    /// Calibration attempts discarded because the clock stalled
    pub retry_count: u32,
    /// Times a new best overhead restarted the convergence count
    pub restart_count: u32,
    /// Calibration loops whose result was accounted
    pub overhead_accounted_loops: u32,
    /// Calibration loops that measured nothing useful
    pub overhead_worthless_loops: u32,
    /// Whole seconds spent calibrating
    pub spent_seconds: u32,
    /// Best observed cost of an empty probe, in nanoseconds
    pub overhead_best: u64,
    /// Smallest batch duration considered meaningful, in nanoseconds
    pub overhead_gate: u64,
    /// Inner loop count used for calibration
    pub overhead_loops_max: u32,
    /// How many times the best overhead was observed
    pub overhead_best_count: u32,
    /// Smallest non-zero clock step observed, in nanoseconds
    pub granularity: f64,
}

/// Calibrated clock state, initialised once after verification succeeds
#[derive(Debug, Clone, PartialEq)]
pub struct MeasurementContext {
    /// Clock source description
    pub source: String,
    /// Units reported by [`Measurement::measure`]
    pub units: &'static str,
    /// Reading the clock is cheap relative to a tiny hash
    pub cheap: bool,
    /// The clock is monotonic and steady across cores
    pub stable: bool,
    /// CPU the thread was pinned to
    pub cpu: Option<usize>,
    /// Overhead calibration results
    pub calibration: CalibrationStats,
}

impl MeasurementContext {
    /// Measurable time slice: the clock granularity in [`units`](Self::units).
    pub fn mats(&self) -> f64 {
        self.calibration.granularity.max(f64::MIN_POSITIVE)
    }
}

/// Best per-invocation cost of a probe
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Sample {
    /// Nanoseconds per invocation, overhead subtracted
    pub nanos: f64,
    /// Cycles per invocation (0 without a cycle counter)
    pub cycles: f64,
    /// Batches measured
    pub batches: u32,
    /// Invocations per batch
    pub batch_size: u64,
}

/// Clock acquisition, overhead calibration and timed sweeps.
pub trait Measurement {
    /// Acquire a clock source and calibrate; an error means benchmarking is impossible here.
    fn initialize(&mut self) -> Result<MeasurementContext, MeasureError>;

    /// Time `probe` repeatedly and return its best per-invocation cost.
    fn measure(&mut self, ctx: &MeasurementContext, probe: &mut dyn FnMut() -> u64) -> Sample;
}

/// Knobs for [`ClockMeasurement`]
#[derive(Debug, Clone)]
pub struct ClockSettings {
    /// Warmup per probe
    pub warmup: Duration,
    /// Measurement budget per probe
    pub measurement: Duration,
    /// Batches collected per probe
    pub samples: u32,
    /// Pin the thread to its current CPU during initialisation
    pub pin_cpu: bool,
    /// Time budget for overhead calibration
    pub calibration_budget: Duration,
    /// Repeats of the best overhead that count as converged
    pub convergence: u32,
    /// Empty probes per calibration loop
    pub calibration_loops: u32,
}

impl Default for ClockSettings {
    fn default() -> Self {
        Self {
            warmup: Duration::from_millis(50),
            measurement: Duration::from_millis(200),
            samples: 32,
            pin_cpu: true,
            calibration_budget: Duration::from_secs(2),
            convergence: 7,
            calibration_loops: 64,
        }
    }
}

/// Monotonic clock plus hardware cycle counter
#[derive(Debug, Clone, Default)]
pub struct ClockMeasurement {
    settings: ClockSettings,
}

impl ClockMeasurement {
    /// Create with the given settings
    pub fn new(settings: ClockSettings) -> Self {
        Self { settings }
    }

    fn source_name() -> String {
        if HAS_CYCLE_COUNTER {
            format!("monotonic clock + {}", CYCLE_COUNTER_NAME)
        } else {
            "monotonic clock".to_string()
        }
    }

    /// Smallest non-zero step of the monotonic clock.
    fn granularity(&self) -> Option<u64> {
        let mut best: Option<u64> = None;
        for _ in 0..self.settings.calibration_loops.max(1) {
            let start = std::time::Instant::now();
            let mut spins = 0u32;
            let step = loop {
                let nanos = start.elapsed().as_nanos() as u64;
                if nanos > 0 {
                    break Some(nanos);
                }
                spins += 1;
                if spins > 1_000_000 {
                    break None;
                }
            };
            if let Some(step) = step {
                best = Some(best.map_or(step, |b| b.min(step)));
            }
        }
        best
    }

    fn calibrate(&self, granularity: u64) -> Result<CalibrationStats, MeasureError> {
        let budget = self.settings.calibration_budget;
        let loops = self.settings.calibration_loops.max(1);
        let started = std::time::Instant::now();
        let mut stats = CalibrationStats {
            overhead_loops_max: loops,
            overhead_best: u64::MAX,
            granularity: granularity as f64,
            ..CalibrationStats::default()
        };
        let mut sink = 0u64;

        while stats.overhead_best_count < self.settings.convergence.max(1) {
            if started.elapsed() > budget {
                break;
            }
            let timer = Timer::start();
            for i in 0..loops {
                sink = std::hint::black_box(sink.wrapping_add(u64::from(i)));
            }
            let (nanos, _) = timer.stop();

            if nanos == 0 {
                stats.retry_count += 1;
                stats.overhead_worthless_loops += 1;
                continue;
            }
            stats.overhead_accounted_loops += 1;

            let per_probe = nanos / u64::from(loops);
            if per_probe < stats.overhead_best {
                if stats.overhead_best != u64::MAX {
                    stats.restart_count += 1;
                }
                stats.overhead_best = per_probe;
                stats.overhead_best_count = 1;
            } else if per_probe == stats.overhead_best {
                stats.overhead_best_count += 1;
            } else {
                stats.overhead_worthless_loops += 1;
            }
        }
        std::hint::black_box(sink);

        stats.spent_seconds = started.elapsed().as_secs() as u32;
        if stats.overhead_accounted_loops == 0 {
            return Err(MeasureError::CalibrationFailed { budget });
        }
        stats.overhead_gate = granularity.saturating_mul(16).max(1_000);
        Ok(stats)
    }

    fn batch_size(&self, ctx: &MeasurementContext, probe: &mut dyn FnMut() -> u64) -> u64 {
        let warmup_until = std::time::Instant::now() + self.settings.warmup;
        let mut size = 1u64;
        loop {
            let timer = Timer::start();
            for _ in 0..size {
                std::hint::black_box(probe());
            }
            let (nanos, _) = timer.stop();
            let warm = std::time::Instant::now() >= warmup_until;
            if nanos >= ctx.calibration.overhead_gate && warm {
                return size;
            }
            if nanos < ctx.calibration.overhead_gate {
                size = size.saturating_mul(2);
            }
        }
    }
}

#[cfg(target_arch = "x86_64")]
const CYCLE_COUNTER_NAME: &str = "RDTSCP";
#[cfg(target_arch = "aarch64")]
const CYCLE_COUNTER_NAME: &str = "CNTVCT_EL0";
#[cfg(not(any(target_arch = "x86_64", target_arch = "aarch64")))]
const CYCLE_COUNTER_NAME: &str = "none";

impl Measurement for ClockMeasurement {
    fn initialize(&mut self) -> Result<MeasurementContext, MeasureError> {
        let cpu = if self.settings.pin_cpu {
            current_cpu().filter(|cpu| match pin_to_cpu(*cpu) {
                Ok(()) => true,
                Err(e) => {
                    debug!(cpu, error = %e, "cpu pinning failed");
                    false
                }
            })
        } else {
            None
        };

        let source = Self::source_name();
        let granularity = self.granularity().ok_or_else(|| MeasureError::ClockUnavailable {
            source_name: source.clone(),
        })?;
        let calibration = self.calibrate(granularity)?;
        info!(
            source = %source,
            granularity,
            overhead = calibration.overhead_best,
            "clock calibrated"
        );

        Ok(MeasurementContext {
            source,
            units: "ns",
            cheap: calibration.overhead_best <= 50,
            stable: true,
            cpu,
            calibration,
        })
    }

    fn measure(&mut self, ctx: &MeasurementContext, probe: &mut dyn FnMut() -> u64) -> Sample {
        let batch_size = self.batch_size(ctx, probe);
        let overhead = ctx.calibration.overhead_best as f64;
        let deadline = std::time::Instant::now() + self.settings.measurement;
        let target = self.settings.samples.max(1);

        let mut best = Sample {
            nanos: f64::INFINITY,
            cycles: f64::INFINITY,
            batches: 0,
            batch_size,
        };
        while best.batches < target {
            let timer = Timer::start();
            for _ in 0..batch_size {
                std::hint::black_box(probe());
            }
            let (nanos, cycles) = timer.stop();
            best.batches += 1;

            let per_call = (nanos as f64 / batch_size as f64 - overhead).max(0.0);
            let per_call_cycles = cycles as f64 / batch_size as f64;
            best.nanos = best.nanos.min(per_call);
            best.cycles = best.cycles.min(per_call_cycles);

            if std::time::Instant::now() >= deadline {
                break;
            }
        }
        if !HAS_CYCLE_COUNTER {
            best.cycles = 0.0;
        }
        best
    }
}
