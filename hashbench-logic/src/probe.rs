//! Canonical probe schedule
//!
//! Reference tables list expected outputs in exactly this order. Changing the
//! schedule invalidates every table registered against it.

/// 64-byte pattern shared by the short probes
pub const PATTERN: [u8; 64] = [
    0, 1, 2, 3, 4, 5, 6, 7, 0xFF, 0x7F, 0x3F, 0x1F, 0xF, 8, 16, 32, 64, 0x80, 0xFE, 0xFC, 0xF8,
    0xF0, 0xE0, 0xC0, 0x80, 0x55, 0xAA, 11, 17, 19, 23, 29, 31, 37, 41, 43, 47, 53, 59, 61, 67,
    71, 73, 79, 83, 89, 97, 101, 103, 107, 109, 113, 127, 131, 137, 139, 149, 151, 157, 163, 167,
    173, 179, 181,
];

/// Length of the byte ramp used by the long probes
pub const LONG_PATTERN_LEN: usize = 512;

/// Number of probes in the schedule (and entries in a complete reference table)
pub const PROBE_COUNT: usize = 3 + 63 + 7 + 8;

/// Which buffer a probe reads from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    /// No input
    Empty,
    /// [`PATTERN`]
    Pattern,
    /// The 512-byte ramp `0, 1, 2, ...`
    Ramp,
}

/// One input/seed combination of the schedule
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Probe {
    /// Caption printed in reports, e.g. `bin07-1p64`
    pub caption: String,
    /// Buffer the input is sliced from
    pub source: Source,
    /// Start offset into the buffer
    pub offset: usize,
    /// Input length
    pub len: usize,
    /// Hash seed
    pub seed: u64,
}

impl Probe {
    /// Slice the probe's input out of the shared buffers
    pub fn input<'a>(&self, buffers: &'a ProbeBuffers) -> &'a [u8] {
        let buf: &[u8] = match self.source {
            Source::Empty => &[],
            Source::Pattern => &buffers.pattern,
            Source::Ramp => &buffers.ramp,
        };
        &buf[self.offset..self.offset + self.len]
    }
}

/// Backing storage for probe inputs
#[derive(Debug, Clone)]
pub struct ProbeBuffers {
    pattern: [u8; 64],
    ramp: Vec<u8>,
}

impl ProbeBuffers {
    /// Allocate the pattern and the ramp
    pub fn new() -> Self {
        Self {
            pattern: PATTERN,
            ramp: (0..LONG_PATTERN_LEN).map(|i| i as u8).collect(),
        }
    }
}

impl Default for ProbeBuffers {
    fn default() -> Self {
        Self::new()
    }
}

/// Build the full schedule in reference-table order.
pub fn schedule() -> Vec<Probe> {
    let mut probes = Vec::with_capacity(PROBE_COUNT);
    let probe = |caption: String, source, offset, len, seed| Probe {
        caption,
        source,
        offset,
        len,
        seed,
    };

    probes.push(probe("empty-zero".into(), Source::Empty, 0, 0, 0));
    probes.push(probe("empty-all1".into(), Source::Empty, 0, 0, !0u64));
    probes.push(probe("bin64-zero".into(), Source::Pattern, 0, 64, 0));

    let mut seed = 1u64;
    for len in 1..64usize {
        probes.push(probe(
            format!("bin{:02}-1p{:02}", len, seed.trailing_zeros()),
            Source::Pattern,
            0,
            len,
            seed,
        ));
        seed <<= 1;
    }

    seed = !0u64;
    for shift in 1..=7usize {
        seed <<= 1;
        probes.push(probe(
            format!("align{}_F{}", shift, 64 - shift),
            Source::Pattern,
            shift,
            64 - shift,
            seed,
        ));
    }

    for i in 0..=7usize {
        let len = 128 + i * 17;
        probes.push(probe(
            format!("long-{:05}", len),
            Source::Ramp,
            i,
            len,
            seed,
        ));
    }

    probes
}
