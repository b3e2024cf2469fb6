use log::{debug, warn};
use std::fmt;

use crate::barcode::{fit, Fit};
use crate::config::EncoderConfig;
use crate::error::{MosaicError, Result};

/// Strictly above every supported symbol's capacity.
pub const DEFAULT_PROBE_UPPER: usize = 8192;

const PROBE_SEED: u64 = 0x5eed_0f_c0de;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct CapacityLimit(pub usize);

impl CapacityLimit {
    pub fn bytes(&self) -> usize {
        self.0
    }
}

impl fmt::Display for CapacityLimit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} bytes", self.0)
    }
}

#[derive(Debug, Clone)]
pub struct CapacityProbe {
    pub limit: CapacityLimit,
    pub attempts: usize,
    /// Attempts that failed for a reason other than size.
    pub library_errors: usize,
}

/// Seeded pseudo-random payload of `len` bytes, identical across runs.
pub fn synthetic_payload(len: usize) -> Vec<u8> {
    let mut x = PROBE_SEED ^ len as u64;
    (0..len)
        .map(|_| {
            x = x.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
            (x >> 56) as u8
        })
        .collect()
}

struct Attempts<'a> {
    config: &'a EncoderConfig,
    attempts: usize,
    library_errors: usize,
}

impl Attempts<'_> {
    fn fits(&mut self, size: usize) -> bool {
        self.attempts += 1;
        match fit(&synthetic_payload(size), self.config) {
            Ok(Fit::Fits(_)) => {
                debug!("Success: {} bytes", size);
                true
            }
            Ok(Fit::ExceedsCapacity) => {
                debug!("Fail: {} bytes exceed capacity", size);
                false
            }
            Err(e) => {
                warn!("Encoder error at {} bytes, counted as a size failure: {}", size, e);
                self.library_errors += 1;
                false
            }
        }
    }
}

/// Binary search for the largest payload that fits under `config`.
pub fn probe(config: &EncoderConfig) -> Result<CapacityProbe> {
    probe_with_upper(config, DEFAULT_PROBE_UPPER)
}

pub fn probe_with_upper(config: &EncoderConfig, upper: usize) -> Result<CapacityProbe> {
    let mut state = Attempts {
        config,
        attempts: 0,
        library_errors: 0,
    };

    if !state.fits(0) {
        return Err(MosaicError::EncodeFailure(format!(
            "{} encoder rejects an empty payload",
            config.symbology
        )));
    }
    if state.fits(upper) {
        return Err(MosaicError::InvalidInput(format!(
            "probe upper bound of {} bytes still fits; raise it",
            upper
        )));
    }

    // Invariant: `lo` fits, `hi` does not.
    let (mut lo, mut hi) = (0usize, upper);
    while hi - lo > 1 {
        let mid = lo + (hi - lo) / 2;
        if state.fits(mid) {
            lo = mid;
        } else {
            hi = mid;
        }
    }

    Ok(CapacityProbe {
        limit: CapacityLimit(lo),
        attempts: state.attempts,
        library_errors: state.library_errors,
    })
}

/// Walk sizes upward from `start` and stop at the first failure.
/// Returns the last size that fit, or `None` if `start` itself fails.
pub fn linear_probe(
    config: &EncoderConfig,
    start: usize,
    end: usize,
    step: usize,
) -> Option<CapacityLimit> {
    let mut state = Attempts {
        config,
        attempts: 0,
        library_errors: 0,
    };
    let mut last_success = None;

    for size in (start..=end).step_by(step.max(1)) {
        if !state.fits(size) {
            break;
        }
        last_success = Some(CapacityLimit(size));
    }

    last_success
}
