//! Predicate interval policies over a half-open value domain.
//!
//! These functions fix the exact off-by-one behaviour of generated predicates:
//! measured selectivity depends on it.

use qbench_core::errors::{BenchError, ErrorInfo};
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Half-open value domain `[min, max)` of a loaded column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValueDomain {
    pub min: i64,
    pub max: i64,
}

impl ValueDomain {
    /// Domain of the selectivity and join data files.
    pub const SELECTIVITY: ValueDomain = ValueDomain { min: 0, max: 100_000 };
    /// Domain of the batched-scan data file.
    pub const BATCH: ValueDomain = ValueDomain { min: 0, max: 50_000 };

    pub fn new(min: i64, max: i64) -> Result<Self, BenchError> {
        let domain = Self { min, max };
        domain.validate()?;
        Ok(domain)
    }

    pub fn validate(&self) -> Result<(), BenchError> {
        if self.max <= self.min {
            return Err(BenchError::Configuration(
                ErrorInfo::new("domain-empty", "value domain must satisfy min < max")
                    .with_context("min", self.min.to_string())
                    .with_context("max", self.max.to_string()),
            ));
        }
        Ok(())
    }

    pub fn width(&self) -> i64 {
        self.max - self.min
    }
}

/// Products within this fraction of the domain width of an integer are taken
/// as that integer before rounding up.
const SPAN_SNAP: f64 = 1e-9;

/// Number of domain values a selectivity target spans, `ceil(s * width)`.
///
/// `s * width` is computed in floating point, so `0.035 * 100000` lands just
/// above `3500`; such products snap to the integer instead of rounding up.
pub fn selectivity_span(selectivity: f64, domain: &ValueDomain) -> Result<i64, BenchError> {
    domain.validate()?;
    if !selectivity.is_finite() || !(0.0..1.0).contains(&selectivity) {
        return Err(BenchError::Configuration(
            ErrorInfo::new("selectivity-range", "selectivity must lie in [0, 1)")
                .with_context("selectivity", selectivity.to_string()),
        ));
    }
    let width = domain.width() as f64;
    let raw = selectivity * width;
    let nearest = raw.round();
    let span = if (raw - nearest).abs() <= SPAN_SNAP * width {
        nearest
    } else {
        raw.ceil()
    };
    Ok(span as i64)
}

/// Span of a selectivity target that leaves room for at least one lower bound.
pub fn realizable_span(selectivity: f64, domain: &ValueDomain) -> Result<i64, BenchError> {
    let span = selectivity_span(selectivity, domain)?;
    if domain.max - span - 1 < domain.min {
        return Err(BenchError::Configuration(
            ErrorInfo::new(
                "selectivity-interval-unrealizable",
                "selectivity target exceeds the value domain",
            )
            .with_context("selectivity", selectivity.to_string())
            .with_context("span", span.to_string())
            .with_context("domain", format!("[{}, {})", domain.min, domain.max)),
        ));
    }
    Ok(span)
}

/// Draws `(lower, upper)` so that `upper - lower == ceil(s * width) + 1`.
///
/// `lower` is uniform in `[min, max - span - 1]`; targets whose span leaves no
/// room for a lower bound are rejected.
pub fn selectivity_interval<R: Rng>(
    selectivity: f64,
    domain: &ValueDomain,
    rng: &mut R,
) -> Result<(i64, i64), BenchError> {
    let span = realizable_span(selectivity, domain)?;
    let lower = rng.gen_range(domain.min..=domain.max - span - 1);
    Ok((lower, lower + span + 1))
}

/// Rejects data-size windows that are empty or do not fit inside `domain`.
pub fn ensure_window_fits(size: i64, domain: &ValueDomain) -> Result<(), BenchError> {
    domain.validate()?;
    if size <= 0 || domain.max - size - 1 < domain.min {
        return Err(BenchError::Configuration(
            ErrorInfo::new(
                "window-unrealizable",
                "data-size window must be positive and fit inside the domain",
            )
            .with_context("size", size.to_string())
            .with_context("domain", format!("[{}, {})", domain.min, domain.max)),
        ));
    }
    Ok(())
}

/// Draws `(lower, lower + size)` with `lower` uniform in `[min, max - size - 1]`.
pub fn fixed_width_interval<R: Rng>(
    size: i64,
    domain: &ValueDomain,
    rng: &mut R,
) -> Result<(i64, i64), BenchError> {
    ensure_window_fits(size, domain)?;
    let lower = rng.gen_range(domain.min..=domain.max - size - 1);
    Ok((lower, lower + size))
}

/// Bands for batched-scan predicates: the lower bound is drawn near the bottom
/// of the domain and the upper bound near the top.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanBands {
    pub domain: ValueDomain,
    /// Lower bound lies in `[min, min + lower_spread]`.
    pub lower_spread: i64,
    /// Upper bound lies in `[max - upper_spread, max]`.
    pub upper_spread: i64,
}

impl Default for ScanBands {
    fn default() -> Self {
        Self {
            domain: ValueDomain::BATCH,
            lower_spread: 200,
            upper_spread: 10_000,
        }
    }
}

impl ScanBands {
    pub fn validate(&self) -> Result<(), BenchError> {
        self.domain.validate()?;
        let lower_top = self.domain.min + self.lower_spread;
        let upper_bottom = self.domain.max - self.upper_spread;
        if self.lower_spread < 0 || self.upper_spread < 0 || lower_top >= upper_bottom {
            return Err(BenchError::Configuration(
                ErrorInfo::new("scan-bands-overlap", "scan bands must be disjoint")
                    .with_context("lower_band", format!("[{}, {}]", self.domain.min, lower_top))
                    .with_context("upper_band", format!("[{}, {}]", upper_bottom, self.domain.max)),
            ));
        }
        Ok(())
    }

    /// Draws one `(lower, upper)` pair; `lower < upper` always holds.
    pub fn draw<R: Rng>(&self, rng: &mut R) -> Result<(i64, i64), BenchError> {
        self.validate()?;
        let lower = rng.gen_range(self.domain.min..=self.domain.min + self.lower_spread);
        let upper = rng.gen_range(self.domain.max - self.upper_spread..=self.domain.max);
        Ok((lower, upper))
    }
}
