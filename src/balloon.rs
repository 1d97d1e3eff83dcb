//! Balloon sizing.
//!
//! The target allocation is what the guest uses now plus a free margin,
//! never below the configured floor:
//!
//! ```text
//! target = max(actual - usable + free_margin, min_memory)
//! delta  = actual - target
//! ```
//!
//! A positive delta shrinks the guest, a negative one grows it. Resizing is
//! only worth it once the delta leaves the hysteresis band
//! `[-min_threshold, max_threshold]`.

use crate::config::ControllerConfig;
use crate::stats::MemorySnapshot;

/// Outcome of one sizing computation. All values are KiB.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResizePlan {
    /// Allocation reported by the guest.
    pub previous_kib: u64,

    /// Target before the floor was applied. May be negative.
    pub unclamped_kib: i64,

    /// Target after the floor was applied.
    pub target_kib: u64,

    /// `previous - target`.
    pub delta_kib: i64,
}

impl ResizePlan {
    /// Compute the plan for one statistics sample.
    pub fn compute(snapshot: &MemorySnapshot, config: &ControllerConfig) -> Self {
        let actual = signed(snapshot.actual());
        let usable = signed(snapshot.usable());

        let unclamped = actual
            .saturating_sub(usable)
            .saturating_add(signed(config.free_margin_kib));
        let target = unclamped.max(signed(config.min_memory_kib));

        Self {
            previous_kib: snapshot.actual(),
            unclamped_kib: unclamped,
            target_kib: target.unsigned_abs(),
            delta_kib: actual.saturating_sub(target),
        }
    }

    /// Whether the floor raised the target.
    pub fn is_clamped(&self) -> bool {
        self.unclamped_kib < signed(self.target_kib)
    }

    /// Whether the change is large enough to act on.
    ///
    /// Growth is gated by the min threshold, shrinking by the max threshold.
    pub fn should_resize(&self, config: &ControllerConfig) -> bool {
        self.delta_kib < -signed(config.min_threshold_kib)
            || self.delta_kib > signed(config.max_threshold_kib)
    }
}

/// Convert to i64, saturating. Validated configs always fit.
pub fn signed(kib: u64) -> i64 {
    i64::try_from(kib).unwrap_or(i64::MAX)
}

/// KiB to MiB for log output.
pub fn mib(kib: i64) -> f64 {
    kib as f64 / 1024.0
}
