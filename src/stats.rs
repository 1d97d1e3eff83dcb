//! Memory statistics snapshots.
//!
//! A [`MemorySnapshot`] wraps one `dommemstat` sample. Balloon drivers and
//! libvirt versions disagree on which counters they report, so every lookup
//! falls back to zero instead of failing.

use std::collections::HashMap;

/// Current balloon value (KiB).
pub const ACTUAL: &str = "actual";
/// Data read from swap space (KiB).
pub const SWAP_IN: &str = "swap_in";
/// Memory written out to swap space (KiB).
pub const SWAP_OUT: &str = "swap_out";
/// Page faults that required disk IO.
pub const MAJOR_FAULT: &str = "major_fault";
/// Page faults served without IO.
pub const MINOR_FAULT: &str = "minor_fault";
/// Memory left unused by the guest (KiB).
pub const UNUSED: &str = "unused";
/// Usable memory as seen by the guest (KiB).
pub const AVAILABLE: &str = "available";
/// Memory the balloon can reclaim without host swapping (KiB).
pub const USABLE: &str = "usable";
/// Timestamp of the last statistics update (seconds).
pub const LAST_UPDATE: &str = "last_update";
/// Guest page cache (KiB).
pub const DISK_CACHES: &str = "disk_caches";
/// Successful hugetlb page allocations.
pub const HUGETLB_PGALLOC: &str = "hugetlb_pgalloc";
/// Failed hugetlb page allocations.
pub const HUGETLB_PGFAIL: &str = "hugetlb_pgfail";
/// Resident set size of the domain process (KiB).
pub const RSS: &str = "rss";

/// Every counter name libvirt can report.
pub const FIELDS: [&str; 13] = [
    ACTUAL,
    SWAP_IN,
    SWAP_OUT,
    MAJOR_FAULT,
    MINOR_FAULT,
    UNUSED,
    AVAILABLE,
    USABLE,
    LAST_UPDATE,
    DISK_CACHES,
    HUGETLB_PGALLOC,
    HUGETLB_PGFAIL,
    RSS,
];

/// Read-only view of one memory statistics sample.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemorySnapshot {
    counters: HashMap<String, u64>,
}

impl MemorySnapshot {
    /// Wrap a raw counter map.
    pub fn new(counters: HashMap<String, u64>) -> Self {
        Self { counters }
    }

    /// Parse `virsh dommemstat` output.
    ///
    /// Each line is `<name> <value>`. Lines that don't match are skipped.
    pub fn parse(output: &str) -> Self {
        let mut counters = HashMap::new();

        for line in output.lines() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            let mut parts = line.split_whitespace();
            let parsed = match (parts.next(), parts.next(), parts.next()) {
                (Some(name), Some(value), None) => {
                    value.parse::<u64>().ok().map(|v| (name.to_string(), v))
                }
                _ => None,
            };

            match parsed {
                Some((name, value)) => {
                    counters.insert(name, value);
                }
                None => tracing::debug!(line = %line, "skipping unrecognized dommemstat line"),
            }
        }

        Self { counters }
    }

    /// Value of a counter, or 0 if the sample doesn't carry it.
    pub fn field(&self, name: &str) -> u64 {
        self.counters.get(name).copied().unwrap_or(0)
    }

    /// Whether the sample carries a counter.
    pub fn contains(&self, name: &str) -> bool {
        self.counters.contains_key(name)
    }

    /// Current balloon allocation in KiB.
    pub fn actual(&self) -> u64 {
        self.field(ACTUAL)
    }

    /// Memory reclaimable without host swapping, in KiB.
    pub fn usable(&self) -> u64 {
        self.field(USABLE)
    }

    /// Memory left unused by the guest, in KiB.
    pub fn unused(&self) -> u64 {
        self.field(UNUSED)
    }

    /// Usable memory as seen by the guest, in KiB.
    pub fn available(&self) -> u64 {
        self.field(AVAILABLE)
    }

    /// Resident set size of the domain process, in KiB.
    pub fn rss(&self) -> u64 {
        self.field(RSS)
    }

    pub fn swap_in(&self) -> u64 {
        self.field(SWAP_IN)
    }

    pub fn swap_out(&self) -> u64 {
        self.field(SWAP_OUT)
    }

    pub fn major_fault(&self) -> u64 {
        self.field(MAJOR_FAULT)
    }

    pub fn minor_fault(&self) -> u64 {
        self.field(MINOR_FAULT)
    }

    pub fn disk_caches(&self) -> u64 {
        self.field(DISK_CACHES)
    }

    pub fn hugetlb_pgalloc(&self) -> u64 {
        self.field(HUGETLB_PGALLOC)
    }

    pub fn hugetlb_pgfail(&self) -> u64 {
        self.field(HUGETLB_PGFAIL)
    }

    /// Timestamp of the last statistics update, in seconds.
    pub fn last_update(&self) -> u64 {
        self.field(LAST_UPDATE)
    }
}

impl<'a> FromIterator<(&'a str, u64)> for MemorySnapshot {
    fn from_iter<I: IntoIterator<Item = (&'a str, u64)>>(iter: I) -> Self {
        Self::new(iter.into_iter().map(|(k, v)| (k.to_string(), v)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOMMEMSTAT: &str = "actual 4194304
swap_in 0
swap_out 0
major_fault 312
minor_fault 170422
unused 3512220
available 4026540
usable 3601448
last_update 1718018912
disk_caches 121804
hugetlb_pgalloc 0
hugetlb_pgfail 0
rss 1025780
";

    #[test]
    fn test_missing_fields_default_to_zero() {
        let snapshot = MemorySnapshot::default();
        for name in FIELDS {
            assert_eq!(snapshot.field(name), 0, "{} should default to 0", name);
        }
        assert_eq!(snapshot.field("not_a_counter"), 0);
        assert_eq!(snapshot.actual(), 0);
        assert_eq!(snapshot.usable(), 0);
    }

    #[test]
    fn test_partial_sample() {
        let snapshot: MemorySnapshot = [(ACTUAL, 2_097_152)].into_iter().collect();
        assert_eq!(snapshot.actual(), 2_097_152);
        assert_eq!(snapshot.usable(), 0);
        assert!(snapshot.contains(ACTUAL));
        assert!(!snapshot.contains(USABLE));
    }

    #[test]
    fn test_parse_dommemstat() {
        let snapshot = MemorySnapshot::parse(DOMMEMSTAT);
        assert_eq!(snapshot.actual(), 4_194_304);
        assert_eq!(snapshot.usable(), 3_601_448);
        assert_eq!(snapshot.unused(), 3_512_220);
        assert_eq!(snapshot.available(), 4_026_540);
        assert_eq!(snapshot.rss(), 1_025_780);
        assert_eq!(snapshot.major_fault(), 312);
        assert_eq!(snapshot.minor_fault(), 170_422);
        assert_eq!(snapshot.disk_caches(), 121_804);
        assert_eq!(snapshot.last_update(), 1_718_018_912);
        assert_eq!(snapshot.swap_in(), 0);
        assert_eq!(snapshot.swap_out(), 0);
        assert_eq!(snapshot.hugetlb_pgalloc(), 0);
        assert_eq!(snapshot.hugetlb_pgfail(), 0);
    }

    #[test]
    fn test_parse_skips_garbage() {
        let snapshot = MemorySnapshot::parse("actual 1024\nerror: something\nusable abc\n\n");
        assert_eq!(snapshot.actual(), 1024);
        assert!(!snapshot.contains(USABLE), "non-numeric value must be skipped");
        assert_eq!(snapshot.usable(), 0);
    }

    #[test]
    fn test_parse_empty_output() {
        assert_eq!(MemorySnapshot::parse(""), MemorySnapshot::default());
    }
}
