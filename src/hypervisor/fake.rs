//! In-memory hypervisor for tests.

use super::{Domain, Session};
use crate::error::{Error, Result};
use crate::state::LifecycleState;
use crate::stats::{MemorySnapshot, ACTUAL, USABLE};
use std::cell::{Cell, RefCell};
use std::collections::{HashMap, VecDeque};

/// Domain that replays scripted states and records resize requests.
///
/// Once the script runs out the domain reports `ShutOff`.
pub struct FakeDomain {
    name: String,
    states: RefCell<VecDeque<LifecycleState>>,
    counters: RefCell<HashMap<String, u64>>,
    resizes: RefCell<Vec<u64>>,
    stats_period: Cell<Option<u64>>,
    stats_reads: Cell<usize>,
    fail_stats: Cell<bool>,
    fail_resize: Cell<bool>,
    fail_state: Cell<bool>,
    disconnected: Cell<bool>,
}

impl FakeDomain {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            states: RefCell::new(VecDeque::new()),
            counters: RefCell::new(HashMap::new()),
            resizes: RefCell::new(Vec::new()),
            stats_period: Cell::new(None),
            stats_reads: Cell::new(0),
            fail_stats: Cell::new(false),
            fail_resize: Cell::new(false),
            fail_state: Cell::new(false),
            disconnected: Cell::new(false),
        }
    }

    /// Queue states returned by successive `current_state` calls.
    pub fn with_states(self, states: &[LifecycleState]) -> Self {
        self.states.borrow_mut().extend(states.iter().copied());
        self
    }

    /// Set the `actual` and `usable` counters, in KiB.
    pub fn with_memory(self, actual_kib: u64, usable_kib: u64) -> Self {
        {
            let mut counters = self.counters.borrow_mut();
            counters.insert(ACTUAL.to_string(), actual_kib);
            counters.insert(USABLE.to_string(), usable_kib);
        }
        self
    }

    /// Set a single counter, in KiB.
    pub fn with_counter(self, name: &str, kib: u64) -> Self {
        self.counters.borrow_mut().insert(name.to_string(), kib);
        self
    }

    /// Set only the `actual` counter, in KiB.
    pub fn with_actual(self, actual_kib: u64) -> Self {
        self.with_counter(ACTUAL, actual_kib)
    }

    /// Make statistics reads fail as if the connection dropped.
    pub fn disconnect(self) -> Self {
        self.disconnected.set(true);
        self
    }

    pub fn fail_stats(self) -> Self {
        self.fail_stats.set(true);
        self
    }

    pub fn fail_resize(self) -> Self {
        self.fail_resize.set(true);
        self
    }

    pub fn fail_state(self) -> Self {
        self.fail_state.set(true);
        self
    }

    /// Targets passed to `set_memory`, in call order.
    pub fn resizes(&self) -> Vec<u64> {
        self.resizes.borrow().clone()
    }

    pub fn stats_period(&self) -> Option<u64> {
        self.stats_period.get()
    }

    pub fn stats_reads(&self) -> usize {
        self.stats_reads.get()
    }
}

impl Domain for FakeDomain {
    fn name(&self) -> &str {
        &self.name
    }

    fn current_state(&self) -> Result<LifecycleState> {
        if self.fail_state.get() {
            return Err(Error::StateQuery {
                domain: self.name.clone(),
                message: "connection reset".to_string(),
            });
        }
        Ok(self
            .states
            .borrow_mut()
            .pop_front()
            .unwrap_or(LifecycleState::ShutOff))
    }

    fn memory_statistics(&self) -> Result<MemorySnapshot> {
        self.stats_reads.set(self.stats_reads.get() + 1);
        if self.disconnected.get() {
            return Err(Error::connection("test:///default", "connection reset by peer"));
        }
        if self.fail_stats.get() {
            return Err(Error::stats(&self.name, "balloon driver not loaded"));
        }
        Ok(MemorySnapshot::new(self.counters.borrow().clone()))
    }

    fn set_memory(&self, target_kib: u64) -> Result<()> {
        self.resizes.borrow_mut().push(target_kib);
        if self.fail_resize.get() {
            return Err(Error::resize(&self.name, target_kib, "operation denied"));
        }
        // The balloon settles immediately.
        self.counters
            .borrow_mut()
            .insert(ACTUAL.to_string(), target_kib);
        Ok(())
    }

    fn set_statistics_period(&self, period_secs: u64) -> Result<()> {
        self.stats_period.set(Some(period_secs));
        Ok(())
    }
}

/// Session holding a fixed set of domains.
pub struct FakeSession {
    domains: Vec<FakeDomain>,
}

impl FakeSession {
    pub fn new(domains: Vec<FakeDomain>) -> Self {
        Self { domains }
    }

    pub fn domain(&self, name: &str) -> Option<&FakeDomain> {
        self.domains.iter().find(|d| d.name == name)
    }
}

impl Session for FakeSession {
    fn uri(&self) -> &str {
        "test:///default"
    }

    fn lookup_domain<'a>(&'a self, name: &str) -> Result<Box<dyn Domain + 'a>> {
        self.domain(name)
            .map(|d| Box::new(d) as Box<dyn Domain + 'a>)
            .ok_or_else(|| Error::DomainNotFound(name.to_string()))
    }
}
