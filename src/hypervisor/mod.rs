//! Hypervisor access.
//!
//! This module provides the abstractions the controller drives:
//! - [`Session`]: An open connection to a hypervisor
//! - [`Domain`]: A handle to one guest on that connection
//!
//! The shipped backend talks to libvirt through `virsh`.

pub mod virsh;

#[cfg(test)]
pub mod fake;

use crate::error::Result;
use crate::state::LifecycleState;
use crate::stats::MemorySnapshot;

pub use virsh::{VirshDomain, VirshSession};

/// An open hypervisor connection.
///
/// Dropping the session releases the connection.
pub trait Session {
    /// Connection URI this session was opened with.
    fn uri(&self) -> &str;

    /// Look up a domain by name.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::DomainNotFound`] if no domain has that name.
    fn lookup_domain<'a>(&'a self, name: &str) -> Result<Box<dyn Domain + 'a>>;
}

/// Handle to a single domain.
///
/// All calls block until the hypervisor answers.
pub trait Domain {
    /// Domain name.
    fn name(&self) -> &str;

    /// Current lifecycle state.
    fn current_state(&self) -> Result<LifecycleState>;

    /// Latest memory statistics sample.
    fn memory_statistics(&self) -> Result<MemorySnapshot>;

    /// Set the balloon target in KiB.
    fn set_memory(&self, target_kib: u64) -> Result<()>;

    /// Ask the balloon driver to refresh statistics every `period_secs`.
    fn set_statistics_period(&self, period_secs: u64) -> Result<()>;
}

impl<D: Domain + ?Sized> Domain for &D {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn current_state(&self) -> Result<LifecycleState> {
        (**self).current_state()
    }

    fn memory_statistics(&self) -> Result<MemorySnapshot> {
        (**self).memory_statistics()
    }

    fn set_memory(&self, target_kib: u64) -> Result<()> {
        (**self).set_memory(target_kib)
    }

    fn set_statistics_period(&self, period_secs: u64) -> Result<()> {
        (**self).set_statistics_period(period_secs)
    }
}

/// Open a session on the default backend.
///
/// # Errors
///
/// Returns [`crate::Error::Connection`] if the hypervisor can't be reached.
pub fn open_session(uri: &str) -> Result<Box<dyn Session>> {
    let session = VirshSession::open(uri)?;
    Ok(Box::new(session))
}
