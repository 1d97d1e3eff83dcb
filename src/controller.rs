//! The balloon control loop.
//!
//! One sequential loop per process: query the domain state, run the
//! behavior registered for it, sleep, repeat. The loop ends when a behavior
//! signals [`ControlSignal::Stop`] or a fatal error surfaces.

use crate::balloon::{mib, signed};
use crate::config::ControllerConfig;
use crate::dispatch::{ControlSignal, StateDispatcher};
use crate::error::Result;
use crate::hypervisor::{self, Domain, Session};
use std::sync::Arc;
use std::time::Duration;

/// Drives one domain's balloon for the lifetime of the process.
pub struct BalloonController {
    config: Arc<ControllerConfig>,
    dispatcher: StateDispatcher,
}

impl BalloonController {
    /// Create a controller from a validated configuration.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Config`] if the configuration is invalid.
    pub fn new(config: ControllerConfig) -> Result<Self> {
        // Runs before the disabled-period check in `run_with`.
        config.validate()?;
        let config = Arc::new(config);
        Ok(Self {
            dispatcher: StateDispatcher::new(Arc::clone(&config)),
            config,
        })
    }

    pub fn dispatcher(&self) -> &StateDispatcher {
        &self.dispatcher
    }

    /// Connect through libvirt and run until the domain stops.
    pub fn run(&self) -> Result<()> {
        self.run_with(hypervisor::open_session, std::thread::sleep)
    }

    /// Run with a custom connector and sleep function.
    ///
    /// A zero period returns before connecting.
    pub fn run_with<C, S>(&self, connect: C, sleep: S) -> Result<()>
    where
        C: FnOnce(&str) -> Result<Box<dyn Session>>,
        S: FnMut(Duration),
    {
        if self.config.is_disabled() {
            tracing::info!(domain = %self.config.domain, "poll period is 0, monitoring disabled");
            return Ok(());
        }

        tracing::info!(
            uri = %self.config.uri,
            domain = %self.config.domain,
            period = %humantime::format_duration(self.config.period()),
            "starting balloon controller (min {:.2}MB, free {:.2}MB, thresholds -{:.2}MB/+{:.2}MB)",
            mib(signed(self.config.min_memory_kib)),
            mib(signed(self.config.free_margin_kib)),
            mib(signed(self.config.min_threshold_kib)),
            mib(signed(self.config.max_threshold_kib)),
        );

        let session = connect(&self.config.uri)?;
        self.run_session(session.as_ref(), sleep)
    }

    /// Look up the domain on an open session and poll it.
    pub fn run_session<S>(&self, session: &dyn Session, sleep: S) -> Result<()>
    where
        S: FnMut(Duration),
    {
        let domain = session.lookup_domain(&self.config.domain)?;
        domain.set_statistics_period(self.config.period_secs)?;
        tracing::debug!(
            uri = %session.uri(),
            domain = %domain.name(),
            period_secs = self.config.period_secs,
            "enabled memory statistics"
        );

        self.poll(domain.as_ref(), sleep)
    }

    /// Tick until a behavior says stop.
    pub fn poll<S>(&self, domain: &dyn Domain, mut sleep: S) -> Result<()>
    where
        S: FnMut(Duration),
    {
        loop {
            if self.tick(domain)? == ControlSignal::Stop {
                tracing::info!(
                    domain = %domain.name(),
                    handlers = self.dispatcher.resolved_count(),
                    "domain is going down, stopping"
                );
                return Ok(());
            }
            sleep(self.config.period());
        }
    }

    /// Run a single tick.
    ///
    /// # Errors
    ///
    /// Fails if the state can't be queried, has no behavior, or the
    /// behavior hits a fatal error. Stats and resize failures are logged by
    /// the behavior and never returned.
    pub fn tick(&self, domain: &dyn Domain) -> Result<ControlSignal> {
        let state = domain.current_state()?;
        let behavior = self.dispatcher.resolve(state)?;
        behavior.handle(domain)
    }
}
