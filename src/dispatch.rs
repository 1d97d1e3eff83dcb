//! Per-state behavior dispatch.
//!
//! Every lifecycle state the controller understands has exactly one
//! [`StateBehavior`] instance. Instances are built the first time their
//! state is seen and reused for the rest of the run, so a behavior can keep
//! bookkeeping across ticks.

use crate::balloon::{mib, signed, ResizePlan};
use crate::config::ControllerConfig;
use crate::error::{Error, Result};
use crate::hypervisor::Domain;
use crate::state::LifecycleState;
use crate::stats::{ACTUAL, USABLE};
use std::cell::{Cell, OnceCell};
use std::sync::Arc;

/// What the control loop does after a tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlSignal {
    /// Sleep and poll again.
    Continue,
    /// Leave the loop.
    Stop,
}

/// Behavior run for one lifecycle state.
pub trait StateBehavior {
    /// State this behavior is bound to.
    fn state(&self) -> LifecycleState;

    /// Handler name used in log lines.
    fn handler(&self) -> &'static str;

    /// Run one tick against the domain.
    ///
    /// The domain supplies both the statistics sample and the resize
    /// request; behaviors that don't need them never touch it.
    ///
    /// # Errors
    ///
    /// Only errors for which [`Error::is_fatal`] holds are returned; the
    /// rest are logged and the tick continues.
    fn handle(&self, domain: &dyn Domain) -> Result<ControlSignal>;
}

/// Resizes the balloon of a running domain.
pub struct RunningBehavior {
    config: Arc<ControllerConfig>,
    resizes: Cell<u64>,
}

impl RunningBehavior {
    pub fn new(config: Arc<ControllerConfig>) -> Self {
        Self {
            config,
            resizes: Cell::new(0),
        }
    }

    /// Number of successful resize requests so far.
    pub fn resize_count(&self) -> u64 {
        self.resizes.get()
    }

    /// Sample the domain and resize it if the delta leaves the band.
    ///
    /// Returns the applied plan, or `None` if nothing was requested.
    pub fn rebalance(&self, domain: &dyn Domain) -> Result<Option<ResizePlan>> {
        let snapshot = domain.memory_statistics()?;

        // Missing counters read as zero; the plan is still computed.
        if !snapshot.contains(ACTUAL) || !snapshot.contains(USABLE) {
            tracing::warn!(
                handler = self.handler(),
                domain = %domain.name(),
                "balloon statistics incomplete, missing counters read as 0"
            );
        }

        let plan = ResizePlan::compute(&snapshot, &self.config);
        tracing::debug!(
            handler = self.handler(),
            domain = %domain.name(),
            "actual = {:.2}MB, usable = {:.2}MB, delta = {:+.2}MB",
            mib(signed(snapshot.actual())),
            mib(signed(snapshot.usable())),
            mib(plan.delta_kib),
        );

        if !plan.should_resize(&self.config) {
            return Ok(None);
        }

        domain.set_memory(plan.target_kib)?;
        self.resizes.set(self.resizes.get() + 1);

        tracing::info!(
            handler = self.handler(),
            domain = %domain.name(),
            clamped = plan.is_clamped(),
            resizes = self.resize_count(),
            "memory resized from {:.2}MB to {:.2}MB (delta {:+.2}MB)",
            mib(signed(plan.previous_kib)),
            mib(signed(plan.target_kib)),
            mib(plan.delta_kib),
        );

        Ok(Some(plan))
    }
}

impl StateBehavior for RunningBehavior {
    fn state(&self) -> LifecycleState {
        LifecycleState::Running
    }

    fn handler(&self) -> &'static str {
        "running"
    }

    fn handle(&self, domain: &dyn Domain) -> Result<ControlSignal> {
        match self.rebalance(domain) {
            Ok(_) => {}
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => tracing::error!(
                handler = self.handler(),
                domain = %domain.name(),
                error = %e,
                "failed to resize memory"
            ),
        }
        Ok(ControlSignal::Continue)
    }
}

/// Logs the state and does nothing else.
///
/// Terminal states stop the loop.
pub struct PassiveBehavior {
    state: LifecycleState,
    handler: &'static str,
}

impl PassiveBehavior {
    pub fn new(state: LifecycleState, handler: &'static str) -> Self {
        Self { state, handler }
    }
}

impl StateBehavior for PassiveBehavior {
    fn state(&self) -> LifecycleState {
        self.state
    }

    fn handler(&self) -> &'static str {
        self.handler
    }

    fn handle(&self, domain: &dyn Domain) -> Result<ControlSignal> {
        tracing::debug!(
            handler = self.handler(),
            domain = %domain.name(),
            state = %self.state,
            "nothing to do"
        );

        if self.state.is_terminal() {
            Ok(ControlSignal::Stop)
        } else {
            Ok(ControlSignal::Continue)
        }
    }
}

/// Build the behavior for a state, if one is registered.
fn build_behavior(
    state: LifecycleState,
    config: &Arc<ControllerConfig>,
) -> Option<Box<dyn StateBehavior>> {
    let passive = |handler: &'static str| -> Option<Box<dyn StateBehavior>> {
        Some(Box::new(PassiveBehavior::new(state, handler)))
    };

    match state {
        LifecycleState::Running => Some(Box::new(RunningBehavior::new(Arc::clone(config)))),
        LifecycleState::NoState => passive("no-state"),
        LifecycleState::Paused => passive("paused"),
        LifecycleState::PmSuspended => passive("pm-suspended"),
        LifecycleState::ShuttingDown => passive("shutting-down"),
        LifecycleState::ShutOff => passive("shut-off"),
        LifecycleState::Blocked | LifecycleState::Crashed => None,
    }
}

/// Lazily built table of one behavior per state.
///
/// Not `Sync`: the table is filled from the control loop's thread only.
pub struct StateDispatcher {
    config: Arc<ControllerConfig>,
    slots: [OnceCell<Box<dyn StateBehavior>>; LifecycleState::COUNT],
}

impl StateDispatcher {
    pub fn new(config: Arc<ControllerConfig>) -> Self {
        Self {
            config,
            slots: std::array::from_fn(|_| OnceCell::new()),
        }
    }

    /// Get the behavior for `state`, building it on first use.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnmappedState`] if no behavior handles the state.
    pub fn resolve(&self, state: LifecycleState) -> Result<&dyn StateBehavior> {
        let slot = &self.slots[state.index()];
        if let Some(behavior) = slot.get() {
            return Ok(behavior.as_ref());
        }

        let behavior = build_behavior(state, &self.config).ok_or(Error::UnmappedState(state))?;
        tracing::debug!(handler = behavior.handler(), state = %state, "created state handler");
        Ok(slot.get_or_init(|| behavior).as_ref())
    }

    /// Number of behaviors built so far.
    pub fn resolved_count(&self) -> usize {
        self.slots.iter().filter(|s| s.get().is_some()).count()
    }
}
