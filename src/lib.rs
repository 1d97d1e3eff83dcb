//! autoballoon - memory balloon controller for a libvirt domain.
//!
//! The controller polls a single domain, and while it runs keeps its balloon
//! at current usage plus a free margin, above a configured floor. Small
//! fluctuations inside a hysteresis band are ignored.
//!
//! - [`stats::MemorySnapshot`]: one statistics sample, zero for missing counters
//! - [`dispatch::StateDispatcher`]: one behavior per lifecycle state
//! - [`controller::BalloonController`]: the polling loop

pub mod balloon;
pub mod config;
pub mod controller;
pub mod dispatch;
pub mod error;
pub mod hypervisor;
pub mod state;
pub mod stats;

pub use config::ControllerConfig;
pub use controller::BalloonController;
pub use dispatch::{ControlSignal, StateBehavior, StateDispatcher};
pub use error::{Error, Result};
pub use state::LifecycleState;
pub use stats::MemorySnapshot;

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
