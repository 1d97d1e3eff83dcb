//! libvirt backend built on the `virsh` command-line client.
//!
//! Every call runs `virsh -c <uri> -q <subcommand>` and interprets its
//! output. `virsh` keeps no state between invocations, so the session only
//! carries the connection URI.

use super::{Domain, Session};
use crate::error::{Error, Result};
use crate::state::LifecycleState;
use crate::stats::MemorySnapshot;
use std::process::Command;

/// Default `virsh` binary.
const VIRSH: &str = "virsh";

/// Environment variable overriding the `virsh` binary.
const VIRSH_ENV: &str = "AUTOBALLOON_VIRSH";

/// Get the `virsh` binary to run.
fn virsh_program() -> String {
    std::env::var(VIRSH_ENV).unwrap_or_else(|_| VIRSH.to_string())
}

/// virsh subcommand type.
enum VirshCmd<'a> {
    Uri,
    DomUuid { domain: &'a str },
    DomState { domain: &'a str },
    DomMemStat { domain: &'a str },
    SetMemStatPeriod { domain: &'a str, period_secs: u64 },
    SetMem { domain: &'a str, target_kib: u64 },
}

impl VirshCmd<'_> {
    /// Human readable name used in errors.
    fn label(&self) -> &'static str {
        match self {
            VirshCmd::Uri => "virsh uri",
            VirshCmd::DomUuid { .. } => "virsh domuuid",
            VirshCmd::DomState { .. } => "virsh domstate",
            VirshCmd::DomMemStat { .. } | VirshCmd::SetMemStatPeriod { .. } => "virsh dommemstat",
            VirshCmd::SetMem { .. } => "virsh setmem",
        }
    }
}

/// Build a virsh command bound to a connection URI.
fn virsh_command(uri: &str, cmd_type: &VirshCmd<'_>) -> Command {
    let mut cmd = Command::new(virsh_program());
    cmd.args(["-c", uri, "-q"]);

    match cmd_type {
        VirshCmd::Uri => {
            cmd.arg("uri");
        }
        VirshCmd::DomUuid { domain } => {
            cmd.args(["domuuid", domain]);
        }
        VirshCmd::DomState { domain } => {
            cmd.args(["domstate", domain]);
        }
        VirshCmd::DomMemStat { domain } => {
            cmd.args(["dommemstat", domain]);
        }
        VirshCmd::SetMemStatPeriod {
            domain,
            period_secs,
        } => {
            cmd.args(["dommemstat", domain, "--period"]);
            cmd.arg(period_secs.to_string());
        }
        VirshCmd::SetMem { domain, target_kib } => {
            cmd.args(["setmem", domain]);
            cmd.arg(target_kib.to_string());
        }
    }

    cmd
}

/// Outcome of a virsh invocation that actually ran.
enum Outcome {
    Success(String),
    Failure(String),
}

/// Run a virsh command, failing only if it couldn't be spawned.
fn run(uri: &str, cmd_type: VirshCmd<'_>) -> Result<Outcome> {
    let output = virsh_command(uri, &cmd_type)
        .output()
        .map_err(|e| Error::command_failed(cmd_type.label(), e.to_string()))?;

    if output.status.success() {
        Ok(Outcome::Success(
            String::from_utf8_lossy(&output.stdout).into_owned(),
        ))
    } else {
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        tracing::debug!(command = cmd_type.label(), error = %stderr, "virsh failed");
        Ok(Outcome::Failure(stderr))
    }
}

/// Map a failed `domuuid` to an error.
///
/// Only libvirt's "no domain" reply means the name is unknown; anything else
/// (dropped socket, denied access) is reported against the connection.
fn lookup_error(uri: &str, name: &str, stderr: &str) -> Error {
    let lower = stderr.to_ascii_lowercase();
    if lower.contains("failed to get domain") || lower.contains("domain not found") {
        Error::DomainNotFound(name.to_string())
    } else {
        Error::connection(uri, stderr)
    }
}

/// A libvirt connection reached through `virsh`.
#[derive(Debug)]
pub struct VirshSession {
    uri: String,
}

impl VirshSession {
    /// Open a session, checking that the URI is reachable.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Connection`] if virsh can't connect.
    pub fn open(uri: &str) -> Result<Self> {
        tracing::debug!(uri = %uri, "opening libvirt session");

        match run(uri, VirshCmd::Uri) {
            Ok(Outcome::Success(canonical)) => {
                tracing::info!(uri = %uri, canonical = %canonical.trim(), "connected to libvirt");
                Ok(Self {
                    uri: uri.to_string(),
                })
            }
            Ok(Outcome::Failure(message)) => Err(Error::connection(uri, message)),
            Err(e) => Err(Error::connection(uri, e.to_string())),
        }
    }
}

impl Session for VirshSession {
    fn uri(&self) -> &str {
        &self.uri
    }

    fn lookup_domain<'a>(&'a self, name: &str) -> Result<Box<dyn Domain + 'a>> {
        match run(&self.uri, VirshCmd::DomUuid { domain: name })? {
            Outcome::Success(uuid) => {
                tracing::debug!(domain = %name, uuid = %uuid.trim(), "found domain");
                Ok(Box::new(VirshDomain {
                    session: self,
                    name: name.to_string(),
                }))
            }
            Outcome::Failure(stderr) => Err(lookup_error(&self.uri, name, &stderr)),
        }
    }
}

impl Drop for VirshSession {
    fn drop(&mut self) {
        tracing::debug!(uri = %self.uri, "closing libvirt session");
    }
}

/// A domain on a [`VirshSession`].
#[derive(Debug)]
pub struct VirshDomain<'a> {
    session: &'a VirshSession,
    name: String,
}

impl Domain for VirshDomain<'_> {
    fn name(&self) -> &str {
        &self.name
    }

    fn current_state(&self) -> Result<LifecycleState> {
        let state_error = |message: String| Error::StateQuery {
            domain: self.name.clone(),
            message,
        };

        let stdout = match run(&self.session.uri, VirshCmd::DomState { domain: &self.name })? {
            Outcome::Success(stdout) => stdout,
            Outcome::Failure(message) => return Err(state_error(message)),
        };

        let line = stdout.lines().map(str::trim).find(|l| !l.is_empty());
        match line {
            Some(line) => line.parse().map_err(state_error),
            None => Err(state_error("empty domstate output".to_string())),
        }
    }

    fn memory_statistics(&self) -> Result<MemorySnapshot> {
        match run(&self.session.uri, VirshCmd::DomMemStat { domain: &self.name })
            .map_err(|e| Error::stats(&self.name, e.to_string()))?
        {
            Outcome::Success(stdout) => Ok(MemorySnapshot::parse(&stdout)),
            Outcome::Failure(message) => Err(Error::stats(&self.name, message)),
        }
    }

    fn set_memory(&self, target_kib: u64) -> Result<()> {
        let cmd = VirshCmd::SetMem {
            domain: &self.name,
            target_kib,
        };
        match run(&self.session.uri, cmd)
            .map_err(|e| Error::resize(&self.name, target_kib, e.to_string()))?
        {
            Outcome::Success(_) => Ok(()),
            Outcome::Failure(message) => Err(Error::resize(&self.name, target_kib, message)),
        }
    }

    fn set_statistics_period(&self, period_secs: u64) -> Result<()> {
        let cmd = VirshCmd::SetMemStatPeriod {
            domain: &self.name,
            period_secs,
        };
        let failure = |message: String| Error::StatisticsPeriod {
            domain: self.name.clone(),
            message,
        };
        match run(&self.session.uri, cmd).map_err(|e| failure(e.to_string()))? {
            Outcome::Success(_) => Ok(()),
            Outcome::Failure(message) => Err(failure(message)),
        }
    }
}
