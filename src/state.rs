//! Domain lifecycle state types.

use std::str::FromStr;

/// Domain lifecycle states as reported by libvirt.
///
/// Discriminants follow libvirt's `virDomainState` numbering so the
/// enumeration doubles as a dense table index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LifecycleState {
    /// No state reported.
    NoState = 0,

    /// Domain is running.
    Running = 1,

    /// Domain is blocked on a resource.
    Blocked = 2,

    /// Domain is paused by the user.
    Paused = 3,

    /// Domain is being shut down.
    ShuttingDown = 4,

    /// Domain is shut off.
    ShutOff = 5,

    /// Domain has crashed.
    Crashed = 6,

    /// Domain is suspended by guest power management.
    PmSuspended = 7,
}

impl LifecycleState {
    /// Number of states libvirt defines.
    pub const COUNT: usize = 8;

    /// All states, in libvirt order.
    pub const ALL: [LifecycleState; Self::COUNT] = [
        LifecycleState::NoState,
        LifecycleState::Running,
        LifecycleState::Blocked,
        LifecycleState::Paused,
        LifecycleState::ShuttingDown,
        LifecycleState::ShutOff,
        LifecycleState::Crashed,
        LifecycleState::PmSuspended,
    ];

    /// Map a raw `virDomainState` code.
    pub fn from_code(code: i32) -> Option<Self> {
        usize::try_from(code)
            .ok()
            .and_then(|i| Self::ALL.get(i))
            .copied()
    }

    /// Position in a per-state table.
    pub fn index(self) -> usize {
        self as usize
    }

    /// Check if the domain can no longer be ballooned.
    pub fn is_terminal(self) -> bool {
        matches!(self, LifecycleState::ShuttingDown | LifecycleState::ShutOff)
    }

    /// Get the state name as printed by `virsh domstate`.
    pub fn name(self) -> &'static str {
        match self {
            LifecycleState::NoState => "no state",
            LifecycleState::Running => "running",
            LifecycleState::Blocked => "idle",
            LifecycleState::Paused => "paused",
            LifecycleState::ShuttingDown => "in shutdown",
            LifecycleState::ShutOff => "shut off",
            LifecycleState::Crashed => "crashed",
            LifecycleState::PmSuspended => "pmsuspended",
        }
    }
}

impl std::fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for LifecycleState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase();

        // Numeric codes come from `domstate` wrappers that print the raw enum.
        if let Ok(code) = normalized.parse::<i32>() {
            return Self::from_code(code).ok_or_else(|| format!("unknown state code: {}", code));
        }

        match normalized.as_str() {
            "no state" | "nostate" => Ok(LifecycleState::NoState),
            "running" => Ok(LifecycleState::Running),
            "idle" | "blocked" => Ok(LifecycleState::Blocked),
            "paused" => Ok(LifecycleState::Paused),
            "in shutdown" | "shutdown" => Ok(LifecycleState::ShuttingDown),
            "shut off" | "shutoff" => Ok(LifecycleState::ShutOff),
            "crashed" => Ok(LifecycleState::Crashed),
            "pmsuspended" => Ok(LifecycleState::PmSuspended),
            other => Err(format!("unknown domain state: {:?}", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_virsh_names() {
        let cases = [
            ("running\n", LifecycleState::Running),
            ("no state", LifecycleState::NoState),
            ("idle", LifecycleState::Blocked),
            ("paused", LifecycleState::Paused),
            ("in shutdown", LifecycleState::ShuttingDown),
            ("shut off\n\n", LifecycleState::ShutOff),
            ("crashed", LifecycleState::Crashed),
            ("PMSuspended", LifecycleState::PmSuspended),
        ];

        for (raw, expected) in cases {
            assert_eq!(raw.parse::<LifecycleState>(), Ok(expected), "{:?}", raw);
        }
    }

    #[test]
    fn test_name_round_trips_through_parse() {
        for state in LifecycleState::ALL {
            assert_eq!(state.name().parse::<LifecycleState>(), Ok(state));
        }
    }

    #[test]
    fn test_codes_match_libvirt() {
        assert_eq!(LifecycleState::from_code(1), Some(LifecycleState::Running));
        assert_eq!(LifecycleState::from_code(5), Some(LifecycleState::ShutOff));
        assert_eq!(LifecycleState::from_code(7), Some(LifecycleState::PmSuspended));
        assert_eq!(LifecycleState::from_code(8), None);
        assert_eq!(LifecycleState::from_code(-1), None);
        assert_eq!("4".parse::<LifecycleState>(), Ok(LifecycleState::ShuttingDown));
    }

    #[test]
    fn test_unknown_state_is_rejected() {
        let err = "migrating".parse::<LifecycleState>().unwrap_err();
        assert!(err.contains("migrating"));
    }

    #[test]
    fn test_terminal_states() {
        for state in LifecycleState::ALL {
            let expected = matches!(
                state,
                LifecycleState::ShuttingDown | LifecycleState::ShutOff
            );
            assert_eq!(state.is_terminal(), expected, "{:?}.is_terminal()", state);
        }
    }
}
