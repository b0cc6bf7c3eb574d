//! Machine states.

use std::fmt;

use serde::Serialize;

/// Detailed state of a virtual machine, as reported by its controller.
///
/// Never cached: every query goes to the backing tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MachineState {
    /// The machine does not exist yet.
    NotCreated,
    /// The machine is up.
    Running,
    /// The machine was shut down.
    Poweroff,
    /// The machine stopped unexpectedly.
    Aborted,
    /// The machine state was saved to disk.
    Saved,
    /// The machine was stopped.
    Stopped,
    /// The machine is frozen (container backends).
    Frozen,
    /// The machine is shut off (libvirt).
    Shutoff,
}

impl MachineState {
    /// Every state, in declaration order.
    pub const ALL: [Self; 8] = [
        Self::NotCreated,
        Self::Running,
        Self::Poweroff,
        Self::Aborted,
        Self::Saved,
        Self::Stopped,
        Self::Frozen,
        Self::Shutoff,
    ];

    /// Lowercase name, matching the vagrant vocabulary.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::NotCreated => "not_created",
            Self::Running => "running",
            Self::Poweroff => "poweroff",
            Self::Aborted => "aborted",
            Self::Saved => "saved",
            Self::Stopped => "stopped",
            Self::Frozen => "frozen",
            Self::Shutoff => "shutoff",
        }
    }

    /// Maps a native vagrant state to a `MachineState`.
    ///
    /// Returns `None` for values with no mapping; callers turn that into a
    /// configuration error.
    #[must_use]
    pub fn from_vagrant(native: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.as_str() == native)
    }
}

impl fmt::Display for MachineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
