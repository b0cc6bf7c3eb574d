//! Which controller failures are benign.
//!
//! VM tools report failures that leave the machine exactly where the caller
//! wanted it (an `up` racing a machine that is already booting, a halt that
//! only needed to be forced). A [`RecoveryPolicy`] decides which of those
//! are absorbed.

use std::fmt;

use super::MachineState;

/// Decides which backend failures a controller absorbs.
pub trait RecoveryPolicy: Send + Sync + fmt::Debug {
    /// Whether a failed `up` counts as success when the machine is found in
    /// `state` afterwards.
    fn accept_failed_up(&self, state: MachineState) -> bool;

    /// Whether a failed non-forced halt is retried once with force.
    fn retry_halt_forced(&self) -> bool;
}

/// `up` is satisfied by a running machine; a stuck halt is forced once.
#[derive(Debug, Clone, Copy, Default)]
pub struct StandardRecovery;

impl RecoveryPolicy for StandardRecovery {
    fn accept_failed_up(&self, state: MachineState) -> bool {
        state == MachineState::Running
    }

    fn retry_halt_forced(&self) -> bool {
        true
    }
}

/// Every backend failure propagates.
#[derive(Debug, Clone, Copy, Default)]
pub struct StrictRecovery;

impl RecoveryPolicy for StrictRecovery {
    fn accept_failed_up(&self, _state: MachineState) -> bool {
        false
    }

    fn retry_halt_forced(&self) -> bool {
        false
    }
}
