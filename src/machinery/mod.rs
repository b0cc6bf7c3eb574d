//! Machinery module
//!
//! Virtual machine control: machine states, the [`Machine`] wrapper around
//! a machinery plugin, the registry owning the machines of a run, the
//! recovery policy absorbing benign controller failures, and the built-in
//! `vagrant` and `running_vm` controllers.

#[cfg(test)]
pub(crate) mod fake;
mod machine;
pub mod process;
pub mod recovery;
mod registry;
pub mod running_vm;
mod state;
pub mod transport;
pub mod vagrant;

pub use machine::Machine;
pub use recovery::{RecoveryPolicy, StandardRecovery, StrictRecovery};
pub use registry::{MachineHandle, MachineRegistry};
pub use running_vm::RunningVmMachinery;
pub use state::MachineState;
pub use transport::{SshSession, SshTarget, Transport};
pub use vagrant::{VagrantCli, VagrantMachinery, VmController};
