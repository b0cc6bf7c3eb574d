//! Observability module
//!
//! Logging and the structured attack log used to bracket plugin runs.

pub mod attack_log;
pub mod events;
pub mod logging;

pub use attack_log::{AttackLog, AttackLogger};
pub use events::{Event, EventEmitter};
pub use logging::{LogFormat, init_logging};
