//! The run-wide attack logger.
//!
//! Every plugin instance holds an `Arc<dyn AttackLogger>` for the whole
//! experiment run. Diagnostics go through [`AttackLogger::vprint`]; the
//! attack and vulnerability boundaries become [`Event`]s on the JSONL stream.

use chrono::Utc;
use tracing::{debug, error, info, trace};

use super::events::{Event, EventEmitter};

/// Sink for plugin diagnostics and execution boundaries.
///
/// Implementations must tolerate interleaved calls from several threads.
pub trait AttackLogger: Send + Sync {
    /// Verbosity based diagnostics.
    ///
    /// 0: errors only, 1: main information, 2: detailed progress,
    /// 3: debug logs, data dumps, everything.
    fn vprint(&self, text: &str, verbosity: u8);

    /// Marks the beginning of one attack invocation.
    fn start_kali_attack(&self, machine: &str, targets: &[String], plugin: &str, ttp: &str);

    /// Marks the end of the attack invocation started with the same fields.
    fn stop_kali_attack(&self, machine: &str, targets: &[String], plugin: &str, ttp: &str);

    /// Marks the beginning of a vulnerability start or stop step.
    fn start_vulnerability(&self, machine: &str, plugin: &str, ttp: &str);

    /// Marks the end of a vulnerability start or stop step.
    fn stop_vulnerability(&self, machine: &str, plugin: &str, ttp: &str);
}

/// Default attack logger: `tracing` for diagnostics, JSONL for boundaries.
#[derive(Debug)]
pub struct AttackLog {
    emitter: EventEmitter,
}

impl AttackLog {
    /// Creates a logger that writes boundary events to `emitter`.
    #[must_use]
    pub const fn new(emitter: EventEmitter) -> Self {
        Self { emitter }
    }

    /// Creates a logger that only produces `tracing` output.
    #[must_use]
    pub fn tracing_only() -> Self {
        Self::new(EventEmitter::noop())
    }

    /// Number of boundary events written so far.
    #[must_use]
    pub fn event_count(&self) -> u64 {
        self.emitter.event_count()
    }
}

impl AttackLogger for AttackLog {
    fn vprint(&self, text: &str, verbosity: u8) {
        match verbosity {
            0 => error!("{text}"),
            1 => info!("{text}"),
            2 => debug!("{text}"),
            _ => trace!("{text}"),
        }
    }

    fn start_kali_attack(&self, machine: &str, targets: &[String], plugin: &str, ttp: &str) {
        info!(machine, plugin, ttp, targets = ?targets, "attack started");
        self.emitter.emit(Event::AttackStarted {
            timestamp: Utc::now(),
            machine: machine.to_owned(),
            targets: targets.to_vec(),
            plugin: plugin.to_owned(),
            ttp: ttp.to_owned(),
        });
    }

    fn stop_kali_attack(&self, machine: &str, targets: &[String], plugin: &str, ttp: &str) {
        info!(machine, plugin, ttp, targets = ?targets, "attack stopped");
        self.emitter.emit(Event::AttackStopped {
            timestamp: Utc::now(),
            machine: machine.to_owned(),
            targets: targets.to_vec(),
            plugin: plugin.to_owned(),
            ttp: ttp.to_owned(),
        });
    }

    fn start_vulnerability(&self, machine: &str, plugin: &str, ttp: &str) {
        info!(machine, plugin, ttp, "vulnerability started");
        self.emitter.emit(Event::VulnerabilityStarted {
            timestamp: Utc::now(),
            machine: machine.to_owned(),
            plugin: plugin.to_owned(),
            ttp: ttp.to_owned(),
        });
    }

    fn stop_vulnerability(&self, machine: &str, plugin: &str, ttp: &str) {
        info!(machine, plugin, ttp, "vulnerability stopped");
        self.emitter.emit(Event::VulnerabilityStopped {
            timestamp: Utc::now(),
            machine: machine.to_owned(),
            plugin: plugin.to_owned(),
            ttp: ttp.to_owned(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observability::events::tests::TestWriter;

    #[test]
    fn attack_boundaries_are_paired() {
        let tw = TestWriter::new();
        let log = AttackLog::new(EventEmitter::new(Box::new(tw.clone())));
        let targets = vec!["10.0.0.5".to_owned()];

        log.start_kali_attack("attacker", &targets, "arp_discovery", "T1016");
        log.stop_kali_attack("attacker", &targets, "arp_discovery", "T1016");

        let lines = tw.lines();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["type"], "AttackStarted");
        assert_eq!(lines[1]["type"], "AttackStopped");
        for line in &lines {
            assert_eq!(line["machine"], "attacker");
            assert_eq!(line["plugin"], "arp_discovery");
            assert_eq!(line["ttp"], "T1016");
            assert_eq!(line["targets"][0], "10.0.0.5");
        }
        assert_eq!(log.event_count(), 2);
    }

    #[test]
    fn vprint_does_not_emit_events() {
        let tw = TestWriter::new();
        let log = AttackLog::new(EventEmitter::new(Box::new(tw.clone())));
        for level in 0..=5 {
            log.vprint("diagnostic", level);
        }
        assert!(tw.contents().is_empty());
        assert_eq!(log.event_count(), 0);
    }

    #[test]
    fn vulnerability_events_carry_machine() {
        let tw = TestWriter::new();
        let log = AttackLog::new(EventEmitter::new(Box::new(tw.clone())));
        log.start_vulnerability("target1", "sshd_weak_auth", "T1110");
        log.stop_vulnerability("target1", "sshd_weak_auth", "T1110");

        let lines = tw.lines();
        assert_eq!(lines[0]["type"], "VulnerabilityStarted");
        assert_eq!(lines[1]["machine"], "target1");
    }
}
