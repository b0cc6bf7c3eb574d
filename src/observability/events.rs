//! Structured event stream for the attack log.
//!
//! Discrete, typed events emitted while plugins run. Events are serialized
//! as newline-delimited JSON (JSONL) and carry a monotonically increasing
//! sequence number so interleaved writers still produce an ordered log.

use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use serde::Serialize;

// ---------------------------------------------------------------------------
// Event variants
// ---------------------------------------------------------------------------

/// A discrete event emitted during an experiment run.
///
/// Each variant is tagged with `"type"` when serialized to JSON so consumers
/// can dispatch on the event kind.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
pub enum Event {
    /// An attack plugin is about to run.
    AttackStarted {
        /// When the attack started.
        timestamp: DateTime<Utc>,
        /// VM name of the attacking machine.
        machine: String,
        /// Addresses the attack is aimed at.
        targets: Vec<String>,
        /// Name of the attack plugin.
        plugin: String,
        /// Resolved technique identifier.
        ttp: String,
    },

    /// An attack plugin finished (successfully or not).
    AttackStopped {
        /// When the attack stopped.
        timestamp: DateTime<Utc>,
        /// VM name of the attacking machine.
        machine: String,
        /// Addresses the attack was aimed at.
        targets: Vec<String>,
        /// Name of the attack plugin.
        plugin: String,
        /// Resolved technique identifier.
        ttp: String,
    },

    /// A vulnerability is being installed on a machine.
    VulnerabilityStarted {
        /// When installation started.
        timestamp: DateTime<Utc>,
        /// VM name of the vulnerable machine.
        machine: String,
        /// Name of the vulnerability plugin.
        plugin: String,
        /// Resolved technique identifier.
        ttp: String,
    },

    /// A vulnerability start or stop step finished.
    VulnerabilityStopped {
        /// When the step finished.
        timestamp: DateTime<Utc>,
        /// VM name of the vulnerable machine.
        machine: String,
        /// Name of the vulnerability plugin.
        plugin: String,
        /// Resolved technique identifier.
        ttp: String,
    },
}

// ---------------------------------------------------------------------------
// Envelope (adds sequence number via serde flatten)
// ---------------------------------------------------------------------------

/// Wraps an [`Event`] with a monotonically increasing sequence number.
#[derive(Debug, Serialize)]
struct EventEnvelope {
    /// Zero-based, monotonically increasing sequence counter.
    sequence: u64,
    /// The wrapped event (flattened into the same JSON object).
    #[serde(flatten)]
    event: Event,
}

// ---------------------------------------------------------------------------
// Emitter
// ---------------------------------------------------------------------------

/// Thread-safe, buffered JSONL event writer.
///
/// Each call to [`emit`](Self::emit) atomically increments the sequence
/// counter, serializes the event as a single JSON line, and flushes the
/// underlying writer. Serialization or I/O failures are dropped: a broken
/// log sink must never abort an attack mid-flight.
pub struct EventEmitter {
    writer: Mutex<BufWriter<Box<dyn Write + Send>>>,
    sequence: AtomicU64,
}

// Box<dyn Write> is not Debug — provide a manual impl.
impl std::fmt::Debug for EventEmitter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventEmitter")
            .field("sequence", &self.sequence.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

impl EventEmitter {
    /// Creates an emitter that writes to the given writer.
    #[must_use]
    pub fn new(writer: Box<dyn Write + Send>) -> Self {
        Self {
            writer: Mutex::new(BufWriter::new(writer)),
            sequence: AtomicU64::new(0),
        }
    }

    /// Creates an emitter that writes to stdout.
    #[must_use]
    pub fn stdout() -> Self {
        Self::new(Box::new(std::io::stdout()))
    }

    /// Creates an emitter that silently discards all events.
    #[must_use]
    pub fn noop() -> Self {
        Self::new(Box::new(std::io::sink()))
    }

    /// Creates an emitter that writes to a file at `path`.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the file cannot be created or opened.
    pub fn from_file(path: &Path) -> std::io::Result<Self> {
        let file = std::fs::File::create(path)?;
        Ok(Self::new(Box::new(file)))
    }

    /// Emits an event as a single JSONL line.
    pub fn emit(&self, event: Event) {
        let seq = self.sequence.fetch_add(1, Ordering::SeqCst);
        let envelope = EventEnvelope {
            sequence: seq,
            event,
        };

        if let Ok(mut w) = self.writer.lock() {
            if let Ok(line) = serde_json::to_string(&envelope) {
                let _ = writeln!(w, "{line}");
                let _ = w.flush();
            }
        }
    }

    /// Returns the number of events emitted so far.
    #[must_use]
    pub fn event_count(&self) -> u64 {
        self.sequence.load(Ordering::Relaxed)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
pub(crate) mod tests {
    use std::sync::{Arc, Mutex as StdMutex};

    use super::*;

    /// In-memory writer for capturing emitter output in tests.
    #[derive(Clone)]
    pub(crate) struct TestWriter(Arc<StdMutex<Vec<u8>>>);

    impl TestWriter {
        pub(crate) fn new() -> Self {
            Self(Arc::new(StdMutex::new(Vec::new())))
        }

        pub(crate) fn contents(&self) -> String {
            let buf = self.0.lock().unwrap();
            String::from_utf8_lossy(&buf).into_owned()
        }

        pub(crate) fn lines(&self) -> Vec<serde_json::Value> {
            self.contents()
                .lines()
                .map(|l| serde_json::from_str(l).unwrap())
                .collect()
        }
    }

    impl Write for TestWriter {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    fn sample_event() -> Event {
        Event::AttackStarted {
            timestamp: DateTime::parse_from_rfc3339("2025-02-04T10:15:30Z")
                .unwrap()
                .with_timezone(&Utc),
            machine: "attacker".to_owned(),
            targets: vec!["192.168.178.20".to_owned()],
            plugin: "nmap_sweep".to_owned(),
            ttp: "T1046".to_owned(),
        }
    }

    #[test]
    fn event_serializes_with_type_tag() {
        let json = serde_json::to_string(&sample_event()).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed["type"], "AttackStarted");
        assert_eq!(parsed["plugin"], "nmap_sweep");
        assert_eq!(parsed["targets"][0], "192.168.178.20");
    }

    #[test]
    fn emitter_writes_valid_jsonl() {
        let tw = TestWriter::new();
        let emitter = EventEmitter::new(Box::new(tw.clone()));
        emitter.emit(sample_event());

        let output = tw.contents();
        let parsed: serde_json::Value = serde_json::from_str(output.trim()).unwrap();
        assert_eq!(parsed["type"], "AttackStarted");
        assert_eq!(parsed["machine"], "attacker");
        assert_eq!(parsed["ttp"], "T1046");
        assert_eq!(parsed["sequence"], 0);
    }

    #[test]
    fn emitter_increments_sequence() {
        let tw = TestWriter::new();
        let emitter = EventEmitter::new(Box::new(tw.clone()));
        emitter.emit(sample_event());
        emitter.emit(Event::VulnerabilityStopped {
            timestamp: Utc::now(),
            machine: "target1".to_owned(),
            plugin: "weak_user_passwords".to_owned(),
            ttp: "T1110".to_owned(),
        });

        assert_eq!(emitter.event_count(), 2);

        let lines = tw.lines();
        assert_eq!(lines[0]["sequence"], 0);
        assert_eq!(lines[1]["sequence"], 1);
        assert_eq!(lines[1]["type"], "VulnerabilityStopped");
    }

    #[test]
    fn concurrent_emits_keep_lines_intact() {
        let tw = TestWriter::new();
        let emitter = Arc::new(EventEmitter::new(Box::new(tw.clone())));

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let emitter = Arc::clone(&emitter);
                std::thread::spawn(move || {
                    for _ in 0..25 {
                        emitter.emit(sample_event());
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let lines = tw.lines();
        assert_eq!(lines.len(), 100);
        let mut sequences: Vec<u64> = lines
            .iter()
            .map(|l| l["sequence"].as_u64().unwrap())
            .collect();
        sequences.sort_unstable();
        assert_eq!(sequences, (0..100).collect::<Vec<_>>());
    }

    #[test]
    fn envelope_flattens_event_fields() {
        let envelope = EventEnvelope {
            sequence: 7,
            event: sample_event(),
        };
        let json = serde_json::to_string(&envelope).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();

        assert_eq!(parsed["sequence"], 7);
        assert_eq!(parsed["type"], "AttackStarted");
        assert!(
            parsed.get("event").is_none(),
            "event field should be flattened"
        );
    }
}
