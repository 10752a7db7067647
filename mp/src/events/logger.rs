//! Event Logger - persists events to JSONL files
//!
//! Subscribes to the [`EventBus`] and appends each event to
//! `{events_dir}/{run-id}.jsonl`.

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use eyre::Context;
use tokio::sync::broadcast;
use tracing::{debug, error, warn};

use super::bus::EventBus;
use super::types::{EventLogEntry, PlannerEvent};

fn log_path(events_dir: &Path, run_id: &str) -> PathBuf {
    events_dir.join(format!("{run_id}.jsonl"))
}

/// Event logger that writes one JSONL file per run
pub struct EventLogger {
    events_dir: PathBuf,
    writers: HashMap<String, BufWriter<File>>,
}

impl EventLogger {
    pub fn new(events_dir: impl AsRef<Path>) -> Self {
        let events_dir = events_dir.as_ref().to_path_buf();
        debug!(?events_dir, "EventLogger::new: creating logger");
        Self {
            events_dir,
            writers: HashMap::new(),
        }
    }

    /// Append an event to its run's log file
    pub fn write_event(&mut self, event: &PlannerEvent) -> eyre::Result<()> {
        let run_id = event.run_id();
        debug!(%run_id, event_type = event.event_type(), "EventLogger::write_event");

        let writer = match self.writers.entry(run_id.to_string()) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => {
                fs::create_dir_all(&self.events_dir)
                    .with_context(|| format!("Failed to create events dir {}", self.events_dir.display()))?;
                let path = log_path(&self.events_dir, run_id);
                debug!(?path, "EventLogger: creating new log file");
                let file = OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(&path)
                    .with_context(|| format!("Failed to open event log {}", path.display()))?;
                entry.insert(BufWriter::new(file))
            }
        };

        let json = serde_json::to_string(&EventLogEntry::new(event.clone()))?;
        writeln!(writer, "{}", json)?;
        writer.flush()?;
        Ok(())
    }

    /// Flush and drop the writer for a finished run
    pub fn close_run(&mut self, run_id: &str) {
        debug!(%run_id, "EventLogger::close_run");
        if let Some(mut writer) = self.writers.remove(run_id) {
            let _ = writer.flush();
        }
    }

    /// Consume events from the bus until it closes
    pub async fn run(mut self, event_bus: Arc<EventBus>) {
        let rx = event_bus.subscribe();
        drop(event_bus);
        self.run_with(rx).await;
    }

    async fn run_with(&mut self, mut rx: broadcast::Receiver<PlannerEvent>) {
        debug!("EventLogger::run: starting event logger");
        loop {
            match rx.recv().await {
                Ok(event) => {
                    if let Err(e) = self.write_event(&event) {
                        error!(run_id = event.run_id(), error = %e, "EventLogger: failed to write event");
                    }
                    if event.is_terminal() {
                        self.close_run(event.run_id());
                    }
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!(missed = n, "EventLogger: lagged behind, missed events");
                }
                Err(broadcast::error::RecvError::Closed) => {
                    debug!("EventLogger: channel closed, shutting down");
                    break;
                }
            }
        }

        for (run_id, mut writer) in self.writers.drain() {
            debug!(%run_id, "EventLogger: flushing writer on shutdown");
            let _ = writer.flush();
        }
    }
}

/// Read the events recorded for one run
pub fn read_run_events(events_dir: impl AsRef<Path>, run_id: &str) -> eyre::Result<Vec<EventLogEntry>> {
    let path = log_path(events_dir.as_ref(), run_id);
    debug!(?path, "read_run_events: reading log file");

    if !path.exists() {
        return Ok(Vec::new());
    }

    let content = fs::read_to_string(&path)?;
    let mut entries = Vec::new();
    for line in content.lines().filter(|l| !l.trim().is_empty()) {
        match serde_json::from_str::<EventLogEntry>(line) {
            Ok(entry) => entries.push(entry),
            Err(e) => warn!(line, error = %e, "read_run_events: failed to parse line"),
        }
    }

    debug!(count = entries.len(), "read_run_events: loaded entries");
    Ok(entries)
}

/// Spawn the event logger as a background task
///
/// The task ends once every handle to the bus has been dropped.
pub fn spawn_event_logger(event_bus: Arc<EventBus>, events_dir: impl AsRef<Path>) -> tokio::task::JoinHandle<()> {
    let logger = EventLogger::new(events_dir);
    let rx = event_bus.subscribe();
    tokio::spawn(async move {
        let mut logger = logger;
        logger.run_with(rx).await;
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn started(run_id: &str) -> PlannerEvent {
        PlannerEvent::RunStarted {
            run_id: run_id.to_string(),
            objective: "Survey".to_string(),
        }
    }

    #[test]
    fn test_write_event() {
        let temp = tempdir().unwrap();
        let mut logger = EventLogger::new(temp.path());

        logger.write_event(&started("run-123")).unwrap();

        let content = fs::read_to_string(temp.path().join("run-123.jsonl")).unwrap();
        assert!(content.contains("RunStarted"));
        assert!(content.contains("run-123"));
    }

    #[test]
    fn test_read_run_events() {
        let temp = tempdir().unwrap();
        let mut logger = EventLogger::new(temp.path());

        logger.write_event(&started("run-read")).unwrap();
        logger
            .write_event(&PlannerEvent::PhaseStarted {
                run_id: "run-read".to_string(),
                phase_index: 1,
                phase_name: "structure_analysis".to_string(),
                total_phases: 3,
            })
            .unwrap();
        logger.write_event(&started("other-run")).unwrap();

        let entries = read_run_events(temp.path(), "run-read").unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[1].event.event_type(), "PhaseStarted");
    }

    #[test]
    fn test_read_missing_run() {
        let temp = tempdir().unwrap();
        assert!(read_run_events(temp.path(), "nope").unwrap().is_empty());
    }

    #[test]
    fn test_close_run() {
        let temp = tempdir().unwrap();
        let mut logger = EventLogger::new(temp.path());
        logger.write_event(&started("run-close")).unwrap();
        assert!(logger.writers.contains_key("run-close"));
        logger.close_run("run-close");
        assert!(!logger.writers.contains_key("run-close"));
    }

    #[tokio::test]
    async fn test_spawned_logger_drains_until_bus_dropped() {
        let temp = tempdir().unwrap();
        let bus = Arc::new(EventBus::new(16));
        let handle = spawn_event_logger(bus.clone(), temp.path());

        let emitter = bus.emitter_for("run-spawn");
        emitter.run_started("Inspect");
        emitter.run_cancelled();
        drop(emitter);
        drop(bus);
        handle.await.unwrap();

        let entries = read_run_events(temp.path(), "run-spawn").unwrap();
        assert_eq!(entries.len(), 2);
        assert!(entries[1].event.is_terminal());
    }
}
