//! Ingestion loop and the owning reader lifecycle.
//!
//! [`PlcReader`] is the single owned instance tying everything together: it
//! shares a [`LinkManager`] and a [`ReadingStore`] between the ingestion
//! thread (this module) and the health thread ([`crate::health`]), and is the
//! handle external consumers query.

use crate::config::ReaderConfig;
use crate::health::{self, ConnectionStatus};
use crate::link::LinkManager;
use crate::parser;
use crate::reading::{ReadingStore, SensorReading};
use crate::PlcError;
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender};
use log::{debug, error, info, warn};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

const MAX_READ_BYTES: usize = 4096;
const READ_PACING: Duration = Duration::from_millis(10);
const CLOSED_LINK_BACKOFF: Duration = Duration::from_secs(1);

/// Extracts complete newline-terminated lines from the front of `buffer`,
/// leaving any trailing partial line in place for the next read. Terminators
/// and surrounding whitespace (including `\r`) are stripped.
fn drain_lines(buffer: &mut Vec<u8>) -> Vec<String> {
    let mut lines = Vec::new();
    while let Some(pos) = buffer.iter().position(|&b| b == b'\n') {
        let rest = buffer.split_off(pos + 1);
        let taken = std::mem::replace(buffer, rest);
        let line = String::from_utf8_lossy(&taken[..pos]).trim().to_string();
        lines.push(line);
    }
    lines
}

/// Feeds one extracted line through the parser into the store. A malformed
/// line is counted and dropped; it never terminates the loop or the link.
fn ingest_line(line: &str, store: &ReadingStore) {
    if line.is_empty() {
        return;
    }
    match parser::parse_line(line) {
        Ok(reading) => {
            debug!("Data received: {}", reading.raw);
            store.record(reading);
        }
        Err(e) => {
            warn!("Dropping line '{}': {}", line, e);
            store.note_rejected();
        }
    }
}

/// Ingestion loop. Runs until the stop channel is signalled or dropped.
///
/// While the link is closed this backs off instead of busy-spinning; the
/// health monitor owns reconnects. An I/O fault ends the current ingestion
/// run by closing the link, after which control returns to the idle branch.
pub fn run(link: &LinkManager, store: &ReadingStore, stop_rx: &Receiver<()>) {
    let mut buffer: Vec<u8> = Vec::new();
    info!("Reader thread started.");

    loop {
        let mut wait = READ_PACING;
        if !link.is_open() {
            // A partial line from a dead connection must not prefix the
            // first line of the next one.
            buffer.clear();
            wait = CLOSED_LINK_BACKOFF;
        } else {
            match link.read_available(MAX_READ_BYTES) {
                Ok(bytes) if !bytes.is_empty() => {
                    buffer.extend_from_slice(&bytes);
                    for line in drain_lines(&mut buffer) {
                        ingest_line(&line, store);
                    }
                }
                Ok(_) => {}
                Err(e) => {
                    error!("Read failed on {}: {}. Closing link.", link.port_name(), e);
                    link.close();
                }
            }
        }

        match stop_rx.recv_timeout(wait) {
            Err(RecvTimeoutError::Timeout) => continue,
            _ => break,
        }
    }

    info!("Reader thread finished.");
}

/// Threaded serial reader for PLC telemetry.
///
/// [`start`](PlcReader::start) spawns the ingestion and health threads;
/// queries ([`latest`](PlcReader::latest), [`history`](PlcReader::history),
/// [`status`](PlcReader::status)) are safe to call from any thread while the
/// reader runs. [`stop`](PlcReader::stop) shuts both threads down and closes
/// the link.
#[derive(Debug)]
pub struct PlcReader {
    config: ReaderConfig,
    link: Arc<LinkManager>,
    store: Arc<ReadingStore>,
    stop_tx: Option<Sender<()>>,
    threads: Vec<JoinHandle<()>>,
}

impl PlcReader {
    /// Creates a reader with a fresh (empty) store. Nothing is opened yet.
    pub fn new(config: ReaderConfig) -> Self {
        let link = Arc::new(LinkManager::new(&config));
        let store = Arc::new(ReadingStore::new(config.history_capacity));
        Self {
            config,
            link,
            store,
            stop_tx: None,
            threads: Vec::new(),
        }
    }

    /// Opens the link and launches the ingestion and health threads.
    ///
    /// An initial open failure is logged but not fatal: the link stays closed
    /// and the health monitor retries on its interval. Calling `start` on a
    /// running reader is a no-op.
    pub fn start(&mut self) {
        if self.stop_tx.is_some() {
            return;
        }
        info!("Starting PLC reader on {}", self.config.port);

        if let Err(e) = self.link.open() {
            warn!("Initial connect failed: {}. Health monitor will retry.", e);
        }

        let (stop_tx, stop_rx) = bounded::<()>(0);

        let link = Arc::clone(&self.link);
        let store = Arc::clone(&self.store);
        let rx = stop_rx.clone();
        self.threads
            .push(thread::spawn(move || run(&link, &store, &rx)));

        let link = Arc::clone(&self.link);
        let store = Arc::clone(&self.store);
        let config = self.config.clone();
        self.threads
            .push(thread::spawn(move || health::run(&link, &store, &config, &stop_rx)));

        self.stop_tx = Some(stop_tx);
    }

    /// Raises the stop signal, joins both threads, then closes the link
    /// unconditionally. Safe to call repeatedly.
    ///
    /// # Errors
    /// Returns [`PlcError::ThreadComm`] if a worker thread panicked; the link
    /// is closed either way.
    pub fn stop(&mut self) -> Result<(), PlcError> {
        if self.stop_tx.is_none() && self.threads.is_empty() {
            return Ok(());
        }
        info!("Stopping PLC reader...");

        // Dropping the sender disconnects the stop channel; both loops
        // observe that within one polling interval.
        self.stop_tx = None;

        let mut result = Ok(());
        for handle in self.threads.drain(..) {
            if handle.join().is_err() {
                result = Err(PlcError::ThreadComm("worker thread panicked".to_string()));
            }
        }
        self.link.close();
        info!("PLC reader stopped.");
        result
    }

    /// Whether the worker threads are currently running.
    pub fn is_running(&self) -> bool {
        self.stop_tx.is_some()
    }

    /// The most recent reading, or `None` if nothing has arrived yet.
    pub fn latest(&self) -> Option<SensorReading> {
        self.store.latest()
    }

    /// Snapshot of the last `limit` readings (all of them with `None`),
    /// oldest first.
    pub fn history(&self, limit: Option<usize>) -> Vec<SensorReading> {
        self.store.history(limit)
    }

    /// Current connection status, recomputed from live state.
    pub fn status(&self) -> ConnectionStatus {
        health::status(&self.link, &self.store, &self.config)
    }

    /// Lines dropped because they failed to parse.
    pub fn rejected(&self) -> u64 {
        self.store.rejected()
    }
}

impl Drop for PlcReader {
    fn drop(&mut self) {
        if !self.threads.is_empty() {
            if let Err(e) = self.stop() {
                error!("Error stopping reader during drop: {:?}", e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drains_complete_lines_keeps_partial() {
        let mut buffer = b"TEMPERATURE:1,PRESSURE:2,SPEED:3\nTEMPERA".to_vec();
        let lines = drain_lines(&mut buffer);
        assert_eq!(lines, vec!["TEMPERATURE:1,PRESSURE:2,SPEED:3"]);
        assert_eq!(buffer, b"TEMPERA");
    }

    #[test]
    fn drains_multiple_lines_from_one_chunk() {
        let mut buffer = b"A:1\nB:2\nC:3\n".to_vec();
        let lines = drain_lines(&mut buffer);
        assert_eq!(lines, vec!["A:1", "B:2", "C:3"]);
        assert!(buffer.is_empty());
    }

    #[test]
    fn strips_carriage_returns() {
        let mut buffer = b"TEMPERATURE:1,PRESSURE:2,SPEED:3\r\n".to_vec();
        let lines = drain_lines(&mut buffer);
        assert_eq!(lines, vec!["TEMPERATURE:1,PRESSURE:2,SPEED:3"]);
    }

    #[test]
    fn torn_write_is_held_until_completed() {
        let store = ReadingStore::new(10);
        let mut buffer = Vec::new();

        buffer.extend_from_slice(b"TEMPERATURE:1,PRE");
        for line in drain_lines(&mut buffer) {
            ingest_line(&line, &store);
        }
        assert!(store.latest().is_none(), "no partial reading may appear");

        buffer.extend_from_slice(b"SSURE:2,SPEED:3\n");
        for line in drain_lines(&mut buffer) {
            ingest_line(&line, &store);
        }
        assert_eq!(store.len(), 1);
        let reading = store.latest().unwrap();
        assert_eq!(reading.temperature, 1.0);
        assert_eq!(reading.pressure, 2.0);
        assert_eq!(reading.speed, 3.0);
    }

    #[test]
    fn malformed_lines_are_counted_not_fatal() {
        let store = ReadingStore::new(10);
        let mut buffer = b"garbage\nTEMPERATURE:1,PRESSURE:2,SPEED:3\n\n".to_vec();
        for line in drain_lines(&mut buffer) {
            ingest_line(&line, &store);
        }
        // Blank lines are skipped silently, garbage is counted.
        assert_eq!(store.rejected(), 1);
        assert_eq!(store.len(), 1);
    }

    fn test_config() -> ReaderConfig {
        ReaderConfig {
            port: "/dev/nonexistent-plc-port".into(),
            timeout_secs: 0.05,
            max_silence_secs: 0.2,
            health_check_interval_secs: 0.02,
            retry_interval_secs: 0.02,
            history_capacity: 8,
            ..Default::default()
        }
    }

    #[test]
    fn lifecycle_with_unavailable_endpoint() {
        let mut reader = PlcReader::new(test_config());
        assert!(!reader.is_running());

        // Start succeeds even though the port cannot be opened; the health
        // monitor owns the retry schedule.
        reader.start();
        assert!(reader.is_running());

        let status = reader.status();
        assert!(!status.is_connected);
        assert!(!status.is_healthy);
        assert!(reader.latest().is_none());

        reader.stop().unwrap();
        assert!(!reader.is_running());
        // stop() is idempotent.
        reader.stop().unwrap();
    }

    #[test]
    fn restart_uses_the_same_store() {
        let mut reader = PlcReader::new(test_config());
        reader.start();
        reader.stop().unwrap();
        reader.start();
        assert!(reader.is_running());
        reader.stop().unwrap();
        // History survives start/stop cycles; only a new PlcReader resets it.
        assert!(reader.history(None).is_empty());
    }

    #[test]
    fn stop_without_start_is_a_no_op() {
        let mut reader = PlcReader::new(test_config());
        reader.stop().unwrap();
    }
}
